//! Working-set report

use chrono::{DateTime, Utc};
use killfeed_core::{KillRecord, RetentionPolicy};
use killfeed_redisq::MonitorStats;
use killfeed_store::StoreSnapshot;
use std::fmt::Write;

pub fn render(
    snapshot: &StoreSnapshot,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
    top: usize,
    live: bool,
    stats: MonitorStats,
) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "── {} │ {} live │ {} │ polls {} kills {} idle {} failed {} dropped {}",
        now.format("%H:%M:%S"),
        snapshot.records.len(),
        if live { "connected" } else { "stalled" },
        stats.polls,
        stats.kills,
        stats.empty_ticks,
        stats.failures,
        stats.dropped,
    );

    for record in snapshot.ranked().into_iter().take(top) {
        let _ = writeln!(out, "  {}", row(record, policy, now));
    }

    if let Some(focused) = &snapshot.focused {
        let _ = writeln!(out, "  📌 {} {}", focused.render_compact(), focused.reference_url);
    }

    out
}

fn row(record: &KillRecord, policy: RetentionPolicy, now: DateTime<Utc>) -> String {
    let remaining = (policy.expires_at(record) - now).num_seconds().max(0);
    format!(
        "{:>10.2}M  ship {:<6} system {:<9} age {:>4}s  ttl {:>4}s",
        record.raw_value / 1_000_000.0,
        record.category_id,
        record.location_id,
        record.age(now).num_seconds(),
        remaining,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn kill(id: u64, raw_value: f64, scaled_value: f64, received_at: DateTime<Utc>) -> KillRecord {
        KillRecord {
            id,
            occurred_at: received_at,
            received_at,
            actor_id: 1,
            group_id: 1,
            alliance_id: None,
            category_id: 587,
            location_id: 30000142,
            position: None,
            reference_url: killfeed_core::default_reference_url(id),
            raw_value,
            scaled_value,
            npc: false,
            solo: false,
        }
    }

    #[test]
    fn test_render_ranks_and_limits() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut snapshot = StoreSnapshot::default();
        for (id, raw, scaled) in [(1, 1e6, 1.0), (2, 5e9, 6.0), (3, 2e8, 3.0)] {
            snapshot.records.insert(id, kill(id, raw, scaled, t0));
        }
        snapshot.focused = snapshot.records.get(&3).cloned();

        let out = render(
            &snapshot,
            RetentionPolicy::default(),
            t0 + Duration::seconds(10),
            2,
            true,
            MonitorStats::default(),
        );

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("3 live"));
        assert!(lines[0].contains("connected"));
        assert!(lines[1].contains("5000.00M"));
        assert!(lines[2].contains("200.00M"));
        assert!(lines[3].contains("https://zkillboard.com/kill/3/"));
    }
}
