//! Kill records and wire decoding
//!
//! Two package shapes arrive from the feed:
//!
//! - wrapped: `{ "killmail": { ... }, "zkb": { ... } }`
//! - flat (legacy): `{ "killmail_id": 1, "victim": { ... }, ... }` with no
//!   market block, or with `zkb` inlined next to the kill fields
//!
//! Both collapse to one [`KillRecord`].

use crate::{scale::Scaler, Clock, Error, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Kill identifier, stable across re-delivery
pub type KillId = u64;

/// Position of the victim inside the solar system (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A single kill in the live working set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillRecord {
    /// Kill id (store key)
    pub id: KillId,

    /// When the kill happened, as reported by the source
    pub occurred_at: DateTime<Utc>,

    /// When this process decoded it; drives retention aging
    pub received_at: DateTime<Utc>,

    /// Victim character
    pub actor_id: u64,

    /// Victim corporation
    pub group_id: u64,

    /// Victim alliance
    pub alliance_id: Option<u64>,

    /// Ship type lost
    pub category_id: u64,

    /// Solar system
    pub location_id: u64,

    pub position: Option<Position>,

    /// Canonical link to the kill
    pub reference_url: String,

    /// Total ISK value, 0 when the market block is missing
    pub raw_value: f64,

    /// Retention multiplier derived from `raw_value`
    pub scaled_value: f64,

    pub npc: bool,
    pub solo: bool,
}

impl KillRecord {
    /// Age relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.received_at
    }

    /// Render as compact string
    pub fn render_compact(&self) -> String {
        format!(
            "#{} ship {} in {} [{:.2}M ISK x{:.2}]{}",
            self.id,
            self.category_id,
            self.location_id,
            self.raw_value / 1_000_000.0,
            self.scaled_value,
            if self.solo { " solo" } else { "" }
        )
    }
}

/// Fallback link when the market block has none
pub fn default_reference_url(id: KillId) -> String {
    format!("https://zkillboard.com/kill/{}/", id)
}

#[derive(Debug, Default, Deserialize)]
struct WirePackage {
    killmail: Option<WireKill>,
    #[serde(default, deserialize_with = "lenient")]
    zkb: Option<WireMarket>,
    #[serde(flatten)]
    inline: WireKill,
}

#[derive(Debug, Default, Deserialize)]
struct WireKill {
    killmail_id: Option<u64>,
    killmail_time: Option<String>,
    solar_system_id: Option<u64>,
    victim: Option<WireVictim>,
}

#[derive(Debug, Default, Deserialize)]
struct WireVictim {
    character_id: Option<u64>,
    corporation_id: Option<u64>,
    alliance_id: Option<u64>,
    ship_type_id: Option<u64>,
    position: Option<Position>,
}

/// Optional market data; a field of the wrong shape reads as absent
#[derive(Debug, Default, Deserialize)]
struct WireMarket {
    #[serde(rename = "totalValue", default, deserialize_with = "lenient")]
    total_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    npc: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    solo: Option<bool>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decodes wire packages, stamping and scaling as it goes
#[derive(Clone)]
pub struct KillDecoder {
    scaler: Arc<dyn Scaler>,
    clock: Arc<dyn Clock>,
}

impl KillDecoder {
    pub fn new(scaler: Arc<dyn Scaler>, clock: Arc<dyn Clock>) -> Self {
        Self { scaler, clock }
    }

    /// Decode one package. Fails only on missing identity fields.
    pub fn decode(&self, raw: serde_json::Value) -> Result<KillRecord> {
        let package: WirePackage = serde_json::from_value(raw)
            .map_err(|e| Error::malformed("package", e.to_string()))?;

        let kill = package.killmail.unwrap_or(package.inline);
        let market = package.zkb.unwrap_or_default();

        let id = kill
            .killmail_id
            .ok_or_else(|| Error::malformed("killmail_id", "absent"))?;
        let time = kill
            .killmail_time
            .ok_or_else(|| Error::malformed("killmail_time", "absent"))?;
        let occurred_at = DateTime::parse_from_rfc3339(&time)
            .map_err(|e| Error::malformed("killmail_time", format!("{}: {:?}", e, time)))?
            .with_timezone(&Utc);
        let location_id = kill
            .solar_system_id
            .ok_or_else(|| Error::malformed("solar_system_id", "absent"))?;
        let victim = kill
            .victim
            .ok_or_else(|| Error::malformed("victim", "absent"))?;
        let actor_id = victim
            .character_id
            .ok_or_else(|| Error::malformed("victim.character_id", "absent"))?;
        let group_id = victim
            .corporation_id
            .ok_or_else(|| Error::malformed("victim.corporation_id", "absent"))?;
        let category_id = victim
            .ship_type_id
            .ok_or_else(|| Error::malformed("victim.ship_type_id", "absent"))?;

        let raw_value = market.total_value.unwrap_or(0.0).max(0.0);

        Ok(KillRecord {
            id,
            occurred_at,
            received_at: self.clock.now(),
            actor_id,
            group_id,
            alliance_id: victim.alliance_id,
            category_id,
            location_id,
            position: victim.position,
            reference_url: market.url.unwrap_or_else(|| default_reference_url(id)),
            raw_value,
            scaled_value: self.scaler.scale(raw_value),
            npc: market.npc.unwrap_or(false),
            solo: market.solo.unwrap_or(false),
        })
    }
}
