//! Value scaling collaborators
//!
//! A scaler turns a raw ISK value into a retention multiplier. The only
//! contract is monotonic and bounded away from zero; a zero multiplier would
//! evict a record on the first sweep.

/// Maps a non-negative raw value to a positive retention multiplier
pub trait Scaler: Send + Sync {
    fn scale(&self, raw_value: f64) -> f64;
}

/// `floor + ln(1 + raw / pivot)`
///
/// Cheap kills sit at the floor; every e-fold of value above the pivot adds
/// one unit of base retention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScaler {
    pub floor: f64,
    pub pivot: f64,
}

impl LogScaler {
    pub fn new(floor: f64, pivot: f64) -> Self {
        Self { floor, pivot }
    }
}

impl Default for LogScaler {
    fn default() -> Self {
        Self {
            floor: 1.0,
            pivot: 10_000_000.0,
        }
    }
}

impl Scaler for LogScaler {
    fn scale(&self, raw_value: f64) -> f64 {
        // NaN and negatives are treated as zero value
        let raw = if raw_value.is_finite() { raw_value.max(0.0) } else { 0.0 };
        self.floor + (raw / self.pivot).ln_1p()
    }
}

/// Same multiplier for every value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScaler(pub f64);

impl Scaler for ConstantScaler {
    fn scale(&self, _raw_value: f64) -> f64 {
        self.0
    }
}

impl<F> Scaler for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn scale(&self, raw_value: f64) -> f64 {
        self(raw_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_scaler_floor() {
        let scaler = LogScaler::default();
        assert_eq!(scaler.scale(0.0), 1.0);
        assert_eq!(scaler.scale(-5.0), 1.0);
        assert_eq!(scaler.scale(f64::NAN), 1.0);
    }

    #[test]
    fn test_log_scaler_monotonic() {
        let scaler = LogScaler::default();
        let values = [0.0, 1.0, 1e6, 1e8, 1e10, 1e12];
        for pair in values.windows(2) {
            assert!(scaler.scale(pair[0]) <= scaler.scale(pair[1]));
        }
        assert!(scaler.scale(1e10) > 5.0);
    }

    #[test]
    fn test_closure_scaler() {
        let doubled = |v: f64| v * 2.0;
        assert_eq!(doubled.scale(3.0), 6.0);
    }
}
