use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Limits above which a cost change needs a human reviewer.
///
/// `absolute` is in currency units, `percent` is on a 0..=100 scale. Both are
/// loaded once at startup and never mutated afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub absolute: Decimal,
    pub percent: Decimal,
}

impl Thresholds {
    pub fn new(absolute: Decimal, percent: Decimal) -> Self {
        Self { absolute, percent }
    }
}

impl Default for Thresholds {
    /// Zero limits route every non-zero change to a reviewer.
    fn default() -> Self {
        Self { absolute: Decimal::ZERO, percent: Decimal::ZERO }
    }
}
