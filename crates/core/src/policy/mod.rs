//! Threshold policy deciding between a human review and auto-approval.
//!
//! Rules are checked in order and the first match wins:
//! 1. `|diff| > absolute` requires review.
//! 2. `|diff| * 100 / max(|past|, |total|) > percent` requires review. The
//!    rule is skipped when both past and total are zero.
//! 3. Anything else is auto-approved.

use rust_decimal::Decimal;

use crate::domain::decision::{ThresholdBreach, ThresholdDecision};
use crate::domain::event::CostFigures;
use crate::domain::thresholds::Thresholds;

pub trait ThresholdPolicy: Send + Sync {
    fn evaluate(&self, figures: &CostFigures, thresholds: &Thresholds) -> ThresholdDecision;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicThresholdPolicy;

impl ThresholdPolicy for DeterministicThresholdPolicy {
    fn evaluate(&self, figures: &CostFigures, thresholds: &Thresholds) -> ThresholdDecision {
        evaluate(figures.diff, figures.past, figures.total, thresholds)
    }
}

pub fn evaluate(
    diff: Decimal,
    past: Decimal,
    total: Decimal,
    thresholds: &Thresholds,
) -> ThresholdDecision {
    if diff.abs() > thresholds.absolute {
        return ThresholdDecision::Notify(ThresholdBreach::Absolute);
    }

    let base = past.abs().max(total.abs());
    if !base.is_zero() && exceeds_percent(diff.abs(), base, thresholds.percent) {
        return ThresholdDecision::Notify(ThresholdBreach::Percent);
    }

    ThresholdDecision::AutoApprove
}

/// `magnitude * 100 > percent * base`, compared without dividing.
fn exceeds_percent(magnitude: Decimal, base: Decimal, percent: Decimal) -> bool {
    match (magnitude.checked_mul(Decimal::ONE_HUNDRED), percent.checked_mul(base)) {
        (Some(scaled), Some(limit)) => scaled > limit,
        (None, Some(_)) => true,
        (Some(_), None) => false,
        // Both sides beyond `Decimal::MAX`; only the ratio is representable.
        (None, None) => change_percent(magnitude, base, base).is_some_and(|ratio| ratio > percent),
    }
}

/// Size of the change relative to the larger of the two totals, by magnitude.
/// Rounded to 28 significant digits, so it is for display only.
///
/// Returns `None` when there is no base to compare against. A ratio too large
/// to represent saturates to `Decimal::MAX`.
pub fn change_percent(diff: Decimal, past: Decimal, total: Decimal) -> Option<Decimal> {
    let base = past.abs().max(total.abs());
    if base.is_zero() {
        return None;
    }

    let percent = diff
        .abs()
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::MAX);
    Some(percent)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{change_percent, evaluate, DeterministicThresholdPolicy, ThresholdPolicy};
    use crate::domain::decision::{ThresholdBreach, ThresholdDecision};
    use crate::domain::event::CostFigures;
    use crate::domain::thresholds::Thresholds;

    fn d(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn thresholds(absolute: i64, percent: i64) -> Thresholds {
        Thresholds::new(d(absolute), d(percent))
    }

    #[test]
    fn absolute_breach_notifies() {
        let decision = evaluate(d(150), d(1000), d(1100), &thresholds(100, 50));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Absolute));
    }

    #[test]
    fn percent_breach_notifies_when_absolute_is_within_limit() {
        // 40 * 100 / 1040 ~= 3.85
        let decision = evaluate(d(40), d(1000), d(1040), &thresholds(100, 3));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Percent));
    }

    #[test]
    fn small_change_is_auto_approved() {
        let decision = evaluate(d(5), d(1000), d(1005), &thresholds(100, 10));
        assert_eq!(decision, ThresholdDecision::AutoApprove);
    }

    #[test]
    fn zero_base_skips_percent_rule() {
        let decision = evaluate(d(0), d(0), d(0), &thresholds(10, 5));
        assert_eq!(decision, ThresholdDecision::AutoApprove);
        assert_eq!(change_percent(d(7), d(0), d(0)), None);

        // 7 <= 10 and no base: still auto-approved even with a zero percent limit.
        let decision = evaluate(d(7), d(0), d(0), &thresholds(10, 0));
        assert_eq!(decision, ThresholdDecision::AutoApprove);
    }

    #[test]
    fn absolute_rule_wins_over_percent_rule() {
        let decision = evaluate(d(-500), d(1000), d(500), &thresholds(100, 1));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Absolute));
    }

    #[test]
    fn limits_are_exclusive() {
        let at_absolute = evaluate(d(100), d(0), d(0), &thresholds(100, 0));
        assert_eq!(at_absolute, ThresholdDecision::AutoApprove);

        // 3 * 100 / 100 == 3 is not above 3
        let at_percent = evaluate(d(3), d(97), d(100), &thresholds(100, 3));
        assert_eq!(at_percent, ThresholdDecision::AutoApprove);
    }

    #[test]
    fn base_is_chosen_by_magnitude_not_sign() {
        // max by raw value would be 10 (-> 50%), by magnitude it is 1000 (-> 0.5%).
        let decision = evaluate(d(5), d(-1000), d(10), &thresholds(100, 10));
        assert_eq!(decision, ThresholdDecision::AutoApprove);
        assert_eq!(change_percent(d(5), d(-1000), d(10)), Some(Decimal::new(5, 1)));
    }

    #[test]
    fn negative_diff_is_compared_by_magnitude() {
        let decision = evaluate(d(-40), d(1040), d(1000), &thresholds(100, 3));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Percent));
    }

    #[test]
    fn tiny_base_saturates_instead_of_overflowing() {
        let tiny = Decimal::new(1, 28);
        assert_eq!(change_percent(d(50), tiny, tiny), Some(Decimal::MAX));
        let decision = evaluate(d(50), tiny, tiny, &thresholds(100, 100));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Percent));
    }

    #[test]
    fn percent_limit_with_many_digits_is_compared_exactly() {
        // 1 * 100 / 3 = 33.33.. recurring, which is above the 26-decimal limit.
        let limit = "33.33333333333333333333333333".parse::<Decimal>().expect("decimal");
        let decision = evaluate(d(1), d(3), d(3), &Thresholds::new(d(100), limit));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Percent));

        let above = "33.33333333333333333333333334".parse::<Decimal>().expect("decimal");
        let decision = evaluate(d(1), d(3), d(3), &Thresholds::new(d(100), above));
        assert_eq!(decision, ThresholdDecision::AutoApprove);
    }

    #[test]
    fn huge_figures_still_decide_without_overflow() {
        let huge = Decimal::MAX;
        let decision = evaluate(huge, huge, huge, &Thresholds::new(huge, d(100)));
        assert_eq!(decision, ThresholdDecision::AutoApprove);

        let decision = evaluate(huge, huge, huge, &Thresholds::new(huge, d(99)));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Percent));
    }

    #[test]
    fn deterministic_policy_delegates_to_rules() {
        let figures = CostFigures { total: d(1040), past: d(1000), diff: d(40) };
        let decision = DeterministicThresholdPolicy.evaluate(&figures, &thresholds(100, 3));
        assert_eq!(decision, ThresholdDecision::Notify(ThresholdBreach::Percent));
    }
}
