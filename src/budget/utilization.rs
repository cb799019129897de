//! Comparing actual spending with planned budgets.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::money::{as_f64, percentage, ratio, round_2dp};

/// How close a category is to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtilizationStatus {
    /// The category has no budget.
    NoBudget,
    /// At least 100% of the budget has been spent.
    OverBudget,
    /// At least 90% of the budget has been spent.
    Warning,
    /// At least 70% of the budget has been spent.
    Moderate,
    /// Less than 70% of the budget has been spent.
    Healthy,
}

/// The fraction of `planned` that has been spent, clamped to [0, 1].
///
/// Zero when there is no budget.
pub fn category_utilization(planned: Decimal, actual: Decimal) -> f64 {
    if planned <= Decimal::ZERO {
        return 0.0;
    }

    let fraction = as_f64(ratio(actual, planned));
    if fraction <= 0.0 { 0.0 } else { fraction.min(1.0) }
}

/// `actual` as an unclamped percentage of `planned`, zero when there is no budget.
pub fn utilization_percentage(planned: Decimal, actual: Decimal) -> f64 {
    if planned <= Decimal::ZERO {
        return 0.0;
    }

    as_f64(percentage(actual, planned))
}

/// Classify spending against a budget.
pub fn utilization_status(planned: Decimal, actual: Decimal) -> UtilizationStatus {
    if planned <= Decimal::ZERO {
        return UtilizationStatus::NoBudget;
    }

    match utilization_percentage(planned, actual) {
        spent if spent >= 100.0 => UtilizationStatus::OverBudget,
        spent if spent >= 90.0 => UtilizationStatus::Warning,
        spent if spent >= 70.0 => UtilizationStatus::Moderate,
        _ => UtilizationStatus::Healthy,
    }
}

/// Score overall budget health from 100 (nothing spent) down to 0 (twice the budget spent).
///
/// `budgets` holds the planned and actual amount of each category. Every category is averaged,
/// with categories that have no budget counting as 0%. The score is 100 when there are no
/// categories.
pub fn health_score(budgets: &[(Decimal, Decimal)]) -> f64 {
    if budgets.is_empty() {
        return 100.0;
    }

    let total: f64 = budgets
        .iter()
        .map(|(planned, actual)| round_2dp(utilization_percentage(*planned, *actual)))
        .sum();
    let average = total / budgets.len() as f64;

    round_2dp((100.0 - average / 2.0).max(0.0))
}
