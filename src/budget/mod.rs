//! Monthly budgets: actual spending per category compared with each category's planned budget.

mod aggregation;
mod page;
mod utilization;

pub use aggregation::{CategoryKey, aggregate_actual_by_category};
pub use page::{BudgetSummary, get_budget_endpoint, monthly_budget_summary};
pub use utilization::{
    UtilizationStatus, category_utilization, health_score, utilization_percentage,
    utilization_status,
};
