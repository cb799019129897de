//! Reports over a date range: the monthly income and expense trend, top spending categories
//! and summary statistics.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error, FieldErrors,
    auth::UserID,
    category::{Category, list_categories},
    database_id::CategoryId,
    group::Color,
    money::{as_f64, percentage, ratio, round_2dp, sum_amounts},
    period::MonthWindow,
    timezone::local_today,
    transaction::{Direction, Transaction, get_transactions_in_range},
};

/// The number of months before the current month that reports cover by default.
const DEFAULT_REPORT_MONTHS: u32 = 6;
/// The number of categories in the spending breakdown.
const TOP_CATEGORY_COUNT: usize = 10;

/// The query parameters for the reports endpoint.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct ReportQuery {
    /// The first day of the report, inclusive.
    pub start_date: Option<Date>,
    /// The last day of the report, inclusive.
    pub end_date: Option<Date>,
}

/// The income and expenses of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    /// The month formatted as "YYYY-MM".
    pub month: String,
    /// The sum of income amounts.
    pub income: Decimal,
    /// The sum of expense amounts.
    pub expenses: Decimal,
    /// `income - expenses`.
    pub net: Decimal,
}

/// The total spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    /// The ID of the category.
    pub category_id: CategoryId,
    /// The name of the category.
    pub category: String,
    /// The color of the category.
    pub color: Color,
    /// The sum of the category's expenses.
    pub total: Decimal,
}

/// Summary statistics for the report range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    /// The sum of income amounts.
    pub total_income: Decimal,
    /// The sum of expense amounts.
    pub total_expenses: Decimal,
    /// `total_income - total_expenses`.
    pub net_savings: Decimal,
    /// The average income of the months with transactions.
    pub average_monthly_income: Decimal,
    /// The average expenses of the months with transactions.
    pub average_monthly_expenses: Decimal,
    /// Net savings as a percentage of income, zero without income.
    pub savings_rate: f64,
}

/// The date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportFilters {
    /// The first day of the report.
    pub start_date: Date,
    /// The last day of the report.
    pub end_date: Date,
}

/// The data shown on the reports page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Income and expenses per month, oldest first.
    pub monthly_trend: Vec<MonthlyTrend>,
    /// The categories with the most spending, largest first.
    pub category_breakdown: Vec<CategorySpending>,
    /// Totals and averages over the range.
    pub summary: ReportSummary,
    /// The date range of the report.
    pub filters: ReportFilters,
}

/// Resolve the report range, defaulting to the start of the month six months ago through the
/// end of the current month.
///
/// # Errors
/// Returns a validation error if the start date is after the end date.
pub fn resolve_report_range(query: ReportQuery, today: Date) -> Result<ReportFilters, Error> {
    let current_month = MonthWindow::containing(today);
    let start_date = match query.start_date {
        Some(date) => date,
        None => current_month.months_before(DEFAULT_REPORT_MONTHS).start()?,
    };
    let end_date = match query.end_date {
        Some(date) => date,
        None => current_month.end()?,
    };

    if start_date > end_date {
        return Err(FieldErrors::single(
            "start_date",
            "The start date must be on or before the end date.",
        ));
    }

    Ok(ReportFilters {
        start_date,
        end_date,
    })
}

/// Sum income and expenses per calendar month, oldest month first.
///
/// Months without transactions are left out.
pub fn monthly_trend(transactions: &[Transaction]) -> Vec<MonthlyTrend> {
    let mut months: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();

    for transaction in transactions {
        let (income, expenses) = months
            .entry(MonthWindow::containing(transaction.date).label())
            .or_default();

        match transaction.direction {
            Direction::Income => *income = income.saturating_add(transaction.amount),
            Direction::Expense => *expenses = expenses.saturating_add(transaction.amount),
        }
    }

    months
        .into_iter()
        .map(|(month, (income, expenses))| MonthlyTrend {
            month,
            income,
            expenses,
            net: income.saturating_sub(expenses),
        })
        .collect()
}

/// The categories with the largest expense totals, largest first.
///
/// Uncategorized expenses are left out.
pub fn category_breakdown(
    transactions: &[Transaction],
    categories: &[Category],
) -> Vec<CategorySpending> {
    let mut totals: HashMap<CategoryId, Decimal> = HashMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.direction == Direction::Expense)
    {
        if let Some(category_id) = transaction.category_id {
            let total = totals.entry(category_id).or_default();
            *total = total.saturating_add(transaction.amount);
        }
    }

    let mut breakdown: Vec<CategorySpending> = totals
        .into_iter()
        .map(|(category_id, total)| {
            let category = categories.iter().find(|category| category.id == category_id);

            CategorySpending {
                category_id,
                category: category
                    .map(|category| category.name.clone())
                    .unwrap_or_else(|| "Unknown".to_owned()),
                color: category.map(|category| category.color).unwrap_or(Color::Gray),
                total,
            }
        })
        .collect();

    breakdown.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    breakdown.truncate(TOP_CATEGORY_COUNT);

    breakdown
}

/// Total and average the income and expenses of the report.
pub fn report_summary(transactions: &[Transaction], trend: &[MonthlyTrend]) -> ReportSummary {
    let total_income = sum_amounts(
        transactions
            .iter()
            .filter(|transaction| transaction.direction == Direction::Income)
            .map(|transaction| transaction.amount),
    );
    let total_expenses = sum_amounts(
        transactions
            .iter()
            .filter(|transaction| transaction.direction == Direction::Expense)
            .map(|transaction| transaction.amount),
    );
    let net_savings = total_income.saturating_sub(total_expenses);

    let (average_monthly_income, average_monthly_expenses) = if trend.is_empty() {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let months = Decimal::from(trend.len());
        let income = sum_amounts(trend.iter().map(|month| month.income));
        let expenses = sum_amounts(trend.iter().map(|month| month.expenses));

        (
            ratio(income, months).round_dp(2),
            ratio(expenses, months).round_dp(2),
        )
    };

    let savings_rate = if total_income > Decimal::ZERO {
        round_2dp(as_f64(percentage(net_savings, total_income)))
    } else {
        0.0
    };

    ReportSummary {
        total_income,
        total_expenses,
        net_savings,
        average_monthly_income,
        average_monthly_expenses,
        savings_rate,
    }
}

/// Build the report for the user's transactions between the dates of `filters`.
pub fn get_report(
    user_id: UserID,
    filters: ReportFilters,
    connection: &Connection,
) -> Result<Report, Error> {
    let transactions =
        get_transactions_in_range(user_id, filters.start_date, filters.end_date, connection)?;
    let categories = list_categories(user_id, connection)?;
    let trend = monthly_trend(&transactions);

    Ok(Report {
        category_breakdown: category_breakdown(&transactions, &categories),
        summary: report_summary(&transactions, &trend),
        monthly_trend: trend,
        filters,
    })
}

/// The state needed by the reports endpoint.
#[derive(Debug, Clone)]
pub struct ReportState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler that returns the report for the requested date range.
pub async fn get_reports_endpoint(
    State(state): State<ReportState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let filters = match local_today(&state.local_timezone)
        .and_then(|today| resolve_report_range(query, today))
    {
        Ok(filters) => filters,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_report(user_id, filters, &connection) {
        Ok(report) => Json(report).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use time::{Date, macros::date};

    use crate::{
        Error,
        account::{AccountKind, Accountable},
        auth::UserID,
        endpoints,
        test_utils::{get_test_server, get_test_state, insert_test_user},
        transaction::{Direction, Transaction},
    };

    use super::{
        ReportQuery, category_breakdown, get_reports_endpoint, monthly_trend, report_summary,
        resolve_report_range,
    };

    fn transaction(
        amount: i64,
        date: Date,
        direction: Direction,
        category_id: Option<i64>,
    ) -> Transaction {
        Transaction {
            id: 0,
            user_id: UserID::new(1),
            account: Accountable::new(AccountKind::CashAccount, 1),
            category_id,
            amount: Decimal::new(amount, 0),
            date,
            name: "test".to_owned(),
            notes: None,
            direction,
            reconciled: false,
            external_id: None,
            merchant_name: None,
            pending: false,
        }
    }

    #[test]
    fn default_range_covers_six_months_back_to_end_of_month() {
        let filters = resolve_report_range(ReportQuery::default(), date!(2025 - 03 - 15)).unwrap();

        assert_eq!(filters.start_date, date!(2024 - 09 - 01));
        assert_eq!(filters.end_date, date!(2025 - 03 - 31));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let query = ReportQuery {
            start_date: Some(date!(2025 - 02 - 01)),
            end_date: Some(date!(2025 - 01 - 01)),
        };

        let result = resolve_report_range(query, date!(2025 - 03 - 15));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn trend_and_summary() {
        let transactions = [
            transaction(2000, date!(2025 - 02 - 01), Direction::Income, None),
            transaction(500, date!(2025 - 02 - 10), Direction::Expense, Some(1)),
            transaction(1000, date!(2025 - 01 - 01), Direction::Income, None),
            transaction(700, date!(2025 - 01 - 15), Direction::Expense, Some(2)),
        ];

        let trend = monthly_trend(&transactions);
        let summary = report_summary(&transactions, &trend);

        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].month, "2025-01");
        assert_eq!(trend[0].net, Decimal::new(300, 0));
        assert_eq!(trend[1].month, "2025-02");
        assert_eq!(trend[1].net, Decimal::new(1500, 0));
        assert_eq!(summary.total_income, Decimal::new(3000, 0));
        assert_eq!(summary.total_expenses, Decimal::new(1200, 0));
        assert_eq!(summary.net_savings, Decimal::new(1800, 0));
        assert_eq!(summary.average_monthly_income, Decimal::new(1500, 0));
        assert_eq!(summary.average_monthly_expenses, Decimal::new(600, 0));
        assert_eq!(summary.savings_rate, 60.0);
    }

    #[test]
    fn savings_rate_is_zero_without_income() {
        let transactions = [transaction(50, date!(2025 - 02 - 10), Direction::Expense, None)];

        let summary = report_summary(&transactions, &monthly_trend(&transactions));

        assert_eq!(summary.savings_rate, 0.0);
        assert_eq!(summary.net_savings, Decimal::new(-50, 0));
    }

    #[test]
    fn breakdown_keeps_top_ten_categorized_expenses() {
        let mut transactions: Vec<Transaction> = (1..=12)
            .map(|id| transaction(id * 10, date!(2025 - 02 - 10), Direction::Expense, Some(id)))
            .collect();
        transactions.push(transaction(10_000, date!(2025 - 02 - 10), Direction::Expense, None));
        transactions.push(transaction(10_000, date!(2025 - 02 - 10), Direction::Income, Some(1)));

        let breakdown = category_breakdown(&transactions, &[]);

        assert_eq!(breakdown.len(), 10);
        assert_eq!(breakdown[0].category_id, 12);
        assert_eq!(breakdown[0].total, Decimal::new(120, 0));
        assert_eq!(breakdown[0].category, "Unknown");
        assert_eq!(breakdown[9].category_id, 3);
    }

    #[tokio::test]
    async fn endpoint_echoes_range() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(
            Router::new().route(endpoints::REPORTS, get(get_reports_endpoint)),
            state,
            user.id,
        );

        let response = server
            .get(endpoints::REPORTS)
            .add_query_param("start_date", "2025-01-01")
            .add_query_param("end_date", "2025-06-30")
            .await;

        response.assert_status(StatusCode::OK);
        let report = response.json::<Value>();
        assert_eq!(report["filters"]["start_date"], "2025-01-01");
        assert_eq!(report["summary"]["savings_rate"], 0.0);
        assert_eq!(report["monthly_trend"], serde_json::json!([]));
    }
}
