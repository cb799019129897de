//! The budget page: every category's planned budget and actual spending for a month.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    AppState, Error,
    auth::UserID,
    budget::{
        CategoryKey, UtilizationStatus, aggregate_actual_by_category, category_utilization,
        health_score, utilization_percentage, utilization_status,
    },
    category::{Category, list_categories},
    database_id::CategoryId,
    group::Color,
    money::{round_2dp, sum_amounts},
    period::{MonthQuery, MonthWindow},
    timezone::local_today,
    transaction::{Direction, Transaction, get_transactions_in_range},
};

/// The state needed by the budget page.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for reading categories and transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// One category's budget for the month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBudgetRow {
    /// The ID of the category.
    pub category_id: CategoryId,
    /// The name of the category.
    pub name: String,
    /// The color of the category.
    pub color: Color,
    /// The category's monthly budget.
    pub planned: Decimal,
    /// The amount spent in the category this month.
    pub actual: Decimal,
    /// `planned - actual`, negative when over budget.
    pub remaining: Decimal,
    /// The fraction of the budget spent, between 0 and 1.
    pub utilization: f64,
    /// The unclamped percentage of the budget spent, rounded to two decimal places.
    pub utilization_percentage: f64,
    /// How close the category is to its budget.
    pub status: UtilizationStatus,
    /// Whether more than the budget has been spent.
    pub is_over_budget: bool,
}

/// The budget totals across all categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetTotals {
    /// The sum of the monthly budgets.
    pub total_planned: Decimal,
    /// The sum of the amounts spent in categories.
    pub total_actual: Decimal,
    /// `total_planned - total_actual`.
    pub total_remaining: Decimal,
    /// `total_actual` as a percentage of `total_planned`, rounded to two decimal places.
    pub utilization_percentage: f64,
}

/// The data shown on the budget page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetPage {
    /// The calendar year.
    pub year: i32,
    /// The month number, 1 to 12.
    pub month: u8,
    /// One row per category, ordered by name.
    pub categories: Vec<CategoryBudgetRow>,
    /// The totals across all categories.
    pub totals: BudgetTotals,
    /// Overall budget health from 0 to 100.
    pub health_score: f64,
    /// The categories that are over budget, largest spend first.
    pub over_budget: Vec<CategoryBudgetRow>,
}

/// The planned and actual spending for a month across all categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    /// The sum of the monthly budgets.
    pub planned: Decimal,
    /// The amount spent during the month.
    pub actual: Decimal,
    /// The fraction of the budget spent, between 0 and 1.
    pub utilization: f64,
}

/// Build the budget page for `window` from the user's categories (ordered by name) and
/// transactions.
///
/// Only expenses count towards actual spending.
pub fn build_budget_page(
    window: MonthWindow,
    categories: &[Category],
    transactions: &[Transaction],
) -> BudgetPage {
    let expenses = expenses(transactions);
    let actual_by_category = aggregate_actual_by_category(&expenses, window.year, window.month);

    let rows: Vec<CategoryBudgetRow> = categories
        .iter()
        .map(|category| {
            let planned = category.monthly_budget;
            let actual = actual_by_category
                .get(&CategoryKey::Category(category.id))
                .copied()
                .unwrap_or(Decimal::ZERO);

            CategoryBudgetRow {
                category_id: category.id,
                name: category.name.clone(),
                color: category.color,
                planned,
                actual,
                remaining: planned.saturating_sub(actual),
                utilization: category_utilization(planned, actual),
                utilization_percentage: round_2dp(utilization_percentage(planned, actual)),
                status: utilization_status(planned, actual),
                is_over_budget: actual > planned,
            }
        })
        .collect();

    let total_planned = sum_amounts(rows.iter().map(|row| row.planned));
    let total_actual = sum_amounts(rows.iter().map(|row| row.actual));
    let budgets: Vec<(Decimal, Decimal)> =
        rows.iter().map(|row| (row.planned, row.actual)).collect();

    let mut over_budget: Vec<CategoryBudgetRow> =
        rows.iter().filter(|row| row.is_over_budget).cloned().collect();
    over_budget.sort_by(|a, b| b.actual.cmp(&a.actual));

    BudgetPage {
        year: window.year,
        month: window.month_number(),
        totals: BudgetTotals {
            total_planned,
            total_actual,
            total_remaining: total_planned.saturating_sub(total_actual),
            utilization_percentage: round_2dp(utilization_percentage(total_planned, total_actual)),
        },
        health_score: health_score(&budgets),
        categories: rows,
        over_budget,
    }
}

fn expenses(transactions: &[Transaction]) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|transaction| transaction.direction == Direction::Expense)
        .cloned()
        .collect()
}

/// Summarise the month's spending against the sum of all category budgets.
pub fn monthly_budget_summary(
    user_id: UserID,
    window: MonthWindow,
    connection: &Connection,
) -> Result<BudgetSummary, Error> {
    let planned = sum_amounts(
        list_categories(user_id, connection)?
            .iter()
            .map(|category| category.monthly_budget),
    );
    let actual = sum_amounts(
        get_transactions_in_range(user_id, window.start()?, window.end()?, connection)?
            .iter()
            .filter(|transaction| transaction.direction == Direction::Expense)
            .map(|transaction| transaction.amount),
    );

    Ok(BudgetSummary {
        planned,
        actual,
        utilization: category_utilization(planned, actual),
    })
}

/// A route handler that returns the budget page for the requested month.
///
/// The month defaults to the current month in the server's timezone.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let window = match local_today(&state.local_timezone)
        .and_then(|today| MonthWindow::from_query(query, today))
    {
        Ok(window) => window,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let page = (|| {
        let categories = list_categories(user_id, &connection)?;
        let transactions =
            get_transactions_in_range(user_id, window.start()?, window.end()?, &connection)?;

        Ok::<_, Error>(build_budget_page(window, &categories, &transactions))
    })();

    match page {
        Ok(page) => Json(page).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use time::{Month, macros::date};

    use crate::{
        account::AccountDetails,
        budget::UtilizationStatus,
        category::{NewCategory, create_category},
        endpoints,
        group::{Color, create_group},
        period::MonthWindow,
        test_utils::{
            get_test_connection, get_test_server, get_test_state, insert_test_account,
            insert_test_user,
        },
        transaction::{Direction, Transaction, create_transaction},
    };

    use super::{build_budget_page, get_budget_endpoint, monthly_budget_summary};

    #[test]
    fn page_compares_spending_with_budgets() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let group = create_group(user.id, "Living", Color::Green, &conn).unwrap();
        let account = insert_test_account(
            user.id,
            AccountDetails::CashAccount {
                subtype: "checking".to_owned(),
                account_number: None,
                balance: Decimal::ZERO,
            },
            &conn,
        )
        .accountable();
        let mut categories = Vec::new();
        for (name, budget) in [("Dining", 100), ("Groceries", 400), ("Gifts", 0)] {
            categories.push(
                create_category(
                    user.id,
                    &NewCategory {
                        group_id: group.id,
                        name: name.to_owned(),
                        color: Color::Blue,
                        monthly_budget: Decimal::new(budget, 0),
                    },
                    &conn,
                )
                .unwrap(),
            );
        }
        let spend = |category_id, amount, direction| {
            create_transaction(
                user.id,
                Transaction::build(account, Decimal::new(amount, 0), date!(2025 - 06 - 10), "x", direction)
                    .category_id(Some(category_id)),
                &conn,
            )
            .unwrap()
        };
        let transactions = vec![
            spend(categories[0].id, 120, Direction::Expense),
            spend(categories[1].id, 100, Direction::Expense),
            spend(categories[1].id, 999, Direction::Income),
        ];

        let page = build_budget_page(
            MonthWindow {
                year: 2025,
                month: Month::June,
            },
            &categories,
            &transactions,
        );

        assert_eq!(page.month, 6);
        let dining = &page.categories[0];
        assert_eq!(dining.actual, Decimal::new(120, 0));
        assert_eq!(dining.remaining, Decimal::new(-20, 0));
        assert_eq!(dining.utilization, 1.0);
        assert_eq!(dining.utilization_percentage, 120.0);
        assert_eq!(dining.status, UtilizationStatus::OverBudget);
        let groceries = &page.categories[1];
        assert_eq!(groceries.actual, Decimal::new(100, 0));
        assert_eq!(groceries.status, UtilizationStatus::Healthy);
        assert_eq!(page.categories[2].status, UtilizationStatus::NoBudget);
        assert_eq!(page.totals.total_planned, Decimal::new(500, 0));
        assert_eq!(page.totals.total_actual, Decimal::new(220, 0));
        assert_eq!(page.totals.utilization_percentage, 44.0);
        // Average of 120%, 25% and 0%.
        assert_eq!(page.health_score, 75.83);
        assert_eq!(page.over_budget.len(), 1);
        assert_eq!(page.over_budget[0].name, "Dining");

        let summary = monthly_budget_summary(
            user.id,
            MonthWindow {
                year: 2025,
                month: Month::June,
            },
            &conn,
        )
        .unwrap();
        assert_eq!(summary.planned, Decimal::new(500, 0));
        assert_eq!(summary.actual, Decimal::new(220, 0));
        assert_eq!(summary.utilization, 0.44);
    }

    #[tokio::test]
    async fn endpoint_returns_requested_month() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(
            Router::new().route(endpoints::BUDGET, get(get_budget_endpoint)),
            state,
            user.id,
        );

        let page = server
            .get(endpoints::BUDGET)
            .add_query_param("year", 2024)
            .add_query_param("month", 2)
            .await
            .json::<Value>();

        assert_eq!(page["year"], 2024);
        assert_eq!(page["month"], 2);
        assert_eq!(page["health_score"], 100.0);
    }

    #[tokio::test]
    async fn invalid_month_is_rejected() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(
            Router::new().route(endpoints::BUDGET, get(get_budget_endpoint)),
            state,
            user.id,
        );

        server
            .get(endpoints::BUDGET)
            .add_query_param("month", 13)
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn tiny_budget_does_not_break_the_page() {
        let state = get_test_state();
        let user = {
            let conn = state.db_connection.lock().unwrap();
            let user = insert_test_user(&conn);
            let group = create_group(user.id, "Living", Color::Green, &conn).unwrap();
            let category = create_category(
                user.id,
                &NewCategory {
                    group_id: group.id,
                    name: "Dining".to_owned(),
                    color: Color::Blue,
                    monthly_budget: Decimal::new(1, 28),
                },
                &conn,
            )
            .unwrap();
            let account = insert_test_account(
                user.id,
                AccountDetails::CashAccount {
                    subtype: "checking".to_owned(),
                    account_number: None,
                    balance: Decimal::ZERO,
                },
                &conn,
            )
            .accountable();
            create_transaction(
                user.id,
                Transaction::build(
                    account,
                    Decimal::TEN,
                    date!(2025 - 06 - 10),
                    "Dinner",
                    Direction::Expense,
                )
                .category_id(Some(category.id)),
                &conn,
            )
            .unwrap();
            user
        };
        let server = get_test_server(
            Router::new().route(endpoints::BUDGET, get(get_budget_endpoint)),
            state.clone(),
            user.id,
        );

        let response = server
            .get(endpoints::BUDGET)
            .add_query_param("year", 2025)
            .add_query_param("month", 6)
            .await;

        response.assert_status_ok();
        let page = response.json::<Value>();
        assert_eq!(page["categories"][0]["status"], "over-budget");
        assert_eq!(page["categories"][0]["utilization"], 1.0);
        assert_eq!(page["health_score"], 0.0);
        assert!(state.db_connection.lock().is_ok());
    }
}
