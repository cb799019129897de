//! Money in and out for a calendar month, overall and per category.

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
use serde::Serialize;

use crate::{
    AppState, Error,
    auth::UserID,
    category::category_names,
    database_id::CategoryId,
    period::{MonthQuery, MonthWindow},
    timezone::local_today,
    transaction::{Direction, Transaction, get_transactions_in_range},
};

/// The label for transactions without a known category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// The total income, expenses and their difference.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CashFlowSummary {
    /// The sum of income amounts.
    pub income: Decimal,
    /// The sum of expense amounts.
    pub expenses: Decimal,
    /// `income - expenses`.
    pub net: Decimal,
}

impl CashFlowSummary {
    fn add(&mut self, transaction: &Transaction) {
        match transaction.direction {
            Direction::Income => self.income = self.income.saturating_add(transaction.amount),
            Direction::Expense => {
                self.expenses = self.expenses.saturating_add(transaction.amount)
            }
        }
        self.net = self.income.saturating_sub(self.expenses);
    }
}

/// The cash flow of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCashFlow {
    /// The ID of the category, `None` for uncategorized transactions.
    pub category_id: Option<CategoryId>,
    /// The name of the category.
    pub category_name: String,
    /// The category's income, expenses and net.
    #[serde(flatten)]
    pub summary: CashFlowSummary,
}

/// The data shown on the cash flow page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowPage {
    /// The calendar year.
    pub year: i32,
    /// The month number, 1 to 12.
    pub month: u8,
    /// The month's totals.
    pub summary: CashFlowSummary,
    /// The month's totals per category.
    pub category_summary: Vec<CategoryCashFlow>,
    /// The month's transactions, newest first.
    pub transactions: Vec<Transaction>,
}

/// Sum the income and expenses of `transactions`.
pub fn monthly_cash_flow_summary(transactions: &[Transaction]) -> CashFlowSummary {
    let mut summary = CashFlowSummary::default();

    for transaction in transactions {
        summary.add(transaction);
    }

    summary
}

/// Sum the income and expenses of `transactions` per category.
///
/// Categories missing from `names` are counted as uncategorized. Named categories are sorted by
/// name and the uncategorized row comes last.
pub fn category_cash_flow(
    transactions: &[Transaction],
    names: &HashMap<CategoryId, String>,
) -> Vec<CategoryCashFlow> {
    let mut by_category: BTreeMap<(String, CategoryId), CashFlowSummary> = BTreeMap::new();
    let mut uncategorized: Option<CashFlowSummary> = None;

    for transaction in transactions {
        let named = transaction
            .category_id
            .and_then(|id| names.get(&id).map(|name| (name.clone(), id)));

        let summary = match named {
            Some(key) => by_category.entry(key).or_default(),
            None => uncategorized.get_or_insert_with(CashFlowSummary::default),
        };
        summary.add(transaction);
    }

    let mut rows: Vec<CategoryCashFlow> = by_category
        .into_iter()
        .map(|((category_name, category_id), summary)| CategoryCashFlow {
            category_id: Some(category_id),
            category_name,
            summary,
        })
        .collect();

    if let Some(summary) = uncategorized {
        rows.push(CategoryCashFlow {
            category_id: None,
            category_name: UNCATEGORIZED_LABEL.to_owned(),
            summary,
        });
    }

    rows
}

/// Sum the user's income and expenses for the month.
pub fn monthly_cash_flow(
    user_id: UserID,
    window: MonthWindow,
    connection: &Connection,
) -> Result<CashFlowSummary, Error> {
    let transactions =
        get_transactions_in_range(user_id, window.start()?, window.end()?, connection)?;

    Ok(monthly_cash_flow_summary(&transactions))
}

/// Build the cash flow page for the user's transactions in `window`.
pub fn get_cash_flow_page(
    user_id: UserID,
    window: MonthWindow,
    connection: &Connection,
) -> Result<CashFlowPage, Error> {
    let transactions =
        get_transactions_in_range(user_id, window.start()?, window.end()?, connection)?;
    let names = category_names(user_id, connection)?;

    Ok(CashFlowPage {
        year: window.year,
        month: window.month_number(),
        summary: monthly_cash_flow_summary(&transactions),
        category_summary: category_cash_flow(&transactions, &names),
        transactions,
    })
}

/// The state needed by the cash flow page.
#[derive(Debug, Clone)]
pub struct CashFlowState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for CashFlowState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler that returns the cash flow page for the requested month.
pub async fn get_cash_flow_endpoint(
    State(state): State<CashFlowState>,
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

    match get_cash_flow_page(user_id, window, &connection) {
        Ok(page) => Json(page).into_response(),
        Err(error) => error.into_response(),
    }
}
