//! The dashboard: net worth, this month's budget and cash flow, and the most urgent goals.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    AppState, Error,
    account::{AccountDetails, AccountKind, list_accounts},
    auth::UserID,
    budget::{BudgetSummary, monthly_budget_summary},
    cash_flow::{CashFlowSummary, monthly_cash_flow},
    goal::{GoalView, top_goals},
    period::MonthWindow,
    timezone::local_today,
};

/// The number of goals shown on the dashboard.
const DASHBOARD_GOAL_COUNT: u32 = 3;

/// The state needed for displaying the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading accounts, budgets and goals.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// What the user owns and owes.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct NetWorth {
    /// The sum of cash account balances.
    pub assets: Decimal,
    /// The sum of credit card balances and remaining loan balances.
    pub liabilities: Decimal,
    /// `assets - liabilities`.
    pub net: Decimal,
}

/// The data shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// What the user owns and owes.
    pub net_worth: NetWorth,
    /// This month's spending against the budget.
    pub budget_summary: BudgetSummary,
    /// This month's income and expenses.
    pub cash_flow_summary: CashFlowSummary,
    /// The goals due soonest.
    pub goals: Vec<GoalView>,
}

/// Sum the balances of the user's accounts.
pub fn get_net_worth(user_id: UserID, connection: &Connection) -> Result<NetWorth, Error> {
    let mut net_worth = NetWorth::default();

    for kind in AccountKind::ALL {
        for account in list_accounts(kind, user_id, connection)? {
            match account.details {
                AccountDetails::CashAccount { balance, .. } => {
                    net_worth.assets = net_worth.assets.saturating_add(balance)
                }
                AccountDetails::CreditCard { balance, .. } => {
                    net_worth.liabilities = net_worth.liabilities.saturating_add(balance)
                }
                AccountDetails::Loan {
                    remaining_balance, ..
                } => {
                    net_worth.liabilities = net_worth.liabilities.saturating_add(remaining_balance)
                }
            }
        }
    }

    net_worth.net = net_worth.assets.saturating_sub(net_worth.liabilities);

    Ok(net_worth)
}

/// Gather the dashboard for the month `window`.
pub fn get_dashboard(
    user_id: UserID,
    window: MonthWindow,
    connection: &Connection,
) -> Result<Dashboard, Error> {
    Ok(Dashboard {
        net_worth: get_net_worth(user_id, connection)?,
        budget_summary: monthly_budget_summary(user_id, window, connection)?,
        cash_flow_summary: monthly_cash_flow(user_id, window, connection)?,
        goals: top_goals(user_id, DASHBOARD_GOAL_COUNT, connection)?
            .into_iter()
            .map(GoalView::from)
            .collect(),
    })
}

/// A route handler that returns the dashboard for the current month.
pub async fn get_dashboard_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let window = match local_today(&state.local_timezone) {
        Ok(today) => MonthWindow::containing(today),
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_dashboard(user_id, window, &connection) {
        Ok(dashboard) => Json(dashboard).into_response(),
        Err(error) => error.into_response(),
    }
}
