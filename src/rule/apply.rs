//! Re-applying an account's rules to its stored transactions.

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, FieldErrors,
    account::{Accountable, account_exists},
    auth::UserID,
    rule::{apply_rules, endpoints::RuleState, get_account_rules},
    transaction::{get_account_transactions, set_name_and_category},
};

/// Which of an account's transactions the rules are applied to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Every transaction, overwriting existing categories.
    All,
    /// Only transactions without a category.
    #[default]
    Uncategorized,
}

/// The body of a request to re-apply rules.
#[derive(Debug, Deserialize)]
pub struct ApplyRulesRequest {
    /// The account whose rules and transactions are used.
    pub account: Accountable,
    /// Which transactions to process.
    #[serde(default)]
    pub mode: ApplyMode,
}

/// Counts describing what re-applying rules changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    /// The number of transactions whose name or category changed.
    pub transactions_updated: usize,
    /// The number of distinct categories that were assigned.
    pub categories_applied: usize,
}

/// A route handler that applies an account's rules to its stored transactions.
pub async fn apply_rules_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<ApplyRulesRequest>,
) -> Response {
    let start_time = std::time::Instant::now();

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match apply_rules_to_account(request.account, request.mode, user_id, &connection) {
        Ok(result) => {
            tracing::info!(
                "Applying rules to {} completed in {}ms: {} transactions updated, {} categories applied",
                request.account,
                start_time.elapsed().as_millis(),
                result.transactions_updated,
                result.categories_applied
            );

            Json(result).into_response()
        }
        Err(error) => {
            tracing::error!(
                "Failed to apply rules to {} after {}ms: {error}",
                request.account,
                start_time.elapsed().as_millis()
            );

            error.into_response()
        }
    }
}

/// Apply the rules of `account` to its transactions in one SQL transaction.
///
/// # Errors
/// Returns a validation error if the account does not belong to `user_id`.
pub fn apply_rules_to_account(
    account: Accountable,
    mode: ApplyMode,
    user_id: UserID,
    connection: &Connection,
) -> Result<ApplyResult, Error> {
    if !account_exists(account, user_id, connection)? {
        return Err(FieldErrors::single(
            "account",
            "The selected account does not exist.",
        ));
    }

    let rules = get_account_rules(account, connection)?;
    if rules.is_empty() {
        return Ok(ApplyResult::default());
    }

    let transactions = get_account_transactions(account, user_id, connection)?;
    let overwrite_category = mode == ApplyMode::All;

    let sql_transaction = connection.unchecked_transaction()?;
    let mut result = ApplyResult::default();
    let mut applied_categories = HashSet::new();

    for transaction in transactions {
        if mode == ApplyMode::Uncategorized && transaction.category_id.is_some() {
            continue;
        }

        let Some(outcome) = apply_rules(
            &rules,
            &transaction.name,
            transaction.category_id,
            overwrite_category,
        ) else {
            continue;
        };

        if outcome.name == transaction.name && outcome.category_id == transaction.category_id {
            continue;
        }

        set_name_and_category(
            transaction.id,
            &outcome.name,
            outcome.category_id,
            &sql_transaction,
        )?;

        result.transactions_updated += 1;
        if let Some(category_id) = outcome.category_id {
            applied_categories.insert(category_id);
        }
    }

    sql_transaction.commit()?;
    result.categories_applied = applied_categories.len();

    Ok(result)
}
