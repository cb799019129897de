//! The JSON endpoints for listing, creating, showing, updating and deleting accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;

use crate::{
    AppState, Error, FieldErrors,
    account::{
        core::{Account, AccountForm, AccountKind, Accountable},
        db::{delete_account, get_account, insert_account, list_accounts, update_account},
    },
    auth::UserID,
    database_id::{AccountId, InstitutionId},
    institution::get_institution,
};

/// The state needed by the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The user's accounts grouped by kind.
#[derive(Debug, Serialize)]
struct AccountList {
    cash_accounts: Vec<Account>,
    credit_cards: Vec<Account>,
    loans: Vec<Account>,
}

/// A route handler that returns every account of the user grouped by kind.
pub async fn get_accounts_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let accounts = list_accounts(AccountKind::CashAccount, user_id, &connection).and_then(
        |cash_accounts| {
            Ok(AccountList {
                cash_accounts,
                credit_cards: list_accounts(AccountKind::CreditCard, user_id, &connection)?,
                loans: list_accounts(AccountKind::Loan, user_id, &connection)?,
            })
        },
    );

    match accounts {
        Ok(accounts) => Json(accounts).into_response(),
        Err(error) => {
            tracing::error!("could not get accounts for user {user_id}: {error}");
            error.into_response()
        }
    }
}

/// A route handler that creates a manually tracked account, responding with 201 and the new
/// account.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<AccountForm>,
) -> Response {
    if let Err(error) = form.validate() {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    if let Err(error) = check_institution(form.institution_id, &connection) {
        return error.into_response();
    }

    match insert_account(user_id, &form.into_new_account(), &connection) {
        Ok(account) => {
            tracing::info!("user {user_id} created {}", account.accountable());
            (StatusCode::CREATED, Json(account)).into_response()
        }
        Err(error) => {
            tracing::error!("could not create account for user {user_id}: {error}");
            error.into_response()
        }
    }
}

/// A route handler that returns a single account.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path((kind, id)): Path<(AccountKind, AccountId)>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_account(Accountable::new(kind, id), user_id, &connection) {
        Ok(account) => Json(account).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that overwrites the editable fields of an account.
///
/// The account's type cannot be changed.
pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path((kind, id)): Path<(AccountKind, AccountId)>,
    Json(form): Json<AccountForm>,
) -> Response {
    if form.details.kind() != kind {
        return FieldErrors::single("type", "The account type cannot be changed.").into_response();
    }

    if let Err(error) = form.validate() {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    if let Err(error) = check_institution(form.institution_id, &connection) {
        return error.into_response();
    }

    let accountable = Accountable::new(kind, id);
    match update_account(accountable, user_id, &form.into_new_account(), &connection) {
        Ok(account) => Json(account).into_response(),
        Err(error) => {
            tracing::error!("could not update {accountable} for user {user_id}: {error}");
            error.into_response()
        }
    }
}

/// A route handler that deletes an account together with its transactions and rules.
pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path((kind, id)): Path<(AccountKind, AccountId)>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let accountable = Accountable::new(kind, id);
    match delete_account(accountable, user_id, &connection) {
        Ok(()) => {
            tracing::info!("user {user_id} deleted {accountable}");
            Json(json!({ "message": "Account deleted successfully" })).into_response()
        }
        Err(error) => error.into_response(),
    }
}

fn check_institution(
    institution_id: Option<InstitutionId>,
    connection: &Connection,
) -> Result<(), Error> {
    match institution_id.map(|id| get_institution(id, connection)) {
        Some(Err(Error::NotFound)) => Err(FieldErrors::single(
            "institution_id",
            "The selected institution does not exist.",
        )),
        Some(Err(error)) => Err(error),
        _ => Ok(()),
    }
}
