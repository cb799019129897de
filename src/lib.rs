//! Pocketledger is a web app for managing your budget and personal finances.
//!
//! This library provides a JSON REST API for tracking cash accounts, credit cards and loans,
//! categorising transactions, budgeting, cash flow, savings goals, and syncing accounts with a
//! bank-data aggregator (Plaid).

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod bank_sync;
mod budget;
mod cash_flow;
mod category;
mod config;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod goal;
mod group;
mod institution;
mod logging;
mod money;
mod not_found;
mod period;
mod report;
mod routing;
mod rule;
mod timezone;
mod transaction;
mod validation;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{PasswordHash, User, UserID, ValidatedPassword};
pub use bank_sync::{
    AggregatorError, BankAggregator, LinkToken, PlaidClient, RemoteAccount, RemoteBalances,
    RemoteTransaction, TokenExchange,
};
pub use config::{PlaidConfig, PlaidEnvironment};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use validation::FieldErrors;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid combination of email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth token is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address is already registered to another user.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// One or more fields of a request failed validation.
    #[error("invalid input: {0}")]
    Validation(FieldErrors),

    /// The requested resource was not found.
    ///
    /// Resources owned by another user are also reported as not found so that
    /// clients cannot learn whether they exist.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The external transaction ID already exists in the database.
    #[error("the external transaction ID already exists in the database")]
    DuplicateExternalId,

    /// Tried to delete a transaction that does not exist.
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to update a transaction that does not exist.
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete an account that does not exist.
    #[error("tried to delete an account that is not in the database")]
    DeleteMissingAccount,

    /// Tried to update an account that does not exist.
    #[error("tried to update an account that is not in the database")]
    UpdateMissingAccount,

    /// Tried to update a category that does not exist.
    #[error("tried to update a category that is not in the database")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist.
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,

    /// Tried to update a group that does not exist.
    #[error("tried to update a group that is not in the database")]
    UpdateMissingGroup,

    /// Tried to delete a group that does not exist.
    #[error("tried to delete a group that is not in the database")]
    DeleteMissingGroup,

    /// Tried to delete a group that still owns categories.
    #[error(
        "Cannot delete a group that contains categories. Please move or delete the categories first."
    )]
    GroupNotEmpty,

    /// Tried to update a rule that does not exist.
    #[error("tried to update a rule that is not in the database")]
    UpdateMissingRule,

    /// Tried to delete a rule that does not exist.
    #[error("tried to delete a rule that is not in the database")]
    DeleteMissingRule,

    /// Tried to update a goal that does not exist.
    #[error("tried to update a goal that is not in the database")]
    UpdateMissingGoal,

    /// Tried to delete a goal that does not exist.
    #[error("tried to delete a goal that is not in the database")]
    DeleteMissingGoal,

    /// Tried to update an institution that does not exist.
    #[error("tried to update an institution that is not in the database")]
    UpdateMissingInstitution,

    /// Tried to delete an institution that does not exist.
    #[error("tried to delete an institution that is not in the database")]
    DeleteMissingInstitution,

    /// The account does not belong to the user or is not connected to the bank aggregator.
    #[error("Account not found or not connected via Plaid")]
    AccountNotConnected,

    /// A call to the bank aggregator, or the work that followed it, failed.
    ///
    /// `action` describes what was attempted, e.g. "sync balance".
    #[error("Failed to {action}: {message}")]
    BankSyncFailed {
        /// A short description of the failed operation.
        action: &'static str,
        /// The reason the operation failed.
        message: String,
    },
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("transaction.external_id") =>
            {
                Error::DuplicateExternalId
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::InvalidCredentials | Error::CookieMissing => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Error::Validation(errors) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": "invalid input", "errors": errors })),
                )
                    .into_response();
            }
            Error::TooWeak(feedback) => {
                return FieldErrors::single("password", feedback).into_response();
            }
            Error::DuplicateEmail | Error::GroupNotEmpty | Error::DuplicateExternalId => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Error::NotFound
            | Error::AccountNotConnected
            | Error::DeleteMissingTransaction
            | Error::UpdateMissingTransaction
            | Error::DeleteMissingAccount
            | Error::UpdateMissingAccount
            | Error::UpdateMissingCategory
            | Error::DeleteMissingCategory
            | Error::UpdateMissingGroup
            | Error::DeleteMissingGroup
            | Error::UpdateMissingRule
            | Error::DeleteMissingRule
            | Error::UpdateMissingGoal
            | Error::DeleteMissingGoal
            | Error::UpdateMissingInstitution
            | Error::DeleteMissingInstitution => (StatusCode::NOT_FOUND, self.to_string()),
            Error::BankSyncFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred, check the server logs for more details."
                        .to_owned(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, FieldErrors};

    #[test]
    fn not_found_errors_map_to_404() {
        for error in [
            Error::NotFound,
            Error::AccountNotConnected,
            Error::DeleteMissingAccount,
            Error::UpdateMissingRule,
        ] {
            assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn validation_error_maps_to_422() {
        let error = FieldErrors::single("name", "The name field is required.");

        assert_eq!(
            error.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn group_not_empty_maps_to_409() {
        assert_eq!(
            Error::GroupNotEmpty.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn bank_sync_failure_maps_to_500() {
        let error = Error::BankSyncFailed {
            action: "sync balance",
            message: "ITEM_LOGIN_REQUIRED".to_owned(),
        };

        assert_eq!(error.to_string(), "Failed to sync balance: ITEM_LOGIN_REQUIRED");
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
