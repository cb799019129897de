//! The JSON endpoints for managing rules.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error,
    auth::UserID,
    database_id::RuleId,
    rule::{RuleForm, UpdateRuleForm, create_rule, delete_rule, list_rules, update_rule},
};

/// The state needed by the rule endpoints.
#[derive(Debug, Clone)]
pub struct RuleState {
    /// The database connection for managing rules.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RuleState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the rules of all the user's accounts, newest first.
pub async fn get_rules_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match list_rules(user_id, &connection) {
        Ok(rules) => Json(rules).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a rule on one of the user's accounts.
pub async fn create_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<RuleForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let result = form
        .validate(user_id, &connection)
        .and_then(|(account, fields)| create_rule(user_id, account, &fields, &connection));

    match result {
        Ok(rule) => (StatusCode::CREATED, Json(rule)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for changing what a rule matches and assigns.
pub async fn update_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    Path(rule_id): Path<RuleId>,
    Json(form): Json<UpdateRuleForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let result = form
        .validate(user_id, &connection)
        .and_then(|fields| update_rule(rule_id, user_id, &fields, &connection));

    match result {
        Ok(rule) => Json(rule).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a rule.
pub async fn delete_rule_endpoint(
    State(state): State<RuleState>,
    Extension(user_id): Extension<UserID>,
    Path(rule_id): Path<RuleId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_rule(rule_id, user_id, &connection) {
        Ok(()) => Json(json!({ "message": "Rule deleted successfully" })).into_response(),
        Err(error) => error.into_response(),
    }
}
