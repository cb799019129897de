//! The JSON endpoints for category groups.

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
    database_id::GroupId,
    group::{GroupForm, create_group, delete_group, list_groups, update_group},
};

/// The state needed by the group endpoints.
#[derive(Debug, Clone)]
pub struct GroupState {
    /// The database connection for managing groups.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GroupState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the user's groups.
pub async fn get_groups_endpoint(
    State(state): State<GroupState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match list_groups(user_id, &connection) {
        Ok(groups) => Json(groups).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that creates a group.
pub async fn create_group_endpoint(
    State(state): State<GroupState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<GroupForm>,
) -> Response {
    let (name, color) = match form.validate() {
        Ok(fields) => fields,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_group(user_id, name, color, &connection) {
        Ok(group) => (StatusCode::CREATED, Json(group)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that renames or recolors a group.
pub async fn update_group_endpoint(
    State(state): State<GroupState>,
    Extension(user_id): Extension<UserID>,
    Path(group_id): Path<GroupId>,
    Json(form): Json<GroupForm>,
) -> Response {
    let (name, color) = match form.validate() {
        Ok(fields) => fields,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match update_group(group_id, user_id, name, color, &connection) {
        Ok(group) => Json(group).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that deletes a group, responding with 409 if it still has categories.
pub async fn delete_group_endpoint(
    State(state): State<GroupState>,
    Extension(user_id): Extension<UserID>,
    Path(group_id): Path<GroupId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_group(group_id, user_id, &connection) {
        Ok(()) => Json(json!({ "message": "Group deleted successfully" })).into_response(),
        Err(Error::GroupNotEmpty) => {
            tracing::debug!("user {user_id} tried to delete non-empty group {group_id}");
            Error::GroupNotEmpty.into_response()
        }
        Err(error) => error.into_response(),
    }
}
