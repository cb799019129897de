//! Banks and lenders that hold accounts.
//!
//! Institutions are shared by every user. Institutions created while linking a bank login
//! carry the aggregator's institution ID so that later links reuse them.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AppState, Error, FieldErrors, database_id::InstitutionId};

/// The name given to institutions the aggregator does not name.
pub const UNKNOWN_INSTITUTION_NAME: &str = "Unknown Bank";

/// A bank or lender.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Institution {
    /// The ID of the institution.
    pub id: InstitutionId,
    /// The display name.
    pub name: String,
    /// The aggregator's ID for the institution.
    pub plaid_id: Option<String>,
}

/// Create the institution table.
pub fn create_institution_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS institution (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            plaid_id TEXT UNIQUE
        )",
        (),
    )?;

    Ok(())
}

fn map_institution_row(row: &Row) -> Result<Institution, rusqlite::Error> {
    Ok(Institution {
        id: row.get(0)?,
        name: row.get(1)?,
        plaid_id: row.get(2)?,
    })
}

/// Insert an institution.
pub fn create_institution(
    name: &str,
    plaid_id: Option<&str>,
    connection: &Connection,
) -> Result<Institution, Error> {
    connection.execute(
        "INSERT INTO institution (name, plaid_id) VALUES (?1, ?2)",
        (name, plaid_id),
    )?;

    Ok(Institution {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
        plaid_id: plaid_id.map(str::to_owned),
    })
}

/// Get an institution by its ID.
///
/// # Errors
/// Returns [Error::NotFound] if the institution does not exist.
pub fn get_institution(id: InstitutionId, connection: &Connection) -> Result<Institution, Error> {
    connection
        .prepare("SELECT id, name, plaid_id FROM institution WHERE id = ?1")?
        .query_row([id], map_institution_row)
        .map_err(|error| error.into())
}

/// Get every institution ordered by name.
pub fn get_all_institutions(connection: &Connection) -> Result<Vec<Institution>, Error> {
    connection
        .prepare("SELECT id, name, plaid_id FROM institution ORDER BY name COLLATE NOCASE ASC")?
        .query_map([], map_institution_row)?
        .map(|maybe_institution| maybe_institution.map_err(|error| error.into()))
        .collect()
}

/// Find the institution with the aggregator ID `plaid_id`, creating it if it does not exist.
///
/// Without an aggregator ID a new institution is always created.
/// A missing or blank `name` is replaced with [UNKNOWN_INSTITUTION_NAME].
pub fn find_or_create_institution(
    plaid_id: Option<&str>,
    name: Option<&str>,
    connection: &Connection,
) -> Result<Institution, Error> {
    let name = match name.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_INSTITUTION_NAME,
    };

    if let Some(plaid_id) = plaid_id {
        let existing = connection
            .prepare("SELECT id, name, plaid_id FROM institution WHERE plaid_id = ?1")?
            .query_row([plaid_id], map_institution_row)
            .optional()?;

        if let Some(institution) = existing {
            return Ok(institution);
        }
    }

    create_institution(name, plaid_id, connection)
}

/// Rename an institution.
pub fn update_institution(
    id: InstitutionId,
    name: &str,
    connection: &Connection,
) -> Result<Institution, Error> {
    let rows_affected = connection.execute(
        "UPDATE institution SET name = ?1 WHERE id = ?2",
        (name, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingInstitution);
    }

    get_institution(id, connection)
}

/// Delete an institution. Accounts held by it keep existing without an institution.
pub fn delete_institution(id: InstitutionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM institution WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingInstitution);
    }

    Ok(())
}

/// The state needed by the institution endpoints.
#[derive(Debug, Clone)]
pub struct InstitutionState {
    /// The database connection for managing institutions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for InstitutionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The data sent by the client to create or rename an institution.
#[derive(Debug, Deserialize)]
pub struct InstitutionForm {
    /// The display name.
    pub name: String,
}

impl InstitutionForm {
    fn validated_name(&self) -> Result<&str, Error> {
        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 255);
        errors.into_result()?;

        Ok(self.name.trim())
    }
}

/// A route handler that returns every institution.
pub async fn get_institutions_endpoint(State(state): State<InstitutionState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_institutions(&connection) {
        Ok(institutions) => Json(institutions).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that creates an institution.
pub async fn create_institution_endpoint(
    State(state): State<InstitutionState>,
    Json(form): Json<InstitutionForm>,
) -> Response {
    let name = match form.validated_name() {
        Ok(name) => name,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_institution(name, None, &connection) {
        Ok(institution) => (StatusCode::CREATED, Json(institution)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that renames an institution.
pub async fn update_institution_endpoint(
    State(state): State<InstitutionState>,
    Path(institution_id): Path<InstitutionId>,
    Json(form): Json<InstitutionForm>,
) -> Response {
    let name = match form.validated_name() {
        Ok(name) => name,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match update_institution(institution_id, name, &connection) {
        Ok(institution) => Json(institution).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that deletes an institution.
pub async fn delete_institution_endpoint(
    State(state): State<InstitutionState>,
    Path(institution_id): Path<InstitutionId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_institution(institution_id, &connection) {
        Ok(()) => Json(json!({ "message": "Institution deleted successfully" })).into_response(),
        Err(error) => error.into_response(),
    }
}
