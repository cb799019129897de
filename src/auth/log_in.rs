//! Handles log-in requests.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{cookie::set_auth_cookie, user::get_user_by_email},
};

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LoginState> for Key {
    fn from_ref(state: &LoginState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials sent by the client to log in.
///
/// The password is a plain string. There is no need for validation here since it will be
/// compared against the hash in the database.
#[derive(Clone, Deserialize)]
pub struct LogInData {
    /// The email the user registered with.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to extend the initial auth cookie duration.
    #[serde(default)]
    pub remember_me: bool,
}

/// Handler for log-in requests.
///
/// On success the auth cookie is set and the user's ID is returned. Unknown emails and wrong
/// passwords both produce the same 401 response.
pub async fn post_log_in(
    State(state): State<LoginState>,
    jar: PrivateCookieJar,
    Json(user_data): Json<LogInData>,
) -> Response {
    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        match get_user_by_email(user_data.email.trim(), &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Error::InvalidCredentials.into_response(),
            Err(error) => return error.into_response(),
        }
    };

    match user.password_hash.verify(&user_data.password) {
        Ok(true) => {}
        Ok(false) => return Error::InvalidCredentials.into_response(),
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return error.into_response();
        }
    }

    let cookie_duration = if user_data.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    match set_auth_cookie(jar, user.id, cookie_duration) {
        Ok(jar) => (jar, Json(json!({ "user_id": user.id, "email": user.email }))).into_response(),
        Err(error) => {
            tracing::error!("Error setting auth cookie: {error}");
            error.into_response()
        }
    }
}
