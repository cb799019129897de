//! Handles registering new users.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::Duration;

use crate::{
    AppState, Error, FieldErrors,
    auth::{
        PasswordHash, ValidatedPassword,
        cookie::set_auth_cookie,
        user::create_user,
    },
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The bcrypt cost used to hash new passwords.
    pub password_hash_cost: u32,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            password_hash_cost: PasswordHash::DEFAULT_COST,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The data sent by the client to register.
#[derive(Deserialize)]
pub struct RegisterForm {
    /// The email address to log in with.
    pub email: String,
    /// The plain text password.
    pub password: String,
}

/// Create a new user, log them in and return their ID and email.
///
/// Responds with 422 if the email is malformed or the password is too weak, and 409 if the
/// email is already registered.
pub async fn register_user(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Json(form): Json<RegisterForm>,
) -> Response {
    let email = form.email.trim();
    if !EmailAddress::is_valid(email) {
        return FieldErrors::single("email", "The email must be a valid email address.")
            .into_response();
    }

    let password_hash = match ValidatedPassword::new(&form.password, &[email])
        .and_then(|password| PasswordHash::new(password, state.password_hash_cost))
    {
        Ok(password_hash) => password_hash,
        Err(error) => return error.into_response(),
    };

    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        match create_user(email, password_hash, &connection) {
            Ok(user) => user,
            Err(error) => return error.into_response(),
        }
    };

    tracing::info!("Registered user {}", user.id);

    match set_auth_cookie(jar, user.id, state.cookie_duration) {
        Ok(jar) => (
            StatusCode::CREATED,
            jar,
            Json(json!({ "user_id": user.id, "email": user.email })),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod register_user_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_extra::extract::cookie::Key;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use sha2::{Digest, Sha512};

    use crate::auth::{
        cookie::{COOKIE_TOKEN, DEFAULT_COOKIE_DURATION},
        user::create_user_table,
    };

    use super::{RegistrationState, register_user};

    fn get_test_server() -> TestServer {
        let connection = Connection::open_in_memory().unwrap();
        create_user_table(&connection).unwrap();
        let state = RegistrationState {
            cookie_key: Key::from(&Sha512::digest("secret")),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            password_hash_cost: 4,
            db_connection: Arc::new(Mutex::new(connection)),
        };
        let app = Router::new()
            .route("/api/users", post(register_user))
            .with_state(state);

        TestServer::new(app)
    }

    #[tokio::test]
    async fn register_user_succeeds() {
        let server = get_test_server();

        let response = server
            .post("/api/users")
            .json(&json!({
                "email": "jane@example.com",
                "password": "correct horse battery staple ledger"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert_eq!(response.json::<Value>()["email"], "jane@example.com");
        assert!(!response.cookie(COOKIE_TOKEN).value().is_empty());
    }

    #[tokio::test]
    async fn register_user_rejects_invalid_email() {
        let server = get_test_server();

        let response = server
            .post("/api/users")
            .json(&json!({
                "email": "not an email",
                "password": "correct horse battery staple ledger"
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.json::<Value>()["errors"]["email"].is_string());
    }

    #[tokio::test]
    async fn register_user_rejects_weak_password() {
        let server = get_test_server();

        let response = server
            .post("/api/users")
            .json(&json!({ "email": "jane@example.com", "password": "password" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.json::<Value>()["errors"]["password"].is_string());
    }

    #[tokio::test]
    async fn register_user_rejects_duplicate_email() {
        let server = get_test_server();
        let body = json!({
            "email": "jane@example.com",
            "password": "correct horse battery staple ledger"
        });
        server.post("/api/users").json(&body).await;

        let response = server.post("/api/users").json(&body).await;

        response.assert_status(StatusCode::CONFLICT);
    }
}
