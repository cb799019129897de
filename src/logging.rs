//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// The number of bytes of a request or response body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// JSON fields whose values are never written to the logs.
const SECRET_FIELDS: [&str; 5] = [
    "password",
    "confirm_password",
    "public_token",
    "link_token",
    "access_token",
];

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Secrets in JSON bodies, such as passwords and access tokens, are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    tracing::info!("Received request: {} {}", parts.method, parts.uri);
    log_body("request", &parts.headers, &bytes);

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    let (parts, body) = response.into_parts();
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    tracing::info!("Sending response: {}", parts.status);
    log_body("response", &parts.headers, &bytes);

    Response::from_parts(parts, Body::from(bytes))
}

async fn read_body(body: Body) -> Result<Bytes, axum::Error> {
    axum::body::to_bytes(body, usize::MAX).await
}

fn log_body(label: &str, headers: &axum::http::HeaderMap, bytes: &Bytes) {
    let body = redact_secrets(&String::from_utf8_lossy(bytes));

    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "{label} headers: {headers:?}\nbody: {}...",
            truncate(&body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full {label} body: {body:?}");
    } else {
        tracing::info!("{label} headers: {headers:?}\nbody: {body:?}");
    }
}

/// Cut `text` to at most `limit` bytes without splitting a character.
fn truncate(text: &str, limit: usize) -> &str {
    let mut end = limit.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

/// Replace the values of secret fields in a JSON body.
///
/// Bodies that are not JSON are returned unchanged.
fn redact_secrets(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(mut value) => {
            redact_value(&mut value);
            value.to_string()
        }
        Err(_) => body.to_owned(),
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            for (key, field) in fields.iter_mut() {
                if SECRET_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED.to_owned());
                } else {
                    redact_value(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, middleware, routing::post};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use super::{logging_middleware, redact_secrets, truncate};

    #[test]
    fn redacts_nested_secret_fields() {
        let body = json!({
            "email": "test@example.com",
            "password": "hunter2",
            "metadata": { "access_token": "access-sandbox-1" },
            "items": [{ "public_token": "public-sandbox-1" }],
        })
        .to_string();

        let redacted = redact_secrets(&body);

        assert!(redacted.contains("test@example.com"));
        assert!(!redacted.contains("hunter2"));
        assert!(!redacted.contains("access-sandbox-1"));
        assert!(!redacted.contains("public-sandbox-1"));
    }

    #[test]
    fn leaves_non_json_bodies_alone() {
        assert_eq!(redact_secrets("not json"), "not json");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[tokio::test]
    async fn passes_bodies_through_unchanged() {
        let app = Router::new()
            .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .layer(middleware::from_fn(logging_middleware));
        let server = TestServer::new(app);

        let response = server
            .post("/echo")
            .json(&json!({ "password": "hunter2" }))
            .await;

        assert_eq!(response.json::<Value>(), json!({ "password": "hunter2" }));
    }
}
