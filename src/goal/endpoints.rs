//! The JSON endpoints for savings goals.

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
    database_id::GoalId,
    goal::{GoalForm, GoalView, create_goal, delete_goal, list_goals, update_goal},
};

/// The state needed by the goal endpoints.
#[derive(Debug, Clone)]
pub struct GoalState {
    /// The database connection for managing goals.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GoalState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the user's goals with their progress.
pub async fn get_goals_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match list_goals(user_id, &connection) {
        Ok(goals) => {
            let goals: Vec<GoalView> = goals.into_iter().map(GoalView::from).collect();
            Json(goals).into_response()
        }
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a goal.
pub async fn create_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<GoalForm>,
) -> Response {
    let new_goal = match form.validate() {
        Ok(new_goal) => new_goal,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_goal(user_id, &new_goal, &connection) {
        Ok(goal) => (StatusCode::CREATED, Json(GoalView::from(goal))).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for overwriting a goal.
pub async fn update_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<GoalId>,
    Json(form): Json<GoalForm>,
) -> Response {
    let new_goal = match form.validate() {
        Ok(new_goal) => new_goal,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match update_goal(goal_id, user_id, &new_goal, &connection) {
        Ok(goal) => Json(GoalView::from(goal)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for deleting a goal.
pub async fn delete_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<GoalId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_goal(goal_id, user_id, &connection) {
        Ok(()) => Json(json!({ "message": "Goal deleted successfully" })).into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        http::StatusCode,
        routing::{get, put},
    };
    use serde_json::{Value, json};

    use crate::{
        AppState,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_server, get_test_state, insert_test_user},
    };

    use super::{
        create_goal_endpoint, delete_goal_endpoint, get_goals_endpoint, update_goal_endpoint,
    };

    fn router() -> Router<AppState> {
        Router::new()
            .route(
                endpoints::GOALS,
                get(get_goals_endpoint).post(create_goal_endpoint),
            )
            .route(
                endpoints::GOAL,
                put(update_goal_endpoint).delete(delete_goal_endpoint),
            )
    }

    #[tokio::test]
    async fn goals_include_progress() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(router(), state, user.id);

        let response = server
            .post(endpoints::GOALS)
            .json(&json!({
                "name": "Emergency fund",
                "target_amount": "1000",
                "current_amount": "250",
                "due_date": "2026-06-30"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let goal_id = response.json::<Value>()["id"].as_i64().unwrap();

        let goals = server.get(endpoints::GOALS).await.json::<Value>();
        assert_eq!(goals[0]["progress"], 0.25);
        assert_eq!(goals[0]["progress_percentage"], 25.0);
        assert_eq!(goals[0]["due_date"], "2026-06-30");

        let updated = server
            .put(&format_endpoint(endpoints::GOAL, goal_id))
            .json(&json!({ "name": "Emergency fund", "target_amount": "1000" }))
            .await
            .json::<Value>();
        assert_eq!(updated["current_amount"], "0");
        assert_eq!(updated["progress"], 0.0);
    }

    #[tokio::test]
    async fn invalid_goal_is_rejected() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(router(), state, user.id);

        let response = server
            .post(endpoints::GOALS)
            .json(&json!({ "name": "", "target_amount": "0" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let errors = &response.json::<Value>()["errors"];
        assert!(errors["name"].is_string());
        assert!(errors["target_amount"].is_string());
    }

    #[tokio::test]
    async fn delete_missing_goal_is_not_found() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(router(), state, user.id);

        server
            .delete(&format_endpoint(endpoints::GOAL, 7))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
