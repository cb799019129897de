//! The JSON endpoints for categories.

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
    auth::UserID,
    category::{
        Category, CategoryForm, NewCategory, create_category, delete_category, list_categories,
        update_category,
    },
    database_id::CategoryId,
    group::{Group, get_group, list_groups},
};

/// The state needed by the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection for managing categories.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A group together with its categories.
#[derive(Debug, Serialize)]
struct GroupWithCategories {
    #[serde(flatten)]
    group: Group,
    categories: Vec<Category>,
}

fn group_categories(groups: Vec<Group>, categories: Vec<Category>) -> Vec<GroupWithCategories> {
    let mut grouped: Vec<GroupWithCategories> = groups
        .into_iter()
        .map(|group| GroupWithCategories {
            group,
            categories: Vec::new(),
        })
        .collect();

    for category in categories {
        if let Some(entry) = grouped
            .iter_mut()
            .find(|entry| entry.group.id == category.group_id)
        {
            entry.categories.push(category);
        }
    }

    grouped
}

/// A route handler that returns the user's groups, each with its categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let grouped = list_groups(user_id, &connection).and_then(|groups| {
        list_categories(user_id, &connection)
            .map(|categories| group_categories(groups, categories))
    });

    match grouped {
        Ok(grouped) => Json(grouped).into_response(),
        Err(error) => error.into_response(),
    }
}

fn check_group(
    category: &NewCategory,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    match get_group(category.group_id, user_id, connection) {
        Ok(_) => Ok(()),
        Err(Error::NotFound) => Err(FieldErrors::single(
            "group_id",
            "The selected group does not exist.",
        )),
        Err(error) => Err(error),
    }
}

/// A route handler that creates a category in one of the user's groups.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<CategoryForm>,
) -> Response {
    let new_category = match form.validate() {
        Ok(new_category) => new_category,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let result = check_group(&new_category, user_id, &connection)
        .and_then(|_| create_category(user_id, &new_category, &connection));

    match result {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that overwrites a category.
pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
    Json(form): Json<CategoryForm>,
) -> Response {
    let new_category = match form.validate() {
        Ok(new_category) => new_category,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let result = check_group(&new_category, user_id, &connection)
        .and_then(|_| update_category(category_id, user_id, &new_category, &connection));

    match result {
        Ok(category) => Json(category).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler that deletes a category.
///
/// Transactions in the category become uncategorized and rules assigning it are deleted.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user_id): Extension<UserID>,
    Path(category_id): Path<CategoryId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_category(category_id, user_id, &connection) {
        Ok(()) => Json(json!({ "message": "Category deleted successfully" })).into_response(),
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
        group::{Color, create_group},
        test_utils::{get_test_server, get_test_state, insert_test_user},
    };

    use super::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        update_category_endpoint,
    };

    fn router() -> Router<AppState> {
        Router::new()
            .route(
                endpoints::CATEGORIES,
                get(get_categories_endpoint).post(create_category_endpoint),
            )
            .route(
                endpoints::CATEGORY,
                put(update_category_endpoint).delete(delete_category_endpoint),
            )
    }

    #[tokio::test]
    async fn categories_are_listed_under_their_group() {
        let state = get_test_state();
        let (user, group) = {
            let connection = state.db_connection.lock().unwrap();
            let user = insert_test_user(&connection);
            let group = create_group(user.id, "Living", Color::Green, &connection).unwrap();
            (user, group)
        };
        let server = get_test_server(router(), state, user.id);

        server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "group_id": group.id, "name": "Groceries", "monthly_budget": 600 }))
            .await
            .assert_status(StatusCode::CREATED);

        let groups = server.get(endpoints::CATEGORIES).await.json::<Value>();
        assert_eq!(groups[0]["name"], "Living");
        assert_eq!(groups[0]["categories"][0]["name"], "Groceries");
        assert_eq!(groups[0]["categories"][0]["monthly_budget"], "600");
    }

    #[tokio::test]
    async fn create_category_in_other_users_group_is_rejected() {
        let state = get_test_state();
        let (intruder, group) = {
            let connection = state.db_connection.lock().unwrap();
            let owner = insert_test_user(&connection);
            let group = create_group(owner.id, "Living", Color::Green, &connection).unwrap();
            (insert_test_user(&connection), group)
        };
        let server = get_test_server(router(), state, intruder.id);

        let response = server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "group_id": group.id, "name": "Groceries" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.json::<Value>()["errors"]["group_id"].is_string());
    }

    #[tokio::test]
    async fn delete_missing_category_is_not_found() {
        let state = get_test_state();
        let user = insert_test_user(&state.db_connection.lock().unwrap());
        let server = get_test_server(router(), state, user.id);

        server
            .delete(&format_endpoint(endpoints::CATEGORY, 99))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
