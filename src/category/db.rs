//! Database operations for categories.

use std::collections::HashMap;

use rusqlite::{Connection, Row};

use crate::{
    Error,
    auth::UserID,
    category::{Category, NewCategory},
    database_id::CategoryId,
    money::decimal_column,
};

/// Initialize the category table and indexes.
///
/// Deleting a category clears it from transactions and deletes the rules that assign it.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT 'blue',
            monthly_budget TEXT NOT NULL DEFAULT '0',
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(group_id) REFERENCES category_group(id) ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_category_user_id ON category(user_id);
        CREATE INDEX IF NOT EXISTS idx_category_group_id ON category(group_id);",
    )?;

    Ok(())
}

/// Create a category and return it with its generated ID.
///
/// The caller must check that the group belongs to `user_id`.
pub fn create_category(
    user_id: UserID,
    category: &NewCategory,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (user_id, group_id, name, color, monthly_budget)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            user_id.as_i64(),
            category.group_id,
            &category.name,
            category.color,
            category.monthly_budget.to_string(),
        ),
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        user_id,
        group_id: category.group_id,
        name: category.name.clone(),
        color: category.color,
        monthly_budget: category.monthly_budget,
    })
}

/// Retrieve one of the user's categories.
///
/// # Errors
/// Returns [Error::NotFound] if the category does not exist or belongs to another user.
pub fn get_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, user_id, group_id, name, color, monthly_budget FROM category
            WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((category_id, user_id.as_i64()), map_row)
        .map_err(|error| error.into())
}

/// Retrieve the user's categories ordered alphabetically by name.
pub fn list_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, group_id, name, color, monthly_budget FROM category
            WHERE user_id = ?1 ORDER BY name COLLATE NOCASE ASC, id ASC",
        )?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Map the IDs of the user's categories to their names.
pub fn category_names(
    user_id: UserID,
    connection: &Connection,
) -> Result<HashMap<CategoryId, String>, Error> {
    connection
        .prepare("SELECT id, name FROM category WHERE user_id = ?1")?
        .query_map([user_id.as_i64()], |row| Ok((row.get(0)?, row.get(1)?)))?
        .map(|maybe_pair| maybe_pair.map_err(|error| error.into()))
        .collect()
}

/// Overwrite a category. Returns an error if the category doesn't exist.
pub fn update_category(
    category_id: CategoryId,
    user_id: UserID,
    category: &NewCategory,
    connection: &Connection,
) -> Result<Category, Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET group_id = ?1, name = ?2, color = ?3, monthly_budget = ?4
        WHERE id = ?5 AND user_id = ?6",
        (
            category.group_id,
            &category.name,
            category.color,
            category.monthly_budget.to_string(),
            category_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    get_category(category_id, user_id, connection)
}

/// Delete a category. Returns an error if the category doesn't exist.
pub fn delete_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        group_id: row.get(2)?,
        name: row.get(3)?,
        color: row.get(4)?,
        monthly_budget: decimal_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::{
        Error,
        group::{Color, create_group},
        test_utils::{get_test_connection, insert_test_user},
    };

    use super::{
        NewCategory, category_names, create_category, delete_category, get_category,
        list_categories, update_category,
    };

    fn new_category(group_id: i64, name: &str, budget: i64) -> NewCategory {
        NewCategory {
            group_id,
            name: name.to_owned(),
            color: Color::Green,
            monthly_budget: Decimal::new(budget, 0),
        }
    }

    #[test]
    fn create_and_get_category() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let group = create_group(user.id, "Living", Color::Blue, &connection).unwrap();

        let created =
            create_category(user.id, &new_category(group.id, "Groceries", 600), &connection)
                .unwrap();

        assert_eq!(get_category(created.id, user.id, &connection), Ok(created));
    }

    #[test]
    fn categories_of_other_users_are_hidden() {
        let connection = get_test_connection();
        let owner = insert_test_user(&connection);
        let intruder = insert_test_user(&connection);
        let group = create_group(owner.id, "Living", Color::Blue, &connection).unwrap();
        let category =
            create_category(owner.id, &new_category(group.id, "Groceries", 600), &connection)
                .unwrap();

        assert_eq!(
            get_category(category.id, intruder.id, &connection),
            Err(Error::NotFound)
        );
        assert!(list_categories(intruder.id, &connection).unwrap().is_empty());
        assert!(category_names(intruder.id, &connection).unwrap().is_empty());
        assert_eq!(
            delete_category(category.id, intruder.id, &connection),
            Err(Error::DeleteMissingCategory)
        );
    }

    #[test]
    fn update_category_changes_budget() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let group = create_group(user.id, "Living", Color::Blue, &connection).unwrap();
        let category =
            create_category(user.id, &new_category(group.id, "Groceries", 600), &connection)
                .unwrap();

        let updated = update_category(
            category.id,
            user.id,
            &new_category(group.id, "Food", 750),
            &connection,
        )
        .unwrap();

        assert_eq!(updated.name, "Food");
        assert_eq!(updated.monthly_budget, Decimal::new(750, 0));
    }

    #[test]
    fn category_names_maps_ids() {
        let connection = get_test_connection();
        let user = insert_test_user(&connection);
        let group = create_group(user.id, "Living", Color::Blue, &connection).unwrap();
        let category =
            create_category(user.id, &new_category(group.id, "Groceries", 600), &connection)
                .unwrap();

        let names = category_names(user.id, &connection).unwrap();

        assert_eq!(names.get(&category.id).map(String::as_str), Some("Groceries"));
    }
}
