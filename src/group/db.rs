//! Database operations for category groups.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    auth::UserID,
    database_id::GroupId,
    group::{Color, Group},
};

/// Initialize the category group table and indexes.
pub fn create_group_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category_group (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT 'blue',
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_category_group_user_id ON category_group(user_id);",
    )?;

    Ok(())
}

/// Create a group and return it with its generated ID.
pub fn create_group(
    user_id: UserID,
    name: &str,
    color: Color,
    connection: &Connection,
) -> Result<Group, Error> {
    connection.execute(
        "INSERT INTO category_group (user_id, name, color) VALUES (?1, ?2, ?3)",
        (user_id.as_i64(), name, color),
    )?;

    Ok(Group {
        id: connection.last_insert_rowid(),
        user_id,
        name: name.to_owned(),
        color,
    })
}

/// Retrieve one of the user's groups.
///
/// # Errors
/// Returns [Error::NotFound] if the group does not exist or belongs to another user.
pub fn get_group(
    group_id: GroupId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Group, Error> {
    connection
        .prepare("SELECT id, user_id, name, color FROM category_group WHERE id = ?1 AND user_id = ?2")?
        .query_row((group_id, user_id.as_i64()), map_row)
        .map_err(|error| error.into())
}

/// Retrieve the user's groups ordered alphabetically by name.
pub fn list_groups(user_id: UserID, connection: &Connection) -> Result<Vec<Group>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, color FROM category_group WHERE user_id = ?1
            ORDER BY name COLLATE NOCASE ASC, id ASC",
        )?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_group| maybe_group.map_err(|error| error.into()))
        .collect()
}

/// Update a group's name and color. Returns an error if the group doesn't exist.
pub fn update_group(
    group_id: GroupId,
    user_id: UserID,
    name: &str,
    color: Color,
    connection: &Connection,
) -> Result<Group, Error> {
    let rows_affected = connection.execute(
        "UPDATE category_group SET name = ?1, color = ?2 WHERE id = ?3 AND user_id = ?4",
        (name, color, group_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingGroup);
    }

    get_group(group_id, user_id, connection)
}

/// Delete an empty group.
///
/// # Errors
/// Returns [Error::GroupNotEmpty] if any category still belongs to the group, or
/// [Error::DeleteMissingGroup] if the group doesn't exist.
pub fn delete_group(
    group_id: GroupId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    get_group(group_id, user_id, connection).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingGroup,
        error => error,
    })?;

    let category_count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM category WHERE group_id = ?1",
        [group_id],
        |row| row.get(0),
    )?;

    if category_count > 0 {
        return Err(Error::GroupNotEmpty);
    }

    let rows_affected = connection.execute(
        "DELETE FROM category_group WHERE id = ?1 AND user_id = ?2",
        (group_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingGroup);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Group, rusqlite::Error> {
    Ok(Group {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        color: row.get(3)?,
    })
}
