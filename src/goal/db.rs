//! Database operations for goals.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    auth::UserID,
    database_id::GoalId,
    goal::{Goal, NewGoal},
    money::decimal_column,
};

const GOAL_COLUMNS: &str = "id, user_id, name, target_amount, current_amount, due_date";

/// Initialize the goal table.
pub fn create_goal_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS goal (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            target_amount TEXT NOT NULL,
            current_amount TEXT NOT NULL DEFAULT '0',
            due_date TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_goal_user_id ON goal(user_id);",
    )?;

    Ok(())
}

/// Create a goal for the user.
pub fn create_goal(
    user_id: UserID,
    goal: &NewGoal,
    connection: &Connection,
) -> Result<Goal, Error> {
    connection.execute(
        "INSERT INTO goal (user_id, name, target_amount, current_amount, due_date)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            user_id.as_i64(),
            &goal.name,
            goal.target_amount.to_string(),
            goal.current_amount.to_string(),
            goal.due_date,
        ),
    )?;

    Ok(Goal {
        id: connection.last_insert_rowid(),
        user_id,
        name: goal.name.clone(),
        target_amount: goal.target_amount,
        current_amount: goal.current_amount,
        due_date: goal.due_date,
    })
}

/// Retrieve one of the user's goals.
///
/// # Errors
/// Returns [Error::NotFound] if the goal does not exist or belongs to another user.
pub fn get_goal(goal_id: GoalId, user_id: UserID, connection: &Connection) -> Result<Goal, Error> {
    connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goal WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((goal_id, user_id.as_i64()), map_row)
        .map_err(|error| error.into())
}

/// Retrieve the user's goals ordered by name.
pub fn list_goals(user_id: UserID, connection: &Connection) -> Result<Vec<Goal>, Error> {
    connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goal WHERE user_id = ?1
            ORDER BY name COLLATE NOCASE ASC, id ASC"
        ))?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_goal| maybe_goal.map_err(|error| error.into()))
        .collect()
}

/// Retrieve up to `limit` goals ordered by due date then name. Goals without a due date come
/// last.
pub fn top_goals(user_id: UserID, limit: u32, connection: &Connection) -> Result<Vec<Goal>, Error> {
    connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goal WHERE user_id = ?1
            ORDER BY due_date IS NULL ASC, due_date ASC, name COLLATE NOCASE ASC, id ASC
            LIMIT ?2"
        ))?
        .query_map((user_id.as_i64(), limit), map_row)?
        .map(|maybe_goal| maybe_goal.map_err(|error| error.into()))
        .collect()
}

/// Overwrite one of the user's goals.
///
/// # Errors
/// Returns [Error::UpdateMissingGoal] if the goal does not exist or belongs to another user.
pub fn update_goal(
    goal_id: GoalId,
    user_id: UserID,
    goal: &NewGoal,
    connection: &Connection,
) -> Result<Goal, Error> {
    let rows_affected = connection.execute(
        "UPDATE goal SET name = ?1, target_amount = ?2, current_amount = ?3, due_date = ?4
        WHERE id = ?5 AND user_id = ?6",
        (
            &goal.name,
            goal.target_amount.to_string(),
            goal.current_amount.to_string(),
            goal.due_date,
            goal_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingGoal);
    }

    get_goal(goal_id, user_id, connection)
}

/// Delete one of the user's goals.
///
/// # Errors
/// Returns [Error::DeleteMissingGoal] if the goal does not exist or belongs to another user.
pub fn delete_goal(goal_id: GoalId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM goal WHERE id = ?1 AND user_id = ?2",
        (goal_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingGoal);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Goal, rusqlite::Error> {
    Ok(Goal {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        target_amount: decimal_column(row, 3)?,
        current_amount: decimal_column(row, 4)?,
        due_date: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::{Date, macros::date};

    use crate::{
        Error,
        goal::NewGoal,
        test_utils::{get_test_connection, insert_test_user},
    };

    use super::{create_goal, delete_goal, get_goal, list_goals, top_goals, update_goal};

    fn new_goal(name: &str, due_date: Option<Date>) -> NewGoal {
        NewGoal {
            name: name.to_owned(),
            target_amount: Decimal::new(1000, 0),
            current_amount: Decimal::new(12345, 2),
            due_date,
        }
    }

    #[test]
    fn create_and_get_goal() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);

        let created =
            create_goal(user.id, &new_goal("Car", Some(date!(2026 - 01 - 01))), &conn).unwrap();

        assert_eq!(get_goal(created.id, user.id, &conn), Ok(created));
    }

    #[test]
    fn top_goals_puts_undated_goals_last() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        create_goal(user.id, &new_goal("Anytime", None), &conn).unwrap();
        create_goal(user.id, &new_goal("Later", Some(date!(2027 - 01 - 01))), &conn).unwrap();
        create_goal(user.id, &new_goal("Soon", Some(date!(2025 - 06 - 01))), &conn).unwrap();
        create_goal(user.id, &new_goal("Also soon", Some(date!(2025 - 06 - 01))), &conn).unwrap();

        let names: Vec<String> = top_goals(user.id, 3, &conn)
            .unwrap()
            .into_iter()
            .map(|goal| goal.name)
            .collect();

        assert_eq!(names, ["Also soon", "Soon", "Later"]);
        assert_eq!(list_goals(user.id, &conn).unwrap().len(), 4);
    }

    #[test]
    fn other_users_goal_cannot_be_changed() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let intruder = insert_test_user(&conn);
        let goal = create_goal(owner.id, &new_goal("Car", None), &conn).unwrap();

        assert_eq!(
            update_goal(goal.id, intruder.id, &new_goal("Mine", None), &conn),
            Err(Error::UpdateMissingGoal)
        );
        assert_eq!(delete_goal(goal.id, intruder.id, &conn), Err(Error::DeleteMissingGoal));
        assert_eq!(get_goal(goal.id, owner.id, &conn), Ok(goal));
    }
}
