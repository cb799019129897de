//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error,
    account::create_account_tables,
    auth::create_user_table,
    category::create_category_table,
    goal::create_goal_table,
    group::create_group_table,
    institution::create_institution_table,
    rule::create_rule_table,
    transaction::create_transaction_table,
};

/// Create the tables for every domain model if they do not exist yet.
///
/// Foreign key enforcement is switched on for `connection`, so deleting an account, category or
/// user cascades to the rows that reference it.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Must be set outside a transaction to take effect.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_institution_table(&transaction)?;
    create_group_table(&transaction)?;
    create_category_table(&transaction)?;
    create_account_tables(&transaction)?;
    create_goal_table(&transaction)?;
    create_rule_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize;

    fn table_names(connection: &Connection) -> Vec<String> {
        connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect()
    }

    #[test]
    fn creates_every_table() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(
            table_names(&connection),
            [
                "cash_account",
                "category",
                "category_group",
                "credit_card",
                "goal",
                "institution",
                "loan",
                "rule",
                "transaction",
                "user",
            ]
        );
    }

    #[test]
    fn can_run_twice() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(initialize(&connection), Ok(()));
    }

    #[test]
    fn enables_foreign_keys() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        let enabled: bool = connection
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }
}
