//! Defines the core data models and database queries for transactions.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    account::Accountable,
    auth::UserID,
    database_id::{CategoryId, TransactionId},
    money::decimal_column,
};

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money earned, e.g. a salary deposit.
    #[serde(alias = "credit")]
    Income,
    /// Money spent.
    #[serde(alias = "debit")]
    Expense,
}

impl Direction {
    /// The text stored in the database for this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(Direction::Income),
            "expense" => Ok(Direction::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid direction {other:?}").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    #[serde(skip)]
    pub user_id: UserID,
    /// The account the money moved in or out of.
    pub account: Accountable,
    /// The category of the transaction, e.g. "Groceries".
    pub category_id: Option<CategoryId>,
    /// The amount of money spent or earned. Never negative, see `direction`.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub name: String,
    /// Free text notes.
    pub notes: Option<String>,
    /// Whether money came in or went out.
    pub direction: Direction,
    /// Whether the user has checked the transaction against a statement.
    pub reconciled: bool,
    /// The bank-data aggregator's ID for the transaction.
    pub external_id: Option<String>,
    /// The merchant reported by the aggregator.
    pub merchant_name: Option<String>,
    /// Whether the aggregator reported the transaction as not yet settled.
    pub pending: bool,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        account: Accountable,
        amount: Decimal,
        date: Date,
        name: &str,
        direction: Direction,
    ) -> TransactionBuilder {
        TransactionBuilder {
            account,
            amount,
            date,
            name: name.to_owned(),
            direction,
            category_id: None,
            notes: None,
            reconciled: false,
            external_id: None,
            merchant_name: None,
            pending: false,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The required fields are set by [Transaction::build] and the optional fields default to
/// empty/false.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The account the money moved in or out of.
    pub account: Accountable,
    /// The amount of money spent or earned.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of the transaction.
    pub name: String,
    /// Whether money came in or went out.
    pub direction: Direction,
    /// The category of the transaction.
    pub category_id: Option<CategoryId>,
    /// Free text notes.
    pub notes: Option<String>,
    /// Whether the transaction has been checked against a statement.
    pub reconciled: bool,
    /// The aggregator's ID for the transaction, used to skip duplicates when syncing.
    pub external_id: Option<String>,
    /// The merchant reported by the aggregator.
    pub merchant_name: Option<String>,
    /// Whether the transaction is not yet settled.
    pub pending: bool,
}

impl TransactionBuilder {
    /// Set the category for the transaction.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the notes for the transaction.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Set whether the transaction has been reconciled.
    pub fn reconciled(mut self, reconciled: bool) -> Self {
        self.reconciled = reconciled;
        self
    }

    /// Set the aggregator's ID for the transaction.
    pub fn external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }

    /// Set the merchant name reported by the aggregator.
    pub fn merchant_name(mut self, merchant_name: Option<String>) -> Self {
        self.merchant_name = merchant_name;
        self
    }

    /// Set whether the transaction is pending.
    pub fn pending(mut self, pending: bool) -> Self {
        self.pending = pending;
        self
    }
}

/// The columns [map_transaction_row] expects, in order.
pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, accountable_type, accountable_id, category_id, amount, \
    date, name, notes, direction, reconciled, external_id, merchant_name, pending";

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            accountable_type TEXT NOT NULL,
            accountable_id INTEGER NOT NULL,
            category_id INTEGER,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            name TEXT NOT NULL,
            notes TEXT,
            direction TEXT NOT NULL CHECK (direction IN ('income', 'expense')),
            reconciled INTEGER NOT NULL DEFAULT 0,
            external_id TEXT UNIQUE,
            merchant_name TEXT,
            pending INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_transaction_accountable
            ON \"transaction\"(accountable_type, accountable_id);",
    )?;

    Ok(())
}

/// Create a new transaction in the database from a builder.
///
/// The caller must check that the account and category belong to `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateExternalId] if a transaction with the same external ID already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (user_id, accountable_type, accountable_id, category_id,
                amount, date, name, notes, direction, reconciled, external_id, merchant_name,
                pending)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            rusqlite::params![
                user_id.as_i64(),
                builder.account.kind,
                builder.account.id,
                builder.category_id,
                builder.amount.to_string(),
                builder.date,
                builder.name,
                builder.notes,
                builder.direction,
                builder.reconciled,
                builder.external_id,
                builder.merchant_name,
                builder.pending,
            ],
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve one of the user's transactions by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of the user,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_transaction_row)?;

    Ok(transaction)
}

/// Overwrite the user editable fields of a transaction.
///
/// The external ID, merchant name and pending flag are owned by the aggregator and kept.
///
/// # Errors
/// Returns [Error::UpdateMissingTransaction] if the transaction does not belong to the user.
pub fn update_transaction(
    id: TransactionId,
    user_id: UserID,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET accountable_type = ?1, accountable_id = ?2, category_id = ?3,
            amount = ?4, date = ?5, name = ?6, notes = ?7, direction = ?8, reconciled = ?9
        WHERE id = ?10 AND user_id = ?11",
        rusqlite::params![
            builder.account.kind,
            builder.account.id,
            builder.category_id,
            builder.amount.to_string(),
            builder.date,
            builder.name,
            builder.notes,
            builder.direction,
            builder.reconciled,
            id,
            user_id.as_i64(),
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    get_transaction(id, user_id, connection)
}

/// Set the name and category of a transaction, used when re-applying rules.
pub fn set_name_and_category(
    id: TransactionId,
    name: &str,
    category_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET name = ?1, category_id = ?2 WHERE id = ?3",
        (name, category_id, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Delete one of the user's transactions.
///
/// # Errors
/// Returns [Error::DeleteMissingTransaction] if the transaction does not belong to the user.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Check whether a transaction with the aggregator ID `external_id` has been stored.
pub fn external_id_exists(external_id: &str, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM \"transaction\" WHERE external_id = ?1)",
            [external_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Get the transactions of an account ordered by ID.
pub fn get_account_transactions(
    account: Accountable,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
            WHERE user_id = ?1 AND accountable_type = ?2 AND accountable_id = ?3
            ORDER BY id ASC"
        ))?
        .query_map(
            (user_id.as_i64(), account.kind, account.id),
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Get the user's transactions dated between `start` and `end` inclusive, newest first.
pub fn get_transactions_in_range(
    user_id: UserID,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
            WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3
            ORDER BY date DESC, id DESC"
        ))?
        .query_map((user_id.as_i64(), start, end), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Map a database row to a Transaction.
///
/// The row must contain the columns of [TRANSACTION_COLUMNS] in order.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        account: Accountable::new(row.get(2)?, row.get(3)?),
        category_id: row.get(4)?,
        amount: decimal_column(row, 5)?,
        date: row.get(6)?,
        name: row.get(7)?,
        notes: row.get(8)?,
        direction: row.get(9)?,
        reconciled: row.get(10)?,
        external_id: row.get(11)?,
        merchant_name: row.get(12)?,
        pending: row.get(13)?,
    })
}

#[cfg(test)]
mod database_tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        Error,
        account::{AccountDetails, Accountable},
        test_utils::{get_test_connection, insert_test_account, insert_test_user},
    };

    use super::{
        Direction, Transaction, create_transaction, delete_transaction, external_id_exists,
        get_transaction, update_transaction,
    };

    fn cash_account(connection: &rusqlite::Connection, user_id: crate::UserID) -> Accountable {
        insert_test_account(
            user_id,
            AccountDetails::CashAccount {
                subtype: "checking".to_owned(),
                account_number: None,
                balance: Decimal::ZERO,
            },
            connection,
        )
        .accountable()
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let account = cash_account(&conn, user.id);
        let amount = Decimal::new(1230, 2);

        let result = create_transaction(
            user.id,
            Transaction::build(account, amount, date!(2025 - 10 - 05), "Lunch", Direction::Expense)
                .notes(Some("with Sam".to_owned())),
            &conn,
        );

        let transaction = result.expect("Could not create transaction");
        assert_eq!(transaction.amount, amount);
        assert_eq!(transaction.account, account);
        assert_eq!(transaction.notes.as_deref(), Some("with Sam"));
        assert!(!transaction.reconciled);
    }

    #[test]
    fn create_fails_on_duplicate_external_id() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let account = cash_account(&conn, user.id);
        let build = || {
            Transaction::build(
                account,
                Decimal::ONE,
                date!(2025 - 10 - 04),
                "Coffee",
                Direction::Expense,
            )
            .external_id(Some("txn_123".to_owned()))
        };
        create_transaction(user.id, build(), &conn).expect("Could not create transaction");

        let duplicate = create_transaction(user.id, build(), &conn);

        assert_eq!(duplicate, Err(Error::DuplicateExternalId));
        assert_eq!(external_id_exists("txn_123", &conn), Ok(true));
        assert_eq!(external_id_exists("txn_456", &conn), Ok(false));
    }

    #[test]
    fn transactions_of_other_users_are_hidden() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn);
        let intruder = insert_test_user(&conn);
        let account = cash_account(&conn, owner.id);
        let transaction = create_transaction(
            owner.id,
            Transaction::build(
                account,
                Decimal::ONE,
                date!(2025 - 10 - 04),
                "Coffee",
                Direction::Expense,
            ),
            &conn,
        )
        .unwrap();

        assert_eq!(
            get_transaction(transaction.id, intruder.id, &conn),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_transaction(transaction.id, intruder.id, &conn),
            Err(Error::DeleteMissingTransaction)
        );
    }

    #[test]
    fn update_keeps_aggregator_fields() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let account = cash_account(&conn, user.id);
        let transaction = create_transaction(
            user.id,
            Transaction::build(
                account,
                Decimal::ONE,
                date!(2025 - 10 - 04),
                "COFFEE #12",
                Direction::Expense,
            )
            .external_id(Some("txn_1".to_owned()))
            .pending(true),
            &conn,
        )
        .unwrap();

        let updated = update_transaction(
            transaction.id,
            user.id,
            Transaction::build(
                account,
                Decimal::TWO,
                date!(2025 - 10 - 05),
                "Coffee",
                Direction::Expense,
            )
            .reconciled(true),
            &conn,
        )
        .unwrap();

        assert_eq!(updated.name, "Coffee");
        assert_eq!(updated.amount, Decimal::TWO);
        assert!(updated.reconciled);
        assert_eq!(updated.external_id.as_deref(), Some("txn_1"));
        assert!(updated.pending);
    }

    #[test]
    fn direction_accepts_aggregator_aliases() {
        let credit: Direction = serde_json::from_str("\"credit\"").unwrap();
        let debit: Direction = serde_json::from_str("\"debit\"").unwrap();

        assert_eq!(credit, Direction::Income);
        assert_eq!(debit, Direction::Expense);
    }
}
