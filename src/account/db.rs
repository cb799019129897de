//! The per-kind account repository.
//!
//! Cash accounts, credit cards and loans live in separate tables that share the same common
//! and sync columns. Every query is scoped by user so that other users' accounts are reported
//! as not found.

use rusqlite::{Connection, Row, ToSql, Transaction as SqlTransaction, TransactionBehavior};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    Error,
    account::core::{
        Account, AccountDetails, AccountKind, Accountable, ExternalConnection, NewAccount,
        SyncStatus,
    },
    auth::UserID,
    money::{decimal_column, optional_decimal_column},
};

const COMMON_COLUMN_DEFINITIONS: &str = "id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    institution_id INTEGER,
    name TEXT NOT NULL,
    description TEXT,
    interest_rate TEXT,
    connection_type TEXT NOT NULL DEFAULT 'manual',
    plaid_access_token TEXT,
    plaid_item_id TEXT,
    plaid_account_id TEXT,
    plaid_institution_id TEXT,
    last_synced_at TEXT,
    sync_status TEXT NOT NULL DEFAULT 'idle',
    sync_error TEXT";

const COMMON_CONSTRAINTS: &str = "FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
    FOREIGN KEY(institution_id) REFERENCES institution(id) ON DELETE SET NULL";

const COMMON_COLUMNS: &str = "id, user_id, institution_id, name, description, interest_rate, \
    connection_type, plaid_access_token, plaid_item_id, plaid_account_id, plaid_institution_id, \
    last_synced_at, sync_status, sync_error";

/// The number of columns in [COMMON_COLUMNS].
const COMMON_COLUMN_COUNT: usize = 14;

fn specific_column_definitions(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::CashAccount => {
            "type TEXT NOT NULL DEFAULT 'checking',
            account_number TEXT,
            balance TEXT NOT NULL DEFAULT '0'"
        }
        AccountKind::CreditCard => {
            "brand TEXT,
            balance TEXT NOT NULL DEFAULT '0',
            credit_limit TEXT NOT NULL DEFAULT '0'"
        }
        AccountKind::Loan => {
            "type TEXT NOT NULL DEFAULT 'personal',
            remaining_balance TEXT NOT NULL DEFAULT '0',
            original_balance TEXT NOT NULL DEFAULT '0',
            payment_amount TEXT,
            opened_at TEXT"
        }
    }
}

fn specific_columns(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::CashAccount => "type, account_number, balance",
        AccountKind::CreditCard => "brand, balance, credit_limit",
        AccountKind::Loan => "type, remaining_balance, original_balance, payment_amount, opened_at",
    }
}

/// Create the cash account, credit card and loan tables.
pub fn create_account_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    for kind in AccountKind::ALL {
        let table = kind.table_name();

        connection.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    {COMMON_COLUMN_DEFINITIONS},
                    {},
                    {COMMON_CONSTRAINTS}
                )",
                specific_column_definitions(kind)
            ),
            (),
        )?;

        connection.execute(
            &format!("CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table}(user_id)"),
            (),
        )?;

        connection.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_plaid_account_id ON {table}(plaid_account_id)"
            ),
            (),
        )?;
    }

    Ok(())
}

fn select_sql(kind: AccountKind) -> String {
    format!(
        "SELECT {COMMON_COLUMNS}, {} FROM {}",
        specific_columns(kind),
        kind.table_name()
    )
}

fn map_account_row(kind: AccountKind, row: &Row) -> Result<Account, rusqlite::Error> {
    let offset = COMMON_COLUMN_COUNT;
    let details = match kind {
        AccountKind::CashAccount => AccountDetails::CashAccount {
            subtype: row.get(offset)?,
            account_number: row.get(offset + 1)?,
            balance: decimal_column(row, offset + 2)?,
        },
        AccountKind::CreditCard => AccountDetails::CreditCard {
            brand: row.get(offset)?,
            balance: decimal_column(row, offset + 1)?,
            credit_limit: decimal_column(row, offset + 2)?,
        },
        AccountKind::Loan => AccountDetails::Loan {
            subtype: row.get(offset)?,
            remaining_balance: decimal_column(row, offset + 1)?,
            original_balance: decimal_column(row, offset + 2)?,
            payment_amount: optional_decimal_column(row, offset + 3)?,
            opened_at: row.get(offset + 4)?,
        },
    };

    Ok(Account {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        institution_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        interest_rate: optional_decimal_column(row, 5)?,
        details,
        connection: ExternalConnection {
            connection_type: row.get(6)?,
            access_token: row.get(7)?,
            item_id: row.get(8)?,
            remote_account_id: row.get(9)?,
            remote_institution_id: row.get(10)?,
            last_synced_at: row.get(11)?,
            sync_status: row.get(12)?,
            sync_error: row.get(13)?,
        },
    })
}

/// Insert an account for `user_id`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error, e.g. an invalid institution ID.
pub fn insert_account(
    user_id: UserID,
    new_account: &NewAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    let kind = new_account.details.kind();
    let owner = user_id.as_i64();
    let interest_rate = new_account.interest_rate.map(|rate| rate.to_string());
    let external = &new_account.connection;

    let specific_values: Vec<Box<dyn ToSql>> = match &new_account.details {
        AccountDetails::CashAccount {
            subtype,
            account_number,
            balance,
        } => vec![
            Box::new(subtype.clone()),
            Box::new(account_number.clone()),
            Box::new(balance.to_string()),
        ],
        AccountDetails::CreditCard {
            brand,
            balance,
            credit_limit,
        } => vec![
            Box::new(brand.clone()),
            Box::new(balance.to_string()),
            Box::new(credit_limit.to_string()),
        ],
        AccountDetails::Loan {
            subtype,
            remaining_balance,
            original_balance,
            payment_amount,
            opened_at,
        } => vec![
            Box::new(subtype.clone()),
            Box::new(remaining_balance.to_string()),
            Box::new(original_balance.to_string()),
            Box::new(payment_amount.map(|amount| amount.to_string())),
            Box::new(*opened_at),
        ],
    };

    let mut values: Vec<&dyn ToSql> = vec![
        &owner,
        &new_account.institution_id,
        &new_account.name,
        &new_account.description,
        &interest_rate,
        &external.connection_type,
        &external.access_token,
        &external.item_id,
        &external.remote_account_id,
        &external.remote_institution_id,
        &external.last_synced_at,
        &external.sync_status,
        &external.sync_error,
    ];
    values.extend(specific_values.iter().map(|value| value.as_ref()));

    let placeholders = vec!["?"; values.len()].join(", ");
    // The ID column is filled in by SQLite.
    let columns = COMMON_COLUMNS.trim_start_matches("id, ");

    connection.execute(
        &format!(
            "INSERT INTO {} ({columns}, {}) VALUES ({placeholders})",
            kind.table_name(),
            specific_columns(kind)
        ),
        values.as_slice(),
    )?;

    let id = connection.last_insert_rowid();

    get_account(Accountable::new(kind, id), user_id, connection)
}

/// Get the account referenced by `accountable` if it belongs to `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist or belongs to another user.
pub fn get_account(
    accountable: Accountable,
    user_id: UserID,
    connection: &Connection,
) -> Result<Account, Error> {
    let kind = accountable.kind;

    connection
        .prepare(&format!("{} WHERE id = ?1 AND user_id = ?2", select_sql(kind)))?
        .query_row((accountable.id, user_id.as_i64()), |row| {
            map_account_row(kind, row)
        })
        .map_err(|error| error.into())
}

/// Get the accounts of `kind` that belong to `user_id`, ordered by name.
pub fn list_accounts(
    kind: AccountKind,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "{} WHERE user_id = ?1 ORDER BY name COLLATE NOCASE ASC, id ASC",
            select_sql(kind)
        ))?
        .query_map([user_id.as_i64()], |row| map_account_row(kind, row))?
        .map(|maybe_account| maybe_account.map_err(|error| error.into()))
        .collect()
}

/// Check whether the account exists and belongs to `user_id`.
pub fn account_exists(
    accountable: Accountable,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1 AND user_id = ?2)",
                accountable.kind.table_name()
            ),
            (accountable.id, user_id.as_i64()),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Overwrite the user editable fields of an account.
///
/// The kind of `updated.details` must match `accountable.kind`.
///
/// # Errors
/// Returns [Error::UpdateMissingAccount] if the account does not exist or belongs to another
/// user.
pub fn update_account(
    accountable: Accountable,
    user_id: UserID,
    updated: &NewAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    let owner = user_id.as_i64();
    let interest_rate = updated.interest_rate.map(|rate| rate.to_string());
    let table = accountable.kind.table_name();

    let (assignments, specific_values): (&str, Vec<Box<dyn ToSql>>) = match &updated.details {
        AccountDetails::CashAccount {
            subtype,
            account_number,
            balance,
        } if accountable.kind == AccountKind::CashAccount => (
            "type = ?5, account_number = ?6, balance = ?7",
            vec![
                Box::new(subtype.clone()),
                Box::new(account_number.clone()),
                Box::new(balance.to_string()),
            ],
        ),
        AccountDetails::CreditCard {
            brand,
            balance,
            credit_limit,
        } if accountable.kind == AccountKind::CreditCard => (
            "brand = ?5, balance = ?6, credit_limit = ?7",
            vec![
                Box::new(brand.clone()),
                Box::new(balance.to_string()),
                Box::new(credit_limit.to_string()),
            ],
        ),
        AccountDetails::Loan {
            subtype,
            remaining_balance,
            original_balance,
            payment_amount,
            opened_at,
        } if accountable.kind == AccountKind::Loan => (
            "type = ?5, remaining_balance = ?6, original_balance = ?7, payment_amount = ?8, \
            opened_at = ?9",
            vec![
                Box::new(subtype.clone()),
                Box::new(remaining_balance.to_string()),
                Box::new(original_balance.to_string()),
                Box::new(payment_amount.map(|amount| amount.to_string())),
                Box::new(*opened_at),
            ],
        ),
        _ => return Err(Error::UpdateMissingAccount),
    };

    let mut values: Vec<&dyn ToSql> = vec![
        &updated.institution_id,
        &updated.name,
        &updated.description,
        &interest_rate,
    ];
    values.extend(specific_values.iter().map(|value| value.as_ref()));
    let id_index = values.len() + 1;
    values.push(&accountable.id);
    values.push(&owner);

    let rows_affected = connection.execute(
        &format!(
            "UPDATE {table} SET institution_id = ?1, name = ?2, description = ?3, \
            interest_rate = ?4, {assignments} WHERE id = ?{id_index} AND user_id = ?{}",
            id_index + 1
        ),
        values.as_slice(),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    get_account(accountable, user_id, connection)
}

/// Delete an account together with its transactions and rules.
///
/// # Errors
/// Returns [Error::DeleteMissingAccount] if the account does not exist or belongs to another
/// user. Nothing is deleted in that case.
pub fn delete_account(
    accountable: Accountable,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let rows_affected = transaction.execute(
        &format!(
            "DELETE FROM {} WHERE id = ?1 AND user_id = ?2",
            accountable.kind.table_name()
        ),
        (accountable.id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        // Dropping the transaction rolls it back.
        return Err(Error::DeleteMissingAccount);
    }

    transaction.execute(
        "DELETE FROM \"transaction\" WHERE accountable_type = ?1 AND accountable_id = ?2",
        (accountable.kind, accountable.id),
    )?;
    transaction.execute(
        "DELETE FROM rule WHERE accountable_type = ?1 AND accountable_id = ?2",
        (accountable.kind, accountable.id),
    )?;

    transaction.commit()?;

    Ok(())
}

/// A balance reported by the bank-data aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceUpdate {
    /// The current balance of a cash account.
    Cash {
        /// The amount of money in the account.
        balance: Decimal,
    },
    /// The amount owed on a credit card and, if reported, its limit.
    CreditCard {
        /// The amount owed on the card.
        balance: Decimal,
        /// The card's limit, unchanged if `None`.
        credit_limit: Option<Decimal>,
    },
    /// The amount still owed on a loan.
    Loan {
        /// The amount still owed.
        remaining_balance: Decimal,
    },
}

/// Write a synced balance to the account.
///
/// # Errors
/// Returns [Error::UpdateMissingAccount] if the account does not exist or the balance does not
/// match the account's kind.
pub fn update_balance(
    accountable: Accountable,
    balance: BalanceUpdate,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = match (accountable.kind, balance) {
        (AccountKind::CashAccount, BalanceUpdate::Cash { balance }) => connection.execute(
            "UPDATE cash_account SET balance = ?1 WHERE id = ?2",
            (balance.to_string(), accountable.id),
        )?,
        (
            AccountKind::CreditCard,
            BalanceUpdate::CreditCard {
                balance,
                credit_limit: Some(credit_limit),
            },
        ) => connection.execute(
            "UPDATE credit_card SET balance = ?1, credit_limit = ?2 WHERE id = ?3",
            (
                balance.to_string(),
                credit_limit.to_string(),
                accountable.id,
            ),
        )?,
        (
            AccountKind::CreditCard,
            BalanceUpdate::CreditCard {
                balance,
                credit_limit: None,
            },
        ) => connection.execute(
            "UPDATE credit_card SET balance = ?1 WHERE id = ?2",
            (balance.to_string(), accountable.id),
        )?,
        (AccountKind::Loan, BalanceUpdate::Loan { remaining_balance }) => connection.execute(
            "UPDATE loan SET remaining_balance = ?1 WHERE id = ?2",
            (remaining_balance.to_string(), accountable.id),
        )?,
        _ => 0,
    };

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    Ok(())
}

/// Record that a sync of the account has started.
pub fn mark_syncing(accountable: Accountable, connection: &Connection) -> Result<(), Error> {
    set_sync_fields(accountable, SyncStatus::Syncing, None, None, connection)
}

/// Record that a sync of the account finished at `synced_at`, clearing any previous error.
pub fn mark_sync_succeeded(
    accountable: Accountable,
    synced_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    set_sync_fields(
        accountable,
        SyncStatus::Success,
        None,
        Some(synced_at),
        connection,
    )
}

/// Record that a sync of the account failed with `message`.
pub fn mark_sync_failed(
    accountable: Accountable,
    message: &str,
    connection: &Connection,
) -> Result<(), Error> {
    set_sync_fields(
        accountable,
        SyncStatus::Error,
        Some(message),
        None,
        connection,
    )
}

fn set_sync_fields(
    accountable: Accountable,
    status: SyncStatus,
    sync_error: Option<&str>,
    synced_at: Option<OffsetDateTime>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        &format!(
            "UPDATE {} SET sync_status = ?1, sync_error = ?2,
                last_synced_at = COALESCE(?3, last_synced_at)
            WHERE id = ?4",
            accountable.kind.table_name()
        ),
        (status, sync_error, synced_at, accountable.id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    Ok(())
}

/// Remove every link to the bank-data aggregator and reset the sync status to idle.
pub fn clear_external_connection(
    accountable: Accountable,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        &format!(
            "UPDATE {} SET connection_type = 'manual', plaid_access_token = NULL,
                plaid_item_id = NULL, plaid_account_id = NULL, plaid_institution_id = NULL,
                last_synced_at = NULL, sync_status = 'idle', sync_error = NULL
            WHERE id = ?1",
            accountable.kind.table_name()
        ),
        [accountable.id],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingAccount);
    }

    Ok(())
}
