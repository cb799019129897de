//! Linking accounts to the bank-data aggregator and pulling their balances and transactions.
//!
//! The database lock is only held between aggregator calls, never across them.

use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};

use crate::{
    Error, FieldErrors,
    account::{
        AccountDetails, AccountKind, Accountable, BalanceUpdate, ConnectionType,
        ExternalConnection, NewAccount, SyncStatus, clear_external_connection, get_account,
        insert_account, mark_sync_failed, mark_sync_succeeded, mark_syncing, update_balance,
    },
    auth::UserID,
    bank_sync::aggregator::{BankAggregator, RemoteAccount, RemoteTransaction},
    institution::{UNKNOWN_INSTITUTION_NAME, find_or_create_institution},
    rule::{apply_rules, get_account_rules},
    transaction::{Direction, Transaction, create_transaction, external_id_exists},
};

/// How far back transactions are synced when no start date is given.
pub const DEFAULT_SYNC_DAYS: i64 = 30;

/// The institution chosen by the user in the linking flow.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InstitutionMetadata {
    /// The aggregator's ID for the institution.
    pub institution_id: Option<String>,
    /// The display name of the institution.
    pub name: Option<String>,
}

/// The result of refreshing an account's balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSync {
    /// The balance reported by the aggregator.
    pub balance: Decimal,
    /// When the sync finished.
    #[serde(with = "time::serde::rfc3339")]
    pub synced_at: OffsetDateTime,
}

/// The counts from pulling an account's transactions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionSync {
    /// The number of new transactions stored.
    pub imported: usize,
    /// The number of transactions that were already stored.
    pub skipped: usize,
    /// The number of transactions the aggregator returned.
    pub total: usize,
}

/// The credentials needed to call the aggregator about one local account.
struct Link {
    access_token: String,
    remote_account_id: String,
}

fn lock(db_connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Load the aggregator credentials of a connected account owned by `user_id`.
///
/// # Errors
/// Returns [Error::AccountNotConnected] if the account does not exist, belongs to another
/// user, or is not connected to the aggregator.
fn get_link(
    accountable: Accountable,
    user_id: UserID,
    connection: &Connection,
) -> Result<Link, Error> {
    let account = match get_account(accountable, user_id, connection) {
        Ok(account) => account,
        Err(Error::NotFound) => return Err(Error::AccountNotConnected),
        Err(error) => return Err(error),
    };

    if account.connection.connection_type != ConnectionType::Plaid {
        return Err(Error::AccountNotConnected);
    }

    match (
        account.connection.access_token,
        account.connection.remote_account_id,
    ) {
        (Some(access_token), Some(remote_account_id)) => Ok(Link {
            access_token,
            remote_account_id,
        }),
        _ => Err(Error::AccountNotConnected),
    }
}

/// Turn a remote account into a local one, or `None` for unsupported account types.
fn to_new_account(
    remote: &RemoteAccount,
    institution_id: i64,
    institution_name: &str,
    connection: ExternalConnection,
) -> Option<NewAccount> {
    let balance = remote.balances.current.unwrap_or(Decimal::ZERO);

    let details = match remote.account_type.as_str() {
        "depository" => AccountDetails::CashAccount {
            subtype: remote
                .subtype
                .clone()
                .unwrap_or_else(|| "checking".to_owned()),
            account_number: remote.mask.clone(),
            balance,
        },
        "credit" => AccountDetails::CreditCard {
            brand: Some(institution_name.to_owned()),
            balance,
            credit_limit: remote.balances.limit.unwrap_or(Decimal::ZERO),
        },
        "loan" => AccountDetails::Loan {
            subtype: remote
                .subtype
                .clone()
                .unwrap_or_else(|| "personal".to_owned()),
            remaining_balance: balance,
            original_balance: balance,
            payment_amount: None,
            opened_at: None,
        },
        _ => return None,
    };

    Some(NewAccount {
        institution_id: Some(institution_id),
        name: remote.name.clone(),
        description: None,
        interest_rate: None,
        details,
        connection,
    })
}

/// Exchange the public token from the linking flow and create a local account for each
/// supported remote account.
///
/// All accounts are created in one SQL transaction, so either every account is stored or none
/// are.
///
/// # Errors
/// Returns [Error::BankSyncFailed] if the aggregator calls or the database writes fail.
pub async fn exchange_token(
    public_token: &str,
    institution: InstitutionMetadata,
    user_id: UserID,
    aggregator: &dyn BankAggregator,
    db_connection: &Mutex<Connection>,
) -> Result<Vec<Accountable>, Error> {
    let failed = |message: String| {
        tracing::error!("token exchange failed for user {user_id}: {message}");
        Error::BankSyncFailed {
            action: "connect accounts",
            message,
        }
    };

    let exchange = aggregator
        .exchange_public_token(public_token)
        .await
        .map_err(|error| failed(error.to_string()))?;
    let remote_accounts = aggregator
        .get_accounts(&exchange.access_token)
        .await
        .map_err(|error| failed(error.to_string()))?;

    let connection = lock(db_connection)?;
    let store = || -> Result<Vec<Accountable>, Error> {
        let sql_transaction = connection.unchecked_transaction()?;
        let institution_record = find_or_create_institution(
            institution.institution_id.as_deref(),
            institution.name.as_deref(),
            &sql_transaction,
        )?;
        let institution_name = match institution.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN_INSTITUTION_NAME,
        };
        let now = OffsetDateTime::now_utc();
        let mut created = Vec::new();

        for remote in &remote_accounts {
            let external = ExternalConnection {
                connection_type: ConnectionType::Plaid,
                access_token: Some(exchange.access_token.clone()),
                item_id: Some(exchange.item_id.clone()),
                remote_account_id: Some(remote.account_id.clone()),
                remote_institution_id: institution.institution_id.clone(),
                last_synced_at: Some(now),
                sync_status: SyncStatus::Success,
                sync_error: None,
            };

            let Some(new_account) =
                to_new_account(remote, institution_record.id, institution_name, external)
            else {
                tracing::info!(
                    "skipping remote account {} with unsupported type {:?}",
                    remote.account_id,
                    remote.account_type
                );
                continue;
            };

            let account = insert_account(user_id, &new_account, &sql_transaction)?;
            created.push(account.accountable());
        }

        sql_transaction.commit()?;

        Ok(created)
    };

    let created = store().map_err(|error| failed(error.to_string()))?;
    tracing::info!("connected {} accounts for user {user_id}", created.len());

    Ok(created)
}

/// Record the outcome of a sync, passing through the result.
///
/// Failures set the account's status to error and are returned as [Error::BankSyncFailed].
fn finish_sync<T>(
    accountable: Accountable,
    action: &'static str,
    outcome: Result<T, String>,
    connection: &Connection,
) -> Result<T, Error> {
    match outcome {
        Ok(value) => {
            mark_sync_succeeded(accountable, OffsetDateTime::now_utc(), connection)?;
            Ok(value)
        }
        Err(message) => {
            tracing::error!("could not {action} for {accountable}: {message}");
            mark_sync_failed(accountable, &message, connection)?;
            Err(Error::BankSyncFailed { action, message })
        }
    }
}

/// Map the remote balances onto the update for the local account's kind.
fn balance_update(kind: AccountKind, remote: &RemoteAccount) -> BalanceUpdate {
    let current = remote.balances.current.unwrap_or(Decimal::ZERO);

    match kind {
        AccountKind::CashAccount => BalanceUpdate::Cash { balance: current },
        AccountKind::CreditCard => BalanceUpdate::CreditCard {
            balance: current,
            credit_limit: remote.balances.limit,
        },
        AccountKind::Loan => BalanceUpdate::Loan {
            remaining_balance: current,
        },
    }
}

/// Refresh the balance of a connected account.
///
/// # Errors
/// Returns [Error::AccountNotConnected] if the account is not the user's or is not connected,
/// and [Error::BankSyncFailed] if the aggregator call fails or does not report the account.
pub async fn sync_balance(
    accountable: Accountable,
    user_id: UserID,
    aggregator: &dyn BankAggregator,
    db_connection: &Mutex<Connection>,
) -> Result<BalanceSync, Error> {
    let link = {
        let connection = lock(db_connection)?;
        let link = get_link(accountable, user_id, &connection)?;
        mark_syncing(accountable, &connection)?;
        link
    };

    let fetched = aggregator.get_balances(&link.access_token).await;

    let connection = lock(db_connection)?;
    let outcome = fetched
        .map_err(|error| error.to_string())
        .and_then(|remote_accounts| {
            remote_accounts
                .into_iter()
                .find(|remote| remote.account_id == link.remote_account_id)
                .ok_or_else(|| "Account not found in Plaid response".to_owned())
        })
        .and_then(|remote| {
            let update = balance_update(accountable.kind, &remote);
            update_balance(accountable, update, &connection)
                .map(|_| remote.balances.current.unwrap_or(Decimal::ZERO))
                .map_err(|error| error.to_string())
        });

    let balance = finish_sync(accountable, "sync balance", outcome, &connection)?;
    let synced_at = get_account(accountable, user_id, &connection)?
        .connection
        .last_synced_at
        .unwrap_or_else(OffsetDateTime::now_utc);

    Ok(BalanceSync { balance, synced_at })
}

/// The date range to sync, defaulting to the [DEFAULT_SYNC_DAYS] days up to `today`.
///
/// # Errors
/// Returns a validation error if the start date is after the end date.
pub fn resolve_sync_range(
    start_date: Option<Date>,
    end_date: Option<Date>,
    today: Date,
) -> Result<(Date, Date), Error> {
    let end_date = end_date.unwrap_or(today);
    let start_date = start_date.unwrap_or(today - Duration::days(DEFAULT_SYNC_DAYS));

    if start_date > end_date {
        return Err(FieldErrors::single(
            "start_date",
            "The start date must be on or before the end date.",
        ));
    }

    Ok((start_date, end_date))
}

/// Store the remote transactions that are not stored yet, applying the account's rules.
fn store_remote_transactions(
    accountable: Accountable,
    user_id: UserID,
    remote_transactions: &[RemoteTransaction],
    connection: &Connection,
) -> Result<TransactionSync, Error> {
    let rules = get_account_rules(accountable, connection)?;
    let sql_transaction = connection.unchecked_transaction()?;
    let mut counts = TransactionSync {
        total: remote_transactions.len(),
        ..Default::default()
    };

    for remote in remote_transactions {
        if external_id_exists(&remote.transaction_id, &sql_transaction)? {
            counts.skipped += 1;
            continue;
        }

        let direction = if remote.amount > Decimal::ZERO {
            Direction::Expense
        } else {
            Direction::Income
        };
        let mut builder = Transaction::build(
            accountable,
            remote.amount.abs(),
            remote.date,
            &remote.name,
            direction,
        )
        .external_id(Some(remote.transaction_id.clone()))
        .merchant_name(remote.merchant_name.clone())
        .pending(remote.pending);

        if let Some(outcome) = apply_rules(&rules, &builder.name, None, false) {
            builder.name = outcome.name;
            builder.category_id = outcome.category_id;
        }

        create_transaction(user_id, builder, &sql_transaction)?;
        counts.imported += 1;
    }

    sql_transaction.commit()?;

    Ok(counts)
}

/// Pull the transactions of a connected account dated between `start_date` and `end_date`.
///
/// Transactions that were synced before are skipped.
///
/// # Errors
/// Returns [Error::AccountNotConnected] if the account is not the user's or is not connected,
/// and [Error::BankSyncFailed] if the aggregator call or storing the transactions fails.
pub async fn sync_transactions(
    accountable: Accountable,
    (start_date, end_date): (Date, Date),
    user_id: UserID,
    aggregator: &dyn BankAggregator,
    db_connection: &Mutex<Connection>,
) -> Result<TransactionSync, Error> {
    let link = {
        let connection = lock(db_connection)?;
        let link = get_link(accountable, user_id, &connection)?;
        mark_syncing(accountable, &connection)?;
        link
    };

    let fetched = aggregator
        .get_transactions(
            &link.access_token,
            &link.remote_account_id,
            start_date,
            end_date,
        )
        .await;

    let connection = lock(db_connection)?;
    let outcome = fetched
        .map_err(|error| error.to_string())
        .and_then(|remote_transactions| {
            store_remote_transactions(accountable, user_id, &remote_transactions, &connection)
                .map_err(|error| error.to_string())
        });

    let counts = finish_sync(accountable, "sync transactions", outcome, &connection)?;
    tracing::info!(
        "synced transactions for {accountable}: {} imported, {} skipped",
        counts.imported,
        counts.skipped
    );

    Ok(counts)
}

/// Unlink an account from the aggregator and clear its external fields.
///
/// A failure to remove the item at the aggregator is logged and otherwise ignored.
///
/// # Errors
/// Returns [Error::AccountNotConnected] if the account is not the user's or is not connected.
pub async fn disconnect(
    accountable: Accountable,
    user_id: UserID,
    aggregator: &dyn BankAggregator,
    db_connection: &Mutex<Connection>,
) -> Result<(), Error> {
    let link = {
        let connection = lock(db_connection)?;
        get_link(accountable, user_id, &connection)?
    };

    if let Err(error) = aggregator.remove_item(&link.access_token).await {
        tracing::warn!("could not remove aggregator item for {accountable}: {error}");
    }

    let connection = lock(db_connection)?;
    clear_external_connection(accountable, &connection)?;
    tracing::info!("disconnected {accountable}");

    Ok(())
}
