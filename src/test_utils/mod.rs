//! Helpers shared by the unit tests.

#![allow(missing_docs)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{Extension, Router};
use axum_test::TestServer;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::{Date, macros::date};

use crate::{
    AppState, PasswordHash, User, UserID,
    account::{
        Account, AccountDetails, ConnectionType, ExternalConnection, NewAccount, SyncStatus,
        insert_account,
    },
    auth::create_user,
    bank_sync::{
        AggregatorError, BankAggregator, LinkToken, RemoteAccount, RemoteTransaction,
        TokenExchange,
    },
    category::{Category, NewCategory, create_category},
    db::initialize,
    group::{Color, create_group},
};

static USER_COUNT: AtomicUsize = AtomicUsize::new(0);

/// An in-memory database with every table created.
pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");

    connection
}

/// Insert a user with a unique email address.
pub(crate) fn insert_test_user(connection: &Connection) -> User {
    let number = USER_COUNT.fetch_add(1, Ordering::Relaxed);

    create_user(
        &format!("test{number}@example.com"),
        PasswordHash::new_unchecked("hunter2"),
        connection,
    )
    .expect("Could not create test user")
}

/// Insert a manually tracked account named "Test account".
pub(crate) fn insert_test_account(
    user_id: UserID,
    details: AccountDetails,
    connection: &Connection,
) -> Account {
    let new_account = NewAccount {
        institution_id: None,
        name: "Test account".to_owned(),
        description: None,
        interest_rate: None,
        details,
        connection: ExternalConnection::default(),
    };

    insert_account(user_id, &new_account, connection).expect("Could not insert test account")
}

/// An account that is connected to the bank-data aggregator as "remote-account".
pub(crate) fn linked_account(details: AccountDetails) -> NewAccount {
    NewAccount {
        institution_id: None,
        name: "Linked account".to_owned(),
        description: None,
        interest_rate: None,
        details,
        connection: ExternalConnection {
            connection_type: ConnectionType::Plaid,
            access_token: Some("access-sandbox-token".to_owned()),
            item_id: Some("item-1".to_owned()),
            remote_account_id: Some("remote-account".to_owned()),
            remote_institution_id: Some("ins_1".to_owned()),
            last_synced_at: None,
            sync_status: SyncStatus::Idle,
            sync_error: None,
        },
    }
}

/// Insert an account connected to the bank-data aggregator with the remote ID
/// `remote_account_id`.
pub(crate) fn insert_linked_account(
    user_id: UserID,
    remote_account_id: &str,
    details: AccountDetails,
    connection: &Connection,
) -> Account {
    let mut new_account = linked_account(details);
    new_account.connection.remote_account_id = Some(remote_account_id.to_owned());

    insert_account(user_id, &new_account, connection).expect("Could not insert linked account")
}

/// Insert a category with no budget in a new gray group.
pub(crate) fn insert_test_category(
    user_id: UserID,
    name: &str,
    connection: &Connection,
) -> Category {
    let group = create_group(user_id, &format!("{name} group"), Color::Gray, connection)
        .expect("Could not create test group");

    create_category(
        user_id,
        &NewCategory {
            group_id: group.id,
            name: name.to_owned(),
            color: Color::Gray,
            monthly_budget: Decimal::ZERO,
        },
        connection,
    )
    .expect("Could not create test category")
}

/// A remote transaction dated 2025-01-15.
pub(crate) fn remote_transaction(id: &str, name: &str, amount: Decimal) -> RemoteTransaction {
    RemoteTransaction {
        transaction_id: id.to_owned(),
        account_id: "remote-account".to_owned(),
        date: date!(2025 - 01 - 15),
        name: name.to_owned(),
        amount,
        merchant_name: None,
        pending: false,
    }
}

/// A bank-data aggregator that answers from memory.
///
/// Each call fails with the matching error when it is set.
#[derive(Debug, Default, Clone)]
pub(crate) struct FakeAggregator {
    pub accounts: Vec<RemoteAccount>,
    pub transactions: Vec<RemoteTransaction>,
    pub link_error: Option<AggregatorError>,
    pub exchange_error: Option<AggregatorError>,
    pub balance_error: Option<AggregatorError>,
    pub transactions_error: Option<AggregatorError>,
    pub remove_error: Option<AggregatorError>,
}

fn fail_or<T>(error: &Option<AggregatorError>, value: T) -> Result<T, AggregatorError> {
    match error {
        Some(error) => Err(error.clone()),
        None => Ok(value),
    }
}

#[async_trait]
impl BankAggregator for FakeAggregator {
    async fn create_link_token(&self, _client_user_id: &str) -> Result<LinkToken, AggregatorError> {
        fail_or(
            &self.link_error,
            LinkToken {
                link_token: "link-sandbox-token".to_owned(),
                expiration: "2025-01-01T04:00:00Z".to_owned(),
            },
        )
    }

    async fn exchange_public_token(
        &self,
        _public_token: &str,
    ) -> Result<TokenExchange, AggregatorError> {
        fail_or(
            &self.exchange_error,
            TokenExchange {
                access_token: "access-sandbox-token".to_owned(),
                item_id: "item-1".to_owned(),
            },
        )
    }

    async fn get_accounts(
        &self,
        _access_token: &str,
    ) -> Result<Vec<RemoteAccount>, AggregatorError> {
        fail_or(&self.exchange_error, self.accounts.clone())
    }

    async fn get_balances(
        &self,
        _access_token: &str,
    ) -> Result<Vec<RemoteAccount>, AggregatorError> {
        fail_or(&self.balance_error, self.accounts.clone())
    }

    async fn get_transactions(
        &self,
        _access_token: &str,
        _account_id: &str,
        start_date: Date,
        end_date: Date,
    ) -> Result<Vec<RemoteTransaction>, AggregatorError> {
        let transactions = self
            .transactions
            .iter()
            .filter(|transaction| start_date <= transaction.date && transaction.date <= end_date)
            .cloned()
            .collect();

        fail_or(&self.transactions_error, transactions)
    }

    async fn remove_item(&self, _access_token: &str) -> Result<(), AggregatorError> {
        fail_or(&self.remove_error, ())
    }
}

/// App state over an in-memory database and a [FakeAggregator] with no accounts.
pub(crate) fn get_test_state() -> AppState {
    get_test_state_with_aggregator(FakeAggregator::default())
}

/// App state over an in-memory database and `aggregator`.
pub(crate) fn get_test_state_with_aggregator(aggregator: FakeAggregator) -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        "foobar",
        "Etc/UTC",
        Arc::new(aggregator),
    )
    .expect("Could not create test state")
}

/// A test server for `router` where every request is made as `user_id`.
pub(crate) fn get_test_server(
    router: Router<AppState>,
    state: AppState,
    user_id: UserID,
) -> TestServer {
    let app = router.layer(Extension(user_id)).with_state(state);

    TestServer::new(app)
}
