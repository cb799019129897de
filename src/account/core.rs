//! Account types shared by the account repository, transactions, rules and bank sync.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error, FieldErrors,
    auth::UserID,
    database_id::{AccountId, InstitutionId},
    money::MAX_AMOUNT,
};

/// The three kinds of account. Each kind is stored in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// A checking, savings or other deposit account.
    #[serde(alias = "cash-account")]
    CashAccount,
    /// A credit card.
    #[serde(alias = "credit-card")]
    CreditCard,
    /// A loan, e.g. a mortgage or personal loan.
    Loan,
}

impl AccountKind {
    /// Every kind of account.
    pub const ALL: [AccountKind; 3] = [
        AccountKind::CashAccount,
        AccountKind::CreditCard,
        AccountKind::Loan,
    ];

    /// The identifier used on the wire and in the polymorphic owner columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::CashAccount => "cash_account",
            AccountKind::CreditCard => "credit_card",
            AccountKind::Loan => "loan",
        }
    }

    /// The table that accounts of this kind are stored in.
    pub(crate) fn table_name(&self) -> &'static str {
        self.as_str()
    }
}

impl Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_account" | "cash-account" => Ok(AccountKind::CashAccount),
            "credit_card" | "credit-card" => Ok(AccountKind::CreditCard),
            "loan" => Ok(AccountKind::Loan),
            other => Err(format!("invalid account type {other:?}")),
        }
    }
}

impl ToSql for AccountKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AccountKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A reference to the account that owns a transaction or rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accountable {
    /// Which table the account lives in.
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// The ID of the account within its table.
    pub id: AccountId,
}

impl Accountable {
    /// Create a reference to the account `id` of `kind`.
    pub fn new(kind: AccountKind, id: AccountId) -> Self {
        Self { kind, id }
    }
}

impl Display for Accountable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// How an account's balance is kept up to date.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// The user enters balances and transactions by hand.
    #[default]
    Manual,
    /// Balances and transactions are synced from Plaid.
    Plaid,
}

/// The state of an externally connected account's last sync attempt.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never synced, or disconnected.
    #[default]
    Idle,
    /// A sync is in progress.
    Syncing,
    /// The last sync completed.
    Success,
    /// The last sync failed, see the account's sync error.
    Error,
}

macro_rules! text_enum_sql {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The text stored in the database for this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                match value.as_str()? {
                    $($text => Ok($name::$variant),)+
                    other => Err(FromSqlError::Other(
                        format!("invalid {} {other:?}", stringify!($name)).into(),
                    )),
                }
            }
        }
    };
}

text_enum_sql!(ConnectionType { Manual => "manual", Plaid => "plaid" });
text_enum_sql!(SyncStatus {
    Idle => "idle",
    Syncing => "syncing",
    Success => "success",
    Error => "error",
});

/// The fields that link an account to the bank-data aggregator.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ExternalConnection {
    /// Whether the account is synced.
    pub connection_type: ConnectionType,
    /// The secret used to call the aggregator for this account's item.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// The aggregator's ID for the login (item) this account belongs to.
    pub item_id: Option<String>,
    /// The aggregator's ID for this account.
    pub remote_account_id: Option<String>,
    /// The aggregator's ID for the institution.
    pub remote_institution_id: Option<String>,
    /// When the last successful sync finished.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_synced_at: Option<OffsetDateTime>,
    /// The state of the last sync attempt.
    pub sync_status: SyncStatus,
    /// Why the last sync failed.
    pub sync_error: Option<String>,
}

impl ExternalConnection {
    /// Whether the account can be synced with the aggregator.
    pub fn is_connected(&self) -> bool {
        self.connection_type == ConnectionType::Plaid
            && self.access_token.is_some()
            && self.remote_account_id.is_some()
    }
}

fn default_cash_subtype() -> String {
    "checking".to_owned()
}

fn default_loan_subtype() -> String {
    "personal".to_owned()
}

/// The fields specific to each kind of account.
///
/// The account's `type` is the variant name, so it is never stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountDetails {
    /// A checking, savings or other deposit account.
    #[serde(alias = "cash-account")]
    CashAccount {
        /// e.g. "checking" or "savings".
        #[serde(default = "default_cash_subtype")]
        subtype: String,
        /// The (masked) account number.
        #[serde(default)]
        account_number: Option<String>,
        /// The amount of money in the account.
        balance: Decimal,
    },
    /// A credit card.
    #[serde(alias = "credit-card")]
    CreditCard {
        /// The card issuer or network.
        #[serde(default)]
        brand: Option<String>,
        /// The amount owed on the card.
        balance: Decimal,
        /// The maximum amount that may be owed.
        #[serde(default)]
        credit_limit: Decimal,
    },
    /// A loan.
    Loan {
        /// e.g. "mortgage", "student" or "personal".
        #[serde(default = "default_loan_subtype")]
        subtype: String,
        /// The amount still owed.
        remaining_balance: Decimal,
        /// The amount originally borrowed.
        original_balance: Decimal,
        /// The regular repayment amount.
        #[serde(default)]
        payment_amount: Option<Decimal>,
        /// When the loan was taken out.
        #[serde(default)]
        opened_at: Option<Date>,
    },
}

impl AccountDetails {
    /// The kind of account these details belong to.
    pub fn kind(&self) -> AccountKind {
        match self {
            AccountDetails::CashAccount { .. } => AccountKind::CashAccount,
            AccountDetails::CreditCard { .. } => AccountKind::CreditCard,
            AccountDetails::Loan { .. } => AccountKind::Loan,
        }
    }

    /// The value the account adds to net worth: positive for assets, negative for debts.
    pub fn net_worth_contribution(&self) -> Decimal {
        match self {
            AccountDetails::CashAccount { balance, .. } => *balance,
            AccountDetails::CreditCard { balance, .. } => -*balance,
            AccountDetails::Loan {
                remaining_balance, ..
            } => -*remaining_balance,
        }
    }

    fn validate(&self, errors: &mut FieldErrors) {
        match self {
            AccountDetails::CashAccount {
                subtype, balance, ..
            } => {
                errors.require_text("subtype", subtype);
                errors.money_amount("balance", *balance, -MAX_AMOUNT);
            }
            AccountDetails::CreditCard {
                balance,
                credit_limit,
                ..
            } => {
                errors.money_amount("balance", *balance, -MAX_AMOUNT);
                errors.money_amount("credit_limit", *credit_limit, Decimal::ZERO);
            }
            AccountDetails::Loan {
                subtype,
                remaining_balance,
                original_balance,
                payment_amount,
                ..
            } => {
                errors.require_text("subtype", subtype);
                errors.money_amount("remaining_balance", *remaining_balance, Decimal::ZERO);
                errors.money_amount("original_balance", *original_balance, Decimal::ZERO);
                if let Some(payment_amount) = payment_amount {
                    errors.money_amount("payment_amount", *payment_amount, Decimal::ZERO);
                }
            }
        }
    }
}

/// A cash account, credit card or loan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The ID of the account within its table.
    pub id: AccountId,
    /// The user that owns the account.
    #[serde(skip)]
    pub user_id: UserID,
    /// The bank or lender that holds the account.
    pub institution_id: Option<InstitutionId>,
    /// The display name of the account.
    pub name: String,
    /// Free text notes about the account.
    pub description: Option<String>,
    /// The annual interest rate as a percentage.
    pub interest_rate: Option<Decimal>,
    /// The fields specific to the kind of account, including its type tag.
    #[serde(flatten)]
    pub details: AccountDetails,
    /// The link to the bank-data aggregator.
    #[serde(flatten)]
    pub connection: ExternalConnection,
}

impl Account {
    /// The kind of account.
    pub fn kind(&self) -> AccountKind {
        self.details.kind()
    }

    /// A reference to this account for transactions and rules.
    pub fn accountable(&self) -> Accountable {
        Accountable::new(self.kind(), self.id)
    }
}

/// The data needed to insert an account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// The bank or lender that holds the account.
    pub institution_id: Option<InstitutionId>,
    /// The display name of the account.
    pub name: String,
    /// Free text notes about the account.
    pub description: Option<String>,
    /// The annual interest rate as a percentage.
    pub interest_rate: Option<Decimal>,
    /// The fields specific to the kind of account.
    pub details: AccountDetails,
    /// The link to the bank-data aggregator.
    pub connection: ExternalConnection,
}

/// The data sent by the client to create or update a manually tracked account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountForm {
    /// The display name of the account.
    pub name: String,
    /// The bank or lender that holds the account.
    #[serde(default)]
    pub institution_id: Option<InstitutionId>,
    /// Free text notes about the account.
    #[serde(default)]
    pub description: Option<String>,
    /// The annual interest rate as a percentage.
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    /// The type tag and the fields specific to that type.
    #[serde(flatten)]
    pub details: AccountDetails,
}

impl AccountForm {
    /// Check the form for missing or out of range values.
    ///
    /// # Errors
    /// Returns [Error::Validation] describing every invalid field.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = FieldErrors::new();

        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 255);
        if let Some(interest_rate) = self.interest_rate {
            errors.min_amount("interest_rate", interest_rate, Decimal::ZERO);
        }
        self.details.validate(&mut errors);

        errors.into_result()
    }

    /// Convert the form into a manually tracked account.
    pub fn into_new_account(self) -> NewAccount {
        NewAccount {
            institution_id: self.institution_id,
            name: self.name.trim().to_owned(),
            description: self.description,
            interest_rate: self.interest_rate,
            details: self.details,
            connection: ExternalConnection::default(),
        }
    }
}
