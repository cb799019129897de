//! The request bodies for creating, updating and importing transactions.

use std::collections::BTreeSet;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;

use crate::{
    Error, FieldErrors,
    account::{Accountable, account_exists},
    auth::UserID,
    category::get_category,
    database_id::CategoryId,
    money::{MAX_AMOUNT, MONEY_SCALE},
    transaction::{Direction, Transaction, TransactionBuilder},
};

/// The data sent by the client to create or update a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionForm {
    /// The account the money moved in or out of.
    pub account: Accountable,
    /// The category of the transaction.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// The amount of money spent or earned.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of the transaction.
    pub name: String,
    /// Free text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Whether money came in or went out.
    pub direction: Direction,
    /// Whether the transaction has been checked against a statement.
    #[serde(default)]
    pub reconciled: bool,
}

impl TransactionForm {
    /// Check the fields of the form and the ownership of the account and category.
    ///
    /// # Errors
    /// Returns [Error::Validation] describing every invalid field.
    pub fn validate(
        self,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<TransactionBuilder, Error> {
        let mut errors = FieldErrors::new();
        errors.require_text("name", &self.name);
        errors.max_length("name", &self.name, 255);
        errors.money_amount("amount", self.amount, Decimal::ZERO);
        check_owner(self.account, self.category_id, user_id, &mut errors, connection)?;
        errors.into_result()?;

        Ok(Transaction::build(
            self.account,
            self.amount,
            self.date,
            self.name.trim(),
            self.direction,
        )
        .category_id(self.category_id)
        .notes(self.notes)
        .reconciled(self.reconciled))
    }
}

fn check_owner(
    account: Accountable,
    category_id: Option<CategoryId>,
    user_id: UserID,
    errors: &mut FieldErrors,
    connection: &Connection,
) -> Result<(), Error> {
    if !account_exists(account, user_id, connection)? {
        errors.add("account", "The selected account does not exist.");
    }

    if let Some(category_id) = category_id {
        match get_category(category_id, user_id, connection) {
            Ok(_) => {}
            Err(Error::NotFound) => {
                errors.add("category_id", "The selected category does not exist.");
            }
            Err(error) => return Err(error),
        }
    }

    Ok(())
}

/// One row of a transaction import.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    /// The category of the transaction.
    #[serde(default, alias = "category")]
    pub category_id: Option<CategoryId>,
    /// The amount of money spent or earned.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of the transaction.
    pub name: String,
    /// Free text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Whether money came in or went out.
    pub direction: Direction,
}

/// A batch of transactions for one account.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    /// The account every row belongs to.
    pub account: Accountable,
    /// The rows to import.
    pub transactions: Vec<ImportRow>,
}

impl ImportRequest {
    /// Check every row and the ownership of the account and categories.
    ///
    /// Row errors are reported against the `transactions` field with the index of the first
    /// invalid row.
    ///
    /// # Errors
    /// Returns [Error::Validation] describing the invalid fields.
    pub fn validate(
        self,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<Vec<TransactionBuilder>, Error> {
        let mut errors = FieldErrors::new();

        if self.transactions.is_empty() {
            errors.add("transactions", "At least one transaction is required.");
        }

        for (index, row) in self.transactions.iter().enumerate() {
            if row.name.trim().is_empty() {
                errors.add(
                    "transactions",
                    format!("Transaction {index} is missing a name."),
                );
            } else if row.amount < Decimal::ZERO {
                errors.add(
                    "transactions",
                    format!("Transaction {index} has a negative amount."),
                );
            } else if row.amount > MAX_AMOUNT || row.amount.normalize().scale() > MONEY_SCALE {
                errors.add(
                    "transactions",
                    format!("Transaction {index} has an invalid amount."),
                );
            }
        }

        if !account_exists(self.account, user_id, connection)? {
            errors.add("account", "The selected account does not exist.");
        }

        let category_ids: BTreeSet<CategoryId> = self
            .transactions
            .iter()
            .filter_map(|row| row.category_id)
            .collect();
        for category_id in category_ids {
            match get_category(category_id, user_id, connection) {
                Ok(_) => {}
                Err(Error::NotFound) => errors.add(
                    "category_id",
                    format!("Category {category_id} does not exist."),
                ),
                Err(error) => return Err(error),
            }
        }

        errors.into_result()?;

        let account = self.account;
        Ok(self
            .transactions
            .into_iter()
            .map(|row| {
                Transaction::build(
                    account,
                    row.amount,
                    row.date,
                    row.name.trim(),
                    row.direction,
                )
                .category_id(row.category_id)
                .notes(row.notes)
            })
            .collect())
    }
}
