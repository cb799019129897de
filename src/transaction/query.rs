//! Filtered, paginated transaction listing.

use rusqlite::{Connection, ToSql};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    account::AccountKind,
    auth::UserID,
    database_id::{AccountId, CategoryId},
    transaction::{
        Direction, Transaction,
        core::{TRANSACTION_COLUMNS, map_transaction_row},
    },
};

/// The number of transactions per page when the client does not ask for a page size.
pub const DEFAULT_PER_PAGE: u32 = 50;
/// The largest page size a client may ask for.
pub const MAX_PER_PAGE: u32 = 500;

/// The query parameters accepted by the transaction list endpoint.
///
/// Every filter is optional and filters are combined with AND.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct TransactionFilter {
    /// Only transactions on or after this date.
    pub start_date: Option<Date>,
    /// Only transactions on or before this date.
    pub end_date: Option<Date>,
    /// Only transactions in this category.
    pub category_id: Option<CategoryId>,
    /// Only transactions of accounts of this kind.
    pub account_type: Option<AccountKind>,
    /// Only transactions of the account with this ID, combined with `account_type`.
    pub account_id: Option<AccountId>,
    /// Only income or only expenses.
    pub direction: Option<Direction>,
    /// Only reconciled or only unreconciled transactions.
    pub reconciled: Option<bool>,
    /// The 1-based page number.
    pub page: Option<u32>,
    /// The number of transactions per page.
    pub per_page: Option<u32>,
}

/// One page of transactions.
#[derive(Debug, PartialEq, Serialize)]
pub struct TransactionPage {
    /// The transactions on this page, newest first.
    pub transactions: Vec<Transaction>,
    /// The number of transactions matching the filters across all pages.
    pub total: i64,
    /// The 1-based page number.
    pub page: u32,
    /// The maximum number of transactions per page.
    pub per_page: u32,
}

/// Get a page of the user's transactions that match `filter`, ordered by date then ID, newest
/// first.
pub fn list_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let page = filter.page.unwrap_or(1).max(1);
    let per_page = filter
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let mut clauses = vec!["user_id = ?".to_owned()];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.as_i64())];

    if let Some(start_date) = filter.start_date {
        clauses.push("date >= ?".to_owned());
        values.push(Box::new(start_date));
    }
    if let Some(end_date) = filter.end_date {
        clauses.push("date <= ?".to_owned());
        values.push(Box::new(end_date));
    }
    if let Some(category_id) = filter.category_id {
        clauses.push("category_id = ?".to_owned());
        values.push(Box::new(category_id));
    }
    if let Some(account_type) = filter.account_type {
        clauses.push("accountable_type = ?".to_owned());
        values.push(Box::new(account_type));
    }
    if let Some(account_id) = filter.account_id {
        clauses.push("accountable_id = ?".to_owned());
        values.push(Box::new(account_id));
    }
    if let Some(direction) = filter.direction {
        clauses.push("direction = ?".to_owned());
        values.push(Box::new(direction));
    }
    if let Some(reconciled) = filter.reconciled {
        clauses.push("reconciled = ?".to_owned());
        values.push(Box::new(reconciled));
    }

    let where_clause = clauses.join(" AND ");
    let params: Vec<&dyn ToSql> = values.iter().map(|value| value.as_ref()).collect();

    let total: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM \"transaction\" WHERE {where_clause}"),
        params.as_slice(),
        |row| row.get(0),
    )?;

    let limit = i64::from(per_page);
    let offset = i64::from(page - 1) * limit;
    let mut page_params = params.clone();
    page_params.push(&limit);
    page_params.push(&offset);

    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE {where_clause}
            ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
        ))?
        .query_map(page_params.as_slice(), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TransactionPage {
        transactions,
        total,
        page,
        per_page,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::{Duration, macros::date};

    use crate::{
        account::{AccountDetails, AccountKind},
        test_utils::{get_test_connection, insert_test_account, insert_test_user},
        transaction::{Direction, Transaction, create_transaction},
    };

    use super::{TransactionFilter, list_transactions};

    #[test]
    fn filters_and_paginates_newest_first() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let other_user = insert_test_user(&conn);
        let account = insert_test_account(
            user.id,
            AccountDetails::CashAccount {
                subtype: "checking".to_owned(),
                account_number: None,
                balance: Decimal::ZERO,
            },
            &conn,
        )
        .accountable();
        let other_account = insert_test_account(
            other_user.id,
            AccountDetails::CashAccount {
                subtype: "checking".to_owned(),
                account_number: None,
                balance: Decimal::ZERO,
            },
            &conn,
        )
        .accountable();
        let start = date!(2025 - 01 - 01);
        for day in 0..10 {
            let direction = if day % 2 == 0 {
                Direction::Expense
            } else {
                Direction::Income
            };
            create_transaction(
                user.id,
                Transaction::build(
                    account,
                    Decimal::from(day + 1),
                    start + Duration::days(day),
                    &format!("transaction #{day}"),
                    direction,
                ),
                &conn,
            )
            .unwrap();
        }
        create_transaction(
            other_user.id,
            Transaction::build(other_account, Decimal::ONE, start, "hidden", Direction::Expense),
            &conn,
        )
        .unwrap();

        let page = list_transactions(
            user.id,
            &TransactionFilter {
                direction: Some(Direction::Expense),
                account_type: Some(AccountKind::CashAccount),
                page: Some(2),
                per_page: Some(2),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.page, 2);
        let dates: Vec<_> = page.transactions.iter().map(|t| t.date).collect();
        assert_eq!(dates, [date!(2025 - 01 - 05), date!(2025 - 01 - 03)]);
    }

    #[test]
    fn date_range_is_inclusive() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn);
        let account = insert_test_account(
            user.id,
            AccountDetails::Loan {
                subtype: "personal".to_owned(),
                remaining_balance: Decimal::ONE,
                original_balance: Decimal::ONE,
                payment_amount: None,
                opened_at: None,
            },
            &conn,
        )
        .accountable();
        for date in [date!(2025 - 02 - 28), date!(2025 - 03 - 01), date!(2025 - 03 - 31), date!(2025 - 04 - 01)] {
            create_transaction(
                user.id,
                Transaction::build(account, Decimal::ONE, date, "Repayment", Direction::Expense),
                &conn,
            )
            .unwrap();
        }

        let page = list_transactions(
            user.id,
            &TransactionFilter {
                start_date: Some(date!(2025 - 03 - 01)),
                end_date: Some(date!(2025 - 03 - 31)),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.per_page, 50);
    }
}
