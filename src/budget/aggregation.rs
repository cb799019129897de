//! Summing transaction amounts per category for a calendar month.

use std::{collections::HashMap, fmt::Display};

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use time::Month;

use crate::{database_id::CategoryId, transaction::Transaction};

/// The key that transaction totals are grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKey {
    /// Transactions in the category with this ID.
    Category(CategoryId),
    /// Transactions without a category.
    Uncategorized,
}

impl From<Option<CategoryId>> for CategoryKey {
    fn from(category_id: Option<CategoryId>) -> Self {
        match category_id {
            Some(id) => CategoryKey::Category(id),
            None => CategoryKey::Uncategorized,
        }
    }
}

impl Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryKey::Category(id) => write!(f, "{id}"),
            CategoryKey::Uncategorized => f.write_str("uncategorized"),
        }
    }
}

impl Serialize for CategoryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Sum the amounts of the transactions dated in `month` of `year`, grouped by category.
///
/// Transactions from any other month are ignored.
pub fn aggregate_actual_by_category(
    transactions: &[Transaction],
    year: i32,
    month: Month,
) -> HashMap<CategoryKey, Decimal> {
    let mut totals = HashMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.date.year() == year && transaction.date.month() == month)
    {
        let total = totals
            .entry(CategoryKey::from(transaction.category_id))
            .or_insert(Decimal::ZERO);
        *total = total.saturating_add(transaction.amount);
    }

    totals
}
