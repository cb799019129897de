//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of a transaction.
pub type TransactionId = DatabaseId;
/// The ID of a cash account, credit card or loan within its own table.
pub type AccountId = DatabaseId;
/// The ID of a category.
pub type CategoryId = DatabaseId;
/// The ID of a category group.
pub type GroupId = DatabaseId;
/// The ID of a categorisation rule.
pub type RuleId = DatabaseId;
/// The ID of a savings goal.
pub type GoalId = DatabaseId;
/// The ID of a financial institution.
pub type InstitutionId = DatabaseId;
