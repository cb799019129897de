use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, FieldErrors,
    account::{Accountable, account_exists},
    auth::UserID,
    category::get_category,
    database_id::{CategoryId, RuleId},
};

/// A rule that renames and categorises an account's transactions whose name contains
/// `search_string`. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Hash)]
pub struct Rule {
    /// The ID of the rule. Rules with smaller IDs take precedence.
    pub id: RuleId,
    /// The account whose transactions the rule applies to.
    pub account: Accountable,
    /// The text a transaction name must contain for the rule to match.
    pub search_string: String,
    /// The new name for matching transactions, or empty to keep the name.
    pub replace_string: String,
    /// The category assigned to matching transactions.
    pub category_id: CategoryId,
}

/// The data sent by the client to create a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleForm {
    /// The account whose transactions the rule applies to.
    pub account: Accountable,
    /// The text a transaction name must contain.
    pub search_string: String,
    /// The new name for matching transactions, empty if omitted.
    #[serde(default)]
    pub replace_string: Option<String>,
    /// The category assigned to matching transactions.
    pub category_id: CategoryId,
}

/// The data sent by the client to update a rule. The account of a rule cannot be changed.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRuleForm {
    /// The text a transaction name must contain.
    pub search_string: String,
    /// The new name for matching transactions, empty if omitted.
    #[serde(default)]
    pub replace_string: Option<String>,
    /// The category assigned to matching transactions.
    pub category_id: CategoryId,
}

/// The validated fields of a rule, without its account.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RuleFields {
    pub search_string: String,
    pub replace_string: String,
    pub category_id: CategoryId,
}

impl UpdateRuleForm {
    /// Check the fields and that the category belongs to `user_id`.
    pub(crate) fn validate(
        self,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<RuleFields, Error> {
        let mut errors = FieldErrors::new();
        let fields = validate_fields(self, user_id, &mut errors, connection)?;
        errors.into_result()?;

        Ok(fields)
    }
}

impl RuleForm {
    /// Check the fields and that the account and category belong to `user_id`.
    pub(crate) fn validate(
        self,
        user_id: UserID,
        connection: &Connection,
    ) -> Result<(Accountable, RuleFields), Error> {
        let mut errors = FieldErrors::new();

        if !account_exists(self.account, user_id, connection)? {
            errors.add("account", "The selected account does not exist.");
        }

        let account = self.account;
        let fields = validate_fields(
            UpdateRuleForm {
                search_string: self.search_string,
                replace_string: self.replace_string,
                category_id: self.category_id,
            },
            user_id,
            &mut errors,
            connection,
        )?;
        errors.into_result()?;

        Ok((account, fields))
    }
}

fn validate_fields(
    form: UpdateRuleForm,
    user_id: UserID,
    errors: &mut FieldErrors,
    connection: &Connection,
) -> Result<RuleFields, Error> {
    let replace_string = form.replace_string.unwrap_or_default();

    errors.require_text("search_string", &form.search_string);
    errors.max_length("search_string", &form.search_string, 255);
    errors.max_length("replace_string", &replace_string, 255);

    match get_category(form.category_id, user_id, connection) {
        Ok(_) => {}
        Err(Error::NotFound) => errors.add("category_id", "The selected category does not exist."),
        Err(error) => return Err(error),
    }

    Ok(RuleFields {
        search_string: form.search_string.trim().to_owned(),
        replace_string: replace_string.trim().to_owned(),
        category_id: form.category_id,
    })
}
