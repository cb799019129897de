//! Matching transaction names against an account's rules.

use crate::{database_id::CategoryId, rule::Rule};

/// The result of applying the first matching rule to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    /// The transaction's name after the rule's rename.
    pub name: String,
    /// The transaction's category after the rule was applied.
    pub category_id: Option<CategoryId>,
}

/// Check if a transaction name contains the rule's search string (case-insensitive).
///
/// An empty search string never matches.
#[inline]
fn matches_rule(name: &str, search_string: &str) -> bool {
    !search_string.is_empty() && name.to_lowercase().contains(&search_string.to_lowercase())
}

/// Find the rule that applies to a transaction named `name`.
///
/// Rules are tried in ascending ID order regardless of the order of `rules`, and the first
/// match wins.
pub fn find_matching_rule<'a>(rules: &'a [Rule], name: &str) -> Option<&'a Rule> {
    rules
        .iter()
        .filter(|rule| matches_rule(name, &rule.search_string))
        .min_by_key(|rule| rule.id)
}

/// Apply the first matching rule to a transaction.
///
/// The name is replaced when the rule has a non-empty replace string. The rule's category is
/// assigned when `overwrite_category` is set or the transaction has no category.
///
/// Returns `None` if no rule matches.
pub fn apply_rules(
    rules: &[Rule],
    name: &str,
    category_id: Option<CategoryId>,
    overwrite_category: bool,
) -> Option<RuleOutcome> {
    let rule = find_matching_rule(rules, name)?;

    let name = if rule.replace_string.is_empty() {
        name.to_owned()
    } else {
        rule.replace_string.clone()
    };

    let category_id = match category_id {
        Some(existing) if !overwrite_category => Some(existing),
        _ => Some(rule.category_id),
    };

    Some(RuleOutcome { name, category_id })
}
