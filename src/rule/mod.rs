//! Rules that rename and categorise transactions whose name contains a search string.

mod apply;
mod core;
mod db;
mod endpoints;
mod engine;

pub use apply::apply_rules_endpoint;
pub use core::{Rule, RuleForm, UpdateRuleForm};
pub(crate) use db::{create_rule, update_rule};
pub use db::{create_rule_table, delete_rule, get_account_rules, list_rules};
pub use endpoints::{
    create_rule_endpoint, delete_rule_endpoint, get_rules_endpoint, update_rule_endpoint,
};
pub use engine::apply_rules;
