//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/goals/{goal_id}', use [format_endpoint].

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register users.
pub const USERS: &str = "/api/users";

/// The dashboard bundle: net worth, budget and cash-flow summaries, and goals.
pub const DASHBOARD: &str = "/api/dashboard";
/// The budget page bundle for a month.
pub const BUDGET: &str = "/api/budget";
/// The cash-flow page bundle for a month.
pub const CASH_FLOW: &str = "/api/cash-flow";
/// The reports bundle for a date range.
pub const REPORTS: &str = "/api/reports";

/// The route to list and create accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to access a single account of a given kind.
pub const ACCOUNT: &str = "/api/accounts/{kind}/{account_id}";

/// The route to list and create institutions.
pub const INSTITUTIONS: &str = "/api/institutions";
/// The route to access a single institution.
pub const INSTITUTION: &str = "/api/institutions/{institution_id}";

/// The route to list and create category groups.
pub const GROUPS: &str = "/api/groups";
/// The route to access a single category group.
pub const GROUP: &str = "/api/groups/{group_id}";

/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";

/// The route to list and create rules.
pub const RULES: &str = "/api/rules";
/// The route to access a single rule.
pub const RULE: &str = "/api/rules/{rule_id}";
/// The route to apply an account's rules to its stored transactions.
pub const APPLY_RULES: &str = "/api/rules/apply";

/// The route to list and create goals.
pub const GOALS: &str = "/api/goals";
/// The route to access a single goal.
pub const GOAL: &str = "/api/goals/{goal_id}";

/// The route to access transactions.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to import a batch of transactions for one account.
pub const IMPORT: &str = "/api/transactions/import";

/// The route to start linking a bank login.
pub const CREATE_LINK_TOKEN: &str = "/api/bank-sync/create-link-token";
/// The route to finish linking a bank login and create its accounts.
pub const EXCHANGE_TOKEN: &str = "/api/bank-sync/exchange-token";
/// The route to refresh a connected account's balance.
pub const SYNC_BALANCE: &str = "/api/bank-sync/sync-balance";
/// The route to import a connected account's recent transactions.
pub const SYNC_TRANSACTIONS: &str = "/api/bank-sync/sync-transactions";
/// The route to unlink an account from its bank login.
pub const DISCONNECT: &str = "/api/bank-sync/disconnect";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/goals/{goal_id}', '{goal_id}' is the parameter.
///
/// Only the first parameter is replaced, so paths with several parameters can be formatted
/// by calling this function once per parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl std::fmt::Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::LOG_IN_API,
            endpoints::LOG_OUT,
            endpoints::USERS,
            endpoints::DASHBOARD,
            endpoints::BUDGET,
            endpoints::CASH_FLOW,
            endpoints::REPORTS,
            endpoints::ACCOUNTS,
            endpoints::ACCOUNT,
            endpoints::INSTITUTIONS,
            endpoints::INSTITUTION,
            endpoints::GROUPS,
            endpoints::GROUP,
            endpoints::CATEGORIES,
            endpoints::CATEGORY,
            endpoints::RULES,
            endpoints::RULE,
            endpoints::APPLY_RULES,
            endpoints::GOALS,
            endpoints::GOAL,
            endpoints::TRANSACTIONS_API,
            endpoints::TRANSACTION,
            endpoints::IMPORT,
            endpoints::CREATE_LINK_TOKEN,
            endpoints::EXCHANGE_TOKEN,
            endpoints::SYNC_BALANCE,
            endpoints::SYNC_TRANSACTIONS,
            endpoints::DISCONNECT,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        // Parameter with single word should also work.
        let formatted_path = format_endpoint("/hello/{world}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn formats_one_parameter_at_a_time() {
        let formatted_path = format_endpoint(endpoints::ACCOUNT, "loan");
        let formatted_path = format_endpoint(&formatted_path, 7);

        assert_eq!(formatted_path, "/api/accounts/loan/7");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
