//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        get_accounts_endpoint, update_account_endpoint,
    },
    auth::{auth_guard, get_log_out, post_log_in, register_user},
    bank_sync::{
        create_link_token_endpoint, disconnect_endpoint, exchange_token_endpoint,
        sync_balance_endpoint, sync_transactions_endpoint,
    },
    budget::get_budget_endpoint,
    cash_flow::get_cash_flow_endpoint,
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        update_category_endpoint,
    },
    dashboard::get_dashboard_endpoint,
    endpoints,
    goal::{create_goal_endpoint, delete_goal_endpoint, get_goals_endpoint, update_goal_endpoint},
    group::{
        create_group_endpoint, delete_group_endpoint, get_groups_endpoint, update_group_endpoint,
    },
    institution::{
        create_institution_endpoint, delete_institution_endpoint, get_institutions_endpoint,
        update_institution_endpoint,
    },
    not_found::get_404_not_found,
    report::get_reports_endpoint,
    rule::{
        apply_rules_endpoint, create_rule_endpoint, delete_rule_endpoint, get_rules_endpoint,
        update_rule_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint, import_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::USERS, post(register_user));

    let protected_routes = Router::new()
        .route(endpoints::DASHBOARD, get(get_dashboard_endpoint))
        .route(endpoints::BUDGET, get(get_budget_endpoint))
        .route(endpoints::CASH_FLOW, get(get_cash_flow_endpoint))
        .route(endpoints::REPORTS, get(get_reports_endpoint))
        .route(
            endpoints::ACCOUNTS,
            get(get_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::INSTITUTIONS,
            get(get_institutions_endpoint).post(create_institution_endpoint),
        )
        .route(
            endpoints::INSTITUTION,
            put(update_institution_endpoint).delete(delete_institution_endpoint),
        )
        .route(
            endpoints::GROUPS,
            get(get_groups_endpoint).post(create_group_endpoint),
        )
        .route(
            endpoints::GROUP,
            put(update_group_endpoint).delete(delete_group_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::RULES,
            get(get_rules_endpoint).post(create_rule_endpoint),
        )
        .route(endpoints::APPLY_RULES, post(apply_rules_endpoint))
        .route(
            endpoints::RULE,
            put(update_rule_endpoint).delete(delete_rule_endpoint),
        )
        .route(
            endpoints::GOALS,
            get(get_goals_endpoint).post(create_goal_endpoint),
        )
        .route(
            endpoints::GOAL,
            put(update_goal_endpoint).delete(delete_goal_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_API,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(endpoints::IMPORT, post(import_transactions_endpoint))
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::CREATE_LINK_TOKEN,
            post(create_link_token_endpoint),
        )
        .route(endpoints::EXCHANGE_TOKEN, post(exchange_token_endpoint))
        .route(endpoints::SYNC_BALANCE, post(sync_balance_endpoint))
        .route(
            endpoints::SYNC_TRANSACTIONS,
            post(sync_transactions_endpoint),
        )
        .route(endpoints::DISCONNECT, post(disconnect_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}
