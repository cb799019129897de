use std::{fs::OpenOptions, net::SocketAddr, process::exit, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use pocketledger::{
    AppState, PlaidClient, PlaidConfig, PlaidEnvironment, build_router, graceful_shutdown,
    logging_middleware,
};

/// The JSON API server for pocketledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone used to work out the current month,
    /// e.g. "Pacific/Auckland".
    #[arg(long, env = "TIMEZONE", default_value = "Etc/UTC")]
    timezone: String,

    /// The secret used to sign and encrypt the auth cookies.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,

    /// The Plaid client ID.
    #[arg(long, env = "PLAID_CLIENT_ID", default_value = "")]
    plaid_client_id: String,

    /// The Plaid secret for the chosen environment.
    #[arg(long, env = "PLAID_SECRET", hide_env_values = true, default_value = "")]
    plaid_secret: String,

    /// The Plaid environment to connect to.
    #[arg(long, env = "PLAID_ENV", value_enum, default_value_t = PlaidEnvironment::Sandbox)]
    plaid_env: PlaidEnvironment,

    /// The application name shown to users when linking a bank.
    #[arg(long, env = "PLAID_CLIENT_NAME", default_value = "pocketledger")]
    client_name: String,

    /// How long to wait for Plaid before giving up on a request.
    #[arg(long, env = "AGGREGATOR_TIMEOUT_SECS", default_value_t = 30)]
    aggregator_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    if args.plaid_client_id.is_empty() || args.plaid_secret.is_empty() {
        tracing::warn!("PLAID_CLIENT_ID or PLAID_SECRET is not set, bank sync will not work.");
    }

    let plaid_client = match PlaidClient::new(PlaidConfig {
        client_id: args.plaid_client_id,
        secret: args.plaid_secret,
        environment: args.plaid_env,
        client_name: args.client_name,
        request_timeout: Duration::from_secs(args.aggregator_timeout_secs),
    }) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!("Could not create the Plaid client: {error}");
            exit(1);
        }
    };

    let connection = match Connection::open(&args.db_path) {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not open the database at {}: {error}", args.db_path);
            exit(1);
        }
    };

    let state = match AppState::new(
        connection,
        &args.secret,
        &args.timezone,
        Arc::new(plaid_client),
    ) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the app state: {error}");
            exit(1);
        }
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!(
        "HTTP server listening on {addr} (Plaid {})",
        args.plaid_env
    );

    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server stopped with an error: {error}");
        exit(1);
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = match OpenOptions::new().create(true).append(true).open("debug.log") {
        Ok(file) => file,
        Err(error) => {
            eprintln!("Could not create log file: {error}");
            exit(1);
        }
    };

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
