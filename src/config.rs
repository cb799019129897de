//! Settings for connecting to the bank-data aggregator.

use std::{fmt::Display, time::Duration};

use clap::ValueEnum;

/// The Plaid environment that API requests are sent to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlaidEnvironment {
    /// Test environment with fake institutions and credentials.
    #[default]
    Sandbox,
    /// Development environment with real institutions and a limited number of items.
    Development,
    /// Live environment.
    Production,
}

impl PlaidEnvironment {
    /// The base URL of the Plaid API for this environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

impl Display for PlaidEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaidEnvironment::Sandbox => "sandbox",
            PlaidEnvironment::Development => "development",
            PlaidEnvironment::Production => "production",
        };

        write!(f, "{name}")
    }
}

/// Credentials and options for the Plaid API client.
#[derive(Clone)]
pub struct PlaidConfig {
    /// The Plaid client ID.
    pub client_id: String,
    /// The Plaid secret for `environment`.
    pub secret: String,
    /// Which Plaid environment to talk to.
    pub environment: PlaidEnvironment,
    /// The application name shown to users in Plaid Link.
    pub client_name: String,
    /// The timeout applied to every request sent to Plaid.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for PlaidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaidConfig")
            .field("client_id", &self.client_id)
            .field("secret", &"********")
            .field("environment", &self.environment)
            .field("client_name", &self.client_name)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
