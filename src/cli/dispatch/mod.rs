use crate::cli::{
    actions::{server::Args, Action},
    commands::{exchange, provider},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .cloned()
            .with_context(|| format!("missing required argument: --{name}"))
    };

    Ok(Action::Server(Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        tenant_id: required(provider::ARG_TENANT_ID)?,
        client_id: required(provider::ARG_CLIENT_ID)?,
        client_secret: SecretString::from(required(provider::ARG_CLIENT_SECRET)?),
        domain: required(provider::ARG_DOMAIN)?,
        authority_url: required(provider::ARG_AUTHORITY_URL)?,
        graph_url: required(provider::ARG_GRAPH_URL)?,
        graph_scope: required(provider::ARG_GRAPH_SCOPE)?,
        timeout: matches
            .get_one::<u64>(provider::ARG_TIMEOUT)
            .copied()
            .unwrap_or(crate::graph::config::DEFAULT_TIMEOUT_SECONDS),
        cache_app_token: matches.get_flag(provider::ARG_CACHE_APP_TOKEN),
        exchange_attempts: matches
            .get_one::<u32>(exchange::ARG_EXCHANGE_ATTEMPTS)
            .copied()
            .unwrap_or(1),
        exchange_backoff_ms: matches
            .get_one::<u64>(exchange::ARG_EXCHANGE_BACKOFF_MS)
            .copied()
            .unwrap_or(500),
    }))
}
