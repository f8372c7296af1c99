use crate::{
    cli::telemetry,
    entrada::{
        self,
        provision::{ExchangeRetry, Provisioner},
    },
    graph::{Endpoints, GraphClient, ServiceCredential},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub domain: String,
    pub authority_url: String,
    pub graph_url: String,
    pub graph_scope: String,
    pub timeout: u64,
    pub cache_app_token: bool,
    pub exchange_attempts: u32,
    pub exchange_backoff_ms: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the identity provider endpoints are invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let port = args.port;
    let result = match provisioner(args) {
        Ok(provisioner) => entrada::new(port, Arc::new(provisioner)).await,
        Err(e) => Err(e),
    };

    telemetry::shutdown_tracer();

    result
}

fn provisioner(args: Args) -> Result<Provisioner<GraphClient>> {
    let endpoints = Endpoints::default()
        .with_authority_url(args.authority_url)
        .with_graph_url(args.graph_url)
        .with_graph_scope(args.graph_scope)
        .with_timeout(Duration::from_secs(args.timeout));

    let credential = ServiceCredential::new(
        args.tenant_id,
        args.client_id,
        args.client_secret,
        args.domain.clone(),
    );

    let mut client =
        GraphClient::new(credential, &endpoints).context("Invalid identity provider settings")?;
    if args.cache_app_token {
        client = client.with_token_cache();
    }

    let retry = ExchangeRetry::new(
        args.exchange_attempts,
        Duration::from_millis(args.exchange_backoff_ms),
    );

    Ok(Provisioner::new(client, args.domain).with_exchange_retry(retry))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("tenant_id", args.tenant_id.clone()),
        ("client_id", args.client_id.clone()),
        ("client_secret", "REDACTED".to_string()),
        ("domain", args.domain.clone()),
        ("authority_url", args.authority_url.clone()),
        ("graph_url", args.graph_url.clone()),
        ("graph_scope", args.graph_scope.clone()),
        ("timeout", format!("{}s", args.timeout)),
        ("cache_app_token", args.cache_app_token.to_string()),
        ("exchange_attempts", args.exchange_attempts.to_string()),
        ("exchange_backoff", format!("{}ms", args.exchange_backoff_ms)),
    ];
    info!("{}", format_entries("Startup configuration", &entries));
}

fn format_entries(title: &str, entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", entrada_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    message
}

fn entrada_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    ENTRADA_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const ENTRADA_BANNER: &str = r"
  +-------+
  |  ___  |
  | |   | |
  | | o | |  E N T R A D A {VERSION}
  | |   | |
  +-+---+-+";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::IdentityProvider as _;

    fn args() -> Args {
        Args {
            port: 8080,
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: SecretString::from("super-secret-value".to_string()),
            domain: "example.com".to_string(),
            authority_url: "https://login.example.com".to_string(),
            graph_url: "https://graph.example.com/v1.0".to_string(),
            graph_scope: "https://graph.example.com/.default".to_string(),
            timeout: 5,
            cache_app_token: false,
            exchange_attempts: 2,
            exchange_backoff_ms: 100,
        }
    }

    #[test]
    fn test_startup_log_redacts_secret() {
        let args = args();
        let entries = [
            ("client_secret", "REDACTED".to_string()),
            ("domain", args.domain.clone()),
        ];
        let message = format_entries("Startup configuration", &entries);
        assert!(message.contains("client_secret: REDACTED"));
        assert!(message.contains("domain:        example.com"));
        assert!(!message.contains("super-secret-value"));
        assert!(!format!("{args:?}").contains("super-secret-value"));
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit(" abc "), "abc");
    }

    #[test]
    fn test_provisioner_from_args() {
        let provisioner = provisioner(args()).unwrap();
        assert_eq!(provisioner.domain(), "example.com");
        assert_eq!(provisioner.provider().domain(), "example.com");
    }

    #[test]
    fn test_provisioner_rejects_bad_url() {
        let mut args = args();
        args.authority_url = "not a url".to_string();
        assert!(provisioner(args).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_authority_fails_app_token() {
        let mut args = args();
        args.authority_url = "http://127.0.0.1:1".to_string();
        args.timeout = 1;
        let provisioner = provisioner(args).unwrap();
        assert!(provisioner.provider().app_token().await.is_err());
    }
}
