use crate::graph::config::{DEFAULT_AUTHORITY_URL, DEFAULT_GRAPH_SCOPE, DEFAULT_GRAPH_URL};
use clap::{Arg, ArgAction, Command};

pub const ARG_TENANT_ID: &str = "tenant-id";
pub const ARG_CLIENT_ID: &str = "client-id";
pub const ARG_CLIENT_SECRET: &str = "client-secret";
pub const ARG_DOMAIN: &str = "domain";
pub const ARG_AUTHORITY_URL: &str = "authority-url";
pub const ARG_GRAPH_URL: &str = "graph-url";
pub const ARG_GRAPH_SCOPE: &str = "graph-scope";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_CACHE_APP_TOKEN: &str = "cache-app-token";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TENANT_ID)
                .long(ARG_TENANT_ID)
                .help("Directory tenant id")
                .env("ENTRADA_TENANT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_ID)
                .long(ARG_CLIENT_ID)
                .help("Application (client) id registered in the tenant")
                .env("ENTRADA_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CLIENT_SECRET)
                .long(ARG_CLIENT_SECRET)
                .help("Application client secret")
                .env("ENTRADA_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_DOMAIN)
                .long(ARG_DOMAIN)
                .help("Directory domain used for principal names, example: contoso.onmicrosoft.com")
                .env("ENTRADA_DOMAIN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_AUTHORITY_URL)
                .long(ARG_AUTHORITY_URL)
                .help("Token authority base URL")
                .default_value(DEFAULT_AUTHORITY_URL)
                .env("ENTRADA_AUTHORITY_URL"),
        )
        .arg(
            Arg::new(ARG_GRAPH_URL)
                .long(ARG_GRAPH_URL)
                .help("Directory API base URL")
                .default_value(DEFAULT_GRAPH_URL)
                .env("ENTRADA_GRAPH_URL"),
        )
        .arg(
            Arg::new(ARG_GRAPH_SCOPE)
                .long(ARG_GRAPH_SCOPE)
                .help("Scope requested with the client-credentials grant")
                .default_value(DEFAULT_GRAPH_SCOPE)
                .env("ENTRADA_GRAPH_SCOPE"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long(ARG_TIMEOUT)
                .help("Timeout in seconds for every identity provider call")
                .default_value("15")
                .env("ENTRADA_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CACHE_APP_TOKEN)
                .long(ARG_CACHE_APP_TOKEN)
                .help("Reuse the client-credentials token until shortly before it expires")
                .env("ENTRADA_CACHE_APP_TOKEN")
                .action(ArgAction::SetTrue),
        )
}
