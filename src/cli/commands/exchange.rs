use crate::entrada::provision::MAX_EXCHANGE_ATTEMPTS;
use clap::{Arg, Command};

pub const ARG_EXCHANGE_ATTEMPTS: &str = "exchange-attempts";
pub const ARG_EXCHANGE_BACKOFF_MS: &str = "exchange-backoff-ms";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EXCHANGE_ATTEMPTS)
                .long(ARG_EXCHANGE_ATTEMPTS)
                .help("Attempts for the delegated token exchange, 1 disables retries")
                .default_value("1")
                .env("ENTRADA_EXCHANGE_ATTEMPTS")
                .value_parser(clap::value_parser!(u32).range(1..=i64::from(MAX_EXCHANGE_ATTEMPTS))),
        )
        .arg(
            Arg::new(ARG_EXCHANGE_BACKOFF_MS)
                .long(ARG_EXCHANGE_BACKOFF_MS)
                .help("Initial backoff between exchange attempts in milliseconds, doubled each retry")
                .default_value("500")
                .env("ENTRADA_EXCHANGE_BACKOFF_MS")
                .value_parser(clap::value_parser!(u64)),
        )
}
