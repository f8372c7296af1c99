//! # Entrada (Directory Provisioning Bridge)
//!
//! `entrada` sits between internal callers and an external directory/identity
//! provider. Given a CPF or an email it resolves (or provisions) the matching
//! directory account and hands back a user-scoped token obtained through the
//! resource-owner password grant.
//!
//! ## Flow
//!
//! 1. **Validate** the inbound identifier (CPF checksum, email shape, or the
//!    `GUEST` sentinel).
//! 2. **Acquire** a service-level token with the client-credentials grant.
//! 3. **Resolve** the directory account by principal name (`404` means absent).
//! 4. **Create** the account, or **reset** the password of the existing one,
//!    using a freshly generated password.
//! 5. **Exchange** the principal name and that password for a delegated token.
//!
//! Generated passwords live only for the duration of a single request and are
//! never logged or returned. Any downstream failure surfaces to the caller as a
//! generic `500`; details go to the logs.

pub mod cli;
pub mod entrada;
pub mod graph;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
