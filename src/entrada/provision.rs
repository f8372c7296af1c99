//! Provisioning orchestration.
//!
//! `Validating → AcquiringAppToken → Resolving → (Creating | Resetting) →
//! Exchanging → Done`; any stage may fail the whole request. Nothing is rolled
//! back: an account created before a failed exchange stays created.

use crate::entrada::{
    cpf::Cpf,
    error::{ProvisionError, Stage},
    locks::PrincipalLocks,
    secret,
};
use crate::graph::{DelegatedToken, GraphError, IdentityProvider, ProvisionedCredential};
use regex::Regex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn, Span};

/// `type` value that requests the shared guest principal.
pub const GUEST_TYPE: &str = "GUEST";

pub const MAX_EXCHANGE_ATTEMPTS: u32 = 3;
pub const DEFAULT_EXCHANGE_BACKOFF: Duration = Duration::from_millis(500);

const GUEST_LOCAL_PART: &str = "guest";
const GUEST_DISPLAY_NAME: &str = "Guest";

/// Lightweight email sanity check, the directory does the real validation.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Cpf(Cpf),
    Email(String),
    Guest,
}

/// A validated inbound request; exactly one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    identifier: Identifier,
}

/// Directory principal name plus the display name used on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub display_name: String,
}

impl ProvisioningRequest {
    /// Pick the identifier: a non-empty CPF wins over a non-empty email, and
    /// the guest sentinel only counts when both are absent.
    ///
    /// # Errors
    /// Returns an input error for an invalid CPF or email, or when nothing
    /// identifies the caller.
    pub fn parse(
        cpf: Option<&str>,
        email: Option<&str>,
        kind: Option<&str>,
    ) -> Result<Self, ProvisionError> {
        // blank strings count as sent, as in the JSON the caller posted
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.is_empty())
        }

        let identifier = if let Some(cpf) = present(cpf) {
            Identifier::Cpf(Cpf::parse(cpf)?)
        } else if let Some(email) = present(email) {
            let email = email.trim();
            if !valid_email(email) {
                return Err(ProvisionError::InvalidEmail);
            }
            Identifier::Email(email.to_string())
        } else if kind == Some(GUEST_TYPE) {
            Identifier::Guest
        } else {
            return Err(ProvisionError::MissingIdentifier);
        };

        Ok(Self { identifier })
    }

    #[must_use]
    pub const fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Every guest request maps to the same `guest@{domain}` account.
    #[must_use]
    pub fn principal(&self, domain: &str) -> Principal {
        match &self.identifier {
            Identifier::Cpf(cpf) => Principal {
                name: format!("{}@{domain}", cpf.digits()),
                display_name: format!("User {}", cpf.digits()),
            },
            Identifier::Email(email) => Principal {
                name: email.clone(),
                display_name: email.clone(),
            },
            Identifier::Guest => Principal {
                name: format!("{GUEST_LOCAL_PART}@{domain}"),
                display_name: GUEST_DISPLAY_NAME.to_string(),
            },
        }
    }
}

/// Bounded retry around the delegated exchange only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeRetry {
    attempts: u32,
    backoff: Duration,
}

impl Default for ExchangeRetry {
    fn default() -> Self {
        Self::none()
    }
}

impl ExchangeRetry {
    /// `attempts` is clamped to `1..=MAX_EXCHANGE_ATTEMPTS`.
    #[must_use]
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.clamp(1, MAX_EXCHANGE_ATTEMPTS),
            backoff,
        }
    }

    /// Single attempt, failures surface immediately.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            backoff: DEFAULT_EXCHANGE_BACKOFF,
        }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait after failed attempt `attempt` (1-based): `backoff * 2^(attempt-1)`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Runs the provisioning flow against an identity provider.
#[derive(Debug)]
pub struct Provisioner<P> {
    provider: P,
    domain: String,
    retry: ExchangeRetry,
    locks: PrincipalLocks,
}

impl<P: IdentityProvider> Provisioner<P> {
    #[must_use]
    pub fn new(provider: P, domain: impl Into<String>) -> Self {
        Self {
            provider,
            domain: domain.into(),
            retry: ExchangeRetry::none(),
            locks: PrincipalLocks::new(),
        }
    }

    #[must_use]
    pub const fn with_exchange_retry(mut self, retry: ExchangeRetry) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resolve or provision the directory account for `request` and exchange a
    /// fresh password for a delegated token.
    ///
    /// # Errors
    /// Returns the first failing stage; nothing is retried except the exchange
    /// when an `ExchangeRetry` with more than one attempt is configured.
    #[instrument(skip(self, request), fields(principal = tracing::field::Empty))]
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<DelegatedToken, ProvisionError> {
        let principal = request.principal(&self.domain);
        Span::current().record("principal", principal.name.as_str());

        let _guard = self.locks.acquire(&lock_key(&principal.name)).await;

        let token = self
            .provider
            .app_token()
            .await
            .map_err(|e| failed(Stage::AcquiringAppToken, e))?;

        let account = self
            .provider
            .find_user(&token, &principal.name)
            .await
            .map_err(|e| failed(Stage::Resolving, e))?;

        let password = secret::generate().map_err(|e| {
            error!("Could not generate password: {e}");
            ProvisionError::from(e)
        })?;
        let credential = ProvisionedCredential::new(principal.name.clone(), password);

        if account.exists {
            debug!(
                account_id = account.id.as_deref().unwrap_or_default(),
                display_name = account.display_name.as_deref().unwrap_or_default(),
                "Account exists, resetting password"
            );
            self.provider
                .reset_password(&token, &credential)
                .await
                .map_err(|e| failed(Stage::Resetting, e))?;
        } else {
            info!("Account not found, creating it");
            self.provider
                .create_user(&token, &credential, &principal.display_name)
                .await
                .map_err(|e| failed(Stage::Creating, e))?;
        }

        self.exchange(&credential).await
    }

    async fn exchange(
        &self,
        credential: &ProvisionedCredential,
    ) -> Result<DelegatedToken, ProvisionError> {
        let mut attempt = 1;
        loop {
            match self.provider.exchange(credential).await {
                Ok(token) => return Ok(token),
                Err(e) if attempt < self.retry.attempts() && e.is_transient_exchange() => {
                    let backoff = self.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        status = ?e.status(),
                        "Delegated exchange failed, backing off for {} ms",
                        backoff.as_millis()
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(failed(Stage::Exchanging, e)),
            }
        }
    }
}

// Directory principal names compare case-insensitively
fn lock_key(principal_name: &str) -> String {
    principal_name.to_lowercase()
}

fn failed(stage: Stage, source: GraphError) -> ProvisionError {
    error!(
        %stage,
        status = ?source.status(),
        call = ?source.call(),
        "Provisioning failed: {source}"
    );
    ProvisionError::Upstream { stage, source }
}
