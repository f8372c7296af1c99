//! Client for the external identity provider.
//!
//! Covers the token endpoint (client-credentials and password grants) and the
//! directory `users` resource. Every call is a single round trip on a shared
//! `reqwest` client with a bounded timeout; nothing here retries.

pub mod cache;
pub mod config;
pub mod error;
mod token;
mod users;

pub use self::cache::AppTokenCache;
pub use self::config::{Endpoints, ServiceCredential};
pub use self::error::{Call, GraphError};
pub use self::users::nickname;

use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, future::Future, pin::Pin};
use url::Url;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GraphError>> + Send + 'a>>;

/// Operations the provisioning flow needs from the identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Client-credentials token for directory calls.
    fn app_token(&self) -> ProviderFuture<'_, AppAccessToken>;

    /// Look up an account by principal name; `404` yields `exists == false`.
    fn find_user<'a>(
        &'a self,
        token: &'a AppAccessToken,
        principal_name: &'a str,
    ) -> ProviderFuture<'a, DirectoryAccount>;

    fn create_user<'a>(
        &'a self,
        token: &'a AppAccessToken,
        credential: &'a ProvisionedCredential,
        display_name: &'a str,
    ) -> ProviderFuture<'a, ()>;

    fn reset_password<'a>(
        &'a self,
        token: &'a AppAccessToken,
        credential: &'a ProvisionedCredential,
    ) -> ProviderFuture<'a, ()>;

    /// Resource-owner password grant for the freshly set credential.
    fn exchange<'a>(
        &'a self,
        credential: &'a ProvisionedCredential,
    ) -> ProviderFuture<'a, DelegatedToken>;
}

/// Service-level bearer token. Never persisted, never logged.
pub struct AppAccessToken(SecretString);

impl AppAccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub(crate) fn bearer(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AppAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppAccessToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryAccount {
    pub id: Option<String>,
    pub principal_name: String,
    pub display_name: Option<String>,
    pub exists: bool,
}

impl DirectoryAccount {
    #[must_use]
    pub fn absent(principal_name: &str) -> Self {
        Self {
            principal_name: principal_name.to_string(),
            ..Self::default()
        }
    }
}

/// Principal name plus the password generated for this request only.
pub struct ProvisionedCredential {
    principal_name: String,
    password: SecretString,
}

impl ProvisionedCredential {
    #[must_use]
    pub fn new(principal_name: impl Into<String>, password: SecretString) -> Self {
        Self {
            principal_name: principal_name.into(),
            password,
        }
    }

    #[must_use]
    pub fn principal_name(&self) -> &str {
        &self.principal_name
    }

    #[must_use]
    pub const fn password(&self) -> &SecretString {
        &self.password
    }
}

impl fmt::Debug for ProvisionedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedCredential")
            .field("principal_name", &self.principal_name)
            .field("password", &"***")
            .finish()
    }
}

/// Token response of the password grant, passed through to the caller as-is.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DelegatedToken(Map<String, Value>);

impl DelegatedToken {
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl fmt::Debug for DelegatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // field names only, values are credentials
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// HTTP client bound to one tenant's token endpoint and directory API.
pub struct GraphClient {
    http: Client,
    credential: ServiceCredential,
    token_url: Url,
    graph_base: Url,
    graph_scope: String,
    cache: Option<AppTokenCache>,
}

impl GraphClient {
    /// # Errors
    /// Returns an error if an endpoint is invalid or the HTTP client cannot be built.
    pub fn new(credential: ServiceCredential, endpoints: &Endpoints) -> Result<Self, GraphError> {
        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(endpoints.timeout)
            .build()
            .map_err(GraphError::Client)?;

        Ok(Self {
            token_url: endpoints.token_url(&credential.tenant_id)?,
            graph_base: endpoints.graph_base()?,
            graph_scope: endpoints.graph_scope.clone(),
            http,
            credential,
            cache: None,
        })
    }

    /// Reuse the client-credentials token until shortly before it expires.
    #[must_use]
    pub fn with_token_cache(mut self) -> Self {
        self.cache = Some(AppTokenCache::new());
        self
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.credential.domain
    }

    fn users_url(&self) -> Result<Url, GraphError> {
        self.graph_url(&["users"])
    }

    fn user_url(&self, principal_name: &str) -> Result<Url, GraphError> {
        self.graph_url(&["users", principal_name])
    }

    fn graph_url(&self, segments: &[&str]) -> Result<Url, GraphError> {
        let mut url = self.graph_base.clone();
        url.path_segments_mut()
            .map_err(|()| GraphError::InvalidEndpoint {
                url: self.graph_base.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn forget_app_token(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate().await;
        }
    }
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("credential", &self.credential)
            .field("token_url", &self.token_url.as_str())
            .field("graph_base", &self.graph_base.as_str())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for GraphClient {
    fn app_token(&self) -> ProviderFuture<'_, AppAccessToken> {
        Box::pin(self.acquire_app_token())
    }

    fn find_user<'a>(
        &'a self,
        token: &'a AppAccessToken,
        principal_name: &'a str,
    ) -> ProviderFuture<'a, DirectoryAccount> {
        Box::pin(self.get_user(token, principal_name))
    }

    fn create_user<'a>(
        &'a self,
        token: &'a AppAccessToken,
        credential: &'a ProvisionedCredential,
        display_name: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(self.post_user(token, credential, display_name))
    }

    fn reset_password<'a>(
        &'a self,
        token: &'a AppAccessToken,
        credential: &'a ProvisionedCredential,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(self.patch_password(token, credential))
    }

    fn exchange<'a>(
        &'a self,
        credential: &'a ProvisionedCredential,
    ) -> ProviderFuture<'a, DelegatedToken> {
        Box::pin(self.password_grant(credential))
    }
}

/// Read the whole body so the status check and parsing see the same bytes.
async fn read_body(call: Call, response: Response) -> Result<(StatusCode, String), GraphError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| GraphError::Transport { call, source })?;
    Ok((status, body))
}

const fn is_failure(status: StatusCode) -> bool {
    status.as_u16() >= 400
}
