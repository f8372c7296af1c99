use super::error::GraphError;
use secrecy::SecretString;
use std::{fmt, time::Duration};
use url::Url;

pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

/// Scope requested by the delegated (password) grant.
pub const DELEGATED_SCOPE: &str = "openid profile offline_access";

/// Process-wide identity provider credentials, loaded once at startup.
pub struct ServiceCredential {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Directory domain suffix used to derive principal names.
    pub domain: String,
}

impl ServiceCredential {
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
            domain: domain.into(),
        }
    }
}

impl fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Where the identity provider lives and how long we wait for it.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authority_url: String,
    pub graph_url: String,
    pub graph_scope: String,
    pub timeout: Duration,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            graph_scope: DEFAULT_GRAPH_SCOPE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl Endpoints {
    #[must_use]
    pub fn with_authority_url(mut self, url: impl Into<String>) -> Self {
        self.authority_url = url.into();
        self
    }

    #[must_use]
    pub fn with_graph_url(mut self, url: impl Into<String>) -> Self {
        self.graph_url = url.into();
        self
    }

    #[must_use]
    pub fn with_graph_scope(mut self, scope: impl Into<String>) -> Self {
        self.graph_scope = scope.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{authority}/{tenant}/oauth2/v2.0/token`
    ///
    /// # Errors
    /// Returns an error if the resulting URL does not parse.
    pub fn token_url(&self, tenant_id: &str) -> Result<Url, GraphError> {
        let raw = format!(
            "{}/{tenant_id}/oauth2/v2.0/token",
            self.authority_url.trim_end_matches('/')
        );

        Url::parse(&raw).map_err(|e| GraphError::InvalidEndpoint {
            url: raw,
            reason: e.to_string(),
        })
    }

    /// Base URL of the directory API; user paths are appended as segments.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or cannot carry path segments.
    pub fn graph_base(&self) -> Result<Url, GraphError> {
        let url = Url::parse(&self.graph_url).map_err(|e| GraphError::InvalidEndpoint {
            url: self.graph_url.clone(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(GraphError::InvalidEndpoint {
                url: self.graph_url.clone(),
                reason: "URL cannot be a base".to_string(),
            });
        }

        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_url() {
        let endpoints = Endpoints::default();
        let url = endpoints.token_url("contoso").unwrap();
        assert_eq!(
            url.as_str(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_token_url_trailing_slash() {
        let endpoints = Endpoints::default().with_authority_url("http://127.0.0.1:9000/");
        let url = endpoints.token_url("t1").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/t1/oauth2/v2.0/token");
    }

    #[test]
    fn test_graph_base_rejects_garbage() {
        let endpoints = Endpoints::default().with_graph_url("not a url");
        assert!(endpoints.graph_base().is_err());

        let endpoints = Endpoints::default().with_graph_url("mailto:someone@example.com");
        assert!(endpoints.graph_base().is_err());
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let credential = ServiceCredential::new(
            "tenant",
            "client",
            SecretString::from("super-secret".to_string()),
            "example.com",
        );
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
        assert!(debug.contains("example.com"));
    }
}
