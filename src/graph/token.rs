use super::{
    config::DELEGATED_SCOPE, is_failure, read_body, AppAccessToken, Call, DelegatedToken,
    GraphClient, GraphError, ProvisionedCredential,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, instrument};

#[derive(Debug, Deserialize)]
struct ClientCredentialsResponse {
    #[serde(default)]
    access_token: String,
    // some tenants still send it as a string
    #[serde(default)]
    expires_in: Option<Value>,
}

impl ClientCredentialsResponse {
    fn expires_in(&self) -> Option<u64> {
        self.expires_in
            .as_ref()
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
    }
}

impl GraphClient {
    /// Client-credentials grant, served from the cache when one is configured.
    #[instrument(skip(self))]
    pub(super) async fn acquire_app_token(&self) -> Result<AppAccessToken, GraphError> {
        if let Some(cache) = &self.cache {
            if let Some(token) = cache.get().await {
                debug!("Using cached app token");
                return Ok(token);
            }
        }

        let (token, expires_in) = self.request_app_token().await?;

        if let Some(cache) = &self.cache {
            cache.store(&token, expires_in).await;
        }

        Ok(token)
    }

    async fn request_app_token(&self) -> Result<(AppAccessToken, Option<u64>), GraphError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credential.client_id.as_str()),
            (
                "client_secret",
                self.credential.client_secret.expose_secret(),
            ),
            ("scope", self.graph_scope.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                call: Call::AppToken,
                source,
            })?;

        let (status, body) = read_body(Call::AppToken, response).await?;

        if is_failure(status) {
            error!(%status, endpoint = %self.token_url, "Token endpoint rejected client credentials");
            debug!("token endpoint body: {body}");
            return Err(GraphError::TokenRequestFailed { status });
        }

        let parsed: ClientCredentialsResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Invalid JSON from token endpoint: {e}");
            GraphError::MalformedTokenResponse {
                call: Call::AppToken,
            }
        })?;

        if parsed.access_token.is_empty() {
            error!("Token response missing access_token");
            return Err(GraphError::MalformedTokenResponse {
                call: Call::AppToken,
            });
        }

        let expires_in = parsed.expires_in();

        Ok((AppAccessToken::new(parsed.access_token), expires_in))
    }

    /// Resource-owner password grant for a principal whose password was just set.
    #[instrument(skip(self, credential), fields(principal = %credential.principal_name()))]
    pub(super) async fn password_grant(
        &self,
        credential: &ProvisionedCredential,
    ) -> Result<DelegatedToken, GraphError> {
        let params = [
            ("grant_type", "password"),
            ("client_id", self.credential.client_id.as_str()),
            (
                "client_secret",
                self.credential.client_secret.expose_secret(),
            ),
            ("scope", DELEGATED_SCOPE),
            ("username", credential.principal_name()),
            ("password", credential.password().expose_secret()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                call: Call::Exchange,
                source,
            })?;

        let (status, body) = read_body(Call::Exchange, response).await?;

        if is_failure(status) {
            error!(%status, endpoint = %self.token_url, "Delegated exchange rejected");
            debug!("delegated exchange body: {body}");
            return Err(GraphError::DelegatedExchangeFailed { status });
        }

        let fields: Map<String, Value> = serde_json::from_str(&body).map_err(|e| {
            error!("Invalid JSON from delegated exchange: {e}");
            GraphError::MalformedTokenResponse {
                call: Call::Exchange,
            }
        })?;

        Ok(DelegatedToken::new(fields))
    }
}
