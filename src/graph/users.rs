use super::{
    is_failure, read_body, AppAccessToken, Call, DirectoryAccount, GraphClient, GraphError,
    ProvisionedCredential,
};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

/// Mail nickname for a principal: its local part with every non-alphanumeric
/// character removed.
#[must_use]
pub fn nickname(principal_name: &str) -> String {
    principal_name
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

impl GraphClient {
    #[instrument(skip(self, token))]
    pub(super) async fn get_user(
        &self,
        token: &AppAccessToken,
        principal_name: &str,
    ) -> Result<DirectoryAccount, GraphError> {
        let url = self.user_url(principal_name)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token.bearer())
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                call: Call::Lookup,
                source,
            })?;

        let (status, body) = read_body(Call::Lookup, response).await?;

        if status == StatusCode::NOT_FOUND {
            debug!("No directory account for {principal_name}");
            return Ok(DirectoryAccount::absent(principal_name));
        }

        if is_failure(status) {
            self.reject(status).await;
            error!(%status, "Directory lookup failed for {principal_name}");
            debug!("directory lookup body: {body}");
            return Err(GraphError::DirectoryLookupFailed { status });
        }

        let user: GraphUser = serde_json::from_str(&body).map_err(|e| {
            error!("Invalid JSON for user {principal_name}: {e}");
            GraphError::MalformedDirectoryResponse
        })?;

        Ok(DirectoryAccount {
            id: user.id,
            principal_name: user
                .user_principal_name
                .unwrap_or_else(|| principal_name.to_string()),
            display_name: user.display_name,
            exists: true,
        })
    }

    #[instrument(skip(self, token, credential), fields(principal = %credential.principal_name()))]
    pub(super) async fn post_user(
        &self,
        token: &AppAccessToken,
        credential: &ProvisionedCredential,
        display_name: &str,
    ) -> Result<(), GraphError> {
        let payload = json!({
            "accountEnabled": true,
            "displayName": display_name,
            "mailNickname": nickname(credential.principal_name()),
            "userPrincipalName": credential.principal_name(),
            "passwordProfile": {
                "forceChangePasswordNextSignIn": false,
                "password": credential.password().expose_secret(),
            },
        });

        let response = self
            .http
            .post(self.users_url()?)
            .bearer_auth(token.bearer())
            .json(&payload)
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                call: Call::Create,
                source,
            })?;

        let (status, body) = read_body(Call::Create, response).await?;

        if is_failure(status) {
            self.reject(status).await;
            error!(%status, "Account creation failed");
            debug!("account creation body: {body}");
            return Err(GraphError::AccountCreationFailed { status });
        }

        Ok(())
    }

    #[instrument(skip(self, token, credential), fields(principal = %credential.principal_name()))]
    pub(super) async fn patch_password(
        &self,
        token: &AppAccessToken,
        credential: &ProvisionedCredential,
    ) -> Result<(), GraphError> {
        let payload = json!({
            "passwordProfile": {
                "forceChangePasswordNextSignIn": false,
                "password": credential.password().expose_secret(),
            },
        });

        let response = self
            .http
            .patch(self.user_url(credential.principal_name())?)
            .bearer_auth(token.bearer())
            .json(&payload)
            .send()
            .await
            .map_err(|source| GraphError::Transport {
                call: Call::Reset,
                source,
            })?;

        let (status, body) = read_body(Call::Reset, response).await?;

        if is_failure(status) {
            self.reject(status).await;
            error!(%status, "Password reset failed");
            debug!("password reset body: {body}");
            return Err(GraphError::PasswordResetFailed { status });
        }

        Ok(())
    }

    /// A `401` from the directory means the app token is no good anymore.
    async fn reject(&self, status: StatusCode) {
        if status == StatusCode::UNAUTHORIZED {
            debug!("Directory rejected app token, dropping cached token");
            self.forget_app_token().await;
        }
    }
}
