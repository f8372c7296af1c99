use crate::entrada::provision::{Provisioner, ProvisioningRequest};
use crate::graph::GraphClient;
use axum::{
    body::Bytes,
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct TokenRequest {
    /// CPF digits, punctuation allowed
    #[serde(default)]
    cpf: Option<String>,
    #[serde(default)]
    email: Option<String>,
    /// `GUEST` for the shared guest account
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    error: String,
}

/// Shape of the identity provider's password-grant response, forwarded as-is.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: Option<u64>,
    scope: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
}

#[utoipa::path(
    post,
    path = "/token",
    request_body = TokenRequest,
    responses (
        (status = 200, description = "Delegated token for the resolved account", body = TokenResponse),
        (status = 400, description = "Invalid or missing identifier", body = ErrorBody),
        (status = 500, description = "Identity provider call failed", body = ErrorBody)
    ),
    tag = "token",
)]
// The body is decoded as JSON whatever Content-Type the client sent
#[instrument(skip(provisioner, body))]
pub async fn token(
    Extension(provisioner): Extension<Arc<Provisioner<GraphClient>>>,
    body: Bytes,
) -> Response {
    let request = match serde_json::from_slice::<TokenRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            debug!("Rejected request body: {}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad request" })),
            )
                .into_response();
        }
    };

    let request = match ProvisioningRequest::parse(
        request.cpf.as_deref(),
        request.email.as_deref(),
        request.kind.as_deref(),
    ) {
        Ok(request) => request,
        Err(err) => {
            debug!("Invalid identifier: {}", err);
            return err.into_response();
        }
    };

    match provisioner.provision(&request).await {
        Ok(token) => {
            let mut headers = HeaderMap::new();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            (StatusCode::OK, headers, Json(token)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
