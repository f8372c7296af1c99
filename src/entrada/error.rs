use crate::entrada::{cpf::CpfError, secret::RandomSourceUnavailable};
use crate::graph::{Call, GraphError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Caller-facing classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing identifier; the caller can fix it.
    Input,
    /// App token or delegated exchange rejected by the provider.
    UpstreamAuth,
    /// Lookup, creation or password reset failed.
    UpstreamDirectory,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Input => StatusCode::BAD_REQUEST,
            Self::UpstreamAuth | Self::UpstreamDirectory | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Where in the provisioning flow a request stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    AcquiringAppToken,
    Resolving,
    Creating,
    Resetting,
    Exchanging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::AcquiringAppToken => "acquiring app token",
            Self::Resolving => "resolving",
            Self::Creating => "creating",
            Self::Resetting => "resetting",
            Self::Exchanging => "exchanging",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("CPF must contain exactly 11 digits")]
    InvalidIdentifierFormat,

    #[error("CPF failed validation")]
    InvalidIdentifier,

    #[error("email is not a valid address")]
    InvalidEmail,

    #[error("cpf or email or type=GUEST required")]
    MissingIdentifier,

    #[error(transparent)]
    RandomSourceUnavailable(#[from] RandomSourceUnavailable),

    #[error("{stage} failed: {source}")]
    Upstream {
        stage: Stage,
        #[source]
        source: GraphError,
    },
}

impl From<CpfError> for ProvisionError {
    fn from(err: CpfError) -> Self {
        match err {
            CpfError::InvalidFormat => Self::InvalidIdentifierFormat,
            CpfError::Invalid => Self::InvalidIdentifier,
        }
    }
}

impl ProvisionError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifierFormat
            | Self::InvalidIdentifier
            | Self::InvalidEmail
            | Self::MissingIdentifier => ErrorKind::Input,
            Self::RandomSourceUnavailable(_) => ErrorKind::Internal,
            Self::Upstream { source, .. } => match source.call() {
                Some(Call::AppToken | Call::Exchange) => ErrorKind::UpstreamAuth,
                Some(Call::Lookup | Call::Create | Call::Reset) => ErrorKind::UpstreamDirectory,
                None => ErrorKind::Internal,
            },
        }
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Upstream { stage, .. } => *stage,
            Self::RandomSourceUnavailable(_) => Stage::Resolving,
            _ => Stage::Validating,
        }
    }

    /// Message safe to show the caller; upstream detail stays in the logs.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidIdentifierFormat | Self::InvalidIdentifier => "invalid CPF",
            Self::InvalidEmail => "invalid email",
            Self::MissingIdentifier => "cpf or email or type=GUEST required",
            Self::RandomSourceUnavailable(_) | Self::Upstream { .. } => INTERNAL_ERROR_MESSAGE,
        }
    }
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        (
            self.kind().status_code(),
            Json(json!({ "error": self.public_message() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_bad_request() {
        for err in [
            ProvisionError::InvalidIdentifierFormat,
            ProvisionError::InvalidIdentifier,
            ProvisionError::InvalidEmail,
            ProvisionError::MissingIdentifier,
        ] {
            assert_eq!(err.kind(), ErrorKind::Input);
            assert_eq!(err.kind().status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(err.stage(), Stage::Validating);
        }
    }

    #[test]
    fn test_upstream_classification() {
        let err = ProvisionError::Upstream {
            stage: Stage::AcquiringAppToken,
            source: GraphError::TokenRequestFailed {
                status: StatusCode::UNAUTHORIZED,
            },
        };
        assert_eq!(err.kind(), ErrorKind::UpstreamAuth);
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);

        let err = ProvisionError::Upstream {
            stage: Stage::Resetting,
            source: GraphError::PasswordResetFailed {
                status: StatusCode::FORBIDDEN,
            },
        };
        assert_eq!(err.kind(), ErrorKind::UpstreamDirectory);
        assert_eq!(err.kind().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.stage(), Stage::Resetting);
    }

    #[test]
    fn test_public_message_hides_upstream_detail() {
        let err = ProvisionError::Upstream {
            stage: Stage::Exchanging,
            source: GraphError::DelegatedExchangeFailed {
                status: StatusCode::BAD_REQUEST,
            },
        };
        assert!(err.to_string().contains("400"));
        assert!(!err.public_message().contains("400"));
    }

    #[test]
    fn test_cpf_error_mapping() {
        assert!(matches!(
            ProvisionError::from(CpfError::InvalidFormat),
            ProvisionError::InvalidIdentifierFormat
        ));
        assert!(matches!(
            ProvisionError::from(CpfError::Invalid),
            ProvisionError::InvalidIdentifier
        ));
    }
}
