use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Outbound call made against the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    AppToken,
    Lookup,
    Create,
    Reset,
    Exchange,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AppToken => "app token",
            Self::Lookup => "directory lookup",
            Self::Create => "account creation",
            Self::Reset => "password reset",
            Self::Exchange => "delegated exchange",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{call} request failed: {source}")]
    Transport {
        call: Call,
        #[source]
        source: reqwest::Error,
    },

    #[error("token endpoint returned status {status}")]
    TokenRequestFailed { status: StatusCode },

    #[error("malformed token response from {call}")]
    MalformedTokenResponse { call: Call },

    #[error("directory lookup returned status {status}")]
    DirectoryLookupFailed { status: StatusCode },

    #[error("directory lookup returned an unreadable body")]
    MalformedDirectoryResponse,

    #[error("account creation returned status {status}")]
    AccountCreationFailed { status: StatusCode },

    #[error("password reset returned status {status}")]
    PasswordResetFailed { status: StatusCode },

    #[error("delegated exchange returned status {status}")]
    DelegatedExchangeFailed { status: StatusCode },
}

impl GraphError {
    /// The outbound call this error came from, if any.
    #[must_use]
    pub const fn call(&self) -> Option<Call> {
        match self {
            Self::InvalidEndpoint { .. } | Self::Client(_) => None,
            Self::Transport { call, .. } | Self::MalformedTokenResponse { call } => Some(*call),
            Self::TokenRequestFailed { .. } => Some(Call::AppToken),
            Self::DirectoryLookupFailed { .. } | Self::MalformedDirectoryResponse => {
                Some(Call::Lookup)
            }
            Self::AccountCreationFailed { .. } => Some(Call::Create),
            Self::PasswordResetFailed { .. } => Some(Call::Reset),
            Self::DelegatedExchangeFailed { .. } => Some(Call::Exchange),
        }
    }

    /// Upstream HTTP status, when the provider answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::TokenRequestFailed { status }
            | Self::DirectoryLookupFailed { status }
            | Self::AccountCreationFailed { status }
            | Self::PasswordResetFailed { status }
            | Self::DelegatedExchangeFailed { status } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Exchange failures worth another attempt: the provider answered with an
    /// error status or the call never completed. Unparseable bodies are final.
    #[must_use]
    pub const fn is_transient_exchange(&self) -> bool {
        matches!(
            self,
            Self::DelegatedExchangeFailed { .. }
                | Self::Transport {
                    call: Call::Exchange,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_attribution() {
        let err = GraphError::TokenRequestFailed {
            status: StatusCode::UNAUTHORIZED,
        };
        assert_eq!(err.call(), Some(Call::AppToken));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

        let err = GraphError::MalformedTokenResponse {
            call: Call::Exchange,
        };
        assert_eq!(err.call(), Some(Call::Exchange));
        assert_eq!(err.status(), None);
        assert!(!err.is_transient_exchange());

        let err = GraphError::InvalidEndpoint {
            url: "x".to_string(),
            reason: "y".to_string(),
        };
        assert_eq!(err.call(), None);
    }

    #[test]
    fn test_exchange_status_is_transient() {
        let err = GraphError::DelegatedExchangeFailed {
            status: StatusCode::BAD_REQUEST,
        };
        assert!(err.is_transient_exchange());

        let err = GraphError::PasswordResetFailed {
            status: StatusCode::BAD_REQUEST,
        };
        assert!(!err.is_transient_exchange());
    }

    #[test]
    fn test_display_names_call() {
        let err = GraphError::MalformedTokenResponse {
            call: Call::AppToken,
        };
        assert_eq!(err.to_string(), "malformed token response from app token");
    }
}
