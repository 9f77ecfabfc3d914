use acthub_cipher::CipherError;
use acthub_core::HubError;

/// OAuth brokering failures.
#[derive(Debug, thiserror::Error)]
pub enum OauthError {
    /// The opaque `state` blob on the redirect could not be decrypted or
    /// decoded. A garbled or foreign blob never reaches the token endpoint.
    #[error("invalid OAuth state payload: {reason}")]
    InvalidState {
        /// What failed: decrypt, base64, or JSON shape.
        reason: String,
    },

    /// The provider redirect arrived without a required query parameter.
    #[error("missing {name} parameter in OAuth redirect")]
    MissingParam { name: String },

    /// The token endpoint rejected the authorization code.
    #[error("token exchange failed: HTTP {status} - {body}")]
    ExchangeFailed { status: u16, body: String },

    /// Posting the fresh credential state back to the caller failed.
    #[error("credential postback failed: {reason}")]
    PostbackFailed { reason: String },

    /// Network-level failure talking to the provider or caller.
    #[error("http request failed: {0}")]
    Http(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl OauthError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn missing_param(name: impl Into<String>) -> Self {
        Self::MissingParam { name: name.into() }
    }
}

impl From<reqwest::Error> for OauthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<OauthError> for HubError {
    fn from(err: OauthError) -> Self {
        HubError::oauth(err.to_string())
    }
}
