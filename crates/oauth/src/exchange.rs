//! Token-exchange and postback plumbing shared by adapter `OauthService`
//! implementations.

use serde::Deserialize;
use url::Url;

use crate::error::OauthError;

/// Token endpoint response, authorization-code grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// One configured authorization-code exchange against a provider's token
/// endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    pub token_endpoint: Url,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl TokenExchange {
    /// Swap an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> Result<TokenResponse, OauthError> {
        tracing::debug!(
            endpoint = %self.token_endpoint,
            client_id = %self.client_id,
            "exchanging authorization code"
        );

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = http
            .post(self.token_endpoint.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = %status, "token exchange rejected");
            return Err(OauthError::ExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| OauthError::ExchangeFailed {
            status: status.as_u16(),
            body: format!("unparseable token response: {e}"),
        })
    }
}

/// POST fresh credential state to the caller's callback URL.
///
/// This is the only write-back the stateless flow performs: the caller
/// stores the blob and replays it as `state_json` on later requests.
pub async fn post_state_to_callback(
    http: &reqwest::Client,
    callback_url: &str,
    state: &serde_json::Value,
) -> Result<(), OauthError> {
    let url = Url::parse(callback_url)
        .map_err(|e| OauthError::invalid_state(format!("bad callback url: {e}")))?;

    let response = http.post(url).json(state).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(OauthError::PostbackFailed {
            reason: format!("HTTP {status}"),
        });
    }
    tracing::debug!(callback = %callback_url, "credential state posted");
    Ok(())
}
