//! Per-action OAuth hooks.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use acthub_core::HubError;

/// OAuth hooks an action implements to broker credentials for its
/// destination service.
///
/// The hub supplies the `redirect_uri` it exposes for this action and the
/// sealed [`OauthPayload`](crate::OauthPayload) blob; the action decides
/// provider specifics (endpoints, scopes, token shape).
#[async_trait]
pub trait OauthService: Send + Sync {
    /// Build the provider consent URL the user's browser is sent to.
    ///
    /// `encrypted_payload` must travel in the provider's `state` query
    /// parameter so it comes back on the redirect.
    async fn oauth_url(
        &self,
        redirect_uri: &str,
        encrypted_payload: &str,
    ) -> Result<Url, HubError>;

    /// Handle the provider redirect: exchange the `code` for tokens and POST
    /// the resulting credential state to the callback URL recovered from the
    /// decrypted `state` blob.
    async fn oauth_fetch_info(
        &self,
        redirect_params: HashMap<String, String>,
        redirect_uri: &str,
    ) -> Result<(), HubError>;
}
