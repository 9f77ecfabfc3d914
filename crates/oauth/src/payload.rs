//! The encrypted blob that rides the provider's `state` query parameter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use acthub_cipher::StateCipher;

use crate::error::OauthError;

/// Everything the hub needs to finish a flow it does not remember starting.
///
/// Minted when the consent link is built, carried opaquely by the provider
/// through the user's browser, and decrypted again on the redirect. The hub
/// itself stores nothing in between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OauthPayload {
    /// Where to POST the freshly minted credential state.
    #[serde(rename = "stateurl")]
    pub callback_url: String,
}

impl OauthPayload {
    pub fn new(callback_url: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
        }
    }

    /// Seal the payload for the round trip through the provider.
    pub fn encrypt(&self, cipher: &StateCipher) -> Result<String, OauthError> {
        let plaintext = serde_json::to_vec(self)
            .map_err(|e| OauthError::invalid_state(e.to_string()))?;
        Ok(cipher.encrypt(&plaintext)?)
    }

    /// Open a payload that came back on the redirect. Fails closed: a blob
    /// this deployment's key cannot open is rejected, never trusted.
    pub fn decrypt(cipher: &StateCipher, blob: &str) -> Result<Self, OauthError> {
        let plaintext = cipher.decrypt(blob)?;
        serde_json::from_slice(&plaintext).map_err(|e| OauthError::invalid_state(e.to_string()))
    }
}

/// Credential standing derived from the caller's `state_json` parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum StateStatus {
    /// A state blob was present and readable.
    Authorized(serde_json::Value),
    /// No state, or a blob that neither parsed as JSON nor decrypted.
    Unauthenticated,
}

impl StateStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }
}

/// Inspect the caller-supplied `state_json` parameter.
///
/// Earlier protocol versions sent plain JSON, current ones send the
/// encrypted wrapper; both resolve to `Authorized`. Anything unreadable is
/// `Unauthenticated`, which prompts a fresh consent link rather than an
/// error.
pub fn resolve_state(cipher: &StateCipher, params: &HashMap<String, String>) -> StateStatus {
    match params.get("state_json") {
        Some(raw) if !raw.is_empty() => match cipher.resolve(raw).into_value() {
            Some(value) => StateStatus::Authorized(value),
            None => StateStatus::Unauthenticated,
        },
        _ => StateStatus::Unauthenticated,
    }
}
