#![forbid(unsafe_code)]

//! # acthub-cipher
//!
//! Symmetric encryption of opaque credential state blobs (AES-256-GCM).
//!
//! The hub keeps no session between requests; whatever an action needs to
//! remember travels through the caller as an opaque JSON blob, optionally
//! wrapped as `{cid, payload}` where `payload` is ciphertext. Consumers
//! attempt a plain JSON decode first and fall back to decrypt-then-decode.
//!
//! Key material is process-wide, loaded once, never mutated; encrypt and
//! decrypt are safe to call concurrently. A cipher constructed without key
//! material fails every encrypt/decrypt call — plaintext is never passed
//! through when encryption was requested.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Errors from cipher operations.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// No key material was configured. Surfaced immediately on any
    /// encrypt/decrypt call rather than silently passing plaintext through.
    #[error("cipher key material is not configured")]
    MissingKey,

    /// The configured key is not 32 bytes of valid base64.
    #[error("invalid cipher key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,

    /// Decryption failed: wrong key, tampered ciphertext or malformed blob.
    #[error("decryption failed")]
    Decrypt,

    /// The decrypted plaintext was not valid JSON.
    #[error("decrypted state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An encrypted opaque state blob as it travels through the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedState {
    /// Key identifier, letting deployments rotate keys without breaking
    /// blobs encrypted under the previous one.
    pub cid: String,
    /// Base64 of nonce-prefixed AES-256-GCM ciphertext.
    pub payload: String,
}

/// Outcome of resolving a raw `state_json` parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum StateResolution {
    /// The blob was plain JSON.
    Plain(serde_json::Value),
    /// The blob was encrypted and decrypted successfully.
    Decrypted(serde_json::Value),
    /// Neither plain decode nor decryption succeeded; the request is
    /// treated as unauthenticated.
    Absent,
}

impl StateResolution {
    /// The resolved state value, if any.
    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            Self::Plain(v) | Self::Decrypted(v) => Some(v),
            Self::Absent => None,
        }
    }
}

/// Process-wide cipher for opaque state blobs.
pub struct StateCipher {
    key: Option<Key<Aes256Gcm>>,
    key_id: String,
}

impl std::fmt::Debug for StateCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCipher")
            .field("key_id", &self.key_id)
            .field("configured", &self.key.is_some())
            .finish()
    }
}

impl StateCipher {
    /// Create a cipher from 32 bytes of key material.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: Some(*Key::<Aes256Gcm>::from_slice(&key)),
            key_id: "1".into(),
        }
    }

    /// Create a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKey(format!("key must be {KEY_LEN} bytes")))?;
        Ok(Self::new(key))
    }

    /// Read the key from an environment variable (base64).
    pub fn from_env(var: &str) -> Result<Self, CipherError> {
        match std::env::var(var) {
            Ok(value) if !value.is_empty() => Self::from_base64(&value),
            _ => Err(CipherError::MissingKey),
        }
    }

    /// A cipher with no key material. Every encrypt/decrypt fails with
    /// [`CipherError::MissingKey`].
    pub fn unconfigured() -> Self {
        Self {
            key: None,
            key_id: "0".into(),
        }
    }

    /// Label key material with an identifier carried in `WrappedState.cid`.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        let key = self.key.as_ref().ok_or(CipherError::MissingKey)?;
        Ok(Aes256Gcm::new(key))
    }

    /// Encrypt arbitrary bytes into a base64 blob (nonce-prefixed).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(blob))
    }

    /// Decrypt a base64 blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Tampered ciphertext fails (GCM authentication) rather than returning
    /// corrupted plaintext.
    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>, CipherError> {
        let cipher = self.cipher()?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(blob.trim())
            .map_err(|_| CipherError::Decrypt)?;
        if bytes.len() <= NONCE_LEN {
            return Err(CipherError::Decrypt);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)
    }

    /// Encrypt a JSON value into a `{cid, payload}` wrapper.
    pub fn encrypt_state(&self, state: &serde_json::Value) -> Result<WrappedState, CipherError> {
        let plaintext = serde_json::to_vec(state)?;
        Ok(WrappedState {
            cid: self.key_id.clone(),
            payload: self.encrypt(&plaintext)?,
        })
    }

    /// Decrypt a `{cid, payload}` wrapper back into a JSON value.
    pub fn decrypt_state(&self, wrapped: &WrappedState) -> Result<serde_json::Value, CipherError> {
        let plaintext = self.decrypt(&wrapped.payload)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Resolve a raw opaque state blob: plain JSON decode first, then
    /// decrypt-then-decode, any failure of both yielding `Absent`.
    pub fn resolve(&self, raw: &str) -> StateResolution {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            // A wrapped blob is itself valid JSON; unwrap it before
            // treating the value as plain state.
            if let Ok(wrapped) = serde_json::from_value::<WrappedState>(value.clone()) {
                return match self.decrypt_state(&wrapped) {
                    Ok(inner) => StateResolution::Decrypted(inner),
                    Err(_) => StateResolution::Absent,
                };
            }
            return StateResolution::Plain(value);
        }
        match self
            .decrypt(raw)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(CipherError::from))
        {
            Ok(value) => StateResolution::Decrypted(value),
            Err(_) => StateResolution::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cipher() -> StateCipher {
        StateCipher::new([7u8; 32])
    }

    #[test]
    fn round_trip_arbitrary_json() {
        let c = cipher();
        for value in [
            serde_json::json!({"access_token": "abc", "refresh_token": "def"}),
            serde_json::json!([1, 2, 3]),
            serde_json::json!("just a string"),
            serde_json::json!(null),
        ] {
            let wrapped = c.encrypt_state(&value).unwrap();
            assert_eq!(c.decrypt_state(&wrapped).unwrap(), value);
        }
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher();
        let wrapped = c.encrypt_state(&serde_json::json!({"t": 1})).unwrap();

        let mut bytes = base64::engine::general_purpose::STANDARD
            .decode(&wrapped.payload)
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = WrappedState {
            cid: wrapped.cid,
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
        };

        assert!(matches!(
            c.decrypt_state(&tampered),
            Err(CipherError::Decrypt)
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let wrapped = cipher().encrypt_state(&serde_json::json!({"t": 1})).unwrap();
        let other = StateCipher::new([8u8; 32]);
        assert!(other.decrypt_state(&wrapped).is_err());
    }

    #[test]
    fn unconfigured_cipher_fails_closed() {
        let c = StateCipher::unconfigured();
        assert!(matches!(c.encrypt(b"x"), Err(CipherError::MissingKey)));
        assert!(matches!(c.decrypt("eA=="), Err(CipherError::MissingKey)));
    }

    #[test]
    fn resolve_plain_json_first() {
        let c = cipher();
        let resolution = c.resolve(r#"{"access_token": "plain"}"#);
        assert_eq!(
            resolution,
            StateResolution::Plain(serde_json::json!({"access_token": "plain"}))
        );
    }

    #[test]
    fn resolve_unwraps_encrypted_blob() {
        let c = cipher();
        let state = serde_json::json!({"access_token": "secret"});
        let wrapped = c.encrypt_state(&state).unwrap();
        let raw = serde_json::to_string(&wrapped).unwrap();

        assert_eq!(c.resolve(&raw), StateResolution::Decrypted(state));
    }

    #[test]
    fn resolve_bare_ciphertext() {
        let c = cipher();
        let blob = c.encrypt(br#"{"k": "v"}"#).unwrap();
        assert_eq!(
            c.resolve(&blob),
            StateResolution::Decrypted(serde_json::json!({"k": "v"}))
        );
    }

    #[test]
    fn resolve_garbage_is_absent() {
        assert_eq!(cipher().resolve("not json, not ciphertext"), StateResolution::Absent);
    }

    #[test]
    fn resolve_wrapped_blob_under_wrong_key_is_absent() {
        let wrapped = cipher().encrypt_state(&serde_json::json!({"t": 1})).unwrap();
        let raw = serde_json::to_string(&wrapped).unwrap();
        let other = StateCipher::new([9u8; 32]);
        assert_eq!(other.resolve(&raw), StateResolution::Absent);
    }

    #[test]
    fn key_from_base64_validates_length() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(matches!(
            StateCipher::from_base64(&short),
            Err(CipherError::InvalidKey(_))
        ));

        let good = base64::engine::general_purpose::STANDARD.encode([1u8; 32]);
        assert!(StateCipher::from_base64(&good).is_ok());
    }
}
