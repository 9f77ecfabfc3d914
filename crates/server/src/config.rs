//! Environment-driven server configuration.

use std::net::SocketAddr;

use anyhow::Context;
use url::Url;

use acthub_cipher::StateCipher;

/// Settings an embedding binary reads from the environment.
#[derive(Debug)]
pub struct ServerConfig {
    /// Socket the HTTP surface binds to. `ACTION_HUB_LISTEN`, default
    /// `0.0.0.0:8080`.
    pub listen: SocketAddr,
    /// Externally visible root URL used for listing and oauth links.
    /// `ACTION_HUB_BASE_URL`, required.
    pub base_url: Url,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen = match std::env::var("ACTION_HUB_LISTEN") {
            Ok(raw) => raw.parse().context("invalid ACTION_HUB_LISTEN")?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };
        let base_url = std::env::var("ACTION_HUB_BASE_URL")
            .context("ACTION_HUB_BASE_URL is not set")?
            .parse()
            .context("invalid ACTION_HUB_BASE_URL")?;
        Ok(Self { listen, base_url })
    }

    /// State cipher from `ACTION_HUB_SECRET` (base64, 32 bytes).
    ///
    /// A missing secret yields the unconfigured cipher: oauth-backed
    /// actions fail closed instead of passing state around in plaintext.
    pub fn cipher_from_env() -> StateCipher {
        match StateCipher::from_env("ACTION_HUB_SECRET") {
            Ok(cipher) => cipher,
            Err(err) => {
                tracing::warn!(error = %err, "no usable ACTION_HUB_SECRET; oauth state is disabled");
                StateCipher::unconfigured()
            }
        }
    }
}

/// Install the global tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
