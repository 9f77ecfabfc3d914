//! Stateless OAuth brokering.
//!
//! The hub sits between a BI tool that cannot run consent flows and
//! destination services that require them, holding no session of its own.
//! Everything the redirect leg needs travels inside an encrypted
//! [`OauthPayload`] carried by the provider's `state` parameter; everything
//! the steady state needs travels inside the caller's `state_json`
//! parameter, sealed with [`acthub_cipher::StateCipher`].

#![forbid(unsafe_code)]

pub mod error;
pub mod exchange;
pub mod payload;
pub mod service;

pub use error::OauthError;
pub use exchange::{post_state_to_callback, TokenExchange, TokenResponse};
pub use payload::{resolve_state, OauthPayload, StateStatus};
pub use service::OauthService;
