//! Action registry and dispatcher.
//!
//! The dispatcher is the trust boundary between the BI caller and
//! destination adapters: it resolves the action, validates the request
//! shape before any third-party traffic, routes execution through the
//! isolation boundary, and brokers the stateless oauth round trip.

#![forbid(unsafe_code)]

pub mod handler;
pub mod hub;
pub mod registry;

pub use handler::ActionService;
pub use hub::{DescriptorView, ExecutionCall, Hub};
pub use registry::{ActionRegistry, LookupOptions, RegistryBuilder, RegistryError};
