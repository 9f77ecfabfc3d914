//! Isolation runner port.
//!
//! The dispatcher depends on this trait, not on a concrete pool, so the
//! execution boundary can be swapped (in-process worker pool today, a
//! process- or WASM-backed runner later) without touching dispatch logic.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use acthub_core::HubError;

/// One execution, fully owned by the runner.
///
/// The job is moved in and a single outcome comes back: message passing is
/// the only channel between the dispatcher and the worker, so a crashing or
/// hung execution cannot corrupt its neighbors.
pub type IsolateJob = BoxFuture<'static, Result<serde_json::Value, HubError>>;

/// Faults raised by the isolation boundary itself, distinct from the job's
/// own error channel.
#[derive(Debug, thiserror::Error)]
pub enum IsolationFault {
    /// The job exceeded its wall-clock budget and was forcibly aborted.
    #[error("execution exceeded the {timeout:?} budget and was aborted")]
    Timeout {
        /// The budget that was exhausted.
        timeout: Duration,
    },

    /// The worker task died — a panic inside the job, or an external abort.
    #[error("execution crashed: {reason}")]
    Crashed { reason: String },

    /// The pool is shutting down and accepts no new jobs.
    #[error("worker pool is closed")]
    PoolClosed,
}

impl IsolationFault {
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }
}

impl From<IsolationFault> for HubError {
    fn from(fault: IsolationFault) -> Self {
        HubError::isolation(fault.to_string())
    }
}

/// Port trait for running one job inside an isolation boundary.
///
/// The outer `Result` is the boundary's verdict (timeout, crash, closed
/// pool); the inner `Result` is whatever the job itself returned.
#[async_trait]
pub trait IsolateRunner: Send + Sync {
    async fn run(&self, job: IsolateJob)
        -> Result<Result<serde_json::Value, HubError>, IsolationFault>;
}
