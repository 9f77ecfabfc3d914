//! Per-execution isolation.
//!
//! Misbehavior in one adapter execution — a panic, a hang, unbounded
//! slowness — must not affect any concurrent execution. The [`IsolateRunner`]
//! port expresses that boundary; [`WorkerPool`] drives it in-process with a
//! spawned task, a semaphore bound, and a forcible per-job timeout.

#![forbid(unsafe_code)]

pub mod pool;
pub mod port;

pub use pool::{WorkerPool, WorkerPoolConfig};
pub use port::{IsolateJob, IsolateRunner, IsolationFault};
