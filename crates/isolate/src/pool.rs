//! Semaphore-bounded worker pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use acthub_core::HubError;

use crate::port::{IsolateJob, IsolateRunner, IsolationFault};

/// Pool sizing and per-job budget.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Jobs running at once. Submissions beyond this queue on the semaphore
    /// in arrival order.
    pub max_concurrent: usize,
    /// Wall-clock budget per job. The clock covers the job only, not time
    /// spent queued.
    pub timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            timeout: Duration::from_secs(60),
        }
    }
}

/// In-process isolation driver.
///
/// Each job runs on its own spawned task holding a semaphore permit. The
/// only communication is the moved-in job and the single outcome message,
/// so a panicking job takes down its task and nothing else, and a hung job
/// is aborted when its budget runs out while its neighbors keep running.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl IsolateRunner for WorkerPool {
    async fn run(
        &self,
        job: IsolateJob,
    ) -> Result<Result<serde_json::Value, HubError>, IsolationFault> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| IsolationFault::PoolClosed)?;

        let mut handle = tokio::spawn(async move {
            let _permit = permit;
            job.await
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "worker task was cancelled".to_string()
                };
                tracing::warn!(reason = %reason, "isolated execution crashed");
                Err(IsolationFault::Crashed { reason })
            }
            Err(_) => {
                // Forcible: the job gets no chance to ignore its budget.
                handle.abort();
                tracing::warn!(timeout = ?self.timeout, "isolated execution timed out");
                Err(IsolationFault::timeout(self.timeout))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
