//! The port every destination adapter implements.

use async_trait::async_trait;

use acthub_core::{ActionDescriptor, ExecutionRequest, ExecutionResponse, Form, HubError};
use acthub_oauth::OauthService;

/// One destination adapter.
///
/// The dispatcher owns validation, isolation, and the oauth round trip;
/// an adapter only declares its [`ActionDescriptor`] and consumes fully
/// validated requests. Each call owns its request exclusively, so adapters
/// need no interior synchronization for per-request data.
#[async_trait]
pub trait ActionService: Send + Sync + 'static {
    /// Static metadata, stable for the life of the process.
    fn descriptor(&self) -> &ActionDescriptor;

    /// Deliver one export to the destination.
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, HubError>;

    /// Render the action's configuration form. Defaults to an empty form;
    /// oauth consent links are injected by the dispatcher, not here.
    async fn form(&self, request: ExecutionRequest) -> Result<Form, HubError> {
        let _ = request;
        Ok(Form::new(Vec::new()))
    }

    /// The adapter's oauth hooks, when `descriptor().uses_oauth` is set.
    fn oauth(&self) -> Option<&dyn OauthService> {
        None
    }
}
