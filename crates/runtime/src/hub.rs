//! The dispatcher: one validated, isolated execution per inbound call.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use url::Url;

use acthub_cipher::StateCipher;
use acthub_core::{
    protocol_version_from_user_agent, ActionDescriptor, ExecutionRequest, ExecutionResponse,
    Form, FormField, HubError, ParamSpec, RequestType, RequirementClause, ValidationErrorItem,
};
use acthub_isolate::{IsolateRunner, WorkerPool, WorkerPoolConfig};
use acthub_oauth::{resolve_state, OauthPayload, StateStatus};

use crate::registry::{ActionRegistry, LookupOptions};

/// One inbound call, as the transport layer hands it over.
#[derive(Debug, Clone, Default)]
pub struct ExecutionCall {
    pub action_name: String,
    pub user_agent: Option<String>,
    pub webhook_id: Option<String>,
    pub instance_id: Option<String>,
    pub support_delegate_oauth: bool,
    pub body: serde_json::Value,
}

impl ExecutionCall {
    fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            protocol_version: self
                .user_agent
                .as_deref()
                .and_then(protocol_version_from_user_agent),
            support_delegate_oauth: self.support_delegate_oauth,
        }
    }
}

/// Listing entry for one action, with the hub-relative URLs the caller
/// posts back to.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorView {
    pub name: String,
    pub label: String,
    pub description: String,
    pub url: String,
    pub form_url: String,
    pub supported_action_types: Vec<RequestType>,
    pub supported_formats: Vec<acthub_core::Format>,
    pub params: Vec<ParamSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<RequirementClause>,
    pub uses_oauth: bool,
    pub delegate_oauth_only: bool,
    pub uses_streaming: bool,
    pub supported_download_settings: Vec<acthub_core::DownloadSetting>,
}

/// The hub itself: registry plus the shared machinery every call uses.
pub struct Hub {
    registry: ActionRegistry,
    isolator: Arc<dyn IsolateRunner>,
    cipher: Arc<StateCipher>,
    base_url: Url,
}

impl Hub {
    /// A hub with the default in-process worker pool and an unconfigured
    /// cipher (oauth actions will fail closed until a key is supplied).
    ///
    /// `base_url` is the externally visible root of this deployment; paths
    /// are joined onto it, so it should end with `/` when it carries one.
    pub fn new(registry: ActionRegistry, base_url: Url) -> Self {
        Self {
            registry,
            isolator: Arc::new(WorkerPool::new(WorkerPoolConfig::default())),
            cipher: Arc::new(StateCipher::unconfigured()),
            base_url,
        }
    }

    pub fn with_cipher(mut self, cipher: StateCipher) -> Self {
        self.cipher = Arc::new(cipher);
        self
    }

    pub fn with_isolator(mut self, isolator: Arc<dyn IsolateRunner>) -> Self {
        self.isolator = isolator;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Actions visible to this caller.
    pub fn list(&self, opts: &LookupOptions) -> Vec<DescriptorView> {
        self.registry
            .list(opts)
            .iter()
            .map(|action| self.describe(action.descriptor()))
            .collect()
    }

    /// Run one execution. Never returns an error and never panics: every
    /// failure mode ends as `ExecutionResponse { success: false, .. }`.
    pub async fn execute(&self, call: ExecutionCall) -> ExecutionResponse {
        let action_name = call.action_name.clone();
        match self.try_execute(call).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(action = %action_name, error = %err, "execution failed");
                failure_response(&err)
            }
        }
    }

    /// Render an action's form. Failures land in `Form::error` so the
    /// caller always gets a renderable body.
    pub async fn form(&self, call: ExecutionCall) -> Form {
        let action_name = call.action_name.clone();
        match self.try_form(call).await {
            Ok(form) => form,
            Err(err) => {
                tracing::warn!(action = %action_name, error = %err, "form request failed");
                Form {
                    fields: Vec::new(),
                    state: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Build the provider consent URL for the oauth leg.
    pub async fn oauth_url(
        &self,
        action_name: &str,
        encrypted_state: &str,
    ) -> Result<Url, HubError> {
        let action = self.registry.get(action_name)?;
        let service = action
            .oauth()
            .ok_or_else(|| HubError::oauth(format!("action {action_name} does not use oauth")))?;
        service
            .oauth_url(&self.redirect_uri(action_name)?, encrypted_state)
            .await
    }

    /// Handle the provider redirect: token exchange plus state postback.
    pub async fn oauth_redirect(
        &self,
        action_name: &str,
        params: HashMap<String, String>,
    ) -> Result<(), HubError> {
        let action = self.registry.get(action_name)?;
        let service = action
            .oauth()
            .ok_or_else(|| HubError::oauth(format!("action {action_name} does not use oauth")))?;
        service
            .oauth_fetch_info(params, &self.redirect_uri(action_name)?)
            .await
    }

    async fn try_execute(&self, call: ExecutionCall) -> Result<ExecutionResponse, HubError> {
        let opts = call.lookup_options();
        let action = self.registry.find(&call.action_name, &opts)?;
        let descriptor = action.descriptor();

        let request = ExecutionRequest::from_webhook(call.body, opts.protocol_version)?
            .with_call_identity(call.webhook_id, call.instance_id);

        // All validation happens before a single byte reaches the
        // destination service.
        validate(descriptor, &request)?;

        tracing::info!(
            action = %descriptor.name,
            request_type = ?request.request_type,
            webhook_id = ?request.webhook_id,
            isolated = descriptor.uses_own_process,
            "dispatching execution"
        );

        if !descriptor.uses_own_process {
            return action.execute(request).await;
        }

        // The adapter call crosses the isolation boundary as a moved-in job
        // and one serialized outcome; nothing is shared with the worker.
        let worker_action = Arc::clone(&action);
        let job = async move {
            let response = worker_action.execute(request).await?;
            serde_json::to_value(&response).map_err(|e| HubError::other(e.to_string()))
        }
        .boxed();

        match self.isolator.run(job).await {
            Ok(Ok(value)) => {
                serde_json::from_value(value).map_err(|e| HubError::other(e.to_string()))
            }
            Ok(Err(err)) => Err(err),
            Err(fault) => Err(fault.into()),
        }
    }

    async fn try_form(&self, call: ExecutionCall) -> Result<Form, HubError> {
        let opts = call.lookup_options();
        let action = self.registry.find(&call.action_name, &opts)?;
        let descriptor = action.descriptor();

        let request = ExecutionRequest::from_webhook(call.body, opts.protocol_version)?
            .with_call_identity(call.webhook_id, call.instance_id);

        if descriptor.uses_oauth {
            if let StateStatus::Unauthenticated = resolve_state(&self.cipher, &request.params) {
                return self.consent_form(descriptor, &request);
            }
        }

        action.form(request).await
    }

    /// The single-field form that starts the oauth round trip.
    fn consent_form(
        &self,
        descriptor: &ActionDescriptor,
        request: &ExecutionRequest,
    ) -> Result<Form, HubError> {
        let callback_url = request
            .params
            .get("state_url")
            .filter(|v| !v.is_empty())
            .ok_or(HubError::MissingParam {
                name: "state_url".to_string(),
            })?;

        let encrypted = OauthPayload::new(callback_url.clone()).encrypt(&self.cipher)?;
        let mut link = self
            .base_url
            .join(&format!("actions/{}/oauth", descriptor.name))
            .map_err(|e| HubError::oauth(e.to_string()))?;
        link.query_pairs_mut().append_pair("state", &encrypted);

        Ok(Form::new(vec![FormField::oauth_link(
            format!("Log in to {}", descriptor.label),
            link,
        )]))
    }

    fn redirect_uri(&self, action_name: &str) -> Result<String, HubError> {
        Ok(self
            .base_url
            .join(&format!("actions/{action_name}/oauth_redirect"))
            .map_err(|e| HubError::oauth(e.to_string()))?
            .to_string())
    }

    fn describe(&self, descriptor: &ActionDescriptor) -> DescriptorView {
        let action_url = |suffix: &str| {
            self.base_url
                .join(&format!("actions/{}/{suffix}", descriptor.name))
                .map(String::from)
                .unwrap_or_default()
        };
        DescriptorView {
            name: descriptor.name.clone(),
            label: descriptor.label.clone(),
            description: descriptor.description.clone(),
            url: action_url("execute"),
            form_url: action_url("form"),
            supported_action_types: descriptor.supported_request_types.clone(),
            supported_formats: descriptor.supported_formats.resolve(None),
            params: descriptor.params.clone(),
            required_fields: descriptor.required_fields.clone(),
            uses_oauth: descriptor.uses_oauth,
            delegate_oauth_only: descriptor.delegate_oauth_only,
            uses_streaming: descriptor.uses_streaming,
            supported_download_settings: descriptor.supported_download_settings.clone(),
        }
    }
}

/// Request-shape validation: type, format, required params.
fn validate(descriptor: &ActionDescriptor, request: &ExecutionRequest) -> Result<(), HubError> {
    if let Some(request_type) = request.request_type {
        if !descriptor.supported_request_types.contains(&request_type) {
            return Err(HubError::validation(format!(
                "Action {} does not support {request_type} requests.",
                descriptor.name
            )));
        }
    }

    if let Some(format) = request.format() {
        let supported = descriptor.supported_formats.resolve(Some(request));
        if !supported.is_empty() && !supported.contains(&format) {
            return Err(HubError::validation(format!(
                "Action {} does not support the {format} format.",
                descriptor.name
            )));
        }
    }

    for param in &descriptor.params {
        if param.required && request.params.get(&param.name).is_none_or(String::is_empty) {
            return Err(HubError::MissingParam {
                name: param.name.clone(),
            });
        }
    }

    Ok(())
}

/// Uniform conversion of every dispatch error into a caller-visible
/// failure response.
fn failure_response(err: &HubError) -> ExecutionResponse {
    let response = ExecutionResponse::failure(err.to_string());
    match err {
        HubError::MissingParam { name } => {
            response.with_validation_errors(vec![ValidationErrorItem {
                field: name.clone(),
                message: err.to_string(),
            }])
        }
        _ => response,
    }
}
