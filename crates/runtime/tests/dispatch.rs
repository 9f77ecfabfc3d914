//! End-to-end dispatch behavior through the hub.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use acthub_cipher::StateCipher;
use acthub_core::{
    ActionDescriptor, ExecutionRequest, ExecutionResponse, Form, Format, HubError, ParamSpec,
    RequestType,
};
use acthub_isolate::{WorkerPool, WorkerPoolConfig};
use acthub_oauth::{post_state_to_callback, OauthPayload, OauthService};
use acthub_runtime::{ActionService, ExecutionCall, Hub, LookupOptions, RegistryBuilder};

const KEY: [u8; 32] = [9u8; 32];

fn base_url() -> Url {
    Url::parse("https://hub.example.com/").unwrap()
}

/// Adapter whose behavior is injected per test.
struct FakeAction {
    descriptor: ActionDescriptor,
    behavior: Behavior,
}

#[derive(Clone)]
enum Behavior {
    Succeed,
    RejectCredentials,
    Hang,
    Panic,
}

#[async_trait]
impl ActionService for FakeAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _request: ExecutionRequest) -> Result<ExecutionResponse, HubError> {
        match self.behavior {
            Behavior::Succeed => Ok(ExecutionResponse::success()),
            Behavior::RejectCredentials => Ok(ExecutionResponse::failure(
                "Destination rejected the stored credentials.",
            )
            .reset_state()),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("adapter bug"),
        }
    }

    async fn form(&self, _request: ExecutionRequest) -> Result<Form, HubError> {
        Ok(Form::new(vec![acthub_core::FormField::new(
            "channel", "Channel",
        )]))
    }
}

fn fake(descriptor: ActionDescriptor, behavior: Behavior) -> Arc<dyn ActionService> {
    Arc::new(FakeAction {
        descriptor,
        behavior,
    })
}

fn hub_with(actions: Vec<Arc<dyn ActionService>>, timeout: Duration) -> Hub {
    let mut builder = RegistryBuilder::new();
    for action in actions {
        builder.register(action).unwrap();
    }
    Hub::new(builder.build(), base_url())
        .with_cipher(StateCipher::new(KEY))
        .with_isolator(Arc::new(WorkerPool::new(WorkerPoolConfig {
            max_concurrent: 4,
            timeout,
        })))
}

fn call(name: &str, body: serde_json::Value) -> ExecutionCall {
    ExecutionCall {
        action_name: name.to_string(),
        user_agent: Some("LookerOutgoingWebhook/6.24.0".to_string()),
        body,
        ..Default::default()
    }
}

#[tokio::test]
async fn execute_happy_path() {
    let descriptor = ActionDescriptor::new("tracker", "Tracker", "Sends rows to Tracker")
        .with_formats(vec![Format::Csv])
        .with_param(ParamSpec::new("project", "Project").required());
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Succeed)],
        Duration::from_secs(5),
    );

    let response = hub
        .execute(call(
            "tracker",
            serde_json::json!({
                "type": "query",
                "data": {"project": "growth"},
                "attachment": {"data": "aGVsbG8=", "mimetype": "text/csv"}
            }),
        ))
        .await;

    assert!(response.success, "{:?}", response.message);
}

#[tokio::test]
async fn missing_required_param_is_structured() {
    let descriptor = ActionDescriptor::new("tracker", "Tracker", "")
        .with_param(ParamSpec::new("project", "Project").required());
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Succeed)],
        Duration::from_secs(5),
    );

    let response = hub
        .execute(call("tracker", serde_json::json!({"type": "query"})))
        .await;

    assert!(!response.success);
    assert_eq!(response.validation_errors[0].field, "project");
    assert_eq!(
        response.message.as_deref(),
        Some("Required parameter project not provided.")
    );
}

#[tokio::test]
async fn empty_required_param_is_missing() {
    let descriptor = ActionDescriptor::new("tracker", "Tracker", "")
        .with_param(ParamSpec::new("project", "Project").required());
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Succeed)],
        Duration::from_secs(5),
    );

    let response = hub
        .execute(call(
            "tracker",
            serde_json::json!({"type": "query", "data": {"project": ""}}),
        ))
        .await;
    assert!(!response.success);
    assert_eq!(response.validation_errors[0].field, "project");
}

#[tokio::test]
async fn unsupported_request_type_fails_before_dispatch() {
    let descriptor = ActionDescriptor::new("tracker", "Tracker", "")
        .with_request_types(vec![RequestType::Query]);
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Panic)],
        Duration::from_secs(5),
    );

    // The adapter would panic if reached; validation must reject first.
    let response = hub
        .execute(call("tracker", serde_json::json!({"type": "cell"})))
        .await;
    assert!(!response.success);
    assert!(response.message.unwrap().contains("cell"));
}

#[tokio::test]
async fn unknown_action_fails() {
    let hub = hub_with(vec![], Duration::from_secs(5));
    let response = hub.execute(call("ghost", serde_json::json!({}))).await;
    assert!(!response.success);
    assert!(response.message.unwrap().contains("ghost"));
}

#[tokio::test]
async fn version_gated_action_invisible_to_old_caller() {
    let descriptor = ActionDescriptor::new("modern", "Modern", "")
        .with_minimum_version(semver::Version::new(7, 0, 0));
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Succeed)],
        Duration::from_secs(5),
    );

    // call() advertises 6.24.0.
    let response = hub.execute(call("modern", serde_json::json!({}))).await;
    assert!(!response.success);

    let opts = LookupOptions {
        protocol_version: Some(semver::Version::new(6, 24, 0)),
        ..Default::default()
    };
    assert!(hub.list(&opts).is_empty());
}

#[tokio::test]
async fn hung_adapter_times_out() {
    let descriptor = ActionDescriptor::new("tarpit", "Tarpit", "");
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Hang)],
        Duration::from_millis(100),
    );

    let response = hub.execute(call("tarpit", serde_json::json!({}))).await;
    assert!(!response.success);
    assert!(response.message.unwrap().contains("aborted"));
}

#[tokio::test]
async fn panicking_adapter_is_contained() {
    let panicky = fake(
        ActionDescriptor::new("buggy", "Buggy", ""),
        Behavior::Panic,
    );
    let healthy = fake(
        ActionDescriptor::new("healthy", "Healthy", ""),
        Behavior::Succeed,
    );
    let hub = hub_with(vec![panicky, healthy], Duration::from_secs(5));

    let response = hub.execute(call("buggy", serde_json::json!({}))).await;
    assert!(!response.success);
    assert!(response.message.unwrap().contains("adapter bug"));

    // The hub keeps serving other actions after a crash.
    let response = hub.execute(call("healthy", serde_json::json!({}))).await;
    assert!(response.success);
}

#[tokio::test]
async fn non_isolated_action_runs_directly() {
    let descriptor = ActionDescriptor::new("cheap", "Cheap", "").without_own_process();
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Succeed)],
        Duration::from_secs(5),
    );
    let response = hub.execute(call("cheap", serde_json::json!({}))).await;
    assert!(response.success);
}

#[tokio::test]
async fn credential_rejection_resets_state() {
    let descriptor = ActionDescriptor::new("tracker", "Tracker", "").with_oauth();
    let hub = hub_with(
        vec![fake(descriptor, Behavior::RejectCredentials)],
        Duration::from_secs(5),
    );

    let response = hub.execute(call("tracker", serde_json::json!({}))).await;
    assert!(!response.success);
    // The reset flag survives the isolation round trip untouched.
    assert!(response.state.unwrap().reset);
}

#[tokio::test]
async fn listing_computes_urls() {
    let descriptor = ActionDescriptor::new("tracker", "Tracker", "Sends rows")
        .with_formats(vec![Format::JsonDetail])
        .with_streaming();
    let hub = hub_with(
        vec![fake(descriptor, Behavior::Succeed)],
        Duration::from_secs(5),
    );

    let listing = hub.list(&LookupOptions::default());
    assert_eq!(listing.len(), 1);
    assert_eq!(
        listing[0].url,
        "https://hub.example.com/actions/tracker/execute"
    );
    assert_eq!(
        listing[0].form_url,
        "https://hub.example.com/actions/tracker/form"
    );
    assert_eq!(listing[0].supported_formats, vec![Format::JsonDetail]);
    assert!(listing[0].uses_streaming);
    assert_eq!(
        listing[0].supported_download_settings,
        vec![acthub_core::DownloadSetting::Url]
    );
}

// --- oauth round trip -----------------------------------------------------

/// Oauth hooks that talk to a wiremock provider.
struct FakeOauth {
    cipher: StateCipher,
    authorize_endpoint: Url,
}

#[async_trait]
impl OauthService for FakeOauth {
    async fn oauth_url(&self, redirect_uri: &str, encrypted_payload: &str) -> Result<Url, HubError> {
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", encrypted_payload);
        Ok(url)
    }

    async fn oauth_fetch_info(
        &self,
        redirect_params: HashMap<String, String>,
        _redirect_uri: &str,
    ) -> Result<(), HubError> {
        let blob = redirect_params
            .get("state")
            .ok_or_else(|| HubError::oauth("missing state"))?;
        let payload = OauthPayload::decrypt(&self.cipher, blob).map_err(HubError::from)?;
        let code = redirect_params
            .get("code")
            .ok_or_else(|| HubError::oauth("missing code"))?;

        let http = reqwest::Client::new();
        post_state_to_callback(
            &http,
            &payload.callback_url,
            &serde_json::json!({"token": format!("tok-{code}")}),
        )
        .await
        .map_err(HubError::from)
    }
}

struct OauthAction {
    descriptor: ActionDescriptor,
    oauth: FakeOauth,
}

#[async_trait]
impl ActionService for OauthAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _request: ExecutionRequest) -> Result<ExecutionResponse, HubError> {
        Ok(ExecutionResponse::success())
    }

    fn oauth(&self) -> Option<&dyn OauthService> {
        Some(&self.oauth)
    }
}

fn oauth_hub(authorize_endpoint: Url) -> Hub {
    let action = OauthAction {
        descriptor: ActionDescriptor::new("tracker", "Tracker", "").with_oauth(),
        oauth: FakeOauth {
            cipher: StateCipher::new(KEY),
            authorize_endpoint,
        },
    };
    let mut builder = RegistryBuilder::new();
    builder.register(Arc::new(action)).unwrap();
    Hub::new(builder.build(), base_url()).with_cipher(StateCipher::new(KEY))
}

#[tokio::test]
async fn unauthenticated_form_is_a_consent_link() {
    let hub = oauth_hub(Url::parse("https://provider.example.com/authorize").unwrap());

    let form = hub
        .form(call(
            "tracker",
            serde_json::json!({
                "data": {"state_url": "https://bi.example.com/action_hub_state/abc"}
            }),
        ))
        .await;

    assert!(form.error.is_none(), "{:?}", form.error);
    assert_eq!(form.fields.len(), 1);
    let field = &form.fields[0];
    assert_eq!(field.name, "login");
    let oauth_url = field.oauth_url.as_deref().unwrap();
    assert!(oauth_url.starts_with("https://hub.example.com/actions/tracker/oauth?state="));
}

#[tokio::test]
async fn authorized_form_reaches_the_adapter() {
    let hub = oauth_hub(Url::parse("https://provider.example.com/authorize").unwrap());
    let cipher = StateCipher::new(KEY);
    let wrapped = cipher
        .encrypt_state(&serde_json::json!({"token": "tok"}))
        .unwrap();

    let form = hub
        .form(call(
            "tracker",
            serde_json::json!({
                "data": {"state_json": serde_json::to_string(&wrapped).unwrap()}
            }),
        ))
        .await;

    // The adapter's own (empty) form, not the consent link.
    assert!(form.error.is_none());
    assert!(form.fields.is_empty());
}

#[tokio::test]
async fn form_without_state_url_reports_missing_param() {
    let hub = oauth_hub(Url::parse("https://provider.example.com/authorize").unwrap());
    let form = hub.form(call("tracker", serde_json::json!({}))).await;
    assert_eq!(
        form.error.as_deref(),
        Some("Required parameter state_url not provided.")
    );
}

#[tokio::test]
async fn oauth_round_trip_posts_state_to_callback() {
    let callback_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/action_hub_state/abc"))
        .and(body_string_contains("tok-code123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&callback_server)
        .await;

    let hub = oauth_hub(Url::parse("https://provider.example.com/authorize").unwrap());

    // Leg 1: consent form mints the encrypted state blob.
    let form = hub
        .form(call(
            "tracker",
            serde_json::json!({
                "data": {"state_url": format!("{}/action_hub_state/abc", callback_server.uri())}
            }),
        ))
        .await;
    let consent = Url::parse(form.fields[0].oauth_url.as_deref().unwrap()).unwrap();
    let (_, blob) = consent
        .query_pairs()
        .find(|(k, _)| k == "state")
        .unwrap();

    // Leg 2: the hub hands the blob to the provider consent URL.
    let provider_url = hub.oauth_url("tracker", &blob).await.unwrap();
    assert!(provider_url
        .as_str()
        .starts_with("https://provider.example.com/authorize"));
    let (_, round_tripped) = provider_url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .unwrap();

    // Leg 3: the provider redirects back; the hub exchanges and posts.
    let mut params = HashMap::new();
    params.insert("code".to_string(), "code123".to_string());
    params.insert("state".to_string(), round_tripped.into_owned());
    hub.oauth_redirect("tracker", params).await.unwrap();
}
