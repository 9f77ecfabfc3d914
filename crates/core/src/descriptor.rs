//! Static per-action metadata.

use serde::{Deserialize, Serialize};

use crate::fields::RequirementClause;
use crate::request::ExecutionRequest;

/// Kind of export a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Cell,
    Query,
    Dashboard,
    None,
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cell => "cell",
            Self::Query => "query",
            Self::Dashboard => "dashboard",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Data format of an export payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Txt,
    Csv,
    InlineJson,
    Json,
    JsonDetail,
    JsonDetailLiteStream,
    Xlsx,
    Html,
    CsvZip,
    WysiwygPdf,
    AssembledPdf,
    WysiwygPng,
}

impl Format {
    /// Best-effort mapping from an attachment mime type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().unwrap_or(mime).trim() {
            "text/plain" => Some(Self::Txt),
            "text/csv" => Some(Self::Csv),
            "application/json" => Some(Self::Json),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            "text/html" => Some(Self::Html),
            "application/zip" => Some(Self::CsvZip),
            "application/pdf" => Some(Self::WysiwygPdf),
            "image/png" => Some(Self::WysiwygPng),
            _ => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Reuse the serde snake_case names on the wire and in messages.
        let s = serde_json::to_value(self).expect("format serializes to a string");
        f.write_str(s.as_str().unwrap_or("unknown"))
    }
}

/// How the export payload reaches the action: pushed inline in the webhook
/// body, or fetched from a one-time download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadSetting {
    Push,
    Url,
}

/// Supported formats: a static set, or a function of the request when the
/// format depends on the negotiated protocol version.
#[derive(Clone)]
pub enum FormatSelector {
    Static(Vec<Format>),
    ByRequest(fn(&ExecutionRequest) -> Vec<Format>),
}

impl FormatSelector {
    /// Resolve the supported formats, with or without a concrete request.
    pub fn resolve(&self, request: Option<&ExecutionRequest>) -> Vec<Format> {
        match self {
            Self::Static(formats) => formats.clone(),
            Self::ByRequest(f) => request.map(f).unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for FormatSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(formats) => f.debug_tuple("Static").field(formats).finish(),
            Self::ByRequest(_) => f.write_str("ByRequest(..)"),
        }
    }
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::Static(Vec::new())
    }
}

/// One user-facing parameter an action accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Sensitive values must never be logged or echoed back.
    #[serde(default)]
    pub sensitive: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: None,
            required: false,
            sensitive: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Immutable metadata describing a registered action.
///
/// Constructed once at process start via registration; looked up by name
/// and filtered by the caller's protocol version and delegate-oauth
/// capability.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    /// Unique key identifying this action (e.g. `"segment_event"`).
    pub name: String,
    /// Human-readable display name.
    pub label: String,
    /// Short description of what this action does.
    pub description: String,
    /// Request types the action accepts.
    pub supported_request_types: Vec<RequestType>,
    /// Formats the action accepts.
    pub supported_formats: FormatSelector,
    /// User-facing parameters.
    pub params: Vec<ParamSpec>,
    /// Requirement clauses the export's fields must satisfy.
    pub required_fields: Vec<RequirementClause>,
    /// Whether the action consumes the payload via the streaming contract.
    pub uses_streaming: bool,
    /// Whether the action holds per-user credentials via the oauth round trip.
    pub uses_oauth: bool,
    /// Only offered to callers that declare delegate-oauth support.
    pub delegate_oauth_only: bool,
    /// Whether executions run inside the isolation boundary. Cheap, trusted
    /// actions may opt out.
    pub uses_own_process: bool,
    /// Minimum caller protocol version this action requires.
    pub minimum_supported_version: semver::Version,
    /// Payload delivery modes the action accepts.
    pub supported_download_settings: Vec<DownloadSetting>,
}

impl ActionDescriptor {
    /// Create a descriptor with the minimum required fields.
    ///
    /// Defaults: accepts `query` requests, no formats declared, isolated
    /// execution, version gate `0.0.0`.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: description.into(),
            supported_request_types: vec![RequestType::Query],
            supported_formats: FormatSelector::default(),
            params: Vec::new(),
            required_fields: Vec::new(),
            uses_streaming: false,
            uses_oauth: false,
            delegate_oauth_only: false,
            uses_own_process: true,
            minimum_supported_version: semver::Version::new(0, 0, 0),
            supported_download_settings: vec![DownloadSetting::Push],
        }
    }

    /// Set the accepted request types.
    pub fn with_request_types(mut self, types: Vec<RequestType>) -> Self {
        self.supported_request_types = types;
        self
    }

    /// Set a static list of accepted formats.
    pub fn with_formats(mut self, formats: Vec<Format>) -> Self {
        self.supported_formats = FormatSelector::Static(formats);
        self
    }

    /// Set a request-dependent format selector.
    pub fn with_format_selector(mut self, selector: fn(&ExecutionRequest) -> Vec<Format>) -> Self {
        self.supported_formats = FormatSelector::ByRequest(selector);
        self
    }

    /// Add a user-facing parameter.
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Set the requirement clauses.
    pub fn with_required_fields(mut self, clauses: Vec<RequirementClause>) -> Self {
        self.required_fields = clauses;
        self
    }

    /// Mark the action as consuming payloads via the streaming contract.
    ///
    /// Streaming actions fetch the export from a one-time URL instead of
    /// receiving pushed bytes, so this also switches the download setting.
    pub fn with_streaming(mut self) -> Self {
        self.uses_streaming = true;
        self.supported_download_settings = vec![DownloadSetting::Url];
        self
    }

    /// Override the accepted payload delivery modes.
    pub fn with_download_settings(mut self, settings: Vec<DownloadSetting>) -> Self {
        self.supported_download_settings = settings;
        self
    }

    /// Mark the action as oauth-backed.
    pub fn with_oauth(mut self) -> Self {
        self.uses_oauth = true;
        self
    }

    /// Only offer this action to callers that support delegate oauth.
    pub fn delegate_oauth_only(mut self) -> Self {
        self.delegate_oauth_only = true;
        self.uses_oauth = true;
        self
    }

    /// Opt out of the isolation boundary (trusted, cheap actions only).
    pub fn without_own_process(mut self) -> Self {
        self.uses_own_process = false;
        self
    }

    /// Set the minimum caller protocol version.
    pub fn with_minimum_version(mut self, version: semver::Version) -> Self {
        self.minimum_supported_version = version;
        self
    }

    /// Whether a caller at `version` (if known) may use this action.
    pub fn supports_version(&self, version: Option<&semver::Version>) -> bool {
        match version {
            Some(v) => self.minimum_supported_version <= *v,
            // Callers with no recognizable version only get actions that
            // never opted into version gating.
            None => self.minimum_supported_version == semver::Version::new(0, 0, 0),
        }
    }
}
