//! Execution responses and form descriptors.

use serde::{Deserialize, Serialize};

/// The only channel by which an action persists information across calls:
/// the caller stores `data` and replays it in `params.state_json` on the
/// next request. `reset` voids whatever the caller has stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub reset: bool,
}

/// A field-level validation failure, surfaced alongside the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorItem {
    pub field: String,
    pub message: String,
}

/// Result of one action execution, serialized back to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationErrorItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateUpdate>,
    #[serde(default)]
    pub refresh_query: bool,
}

impl ExecutionResponse {
    /// A plain success response.
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A failure response with a user-visible message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Attach field-level validation errors.
    pub fn with_validation_errors(mut self, errors: Vec<ValidationErrorItem>) -> Self {
        self.validation_errors = errors;
        self
    }

    /// Carry updated opaque state back to the caller (e.g. rotated tokens).
    pub fn with_state(mut self, data: serde_json::Value) -> Self {
        self.state = Some(StateUpdate {
            data: Some(data),
            reset: false,
        });
        self
    }

    /// Signal that previously stored state is void and the oauth flow must
    /// restart on the next request.
    pub fn reset_state(mut self) -> Self {
        self.state = Some(StateUpdate {
            data: None,
            reset: true,
        });
        self
    }
}

/// Type of a form field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    #[default]
    Text,
    Textarea,
    Select,
    /// A single external consent link; clicking it starts the oauth round
    /// trip.
    OauthLink,
}

/// One option of a `select` form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSelectOption {
    pub name: String,
    pub label: String,
}

/// One field of an action's configuration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FormFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FormSelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Interactive fields re-render the form when changed.
    #[serde(default)]
    pub interactive: bool,
    /// Consent URL carried by `oauth_link` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_url: Option<String>,
}

impl FormField {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    /// The single-field consent form returned when an oauth action has no
    /// usable credentials.
    pub fn oauth_link(label: impl Into<String>, oauth_url: impl Into<String>) -> Self {
        Self {
            name: "login".into(),
            label: label.into(),
            field_type: FormFieldType::OauthLink,
            oauth_url: Some(oauth_url.into()),
            ..Self::default()
        }
    }
}

/// An action's configuration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Form {
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Form {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self {
            fields,
            state: None,
            error: None,
        }
    }
}
