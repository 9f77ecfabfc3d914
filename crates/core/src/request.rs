//! Normalized inbound execution request.

use std::collections::HashMap;

use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::descriptor::{Format, RequestType};
use crate::error::HubError;

/// How the export payload is delivered. Exactly one mode is populated per
/// request; the streaming layer hides the difference from adapters.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Payload bytes arrived inline in the webhook body.
    Inline(Bytes),
    /// Payload must be pulled from this URL.
    Download(Url),
}

/// The export payload plus its content metadata.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub payload: Payload,
    pub mime: Option<String>,
    pub extension: Option<String>,
}

/// Details of the schedule that produced this export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledPlan {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub query: Option<serde_json::Value>,
    #[serde(default)]
    pub query_id: Option<serde_json::Value>,
    #[serde(default)]
    pub scheduled_plan_id: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    pub plan_type: Option<String>,
    /// Pull URL for streamed exports. Consumed into [`Payload::Download`]
    /// during normalization.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// A normalized execution request, owned exclusively by one call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub request_type: Option<RequestType>,
    pub params: HashMap<String, String>,
    pub form_params: HashMap<String, String>,
    pub attachment: Option<Attachment>,
    pub scheduled_plan: Option<ScheduledPlan>,
    pub webhook_id: Option<String>,
    pub instance_id: Option<String>,
    pub protocol_version: Option<semver::Version>,
}

/// Raw webhook body shape, before normalization.
#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(rename = "type", default)]
    request_type: Option<RequestType>,
    #[serde(default)]
    data: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    form_params: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    attachment: Option<BodyAttachment>,
    #[serde(default)]
    scheduled_plan: Option<ScheduledPlan>,
}

#[derive(Debug, Deserialize)]
struct BodyAttachment {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    extension: Option<String>,
}

fn stringify_params(raw: Option<HashMap<String, serde_json::Value>>) -> HashMap<String, String> {
    raw.unwrap_or_default()
        .into_iter()
        .map(|(k, v)| {
            let s = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (k, s)
        })
        .collect()
}

impl ExecutionRequest {
    /// Normalize a webhook body into an execution request.
    ///
    /// Inline attachment data wins over a download URL; a download URL in
    /// the scheduled plan becomes a [`Payload::Download`] attachment so the
    /// dual delivery mode is resolved here, once.
    pub fn from_webhook(
        body: serde_json::Value,
        protocol_version: Option<semver::Version>,
    ) -> Result<Self, HubError> {
        let body: WebhookBody = serde_json::from_value(body)?;

        let mut scheduled_plan = body.scheduled_plan;

        let inline = match body.attachment {
            Some(att) => {
                let payload = match att.data {
                    Some(encoded) => {
                        let bytes = base64::engine::general_purpose::STANDARD
                            .decode(encoded.as_bytes())
                            .map_err(|e| {
                                HubError::validation(format!("invalid attachment encoding: {e}"))
                            })?;
                        Some(Payload::Inline(Bytes::from(bytes)))
                    }
                    None => None,
                };
                payload.map(|p| Attachment {
                    payload: p,
                    mime: att.mimetype,
                    extension: att.extension,
                })
            }
            None => None,
        };

        let attachment = match inline {
            Some(att) => Some(att),
            None => match scheduled_plan
                .as_mut()
                .and_then(|plan| plan.download_url.take())
            {
                Some(raw_url) => {
                    let url = Url::parse(&raw_url).map_err(|e| {
                        HubError::validation(format!("invalid download_url: {e}"))
                    })?;
                    Some(Attachment {
                        payload: Payload::Download(url),
                        mime: None,
                        extension: None,
                    })
                }
                None => None,
            },
        };

        Ok(Self {
            request_type: body.request_type,
            params: stringify_params(body.data),
            form_params: stringify_params(body.form_params),
            attachment,
            scheduled_plan,
            webhook_id: None,
            instance_id: None,
            protocol_version,
        })
    }

    /// Attach caller identity from the transport layer.
    pub fn with_call_identity(
        mut self,
        webhook_id: Option<String>,
        instance_id: Option<String>,
    ) -> Self {
        self.webhook_id = webhook_id;
        self.instance_id = instance_id;
        self
    }

    /// Payload format, when derivable from the attachment mime type.
    pub fn format(&self) -> Option<Format> {
        self.attachment
            .as_ref()
            .and_then(|a| a.mime.as_deref())
            .and_then(Format::from_mime)
    }

    /// Schedule title, when present.
    pub fn title(&self) -> Option<&str> {
        self.scheduled_plan.as_ref().and_then(|p| p.title.as_deref())
    }
}

/// Derive the caller's protocol version from its user-agent string, e.g.
/// `"LookerOutgoingWebhook/6.24.0"`. Missing patch/minor components are
/// treated as zero; an unparseable agent yields `None`.
pub fn protocol_version_from_user_agent(user_agent: &str) -> Option<semver::Version> {
    let version_part = user_agent.rsplit('/').next()?.trim();
    // Agents may append platform tokens ("6.24.0 (x64)"); the version ends
    // at the first character outside [0-9.].
    let end = version_part
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(version_part.len());
    let mut parts = version_part[..end].split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    let patch: u64 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some(semver::Version::new(major, minor, patch))
}
