//! Destination filename derivation.

use chrono::{DateTime, Utc};

use crate::request::ExecutionRequest;

const DEFAULT_STEM: &str = "data";
const DEFAULT_NOW_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Replace anything outside `[A-Za-z0-9_. -]` so the result is safe as a
/// filename on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ' ' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derive a filename from the schedule title and the current timestamp,
/// e.g. `"Weekly Orders_2026_08_27_10_15_00.csv"`.
pub fn suggested_filename(request: &ExecutionRequest) -> String {
    suggested_filename_at(request, Utc::now())
}

fn suggested_filename_at(request: &ExecutionRequest, now: DateTime<Utc>) -> String {
    let stem = request.title().unwrap_or(DEFAULT_STEM);
    let stamp = now.format(DEFAULT_NOW_FORMAT);
    let name = format!("{stem}_{stamp}");
    match request
        .attachment
        .as_ref()
        .and_then(|a| a.extension.as_deref())
    {
        Some(ext) => sanitize_filename(&format!("{name}.{ext}")),
        None => sanitize_filename(&name),
    }
}

/// Render a user-supplied filename template, falling back to
/// [`suggested_filename`] when no template is given.
///
/// Template language: `{{ title }}`, `{{ query }}` and `{{ now }}` /
/// `{{ now:%Y-%m-%d }}` with a chrono format string after the colon.
/// Unknown variables render as empty.
pub fn templated_filename(request: &ExecutionRequest, template: Option<&str>) -> String {
    match template {
        Some(t) if !t.trim().is_empty() => {
            sanitize_filename(&render_template(t, request, Utc::now()))
        }
        _ => suggested_filename(request),
    }
}

fn render_template(template: &str, request: &ExecutionRequest, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let var = after_open[..close].trim();
                out.push_str(&eval_var(var, request, now));
                rest = &after_open[close + 2..];
            }
            None => {
                // Unterminated marker: emit the remainder verbatim.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

fn eval_var(var: &str, request: &ExecutionRequest, now: DateTime<Utc>) -> String {
    if var == "title" {
        return request.title().unwrap_or(DEFAULT_STEM).to_string();
    }
    if var == "query" {
        return request
            .scheduled_plan
            .as_ref()
            .and_then(|p| p.url.as_deref())
            .unwrap_or_default()
            .to_string();
    }
    if var == "now" {
        return now.format(DEFAULT_NOW_FORMAT).to_string();
    }
    if let Some(format) = var.strip_prefix("now:") {
        return now.format(format.trim()).to_string();
    }
    String::new()
}
