//! Incremental `json_detail` parsing.
//!
//! Drives the tokenizer over the `{fields: {...}, data: [...], ran_at?}`
//! document shape and dispatches to adapter-supplied handlers. Only the
//! `fields` object and one `data[i]` element at a time are ever
//! materialized, so multi-gigabyte exports run in bounded memory.

use futures::future::BoxFuture;
use futures::FutureExt;

use acthub_core::{FieldCategories, HubError, Row, StreamError};

use crate::source::ByteStream;
use crate::tokenizer::{JsonEvent, JsonTokenizer};

type FieldsHandler = Box<dyn FnMut(FieldCategories) -> BoxFuture<'static, Result<(), HubError>> + Send>;
type RowHandler = Box<dyn FnMut(Row) -> BoxFuture<'static, Result<(), HubError>> + Send>;
type RanAtHandler = Box<dyn FnMut(String) -> BoxFuture<'static, Result<(), HubError>> + Send>;

/// Adapter callbacks for one `json_detail` stream.
///
/// Guarantees: `on_fields` fires exactly once, before any `on_row`; `on_row`
/// fires once per data element in source order and is awaited to completion
/// before the next row is parsed (never re-entrant); `on_ran_at` fires at
/// most once. An error returned from any handler aborts parsing immediately
/// — no further payload bytes are consumed.
#[derive(Default)]
pub struct DetailHandlers {
    on_fields: Option<FieldsHandler>,
    on_row: Option<RowHandler>,
    on_ran_at: Option<RanAtHandler>,
}

impl DetailHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive the five raw field-category arrays. Requirement checking
    /// belongs here: returning an error aborts the stream before any row
    /// is delivered.
    pub fn on_fields<F, Fut>(mut self, mut handler: F) -> Self
    where
        F: FnMut(FieldCategories) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), HubError>> + Send + 'static,
    {
        self.on_fields = Some(Box::new(move |fields| handler(fields).boxed()));
        self
    }

    /// Receive one row at a time, in source order.
    pub fn on_row<F, Fut>(mut self, mut handler: F) -> Self
    where
        F: FnMut(Row) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), HubError>> + Send + 'static,
    {
        self.on_row = Some(Box::new(move |row| handler(row).boxed()));
        self
    }

    /// Receive the export's `ran_at` timestamp, if present.
    pub fn on_ran_at<F, Fut>(mut self, mut handler: F) -> Self
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), HubError>> + Send + 'static,
    {
        self.on_ran_at = Some(Box::new(move |ran_at| handler(ran_at).boxed()));
        self
    }
}

impl std::fmt::Debug for DetailHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailHandlers")
            .field("on_fields", &self.on_fields.is_some())
            .field("on_row", &self.on_row.is_some())
            .field("on_ran_at", &self.on_ran_at.is_some())
            .finish()
    }
}

/// Incrementally parse a `json_detail` payload, dispatching to `handlers`.
///
/// Resolves only after all rows are delivered and every handler future has
/// settled. A byte stream that ends before the document closes fails with
/// [`StreamError::PrematureClose`]. When an `on_fields` handler is
/// registered, a document carrying `data` ahead of `fields` is rejected
/// before any row is delivered.
pub async fn stream_json_detail(
    bytes: ByteStream,
    mut handlers: DetailHandlers,
) -> Result<(), HubError> {
    let mut tok = JsonTokenizer::new(bytes);

    match tok.next_event().await? {
        JsonEvent::ObjectStart => {}
        JsonEvent::Eof => return Err(StreamError::PrematureClose.into()),
        other => {
            return Err(StreamError::Parse {
                offset: tok.offset(),
                message: format!("expected a top-level object, found {other:?}"),
            }
            .into());
        }
    }

    let mut rows_delivered: u64 = 0;
    let mut fields_seen = false;
    loop {
        match tok.next_event().await? {
            JsonEvent::Key(key) => match key.as_str() {
                "fields" => {
                    let value = read_value(&mut tok).await?;
                    let categories: FieldCategories =
                        serde_json::from_value(value).map_err(|e| StreamError::Parse {
                            offset: tok.offset(),
                            message: format!("invalid fields object: {e}"),
                        })?;
                    fields_seen = true;
                    if let Some(handler) = handlers.on_fields.as_mut() {
                        handler(categories).await?;
                    }
                }
                "data" => {
                    // An `on_fields` handler is where requirement checks
                    // live; rows must never reach the adapter before it has
                    // run.
                    if handlers.on_fields.is_some() && !fields_seen {
                        return Err(StreamError::Parse {
                            offset: tok.offset(),
                            message: "data before fields".into(),
                        }
                        .into());
                    }
                    match tok.next_event().await? {
                        JsonEvent::ArrayStart => {}
                        JsonEvent::Null => continue,
                        other => {
                            return Err(StreamError::Parse {
                                offset: tok.offset(),
                                message: format!("expected an array for data, found {other:?}"),
                            }
                            .into());
                        }
                    }
                    loop {
                        let ev = tok.next_event().await?;
                        if ev == JsonEvent::ArrayEnd {
                            break;
                        }
                        let value = read_value_from(&mut tok, ev).await?;
                        let row: Row =
                            serde_json::from_value(value).map_err(|e| StreamError::Parse {
                                offset: tok.offset(),
                                message: format!("invalid row: {e}"),
                            })?;
                        if let Some(handler) = handlers.on_row.as_mut() {
                            // Awaited before the next row is parsed: the
                            // adapter's backpressure reaches the tokenizer.
                            handler(row).await?;
                        }
                        rows_delivered += 1;
                    }
                }
                "ran_at" => match tok.next_event().await? {
                    JsonEvent::String(ran_at) => {
                        if let Some(handler) = handlers.on_ran_at.as_mut() {
                            handler(ran_at).await?;
                        }
                    }
                    JsonEvent::Null => {}
                    other => {
                        return Err(StreamError::Parse {
                            offset: tok.offset(),
                            message: format!("expected a string for ran_at, found {other:?}"),
                        }
                        .into());
                    }
                },
                _ => skip_value(&mut tok).await?,
            },
            JsonEvent::ObjectEnd => break,
            other => {
                return Err(StreamError::Parse {
                    offset: tok.offset(),
                    message: format!("unexpected event in top-level object: {other:?}"),
                }
                .into());
            }
        }
    }

    // The document closed; the stream must be exhausted too.
    match tok.next_event().await? {
        JsonEvent::Eof => {
            tracing::debug!(rows = rows_delivered, "json_detail stream complete");
            Ok(())
        }
        other => Err(StreamError::Parse {
            offset: tok.offset(),
            message: format!("trailing data after document: {other:?}"),
        }
        .into()),
    }
}

/// Resolve the request's payload (inline or download) and parse it as
/// `json_detail`.
pub async fn stream_json_detail_request(
    request: &acthub_core::ExecutionRequest,
    handlers: DetailHandlers,
) -> Result<(), HubError> {
    let bytes = crate::source::payload_stream(request).await?;
    stream_json_detail(bytes, handlers).await
}

enum Frame {
    Object(serde_json::Map<String, serde_json::Value>, Option<String>),
    Array(Vec<serde_json::Value>),
}

async fn read_value(tok: &mut JsonTokenizer) -> Result<serde_json::Value, StreamError> {
    let first = tok.next_event().await?;
    read_value_from(tok, first).await
}

/// Assemble one JSON value from events, starting at `first`. Containers are
/// tracked with an explicit frame stack; no recursion.
async fn read_value_from(
    tok: &mut JsonTokenizer,
    first: JsonEvent,
) -> Result<serde_json::Value, StreamError> {
    let mut stack: Vec<Frame> = Vec::new();
    match first {
        JsonEvent::String(s) => return Ok(serde_json::Value::String(s)),
        JsonEvent::Number(n) => return Ok(serde_json::Value::Number(n)),
        JsonEvent::Bool(b) => return Ok(serde_json::Value::Bool(b)),
        JsonEvent::Null => return Ok(serde_json::Value::Null),
        JsonEvent::ObjectStart => stack.push(Frame::Object(serde_json::Map::new(), None)),
        JsonEvent::ArrayStart => stack.push(Frame::Array(Vec::new())),
        JsonEvent::Eof => return Err(StreamError::PrematureClose),
        other => {
            return Err(StreamError::Parse {
                offset: tok.offset(),
                message: format!("expected a value, found {other:?}"),
            });
        }
    }

    loop {
        let completed = match tok.next_event().await? {
            JsonEvent::Key(key) => {
                match stack.last_mut() {
                    Some(Frame::Object(_, slot)) => *slot = Some(key),
                    _ => {
                        return Err(StreamError::Parse {
                            offset: tok.offset(),
                            message: "key outside of object".into(),
                        });
                    }
                }
                None
            }
            JsonEvent::String(s) => Some(serde_json::Value::String(s)),
            JsonEvent::Number(n) => Some(serde_json::Value::Number(n)),
            JsonEvent::Bool(b) => Some(serde_json::Value::Bool(b)),
            JsonEvent::Null => Some(serde_json::Value::Null),
            JsonEvent::ObjectStart => {
                stack.push(Frame::Object(serde_json::Map::new(), None));
                None
            }
            JsonEvent::ArrayStart => {
                stack.push(Frame::Array(Vec::new()));
                None
            }
            JsonEvent::ObjectEnd => match stack.pop() {
                Some(Frame::Object(map, _)) => Some(serde_json::Value::Object(map)),
                _ => {
                    return Err(StreamError::Parse {
                        offset: tok.offset(),
                        message: "mismatched object end".into(),
                    });
                }
            },
            JsonEvent::ArrayEnd => match stack.pop() {
                Some(Frame::Array(items)) => Some(serde_json::Value::Array(items)),
                _ => {
                    return Err(StreamError::Parse {
                        offset: tok.offset(),
                        message: "mismatched array end".into(),
                    });
                }
            },
            JsonEvent::Eof => return Err(StreamError::PrematureClose),
        };

        if let Some(value) = completed {
            match stack.last_mut() {
                None => return Ok(value),
                Some(Frame::Object(map, slot)) => {
                    let key = slot.take().ok_or_else(|| StreamError::Parse {
                        offset: tok.offset(),
                        message: "value without key in object".into(),
                    })?;
                    map.insert(key, value);
                }
                Some(Frame::Array(items)) => items.push(value),
            }
        }
    }
}

/// Consume and discard one value.
async fn skip_value(tok: &mut JsonTokenizer) -> Result<(), StreamError> {
    let mut depth: u32 = match tok.next_event().await? {
        JsonEvent::ObjectStart | JsonEvent::ArrayStart => 1,
        JsonEvent::Eof => return Err(StreamError::PrematureClose),
        JsonEvent::Key(_) | JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => {
            return Err(StreamError::Parse {
                offset: tok.offset(),
                message: "expected a value".into(),
            });
        }
        _ => return Ok(()),
    };
    while depth > 0 {
        match tok.next_event().await? {
            JsonEvent::ObjectStart | JsonEvent::ArrayStart => depth += 1,
            JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => depth -= 1,
            JsonEvent::Eof => return Err(StreamError::PrematureClose),
            _ => {}
        }
    }
    Ok(())
}
