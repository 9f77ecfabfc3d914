//! Payload acquisition and incremental `json_detail` parsing.
//!
//! A data export arrives either inline in the webhook body or as a download
//! URL. [`payload_stream`] normalizes both into one [`ByteStream`];
//! [`stream_json_detail`] parses that stream incrementally, holding at most
//! the field metadata and a single row in memory at any point.

#![forbid(unsafe_code)]

pub mod detail;
pub mod source;
pub mod tokenizer;

pub use detail::{stream_json_detail, stream_json_detail_request, DetailHandlers};
pub use source::{payload_stream, stream_payload, ByteStream};
pub use tokenizer::{JsonEvent, JsonTokenizer};
