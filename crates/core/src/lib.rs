#![forbid(unsafe_code)]

//! # acthub-core
//!
//! Data model and validation primitives shared by every layer of the
//! action hub: action descriptors, requirement clauses, the normalized
//! execution request/response pair, row/cell types of the `json_detail`
//! export format, and the error taxonomy.
//!
//! This crate is intentionally free of I/O — streaming, crypto, isolation
//! and transport live in their own crates on top of it.

pub mod descriptor;
pub mod error;
pub mod fields;
pub mod filename;
pub mod message;
pub mod request;
pub mod response;
pub mod row;

pub use descriptor::{ActionDescriptor, DownloadSetting, Format, FormatSelector, ParamSpec, RequestType};
pub use error::{HubError, StreamError};
pub use fields::{check_requirements, Field, FieldCategories, RequirementClause};
pub use filename::{sanitize_filename, suggested_filename, templated_filename};
pub use message::suggested_truncated_message;
pub use request::{
    protocol_version_from_user_agent, Attachment, ExecutionRequest, Payload, ScheduledPlan,
};
pub use response::{
    ExecutionResponse, Form, FormField, FormFieldType, FormSelectOption, StateUpdate,
    ValidationErrorItem,
};
pub use row::{Cell, CellOrPivot, Link, Row};
