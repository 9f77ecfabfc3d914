//! Row and cell types of the `json_detail` export format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A link attached to a cell by the source tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub link_type: Option<String>,
}

/// One cell of an export row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cell {
    /// Raw value as produced by the query.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Value rendered for display.
    #[serde(default)]
    pub rendered: Option<String>,
    /// HTML rendering, when the source provides one.
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
}

/// Either a plain cell, or — when the export is pivoted — a mapping from
/// pivot key to cell.
///
/// `Cell` denies unknown fields so that a pivot map (whose keys are pivot
/// values, not cell fields) falls through to the `Pivot` variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellOrPivot {
    Cell(Cell),
    Pivot(BTreeMap<String, Cell>),
}

/// One row of an export: field name to cell (or pivoted cells).
///
/// Rows are never materialized as a collection inside the hub; the streaming
/// parser hands them to the adapter one at a time.
pub type Row = BTreeMap<String, CellOrPivot>;
