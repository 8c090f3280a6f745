//! Output model: named series, tables, and wide document frames

use serde::Serialize;
use serde_json::Value;

/// One time/value pair. `value` is `None` when the bucket carried the metric
/// but no usable number (gap tolerated, never a crash).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataPoint {
    pub value: Option<f64>,
    pub key: f64,
}

/// A raw or named data series.
///
/// Before naming, `name` is empty and the extraction metadata (`metric_kind`,
/// `field`, `metric_id`, `properties`) drives the namer; after naming only
/// `name`, `ref_id`, and `points` matter to callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Series {
    pub name: String,
    pub ref_id: String,

    /// Display-level kind tag: "count", "p75", "std_deviation_bounds_upper"...
    pub metric_kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_id: Option<String>,

    /// Grouping-field -> bucket key, in descent order.
    pub properties: Vec<(String, String)>,

    pub points: Vec<DataPoint>,
}

/// Table column; `filterable` marks the terminal bucket-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub text: String,
    pub filterable: bool,
}

/// Shared row/column accumulator for non-time terminal groupings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Register a column the first time its text is seen.
    pub fn add_column(&mut self, text: impl Into<String>, filterable: bool) {
        let text = text.into();
        if !self.columns.iter().any(|c| c.text == text) {
            self.columns.push(Column { text, filterable });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

/// Inferred column type for document frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Other,
}

impl FieldType {
    /// Inference from the first non-missing value seen for a column.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocField {
    pub name: String,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredVisualisation {
    Logs,
    Graph,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_visualisation: Option<PreferredVisualisation>,

    /// Unique highlighted terms across all hits (log queries only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_words: Vec<String>,
}

/// Wide tabular frame of flattened documents. Rows are aligned to `fields`;
/// a missing cell is `Value::Null`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocFrame {
    pub ref_id: String,
    pub fields: Vec<DocField>,
    pub rows: Vec<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    pub meta: FrameMeta,
}

/// One chartable output item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataItem {
    Series(Series),
    Table(Table),
    Docs(DocFrame),
}

/// Everything produced for one batched request, in request order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformedResponse {
    pub data: Vec<DataItem>,
}
