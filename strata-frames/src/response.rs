//! Typed shell over the raw search response
//!
//! Only the outer layers are statically typed. The aggregation tree itself
//! stays `serde_json::Value` because its depth and bucket shapes are
//! query-defined; the walker normalizes shapes at its own edge.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Batched response body: one slot per target, in request order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MultiSearchResponse {
    #[serde(default)]
    pub responses: Vec<SearchResponse>,
}

impl MultiSearchResponse {
    /// Deserialize a raw body, mapping serde failures to a typed error.
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        serde_json::from_value(value).map_err(|e| FrameError::MalformedResponse(e.to_string()))
    }
}

/// One target's response slot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchResponse {
    /// Upstream error payload; presence aborts the whole batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<HitsBlock>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HitsBlock {
    /// Both the bare-number and the `{ value, relation }` forms occur.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,

    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl HitsBlock {
    pub fn total_count(&self) -> Option<u64> {
        match self.total.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::Object(o) => o.get("value").and_then(Value::as_u64),
            _ => None,
        }
    }
}

/// One document hit.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,

    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HashMap<String, Vec<String>>>,

    #[serde(rename = "_source", default)]
    pub source: Value,

    /// Explicit top-level field values requested alongside `_source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

/// Build the surfaced error for a target-level `error` object, preferring a
/// root-cause reason over the generic reason.
pub fn extract_error(error: &Value) -> FrameError {
    let root_cause_reason = error
        .get("root_cause")
        .and_then(Value::as_array)
        .and_then(|causes| causes.first())
        .and_then(|cause| cause.get("reason"))
        .and_then(Value::as_str);

    let message = root_cause_reason
        .or_else(|| error.get("reason").and_then(Value::as_str))
        .unwrap_or("Unknown elastic error response")
        .to_string();

    FrameError::Upstream {
        message,
        payload: error.to_string(),
    }
}
