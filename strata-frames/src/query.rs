//! Query-side model: metric and bucket definitions
//!
//! These types represent the query specification the editor builds. The
//! engine treats them as read-only input; it never validates them beyond
//! what extraction itself needs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One logical query: an ordered list of metrics and bucket groupings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Opaque identifier correlating the query to its response slot.
    pub ref_id: String,

    /// Optional template for naming output series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default)]
    pub metrics: Vec<Metric>,

    #[serde(default)]
    pub bucket_aggs: Vec<BucketAgg>,
}

impl Query {
    /// Look up a metric definition by id.
    pub fn metric_by_id(&self, id: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// The bucket definition matching a response aggregation id, if any.
    pub fn bucket_agg_by_id(&self, id: &str) -> Option<&BucketAgg> {
        self.bucket_aggs.iter().find(|b| b.id == id)
    }
}

/// A value computed per bucket (or per pipeline of prior metrics).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub id: String,

    #[serde(rename = "type")]
    pub metric_type: MetricType,

    /// Source field, or the referenced metric id for single-path pipelines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// Type-specific settings (scripts, percentile lists, top_metrics fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,

    /// Boolean flags; extended_stats uses these to select sub-statistics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,

    /// Hidden metrics are skipped by every extractor.
    #[serde(default)]
    pub hide: bool,

    /// bucket_script variable bindings (name -> referenced metric id).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline_variables: Vec<PipelineVariable>,
}

impl Metric {
    /// The configured script text, tolerating both the bare-string and the
    /// `{ "inline": ... }` settings shapes seen in the wild.
    pub fn script_value(&self) -> Option<&str> {
        let script = self.settings.as_ref()?.get("script")?;
        match script {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("inline").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Field list configured for top_metrics.
    pub fn top_metrics_fields(&self) -> Vec<&str> {
        self.settings
            .as_ref()
            .and_then(|s| s.get("metrics"))
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineVariable {
    pub name: String,
    /// Referenced metric id.
    pub pipeline_agg: String,
}

/// Closed set of metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Count,
    Avg,
    Sum,
    Min,
    Max,
    Percentiles,
    ExtendedStats,
    Cardinality,
    TopMetrics,
    Rate,
    RawData,
    RawDocument,
    Logs,
    Derivative,
    MovingAvg,
    MovingFn,
    SerialDiff,
    CumulativeSum,
    BucketScript,
}

impl MetricType {
    /// Human-readable display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Avg => "Average",
            Self::Sum => "Sum",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Percentiles => "Percentiles",
            Self::ExtendedStats => "Extended Stats",
            Self::Cardinality => "Unique Count",
            Self::TopMetrics => "Top Metrics",
            Self::Rate => "Rate",
            Self::RawData => "Raw Data",
            Self::RawDocument => "Raw Document",
            Self::Logs => "Logs",
            Self::Derivative => "Derivative",
            Self::MovingAvg => "Moving Average",
            Self::MovingFn => "Moving Function",
            Self::SerialDiff => "Serial Difference",
            Self::CumulativeSum => "Cumulative Sum",
            Self::BucketScript => "Bucket Script",
        }
    }

    /// Computed from other metrics' outputs rather than from documents.
    pub fn is_pipeline(self) -> bool {
        matches!(
            self,
            Self::Derivative
                | Self::MovingAvg
                | Self::MovingFn
                | Self::SerialDiff
                | Self::CumulativeSum
                | Self::BucketScript
        )
    }

    /// Pipeline kinds that reference several metrics through named variables.
    pub fn has_multiple_bucket_paths(self) -> bool {
        matches!(self, Self::BucketScript)
    }

    /// Whether the query editor requires a source field for this kind.
    pub fn requires_field(self) -> bool {
        matches!(
            self,
            Self::Avg
                | Self::Sum
                | Self::Min
                | Self::Max
                | Self::Percentiles
                | Self::ExtendedStats
                | Self::Cardinality
                | Self::Rate
        )
    }

    /// Parse the wire-format type tag.
    pub fn from_type_str(s: &str) -> Option<Self> {
        Some(match s {
            "count" => Self::Count,
            "avg" => Self::Avg,
            "sum" => Self::Sum,
            "min" => Self::Min,
            "max" => Self::Max,
            "percentiles" => Self::Percentiles,
            "extended_stats" => Self::ExtendedStats,
            "cardinality" => Self::Cardinality,
            "top_metrics" => Self::TopMetrics,
            "rate" => Self::Rate,
            "raw_data" => Self::RawData,
            "raw_document" => Self::RawDocument,
            "logs" => Self::Logs,
            "derivative" => Self::Derivative,
            "moving_avg" => Self::MovingAvg,
            "moving_fn" => Self::MovingFn,
            "serial_diff" => Self::SerialDiff,
            "cumulative_sum" => Self::CumulativeSum,
            "bucket_script" => Self::BucketScript,
            _ => return None,
        })
    }
}

/// Display label for a series' metric kind tag.
///
/// Kinds that are not plain metric types cover the extended_stats fan-out
/// statistics; synthesized kinds like "p75" fall through unchanged.
pub fn metric_kind_label(kind: &str) -> String {
    if let Some(mt) = MetricType::from_type_str(kind) {
        return mt.label().to_string();
    }
    match kind {
        "std_deviation" => "Std Dev".to_string(),
        "std_deviation_bounds_upper" => "Std Dev Upper".to_string(),
        "std_deviation_bounds_lower" => "Std Dev Lower".to_string(),
        other => other.to_string(),
    }
}

/// Label plus source field, e.g. "Sum @value".
pub fn describe_metric(metric: &Metric) -> String {
    match &metric.field {
        Some(field) => format!("{} {}", metric.metric_type.label(), field),
        None => metric.metric_type.label().to_string(),
    }
}

/// Render a bucket_script formula with each `params.<var>` reference
/// replaced by the referenced metric's description. Returns `None` when no
/// script is configured; unresolved references stay verbatim.
pub fn rendered_script(target: &Query, metric: &Metric) -> Option<String> {
    let script = metric.script_value()?;
    let mut rendered = script.to_string();
    for var in &metric.pipeline_variables {
        if let Some(applied) = target.metric_by_id(&var.pipeline_agg) {
            let reference = format!("params.{}", var.name);
            rendered = rendered.replace(&reference, &describe_metric(applied));
        }
    }
    Some(rendered)
}

/// Closed set of bucket-grouping kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketAggType {
    DateHistogram,
    Histogram,
    Terms,
    Filters,
    GeohashGrid,
    Nested,
}

/// Query-side description of one grouping level.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAgg {
    pub id: String,

    #[serde(rename = "type")]
    pub agg_type: BucketAggType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
}

impl BucketAgg {
    /// Number of leading/trailing points a date_histogram asks to strip.
    /// Accepts both numeric and string settings values.
    pub fn trim_edges(&self) -> usize {
        match self.settings.get("trimEdges") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}
