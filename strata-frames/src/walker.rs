//! Recursive descent over the aggregation tree
//!
//! The walker visits every aggregation node once, depth-first, accumulating
//! grouping-key properties along each path. The two bucket container shapes
//! (array-of-buckets vs label-keyed map) are normalized into one ordered
//! pair sequence at a single point so nothing downstream cares about the
//! difference.

use crate::extract::extract_series;
use crate::frame::{Series, Table};
use crate::query::{BucketAggType, Query};
use crate::table::extract_rows;
use serde_json::{Map, Value};
use tracing::debug;

/// Accumulators produced by one walk: zero or more raw (unnamed) series and
/// one shared table. Exactly one of them ends up populated for a given
/// query, depending on the terminal grouping kind.
#[derive(Debug, Default)]
pub struct WalkOutput {
    pub series: Vec<Series>,
    pub table: Table,
}

/// Walk one target's aggregation tree.
pub fn walk(target: &Query, aggs: &Map<String, Value>) -> WalkOutput {
    let grouping_levels = target
        .bucket_aggs
        .iter()
        .filter(|agg| agg.agg_type != BucketAggType::Nested)
        .count();
    if grouping_levels == 0 {
        return WalkOutput::default();
    }

    let mut walker = Walker {
        target,
        leaf_depth: grouping_levels - 1,
        out: WalkOutput::default(),
    };
    walker.visit(aggs, &[], 0);
    walker.out
}

/// Normalize both bucket container shapes into ordered (label, bucket)
/// pairs. Array containers label buckets by index; the label only matters
/// for buckets without a `key` (the "filters" case).
pub(crate) fn normalize_buckets(node: &Value) -> Vec<(String, &Value)> {
    match node.get("buckets") {
        Some(Value::Array(buckets)) => buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| (i.to_string(), bucket))
            .collect(),
        Some(Value::Object(map)) => map.iter().map(|(label, bucket)| (label.clone(), bucket)).collect(),
        _ => Vec::new(),
    }
}

/// The property value for a bucket key, preferring `key_as_string`.
pub(crate) fn key_property_value(bucket: &Value) -> Option<String> {
    if let Some(s) = bucket.get("key_as_string").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    match bucket.get("key")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn set_prop(props: &mut Vec<(String, String)>, name: String, value: String) {
    match props.iter_mut().find(|(existing, _)| *existing == name) {
        Some(entry) => entry.1 = value,
        None => props.push((name, value)),
    }
}

struct Walker<'a> {
    target: &'a Query,
    leaf_depth: usize,
    out: WalkOutput,
}

impl Walker<'_> {
    fn visit(&mut self, aggs: &Map<String, Value>, props: &[(String, String)], depth: usize) {
        for (agg_id, node) in aggs {
            let Some(agg_def) = self.target.bucket_agg_by_id(agg_id) else {
                // Tolerated drift: response ids with no query-side definition
                // (and plain bucket members like key/doc_count) are skipped.
                debug!(%agg_id, "no matching bucket definition, skipping");
                continue;
            };

            // A nested context is a structural pass-through, not a grouping
            // level: recurse without consuming depth or adding a property.
            if agg_def.agg_type == BucketAggType::Nested {
                if let Some(sub) = node.as_object() {
                    self.visit(sub, props, depth);
                }
                continue;
            }

            let pairs = normalize_buckets(node);
            if depth == self.leaf_depth {
                if agg_def.agg_type == BucketAggType::DateHistogram {
                    extract_series(self.target, &pairs, props, &mut self.out.series);
                } else {
                    extract_rows(self.target, agg_def, &pairs, props, &mut self.out.table);
                }
                continue;
            }

            for (label, bucket) in pairs {
                let mut child_props = props.to_vec();
                match key_property_value(bucket) {
                    Some(key) => {
                        let field = agg_def.field.clone().unwrap_or_else(|| agg_def.id.clone());
                        set_prop(&mut child_props, field, key);
                    }
                    // Label-keyed buckets have no key of their own.
                    None => set_prop(&mut child_props, "filter".to_string(), label.clone()),
                }
                if let Some(sub) = bucket.as_object() {
                    self.visit(sub, &child_props, depth + 1);
                }
            }
        }
    }
}
