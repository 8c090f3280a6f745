//! Per-metric-kind series extraction at a time-bucketing leaf

use crate::frame::{DataPoint, Series};
use crate::query::{MetricType, Query};
use serde_json::Value;
use tracing::debug;

/// Extract zero or more raw series from a leaf-level bucket collection,
/// preserving metric-definition order and skipping hidden metrics.
pub(crate) fn extract_series(
    target: &Query,
    pairs: &[(String, &Value)],
    props: &[(String, String)],
    out: &mut Vec<Series>,
) {
    for metric in &target.metrics {
        if metric.hide {
            continue;
        }

        let new_series = |kind: String, field: Option<String>| Series {
            name: String::new(),
            ref_id: target.ref_id.clone(),
            metric_kind: kind,
            field,
            metric_id: Some(metric.id.clone()),
            properties: props.to_vec(),
            points: Vec::new(),
        };

        match metric.metric_type {
            MetricType::Count => {
                let mut series = new_series("count".to_string(), None);
                for (_, bucket) in pairs {
                    let Some(key) = bucket_key(bucket) else { continue };
                    series.points.push(DataPoint {
                        value: bucket.get("doc_count").and_then(Value::as_f64),
                        key,
                    });
                }
                out.push(series);
            }

            // One series per percentile key present in the first bucket;
            // zero buckets means zero series.
            MetricType::Percentiles => {
                let Some((_, first)) = pairs.first() else { continue };
                let Some(percentiles) = first
                    .get(&metric.id)
                    .and_then(|m| m.get("values"))
                    .and_then(Value::as_object)
                else {
                    continue;
                };
                for percentile in percentiles.keys() {
                    let mut series =
                        new_series(format!("p{percentile}"), metric.field.clone());
                    for (_, bucket) in pairs {
                        let Some(key) = bucket_key(bucket) else { continue };
                        // Heterogeneous shards can omit values per bucket.
                        let value = bucket
                            .get(&metric.id)
                            .and_then(|m| m.get("values"))
                            .and_then(|values| values.get(percentile))
                            .and_then(Value::as_f64);
                        series.points.push(DataPoint { value, key });
                    }
                    out.push(series);
                }
            }

            // One series per statistic flagged true in `meta`.
            MetricType::ExtendedStats => {
                let Some(meta) = metric.meta.as_ref() else { continue };
                for (stat, flag) in meta {
                    if !flag_enabled(flag) {
                        continue;
                    }
                    let mut series = new_series(stat.clone(), metric.field.clone());
                    for (_, bucket) in pairs {
                        let Some(key) = bucket_key(bucket) else { continue };
                        let value = bucket
                            .get(&metric.id)
                            .and_then(|stats| extended_stat_value(stats, stat));
                        series.points.push(DataPoint { value, key });
                    }
                    out.push(series);
                }
            }

            // One series per configured field; value is the last entry of the
            // top-hits array for that field.
            MetricType::TopMetrics => {
                for field in metric.top_metrics_fields() {
                    let mut series =
                        new_series("top_metrics".to_string(), Some(field.to_string()));
                    for (_, bucket) in pairs {
                        let Some(key) = bucket_key(bucket) else { continue };
                        let value = bucket
                            .get(&metric.id)
                            .and_then(|m| m.get("top"))
                            .and_then(Value::as_array)
                            .and_then(|top| {
                                top.iter()
                                    .filter_map(|hit| hit.get("metrics")?.get(field))
                                    .last()
                            })
                            .and_then(Value::as_f64);
                        series.points.push(DataPoint { value, key });
                    }
                    out.push(series);
                }
            }

            // Document paths never reach a time-bucketing leaf.
            MetricType::RawData | MetricType::RawDocument | MetricType::Logs => {
                debug!(metric_type = ?metric.metric_type, "document metric at leaf, skipping");
            }

            // avg/sum/min/max/cardinality/rate and the pipeline kinds all
            // carry a single value object per bucket.
            _ => {
                let mut series =
                    new_series(metric_type_tag(metric.metric_type), metric.field.clone());
                for (_, bucket) in pairs {
                    let Some(key) = bucket_key(bucket) else { continue };
                    // A bucket lacking the metric id contributes no point.
                    let Some(result) = bucket.get(&metric.id) else { continue };
                    series.points.push(DataPoint {
                        value: single_value(result),
                        key,
                    });
                }
                out.push(series);
            }
        }
    }
}

/// Datapoint key for a leaf bucket: numeric `key`, falling back to a
/// parseable `key_as_string`. Buckets with neither are skipped.
fn bucket_key(bucket: &Value) -> Option<f64> {
    if let Some(key) = bucket.get("key").and_then(Value::as_f64) {
        return Some(key);
    }
    bucket
        .get("key_as_string")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

/// Single-value metric result, preferring percentile-unit normalization.
pub(crate) fn single_value(result: &Value) -> Option<f64> {
    result
        .get("normalized_value")
        .and_then(Value::as_f64)
        .or_else(|| result.get("value").and_then(Value::as_f64))
}

/// Read one extended_stats statistic, lifting the nested standard-deviation
/// bounds to top-level reads.
pub(crate) fn extended_stat_value(stats: &Value, stat: &str) -> Option<f64> {
    match stat {
        "std_deviation_bounds_upper" => stats
            .get("std_deviation_bounds")
            .and_then(|b| b.get("upper"))
            .and_then(Value::as_f64),
        "std_deviation_bounds_lower" => stats
            .get("std_deviation_bounds")
            .and_then(|b| b.get("lower"))
            .and_then(Value::as_f64),
        other => stats.get(other).and_then(Value::as_f64),
    }
}

/// Meta flags arrive as booleans, but string forms occur in stored queries.
pub(crate) fn flag_enabled(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn metric_type_tag(metric_type: MetricType) -> String {
    match serde_json::to_value(metric_type) {
        Ok(Value::String(tag)) => tag,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use serde_json::json;

    fn run(target_json: serde_json::Value, buckets: serde_json::Value) -> Vec<Series> {
        let target: Query = serde_json::from_value(target_json).unwrap();
        let buckets = buckets.as_array().unwrap().to_vec();
        let pairs: Vec<(String, &Value)> = buckets
            .iter()
            .enumerate()
            .map(|(i, b)| (i.to_string(), b))
            .collect();
        let mut out = Vec::new();
        extract_series(&target, &pairs, &[], &mut out);
        out
    }

    // ===================================================================
    // count
    // ===================================================================

    #[test]
    fn test_count_one_point_per_bucket_in_order() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "count" }],
                "bucketAggs": [{ "id": "2", "type": "date_histogram" }]
            }),
            json!([
                { "doc_count": 10, "key": 1000 },
                { "doc_count": 15, "key": 2000 }
            ]),
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].metric_kind, "count");
        assert_eq!(
            series[0].points,
            vec![
                DataPoint { value: Some(10.0), key: 1000.0 },
                DataPoint { value: Some(15.0), key: 2000.0 },
            ]
        );
    }

    #[test]
    fn test_bucket_without_usable_key_is_dropped() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "count" }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([
                { "key": 1000, "doc_count": 1 },
                { "key": "not-a-time", "key_as_string": "still-not", "doc_count": 5 },
                { "key_as_string": "2000", "doc_count": 3 }
            ]),
        );
        // The unkeyable bucket vanishes; its neighbors are untouched.
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[0].points[0], DataPoint { value: Some(1.0), key: 1000.0 });
        assert_eq!(series[0].points[1], DataPoint { value: Some(3.0), key: 2000.0 });
    }

    #[test]
    fn test_hidden_metric_is_skipped() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [
                    { "id": "1", "type": "count", "hide": true },
                    { "id": "3", "type": "avg", "field": "value" }
                ],
                "bucketAggs": [{ "id": "2", "type": "date_histogram" }]
            }),
            json!([{ "doc_count": 1, "key": 1000, "3": { "value": 2.0 } }]),
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].metric_kind, "avg");
    }

    // ===================================================================
    // percentiles fan-out
    // ===================================================================

    #[test]
    fn test_percentiles_fan_out_per_key() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "percentiles", "field": "@value" }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([
                { "doc_count": 10, "key": 1000,
                  "1": { "values": { "75": 3.3, "90": 5.5 } } },
                { "doc_count": 15, "key": 2000,
                  "1": { "values": { "75": 2.3, "90": 4.5 } } }
            ]),
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].metric_kind, "p75");
        assert_eq!(series[1].metric_kind, "p90");
        assert_eq!(series[0].field.as_deref(), Some("@value"));
        assert_eq!(series[0].points[0].value, Some(3.3));
        assert_eq!(series[1].points[1].value, Some(4.5));
    }

    #[test]
    fn test_percentiles_zero_buckets_emit_nothing() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "percentiles", "field": "@value" }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([]),
        );
        assert!(series.is_empty());
    }

    #[test]
    fn test_percentiles_missing_bucket_value_is_gap_point() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "percentiles", "field": "@value" }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([
                { "doc_count": 1, "key": 1000, "1": { "values": { "95": 1.0 } } },
                { "doc_count": 0, "key": 2000 }
            ]),
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].points[1], DataPoint { value: None, key: 2000.0 });
    }

    // ===================================================================
    // extended_stats fan-out
    // ===================================================================

    #[test]
    fn test_extended_stats_meta_flags_and_bounds() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{
                    "id": "1", "type": "extended_stats", "field": "@value",
                    "meta": { "max": true, "std_deviation_bounds_upper": true,
                              "std_deviation_bounds_lower": true, "min": false }
                }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([{
                "key": 1000, "doc_count": 60,
                "1": { "max": 10.2, "min": 5.5,
                       "std_deviation_bounds": { "upper": 3.0, "lower": -2.0 } }
            }]),
        );
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].metric_kind, "max");
        assert_eq!(series[0].points[0].value, Some(10.2));
        assert_eq!(series[1].metric_kind, "std_deviation_bounds_upper");
        assert_eq!(series[1].points[0].value, Some(3.0));
        assert_eq!(series[2].metric_kind, "std_deviation_bounds_lower");
        assert_eq!(series[2].points[0].value, Some(-2.0));
    }

    // ===================================================================
    // top_metrics fan-out
    // ===================================================================

    #[test]
    fn test_top_metrics_per_field_last_value() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{
                    "id": "1", "type": "top_metrics",
                    "settings": { "metrics": ["@value", "@anotherValue"] }
                }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([{
                "key": 1000,
                "1": { "top": [{ "sort": [1000], "metrics": { "@value": 1.0, "@anotherValue": 2.0 } }] }
            }, {
                "key": 2000,
                "1": { "top": [{ "sort": [2000], "metrics": { "@value": 1.1 } }] }
            }]),
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].field.as_deref(), Some("@value"));
        assert_eq!(series[0].points[0].value, Some(1.0));
        assert_eq!(series[0].points[1].value, Some(1.1));
        // Field absent from the second hit resolves to a gap.
        assert_eq!(series[1].field.as_deref(), Some("@anotherValue"));
        assert_eq!(series[1].points[1].value, None);
    }

    // ===================================================================
    // default single-value policy
    // ===================================================================

    #[test]
    fn test_default_prefers_normalized_value() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "rate", "field": "@value" }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([{ "key": 1000, "1": { "value": 5.0, "normalized_value": 0.5 } }]),
        );
        assert_eq!(series[0].points[0].value, Some(0.5));
    }

    #[test]
    fn test_default_missing_metric_id_is_gap_not_zero() {
        let series = run(
            json!({
                "refId": "A",
                "metrics": [{ "id": "1", "type": "avg", "field": "@value" }],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([
                { "key": 1000, "1": { "value": 2.0 } },
                { "key": 2000 },
                { "key": 3000, "1": { "value": 4.0 } }
            ]),
        );
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[0].points[1].key, 3000.0);
    }

    #[test]
    fn test_pipeline_null_value_is_gap_point() {
        // A derivative's first bucket carries the id with a null value.
        let series = run(
            json!({
                "refId": "A",
                "metrics": [
                    { "id": "1", "type": "sum", "field": "@value", "hide": true },
                    { "id": "2", "type": "derivative", "field": "1" }
                ],
                "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
            }),
            json!([
                { "key": 1000, "1": { "value": 2.0 }, "2": { "value": null } },
                { "key": 2000, "1": { "value": 3.0 }, "2": { "value": 1.0 } }
            ]),
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].metric_kind, "derivative");
        assert_eq!(series[0].points[0], DataPoint { value: None, key: 1000.0 });
        assert_eq!(series[0].points[1].value, Some(1.0));
    }
}
