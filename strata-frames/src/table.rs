//! Table-row extraction for non-time terminal groupings
//!
//! One shared table accumulates rows across every terminal invocation of a
//! single walk. Cell extraction mirrors the series policies; fan-out kinds
//! contribute one column per item, registered lazily on first sight.

use crate::extract::{extended_stat_value, flag_enabled, single_value};
use crate::frame::Table;
use crate::query::{metric_kind_label, rendered_script, BucketAgg, MetricType, Query};
use serde_json::Value;

pub(crate) fn extract_rows(
    target: &Query,
    agg_def: &BucketAgg,
    pairs: &[(String, &Value)],
    props: &[(String, String)],
    table: &mut Table,
) {
    if table.columns.is_empty() {
        for (prop, _) in props {
            table.add_column(prop.clone(), false);
        }
        let key_column = agg_def.field.clone().unwrap_or_else(|| agg_def.id.clone());
        table.add_column(key_column, true);
    }

    for (label, bucket) in pairs {
        let mut row: Vec<Value> = props
            .iter()
            .map(|(_, value)| Value::String(value.clone()))
            .collect();
        match bucket.get("key") {
            Some(key) => row.push(key.clone()),
            None => row.push(Value::String(label.clone())),
        }

        for metric in &target.metrics {
            if metric.hide {
                continue;
            }
            match metric.metric_type {
                MetricType::Count => {
                    let count = bucket.get("doc_count").cloned().unwrap_or(Value::Null);
                    add_metric_value(table, &mut row, "Count".to_string(), count);
                }

                MetricType::ExtendedStats => {
                    let Some(meta) = metric.meta.as_ref() else { continue };
                    for (stat, flag) in meta {
                        if !flag_enabled(flag) {
                            continue;
                        }
                        let value = bucket
                            .get(&metric.id)
                            .and_then(|stats| extended_stat_value(stats, stat))
                            .map_or(Value::Null, Value::from);
                        add_metric_value(table, &mut row, metric_kind_label(stat), value);
                    }
                }

                MetricType::Percentiles => {
                    // Key set comes from the first bucket carrying the metric
                    // so every row gets one cell per column; buckets lacking
                    // the result contribute Null cells instead of shifting
                    // later metrics left.
                    let Some(keys) = pairs.iter().find_map(|(_, b)| {
                        b.get(&metric.id)
                            .and_then(|m| m.get("values"))
                            .and_then(Value::as_object)
                            .map(|values| values.keys().cloned().collect::<Vec<_>>())
                    }) else {
                        continue;
                    };
                    let field = metric.field.as_deref().unwrap_or_default();
                    let values = bucket.get(&metric.id).and_then(|m| m.get("values"));
                    for percentile in &keys {
                        let value = values
                            .and_then(|v| v.get(percentile))
                            .cloned()
                            .unwrap_or(Value::Null);
                        add_metric_value(
                            table,
                            &mut row,
                            format!("p{percentile} {field}"),
                            value,
                        );
                    }
                }

                MetricType::TopMetrics => {
                    for field in metric.top_metrics_fields() {
                        let value = bucket
                            .get(&metric.id)
                            .and_then(|m| m.get("top"))
                            .and_then(Value::as_array)
                            .and_then(|top| {
                                top.iter()
                                    .filter_map(|hit| hit.get("metrics")?.get(field))
                                    .last()
                            })
                            .cloned()
                            .unwrap_or(Value::Null);
                        let name = format!("{} {}", MetricType::TopMetrics.label(), field);
                        add_metric_value(table, &mut row, name, value);
                    }
                }

                MetricType::RawData | MetricType::RawDocument | MetricType::Logs => {}

                _ => {
                    let mut name = metric.metric_type.label().to_string();
                    let siblings = target
                        .metrics
                        .iter()
                        .filter(|m| m.metric_type == metric.metric_type)
                        .count();
                    if siblings > 1 {
                        // Disambiguate same-kind columns by field, or for
                        // bucket_script by the rendered formula.
                        if metric.metric_type == MetricType::BucketScript {
                            if let Some(script) = rendered_script(target, metric) {
                                name = script;
                            }
                        } else if let Some(field) = &metric.field {
                            name = format!("{name} {field}");
                        }
                    }
                    let value = bucket
                        .get(&metric.id)
                        .and_then(single_value)
                        .map_or(Value::Null, Value::from);
                    add_metric_value(table, &mut row, name, value);
                }
            }
        }

        table.rows.push(row);
    }
}

fn add_metric_value(table: &mut Table, row: &mut Vec<Value>, name: String, value: Value) {
    table.add_column(name, false);
    row.push(value);
}
