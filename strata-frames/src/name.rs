//! Series naming: alias templates, pipeline descriptions, dedup mode

use crate::frame::Series;
use crate::query::{describe_metric, metric_kind_label, rendered_script, MetricType, Query};
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

static ALIAS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([\s\S]+?)\}\}").expect("alias token pattern"));

/// Assign a display name to every raw series of one target.
///
/// Dedup mode activates when the series carry more than one distinct metric
/// kind, or when a top_metrics fans out over several fields; it appends the
/// metric-derived name after the property prefix instead of dropping it.
pub(crate) fn name_series(series_list: &mut [Series], target: &Query) {
    let distinct_kinds: BTreeSet<&str> = series_list
        .iter()
        .map(|series| series.metric_kind.as_str())
        .collect();
    let multi_field_top_metrics = target
        .metrics
        .iter()
        .any(|m| m.metric_type == MetricType::TopMetrics && m.top_metrics_fields().len() > 1);
    let dedup = distinct_kinds.len() > 1 || multi_field_top_metrics;

    for series in series_list.iter_mut() {
        series.name = series_name(series, target, dedup);
    }
}

fn series_name(series: &Series, target: &Query, dedup: bool) -> String {
    let mut metric_name = metric_kind_label(&series.metric_kind);

    if let Some(alias) = &target.alias {
        return resolve_alias(alias, series, &metric_name);
    }

    let kind = MetricType::from_type_str(&series.metric_kind);
    if let Some(kind) = kind.filter(|k| k.is_pipeline()) {
        if kind.has_multiple_bucket_paths() {
            metric_name = series
                .metric_id
                .as_deref()
                .and_then(|id| target.metric_by_id(id))
                .and_then(|def| rendered_script(target, def))
                .unwrap_or_else(|| "Unset".to_string());
        } else {
            // The pipeline's `field` holds the referenced metric id.
            let referenced = series
                .metric_id
                .as_deref()
                .and_then(|id| target.metric_by_id(id))
                .and_then(|def| def.field.as_deref())
                .and_then(|ref_id| target.metric_by_id(ref_id));
            metric_name = match referenced {
                Some(applied) => format!("{metric_name} {}", describe_metric(applied)),
                None => "Unset".to_string(),
            };
        }
    } else if let Some(field) = &series.field {
        metric_name = format!("{metric_name} {field}");
    }

    if series.properties.is_empty() {
        return metric_name;
    }

    let prefix = series
        .properties
        .iter()
        .map(|(_, value)| value.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if dedup {
        format!("{prefix} {metric_name}")
    } else {
        prefix
    }
}

/// Resolve `{{token}}` occurrences; unresolved tokens stay verbatim,
/// braces included.
fn resolve_alias(alias: &str, series: &Series, metric_name: &str) -> String {
    let prop = |name: &str| {
        series
            .properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    ALIAS_TOKEN
        .replace_all(alias, |caps: &Captures| {
            let token = &caps[1];
            let resolved = if let Some(name) = token.strip_prefix("term ") {
                prop(name)
            } else if token == "metric" {
                Some(metric_name.to_string())
            } else if token == "field" {
                Some(series.field.clone().unwrap_or_default())
            } else {
                prop(token)
            };
            resolved.unwrap_or_else(|| {
                debug!(token, "unresolved alias token left verbatim");
                caps[0].to_string()
            })
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(json: serde_json::Value) -> Query {
        serde_json::from_value(json).unwrap()
    }

    fn series(kind: &str, field: Option<&str>, metric_id: &str, props: &[(&str, &str)]) -> Series {
        Series {
            metric_kind: kind.to_string(),
            field: field.map(str::to_string),
            metric_id: Some(metric_id.to_string()),
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Series::default()
        }
    }

    // ===================================================================
    // Alias templates
    // ===================================================================

    #[test]
    fn test_alias_tokens_resolve_and_unresolved_stay_verbatim() {
        let target = target(json!({
            "refId": "A",
            "alias": "{{term host}} {{metric}} and {{not_exist}} {{host}}",
            "metrics": [{ "id": "1", "type": "count" }],
            "bucketAggs": [
                { "id": "2", "type": "terms", "field": "host" },
                { "id": "3", "type": "date_histogram", "field": "@timestamp" }
            ]
        }));
        let mut list = vec![
            series("count", None, "1", &[("host", "server1")]),
            series("count", None, "1", &[("host", "server2")]),
            series("count", None, "1", &[("host", "0")]),
        ];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "server1 Count and {{not_exist}} server1");
        assert_eq!(list[1].name, "server2 Count and {{not_exist}} server2");
        assert_eq!(list[2].name, "0 Count and {{not_exist}} 0");
    }

    #[test]
    fn test_alias_field_token_empty_without_field() {
        let target = target(json!({
            "refId": "A",
            "alias": "[{{field}}]",
            "metrics": [{ "id": "1", "type": "count" }],
            "bucketAggs": []
        }));
        let mut list = vec![series("count", None, "1", &[])];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "[]");
    }

    // ===================================================================
    // Pipeline naming
    // ===================================================================

    #[test]
    fn test_single_path_pipeline_describes_referenced_metric() {
        let target = target(json!({
            "refId": "A",
            "metrics": [
                { "id": "1", "type": "sum", "field": "@value" },
                { "id": "2", "type": "moving_avg", "field": "1" }
            ],
            "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
        }));
        let mut list = vec![
            series("sum", Some("@value"), "1", &[]),
            series("moving_avg", Some("1"), "2", &[]),
        ];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "Sum @value");
        assert_eq!(list[1].name, "Moving Average Sum @value");
    }

    #[test]
    fn test_unresolved_pipeline_reference_is_unset() {
        let target = target(json!({
            "refId": "A",
            "metrics": [{ "id": "2", "type": "derivative", "field": "99" }],
            "bucketAggs": [{ "id": "3", "type": "date_histogram" }]
        }));
        let mut list = vec![series("derivative", Some("99"), "2", &[])];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "Unset");
    }

    #[test]
    fn test_bucket_script_names_use_rendered_formula() {
        let target = target(json!({
            "refId": "A",
            "metrics": [
                { "id": "1", "type": "sum", "field": "@value", "hide": true },
                { "id": "2", "type": "max", "field": "@value", "hide": true },
                { "id": "3", "type": "bucket_script",
                  "pipelineVariables": [
                      { "name": "var1", "pipelineAgg": "1" },
                      { "name": "var2", "pipelineAgg": "2" }
                  ],
                  "settings": { "script": "params.var1 * params.var2" } }
            ],
            "bucketAggs": [{ "id": "4", "type": "date_histogram" }]
        }));
        let mut list = vec![series("bucket_script", None, "3", &[])];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "Sum @value * Max @value");
    }

    #[test]
    fn test_bucket_script_without_script_is_unset() {
        let target = target(json!({
            "refId": "A",
            "metrics": [{ "id": "3", "type": "bucket_script" }],
            "bucketAggs": [{ "id": "4", "type": "date_histogram" }]
        }));
        let mut list = vec![series("bucket_script", None, "3", &[])];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "Unset");
    }

    // ===================================================================
    // Property prefix and dedup mode
    // ===================================================================

    #[test]
    fn test_single_kind_uses_property_prefix_only() {
        let target = target(json!({
            "refId": "A",
            "metrics": [{ "id": "1", "type": "count" }],
            "bucketAggs": []
        }));
        let mut list = vec![
            series("count", None, "1", &[("host", "server1")]),
            series("count", None, "1", &[("host", "server2")]),
        ];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "server1");
        assert_eq!(list[1].name, "server2");
    }

    #[test]
    fn test_dedup_appends_metric_name_after_prefix() {
        let target = target(json!({
            "refId": "A",
            "metrics": [
                { "id": "1", "type": "count" },
                { "id": "2", "type": "avg", "field": "@value" }
            ],
            "bucketAggs": []
        }));
        let mut list = vec![
            series("count", None, "1", &[("host", "server1")]),
            series("avg", Some("@value"), "2", &[("host", "server1")]),
        ];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "server1 Count");
        assert_eq!(list[1].name, "server1 Average @value");
    }

    #[test]
    fn test_no_properties_uses_metric_name_alone() {
        let target = target(json!({
            "refId": "A",
            "metrics": [{ "id": "1", "type": "percentiles", "field": "@load" }],
            "bucketAggs": []
        }));
        let mut list = vec![series("p75", Some("@load"), "1", &[])];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "p75 @load");
    }

    #[test]
    fn test_multi_field_top_metrics_activates_dedup() {
        let target = target(json!({
            "refId": "A",
            "metrics": [{ "id": "1", "type": "top_metrics",
                          "settings": { "metrics": ["@value", "@other"] } }],
            "bucketAggs": []
        }));
        let mut list = vec![
            series("top_metrics", Some("@value"), "1", &[("host", "srv")]),
            series("top_metrics", Some("@other"), "1", &[("host", "srv")]),
        ];
        name_series(&mut list, &target);
        assert_eq!(list[0].name, "srv Top Metrics @value");
        assert_eq!(list[1].name, "srv Top Metrics @other");
    }
}
