//! Batch orchestration: per-target dispatch, edge trimming, assembly
//!
//! One batched response is processed strictly sequentially, in request
//! order. Each target gets fresh accumulators, so a failure in one pair
//! cannot corrupt a sibling's state; the only surfaced failure is an
//! upstream error object, which aborts the whole batch.

use crate::docs::{docs_frame, DocOptions, HighlightTags};
use crate::frame::{DataItem, Series, TransformedResponse};
use crate::name::name_series;
use crate::query::{BucketAggType, Metric, MetricType, Query};
use crate::response::{extract_error, MultiSearchResponse, SearchResponse};
use crate::walker::walk;
use crate::Result;
use tracing::debug;

/// Caller-owned configuration for the document/log path.
#[derive(Debug, Clone, Default)]
pub struct TransformConfig {
    pub log_message_field: Option<String>,
    pub log_level_field: Option<String>,
    pub highlight_tags: HighlightTags,
}

/// The response-flattening engine's entry point.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    config: TransformConfig,
}

impl Transformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Flatten one batched response. Targets and response slots are paired
    /// in request order.
    pub fn transform(
        &self,
        targets: &[Query],
        response: &MultiSearchResponse,
    ) -> Result<TransformedResponse> {
        let mut out = TransformedResponse::default();

        for (target, slot) in targets.iter().zip(&response.responses) {
            if let Some(error) = &slot.error {
                // One bad target fails the whole batch.
                return Err(extract_error(error));
            }
            self.transform_target(target, slot, &mut out);
        }

        Ok(out)
    }

    fn transform_target(
        &self,
        target: &Query,
        slot: &SearchResponse,
        out: &mut TransformedResponse,
    ) {
        match target.metrics.first().map(|m| m.metric_type) {
            Some(MetricType::RawDocument) | Some(MetricType::RawData) => {
                if let Some(hits) = &slot.hits {
                    out.data.push(DataItem::Docs(docs_frame(
                        &target.ref_id,
                        hits,
                        &DocOptions::default(),
                    )));
                }
            }

            Some(MetricType::Logs) => {
                let opts = DocOptions {
                    message_field: self.config.log_message_field.clone(),
                    level_field: self.config.log_level_field.clone(),
                    logs: true,
                    tags: self.config.highlight_tags.clone(),
                };
                if let Some(hits) = &slot.hits {
                    out.data.push(DataItem::Docs(docs_frame(&target.ref_id, hits, &opts)));
                }
                // A log query can also carry a count-over-time tree; its
                // buckets hold doc counts only, so walk them as a count.
                if slot.aggregations.is_some() {
                    let mut histogram_target = target.clone();
                    histogram_target.metrics = target
                        .metrics
                        .iter()
                        .take(1)
                        .map(|m| Metric {
                            id: m.id.clone(),
                            metric_type: MetricType::Count,
                            field: None,
                            settings: None,
                            meta: None,
                            hide: false,
                            pipeline_variables: Vec::new(),
                        })
                        .collect();
                    self.transform_aggregations(&histogram_target, slot, out);
                }
            }

            _ => {
                self.transform_aggregations(target, slot, out);
                if slot.aggregations.is_none() {
                    // Plain-hits path: no aggregation tree, documents only.
                    if let Some(hits) = slot.hits.as_ref().filter(|h| !h.hits.is_empty()) {
                        out.data.push(DataItem::Docs(docs_frame(
                            &target.ref_id,
                            hits,
                            &DocOptions::default(),
                        )));
                    }
                }
            }
        }
    }

    fn transform_aggregations(
        &self,
        target: &Query,
        slot: &SearchResponse,
        out: &mut TransformedResponse,
    ) {
        let Some(aggs) = &slot.aggregations else { return };

        let mut walked = walk(target, aggs);
        trim_edges(&mut walked.series, target);
        name_series(&mut walked.series, target);

        debug!(
            ref_id = %target.ref_id,
            series = walked.series.len(),
            rows = walked.table.rows.len(),
            "flattened aggregation tree"
        );

        out.data.extend(walked.series.into_iter().map(DataItem::Series));
        if !walked.table.is_empty() {
            out.data.push(DataItem::Table(walked.table));
        }
    }
}

/// Strip N leading and trailing points from every series when the query's
/// date_histogram requests trimming. Series no longer than 2N are left
/// untouched.
fn trim_edges(series_list: &mut [Series], target: &Query) {
    let trim = target
        .bucket_aggs
        .iter()
        .find(|agg| agg.agg_type == BucketAggType::DateHistogram)
        .map(|agg| agg.trim_edges())
        .unwrap_or(0);
    if trim == 0 {
        return;
    }
    for series in series_list {
        let len = series.points.len();
        if len > trim * 2 {
            series.points.drain(len - trim..);
            series.points.drain(..trim);
        }
    }
}
