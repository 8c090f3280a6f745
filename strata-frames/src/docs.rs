//! Document flattening for raw-document, raw-data, and log queries
//!
//! Independent of the aggregation walk: hits are flattened into wide
//! records with dotted-path keys, a union schema, and inferred column
//! types.

use crate::frame::{DocField, DocFrame, FieldType, FrameMeta, PreferredVisualisation};
use crate::response::{Hit, HitsBlock};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Marker pair delimiting highlighted fragments in highlight arrays.
#[derive(Debug, Clone)]
pub struct HighlightTags {
    pub pre: String,
    pub post: String,
}

impl Default for HighlightTags {
    fn default() -> Self {
        Self {
            pre: "@HIGHLIGHT@".to_string(),
            post: "@/HIGHLIGHT@".to_string(),
        }
    }
}

/// Flattening options for one target.
#[derive(Debug, Clone, Default)]
pub(crate) struct DocOptions {
    /// Remap this source field into a canonical `message` column.
    pub message_field: Option<String>,
    /// Remap this source field into a canonical `level` column.
    pub level_field: Option<String>,
    /// Log mode: remapping, search words, and the "logs" visualisation tag.
    pub logs: bool,
    pub tags: HighlightTags,
}

/// Flatten a nested source object into dotted-path keys, one logical level
/// deep after flattening. Arrays and scalars are kept as-is.
pub(crate) fn flatten(source: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into("", source, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match child {
                    Value::Object(_) => flatten_into(&path, child, out),
                    other => {
                        out.insert(path, other.clone());
                    }
                }
            }
        }
        other => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), other.clone());
            }
        }
    }
}

/// One wide record per hit: metadata, then flattened source, then explicit
/// top-level `fields` entries. Later keys overwrite earlier ones.
pub(crate) fn flatten_hit(hit: &Hit) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("_id".to_string(), Value::String(hit.id.clone()));
    if let Some(doc_type) = &hit.doc_type {
        doc.insert("_type".to_string(), Value::String(doc_type.clone()));
    }
    if let Some(index) = &hit.index {
        doc.insert("_index".to_string(), Value::String(index.clone()));
    }
    if let Some(sort) = &hit.sort {
        doc.insert("sort".to_string(), sort.clone());
    }
    if let Some(highlight) = &hit.highlight {
        doc.insert(
            "highlight".to_string(),
            serde_json::to_value(highlight).unwrap_or(Value::Null),
        );
    }
    for (key, value) in flatten(&hit.source) {
        doc.insert(key, value);
    }
    if let Some(fields) = &hit.fields {
        for (key, value) in fields {
            doc.insert(key.clone(), value.clone());
        }
    }
    doc
}

/// Build the wide tabular frame for one target's hits.
pub(crate) fn docs_frame(ref_id: &str, hits: &HitsBlock, opts: &DocOptions) -> DocFrame {
    let mut docs: Vec<Map<String, Value>> = hits.hits.iter().map(flatten_hit).collect();

    if opts.logs {
        for doc in &mut docs {
            if let Some(field) = &opts.message_field {
                if let Some(message) = doc.get(field).cloned() {
                    doc.insert("message".to_string(), message);
                }
            }
            if let Some(field) = &opts.level_field {
                if let Some(level) = doc.get(field).cloned() {
                    doc.insert("level".to_string(), level);
                }
            }
        }
    }

    // Union of all keys across hits, lexicographically sorted.
    let names: BTreeSet<String> = docs.iter().flat_map(|doc| doc.keys().cloned()).collect();

    let fields = names
        .iter()
        .map(|name| DocField {
            name: name.clone(),
            field_type: docs
                .iter()
                .filter_map(|doc| doc.get(name))
                .find(|value| !value.is_null())
                .map_or(FieldType::Other, FieldType::infer),
        })
        .collect();

    let rows = docs
        .iter()
        .map(|doc| {
            names
                .iter()
                .map(|name| doc.get(name).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    let meta = FrameMeta {
        preferred_visualisation: opts.logs.then_some(PreferredVisualisation::Logs),
        search_words: if opts.logs {
            highlight_words(&hits.hits, &opts.tags)
        } else {
            Vec::new()
        },
    };

    DocFrame {
        ref_id: ref_id.to_string(),
        fields,
        rows,
        total: hits.total_count(),
        meta,
    }
}

/// Collect the unique highlighted terms across all hits, in first-seen
/// order. Two passes per fragment: one to find delimited fragments, one to
/// capture the literal text inside each.
pub(crate) fn highlight_words(hits: &[Hit], tags: &HighlightTags) -> Vec<String> {
    let fragment_pattern = format!(
        "{}(?s:.*?){}",
        regex::escape(&tags.pre),
        regex::escape(&tags.post)
    );
    let capture_pattern = format!(
        "{}((?s:.*?)){}",
        regex::escape(&tags.pre),
        regex::escape(&tags.post)
    );
    let (Ok(fragment_re), Ok(capture_re)) =
        (Regex::new(&fragment_pattern), Regex::new(&capture_pattern))
    else {
        return Vec::new();
    };

    let mut words: Vec<String> = Vec::new();
    for hit in hits {
        let Some(highlight) = &hit.highlight else { continue };
        let mut fields: Vec<&String> = highlight.keys().collect();
        fields.sort();
        for field in fields {
            for fragment in &highlight[field] {
                for matched in fragment_re.find_iter(fragment) {
                    let Some(caps) = capture_re.captures(matched.as_str()) else { continue };
                    let word = caps[1].to_string();
                    if !words.contains(&word) {
                        words.push(word);
                    }
                }
            }
        }
    }
    words
}
