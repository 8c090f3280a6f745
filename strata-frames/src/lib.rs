//! Response-flattening engine for document-search aggregation queries
//!
//! This crate converts the nested, recursively-bucketed result of a search
//! aggregation query into flat, named, ordered data series and tabular rows
//! suitable for charting and display. Query construction, transport, and
//! rendering are external collaborators; the engine is a pure, synchronous
//! in-memory transformation.
//!
//! # Paths
//!
//! - Aggregation queries walk the bucket tree depth-first, extract one or
//!   more series per metric at a time-bucketing leaf (or table rows at any
//!   other leaf), trim edges, and resolve display names.
//! - `raw_document` / `raw_data` queries flatten document hits into a wide
//!   tabular frame with inferred column types.
//! - `logs` queries additionally remap message/level columns, collect
//!   highlighted search words, and emit a count-over-time histogram series
//!   when the response carries one.
//!
//! # Entry point
//!
//! [`Transformer::transform`] pairs a slice of [`Query`] targets with a
//! [`MultiSearchResponse`] and returns the flat [`TransformedResponse`].

pub mod docs;
pub mod error;
pub mod frame;
pub mod query;
pub mod response;
pub mod transform;

mod extract;
mod name;
mod table;
mod walker;

pub use docs::HighlightTags;
pub use error::FrameError;
pub use frame::{DataItem, DocFrame, Series, Table, TransformedResponse};
pub use query::{BucketAgg, BucketAggType, Metric, MetricType, Query};
pub use response::{MultiSearchResponse, SearchResponse};
pub use transform::{TransformConfig, Transformer};

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, FrameError>;
