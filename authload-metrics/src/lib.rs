//! Concurrent metric storage shared by every worker of a run.
//!
//! A [`Registry`] owns named metrics; each metric is partitioned into series by a
//! [`TagSet`]. Writers obtain a [`MetricHandle`] for a `(metric, tags)` pair and update it
//! with atomics (counters, gauges, rates) or a per-series lock (trends). Readers go
//! through [`Query`] to merge series at the end of a run.

pub mod agg;
pub mod key;
pub mod metrics;
pub mod registry;
pub mod tags;

pub use agg::Query;
pub use key::KeyId;
pub use metrics::{
    MetricHandle, MetricKind, MetricSeriesSummary, MetricValue, TrendSnapshot, TrendSummary,
};
pub use registry::{MetricId, Registry};
pub use tags::TagSet;
