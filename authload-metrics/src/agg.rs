use std::collections::HashMap;
use std::sync::atomic::Ordering;

use smallvec::SmallVec;

use crate::key::KeyId;
use crate::metrics::{MetricStorage, TrendSnapshot};
use crate::registry::{MetricId, Registry};
use crate::tags::TagSet;

#[derive(Debug, Clone, Copy)]
enum TagFilter {
    Eq(KeyId, KeyId),
    Has(KeyId),
    Missing(KeyId),
    Never,
}

impl TagFilter {
    fn matches(&self, tags: &TagSet) -> bool {
        match *self {
            TagFilter::Eq(k, v) => tags.get(k) == Some(v),
            TagFilter::Has(k) => tags.get(k).is_some(),
            TagFilter::Missing(k) => tags.get(k).is_none(),
            TagFilter::Never => false,
        }
    }
}

/// Read-side aggregation over the series of one metric.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    registry: &'a Registry,
    metric: MetricId,
    filters: SmallVec<[TagFilter; 4]>,
    group_keys: SmallVec<[KeyId; 4]>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(registry: &'a Registry, metric: MetricId) -> Self {
        Self {
            registry,
            metric,
            filters: SmallVec::new(),
            group_keys: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn where_eq(mut self, key: KeyId, value: KeyId) -> Self {
        self.filters.push(TagFilter::Eq(key, value));
        self
    }

    /// Filters by string tag; a key or value that was never recorded matches nothing.
    #[must_use]
    pub fn where_tag(mut self, key: &str, value: &str) -> Self {
        let filter = match (self.registry.lookup_key(key), self.registry.lookup_key(value)) {
            (Some(k), Some(v)) => TagFilter::Eq(k, v),
            _ => TagFilter::Never,
        };
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn where_has(mut self, key: KeyId) -> Self {
        self.filters.push(TagFilter::Has(key));
        self
    }

    #[must_use]
    pub fn where_missing(mut self, key: KeyId) -> Self {
        self.filters.push(TagFilter::Missing(key));
        self
    }

    #[must_use]
    pub fn group_by(mut self, keys: impl IntoIterator<Item = KeyId>) -> Self {
        self.group_keys = keys.into_iter().collect();
        self.group_keys.sort_unstable();
        self.group_keys.dedup();
        self
    }

    fn matches(&self, tags: &TagSet) -> bool {
        self.filters.iter().all(|f| f.matches(tags))
    }

    fn group_key(&self, tags: &TagSet) -> TagSet {
        tags.project(&self.group_keys)
    }

    pub fn sum_counter(self) -> HashMap<TagSet, u64> {
        let mut out: HashMap<TagSet, u64> = HashMap::new();

        self.registry.visit_series(self.metric, |tags, storage| {
            if !self.matches(tags) {
                return;
            }
            let MetricStorage::Counter(c) = storage else {
                return;
            };

            let v = c.load(Ordering::Relaxed);
            let k = self.group_key(tags);
            let cur = out.entry(k).or_default();
            *cur = cur.saturating_add(v);
        });

        out
    }

    pub fn sum_counter_total(self) -> u64 {
        self.sum_counter().values().copied().sum()
    }

    /// Largest gauge value across matching series.
    pub fn max_gauge(self) -> Option<i64> {
        let mut out: Option<i64> = None;
        self.registry.visit_series(self.metric, |tags, storage| {
            if !self.matches(tags) {
                return;
            }
            if let MetricStorage::Gauge(g) = storage {
                let v = g.load(Ordering::Relaxed);
                out = Some(out.map_or(v, |cur| cur.max(v)));
            }
        });
        out
    }

    /// Sums rate observations per group as `(total, hits)`.
    pub fn sum_rate(self) -> HashMap<TagSet, (u64, u64)> {
        let mut out: HashMap<TagSet, (u64, u64)> = HashMap::new();

        self.registry.visit_series(self.metric, |tags, storage| {
            if !self.matches(tags) {
                return;
            }
            let MetricStorage::Rate(r) = storage else {
                return;
            };

            let (total, hits) = r.load();
            let k = self.group_key(tags);
            let cur = out.entry(k).or_default();
            cur.0 = cur.0.saturating_add(total);
            cur.1 = cur.1.saturating_add(hits);
        });

        out
    }

    /// `(total, hits)` across every matching series.
    pub fn sum_rate_total(self) -> (u64, u64) {
        self.sum_rate()
            .values()
            .fold((0, 0), |acc, (t, h)| (acc.0 + t, acc.1 + h))
    }

    pub fn merge_trend(self) -> HashMap<TagSet, TrendSnapshot> {
        let mut acc: HashMap<TagSet, TrendSnapshot> = HashMap::new();

        self.registry.visit_series(self.metric, |tags, storage| {
            if !self.matches(tags) {
                return;
            }
            let MetricStorage::Trend(h) = storage else {
                return;
            };

            let k = self.group_key(tags);
            acc.entry(k).or_default().merge(&h.lock());
        });

        acc
    }

    /// Merges every matching series into one snapshot (empty when nothing matched).
    pub fn merge_trend_total(self) -> TrendSnapshot {
        let mut out = TrendSnapshot::default();
        for snap in self.group_by(std::iter::empty::<KeyId>()).merge_trend().into_values() {
            out.merge_snapshot(&snap);
        }
        out
    }
}
