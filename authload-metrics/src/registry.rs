use dashmap::DashMap;
use parking_lot::RwLock;

use crate::agg::Query;
use crate::key::{Interner, KeyId};
use crate::metrics::{MetricHandle, MetricKind, MetricSeriesSummary, MetricStorage};
use crate::tags::TagSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(u32);

#[derive(Debug)]
struct MetricDef {
    name: KeyId,
    kind: MetricKind,
}

/// Process-wide metric store.
///
/// Metric registration is rare and serialized; series creation and updates are
/// lock-free for counters, gauges and rates.
#[derive(Debug, Default)]
pub struct Registry {
    interner: Interner,
    defs: RwLock<Vec<MetricDef>>,
    storage: DashMap<MetricId, DashMap<TagSet, MetricStorage>>,
}

impl Registry {
    /// Registers a metric or returns the id of an existing metric with the same name.
    ///
    /// The kind of the first registration wins.
    pub fn register(&self, name: &str, kind: MetricKind) -> MetricId {
        let name_id = self.interner.get_or_intern(name);

        let mut defs = self.defs.write();
        if let Some(idx) = defs.iter().position(|d| d.name == name_id) {
            return MetricId(idx as u32);
        }

        let id = MetricId(defs.len() as u32);
        defs.push(MetricDef {
            name: name_id,
            kind,
        });
        self.storage.insert(id, DashMap::new());
        id
    }

    /// Finds a registered metric by name.
    pub fn lookup_metric(&self, name: &str) -> Option<(MetricId, MetricKind)> {
        let name_id = self.interner.lookup(name)?;
        let defs = self.defs.read();
        defs.iter()
            .position(|d| d.name == name_id)
            .map(|idx| (MetricId(idx as u32), defs[idx].kind))
    }

    pub fn metric_kind(&self, metric: MetricId) -> Option<MetricKind> {
        self.defs.read().get(metric.0 as usize).map(|d| d.kind)
    }

    pub fn metric_name(&self, metric: MetricId) -> Option<String> {
        let name = self.defs.read().get(metric.0 as usize)?.name;
        self.interner.resolve(name).map(|s| s.to_string())
    }

    pub fn resolve_key(&self, key: &str) -> KeyId {
        self.interner.get_or_intern(key)
    }

    /// Like [`Registry::resolve_key`] but never interns; `None` means no series can carry it.
    pub fn lookup_key(&self, key: &str) -> Option<KeyId> {
        self.interner.lookup(key)
    }

    pub fn key_str(&self, id: KeyId) -> String {
        self.interner
            .resolve(id)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }

    /// Interns and sorts tag pairs. On duplicate keys the first pair wins.
    pub fn resolve_tags(&self, tags: &[(&str, &str)]) -> TagSet {
        let mut resolved: Vec<(KeyId, KeyId)> = tags
            .iter()
            .map(|(k, v)| (self.resolve_key(k), self.resolve_key(v)))
            .collect();
        resolved.sort_by_key(|(k, _)| *k);
        resolved.dedup_by_key(|(k, _)| *k);
        TagSet::from_sorted_iter(resolved)
    }

    pub fn get_handle(&self, metric: MetricId, tags: TagSet) -> Option<MetricHandle> {
        let series_map = self.storage.get(&metric)?;

        if let Some(storage) = series_map.get(&tags) {
            return Some(storage.value().handle());
        }

        let kind = self.metric_kind(metric)?;
        let storage = series_map
            .entry(tags)
            .or_insert_with(|| MetricStorage::new(kind));
        Some(storage.value().handle())
    }

    /// Shorthand for `get_handle(metric, resolve_tags(tags))`.
    pub fn handle(&self, metric: MetricId, tags: &[(&str, &str)]) -> Option<MetricHandle> {
        self.get_handle(metric, self.resolve_tags(tags))
    }

    pub fn query(&self, metric: MetricId) -> Query<'_> {
        Query::new(self, metric)
    }

    pub(crate) fn visit_series(&self, metric: MetricId, mut f: impl FnMut(&TagSet, &MetricStorage)) {
        let Some(series_map) = self.storage.get(&metric) else {
            return;
        };
        for series in series_map.iter() {
            f(series.key(), series.value());
        }
    }

    pub fn tags_to_strings(&self, tags: &TagSet) -> Vec<(String, String)> {
        tags.iter()
            .map(|(k, v)| (self.key_str(k), self.key_str(v)))
            .collect()
    }

    /// One entry per series, sorted by metric name then tags.
    pub fn summarize(&self) -> Vec<MetricSeriesSummary> {
        let mut out = Vec::new();
        let defs = self.defs.read();

        for entry in self.storage.iter() {
            let Some(def) = defs.get(entry.key().0 as usize) else {
                continue;
            };
            let name = self.key_str(def.name);

            for series in entry.value().iter() {
                out.push(MetricSeriesSummary {
                    name: name.clone(),
                    kind: def.kind,
                    tags: self.tags_to_strings(series.key()),
                    values: series.value().value(),
                });
            }
        }

        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricValue;
    use std::sync::Arc;

    #[test]
    fn register_is_idempotent_by_name() {
        let reg = Registry::default();
        let a = reg.register("http_reqs", MetricKind::Counter);
        let b = reg.register("http_reqs", MetricKind::Trend);
        assert_eq!(a, b);
        assert_eq!(reg.metric_kind(a), Some(MetricKind::Counter));
        assert_eq!(reg.lookup_metric("http_reqs"), Some((a, MetricKind::Counter)));
        assert_eq!(reg.lookup_metric("nope"), None);
        assert_eq!(reg.metric_name(a).as_deref(), Some("http_reqs"));
    }

    #[test]
    fn resolve_tags_is_order_independent() {
        let reg = Registry::default();
        let a = reg.resolve_tags(&[("scenario", "login"), ("endpoint", "login")]);
        let b = reg.resolve_tags(&[("endpoint", "login"), ("scenario", "login")]);
        assert_eq!(a, b);

        let dup = reg.resolve_tags(&[("endpoint", "login"), ("endpoint", "chain")]);
        assert_eq!(dup.len(), 1);
        assert_eq!(dup.get(reg.resolve_key("endpoint")), Some(reg.resolve_key("login")));
    }

    #[test]
    fn concurrent_counter_updates_are_not_lost() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 10_000;

        let reg = Arc::new(Registry::default());
        let metric = reg.register("signup_count", MetricKind::Counter);

        let joins: Vec<_> = (0..THREADS)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        // Resolve the handle every time so series creation races too.
                        if let Some(h) = reg.handle(metric, &[("endpoint", "signup")]) {
                            h.increment(1);
                        }
                    }
                })
            })
            .collect();
        for j in joins {
            j.join().unwrap_or_else(|_| panic!("writer thread panicked"));
        }

        assert_eq!(reg.query(metric).sum_counter_total(), THREADS * PER_THREAD);
    }

    #[test]
    fn concurrent_rate_updates_keep_fraction() {
        let reg = Arc::new(Registry::default());
        let metric = reg.register("login_fail_rate", MetricKind::Rate);

        let joins: Vec<_> = (0..4)
            .map(|t| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        if let Some(h) = reg.handle(metric, &[("endpoint", "login")]) {
                            h.add_rate(t == 0 && i < 500);
                        }
                    }
                })
            })
            .collect();
        for j in joins {
            j.join().unwrap_or_else(|_| panic!("writer thread panicked"));
        }

        let summary = reg.summarize();
        assert_eq!(summary.len(), 1);
        let MetricValue::Rate { total, hits, rate } = summary[0].values else {
            panic!("expected rate");
        };
        assert_eq!(total, 4_000);
        assert_eq!(hits, 500);
        assert_eq!(rate, Some(0.125));
    }

    #[test]
    fn summarize_resolves_names_and_tags() {
        let reg = Registry::default();
        let m = reg.register("iterations", MetricKind::Counter);
        if let Some(h) = reg.handle(m, &[("scenario", "signup")]) {
            h.increment(7);
        }

        let summary = reg.summarize();
        assert_eq!(summary[0].name, "iterations");
        assert_eq!(
            summary[0].tags,
            vec![("scenario".to_string(), "signup".to_string())]
        );
        assert!(matches!(summary[0].values, MetricValue::Counter(7)));
    }
}
