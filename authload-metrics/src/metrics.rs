use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Trend samples are stored as integer microseconds and reported as milliseconds.
const MICROS_PER_MILLI: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic sum.
    Counter,
    /// Last-written (or peak) value.
    Gauge,
    /// Fraction of observations that were "hits" (true).
    Rate,
    /// Distribution of durations.
    Trend,
}

#[derive(Debug, Clone)]
pub struct MetricSeriesSummary {
    pub name: String,
    pub kind: MetricKind,
    pub tags: Vec<(String, String)>,
    pub values: MetricValue,
}

#[derive(Debug, Clone)]
pub enum MetricValue {
    Counter(u64),
    Gauge(i64),
    Rate {
        total: u64,
        hits: u64,
        rate: Option<f64>,
    },
    Trend(TrendSummary),
}

/// Trend statistics in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendSummary {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

pub(crate) fn new_trend_histogram() -> Histogram<u64> {
    // Upper bound: 1 hour in microseconds, 3 significant digits.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

fn micros_to_ms(v: u64) -> f64 {
    v as f64 / MICROS_PER_MILLI
}

fn ms_to_micros(ms: f64) -> u64 {
    if !ms.is_finite() || ms <= 0.0 {
        return 0;
    }
    (ms * MICROS_PER_MILLI).round() as u64
}

/// Merged view over one or more trend series.
#[derive(Debug, Clone)]
pub struct TrendSnapshot {
    hist: Histogram<u64>,
}

impl Default for TrendSnapshot {
    fn default() -> Self {
        Self {
            hist: new_trend_histogram(),
        }
    }
}

impl TrendSnapshot {
    pub(crate) fn merge(&mut self, other: &Histogram<u64>) {
        // Both sides share the same bounds, so `add` cannot go out of range.
        let _ = self.hist.add(other);
    }

    pub(crate) fn merge_snapshot(&mut self, other: &TrendSnapshot) {
        self.merge(&other.hist);
    }

    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hist.len() == 0
    }

    /// Nearest-rank percentile in milliseconds; `p` is in `0..=100`.
    pub fn percentile_ms(&self, p: f64) -> Option<f64> {
        if self.hist.len() == 0 {
            return None;
        }
        let q = (p / 100.0).clamp(0.0, 1.0);
        Some(micros_to_ms(self.hist.value_at_quantile(q)))
    }

    pub fn mean_ms(&self) -> Option<f64> {
        (self.hist.len() > 0).then(|| self.hist.mean() / MICROS_PER_MILLI)
    }

    pub fn min_ms(&self) -> Option<f64> {
        (self.hist.len() > 0).then(|| micros_to_ms(self.hist.min()))
    }

    pub fn max_ms(&self) -> Option<f64> {
        (self.hist.len() > 0).then(|| micros_to_ms(self.hist.max()))
    }

    pub fn summary(&self) -> TrendSummary {
        summarize_trend(&self.hist)
    }
}

pub(crate) fn summarize_trend(h: &Histogram<u64>) -> TrendSummary {
    let count = h.len();
    let q = |p: f64| (count > 0).then(|| micros_to_ms(h.value_at_quantile(p)));

    TrendSummary {
        count,
        min: (count > 0).then(|| micros_to_ms(h.min())),
        max: (count > 0).then(|| micros_to_ms(h.max())),
        mean: (count > 0).then(|| h.mean() / MICROS_PER_MILLI),
        stdev: (count > 0).then(|| h.stdev() / MICROS_PER_MILLI),
        p50: q(0.50),
        p90: q(0.90),
        p95: q(0.95),
        p99: q(0.99),
    }
}

#[derive(Debug)]
pub struct Rate {
    pub total: AtomicU64,
    pub hits: AtomicU64,
}

impl Rate {
    fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Returns `(total, hits)`.
    pub fn load(&self) -> (u64, u64) {
        // Writers bump hits before total; clamp so a racing read never shows hits > total.
        let hits = self.hits.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        (total.max(hits), hits)
    }
}

#[derive(Debug)]
pub enum MetricStorage {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<AtomicI64>),
    Rate(Arc<Rate>),
    Trend(Arc<Mutex<Histogram<u64>>>),
}

impl MetricStorage {
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricStorage::Counter(Arc::new(AtomicU64::new(0))),
            MetricKind::Gauge => MetricStorage::Gauge(Arc::new(AtomicI64::new(0))),
            MetricKind::Rate => MetricStorage::Rate(Arc::new(Rate::new())),
            MetricKind::Trend => MetricStorage::Trend(Arc::new(Mutex::new(new_trend_histogram()))),
        }
    }

    pub fn handle(&self) -> MetricHandle {
        match self {
            MetricStorage::Counter(a) => MetricHandle::Counter(a.clone()),
            MetricStorage::Gauge(a) => MetricHandle::Gauge(a.clone()),
            MetricStorage::Rate(a) => MetricHandle::Rate(a.clone()),
            MetricStorage::Trend(a) => MetricHandle::Trend(a.clone()),
        }
    }

    pub fn value(&self) -> MetricValue {
        match self {
            MetricStorage::Counter(a) => MetricValue::Counter(a.load(Ordering::Relaxed)),
            MetricStorage::Gauge(a) => MetricValue::Gauge(a.load(Ordering::Relaxed)),
            MetricStorage::Rate(r) => {
                let (total, hits) = r.load();
                let rate = (total > 0).then(|| hits as f64 / total as f64);
                MetricValue::Rate { total, hits, rate }
            }
            MetricStorage::Trend(h) => MetricValue::Trend(summarize_trend(&h.lock())),
        }
    }
}

/// Cheap, cloneable writer for one metric series.
///
/// Writing with the wrong kind of update (e.g. `observe` on a counter) is a no-op.
#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<AtomicU64>),
    Gauge(Arc<AtomicI64>),
    Rate(Arc<Rate>),
    Trend(Arc<Mutex<Histogram<u64>>>),
}

impl MetricHandle {
    #[inline]
    pub fn increment(&self, value: u64) {
        if let MetricHandle::Counter(c) = self {
            c.fetch_add(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn set_gauge(&self, value: i64) {
        if let MetricHandle::Gauge(g) = self {
            g.store(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn increment_gauge(&self, value: i64) {
        if let MetricHandle::Gauge(g) = self {
            g.fetch_add(value, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn decrement_gauge(&self, value: i64) {
        if let MetricHandle::Gauge(g) = self {
            g.fetch_sub(value, Ordering::Relaxed);
        }
    }

    /// Raises the gauge to `value` if it is currently lower.
    #[inline]
    pub fn max_gauge(&self, value: i64) {
        if let MetricHandle::Gauge(g) = self {
            g.fetch_max(value, Ordering::Relaxed);
        }
    }

    /// Records one rate observation.
    #[inline]
    pub fn add_rate(&self, hit: bool) {
        if let MetricHandle::Rate(r) = self {
            if hit {
                r.hits.fetch_add(1, Ordering::AcqRel);
            }
            r.total.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Records one trend observation in milliseconds.
    #[inline]
    pub fn observe_ms(&self, ms: f64) {
        if let MetricHandle::Trend(h) = self {
            h.lock().saturating_record(ms_to_micros(ms));
        }
    }

    #[inline]
    pub fn observe_duration(&self, d: Duration) {
        if let MetricHandle::Trend(h) = self {
            let micros = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
            h.lock().saturating_record(micros);
        }
    }

    pub fn get_counter(&self) -> u64 {
        if let MetricHandle::Counter(c) = self {
            c.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    pub fn get_gauge(&self) -> i64 {
        if let MetricHandle::Gauge(g) = self {
            g.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Returns `(total, hits)`.
    pub fn get_rate(&self) -> (u64, u64) {
        if let MetricHandle::Rate(r) = self {
            r.load()
        } else {
            (0, 0)
        }
    }

    pub fn trend_count(&self) -> u64 {
        if let MetricHandle::Trend(h) = self {
            h.lock().len()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_trend_empty_has_no_stats() {
        let h = new_trend_histogram();
        let s = summarize_trend(&h);
        assert_eq!(s.count, 0);
        assert!(s.p50.is_none());
        assert!(s.min.is_none());
        assert!(s.max.is_none());
        assert!(s.mean.is_none());
    }

    #[test]
    fn trend_reports_milliseconds() {
        let h = MetricHandle::Trend(Arc::new(Mutex::new(new_trend_histogram())));
        h.observe_ms(10.0);
        h.observe_ms(20.0);
        h.observe_duration(Duration::from_millis(30));
        assert_eq!(h.trend_count(), 3);

        let MetricHandle::Trend(inner) = h else {
            panic!("expected trend handle");
        };
        let s = summarize_trend(&inner.lock());
        assert_eq!(s.count, 3);
        let min = s.min.unwrap_or_default();
        let max = s.max.unwrap_or_default();
        assert!((min - 10.0).abs() < 0.05, "min={min}");
        assert!((max - 30.0).abs() < 0.05, "max={max}");
    }

    #[test]
    fn negative_and_nan_observations_clamp_to_zero() {
        assert_eq!(ms_to_micros(-5.0), 0);
        assert_eq!(ms_to_micros(f64::NAN), 0);
        assert_eq!(ms_to_micros(1.5), 1_500);
    }

    #[test]
    fn nearest_rank_p95_picks_the_tail_sample() {
        let mut snap = TrendSnapshot::default();
        let mut h = new_trend_histogram();
        for ms in [100.0, 100.0, 100.0, 100.0, 900.0] {
            h.saturating_record(ms_to_micros(ms));
        }
        snap.merge(&h);

        let p95 = snap.percentile_ms(95.0).unwrap_or_default();
        assert!(p95 >= 820.0 && p95 < 1_000.0, "p95={p95}");
        let p50 = snap.percentile_ms(50.0).unwrap_or_default();
        assert!((p50 - 100.0).abs() < 1.0, "p50={p50}");
    }

    #[test]
    fn handles_update_by_kind() {
        let c = MetricStorage::new(MetricKind::Counter).handle();
        c.increment(2);
        c.increment(3);
        c.observe_ms(1.0);
        assert_eq!(c.get_counter(), 5);

        let g = MetricStorage::new(MetricKind::Gauge).handle();
        g.set_gauge(10);
        g.increment_gauge(5);
        g.decrement_gauge(3);
        g.max_gauge(4);
        assert_eq!(g.get_gauge(), 12);
        g.max_gauge(40);
        assert_eq!(g.get_gauge(), 40);

        let r = MetricStorage::new(MetricKind::Rate).handle();
        r.add_rate(true);
        r.add_rate(false);
        r.add_rate(false);
        assert_eq!(r.get_rate(), (3, 1));
    }

    #[test]
    fn metric_kind_parses_lowercase() {
        assert_eq!("trend".parse::<MetricKind>().ok(), Some(MetricKind::Trend));
        assert_eq!(MetricKind::Rate.to_string(), "rate");
    }
}
