use std::collections::HashMap;
use std::collections::VecDeque;

/// A single observability data point.
#[derive(Clone, Debug)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit: &'static str,
    pub tags: Vec<(String, String)>,
    pub timestamp_ms: i64,
}

/// Bounded-retention ring buffer of samples for one metric name. Dropping
/// the oldest sample on overflow never fails and never blocks — metric
/// ingestion must not throw.
#[derive(Default)]
pub(crate) struct MetricSeries {
    samples: VecDeque<Metric>,
}

impl MetricSeries {
    pub(crate) fn push(&mut self, sample: Metric, capacity: usize) {
        self.samples.push_back(sample);
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    /// Drop samples older than `cutoff_ms`.
    pub(crate) fn evict_before(&mut self, cutoff_ms: i64) {
        while matches!(self.samples.front(), Some(s) if s.timestamp_ms < cutoff_ms) {
            self.samples.pop_front();
        }
    }

    pub(crate) fn last(&self) -> Option<&Metric> {
        self.samples.back()
    }

    pub(crate) fn within_window(&self, since_ms: i64) -> Vec<&Metric> {
        self.samples.iter().filter(|s| s.timestamp_ms >= since_ms).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-name metric storage.
#[derive(Default)]
pub(crate) struct MetricStore {
    series: HashMap<String, MetricSeries>,
}

impl MetricStore {
    pub(crate) fn record(&mut self, sample: Metric, capacity: usize, retention_cutoff: i64) {
        let series = self.series.entry(sample.name.clone()).or_default();
        series.evict_before(retention_cutoff);
        series.push(sample, capacity);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&MetricSeries> {
        self.series.get(name)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &String> {
        self.series.keys()
    }
}

/// P50/P95/P99 over a slice of already-sorted-ascending values.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, value: f64, ts: i64) -> Metric {
        Metric { name: name.into(), value, unit: "ms", tags: vec![], timestamp_ms: ts }
    }

    #[test]
    fn oldest_sample_dropped_on_overflow() {
        let mut series = MetricSeries::default();
        for i in 0..5 {
            series.push(sample("x", i as f64, i), 3);
        }
        let remaining: Vec<f64> = series.within_window(i64::MIN).iter().map(|s| s.value).collect();
        assert_eq!(remaining, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn eviction_by_age_removes_old_samples() {
        let mut series = MetricSeries::default();
        series.push(sample("x", 1.0, 0), 100);
        series.push(sample("x", 2.0, 1000), 100);
        series.evict_before(500);
        let remaining: Vec<f64> = series.within_window(i64::MIN).iter().map(|s| s.value).collect();
        assert_eq!(remaining, vec![2.0]);
    }

    #[test]
    fn percentile_matches_known_values() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.5), 6.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 10.0);
    }
}
