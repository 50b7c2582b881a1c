// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Latency collection.
//!
//! Raw per-operation samples in milliseconds, kept unaggregated so percentile
//! computation can interpolate exactly and so per-worker trackers can be
//! merged after a phase without losing resolution.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Thread-safe accumulator of latency samples in milliseconds.
///
/// Workers hold one tracker each, so the lock is effectively uncontended on
/// the hot path; the orchestrator snapshots and merges trackers after a phase
/// ends.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    samples: Mutex<Vec<f64>>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, elapsed: Duration) {
        self.record_ms(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_ms(&self, ms: f64) {
        self.samples.lock().push(ms);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Copy of the samples recorded so far, in arrival order.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.lock().clone()
    }

    pub fn reset(&self) {
        self.samples.lock().clear();
    }

    pub fn stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_samples(&self.snapshot())
    }
}

/// Summary statistics over a set of latency samples, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean: f64,
    pub p50: f64,
    pub p80: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub min: f64,
    pub max: f64,
}

impl LatencyStats {
    /// Returns `None` for an empty sample set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len() as u64;
        let mean = sorted.iter().sum::<f64>() / count as f64;
        Some(Self {
            count,
            mean,
            p50: percentile(&sorted, 50.0),
            p80: percentile(&sorted, 80.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            p999: percentile(&sorted, 99.9),
            min: sorted[0],
            max: sorted[count as usize - 1],
        })
    }
}

/// Linear-interpolated percentile over an ascending-sorted slice.
///
/// The rank is `p/100 * (n-1)`; fractional ranks interpolate between the two
/// neighboring samples.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;
    if lo + 1 >= n {
        return sorted[n - 1];
    }
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let samples: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let stats = LatencyStats::from_samples(&samples).unwrap();
        assert!((stats.p50 - 50.5).abs() < 1e-9);
        assert!((stats.p99 - 99.01).abs() < 1e-9);
        assert!((stats.p999 - 99.901).abs() < 1e-9);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.count, 100);
    }

    #[test]
    fn test_single_sample() {
        let stats = LatencyStats::from_samples(&[7.5]).unwrap();
        assert_eq!(stats.p50, 7.5);
        assert_eq!(stats.p999, 7.5);
        assert_eq!(stats.mean, 7.5);
    }

    #[test]
    fn test_percentiles_are_monotonic() {
        let samples = [12.0, 3.0, 45.0, 7.0, 7.0, 88.0, 1.5, 20.0];
        let s = LatencyStats::from_samples(&samples).unwrap();
        assert!(s.min <= s.p50);
        assert!(s.p50 <= s.p80);
        assert!(s.p80 <= s.p90);
        assert!(s.p90 <= s.p95);
        assert!(s.p95 <= s.p99);
        assert!(s.p99 <= s.p999);
        assert!(s.p999 <= s.max);
        assert!(s.min <= s.mean && s.mean <= s.max);
    }

    #[test]
    fn test_empty_tracker_has_no_stats() {
        let tracker = LatencyTracker::new();
        assert!(tracker.stats().is_none());
        tracker.record_ms(5.0);
        assert!(tracker.stats().is_some());
        tracker.reset();
        assert!(tracker.stats().is_none());
    }

    #[test]
    fn test_record_converts_to_millis() {
        let tracker = LatencyTracker::new();
        tracker.record(Duration::from_micros(2500));
        let snap = tracker.snapshot();
        assert_eq!(snap.len(), 1);
        assert!((snap[0] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_merged_snapshots_match_combined_stats() {
        let a = LatencyTracker::new();
        let b = LatencyTracker::new();
        for v in [1.0, 2.0, 3.0] {
            a.record_ms(v);
        }
        for v in [4.0, 5.0] {
            b.record_ms(v);
        }
        let mut merged = a.snapshot();
        merged.extend(b.snapshot());
        let stats = LatencyStats::from_samples(&merged).unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean, 3.0);
    }
}
