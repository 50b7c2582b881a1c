// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Recall against precomputed ground truth.
//!
//! The recall pass runs single-threaded before any timed phase so the
//! collection still matches the state the ground truth was computed against.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Fraction of the true top-k neighbors present in the result list.
///
/// The denominator is `min(k, truth.len())`, so a truth list shorter than `k`
/// does not depress the score. An empty truth list scores 1.0: there was
/// nothing to miss.
pub fn recall_at_k(result_ids: &[i64], truth_ids: &[i64], k: usize) -> f64 {
    let denom = k.min(truth_ids.len());
    if denom == 0 {
        return 1.0;
    }
    let truth: HashSet<i64> = truth_ids.iter().take(denom).copied().collect();
    let hits = result_ids
        .iter()
        .take(k)
        .filter(|id| truth.contains(id))
        .count();
    hits as f64 / denom as f64
}

/// Accumulates per-query recall scores for one evaluation pass.
pub struct RecallEvaluator {
    k: usize,
    recalls: Vec<f64>,
}

impl RecallEvaluator {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            recalls: Vec::new(),
        }
    }

    pub fn observe(&mut self, result_ids: &[i64], truth_ids: &[i64]) {
        self.recalls.push(recall_at_k(result_ids, truth_ids, self.k));
    }

    pub fn queries_evaluated(&self) -> usize {
        self.recalls.len()
    }

    /// Returns `None` when no query was observed.
    pub fn finish(self) -> Option<RecallMetrics> {
        if self.recalls.is_empty() {
            return None;
        }
        let n = self.recalls.len();
        let mean = self.recalls.iter().sum::<f64>() / n as f64;
        let min = self.recalls.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self
            .recalls
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Some(RecallMetrics {
            k: self.k,
            queries_evaluated: n,
            mean,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallMetrics {
    pub k: usize,
    pub queries_evaluated: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}
