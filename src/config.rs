// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Benchmark configuration.
//!
//! All tunables live in one explicit struct that is passed into the
//! orchestrator and workers at construction time and echoed verbatim into the
//! persisted report. There is no process-wide mutable state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BenchError, BenchResult};

/// Full harness configuration.
///
/// Defaults match the SPACEV1B deployment this harness was built for:
/// 100-dim int8 embeddings, L2 metric, IVF_FLAT with nlist 4096, batches of
/// 10,000 vectors against `node1:19530`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
    /// Embedding dimension.
    pub dim: usize,
    pub top_k: usize,
    /// Server-side search quality parameter, forwarded with every query.
    pub search_list: u32,
    /// IVF_FLAT cluster count, used when creating the index.
    pub nlist: u32,
    pub metric: String,
    /// Vectors per insert call.
    pub batch_size: usize,
    pub search_workers: usize,
    pub insert_workers: usize,
    pub search_duration_s: u64,
    pub concurrent_duration_s: u64,
    /// Target insert rate in vectors/sec summed over all insert workers,
    /// each worker pacing an even share; 0 = unthrottled.
    pub target_insert_rate: f64,
    /// Vectors already present in the collection; insert ids start here.
    pub initial_count: usize,
    /// Flush the collection every N successful batches during bulk load;
    /// 0 disables periodic flushing.
    pub flush_every: u32,
    pub poll_interval_s: u64,
    pub join_timeout_s: u64,
    pub request_timeout_s: u64,
    pub skip_recall: bool,
    /// Decode the full vector set into memory instead of streaming from disk.
    pub in_memory: bool,
    pub vectors_path: Option<PathBuf>,
    pub queries_path: PathBuf,
    pub truth_path: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            host: "node1".to_string(),
            port: 19530,
            collection: "spacev1b".to_string(),
            dim: 100,
            top_k: 100,
            search_list: 100,
            nlist: 4096,
            metric: "L2".to_string(),
            batch_size: 10_000,
            search_workers: 2,
            insert_workers: 1,
            search_duration_s: 60,
            concurrent_duration_s: 60,
            target_insert_rate: 0.0,
            initial_count: 0,
            flush_every: 0,
            poll_interval_s: 10,
            join_timeout_s: 5,
            request_timeout_s: 30,
            skip_recall: false,
            in_memory: false,
            vectors_path: None,
            queries_path: PathBuf::from("data/spacev1b_queries.bin"),
            truth_path: None,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BenchConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_s)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_s)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_s)
    }

    /// Reject configurations the orchestrator cannot run with.
    pub fn validate(&self) -> BenchResult<()> {
        if self.dim == 0 {
            return Err(BenchError::Config("dim must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(BenchError::Config("batch_size must be positive".to_string()));
        }
        if self.search_workers == 0 {
            return Err(BenchError::Config(
                "at least one search worker is required".to_string(),
            ));
        }
        if self.insert_workers > 0 && self.vectors_path.is_none() {
            return Err(BenchError::Config(
                "insert workers configured but no vector dataset path given".to_string(),
            ));
        }
        if self.target_insert_rate < 0.0 {
            return Err(BenchError::Config(
                "target_insert_rate must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let mut cfg = BenchConfig::default();
        cfg.vectors_path = Some(PathBuf::from("data/spacev1b_vectors_1.bin"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_insert_workers_require_dataset() {
        let cfg = BenchConfig {
            insert_workers: 2,
            vectors_path: None,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_search_workers_rejected() {
        let cfg = BenchConfig {
            search_workers: 0,
            insert_workers: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
