// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Concurrent benchmarking harness for a Milvus cluster loaded with the
//! SPACEV1B dataset.
//!
//! The harness runs two timed phases against a remote collection: a
//! search-only phase, then a concurrent phase where insert workers stream new
//! vectors while search workers keep querying. Before the timed phases it
//! optionally sweeps the query set once against ground truth to report
//! recall@k. Results (throughput, interpolated latency percentiles, recall)
//! are printed and written as JSON.
//!
//! The database is reached through the [`client::BenchClient`] trait; tests
//! swap in [`client::mock::MockConnector`] so the scheduling, pacing, and
//! aggregation logic runs without a server.

pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod setup;

pub use config::BenchConfig;
pub use error::{BenchError, BenchResult};
pub use harness::{
    BenchmarkOrchestrator, BenchmarkReport, InsertWorker, LatencyStats, LatencyTracker,
    RecallMetrics, SearchWorker, WorkerStage, WorkerState,
};
