// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Benchmark harness: workers, orchestration, metrics, and reporting.

pub mod insert;
pub mod orchestrator;
pub mod recall;
pub mod reporter;
pub mod search;
pub mod tracker;
pub mod worker;

pub use insert::InsertWorker;
pub use orchestrator::{BenchmarkOrchestrator, join_with_timeout, partition_ranges};
pub use recall::{RecallEvaluator, RecallMetrics, recall_at_k};
pub use reporter::{BenchmarkReport, InsertSummary, PhaseResults, PhaseSummary, SystemInfo};
pub use search::SearchWorker;
pub use tracker::{LatencyStats, LatencyTracker};
pub use worker::{WorkerStage, WorkerState};
