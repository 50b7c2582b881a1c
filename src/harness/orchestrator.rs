// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Phase orchestration.
//!
//! A run is strictly sequential: recall evaluation, then a search-only phase,
//! then a concurrent search+insert phase. Each phase connects every client up
//! front (a connection failure aborts the run before any thread exists),
//! spawns one thread per worker, polls progress until the deadline, then
//! requests a cooperative stop and joins with a bounded timeout. A worker
//! that outlives the join timeout is abandoned and reported; its counters
//! remain readable through the shared state, so results stay complete.

use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::client::{BenchClient, Connector};
use crate::config::BenchConfig;
use crate::dataset::{QuerySet, VectorDataset, VectorReader};
use crate::error::{BenchError, BenchResult};
use crate::harness::insert::InsertWorker;
use crate::harness::recall::{RecallEvaluator, RecallMetrics};
use crate::harness::reporter::{BenchmarkReport, InsertSummary, PhaseResults, PhaseSummary};
use crate::harness::search::SearchWorker;
use crate::harness::tracker::{LatencyStats, LatencyTracker};
use crate::harness::worker::WorkerState;

const JOIN_POLL: Duration = Duration::from_millis(20);

/// Split `start..end` into `workers` contiguous ranges. The division
/// remainder goes to the last range. Returns an empty vec when there is
/// nothing to split.
pub fn partition_ranges(start: usize, end: usize, workers: usize) -> Vec<Range<usize>> {
    if workers == 0 || end <= start {
        return Vec::new();
    }
    let per = (end - start) / workers;
    let mut out = Vec::with_capacity(workers);
    let mut cursor = start;
    for i in 0..workers {
        let len = if i == workers - 1 { end - cursor } else { per };
        out.push(cursor..cursor + len);
        cursor += len;
    }
    out
}

/// Wait for a worker thread, giving up after `timeout`. Returns false when
/// the thread is still running (it is abandoned, not killed) or when it
/// panicked.
pub fn join_with_timeout(handle: thread::JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(JOIN_POLL);
    }
    handle.join().is_ok()
}

struct PhasePlan {
    name: &'static str,
    duration: Duration,
    search_workers: usize,
    insert_workers: usize,
    /// First global dataset index the insert side writes.
    insert_start: usize,
}

pub struct BenchmarkOrchestrator {
    config: BenchConfig,
    connector: Arc<dyn Connector>,
    queries: Arc<QuerySet>,
    dataset: Option<VectorDataset>,
}

impl BenchmarkOrchestrator {
    pub fn new(
        config: BenchConfig,
        connector: Arc<dyn Connector>,
        queries: QuerySet,
        dataset: Option<VectorDataset>,
    ) -> Self {
        Self {
            config,
            connector,
            queries: Arc::new(queries),
            dataset,
        }
    }

    /// Run the full benchmark: recall pass, search-only phase, concurrent
    /// phase. Setup failures abort; per-operation failures during a phase are
    /// counted and the run continues.
    pub fn run(&mut self) -> BenchResult<BenchmarkReport> {
        self.config.validate()?;
        if self.queries.is_empty() {
            return Err(BenchError::Config("query set is empty".to_string()));
        }
        if self.queries.dim != self.config.dim {
            return Err(BenchError::DimensionMismatch {
                expected: self.config.dim,
                got: self.queries.dim,
            });
        }
        if let Some(ds) = &self.dataset {
            if ds.dimension() != self.config.dim {
                return Err(BenchError::DimensionMismatch {
                    expected: self.config.dim,
                    got: ds.dimension(),
                });
            }
        }
        if let Some(ds) = self.dataset.as_mut() {
            ds.prepare(self.config.in_memory)?;
        }

        let recall = self.recall_pass()?;
        if let Some(r) = &recall {
            info!(
                "recall@{}: mean {:.4} over {} queries",
                r.k, r.mean, r.queries_evaluated
            );
        }

        let search_only = self.run_phase(&PhasePlan {
            name: "search-only",
            duration: Duration::from_secs(self.config.search_duration_s),
            search_workers: self.config.search_workers,
            insert_workers: 0,
            insert_start: 0,
        })?;

        let insert_workers = if self.dataset.is_some() {
            self.config.insert_workers
        } else {
            0
        };
        let concurrent = self.run_phase(&PhasePlan {
            name: "concurrent",
            duration: Duration::from_secs(self.config.concurrent_duration_s),
            search_workers: self.config.search_workers,
            insert_workers,
            insert_start: self.config.initial_count,
        })?;

        Ok(BenchmarkReport::new(
            &self.config,
            recall,
            PhaseResults {
                search_only,
                concurrent,
            },
        ))
    }

    /// Sequential recall sweep over every query with ground truth. Runs
    /// before the timed phases so the collection still matches the state the
    /// truth was computed against.
    fn recall_pass(&self) -> BenchResult<Option<RecallMetrics>> {
        if self.config.skip_recall {
            info!("recall evaluation skipped by config");
            return Ok(None);
        }
        if !self.queries.has_truth() {
            info!("no ground truth loaded, skipping recall evaluation");
            return Ok(None);
        }

        let pairs = self.queries.queries.iter().zip(self.queries.truth_ids.iter());
        info!(
            "evaluating recall@{} over {} queries",
            self.config.top_k,
            self.queries.len().min(self.queries.truth_ids.len())
        );
        let mut client = self.connector.connect()?;
        let mut evaluator = RecallEvaluator::new(self.config.top_k);
        for (query, truth) in pairs {
            let hits = client.search(
                &self.config.collection,
                query,
                self.config.top_k,
                self.config.search_list,
            )?;
            let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
            evaluator.observe(&ids, truth);
        }
        Ok(evaluator.finish())
    }

    fn run_phase(&self, plan: &PhasePlan) -> BenchResult<PhaseSummary> {
        info!(
            "phase {}: {} search + {} insert workers for {:?}",
            plan.name, plan.search_workers, plan.insert_workers, plan.duration
        );

        let search_states: Vec<Arc<WorkerState>> = (0..plan.search_workers)
            .map(|_| Arc::new(WorkerState::new()))
            .collect();
        let trackers: Vec<Arc<LatencyTracker>> = (0..plan.search_workers)
            .map(|_| Arc::new(LatencyTracker::new()))
            .collect();

        // Connect everything before spawning anything, so a dead server
        // aborts the phase instead of leaking half a worker pool.
        let mut search_clients = Vec::with_capacity(plan.search_workers);
        for _ in 0..plan.search_workers {
            search_clients.push(self.connector.connect()?);
        }
        type InsertPart = (Range<usize>, Box<dyn BenchClient>, Box<dyn VectorReader>);
        let mut insert_parts: Vec<InsertPart> = Vec::new();
        if plan.insert_workers > 0 {
            let ds = self.dataset()?;
            let total = ds.total_vectors();
            if plan.insert_start >= total {
                warn!(
                    "phase {}: insert start {} is at or past the dataset end ({}), nothing to insert",
                    plan.name, plan.insert_start, total
                );
            }
            for range in partition_ranges(plan.insert_start, total, plan.insert_workers) {
                insert_parts.push((range, self.connector.connect()?, ds.reader()?));
            }
        }
        let insert_states: Vec<Arc<WorkerState>> = (0..insert_parts.len())
            .map(|_| Arc::new(WorkerState::new()))
            .collect();
        let per_worker_rate = if self.config.target_insert_rate > 0.0 && !insert_parts.is_empty() {
            self.config.target_insert_rate / insert_parts.len() as f64
        } else {
            0.0
        };

        let start = Instant::now();
        let deadline = start + plan.duration;
        let mut handles = Vec::with_capacity(search_clients.len() + insert_parts.len());
        for (i, client) in search_clients.into_iter().enumerate() {
            let worker = SearchWorker {
                id: i,
                client,
                queries: Arc::clone(&self.queries),
                collection: self.config.collection.clone(),
                top_k: self.config.top_k,
                search_list: self.config.search_list,
                deadline,
                state: Arc::clone(&search_states[i]),
                tracker: Arc::clone(&trackers[i]),
            };
            handles.push(
                thread::Builder::new()
                    .name(format!("search-{i}"))
                    .spawn(move || worker.run())?,
            );
        }
        for (i, (range, client, reader)) in insert_parts.into_iter().enumerate() {
            let worker = InsertWorker {
                id: i,
                client,
                reader,
                collection: self.config.collection.clone(),
                range,
                batch_size: self.config.batch_size,
                target_rate: per_worker_rate,
                flush_every: None,
                deadline: Some(deadline),
                state: Arc::clone(&insert_states[i]),
            };
            handles.push(
                thread::Builder::new()
                    .name(format!("insert-{i}"))
                    .spawn(move || worker.run())?,
            );
        }

        let poll = self.config.poll_interval();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(poll));
            let searched: u64 = search_states.iter().map(|s| s.ops()).sum();
            let inserted: u64 = insert_states.iter().map(|s| s.ops()).sum();
            let errors: u64 = search_states
                .iter()
                .chain(insert_states.iter())
                .map(|s| s.errors())
                .sum();
            println!(
                "  [{}] t={:.0}s searches={} inserts={} errors={}",
                plan.name,
                start.elapsed().as_secs_f64(),
                searched,
                inserted,
                errors
            );
            if search_states
                .iter()
                .chain(insert_states.iter())
                .all(|s| s.is_stopped())
            {
                break;
            }
        }

        for state in search_states.iter().chain(insert_states.iter()) {
            state.request_stop();
        }
        let join_timeout = self.config.join_timeout();
        let mut incomplete = 0u32;
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if !join_with_timeout(handle, join_timeout) {
                warn!("worker {} did not stop within {:?}", name, join_timeout);
                incomplete += 1;
            }
        }
        // Throughput is measured against the full wall clock including
        // shutdown, so a sluggish teardown cannot inflate qps.
        let elapsed = start.elapsed();
        let secs = elapsed.as_secs_f64();

        let queries: u64 = search_states.iter().map(|s| s.ops()).sum();
        let search_errors: u64 = search_states.iter().map(|s| s.errors()).sum();
        let mut samples = Vec::new();
        for tracker in &trackers {
            samples.extend(tracker.snapshot());
        }
        let latency_ms = LatencyStats::from_samples(&samples);
        let actual_qps = if secs > 0.0 { queries as f64 / secs } else { 0.0 };

        let insert = (plan.insert_workers > 0).then(|| {
            let vectors_inserted: u64 = insert_states.iter().map(|s| s.ops()).sum();
            let insert_errors: u64 = insert_states.iter().map(|s| s.errors()).sum();
            InsertSummary {
                vectors_inserted,
                insert_errors,
                actual_insert_rate: if secs > 0.0 {
                    vectors_inserted as f64 / secs
                } else {
                    0.0
                },
            }
        });

        info!(
            "phase {} done: {} queries at {:.1} qps, {} search errors, {} incomplete workers",
            plan.name, queries, actual_qps, search_errors, incomplete
        );
        Ok(PhaseSummary {
            duration_s: secs,
            queries,
            search_errors,
            actual_qps,
            latency_ms,
            insert,
            incomplete_workers: incomplete,
        })
    }

    /// Insert the configured id range with no deadline, flushing on the
    /// configured cadence, and flush once more at the end. Used by the load
    /// subcommand to populate a collection before benchmarking.
    pub fn bulk_load(&mut self) -> BenchResult<InsertSummary> {
        self.config.validate()?;
        if let Some(ds) = self.dataset.as_mut() {
            ds.prepare(self.config.in_memory)?;
        }
        let ds = self.dataset()?;
        if ds.dimension() != self.config.dim {
            return Err(BenchError::DimensionMismatch {
                expected: self.config.dim,
                got: ds.dimension(),
            });
        }
        let total = ds.total_vectors();
        let start_at = self.config.initial_count.min(total);
        let workers = self.config.insert_workers.max(1);
        let goal = (total - start_at) as u64;
        info!(
            "bulk loading {} vectors with {} workers (batch {})",
            goal, workers, self.config.batch_size
        );

        let mut parts = Vec::with_capacity(workers);
        for range in partition_ranges(start_at, total, workers) {
            parts.push((range, self.connector.connect()?, ds.reader()?));
        }
        let states: Vec<Arc<WorkerState>> = (0..parts.len())
            .map(|_| Arc::new(WorkerState::new()))
            .collect();
        let per_worker_rate = if self.config.target_insert_rate > 0.0 && !parts.is_empty() {
            self.config.target_insert_rate / parts.len() as f64
        } else {
            0.0
        };
        let flush_every = (self.config.flush_every > 0).then_some(self.config.flush_every);

        let start = Instant::now();
        let mut handles = Vec::with_capacity(parts.len());
        for (i, (range, client, reader)) in parts.into_iter().enumerate() {
            let worker = InsertWorker {
                id: i,
                client,
                reader,
                collection: self.config.collection.clone(),
                range,
                batch_size: self.config.batch_size,
                target_rate: per_worker_rate,
                flush_every,
                deadline: None,
                state: Arc::clone(&states[i]),
            };
            handles.push(
                thread::Builder::new()
                    .name(format!("insert-{i}"))
                    .spawn(move || worker.run())?,
            );
        }

        let poll = self.config.poll_interval();
        let mut last_report = Instant::now();
        while !states.iter().all(|s| s.is_stopped()) {
            thread::sleep(Duration::from_millis(200));
            if last_report.elapsed() >= poll {
                let inserted: u64 = states.iter().map(|s| s.ops()).sum();
                let errors: u64 = states.iter().map(|s| s.errors()).sum();
                let pct = if goal > 0 {
                    100.0 * inserted as f64 / goal as f64
                } else {
                    100.0
                };
                println!("  loaded {inserted} / {goal} vectors ({pct:.1}%), {errors} errors");
                last_report = Instant::now();
            }
        }
        let mut incomplete = 0u32;
        for handle in handles {
            if !join_with_timeout(handle, self.config.join_timeout()) {
                incomplete += 1;
            }
        }
        if incomplete > 0 {
            warn!("{incomplete} load worker(s) did not join cleanly");
        }
        let elapsed = start.elapsed().as_secs_f64();

        match self.connector.connect() {
            Ok(mut admin) => {
                if let Err(e) = admin.flush(&self.config.collection) {
                    warn!("final flush failed: {e}");
                }
                match admin.row_count(&self.config.collection) {
                    Ok(rows) => info!("collection {} reports {} rows", self.config.collection, rows),
                    Err(e) => warn!("row count unavailable: {e}"),
                }
            }
            Err(e) => warn!("no admin connection for the final flush: {e}"),
        }

        let vectors_inserted: u64 = states.iter().map(|s| s.ops()).sum();
        let insert_errors: u64 = states.iter().map(|s| s.errors()).sum();
        let rate = if elapsed > 0.0 {
            vectors_inserted as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "bulk load done: {} vectors in {:.1}s ({:.1}/s, {} errors)",
            vectors_inserted, elapsed, rate, insert_errors
        );
        Ok(InsertSummary {
            vectors_inserted,
            insert_errors,
            actual_insert_rate: rate,
        })
    }

    fn dataset(&self) -> BenchResult<&VectorDataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| BenchError::Config("no vector dataset configured".to_string()))
    }
}
