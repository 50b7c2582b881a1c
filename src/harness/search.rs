// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Search workload.
//!
//! Each search worker owns a connection and loops over the shared query set
//! until its deadline passes or a stop is requested. Only the network call is
//! timed; query selection and bookkeeping stay outside the measured window.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::client::BenchClient;
use crate::dataset::QuerySet;
use crate::harness::tracker::LatencyTracker;
use crate::harness::worker::{ERROR_LOG_LIMIT, WorkerState};

pub struct SearchWorker {
    pub id: usize,
    pub client: Box<dyn BenchClient>,
    pub queries: Arc<QuerySet>,
    pub collection: String,
    pub top_k: usize,
    pub search_list: u32,
    pub deadline: Instant,
    pub state: Arc<WorkerState>,
    pub tracker: Arc<LatencyTracker>,
}

impl SearchWorker {
    /// Issue searches until the deadline or a stop request. Failed searches
    /// are counted but contribute no latency sample.
    pub fn run(mut self) {
        self.state.mark_running();
        if self.queries.is_empty() {
            warn!("search worker {}: query set is empty", self.id);
            self.state.mark_stopped();
            return;
        }

        let n = self.queries.len();
        // Stagger starting positions so workers do not hit the same query in
        // lockstep.
        let mut cursor = self.id % n;
        while !self.state.should_stop() && Instant::now() < self.deadline {
            let query = &self.queries.queries[cursor];
            cursor = (cursor + 1) % n;

            let start = Instant::now();
            match self
                .client
                .search(&self.collection, query, self.top_k, self.search_list)
            {
                Ok(_) => {
                    self.tracker.record(start.elapsed());
                    self.state.add_op();
                }
                Err(e) => {
                    let errors = self.state.add_error();
                    if errors <= ERROR_LOG_LIMIT {
                        warn!("search worker {}: search failed: {}", self.id, e);
                    } else {
                        debug!("search worker {}: search failed: {}", self.id, e);
                    }
                }
            }
        }
        self.state.mark_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Connector;
    use crate::client::mock::MockConnector;
    use std::thread;
    use std::time::Duration;

    fn query_set(n: usize, dim: usize) -> Arc<QuerySet> {
        Arc::new(QuerySet {
            queries: vec![vec![0.5; dim]; n],
            truth_ids: Vec::new(),
            truth_distances: Vec::new(),
            dim,
            truth_k: 0,
        })
    }

    fn worker(connector: &MockConnector, queries: Arc<QuerySet>, deadline: Instant) -> SearchWorker {
        SearchWorker {
            id: 0,
            client: connector.connect().unwrap(),
            queries,
            collection: "spacev1b".to_string(),
            top_k: 10,
            search_list: 100,
            deadline,
            state: Arc::new(WorkerState::new()),
            tracker: Arc::new(LatencyTracker::new()),
        }
    }

    #[test]
    fn test_runs_until_deadline() {
        let connector = MockConnector::new();
        let w = worker(&connector, query_set(8, 4), Instant::now() + Duration::from_millis(50));
        let state = w.state.clone();
        let tracker = w.tracker.clone();
        w.run();

        assert!(state.is_stopped());
        assert!(state.ops() > 0);
        assert_eq!(state.errors(), 0);
        assert_eq!(tracker.len() as u64, state.ops());
    }

    #[test]
    fn test_errors_counted_without_latency_sample() {
        let connector = MockConnector::new().with_fail_every(3);
        let w = worker(&connector, query_set(8, 4), Instant::now() + Duration::from_millis(50));
        let state = w.state.clone();
        let tracker = w.tracker.clone();
        w.run();

        assert!(state.errors() > 0);
        assert_eq!(state.ops() + state.errors(), connector.stats().searches());
        assert_eq!(tracker.len() as u64, state.ops());
    }

    #[test]
    fn test_stop_request_breaks_loop_before_deadline() {
        let connector = MockConnector::new().with_latency(Duration::from_millis(1));
        let w = worker(&connector, query_set(8, 4), Instant::now() + Duration::from_secs(60));
        let state = w.state.clone();

        let handle = thread::spawn(move || w.run());
        thread::sleep(Duration::from_millis(40));
        state.request_stop();
        let begun = Instant::now();
        handle.join().unwrap();

        assert!(begun.elapsed() < Duration::from_secs(2));
        assert!(state.is_stopped());
        assert!(state.ops() > 0);
    }

    #[test]
    fn test_empty_query_set_stops_immediately() {
        let connector = MockConnector::new();
        let w = worker(&connector, query_set(0, 4), Instant::now() + Duration::from_secs(60));
        let state = w.state.clone();
        w.run();

        assert!(state.is_stopped());
        assert_eq!(state.ops(), 0);
        assert_eq!(connector.stats().searches(), 0);
    }
}
