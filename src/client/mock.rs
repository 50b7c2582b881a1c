// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! In-process fake database for harness tests.
//!
//! Answers every call locally with optional injected latency and periodic
//! injected failures, and records what the workers sent so tests can assert
//! on it. Admin operations always succeed; only the search and insert data
//! paths fail when failure injection is on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::{BenchClient, CollectionSpec, Connector, IndexSpec, LoadState, SearchHit};
use crate::error::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy)]
struct MockBehavior {
    latency: Duration,
    /// Every n-th data call per connection fails. Zero disables injection.
    fail_every: usize,
}

/// Counters shared across all connections handed out by one connector.
#[derive(Debug, Default)]
pub struct MockStats {
    searches: AtomicU64,
    insert_rows: AtomicU64,
    failures: AtomicU64,
    inserted_ids: Mutex<Vec<i64>>,
}

impl MockStats {
    /// Search attempts, successful or not.
    pub fn searches(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// Rows acknowledged by successful inserts.
    pub fn insert_rows(&self) -> u64 {
        self.insert_rows.load(Ordering::Relaxed)
    }

    /// Injected failures across all connections.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inserted_ids(&self) -> Vec<i64> {
        self.inserted_ids.lock().clone()
    }
}

#[derive(Clone)]
pub struct MockConnector {
    behavior: MockBehavior,
    stats: Arc<MockStats>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            behavior: MockBehavior {
                latency: Duration::ZERO,
                fail_every: 0,
            },
            stats: Arc::new(MockStats::default()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.behavior.latency = latency;
        self
    }

    pub fn with_fail_every(mut self, n: usize) -> Self {
        self.behavior.fail_every = n;
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    fn connect(&self) -> BenchResult<Box<dyn BenchClient>> {
        Ok(Box::new(MockClient {
            behavior: self.behavior,
            stats: self.stats.clone(),
            calls: 0,
        }))
    }
}

struct MockClient {
    behavior: MockBehavior,
    stats: Arc<MockStats>,
    calls: u64,
}

impl MockClient {
    fn data_call(&mut self) -> BenchResult<()> {
        self.calls += 1;
        if self.behavior.fail_every > 0 && self.calls % self.behavior.fail_every as u64 == 0 {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            return Err(BenchError::Server {
                code: 503,
                message: "injected failure".to_string(),
            });
        }
        if !self.behavior.latency.is_zero() {
            thread::sleep(self.behavior.latency);
        }
        Ok(())
    }
}

impl BenchClient for MockClient {
    fn create_collection(&mut self, _spec: &CollectionSpec, _drop_old: bool) -> BenchResult<()> {
        Ok(())
    }

    fn drop_collection(&mut self, _name: &str) -> BenchResult<()> {
        Ok(())
    }

    fn has_collection(&mut self, _name: &str) -> BenchResult<bool> {
        Ok(true)
    }

    fn create_index(&mut self, _collection: &str, _spec: &IndexSpec) -> BenchResult<()> {
        Ok(())
    }

    fn load_collection(&mut self, _name: &str) -> BenchResult<()> {
        Ok(())
    }

    fn load_state(&mut self, _name: &str) -> BenchResult<LoadState> {
        Ok(LoadState::Loaded)
    }

    fn flush(&mut self, _name: &str) -> BenchResult<()> {
        Ok(())
    }

    fn row_count(&mut self, _name: &str) -> BenchResult<u64> {
        Ok(self.stats.insert_rows())
    }

    fn insert(
        &mut self,
        _collection: &str,
        ids: &[i64],
        _vectors: &[Vec<f32>],
    ) -> BenchResult<usize> {
        self.data_call()?;
        self.stats
            .insert_rows
            .fetch_add(ids.len() as u64, Ordering::Relaxed);
        self.stats.inserted_ids.lock().extend_from_slice(ids);
        Ok(ids.len())
    }

    fn search(
        &mut self,
        _collection: &str,
        _query: &[f32],
        top_k: usize,
        _search_list: u32,
    ) -> BenchResult<Vec<SearchHit>> {
        self.stats.searches.fetch_add(1, Ordering::Relaxed);
        self.data_call()?;
        Ok((0..top_k as i64)
            .map(|i| SearchHit {
                id: i,
                distance: i as f32,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_every_injects_periodically() {
        let connector = MockConnector::new().with_fail_every(3);
        let mut client = connector.connect().unwrap();
        let mut errors = 0;
        for _ in 0..6 {
            if client.search("c", &[1.0], 10, 100).is_err() {
                errors += 1;
            }
        }
        assert_eq!(errors, 2);
        assert_eq!(connector.stats().searches(), 6);
        assert_eq!(connector.stats().failures(), 2);
    }

    #[test]
    fn test_insert_records_ids_on_success_only() {
        let connector = MockConnector::new().with_fail_every(2);
        let mut client = connector.connect().unwrap();
        assert_eq!(client.insert("c", &[0, 1], &[vec![], vec![]]).unwrap(), 2);
        assert!(client.insert("c", &[2, 3], &[vec![], vec![]]).is_err());
        assert_eq!(connector.stats().inserted_ids(), vec![0, 1]);
        assert_eq!(connector.stats().insert_rows(), 2);
    }

    #[test]
    fn test_search_returns_top_k_hits() {
        let connector = MockConnector::new();
        let mut client = connector.connect().unwrap();
        let hits = client.search("c", &[1.0, 2.0], 5, 100).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].id, 0);
    }

    #[test]
    fn test_connections_share_stats() {
        let connector = MockConnector::new();
        let mut a = connector.connect().unwrap();
        let mut b = connector.connect().unwrap();
        a.search("c", &[1.0], 1, 100).unwrap();
        b.search("c", &[1.0], 1, 100).unwrap();
        assert_eq!(connector.stats().searches(), 2);
    }
}
