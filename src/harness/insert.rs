// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Insert workload.
//!
//! Each insert worker owns a disjoint id range and streams batches from its
//! reader into the collection, assigning `id = global dataset index` so a
//! vector's primary key is stable across runs. The cursor advances past a
//! failed batch rather than retrying it, so a persistently failing server
//! cannot wedge the worker; the skipped rows show up in the error count.

use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::client::BenchClient;
use crate::dataset::VectorReader;
use crate::harness::worker::{ERROR_LOG_LIMIT, WorkerState};

/// Pacing sleeps are sliced so stop requests stay responsive.
const PACE_SLICE: Duration = Duration::from_millis(100);

pub struct InsertWorker {
    pub id: usize,
    pub client: Box<dyn BenchClient>,
    pub reader: Box<dyn VectorReader>,
    pub collection: String,
    /// Global dataset indices this worker inserts, end exclusive.
    pub range: Range<usize>,
    pub batch_size: usize,
    /// This worker's share of the target rate in vectors per second.
    /// Zero or negative means unpaced.
    pub target_rate: f64,
    /// Flush after every n successful batches. `None` disables flushing.
    pub flush_every: Option<u32>,
    /// Timed phases set a deadline; bulk loads run to range exhaustion.
    pub deadline: Option<Instant>,
    pub state: Arc<WorkerState>,
}

impl InsertWorker {
    pub fn run(mut self) {
        self.state.mark_running();
        let mut cursor = self.range.start;
        let mut batches = 0u32;

        while !self.state.should_stop() && !self.past_deadline() && cursor < self.range.end {
            let want = self.batch_size.min(self.range.end - cursor);
            let vectors = match self.reader.read_vectors(cursor, want) {
                Ok(v) => v,
                Err(e) => {
                    warn!("insert worker {}: read at {} failed: {}", self.id, cursor, e);
                    self.state.add_error();
                    break;
                }
            };
            if vectors.is_empty() {
                debug!("insert worker {}: dataset exhausted at {}", self.id, cursor);
                break;
            }

            let ids: Vec<i64> = (cursor..cursor + vectors.len()).map(|i| i as i64).collect();
            let sent = vectors.len();
            match self.client.insert(&self.collection, &ids, &vectors) {
                Ok(n) => {
                    self.state.add_ops(n as u64);
                    batches += 1;
                    if let Some(every) = self.flush_every {
                        if every > 0 && batches % every == 0 {
                            if let Err(e) = self.client.flush(&self.collection) {
                                warn!("insert worker {}: flush failed: {}", self.id, e);
                            }
                        }
                    }
                }
                Err(e) => {
                    let errors = self.state.add_error();
                    if errors <= ERROR_LOG_LIMIT {
                        warn!(
                            "insert worker {}: insert of {} rows at {} failed: {}",
                            self.id, sent, cursor, e
                        );
                    } else {
                        debug!("insert worker {}: insert at {} failed: {}", self.id, cursor, e);
                    }
                }
            }
            // Advance past the batch whether or not it landed.
            cursor += sent;

            if self.target_rate > 0.0 {
                self.pace(sent);
            }
        }
        self.state.mark_stopped();
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Sleep off the time budget the batch earned at the target rate,
    /// waking early on stop or deadline.
    fn pace(&self, batch_len: usize) {
        let mut remaining = Duration::from_secs_f64(batch_len as f64 / self.target_rate);
        while !remaining.is_zero() {
            if self.state.should_stop() || self.past_deadline() {
                return;
            }
            let step = remaining.min(PACE_SLICE);
            thread::sleep(step);
            remaining -= step;
        }
    }
}
