// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Shared per-worker state.
//!
//! Each worker thread owns one [`WorkerState`], shared with the orchestrator
//! through an `Arc`. The orchestrator reads counters for progress reporting
//! and flips the stage to request a stop; workers poll the stage between
//! operations. All accesses are relaxed: the counters are monotonic tallies
//! and the stop flag is advisory, so no ordering is needed beyond the atomic
//! itself.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Per-worker errors logged at warn level before dropping to debug.
pub(crate) const ERROR_LOG_LIMIT: u64 = 5;

/// Lifecycle of a worker thread. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerStage {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl WorkerStage {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerStage::Created,
            1 => WorkerStage::Running,
            2 => WorkerStage::Stopping,
            _ => WorkerStage::Stopped,
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkerState {
    stage: AtomicU8,
    ops: AtomicU64,
    errors: AtomicU64,
}

impl WorkerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> WorkerStage {
        WorkerStage::from_u8(self.stage.load(Ordering::Relaxed))
    }

    /// Only `Created` moves to `Running`; a stop requested before the thread
    /// was scheduled stays in effect.
    pub fn mark_running(&self) {
        let _ = self.stage.compare_exchange(
            WorkerStage::Created as u8,
            WorkerStage::Running as u8,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    /// Ask the worker to wind down. Only `Created` and `Running` move to
    /// `Stopping`; a worker that already stopped stays `Stopped`.
    pub fn request_stop(&self) {
        let _ = self
            .stage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                matches!(
                    WorkerStage::from_u8(s),
                    WorkerStage::Created | WorkerStage::Running
                )
                .then_some(WorkerStage::Stopping as u8)
            });
    }

    pub fn mark_stopped(&self) {
        self.stage.store(WorkerStage::Stopped as u8, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        matches!(self.stage(), WorkerStage::Stopping | WorkerStage::Stopped)
    }

    pub fn is_stopped(&self) -> bool {
        self.stage() == WorkerStage::Stopped
    }

    pub fn add_op(&self) -> u64 {
        self.ops.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_ops(&self, n: u64) {
        self.ops.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the new error total so callers can rate-limit their logging.
    pub fn add_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn ops(&self) -> u64 {
        self.ops.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}
