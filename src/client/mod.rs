// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Database client abstraction.
//!
//! Workers drive the database through [`BenchClient`] so the harness logic is
//! testable against [`mock::MockConnector`] without a running cluster. The
//! real implementation is [`rest::RestConnector`], which speaks the Milvus v2
//! REST API. A [`Connector`] hands each worker its own connection; clients
//! are never shared across threads.

pub mod mock;
pub mod rest;

use serde::{Deserialize, Serialize};

use crate::error::BenchResult;

/// One search result: point id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub distance: f32,
}

/// Load progress of a collection on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loaded,
    Loading,
    NotLoaded,
    NotExist,
}

/// Collection schema parameters: Int64 primary `id` plus a float vector
/// `embedding` of the given dimension.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    pub name: String,
    pub dim: usize,
}

/// Vector index parameters.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub index_type: String,
    pub metric: String,
    pub nlist: u32,
}

/// A single connection to the database, owned by one worker thread.
///
/// Every call blocks until the server answers or the request times out.
pub trait BenchClient: Send {
    fn create_collection(&mut self, spec: &CollectionSpec, drop_old: bool) -> BenchResult<()>;
    fn drop_collection(&mut self, name: &str) -> BenchResult<()>;
    fn has_collection(&mut self, name: &str) -> BenchResult<bool>;
    fn create_index(&mut self, collection: &str, spec: &IndexSpec) -> BenchResult<()>;
    fn load_collection(&mut self, name: &str) -> BenchResult<()>;
    fn load_state(&mut self, name: &str) -> BenchResult<LoadState>;
    fn flush(&mut self, name: &str) -> BenchResult<()>;
    fn row_count(&mut self, name: &str) -> BenchResult<u64>;

    /// Insert a batch; `ids` and `vectors` are parallel. Returns the number
    /// of rows the server acknowledged.
    fn insert(
        &mut self,
        collection: &str,
        ids: &[i64],
        vectors: &[Vec<f32>],
    ) -> BenchResult<usize>;

    /// Top-k nearest neighbor search for a single query vector.
    fn search(
        &mut self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        search_list: u32,
    ) -> BenchResult<Vec<SearchHit>>;
}

/// Connection factory shared by the orchestrator and handed to phases.
pub trait Connector: Send + Sync {
    fn connect(&self) -> BenchResult<Box<dyn BenchClient>>;
}
