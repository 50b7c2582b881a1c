// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Collection setup: schema, index, and load.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::client::{BenchClient, CollectionSpec, IndexSpec, LoadState};
use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};

const LOAD_POLL: Duration = Duration::from_secs(5);

/// Create the benchmark collection. With `drop_old` an existing collection is
/// dropped and recreated; otherwise an existing one is left untouched.
pub fn ensure_collection(
    client: &mut dyn BenchClient,
    config: &BenchConfig,
    drop_old: bool,
) -> BenchResult<()> {
    let spec = CollectionSpec {
        name: config.collection.clone(),
        dim: config.dim,
    };
    if !drop_old && client.has_collection(&spec.name)? {
        info!("collection {} already exists", spec.name);
        return Ok(());
    }
    client.create_collection(&spec, drop_old)?;
    info!("created collection {} (dim {})", spec.name, spec.dim);
    Ok(())
}

/// Create the vector index the benchmark searches against.
pub fn ensure_index(client: &mut dyn BenchClient, config: &BenchConfig) -> BenchResult<()> {
    let spec = IndexSpec {
        index_type: "IVF_FLAT".to_string(),
        metric: config.metric.clone(),
        nlist: config.nlist,
    };
    client.create_index(&config.collection, &spec)?;
    info!(
        "created {} index on {} (metric {}, nlist {})",
        spec.index_type, config.collection, spec.metric, spec.nlist
    );
    Ok(())
}

/// Load the collection into memory and block until the server reports it
/// loaded. Errors out if the collection does not exist.
pub fn load_and_wait(client: &mut dyn BenchClient, collection: &str) -> BenchResult<()> {
    match client.load_state(collection)? {
        LoadState::Loaded => {
            info!("collection {collection} already loaded");
            return Ok(());
        }
        LoadState::NotExist => {
            return Err(BenchError::Config(format!(
                "collection {collection} does not exist, run setup first"
            )));
        }
        _ => {}
    }

    client.load_collection(collection)?;
    loop {
        match client.load_state(collection)? {
            LoadState::Loaded => break,
            LoadState::NotExist => {
                return Err(BenchError::Config(format!(
                    "collection {collection} disappeared while loading"
                )));
            }
            state => {
                info!("collection {collection} is {state:?}, waiting");
                thread::sleep(LOAD_POLL);
            }
        }
    }

    match client.row_count(collection) {
        Ok(rows) => info!("collection {collection} loaded ({rows} rows)"),
        Err(e) => warn!("collection {collection} loaded (row count unavailable: {e})"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Connector;
    use crate::client::mock::MockConnector;

    #[test]
    fn test_setup_sequence_on_mock() {
        let connector = MockConnector::new();
        let mut client = connector.connect().unwrap();
        let config = BenchConfig::default();

        ensure_collection(client.as_mut(), &config, true).unwrap();
        ensure_index(client.as_mut(), &config).unwrap();
        load_and_wait(client.as_mut(), &config.collection).unwrap();
    }

    #[test]
    fn test_existing_collection_kept_without_drop() {
        // The mock reports every collection as existing, so without drop_old
        // the setup path must not recreate it.
        let connector = MockConnector::new();
        let mut client = connector.connect().unwrap();
        let config = BenchConfig::default();
        ensure_collection(client.as_mut(), &config, false).unwrap();
    }
}
