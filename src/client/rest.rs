// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Milvus v2 REST client.
//!
//! Every call is a POST under `/v2/vectordb/` returning a JSON envelope
//! `{"code": 0, "message": ..., "data": ...}`. A non-zero code is surfaced as
//! [`BenchError::Server`] no matter what the HTTP status said.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::client::{BenchClient, CollectionSpec, Connector, IndexSpec, LoadState, SearchHit};
use crate::error::{BenchError, BenchResult};

/// Builds one HTTP connection per worker against a fixed base URL.
#[derive(Debug, Clone)]
pub struct RestConnector {
    base_url: String,
    timeout: Duration,
}

impl RestConnector {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            timeout,
        }
    }
}

impl Connector for RestConnector {
    fn connect(&self) -> BenchResult<Box<dyn BenchClient>> {
        let http = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let client = RestClient {
            http,
            base_url: self.base_url.clone(),
        };
        // Fail fast on an unreachable or unhealthy server.
        client.post("collections/list", json!({}))?;
        Ok(Box::new(client))
    }
}

pub struct RestClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HasData {
    has: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStateData {
    load_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsData {
    row_count: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertData {
    #[serde(default)]
    insert_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    id: i64,
    distance: f32,
}

impl RestClient {
    fn post(&self, path: &str, body: Value) -> BenchResult<Option<Value>> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);
        let envelope: Envelope = self
            .http
            .post(&url)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;
        if envelope.code != 0 {
            return Err(BenchError::Server {
                code: envelope.code,
                message: envelope.message,
            });
        }
        Ok(envelope.data)
    }

    fn post_ok(&self, path: &str, body: Value) -> BenchResult<()> {
        self.post(path, body)?;
        Ok(())
    }

    fn post_data<T: DeserializeOwned>(&self, path: &str, body: Value) -> BenchResult<T> {
        let data = self.post(path, body)?.unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }
}

impl BenchClient for RestClient {
    fn create_collection(&mut self, spec: &CollectionSpec, drop_old: bool) -> BenchResult<()> {
        if drop_old && self.has_collection(&spec.name)? {
            self.drop_collection(&spec.name)?;
        }
        self.post_ok("collections/create", collection_schema(spec))
    }

    fn drop_collection(&mut self, name: &str) -> BenchResult<()> {
        self.post_ok("collections/drop", json!({ "collectionName": name }))
    }

    fn has_collection(&mut self, name: &str) -> BenchResult<bool> {
        let data: HasData = self.post_data("collections/has", json!({ "collectionName": name }))?;
        Ok(data.has)
    }

    fn create_index(&mut self, collection: &str, spec: &IndexSpec) -> BenchResult<()> {
        self.post_ok("indexes/create", index_params(collection, spec))
    }

    fn load_collection(&mut self, name: &str) -> BenchResult<()> {
        self.post_ok("collections/load", json!({ "collectionName": name }))
    }

    fn load_state(&mut self, name: &str) -> BenchResult<LoadState> {
        let data: LoadStateData = self.post_data(
            "collections/get_load_state",
            json!({ "collectionName": name }),
        )?;
        Ok(parse_load_state(&data.load_state))
    }

    fn flush(&mut self, name: &str) -> BenchResult<()> {
        self.post_ok("collections/flush", json!({ "collectionName": name }))
    }

    fn row_count(&mut self, name: &str) -> BenchResult<u64> {
        let data: StatsData =
            self.post_data("collections/get_stats", json!({ "collectionName": name }))?;
        Ok(row_count_from_value(&data.row_count))
    }

    fn insert(
        &mut self,
        collection: &str,
        ids: &[i64],
        vectors: &[Vec<f32>],
    ) -> BenchResult<usize> {
        let data: InsertData =
            self.post_data("entities/insert", insert_payload(collection, ids, vectors))?;
        Ok(data.insert_count.unwrap_or(ids.len() as u64) as usize)
    }

    fn search(
        &mut self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        search_list: u32,
    ) -> BenchResult<Vec<SearchHit>> {
        let hits: Vec<RawHit> = self.post_data(
            "entities/search",
            search_payload(collection, query, top_k, search_list),
        )?;
        Ok(hits
            .into_iter()
            .map(|h| SearchHit {
                id: h.id,
                distance: h.distance,
            })
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Request bodies
// ────────────────────────────────────────────────────────────────────────────────

/// Schema body: Int64 primary `id` (no auto-id, the harness assigns ids) plus
/// a FloatVector `embedding`. Milvus expects `dim` as a string parameter.
fn collection_schema(spec: &CollectionSpec) -> Value {
    json!({
        "collectionName": spec.name,
        "schema": {
            "autoId": false,
            "enableDynamicField": false,
            "fields": [
                {
                    "fieldName": "id",
                    "dataType": "Int64",
                    "isPrimary": true,
                },
                {
                    "fieldName": "embedding",
                    "dataType": "FloatVector",
                    "elementTypeParams": { "dim": spec.dim.to_string() },
                },
            ],
        },
    })
}

fn index_params(collection: &str, spec: &IndexSpec) -> Value {
    json!({
        "collectionName": collection,
        "indexParams": [
            {
                "fieldName": "embedding",
                "indexName": "embedding_index",
                "metricType": spec.metric,
                "params": {
                    "index_type": spec.index_type,
                    "nlist": spec.nlist,
                },
            },
        ],
    })
}

fn insert_payload(collection: &str, ids: &[i64], vectors: &[Vec<f32>]) -> Value {
    let rows: Vec<Value> = ids
        .iter()
        .zip(vectors)
        .map(|(id, vec)| json!({ "id": id, "embedding": vec }))
        .collect();
    json!({ "collectionName": collection, "data": rows })
}

fn search_payload(collection: &str, query: &[f32], top_k: usize, search_list: u32) -> Value {
    json!({
        "collectionName": collection,
        "data": [query],
        "annsField": "embedding",
        "limit": top_k,
        "outputFields": ["id"],
        "searchParams": {
            "metricType": "L2",
            "params": { "search_list": search_list },
        },
    })
}

fn parse_load_state(s: &str) -> LoadState {
    match s {
        "LoadStateLoaded" => LoadState::Loaded,
        "LoadStateLoading" => LoadState::Loading,
        "LoadStateNotExist" => LoadState::NotExist,
        _ => LoadState::NotLoaded,
    }
}

/// `get_stats` reports `rowCount` as a number on some versions and a string
/// on others.
fn row_count_from_value(v: &Value) -> u64 {
    match v {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_with_data() {
        let env: Envelope = serde_json::from_str(r#"{"code":0,"data":{"has":true}}"#).unwrap();
        assert_eq!(env.code, 0);
        let has: HasData = serde_json::from_value(env.data.unwrap()).unwrap();
        assert!(has.has);
    }

    #[test]
    fn test_envelope_error_fields() {
        let env: Envelope =
            serde_json::from_str(r#"{"code":1100,"message":"collection not found"}"#).unwrap();
        assert_eq!(env.code, 1100);
        assert_eq!(env.message, "collection not found");
        assert!(env.data.is_none());
    }

    #[test]
    fn test_search_hits_parse() {
        let hits: Vec<RawHit> =
            serde_json::from_str(r#"[{"id":42,"distance":0.5,"extra":1},{"id":7,"distance":1.25}]"#)
                .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 42);
        assert!((hits[1].distance - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_load_state_strings() {
        assert_eq!(parse_load_state("LoadStateLoaded"), LoadState::Loaded);
        assert_eq!(parse_load_state("LoadStateLoading"), LoadState::Loading);
        assert_eq!(parse_load_state("LoadStateNotLoad"), LoadState::NotLoaded);
        assert_eq!(parse_load_state("LoadStateNotExist"), LoadState::NotExist);
        assert_eq!(parse_load_state("???"), LoadState::NotLoaded);
    }

    #[test]
    fn test_row_count_number_or_string() {
        assert_eq!(row_count_from_value(&json!(1000)), 1000);
        assert_eq!(row_count_from_value(&json!("2500")), 2500);
        assert_eq!(row_count_from_value(&json!(null)), 0);
        assert_eq!(row_count_from_value(&json!("garbage")), 0);
    }

    #[test]
    fn test_collection_schema_shape() {
        let spec = CollectionSpec {
            name: "spacev1b".into(),
            dim: 100,
        };
        let body = collection_schema(&spec);
        assert_eq!(body.pointer("/collectionName").unwrap(), "spacev1b");
        assert_eq!(body.pointer("/schema/autoId").unwrap(), false);
        assert_eq!(
            body.pointer("/schema/fields/0/isPrimary").unwrap(),
            &json!(true)
        );
        assert_eq!(
            body.pointer("/schema/fields/1/elementTypeParams/dim").unwrap(),
            "100"
        );
    }

    #[test]
    fn test_index_params_shape() {
        let spec = IndexSpec {
            index_type: "IVF_FLAT".into(),
            metric: "L2".into(),
            nlist: 4096,
        };
        let body = index_params("spacev1b", &spec);
        assert_eq!(
            body.pointer("/indexParams/0/params/index_type").unwrap(),
            "IVF_FLAT"
        );
        assert_eq!(
            body.pointer("/indexParams/0/params/nlist").unwrap(),
            &json!(4096)
        );
        assert_eq!(body.pointer("/indexParams/0/metricType").unwrap(), "L2");
    }

    #[test]
    fn test_insert_payload_rows_are_parallel() {
        let body = insert_payload("c", &[5, 6], &[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(body.pointer("/data/0/id").unwrap(), &json!(5));
        assert_eq!(body.pointer("/data/1/embedding/1").unwrap(), &json!(4.0));
    }

    #[test]
    fn test_search_payload_shape() {
        let body = search_payload("c", &[0.5, 0.25], 100, 64);
        assert_eq!(body.pointer("/limit").unwrap(), &json!(100));
        assert_eq!(body.pointer("/annsField").unwrap(), "embedding");
        assert_eq!(
            body.pointer("/searchParams/params/search_list").unwrap(),
            &json!(64)
        );
        assert_eq!(body.pointer("/data/0/0").unwrap(), &json!(0.5));
    }
}
