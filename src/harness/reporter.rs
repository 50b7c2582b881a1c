// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Result assembly and output.
//!
//! The JSON layout is a stable contract: downstream plotting reads
//! `results.search_only.actual_qps` and `results.concurrent.actual_qps`
//! (plus the nested `latency_ms` and `insert` blocks), so field names here
//! must not change casually.

use std::path::{Path, PathBuf};

use chrono::Utc;
use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use serde::{Deserialize, Serialize};

use crate::config::BenchConfig;
use crate::error::BenchResult;
use crate::harness::recall::RecallMetrics;
use crate::harness::tracker::LatencyStats;

/// Host details captured alongside the results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpus: usize,
    pub hostname: String,
}

impl SystemInfo {
    pub fn collect() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let hostname = std::fs::read_to_string("/etc/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus,
            hostname,
        }
    }
}

/// Insert-side outcome of a phase or bulk load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertSummary {
    pub vectors_inserted: u64,
    pub insert_errors: u64,
    /// Vectors per second over the wall-clock phase duration.
    pub actual_insert_rate: f64,
}

/// Outcome of one timed phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Wall-clock duration including worker shutdown.
    pub duration_s: f64,
    pub queries: u64,
    pub search_errors: u64,
    pub actual_qps: f64,
    /// `None` when no search succeeded.
    pub latency_ms: Option<LatencyStats>,
    /// `None` for phases without insert workers.
    pub insert: Option<InsertSummary>,
    /// Workers that did not stop within the join timeout.
    pub incomplete_workers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResults {
    pub search_only: PhaseSummary,
    pub concurrent: PhaseSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub timestamp: String,
    pub config: BenchConfig,
    pub system: SystemInfo,
    pub recall: Option<RecallMetrics>,
    pub results: PhaseResults,
}

impl BenchmarkReport {
    pub fn new(config: &BenchConfig, recall: Option<RecallMetrics>, results: PhaseResults) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            config: config.clone(),
            system: SystemInfo::collect(),
            recall,
            results,
        }
    }

    /// Write the report as pretty-printed JSON under `dir`, creating the
    /// directory if needed. The filename embeds a UTC timestamp.
    pub fn save(&self, dir: &Path) -> BenchResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let name = format!("bench_results_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "Benchmark Results".bold());

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                "Phase", "Queries", "QPS", "p50 ms", "p95 ms", "p99 ms", "Errors",
            ]);
        for (name, phase) in self.phases() {
            table.add_row(phase_row(name, phase));
        }
        println!("{table}");

        if let Some(insert) = &self.results.concurrent.insert {
            println!(
                "inserts: {} vectors at {:.1}/s ({} errors)",
                insert.vectors_inserted, insert.actual_insert_rate, insert.insert_errors
            );
        }
        if let Some(recall) = &self.recall {
            println!(
                "recall@{}: mean {:.4} (min {:.4}, max {:.4}) over {} queries",
                recall.k, recall.mean, recall.min, recall.max, recall.queries_evaluated
            );
        }
        for (name, phase) in self.phases() {
            if phase.incomplete_workers > 0 {
                println!(
                    "{}",
                    format!(
                        "warning: {} worker(s) in the {} phase did not stop cleanly",
                        phase.incomplete_workers, name
                    )
                    .yellow()
                );
            }
        }
    }

    fn phases(&self) -> [(&'static str, &PhaseSummary); 2] {
        [
            ("search-only", &self.results.search_only),
            ("concurrent", &self.results.concurrent),
        ]
    }
}

fn phase_row(name: &str, phase: &PhaseSummary) -> Vec<Cell> {
    let (p50, p95, p99) = match &phase.latency_ms {
        Some(l) => (
            format!("{:.2}", l.p50),
            format!("{:.2}", l.p95),
            format!("{:.2}", l.p99),
        ),
        None => ("-".to_string(), "-".to_string(), "-".to_string()),
    };
    let errors = Cell::new(phase.search_errors.to_string()).fg(if phase.search_errors > 0 {
        Color::Red
    } else {
        Color::Green
    });
    vec![
        Cell::new(name),
        Cell::new(phase.queries.to_string()),
        Cell::new(format!("{:.1}", phase.actual_qps)).fg(Color::Green),
        Cell::new(p50),
        Cell::new(p95),
        Cell::new(p99),
        errors,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(qps: f64, with_latency: bool, insert: Option<InsertSummary>) -> PhaseSummary {
        let latency_ms = with_latency
            .then(|| LatencyStats::from_samples(&[1.0, 2.0, 3.0, 4.0, 5.0]))
            .flatten();
        PhaseSummary {
            duration_s: 60.0,
            queries: 6000,
            search_errors: 1,
            actual_qps: qps,
            latency_ms,
            insert,
            incomplete_workers: 0,
        }
    }

    fn report() -> BenchmarkReport {
        let results = PhaseResults {
            search_only: phase(100.0, true, None),
            concurrent: phase(
                80.0,
                true,
                Some(InsertSummary {
                    vectors_inserted: 120_000,
                    insert_errors: 2,
                    actual_insert_rate: 2000.0,
                }),
            ),
        };
        let recall = Some(RecallMetrics {
            k: 100,
            queries_evaluated: 1000,
            mean: 0.95,
            min: 0.8,
            max: 1.0,
        });
        BenchmarkReport::new(&BenchConfig::default(), recall, results)
    }

    #[test]
    fn test_json_shape_for_plotting() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(
            value.pointer("/results/search_only/actual_qps").unwrap(),
            &serde_json::json!(100.0)
        );
        assert_eq!(
            value.pointer("/results/concurrent/actual_qps").unwrap(),
            &serde_json::json!(80.0)
        );
        assert!(value.pointer("/results/search_only/latency_ms/p50").is_some());
        assert_eq!(
            value
                .pointer("/results/concurrent/insert/vectors_inserted")
                .unwrap(),
            &serde_json::json!(120_000)
        );
        assert_eq!(value.pointer("/recall/k").unwrap(), &serde_json::json!(100));
        assert_eq!(
            value.pointer("/config/collection").unwrap(),
            &serde_json::json!("spacev1b")
        );
        assert!(value.pointer("/system/cpus").is_some());
    }

    #[test]
    fn test_save_writes_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = report().save(dir.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("bench_results_"));
        assert!(name.ends_with(".json"));

        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: BenchmarkReport = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.results.concurrent.queries, 6000);
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = report().save(&nested).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_system_info_collects() {
        let info = SystemInfo::collect();
        assert!(info.cpus >= 1);
        assert!(!info.os.is_empty());
        assert!(!info.hostname.is_empty());
    }
}
