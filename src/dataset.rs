// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! SPACEV1B dataset readers.
//!
//! Binary formats (little-endian):
//! - query file: `i32 count`, `i32 dim`, then `count * dim` int8 components
//! - ground truth: `i32 count`, `i32 topk`, then `count * topk` i32 neighbor
//!   ids (row-major), then `count * topk` f32 distances
//! - base vectors: one or more shard files, each `i32 count`, `i32 dim`, then
//!   `count * dim` int8 components
//!
//! Components are widened from int8 to f32 because the database takes float
//! vectors. Base vectors are exposed through [`VectorReader`] so the insert
//! path works identically whether the dataset is decoded up front or streamed
//! from disk per batch.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::error::{BenchError, BenchResult};

/// Bytes occupied by the `(count, dim)` shard header.
const SHARD_HEADER_BYTES: u64 = 8;

// ────────────────────────────────────────────────────────────────────────────────
// Low-level decoding
// ────────────────────────────────────────────────────────────────────────────────

fn open_file(path: &Path) -> BenchResult<File> {
    File::open(path).map_err(|e| BenchError::Dataset(format!("{}: {}", path.display(), e)))
}

fn read_i32<R: Read>(r: &mut R, path: &Path) -> BenchResult<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|e| BenchError::Dataset(format!("{}: {}", path.display(), e)))?;
    Ok(i32::from_le_bytes(buf))
}

fn read_bytes<R: Read>(r: &mut R, len: usize, path: &Path) -> BenchResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|e| BenchError::Dataset(format!("{}: truncated: {}", path.display(), e)))?;
    Ok(buf)
}

/// Read a `(count, dim)` header, rejecting nonsense values.
fn read_header<R: Read>(r: &mut R, path: &Path) -> BenchResult<(usize, usize)> {
    let count = read_i32(r, path)?;
    let dim = read_i32(r, path)?;
    if count < 0 || dim <= 0 {
        return Err(BenchError::Dataset(format!(
            "{}: bad header (count={}, dim={})",
            path.display(),
            count,
            dim
        )));
    }
    Ok((count as usize, dim as usize))
}

fn decode_row(bytes: &[u8]) -> Vec<f32> {
    bytes.iter().map(|&b| b as i8 as f32).collect()
}

// ────────────────────────────────────────────────────────────────────────────────
// Queries + ground truth
// ────────────────────────────────────────────────────────────────────────────────

/// Query vectors with their parallel ground-truth arrays.
///
/// Loaded once before any phase starts and shared read-only by all search
/// workers. Ground truth is optional; without it the recall pass is skipped.
#[derive(Debug, Clone)]
pub struct QuerySet {
    pub queries: Vec<Vec<f32>>,
    pub truth_ids: Vec<Vec<i64>>,
    pub truth_distances: Vec<Vec<f32>>,
    pub dim: usize,
    pub truth_k: usize,
}

impl QuerySet {
    /// A query set with no queries, for workloads that only insert.
    pub fn empty(dim: usize) -> Self {
        Self {
            queries: Vec::new(),
            truth_ids: Vec::new(),
            truth_distances: Vec::new(),
            dim,
            truth_k: 0,
        }
    }

    pub fn load(query_path: &Path, truth_path: Option<&Path>) -> BenchResult<Self> {
        let mut r = BufReader::new(open_file(query_path)?);
        let (count, dim) = read_header(&mut r, query_path)?;
        let data = read_bytes(&mut r, count * dim, query_path)?;
        let queries: Vec<Vec<f32>> = data.chunks_exact(dim).map(decode_row).collect();

        let (truth_ids, truth_distances, truth_k) = match truth_path {
            Some(path) => Self::load_truth(path)?,
            None => (Vec::new(), Vec::new(), 0),
        };

        if !truth_ids.is_empty() && truth_ids.len() != queries.len() {
            warn!(
                "ground truth has {} entries but query set has {}; extra entries are ignored",
                truth_ids.len(),
                queries.len()
            );
        }

        Ok(Self {
            queries,
            truth_ids,
            truth_distances,
            dim,
            truth_k,
        })
    }

    fn load_truth(path: &Path) -> BenchResult<(Vec<Vec<i64>>, Vec<Vec<f32>>, usize)> {
        let mut r = BufReader::new(open_file(path)?);
        let count = read_i32(&mut r, path)?;
        let topk = read_i32(&mut r, path)?;
        if count < 0 || topk < 0 {
            return Err(BenchError::Dataset(format!(
                "{}: bad header (count={}, topk={})",
                path.display(),
                count,
                topk
            )));
        }
        let (count, topk) = (count as usize, topk as usize);

        let id_bytes = read_bytes(&mut r, count * topk * 4, path)?;
        let ids: Vec<Vec<i64>> = id_bytes
            .chunks_exact(topk * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
                    .collect()
            })
            .collect();

        let dist_bytes = read_bytes(&mut r, count * topk * 4, path)?;
        let distances: Vec<Vec<f32>> = dist_bytes
            .chunks_exact(topk * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect();

        Ok((ids, distances, topk))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn has_truth(&self) -> bool {
        !self.truth_ids.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────────
// Base vectors
// ────────────────────────────────────────────────────────────────────────────────

/// Range reads over the base vector set.
///
/// Implementations clamp to the dataset end: a read past the last vector
/// returns fewer (or zero) rows rather than erroring.
pub trait VectorReader: Send {
    fn dimension(&self) -> usize;
    fn total_vectors(&self) -> usize;
    fn read_vectors(&mut self, start: usize, count: usize) -> BenchResult<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone)]
struct Shard {
    path: PathBuf,
    count: usize,
}

/// The base vector set: a single shard file or a directory of
/// `spacev1b_vectors_<n>.bin` shards, indexed as one contiguous id space.
///
/// `open` parses headers only; `prepare(true)` decodes everything into a
/// shared buffer for in-memory readers, otherwise readers stream from their
/// own file handles.
#[derive(Debug)]
pub struct VectorDataset {
    shards: Vec<Shard>,
    dim: usize,
    total: usize,
    cache: Option<Arc<Vec<f32>>>,
}

impl VectorDataset {
    pub fn open(path: &Path) -> BenchResult<Self> {
        let paths = if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| BenchError::Dataset(format!("{}: {}", path.display(), e)))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("spacev1b_vectors_") && n.ends_with(".bin"))
                })
                .collect();
            if found.is_empty() {
                return Err(BenchError::Dataset(format!(
                    "no vector files found in {}",
                    path.display()
                )));
            }
            found.sort_by_key(|p| shard_sort_key(p));
            found
        } else {
            vec![path.to_path_buf()]
        };

        let mut shards = Vec::with_capacity(paths.len());
        let mut dim = 0usize;
        let mut total = 0usize;
        for p in paths {
            let mut file = open_file(&p)?;
            let (count, shard_dim) = read_header(&mut file, &p)?;
            if dim == 0 {
                dim = shard_dim;
            } else if shard_dim != dim {
                return Err(BenchError::Dataset(format!(
                    "{}: shard dimension {} does not match {}",
                    p.display(),
                    shard_dim,
                    dim
                )));
            }
            let needed = SHARD_HEADER_BYTES + (count * dim) as u64;
            let actual = file
                .metadata()
                .map_err(|e| BenchError::Dataset(format!("{}: {}", p.display(), e)))?
                .len();
            if actual < needed {
                return Err(BenchError::Dataset(format!(
                    "{}: truncated ({} bytes, header promises {})",
                    p.display(),
                    actual,
                    needed
                )));
            }
            total += count;
            shards.push(Shard { path: p, count });
        }

        Ok(Self {
            shards,
            dim,
            total,
            cache: None,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn total_vectors(&self) -> usize {
        self.total
    }

    /// Decode all shards into a shared in-memory buffer. No-op when already
    /// prepared or when streaming was requested.
    pub fn prepare(&mut self, in_memory: bool) -> BenchResult<()> {
        if !in_memory || self.cache.is_some() {
            return Ok(());
        }
        let mut flat: Vec<f32> = Vec::with_capacity(self.total * self.dim);
        for shard in &self.shards {
            let mut r = BufReader::new(open_file(&shard.path)?);
            r.seek(SeekFrom::Start(SHARD_HEADER_BYTES))
                .map_err(|e| BenchError::Dataset(format!("{}: {}", shard.path.display(), e)))?;
            let bytes = read_bytes(&mut r, shard.count * self.dim, &shard.path)?;
            flat.extend(bytes.iter().map(|&b| b as i8 as f32));
        }
        self.cache = Some(Arc::new(flat));
        Ok(())
    }

    /// Open a reader for one insert worker. In-memory readers share the
    /// prepared buffer; streaming readers own their file handles so workers
    /// never contend on a seek position.
    pub fn reader(&self) -> BenchResult<Box<dyn VectorReader>> {
        match &self.cache {
            Some(cache) => Ok(Box::new(InMemoryVectors {
                data: cache.clone(),
                dim: self.dim,
                total: self.total,
            })),
            None => {
                let mut files = Vec::with_capacity(self.shards.len());
                let mut counts = Vec::with_capacity(self.shards.len());
                let mut starts = Vec::with_capacity(self.shards.len());
                let mut cursor = 0usize;
                for shard in &self.shards {
                    files.push(open_file(&shard.path)?);
                    counts.push(shard.count);
                    starts.push(cursor);
                    cursor += shard.count;
                }
                Ok(Box::new(StreamingVectors {
                    files,
                    counts,
                    starts,
                    dim: self.dim,
                    total: self.total,
                }))
            }
        }
    }
}

/// Order `spacev1b_vectors_10.bin` after `spacev1b_vectors_2.bin`.
fn shard_sort_key(path: &Path) -> (u64, String) {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let ordinal = name
        .strip_prefix("spacev1b_vectors_")
        .and_then(|s| s.strip_suffix(".bin"))
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(u64::MAX);
    (ordinal, name)
}

/// Reader over the fully decoded dataset; range reads are slice copies.
pub struct InMemoryVectors {
    data: Arc<Vec<f32>>,
    dim: usize,
    total: usize,
}

impl InMemoryVectors {
    /// Build from an already-decoded flat buffer.
    pub fn new(data: Vec<f32>, dim: usize) -> Self {
        let total = if dim == 0 { 0 } else { data.len() / dim };
        Self {
            data: Arc::new(data),
            dim,
            total,
        }
    }
}

impl VectorReader for InMemoryVectors {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn total_vectors(&self) -> usize {
        self.total
    }

    fn read_vectors(&mut self, start: usize, count: usize) -> BenchResult<Vec<Vec<f32>>> {
        if start >= self.total || count == 0 {
            return Ok(Vec::new());
        }
        let count = count.min(self.total - start);
        Ok(self.data[start * self.dim..(start + count) * self.dim]
            .chunks_exact(self.dim)
            .map(|c| c.to_vec())
            .collect())
    }
}

/// Reader that seeks into shard files per batch, decoding on the fly.
/// Each instance owns its file handles.
pub struct StreamingVectors {
    files: Vec<File>,
    counts: Vec<usize>,
    starts: Vec<usize>,
    dim: usize,
    total: usize,
}

impl VectorReader for StreamingVectors {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn total_vectors(&self) -> usize {
        self.total
    }

    fn read_vectors(&mut self, start: usize, count: usize) -> BenchResult<Vec<Vec<f32>>> {
        if start >= self.total || count == 0 {
            return Ok(Vec::new());
        }
        let count = count.min(self.total - start);
        let mut out = Vec::with_capacity(count);
        let mut shard_idx = self.starts.partition_point(|&s| s <= start).saturating_sub(1);
        let mut global = start;
        let mut remaining = count;

        while remaining > 0 && shard_idx < self.files.len() {
            let local = global - self.starts[shard_idx];
            if local >= self.counts[shard_idx] {
                shard_idx += 1;
                continue;
            }
            let n = remaining.min(self.counts[shard_idx] - local);
            let file = &mut self.files[shard_idx];
            file.seek(SeekFrom::Start(
                SHARD_HEADER_BYTES + (local * self.dim) as u64,
            ))?;
            let mut buf = vec![0u8; n * self.dim];
            file.read_exact(&mut buf)?;
            out.extend(buf.chunks_exact(self.dim).map(decode_row));
            global += n;
            remaining -= n;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_shard(path: &Path, dim: usize, rows: &[Vec<i8>]) {
        let mut f = File::create(path).unwrap();
        f.write_all(&(rows.len() as i32).to_le_bytes()).unwrap();
        f.write_all(&(dim as i32).to_le_bytes()).unwrap();
        for row in rows {
            let bytes: Vec<u8> = row.iter().map(|&v| v as u8).collect();
            f.write_all(&bytes).unwrap();
        }
    }

    fn write_truth(path: &Path, topk: usize, ids: &[Vec<i32>], dists: &[Vec<f32>]) {
        let mut f = File::create(path).unwrap();
        f.write_all(&(ids.len() as i32).to_le_bytes()).unwrap();
        f.write_all(&(topk as i32).to_le_bytes()).unwrap();
        for row in ids {
            for id in row {
                f.write_all(&id.to_le_bytes()).unwrap();
            }
        }
        for row in dists {
            for d in row {
                f.write_all(&d.to_le_bytes()).unwrap();
            }
        }
    }

    fn rows(spec: &[&[i8]]) -> Vec<Vec<i8>> {
        spec.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_query_set_load() {
        let dir = tempfile::tempdir().unwrap();
        let qpath = dir.path().join("queries.bin");
        write_shard(&qpath, 4, &rows(&[&[1, 2, 3, 4], &[-5, 0, 7, -128], &[127, 1, 1, 1]]));

        let qs = QuerySet::load(&qpath, None).unwrap();
        assert_eq!(qs.len(), 3);
        assert_eq!(qs.dim, 4);
        assert_eq!(qs.queries[1], vec![-5.0, 0.0, 7.0, -128.0]);
        assert_eq!(qs.queries[2][0], 127.0);
        assert!(!qs.has_truth());
    }

    #[test]
    fn test_ground_truth_load() {
        let dir = tempfile::tempdir().unwrap();
        let qpath = dir.path().join("queries.bin");
        let tpath = dir.path().join("truth.bin");
        write_shard(&qpath, 2, &rows(&[&[1, 1], &[2, 2]]));
        write_truth(
            &tpath,
            3,
            &[vec![10, 20, 30], vec![40, 50, 60]],
            &[vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]],
        );

        let qs = QuerySet::load(&qpath, Some(&tpath)).unwrap();
        assert!(qs.has_truth());
        assert_eq!(qs.truth_k, 3);
        assert_eq!(qs.truth_ids[0], vec![10i64, 20, 30]);
        assert_eq!(qs.truth_ids[1], vec![40i64, 50, 60]);
        assert!((qs.truth_distances[1][2] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_single_file_dataset_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spacev1b_vectors_1.bin");
        write_shard(&path, 3, &rows(&[&[1, 2, 3], &[-4, -5, -6], &[7, 8, 9]]));

        let mut ds = VectorDataset::open(&path).unwrap();
        assert_eq!(ds.dimension(), 3);
        assert_eq!(ds.total_vectors(), 3);

        ds.prepare(true).unwrap();
        let mut reader = ds.reader().unwrap();
        let got = reader.read_vectors(0, 3).unwrap();
        assert_eq!(got[1], vec![-4.0, -5.0, -6.0]);
    }

    #[test]
    fn test_streaming_matches_in_memory_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(
            &dir.path().join("spacev1b_vectors_1.bin"),
            2,
            &rows(&[&[0, 0], &[1, 1], &[2, 2]]),
        );
        write_shard(
            &dir.path().join("spacev1b_vectors_2.bin"),
            2,
            &rows(&[&[3, 3], &[4, 4], &[5, 5], &[6, 6]]),
        );

        let mut streamed = VectorDataset::open(dir.path()).unwrap();
        assert_eq!(streamed.total_vectors(), 7);
        let mut stream_reader = streamed.reader().unwrap();

        streamed.prepare(true).unwrap();
        let mut mem_reader = streamed.reader().unwrap();

        // Spans the shard boundary.
        let a = stream_reader.read_vectors(1, 5).unwrap();
        let b = mem_reader.read_vectors(1, 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert_eq!(a[0], vec![1.0, 1.0]);
        assert_eq!(a[4], vec![5.0, 5.0]);
    }

    #[test]
    fn test_reads_clamp_to_dataset_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spacev1b_vectors_1.bin");
        write_shard(&path, 2, &rows(&[&[1, 1], &[2, 2], &[3, 3]]));

        let ds = VectorDataset::open(&path).unwrap();
        let mut reader = ds.reader().unwrap();
        assert_eq!(reader.read_vectors(2, 100).unwrap().len(), 1);
        assert!(reader.read_vectors(3, 5).unwrap().is_empty());
        assert!(reader.read_vectors(50, 5).unwrap().is_empty());
    }

    #[test]
    fn test_shard_numeric_ordering() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(&dir.path().join("spacev1b_vectors_10.bin"), 1, &rows(&[&[10]]));
        write_shard(&dir.path().join("spacev1b_vectors_2.bin"), 1, &rows(&[&[2]]));
        write_shard(&dir.path().join("spacev1b_vectors_1.bin"), 1, &rows(&[&[1]]));

        let ds = VectorDataset::open(dir.path()).unwrap();
        let mut reader = ds.reader().unwrap();
        let got = reader.read_vectors(0, 3).unwrap();
        assert_eq!(got, vec![vec![1.0], vec![2.0], vec![10.0]]);
    }

    #[test]
    fn test_shard_dimension_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(&dir.path().join("spacev1b_vectors_1.bin"), 2, &rows(&[&[1, 1]]));
        write_shard(&dir.path().join("spacev1b_vectors_2.bin"), 3, &rows(&[&[1, 1, 1]]));
        assert!(VectorDataset::open(dir.path()).is_err());
    }

    #[test]
    fn test_truncated_shard_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spacev1b_vectors_1.bin");
        let mut f = File::create(&path).unwrap();
        f.write_all(&10i32.to_le_bytes()).unwrap();
        f.write_all(&4i32.to_le_bytes()).unwrap();
        f.write_all(&[1u8, 2, 3]).unwrap();
        assert!(VectorDataset::open(&path).is_err());
    }

    #[test]
    fn test_empty_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VectorDataset::open(dir.path()).is_err());
    }
}
