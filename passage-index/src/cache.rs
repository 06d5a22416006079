//! Content-addressed, version-tagged persistence of per-document passages
//! and their embeddings.
//!
//! Each entry is a pair of sibling files, `{doc_id}_{version}.json` (passage
//! records without embeddings) and `{doc_id}_{version}.npy` (row-aligned
//! embedding matrix). An entry is usable only when both files load and their
//! row counts agree.

use std::path::{Path, PathBuf};

use passage_model::{DocumentId, PassageRecord};
use tracing::{info, warn};

use crate::npy;
use crate::IndexError;

pub struct CacheStore {
    dir: PathBuf,
    version: String,
}

impl CacheStore {
    pub fn open(dir: &Path, version: &str) -> Result<Self, IndexError> {
        std::fs::create_dir_all(dir).map_err(|err| IndexError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            version: version.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, doc_id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{}_{}.json", doc_id.0, self.version))
    }

    fn matrix_path(&self, doc_id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{}_{}.npy", doc_id.0, self.version))
    }

    /// Load a cache entry; any inconsistency is treated as a miss.
    pub fn load(&self, doc_id: &DocumentId) -> Option<(Vec<PassageRecord>, Vec<Vec<f32>>)> {
        let record_path = self.record_path(doc_id);
        let matrix_path = self.matrix_path(doc_id);
        if !record_path.exists() || !matrix_path.exists() {
            return None;
        }

        let bytes = match std::fs::read(&record_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(doc = %doc_id, error = %err, "cache record unreadable, re-ingesting");
                return None;
            }
        };
        let records: Vec<PassageRecord> = match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(err) => {
                warn!(doc = %doc_id, error = %err, "cache record unparsable, re-ingesting");
                return None;
            }
        };
        let matrix = match npy::read_matrix(&matrix_path) {
            Ok(matrix) => matrix,
            Err(err) => {
                warn!(doc = %doc_id, error = %err, "cache matrix unreadable, re-ingesting");
                return None;
            }
        };
        if records.len() != matrix.len() {
            warn!(
                doc = %doc_id,
                records = records.len(),
                rows = matrix.len(),
                "cache row mismatch, re-ingesting"
            );
            return None;
        }
        info!(doc = %doc_id, chunks = records.len(), "loaded chunks from cache");
        Some((records, matrix))
    }

    /// Persist both artefacts for one document.
    pub fn save(
        &self,
        doc_id: &DocumentId,
        records: &[PassageRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        if records.len() != embeddings.len() {
            return Err(IndexError::RowMismatch {
                records: records.len(),
                rows: embeddings.len(),
            });
        }
        let record_path = self.record_path(doc_id);
        let bytes = serde_json::to_vec(records).map_err(|err| IndexError::Io {
            path: record_path.clone(),
            message: err.to_string(),
        })?;
        std::fs::write(&record_path, bytes).map_err(|err| IndexError::Io {
            path: record_path,
            message: err.to_string(),
        })?;
        npy::write_matrix(&self.matrix_path(doc_id), embeddings)?;
        info!(doc = %doc_id, chunks = records.len(), "cached chunks to disk");
        Ok(())
    }

    /// Delete cache files from other versions; returns how many were removed.
    pub fn sweep_stale(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %self.dir.display(), error = %err, "cache sweep skipped");
                return 0;
            }
        };
        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_cache_file = path
                .extension()
                .is_some_and(|ext| ext == "json" || ext == "npy");
            if !is_cache_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(&self.version) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(file = %name, "removed stale cache file");
                    removed += 1;
                }
                Err(err) => warn!(file = %name, error = %err, "failed to remove stale cache file"),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passage_model::ChunkId;

    fn records(doc_id: &DocumentId, n: usize) -> Vec<PassageRecord> {
        (0..n)
            .map(|i| PassageRecord {
                chunk_id: ChunkId::for_passage(doc_id, i),
                doc_id: doc_id.clone(),
                doc_name: "Doc".into(),
                page_num: i as u32 + 1,
                section_title: "Section 1: Test".into(),
                raw_content: format!("raw content {i}"),
                contextual_content: format!("[Section 1: Test] raw content {i}"),
            })
            .collect()
    }

    #[test]
    fn entries_round_trip_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), "v1-test").unwrap();
        let doc_id = DocumentId("deadbeef00000000".into());
        let recs = records(&doc_id, 3);
        let vecs = vec![vec![0.1f32, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]];

        cache.save(&doc_id, &recs, &vecs).unwrap();
        let json_a = std::fs::read(dir.path().join("deadbeef00000000_v1-test.json")).unwrap();
        let npy_a = std::fs::read(dir.path().join("deadbeef00000000_v1-test.npy")).unwrap();

        cache.save(&doc_id, &recs, &vecs).unwrap();
        let json_b = std::fs::read(dir.path().join("deadbeef00000000_v1-test.json")).unwrap();
        let npy_b = std::fs::read(dir.path().join("deadbeef00000000_v1-test.npy")).unwrap();
        assert_eq!(json_a, json_b);
        assert_eq!(npy_a, npy_b);

        let (loaded, matrix) = cache.load(&doc_id).unwrap();
        assert_eq!(loaded, recs);
        assert_eq!(matrix, vecs);
    }

    #[test]
    fn missing_sibling_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), "v1-test").unwrap();
        let doc_id = DocumentId("deadbeef00000001".into());
        let recs = records(&doc_id, 1);
        cache.save(&doc_id, &recs, &[vec![1.0]]).unwrap();
        std::fs::remove_file(dir.path().join("deadbeef00000001_v1-test.npy")).unwrap();
        assert!(cache.load(&doc_id).is_none());
    }

    #[test]
    fn row_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), "v1-test").unwrap();
        let doc_id = DocumentId("deadbeef00000002".into());
        cache
            .save(&doc_id, &records(&doc_id, 2), &[vec![1.0], vec![2.0]])
            .unwrap();
        // Overwrite the matrix with a single-row file.
        npy::write_matrix(
            &dir.path().join("deadbeef00000002_v1-test.npy"),
            &[vec![1.0]],
        )
        .unwrap();
        assert!(cache.load(&doc_id).is_none());
    }

    #[test]
    fn sweep_removes_only_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::open(dir.path(), "v2-live").unwrap();
        let doc_id = DocumentId("deadbeef00000003".into());
        cache.save(&doc_id, &records(&doc_id, 1), &[vec![1.0]]).unwrap();
        std::fs::write(dir.path().join("deadbeef00000003_v1-old.json"), b"[]").unwrap();
        std::fs::write(dir.path().join("deadbeef00000003_v1-old.npy"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        assert_eq!(cache.sweep_stale(), 2);
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.contains("v1-old")));
        assert!(names.iter().any(|n| n == "notes.txt"));
        assert!(names.iter().filter(|n| n.contains("v2-live")).count() == 2);
    }
}
