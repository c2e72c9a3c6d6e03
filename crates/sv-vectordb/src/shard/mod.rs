//! One shard's storage: an append-only JSON-lines record log replayed into an
//! in-memory flat index.
//!
//! Every write appends full records (`id`, `vector`, `metadata`, `document`,
//! `created_at`, `updated_at`, `deleted`) to `vectors.jsonl`; the last line for
//! an id wins on replay. Deletes append a tombstone (`deleted = true`), which
//! keeps the record out of the index until [`ShardTable::compact`] drops it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use sv_core::error::{Result, VdbError};
use sv_core::types::{DistanceMetric, SearchResult, VectorRecord};
use tracing::{debug, info, warn};

use crate::index::{FlatIndex, VectorIndex};
use crate::store::{atomic_write, SHARD_LOG_FILE};

pub struct ShardTable {
    shard_id: usize,
    log_path: PathBuf,
    dimension: usize,
    inner: RwLock<ShardInner>,
}

struct ShardInner {
    /// Live records and tombstones.
    records: HashMap<String, VectorRecord>,
    /// Live records only.
    index: FlatIndex,
    log: Option<File>,
}

impl ShardInner {
    fn append(&mut self, path: &Path, records: &[VectorRecord]) -> Result<()> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        let file = match self.log.take() {
            Some(file) => file,
            None => OpenOptions::new().create(true).append(true).open(path)?,
        };
        let log = self.log.insert(file);
        let len = log.metadata()?.len();
        if let Err(e) = log.write_all(&buf).and_then(|()| log.sync_data()) {
            // Cut off whatever part of the batch made it, so the next append
            // starts on a fresh line.
            if let Err(rollback) = log.set_len(len) {
                warn!(
                    path = %path.display(),
                    error = %rollback,
                    "failed to roll back shard log"
                );
            }
            self.log = None;
            return Err(e.into());
        }
        Ok(())
    }
}

impl ShardTable {
    /// Open the shard stored in `dir`, replaying its log if one exists.
    ///
    /// A torn trailing line is cut from the file so later appends start on a
    /// line of their own.
    pub fn open(
        shard_id: usize,
        dir: &Path,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let log_path = dir.join(SHARD_LOG_FILE);
        let mut records = HashMap::new();
        if log_path.exists() {
            let complete = replay(&log_path, &mut records)?;
            if fs::metadata(&log_path)?.len() > complete {
                let log = OpenOptions::new().write(true).open(&log_path)?;
                log.set_len(complete)?;
                log.sync_all()?;
            }
        }

        let mut index = FlatIndex::with_capacity(dimension, metric, records.len());
        for record in records.values().filter(|r| !r.deleted) {
            if record.vector.len() != dimension {
                return Err(VdbError::Storage(format!(
                    "{}: record {} has dimension {}, expected {dimension}",
                    log_path.display(),
                    record.id,
                    record.vector.len()
                )));
            }
            index.insert(&record.id, &record.vector)?;
        }
        debug!(shard = shard_id, path = %log_path.display(), live = index.len(), "opened shard");

        Ok(Self {
            shard_id,
            log_path,
            dimension,
            inner: RwLock::new(ShardInner {
                records,
                index,
                log: None,
            }),
        })
    }

    /// Whether `dir` holds a shard that has been written to.
    pub fn has_data(dir: &Path) -> bool {
        dir.join(SHARD_LOG_FILE).exists()
    }

    pub fn shard_id(&self) -> usize {
        self.shard_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.upsert_batch(vec![record])
    }

    /// Insert or replace records. A replaced live record keeps its `created_at`.
    /// Nothing is written unless every vector has the shard's dimension.
    pub fn upsert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(VdbError::DimensionMismatch {
                expected: self.dimension,
                got: bad.vector.len(),
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write();
        let now = Utc::now();
        let staged: Vec<VectorRecord> = records
            .into_iter()
            .map(|mut record| {
                if let Some(existing) = inner.records.get(&record.id).filter(|r| !r.deleted) {
                    record.created_at = existing.created_at;
                }
                record.updated_at = now;
                record.deleted = false;
                record
            })
            .collect();

        inner.append(&self.log_path, &staged)?;
        for record in staged {
            inner.index.insert(&record.id, &record.vector)?;
            inner.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    /// Tombstone `id`. Returns `false` if there is no live record for it.
    pub fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.delete_many(&[id.to_string()])? == 1)
    }

    /// Tombstone every live record among `ids`; returns how many were live.
    pub fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.inner.write();
        let now = Utc::now();
        let mut tombstones: Vec<VectorRecord> = Vec::new();
        for id in ids {
            let live = inner.records.get(id).filter(|r| !r.deleted);
            if let Some(record) = live {
                if tombstones.iter().any(|t| &t.id == id) {
                    continue;
                }
                let mut tombstone = record.clone();
                tombstone.deleted = true;
                tombstone.updated_at = now;
                tombstones.push(tombstone);
            }
        }
        if tombstones.is_empty() {
            return Ok(0);
        }

        inner.append(&self.log_path, &tombstones)?;
        let removed = tombstones.len();
        for tombstone in tombstones {
            inner.index.delete(&tombstone.id);
            inner.records.insert(tombstone.id.clone(), tombstone);
        }
        Ok(removed)
    }

    /// Live record by id.
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.inner.read().records.get(id).filter(|r| !r.deleted).cloned()
    }

    /// This shard's own top-`limit` live candidates, best first.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let inner = self.inner.read();
        let hits = inner.index.search(query, limit)?;
        Ok(hits
            .iter()
            .filter_map(|(id, score)| {
                let record = inner.records.get(id).filter(|r| !r.deleted)?;
                Some(SearchResult {
                    id: record.id.clone(),
                    score,
                    metadata: record.metadata.clone(),
                    document: record.document.clone(),
                })
            })
            .collect())
    }

    pub fn live_count(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.inner.read().records.values().filter(|r| r.deleted).count()
    }

    /// Drop tombstones and rewrite the log with live records only.
    pub fn compact(&self) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.records.len();
        inner.records.retain(|_, r| !r.deleted);
        let removed = before - inner.records.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut live: Vec<&VectorRecord> = inner.records.values().collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        let mut buf = Vec::new();
        for record in live {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        inner.log = None;
        atomic_write(&self.log_path, &buf)?;
        info!(shard = self.shard_id, removed, "compacted shard log");
        Ok(removed)
    }

    /// Release the log file handle. The table stays usable and reopens it on
    /// the next write.
    pub fn close(&self) -> Result<()> {
        if let Some(file) = self.inner.write().log.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Runs `f` while holding the write lock, stalling readers.
    #[cfg(test)]
    pub(crate) fn with_write_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.write();
        f()
    }
}

/// Replays `path` into `records` and returns the byte length of its
/// newline-terminated prefix.
fn replay(path: &Path, records: &mut HashMap<String, VectorRecord>) -> Result<u64> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    let mut complete = 0u64;
    let mut lineno = 0usize;
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        lineno += 1;
        if line.last() != Some(&b'\n') {
            warn!(
                path = %path.display(),
                line = lineno,
                bytes = read,
                "dropping torn shard log tail"
            );
            break;
        }
        complete += read as u64;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<VectorRecord>(&line) {
            Ok(record) => {
                records.insert(record.id.clone(), record);
            }
            Err(e) => warn!(
                path = %path.display(),
                line = lineno,
                error = %e,
                "skipping malformed shard log entry"
            ),
        }
    }
    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sv_core::types::Metadata;
    use tempfile::TempDir;

    fn record(id: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord::new(id, vector).unwrap()
    }

    fn open(dir: &Path) -> ShardTable {
        ShardTable::open(0, dir, 3, DistanceMetric::Cosine).unwrap()
    }

    fn append_raw(dir: &Path, bytes: &[u8]) {
        let mut log = OpenOptions::new()
            .append(true)
            .open(dir.join(SHARD_LOG_FILE))
            .unwrap();
        log.write_all(bytes).unwrap();
    }

    #[test]
    fn test_log_created_on_first_write() {
        let dir = TempDir::new().unwrap();
        let shard_dir = dir.path().join("shard_0");
        let table = open(&shard_dir);
        assert!(!ShardTable::has_data(&shard_dir));
        table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        assert!(ShardTable::has_data(&shard_dir));
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_upsert_preserves_created_at() {
        let dir = TempDir::new().unwrap();
        let table = open(dir.path());
        let mut first = record("a", vec![1.0, 0.0, 0.0]);
        first.created_at = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        table.upsert(first).unwrap();
        table.upsert(record("a", vec![0.0, 1.0, 0.0])).unwrap();

        let stored = table.get("a").unwrap();
        assert_eq!(stored.created_at.timestamp(), 1_000);
        assert_eq!(stored.vector, vec![0.0, 1.0, 0.0]);
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_dimension_mismatch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let table = open(dir.path());
        let err = table
            .upsert_batch(vec![record("a", vec![1.0, 0.0, 0.0]), record("b", vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, VdbError::DimensionMismatch { expected: 3, got: 1 }));
        assert_eq!(table.live_count(), 0);
        assert!(!ShardTable::has_data(dir.path()));
    }

    #[test]
    fn test_delete_tombstones_record() {
        let dir = TempDir::new().unwrap();
        let table = open(dir.path());
        table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        table.upsert(record("b", vec![0.9, 0.1, 0.0])).unwrap();

        assert!(table.delete("a").unwrap());
        assert!(!table.delete("a").unwrap());
        assert!(!table.delete("missing").unwrap());
        assert!(table.get("a").is_none());
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.tombstone_count(), 1);

        let hits = table.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn test_readd_after_delete_revives() {
        let dir = TempDir::new().unwrap();
        let table = open(dir.path());
        table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        table.delete("a").unwrap();
        table.upsert(record("a", vec![0.0, 0.0, 1.0])).unwrap();
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.tombstone_count(), 0);
    }

    #[test]
    fn test_replay_restores_state() {
        let dir = TempDir::new().unwrap();
        {
            let table = open(dir.path());
            let meta = Metadata::from([("lang".to_string(), json!("en"))]);
            table
                .upsert(
                    record("a", vec![1.0, 0.0, 0.0])
                        .with_metadata(meta)
                        .with_document(Some("hello".into())),
                )
                .unwrap();
            table.upsert(record("b", vec![0.0, 1.0, 0.0])).unwrap();
            table.delete("b").unwrap();
            table.close().unwrap();
        }
        let table = open(dir.path());
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.tombstone_count(), 1);
        let a = table.get("a").unwrap();
        assert_eq!(a.metadata["lang"], json!("en"));
        assert_eq!(a.document.as_deref(), Some("hello"));
    }

    #[test]
    fn test_replay_skips_torn_line() {
        let dir = TempDir::new().unwrap();
        {
            let table = open(dir.path());
            table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        }
        append_raw(dir.path(), b"{\"id\":\"b\",\"vec");

        let table = open(dir.path());
        assert_eq!(table.live_count(), 1);
        assert!(table.get("a").is_some());
    }

    #[test]
    fn test_write_after_torn_tail_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let table = open(dir.path());
            table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        }
        append_raw(dir.path(), b"{\"id\":\"b\",\"vec");
        {
            let table = open(dir.path());
            table.upsert(record("c", vec![0.0, 1.0, 0.0])).unwrap();
        }

        let log = fs::read(dir.path().join(SHARD_LOG_FILE)).unwrap();
        assert_eq!(log.last(), Some(&b'\n'));
        assert_eq!(log.iter().filter(|b| **b == b'\n').count(), 2);

        let table = open(dir.path());
        assert_eq!(table.live_count(), 2);
        assert!(table.get("a").is_some());
        assert!(table.get("c").is_some());
        assert!(table.get("b").is_none());
    }

    #[test]
    fn test_replay_skips_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        {
            let table = open(dir.path());
            table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        }
        // A complete line with a broken character, then a tail torn mid-character.
        append_raw(dir.path(), b"{\"id\":\"x\",\"document\":\"caf\xC3\"}\n");
        append_raw(dir.path(), b"{\"id\":\"b\",\"document\":\"caf\xC3");
        {
            let table = open(dir.path());
            assert_eq!(table.live_count(), 1);
            table
                .upsert(record("c", vec![0.0, 0.0, 1.0]).with_document(Some("café".into())))
                .unwrap();
        }

        let table = open(dir.path());
        assert_eq!(table.live_count(), 2);
        assert!(table.get("x").is_none());
        assert_eq!(table.get("c").unwrap().document.as_deref(), Some("café"));
    }

    #[test]
    fn test_compact_drops_tombstones() {
        let dir = TempDir::new().unwrap();
        let table = open(dir.path());
        for id in ["a", "b", "c"] {
            table.upsert(record(id, vec![1.0, 0.0, 0.0])).unwrap();
        }
        table.delete_many(&["a".to_string(), "c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(table.compact().unwrap(), 2);
        assert_eq!(table.compact().unwrap(), 0);
        table.upsert(record("d", vec![0.0, 1.0, 0.0])).unwrap();

        let log = fs::read_to_string(dir.path().join(SHARD_LOG_FILE)).unwrap();
        assert_eq!(log.lines().count(), 2);

        let reopened = open(dir.path());
        assert_eq!(reopened.live_count(), 2);
        assert_eq!(reopened.tombstone_count(), 0);
    }

    #[test]
    fn test_open_rejects_wrong_dimension_on_disk() {
        let dir = TempDir::new().unwrap();
        {
            let table = open(dir.path());
            table.upsert(record("a", vec![1.0, 0.0, 0.0])).unwrap();
        }
        let result = ShardTable::open(0, dir.path(), 4, DistanceMetric::Cosine);
        assert!(matches!(result, Err(VdbError::Storage(_))));
    }
}
