use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::EmbeddingClient;
use atelier_core::types::ReflectionRecord;

use crate::index::FlatIndex;

/// One entry in the persisted snapshot file.
#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    reflection: ReflectionRecord,
    embedding: Vec<f32>,
}

struct StoreInner {
    /// Records in append order; parallel to the index entries.
    records: Vec<ReflectionRecord>,
    by_id: HashMap<String, usize>,
    index: FlatIndex,
}

/// Durable store of reflection records with similarity retrieval.
///
/// Append-only at the API level: records are immutable and never
/// deleted, though the backing snapshot file is fully rewritten on each
/// save. The in-memory map and index are guarded together by one
/// `RwLock` — `save` takes the write lock, `get`/`query` share a read
/// lock so independent queries do not block each other. Embedding
/// computation happens outside the lock.
pub struct ReflectionStore {
    path: PathBuf,
    embedder: Arc<dyn EmbeddingClient>,
    inner: RwLock<StoreInner>,
}

impl std::fmt::Debug for ReflectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ReflectionStore {
    /// Open a store backed by the snapshot at `path`, rebuilding the
    /// index in one batch. A missing file yields an empty store; a
    /// structurally invalid snapshot or an embedding whose length
    /// disagrees with the first-loaded record fails with
    /// [`AtelierError::CorruptStore`].
    pub fn open(path: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingClient>) -> Result<Self> {
        let path = path.into();
        let mut inner = StoreInner {
            records: Vec::new(),
            by_id: HashMap::new(),
            index: FlatIndex::new(),
        };

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let entries: Vec<SnapshotEntry> = serde_json::from_str(&raw)
                .map_err(|e| AtelierError::CorruptStore(format!("invalid snapshot: {}", e)))?;

            for entry in entries {
                inner.index.insert(entry.reflection.id.clone(), entry.embedding)?;
                inner
                    .by_id
                    .insert(entry.reflection.id.clone(), inner.records.len());
                inner.records.push(entry.reflection);
            }
            debug!(path = %path.display(), records = inner.records.len(), "reflection store loaded");
        } else {
            debug!(path = %path.display(), "no snapshot file, starting empty");
        }

        Ok(Self {
            path,
            embedder,
            inner: RwLock::new(inner),
        })
    }

    /// Persist a record, returning the store-assigned id.
    ///
    /// Any caller-supplied id is discarded: ids are purely
    /// store-generated. The embedding is computed from the reflection
    /// narrative, inserted incrementally into the index, and the entire
    /// snapshot is rewritten with all records currently held.
    pub async fn save(&self, record: ReflectionRecord) -> Result<String> {
        let embedding = self.embedder.embed(&record.reflection).await?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| AtelierError::CorruptStore("store lock poisoned".into()))?;

        if let Some(dim) = inner.index.dim() {
            if embedding.len() != dim {
                return Err(AtelierError::CorruptStore(format!(
                    "embedding dimensionality mismatch: expected {}, got {}",
                    dim,
                    embedding.len()
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        let mut record = record;
        record.id = id.clone();

        inner.index.insert(id.clone(), embedding)?;
        let idx = inner.records.len();
        inner.by_id.insert(id.clone(), idx);
        inner.records.push(record);

        self.write_snapshot(&inner)?;
        debug!(id = %id, records = inner.records.len(), "reflection saved");
        Ok(id)
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<ReflectionRecord> {
        match self.inner.read() {
            Ok(inner) => inner.by_id.get(id).map(|&i| inner.records[i].clone()),
            Err(_) => {
                warn!("store lock poisoned during get");
                None
            }
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the `k` records most similar to `text`, by ascending
    /// Euclidean distance. An empty store yields an empty result; a
    /// failure inside the similarity search degrades to an empty result
    /// with a warning rather than failing the caller.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ReflectionRecord>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;

        let inner = self
            .inner
            .read()
            .map_err(|_| AtelierError::CorruptStore("store lock poisoned".into()))?;

        match inner.index.search(&query_embedding, k) {
            Ok(hits) => Ok(hits
                .into_iter()
                .filter_map(|(id, _)| inner.by_id.get(&id).map(|&i| inner.records[i].clone()))
                .collect()),
            Err(e) => {
                warn!(error = %e, "reflection similarity search failed, returning no matches");
                Ok(Vec::new())
            }
        }
    }

    /// Rewrite the full snapshot. O(total records) per save.
    fn write_snapshot(&self, inner: &StoreInner) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries: Vec<SnapshotEntry> = inner
            .records
            .iter()
            .zip(inner.index.entries())
            .map(|(record, (_, embedding))| SnapshotEntry {
                reflection: record.clone(),
                embedding: embedding.clone(),
            })
            .collect();

        let json = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Path of the backing snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::types::Judgement;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: folds bytes into a fixed-length vector.
    struct StubEmbedder {
        dim: usize,
    }

    impl EmbeddingClient for StubEmbedder {
        fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>>> {
            let mut v = vec![0.0f32; self.dim];
            for (i, b) in text.bytes().enumerate() {
                v[i % self.dim] += b as f32 / 255.0;
            }
            Box::pin(async move { Ok(v) })
        }
    }

    /// Embedder whose vector length changes after the first call.
    struct ShrinkingEmbedder {
        calls: AtomicUsize,
    }

    impl EmbeddingClient for ShrinkingEmbedder {
        fn embed(&self, _text: &str) -> BoxFuture<'_, Result<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let dim = if call == 0 { 3 } else { 2 };
            Box::pin(async move { Ok(vec![0.5f32; dim]) })
        }
    }

    fn record(task: &str, reflection: &str) -> ReflectionRecord {
        ReflectionRecord::new(
            task,
            reflection,
            Judgement {
                needs_retry: false,
                confidence: 0.9,
                reasons: vec!["looked complete".into()],
            },
        )
    }

    fn snapshot_ids(path: &Path) -> Vec<String> {
        let raw = std::fs::read_to_string(path).unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        entries
            .iter()
            .map(|e| e["reflection"]["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReflectionStore::open(
            dir.path().join("absent.json"),
            Arc::new(StubEmbedder { dim: 4 }),
        )
        .unwrap();
        assert!(store.is_empty());
        assert!(store.query("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflections.json");
        let embedder = Arc::new(StubEmbedder { dim: 4 });

        let store = ReflectionStore::open(&path, embedder.clone()).unwrap();
        let id1 = store.save(record("task a", "went fine")).await.unwrap();
        let id2 = store.save(record("task b", "missed a step")).await.unwrap();

        let reloaded = ReflectionStore::open(&path, embedder).unwrap();
        assert_eq!(reloaded.len(), 2);

        let r1 = reloaded.get(&id1).unwrap();
        assert_eq!(r1.task, "task a");
        assert_eq!(r1.judgement.confidence, 0.9);
        let r2 = reloaded.get(&id2).unwrap();
        assert!(r2.judgement.reasons.len() == 1);

        // Embedding vectors survive the round trip byte-for-byte
        let raw = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["embedding"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_caller_supplied_id_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReflectionStore::open(
            dir.path().join("reflections.json"),
            Arc::new(StubEmbedder { dim: 4 }),
        )
        .unwrap();

        let mut rec = record("task", "note");
        rec.id = "caller-chosen".to_string();
        let assigned = store.save(rec).await.unwrap();

        assert_ne!(assigned, "caller-chosen");
        assert!(store.get("caller-chosen").is_none());
        assert!(store.get(&assigned).is_some());
    }

    #[tokio::test]
    async fn test_get_miss_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReflectionStore::open(
            dir.path().join("reflections.json"),
            Arc::new(StubEmbedder { dim: 4 }),
        )
        .unwrap();
        assert!(store.get("nope").is_none());
    }

    #[tokio::test]
    async fn test_query_k_larger_than_count_returns_all_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReflectionStore::open(
            dir.path().join("reflections.json"),
            Arc::new(StubEmbedder { dim: 8 }),
        )
        .unwrap();

        store.save(record("t1", "alpha")).await.unwrap();
        store.save(record("t2", "beta")).await.unwrap();
        store.save(record("t3", "gamma")).await.unwrap();

        let hits = store.query("alpha", 50).await.unwrap();
        assert_eq!(hits.len(), 3);
        // The exact-match narrative must be the nearest neighbor
        assert_eq!(hits[0].reflection, "alpha");
    }

    #[tokio::test]
    async fn test_second_save_snapshot_is_superset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflections.json");
        let store =
            ReflectionStore::open(&path, Arc::new(StubEmbedder { dim: 4 })).unwrap();

        store.save(record("t1", "one")).await.unwrap();
        let ids_after_first = snapshot_ids(&path);

        store.save(record("t2", "two")).await.unwrap();
        let ids_after_second = snapshot_ids(&path);

        assert_eq!(ids_after_first.len(), 1);
        assert_eq!(ids_after_second.len(), 2);
        for id in &ids_after_first {
            assert!(ids_after_second.contains(id));
        }
    }

    #[tokio::test]
    async fn test_dimensionality_mismatch_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflections.json");
        let store = ReflectionStore::open(
            &path,
            Arc::new(ShrinkingEmbedder {
                calls: AtomicUsize::new(0),
            }),
        )
        .unwrap();

        // First save establishes 3 dimensions; the second produces 2.
        store.save(record("t1", "one")).await.unwrap();
        let err = store.save(record("t2", "two")).await.unwrap_err();
        assert!(matches!(err, AtelierError::CorruptStore(_)));

        // Failed save must not corrupt the store
        assert_eq!(store.len(), 1);
        assert_eq!(snapshot_ids(&path).len(), 1);
    }

    #[tokio::test]
    async fn test_dimensionality_mismatch_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflections.json");
        let rec = record("t", "n");
        let entries = serde_json::json!([
            { "reflection": { "id": "a", "task": rec.task, "reflection": rec.reflection,
                "judgement": rec.judgement, "created_at": rec.created_at }, "embedding": [0.1, 0.2, 0.3] },
            { "reflection": { "id": "b", "task": rec.task, "reflection": rec.reflection,
                "judgement": rec.judgement, "created_at": rec.created_at }, "embedding": [0.1, 0.2] }
        ]);
        std::fs::write(&path, entries.to_string()).unwrap();

        let err =
            ReflectionStore::open(&path, Arc::new(StubEmbedder { dim: 3 })).unwrap_err();
        assert!(matches!(err, AtelierError::CorruptStore(_)));
    }

    #[tokio::test]
    async fn test_invalid_snapshot_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reflections.json");
        std::fs::write(&path, "{ not a snapshot").unwrap();

        let err =
            ReflectionStore::open(&path, Arc::new(StubEmbedder { dim: 3 })).unwrap_err();
        assert!(matches!(err, AtelierError::CorruptStore(_)));
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReflectionStore::open(
            dir.path().join("reflections.json"),
            Arc::new(ShrinkingEmbedder {
                calls: AtomicUsize::new(0),
            }),
        )
        .unwrap();

        store.save(record("t1", "one")).await.unwrap();
        // Query embedding now comes back 2-dimensional; the index holds
        // 3-dimensional vectors, the search fails, and the failure is
        // swallowed into an empty result.
        let hits = store.query("anything", 3).await.unwrap();
        assert!(hits.is_empty());
    }
}
