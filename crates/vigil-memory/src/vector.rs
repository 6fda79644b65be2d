//! Long-term semantic memory.
//!
//! [`VectorMemory`] stores [`MemoryEntry`] records alongside their
//! embeddings and searches them by cosine distance. Maintenance passes
//! decay importance, expire TTLs, and collapse near-duplicates; entries
//! marked permanent are exempt from all three. Search is brute-force over
//! all entries, which holds up well into the tens of thousands; the
//! embedder seam makes swapping in an ANN-backed store a local change.
//!
//! The store snapshots itself to `index/memories.jsonl` after every
//! mutation. The snapshot format is an implementation detail, not a
//! stability surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use vigil_types::Result;

use crate::embed::{cosine_distance, Embedder};

/// Cosine distance below which two entries count as duplicates.
pub const DUPLICATE_THRESHOLD: f32 = 0.05;

/// Importance never decays below this floor.
pub const MIN_IMPORTANCE: f64 = 0.01;
/// Importance never rises above this ceiling.
pub const MAX_IMPORTANCE: f64 = 1.0;

/// One long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    /// Relevance weight in `[0.01, 1.0]`, decayed over time.
    pub importance_score: f64,
    /// Hours until expiry; `-1` means never.
    pub ttl_hours: i64,
    pub created_at: DateTime<Utc>,
    /// Who wrote it, e.g. `tool:web_search` or `chat:creator`.
    pub source: String,
    /// Permanent entries survive decay, pruning, and deduplication.
    #[serde(default)]
    pub permanent: bool,
    /// Set on entries written by the creator directly.
    #[serde(default)]
    pub creator: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl MemoryEntry {
    /// New entry with a random id, infinite TTL, and clamped importance.
    pub fn new(content: impl Into<String>, importance: f64, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            importance_score: importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE),
            ttl_hours: -1,
            created_at: Utc::now(),
            source: source.into(),
            permanent: false,
            creator: false,
            metadata: Map::new(),
        }
    }

    /// Builder: set a TTL in hours.
    pub fn with_ttl(mut self, hours: i64) -> Self {
        self.ttl_hours = hours;
        self
    }

    /// Builder: mark permanent (which also clears the TTL).
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self.ttl_hours = -1;
        self
    }

    /// `true` when the entry has outlived its TTL.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.permanent || self.ttl_hours <= 0 {
            return false;
        }
        let age_hours = (now - self.created_at).num_seconds() as f64 / 3600.0;
        age_hours > self.ttl_hours as f64
    }
}

/// One search result.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub id: String,
    pub content: String,
    /// Cosine distance to the query (lower = closer).
    pub distance: f32,
    pub importance_score: f64,
    pub source: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stored {
    entry: MemoryEntry,
    embedding: Vec<f32>,
}

/// Durable semantic store with decay, TTL, and dedup.
pub struct VectorMemory {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<Stored>>,
    snapshot_path: Option<PathBuf>,
}

impl VectorMemory {
    /// Open the store under `data_dir/index/`, loading any existing
    /// snapshot.
    pub fn open(data_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dir = data_dir.join("index");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("memories.jsonl");

        let mut entries = Vec::new();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            for line in raw.lines() {
                if let Ok(stored) = serde_json::from_str::<Stored>(line) {
                    entries.push(stored);
                }
            }
        }
        info!(count = entries.len(), "vector memory loaded");

        Ok(Self {
            embedder,
            entries: RwLock::new(entries),
            snapshot_path: Some(path),
        })
    }

    /// An unpersisted store for tests and ephemeral runs.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
            snapshot_path: None,
        }
    }

    /// Add an entry. With `deduplicate`, an entry whose nearest neighbor
    /// sits within [`DUPLICATE_THRESHOLD`] is merged into it instead:
    /// the existing id survives with its importance raised to the larger
    /// of the two, and `false` is returned.
    pub async fn add(&self, entry: MemoryEntry, deduplicate: bool) -> Result<bool> {
        let embedding = self.embedder.embed(&entry.content).await?;

        let mut entries = self.entries.write();
        if deduplicate && !entries.is_empty() {
            let nearest = entries
                .iter()
                .enumerate()
                .map(|(i, s)| (i, cosine_distance(&embedding, &s.embedding)))
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((index, distance)) = nearest {
                if distance < DUPLICATE_THRESHOLD {
                    let merged = entries[index]
                        .entry
                        .importance_score
                        .max(entry.importance_score)
                        .clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
                    entries[index].entry.importance_score = merged;
                    debug!(
                        existing_id = %entries[index].entry.id,
                        distance,
                        "near-duplicate merged"
                    );
                    self.persist(&entries)?;
                    return Ok(false);
                }
            }
        }

        entries.push(Stored { entry, embedding });
        self.persist(&entries)?;
        Ok(true)
    }

    /// Top-`n` entries by cosine distance to `query`. Empty when the
    /// store is empty.
    pub async fn search(&self, query: &str, n: usize) -> Result<Vec<MemoryHit>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed(query).await?;

        let entries = self.entries.read();
        let mut hits: Vec<MemoryHit> = entries
            .iter()
            .map(|s| MemoryHit {
                id: s.entry.id.clone(),
                content: s.entry.content.clone(),
                distance: cosine_distance(&query_embedding, &s.embedding),
                importance_score: s.entry.importance_score,
                source: s.entry.source.clone(),
                metadata: s.entry.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n);
        Ok(hits)
    }

    /// Mark an entry permanent (and clear its TTL). Returns `false` when
    /// the id is unknown.
    pub fn mark_permanent(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        let Some(index) = entries.iter().position(|s| s.entry.id == id) else {
            return Ok(false);
        };
        entries[index].entry.permanent = true;
        entries[index].entry.ttl_hours = -1;
        self.persist(&entries)?;
        Ok(true)
    }

    /// Multiply every non-permanent importance by `factor`, flooring at
    /// [`MIN_IMPORTANCE`].
    pub fn decay_importance(&self, factor: f64) -> Result<()> {
        let mut entries = self.entries.write();
        for stored in entries.iter_mut() {
            if stored.entry.permanent {
                continue;
            }
            stored.entry.importance_score =
                (stored.entry.importance_score * factor).max(MIN_IMPORTANCE);
        }
        self.persist(&entries)?;
        Ok(())
    }

    /// Delete non-permanent entries past their TTL. Returns the count.
    pub fn prune_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|s| !s.entry.is_expired(now));
        let pruned = before - entries.len();
        if pruned > 0 {
            info!(pruned, "expired memories removed");
            self.persist(&entries)?;
        }
        Ok(pruned)
    }

    /// Full dedup pass: for each entry, look at its 5 nearest neighbors
    /// and collapse any pair within the threshold, keeping the
    /// higher-importance survivor. Permanent entries are never the
    /// victim. Running it twice on a stable store removes nothing the
    /// second time.
    pub fn deduplicate(&self) -> Result<usize> {
        let mut entries = self.entries.write();
        if entries.len() < 2 {
            return Ok(0);
        }

        let mut doomed: Vec<usize> = Vec::new();
        for i in 0..entries.len() {
            if doomed.contains(&i) {
                continue;
            }
            // 5 nearest other entries.
            let mut neighbors: Vec<(usize, f32)> = (0..entries.len())
                .filter(|j| *j != i && !doomed.contains(j))
                .map(|j| {
                    (
                        j,
                        cosine_distance(&entries[i].embedding, &entries[j].embedding),
                    )
                })
                .collect();
            neighbors.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            neighbors.truncate(5);

            for (j, distance) in neighbors {
                if distance >= DUPLICATE_THRESHOLD {
                    break;
                }
                let (keep, victim) = if entries[i].entry.importance_score
                    >= entries[j].entry.importance_score
                {
                    (i, j)
                } else {
                    (j, i)
                };
                // A permanent entry is never deleted; spare the pair when
                // both are permanent.
                let victim = if entries[victim].entry.permanent {
                    if entries[keep].entry.permanent {
                        continue;
                    }
                    keep
                } else {
                    victim
                };
                if !doomed.contains(&victim) {
                    doomed.push(victim);
                }
                if victim == i {
                    break;
                }
            }
        }

        let removed = doomed.len();
        if removed > 0 {
            doomed.sort_unstable();
            for idx in doomed.into_iter().rev() {
                entries.remove(idx);
            }
            info!(removed, "near-duplicate memories collapsed");
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Delete one entry by id.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|s| s.entry.id != id);
        let deleted = entries.len() < before;
        if deleted {
            self.persist(&entries)?;
        }
        Ok(deleted)
    }

    /// Delete everything. Returns the count.
    pub fn flush_all(&self) -> Result<usize> {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        self.persist(&entries)?;
        info!(count, "vector memory flushed");
        Ok(count)
    }

    /// Delete everything not marked permanent. Returns the count.
    pub fn flush_non_permanent(&self) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|s| s.entry.permanent);
        let removed = before - entries.len();
        self.persist(&entries)?;
        info!(removed, "non-permanent memories flushed");
        Ok(removed)
    }

    /// Entries for browsing, sorted by importance descending.
    pub fn get_all(&self, limit: usize, offset: usize) -> Vec<MemoryEntry> {
        let entries = self.entries.read();
        let mut all: Vec<MemoryEntry> = entries.iter().map(|s| s.entry.clone()).collect();
        all.sort_by(|a, b| {
            b.importance_score
                .partial_cmp(&a.importance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        all.into_iter().skip(offset).take(limit).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Rewrite the snapshot. Called with the write lock held so the file
    /// always matches some consistent in-memory state.
    fn persist(&self, entries: &[Stored]) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let mut content = String::new();
        for stored in entries {
            content.push_str(&serde_json::to_string(stored)?);
            content.push('\n');
        }
        let tmp = path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Test embedder with preset vectors per text, so cosine distances
    /// can be dialed in exactly.
    struct StubEmbedder {
        vectors: Mutex<HashMap<String, Vec<f32>>>,
    }

    impl StubEmbedder {
        fn new(pairs: &[(&str, Vec<f32>)]) -> Arc<Self> {
            Arc::new(Self {
                vectors: Mutex::new(
                    pairs
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn dimension(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self
                .vectors
                .lock()
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0, 0.0]))
        }
    }

    /// A unit vector at cosine distance `d` from `[1, 0]`.
    fn at_distance(d: f32) -> Vec<f32> {
        let cos = 1.0 - d;
        let sin = (1.0 - cos * cos).max(0.0).sqrt();
        vec![cos, sin]
    }

    fn hash_store() -> VectorMemory {
        VectorMemory::in_memory(Arc::new(HashEmbedder::default()))
    }

    #[tokio::test]
    async fn add_and_search() {
        let store = hash_store();
        store
            .add(
                MemoryEntry::new("the budget is healthy today", 0.5, "test"),
                false,
            )
            .await
            .unwrap();
        store
            .add(
                MemoryEntry::new("wrote a new skill for telegram", 0.5, "test"),
                false,
            )
            .await
            .unwrap();

        let hits = store.search("budget healthy", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("budget"));
    }

    #[tokio::test]
    async fn search_empty_store_is_empty() {
        let store = hash_store();
        assert!(store.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn importance_clamped_on_creation() {
        let e = MemoryEntry::new("x", 5.0, "test");
        assert_eq!(e.importance_score, MAX_IMPORTANCE);
        let e = MemoryEntry::new("x", -1.0, "test");
        assert_eq!(e.importance_score, MIN_IMPORTANCE);
    }

    // ── dedup-on-add boundary ──────────────────────────────────────────

    #[tokio::test]
    async fn neighbor_at_0_049_merges() {
        let embedder = StubEmbedder::new(&[
            ("original", vec![1.0, 0.0]),
            ("near dup", at_distance(0.049)),
        ]);
        let store = VectorMemory::in_memory(embedder);
        store
            .add(MemoryEntry::new("original", 0.4, "test"), true)
            .await
            .unwrap();

        let inserted = store
            .add(MemoryEntry::new("near dup", 0.8, "test"), true)
            .await
            .unwrap();
        assert!(!inserted, "0.049 is inside the duplicate threshold");
        assert_eq!(store.len(), 1);
        // Survivor keeps the existing id but takes the higher importance.
        let all = store.get_all(10, 0);
        assert_eq!(all[0].content, "original");
        assert!((all[0].importance_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn neighbor_at_0_051_inserts() {
        let embedder = StubEmbedder::new(&[
            ("original", vec![1.0, 0.0]),
            ("nearby but distinct", at_distance(0.051)),
        ]);
        let store = VectorMemory::in_memory(embedder);
        store
            .add(MemoryEntry::new("original", 0.4, "test"), true)
            .await
            .unwrap();

        let inserted = store
            .add(MemoryEntry::new("nearby but distinct", 0.8, "test"), true)
            .await
            .unwrap();
        assert!(inserted, "0.051 is outside the duplicate threshold");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn merge_does_not_lower_importance() {
        let embedder = StubEmbedder::new(&[
            ("original", vec![1.0, 0.0]),
            ("dup", at_distance(0.01)),
        ]);
        let store = VectorMemory::in_memory(embedder);
        store
            .add(MemoryEntry::new("original", 0.9, "test"), true)
            .await
            .unwrap();
        store
            .add(MemoryEntry::new("dup", 0.2, "test"), true)
            .await
            .unwrap();
        assert!((store.get_all(1, 0)[0].importance_score - 0.9).abs() < 1e-9);
    }

    // ── decay / prune / permanence ─────────────────────────────────────

    #[tokio::test]
    async fn decay_floors_at_minimum() {
        let store = hash_store();
        store
            .add(MemoryEntry::new("fading memory", 0.02, "test"), false)
            .await
            .unwrap();
        store.decay_importance(0.5).unwrap();
        store.decay_importance(0.5).unwrap();
        let all = store.get_all(10, 0);
        assert_eq!(all[0].importance_score, MIN_IMPORTANCE);
    }

    #[tokio::test]
    async fn permanent_entries_skip_decay() {
        let store = hash_store();
        store
            .add(
                MemoryEntry::new("creator said keep this", 0.9, "chat:creator").permanent(),
                false,
            )
            .await
            .unwrap();
        store.decay_importance(0.1).unwrap();
        assert!((store.get_all(1, 0)[0].importance_score - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn prune_removes_expired_only() {
        let store = hash_store();
        let mut old = MemoryEntry::new("stale news", 0.5, "test").with_ttl(1);
        old.created_at = Utc::now() - chrono::Duration::hours(3);
        store.add(old, false).await.unwrap();
        store
            .add(MemoryEntry::new("fresh note", 0.5, "test").with_ttl(24), false)
            .await
            .unwrap();
        store
            .add(MemoryEntry::new("timeless", 0.5, "test"), false)
            .await
            .unwrap();

        let pruned = store.prune_expired().unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn permanent_survives_prune_despite_age() {
        let store = hash_store();
        let mut entry = MemoryEntry::new("ancient but permanent", 0.5, "test").permanent();
        entry.created_at = Utc::now() - chrono::Duration::days(365);
        store.add(entry, false).await.unwrap();
        assert_eq!(store.prune_expired().unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn mark_permanent_clears_ttl() {
        let store = hash_store();
        store
            .add(MemoryEntry::new("promote me", 0.5, "test").with_ttl(2), false)
            .await
            .unwrap();
        let id = store.get_all(1, 0)[0].id.clone();
        assert!(store.mark_permanent(&id).unwrap());
        let entry = &store.get_all(1, 0)[0];
        assert!(entry.permanent);
        assert_eq!(entry.ttl_hours, -1);
        assert!(!store.mark_permanent("no-such-id").unwrap());
    }

    // ── full dedup pass ────────────────────────────────────────────────

    #[tokio::test]
    async fn deduplicate_keeps_higher_importance() {
        let embedder = StubEmbedder::new(&[
            ("weak copy", vec![1.0, 0.0]),
            ("strong copy", at_distance(0.01)),
            ("unrelated", vec![0.0, 1.0]),
        ]);
        let store = VectorMemory::in_memory(embedder);
        store
            .add(MemoryEntry::new("weak copy", 0.3, "test"), false)
            .await
            .unwrap();
        store
            .add(MemoryEntry::new("strong copy", 0.8, "test"), false)
            .await
            .unwrap();
        store
            .add(MemoryEntry::new("unrelated", 0.5, "test"), false)
            .await
            .unwrap();

        let removed = store.deduplicate().unwrap();
        assert_eq!(removed, 1);
        let contents: Vec<String> = store.get_all(10, 0).into_iter().map(|e| e.content).collect();
        assert!(contents.contains(&"strong copy".to_string()));
        assert!(contents.contains(&"unrelated".to_string()));
        assert!(!contents.contains(&"weak copy".to_string()));
    }

    #[tokio::test]
    async fn deduplicate_twice_second_pass_removes_nothing() {
        let embedder = StubEmbedder::new(&[
            ("a", vec![1.0, 0.0]),
            ("b", at_distance(0.02)),
            ("c", at_distance(0.03)),
        ]);
        let store = VectorMemory::in_memory(embedder);
        for (text, score) in [("a", 0.9), ("b", 0.5), ("c", 0.4)] {
            store
                .add(MemoryEntry::new(text, score, "test"), false)
                .await
                .unwrap();
        }
        let first = store.deduplicate().unwrap();
        assert!(first > 0);
        assert_eq!(store.deduplicate().unwrap(), 0);
    }

    #[tokio::test]
    async fn deduplicate_never_deletes_permanent() {
        let embedder = StubEmbedder::new(&[
            ("permanent original", vec![1.0, 0.0]),
            ("disposable copy", at_distance(0.01)),
        ]);
        let store = VectorMemory::in_memory(embedder);
        store
            .add(
                MemoryEntry::new("permanent original", 0.1, "test").permanent(),
                false,
            )
            .await
            .unwrap();
        store
            .add(MemoryEntry::new("disposable copy", 0.9, "test"), false)
            .await
            .unwrap();

        store.deduplicate().unwrap();
        let remaining = store.get_all(10, 0);
        assert_eq!(remaining.len(), 1);
        // The permanent entry survives even though its importance is lower.
        assert_eq!(remaining[0].content, "permanent original");
    }

    // ── flush / browse / persistence ───────────────────────────────────

    #[tokio::test]
    async fn flush_non_permanent_spares_permanent() {
        let store = hash_store();
        store
            .add(MemoryEntry::new("keep forever", 0.5, "test").permanent(), false)
            .await
            .unwrap();
        store
            .add(MemoryEntry::new("disposable", 0.5, "test"), false)
            .await
            .unwrap();
        let removed = store.flush_non_permanent().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get_all(10, 0)[0].content, "keep forever");

        assert_eq!(store.flush_all().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_all_sorts_by_importance_with_pagination() {
        let store = hash_store();
        for (content, score) in [("low note", 0.2), ("high note", 0.9), ("mid note", 0.5)] {
            store
                .add(MemoryEntry::new(content, score, "test"), false)
                .await
                .unwrap();
        }
        let page = store.get_all(2, 0);
        assert_eq!(page[0].content, "high note");
        assert_eq!(page[1].content, "mid note");
        let rest = store.get_all(2, 2);
        assert_eq!(rest[0].content, "low note");
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        {
            let store = VectorMemory::open(dir.path(), embedder.clone()).unwrap();
            store
                .add(MemoryEntry::new("durable fact", 0.7, "test"), false)
                .await
                .unwrap();
        }
        let store = VectorMemory::open(dir.path(), embedder).unwrap();
        assert_eq!(store.len(), 1);
        let hits = store.search("durable fact", 1).await.unwrap();
        assert_eq!(hits[0].content, "durable fact");
    }

    #[tokio::test]
    async fn delete_by_id() {
        let store = hash_store();
        store
            .add(MemoryEntry::new("to delete", 0.5, "test"), false)
            .await
            .unwrap();
        let id = store.get_all(1, 0)[0].id.clone();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.is_empty());
    }
}
