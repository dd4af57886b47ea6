//! The authoritative library → document → chunk store.
//!
//! All state lives in one [`StoreState`] behind a single `RwLock`. Every
//! mutation takes the write lock, updates the record maps, updates the owning
//! library's indices, and (when a data directory is configured) rewrites the
//! snapshot before releasing the lock. Reads and searches take the read lock
//! and copy data out; no caller ever holds a reference into the store.
//!
//! Internal helpers operate on `&mut StoreState` and never lock, so an
//! operation that composes several steps (cascade delete, re-index after an
//! update) runs entirely inside the one critical section it started with.

use crate::config::{IndexKind, StoreConfig, MAX_PAGE_LIMIT};
use crate::embedding::{embed_checked, EmbeddingProvider};
use crate::error::{EntityKind, Error, Result};
use crate::index::{
    build_index, validate_vector, GridIndex, InvertedIndex, Retraction, TrainReport, VectorIndex,
};
use crate::model::{
    new_id, Chunk, ChunkUpdate, Document, DocumentUpdate, DocumentWithChunks, Library,
    LibraryUpdate, LibraryWithDocuments, Metadata, CHUNK_PREFIX, DOCUMENT_PREFIX, LIBRARY_PREFIX,
};
use crate::search::orchestrator::HybridSearchOrchestrator;
use crate::search::{SearchHit, SearchOptions};
use crate::storage::persistence::{self, Snapshot, SnapshotRef};
use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One library's index strategy plus its auxiliary candidate filters.
#[derive(Debug)]
pub(crate) struct LibraryIndexes {
    pub(crate) strategy: Box<dyn VectorIndex>,
    pub(crate) grid: GridIndex,
    pub(crate) inverted: InvertedIndex,
}

impl LibraryIndexes {
    fn new(config: &StoreConfig) -> Self {
        Self {
            strategy: build_index(&config.index),
            grid: GridIndex::new(config.grid_bin_size),
            inverted: InvertedIndex::new(),
        }
    }

    fn insert(&mut self, chunk: &Chunk) -> Result<()> {
        self.strategy.add_vector(&chunk.embedding, &chunk.id)?;
        self.grid.add(&chunk.id, &chunk.embedding);
        self.inverted.add(&chunk.id, &chunk.content);
        Ok(())
    }
}

/// Record maps, parent → child lookups, and per-library indices.
///
/// Entity maps keep insertion order; that order is the search tie-break and
/// the order of every listing.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) libraries: IndexMap<String, Library>,
    pub(crate) documents: IndexMap<String, Document>,
    pub(crate) chunks: IndexMap<String, Chunk>,
    pub(crate) library_documents: HashMap<String, IndexSet<String>>,
    pub(crate) document_chunks: HashMap<String, IndexSet<String>>,
    pub(crate) library_chunks: HashMap<String, IndexSet<String>>,
    pub(crate) indexes: HashMap<String, LibraryIndexes>,
}

impl StoreState {
    /// Build state from a snapshot, dropping records that break referential
    /// integrity or dimension uniformity, then rebuild every index.
    fn from_snapshot(snapshot: Snapshot, config: &StoreConfig) -> Result<Self> {
        let mut state = StoreState::default();

        for (_, library) in snapshot.libraries {
            state.insert_library_record(library);
        }

        for (_, document) in snapshot.documents {
            if !state.libraries.contains_key(&document.library_id) {
                tracing::warn!(
                    "Dropping document {} from snapshot: library {} does not exist",
                    document.id,
                    document.library_id
                );
                continue;
            }
            state.insert_document_record(document);
        }

        for (_, chunk) in snapshot.chunks {
            let parent_ok = state
                .documents
                .get(&chunk.document_id)
                .is_some_and(|d| d.library_id == chunk.library_id);
            if !parent_ok {
                tracing::warn!(
                    "Dropping chunk {} from snapshot: document {} missing or in another library",
                    chunk.id,
                    chunk.document_id
                );
                continue;
            }
            if let Err(e) = validate_vector(&chunk.embedding) {
                tracing::warn!("Dropping chunk {} from snapshot: {}", chunk.id, e);
                continue;
            }
            if let Some(expected) = state.library_dimension(&chunk.library_id, None) {
                if expected != chunk.embedding.len() {
                    tracing::warn!(
                        "Dropping chunk {} from snapshot: dimension {} in a library of dimension {}",
                        chunk.id,
                        chunk.embedding.len(),
                        expected
                    );
                    continue;
                }
            }
            state.insert_chunk_record(chunk);
        }

        state.reindex_all(config)?;
        Ok(state)
    }

    fn snapshot_ref(&self) -> SnapshotRef<'_> {
        SnapshotRef {
            libraries: &self.libraries,
            documents: &self.documents,
            chunks: &self.chunks,
        }
    }

    fn insert_library_record(&mut self, library: Library) {
        self.library_documents
            .insert(library.id.clone(), IndexSet::new());
        self.library_chunks.insert(library.id.clone(), IndexSet::new());
        self.libraries.insert(library.id.clone(), library);
    }

    fn insert_document_record(&mut self, document: Document) {
        self.library_documents
            .entry(document.library_id.clone())
            .or_default()
            .insert(document.id.clone());
        self.document_chunks
            .insert(document.id.clone(), IndexSet::new());
        self.documents.insert(document.id.clone(), document);
    }

    fn insert_chunk_record(&mut self, chunk: Chunk) {
        self.document_chunks
            .entry(chunk.document_id.clone())
            .or_default()
            .insert(chunk.id.clone());
        self.library_chunks
            .entry(chunk.library_id.clone())
            .or_default()
            .insert(chunk.id.clone());
        self.chunks.insert(chunk.id.clone(), chunk);
    }

    /// Embedding dimension of the library: that of its chunks, ignoring
    /// `excluding`. `None` while the library holds no (other) chunks.
    pub(crate) fn library_dimension(&self, library_id: &str, excluding: Option<&str>) -> Option<usize> {
        self.library_chunks
            .get(library_id)?
            .iter()
            .filter(|id| Some(id.as_str()) != excluding)
            .find_map(|id| self.chunks.get(id))
            .map(|c| c.embedding.len())
    }

    fn library_is_empty(&self, library_id: &str) -> bool {
        self.library_chunks
            .get(library_id)
            .map_or(true, IndexSet::is_empty)
    }

    /// Rebuild one library's indices from its chunks (O(n) replay, then train).
    fn reindex_library(
        &mut self,
        library_id: &str,
        config: &StoreConfig,
    ) -> Result<Option<TrainReport>> {
        let mut indexes = LibraryIndexes::new(config);
        if let Some(ids) = self.library_chunks.get(library_id) {
            for id in ids {
                if let Some(chunk) = self.chunks.get(id) {
                    indexes.insert(chunk)?;
                }
            }
        }
        let report = if indexes.strategy.is_empty() {
            None
        } else {
            indexes.strategy.train()?
        };
        self.indexes.insert(library_id.to_string(), indexes);
        Ok(report)
    }

    /// Rebuild every library's indices. Returns the number of chunks replayed.
    fn reindex_all(&mut self, config: &StoreConfig) -> Result<usize> {
        self.indexes.clear();
        let library_ids: Vec<String> = self.libraries.keys().cloned().collect();
        for id in &library_ids {
            self.reindex_library(id, config)?;
        }
        Ok(self.chunks.len())
    }

    /// Index a freshly created chunk. An empty library gets fresh indices
    /// first, so it can adopt a new dimension.
    fn index_new_chunk(&mut self, chunk: &Chunk, config: &StoreConfig) -> Result<()> {
        if self.library_is_empty(&chunk.library_id) {
            self.indexes
                .insert(chunk.library_id.clone(), LibraryIndexes::new(config));
        }
        self.indexes
            .entry(chunk.library_id.clone())
            .or_insert_with(|| LibraryIndexes::new(config))
            .insert(chunk)
    }

    /// Replace the indexed copy of an updated chunk.
    fn reindex_chunk(&mut self, chunk: &Chunk, config: &StoreConfig) -> Result<()> {
        let Some(indexes) = self.indexes.get_mut(&chunk.library_id) else {
            return self.reindex_library(&chunk.library_id, config).map(|_| ());
        };
        indexes.grid.add(&chunk.id, &chunk.embedding);
        indexes.inverted.add(&chunk.id, &chunk.content);

        let ids = HashSet::from([chunk.id.clone()]);
        match indexes.strategy.retract(&ids) {
            Retraction::NeedsRebuild => {
                self.reindex_library(&chunk.library_id, config)?;
            }
            Retraction::Applied => {
                // A lone chunk may change dimension; the old index cannot take it
                if let Err(e) = indexes.strategy.add_vector(&chunk.embedding, &chunk.id) {
                    tracing::debug!("Rebuilding indices of {}: {}", chunk.library_id, e);
                    self.reindex_library(&chunk.library_id, config)?;
                }
            }
        }
        Ok(())
    }

    /// Remove chunk records and retract them from their library's indices.
    fn remove_chunks(
        &mut self,
        library_id: &str,
        ids: &HashSet<String>,
        config: &StoreConfig,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let parents: HashSet<String> = ids
            .iter()
            .filter_map(|id| self.chunks.get(id))
            .map(|c| c.document_id.clone())
            .collect();
        for doc_id in &parents {
            if let Some(set) = self.document_chunks.get_mut(doc_id) {
                set.retain(|id| !ids.contains(id));
            }
        }
        if let Some(set) = self.library_chunks.get_mut(library_id) {
            set.retain(|id| !ids.contains(id));
        }
        self.chunks.retain(|id, _| !ids.contains(id));

        if self.library_is_empty(library_id) {
            self.indexes
                .insert(library_id.to_string(), LibraryIndexes::new(config));
            return Ok(());
        }
        let Some(indexes) = self.indexes.get_mut(library_id) else {
            return Ok(());
        };
        for id in ids {
            indexes.grid.remove(id);
            indexes.inverted.remove(id);
        }
        if indexes.strategy.retract(ids) == Retraction::NeedsRebuild {
            tracing::debug!(
                "Index of library {} cannot retract, rebuilding from {} chunks",
                library_id,
                self.library_chunks.get(library_id).map_or(0, IndexSet::len)
            );
            self.reindex_library(library_id, config)?;
        }
        Ok(())
    }

    fn document_with_chunks(&self, document: &Document) -> DocumentWithChunks {
        let chunks = self
            .document_chunks
            .get(&document.id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.chunks.get(id))
            .cloned()
            .collect();
        DocumentWithChunks {
            document: document.clone(),
            chunks,
        }
    }
}

/// Counts reported by [`Store::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub libraries: usize,
    pub documents: usize,
    pub chunks: usize,
    /// Live vectors across all library indices.
    pub indexed_vectors: usize,
    /// Soft-deleted vectors awaiting `compact_indices`.
    pub tombstoned_vectors: usize,
    pub index: &'static str,
}

/// Thread-safe store handle. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl Store {
    /// Open a store. With a data directory, the snapshot is loaded (a missing
    /// file yields an empty store) and every index is rebuilt from it.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let state = match config.snapshot_path() {
            Some(path) => match persistence::load_snapshot(&path)? {
                Some(snapshot) => StoreState::from_snapshot(snapshot, &config)?,
                None => StoreState::default(),
            },
            None => StoreState::default(),
        };
        tracing::info!(
            "Opened store ({} index, {} libraries, {} chunks)",
            config.index.name(),
            state.libraries.len(),
            state.chunks.len()
        );
        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// Purely in-memory store with the given index strategy.
    pub fn in_memory(index: IndexKind) -> Self {
        Self {
            config: StoreConfig::in_memory(index),
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        match self.config.snapshot_path() {
            Some(path) => persistence::save_snapshot(&path, &state.snapshot_ref()),
            None => Ok(()),
        }
    }

    // ---- Libraries ----

    pub fn create_library(&self, name: impl Into<String>, metadata: Metadata) -> Result<Library> {
        let mut state = self.state.write();
        let id = new_id(LIBRARY_PREFIX);
        if state.libraries.contains_key(&id) {
            return Err(Error::IdCollision { id });
        }
        let library = Library {
            id: id.clone(),
            name: name.into(),
            metadata,
            created_at: Utc::now(),
        };
        state.insert_library_record(library.clone());
        state.indexes.insert(id, LibraryIndexes::new(&self.config));
        tracing::debug!("Created library {}", library.id);
        self.persist(&state)?;
        Ok(library)
    }

    /// Deep copy of a library with its documents and their chunks.
    pub fn get_library(&self, id: &str) -> Result<LibraryWithDocuments> {
        let state = self.state.read();
        let library = state
            .libraries
            .get(id)
            .ok_or_else(|| Error::not_found(EntityKind::Library, id))?;
        let documents = state
            .library_documents
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|doc_id| state.documents.get(doc_id))
            .map(|doc| state.document_with_chunks(doc))
            .collect();
        Ok(LibraryWithDocuments {
            library: library.clone(),
            documents,
        })
    }

    pub fn library_exists(&self, id: &str) -> bool {
        self.state.read().libraries.contains_key(id)
    }

    pub fn list_libraries(&self) -> Vec<Library> {
        self.state.read().libraries.values().cloned().collect()
    }

    pub fn update_library(&self, id: &str, update: LibraryUpdate) -> Result<Library> {
        let mut state = self.state.write();
        let library = state
            .libraries
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Library, id))?;
        if let Some(name) = update.name {
            library.name = name;
        }
        if let Some(metadata) = update.metadata {
            library.metadata = metadata;
        }
        let updated = library.clone();
        self.persist(&state)?;
        Ok(updated)
    }

    /// Delete a library with all its documents and chunks. Its indices are dropped.
    pub fn delete_library(&self, id: &str) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if !state.libraries.contains_key(id) {
            return Err(Error::not_found(EntityKind::Library, id));
        }

        // Collect the whole subtree first, then delete
        let doc_ids: HashSet<String> = state
            .library_documents
            .remove(id)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let chunk_ids: HashSet<String> = state
            .library_chunks
            .remove(id)
            .unwrap_or_default()
            .into_iter()
            .collect();

        state.chunks.retain(|cid, _| !chunk_ids.contains(cid));
        state.documents.retain(|did, _| !doc_ids.contains(did));
        for doc_id in &doc_ids {
            state.document_chunks.remove(doc_id);
        }
        state.libraries.shift_remove(id);
        state.indexes.remove(id);

        tracing::debug!(
            "Deleted library {} ({} documents, {} chunks)",
            id,
            doc_ids.len(),
            chunk_ids.len()
        );
        self.persist(state)
    }

    // ---- Documents ----

    pub fn create_document(
        &self,
        library_id: &str,
        title: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Document> {
        let mut state = self.state.write();
        if !state.libraries.contains_key(library_id) {
            return Err(Error::InvalidParentReference {
                entity: EntityKind::Document,
                id: library_id.to_string(),
            });
        }
        let id = new_id(DOCUMENT_PREFIX);
        if state.documents.contains_key(&id) {
            return Err(Error::IdCollision { id });
        }
        let document = Document {
            id,
            library_id: library_id.to_string(),
            title: title.into(),
            metadata,
            created_at: Utc::now(),
        };
        state.insert_document_record(document.clone());
        tracing::debug!("Created document {} in {}", document.id, library_id);
        self.persist(&state)?;
        Ok(document)
    }

    /// Deep copy of a document with its chunks.
    pub fn get_document(&self, id: &str) -> Result<DocumentWithChunks> {
        let state = self.state.read();
        let document = state
            .documents
            .get(id)
            .ok_or_else(|| Error::not_found(EntityKind::Document, id))?;
        Ok(state.document_with_chunks(document))
    }

    pub fn document_exists(&self, id: &str) -> bool {
        self.state.read().documents.contains_key(id)
    }

    /// Documents of a library in insertion order. `limit` is capped at
    /// [`MAX_PAGE_LIMIT`].
    pub fn list_documents(&self, library_id: &str, skip: usize, limit: usize) -> Result<Vec<Document>> {
        let state = self.state.read();
        let ids = state
            .library_documents
            .get(library_id)
            .ok_or_else(|| Error::not_found(EntityKind::Library, library_id))?;
        Ok(ids
            .iter()
            .skip(skip)
            .take(limit.min(MAX_PAGE_LIMIT))
            .filter_map(|id| state.documents.get(id))
            .cloned()
            .collect())
    }

    pub fn update_document(&self, id: &str, update: DocumentUpdate) -> Result<Document> {
        let mut state = self.state.write();
        let document = state
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Document, id))?;
        if let Some(title) = update.title {
            document.title = title;
        }
        if let Some(metadata) = update.metadata {
            document.metadata = metadata;
        }
        let updated = document.clone();
        self.persist(&state)?;
        Ok(updated)
    }

    /// Delete a document and its chunks, retracting them from the library's indices.
    pub fn delete_document(&self, id: &str) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let library_id = state
            .documents
            .get(id)
            .map(|d| d.library_id.clone())
            .ok_or_else(|| Error::not_found(EntityKind::Document, id))?;

        let chunk_ids: HashSet<String> = state
            .document_chunks
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        state.remove_chunks(&library_id, &chunk_ids, &self.config)?;

        state.document_chunks.remove(id);
        state.documents.shift_remove(id);
        if let Some(set) = state.library_documents.get_mut(&library_id) {
            set.shift_remove(id);
        }
        tracing::debug!("Deleted document {} ({} chunks)", id, chunk_ids.len());
        self.persist(state)
    }

    // ---- Chunks ----

    /// Create a chunk and index it in the same critical section.
    ///
    /// The first chunk of a library fixes its dimension; later chunks of another
    /// dimension are rejected with `DimensionMismatch`.
    pub fn create_chunk(
        &self,
        document_id: &str,
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Result<Chunk> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let library_id = state
            .documents
            .get(document_id)
            .map(|d| d.library_id.clone())
            .ok_or_else(|| Error::InvalidParentReference {
                entity: EntityKind::Chunk,
                id: document_id.to_string(),
            })?;
        validate_vector(&embedding)?;
        if let Some(expected) = state.library_dimension(&library_id, None) {
            if expected != embedding.len() {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        let id = new_id(CHUNK_PREFIX);
        if state.chunks.contains_key(&id) {
            return Err(Error::IdCollision { id });
        }

        let chunk = Chunk {
            id,
            document_id: document_id.to_string(),
            library_id,
            content: content.into(),
            embedding,
            metadata,
            created_at: Utc::now(),
        };
        state.index_new_chunk(&chunk, &self.config)?;
        state.insert_chunk_record(chunk.clone());
        tracing::debug!("Created chunk {} in {}", chunk.id, document_id);
        self.persist(state)?;
        Ok(chunk)
    }

    /// Embed `content` with `provider`, then create the chunk. A provider
    /// failure leaves the store untouched.
    pub fn create_chunk_from_text(
        &self,
        provider: &dyn EmbeddingProvider,
        document_id: &str,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Chunk> {
        if !self.document_exists(document_id) {
            return Err(Error::InvalidParentReference {
                entity: EntityKind::Chunk,
                id: document_id.to_string(),
            });
        }
        let content = content.into();
        let embedding = embed_checked(provider, &content)?;
        self.create_chunk(document_id, content, embedding, metadata)
    }

    pub fn get_chunk(&self, id: &str) -> Result<Chunk> {
        self.state
            .read()
            .chunks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Chunk, id))
    }

    pub fn chunk_exists(&self, id: &str) -> bool {
        self.state.read().chunks.contains_key(id)
    }

    /// Chunks of a document in insertion order. `limit` is capped at
    /// [`MAX_PAGE_LIMIT`].
    pub fn list_chunks(&self, document_id: &str, skip: usize, limit: usize) -> Result<Vec<Chunk>> {
        let state = self.state.read();
        let ids = state
            .document_chunks
            .get(document_id)
            .ok_or_else(|| Error::not_found(EntityKind::Document, document_id))?;
        Ok(ids
            .iter()
            .skip(skip)
            .take(limit.min(MAX_PAGE_LIMIT))
            .filter_map(|id| state.chunks.get(id))
            .cloned()
            .collect())
    }

    /// Apply a partial update. New content or a new embedding re-indexes the
    /// chunk before the lock is released.
    pub fn update_chunk(&self, id: &str, update: ChunkUpdate) -> Result<Chunk> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let library_id = state
            .chunks
            .get(id)
            .map(|c| c.library_id.clone())
            .ok_or_else(|| Error::not_found(EntityKind::Chunk, id))?;
        if let Some(embedding) = &update.embedding {
            validate_vector(embedding)?;
            if let Some(expected) = state.library_dimension(&library_id, Some(id)) {
                if expected != embedding.len() {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
            }
        }

        let reembed = update.embedding.is_some();
        let retext = update.content.is_some();
        let chunk = state
            .chunks
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Chunk, id))?;
        if let Some(content) = update.content {
            chunk.content = content;
        }
        if let Some(embedding) = update.embedding {
            chunk.embedding = embedding;
        }
        if let Some(metadata) = update.metadata {
            chunk.metadata = metadata;
        }
        let updated = chunk.clone();

        if reembed {
            state.reindex_chunk(&updated, &self.config)?;
        } else if retext {
            if let Some(indexes) = state.indexes.get_mut(&library_id) {
                indexes.inverted.add(&updated.id, &updated.content);
            }
        }
        self.persist(state)?;
        Ok(updated)
    }

    pub fn delete_chunk(&self, id: &str) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let library_id = state
            .chunks
            .get(id)
            .map(|c| c.library_id.clone())
            .ok_or_else(|| Error::not_found(EntityKind::Chunk, id))?;
        state.remove_chunks(&library_id, &HashSet::from([id.to_string()]), &self.config)?;
        tracing::debug!("Deleted chunk {}", id);
        self.persist(state)
    }

    // ---- Search ----

    /// Top-`k` chunks of a library by cosine similarity to `query`.
    ///
    /// Returns fewer than `k` hits only when the library holds fewer chunks.
    pub fn search(&self, library_id: &str, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.search_with(library_id, query, &SearchOptions::with_k(k))
    }

    /// Search with keyword constraints or a candidate-source override.
    pub fn search_with(
        &self,
        library_id: &str,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state.read();
        let source = options.candidates.unwrap_or(self.config.candidate_source);
        HybridSearchOrchestrator::new(&state, source).search(library_id, query, options)
    }

    /// Embed `text` with `provider`, then search.
    pub fn search_text(
        &self,
        provider: &dyn EmbeddingProvider,
        library_id: &str,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let query = embed_checked(provider, text)?;
        self.search(library_id, &query, k)
    }

    // ---- Persistence and maintenance ----

    /// Write the full snapshot now. A no-op for in-memory stores.
    pub fn save_to_disk(&self) -> Result<()> {
        let state = self.state.read();
        match self.config.snapshot_path() {
            Some(path) => {
                persistence::save_snapshot(&path, &state.snapshot_ref())?;
                tracing::info!(
                    "Saved snapshot {:?} ({} chunks)",
                    path,
                    state.chunks.len()
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Replace the in-memory state with the snapshot on disk and rebuild all
    /// indices. A missing snapshot yields an empty store.
    pub fn load_from_disk(&self) -> Result<()> {
        let Some(path) = self.config.snapshot_path() else {
            return Ok(());
        };
        let fresh = match persistence::load_snapshot(&path)? {
            Some(snapshot) => StoreState::from_snapshot(snapshot, &self.config)?,
            None => StoreState::default(),
        };
        *self.state.write() = fresh;
        Ok(())
    }

    /// Drop and rebuild every index from the chunk records. Returns the number
    /// of chunks replayed.
    pub fn rebuild_indices(&self) -> Result<usize> {
        let mut state = self.state.write();
        let count = state.reindex_all(&self.config)?;
        tracing::info!(
            "Rebuilt {} indices over {} libraries ({} chunks)",
            self.config.index.name(),
            state.libraries.len(),
            count
        );
        Ok(count)
    }

    /// Physically drop tombstoned vectors. Returns how many were removed.
    pub fn compact_indices(&self) -> usize {
        let mut state = self.state.write();
        let removed: usize = state
            .indexes
            .values_mut()
            .map(|ix| ix.strategy.compact())
            .sum();
        tracing::info!("Compacted indices, {} tombstones removed", removed);
        removed
    }

    /// Re-run training for one library's index (IVF clustering). Returns
    /// `None` for strategies that need no training.
    pub fn train_index(&self, library_id: &str) -> Result<Option<TrainReport>> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if !state.libraries.contains_key(library_id) {
            return Err(Error::not_found(EntityKind::Library, library_id));
        }
        let report = match state.indexes.get_mut(library_id) {
            Some(indexes) => indexes.strategy.train()?,
            None => state.reindex_library(library_id, &self.config)?,
        };
        if let Some(r) = &report {
            tracing::info!(
                "Trained index of {}: {} vectors into {} clusters",
                library_id,
                r.vectors,
                r.n_clusters
            );
        }
        Ok(report)
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            libraries: state.libraries.len(),
            documents: state.documents.len(),
            chunks: state.chunks.len(),
            indexed_vectors: state.indexes.values().map(|ix| ix.strategy.len()).sum(),
            tombstoned_vectors: state.indexes.values().map(|ix| ix.strategy.tombstoned()).sum(),
            index: self.config.index.name(),
        }
    }
}
