use chunkdb_core::config::SNAPSHOT_FILE_NAME;
use chunkdb_core::index::distance::cosine_similarity;
use chunkdb_core::{
    CandidateSource, EntityKind, Error, HnswConfig, IndexKind, IvfConfig, Metadata, MetadataValue,
    SearchOptions, Store, StoreConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn all_kinds() -> Vec<IndexKind> {
    vec![
        IndexKind::BruteForce,
        IndexKind::Ivf(IvfConfig {
            n_clusters: 4,
            ..IvfConfig::default()
        }),
        IndexKind::Hnsw(HnswConfig::default()),
    ]
}

fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect()
}

/// Two libraries, a few documents each, 4-dim chunks with mixed metadata.
fn populate(store: &Store, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut library_ids = Vec::new();
    for l in 0..2 {
        let mut meta = Metadata::new();
        meta.insert("owner".into(), MetadataValue::from("ops"));
        meta.insert("rank".into(), MetadataValue::Integer(l));
        let lib = store.create_library(format!("library {l}"), meta).unwrap();
        for d in 0..3 {
            let mut meta = Metadata::new();
            meta.insert("weight".into(), MetadataValue::Float(0.5 + d as f64));
            meta.insert("draft".into(), MetadataValue::Boolean(d % 2 == 0));
            let doc = store
                .create_document(&lib.id, format!("doc {l}.{d}"), meta)
                .unwrap();
            for c in 0..5 {
                store
                    .create_chunk(
                        &doc.id,
                        format!("chunk {c} of document {d} about topic{}", c % 3),
                        random_vector(&mut rng, 4),
                        Metadata::new(),
                    )
                    .unwrap();
            }
        }
        library_ids.push(lib.id);
    }
    library_ids
}

#[test]
fn test_cascading_delete_empties_every_index() {
    for kind in all_kinds() {
        let store = Store::in_memory(kind);
        let libs = populate(&store, 1);
        let target = &libs[0];

        let docs = store.get_library(target).unwrap().documents;
        assert_eq!(docs.len(), 3);
        for doc in &docs {
            store.delete_document(&doc.document.id).unwrap();
        }
        let hits = store
            .search_with(
                target,
                &[0.1, 0.2, 0.3, 0.4],
                &SearchOptions::with_k(10).candidates(CandidateSource::Index),
            )
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.stats().indexed_vectors, 15, "other library untouched");

        store.delete_library(target).unwrap();
        assert!(!store.library_exists(target));
        assert!(matches!(
            store.search(target, &[0.1, 0.2, 0.3, 0.4], 10),
            Err(Error::NotFound {
                entity: EntityKind::Library,
                ..
            })
        ));

        // Whole-library cascade with chunks still present
        store.delete_library(&libs[1]).unwrap();
        let stats = store.stats();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.indexed_vectors, 0);
    }
}

#[test]
fn test_orchestrator_widens_past_grid_bucket() {
    let store = Store::in_memory(IndexKind::BruteForce);
    let lib = store.create_library("grid", Metadata::new()).unwrap();
    let doc = store
        .create_document(&lib.id, "doc", Metadata::new())
        .unwrap();

    // Bin size 0.5: the first three share cell (0, 0) with the query
    let vectors: [[f32; 2]; 5] = [
        [0.2, 0.1],
        [0.1, 0.3],
        [0.4, 0.4],
        [0.9, 0.1],
        [-0.3, 0.2],
    ];
    let ids: Vec<String> = vectors
        .iter()
        .map(|v| {
            store
                .create_chunk(&doc.id, "text", v.to_vec(), Metadata::new())
                .unwrap()
                .id
        })
        .collect();
    let query = [0.1f32, 0.1];

    let hits = store.search(&lib.id, &query, 5).unwrap();
    assert_eq!(hits.len(), 5);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let mut expected: Vec<(f32, &String)> = vectors
        .iter()
        .zip(&ids)
        .map(|(v, id)| (cosine_similarity(&query, v), id))
        .collect();
    expected.sort_by(|a, b| b.0.total_cmp(&a.0));
    let got: Vec<&String> = hits.iter().map(|h| &h.chunk.id).collect();
    let want: Vec<&String> = expected.iter().map(|(_, id)| *id).collect();
    assert_eq!(got, want);
    for (hit, (score, _)) in hits.iter().zip(&expected) {
        assert!((hit.score - score).abs() < 1e-6);
    }

    // Enough candidates in the bucket: no widening
    let narrow = store.search(&lib.id, &query, 3).unwrap();
    let mut narrow_ids: Vec<&String> = narrow.iter().map(|h| &h.chunk.id).collect();
    narrow_ids.sort();
    let mut in_bucket: Vec<&String> = ids[..3].iter().collect();
    in_bucket.sort();
    assert_eq!(narrow_ids, in_bucket);
}

#[test]
fn test_snapshot_round_trip_reproduces_state_and_results() {
    for kind in all_kinds() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::persistent(dir.path(), kind);

        let original = Store::open(config.clone()).unwrap();
        let libs = populate(&original, 7);
        assert!(dir.path().join(SNAPSHOT_FILE_NAME).exists());

        let reloaded = Store::open(config).unwrap();
        assert_eq!(reloaded.list_libraries(), original.list_libraries());
        for lib in &libs {
            assert_eq!(
                reloaded.get_library(lib).unwrap(),
                original.get_library(lib).unwrap()
            );
        }
        assert_eq!(reloaded.stats(), {
            original.rebuild_indices().unwrap();
            original.stats()
        });

        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..10 {
            let q = random_vector(&mut rng, 4);
            for lib in &libs {
                for source in [CandidateSource::Grid, CandidateSource::Index] {
                    let opts = SearchOptions::with_k(4).candidates(source);
                    assert_eq!(
                        reloaded.search_with(lib, &q, &opts).unwrap(),
                        original.search_with(lib, &q, &opts).unwrap()
                    );
                }
            }
        }
    }
}

#[test]
fn test_snapshot_schema() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::persistent(dir.path(), IndexKind::BruteForce)).unwrap();
    let libs = populate(&store, 3);

    let raw = std::fs::read(dir.path().join(SNAPSHOT_FILE_NAME)).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(json["libraries"].as_object().unwrap().len(), 2);
    assert_eq!(json["documents"].as_object().unwrap().len(), 6);
    assert_eq!(json["chunks"].as_object().unwrap().len(), 30);

    let lib = &json["libraries"][&libs[0]];
    assert_eq!(lib["id"], libs[0].as_str());
    assert_eq!(lib["metadata"]["owner"], "ops");
    assert!(lib["created_at"].is_string());
    let chunk = json["chunks"].as_object().unwrap().values().next().unwrap();
    assert_eq!(chunk["embedding"].as_array().unwrap().len(), 4);
}

#[test]
fn test_missing_snapshot_is_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::persistent(
        dir.path().join("never-written"),
        IndexKind::default(),
    ))
    .unwrap();
    assert_eq!(store.stats().libraries, 0);
    store.load_from_disk().unwrap();
    assert!(store.list_libraries().is_empty());
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"[1, 2").unwrap();
    let err = Store::open(StoreConfig::persistent(dir.path(), IndexKind::BruteForce)).unwrap_err();
    assert!(matches!(err, Error::Snapshot { .. }));
}

#[test]
fn test_snapshot_orphans_are_dropped_on_load() {
    let dir = TempDir::new().unwrap();
    let json = r#"{
        "libraries": {"lib_1": {"id": "lib_1", "name": "l", "created_at": "2024-01-01T00:00:00Z"}},
        "documents": {
            "doc_1": {"id": "doc_1", "library_id": "lib_1", "title": "t", "created_at": "2024-01-01T00:00:00Z"},
            "doc_2": {"id": "doc_2", "library_id": "lib_gone", "title": "t", "created_at": "2024-01-01T00:00:00Z"}
        },
        "chunks": {
            "chunk_1": {"id": "chunk_1", "document_id": "doc_1", "library_id": "lib_1", "content": "a",
                        "embedding": [1.0, 0.0], "created_at": "2024-01-01T00:00:00Z"},
            "chunk_2": {"id": "chunk_2", "document_id": "doc_1", "library_id": "lib_1", "content": "b",
                        "embedding": [1.0, 0.0, 0.0], "created_at": "2024-01-01T00:00:00Z"},
            "chunk_3": {"id": "chunk_3", "document_id": "doc_2", "library_id": "lib_gone", "content": "c",
                        "embedding": [1.0, 0.0], "created_at": "2024-01-01T00:00:00Z"}
        }
    }"#;
    std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), json).unwrap();

    let store = Store::open(StoreConfig::persistent(dir.path(), IndexKind::BruteForce)).unwrap();
    let stats = store.stats();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 1);
    assert_eq!(stats.indexed_vectors, 1);
    assert!(store.chunk_exists("chunk_1"));
    let hits = store.search("lib_1", &[1.0, 0.0], 5).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_snapshot_with_offsetless_timestamps_loads() {
    let dir = TempDir::new().unwrap();
    let json = r#"{"libraries": {"lib_a1": {"id": "lib_a1", "name": "papers", "metadata": {},
            "created_at": "2024-05-01T12:34:56.123456"}},
        "documents": {"doc_b2": {"id": "doc_b2", "library_id": "lib_a1", "title": "intro",
            "metadata": {"year": 2024}, "created_at": "2024-05-01T12:35:00"}},
        "chunks": {"chunk_c3": {"id": "chunk_c3", "document_id": "doc_b2", "library_id": "lib_a1",
            "content": "vector search", "embedding": [0.6, 0.8], "metadata": {},
            "created_at": "2024-05-01 12:35:01.000001"}}}"#;
    std::fs::write(dir.path().join(SNAPSHOT_FILE_NAME), json).unwrap();

    let store = Store::open(StoreConfig::persistent(dir.path(), IndexKind::BruteForce)).unwrap();
    let lib = store.get_library("lib_a1").unwrap();
    assert_eq!(lib.library.created_at.to_rfc3339(), "2024-05-01T12:34:56.123456+00:00");
    assert_eq!(lib.documents.len(), 1);
    assert_eq!(lib.documents[0].chunks[0].content, "vector search");

    let hits = store.search("lib_a1", &[0.6, 0.8], 1).unwrap();
    assert_eq!(hits[0].chunk.id, "chunk_c3");

    // Re-saved with an explicit offset
    store.save_to_disk().unwrap();
    let raw = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE_NAME)).unwrap();
    assert!(raw.contains("2024-05-01T12:34:56.123456Z"));
}

#[test]
fn test_failed_save_keeps_in_memory_mutation() {
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("blocked");
    let store = Store::open(StoreConfig::persistent(&blocked, IndexKind::BruteForce)).unwrap();

    // The data directory path is now occupied by a regular file
    std::fs::write(&blocked, b"").unwrap();
    let err = store.create_library("x", Metadata::new()).unwrap_err();
    assert!(err.is_persistence_failure(), "got {err}");
    assert_eq!(store.list_libraries().len(), 1);
    assert!(store.save_to_disk().is_err());
}

#[test]
fn test_load_from_disk_replaces_state() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::persistent(dir.path(), IndexKind::Hnsw(HnswConfig::default()));
    let writer = Store::open(config.clone()).unwrap();
    let reader = Store::open(config).unwrap();
    assert!(reader.list_libraries().is_empty());

    populate(&writer, 5);
    reader.load_from_disk().unwrap();
    assert_eq!(reader.stats(), writer.stats());
}

#[test]
fn test_concurrent_writers_and_searchers() {
    let store = Arc::new(Store::in_memory(IndexKind::Hnsw(HnswConfig::default())));
    let lib = store.create_library("shared", Metadata::new()).unwrap();
    let doc = store
        .create_document(&lib.id, "doc", Metadata::new())
        .unwrap();
    store
        .create_chunk(&doc.id, "seed", vec![1.0, 0.0, 0.0], Metadata::new())
        .unwrap();

    let mut handles = Vec::new();
    for t in 0..4u64 {
        let store = Arc::clone(&store);
        let doc_id = doc.id.clone();
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(t);
            for _ in 0..50 {
                store
                    .create_chunk(&doc_id, "w", random_vector(&mut rng, 3), Metadata::new())
                    .unwrap();
            }
        }));
    }
    for t in 0..2u64 {
        let store = Arc::clone(&store);
        let lib_id = lib.id.clone();
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(100 + t);
            for _ in 0..50 {
                let q = random_vector(&mut rng, 3);
                let hits = store.search(&lib_id, &q, 5).unwrap();
                assert!(!hits.is_empty() && hits.len() <= 5);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let stats = store.stats();
    assert_eq!(stats.chunks, 201);
    assert_eq!(stats.indexed_vectors, 201);
    assert_eq!(store.search(&lib.id, &[1.0, 0.0, 0.0], 500).unwrap().len(), 201);
}

#[test]
fn test_hnsw_index_searches_interleave_with_inserts() {
    let store = Arc::new(Store::in_memory(IndexKind::Hnsw(HnswConfig::with_m(4))));
    let lib = store.create_library("graph", Metadata::new()).unwrap();
    let doc = store
        .create_document(&lib.id, "doc", Metadata::new())
        .unwrap();
    store
        .create_chunk(&doc.id, "seed", vec![0.0, 0.0, 1.0], Metadata::new())
        .unwrap();

    let mut handles = Vec::new();
    for t in 0..3u64 {
        let store = Arc::clone(&store);
        let doc_id = doc.id.clone();
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(t);
            for _ in 0..60 {
                store
                    .create_chunk(&doc_id, "w", random_vector(&mut rng, 3), Metadata::new())
                    .unwrap();
            }
        }));
    }
    for t in 0..3u64 {
        let store = Arc::clone(&store);
        let lib_id = lib.id.clone();
        handles.push(thread::spawn(move || {
            let opts = SearchOptions::with_k(3).candidates(CandidateSource::Index);
            let mut rng = StdRng::seed_from_u64(200 + t);
            for _ in 0..60 {
                let q = random_vector(&mut rng, 3);
                let hits = store.search_with(&lib_id, &q, &opts).unwrap();
                assert!(!hits.is_empty() && hits.len() <= 3);
                assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
                for hit in &hits {
                    assert_eq!(hit.score, cosine_similarity(&q, &hit.chunk.embedding));
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let stats = store.stats();
    assert_eq!(stats.indexed_vectors, 181);
    assert_eq!(stats.tombstoned_vectors, 0);
    let opts = SearchOptions::with_k(181).candidates(CandidateSource::Index);
    assert_eq!(
        store.search_with(&lib.id, &[0.0, 0.0, 1.0], &opts).unwrap().len(),
        181
    );
}

#[test]
fn test_ivf_serves_index_candidates_after_training() {
    let store = Store::in_memory(IndexKind::Ivf(IvfConfig {
        n_clusters: 2,
        ..IvfConfig::default()
    }));
    let lib = store.create_library("ivf", Metadata::new()).unwrap();
    let doc = store
        .create_document(&lib.id, "doc", Metadata::new())
        .unwrap();
    for i in 0..10 {
        let x = if i < 5 { 5.0 } else { -5.0 };
        store
            .create_chunk(&doc.id, "v", vec![x, i as f32 * 0.01], Metadata::new())
            .unwrap();
    }
    let opts = SearchOptions::with_k(3).candidates(CandidateSource::Index);

    // Untrained: falls back to a full scan, still k results
    assert_eq!(store.search_with(&lib.id, &[5.0, 0.0], &opts).unwrap().len(), 3);

    let report = store.train_index(&lib.id).unwrap().unwrap();
    assert_eq!(report.n_clusters, 2);
    assert!(report.warning.is_none());
    let hits = store.search_with(&lib.id, &[5.0, 0.0], &opts).unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.chunk.embedding[0] > 0.0));
}
