//! Recall of the approximate index against the exact scan.

use std::collections::{BTreeMap, HashSet};

use serde_json::json;
use vpack_core::{
    Chunk, ChunkMetadata, DistanceMetric, EmbeddedChunk, IndexType, MetadataFilter, PackManifest,
    QueryOptions,
};
use vpack_engine::{build, BuildOptions};

const DIM: usize = 32;

fn manifest() -> PackManifest {
    PackManifest::parse(json!({
        "vpack": "1.0",
        "name": "@bench/corpus",
        "version": "0.1.0",
        "plugins": [
            { "kind": "source", "use": "@vpack/source-fs" },
            { "kind": "chunker", "use": "@vpack/chunker-fixed" },
            {
                "kind": "embedder",
                "use": "@vpack/embedder-fastembed",
                "model": "sentence-transformers/all-MiniLM-L6-v2",
                "dimensions": DIM
            }
        ]
    }))
    .unwrap()
}

/// Generate random vectors with a simple xorshift PRNG.
fn generate_random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng_state = seed;
    (0..n)
        .map(|_| {
            (0..dim)
                .map(|_| {
                    rng_state ^= rng_state << 13;
                    rng_state ^= rng_state >> 7;
                    rng_state ^= rng_state << 17;
                    (rng_state as f64 / u64::MAX as f64) as f32 * 2.0 - 1.0
                })
                .collect()
        })
        .collect()
}

fn corpus(n: usize, seed: u64) -> Vec<EmbeddedChunk> {
    generate_random_vectors(n, DIM, seed)
        .into_iter()
        .enumerate()
        .map(|(i, vector)| {
            let mut extra = BTreeMap::new();
            extra.insert("shard".to_string(), json!(i % 4));
            EmbeddedChunk {
                chunk: Chunk {
                    id: format!("c{i:05}"),
                    text: format!("synthetic chunk {i}"),
                    metadata: ChunkMetadata {
                        source_plugin: "@vpack/source-fs".to_string(),
                        source_id: format!("{i}"),
                        source_url: None,
                        created_at: None,
                        updated_at: None,
                        pack_name: "@bench/corpus".to_string(),
                        chunker_plugin: "@vpack/chunker-fixed".to_string(),
                        extra,
                    },
                },
                vector,
            }
        })
        .collect()
}

fn ids(results: &[vpack_core::QueryResult]) -> HashSet<String> {
    results.iter().map(|r| r.chunk.id.clone()).collect()
}

#[test]
fn test_recall_at_10_against_exact_oracle() {
    let n = 2_000;
    let flat = build(corpus(n, 42), &manifest(), &BuildOptions::default()).unwrap();
    let hnsw = build(
        corpus(n, 42),
        &manifest(),
        &BuildOptions::default().with_index(IndexType::Hnsw),
    )
    .unwrap();

    let queries = generate_random_vectors(50, DIM, 777);
    let options = QueryOptions::default().with_top_k(10);

    let mut hits = 0usize;
    let mut total = 0usize;
    for query in &queries {
        let oracle = ids(&flat.query(query, &options).unwrap());
        let approx = ids(&hnsw.query(query, &options).unwrap());
        hits += oracle.intersection(&approx).count();
        total += oracle.len();
    }

    let recall = hits as f64 / total as f64;
    assert!(recall >= 0.95, "recall@10 too low: {recall:.3}");
}

#[test]
fn test_recall_under_euclidean_metric() {
    let n = 1_000;
    let options_flat = BuildOptions::default().with_metric(DistanceMetric::Euclidean);
    let options_hnsw = BuildOptions::default()
        .with_metric(DistanceMetric::Euclidean)
        .with_index(IndexType::Hnsw);
    let flat = build(corpus(n, 9), &manifest(), &options_flat).unwrap();
    let hnsw = build(corpus(n, 9), &manifest(), &options_hnsw).unwrap();

    let queries = generate_random_vectors(20, DIM, 31);
    let options = QueryOptions::default().with_top_k(10);

    let mut hits = 0usize;
    let mut total = 0usize;
    for query in &queries {
        let oracle = ids(&flat.query(query, &options).unwrap());
        let approx = ids(&hnsw.query(query, &options).unwrap());
        hits += oracle.intersection(&approx).count();
        total += oracle.len();
    }

    let recall = hits as f64 / total as f64;
    assert!(recall >= 0.9, "recall@10 too low: {recall:.3}");
}

#[test]
fn test_filtered_results_respect_the_filter() {
    let n = 1_000;
    let hnsw = build(
        corpus(n, 42),
        &manifest(),
        &BuildOptions::default().with_index(IndexType::Hnsw),
    )
    .unwrap();

    let queries = generate_random_vectors(10, DIM, 5);
    let options = QueryOptions::default()
        .with_top_k(10)
        .with_filter(MetadataFilter::eq("shard", 2));

    for query in &queries {
        let results = hnsw.query(query, &options).unwrap();
        assert_eq!(results.len(), 10, "over-fetch and retry must fill top_k");
        for result in &results {
            assert_eq!(result.chunk.metadata.extra["shard"], json!(2));
        }
    }
}

#[test]
fn test_explicit_ef_search_covers_whole_index() {
    let n = 500;
    let flat = build(corpus(n, 11), &manifest(), &BuildOptions::default()).unwrap();
    let hnsw = build(
        corpus(n, 11),
        &manifest(),
        &BuildOptions::default().with_index(IndexType::Hnsw),
    )
    .unwrap();

    // ef_search >= n degenerates to the exact scan, so results must match
    // the oracle exactly, order included.
    let mut options = QueryOptions::default().with_top_k(10);
    options.ef_search = Some(n);

    let query = &generate_random_vectors(1, DIM, 99)[0];
    let oracle = flat.query(query, &QueryOptions::default().with_top_k(10)).unwrap();
    let approx = hnsw.query(query, &options).unwrap();

    let order = |rs: &[vpack_core::QueryResult]| {
        rs.iter().map(|r| r.chunk.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(order(&oracle), order(&approx));
}
