//! The vector index: build and query.
//!
//! An index owns its chunks, its manifest, and (for the graph mode) the HNSW
//! topology. The flat mode is exact and is also the correctness oracle the
//! graph mode's recall is measured against.

pub mod config;
pub mod graph;
mod hnsw;

use std::cmp::Ordering;

use tracing::{debug, warn};
use vpack_core::{
    Chunk, DistanceMetric, EmbeddedChunk, IndexType, PackManifest, QueryOptions, QueryResult,
    VPackError,
};

use crate::distance::{score, score_from_distance};
use crate::filter::matches_filter;

pub use config::{BuildOptions, HnswConfig, IndexSettings};
pub use graph::HnswGraph;

/// Over-fetch factor for unfiltered approximate queries.
const OVERFETCH: usize = 4;
/// Over-fetch factor when a filter will discard part of the beam.
const OVERFETCH_FILTERED: usize = 8;

/// A built, queryable vector index.
///
/// Chunks and their vectors are stored as parallel columns in ordinal order;
/// the graph (when present) addresses both by ordinal. Immutable once built:
/// updating a pack means rebuilding it, which keeps the artifact
/// deterministic and the query path free of synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct VPackIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
    manifest: PackManifest,
    settings: IndexSettings,
    graph: Option<HnswGraph>,
}

impl VPackIndex {
    /// Build an index over embedded chunks.
    ///
    /// Validation order: the chunk list must be non-empty, then every vector
    /// must match the manifest's declared dimensions (the error names the
    /// first offender). Only then is any index structure constructed.
    ///
    /// The resolved metric, index type, and HNSW parameters are written back
    /// into the index's manifest copy, so a serialized artifact records what
    /// it was actually built with.
    ///
    /// # Errors
    ///
    /// * [`VPackError::EmptyIndex`] for zero chunks.
    /// * [`VPackError::UnknownModel`] when the manifest declares no embedder
    ///   dimensions.
    /// * [`VPackError::ChunkDimensionMismatch`] for a wrong-length vector.
    /// * [`VPackError::Serialize`] when the chunk count exceeds the wire
    ///   format's `u32` ordinal space.
    /// * [`VPackError::Cancelled`] when a graph build is cancelled.
    pub fn build(
        chunks: Vec<EmbeddedChunk>,
        manifest: &PackManifest,
        options: &BuildOptions,
    ) -> Result<Self, VPackError> {
        if chunks.is_empty() {
            return Err(VPackError::EmptyIndex);
        }
        if u32::try_from(chunks.len()).is_err() {
            return Err(VPackError::Serialize(format!(
                "too many chunks for one index: {}",
                chunks.len()
            )));
        }

        let dimensions = manifest.dimensions()?;
        for chunk in &chunks {
            if chunk.dimension() != dimensions {
                return Err(VPackError::ChunkDimensionMismatch {
                    chunk_id: chunk.chunk.id.clone(),
                    expected: dimensions,
                    got: chunk.dimension(),
                });
            }
        }

        let settings = IndexSettings::resolve(manifest, options);
        let mut manifest = manifest.clone();
        manifest.index = Some(settings.as_index_config());

        debug!(
            chunks = chunks.len(),
            dimensions,
            metric = ?settings.metric,
            index = ?settings.index_type,
            "building index"
        );

        let (chunks, vectors): (Vec<Chunk>, Vec<Vec<f32>>) =
            chunks.into_iter().map(|c| (c.chunk, c.vector)).unzip();

        let graph = match settings.index_type {
            IndexType::Flat => None,
            IndexType::Hnsw => Some(hnsw::build_graph(
                &vectors,
                settings.metric,
                &settings.hnsw,
                settings.seed,
                options,
            )?),
        };

        Ok(Self { chunks, vectors, dimensions, manifest, settings, graph })
    }

    /// Query the index for the nearest chunks to `vector`.
    ///
    /// Results are ranked by descending score with ascending chunk id as the
    /// tiebreak, thresholded by `min_score`, and truncated to `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`VPackError::DimensionMismatch`] when the query vector's
    /// length differs from the index dimensions.
    pub fn query(
        &self,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<QueryResult>, VPackError> {
        if vector.len() != self.dimensions {
            return Err(VPackError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        let scored = match &self.graph {
            None => self.scan_flat(vector, options),
            Some(graph) => self.search_graph(graph, vector, options),
        };

        Ok(self.rank(scored, options))
    }

    /// Guard a query-side model identifier against the one the index was
    /// built with. A mismatch is a hard error, never a warning.
    ///
    /// # Errors
    ///
    /// Returns [`VPackError::ModelMismatch`] when the models differ, or
    /// [`VPackError::UnknownModel`] when the manifest declares no embedder.
    pub fn ensure_model(&self, model: &str) -> Result<(), VPackError> {
        let expected = self.manifest.embedder()?.model;
        if expected != model {
            return Err(VPackError::ModelMismatch { expected, got: model.to_string() });
        }
        Ok(())
    }

    /// The number of indexed chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// The vector dimensions of this index.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The manifest this index was built with, index config normalized.
    #[must_use]
    pub const fn manifest(&self) -> &PackManifest {
        &self.manifest
    }

    /// The resolved build settings.
    #[must_use]
    pub const fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// The distance metric results are scored under.
    #[must_use]
    pub const fn metric(&self) -> DistanceMetric {
        self.settings.metric
    }

    pub(crate) fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub(crate) fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub(crate) fn graph(&self) -> Option<&HnswGraph> {
        self.graph.as_ref()
    }

    /// Reassemble an index from decoded parts. The codec has already
    /// validated internal consistency.
    pub(crate) fn from_parts(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        dimensions: usize,
        manifest: PackManifest,
        graph: Option<HnswGraph>,
    ) -> Self {
        let settings = IndexSettings::resolve(&manifest, &BuildOptions::default());
        Self { chunks, vectors, dimensions, manifest, settings, graph }
    }

    /// Exact scan: filter first, score what survives.
    fn scan_flat(&self, vector: &[f32], options: &QueryOptions) -> Vec<(usize, f32)> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|&(_, chunk)| {
                options.filter.as_ref().map_or(true, |f| matches_filter(chunk, f))
            })
            .map(|(i, _)| (i, score(self.settings.metric, vector, &self.vectors[i])))
            .collect()
    }

    /// Approximate search with over-fetch, one retry, and exact fallback.
    ///
    /// The beam width starts at `top_k` times an over-fetch factor (wider
    /// under a filter, since filtering discards part of the beam). If the
    /// filtered beam comes back short, the search retries once with the
    /// width doubled; a width that reaches the chunk count degenerates to
    /// the exact scan, which is both correct and no slower at that point.
    fn search_graph(
        &self,
        graph: &HnswGraph,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Vec<(usize, f32)> {
        let n = self.chunks.len();
        let overfetch = if options.filter.is_some() { OVERFETCH_FILTERED } else { OVERFETCH };
        let ef = options
            .ef_search
            .unwrap_or_else(|| options.top_k.max(1).saturating_mul(overfetch))
            .min(n);

        if ef >= n {
            debug!(ef, n, "beam covers the whole index, using exact scan");
            return self.scan_flat(vector, options);
        }

        let scored = self.beam(graph, vector, options, ef);
        if scored.len() >= options.top_k {
            return scored;
        }

        // One widened retry, then give up on the graph and scan exactly.
        // A beam that keeps coming back short means the filter is selective
        // enough that the scan is the honest cost.
        let widened = ef.saturating_mul(2).min(n);
        warn!(
            ef,
            widened,
            found = scored.len(),
            requested = options.top_k,
            "beam came back short, retrying wider"
        );
        if widened < n {
            let scored = self.beam(graph, vector, options, widened);
            if scored.len() >= options.top_k {
                return scored;
            }
        }
        self.scan_flat(vector, options)
    }

    /// One descent through the graph: greedy to layer 1, full beam at 0.
    fn beam(
        &self,
        graph: &HnswGraph,
        vector: &[f32],
        options: &QueryOptions,
        ef: usize,
    ) -> Vec<(usize, f32)> {
        let mut entry_points = vec![graph.entry_point];
        for layer in (1..=graph.max_layer).rev() {
            let candidates = graph::search_layer(
                graph,
                &self.vectors,
                self.settings.metric,
                vector,
                &entry_points,
                1,
                layer,
            );
            if !candidates.is_empty() {
                entry_points = candidates.into_iter().map(|c| c.ordinal).collect();
            }
        }

        let candidates = graph::search_layer(
            graph,
            &self.vectors,
            self.settings.metric,
            vector,
            &entry_points,
            ef,
            0,
        );

        candidates
            .into_iter()
            .map(|c| (c.ordinal as usize, score_from_distance(self.settings.metric, c.distance)))
            .filter(|&(i, _)| {
                options.filter.as_ref().map_or(true, |f| matches_filter(&self.chunks[i], f))
            })
            .collect()
    }

    /// Rank scored candidates into final results.
    fn rank(&self, mut scored: Vec<(usize, f32)>, options: &QueryOptions) -> Vec<QueryResult> {
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.chunks[a.0].id.cmp(&self.chunks[b.0].id))
        });

        if let Some(min_score) = options.min_score {
            scored.retain(|&(_, s)| s >= min_score);
        }
        scored.truncate(options.top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(rank, (i, score))| QueryResult {
                chunk: self.chunks[i].clone(),
                score,
                rank,
                vector: options.include_vectors.then(|| self.vectors[i].clone()),
            })
            .collect()
    }
}
