//! HNSW graph construction.
//!
//! Implements the insert algorithm (Algorithm 1 in the HNSW paper) over the
//! ordinal-keyed graph in [`graph`](super::graph). Construction is batch:
//! chunks are inserted in ordinal order, level assignment draws from a seeded
//! generator, and nothing depends on hash iteration order, so the same input
//! and seed always produce the same graph.

use std::sync::atomic::Ordering as AtomicOrdering;

use tracing::debug;
use vpack_core::{DistanceMetric, VPackError};

use super::config::{BuildOptions, HnswConfig};
use super::graph::{search_layer, select_neighbors_heuristic, Candidate, HnswGraph, HnswNode};
use crate::distance::distance;

/// Highest layer a node may be assigned, regardless of draw.
const MAX_LEVEL: usize = 16;

/// Random level generator for HNSW.
///
/// Draws node levels from an exponential distribution as specified in the
/// HNSW paper, using a seeded xorshift64 PRNG so builds are reproducible.
pub(crate) struct LevelGenerator {
    ml: f64,
    rng_state: u64,
}

impl LevelGenerator {
    pub(crate) fn new(ml: f64, seed: u64) -> Self {
        // xorshift64 has a single fixed point at zero.
        let rng_state = if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed };
        Self { ml, rng_state }
    }

    /// Draw a level for a new node.
    #[allow(clippy::cast_precision_loss)] // u64 -> f64 for a uniform draw
    #[allow(clippy::cast_possible_truncation)] // level is capped at MAX_LEVEL
    #[allow(clippy::cast_sign_loss)] // -ln(u) * ml is non-negative
    pub(crate) fn generate_level(&mut self) -> usize {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;

        // Uniform in (0, 1]; never zero, so ln() is finite.
        let uniform = ((x >> 11) as f64 + 1.0) / ((1u64 << 53) as f64);
        let level = (-uniform.ln() * self.ml).floor() as usize;
        level.min(MAX_LEVEL)
    }
}

/// Build an HNSW graph over `vectors`, inserting in ordinal order.
///
/// `total` progress ticks once per inserted vector. The cancellation flag is
/// checked before each insertion; on cancellation the partial graph is
/// dropped and [`VPackError::Cancelled`] is returned.
///
/// # Errors
///
/// Returns [`VPackError::Cancelled`] when `options.cancel` is set mid-build.
#[allow(clippy::cast_possible_truncation)] // ordinals fit u32, checked by the builder
pub(crate) fn build_graph(
    vectors: &[Vec<f32>],
    metric: DistanceMetric,
    config: &HnswConfig,
    seed: u64,
    options: &BuildOptions,
) -> Result<HnswGraph, VPackError> {
    let total = vectors.len();
    debug!(total, m = config.m, ef_construction = config.ef_construction, seed, "building hnsw graph");

    let mut level_gen = LevelGenerator::new(config.ml, seed);
    let mut graph = HnswGraph { nodes: Vec::with_capacity(total), entry_point: 0, max_layer: 0 };

    for (i, vector) in vectors.iter().enumerate() {
        if let Some(cancel) = &options.cancel {
            if cancel.load(AtomicOrdering::Relaxed) {
                debug!(inserted = i, total, "build cancelled, discarding partial graph");
                return Err(VPackError::Cancelled);
            }
        }

        insert(&mut graph, vectors, metric, config, &mut level_gen, i as u32, vector);

        if let Some(progress) = &options.progress {
            progress(i + 1, total);
        }
    }

    Ok(graph)
}

/// Insert one node, connecting it to the graph (Algorithm 1).
fn insert(
    graph: &mut HnswGraph,
    vectors: &[Vec<f32>],
    metric: DistanceMetric,
    config: &HnswConfig,
    level_gen: &mut LevelGenerator,
    ordinal: u32,
    vector: &[f32],
) {
    let node_level = level_gen.generate_level();

    // First node becomes the entry point with no connections.
    if graph.is_empty() {
        graph.nodes.push(HnswNode::new(node_level));
        graph.entry_point = ordinal;
        graph.max_layer = node_level;
        return;
    }

    let entry_point = graph.entry_point;
    let current_max_layer = graph.max_layer;

    // Greedy descent from the top layer down to node_level + 1: each layer
    // only narrows the entry point for the next.
    let mut current_ep = vec![entry_point];
    for layer in (node_level + 1..=current_max_layer).rev() {
        let candidates = search_layer(graph, vectors, metric, vector, &current_ep, 1, layer);
        current_ep = candidates.into_iter().map(|c| c.ordinal).collect();
        if current_ep.is_empty() {
            current_ep = vec![entry_point];
        }
    }

    graph.nodes.push(HnswNode::new(node_level));

    // Search and connect at each layer from min(node_level, max) down to 0.
    let start_layer = node_level.min(current_max_layer);
    for layer in (0..=start_layer).rev() {
        let candidates =
            search_layer(graph, vectors, metric, vector, &current_ep, config.ef_construction, layer);

        let max_conn = if layer == 0 { config.m_max0 } else { config.m };
        let neighbors = select_neighbors_heuristic(vectors, metric, &candidates, max_conn);

        graph.nodes[ordinal as usize].set_connections(layer, neighbors.clone());

        // Bidirectional edges; prune any neighbor that now exceeds max_conn.
        for &neighbor_id in &neighbors {
            let neighbor = &mut graph.nodes[neighbor_id as usize];
            neighbor.add_connection(layer, ordinal);

            if neighbor.connections_at(layer).len() > max_conn {
                let neighbor_vector = &vectors[neighbor_id as usize];
                let over_connected: Vec<Candidate> = graph.nodes[neighbor_id as usize]
                    .connections_at(layer)
                    .iter()
                    .map(|&id| {
                        Candidate::new(
                            id,
                            distance(metric, neighbor_vector, &vectors[id as usize]),
                        )
                    })
                    .collect();
                let pruned =
                    select_neighbors_heuristic(vectors, metric, &over_connected, max_conn);
                graph.nodes[neighbor_id as usize].set_connections(layer, pruned);
            }
        }

        current_ep = candidates.into_iter().map(|c| c.ordinal).collect();
        if current_ep.is_empty() && !neighbors.is_empty() {
            current_ep = neighbors;
        }
    }

    // Promote to entry point when the new node tops the graph.
    if node_level > current_max_layer {
        graph.entry_point = ordinal;
        graph.max_layer = node_level;
    }
}
