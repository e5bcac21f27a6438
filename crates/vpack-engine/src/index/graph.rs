//! HNSW graph data structure.
//!
//! The graph stores topology only: nodes are keyed by chunk ordinal (the
//! position of the chunk in the index's chunk list) and vectors stay in the
//! chunk storage. Keeping the two apart makes the wire encoding compact and
//! the build deterministic, since iteration order is always ordinal order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use vpack_core::DistanceMetric;

use crate::distance::distance;

/// A node in the HNSW graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HnswNode {
    /// The highest layer this node appears in.
    pub max_layer: usize,
    /// Neighbor ordinals, indexed by layer. `connections[layer]` is the
    /// adjacency list at that layer.
    pub connections: Vec<Vec<u32>>,
}

impl HnswNode {
    /// Create a node present on layers `0..=max_layer` with no connections.
    #[inline]
    #[must_use]
    pub fn new(max_layer: usize) -> Self {
        Self { max_layer, connections: vec![Vec::new(); max_layer + 1] }
    }

    /// The connections at a specific layer.
    #[inline]
    #[must_use]
    pub fn connections_at(&self, layer: usize) -> &[u32] {
        self.connections.get(layer).map_or(&[], |c| c.as_slice())
    }

    /// Add a connection at a specific layer.
    #[inline]
    pub fn add_connection(&mut self, layer: usize, neighbor: u32) {
        if layer < self.connections.len() && !self.connections[layer].contains(&neighbor) {
            self.connections[layer].push(neighbor);
        }
    }

    /// Replace the connections at a specific layer.
    #[inline]
    pub fn set_connections(&mut self, layer: usize, neighbors: Vec<u32>) {
        if layer < self.connections.len() {
            self.connections[layer] = neighbors;
        }
    }
}

/// The HNSW graph: one node per indexed chunk, in chunk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HnswGraph {
    /// Node `i` corresponds to chunk ordinal `i`.
    pub nodes: Vec<HnswNode>,
    /// The entry point ordinal (a node on the highest layer).
    pub entry_point: u32,
    /// The current maximum layer in the graph.
    pub max_layer: usize,
}

impl HnswGraph {
    /// The number of nodes in the graph.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by ordinal.
    #[inline]
    #[must_use]
    pub fn node(&self, ordinal: u32) -> Option<&HnswNode> {
        self.nodes.get(ordinal as usize)
    }
}

/// A candidate during HNSW search, ordered as a min-heap on distance.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// The chunk ordinal of this candidate.
    pub ordinal: u32,
    /// The distance to the query.
    pub distance: f32,
}

impl Candidate {
    /// Create a new candidate.
    #[inline]
    #[must_use]
    pub const fn new(ordinal: u32, distance: f32) -> Self {
        Self { ordinal, distance }
    }
}

impl PartialEq for Candidate {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.ordinal == other.ordinal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (smallest distance first). NaN is
        // treated as equal to keep a total order; valid vectors never
        // produce NaN distances.
        other.distance.partial_cmp(&self.distance).unwrap_or(Ordering::Equal)
    }
}

/// A max-heap wrapper tracking the worst element of the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxCandidate(pub Candidate);

impl PartialOrd for MaxCandidate {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxCandidate {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.distance.partial_cmp(&other.0.distance).unwrap_or(Ordering::Equal)
    }
}

/// Greedy beam search within one layer.
///
/// Starting from `entry_points`, expands the closest unexplored candidate
/// until no candidate can improve the current `ef` best, then returns the
/// `ef` closest candidates sorted by ascending distance.
pub fn search_layer(
    graph: &HnswGraph,
    vectors: &[Vec<f32>],
    metric: DistanceMetric,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
) -> Vec<Candidate> {
    if entry_points.is_empty() || ef == 0 {
        return Vec::new();
    }

    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
    let mut results: BinaryHeap<MaxCandidate> = BinaryHeap::new();
    let mut visited = vec![false; graph.len()];

    for &ep in entry_points {
        let Some(vector) = vectors.get(ep as usize) else { continue };
        if std::mem::replace(&mut visited[ep as usize], true) {
            continue;
        }
        let candidate = Candidate::new(ep, distance(metric, query, vector));
        candidates.push(candidate);
        results.push(MaxCandidate(candidate));
    }
    while results.len() > ef {
        results.pop();
    }

    while let Some(current) = candidates.pop() {
        let furthest = results.peek().map_or(f32::INFINITY, |c| c.0.distance);
        if current.distance > furthest && results.len() >= ef {
            break;
        }

        let Some(node) = graph.node(current.ordinal) else { continue };
        for &neighbor in node.connections_at(layer) {
            if visited.get(neighbor as usize).copied().unwrap_or(true) {
                continue;
            }
            visited[neighbor as usize] = true;

            let neighbor_dist = distance(metric, query, &vectors[neighbor as usize]);
            let furthest = results.peek().map_or(f32::INFINITY, |c| c.0.distance);

            if results.len() < ef || neighbor_dist < furthest {
                let candidate = Candidate::new(neighbor, neighbor_dist);
                candidates.push(candidate);
                results.push(MaxCandidate(candidate));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut out: Vec<Candidate> = results.into_iter().map(|mc| mc.0).collect();
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    out
}

/// Select up to `m` neighbors with the diversification heuristic
/// (Algorithm 4 in the HNSW paper).
///
/// A candidate is kept only if it is closer to the query than to every
/// already-selected neighbor, which spreads edges across directions instead
/// of clustering them. Remaining slots are backfilled with the closest
/// rejected candidates.
pub fn select_neighbors_heuristic(
    vectors: &[Vec<f32>],
    metric: DistanceMetric,
    candidates: &[Candidate],
    m: usize,
) -> Vec<u32> {
    if candidates.len() <= m {
        return candidates.iter().map(|c| c.ordinal).collect();
    }

    let mut sorted: Vec<Candidate> = candidates.to_vec();
    sorted.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));

    let mut selected: Vec<u32> = Vec::with_capacity(m);
    for candidate in &sorted {
        if selected.len() >= m {
            break;
        }

        let candidate_vector = &vectors[candidate.ordinal as usize];
        let diverse = selected.iter().all(|&chosen| {
            distance(metric, candidate_vector, &vectors[chosen as usize]) >= candidate.distance
        });

        if diverse || selected.is_empty() {
            selected.push(candidate.ordinal);
        }
    }

    // Backfill with the closest rejected candidates.
    if selected.len() < m {
        for candidate in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected.contains(&candidate.ordinal) {
                selected.push(candidate.ordinal);
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_vectors(n: usize) -> Vec<Vec<f32>> {
        #[allow(clippy::cast_precision_loss)]
        (0..n).map(|i| vec![i as f32, 0.0]).collect()
    }

    /// A fully connected single-layer graph over `n` nodes.
    fn clique(n: usize) -> HnswGraph {
        let nodes = (0..n)
            .map(|i| {
                let mut node = HnswNode::new(0);
                #[allow(clippy::cast_possible_truncation)]
                node.set_connections(
                    0,
                    (0..n as u32).filter(|&j| j != i as u32).collect(),
                );
                node
            })
            .collect();
        HnswGraph { nodes, entry_point: 0, max_layer: 0 }
    }

    #[test]
    fn test_node_creation() {
        let node = HnswNode::new(2);
        assert_eq!(node.max_layer, 2);
        assert_eq!(node.connections.len(), 3); // layers 0, 1, 2
    }

    #[test]
    fn test_node_connections_are_deduplicated() {
        let mut node = HnswNode::new(1);
        node.add_connection(0, 2);
        node.add_connection(0, 2);
        node.add_connection(1, 3);
        assert_eq!(node.connections_at(0), &[2]);
        assert_eq!(node.connections_at(1), &[3]);
        assert_eq!(node.connections_at(9), &[] as &[u32]);
    }

    #[test]
    fn test_candidate_min_heap_ordering() {
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();
        heap.push(Candidate::new(1, 1.0));
        heap.push(Candidate::new(2, 2.0));
        heap.push(Candidate::new(3, 0.5));

        assert_eq!(heap.pop().unwrap().ordinal, 3);
        assert_eq!(heap.pop().unwrap().ordinal, 1);
        assert_eq!(heap.pop().unwrap().ordinal, 2);
    }

    #[test]
    fn test_search_layer_empty_entry() {
        let graph = clique(4);
        let vectors = line_vectors(4);
        let results =
            search_layer(&graph, &vectors, DistanceMetric::Euclidean, &[0.0, 0.0], &[], 10, 0);
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_layer_finds_nearest() {
        let graph = clique(8);
        let vectors = line_vectors(8);
        // Query sits at x=5.2, so ordinal 5 is nearest.
        let results =
            search_layer(&graph, &vectors, DistanceMetric::Euclidean, &[5.2, 0.0], &[0], 3, 0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].ordinal, 5);
        assert!(results[0].distance <= results[1].distance);
        assert!(results[1].distance <= results[2].distance);
    }

    #[test]
    fn test_search_layer_respects_ef() {
        let graph = clique(10);
        let vectors = line_vectors(10);
        let results =
            search_layer(&graph, &vectors, DistanceMetric::Euclidean, &[0.0, 0.0], &[9], 4, 0);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_select_neighbors_prefers_diverse_directions() {
        // Query at origin. Candidates 0 and 1 are close together on +x;
        // candidate 2 is on +y. The heuristic should pick one of the +x pair
        // and the +y point over keeping both +x points.
        let vectors = vec![
            vec![1.0, 0.0],
            vec![1.1, 0.0],
            vec![0.0, 1.2],
        ];
        let candidates = vec![
            Candidate::new(0, 1.0),
            Candidate::new(1, 1.1),
            Candidate::new(2, 1.2),
        ];
        let selected =
            select_neighbors_heuristic(&vectors, DistanceMetric::Euclidean, &candidates, 2);
        assert_eq!(selected, vec![0, 2]);
    }

    #[test]
    fn test_select_neighbors_backfills_to_m() {
        // All candidates collinear: only the closest is "diverse", the rest
        // must come from backfill.
        let vectors = line_vectors(5);
        let candidates: Vec<Candidate> =
            (1..5).map(|i| Candidate::new(i, f32::from(u8::try_from(i).unwrap()))).collect();
        let selected =
            select_neighbors_heuristic(&vectors, DistanceMetric::Euclidean, &candidates, 3);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], 1);
    }

    #[test]
    fn test_select_neighbors_small_candidate_set_passes_through() {
        let vectors = line_vectors(3);
        let candidates = vec![Candidate::new(1, 1.0), Candidate::new(2, 2.0)];
        let selected =
            select_neighbors_heuristic(&vectors, DistanceMetric::Euclidean, &candidates, 16);
        assert_eq!(selected, vec![1, 2]);
    }
}
