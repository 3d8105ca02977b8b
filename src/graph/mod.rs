//! Bounded local pose graph.
//!
//! Keyframe ids are minted externally; nodes, edges and point clouds live
//! in parallel maps keyed by id, so eviction is a plain multi-map purge
//! and no node-to-node pointers exist. Node poses are estimated with
//! Dijkstra over the edge set, rooted at the latest keyframe.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use crate::core::types::{KeyframeId, PointCloud3D, Pose3D, INVALID_KEYFRAME_ID};

/// A relative SE(3) constraint between two keyframes.
///
/// Stored directed (`rel_pose` maps `to` into the frame of `from`) but
/// treated as undirected for lookup and traversal.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Source keyframe.
    pub from: KeyframeId,
    /// Target keyframe.
    pub to: KeyframeId,
    /// Pose of `to` with respect to `from`.
    pub rel_pose: Pose3D,
}

/// Normalized unordered pair for edge and dedup lookups.
#[inline]
pub fn ordered_pair(a: KeyframeId, b: KeyframeId) -> (KeyframeId, KeyframeId) {
    (a.min(b), a.max(b))
}

/// Bounded rolling subgraph centered on the latest keyframe.
#[derive(Debug, Default)]
pub struct LocalPoseGraph {
    root: KeyframeId,
    nodes: HashMap<KeyframeId, Pose3D>,
    edges: Vec<GraphEdge>,
    edge_pairs: HashSet<(KeyframeId, KeyframeId)>,
    clouds: HashMap<KeyframeId, Arc<PointCloud3D>>,
    distances: HashMap<KeyframeId, f64>,
}

impl LocalPoseGraph {
    /// Create an empty graph. The root stays invalid until the first
    /// distance rebuild.
    pub fn new() -> Self {
        Self {
            root: INVALID_KEYFRAME_ID,
            ..Self::default()
        }
    }

    /// Current anchor keyframe.
    pub fn root(&self) -> KeyframeId {
        self.root
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of stored point clouds. Always equals `len()`.
    pub fn cloud_count(&self) -> usize {
        self.clouds.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether a node is present.
    pub fn contains_node(&self, id: KeyframeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether an edge exists between `a` and `b`, in either direction.
    pub fn contains_edge(&self, a: KeyframeId, b: KeyframeId) -> bool {
        self.edge_pairs.contains(&ordered_pair(a, b))
    }

    /// Estimated pose of a node with respect to the root.
    pub fn node_pose(&self, id: KeyframeId) -> Option<&Pose3D> {
        self.nodes.get(&id)
    }

    /// Point cloud of a node.
    pub fn cloud(&self, id: KeyframeId) -> Option<Arc<PointCloud3D>> {
        self.clouds.get(&id).cloned()
    }

    /// Node ids in unspecified order.
    pub fn node_ids(&self) -> impl Iterator<Item = KeyframeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Add a node with its point cloud.
    ///
    /// The pose starts at identity and is filled on the next distance
    /// rebuild. Re-inserting an existing id replaces its cloud only.
    pub fn insert_node(&mut self, id: KeyframeId, cloud: Arc<PointCloud3D>) {
        self.nodes.entry(id).or_insert_with(Pose3D::identity);
        self.distances.entry(id).or_insert(0.0);
        self.clouds.insert(id, cloud);
    }

    /// Append an edge. Idempotent under undirected equality.
    pub fn insert_edge(&mut self, from: KeyframeId, to: KeyframeId, rel_pose: Pose3D) {
        if !self.edge_pairs.insert(ordered_pair(from, to)) {
            return;
        }
        self.edges.push(GraphEdge { from, to, rel_pose });
    }

    /// Re-anchor the graph at `root` and re-estimate every node pose by
    /// Dijkstra over edge translation lengths.
    ///
    /// Returns all nodes as `(distance, id)` sorted ascending. Nodes not
    /// reachable from the root get an infinite distance so they are the
    /// first eviction victims.
    pub fn rebuild_distances(&mut self, root: KeyframeId) -> Vec<(f64, KeyframeId)> {
        self.root = root;
        if !self.nodes.contains_key(&root) {
            log::warn!("Distance rebuild requested for unknown root #{root}");
            return Vec::new();
        }

        // Undirected adjacency with the relative pose oriented along the
        // traversal direction.
        let mut adjacency: HashMap<KeyframeId, Vec<(KeyframeId, Pose3D)>> = HashMap::new();
        for edge in &self.edges {
            adjacency
                .entry(edge.from)
                .or_default()
                .push((edge.to, edge.rel_pose));
            adjacency
                .entry(edge.to)
                .or_default()
                .push((edge.from, edge.rel_pose.inverse()));
        }

        let mut cost: HashMap<KeyframeId, f64> = HashMap::new();
        cost.insert(root, 0.0);
        self.nodes.insert(root, Pose3D::identity());

        let mut heap = BinaryHeap::new();
        heap.push(DijkstraEntry {
            cost: 0.0,
            id: root,
        });

        while let Some(DijkstraEntry { cost: c, id }) = heap.pop() {
            if c > cost.get(&id).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            let Some(pose) = self.nodes.get(&id).copied() else {
                continue;
            };
            for (neighbor, rel) in adjacency.get(&id).into_iter().flatten() {
                if !self.nodes.contains_key(neighbor) {
                    continue;
                }
                let next_cost = c + rel.translation_norm();
                if next_cost < cost.get(neighbor).copied().unwrap_or(f64::INFINITY) {
                    cost.insert(*neighbor, next_cost);
                    self.nodes.insert(*neighbor, pose.compose(rel));
                    heap.push(DijkstraEntry {
                        cost: next_cost,
                        id: *neighbor,
                    });
                }
            }
        }

        self.distances.clear();
        for (&id, pose) in &self.nodes {
            let d = if cost.contains_key(&id) {
                pose.translation_norm()
            } else {
                f64::INFINITY
            };
            self.distances.insert(id, d);
        }

        let mut by_distance: Vec<(f64, KeyframeId)> = self
            .distances
            .iter()
            .map(|(&id, &d)| (d, id))
            .collect();
        by_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        by_distance
    }

    /// Remove the farthest nodes until at most `max_count` remain.
    ///
    /// A removed node takes its point cloud and every incident edge with
    /// it. The root is never evicted.
    pub fn evict_far(&mut self, max_count: usize) {
        while self.nodes.len() > max_count {
            let victim = self
                .nodes
                .keys()
                .filter(|&&id| id != self.root)
                .max_by(|a, b| {
                    let da = self.distances.get(a).copied().unwrap_or(f64::INFINITY);
                    let db = self.distances.get(b).copied().unwrap_or(f64::INFINITY);
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                })
                .copied();
            let Some(victim) = victim else {
                return;
            };
            self.remove_node(victim);
        }
    }

    fn remove_node(&mut self, id: KeyframeId) {
        self.nodes.remove(&id);
        self.clouds.remove(&id);
        self.distances.remove(&id);
        self.edges.retain(|e| e.from != id && e.to != id);
        self.edge_pairs.retain(|&(a, b)| a != id && b != id);
    }

    /// Drop all nodes, edges and clouds.
    pub fn clear(&mut self) {
        self.root = INVALID_KEYFRAME_ID;
        self.nodes.clear();
        self.edges.clear();
        self.edge_pairs.clear();
        self.clouds.clear();
        self.distances.clear();
    }
}

/// Min-heap entry for Dijkstra (reverse ordering on cost).
struct DijkstraEntry {
    cost: f64,
    id: KeyframeId,
}

impl PartialEq for DijkstraEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for DijkstraEntry {}

impl Ord for DijkstraEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for DijkstraEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dummy_cloud() -> Arc<PointCloud3D> {
        Arc::new(PointCloud3D::from_points(vec![
            crate::core::types::Point3D::new(0.0, 0.0, 0.0),
        ]))
    }

    /// Chain 1 - 2 - ... - n with 1 m steps along x.
    fn chain_graph(n: u64) -> LocalPoseGraph {
        let mut graph = LocalPoseGraph::new();
        for id in 1..=n {
            graph.insert_node(id, dummy_cloud());
        }
        for id in 1..n {
            graph.insert_edge(id, id + 1, Pose3D::from_translation(1.0, 0.0, 0.0));
        }
        graph
    }

    fn check_invariants(graph: &LocalPoseGraph, max_count: usize) {
        assert_eq!(graph.len(), graph.cloud_count());
        assert!(graph.len() <= max_count);
        for id in graph.node_ids() {
            assert!(graph.cloud(id).is_some());
        }
        if graph.root() != INVALID_KEYFRAME_ID {
            let root_pose = graph.node_pose(graph.root()).expect("root present");
            assert_relative_eq!(root_pose.translation_norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_insert_edge_idempotent() {
        let mut graph = chain_graph(2);
        assert_eq!(graph.edge_count(), 1);
        // Same pair in either orientation is a no-op.
        graph.insert_edge(1, 2, Pose3D::from_translation(9.0, 0.0, 0.0));
        graph.insert_edge(2, 1, Pose3D::from_translation(9.0, 0.0, 0.0));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains_edge(2, 1));
    }

    #[test]
    fn test_rebuild_estimates_chain_poses() {
        let mut graph = chain_graph(4);
        let by_distance = graph.rebuild_distances(4);

        assert_eq!(graph.root(), 4);
        assert_relative_eq!(
            graph.node_pose(4).unwrap().translation_norm(),
            0.0,
            epsilon = 1e-12
        );
        // Node 1 sits three edges behind the root.
        assert_relative_eq!(
            graph.node_pose(1).unwrap().translation_norm(),
            3.0,
            epsilon = 1e-9
        );

        let ids: Vec<KeyframeId> = by_distance.iter().map(|&(_, id)| id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
        check_invariants(&graph, 10);
    }

    #[test]
    fn test_shortcut_edge_shortens_distance() {
        let mut graph = chain_graph(5);
        // Direct 1 m link from 5 back to 1.
        graph.insert_edge(5, 1, Pose3D::from_translation(-1.0, 0.0, 0.0));
        graph.rebuild_distances(5);

        assert_relative_eq!(
            graph.node_pose(1).unwrap().translation_norm(),
            1.0,
            epsilon = 1e-9
        );
        // Node 2 now routes through the shortcut: 1 m + 1 m.
        assert_relative_eq!(
            graph.node_pose(2).unwrap().translation_norm(),
            2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_evict_far_removes_farthest_with_cloud_and_edges() {
        let mut graph = chain_graph(6);
        graph.rebuild_distances(6);
        graph.evict_far(5);

        assert_eq!(graph.len(), 5);
        assert!(!graph.contains_node(1));
        assert!(graph.cloud(1).is_none());
        assert!(!graph.contains_edge(1, 2));
        assert_eq!(graph.edge_count(), 4);
        check_invariants(&graph, 5);
    }

    #[test]
    fn test_unreachable_nodes_evicted_first() {
        let mut graph = chain_graph(4);
        // Node 99 has a cloud but no edge to anyone.
        graph.insert_node(99, dummy_cloud());
        graph.rebuild_distances(4);
        graph.evict_far(4);

        assert!(!graph.contains_node(99));
        assert!(graph.contains_node(1));
        check_invariants(&graph, 4);
    }

    #[test]
    fn test_root_never_evicted() {
        let mut graph = chain_graph(3);
        graph.rebuild_distances(3);
        graph.evict_far(1);
        assert_eq!(graph.len(), 1);
        assert!(graph.contains_node(3));
        check_invariants(&graph, 1);
    }

    #[test]
    fn test_rebuild_after_eviction_keeps_invariants() {
        let mut graph = chain_graph(6);
        graph.rebuild_distances(6);
        graph.evict_far(4);
        let by_distance = graph.rebuild_distances(6);
        assert_eq!(by_distance.len(), graph.len());
        check_invariants(&graph, 4);
    }

    #[test]
    fn test_clear() {
        let mut graph = chain_graph(3);
        graph.rebuild_distances(3);
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.root(), INVALID_KEYFRAME_ID);
        assert_eq!(graph.edge_count(), 0);
    }
}
