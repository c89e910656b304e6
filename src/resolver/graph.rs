//! Arena-backed dependency graph.
//!
//! Nodes are addressed by index, so cycles need no special lifetime
//! handling; an edge is just a `NodeId` in the parent's dependency vector.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;

use crate::artifact::{Artifact, ArtifactCoordinates};
use crate::resolver::cache::GaKey;

pub type NodeId = usize;

#[derive(Debug)]
pub struct GraphNode {
    pub artifact: Artifact,
    /// Filled exactly once by the walker. `Some(vec![])` marks a leaf, an
    /// unresolvable coordinate, or a dropped cycle edge.
    pub dependencies: Option<Vec<NodeId>>,
    /// Exclusions in force for this node's subtree: the inherited set of the
    /// path that first reached the node, unioned with the exclusions
    /// declared on its own dependency entry.
    pub exclusions: HashSet<GaKey>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<ArtifactCoordinates, NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id]
    }

    /// Returns the node for the artifact's full identity, creating it if
    /// needed. The boolean is true when the node was created by this call;
    /// an existing node keeps the exclusion set of the path that created it.
    pub fn ensure_node(
        &mut self,
        artifact: Artifact,
        inherited_exclusions: &HashSet<GaKey>,
    ) -> (NodeId, bool) {
        if let Some(&existing) = self.index.get(&artifact.coordinates) {
            return (existing, false);
        }

        let mut exclusions = inherited_exclusions.clone();
        exclusions.extend(
            artifact
                .exclusions
                .iter()
                .map(|excluded| (excluded.group_id.clone(), excluded.artifact_id.clone())),
        );

        let id = self.nodes.len();
        self.index.insert(artifact.coordinates.clone(), id);
        self.nodes.push(GraphNode {
            artifact,
            dependencies: None,
            exclusions,
        });
        (id, true)
    }

    /// Re-registers a node whose coordinates changed (a floating version was
    /// pinned). The stale index entry is left behind; identity-level dedup
    /// happens again during reconciliation.
    pub fn reindex(&mut self, id: NodeId) {
        let coordinates = self.nodes[id].artifact.coordinates.clone();
        self.index.entry(coordinates).or_insert(id);
    }

    /// Reachable node ids from the given roots, in first-seen BFS order.
    pub fn reachable_from(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut seen: IndexSet<NodeId> = IndexSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for &root in roots {
            if seen.insert(root) {
                queue.push_back(root);
            }
        }

        while let Some(id) = queue.pop_front() {
            if let Some(children) = &self.nodes[id].dependencies {
                for &child in children {
                    if seen.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
        }

        seen.into_iter().collect()
    }
}
