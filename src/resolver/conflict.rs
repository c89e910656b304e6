//! Post-walk conflict reconciliation.
//!
//! Collapses the reachable graph to one artifact per `(groupId, artifactId)`
//! key. The policy is newest-wins under the Maven version order, with ties
//! broken by first-seen BFS order. This deliberately diverges from Maven's
//! own nearest-wins selection: a deeper but higher version displaces a
//! shallower lower one.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::artifact::version::{compare_versions, is_floating_version};
use crate::artifact::Artifact;
use crate::resolver::cache::GaKey;
use crate::resolver::graph::{DependencyGraph, NodeId};

/// Collects every artifact reachable from the roots and keeps, per GA key,
/// the one with the maximal version. Coordinates that never resolved (no
/// bound repository, or a version still floating) are dropped: the returned
/// list is the best-effort set of successfully resolved winners.
pub fn reconcile(graph: &DependencyGraph, roots: &[NodeId]) -> Vec<Artifact> {
    let mut winners: IndexMap<GaKey, Artifact> = IndexMap::new();

    for id in graph.reachable_from(roots) {
        let artifact = &graph.node(id).artifact;
        let key = artifact.ga_key();
        match winners.get(&key) {
            None => {
                winners.insert(key, artifact.clone());
            }
            Some(current) => {
                // Strictly-greater keeps first-seen as the tie-break.
                if compare_versions(artifact.version(), current.version()) == Ordering::Greater {
                    winners.insert(key, artifact.clone());
                }
            }
        }
    }

    winners
        .into_iter()
        .map(|(_, artifact)| artifact)
        .filter(|artifact| {
            artifact.repository.is_some() && !is_floating_version(artifact.version())
        })
        .collect()
}
