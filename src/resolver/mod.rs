//! Concurrent transitive graph walker.
//!
//! The walk is a level-synchronous BFS: every unresolved artifact of the
//! current level is dispatched concurrently (bounded fan-out), all of level
//! *k* completes before level *k+1* starts, and outcomes are applied to the
//! graph arena serially at the level boundary. Per-coordinate work goes
//! through the single-flight [`ResolutionCache`]; no partial failure aborts
//! the walk. A failing node degrades to "no dependencies" and the walk
//! continues.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::warn;

use crate::artifact::version::{compare_versions, is_floating_version};
use crate::artifact::{Artifact, ArtifactCoordinates};
use crate::events::ResolutionListener;
use crate::pom::{PomError, PomResolver};
use crate::repository::RepositoryDirectory;

pub mod cache;
pub mod conflict;
pub mod graph;

pub use cache::{CacheEntry, CacheLookup, GaKey, ResolutionCache, ResolveTicket};
pub use conflict::reconcile;
pub use graph::{DependencyGraph, GraphNode, NodeId};

/// 1レベルで同時に走らせる解決処理数の既定値。
pub const DEFAULT_MAX_CONCURRENT_RESOLVES: usize = 8;

/// Walks the transitive dependency graph over a repository directory.
pub struct GraphWalker {
    context: Arc<WalkContext>,
    max_concurrent: usize,
}

struct WalkContext {
    directory: Arc<dyn RepositoryDirectory>,
    cache: Arc<ResolutionCache>,
    listener: Arc<dyn ResolutionListener>,
}

struct LevelEntry {
    node: NodeId,
    /// GA keys on the path from the walk root to (excluding) this node.
    /// Membership here means a dependency edge would close a cycle.
    path: Arc<Vec<GaKey>>,
}

enum Outcome {
    /// The POM was fetched and interpreted; the artifact carries its pinned
    /// version, bound repository and packaging.
    Resolved {
        artifact: Artifact,
        dependencies: Vec<Artifact>,
    },
    /// An equal-version winner was already cached; reuse its result.
    CopiedFromCache { entry: CacheEntry },
    /// A strictly newer version of this GA is already cached; this node
    /// contributes nothing.
    Dominated,
    /// Host discovery or POM interpretation failed; degrade to a leaf.
    Unresolvable,
}

impl GraphWalker {
    pub fn new(
        directory: Arc<dyn RepositoryDirectory>,
        cache: Arc<ResolutionCache>,
        listener: Arc<dyn ResolutionListener>,
    ) -> Self {
        Self {
            context: Arc::new(WalkContext {
                directory,
                cache,
                listener,
            }),
            max_concurrent: DEFAULT_MAX_CONCURRENT_RESOLVES,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Resolves the transitive closure of the given direct dependencies.
    /// Returns the populated graph and the ids of the root nodes.
    pub async fn walk(&self, direct: Vec<Artifact>) -> (DependencyGraph, Vec<NodeId>) {
        let mut graph = DependencyGraph::new();
        let mut visited: HashSet<ArtifactCoordinates> = HashSet::new();
        let mut roots: Vec<NodeId> = Vec::new();
        let mut frontier: Vec<LevelEntry> = Vec::new();
        let root_path: Arc<Vec<GaKey>> = Arc::new(Vec::new());

        let no_exclusions = HashSet::new();
        for artifact in direct {
            let (node, _) = graph.ensure_node(artifact, &no_exclusions);
            if !roots.contains(&node) {
                roots.push(node);
            }
            if visited.insert(graph.node(node).artifact.coordinates.clone()) {
                frontier.push(LevelEntry {
                    node,
                    path: root_path.clone(),
                });
            }
        }

        while !frontier.is_empty() {
            frontier = self
                .process_level(&mut graph, &mut visited, frontier)
                .await;
        }

        (graph, roots)
    }

    /// Dispatches one BFS level with bounded fan-out and applies the
    /// outcomes to the arena once the whole level has completed.
    async fn process_level(
        &self,
        graph: &mut DependencyGraph,
        visited: &mut HashSet<ArtifactCoordinates>,
        entries: Vec<LevelEntry>,
    ) -> Vec<LevelEntry> {
        let mut pending: Vec<LevelEntry> = Vec::new();
        for entry in entries {
            let node = graph.node(entry.node);
            if node.dependencies.is_some() {
                self.context.listener.on_skipping_resolution(&node.artifact);
                continue;
            }
            pending.push(entry);
        }

        let mut queue: VecDeque<(usize, Artifact)> = pending
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, graph.node(entry.node).artifact.clone()))
            .collect();
        let mut outcomes: Vec<Option<Outcome>> = Vec::with_capacity(pending.len());
        outcomes.resize_with(pending.len(), || None);

        let mut join_set: JoinSet<(usize, Outcome)> = JoinSet::new();
        while let Some((index, artifact)) = queue.pop_front() {
            let context = Arc::clone(&self.context);
            join_set.spawn(async move { (index, resolve_one(context, artifact).await) });

            if join_set.len() >= self.max_concurrent {
                collect_outcome(&mut join_set, &mut outcomes).await;
            }
        }
        while !join_set.is_empty() {
            collect_outcome(&mut join_set, &mut outcomes).await;
        }

        let mut next = Vec::new();
        for (entry, outcome) in pending.into_iter().zip(outcomes) {
            let outcome = outcome.unwrap_or(Outcome::Unresolvable);
            self.apply_outcome(graph, visited, entry, outcome, &mut next);
        }
        next
    }

    fn apply_outcome(
        &self,
        graph: &mut DependencyGraph,
        visited: &mut HashSet<ArtifactCoordinates>,
        entry: LevelEntry,
        outcome: Outcome,
        next: &mut Vec<LevelEntry>,
    ) {
        match outcome {
            Outcome::Dominated | Outcome::Unresolvable => {
                graph.node_mut(entry.node).dependencies = Some(Vec::new());
            }
            Outcome::CopiedFromCache { entry: cached } => {
                {
                    let node = graph.node_mut(entry.node);
                    if node.artifact.repository.is_none() {
                        node.artifact.repository = cached.artifact.repository.clone();
                    }
                    if node.artifact.packaging.is_none() {
                        node.artifact.packaging = cached.artifact.packaging.clone();
                    }
                    if is_floating_version(node.artifact.version()) {
                        node.artifact.coordinates.version =
                            cached.artifact.coordinates.version.clone();
                    }
                }
                graph.reindex(entry.node);
                self.attach_children(graph, visited, entry, cached.dependencies, next);
            }
            Outcome::Resolved {
                artifact,
                dependencies,
            } => {
                {
                    let node = graph.node_mut(entry.node);
                    node.artifact.coordinates.version = artifact.coordinates.version.clone();
                    node.artifact.repository = artifact.repository.clone();
                    node.artifact.packaging = artifact.packaging.clone();
                }
                graph.reindex(entry.node);
                self.attach_children(graph, visited, entry, dependencies, next);
            }
        }
    }

    /// Materializes child nodes, applying inherited exclusions and breaking
    /// cycle edges, and enqueues unvisited children for the next level.
    fn attach_children(
        &self,
        graph: &mut DependencyGraph,
        visited: &mut HashSet<ArtifactCoordinates>,
        entry: LevelEntry,
        dependencies: Vec<Artifact>,
        next: &mut Vec<LevelEntry>,
    ) {
        let parent_exclusions = graph.node(entry.node).exclusions.clone();
        let parent_ga = graph.node(entry.node).artifact.ga_key();
        let parent_display = graph.node(entry.node).artifact.to_string();

        let mut child_path: Vec<GaKey> = entry.path.as_ref().clone();
        child_path.push(parent_ga.clone());
        let child_path: Arc<Vec<GaKey>> = Arc::new(child_path);

        let mut children: Vec<NodeId> = Vec::new();
        for dependency in dependencies {
            let dependency_ga = dependency.ga_key();
            if parent_exclusions.contains(&dependency_ga) {
                continue;
            }

            let closes_cycle = dependency_ga == parent_ga || entry.path.contains(&dependency_ga);
            let (child, created) = graph.ensure_node(dependency, &parent_exclusions);
            children.push(child);

            if closes_cycle {
                let child_artifact = &graph.node(child).artifact;
                self.context.listener.on_cycle_detected(child_artifact);
                self.context.listener.warning(&format!(
                    "循環依存を検出したためエッジを破棄します: {parent_display} -> {child_artifact}"
                ));
                if created {
                    graph.node_mut(child).dependencies = Some(Vec::new());
                }
                continue;
            }

            let identity = graph.node(child).artifact.coordinates.clone();
            if visited.insert(identity) {
                next.push(LevelEntry {
                    node: child,
                    path: child_path.clone(),
                });
            }
        }

        graph.node_mut(entry.node).dependencies = Some(children);
    }
}

async fn collect_outcome(
    join_set: &mut JoinSet<(usize, Outcome)>,
    outcomes: &mut [Option<Outcome>],
) {
    if let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(join_error) => {
                warn!(error = %join_error, "解決タスクが異常終了しました");
            }
        }
    }
}

/// Resolves a single artifact against the cache contract:
/// equal cached version → copy, cached newer → dominated, this one newer →
/// re-resolve and overwrite, vacant → single-flight resolve.
async fn resolve_one(context: Arc<WalkContext>, artifact: Artifact) -> Outcome {
    let key = artifact.ga_key();
    match context.cache.lookup(&key).await {
        CacheLookup::Hit(entry) => {
            // A floating spec accepts whatever winner the cache already
            // holds; newest-wins reconciliation covers the rest.
            let comparison = if is_floating_version(artifact.version()) {
                Ordering::Equal
            } else {
                compare_versions(artifact.version(), entry.artifact.version())
            };

            match comparison {
                Ordering::Equal => {
                    context.listener.on_skipping_resolution(&artifact);
                    Outcome::CopiedFromCache { entry }
                }
                Ordering::Less => {
                    context.listener.on_skipping_resolution(&artifact);
                    Outcome::Dominated
                }
                Ordering::Greater => {
                    match fetch_and_extract(&context, artifact).await {
                        Ok((resolved, dependencies)) => {
                            context.cache.publish_if_newer(CacheEntry {
                                artifact: resolved.clone(),
                                dependencies: dependencies.clone(),
                            });
                            Outcome::Resolved {
                                artifact: resolved,
                                dependencies,
                            }
                        }
                        // Keep the older-but-working cache entry: the failed
                        // upgrade only degrades this node.
                        Err(_) => Outcome::Unresolvable,
                    }
                }
            }
        }
        CacheLookup::Miss(ticket) => match fetch_and_extract(&context, artifact.clone()).await {
            Ok((resolved, dependencies)) => {
                ticket.publish(CacheEntry {
                    artifact: resolved.clone(),
                    dependencies: dependencies.clone(),
                });
                Outcome::Resolved {
                    artifact: resolved,
                    dependencies,
                }
            }
            Err(_) => {
                ticket.publish(CacheEntry::unresolvable(artifact));
                Outcome::Unresolvable
            }
        },
    }
}

/// Host discovery + effective POM + extraction for one artifact. Emits the
/// lifecycle events; the error value only signals "degrade this node".
async fn fetch_and_extract(
    context: &WalkContext,
    mut artifact: Artifact,
) -> Result<(Artifact, Vec<Artifact>), PomError> {
    let located = match context.directory.locate_pom(&artifact.coordinates).await {
        Ok(located) => located,
        Err(error) => {
            emit_pom_error(context, &artifact, &error);
            return Err(error);
        }
    };

    artifact.repository = Some(located.repository.clone());
    artifact.coordinates.version = located.coordinates.version.clone();

    let mut resolver = PomResolver::new(context.directory.as_ref());
    let effective = match resolver
        .effective_from_xml(located.coordinates.clone(), located.xml)
        .await
    {
        Ok(effective) => effective,
        Err(error) => {
            emit_pom_error(context, &artifact, &error);
            return Err(error);
        }
    };

    if artifact.packaging.is_none() {
        artifact.packaging = effective.packaging.clone();
    }
    if !effective.repositories.is_empty() {
        context.directory.register_repositories(&effective.repositories);
    }

    let dependencies = effective.direct_artifacts();
    if dependencies.is_empty() {
        context.listener.on_dependencies_not_found(&artifact);
    } else {
        context
            .listener
            .on_resolution_complete(&artifact, dependencies.len());
    }

    Ok((artifact, dependencies))
}

fn emit_pom_error(context: &WalkContext, artifact: &Artifact, error: &PomError) {
    match error {
        PomError::VersionNotFound { .. } => {
            context.listener.on_version_not_found(artifact);
            context
                .listener
                .warning(&format!("{artifact} の解決に失敗しました: {error}"));
        }
        PomError::InvalidPom { .. } => {
            context.listener.on_invalid_pom(artifact, error);
        }
    }
}
