//! jvdeps: transitive dependency resolution for Maven and Gradle projects.
//!
//! Given a project directory, jvdeps discovers the direct dependencies from
//! the manifest (`pom.xml` or `build.gradle(.kts)`), walks the transitive
//! graph across the configured remote repositories, reconciles version
//! conflicts, and returns a deduplicated artifact list suitable for
//! classpath construction or bulk download.
//!
//! Conflict policy is newest-wins per `(groupId, artifactId)`, not Maven's
//! nearest-wins: a higher version reached through a deeper path displaces a
//! shallower, lower one.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let artifacts = jvdeps::resolve("./my-project").await?;
//! jvdeps::download("./libs", &artifacts).await?;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod download;
pub mod events;
pub mod pom;
pub mod project;
pub mod repository;
pub mod resolver;

use std::path::Path;

pub use artifact::{version, Artifact, ArtifactCoordinates, MavenCoordinates};
pub use download::{ArtifactDownloader, DownloadError, DownloadReport, RepositoryFetcher};
pub use events::{NullListener, ResolutionListener, TracingListener};
pub use pom::{metadata::MavenMetadata, EffectivePom, PomError, PomModel};
pub use project::{ProjectResolver, ResolveError};
pub use repository::{
    LocatedPom, RemoteRepository, RepositoryDirectory, RepositoryError, RepositoryRegistry,
};
pub use resolver::{DependencyGraph, GraphWalker, ResolutionCache};

/// Resolves a project with the default stack (default repositories, fresh
/// cache, tracing listener). Build a [`ProjectResolver`] instead to reuse
/// the cache across calls or to inject collaborators.
pub async fn resolve(project_dir: impl AsRef<Path>) -> Result<Vec<Artifact>, ResolveError> {
    ProjectResolver::new()?.resolve(project_dir).await
}

/// Downloads artifacts into `output_dir` with the default stack.
pub async fn download(
    output_dir: impl AsRef<Path>,
    artifacts: &[Artifact],
) -> Result<DownloadReport, ResolveError> {
    ProjectResolver::new()?.download(output_dir, artifacts).await
}
