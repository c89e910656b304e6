//! `pom.xml` manifest adapter for the project root.
//!
//! The root POM is read locally; its parent chain and any BOM imports are
//! fetched through the repository directory like any other POM. Only a
//! malformed root manifest is fatal; remote failures degrade with warnings.

use std::path::Path;

use tracing::warn;

use crate::artifact::{Artifact, ArtifactCoordinates};
use crate::pom::{PomModel, PomResolver, RepositoryDecl};
use crate::project::ResolveError;
use crate::repository::RepositoryDirectory;

pub(crate) struct MavenProject {
    /// The project's own artifact (not part of the resolution result).
    pub root: Artifact,
    pub direct: Vec<Artifact>,
    pub repositories: Vec<RepositoryDecl>,
}

pub(crate) async fn load_project(
    pom_path: &Path,
    directory: &dyn RepositoryDirectory,
) -> Result<MavenProject, ResolveError> {
    let xml = std::fs::read_to_string(pom_path).map_err(|error| ResolveError::InvalidManifest {
        path: pom_path.to_path_buf(),
        reason: error.to_string(),
    })?;

    let model = PomModel::parse(&xml).map_err(|reason| ResolveError::InvalidManifest {
        path: pom_path.to_path_buf(),
        reason,
    })?;

    let coordinates = root_coordinates(&model).ok_or_else(|| ResolveError::InvalidManifest {
        path: pom_path.to_path_buf(),
        reason: "groupId/artifactId/version を特定できません".to_string(),
    })?;

    let mut resolver = PomResolver::new(directory);
    let effective = match resolver
        .effective_from_xml(coordinates.clone(), xml.clone())
        .await
    {
        Ok(effective) => effective,
        Err(error) => {
            // Remote trouble while merging parents/BOMs must not abort the
            // resolve; fall back to the standalone model.
            warn!(
                path = %pom_path.display(),
                error = %error,
                "効果POMの構築に失敗したため単体モデルで続行します"
            );
            let model = PomModel::parse(&xml).map_err(|reason| ResolveError::InvalidManifest {
                path: pom_path.to_path_buf(),
                reason,
            })?;
            std::sync::Arc::new(crate::pom::EffectivePom::from_model(
                coordinates.clone(),
                model,
                None,
            ))
        }
    };

    let mut root = Artifact::new(
        coordinates.group_id.clone(),
        coordinates.artifact_id.clone(),
    )
    .with_version(coordinates.version.clone());
    root.packaging = effective.packaging.clone();

    Ok(MavenProject {
        root,
        direct: effective.direct_artifacts(),
        repositories: effective.repositories.clone(),
    })
}

/// ルートPOMの座標。自身の宣言が無ければ `<parent>` から継承する。
fn root_coordinates(model: &PomModel) -> Option<ArtifactCoordinates> {
    let group = model
        .group_id
        .clone()
        .or_else(|| model.parent.as_ref().map(|parent| parent.group_id.clone()))?;
    let artifact = model.artifact_id.clone()?;
    let version = model
        .version
        .clone()
        .or_else(|| model.parent.as_ref().map(|parent| parent.version.clone()))?;
    Some(ArtifactCoordinates::new(group, artifact, version))
}
