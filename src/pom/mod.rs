//! POM fetching, parsing and effective-model construction.
//!
//! A `PomModel` is the raw XML view of a single `pom.xml`. An `EffectivePom`
//! is what the rest of the resolver consumes: the model merged with its
//! parent chain, with `dependencyManagement` imports expanded and property
//! references interpolated.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::warn;

use crate::artifact::{Artifact, ArtifactCoordinates, MavenCoordinates};
use crate::repository::{RepositoryDirectory, RepositoryError};

pub mod metadata;

/// 親POMチェーンを辿る深さの上限。
const MAX_PARENT_DEPTH: usize = 20;
/// プロパティ展開の反復上限（プロパティがプロパティを参照するケース）。
const MAX_INTERPOLATION_PASSES: usize = 10;

/// Failure modes of fetching and interpreting a POM, mirroring the
/// degradation policy of the walker: both variants mark the coordinate
/// unresolvable, they only differ in the event that is emitted.
#[derive(Debug, Error)]
pub enum PomError {
    #[error("POM {coordinates} が取得できません: {reason}")]
    VersionNotFound {
        coordinates: ArtifactCoordinates,
        reason: String,
    },
    #[error("POM {coordinates} が不正です: {reason}")]
    InvalidPom {
        coordinates: ArtifactCoordinates,
        reason: String,
    },
}

impl PomError {
    pub fn coordinates(&self) -> &ArtifactCoordinates {
        match self {
            PomError::VersionNotFound { coordinates, .. } => coordinates,
            PomError::InvalidPom { coordinates, .. } => coordinates,
        }
    }

    /// HTTP層の失敗をスペック上の分類へ写像する。
    /// 非2xx・ソケットエラーは VersionNotFound、内容の破損は InvalidPom。
    pub(crate) fn from_repository(coords: &ArtifactCoordinates, error: RepositoryError) -> Self {
        if error.is_missing() {
            PomError::VersionNotFound {
                coordinates: coords.clone(),
                reason: error.to_string(),
            }
        } else {
            PomError::InvalidPom {
                coordinates: coords.clone(),
                reason: error.to_string(),
            }
        }
    }
}

/// `<repositories>` セクションで宣言されたリポジトリ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDecl {
    pub id: Option<String>,
    pub url: String,
}

/// 単一 `pom.xml` の生の構文モデル。
#[derive(Debug, Clone)]
pub struct PomModel {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub parent: Option<PomParent>,
    pub properties: HashMap<String, String>,
    pub dependency_management: Vec<PomDependency>,
    pub dependencies: Vec<PomDependency>,
    pub repositories: Vec<RepositoryDecl>,
}

#[derive(Debug, Clone)]
pub struct PomParent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct PomDependency {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub exclusions: Vec<MavenCoordinates>,
    pub classifier: Option<String>,
    pub dep_type: Option<String>,
}

impl PomModel {
    pub fn parse(xml: &str) -> Result<Self, String> {
        let sanitized = neutralize_unknown_entities(xml);
        let document =
            Document::parse(sanitized.as_ref()).map_err(|error| error.to_string())?;
        let project = document
            .descendants()
            .find(|node| node.has_tag_name("project"))
            .ok_or_else(|| "pom.xml に <project> 要素がありません".to_string())?;

        let parent = match child_element(project, "parent") {
            Some(decl) => Some(parent_decl(decl)?),
            None => None,
        };

        Ok(Self {
            group_id: text_of(project, "groupId"),
            artifact_id: text_of(project, "artifactId"),
            version: text_of(project, "version"),
            packaging: text_of(project, "packaging"),
            parent,
            properties: property_table(project),
            dependency_management: dependency_entries(project, "dependencyManagement"),
            dependencies: dependency_entries(project, "dependencies"),
            repositories: repository_decls(project),
        })
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

/// 子要素 `<tag>` のトリム済みテキスト。空要素・空白のみは無いものとして扱う。
fn text_of(node: Node<'_, '_>, tag: &str) -> Option<String> {
    let text = child_element(node, tag)?.text()?.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn parent_decl(node: Node<'_, '_>) -> Result<PomParent, String> {
    let field =
        |tag: &str| text_of(node, tag).ok_or_else(|| format!("<parent> の {tag} が欠落しています"));
    Ok(PomParent {
        group_id: field("groupId")?,
        artifact_id: field("artifactId")?,
        version: field("version")?,
    })
}

fn property_table(project: Node<'_, '_>) -> HashMap<String, String> {
    let mut table = HashMap::new();
    let Some(block) = child_element(project, "properties") else {
        return table;
    };
    for property in block.children().filter(Node::is_element) {
        if let Some(value) = property.text() {
            table.insert(
                property.tag_name().name().to_string(),
                value.trim().to_string(),
            );
        }
    }
    table
}

/// `<dependencies>` 直下の宣言を読む。`dependencyManagement` は
/// `<dependencies>` をもう一段挟むので、そこまで降りてから読む。
fn dependency_entries(project: Node<'_, '_>, section: &'static str) -> Vec<PomDependency> {
    let mut list = child_element(project, section);
    if section != "dependencies" {
        list = list.and_then(|wrapper| child_element(wrapper, "dependencies"));
    }

    let Some(list) = list else {
        return Vec::new();
    };
    child_elements(list, "dependency")
        .map(dependency_entry)
        .collect()
}

fn dependency_entry(node: Node<'_, '_>) -> PomDependency {
    let mut exclusions = Vec::new();
    if let Some(block) = child_element(node, "exclusions") {
        for exclusion in child_elements(block, "exclusion") {
            let pair = text_of(exclusion, "groupId").zip(text_of(exclusion, "artifactId"));
            if let Some((group, artifact)) = pair {
                exclusions.push(MavenCoordinates::new(group, artifact));
            }
        }
    }

    PomDependency {
        group_id: text_of(node, "groupId"),
        artifact_id: text_of(node, "artifactId"),
        version: text_of(node, "version"),
        scope: text_of(node, "scope"),
        optional: text_of(node, "optional").is_some_and(|flag| flag.eq_ignore_ascii_case("true")),
        exclusions,
        classifier: text_of(node, "classifier"),
        dep_type: text_of(node, "type"),
    }
}

fn repository_decls(project: Node<'_, '_>) -> Vec<RepositoryDecl> {
    let Some(block) = child_element(project, "repositories") else {
        return Vec::new();
    };

    let mut declared = Vec::new();
    for repository in child_elements(block, "repository") {
        if let Some(url) = text_of(repository, "url") {
            declared.push(RepositoryDecl {
                id: text_of(repository, "id"),
                url,
            });
        }
    }
    declared
}

/// 実在のPOMには `&oslash;` のような未宣言エンティティが紛れていることがある。
/// パーサへ渡す前に、定義済みXMLエンティティと文字参照以外を空白へ潰す。
fn neutralize_unknown_entities(xml: &str) -> Cow<'_, str> {
    let Some(first_amp) = xml.find('&') else {
        return Cow::Borrowed(xml);
    };

    let mut sanitized = String::with_capacity(xml.len());
    sanitized.push_str(&xml[..first_amp]);
    let mut rest = &xml[first_amp..];

    while let Some(amp) = rest.find('&') {
        sanitized.push_str(&rest[..amp]);
        let body = &rest[amp + 1..];

        // 妥当なエンティティ参照は短い距離で ';' が閉じる。
        match body.find(';').filter(|semi| *semi <= 32) {
            Some(semi) if is_declared_entity(&body[..semi]) => {
                sanitized.push('&');
                sanitized.push_str(&body[..=semi]);
                rest = &body[semi + 1..];
            }
            Some(semi) => {
                sanitized.push(' ');
                rest = &body[semi + 1..];
            }
            None => {
                sanitized.push('&');
                rest = body;
            }
        }
    }
    sanitized.push_str(rest);

    Cow::Owned(sanitized)
}

fn is_declared_entity(name: &str) -> bool {
    match name.to_ascii_lowercase().as_str() {
        "lt" | "gt" | "amp" | "quot" | "apos" => true,
        lowered => lowered
            .strip_prefix('#')
            .is_some_and(|reference| !reference.is_empty()),
    }
}

/// `dependencyManagement` が固定するバージョンと属性。
#[derive(Debug, Clone)]
pub struct ManagedDependency {
    pub version: String,
    pub scope: Option<String>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub dep_type: Option<String>,
}

/// 効果POM上の依存宣言（スコープフィルタ適用前）。
#[derive(Debug, Clone)]
pub struct DeclaredDependency {
    pub coordinates: ArtifactCoordinates,
    pub scope: Option<String>,
    pub optional: bool,
    pub dep_type: Option<String>,
    pub exclusions: Vec<MavenCoordinates>,
}

impl DeclaredDependency {
    fn ga_key(&self) -> (String, String) {
        self.coordinates.ga_key()
    }
}

/// 親チェーンをマージし、プロパティを展開し終えたPOM。
#[derive(Debug, Clone)]
pub struct EffectivePom {
    pub coordinates: ArtifactCoordinates,
    pub packaging: Option<String>,
    pub properties: HashMap<String, String>,
    pub dependency_management: HashMap<(String, String), ManagedDependency>,
    pub dependencies: Vec<DeclaredDependency>,
    pub repositories: Vec<RepositoryDecl>,
}

fn keep_scope(scope: Option<&str>) -> bool {
    matches!(scope, None | Some("compile") | Some("runtime"))
}

impl EffectivePom {
    /// Merges a parsed model with its (already effective) parent. Scalar
    /// fields are child-wins; `<dependencies>` and `<dependencyManagement>`
    /// are unioned, the child declaration taking precedence per GA.
    pub fn from_model(
        coords: ArtifactCoordinates,
        model: PomModel,
        parent: Option<&EffectivePom>,
    ) -> Self {
        let mut properties = parent
            .map(|parent| parent.properties.clone())
            .unwrap_or_default();
        properties.extend(model.properties);

        properties.insert("project.groupId".to_string(), coords.group_id.clone());
        properties.insert("project.artifactId".to_string(), coords.artifact_id.clone());
        properties.insert("project.version".to_string(), coords.version.clone());
        if let Some(parent_pom) = parent {
            properties.insert(
                "project.parent.groupId".to_string(),
                parent_pom.coordinates.group_id.clone(),
            );
            properties.insert(
                "project.parent.artifactId".to_string(),
                parent_pom.coordinates.artifact_id.clone(),
            );
            properties.insert(
                "project.parent.version".to_string(),
                parent_pom.coordinates.version.clone(),
            );
        }

        let mut dependency_management = parent
            .map(|parent| parent.dependency_management.clone())
            .unwrap_or_default();
        for entry in model.dependency_management {
            let Some(group) = interpolated(entry.group_id.as_deref(), &properties) else {
                warn!(artifact = %coords, "dependencyManagement の groupId を解決できません。スキップします");
                continue;
            };
            let Some(artifact) = interpolated(entry.artifact_id.as_deref(), &properties)
            else {
                warn!(artifact = %coords, "dependencyManagement の artifactId を解決できません。スキップします");
                continue;
            };
            let Some(version) = interpolated(entry.version.as_deref(), &properties) else {
                warn!(
                    group = %group,
                    artifact = %artifact,
                    "dependencyManagement エントリに version がありません。スキップします"
                );
                continue;
            };
            dependency_management.insert(
                (group, artifact),
                ManagedDependency {
                    version,
                    scope: entry.scope,
                    optional: entry.optional,
                    classifier: entry.classifier,
                    dep_type: entry.dep_type,
                },
            );
        }

        let mut dependencies: Vec<DeclaredDependency> = Vec::new();
        for dependency in model.dependencies {
            let Some(group) = interpolated(dependency.group_id.as_deref(), &properties) else {
                continue;
            };
            let Some(artifact) = interpolated(dependency.artifact_id.as_deref(), &properties)
            else {
                continue;
            };

            let managed = dependency_management.get(&(group.clone(), artifact.clone()));
            let version = match interpolated(dependency.version.as_deref(), &properties) {
                Some(value) => value,
                None => {
                    if let Some(managed) = managed {
                        managed.version.clone()
                    } else if keep_scope(dependency.scope.as_deref()) {
                        warn!(
                            group = %group,
                            artifact = %artifact,
                            declaring = %coords,
                            "依存のバージョンを特定できないため読み飛ばします"
                        );
                        continue;
                    } else {
                        continue;
                    }
                }
            };

            let mut dep_coords = ArtifactCoordinates::new(group, artifact, version);
            let classifier = dependency
                .classifier
                .clone()
                .or_else(|| managed.and_then(|value| value.classifier.clone()));
            if let Some(classifier) = classifier {
                dep_coords = dep_coords.with_classifier(classifier);
            }

            let scope = dependency
                .scope
                .clone()
                .or_else(|| managed.and_then(|value| value.scope.clone()));
            let optional = dependency.optional || managed.map(|value| value.optional).unwrap_or(false);
            let dep_type = dependency
                .dep_type
                .clone()
                .or_else(|| managed.and_then(|value| value.dep_type.clone()));

            dependencies.push(DeclaredDependency {
                coordinates: dep_coords,
                scope,
                optional,
                dep_type,
                exclusions: dependency.exclusions,
            });
        }

        // Parent dependencies are inherited; a child declaration of the same
        // GA shadows the parent's.
        if let Some(parent_pom) = parent {
            let declared: HashSet<(String, String)> =
                dependencies.iter().map(DeclaredDependency::ga_key).collect();
            for inherited in &parent_pom.dependencies {
                if !declared.contains(&inherited.ga_key()) {
                    dependencies.push(inherited.clone());
                }
            }
        }

        let mut repositories = model.repositories;
        if let Some(parent_pom) = parent {
            for repo in &parent_pom.repositories {
                if !repositories.iter().any(|existing| existing.url == repo.url) {
                    repositories.push(repo.clone());
                }
            }
        }

        Self {
            coordinates: coords,
            packaging: model.packaging,
            properties,
            dependency_management,
            dependencies,
            repositories,
        }
    }

    /// Applies the extraction filters: optional and `test`/`provided`/
    /// `system` scoped entries are dropped, everything else becomes an
    /// `Artifact` carrying its declared exclusions.
    pub fn direct_artifacts(&self) -> Vec<Artifact> {
        self.dependencies
            .iter()
            .filter(|dependency| !dependency.optional && keep_scope(dependency.scope.as_deref()))
            .map(|dependency| {
                let extension = dependency
                    .dep_type
                    .clone()
                    .unwrap_or_else(|| "jar".to_string());
                let mut artifact = Artifact::new(
                    dependency.coordinates.group_id.clone(),
                    dependency.coordinates.artifact_id.clone(),
                )
                .with_version(dependency.coordinates.version.clone());
                if let Some(classifier) = dependency.coordinates.classifier() {
                    artifact = artifact.with_classifier(classifier);
                }
                if extension.eq_ignore_ascii_case("pom") {
                    artifact.packaging = Some("pom".to_string());
                }
                artifact = artifact.with_extension(extension);
                artifact.exclusions = dependency.exclusions.clone();
                artifact
            })
            .collect()
    }

    /// `dependencyManagement` が固定するバージョンを返す。
    pub fn managed_version(&self, key: &(String, String)) -> Option<&str> {
        self.dependency_management
            .get(key)
            .map(|managed| managed.version.as_str())
    }
}

/// Interpolates `${...}` references against the property table, iterating
/// until no reference is left. Property values may themselves contain
/// references, so the pass count is capped to keep reference cycles from
/// spinning. `None` means the value is unusable: absent, blank, an unknown
/// property, an unterminated reference, or a cycle.
fn interpolated(value: Option<&str>, table: &HashMap<String, String>) -> Option<String> {
    let mut text = value?.trim().to_string();

    for _ in 0..=MAX_INTERPOLATION_PASSES {
        if !text.contains("${") {
            let settled = text.trim();
            return (!settled.is_empty()).then(|| settled.to_string());
        }
        text = substitute_references(&text, table)?;
    }

    None
}

/// One substitution pass: every `${name}` in `text` is replaced by its table
/// value. Nested references introduced by the replacement are left for the
/// next pass.
fn substitute_references(text: &str, table: &HashMap<String, String>) -> Option<String> {
    let mut expanded = String::with_capacity(text.len());
    let mut remainder = text;

    while let Some((head, tail)) = remainder.split_once("${") {
        let (name, after) = tail.split_once('}')?;
        expanded.push_str(head);
        expanded.push_str(table.get(name)?);
        remainder = after;
    }
    expanded.push_str(remainder);

    Some(expanded)
}

/// Drives effective-POM construction against a repository directory: fetches
/// the POM, chases the parent chain, and expands `dependencyManagement`
/// imports (BOMs). One instance memoizes per walk task, so shared parents are
/// fetched once per task.
pub struct PomResolver<'a> {
    directory: &'a dyn RepositoryDirectory,
    memo: HashMap<ArtifactCoordinates, Arc<EffectivePom>>,
}

impl<'a> PomResolver<'a> {
    pub fn new(directory: &'a dyn RepositoryDirectory) -> Self {
        Self {
            directory,
            memo: HashMap::new(),
        }
    }

    /// Fetches the POM for `coords` and builds its effective model.
    pub async fn effective_pom(
        &mut self,
        coords: ArtifactCoordinates,
    ) -> Result<Arc<EffectivePom>, PomError> {
        let mut stack = Vec::new();
        load_effective(self.directory, coords, None, &mut self.memo, &mut stack, 0).await
    }

    /// Builds the effective model from already-fetched XML (used for the
    /// project's local `pom.xml` and for walker-located POMs).
    pub async fn effective_from_xml(
        &mut self,
        coords: ArtifactCoordinates,
        xml: String,
    ) -> Result<Arc<EffectivePom>, PomError> {
        let mut stack = Vec::new();
        load_effective(
            self.directory,
            coords,
            Some(xml),
            &mut self.memo,
            &mut stack,
            0,
        )
        .await
    }
}

fn load_effective<'a>(
    directory: &'a dyn RepositoryDirectory,
    coords: ArtifactCoordinates,
    prefetched_xml: Option<String>,
    memo: &'a mut HashMap<ArtifactCoordinates, Arc<EffectivePom>>,
    stack: &'a mut Vec<ArtifactCoordinates>,
    depth: usize,
) -> Pin<Box<dyn Future<Output = Result<Arc<EffectivePom>, PomError>> + Send + 'a>> {
    Box::pin(async move {
        if let Some(existing) = memo.get(&coords) {
            return Ok(existing.clone());
        }

        if depth > MAX_PARENT_DEPTH {
            return Err(PomError::InvalidPom {
                coordinates: coords,
                reason: format!("親POMチェーンが深すぎます (> {MAX_PARENT_DEPTH})"),
            });
        }

        if stack.contains(&coords) {
            return Err(PomError::InvalidPom {
                coordinates: coords.clone(),
                reason: format!("親POMの解決中に循環が検出されました: {coords}"),
            });
        }
        stack.push(coords.clone());

        let result =
            load_effective_inner(directory, &coords, prefetched_xml, memo, stack, depth).await;

        stack.pop();

        let effective = result?;
        let shared = Arc::new(effective);
        memo.insert(coords, shared.clone());
        Ok(shared)
    })
}

async fn load_effective_inner(
    directory: &dyn RepositoryDirectory,
    coords: &ArtifactCoordinates,
    prefetched_xml: Option<String>,
    memo: &mut HashMap<ArtifactCoordinates, Arc<EffectivePom>>,
    stack: &mut Vec<ArtifactCoordinates>,
    depth: usize,
) -> Result<EffectivePom, PomError> {
    let (coords, xml) = match prefetched_xml {
        Some(xml) => (coords.clone(), xml),
        None => {
            let located = directory.locate_pom(coords).await?;
            (located.coordinates, located.xml)
        }
    };

    let mut model = PomModel::parse(&xml).map_err(|reason| PomError::InvalidPom {
        coordinates: coords.clone(),
        reason,
    })?;

    // Parent failures degrade to a parentless model; only the walker's own
    // coordinate failing aborts this node.
    let parent_effective = match &model.parent {
        Some(parent) => {
            let parent_coords = ArtifactCoordinates::new(
                parent.group_id.clone(),
                parent.artifact_id.clone(),
                parent.version.clone(),
            );
            match load_effective(directory, parent_coords, None, &mut *memo, &mut *stack, depth + 1)
                .await
            {
                Ok(parent) => Some(parent),
                Err(error) => {
                    warn!(
                        artifact = %coords,
                        error = %error,
                        "親POMを解決できないため単体で処理します"
                    );
                    None
                }
            }
        }
        None => None,
    };

    let mut property_context = parent_effective
        .as_ref()
        .map(|parent| parent.properties.clone())
        .unwrap_or_default();
    property_context.extend(model.properties.clone());
    property_context.insert("project.groupId".to_string(), coords.group_id.clone());
    property_context.insert("project.artifactId".to_string(), coords.artifact_id.clone());
    property_context.insert("project.version".to_string(), coords.version.clone());

    expand_management_imports(directory, &mut model, &property_context, memo, stack, depth).await;

    Ok(EffectivePom::from_model(
        coords,
        model,
        parent_effective.as_deref(),
    ))
}

/// `<scope>import</scope><type>pom</type>` なdependencyManagementエントリを
/// 参照先BOMの管理テーブルで置き換える。取得に失敗したエントリは読み飛ばす。
async fn expand_management_imports(
    directory: &dyn RepositoryDirectory,
    model: &mut PomModel,
    properties: &HashMap<String, String>,
    memo: &mut HashMap<ArtifactCoordinates, Arc<EffectivePom>>,
    stack: &mut Vec<ArtifactCoordinates>,
    depth: usize,
) {
    let entries = std::mem::take(&mut model.dependency_management);
    let mut retained = Vec::new();

    for entry in entries {
        let is_import = matches!(
            entry.dep_type.as_deref(),
            Some(dep_type) if dep_type.eq_ignore_ascii_case("pom")
        ) && matches!(
            entry.scope.as_deref(),
            Some(scope) if scope.eq_ignore_ascii_case("import")
        );

        if !is_import {
            retained.push(entry);
            continue;
        }

        let resolved = interpolated(entry.group_id.as_deref(), properties)
            .zip(interpolated(entry.artifact_id.as_deref(), properties))
            .zip(interpolated(entry.version.as_deref(), properties));
        let Some(((group, artifact), version)) = resolved else {
            warn!("dependencyManagement import の座標を解決できません。スキップします");
            continue;
        };

        let import_coords = ArtifactCoordinates::new(group, artifact, version);
        match load_effective(
            directory,
            import_coords.clone(),
            None,
            &mut *memo,
            &mut *stack,
            depth + 1,
        )
        .await
        {
            Ok(imported) => {
                for ((managed_group, managed_artifact), managed) in
                    imported.dependency_management.iter()
                {
                    retained.push(PomDependency {
                        group_id: Some(managed_group.clone()),
                        artifact_id: Some(managed_artifact.clone()),
                        version: Some(managed.version.clone()),
                        scope: managed
                            .scope
                            .clone()
                            .filter(|scope| !scope.eq_ignore_ascii_case("import")),
                        optional: managed.optional,
                        exclusions: Vec::new(),
                        classifier: managed.classifier.clone(),
                        dep_type: None,
                    });
                }
            }
            Err(error) => {
                warn!(
                    bom = %import_coords,
                    error = %error,
                    "BOM import を取得できないためスキップします"
                );
            }
        }
    }

    model.dependency_management = retained;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pom() -> &'static str {
        r#"
            <project>
              <modelVersion>4.0.0</modelVersion>
              <groupId>org.example</groupId>
              <artifactId>demo</artifactId>
              <version>1.0.0</version>
              <properties>
                <codec.version>1.16.1</codec.version>
              </properties>
              <dependencyManagement>
                <dependencies>
                  <dependency>
                    <groupId>commons-codec</groupId>
                    <artifactId>commons-codec</artifactId>
                    <version>${codec.version}</version>
                  </dependency>
                </dependencies>
              </dependencyManagement>
              <dependencies>
                <dependency>
                  <groupId>org.apache.commons</groupId>
                  <artifactId>commons-lang3</artifactId>
                  <version>3.14.0</version>
                </dependency>
                <dependency>
                  <groupId>org.apache.commons</groupId>
                  <artifactId>commons-compress</artifactId>
                  <version>1.26.1</version>
                  <scope>provided</scope>
                  <optional>true</optional>
                  <classifier>tests</classifier>
                  <type>jar</type>
                  <exclusions>
                    <exclusion>
                      <groupId>org.unwanted</groupId>
                      <artifactId>skip-me</artifactId>
                    </exclusion>
                  </exclusions>
                </dependency>
              </dependencies>
              <repositories>
                <repository>
                  <id>extra</id>
                  <url>https://repo.example.com/maven2</url>
                </repository>
              </repositories>
            </project>
        "#
    }

    fn coords() -> ArtifactCoordinates {
        ArtifactCoordinates::new("org.example", "demo", "1.0.0")
    }

    #[test]
    fn parse_captures_scope_optional_and_exclusions() {
        let model = PomModel::parse(sample_pom()).expect("parse pom");
        assert_eq!(model.dependencies.len(), 2, "should keep two dependencies");

        let main = &model.dependencies[0];
        assert_eq!(main.group_id.as_deref(), Some("org.apache.commons"));
        assert_eq!(main.artifact_id.as_deref(), Some("commons-lang3"));
        assert_eq!(main.version.as_deref(), Some("3.14.0"));
        assert_eq!(main.scope.as_deref(), None, "default scope is compile");
        assert!(!main.optional);

        let provided = &model.dependencies[1];
        assert_eq!(provided.scope.as_deref(), Some("provided"));
        assert!(provided.optional);
        assert_eq!(provided.classifier.as_deref(), Some("tests"));
        assert_eq!(provided.dep_type.as_deref(), Some("jar"));
        assert_eq!(provided.exclusions.len(), 1, "exclusions should be parsed");
        assert_eq!(provided.exclusions[0].group_id, "org.unwanted");
        assert_eq!(provided.exclusions[0].artifact_id, "skip-me");
    }

    #[test]
    fn parse_captures_declared_repositories() {
        let model = PomModel::parse(sample_pom()).expect("parse pom");
        assert_eq!(model.repositories.len(), 1);
        assert_eq!(model.repositories[0].id.as_deref(), Some("extra"));
        assert_eq!(model.repositories[0].url, "https://repo.example.com/maven2");
    }

    #[test]
    fn effective_pom_applies_managed_version() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>demo</artifactId>
              <version>1.0.0</version>
              <dependencyManagement>
                <dependencies>
                  <dependency>
                    <groupId>commons-codec</groupId>
                    <artifactId>commons-codec</artifactId>
                    <version>1.16.1</version>
                  </dependency>
                </dependencies>
              </dependencyManagement>
              <dependencies>
                <dependency>
                  <groupId>commons-codec</groupId>
                  <artifactId>commons-codec</artifactId>
                </dependency>
              </dependencies>
            </project>
        "#;

        let model = PomModel::parse(xml).expect("parse pom");
        let effective = EffectivePom::from_model(coords(), model, None);

        assert_eq!(effective.dependencies.len(), 1);
        assert_eq!(
            effective.dependencies[0].coordinates.version, "1.16.1",
            "dependencyManagement version should fill the missing version"
        );
    }

    #[test]
    fn properties_interpolate_through_chains() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>demo</artifactId>
              <version>2.5.0</version>
              <properties>
                <base.version>1.4</base.version>
                <alias.version>${base.version}</alias.version>
              </properties>
              <dependencies>
                <dependency>
                  <groupId>org.example</groupId>
                  <artifactId>lib</artifactId>
                  <version>${alias.version}</version>
                </dependency>
                <dependency>
                  <groupId>org.example</groupId>
                  <artifactId>sibling</artifactId>
                  <version>${project.version}</version>
                </dependency>
              </dependencies>
            </project>
        "#;

        let model = PomModel::parse(xml).expect("parse pom");
        let effective =
            EffectivePom::from_model(ArtifactCoordinates::new("org.example", "demo", "2.5.0"), model, None);

        assert_eq!(effective.dependencies[0].coordinates.version, "1.4");
        assert_eq!(effective.dependencies[1].coordinates.version, "2.5.0");
    }

    #[test]
    fn unresolvable_property_reference_gives_up() {
        let mut properties = HashMap::new();
        properties.insert("a".to_string(), "${b}".to_string());
        properties.insert("b".to_string(), "${a}".to_string());
        assert_eq!(interpolated(Some("${a}"), &properties), None);
        assert_eq!(interpolated(Some("${missing}"), &properties), None);
    }

    #[test]
    fn parent_dependencies_are_unioned_child_wins() {
        let parent_xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>parent</artifactId>
              <version>1.0</version>
              <dependencies>
                <dependency>
                  <groupId>org.shared</groupId>
                  <artifactId>from-parent</artifactId>
                  <version>1.0</version>
                </dependency>
                <dependency>
                  <groupId>org.shared</groupId>
                  <artifactId>shadowed</artifactId>
                  <version>1.0</version>
                </dependency>
              </dependencies>
            </project>
        "#;
        let child_xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>child</artifactId>
              <version>1.0</version>
              <dependencies>
                <dependency>
                  <groupId>org.shared</groupId>
                  <artifactId>shadowed</artifactId>
                  <version>2.0</version>
                </dependency>
              </dependencies>
            </project>
        "#;

        let parent_model = PomModel::parse(parent_xml).expect("parse parent");
        let parent = EffectivePom::from_model(
            ArtifactCoordinates::new("org.example", "parent", "1.0"),
            parent_model,
            None,
        );
        let child_model = PomModel::parse(child_xml).expect("parse child");
        let child = EffectivePom::from_model(
            ArtifactCoordinates::new("org.example", "child", "1.0"),
            child_model,
            Some(&parent),
        );

        assert_eq!(child.dependencies.len(), 2);
        let shadowed = child
            .dependencies
            .iter()
            .find(|dep| dep.coordinates.artifact_id == "shadowed")
            .expect("shadowed dependency");
        assert_eq!(shadowed.coordinates.version, "2.0", "child shadows parent");
        assert!(child
            .dependencies
            .iter()
            .any(|dep| dep.coordinates.artifact_id == "from-parent"));
    }

    #[test]
    fn direct_artifacts_filter_scopes_and_optional() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>demo</artifactId>
              <version>1.0.0</version>
              <dependencies>
                <dependency>
                  <groupId>g</groupId><artifactId>compile-dep</artifactId><version>1</version>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>runtime-dep</artifactId><version>1</version>
                  <scope>runtime</scope>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>test-dep</artifactId><version>1</version>
                  <scope>test</scope>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>provided-dep</artifactId><version>1</version>
                  <scope>provided</scope>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>system-dep</artifactId><version>1</version>
                  <scope>system</scope>
                </dependency>
                <dependency>
                  <groupId>g</groupId><artifactId>optional-dep</artifactId><version>1</version>
                  <optional>true</optional>
                </dependency>
              </dependencies>
            </project>
        "#;

        let model = PomModel::parse(xml).expect("parse pom");
        let effective = EffectivePom::from_model(coords(), model, None);
        let artifacts = effective.direct_artifacts();

        let names: Vec<&str> = artifacts
            .iter()
            .map(|artifact| artifact.artifact_id())
            .collect();
        assert_eq!(names, vec!["compile-dep", "runtime-dep"]);
    }

    #[test]
    fn pom_typed_dependency_keeps_packaging() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>demo</artifactId>
              <version>1.0.0</version>
              <dependencies>
                <dependency>
                  <groupId>g</groupId><artifactId>platform</artifactId><version>1</version>
                  <type>pom</type>
                </dependency>
              </dependencies>
            </project>
        "#;

        let model = PomModel::parse(xml).expect("parse pom");
        let effective = EffectivePom::from_model(coords(), model, None);
        let artifacts = effective.direct_artifacts();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].is_pom_packaging());
    }

    #[test]
    fn undefined_entities_are_neutralized() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>demo&oslash;</artifactId>
              <version>1.0.0</version>
            </project>
        "#;
        let model = PomModel::parse(xml).expect("parse pom despite stray entity");
        assert_eq!(model.artifact_id.as_deref(), Some("demo"));
    }

    #[test]
    fn missing_project_tag_is_an_error() {
        assert!(PomModel::parse("<foo></foo>").is_err());
        assert!(PomModel::parse("not xml at all <<<").is_err());
    }
}
