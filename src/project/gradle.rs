//! Minimal `build.gradle(.kts)` manifest adapter.
//!
//! Recognizes dependency configurations with a single string argument of the
//! form `"group:name:version[:classifier][@ext]"`, in both the Groovy and
//! Kotlin call styles. This is best-effort extraction, not a Gradle parser:
//! plugin blocks, variants and version catalogs are out of scope.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::Artifact;

/// Configurations that map onto Maven scopes. Keep the list conservative:
/// only configurations used for compilation or runtime of the main source
/// set plus the test configuration the scope filter drops anyway.
const DEPENDENCY_CONFIGS: &str =
    r"(?:implementation|api|compileOnly|runtimeOnly|testImplementation)";

static COORDINATE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?m)\b(?P<config>{DEPENDENCY_CONFIGS})\s*\(?\s*['"](?P<coord>[^'"]+)['"]"#
    ))
    .expect("valid regex")
});

fn scope_for_configuration(configuration: &str) -> &'static str {
    match configuration {
        "implementation" | "api" => "compile",
        "runtimeOnly" => "runtime",
        "compileOnly" => "provided",
        "testImplementation" => "test",
        _ => "compile",
    }
}

fn keep_scope(scope: &str) -> bool {
    matches!(scope, "compile" | "runtime")
}

/// Finds the Gradle build script in a project directory, preferring the
/// Groovy DSL file the way Gradle itself does.
pub(crate) fn find_manifest(project_dir: &Path) -> Option<PathBuf> {
    for candidate in ["build.gradle", "build.gradle.kts"] {
        let path = project_dir.join(candidate);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

/// Extracts direct dependencies from build-script text. Declarations without
/// an explicit version are skipped (version catalogs and BOM-supplied
/// versions are not modeled here).
pub(crate) fn parse_dependencies(contents: &str) -> Vec<Artifact> {
    let stripped = strip_comments(contents);
    let mut dependencies = Vec::new();

    for captures in COORDINATE_CALL.captures_iter(&stripped) {
        let scope = scope_for_configuration(&captures["config"]);
        if !keep_scope(scope) {
            continue;
        }

        if let Some(artifact) = parse_coordinate(&captures["coord"]) {
            dependencies.push(artifact);
        }
    }

    dependencies
}

/// `group:name:version[:classifier][@ext]` 形式の単一文字列をパースする。
fn parse_coordinate(coordinate: &str) -> Option<Artifact> {
    let (body, extension) = match coordinate.rsplit_once('@') {
        Some((body, ext)) if !ext.is_empty() && !ext.contains(':') => (body, Some(ext)),
        _ => (coordinate, None),
    };

    let mut parts = body.split(':');
    let group = parts.next()?.trim();
    let name = parts.next()?.trim();
    let version = parts.next()?.trim();
    let classifier = parts.next().map(str::trim).filter(|value| !value.is_empty());
    if parts.next().is_some() {
        return None;
    }
    if group.is_empty() || name.is_empty() || version.is_empty() {
        return None;
    }

    let mut artifact = Artifact::new(group, name).with_version(version);
    if let Some(classifier) = classifier {
        artifact = artifact.with_classifier(classifier);
    }
    if let Some(extension) = extension {
        artifact = artifact.with_extension(extension);
    }
    Some(artifact)
}

/// Strips `//` line comments and `/* */` block comments while preserving
/// quoted strings, so commented-out declarations don't pollute the result.
fn strip_comments(contents: &str) -> String {
    let mut output = String::with_capacity(contents.len());
    let mut chars = contents.chars().peekable();
    let mut in_string: Option<char> = None;

    while let Some(ch) = chars.next() {
        match in_string {
            Some(quote) => {
                output.push(ch);
                if ch == '\\' {
                    if let Some(escaped) = chars.next() {
                        output.push(escaped);
                    }
                } else if ch == quote {
                    in_string = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    in_string = Some(ch);
                    output.push(ch);
                }
                '/' if chars.peek() == Some(&'/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            output.push('\n');
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut previous = '\0';
                    for next in chars.by_ref() {
                        if previous == '*' && next == '/' {
                            break;
                        }
                        previous = next;
                    }
                    output.push(' ');
                }
                other => output.push(other),
            },
        }
    }

    output
}
