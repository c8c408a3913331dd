//! pip-compile resolver
//!
//! Candidate versions come from PyPI like any other ecosystem, but whether a
//! candidate is installable is decided by compiling the project's `.in`
//! manifests with the candidate pinned. Compilation runs in the native
//! helper, one call per compile target. Projects with plain requirements
//! files and no `.in` manifests are checked against PyPI listings instead.

use super::{ResolutionContext, VersionResolver};
use crate::domain::{normalize_python_name, DependencyFile, PackageManager, Version};
use crate::error::ResolverError;
use crate::native::{
    minimal_file_set, pip_imports, translate, FailureContext, FailureKind, HelperFailure,
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Helper function that runs pip-compile
const RESOLVE: &str = "resolve";

/// Packages pip-compile refuses to pin unless told to
const UNSAFE_PACKAGES: &[&str] = &["setuptools", "distribute", "pip"];

/// A manifest to compile and the output it regenerates
#[derive(Debug, Clone, PartialEq, Eq)]
struct CompileTarget {
    manifest: String,
    output: Option<String>,
}

fn is_manifest(file: &DependencyFile) -> bool {
    !file.is_deleted() && file.name().ends_with(".in")
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// Generated `.txt` for a manifest: same stem, or one that names it
fn generated_output(manifest: &str, files: &[DependencyFile]) -> Option<String> {
    let txt: Vec<&DependencyFile> = files
        .iter()
        .filter(|f| !f.is_deleted() && f.name().ends_with(".txt"))
        .collect();

    let same_stem = format!("{}.txt", stem(manifest));
    if let Some(file) = txt.iter().find(|f| f.name() == same_stem) {
        return Some(file.name().to_string());
    }

    let basename = Path::new(manifest)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(manifest);
    txt.iter()
        .find(|f| {
            f.content().is_some_and(|c| {
                c.lines()
                    .take_while(|l| l.starts_with('#') || l.trim().is_empty())
                    .any(|l| l.contains("pip-compile") && l.contains(basename))
            })
        })
        .map(|f| f.name().to_string())
}

/// Manifests to compile.
///
/// Manifests with a generated output are compiled; when none has one, every
/// manifest that no other manifest imports is compiled instead.
fn compile_targets(files: &[DependencyFile]) -> Vec<CompileTarget> {
    let manifests: Vec<&DependencyFile> = files.iter().filter(|f| is_manifest(f)).collect();

    let with_output: Vec<CompileTarget> = manifests
        .iter()
        .filter_map(|m| {
            generated_output(m.name(), files).map(|output| CompileTarget {
                manifest: m.name().to_string(),
                output: Some(output),
            })
        })
        .collect();
    if !with_output.is_empty() {
        return with_output;
    }

    let imported: Vec<String> = manifests.iter().flat_map(|m| pip_imports(m)).collect();
    manifests
        .iter()
        .filter(|m| !imported.iter().any(|i| i == m.name()))
        .map(|m| CompileTarget {
            manifest: m.name().to_string(),
            output: None,
        })
        .collect()
}

/// Matches a requirement line for `name`, with extras, specifier and markers
fn requirement_line(name: &str) -> Option<Regex> {
    let parts: Vec<String> = normalize_python_name(name)
        .split('-')
        .map(regex::escape)
        .collect();
    Regex::new(&format!(
        r"(?i)^(?P<name>{})(?P<extras>\[[^\]]*\])?\s*(?P<spec>[<>=!~@][^;#]*?)?\s*(?P<rest>[;#].*)?$",
        parts.join(r"[-_.]+")
    ))
    .ok()
}

/// Replaces the specifier of `name` in `content`, keeping extras and markers
fn override_requirement(content: &str, name: &str, specifier: &str) -> String {
    let Some(pattern) = requirement_line(name) else {
        return content.to_string();
    };
    let mut out: Vec<String> = Vec::new();
    for line in content.lines() {
        match pattern.captures(line) {
            Some(caps) => {
                let extras = caps.name("extras").map_or("", |m| m.as_str());
                let rest = caps
                    .name("rest")
                    .map(|m| format!(" {}", m.as_str()))
                    .unwrap_or_default();
                out.push(format!("{}{}{}{}", &caps["name"], extras, specifier, rest));
            }
            None => out.push(line.to_string()),
        }
    }
    let mut joined = out.join("\n");
    if content.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

/// Resolves pip dependencies with pip-compile through the native helper
#[derive(Debug, Clone, Copy, Default)]
pub struct PipCompileResolver;

impl PipCompileResolver {
    pub fn new() -> Self {
        Self
    }

    /// Dependency files with the requirement for the dependency replaced.
    ///
    /// A sub-dependency has no line to replace, so the pin is appended to
    /// every compile target instead.
    fn with_override(
        context: &ResolutionContext,
        targets: &[CompileTarget],
        specifier: &str,
    ) -> Vec<DependencyFile> {
        let dependency = context.dependency();
        let declaring: Vec<&str> = dependency.requirements.iter().map(|r| r.file.as_str()).collect();

        context
            .request()
            .dependency_files
            .iter()
            .map(|file| {
                let content = file.content().unwrap_or_default();
                let updated = if dependency.is_sub_dependency() {
                    if targets.iter().any(|t| t.manifest == file.name()) {
                        let separator = if content.is_empty() || content.ends_with('\n') { "" } else { "\n" };
                        Some(format!("{}{}{}{}\n", content, separator, dependency.name, specifier))
                    } else {
                        None
                    }
                } else if declaring.contains(&file.name()) {
                    Some(override_requirement(content, &dependency.name, specifier))
                } else {
                    None
                };
                match updated {
                    Some(content) => rebuild(file, content),
                    None => file.clone(),
                }
            })
            .collect()
    }

    /// Compiles every target; the highest version of the dependency wins.
    ///
    /// `None` means the dependency is absent from every compiled output.
    async fn compile(
        context: &ResolutionContext,
        specifier: Option<&str>,
    ) -> Result<Option<Version>, HelperFailure> {
        let original = &context.request().dependency_files;
        let targets = compile_targets(original);
        let files = match specifier {
            Some(specifier) => Self::with_override(context, &targets, specifier),
            None => original.clone(),
        };

        let name = &context.dependency().name;
        let allow_unsafe = UNSAFE_PACKAGES.contains(&normalize_python_name(name).as_str());
        let python_version = context.runtime().map(|v| v.to_string());

        let mut resolved: Option<Version> = None;
        for target in &targets {
            let mut entry_points = vec![target.manifest.as_str()];
            entry_points.extend(target.output.as_deref());
            let call_files = minimal_file_set(PackageManager::Pip, &files, &entry_points);
            let args = json!({
                "manifest": target.manifest,
                "output_file": target.output,
                "dependency": name,
                "allow_unsafe": allow_unsafe,
                "python_version": python_version,
                "credentials": context.credentials(),
            });
            debug!(
                target: "engine",
                manifest = target.manifest.as_str(),
                specifier = specifier.unwrap_or("(unchanged)"),
                "compiling"
            );
            let value = context.bridge().invoke(RESOLVE, args, &call_files).await?;
            let version = resolved_version(&value)
                .and_then(|v| Version::parse(context.scheme(), &v));
            resolved = resolved.max(version);
        }
        Ok(resolved)
    }

    /// Runs a compile with `specifier`; a rejection answers `Ok(None)`
    /// unless the untouched files fail too, whose error is raised instead.
    async fn compile_candidate(
        context: &ResolutionContext,
        specifier: &str,
    ) -> Result<Option<Option<Version>>, ResolverError> {
        let failure_context = FailureContext::GraphResolution {
            dependency: context.dependency().name.clone(),
        };
        let failure = match Self::compile(context, Some(specifier)).await {
            Ok(version) => return Ok(Some(version)),
            Err(failure) => failure,
        };
        if matches!(failure.kind, FailureKind::Setup | FailureKind::Timeout) {
            return Err(translate(&failure, &failure_context));
        }

        debug!(target: "engine", error = %failure, "override rejected; checking untouched files");
        match Self::compile(context, None).await {
            Ok(_) => Ok(None),
            Err(original) => Err(translate(&original, &failure_context)),
        }
    }
}

/// Copy of `file` with new text content
fn rebuild(file: &DependencyFile, content: String) -> DependencyFile {
    DependencyFile::new(file.name(), content)
        .with_directory(file.directory())
        .with_support_file(file.is_support_file())
        .with_deleted(file.is_deleted())
}

/// `{"version": "1.2.3"}`, a bare string, or null
fn resolved_version(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("version").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

/// Plain requirements files have nothing to compile; they are checked
/// against the registry like any other ecosystem
fn has_compile_targets(context: &ResolutionContext) -> bool {
    let found = !compile_targets(&context.request().dependency_files).is_empty();
    if !found {
        debug!(target: "engine", "no pip-compile manifests; checking requirements only");
    }
    found
}

#[async_trait]
impl VersionResolver for PipCompileResolver {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Pip
    }

    async fn is_resolvable(
        &self,
        context: &ResolutionContext,
        candidate: &Version,
    ) -> Result<bool, ResolverError> {
        if !has_compile_targets(context) {
            return super::simple::is_resolvable(context, candidate);
        }
        let specifier = format!("=={}", candidate);
        Ok(Self::compile_candidate(context, &specifier).await?.is_some())
    }

    async fn latest_resolvable_version(
        &self,
        context: &ResolutionContext,
        requirement: &str,
    ) -> Result<Option<Version>, ResolverError> {
        if !has_compile_targets(context) {
            return super::simple::latest_resolvable_version(context, requirement).await;
        }
        Ok(Self::compile_candidate(context, requirement).await?.flatten())
    }
}
