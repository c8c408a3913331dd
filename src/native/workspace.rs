//! Isolated working directories for helper calls
//!
//! A helper only ever sees the files needed to resolve the graph: the
//! manifests it was pointed at, their lockfiles, and everything those
//! manifests import (followed transitively).

use crate::domain::{DependencyFile, PackageManager};
use crate::error::ResolverError;
use regex::Regex;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;
use tracing::trace;

/// `-r other.in`, `--requirement=other.in`, `-c constraints.txt`, ...
static PIP_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:-r|-c|--requirement|--constraint)(?:\s+|=)(?P<path>\S+)").unwrap()
});

/// `-e .`, `.`, `-e file:.`, `file:.#egg=pkg`, `-e ./sub`
static PIP_LOCAL_INSTALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?:-e|--editable)\s+)?(?:file:)?(?P<path>\.{1,2}(?:/[^\s#\[;]*)?)(?:[#\[;\s]|$)")
        .unwrap()
});

static EVAL_GEMFILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*eval_gemfile\s*\(?\s*(?:File\.join\()?["'](?P<path>[^"']+)["']"#).unwrap()
});

static GEMSPEC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*gemspec\b").unwrap());

const PYTHON_PROJECT_FILES: &[&str] = &["setup.py", "setup.cfg", "pyproject.toml"];

/// Lexically normalizes a file name relative to the workspace root.
///
/// Returns `None` for names that would escape the root.
fn relative_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// Name of `target` as written inside the file called `from`
fn join_relative(from: &str, target: &str) -> Option<String> {
    let base = Path::new(from).parent().unwrap_or_else(|| Path::new(""));
    relative_path(&base.join(target).to_string_lossy())
        .map(|p| p.to_string_lossy().into_owned())
}

fn normalized_name(file: &DependencyFile) -> Option<String> {
    relative_path(file.name()).map(|p| p.to_string_lossy().into_owned())
}

/// Import targets of one pip requirements file
pub(crate) fn pip_imports(file: &DependencyFile) -> Vec<String> {
    let Some(content) = file.content() else {
        return Vec::new();
    };
    let mut imports = Vec::new();
    for line in content.lines() {
        if let Some(caps) = PIP_IMPORT.captures(line) {
            imports.extend(join_relative(file.name(), &caps["path"]));
        } else if let Some(caps) = PIP_LOCAL_INSTALL.captures(line) {
            let dir = &caps["path"];
            for project_file in PYTHON_PROJECT_FILES {
                imports.extend(join_relative(file.name(), &format!("{}/{}", dir, project_file)));
            }
        }
    }
    imports
}

/// Import targets of one Gemfile
fn gemfile_imports(file: &DependencyFile, all: &[DependencyFile]) -> Vec<String> {
    let Some(content) = file.content() else {
        return Vec::new();
    };
    let mut imports = Vec::new();
    for line in content.lines() {
        if let Some(caps) = EVAL_GEMFILE.captures(line) {
            imports.extend(join_relative(file.name(), &caps["path"]));
        } else if GEMSPEC.is_match(line) {
            imports.extend(
                all.iter()
                    .filter(|f| f.name().ends_with(".gemspec"))
                    .filter_map(normalized_name),
            );
        }
    }
    imports
}

/// Files always sent alongside the entry points
fn companions(package_manager: PackageManager, name: &str) -> Vec<String> {
    let dir = Path::new(name).parent().unwrap_or_else(|| Path::new(""));
    let sibling = |n: &str| dir.join(n).to_string_lossy().into_owned();
    let mut names: Vec<String> = package_manager
        .runtime_version_file()
        .map(|f| vec![f.to_string(), sibling(f)])
        .unwrap_or_default();

    match package_manager {
        PackageManager::Bundler => {
            let file_name = Path::new(name).file_name().and_then(|n| n.to_str());
            match file_name {
                Some("Gemfile") => names.push(sibling("Gemfile.lock")),
                Some("gems.rb") => names.push(sibling("gems.locked")),
                _ => names.push(format!("{}.lock", name)),
            }
        }
        PackageManager::Pip => {}
        PackageManager::Cargo => {
            for n in ["Cargo.lock", "rust-toolchain", "rust-toolchain.toml"] {
                names.push(sibling(n));
            }
            names.push(".cargo/config".to_string());
            names.push(".cargo/config.toml".to_string());
        }
    }
    names
}

/// The subset of `files` a helper needs to resolve `entry_points`.
///
/// Imports are followed transitively. Names that are not in `files` are
/// skipped; deleted files are never included. The input order is kept.
pub fn minimal_file_set(
    package_manager: PackageManager,
    files: &[DependencyFile],
    entry_points: &[&str],
) -> Vec<DependencyFile> {
    let by_name = |name: &str| {
        files
            .iter()
            .find(|f| !f.is_deleted() && normalized_name(f).as_deref() == Some(name))
    };

    let mut wanted: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<String> = entry_points
        .iter()
        .filter_map(|n| relative_path(n))
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    while let Some(name) = queue.pop_front() {
        let Some(file) = by_name(&name) else {
            continue;
        };
        if !wanted.insert(name.clone()) {
            continue;
        }

        let mut next = companions(package_manager, &name);
        match package_manager {
            PackageManager::Pip => next.extend(pip_imports(file)),
            PackageManager::Bundler => next.extend(gemfile_imports(file, files)),
            PackageManager::Cargo => {
                // Workspace members may live anywhere below the root
                next.extend(
                    files
                        .iter()
                        .filter(|f| f.name().ends_with("Cargo.toml"))
                        .filter_map(normalized_name),
                );
            }
        }
        for import in next {
            if let Some(normalized) = relative_path(&import) {
                let normalized = normalized.to_string_lossy().into_owned();
                if !wanted.contains(&normalized) {
                    trace!(target: "native", from = name.as_str(), import = normalized.as_str(), "following import");
                    queue.push_back(normalized);
                }
            }
        }
    }

    files
        .iter()
        .filter(|f| !f.is_deleted())
        .filter(|f| normalized_name(f).is_some_and(|n| wanted.contains(&n)))
        .cloned()
        .collect()
}

/// A temporary directory holding a file set; removed on drop
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates an empty workspace
    pub fn new() -> Result<Self, ResolverError> {
        let dir = tempfile::Builder::new()
            .prefix("depresolve-")
            .tempdir()
            .map_err(|e| ResolverError::io("failed to create temporary workspace", e))?;
        Ok(Self { dir })
    }

    /// Creates a workspace containing `files` at their relative names.
    ///
    /// The workspace root stands for the project directory. A file's
    /// `directory()` locates the project inside its repository, so it is not
    /// part of the layout; names are already relative to the project.
    pub fn with_files(files: &[DependencyFile]) -> Result<Self, ResolverError> {
        let workspace = Self::new()?;
        for file in files.iter().filter(|f| !f.is_deleted()) {
            let content = file.decoded_content().map_err(|e| {
                ResolverError::invalid_request(e.to_string())
            })?;
            workspace.write(file.name(), &content)?;
        }
        Ok(workspace)
    }

    /// Root directory of the workspace
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a file, creating parent directories
    pub fn write(&self, name: &str, content: &[u8]) -> Result<(), ResolverError> {
        let relative = relative_path(name).ok_or_else(|| {
            ResolverError::invalid_request(format!(
                "dependency file '{}' points outside the project",
                name
            ))
        })?;
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ResolverError::io(format!("failed to create {}", parent.display()), e))?;
        }
        std::fs::write(&path, content)
            .map_err(|e| ResolverError::io(format!("failed to write {}", path.display()), e))
    }
}
