//! Manifest, lockfile and support files handed to the engine

use crate::error::DependencyFileError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// How `content` is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContentEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// A file in the dependency file set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawDependencyFile")]
pub struct DependencyFile {
    name: String,
    content: Option<String>,
    directory: String,
    #[serde(rename = "type")]
    kind: String,
    support_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    symlink_target: Option<String>,
    content_encoding: ContentEncoding,
    deleted: bool,
}

#[derive(Deserialize)]
struct RawDependencyFile {
    name: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default = "root_directory")]
    directory: String,
    #[serde(rename = "type", default = "file_kind")]
    kind: String,
    #[serde(default)]
    support_file: bool,
    #[serde(default)]
    symlink_target: Option<String>,
    #[serde(default)]
    content_encoding: ContentEncoding,
    #[serde(default)]
    deleted: bool,
}

fn root_directory() -> String {
    "/".to_string()
}

fn file_kind() -> String {
    "file".to_string()
}

impl TryFrom<RawDependencyFile> for DependencyFile {
    type Error = DependencyFileError;

    fn try_from(raw: RawDependencyFile) -> Result<Self, Self::Error> {
        let mut file = DependencyFile::new(raw.name, "")
            .with_directory(&raw.directory)
            .with_support_file(raw.support_file)
            .with_content_encoding(raw.content_encoding)
            .with_deleted(raw.deleted)
            .with_kind(raw.kind, raw.symlink_target)?;
        file.content = raw.content;
        Ok(file)
    }
}

/// Directories always start with exactly one `/`
fn clean_directory(directory: &str) -> String {
    format!("/{}", directory.trim_start_matches('/'))
}

/// Lexical normalization: drops `.` and resolves `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl DependencyFile {
    /// Creates a regular UTF-8 file in the root directory
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Some(content.into()),
            directory: root_directory(),
            kind: file_kind(),
            support_file: false,
            symlink_target: None,
            content_encoding: ContentEncoding::Utf8,
            deleted: false,
        }
    }

    /// Sets the directory (builder pattern)
    pub fn with_directory(mut self, directory: &str) -> Self {
        self.directory = clean_directory(directory);
        self
    }

    /// Marks the file as a support file (builder pattern)
    pub fn with_support_file(mut self, support_file: bool) -> Self {
        self.support_file = support_file;
        self
    }

    /// Sets the content encoding (builder pattern)
    pub fn with_content_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.content_encoding = encoding;
        self
    }

    /// Marks the file as deleted (builder pattern)
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Sets the file type and symlink target.
    ///
    /// A target must be given exactly when the type is `symlink`.
    pub fn with_kind(
        mut self,
        kind: impl Into<String>,
        symlink_target: Option<String>,
    ) -> Result<Self, DependencyFileError> {
        let kind = kind.into();
        match (kind == "symlink", symlink_target.is_some()) {
            (true, false) => {
                return Err(DependencyFileError::SymlinkWithoutTarget { name: self.name })
            }
            (false, true) => {
                return Err(DependencyFileError::TargetWithoutSymlink { name: self.name })
            }
            _ => {}
        }
        self.kind = kind;
        self.symlink_target = symlink_target;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn symlink_target(&self) -> Option<&str> {
        self.symlink_target.as_deref()
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        self.content_encoding
    }

    pub fn is_support_file(&self) -> bool {
        self.support_file
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Base64-encoded files are binary
    pub fn is_binary(&self) -> bool {
        self.content_encoding == ContentEncoding::Base64
    }

    /// Directory joined with the basename of the name, lexically normalized
    pub fn path(&self) -> String {
        let basename = Path::new(&self.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        normalize(&Path::new(&self.directory).join(basename))
            .to_string_lossy()
            .into_owned()
    }

    /// Content as bytes, decoding base64 when the file is binary
    pub fn decoded_content(&self) -> Result<Vec<u8>, DependencyFileError> {
        let content = self.content.as_deref().unwrap_or_default();
        if !self.is_binary() {
            return Ok(content.as_bytes().to_vec());
        }
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map_err(|e| DependencyFileError::InvalidBase64 {
                name: self.name.clone(),
                message: e.to_string(),
            })
    }

    #[allow(clippy::type_complexity)]
    fn identity(
        &self,
    ) -> (
        &str,
        Option<&str>,
        &str,
        &str,
        Option<&str>,
        ContentEncoding,
        bool,
    ) {
        (
            &self.name,
            self.content.as_deref(),
            &self.directory,
            &self.kind,
            self.symlink_target.as_deref(),
            self.content_encoding,
            self.deleted,
        )
    }
}

// support_file does not take part in identity
impl PartialEq for DependencyFile {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for DependencyFile {}

impl Hash for DependencyFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
