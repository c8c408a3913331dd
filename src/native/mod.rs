//! Native resolver bridge
//!
//! Full-graph resolution is delegated to a per-ecosystem helper executable.
//! Each call is one subprocess speaking a JSON envelope:
//!
//! - request on stdin: `{"function": "...", "args": {...}}`
//! - response on stdout: `{"result": ...}` or `{"error": "...", "error_class": "..."}`
//!
//! This module provides:
//! - The message types of that protocol
//! - The subprocess runner with a bounded lifetime
//! - Isolated temporary workspaces with the minimal file set
//! - The memoizing bridge
//! - Translation of raw failures into domain errors

mod bridge;
mod runner;
mod translator;
mod workspace;

pub use bridge::NativeResolverBridge;
pub use runner::{HelperRunner, SystemHelperRunner};
pub use translator::{translate, FailureContext, TRANSLATION_TABLE_VERSION};
pub use workspace::{minimal_file_set, Workspace};
pub(crate) use workspace::pip_imports;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Request envelope sent to a helper
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelperRequest {
    pub function: String,
    pub args: Value,
}

impl HelperRequest {
    pub fn new(function: impl Into<String>, args: Value) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// Response envelope written by a helper
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelperResponse {
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_class: Option<String>,
}

/// `{"result": null}` is a result; only a missing key is `None`
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl HelperResponse {
    /// Splits the envelope into a success value or a reported failure.
    ///
    /// Returns `None` when the envelope carries neither.
    pub fn into_outcome(self) -> Option<Result<Value, HelperFailure>> {
        match (self.error, self.result) {
            (Some(message), _) => Some(Err(HelperFailure::reported(self.error_class, message))),
            (None, Some(result)) => Some(Ok(result)),
            (None, None) => None,
        }
    }
}

/// How a helper call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The helper ran and reported an error
    Reported,
    /// The helper exited without a usable response
    Crashed { exit_code: Option<i32> },
    /// The helper exceeded its time budget and was killed
    Timeout,
    /// The helper could not be started or its workspace could not be prepared
    Setup,
}

/// Raw failure of one helper call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperFailure {
    pub kind: FailureKind,
    /// Error class tag reported by the helper
    pub error_class: Option<String>,
    pub message: String,
}

impl HelperFailure {
    pub fn reported(error_class: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Reported,
            error_class,
            message: message.into(),
        }
    }

    pub fn crashed(exit_code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Crashed { exit_code },
            error_class: None,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            error_class: None,
            message: message.into(),
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Setup,
            error_class: None,
            message: message.into(),
        }
    }

    /// Whether a repeat of the same call would fail the same way
    pub fn is_definitive(&self) -> bool {
        self.kind == FailureKind::Reported
    }
}

impl fmt::Display for HelperFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_class {
            Some(class) => write!(f, "{}: {}", class, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
