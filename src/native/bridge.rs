//! Memoizing front of the helper runner

use super::{HelperFailure, HelperRequest, HelperRunner, Workspace};
use crate::config::HelperCommand;
use crate::domain::DependencyFile;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace};

type Outcome = Result<Value, HelperFailure>;

/// Invokes one ecosystem's helper in a fresh workspace per call.
///
/// Successful results and failures the helper itself reported are
/// remembered for the bridge's lifetime, keyed by function, arguments and
/// file set. Timeouts, crashes and setup failures are not remembered so a
/// later call may retry them.
pub struct NativeResolverBridge {
    runner: Arc<dyn HelperRunner>,
    command: HelperCommand,
    timeout: Duration,
    cache: Mutex<HashMap<String, Outcome>>,
}

impl NativeResolverBridge {
    pub fn new(runner: Arc<dyn HelperRunner>, command: HelperCommand, timeout: Duration) -> Self {
        Self {
            runner,
            command,
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Helper command this bridge runs
    pub fn command(&self) -> &HelperCommand {
        &self.command
    }

    fn cache_key(function: &str, args: &Value, files: &[DependencyFile]) -> String {
        let mut hasher = DefaultHasher::new();
        files.hash(&mut hasher);
        format!("{}|{}|{:016x}", function, args, hasher.finish())
    }

    fn cached(&self, key: &str) -> Option<Outcome> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Calls `function` with `args` in a workspace holding `files`
    pub async fn invoke(&self, function: &str, args: Value, files: &[DependencyFile]) -> Outcome {
        let key = Self::cache_key(function, &args, files);
        if let Some(outcome) = self.cached(&key) {
            trace!(target: "native", function, "helper cache hit");
            return outcome;
        }

        let workspace = Workspace::with_files(files)
            .map_err(|e| HelperFailure::setup(e.to_string()))?;

        debug!(
            target: "native",
            function,
            files = files.len(),
            workspace = %workspace.path().display(),
            "invoking helper"
        );
        let request = HelperRequest::new(function, args);
        let outcome = self
            .runner
            .run(&self.command, &request, workspace.path(), self.timeout)
            .await;

        match &outcome {
            Ok(_) => debug!(target: "native", function, "helper succeeded"),
            Err(failure) => debug!(target: "native", function, error = %failure, "helper failed"),
        }

        let remember = match &outcome {
            Ok(_) => true,
            Err(failure) => failure.is_definitive(),
        };
        if remember {
            self.cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, outcome.clone());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with a fixed outcome and counts calls
    struct CountingRunner {
        calls: AtomicUsize,
        outcome: Outcome,
    }

    impl CountingRunner {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                outcome,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HelperRunner for CountingRunner {
        async fn run(
            &self,
            _command: &HelperCommand,
            _request: &HelperRequest,
            cwd: &Path,
            _timeout: Duration,
        ) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(cwd.join("requirements.in").exists());
            self.outcome.clone()
        }
    }

    fn bridge(runner: Arc<CountingRunner>) -> NativeResolverBridge {
        NativeResolverBridge::new(runner, HelperCommand::new("helper"), Duration::from_secs(5))
    }

    fn files() -> Vec<DependencyFile> {
        vec![DependencyFile::new("requirements.in", "boto3\n")]
    }

    #[tokio::test]
    async fn test_success_is_memoized() {
        let runner = CountingRunner::new(Ok(json!({"version": "1.9.0"})));
        let bridge = bridge(runner.clone());

        for _ in 0..3 {
            let value = bridge.invoke("resolve", json!({"a": 1}), &files()).await.unwrap();
            assert_eq!(value, json!({"version": "1.9.0"}));
        }
        assert_eq!(runner.calls(), 1);

        // Different arguments are a different call
        bridge.invoke("resolve", json!({"a": 2}), &files()).await.unwrap();
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_file_set_is_part_of_the_key() {
        let runner = CountingRunner::new(Ok(Value::Null));
        let bridge = bridge(runner.clone());

        bridge.invoke("resolve", Value::Null, &files()).await.unwrap();
        let changed = vec![DependencyFile::new("requirements.in", "boto3==1.0\n")];
        bridge.invoke("resolve", Value::Null, &changed).await.unwrap();
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_reported_failure_is_memoized() {
        let runner = CountingRunner::new(Err(HelperFailure::reported(None, "no match")));
        let bridge = bridge(runner.clone());

        for _ in 0..2 {
            let failure = bridge.invoke("resolve", Value::Null, &files()).await.unwrap_err();
            assert_eq!(failure.message, "no match");
        }
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let runner = CountingRunner::new(Err(HelperFailure::timeout("killed")));
        let bridge = bridge(runner.clone());

        bridge.invoke("resolve", Value::Null, &files()).await.unwrap_err();
        bridge.invoke("resolve", Value::Null, &files()).await.unwrap_err();
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_workspace_failure_is_setup() {
        let runner = CountingRunner::new(Ok(Value::Null));
        let bridge = bridge(runner.clone());

        let bad = vec![DependencyFile::new("../escape.in", "x")];
        let failure = bridge.invoke("resolve", Value::Null, &bad).await.unwrap_err();
        assert_eq!(failure.kind, super::super::FailureKind::Setup);
        assert_eq!(runner.calls(), 0);
    }
}
