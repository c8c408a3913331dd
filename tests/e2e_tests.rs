//! End-to-end tests for the depresolve CLI
//!
//! These tests verify:
//! - Each subcommand prints its answer in text and JSON
//! - Exit codes: 0 success, 1 usage/config/I/O failure, 2 resolution error
//! - Configuration files redirect registries and helpers

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GEMFILE: &str = "source \"https://rubygems.org\"\n\ngem \"business\", \"~> 1.4.0\"\n";

fn depresolve() -> Command {
    let mut cmd = Command::cargo_bin("depresolve").expect("binary should be built");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn request_json(source: Option<Value>) -> Value {
    let mut requirement = json!({"file": "Gemfile", "requirement": "~> 1.4.0"});
    if let Some(source) = source {
        requirement["source"] = source;
    }
    json!({
        "dependency": {
            "name": "business",
            "version": "1.4.0",
            "package_manager": "bundler",
            "requirements": [requirement]
        },
        "dependency_files": [
            {"name": "Gemfile", "content": GEMFILE}
        ]
    })
}

fn write_request(dir: &Path, request: &Value) -> PathBuf {
    let path = dir.join("request.json");
    fs::write(&path, serde_json::to_string_pretty(request).unwrap()).unwrap();
    path
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("depresolve.toml");
    fs::write(&path, content).unwrap();
    path
}

fn mock_rubygems(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/versions/business.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"number": "1.5.0"}, {"number": "1.4.0"}, {"number": "1.3.0"}]"#);
    });
}

/// Temp dir with a request and a config pointing at `server`
fn registry_project(server: &MockServer, request: &Value) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let request = write_request(dir.path(), request);
    let config = write_config(
        dir.path(),
        &format!("rubygems_url = \"{}\"\nmax_retries = 0\n", server.base_url()),
    );
    (dir, request, config)
}

mod usage {
    use super::*;

    #[test]
    fn test_help_lists_subcommands() {
        depresolve()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("latest"))
            .stdout(predicate::str::contains("security-fix"))
            .stdout(predicate::str::contains("latest-resolvable"));
    }

    #[test]
    fn test_version_flag() {
        depresolve()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("depresolve"));
    }

    #[test]
    fn test_unknown_flag_exits_one() {
        depresolve()
            .args(["latest", "--request", "r.json", "--bogus"])
            .assert()
            .code(1);
    }

    #[test]
    fn test_missing_request_file_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        depresolve()
            .args(["latest", "--request"])
            .arg(dir.path().join("missing.json"))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("failed to read request file"));
    }

    #[test]
    fn test_malformed_request_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        fs::write(&path, "{\"dependency\": 42}").unwrap();
        depresolve()
            .args(["latest", "--request"])
            .arg(&path)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("invalid request file"));
    }

    #[test]
    fn test_invalid_config_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let request = write_request(dir.path(), &request_json(None));
        let config = write_config(dir.path(), "unknown_key = true\n");
        depresolve()
            .args(["latest", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .code(1);
    }

    #[test]
    fn test_requirement_in_unknown_file_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request_json(None);
        request["dependency"]["requirements"][0]["file"] = json!("gems.rb");
        let path = write_request(dir.path(), &request);
        depresolve()
            .args(["latest", "-q", "--request"])
            .arg(&path)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("gems.rb"));
    }
}

mod resolution {
    use super::*;

    #[test]
    fn test_path_source_has_no_update() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_json(Some(json!({"type": "path", "path": "vendor/business"})));
        let path = write_request(dir.path(), &request);
        depresolve()
            .args(["latest", "--quiet", "--request"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("no newer version"));
    }

    #[test]
    fn test_latest_text_output() {
        let server = MockServer::start();
        mock_rubygems(&server);
        let (_dir, request, config) = registry_project(&server, &request_json(None));

        depresolve()
            .args(["latest", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("business"))
            .stdout(predicate::str::contains("1.5.0"));
    }

    #[test]
    fn test_latest_json_output() {
        let server = MockServer::start();
        mock_rubygems(&server);
        let (_dir, request, config) = registry_project(&server, &request_json(None));

        let output = depresolve()
            .args(["latest", "--json", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .output()
            .unwrap();
        assert!(output.status.success());

        let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
        assert_eq!(json["dependency"], "business");
        assert_eq!(json["operation"], "latest");
        assert_eq!(json["latest"]["version"], "1.5.0");
    }

    #[test]
    fn test_resolvable_and_latest_resolvable() {
        let server = MockServer::start();
        mock_rubygems(&server);
        let (_dir, request, config) = registry_project(&server, &request_json(None));

        depresolve()
            .args(["resolvable", "-q", "--version", "1.5.0", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("not resolvable"));

        depresolve()
            .args(["latest-resolvable", "-q", "--requirement", "< 1.5", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("1.4.0"));
    }

    #[test]
    fn test_security_fix() {
        let server = MockServer::start();
        mock_rubygems(&server);
        let mut request = request_json(None);
        request["dependency"]["version"] = json!("1.3.0");
        request["security_advisories"] = json!([{
            "dependency_name": "business",
            "package_manager": "bundler",
            "vulnerable_versions": ["< 1.4.0"]
        }]);
        let (_dir, request, config) = registry_project(&server, &request);

        depresolve()
            .args(["security-fix", "-q", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("1.4.0"));
    }

    #[test]
    fn test_all_ignored_exits_two_with_json_error() {
        let server = MockServer::start();
        mock_rubygems(&server);
        let mut request = request_json(None);
        request["ignored_versions"] = json!([">= 0"]);
        request["raise_on_ignored"] = json!(true);
        let (_dir, request, config) = registry_project(&server, &request);

        let output = depresolve()
            .args(["latest", "--json", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));

        let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
        assert_eq!(json["error_type"], "all_versions_ignored");
        assert_eq!(json["details"], json!({}));
    }

    #[test]
    fn test_domain_error_text_goes_to_stderr() {
        let server = MockServer::start();
        mock_rubygems(&server);
        let mut request = request_json(None);
        request["ignored_versions"] = json!([">= 0"]);
        request["raise_on_ignored"] = json!(true);
        let (_dir, request, config) = registry_project(&server, &request);

        depresolve()
            .args(["latest", "--quiet", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .code(2)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("all_versions_ignored"));
    }
}

#[cfg(unix)]
mod helpers {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_helper(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("helper.sh");
        fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn private_request() -> Value {
        request_json(Some(
            json!({"type": "registry", "url": "https://repo.fury.io/greysteil/"}),
        ))
    }

    #[test]
    fn test_private_registry_through_helper_script() {
        let dir = tempfile::tempdir().unwrap();
        let helper = write_helper(
            dir.path(),
            r#"echo '{"result": ["1.5.0", "1.9.0", "1.10.0.beta"]}'"#,
        );
        let request = write_request(dir.path(), &private_request());
        let config = write_config(
            dir.path(),
            &format!("[helpers.bundler]\nprogram = \"{}\"\n", helper.display()),
        );

        depresolve()
            .args(["latest", "-q", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("1.9.0"));
    }

    #[test]
    fn test_helper_auth_failure_exits_two() {
        let dir = tempfile::tempdir().unwrap();
        let helper = write_helper(
            dir.path(),
            r#"echo '{"error": "Authentication is required for repo.fury.io.", "error_class": "Bundler::Fetcher::AuthenticationRequiredError"}'"#,
        );
        let request = write_request(dir.path(), &private_request());
        let config = write_config(
            dir.path(),
            &format!("[helpers.bundler]\nprogram = \"{}\"\n", helper.display()),
        );

        let output = depresolve()
            .args(["latest", "--json", "--request"])
            .arg(&request)
            .arg("--config")
            .arg(&config)
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));

        let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
        assert_eq!(json["error_type"], "private_source_authentication_failure");
        assert_eq!(json["details"]["source"], "repo.fury.io");
    }
}
