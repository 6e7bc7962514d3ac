//! Integration tests for the forjj binary.
//!
//! Plugin documents come from a temporary contribution directory passed with
//! `--contribs-repo`; the user configuration is isolated in a temporary home.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

const GITHUB: &str = r#"
plugin: github
runtime:
  service:
    socket: github.sock
task_flags:
  common:
    forjj-organization:
    server:
      help: GitHub server
      default: github.com
  create:
    token:
      help: GitHub token
      required: true
      secure: true
  maintain:
    forjj-workspace-mount:
"#;

const JENKINS: &str = r#"
plugin: jenkins
task_flags:
  create:
    url:
      default: http://jenkins.local
"#;

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        for (driver_type, driver, doc) in [("upstream", "github", GITHUB), ("ci", "jenkins", JENKINS)] {
            let dir = temp.path().join("contribs").join(driver_type).join(driver);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{}.yaml", driver)), doc).unwrap();
        }
        fs::create_dir_all(temp.path().join("home")).unwrap();
        Self { temp }
    }

    fn contribs(&self) -> PathBuf {
        self.temp.path().join("contribs")
    }

    fn workspace(&self) -> PathBuf {
        self.temp.path().join("acme")
    }

    fn state_dir(&self) -> PathBuf {
        self.workspace().join(".forj-workspace")
    }

    fn forjj(&self) -> Command {
        let mut cmd = Command::cargo_bin("forjj").unwrap();
        cmd.current_dir(self.temp.path())
            .env("HOME", self.temp.path().join("home"))
            .env("XDG_CONFIG_HOME", self.temp.path().join("home/.config"))
            .env_remove("FORJJ_CONFIG")
            .env_remove("FORJJ_WORKSPACE")
            .env_remove("CONTRIBS_REPO")
            .env_remove("RUST_LOG");
        cmd
    }

    fn create(&self, extra: &[&str]) -> Command {
        let mut cmd = self.forjj();
        cmd.arg("create")
            .arg(self.workspace())
            .args(["--apps", "upstream:github:git1", "-O", "acme"])
            .arg("--contribs-repo")
            .arg(self.contribs())
            .args(extra);
        cmd
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn help_lists_verbs() {
    Fixture::new()
        .forjj()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create").and(predicate::str::contains("maintain")));
}

#[test]
fn missing_verb_is_a_usage_error() {
    Fixture::new().forjj().assert().failure();
}

#[test]
fn create_runs_create_and_maintain() {
    let fixture = Fixture::new();

    fixture
        .create(&["--git1-token", "xyz"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""action":"create""#)
                .and(predicate::str::contains(r#""action":"maintain""#))
                .and(predicate::str::contains(r#""forjj-organization":"acme""#))
                .and(predicate::str::contains("xyz").not()),
        );

    let state = read(&fixture.state_dir().join("forjj.toml"));
    assert!(state.contains("git1"));
    assert!(state.contains("organization = \"acme\""));
    let credentials = read(&fixture.state_dir().join("creds-forjj.yml"));
    assert!(credentials.contains("token"));
}

#[test]
fn no_maintain_stops_after_create() {
    let fixture = Fixture::new();

    fixture
        .create(&["--git1-token", "xyz", "--no-maintain"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""action":"maintain""#).not());
}

#[test]
fn missing_required_flag_is_named() {
    let fixture = Fixture::new();

    fixture
        .create(&[])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--git1-token"));
    assert!(!fixture.state_dir().join("forjj.toml").exists());
}

#[test]
fn later_runs_reuse_saved_options_and_workspace() {
    let fixture = Fixture::new();
    fixture.create(&["--git1-token", "xyz"]).assert().success();

    fixture
        .forjj()
        .arg("maintain")
        .arg("-W")
        .arg(fixture.workspace())
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""instance":"git1""#)
                .and(predicate::str::contains(r#""action":"maintain""#)),
        );
}

#[test]
fn list_masks_secure_values() {
    let fixture = Fixture::new();
    fixture.create(&["--git1-token", "xyz"]).assert().success();

    fixture
        .forjj()
        .arg("list")
        .arg("--workspace")
        .arg(fixture.workspace())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--git1-token")
                .and(predicate::str::contains("token=********"))
                .and(predicate::str::contains("xyz").not()),
        );
}

#[test]
fn duplicate_instance_fails_before_parsing() {
    let fixture = Fixture::new();

    fixture
        .forjj()
        .arg("update")
        .args(["--apps", "upstream:github:shared,ci:jenkins:shared"])
        .arg("--contribs-repo")
        .arg(fixture.contribs())
        .args(["--not-a-flag", "value"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already registered"));
}

#[test]
fn unavailable_plugin_is_skipped() {
    let fixture = Fixture::new();

    fixture
        .create(&["--apps", "ci:missing", "--git1-token", "xyz"])
        .assert()
        .success()
        .stderr(predicate::str::contains("skipped"))
        .stdout(predicate::str::contains(r#""instance":"git1""#));
}

#[test]
fn add_then_remove_an_instance() {
    let fixture = Fixture::new();
    fixture.create(&["--git1-token", "xyz"]).assert().success();

    fixture
        .forjj()
        .arg("add")
        .arg("-W")
        .arg(fixture.workspace())
        .args(["--apps", "ci:jenkins:ci1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""instance":"ci1""#));
    assert!(read(&fixture.state_dir().join("forjj.toml")).contains("ci1"));

    fixture
        .forjj()
        .arg("remove")
        .arg("-W")
        .arg(fixture.workspace())
        .arg("ci1")
        .assert()
        .success();
    assert!(!read(&fixture.state_dir().join("forjj.toml")).contains("ci1"));
}
