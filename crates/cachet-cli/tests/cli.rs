//! End-to-end tests for the `cachet` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cachet(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cachet").unwrap();
    cmd.arg("--cwd")
        .arg(dir)
        .arg("--no-color")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(
        src.join("index.ts"),
        "import { greet } from './greet';\nimport './style.css';\ngreet(process.env.NODE_ENV);\n",
    )
    .unwrap();
    fs::write(src.join("greet.ts"), "export function greet(who) { console.log(who); }\n").unwrap();
    fs::write(src.join("style.css"), "body { margin: 0; }\n").unwrap();
    fs::write(temp.path().join("cachet.toml"), config).unwrap();
    temp
}

const CONFIG: &str = r#"
[build]
extension_priority = ["ts", "js"]

[build.entry_points]
app = "src/index"
"#;

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("cachet")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_release_build_writes_hashed_assets() {
    let temp = project(CONFIG);

    cachet(temp.path())
        .args(["build", "--mode", "production", "--print-manifest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"app.js\": \"/app."))
        .stdout(predicate::str::contains("\"app.css\""))
        .stdout(predicate::str::contains("\"index.html\": \"/index.html\""));

    let dist = temp.path().join("dist");
    let manifest = fs::read_to_string(dist.join("asset-manifest.json")).unwrap();
    assert!(!manifest.contains("runtime.js"), "runtime is inlined: {manifest}");

    let html = fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(html.contains("<script defer src=\"/app."));
    assert!(html.contains("rel=\"stylesheet\""));
    let leftovers: Vec<_> = fs::read_dir(&dist)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_development_build_uses_stable_names() {
    let temp = project(CONFIG);

    cachet(temp.path()).arg("build").assert().success();

    let dist = temp.path().join("dist");
    assert!(dist.join("app.js").is_file());
    assert!(dist.join("runtime.js").is_file());
    let script = fs::read_to_string(dist.join("app.js")).unwrap();
    assert!(script.contains("\"development\""));
}

#[test]
fn test_rebuild_with_same_sources_is_byte_identical() {
    let temp = project(CONFIG);
    let manifest = temp.path().join("dist/asset-manifest.json");

    cachet(temp.path()).args(["build", "-m", "production"]).assert().success();
    let first = fs::read_to_string(&manifest).unwrap();
    cachet(temp.path()).args(["build", "-m", "production"]).assert().success();
    assert_eq!(fs::read_to_string(&manifest).unwrap(), first);
}

#[test]
fn test_unresolvable_entry_fails() {
    let temp = project(CONFIG);

    cachet(temp.path())
        .args(["build", "--entry", "app=src/missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot resolve"));
    assert!(!temp.path().join("dist/asset-manifest.json").exists());
}

#[test]
fn test_missing_entries_is_a_config_error() {
    let temp = project("[build]\n");

    cachet(temp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no entry points"));
}

#[test]
fn test_check_reports_unbalanced_source() {
    let temp = project(CONFIG);
    fs::write(
        temp.path().join("src/greet.ts"),
        "export function greet(who) { console.log(who);\n",
    )
    .unwrap();

    cachet(temp.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("src/greet.ts"))
        .stderr(predicate::str::contains("unclosed"));
    assert!(!temp.path().join("dist").exists());
}

#[test]
fn test_check_passes_clean_project() {
    let temp = project(CONFIG);

    cachet(temp.path())
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("No problems found"));
}
