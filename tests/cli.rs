//! End-to-end: write a manifest, run the tempo binary against it, check output.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const MANIFEST: &str = r#"
[settings]
root = "app"
exclude = ["debug_*"]

[[target]]
container = "app.geometry"
name = "Point"
class_like = true

[[target]]
container = "app.geometry.Point.instance"
name = "area"

[[target]]
container = "app.geometry"
name = "distance"

[[target]]
container = "app"
name = "main"

[[target]]
container = "app"
name = "debug_dump"
"#;

fn tempo(args: &[&str], manifest: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tempo"))
        .args(args)
        .arg(manifest)
        .env_remove("RUST_LOG")
        .env_remove("TEMPO_REAL_TIME")
        .env_remove("TEMPO_TIME_UNIT")
        .output()
        .expect("failed to run tempo")
}

fn write_manifest(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("tempo.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn check_reports_summary() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_manifest(tmp.path(), MANIFEST);

    let output = tempo(&["check"], &path);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "tempo check failed:\nstderr: {stderr}\nstdout: {stdout}"
    );
    // app, app.geometry, Point, Point.instance
    assert_eq!(
        stdout.trim(),
        "instrumented 3 functions in 4 containers",
        "stderr: {stderr}"
    );
    assert!(stderr.contains("skipped 2"), "stderr: {stderr}");
}

#[test]
fn check_fails_on_duplicate_target() {
    let tmp = tempfile::tempdir().unwrap();
    let contents = format!("{MANIFEST}\n[[target]]\ncontainer = \"app\"\nname = \"main\"\n");
    let path = write_manifest(tmp.path(), &contents);

    let output = tempo(&["check"], &path);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr: {stderr}");
    assert!(stderr.contains("error:"), "stderr: {stderr}");
    assert!(stderr.contains("app.main"), "should name the duplicate: {stderr}");
    assert!(output.stdout.is_empty(), "nothing published on failure");
}

#[test]
fn check_fails_on_missing_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tempo(&["check"], &tmp.path().join("absent.toml"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr: {stderr}");
    assert!(stderr.contains("absent.toml"), "stderr: {stderr}");
}

#[test]
fn tree_prints_containers() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_manifest(tmp.path(), MANIFEST);

    let output = tempo(&["tree"], &path);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "app [namespace] functions=1", "{stdout}");
    assert!(lines.contains(&"  geometry [namespace] functions=1 types=1"), "{stdout}");
    assert!(lines.contains(&"    Point [type]"), "{stdout}");
    assert!(lines.contains(&"        - area"), "{stdout}");
    assert!(!stdout.contains("debug_dump"), "excluded target in tree: {stdout}");
}

#[test]
fn verbose_logs_setup() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_manifest(tmp.path(), MANIFEST);

    let output = tempo(&["--verbose", "check"], &path);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("registered function"), "stderr: {stderr}");
}
