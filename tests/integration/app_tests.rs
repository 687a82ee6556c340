use clap::Parser;
use dupsort::cli::Cli;
use dupsort::error::ExitCode;
use dupsort::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["dupsort", "--quiet", "--no-color"];
    argv.extend_from_slice(args);
    run_app(Cli::parse_from(argv))
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_dedupe_writes_hardlink_script() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("photos");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("a.jpg"), b"identical").unwrap();
    fs::write(tree.join("b.jpg"), b"identical").unwrap();
    fs::write(tree.join("c.jpg"), b"different").unwrap();
    let script = dir.path().join("plan.sh");
    let catalog = dir.path().join("state/catalog.db");

    let code = run(&[
        "dedupe",
        s(&tree),
        "hardlink",
        "--script",
        s(&script),
        "--catalog",
        s(&catalog),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(catalog.exists());
    let text = fs::read_to_string(&script).unwrap();
    let root = fs::canonicalize(&tree).unwrap();
    assert!(text.contains(&format!(
        "ln -f '{}' '{}'",
        root.join("a.jpg").display(),
        root.join("b.jpg").display()
    )));
    // Planning never touches the tree.
    assert_eq!(fs::read(tree.join("b.jpg")).unwrap(), b"identical");
}

#[test]
fn test_dedupe_json_output() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("x"), b"dup").unwrap();
    fs::write(tree.join("y"), b"dup").unwrap();
    let out = dir.path().join("plan.json");

    let code = run(&[
        "dedupe",
        s(&tree),
        "check",
        "--format",
        "json",
        "--script",
        s(&out),
        "--catalog",
        s(&dir.path().join("c.db")),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["mode"], "check");
    assert_eq!(value["classes"].as_array().unwrap().len(), 1);
    assert_eq!(value["summary"]["duplicate_files"], 1);
}

#[test]
fn test_relocate_conflict_is_partial_success() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    fs::write(src.path().join("IMG_20230115_103000.jpg"), b"incoming").unwrap();
    fs::create_dir_all(dst.path().join("2023/01")).unwrap();
    fs::write(dst.path().join("2023/01/IMG_20230115_103000.jpg"), b"resident!").unwrap();

    let code = run(&["relocate", s(src.path()), s(dst.path()), "--ignore-index"]).unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
}

#[test]
fn test_relocate_same_root_is_usage_error() {
    let dir = tempdir().unwrap();
    let err = run(&["relocate", s(dir.path()), s(dir.path()), "--ignore-index"]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::UsageError);
}

#[test]
fn test_missing_config_file_is_usage_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = run(&["--config", s(&missing), "config"]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::UsageError);
}

#[test]
fn test_scan_missing_root_is_general_error() {
    let dir = tempdir().unwrap();
    let err = run(&[
        "scan",
        s(&dir.path().join("absent")),
        "--catalog",
        s(&dir.path().join("c.db")),
    ])
    .unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}
