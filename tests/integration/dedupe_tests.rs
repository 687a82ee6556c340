use dupsort::actions::{plan, LinkKind, ReconcileMode, ReconciliationAction};
use dupsort::catalog::Catalog;
use dupsort::duplicates::{DuplicateFinder, FinderConfig};
use dupsort::output::ScriptOutput;
use dupsort::scanner::WalkerConfig;
use std::fs;
use tempfile::tempdir;

fn photo_fixture() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), b"same photo bytes").unwrap();
    fs::write(dir.path().join("b.jpg"), b"same photo bytes").unwrap();
    fs::write(dir.path().join("c.jpg"), b"other photo byte").unwrap();
    dir
}

#[test]
fn test_check_mode_announces_each_member() {
    let dir = photo_fixture();
    let catalog = Catalog::open_in_memory().unwrap();
    let finder = DuplicateFinder::with_defaults();

    let (classes, summary) = finder.find_duplicates(dir.path(), &catalog).unwrap();

    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.grouping.fingerprinted_files, 3);
    assert_eq!(summary.grouping.duplicate_groups, 1);
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].canonical_path(), dir.path().join("a.jpg"));

    let actions = plan(&classes, ReconcileMode::Check);
    assert_eq!(
        actions,
        vec![
            ReconciliationAction::Announce {
                path: dir.path().join("a.jpg")
            },
            ReconciliationAction::Announce {
                path: dir.path().join("b.jpg")
            },
        ]
    );
    assert!(!actions.iter().any(ReconciliationAction::is_mutating));
}

#[test]
fn test_hardlink_mode_script() {
    let dir = photo_fixture();
    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    let actions = plan(&classes, ReconcileMode::Hardlink);
    assert_eq!(
        actions,
        vec![ReconciliationAction::Link {
            kind: LinkKind::Hard,
            canonical: dir.path().join("a.jpg"),
            duplicate: dir.path().join("b.jpg"),
        }]
    );

    let script = ScriptOutput::new(&actions, ReconcileMode::Hardlink).render();
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    assert!(script.starts_with("#! /bin/bash\n"));
    assert!(script.contains(&format!("ln -f '{}' '{}'", a.display(), b.display())));
    assert!(!script.contains("c.jpg"));
}

#[test]
fn test_duplicates_are_marked_in_catalog() {
    let dir = photo_fixture();
    let catalog = Catalog::open_in_memory().unwrap();
    DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    let marked = catalog.duplicates().unwrap();
    assert_eq!(marked.len(), 1);
    assert_eq!(marked[0].name, "b.jpg");
}

#[test]
fn test_unique_sizes_are_never_read() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("one.bin"), b"1").unwrap();
    fs::write(dir.path().join("two.bin"), b"22").unwrap();
    fs::write(dir.path().join("three.bin"), b"333").unwrap();

    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    assert!(classes.is_empty());
    assert_eq!(summary.grouping.fingerprinted_files, 0);
    assert!(catalog
        .records_for_size(1)
        .unwrap()
        .iter()
        .all(|r| r.fingerprint.is_none()));
}

#[test]
fn test_empty_files_are_not_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("empty1"), b"").unwrap();
    fs::write(dir.path().join("empty2"), b"").unwrap();

    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    assert!(classes.is_empty());
    assert_eq!(summary.total_files, 0);
}

#[test]
fn test_nested_duplicates_across_directories() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("2023").join("01");
    fs::create_dir_all(&sub).unwrap();
    fs::write(dir.path().join("keep.mp4"), b"video").unwrap();
    fs::write(sub.join("copy.mp4"), b"video").unwrap();

    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].len(), 2);
    assert_eq!(classes[0].wasted_space(), 5);
}

#[test]
fn test_thumbnail_directories_are_skipped() {
    let dir = tempdir().unwrap();
    let thumbs = dir.path().join("@eaDir").join("a.jpg");
    fs::create_dir_all(&thumbs).unwrap();
    fs::write(dir.path().join("a.jpg"), b"pixels").unwrap();
    fs::write(thumbs.join("SYNOPHOTO_THUMB_S.jpg"), b"pixels").unwrap();

    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    assert!(classes.is_empty());
    assert_eq!(summary.total_files, 1);
}

#[test]
fn test_ignore_patterns_exclude_files() {
    let dir = photo_fixture();
    let config = FinderConfig::default()
        .with_walker_config(WalkerConfig::default().with_ignore_patterns(vec!["b.jpg".into()]));
    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, summary) = DuplicateFinder::new(config)
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    assert!(classes.is_empty());
    assert_eq!(summary.total_files, 2);
}

#[test]
fn test_delete_mode_keeps_canonical() {
    let dir = tempdir().unwrap();
    for name in ["x1", "x2", "x3"] {
        fs::write(dir.path().join(name), b"triplicate").unwrap();
    }
    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    let actions = plan(&classes, ReconcileMode::Delete);
    assert_eq!(
        actions,
        vec![
            ReconciliationAction::Remove {
                path: dir.path().join("x2")
            },
            ReconciliationAction::Remove {
                path: dir.path().join("x3")
            },
        ]
    );
}

// macOS filesystems refuse names that are not UTF-8.
#[cfg(all(unix, not(target_os = "macos")))]
#[test]
fn test_non_utf8_names_are_grouped() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let name = OsStr::from_bytes(b"\xffphoto.jpg");
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    let first = dir.path().join("a").join(name);
    let second = dir.path().join("b").join(name);
    fs::write(&first, b"same photo bytes").unwrap();
    fs::write(&second, b"same photo bytes").unwrap();

    let catalog = Catalog::open_in_memory().unwrap();
    let (classes, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path(), &catalog)
        .unwrap();

    assert_eq!(summary.grouping.failed_files, 0);
    assert!(summary.grouping.errors.is_empty());
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].canonical_path(), first);
    assert_eq!(classes[0].duplicate_paths(), vec![second.clone()]);
    assert_eq!(catalog.duplicates().unwrap()[0].name.as_os_str(), name);

    let actions = plan(&classes, ReconcileMode::Delete);
    let mut script = Vec::new();
    ScriptOutput::new(&actions, ReconcileMode::Delete)
        .write_to(&mut script)
        .unwrap();
    let expected = [&b"rm -f '"[..], second.as_os_str().as_bytes(), &b"'\n"[..]].concat();
    assert!(script.windows(expected.len()).any(|w| w == expected.as_slice()));
}
