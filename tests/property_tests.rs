use dupsort::actions::{check_conflict, plan, ReconcileMode, ReconciliationAction};
use dupsort::catalog::CatalogRecord;
use dupsort::duplicates::partition_records;
use dupsort::scanner::Hasher;
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn record(id: i64, size: u64, fp: u8) -> CatalogRecord {
    CatalogRecord {
        id,
        dir: PathBuf::from("/data"),
        name: format!("f{}", id).into(),
        size,
        fingerprint: Some([fp; 32]),
        is_duplicate: false,
    }
}

proptest! {
    #[test]
    fn test_fingerprint_depends_only_on_content(
        content in prop::collection::vec(any::<u8>(), 1..4096),
        sample in 1u64..2048,
    ) {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("nested_copy.bin");
        fs::write(&a, &content).unwrap();
        fs::write(&b, &content).unwrap();

        let hasher = Hasher::new(sample);
        let size = content.len() as u64;
        let fa = hasher.fingerprint(&a, size).unwrap();
        prop_assert_eq!(fa, hasher.fingerprint(&a, size).unwrap());
        prop_assert_eq!(fa, hasher.fingerprint(&b, size).unwrap());
    }

    #[test]
    fn test_whole_file_hash_separates_contents(
        first in prop::collection::vec(any::<u8>(), 1..512),
        second in prop::collection::vec(any::<u8>(), 1..512),
    ) {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, &first).unwrap();
        fs::write(&b, &second).unwrap();

        let hasher = Hasher::new(1024);
        let fa = hasher.fingerprint(&a, first.len() as u64).unwrap();
        let fb = hasher.fingerprint(&b, second.len() as u64).unwrap();
        prop_assert_eq!(fa == fb, first == second);
    }

    #[test]
    fn test_partition_classes_are_uniform(
        members in prop::collection::vec((1u64..6, 0u8..4), 0..60),
    ) {
        let records: Vec<CatalogRecord> = members
            .iter()
            .enumerate()
            .map(|(i, &(size, fp))| record(i as i64, size, fp))
            .collect();

        let classes = partition_records(records.clone());
        let mut seen = 0;
        for class in &classes {
            prop_assert!(class.len() >= 2);
            for dup in &class.duplicates {
                prop_assert_eq!(dup.size, class.size);
                prop_assert_eq!(dup.fingerprint, Some(class.fingerprint));
                prop_assert!(dup.id > class.canonical.id);
            }
            seen += class.len();
        }

        // Every record whose (size, fingerprint) repeats lands in exactly one class.
        let repeated = records
            .iter()
            .filter(|r| {
                records
                    .iter()
                    .filter(|o| o.size == r.size && o.fingerprint == r.fingerprint)
                    .count()
                    > 1
            })
            .count();
        prop_assert_eq!(seen, repeated);
    }

    #[test]
    fn test_conflict_check_never_allows_different_content(
        existing in prop::collection::vec(any::<u8>(), 1..256),
        resident in prop::option::of(prop::collection::vec(any::<u8>(), 1..256)),
    ) {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, &existing).unwrap();
        if let Some(ref bytes) = resident {
            fs::write(&dst, bytes).unwrap();
        }

        let decision = check_conflict(&src, &dst, &Hasher::new(1024)).unwrap();
        let safe = match resident {
            None => true,
            Some(ref bytes) => *bytes == existing,
        };
        prop_assert_eq!(decision.may_proceed(), safe);
    }

    #[test]
    fn test_plan_is_order_independent(
        members in prop::collection::vec((1u64..4, 0u8..3), 2..40),
        mode_idx in 0usize..5,
    ) {
        let mode = [
            ReconcileMode::Check,
            ReconcileMode::Delete,
            ReconcileMode::Softlink,
            ReconcileMode::Hardlink,
            ReconcileMode::Reflink,
        ][mode_idx];
        let records: Vec<CatalogRecord> = members
            .iter()
            .enumerate()
            .map(|(i, &(size, fp))| record(i as i64, size, fp))
            .collect();
        let classes = partition_records(records);
        let mut reversed = classes.clone();
        reversed.reverse();

        let actions = plan(&classes, mode);
        prop_assert_eq!(&actions, &plan(&reversed, mode));

        let canonicals: Vec<PathBuf> = classes.iter().map(|c| c.canonical_path()).collect();
        for action in &actions {
            match action {
                ReconciliationAction::Remove { path } => prop_assert!(!canonicals.contains(path)),
                ReconciliationAction::Link { canonical, duplicate, .. } => {
                    prop_assert!(canonicals.contains(canonical));
                    prop_assert!(!canonicals.contains(duplicate));
                }
                ReconciliationAction::Announce { .. } => prop_assert_eq!(mode, ReconcileMode::Check),
            }
        }
    }
}
