use dupsort::actions::{
    ConflictReason, IndexEvent, IndexNotifier, NotifyError, RelocationOutcome, Relocator,
    RelocatorConfig,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Default, Clone)]
struct EventLog(Arc<Mutex<Vec<IndexEvent>>>);

impl IndexNotifier for EventLog {
    fn notify(&self, event: &IndexEvent) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_camera_roll_is_sorted_by_month() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write(&src.path().join("IMG_20230115_103000.jpg"), b"january");
    write(&src.path().join("nested/VID_20221231_235959.mp4"), b"new year");
    write(&src.path().join("notes.txt"), b"no date here");

    let report = Relocator::new(RelocatorConfig::default())
        .relocate_tree(src.path(), dst.path())
        .unwrap();

    assert_eq!(report.moved.len(), 2);
    assert_eq!(report.skipped, 1);
    assert!(!report.has_problems());
    assert_eq!(
        fs::read(dst.path().join("2023/01/IMG_20230115_103000.jpg")).unwrap(),
        b"january"
    );
    assert_eq!(
        fs::read(dst.path().join("2022/12/VID_20221231_235959.mp4")).unwrap(),
        b"new year"
    );
    assert!(src.path().join("notes.txt").exists());
    assert!(!src.path().join("IMG_20230115_103000.jpg").exists());
}

#[test]
fn test_thumbnails_follow_their_photo() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let photo = src.path().join("IMG_20230301_090000.jpg");
    write(&photo, b"march");
    write(
        &src.path()
            .join("@eaDir/IMG_20230301_090000.jpg/SYNOPHOTO_THUMB_M.jpg"),
        b"thumb",
    );

    let events = EventLog::default();
    let report = Relocator::new(RelocatorConfig::default())
        .with_notifier(Box::new(events.clone()))
        .relocate_tree(src.path(), dst.path())
        .unwrap();

    assert_eq!(report.moved.len(), 1);
    let month = dst.path().join("2023/03");
    assert_eq!(
        fs::read(month.join("@eaDir/IMG_20230301_090000.jpg/SYNOPHOTO_THUMB_M.jpg")).unwrap(),
        b"thumb"
    );
    assert!(!src.path().join("@eaDir/IMG_20230301_090000.jpg").exists());

    let events = events.0.lock().unwrap();
    assert!(events.contains(&IndexEvent::DirectoryAdded(dst.path().join("2023"))));
    assert!(events.contains(&IndexEvent::DirectoryAdded(month.clone())));
    assert_eq!(
        events.last(),
        Some(&IndexEvent::Renamed {
            new: month.join("IMG_20230301_090000.jpg"),
            old: photo,
        })
    );
}

#[test]
fn test_different_content_is_never_overwritten() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write(&src.path().join("IMG_20230115_103000.jpg"), b"incoming");
    write(&dst.path().join("2023/01/IMG_20230115_103000.jpg"), b"resident");

    let report = Relocator::new(RelocatorConfig::default())
        .relocate_tree(src.path(), dst.path())
        .unwrap();

    assert!(report.moved.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert!(matches!(
        report.rejected[0],
        RelocationOutcome::Rejected {
            reason: ConflictReason::SizeMismatch,
            ..
        }
    ));
    assert_eq!(
        fs::read(dst.path().join("2023/01/IMG_20230115_103000.jpg")).unwrap(),
        b"resident"
    );
    assert!(src.path().join("IMG_20230115_103000.jpg").exists());
}

#[test]
fn test_identical_destination_is_replaced() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write(&src.path().join("IMG_20230115_103000.jpg"), b"same bytes");
    write(&dst.path().join("2023/01/IMG_20230115_103000.jpg"), b"same bytes");

    let report = Relocator::new(RelocatorConfig::default())
        .relocate_tree(src.path(), dst.path())
        .unwrap();

    assert_eq!(report.moved.len(), 1);
    assert!(!src.path().join("IMG_20230115_103000.jpg").exists());
}

#[test]
fn test_second_run_has_nothing_to_do() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    write(&src.path().join("IMG_20230115_103000.jpg"), b"once");

    let relocator = Relocator::new(RelocatorConfig::default());
    relocator.relocate_tree(src.path(), dst.path()).unwrap();
    let again = relocator.relocate_tree(src.path(), dst.path()).unwrap();

    assert!(again.moved.is_empty());
    assert!(!again.has_problems());
}
