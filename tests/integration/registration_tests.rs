//! Registration, resolution and composition tests.
//!
//! Tests verify:
//! - Adding images from disk at valid and invalid positions
//! - Exact and nearest-below resolution over a real volume
//! - The composed dual view for hits, misses and one-slice volumes
//! - Sessions built from manifests

use corview::error::{IoError, RegistrationError, SessionError, SliceError};
use corview::registration::ResolutionPolicy;
use corview::view::{FrameImage, PLACEHOLDER_TEXT};
use corview::{
    DualViewComposer, ImagePanel, Manifest, NearestBelow, RegistrationTable, Session,
    VolumeHandle,
};

use super::test_utils::{gradient_stack, voxel, write_image, write_stack};

fn volume(slices: usize) -> (tempfile::TempDir, VolumeHandle) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_stack(dir.path(), "ct.tif", slices, 4, 3);
    let volume = VolumeHandle::load(&path).unwrap();
    (dir, volume)
}

// =============================================================================
// Registration Table
// =============================================================================

#[test]
fn test_register_images_from_disk() {
    let (dir, volume) = volume(10);
    let mut table = RegistrationTable::for_volume(&volume);

    let a = table
        .add_from_path(write_image(dir.path(), "section_3.png", [200, 10, 10]), 3)
        .unwrap();
    let b = table
        .add_from_path(write_image(dir.path(), "section_7.png", [10, 200, 10]), 7)
        .unwrap();

    let listing = table.list_all();
    assert_eq!(listing.len(), 2);
    assert_eq!((listing[0].id, listing[0].filename.as_str(), listing[0].position), (a, "section_3.png", 3));
    assert_eq!((listing[1].id, listing[1].filename.as_str(), listing[1].position), (b, "section_7.png", 7));

    let entry = table.resolve(3).unwrap();
    assert_eq!(entry.image().dimensions(), (6, 4));
    assert_eq!(entry.image().get_pixel(0, 0).0, [200, 10, 10]);
}

#[test]
fn test_invalid_positions_leave_table_unchanged() {
    let (dir, volume) = volume(10);
    let mut table = RegistrationTable::for_volume(&volume);
    let image = write_image(dir.path(), "h.png", [1, 2, 3]);
    table.add_from_path(&image, 0).unwrap();

    for position in [-1, 10, 12] {
        let err = table.add_from_path(&image, position).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::InvalidPosition { slice_count: 10, .. }
        ));
    }
    assert_eq!(table.len(), 1);
}

#[test]
fn test_missing_and_undecodable_images() {
    let (dir, volume) = volume(4);
    let mut table = RegistrationTable::for_volume(&volume);

    let missing = table.add_from_path(dir.path().join("absent.png"), 1);
    assert!(matches!(missing, Err(RegistrationError::Io(IoError::NotFound(_)))));

    let garbage = dir.path().join("garbage.png");
    std::fs::write(&garbage, b"definitely not an image").unwrap();
    let undecodable = table.add_from_path(&garbage, 1);
    assert!(matches!(undecodable, Err(RegistrationError::Decode { .. })));

    assert!(table.is_empty());
}

#[test]
fn test_clear_all_then_resolve() {
    let (dir, volume) = volume(5);
    let mut table = RegistrationTable::for_volume(&volume);
    table
        .add_from_path(write_image(dir.path(), "a.png", [0, 0, 0]), 2)
        .unwrap();
    table
        .add_from_path(write_image(dir.path(), "b.png", [0, 0, 0]), 4)
        .unwrap();

    assert_eq!(table.clear_all(), 2);
    assert!(table.list_all().is_empty());
    for index in 0..5 {
        assert!(table.resolve(index).is_none());
    }
}

// =============================================================================
// Composition
// =============================================================================

#[test]
fn test_compose_hit_and_miss() {
    let (dir, volume) = volume(10);
    let mut table = RegistrationTable::for_volume(&volume);
    let id = table
        .add_from_path(write_image(dir.path(), "section_5.png", [9, 9, 9]), 5)
        .unwrap();
    let composer = DualViewComposer::new();

    let hit = composer.compose(&volume, &table, 5).unwrap();
    assert_eq!(hit.slice.title, "CT slice 5");
    assert_eq!(hit.slice.plane[[1, 2]], voxel(5, 1, 2));
    assert_eq!(hit.image.entry().unwrap().id(), id);
    match &hit.image {
        ImagePanel::Registered { caption, .. } => assert_eq!(caption, "Histology section_5.png"),
        other => panic!("expected a registered image, got {:?}", other),
    }

    for index in [4, 6] {
        let miss = composer.compose(&volume, &table, index).unwrap();
        assert!(miss.image.is_placeholder());
        assert_eq!(miss.slice.plane[[0, 0]], voxel(index as usize, 0, 0));
    }
}

#[test]
fn test_compose_out_of_range() {
    let (_dir, volume) = volume(3);
    let table = RegistrationTable::for_volume(&volume);

    let err = DualViewComposer::new()
        .compose(&volume, &table, 3)
        .unwrap_err();
    assert_eq!(
        err,
        SliceError::IndexOutOfRange {
            index: 3,
            slice_count: 3
        }
    );
}

#[test]
fn test_one_slice_volume_fixes_the_slider() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.tif");
    std::fs::write(&path, gradient_stack(1, 2, 2)).unwrap();
    let volume = VolumeHandle::load(&path).unwrap();
    let table = RegistrationTable::for_volume(&volume);

    let view = DualViewComposer::new().compose(&volume, &table, 0).unwrap();
    assert!(view.slider.fixed);
    assert_eq!((view.slider.min, view.slider.max, view.slider.value), (0, 0, 0));
}

#[test]
fn test_nearest_below_policy() {
    let (dir, volume) = volume(10);
    let mut table = RegistrationTable::for_volume(&volume);
    table
        .add_from_path(write_image(dir.path(), "s2.png", [0, 0, 0]), 2)
        .unwrap();
    let later = table
        .add_from_path(write_image(dir.path(), "s6.png", [0, 0, 0]), 6)
        .unwrap();

    let composer = DualViewComposer::with_resolver(NearestBelow);
    assert!(composer.compose(&volume, &table, 1).unwrap().image.is_placeholder());
    assert_eq!(
        composer.compose(&volume, &table, 4).unwrap().image.entry().unwrap().filename(),
        "s2.png"
    );
    assert_eq!(
        composer.compose(&volume, &table, 9).unwrap().image.entry().unwrap().id(),
        later
    );

    // The policy enum behaves like the resolver it names
    let by_policy = DualViewComposer::with_resolver(ResolutionPolicy::NearestBelow);
    assert_eq!(
        by_policy.compose(&volume, &table, 4).unwrap().image.entry().unwrap().filename(),
        "s2.png"
    );
}

#[test]
fn test_frame_description_json() {
    let (dir, volume) = volume(6);
    let mut table = RegistrationTable::for_volume(&volume);
    table
        .add_from_path(write_image(dir.path(), "h.png", [0, 0, 0]), 1)
        .unwrap();
    let composer = DualViewComposer::new();

    let hit = composer.compose(&volume, &table, 1).unwrap().describe();
    assert!(matches!(hit.image, FrameImage::Registered { position: 1, .. }));

    let miss = composer.compose(&volume, &table, 2).unwrap().describe();
    let json = serde_json::to_value(&miss).unwrap();
    assert_eq!(json["index"], 2);
    assert_eq!(json["slice_title"], "CT slice 2");
    assert_eq!(json["image"]["kind"], "placeholder");
    assert_eq!(json["image"]["message"], PLACEHOLDER_TEXT);
}

// =============================================================================
// Sessions and Manifests
// =============================================================================

#[test]
fn test_session_from_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "ct.tif", 8, 4, 4);
    std::fs::create_dir(dir.path().join("histology")).unwrap();
    write_image(&dir.path().join("histology"), "s1.png", [1, 1, 1]);
    write_image(&dir.path().join("histology"), "s5.png", [5, 5, 5]);

    let manifest_path = dir.path().join("session.json");
    std::fs::write(
        &manifest_path,
        r#"{
            "volume": "ct.tif",
            "title": "Sample 3",
            "registrations": [
                { "image": "histology/s1.png", "position": 1 },
                { "image": "histology/s5.png", "position": 5 }
            ]
        }"#,
    )
    .unwrap();

    let manifest = Manifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.title.as_deref(), Some("Sample 3"));

    let session = Session::from_manifest(&manifest).unwrap();
    assert_eq!(session.volume().slice_count(), 8);
    let positions: Vec<usize> = session
        .registrations()
        .list_all()
        .iter()
        .map(|l| l.position)
        .collect();
    assert_eq!(positions, vec![1, 5]);
}

#[test]
fn test_session_from_manifest_bad_position() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "ct.tif", 3, 2, 2);
    write_image(dir.path(), "h.png", [0, 0, 0]);
    let manifest_path = dir.path().join("session.json");
    std::fs::write(
        &manifest_path,
        r#"{"volume": "ct.tif", "registrations": [{"image": "h.png", "position": 3}]}"#,
    )
    .unwrap();

    let manifest = Manifest::load(&manifest_path).unwrap();
    let err = Session::from_manifest(&manifest).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Registration(RegistrationError::InvalidPosition { position: 3, .. })
    ));
}

#[test]
fn test_sessions_do_not_share_tables() {
    let (dir, volume) = volume(4);
    let mut first = Session::new(volume.clone());
    let second = Session::new(volume);

    first
        .register_path(write_image(dir.path(), "h.png", [0, 0, 0]), 2)
        .unwrap();
    assert_eq!(first.registrations().len(), 1);
    assert!(second.registrations().is_empty());
}
