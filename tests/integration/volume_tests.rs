//! Volume loading tests.
//!
//! Tests verify:
//! - TIFF stacks in both byte orders and as BigTIFF
//! - 16-bit, RGB and WhiteIsZero pages reduced to 8-bit intensities
//! - Slice directories sorted by file name
//! - Error cases (missing path, unsupported input, mismatched slices)

use corview::error::{IoError, SliceError, TiffError, VolumeError};
use corview::VolumeHandle;

use super::test_utils::{
    gradient_stack, voxel, write_slice_directory, write_stack, ByteOrderType, StackBuilder,
};

fn load_bytes(name: &str, bytes: Vec<u8>) -> Result<VolumeHandle, VolumeError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    VolumeHandle::load(&path)
}

fn assert_gradient(volume: &VolumeHandle) {
    let (slices, height, width) = volume.dimensions();
    for s in 0..slices {
        for r in 0..height {
            for c in 0..width {
                assert_eq!(volume.data()[[s, r, c]], voxel(s, r, c), "voxel ({s}, {r}, {c})");
            }
        }
    }
}

fn gradient_pages(builder: StackBuilder, slices: usize, width: u32, height: u32) -> StackBuilder {
    (0..slices).fold(builder, |builder, s| {
        let pixels = (0..height as usize)
            .flat_map(|r| (0..width as usize).map(move |c| voxel(s, r, c)))
            .collect();
        builder.gray8(width, height, pixels)
    })
}

// =============================================================================
// TIFF Stacks
// =============================================================================

#[test]
fn test_load_little_endian_stack() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_stack(dir.path(), "femur.tif", 5, 7, 3);

    let volume = VolumeHandle::load(&path).unwrap();
    assert_eq!(volume.filename(), "femur.tif");
    assert_eq!(volume.slice_count(), 5);
    assert_eq!(volume.dimensions(), (5, 3, 7));
    assert_gradient(&volume);
}

#[test]
fn test_load_big_endian_stack() {
    let bytes = gradient_pages(
        StackBuilder::new().with_byte_order(ByteOrderType::BigEndian),
        3,
        4,
        4,
    )
    .build();

    let volume = load_bytes("be.tif", bytes).unwrap();
    assert_eq!(volume.dimensions(), (3, 4, 4));
    assert_gradient(&volume);
}

#[test]
fn test_load_bigtiff_stack_both_byte_orders() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let bytes = gradient_pages(
            StackBuilder::new().with_byte_order(order).with_bigtiff(true),
            4,
            5,
            2,
        )
        .build();

        let volume = load_bytes("big.tif", bytes).unwrap();
        assert_eq!(volume.dimensions(), (4, 2, 5), "{:?}", order);
        assert_gradient(&volume);
    }
}

#[test]
fn test_single_page_tiff_is_one_slice_volume() {
    let volume = load_bytes("single.tif", gradient_stack(1, 3, 3)).unwrap();
    assert_eq!(volume.slice_count(), 1);
    assert!(volume.slice_at(0).is_ok());
    assert!(volume.slice_at(1).is_err());
}

#[test]
fn test_16_bit_pages_keep_high_byte() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let bytes = StackBuilder::new()
            .with_byte_order(order)
            .gray16(2, 2, vec![0, 255, 0x8000, 0xFFFF])
            .gray16(2, 2, vec![0x0100, 0x1234, 0xAB00, 0x00FF])
            .build();

        let volume = load_bytes("deep.tif", bytes).unwrap();
        let data = volume.data();
        assert_eq!(data[[0, 0, 0]], 0);
        assert_eq!(data[[0, 0, 1]], 0);
        assert_eq!(data[[0, 1, 0]], 0x80);
        assert_eq!(data[[0, 1, 1]], 0xFF);
        assert_eq!(data[[1, 0, 0]], 0x01);
        assert_eq!(data[[1, 0, 1]], 0x12);
        assert_eq!(data[[1, 1, 0]], 0xAB);
        assert_eq!(data[[1, 1, 1]], 0x00);
    }
}

#[test]
fn test_rgb_pages_reduced_to_luma() {
    // Grey RGB keeps its value; pure channels follow Rec. 709 weights
    let bytes = StackBuilder::new()
        .rgb8(2, 1, vec![90, 90, 90, 255, 0, 0])
        .rgb8(2, 1, vec![0, 255, 0, 0, 0, 255])
        .build();

    let volume = load_bytes("rgb.tif", bytes).unwrap();
    let data = volume.data();
    assert_eq!(data[[0, 0, 0]], 90);
    assert_eq!(data[[0, 0, 1]], 54);
    assert_eq!(data[[1, 0, 0]], 182);
    assert_eq!(data[[1, 0, 1]], 18);
}

#[test]
fn test_white_is_zero_inverted() {
    let bytes = StackBuilder::new()
        .gray8_inverted(2, 1, vec![0, 200])
        .build();

    let volume = load_bytes("inverted.tif", bytes).unwrap();
    assert_eq!(volume.data()[[0, 0, 0]], 255);
    assert_eq!(volume.data()[[0, 0, 1]], 55);
}

#[test]
fn test_mismatched_pages_rejected() {
    let bytes = StackBuilder::new()
        .gray8(2, 2, vec![0; 4])
        .gray8(2, 2, vec![0; 4])
        .gray8(3, 2, vec![0; 6])
        .build();

    match load_bytes("ragged.tif", bytes) {
        Err(VolumeError::InconsistentDimensions {
            index,
            expected,
            actual,
        }) => {
            assert_eq!(index, 2);
            assert_eq!(expected, (2, 2));
            assert_eq!(actual, (2, 3));
        }
        other => panic!("expected InconsistentDimensions, got {:?}", other),
    }
}

#[test]
fn test_truncated_stack_rejected() {
    let mut bytes = gradient_stack(2, 4, 4);
    bytes.truncate(bytes.len() - 10);

    let result = load_bytes("cut.tif", bytes);
    assert!(matches!(result, Err(VolumeError::Tiff(_))), "{:?}", result);
}

#[test]
fn test_first_ifd_past_end_rejected() {
    let result = load_bytes("bad.tif", vec![b'I', b'I', 42, 0, 0xFF, 0xFF, 0xFF, 0x0F]);
    assert!(matches!(
        result,
        Err(VolumeError::Tiff(TiffError::InvalidIfdOffset(0x0FFF_FFFF)))
    ));
}

#[test]
fn test_absurd_dimensions_rejected() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let bytes = StackBuilder::new()
            .with_byte_order(order)
            .gray8_claiming(0xFFFF_FFFF, 0xFFFF_FFFF, vec![7])
            .build();

        let result = load_bytes("huge.tif", bytes);
        assert!(
            matches!(
                result,
                Err(VolumeError::Tiff(TiffError::InvalidTagValue { .. }))
            ),
            "{:?}",
            result
        );
    }
}

#[test]
fn test_dimensions_larger_than_strips_rejected() {
    // 64x64 claimed, 16 bytes present
    let bytes = StackBuilder::new()
        .gray8_claiming(64, 64, vec![0; 16])
        .build();

    let result = load_bytes("liar.tif", bytes);
    assert!(matches!(
        result,
        Err(VolumeError::Tiff(TiffError::InvalidTagValue { .. }))
    ));
}

// =============================================================================
// Slice Directories
// =============================================================================

#[test]
fn test_load_slice_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_slice_directory(dir.path(), 4, 6, 5);

    let volume = VolumeHandle::load(&path).unwrap();
    assert_eq!(volume.filename(), "slices");
    assert_eq!(volume.dimensions(), (4, 5, 6));
    assert_gradient(&volume);
}

#[test]
fn test_slice_directory_ignores_other_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_slice_directory(dir.path(), 2, 3, 3);
    std::fs::write(path.join("notes.txt"), "not a slice").unwrap();
    std::fs::create_dir(path.join("nested")).unwrap();

    let volume = VolumeHandle::load(&path).unwrap();
    assert_eq!(volume.slice_count(), 2);
}

#[test]
fn test_empty_directory_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = VolumeHandle::load(dir.path());
    assert!(matches!(result, Err(VolumeError::NotAVolume { .. })));
}

#[test]
fn test_undecodable_slice_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_slice_directory(dir.path(), 2, 3, 3);
    std::fs::write(path.join("slice_999.png"), b"not really a png").unwrap();

    let result = VolumeHandle::load(&path);
    assert!(matches!(result, Err(VolumeError::Decode { .. })), "{:?}", result);
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn test_missing_path() {
    let result = VolumeHandle::load("/no/such/volume.tif");
    assert!(matches!(result, Err(VolumeError::Io(IoError::NotFound(_)))));
}

#[test]
fn test_plain_file_is_not_a_volume() {
    let result = load_bytes("notes.txt", b"hello, volume".to_vec());
    assert!(matches!(result, Err(VolumeError::NotAVolume { .. })));
}

#[test]
fn test_slice_access_out_of_range() {
    let volume = load_bytes("s.tif", gradient_stack(3, 2, 2)).unwrap();

    for index in [-1, 3, 100] {
        assert_eq!(
            volume.slice_at(index).unwrap_err(),
            SliceError::IndexOutOfRange {
                index,
                slice_count: 3
            }
        );
    }
    assert_eq!(volume.slice_image(2).unwrap().get_pixel(1, 1).0, [voxel(2, 1, 1)]);
}
