use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use exif_editor::ExifError;
use exif_editor::exif::{
    self, CUSTOM_ID_FLOOR, Directory, ExifData, QualifiedId, TagEntry, TagFormat, TagValue,
};
use exif_editor::pipeline;
use image::{DynamicImage, ImageFormat, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use tempfile::TempDir;

const NO_DELETES: [&str; 0] = [];
const NO_UPSERTS: [(&str, &str); 0] = [];

fn fresh_jpeg(dir: &TempDir, name: &str) -> PathBuf {
    let img = RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 0]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    let path = dir.path().join(name);
    fs::write(&path, buf.into_inner()).unwrap();
    path
}

fn with_segment(path: &Path, segment: Vec<u8>) {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(fs::read(path).unwrap())).unwrap();
    jpeg.set_exif(Some(Bytes::from(segment)));
    fs::write(path, jpeg.encoder().bytes()).unwrap();
}

fn text(directory: Directory, id: u16, name: &str, value: &str) -> TagEntry {
    TagEntry {
        directory,
        id,
        name: name.to_string(),
        format: TagFormat::Ascii,
        value: TagValue::Text(value.to_string()),
    }
}

#[test]
fn image_without_exif_decodes_to_empty_map() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "blank.jpg");
    let data = exif::read_exif(&path).unwrap();
    assert!(data.is_empty());
    assert!(data.registry.is_empty());
}

#[test]
fn custom_tag_on_fresh_image() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "fresh.jpg");

    let report = pipeline::apply(&path, [("Author", "Alice")], NO_DELETES).unwrap();
    assert!(report.written);

    let data = exif::read_exif(&path).unwrap();
    assert_eq!(
        data.tags.values().into_iter().collect::<Vec<_>>(),
        [("Author".to_string(), "Alice".to_string())]
    );
    let id = data.tags.qualified_id("Author").unwrap();
    assert_eq!(id.directory, Directory::Primary);
    assert!(id.id >= CUSTOM_ID_FLOOR);
}

#[test]
fn second_custom_tag_then_delete_first() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "two.jpg");
    pipeline::apply(&path, [("Author", "Alice")], NO_DELETES).unwrap();

    let mut batch = exif::EditBatch::new();
    batch.upsert("Project", "X").delete("Author");
    let report = pipeline::apply_batch(&path, &batch, &pipeline::EditOptions::default()).unwrap();
    assert_eq!(report.applied_count(), 2);

    let data = exif::read_exif(&path).unwrap();
    assert_eq!(
        data.tags.values().into_iter().collect::<Vec<_>>(),
        [("Project".to_string(), "X".to_string())]
    );
    assert_eq!(data.registry.len(), 1);
    assert_eq!(data.registry.iter().next().map(|(_, n)| n), Some("Project"));
}

#[test]
fn deleting_missing_tag_does_not_block_batch() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "partial.jpg");

    let report = pipeline::apply(&path, [("Artist", "Bob")], ["65432", "GPS.0002"]).unwrap();
    assert!(report.written);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|o| matches!(o.result, Err(ExifError::UnknownTagReference(_)))));

    let data = exif::read_exif(&path).unwrap();
    assert_eq!(data.tags.get("Artist").unwrap().value, TagValue::Text("Bob".into()));
}

#[test]
fn custom_ids_never_collide_with_existing_ones() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "ids.jpg");

    // An unnamed tag already occupies the floor ID.
    let mut seed = ExifData::default();
    seed.tags.insert(text(Directory::Primary, CUSTOM_ID_FLOOR, "Unknown-65000", "legacy"));
    with_segment(&path, exif::encode_segment(&seed).unwrap());

    pipeline::apply(&path, [("Author", "Alice"), ("Project", "X")], NO_DELETES).unwrap();
    pipeline::apply(&path, [("Client", "ACME")], ["Author"]).unwrap();

    let data = exif::read_exif(&path).unwrap();
    let id = |name: &str| data.tags.qualified_id(name).unwrap().id;
    assert_eq!(id("Unknown-65000"), CUSTOM_ID_FLOOR);
    assert_eq!(id("Project"), CUSTOM_ID_FLOOR + 2);
    // 65001 was released by the delete and is free again.
    assert_eq!(id("Client"), CUSTOM_ID_FLOOR + 1);
    assert_eq!(data.registry.len(), 2);
}

#[test]
fn malformed_registry_does_not_block_other_tags() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "corrupt.jpg");

    let mut seed = ExifData::default();
    seed.tags.insert(text(Directory::Primary, 0x010F, "Make", "Canon"));
    seed.tags.insert(text(Directory::Primary, 64999, "Unknown-64999", "{not json"));
    seed.tags.insert(text(Directory::Exif, 0x9003, "DateTimeOriginal", "2024:05:01 10:00:00"));
    with_segment(&path, exif::encode_segment(&seed).unwrap());

    let data = exif::read_exif(&path).unwrap();
    assert!(data.registry.is_empty());
    assert_eq!(data.tags.len(), 2);
    assert_eq!(data.tags.get("Make").unwrap().value, TagValue::Text("Canon".into()));
    assert_eq!(
        data.tags.qualified_id("DateTimeOriginal"),
        Some(QualifiedId::new(Directory::Exif, 0x9003))
    );

    // Editing replaces the corrupt registry with a valid one.
    pipeline::apply(&path, [("Author", "Alice")], NO_DELETES).unwrap();
    let data = exif::read_exif(&path).unwrap();
    assert_eq!(data.registry.name(CUSTOM_ID_FLOOR), Some("Author"));
    assert_eq!(data.tags.len(), 3);
}

#[test]
fn unreadable_segment_reads_as_empty_and_edits_start_fresh() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "garbage.jpg");
    with_segment(&path, b"this is not a TIFF header".to_vec());

    assert!(matches!(exif::read_exif(&path), Err(ExifError::MalformedSegment(_))));
    assert!(exif::read_exif_lenient(&path).unwrap().is_empty());

    pipeline::apply(&path, [("Artist", "Bob")], NO_DELETES).unwrap();
    let data = exif::read_exif(&path).unwrap();
    assert_eq!(data.tags.len(), 1);
}

#[test]
fn user_comment_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let path = fresh_jpeg(&dir, "comment.jpg");
    pipeline::apply(&path, [("UserComment", "hello")], NO_DELETES).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert!(bytes.windows(13).any(|w| w == b"ASCII\0\0\0hello"));
    let data = exif::read_exif(&path).unwrap();
    let comment = data.tags.get("UserComment").unwrap();
    assert_eq!(comment.value, TagValue::Text("hello".into()));
    assert_eq!(comment.qualified_id().to_string(), "Exif.9286");

    pipeline::apply(&path, NO_UPSERTS, ["Exif.9286"]).unwrap();
    assert!(exif::read_exif(&path).unwrap().is_empty());
}
