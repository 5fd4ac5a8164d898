use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;

use super::map::{TagEntry, TagMap};
use super::registry::{CustomTagRegistry, REGISTRY_TAG_ID};
use super::tags::{
    self, Directory, TAG_EXIF_POINTER, TAG_GPS_POINTER, TAG_THUMBNAIL_LENGTH,
    TAG_THUMBNAIL_OFFSET,
};
use super::tiff::{ByteOrder, TagFormat, TiffView};
use super::value::{self, TagValue};
use crate::error::{ExifError, Result};
use crate::pipeline::ImageKind;

/// Decoded EXIF segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    /// Tags of the primary, Exif and GPS directories, keyed by resolved name.
    pub tags: TagMap,
    /// Custom tag names loaded from the reserved slot.
    pub registry: CustomTagRegistry,
    /// Byte order of the source segment; re-used when encoding.
    pub byte_order: ByteOrder,
    /// JPEG thumbnail referenced from IFD1, if any.
    pub thumbnail: Option<Vec<u8>>,
    /// IFD0's next-IFD link as found in the source.
    pub(crate) next_ifd: u32,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// TIFF type code 13, used by some writers for sub-directory offsets.
const TYPE_IFD: u16 = 13;

/// A directory entry whose value bytes have been located but not interpreted.
struct RawEntry<'a> {
    id: u16,
    format: TagFormat,
    data: &'a [u8],
    /// Position of the 4-byte value/offset field.
    field_pos: usize,
}

struct RawIfd<'a> {
    entries: Vec<RawEntry<'a>>,
    next: u32,
}

/// Parse one IFD. Structural problems (table out of bounds) fail the whole segment;
/// a single entry with an unknown type or a dangling value offset is skipped.
fn read_ifd<'a>(view: &TiffView<'a>, offset: usize, directory: Directory) -> Result<RawIfd<'a>> {
    let count = view.u16_at(offset)? as usize;
    let start = offset + 2;
    view.slice(start, count * 12 + 4)?;

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let pos = start + i * 12;
        let id = view.u16_at(pos)?;
        let type_code = view.u16_at(pos + 2)?;
        let components = view.u32_at(pos + 4)? as usize;
        let field_pos = pos + 8;

        let format = match TagFormat::from_code(type_code) {
            Some(format) => format,
            // Offsets typed IFD are laid out exactly like a single LONG.
            None if type_code == TYPE_IFD => TagFormat::Long,
            None => {
                log::debug!("{directory}: keeping tag {id:#06x} of unknown type {type_code} as raw field");
                let data = view.slice(field_pos, 4)?;
                entries.push(RawEntry { id, format: TagFormat::Undefined, data, field_pos });
                continue;
            }
        };
        let Some(size) = components.checked_mul(format.unit_size()) else {
            log::warn!("{directory}: tag {id:#06x} declares an impossible size, skipping");
            continue;
        };

        let data = if size <= 4 {
            view.slice(field_pos, size)
        } else {
            view.u32_at(field_pos)
                .and_then(|off| view.slice(off as usize, size))
        };
        match data {
            Ok(data) => entries.push(RawEntry { id, format, data, field_pos }),
            Err(e) => log::warn!("{directory}: skipping tag {id:#06x}: {e}"),
        }
    }

    let next = view.u32_at(start + count * 12)?;
    Ok(RawIfd { entries, next })
}

fn pointer(view: &TiffView<'_>, ifd: &RawIfd<'_>, tag: u16) -> Result<Option<usize>> {
    match ifd.entries.iter().find(|e| e.id == tag) {
        Some(entry) => Ok(Some(view.u32_at(entry.field_pos)? as usize)),
        None => Ok(None),
    }
}

/// Decode a raw TIFF-structured EXIF segment.
///
/// An empty segment yields an empty [`ExifData`]. A structurally invalid segment is a
/// [`ExifError::MalformedSegment`] and nothing partial is returned.
pub fn decode_segment(segment: &[u8]) -> Result<ExifData> {
    if segment.is_empty() {
        return Ok(ExifData::default());
    }

    let (view, ifd0_offset) = TiffView::parse_header(segment)?;
    let primary = read_ifd(&view, ifd0_offset as usize, Directory::Primary)?;

    let registry = primary
        .entries
        .iter()
        .find(|e| e.id == REGISTRY_TAG_ID)
        .map(|e| CustomTagRegistry::load(e.data))
        .unwrap_or_default();

    let exif = match pointer(&view, &primary, TAG_EXIF_POINTER)? {
        Some(off) => Some(read_ifd(&view, off, Directory::Exif)?),
        None => None,
    };
    let gps = match pointer(&view, &primary, TAG_GPS_POINTER)? {
        Some(off) => Some(read_ifd(&view, off, Directory::Gps)?),
        None => None,
    };

    let mut tags = TagMap::new();
    let directories = [
        (Directory::Primary, Some(&primary)),
        (Directory::Exif, exif.as_ref()),
        (Directory::Gps, gps.as_ref()),
    ];
    for (directory, ifd) in directories {
        let Some(ifd) = ifd else { continue };
        for raw in &ifd.entries {
            if directory == Directory::Primary
                && matches!(raw.id, REGISTRY_TAG_ID | TAG_EXIF_POINTER | TAG_GPS_POINTER)
            {
                continue;
            }
            let kind = tags::kind_of(directory, raw.id);
            let custom = (directory == Directory::Primary)
                .then(|| registry.name(raw.id))
                .flatten();
            let mut name = match custom {
                Some(n) => n.to_string(),
                None => tags::resolve(directory, raw.id),
            };
            let qid = tags::QualifiedId::new(directory, raw.id);
            if tags.get_by_id(qid).is_some() {
                log::debug!("{directory}: duplicate entry for tag {:#06x}, keeping the first", raw.id);
                continue;
            }
            if tags.contains(&name) {
                log::debug!("Tag name '{name}' already taken, keying {qid} by its ID");
                name = qid.to_string();
            }
            tags.insert(TagEntry {
                directory,
                id: raw.id,
                name,
                format: raw.format,
                value: value::decode_value(raw.data, raw.format, view.order(), kind),
            });
        }
    }

    let thumbnail = match primary.next {
        0 => None,
        off => read_thumbnail(&view, off as usize),
    };

    log::debug!(
        "Decoded {} tags ({} custom names registered)",
        tags.len(),
        registry.len()
    );

    Ok(ExifData {
        tags,
        registry,
        byte_order: view.order(),
        thumbnail,
        next_ifd: primary.next,
    })
}

/// Pull the JPEG thumbnail out of IFD1. Any inconsistency just means "no thumbnail".
fn read_thumbnail(view: &TiffView<'_>, offset: usize) -> Option<Vec<u8>> {
    let ifd1 = match read_ifd(view, offset, Directory::Primary) {
        Ok(ifd) => ifd,
        Err(e) => {
            log::debug!("Ignoring unreadable IFD1: {e}");
            return None;
        }
    };
    let integer = |tag: u16| -> Option<usize> {
        let entry = ifd1.entries.iter().find(|e| e.id == tag)?;
        match value::decode_value(entry.data, entry.format, view.order(), None) {
            TagValue::Integer(v) => v.first().map(|&n| n as usize),
            _ => None,
        }
    };
    let start = integer(TAG_THUMBNAIL_OFFSET)?;
    let len = integer(TAG_THUMBNAIL_LENGTH)?;
    match view.slice(start, len) {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(e) => {
            log::debug!("Ignoring thumbnail: {e}");
            None
        }
    }
}

/// Locate the EXIF segment inside an image container.
///
/// For JPEG this is the APP1 `Exif` payload (absent → `None`); for TIFF the file is the segment.
pub fn extract_segment(bytes: &[u8]) -> Result<(ImageKind, Option<Vec<u8>>)> {
    let kind = ImageKind::detect(bytes)?;
    let segment = match kind {
        ImageKind::Jpeg => {
            let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
                .map_err(|e| ExifError::UnsupportedFormat(format!("unreadable JPEG: {e}")))?;
            jpeg.exif().map(|b| b.to_vec())
        }
        ImageKind::Tiff => Some(bytes.to_vec()),
    };
    Ok((kind, segment))
}

/// Decode the EXIF metadata of an in-memory image.
pub fn read_exif_bytes(bytes: &[u8]) -> Result<ExifData> {
    let (_, segment) = extract_segment(bytes)?;
    match segment {
        Some(segment) => decode_segment(&segment),
        None => {
            log::debug!("No EXIF segment found");
            Ok(ExifData::default())
        }
    }
}

/// Read existing EXIF data from an image file.
pub fn read_exif(path: &Path) -> Result<ExifData> {
    let bytes = std::fs::read(path).map_err(|e| ExifError::io(path, e))?;
    read_exif_bytes(&bytes)
}

/// Like [`read_exif`], but an unparseable segment is reported as "no EXIF".
///
/// Unsupported containers and I/O failures are still errors.
pub fn read_exif_lenient(path: &Path) -> Result<ExifData> {
    match read_exif(path) {
        Err(ExifError::MalformedSegment(msg)) => {
            log::warn!("Unreadable EXIF in {}: {msg}", path.display());
            Ok(ExifData::default())
        }
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exif::value::Rational;

    /// Minimal little-endian TIFF builder for fixtures. Each IFD is a list of
    /// `(id, type, count, value bytes)`; values over 4 bytes go to a data area.
    pub(crate) struct Fixture {
        ifds: Vec<Vec<(u16, u16, u32, Vec<u8>)>>,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            Self { ifds: vec![Vec::new()] }
        }

        pub(crate) fn entry(mut self, ifd: usize, id: u16, ty: u16, count: u32, data: &[u8]) -> Self {
            while self.ifds.len() <= ifd {
                self.ifds.push(Vec::new());
            }
            self.ifds[ifd].push((id, ty, count, data.to_vec()));
            self
        }

        pub(crate) fn ascii(self, ifd: usize, id: u16, s: &str) -> Self {
            let mut data = s.as_bytes().to_vec();
            data.push(0);
            let n = data.len() as u32;
            self.entry(ifd, id, 2, n, &data)
        }

        /// IFD 0 is primary; IFD 1 becomes Exif and IFD 2 GPS when non-empty.
        pub(crate) fn build(self) -> Vec<u8> {
            let mut ifds = self.ifds;
            ifds.resize(3, Vec::new());
            // Sizes: header 8, then each IFD followed by its data area.
            let mut layout = Vec::new();
            let mut pos = 8usize;
            for (i, ifd) in ifds.iter().enumerate() {
                let extra = if i == 0 {
                    (!ifds[1].is_empty()) as usize + (!ifds[2].is_empty()) as usize
                } else {
                    0
                };
                let n = ifd.len() + extra;
                let data_len: usize = ifd
                    .iter()
                    .map(|(_, _, _, d)| if d.len() > 4 { d.len() + d.len() % 2 } else { 0 })
                    .sum();
                layout.push((pos, n));
                if i == 0 || !ifd.is_empty() {
                    pos += 2 + n * 12 + 4 + data_len;
                }
            }

            let mut out = vec![b'I', b'I', 42, 0, 8, 0, 0, 0];
            for (i, ifd) in ifds.iter().enumerate() {
                if i > 0 && ifd.is_empty() {
                    continue;
                }
                let mut entries = ifd.clone();
                if i == 0 {
                    if !ifds[1].is_empty() {
                        entries.push((0x8769, 4, 1, (layout[1].0 as u32).to_le_bytes().to_vec()));
                    }
                    if !ifds[2].is_empty() {
                        entries.push((0x8825, 4, 1, (layout[2].0 as u32).to_le_bytes().to_vec()));
                    }
                }
                entries.sort_by_key(|e| e.0);
                let (start, n) = layout[i];
                assert_eq!(out.len(), start);
                out.extend_from_slice(&(n as u16).to_le_bytes());
                let mut data_pos = start + 2 + n * 12 + 4;
                let mut data = Vec::new();
                for (id, ty, count, bytes) in &entries {
                    out.extend_from_slice(&id.to_le_bytes());
                    out.extend_from_slice(&ty.to_le_bytes());
                    out.extend_from_slice(&count.to_le_bytes());
                    if bytes.len() <= 4 {
                        let mut field = [0u8; 4];
                        field[..bytes.len()].copy_from_slice(bytes);
                        out.extend_from_slice(&field);
                    } else {
                        out.extend_from_slice(&(data_pos as u32).to_le_bytes());
                        data.extend_from_slice(bytes);
                        if bytes.len() % 2 == 1 {
                            data.push(0);
                        }
                        data_pos += bytes.len() + bytes.len() % 2;
                    }
                }
                out.extend_from_slice(&0u32.to_le_bytes());
                out.extend_from_slice(&data);
            }
            out
        }
    }

    fn sample() -> Vec<u8> {
        let mut comment = b"ASCII\0\0\0".to_vec();
        comment.extend_from_slice(b"hello");
        let mut lat = Vec::new();
        for v in [35u32, 1, 41, 1, 2200, 100] {
            lat.extend_from_slice(&v.to_le_bytes());
        }
        Fixture::new()
            .ascii(0, 0x010F, "Canon")
            .entry(0, 0x0112, 3, 1, &6u16.to_le_bytes())
            .ascii(1, 0x9003, "2024:05:01 10:00:00")
            .entry(1, 0x9286, 7, comment.len() as u32, &comment)
            .ascii(2, 0x0001, "N")
            .entry(2, 0x0002, 5, 3, &lat)
            .build()
    }

    // ── whole-segment behavior ───────────────────────────────────────

    #[test]
    fn empty_segment_is_empty_map() {
        let data = decode_segment(&[]).unwrap();
        assert!(data.is_empty());
        assert!(data.registry.is_empty());
    }

    #[test]
    fn decodes_three_directories_in_order() {
        let data = decode_segment(&sample()).unwrap();
        let names: Vec<_> = data.tags.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["Make", "Orientation", "DateTimeOriginal", "UserComment", "GPSLatitudeRef", "GPSLatitude"]
        );
        assert_eq!(data.tags.get("Make").unwrap().value, TagValue::Text("Canon".into()));
        assert_eq!(data.tags.get("Orientation").unwrap().value, TagValue::Integer(vec![6]));
        assert_eq!(data.tags.get("UserComment").unwrap().value, TagValue::Text("hello".into()));
        assert_eq!(
            data.tags.get("GPSLatitude").unwrap().value,
            TagValue::Rational(vec![Rational::new(35, 1), Rational::new(41, 1), Rational::new(2200, 100)])
        );
        assert_eq!(data.byte_order, ByteOrder::Little);
    }

    #[test]
    fn pointer_tags_are_hidden() {
        let data = decode_segment(&sample()).unwrap();
        assert!(!data.tags.contains("ExifOffset"));
        assert!(!data.tags.contains("GPSInfo"));
    }

    #[test]
    fn qualified_ids_parallel_the_map() {
        let data = decode_segment(&sample()).unwrap();
        let ids = data.tags.id_table();
        assert_eq!(ids["UserComment"].to_string(), "Exif.9286");
        assert_eq!(ids["GPSLatitudeRef"].to_string(), "GPS.0001");
        assert_eq!(ids["Make"].to_string(), "0th.010f");
    }

    #[test]
    fn malformed_header_is_typed_error() {
        assert!(matches!(decode_segment(b"garbage!"), Err(ExifError::MalformedSegment(_))));
        assert!(matches!(decode_segment(b"II*\0"), Err(ExifError::MalformedSegment(_))));
    }

    #[test]
    fn ifd_offset_out_of_bounds_is_malformed() {
        let data = [b'I', b'I', 42, 0, 0xFF, 0, 0, 0];
        assert!(matches!(decode_segment(&data), Err(ExifError::MalformedSegment(_))));
    }

    #[test]
    fn dangling_value_offset_skips_only_that_entry() {
        let mut seg = Fixture::new()
            .ascii(0, 0x010F, "Canon")
            .ascii(0, 0x0110, "EOS R5 Mark II")
            .build();
        // Model is the second entry; point its value offset past the end.
        let field = 8 + 2 + 12 + 8;
        seg[field..field + 4].copy_from_slice(&0xFFFFu32.to_le_bytes());
        let data = decode_segment(&seg).unwrap();
        assert!(data.tags.contains("Make"));
        assert!(!data.tags.contains("Model"));
    }

    #[test]
    fn ifd_typed_exif_pointer_is_followed() {
        let mut seg = Fixture::new()
            .ascii(0, 0x010F, "Canon")
            .ascii(1, 0xA420, "0123456789abcdef")
            .build();
        // IFD0 holds Make then the Exif pointer; retype the pointer as IFD (13).
        let ty = 8 + 2 + 12 + 2;
        assert_eq!(u16::from_le_bytes([seg[ty - 2], seg[ty - 1]]), 0x8769);
        seg[ty..ty + 2].copy_from_slice(&13u16.to_le_bytes());

        let data = decode_segment(&seg).unwrap();
        let names: Vec<_> = data.tags.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Make", "ImageUniqueID"]);
        assert_eq!(
            data.tags.get("ImageUniqueID").unwrap().value,
            TagValue::Text("0123456789abcdef".into())
        );
    }

    #[test]
    fn unknown_type_entry_is_kept_as_raw_field() {
        let seg = Fixture::new()
            .ascii(0, 0x010F, "Canon")
            .entry(0, 0xC000, 99, 1, &[1, 2, 3, 4])
            .build();
        let data = decode_segment(&seg).unwrap();
        let entry = data.tags.get_by_id(tags::QualifiedId::new(Directory::Primary, 0xC000)).unwrap();
        assert_eq!(entry.format, TagFormat::Undefined);
        assert_eq!(entry.value, TagValue::Bytes(vec![1, 2, 3, 4]));
        assert!(data.tags.contains("Make"));
    }

    // ── custom registry ──────────────────────────────────────────────

    #[test]
    fn custom_names_come_from_registry() {
        let seg = Fixture::new()
            .ascii(0, 64999, r#"{"65000": "Author"}"#)
            .ascii(0, 65000, "Alice")
            .build();
        let data = decode_segment(&seg).unwrap();
        assert_eq!(data.tags.len(), 1);
        let entry = data.tags.get("Author").unwrap();
        assert_eq!(entry.id, 65000);
        assert_eq!(entry.value, TagValue::Text("Alice".into()));
        assert_eq!(data.registry.name(65000), Some("Author"));
    }

    #[test]
    fn registry_wins_over_dictionary_on_read() {
        let seg = Fixture::new()
            .ascii(0, 64999, r#"{"271": "Maker"}"#)
            .ascii(0, 0x010F, "Canon")
            .build();
        let data = decode_segment(&seg).unwrap();
        assert!(data.tags.contains("Maker"));
        assert!(!data.tags.contains("Make"));
    }

    #[test]
    fn malformed_registry_does_not_block_other_tags() {
        let seg = Fixture::new()
            .ascii(0, 0x010F, "Canon")
            .ascii(0, 64999, "{not json")
            .ascii(0, 65000, "Alice")
            .build();
        let data = decode_segment(&seg).unwrap();
        assert!(data.registry.is_empty());
        assert_eq!(data.tags.get("Make").unwrap().value, TagValue::Text("Canon".into()));
        assert_eq!(data.tags.get("Unknown-65000").unwrap().value, TagValue::Text("Alice".into()));
        assert!(data.tags.iter().all(|e| e.id != 64999));
    }

    #[test]
    fn name_collision_keys_later_entry_by_id() {
        let seg = Fixture::new()
            .ascii(0, 64999, r#"{"65000": "Artist"}"#)
            .ascii(0, 0x013B, "Bob")
            .ascii(0, 65000, "Alice")
            .build();
        let data = decode_segment(&seg).unwrap();
        assert_eq!(data.tags.get("Artist").unwrap().id, 0x013B);
        assert_eq!(data.tags.get("0th.fde8").unwrap().value, TagValue::Text("Alice".into()));
    }

    // ── containers ───────────────────────────────────────────────────

    #[test]
    fn unsupported_container() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\0";
        assert!(matches!(read_exif_bytes(png), Err(ExifError::UnsupportedFormat(_))));
    }

    #[test]
    fn tiff_container_is_its_own_segment() {
        let seg = sample();
        let data = read_exif_bytes(&seg).unwrap();
        assert_eq!(data.tags.len(), 6);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_exif(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, ExifError::Io { .. }));
    }

    #[test]
    fn lenient_read_maps_malformed_to_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.tif");
        std::fs::write(&path, b"II*\0\xFF\xFF\0\0").unwrap();
        assert!(read_exif(&path).is_err());
        assert!(read_exif_lenient(&path).unwrap().is_empty());
    }
}
