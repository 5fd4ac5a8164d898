use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, ScanConfig};
use crate::error::{ExifError, Result};
use crate::exif::{self, ByteOrder, EditBatch, EditReport, ExifData};

/// APP1 payload prefix that marks an EXIF segment.
const JPEG_EXIF_PREFIX: &[u8] = b"Exif\0\0";
/// Largest APP1 payload: the 16-bit length field counts itself.
const MAX_APP1_PAYLOAD: usize = 65533;

/// Image container that can carry an editable EXIF segment.
///
/// Detection is by content ([`ImageKind::detect`]); directory scans filter by the configured
/// extensions instead.
///
/// # Example
///
/// ```rust
/// use exif_editor::pipeline::ImageKind;
///
/// assert_eq!(ImageKind::detect(b"\xFF\xD8\xFF\xE0").unwrap(), ImageKind::Jpeg);
/// assert_eq!(ImageKind::detect(b"MM\0*\0\0\0\x08").unwrap(), ImageKind::Tiff);
/// assert!(ImageKind::detect(b"\x89PNG\r\n\x1a\n").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// EXIF lives in an APP1 segment; rewritten as a fresh compact segment.
    Jpeg,
    /// The file is the TIFF structure; directories are appended in place.
    Tiff,
}

impl ImageKind {
    /// Identify the container from its leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [0xFF, 0xD8, ..] => Ok(Self::Jpeg),
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Ok(Self::Tiff),
            [] => Err(ExifError::UnsupportedFormat("empty file".to_string())),
            _ => Err(ExifError::UnsupportedFormat(format!(
                "unrecognized signature {:02X?}",
                &bytes[..bytes.len().min(4)]
            ))),
        }
    }
}

/// Behaviour of a single edit call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOptions {
    /// Decode, edit and encode, but leave the file alone.
    pub dry_run: bool,
    /// Copy the original to `<name>.<ext>.bak` before replacing it.
    pub backup_originals: bool,
}

impl From<&Config> for EditOptions {
    fn from(config: &Config) -> Self {
        Self {
            dry_run: config.output.dry_run,
            backup_originals: config.output.backup_originals,
        }
    }
}

/// Collect image files from the given paths.
///
/// Files are kept when their extension is listed in `scan.extensions`; directories are walked
/// recursively.
///
/// # Example
///
/// ```rust,no_run
/// use exif_editor::config::ScanConfig;
/// use exif_editor::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[PathBuf::from("./photos/")], &ScanConfig::default());
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf], scan: &ScanConfig) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path, &scan.extensions) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(scan.follow_links)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p, &scan.extensions) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_supported_image(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Copy the original file to `<name>.<ext>.bak`. An existing backup is left as is.
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).map_err(|e| ExifError::io(&backup_path, e))?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Apply deletes, then upserts, to an image file in place.
///
/// # Example
///
/// ```rust,no_run
/// use exif_editor::pipeline::apply;
///
/// let report = apply("photo.jpg".as_ref(), [("Author", "Alice")], ["Exif.9286"])?;
/// for outcome in report.failures() {
///     eprintln!("{}: {:?}", outcome.op, outcome.result);
/// }
/// # Ok::<(), exif_editor::ExifError>(())
/// ```
pub fn apply<N, V, D>(
    path: &Path,
    upserts: impl IntoIterator<Item = (N, V)>,
    deletes: impl IntoIterator<Item = D>,
) -> Result<EditReport>
where
    N: Into<String>,
    V: Into<String>,
    D: Into<String>,
{
    apply_batch(path, &EditBatch::from_parts(upserts, deletes), &EditOptions::default())
}

/// Decode the image's EXIF, apply `batch`, and atomically replace the file.
///
/// Per-operation failures are collected in the report; the file is rewritten when at least
/// one operation applied. Whole-call failures (I/O, unsupported container, oversize segment)
/// return `Err` and leave the original untouched.
pub fn apply_batch(path: &Path, batch: &EditBatch, options: &EditOptions) -> Result<EditReport> {
    let bytes = std::fs::read(path).map_err(|e| ExifError::io(path, e))?;
    let (kind, segment) = exif::extract_segment(&bytes)?;
    let mut data = decode_base(kind, segment.as_deref())?;

    let outcomes = exif::apply_edits(&mut data, batch);
    let mut report = EditReport { outcomes, written: false };
    if report.applied_count() == 0 {
        log::info!("No edits applied to {}; file left unchanged", path.display());
        return Ok(report);
    }

    let output = match kind {
        ImageKind::Jpeg => rewrite_jpeg(bytes, &exif::encode_segment(&data)?)?,
        ImageKind::Tiff => exif::encode_into_tiff(&bytes, &data)?,
    };

    if options.dry_run {
        log::info!(
            "Dry run: {} of {} edit(s) would be written to {}",
            report.applied_count(),
            report.outcomes.len(),
            path.display()
        );
        return Ok(report);
    }

    if options.backup_originals {
        backup_file(path)?;
    }
    write_atomically(path, &output)?;
    report.written = true;
    log::info!("Updated {} ({} edit(s))", path.display(), report.applied_count());
    Ok(report)
}

/// Starting point for an edit. An unreadable JPEG segment is replaced by an empty one;
/// an unreadable TIFF directory is fatal because the image data hangs off it.
fn decode_base(kind: ImageKind, segment: Option<&[u8]>) -> Result<ExifData> {
    let Some(segment) = segment else {
        return Ok(ExifData::default());
    };
    match (exif::decode_segment(segment), kind) {
        (Ok(data), _) => Ok(data),
        (Err(ExifError::MalformedSegment(msg)), ImageKind::Jpeg) => {
            log::warn!("Discarding unreadable EXIF segment: {msg}");
            Ok(ExifData {
                byte_order: ByteOrder::from_marker(segment).unwrap_or_default(),
                ..ExifData::default()
            })
        }
        (Err(e), _) => Err(e),
    }
}

/// Replace the APP1 EXIF payload, keeping every other segment and the scan data as is.
fn rewrite_jpeg(bytes: Vec<u8>, tiff: &[u8]) -> Result<Vec<u8>> {
    let payload = tiff.len() + JPEG_EXIF_PREFIX.len();
    if payload > MAX_APP1_PAYLOAD {
        return Err(ExifError::SegmentTooLarge(payload));
    }

    let mut jpeg = Jpeg::from_bytes(Bytes::from(bytes))
        .map_err(|e| ExifError::UnsupportedFormat(format!("unreadable JPEG: {e}")))?;

    let orig_exif_pos = find_exif_segment_pos(&jpeg);
    jpeg.set_exif(Some(Bytes::copy_from_slice(tiff)));

    // set_exif() inserts after the leading APP segments; move it back to where it was.
    if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
        let target_pos = orig_exif_pos.unwrap_or(1);
        if target_pos < new_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target_pos, seg);
        }
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

/// Position of the EXIF APP1 segment (marker 0xE1, contents starting with `Exif\0\0`).
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(JPEG_EXIF_PREFIX))
}

/// Write `bytes` to a sibling temporary file with the same extension, sync it, then rename
/// it over `path`. An existing file's permissions carry over to the replacement. On any
/// failure the temporary file is removed and `path` is untouched.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{stem}_"))
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| ExifError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| ExifError::io(tmp.path(), e))?;
    // The staging file is created owner-only.
    match std::fs::metadata(path) {
        Ok(meta) => tmp
            .as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| ExifError::io(tmp.path(), e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ExifError::io(path, e)),
    }
    tmp.as_file().sync_all().map_err(|e| ExifError::io(tmp.path(), e))?;
    log::debug!("Staged {} bytes in {}", bytes.len(), tmp.path().display());

    tmp.persist(path).map_err(|e| ExifError::io(path, e.error))?;
    Ok(())
}
