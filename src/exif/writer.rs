use std::collections::BTreeSet;
use std::fmt;

use super::map::TagEntry;
use super::reader::ExifData;
use super::registry::REGISTRY_TAG_ID;
use super::tags::{
    self, Directory, QualifiedId, TAG_EXIF_POINTER, TAG_GPS_POINTER, TAG_THUMBNAIL_LENGTH,
    TAG_THUMBNAIL_OFFSET, ValueKind,
};
use super::tiff::{ByteOrder, TagFormat};
use super::value::{self, TagValue};
use crate::error::{ExifError, Result};

// ============================================================================
// Edit batch
// ============================================================================

/// A single requested change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Add or overwrite a tag by name with a text value.
    Upsert { name: String, value: String },
    /// Remove a tag addressed by qualified ID (`Exif.9286`), name, or bare primary ID.
    Delete { target: String },
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upsert { name, value } => write!(f, "set {name} = {value}"),
            Self::Delete { target } => write!(f, "delete {target}"),
        }
    }
}

/// Ordered list of edits, applied left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBatch {
    ops: Vec<EditOp>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes first, then upserts.
    pub fn from_parts<N, V, D>(upserts: impl IntoIterator<Item = (N, V)>, deletes: impl IntoIterator<Item = D>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
        D: Into<String>,
    {
        let mut batch = Self::new();
        for target in deletes {
            batch.delete(target);
        }
        for (name, value) in upserts {
            batch.upsert(name, value);
        }
        batch
    }

    pub fn upsert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(EditOp::Upsert { name: name.into(), value: value.into() });
        self
    }

    pub fn delete(&mut self, target: impl Into<String>) -> &mut Self {
        self.ops.push(EditOp::Delete { target: target.into() });
        self
    }

    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Result of one operation: the tag it touched, or why it was not applied.
#[derive(Debug)]
pub struct EditOutcome {
    pub op: EditOp,
    pub result: Result<QualifiedId>,
}

impl EditOutcome {
    pub fn applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-operation outcomes of an edit plus whether the image was rewritten.
#[derive(Debug, Default)]
pub struct EditReport {
    pub outcomes: Vec<EditOutcome>,
    pub written: bool,
}

impl EditReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EditOutcome> {
        self.outcomes.iter().filter(|o| !o.applied())
    }
}

/// Apply a batch to decoded data. Failures are per operation; the batch never aborts.
pub fn apply_edits(data: &mut ExifData, batch: &EditBatch) -> Vec<EditOutcome> {
    batch
        .ops()
        .iter()
        .map(|op| {
            let result = match op {
                EditOp::Upsert { name, value } => upsert(data, name, value),
                EditOp::Delete { target } => delete(data, target),
            };
            match &result {
                Ok(qid) => log::debug!("{op} → {qid}"),
                Err(e) => log::warn!("{op}: {e}"),
            }
            EditOutcome { op: op.clone(), result }
        })
        .collect()
}

fn value_from_text(name: &str, text: &str, format: TagFormat, kind: Option<ValueKind>) -> Result<TagValue> {
    let parsed = match kind {
        Some(ValueKind::UserComment | ValueKind::Utf16) => Ok(TagValue::Text(text.to_string())),
        _ => value::parse_text(text, format),
    };
    parsed.map_err(|reason| ExifError::InvalidValue { tag: name.to_string(), reason })
}

/// Resolve the target ID in priority order: standard dictionary, existing entry or
/// registry mapping, then a freshly allocated custom ID.
fn upsert(data: &mut ExifData, name: &str, text: &str) -> Result<QualifiedId> {
    if name.is_empty() {
        return Err(ExifError::InvalidValue {
            tag: name.to_string(),
            reason: "tag name must not be empty".to_string(),
        });
    }

    if let Some(def) = tags::lookup_name(name) {
        if def.kind.is_structural() {
            return Err(ExifError::ReservedTag(name.to_string()));
        }
        let qid = QualifiedId::new(def.directory, def.id);
        let format = match data.tags.get_by_id(qid) {
            Some(existing) => existing.format,
            None => def.kind.default_format().ok_or_else(|| ExifError::ReservedTag(name.to_string()))?,
        };
        let value = value_from_text(name, text, format, Some(def.kind))?;
        if qid.directory == Directory::Primary {
            if let Some(old) = data.registry.remove(qid.id) {
                log::debug!("Dropping custom name '{old}' for standard tag {name}");
            }
        }
        release_name(data, name, qid);
        data.tags.insert(TagEntry {
            directory: qid.directory,
            id: qid.id,
            name: name.to_string(),
            format,
            value,
        });
        return Ok(qid);
    }

    if let Some(existing) = data.tags.get(name) {
        let qid = existing.qualified_id();
        let format = existing.format;
        let value = value_from_text(name, text, format, tags::kind_of(qid.directory, qid.id))?;
        data.tags.insert(TagEntry {
            directory: qid.directory,
            id: qid.id,
            name: name.to_string(),
            format,
            value,
        });
        return Ok(qid);
    }

    let value = value_from_text(name, text, TagFormat::Ascii, None)?;
    let id = match data.registry.id_of(name) {
        Some(id) => id,
        None => {
            let mut taken = data.tags.ids_in(Directory::Primary);
            taken.insert(REGISTRY_TAG_ID);
            let id = data.registry.allocate(&taken)?;
            data.registry.insert(id, name);
            log::debug!("Allocated custom tag ID {id} for '{name}'");
            id
        }
    };
    data.tags.insert(TagEntry {
        directory: Directory::Primary,
        id,
        name: name.to_string(),
        format: TagFormat::Ascii,
        value,
    });
    Ok(QualifiedId::new(Directory::Primary, id))
}

/// Move an entry that holds `name` at some other ID out of the way, so the standard tag
/// can take the name without overwriting it.
fn release_name(data: &mut ExifData, name: &str, qid: QualifiedId) {
    let Some(other) = data.tags.get(name).map(TagEntry::qualified_id) else {
        return;
    };
    if other == qid {
        return;
    }
    if other.directory == Directory::Primary && data.registry.name(other.id) == Some(name) {
        data.registry.remove(other.id);
    }
    let standard = tags::resolve(other.directory, other.id);
    let new_name = if data.tags.contains(&standard) { other.to_string() } else { standard };
    log::debug!("Renaming {other} from '{name}' to '{new_name}' to make room for {qid}");
    data.tags.rename(name, new_name);
}

fn delete(data: &mut ExifData, target: &str) -> Result<QualifiedId> {
    let removed = if let Ok(qid) = target.parse::<QualifiedId>() {
        remove_id(data, qid)?
    } else if let Some(entry) = data.tags.remove(target) {
        Some(entry)
    } else if let Ok(id) = target.parse::<u16>() {
        remove_id(data, QualifiedId::new(Directory::Primary, id))?
    } else {
        None
    };

    let entry = removed.ok_or_else(|| ExifError::UnknownTagReference(target.to_string()))?;
    if entry.directory == Directory::Primary {
        data.registry.remove(entry.id);
    }
    Ok(entry.qualified_id())
}

fn remove_id(data: &mut ExifData, qid: QualifiedId) -> Result<Option<TagEntry>> {
    if qid == QualifiedId::new(Directory::Primary, REGISTRY_TAG_ID) {
        return Err(ExifError::ReservedTag(qid.to_string()));
    }
    Ok(data.tags.remove_by_id(qid))
}

// ============================================================================
// TIFF assembly
// ============================================================================

/// A raw IFD entry ready to be laid out, in the segment's byte order.
struct RawIfdEntry {
    tag_id: u16,
    format: TagFormat,
    count: u32,
    data: Vec<u8>,
}

impl RawIfdEntry {
    fn long(tag_id: u16, value: u32, order: ByteOrder) -> Self {
        Self { tag_id, format: TagFormat::Long, count: 1, data: order.u32_bytes(value).to_vec() }
    }
}

/// Where an IFD landed, so pointer fields can be patched once their targets are written.
struct WrittenIfd {
    start: u32,
    next_pos: usize,
    fields: Vec<(u16, usize)>,
}

impl WrittenIfd {
    fn field(&self, tag_id: u16) -> Option<usize> {
        self.fields.iter().find(|(t, _)| *t == tag_id).map(|(_, p)| *p)
    }
}

struct TiffWriter {
    out: Vec<u8>,
    order: ByteOrder,
}

impl TiffWriter {
    fn offset(&self) -> Result<u32> {
        u32::try_from(self.out.len()).map_err(|_| ExifError::SegmentTooLarge(self.out.len()))
    }

    fn align(&mut self) {
        if self.out.len() % 2 == 1 {
            self.out.push(0);
        }
    }

    fn patch_u32(&mut self, pos: usize, value: u32) {
        self.out[pos..pos + 4].copy_from_slice(&self.order.u32_bytes(value));
    }

    /// Write an IFD followed by its data area. Entries are sorted by tag ID.
    fn write_ifd(&mut self, mut entries: Vec<RawIfdEntry>, next: u32) -> Result<WrittenIfd> {
        self.align();
        entries.sort_by_key(|e| e.tag_id);
        let start = self.offset()?;
        let count = u16::try_from(entries.len())
            .map_err(|_| ExifError::malformed("too many entries for one IFD"))?;

        self.out.extend_from_slice(&self.order.u16_bytes(count));
        let mut data_off = start as usize + 2 + entries.len() * 12 + 4;
        let mut fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            self.out.extend_from_slice(&self.order.u16_bytes(entry.tag_id));
            self.out.extend_from_slice(&self.order.u16_bytes(entry.format.code()));
            self.out.extend_from_slice(&self.order.u32_bytes(entry.count));
            fields.push((entry.tag_id, self.out.len()));
            if entry.data.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..entry.data.len()].copy_from_slice(&entry.data);
                self.out.extend_from_slice(&inline);
            } else {
                let off = u32::try_from(data_off).map_err(|_| ExifError::SegmentTooLarge(data_off))?;
                self.out.extend_from_slice(&self.order.u32_bytes(off));
                data_off += entry.data.len() + entry.data.len() % 2;
            }
        }
        let next_pos = self.out.len();
        self.out.extend_from_slice(&self.order.u32_bytes(next));

        for entry in entries.iter().filter(|e| e.data.len() > 4) {
            self.out.extend_from_slice(&entry.data);
            self.align();
        }

        Ok(WrittenIfd { start, next_pos, fields })
    }
}

/// How offset-bearing tags are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Fresh segment: tags pointing into the old segment would dangle and are dropped.
    Compact,
    /// Directories appended to the original bytes, so old offsets stay valid.
    Append,
}

fn raw_entries(data: &ExifData, directory: Directory, layout: Layout) -> Vec<RawIfdEntry> {
    data.tags
        .in_directory(directory)
        .filter(|e| {
            let structural = tags::kind_of(e.directory, e.id).is_some_and(ValueKind::is_structural);
            if structural && layout == Layout::Compact {
                log::debug!("Dropping offset tag {} in a fresh segment", e.name);
            }
            !(structural && layout == Layout::Compact)
        })
        .map(|e| {
            let kind = tags::kind_of(e.directory, e.id);
            let (bytes, count) = value::encode_value(&e.value, e.format, data.byte_order, kind);
            RawIfdEntry { tag_id: e.id, format: e.format, count, data: bytes }
        })
        .collect()
}

/// Registry restricted to IDs still present in the primary directory.
fn registry_entry(data: &ExifData) -> Option<RawIfdEntry> {
    let present: BTreeSet<u16> = data.tags.ids_in(Directory::Primary);
    let mut registry = data.registry.clone();
    for stale in registry.retain_ids(&present) {
        log::debug!("Dropping registry entry for missing custom tag '{stale}'");
    }
    let mut json = registry.serialize()?;
    json.push(0);
    let count = json.len() as u32;
    Some(RawIfdEntry { tag_id: REGISTRY_TAG_ID, format: TagFormat::Ascii, count, data: json })
}

/// Write the three directories (and an optional thumbnail IFD) into `w`, returning IFD0.
fn write_directories(w: &mut TiffWriter, data: &ExifData, layout: Layout, ifd0_next: u32) -> Result<WrittenIfd> {
    let order = data.byte_order;
    let exif_entries = raw_entries(data, Directory::Exif, layout);
    let gps_entries = raw_entries(data, Directory::Gps, layout);

    let mut primary = raw_entries(data, Directory::Primary, layout);
    if let Some(entry) = registry_entry(data) {
        primary.retain(|e| e.tag_id != REGISTRY_TAG_ID);
        primary.push(entry);
    }
    if !exif_entries.is_empty() {
        primary.push(RawIfdEntry::long(TAG_EXIF_POINTER, 0, order));
    }
    if !gps_entries.is_empty() {
        primary.push(RawIfdEntry::long(TAG_GPS_POINTER, 0, order));
    }

    let ifd0 = w.write_ifd(primary, ifd0_next)?;
    for (pointer, entries) in [(TAG_EXIF_POINTER, exif_entries), (TAG_GPS_POINTER, gps_entries)] {
        if entries.is_empty() {
            continue;
        }
        let sub = w.write_ifd(entries, 0)?;
        if let Some(pos) = ifd0.field(pointer) {
            w.patch_u32(pos, sub.start);
        }
    }
    Ok(ifd0)
}

/// Encode decoded data as a fresh EXIF segment (the payload of a JPEG APP1 `Exif` marker).
///
/// Layout: header, IFD0 and its data, Exif IFD, GPS IFD, then IFD1 with the thumbnail.
/// An empty map with no registry and no thumbnail still yields a valid, empty IFD0.
pub fn encode_segment(data: &ExifData) -> Result<Vec<u8>> {
    let order = data.byte_order;
    let mut w = TiffWriter { out: Vec::new(), order };
    w.out.extend_from_slice(order.marker());
    w.out.extend_from_slice(&order.u16_bytes(42));
    w.out.extend_from_slice(&order.u32_bytes(8));

    let ifd0 = write_directories(&mut w, data, Layout::Compact, 0)?;

    if let Some(thumb) = &data.thumbnail {
        let entries = vec![
            RawIfdEntry { tag_id: 0x0103, format: TagFormat::Short, count: 1, data: order.u16_bytes(6).to_vec() },
            RawIfdEntry::long(TAG_THUMBNAIL_OFFSET, 0, order),
            RawIfdEntry::long(TAG_THUMBNAIL_LENGTH, thumb.len() as u32, order),
        ];
        let ifd1 = w.write_ifd(entries, 0)?;
        w.patch_u32(ifd0.next_pos, ifd1.start);
        let thumb_start = w.offset()?;
        w.out.extend_from_slice(thumb);
        if let Some(pos) = ifd1.field(TAG_THUMBNAIL_OFFSET) {
            w.patch_u32(pos, thumb_start);
        }
    }

    log::debug!("Encoded EXIF segment: {} bytes", w.out.len());
    Ok(w.out)
}

/// Rebuild the directories of a TIFF file without moving any existing bytes.
///
/// The original content (strips, tiles, later pages) stays where it is; new directories are
/// appended and the header is repointed. IFD0's original next-IFD link is kept.
pub fn encode_into_tiff(original: &[u8], data: &ExifData) -> Result<Vec<u8>> {
    let order = ByteOrder::from_marker(original)
        .ok_or_else(|| ExifError::malformed("original is not a TIFF file"))?;
    if original.len() < 8 || order != data.byte_order {
        return Err(ExifError::malformed("byte order of decoded data does not match the file"));
    }

    let mut w = TiffWriter { out: original.to_vec(), order };
    let ifd0 = write_directories(&mut w, data, Layout::Append, data.next_ifd)?;
    w.patch_u32(4, ifd0.start);

    log::debug!(
        "Appended directories to TIFF: {} → {} bytes",
        original.len(),
        w.out.len()
    );
    Ok(w.out)
}
