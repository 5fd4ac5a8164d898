//! EXIF segment decoding, editing and encoding.
//!
//! - [`read_exif`] decodes the primary, Exif and GPS directories of a JPEG or TIFF into a
//!   name-keyed [`TagMap`], resolving names through the standard dictionary and the custom
//!   tag registry.
//! - [`apply_edits`] applies an [`EditBatch`] of upserts and deletes to decoded data.
//! - [`encode_segment`] and [`encode_into_tiff`] turn the result back into bytes.
//!
//! File-level orchestration (backup, atomic replace) lives in [`crate::pipeline`].

mod map;
mod reader;
mod registry;
mod tags;
mod tiff;
mod value;
mod writer;

pub use map::{TagEntry, TagMap, TagRecord};
pub use reader::{ExifData, decode_segment, extract_segment, read_exif, read_exif_bytes, read_exif_lenient};
pub use registry::{CUSTOM_ID_FLOOR, CustomTagRegistry, REGISTRY_TAG_ID};
pub use tags::{Directory, QualifiedId, TagDef, ValueKind, lookup, lookup_name, resolve, reverse_resolve};
pub use tiff::{ByteOrder, TagFormat};
pub use value::{Rational, TagValue};
pub use writer::{
    EditBatch, EditOp, EditOutcome, EditReport, apply_edits, encode_into_tiff, encode_segment,
};
