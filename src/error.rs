use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the EXIF codec and the edit orchestrator.
///
/// Decoding and whole-file operations surface `UnsupportedFormat`, `MalformedSegment`,
/// `SegmentTooLarge` and `Io`. The remaining variants describe a single edit operation
/// and are reported per operation in an [`EditReport`](crate::exif::EditReport) rather
/// than aborting the batch.
#[derive(Debug, Error)]
pub enum ExifError {
    /// The container is not JPEG or TIFF.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// EXIF bytes are present but do not form a valid TIFF structure.
    #[error("malformed EXIF segment: {0}")]
    MalformedSegment(String),

    /// The reserved registry slot holds something other than the expected JSON object.
    #[error("malformed custom tag registry: {0}")]
    MalformedCustomRegistry(#[from] serde_json::Error),

    /// A delete referenced a name or ID that is not present.
    #[error("tag not found: {0}")]
    UnknownTagReference(String),

    /// The operation targets the registry slot or a structural pointer tag.
    #[error("tag {0} is reserved and cannot be edited directly")]
    ReservedTag(String),

    /// An upsert value could not be converted to the tag's field format.
    #[error("invalid value for {tag}: {reason}")]
    InvalidValue { tag: String, reason: String },

    /// Every ID from the custom floor up to 65535 is taken.
    #[error("no free custom tag ID left at or above {0}")]
    CustomIdsExhausted(u16),

    /// The encoded segment does not fit in a JPEG APP1 marker.
    #[error("encoded EXIF segment is {0} bytes, larger than a JPEG APP1 segment allows")]
    SegmentTooLarge(usize),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExifError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSegment(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ExifError>;
