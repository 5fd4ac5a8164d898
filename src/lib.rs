//! # exif-editor
//!
//! Decode, edit and re-encode the EXIF segment of JPEG and TIFF images. Tags from the primary,
//! Exif and GPS directories are exposed by name; names with no standard meaning become custom
//! tags whose names travel with the file in a JSON registry (tag 64999 of the primary
//! directory).
//!
//! ## Quick Start
//!
//! The pipeline module edits a file in place. The new content is written to a temporary file
//! next to the original and renamed over it only once complete:
//!
//! ```rust,no_run
//! use exif_editor::pipeline;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let path = Path::new("photo.jpg");
//!
//!     // Deletes run first, then upserts. Unknown names get custom IDs from 65000 up.
//!     let report = pipeline::apply(path, [("Author", "Alice"), ("Artist", "Alice")], ["Exif.9286"])?;
//!
//!     for outcome in &report.outcomes {
//!         match &outcome.result {
//!             Ok(id) => println!("{} -> {id}", outcome.op),
//!             Err(e) => println!("{} failed: {e}", outcome.op),
//!         }
//!     }
//!     println!("file rewritten: {}", report.written);
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! Decoding, editing and encoding are separate steps on in-memory data:
//!
//! ```rust,no_run
//! use exif_editor::exif::{self, EditBatch};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Decode
//!     let mut data = exif::read_exif(Path::new("photo.jpg"))?;
//!     for record in data.tags.records() {
//!         println!("{:<24} {:<10} {}", record.tag_name, record.tag_id, record.value);
//!     }
//!
//!     // 2. Edit
//!     let mut batch = EditBatch::new();
//!     batch.upsert("Project", "X").delete("Author");
//!     let outcomes = exif::apply_edits(&mut data, &batch);
//!     assert_eq!(outcomes.len(), 2);
//!
//!     // 3. Encode a fresh segment (the payload of a JPEG APP1 `Exif` marker)
//!     let segment = exif::encode_segment(&data)?;
//!     println!("{} bytes", segment.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Write Strategy |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | APP1 segment rebuilt, other segments and scan data untouched |
//! | TIFF (`.tif`, `.tiff`) | Directories appended, image data untouched |
//!
//! Anything else fails with [`ExifError::UnsupportedFormat`].
//!
//! ## Modules
//!
//! - [`config`]: configuration types and loading/saving
//! - [`error`]: the error taxonomy
//! - [`exif`]: tag dictionary, custom tag registry, decoder and encoder
//! - [`pipeline`]: file-level editing, format detection and image collection

pub mod config;
pub mod error;
pub mod exif;
pub mod pipeline;

pub use error::{ExifError, Result};
