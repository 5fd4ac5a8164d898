//! Standard tag dictionary for the primary (0th), Exif and GPS directories.
//!
//! The table is static; forward (`directory + id → name`) and reverse (`name → directory + id`)
//! indexes are built once on first use and never mutated.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::tiff::TagFormat;

/// Pointer tag in the primary directory that locates the Exif directory.
pub const TAG_EXIF_POINTER: u16 = 0x8769;
/// Pointer tag in the primary directory that locates the GPS directory.
pub const TAG_GPS_POINTER: u16 = 0x8825;
/// UserComment, Exif directory.
pub const TAG_USER_COMMENT: u16 = 0x9286;
/// IFD1 thumbnail offset and length.
pub const TAG_THUMBNAIL_OFFSET: u16 = 0x0201;
pub const TAG_THUMBNAIL_LENGTH: u16 = 0x0202;

/// One of the three EXIF namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Directory {
    Primary,
    Exif,
    Gps,
}

impl Directory {
    pub const ALL: [Directory; 3] = [Directory::Primary, Directory::Exif, Directory::Gps];

    /// Short name used in qualified IDs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "0th",
            Self::Exif => "Exif",
            Self::Gps => "GPS",
        }
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "0th" | "primary" | "ifd0" => Ok(Self::Primary),
            "exif" => Ok(Self::Exif),
            "gps" => Ok(Self::Gps),
            other => Err(format!("unknown directory '{other}'")),
        }
    }
}

/// Directory-scoped tag address, rendered as `{directory}.{hexId}` (e.g. `Exif.9286`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedId {
    pub directory: Directory,
    pub id: u16,
}

impl QualifiedId {
    pub fn new(directory: Directory, id: u16) -> Self {
        Self { directory, id }
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04x}", self.directory, self.id)
    }
}

impl FromStr for QualifiedId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dir, hex) = s
            .split_once('.')
            .ok_or_else(|| format!("'{s}' is not of the form directory.hexId"))?;
        let directory = dir.parse::<Directory>()?;
        let hex = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);
        let id = u16::from_str_radix(hex, 16).map_err(|e| format!("bad tag ID '{hex}': {e}"))?;
        Ok(Self { directory, id })
    }
}

/// How a tag's value is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Ascii,
    Byte,
    Short,
    Long,
    Rational,
    SRational,
    Undefined,
    /// 8-byte charset marker followed by the text payload.
    UserComment,
    /// Windows XP* tags: UTF-16LE text stored as BYTE.
    Utf16,
    /// Locates another directory; regenerated by the encoder.
    Pointer,
    /// Absolute offset into the segment (strips, tiles, thumbnails, interop).
    Offset,
}

impl ValueKind {
    /// Field format used when writing a brand-new value of this kind.
    pub fn default_format(self) -> Option<TagFormat> {
        Some(match self {
            Self::Ascii => TagFormat::Ascii,
            Self::Byte | Self::Utf16 => TagFormat::Byte,
            Self::Short => TagFormat::Short,
            Self::Long => TagFormat::Long,
            Self::Rational => TagFormat::Rational,
            Self::SRational => TagFormat::SRational,
            Self::Undefined | Self::UserComment => TagFormat::Undefined,
            Self::Pointer | Self::Offset => return None,
        })
    }

    /// Whether the tag carries layout information rather than user data.
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Pointer | Self::Offset)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TagDef {
    pub directory: Directory,
    pub id: u16,
    pub name: &'static str,
    pub kind: ValueKind,
}

const fn def(directory: Directory, id: u16, name: &'static str, kind: ValueKind) -> TagDef {
    TagDef { directory, id, name, kind }
}

use Directory::{Exif as E, Gps as G, Primary as P};
use ValueKind::*;

static TAGS: &[TagDef] = &[
    // Primary (0th) directory
    def(P, 0x000B, "ProcessingSoftware", Ascii),
    def(P, 0x00FE, "NewSubfileType", Long),
    def(P, 0x00FF, "SubfileType", Short),
    def(P, 0x0100, "ImageWidth", Long),
    def(P, 0x0101, "ImageLength", Long),
    def(P, 0x0102, "BitsPerSample", Short),
    def(P, 0x0103, "Compression", Short),
    def(P, 0x0106, "PhotometricInterpretation", Short),
    def(P, 0x010A, "FillOrder", Short),
    def(P, 0x010D, "DocumentName", Ascii),
    def(P, 0x010E, "ImageDescription", Ascii),
    def(P, 0x010F, "Make", Ascii),
    def(P, 0x0110, "Model", Ascii),
    def(P, 0x0111, "StripOffsets", Offset),
    def(P, 0x0112, "Orientation", Short),
    def(P, 0x0115, "SamplesPerPixel", Short),
    def(P, 0x0116, "RowsPerStrip", Long),
    def(P, 0x0117, "StripByteCounts", Long),
    def(P, 0x011A, "XResolution", Rational),
    def(P, 0x011B, "YResolution", Rational),
    def(P, 0x011C, "PlanarConfiguration", Short),
    def(P, 0x011D, "PageName", Ascii),
    def(P, 0x0128, "ResolutionUnit", Short),
    def(P, 0x0129, "PageNumber", Short),
    def(P, 0x012D, "TransferFunction", Short),
    def(P, 0x0131, "Software", Ascii),
    def(P, 0x0132, "DateTime", Ascii),
    def(P, 0x013B, "Artist", Ascii),
    def(P, 0x013C, "HostComputer", Ascii),
    def(P, 0x013D, "Predictor", Short),
    def(P, 0x013E, "WhitePoint", Rational),
    def(P, 0x013F, "PrimaryChromaticities", Rational),
    def(P, 0x0142, "TileWidth", Long),
    def(P, 0x0143, "TileLength", Long),
    def(P, 0x0144, "TileOffsets", Offset),
    def(P, 0x0145, "TileByteCounts", Long),
    def(P, 0x014A, "SubIFDs", Offset),
    def(P, 0x0152, "ExtraSamples", Short),
    def(P, 0x0153, "SampleFormat", Short),
    def(P, 0x0201, "JPEGInterchangeFormat", Offset),
    def(P, 0x0202, "JPEGInterchangeFormatLength", Long),
    def(P, 0x0211, "YCbCrCoefficients", Rational),
    def(P, 0x0212, "YCbCrSubSampling", Short),
    def(P, 0x0213, "YCbCrPositioning", Short),
    def(P, 0x0214, "ReferenceBlackWhite", Rational),
    def(P, 0x02BC, "XMLPacket", Byte),
    def(P, 0x4746, "Rating", Short),
    def(P, 0x4749, "RatingPercent", Short),
    def(P, 0x8298, "Copyright", Ascii),
    def(P, 0x83BB, "IptcNaaInfo", Long),
    def(P, 0x8773, "InterColorProfile", Undefined),
    def(P, TAG_EXIF_POINTER, "ExifOffset", Pointer),
    def(P, TAG_GPS_POINTER, "GPSInfo", Pointer),
    def(P, 0x9C9B, "XPTitle", Utf16),
    def(P, 0x9C9C, "XPComment", Utf16),
    def(P, 0x9C9D, "XPAuthor", Utf16),
    def(P, 0x9C9E, "XPKeywords", Utf16),
    def(P, 0x9C9F, "XPSubject", Utf16),
    def(P, 0xC4A5, "PrintImageMatching", Undefined),
    // Exif directory
    def(E, 0x829A, "ExposureTime", Rational),
    def(E, 0x829D, "FNumber", Rational),
    def(E, 0x8822, "ExposureProgram", Short),
    def(E, 0x8824, "SpectralSensitivity", Ascii),
    def(E, 0x8827, "ISOSpeedRatings", Short),
    def(E, 0x8828, "OECF", Undefined),
    def(E, 0x8830, "SensitivityType", Short),
    def(E, 0x8831, "StandardOutputSensitivity", Long),
    def(E, 0x8832, "RecommendedExposureIndex", Long),
    def(E, 0x9000, "ExifVersion", Undefined),
    def(E, 0x9003, "DateTimeOriginal", Ascii),
    def(E, 0x9004, "DateTimeDigitized", Ascii),
    def(E, 0x9010, "OffsetTime", Ascii),
    def(E, 0x9011, "OffsetTimeOriginal", Ascii),
    def(E, 0x9012, "OffsetTimeDigitized", Ascii),
    def(E, 0x9101, "ComponentsConfiguration", Undefined),
    def(E, 0x9102, "CompressedBitsPerPixel", Rational),
    def(E, 0x9201, "ShutterSpeedValue", SRational),
    def(E, 0x9202, "ApertureValue", Rational),
    def(E, 0x9203, "BrightnessValue", SRational),
    def(E, 0x9204, "ExposureBiasValue", SRational),
    def(E, 0x9205, "MaxApertureValue", Rational),
    def(E, 0x9206, "SubjectDistance", Rational),
    def(E, 0x9207, "MeteringMode", Short),
    def(E, 0x9208, "LightSource", Short),
    def(E, 0x9209, "Flash", Short),
    def(E, 0x920A, "FocalLength", Rational),
    def(E, 0x9214, "SubjectArea", Short),
    def(E, 0x927C, "MakerNote", Undefined),
    def(E, TAG_USER_COMMENT, "UserComment", UserComment),
    def(E, 0x9290, "SubsecTime", Ascii),
    def(E, 0x9291, "SubsecTimeOriginal", Ascii),
    def(E, 0x9292, "SubsecTimeDigitized", Ascii),
    def(E, 0xA000, "FlashPixVersion", Undefined),
    def(E, 0xA001, "ColorSpace", Short),
    def(E, 0xA002, "ExifImageWidth", Long),
    def(E, 0xA003, "ExifImageHeight", Long),
    def(E, 0xA004, "RelatedSoundFile", Ascii),
    def(E, 0xA005, "ExifInteroperabilityOffset", Offset),
    def(E, 0xA20B, "FlashEnergy", Rational),
    def(E, 0xA20E, "FocalPlaneXResolution", Rational),
    def(E, 0xA20F, "FocalPlaneYResolution", Rational),
    def(E, 0xA210, "FocalPlaneResolutionUnit", Short),
    def(E, 0xA214, "SubjectLocation", Short),
    def(E, 0xA215, "ExposureIndex", Rational),
    def(E, 0xA217, "SensingMethod", Short),
    def(E, 0xA300, "FileSource", Undefined),
    def(E, 0xA301, "SceneType", Undefined),
    def(E, 0xA302, "CFAPattern", Undefined),
    def(E, 0xA401, "CustomRendered", Short),
    def(E, 0xA402, "ExposureMode", Short),
    def(E, 0xA403, "WhiteBalance", Short),
    def(E, 0xA404, "DigitalZoomRatio", Rational),
    def(E, 0xA405, "FocalLengthIn35mmFilm", Short),
    def(E, 0xA406, "SceneCaptureType", Short),
    def(E, 0xA407, "GainControl", Short),
    def(E, 0xA408, "Contrast", Short),
    def(E, 0xA409, "Saturation", Short),
    def(E, 0xA40A, "Sharpness", Short),
    def(E, 0xA40B, "DeviceSettingDescription", Undefined),
    def(E, 0xA40C, "SubjectDistanceRange", Short),
    def(E, 0xA420, "ImageUniqueID", Ascii),
    def(E, 0xA430, "CameraOwnerName", Ascii),
    def(E, 0xA431, "BodySerialNumber", Ascii),
    def(E, 0xA432, "LensSpecification", Rational),
    def(E, 0xA433, "LensMake", Ascii),
    def(E, 0xA434, "LensModel", Ascii),
    def(E, 0xA435, "LensSerialNumber", Ascii),
    def(E, 0xA500, "Gamma", Rational),
    // GPS directory
    def(G, 0x0000, "GPSVersionID", Byte),
    def(G, 0x0001, "GPSLatitudeRef", Ascii),
    def(G, 0x0002, "GPSLatitude", Rational),
    def(G, 0x0003, "GPSLongitudeRef", Ascii),
    def(G, 0x0004, "GPSLongitude", Rational),
    def(G, 0x0005, "GPSAltitudeRef", Byte),
    def(G, 0x0006, "GPSAltitude", Rational),
    def(G, 0x0007, "GPSTimeStamp", Rational),
    def(G, 0x0008, "GPSSatellites", Ascii),
    def(G, 0x0009, "GPSStatus", Ascii),
    def(G, 0x000A, "GPSMeasureMode", Ascii),
    def(G, 0x000B, "GPSDOP", Rational),
    def(G, 0x000C, "GPSSpeedRef", Ascii),
    def(G, 0x000D, "GPSSpeed", Rational),
    def(G, 0x000E, "GPSTrackRef", Ascii),
    def(G, 0x000F, "GPSTrack", Rational),
    def(G, 0x0010, "GPSImgDirectionRef", Ascii),
    def(G, 0x0011, "GPSImgDirection", Rational),
    def(G, 0x0012, "GPSMapDatum", Ascii),
    def(G, 0x0013, "GPSDestLatitudeRef", Ascii),
    def(G, 0x0014, "GPSDestLatitude", Rational),
    def(G, 0x0015, "GPSDestLongitudeRef", Ascii),
    def(G, 0x0016, "GPSDestLongitude", Rational),
    def(G, 0x0017, "GPSDestBearingRef", Ascii),
    def(G, 0x0018, "GPSDestBearing", Rational),
    def(G, 0x0019, "GPSDestDistanceRef", Ascii),
    def(G, 0x001A, "GPSDestDistance", Rational),
    def(G, 0x001B, "GPSProcessingMethod", Undefined),
    def(G, 0x001C, "GPSAreaInformation", Undefined),
    def(G, 0x001D, "GPSDateStamp", Ascii),
    def(G, 0x001E, "GPSDifferential", Short),
    def(G, 0x001F, "GPSHPositioningError", Rational),
];

static FORWARD: LazyLock<HashMap<QualifiedId, &'static TagDef>> = LazyLock::new(|| {
    TAGS.iter()
        .map(|t| (QualifiedId::new(t.directory, t.id), t))
        .collect()
});

static REVERSE: LazyLock<HashMap<&'static str, &'static TagDef>> =
    LazyLock::new(|| TAGS.iter().map(|t| (t.name, t)).collect());

/// Look up the dictionary entry for a directory-scoped ID.
pub fn lookup(directory: Directory, id: u16) -> Option<&'static TagDef> {
    FORWARD.get(&QualifiedId::new(directory, id)).copied()
}

/// Look up the dictionary entry for a standard tag name.
pub fn lookup_name(name: &str) -> Option<&'static TagDef> {
    REVERSE.get(name).copied()
}

/// Canonical name for a directory-scoped ID, or `Unknown-{id}` when the dictionary has none.
pub fn resolve(directory: Directory, id: u16) -> String {
    match lookup(directory, id) {
        Some(def) => def.name.to_string(),
        None => format!("Unknown-{id}"),
    }
}

/// Directory and ID of a standard tag name.
pub fn reverse_resolve(name: &str) -> Option<QualifiedId> {
    lookup_name(name).map(|d| QualifiedId::new(d.directory, d.id))
}

/// Value framing for a directory-scoped ID; unknown tags are treated as plain data.
pub fn kind_of(directory: Directory, id: u16) -> Option<ValueKind> {
    lookup(directory, id).map(|d| d.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_standard_tags() {
        assert_eq!(resolve(Directory::Primary, 0x010F), "Make");
        assert_eq!(resolve(Directory::Exif, 0x9003), "DateTimeOriginal");
        assert_eq!(resolve(Directory::Gps, 0x0002), "GPSLatitude");
    }

    #[test]
    fn unknown_ids_get_placeholder() {
        assert_eq!(resolve(Directory::Primary, 40000), "Unknown-40000");
        assert_eq!(resolve(Directory::Primary, 65000), "Unknown-65000");
    }

    #[test]
    fn ids_are_directory_scoped() {
        // 0x0001 is a GPS tag but means nothing in the primary directory
        assert_eq!(resolve(Directory::Gps, 0x0001), "GPSLatitudeRef");
        assert_eq!(resolve(Directory::Primary, 0x0001), "Unknown-1");
    }

    #[test]
    fn reverse_lookup() {
        assert_eq!(
            reverse_resolve("UserComment"),
            Some(QualifiedId::new(Directory::Exif, TAG_USER_COMMENT))
        );
        assert_eq!(reverse_resolve("Artist"), Some(QualifiedId::new(Directory::Primary, 0x013B)));
        assert_eq!(reverse_resolve("Author"), None);
    }

    #[test]
    fn names_and_ids_are_unique() {
        let names: HashSet<_> = TAGS.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TAGS.len());
        let ids: HashSet<_> = TAGS.iter().map(|t| (t.directory, t.id)).collect();
        assert_eq!(ids.len(), TAGS.len());
    }

    #[test]
    fn reserved_registry_slot_is_not_a_standard_tag() {
        assert!(lookup(Directory::Primary, super::super::registry::REGISTRY_TAG_ID).is_none());
    }

    // ── qualified IDs ────────────────────────────────────────────────

    #[test]
    fn qualified_id_display() {
        assert_eq!(QualifiedId::new(Directory::Exif, 0x9286).to_string(), "Exif.9286");
        assert_eq!(QualifiedId::new(Directory::Primary, 0x010E).to_string(), "0th.010e");
        assert_eq!(QualifiedId::new(Directory::Gps, 2).to_string(), "GPS.0002");
    }

    #[test]
    fn qualified_id_parse() {
        let q: QualifiedId = "Exif.9286".parse().unwrap();
        assert_eq!(q, QualifiedId::new(Directory::Exif, 0x9286));
        let q: QualifiedId = "gps.0x0002".parse().unwrap();
        assert_eq!(q, QualifiedId::new(Directory::Gps, 2));
        let q: QualifiedId = "primary.FDE8".parse().unwrap();
        assert_eq!(q, QualifiedId::new(Directory::Primary, 0xFDE8));
    }

    #[test]
    fn qualified_id_parse_rejects_garbage() {
        assert!("Author".parse::<QualifiedId>().is_err());
        assert!("Interop.0001".parse::<QualifiedId>().is_err());
        assert!("Exif.zzzz".parse::<QualifiedId>().is_err());
        assert!("Exif.123456".parse::<QualifiedId>().is_err());
    }
}
