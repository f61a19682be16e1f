//! Platform modes and the byte layout they select
//!
//! The same container is shipped by several engine ports. They differ in
//! three ways:
//! - byte order (stored in the file itself)
//! - pointer width (8 bytes on mobile, 4 elsewhere)
//! - float encoding (12-bit fixed point on the handhelds, IEEE-754 elsewhere)
//!
//! Only the byte order can be detected, so the platform is always supplied by
//! the caller. Every reader and writer call receives a [`Layout`] value built
//! once per pass.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Size of the outer header; pointers and relocation entries are relative to it
pub const PAYLOAD_BASE: usize = 32;

/// Default pointer alignment base stored at bytes 12-15
pub const DEFAULT_ALIGNMENT: u32 = 32;

/// Fixed-point scale used by the handheld ports (12 fractional bits)
pub const FIXED_POINT_SCALE: f64 = 4096.0;

/// Engine port the file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// PSP, Wii and other ports with 4-byte pointers and IEEE floats
    #[default]
    Standard,
    /// Nintendo DS: fixed-point floats
    Ds,
    /// Nintendo 3DS: fixed-point floats, 320x240 bottom screen
    #[serde(rename = "3ds")]
    ThreeDs,
    /// Mobile ports: 8-byte pointers
    Mobile,
}

impl Platform {
    /// Whether floats are stored as 12-bit fixed point
    pub fn fixed_point(self) -> bool {
        matches!(self, Self::Ds | Self::ThreeDs)
    }

    /// Width in bytes of every pointer field
    pub fn pointer_width(self) -> usize {
        match self {
            Self::Mobile => 8,
            _ => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Ds => "ds",
            Self::ThreeDs => "3ds",
            Self::Mobile => "mobile",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "ds" => Ok(Self::Ds),
            "3ds" => Ok(Self::ThreeDs),
            "mobile" | "m" => Ok(Self::Mobile),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// Byte order of multi-byte fields, serialized the way struct format strings spell it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    #[serde(rename = "<")]
    Little,
    #[serde(rename = ">")]
    Big,
}

impl Endian {
    pub fn read_i32(self, buf: &[u8]) -> i32 {
        match self {
            Self::Little => LittleEndian::read_i32(buf),
            Self::Big => BigEndian::read_i32(buf),
        }
    }

    pub fn read_i64(self, buf: &[u8]) -> i64 {
        match self {
            Self::Little => LittleEndian::read_i64(buf),
            Self::Big => BigEndian::read_i64(buf),
        }
    }

    pub fn read_f32(self, buf: &[u8]) -> f32 {
        match self {
            Self::Little => LittleEndian::read_f32(buf),
            Self::Big => BigEndian::read_f32(buf),
        }
    }

    pub fn write_i32(self, buf: &mut [u8], value: i32) {
        match self {
            Self::Little => LittleEndian::write_i32(buf, value),
            Self::Big => BigEndian::write_i32(buf, value),
        }
    }

    pub fn write_i64(self, buf: &mut [u8], value: i64) {
        match self {
            Self::Little => LittleEndian::write_i64(buf, value),
            Self::Big => BigEndian::write_i64(buf, value),
        }
    }

    pub fn write_f32(self, buf: &mut [u8], value: f32) {
        match self {
            Self::Little => LittleEndian::write_f32(buf, value),
            Self::Big => BigEndian::write_f32(buf, value),
        }
    }
}

/// Caller-supplied options for one decode or encode pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub platform: Platform,
    /// Record each element's position in the name table when decoding
    pub preserve_name_order: bool,
}

impl Options {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            preserve_name_order: false,
        }
    }

    pub fn with_name_order(mut self, preserve: bool) -> Self {
        self.preserve_name_order = preserve;
        self
    }
}

/// Immutable byte layout threaded through every primitive read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub endian: Endian,
    pub pointer_width: usize,
    pub fixed_point: bool,
    /// Added to every stored pointer to obtain an absolute file offset
    pub alignment: u32,
}

impl Layout {
    pub fn new(platform: Platform, endian: Endian, alignment: u32) -> Self {
        Self {
            endian,
            pointer_width: platform.pointer_width(),
            fixed_point: platform.fixed_point(),
            alignment,
        }
    }

    /// Absolute offset of the first section after the payload header
    ///
    /// Header: magic, size, three ints, four floats, five count/pointer
    /// pairs, the animation-name pointer, the aspect ratio and the
    /// animation-length pointer.
    pub fn sections_start(&self) -> usize {
        let p = self.pointer_width;
        PAYLOAD_BASE + 36 + 5 * (4 + p) + p + 4 + p
    }

    /// Count followed by a pointer
    pub fn counted_pointer_size(&self) -> usize {
        4 + self.pointer_width
    }

    /// Bank header: count, element list pointer, reserved int, hierarchy pointer
    pub fn bank_header_size(&self) -> usize {
        8 + 2 * self.pointer_width
    }

    /// Element name table entry: name pointer, bank index, element index
    pub fn name_entry_size(&self) -> usize {
        8 + self.pointer_width
    }

    /// Element body with its four pointer fields
    pub fn element_body_size(&self) -> usize {
        64 + 4 * self.pointer_width
    }

    /// Track header: loop value, keyframe count, keyframe pointer
    pub fn track_header_size(&self) -> usize {
        8 + self.pointer_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_modes() {
        assert!(!Platform::Standard.fixed_point());
        assert!(Platform::Ds.fixed_point());
        assert!(Platform::ThreeDs.fixed_point());
        assert!(!Platform::Mobile.fixed_point());

        assert_eq!(Platform::Standard.pointer_width(), 4);
        assert_eq!(Platform::Ds.pointer_width(), 4);
        assert_eq!(Platform::Mobile.pointer_width(), 8);
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("3DS".parse::<Platform>(), Ok(Platform::ThreeDs));
        assert_eq!("mobile".parse::<Platform>(), Ok(Platform::Mobile));
        assert!("psp".parse::<Platform>().is_err());
    }

    #[test]
    fn test_sections_start() {
        let standard = Layout::new(Platform::Standard, Endian::Little, DEFAULT_ALIGNMENT);
        let mobile = Layout::new(Platform::Mobile, Endian::Little, DEFAULT_ALIGNMENT);
        assert_eq!(standard.sections_start() - PAYLOAD_BASE, 88);
        assert_eq!(mobile.sections_start() - PAYLOAD_BASE, 116);
    }

    #[test]
    fn test_record_sizes() {
        let standard = Layout::new(Platform::Standard, Endian::Big, DEFAULT_ALIGNMENT);
        let mobile = Layout::new(Platform::Mobile, Endian::Big, DEFAULT_ALIGNMENT);
        assert_eq!(standard.element_body_size(), 80);
        assert_eq!(mobile.element_body_size(), 96);
        assert_eq!(standard.bank_header_size(), 16);
        assert_eq!(mobile.bank_header_size(), 24);
        assert_eq!(mobile.name_entry_size(), 16);
        assert_eq!(mobile.track_header_size(), 16);
    }

    #[test]
    fn test_endian_serde() {
        assert_eq!(serde_json::to_string(&Endian::Little).unwrap(), "\"<\"");
        let big: Endian = serde_json::from_str("\">\"").unwrap();
        assert_eq!(big, Endian::Big);
    }
}
