//! Codec for nCSC sprite animation containers
//!
//! nCSC files carry 2D sprite animations for a family of console, handheld
//! and mobile engine ports. This crate converts them to a structured
//! [`Document`] (serializable to JSON) and back.
//!
//! # Format Overview
//!
//! ## Outer header (32 bytes)
//! - Bytes 0-3: Platform tag
//! - Bytes 4-7: Outer header size (24, little-endian)
//! - Bytes 8-11: Byte-order indicator (1 in the file's byte order)
//! - Bytes 12-15: Pointer alignment base (32)
//! - Bytes 16-19: Size accounting value
//! - Bytes 20-23: Relocation table offset
//! - Bytes 24-27: Relocation section length + 4
//! - Bytes 28-31: Version (1)
//!
//! ## Payload (`nCSC`)
//! Header with section counts and pointers, followed by the sections: unknown
//! patterns, sprite crops, element banks with their hierarchies, element and
//! animation names, element bodies, motion masks, keyframe tracks.
//!
//! ## Trailer
//! - `NOF0`: offsets of every pointer field, used by the engine to rebase
//! - `NEND`: end marker
//!
//! Every stored pointer is relative to the alignment base. Pointer width and
//! float encoding depend on the [`Platform`] and must be supplied by the caller.

mod aspect;
mod decode;
pub mod document;
mod encode;
pub mod hierarchy;
mod layout;
pub mod motion;
mod reader;
mod records;
mod relocation;
pub mod text;
mod writer;

pub use aspect::{screen_size, AspectRatio};
pub use decode::{decode, read_summary, Summary};
pub use document::{
    Animation, DefaultSettings, Document, Element, ElementAnimation, Keyframe, KeyframeValue,
    MiscInfo, MotionTrack, RenderSettings, Rgba, SpriteCrop,
};
pub use encode::encode;
pub use hierarchy::Link;
pub use layout::{
    Endian, Layout, Options, Platform, DEFAULT_ALIGNMENT, FIXED_POINT_SCALE, PAYLOAD_BASE,
};
pub use motion::{MotionKind, PayloadKind};
pub use reader::Reader;
pub use relocation::RelocationTable;
pub use writer::Writer;

/// Payload magic at byte 32
pub const NCSC_MAGIC: [u8; 4] = *b"nCSC";

/// Relocation table tag
pub const RELOCATION_MAGIC: [u8; 4] = *b"NOF0";

/// End-of-file tag
pub const END_MAGIC: [u8; 4] = *b"NEND";

/// Errors from nCSC decoding and encoding
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not an nCSC animation file")]
    NotThisFormat,

    #[error("Truncated input: need {needed} bytes at offset {offset}, file has {len}")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("Pointer at offset {at} targets {target}, outside a file of {len} bytes")]
    PointerOutOfBounds { at: usize, target: i64, len: usize },

    #[error("Unresolved hierarchy in bank {bank}: {unresolved} element(s) have no reachable parent")]
    UnresolvedHierarchy { bank: usize, unresolved: usize },

    #[error("Cyclic hierarchy in bank {bank}: element {element} is its own ancestor")]
    CyclicHierarchy { bank: usize, element: usize },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unsupported aspect ratio: {0}")]
    UnsupportedAspectRatio(f64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check if data carries the nCSC payload magic
pub fn is_ncsc(data: &[u8]) -> bool {
    data.len() >= PAYLOAD_BASE + 4 && data[PAYLOAD_BASE..PAYLOAD_BASE + 4] == NCSC_MAGIC
}
