//! Motion kinds and the per-element motion bit-mask
//!
//! Each animated element stores a mask of the properties it animates,
//! followed by one keyframe track per set bit. Tracks are stored lowest bit
//! first, which is also the canonical order used when writing.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Animated property of an element
///
/// Variants are declared in canonical order; the discriminant is the bit
/// position in the motion mask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum MotionKind {
    #[serde(rename = "hide")]
    Hide = 0,
    #[serde(rename = "posx")]
    PosX = 1,
    #[serde(rename = "posy")]
    PosY = 2,
    #[serde(rename = "angle")]
    Angle = 3,
    #[serde(rename = "scalex")]
    ScaleX = 4,
    #[serde(rename = "scaley")]
    ScaleY = 5,
    #[serde(rename = "sprite_index")]
    SpriteIndex = 6,
    #[serde(rename = "rgba")]
    Rgba = 7,
    #[serde(rename = "rgba_tl")]
    RgbaTopLeft = 8,
    #[serde(rename = "rgba_bl")]
    RgbaBottomLeft = 9,
    #[serde(rename = "rgba_tr")]
    RgbaTopRight = 10,
    #[serde(rename = "rgba_br")]
    RgbaBottomRight = 11,
    #[serde(rename = "audio_cue", alias = "audio_cue?")]
    AudioCue = 12,
    #[serde(rename = "3d_depth")]
    Depth = 13,
    #[serde(rename = "unk_motion")]
    UnkMotion = 14,
}

/// How a keyframe value of a given motion kind is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Color,
    Int,
    Float,
}

/// Union of every known motion bit
pub const KNOWN_BITS: u32 = (1 << 15) - 1;

impl MotionKind {
    /// Every kind in canonical (on-disk) order
    pub const ALL: [MotionKind; 15] = [
        Self::Hide,
        Self::PosX,
        Self::PosY,
        Self::Angle,
        Self::ScaleX,
        Self::ScaleY,
        Self::SpriteIndex,
        Self::Rgba,
        Self::RgbaTopLeft,
        Self::RgbaBottomLeft,
        Self::RgbaTopRight,
        Self::RgbaBottomRight,
        Self::AudioCue,
        Self::Depth,
        Self::UnkMotion,
    ];

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_bit(bit: u32) -> Option<Self> {
        if !bit.is_power_of_two() {
            return None;
        }
        Self::ALL.get(bit.trailing_zeros() as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::PosX => "posx",
            Self::PosY => "posy",
            Self::Angle => "angle",
            Self::ScaleX => "scalex",
            Self::ScaleY => "scaley",
            Self::SpriteIndex => "sprite_index",
            Self::Rgba => "rgba",
            Self::RgbaTopLeft => "rgba_tl",
            Self::RgbaBottomLeft => "rgba_bl",
            Self::RgbaTopRight => "rgba_tr",
            Self::RgbaBottomRight => "rgba_br",
            Self::AudioCue => "audio_cue",
            Self::Depth => "3d_depth",
            Self::UnkMotion => "unk_motion",
        }
    }

    pub fn payload(self) -> PayloadKind {
        match self {
            Self::Rgba
            | Self::RgbaTopLeft
            | Self::RgbaBottomLeft
            | Self::RgbaTopRight
            | Self::RgbaBottomRight => PayloadKind::Color,
            Self::Hide | Self::Depth => PayloadKind::Int,
            _ => PayloadKind::Float,
        }
    }
}

impl std::fmt::Display for MotionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a motion mask into its kinds, largest bit first
pub fn decode_mask(mask: u32) -> Result<Vec<MotionKind>> {
    if mask & !KNOWN_BITS != 0 {
        return Err(Error::MalformedInput(format!(
            "motion mask 0x{:08x} has unknown bits 0x{:08x}",
            mask,
            mask & !KNOWN_BITS
        )));
    }

    let mut remaining = mask;
    let mut kinds = Vec::with_capacity(mask.count_ones() as usize);
    while remaining != 0 {
        let largest = 1 << (31 - remaining.leading_zeros());
        // Every bit below KNOWN_BITS maps to a kind
        if let Some(kind) = MotionKind::from_bit(largest) {
            kinds.push(kind);
        }
        remaining -= largest;
    }
    Ok(kinds)
}

/// Sum the bits of a set of kinds
pub fn encode_mask(kinds: &[MotionKind]) -> u32 {
    kinds.iter().fold(0, |mask, kind| mask | kind.bit())
}
