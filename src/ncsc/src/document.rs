//! Interchange document types
//!
//! A [`Document`] is the structured form of one animation file. Field names
//! match the established JSON interchange files, so documents produced by
//! earlier converters load unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::aspect::AspectRatio;
use crate::hierarchy;
use crate::layout::{Endian, DEFAULT_ALIGNMENT};
use crate::motion::{MotionKind, PayloadKind};
use crate::{Error, Result};

/// Root of a decoded animation file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Misc. Info")]
    pub info: MiscInfo,
    #[serde(rename = "Unk. Patterns", default)]
    pub unknown_patterns: Vec<[f64; 2]>,
    #[serde(rename = "Sprite Crops", default)]
    pub sprite_crops: Vec<SpriteCrop>,
    #[serde(rename = "Element Banks", default)]
    pub element_banks: Vec<Vec<Element>>,
    #[serde(rename = "Animations", default)]
    pub animations: Vec<Animation>,
}

/// Header metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiscInfo {
    /// Four-character platform tag at the start of the file
    #[serde(rename = "Header Magic")]
    pub magic: String,
    #[serde(rename = "Aspect Ratio")]
    pub aspect_ratio: AspectRatio,
    /// Derived from the aspect ratio; ignored when encoding
    #[serde(rename = "Screen Size", default)]
    pub screen_size: String,
    #[serde(rename = "Byte Order")]
    pub byte_order: Endian,
    #[serde(rename = "Alignment", default = "default_alignment")]
    pub alignment: u32,
    #[serde(rename = "Header Floats", default = "default_header_floats")]
    pub header_floats: [f64; 4],
}

fn default_alignment() -> u32 {
    DEFAULT_ALIGNMENT
}

/// Values nearly every shipped file carries in the payload header
pub fn default_header_floats() -> [f64; 4] {
    [0.0, 60.0, 0.0, 60.0]
}

/// Texture region referenced by element sprite lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteCrop {
    pub texture: i32,
    #[serde(rename = "top_left_X")]
    pub top_left_x: f64,
    #[serde(rename = "top_left_Y")]
    pub top_left_y: f64,
    #[serde(rename = "bottom_right_X")]
    pub bottom_right_x: f64,
    #[serde(rename = "bottom_right_Y")]
    pub bottom_right_y: f64,
}

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Rgba {
    pub fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

/// Render method bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub dodge_blend: u8,
    pub unknown_1: u8,
    pub unknown_2: u8,
}

/// Element state before any animation is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSettings {
    pub hide: i32,
    pub posx: f64,
    pub posy: f64,
    pub angle: f64,
    pub scalex: f64,
    pub scaley: f64,
    /// Stored as a float, always integral
    pub sprite_index: i32,
    pub rgba: Rgba,
    pub rgba_tl: Rgba,
    pub rgba_bl: Rgba,
    pub rgba_tr: Rgba,
    pub rgba_br: Rgba,
    #[serde(rename = "audio_cue", alias = "audio_cue?")]
    pub audio_cue: i32,
    #[serde(rename = "3d_depth")]
    pub depth: i32,
    pub unk_motion: i32,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        let white = Rgba::new(255, 255, 255, 255);
        Self {
            hide: 0,
            posx: 0.0,
            posy: 0.0,
            angle: 0.0,
            scalex: 1.0,
            scaley: 1.0,
            sprite_index: 0,
            rgba: white,
            rgba_tl: white,
            rgba_bl: white,
            rgba_tr: white,
            rgba_br: white,
            audio_cue: 0,
            depth: 0,
            unk_motion: 0,
        }
    }
}

/// Animatable element of a bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Position within the bank
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Parent element in the same bank; stored as -1 when absent
    #[serde(rename = "Parent", with = "parent_index")]
    pub parent: Option<usize>,
    #[serde(rename = "Unknown Flag 0")]
    pub unknown_flag_0: i32,
    #[serde(rename = "Render Flag")]
    pub render_flag: i32,
    #[serde(rename = "Unknown Flag 1")]
    pub unknown_flag_1: i32,
    /// Corners: top-left, bottom-left, top-right, bottom-right (x, y each)
    #[serde(rename = "2D Polygon")]
    pub polygon: [f64; 8],
    #[serde(rename = "Unknown Values")]
    pub unknown_values: [i32; 3],
    #[serde(rename = "Render Settings")]
    pub render: RenderSettings,
    #[serde(rename = "Sprite List", default)]
    pub sprites: Vec<i32>,
    #[serde(rename = "Default Settings")]
    pub defaults: DefaultSettings,
    /// Position in the element name table, kept when name order matters
    #[serde(rename = "Name Index", default, skip_serializing_if = "Option::is_none")]
    pub name_index: Option<usize>,
}

impl Element {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            parent: None,
            unknown_flag_0: 0,
            render_flag: 0,
            unknown_flag_1: 0,
            polygon: [0.0; 8],
            unknown_values: [0; 3],
            render: RenderSettings::default(),
            sprites: Vec::new(),
            defaults: DefaultSettings::default(),
            name_index: None,
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Named animation over one or more element banks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    #[serde(rename = "Name")]
    pub name: String,
    /// Minimum and maximum duration
    #[serde(rename = "Length Range")]
    pub length_range: [f64; 2],
    #[serde(rename = "Element Banks", default)]
    pub banks: Vec<Vec<ElementAnimation>>,
}

/// Tracks animating one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementAnimation {
    #[serde(rename = "Index")]
    pub index: usize,
    #[serde(rename = "Animations", default)]
    pub tracks: Vec<MotionTrack>,
}

impl ElementAnimation {
    /// Tracks in canonical order, the order they are stored in
    pub fn canonical_tracks(&self) -> Vec<&MotionTrack> {
        let mut tracks: Vec<&MotionTrack> = self.tracks.iter().collect();
        tracks.sort_by_key(|track| track.motion);
        tracks
    }
}

/// Keyframes of one animated property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionTrack {
    #[serde(rename = "Motion")]
    pub motion: MotionKind,
    #[serde(rename = "Loop")]
    pub loop_mode: i32,
    #[serde(rename = "Keyframes", default)]
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub timestamp: i32,
    pub data: KeyframeValue,
    pub tweening: i32,
    pub ease_in: f64,
    pub ease_out: f64,
    pub unk: f64,
}

/// Keyframe payload; its kind follows the owning track's motion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyframeValue {
    Color(Rgba),
    Int(i32),
    Float(f64),
}

impl KeyframeValue {
    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            Self::Color(color) => Some(*color),
            _ => None,
        }
    }

    /// Integer payload; integral floats are accepted
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(value) => Some(value),
            Self::Float(value) if value.fract() == 0.0 => {
                i32::try_from(value as i64).ok().filter(|v| *v as f64 == value)
            }
            _ => None,
        }
    }

    /// Float payload; integers are widened
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(value) => Some(value),
            Self::Int(value) => Some(value as f64),
            Self::Color(_) => None,
        }
    }

    fn matches(&self, payload: PayloadKind) -> bool {
        match payload {
            PayloadKind::Color => self.as_color().is_some(),
            PayloadKind::Int => self.as_int().is_some(),
            PayloadKind::Float => self.as_float().is_some(),
        }
    }
}

impl Document {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON with 4-space indentation
    pub fn to_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        String::from_utf8(out)
            .map_err(|e| Error::MalformedDocument(format!("non UTF-8 JSON output: {}", e)))
    }

    pub fn element_count(&self) -> usize {
        self.element_banks.iter().map(Vec::len).sum()
    }

    /// Check the structural invariants the encoder relies on
    pub fn validate(&self) -> Result<()> {
        if self.info.magic.len() != 4 || !self.info.magic.is_ascii() {
            return Err(Error::MalformedDocument(format!(
                "header magic '{}' must be 4 ASCII characters",
                self.info.magic
            )));
        }

        for (bank_index, bank) in self.element_banks.iter().enumerate() {
            validate_bank(bank_index, bank)?;
        }

        self.name_order()?;

        for animation in &self.animations {
            validate_animation(animation)?;
        }

        Ok(())
    }

    /// Order of the element name table as (bank, element) pairs
    ///
    /// Recorded name indices are honored when every element of the first bank
    /// carries one; otherwise elements are listed bank by bank.
    pub fn name_order(&self) -> Result<Vec<(usize, usize)>> {
        let recorded = self
            .element_banks
            .first()
            .is_some_and(|bank| !bank.is_empty() && bank.iter().all(|e| e.name_index.is_some()));

        let natural = self
            .element_banks
            .iter()
            .enumerate()
            .flat_map(|(b, bank)| (0..bank.len()).map(move |e| (b, e)));

        if !recorded {
            return Ok(natural.collect());
        }

        let total = self.element_count();
        let mut order: Vec<Option<(usize, usize)>> = vec![None; total];
        for (b, e) in natural {
            let element = &self.element_banks[b][e];
            let slot = element.name_index.ok_or_else(|| {
                Error::MalformedDocument(format!(
                    "element {} of bank {} has no name index while the first bank does",
                    e, b
                ))
            })?;
            let entry = order.get_mut(slot).ok_or_else(|| {
                Error::MalformedDocument(format!(
                    "name index {} is out of range for {} elements",
                    slot, total
                ))
            })?;
            if entry.is_some() {
                return Err(Error::MalformedDocument(format!(
                    "name index {} is used more than once",
                    slot
                )));
            }
            *entry = Some((b, e));
        }

        // Every slot is filled: `total` distinct in-range indices were placed
        Ok(order.into_iter().flatten().collect())
    }
}

fn validate_bank(bank_index: usize, bank: &[Element]) -> Result<()> {
    let mut parents = Vec::with_capacity(bank.len());
    for (position, element) in bank.iter().enumerate() {
        if element.index != position {
            return Err(Error::MalformedDocument(format!(
                "bank {}: element at position {} has index {}",
                bank_index, position, element.index
            )));
        }
        if let Some(parent) = element.parent {
            if parent >= bank.len() || parent == position {
                return Err(Error::MalformedDocument(format!(
                    "bank {}: element {} has invalid parent {}",
                    bank_index, position, parent
                )));
            }
        }
        parents.push(element.parent);
    }
    hierarchy::check_forest(bank_index, &parents)
}

fn validate_animation(animation: &Animation) -> Result<()> {
    for (bank_index, bank) in animation.banks.iter().enumerate() {
        for (position, element) in bank.iter().enumerate() {
            if element.index != position {
                return Err(Error::MalformedDocument(format!(
                    "animation '{}' bank {}: entry at position {} has index {}",
                    animation.name, bank_index, position, element.index
                )));
            }

            let mut seen = HashSet::new();
            for track in &element.tracks {
                if !seen.insert(track.motion) {
                    return Err(Error::MalformedDocument(format!(
                        "animation '{}' element {}: duplicate '{}' track",
                        animation.name, element.index, track.motion
                    )));
                }
                let payload = track.motion.payload();
                if let Some(keyframe) = track.keyframes.iter().find(|k| !k.data.matches(payload)) {
                    return Err(Error::MalformedDocument(format!(
                        "animation '{}' element {}: '{}' keyframe at {} has a {:?} payload",
                        animation.name, element.index, track.motion, keyframe.timestamp, payload
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Serde adapter storing `Option<usize>` as an index or -1
mod parent_index {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(index) => serializer.serialize_u64(*index as u64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<usize>, D::Error> {
        let value = Option::<i64>::deserialize(deserializer)?;
        Ok(value.and_then(|v| usize::try_from(v).ok()))
    }
}
