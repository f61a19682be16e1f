//! Fixed-shape records: sprite crops, element bodies, default settings,
//! motion tracks and keyframes

use tracing::trace;

use crate::document::{
    DefaultSettings, Element, Keyframe, KeyframeValue, MotionTrack, SpriteCrop,
};
use crate::motion::{MotionKind, PayloadKind};
use crate::reader::Reader;
use crate::writer::Writer;
use crate::{Error, Result};

/// Unknown pattern: two floats
pub const PATTERN_SIZE: usize = 8;

/// Sprite crop: texture index and four floats
pub const SPRITE_CROP_SIZE: usize = 20;

/// Hierarchy entry: first child and next sibling
pub const LINK_SIZE: usize = 8;

/// Default settings block
pub const SETTINGS_SIZE: usize = 60;

/// Sprite id in an element's sprite list
pub const SPRITE_ID_SIZE: usize = 4;

/// Keyframe: timestamp, payload, tweening, ease in, ease out, unknown
pub const KEYFRAME_SIZE: usize = 24;

/// Animation length: minimum and maximum
pub const LENGTH_RANGE_SIZE: usize = 8;

pub fn read_sprite_crop(reader: &Reader, offset: usize) -> Result<SpriteCrop> {
    Ok(SpriteCrop {
        texture: reader.read_i32(offset)?,
        top_left_x: reader.read_float(offset + 4)?,
        top_left_y: reader.read_float(offset + 8)?,
        bottom_right_x: reader.read_float(offset + 12)?,
        bottom_right_y: reader.read_float(offset + 16)?,
    })
}

pub fn write_sprite_crop(writer: &mut Writer, crop: &SpriteCrop) -> Result<()> {
    writer.write_i32(crop.texture);
    writer.write_float(crop.top_left_x)?;
    writer.write_float(crop.top_left_y)?;
    writer.write_float(crop.bottom_right_x)?;
    writer.write_float(crop.bottom_right_y)
}

/// Read an element body and the sprite list and settings it points to
///
/// The name is filled in later from the name table.
pub fn read_element(
    reader: &Reader,
    offset: usize,
    index: usize,
    parent: Option<usize>,
) -> Result<Element> {
    let mut element = Element::new(index, "");
    element.parent = parent;
    element.unknown_flag_0 = reader.read_i32(offset)?;
    element.render_flag = reader.read_i32(offset + 4)?;
    element.unknown_flag_1 = reader.read_i32(offset + 8)?;

    for (i, corner) in element.polygon.iter_mut().enumerate() {
        *corner = reader.read_float(offset + 12 + i * 4)?;
    }

    element.unknown_values[0] = reader.read_i32(offset + 44)?;
    let (settings_at, next) = reader.read_pointer(offset + 48)?;
    element.unknown_values[1] = reader.read_i32(next)?;
    element.render = reader.read_render_method(next + 4)?;
    let sprite_count = reader.read_count(next + 8)?;
    let (sprites_at, next) = reader.read_pointer(next + 12)?;
    element.unknown_values[2] = reader.read_i32(next)?;
    // The two trailing pointer fields are always zero

    element.sprites = (0..sprite_count)
        .map(|i| reader.read_i32(sprites_at + i * SPRITE_ID_SIZE))
        .collect::<Result<_>>()?;
    element.defaults = read_settings(reader, settings_at)?;

    trace!(
        "element {} at {}: {} sprite(s), settings at {}",
        index,
        offset,
        sprite_count,
        settings_at
    );
    Ok(element)
}

/// Write an element body whose sprite list starts at `sprites_at`
///
/// The settings block follows the sprite list directly.
pub fn write_element(writer: &mut Writer, element: &Element, sprites_at: usize) -> Result<()> {
    writer.write_i32(element.unknown_flag_0);
    writer.write_i32(element.render_flag);
    writer.write_i32(element.unknown_flag_1);
    for corner in element.polygon {
        writer.write_float(corner)?;
    }

    writer.write_i32(element.unknown_values[0]);
    writer.write_pointer(sprites_at + element.sprites.len() * SPRITE_ID_SIZE)?;
    writer.write_i32(element.unknown_values[1]);
    writer.write_render_method(element.render);
    writer.write_count(element.sprites.len())?;
    writer.write_pointer(sprites_at)?;
    writer.write_i32(element.unknown_values[2]);
    writer.write_null_pointer();
    writer.write_null_pointer();
    Ok(())
}

pub fn read_settings(reader: &Reader, offset: usize) -> Result<DefaultSettings> {
    Ok(DefaultSettings {
        hide: reader.read_i32(offset)?,
        posx: reader.read_float(offset + 4)?,
        posy: reader.read_float(offset + 8)?,
        angle: reader.read_float(offset + 12)?,
        scalex: reader.read_float(offset + 16)?,
        scaley: reader.read_float(offset + 20)?,
        sprite_index: reader.read_float(offset + 24)? as i32,
        rgba: reader.read_rgba(offset + 28)?,
        rgba_tl: reader.read_rgba(offset + 32)?,
        rgba_bl: reader.read_rgba(offset + 36)?,
        rgba_tr: reader.read_rgba(offset + 40)?,
        rgba_br: reader.read_rgba(offset + 44)?,
        audio_cue: reader.read_i32(offset + 48)?,
        depth: reader.read_i32(offset + 52)?,
        unk_motion: reader.read_i32(offset + 56)?,
    })
}

pub fn write_settings(writer: &mut Writer, settings: &DefaultSettings) -> Result<()> {
    writer.write_i32(settings.hide);
    writer.write_float(settings.posx)?;
    writer.write_float(settings.posy)?;
    writer.write_float(settings.angle)?;
    writer.write_float(settings.scalex)?;
    writer.write_float(settings.scaley)?;
    writer.write_float(f64::from(settings.sprite_index))?;
    writer.write_rgba(settings.rgba);
    writer.write_rgba(settings.rgba_tl);
    writer.write_rgba(settings.rgba_bl);
    writer.write_rgba(settings.rgba_tr);
    writer.write_rgba(settings.rgba_br);
    writer.write_i32(settings.audio_cue);
    writer.write_i32(settings.depth);
    writer.write_i32(settings.unk_motion);
    Ok(())
}

/// Read a track header and its keyframes
pub fn read_track(reader: &Reader, offset: usize, motion: MotionKind) -> Result<MotionTrack> {
    let loop_mode = reader.read_i32(offset)?;
    let count = reader.read_count(offset + 4)?;
    let (keyframes_at, _) = reader.read_pointer(offset + 8)?;

    trace!(
        "{} track at {}: loop {}, {} keyframe(s) at {}",
        motion,
        offset,
        loop_mode,
        count,
        keyframes_at
    );

    let keyframes = (0..count)
        .map(|i| read_keyframe(reader, keyframes_at + i * KEYFRAME_SIZE, motion))
        .collect::<Result<_>>()?;
    Ok(MotionTrack {
        motion,
        loop_mode,
        keyframes,
    })
}

/// Write a track header whose keyframes start at `keyframes_at`
pub fn write_track_header(
    writer: &mut Writer,
    track: &MotionTrack,
    keyframes_at: usize,
) -> Result<()> {
    writer.write_i32(track.loop_mode);
    writer.write_count(track.keyframes.len())?;
    writer.write_pointer(keyframes_at)
}

pub fn read_keyframe(reader: &Reader, offset: usize, motion: MotionKind) -> Result<Keyframe> {
    let payload = offset + 4;
    let data = match motion.payload() {
        PayloadKind::Color => KeyframeValue::Color(reader.read_rgba(payload)?),
        PayloadKind::Int => KeyframeValue::Int(reader.read_i32(payload)?),
        PayloadKind::Float => KeyframeValue::Float(reader.read_float(payload)?),
    };

    Ok(Keyframe {
        timestamp: reader.read_i32(offset)?,
        data,
        tweening: reader.read_i32(offset + 8)?,
        ease_in: reader.read_float(offset + 12)?,
        ease_out: reader.read_float(offset + 16)?,
        unk: reader.read_float(offset + 20)?,
    })
}

pub fn write_keyframe(writer: &mut Writer, keyframe: &Keyframe, motion: MotionKind) -> Result<()> {
    let mismatch = || {
        Error::MalformedDocument(format!(
            "'{}' keyframe at {} has a {:?} payload",
            motion, keyframe.timestamp, keyframe.data
        ))
    };

    writer.write_i32(keyframe.timestamp);
    match motion.payload() {
        PayloadKind::Color => writer.write_rgba(keyframe.data.as_color().ok_or_else(mismatch)?),
        PayloadKind::Int => writer.write_i32(keyframe.data.as_int().ok_or_else(mismatch)?),
        PayloadKind::Float => {
            writer.write_float(keyframe.data.as_float().ok_or_else(mismatch)?)?
        }
    }
    writer.write_i32(keyframe.tweening);
    writer.write_float(keyframe.ease_in)?;
    writer.write_float(keyframe.ease_out)?;
    writer.write_float(keyframe.unk)
}
