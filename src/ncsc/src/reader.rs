//! Bounds-checked primitive reads at absolute file offsets

use memchr::memchr;

use crate::document::{RenderSettings, Rgba};
use crate::layout::{Endian, Layout, FIXED_POINT_SCALE};
use crate::text;
use crate::{Error, Result};

/// Borrow `len` bytes at `offset` or report how far the read ran past the end
pub(crate) fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::TruncatedInput {
            offset,
            needed: len,
            len: data.len(),
        })
}

/// Primitive reader over a whole file
///
/// Offsets are absolute. Nothing is consumed implicitly: callers track their
/// own position, since most records are reached through pointers.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
    layout: Layout,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], layout: Layout) -> Self {
        Self { data, layout }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        slice(self.data, offset, len)
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    /// Signed integer of 4 or 8 bytes
    pub fn read_int(&self, offset: usize, width: usize) -> Result<i64> {
        let endian = self.layout.endian;
        match width {
            4 => Ok(endian.read_i32(self.bytes(offset, 4)?) as i64),
            8 => Ok(endian.read_i64(self.bytes(offset, 8)?)),
            _ => Err(Error::MalformedInput(format!(
                "unsupported integer width {}",
                width
            ))),
        }
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        Ok(self.layout.endian.read_i32(self.bytes(offset, 4)?))
    }

    /// Non-negative 32-bit count
    pub fn read_count(&self, offset: usize) -> Result<usize> {
        let value = self.read_i32(offset)?;
        usize::try_from(value).map_err(|_| {
            Error::MalformedInput(format!("negative count {} at offset {}", value, offset))
        })
    }

    /// 4-byte float: IEEE single, or fixed point with 12 fractional bits
    ///
    /// NaN and infinities are rejected, since the document cannot carry them.
    pub fn read_float(&self, offset: usize) -> Result<f64> {
        let bytes = self.bytes(offset, 4)?;
        let endian = self.layout.endian;
        if self.layout.fixed_point {
            return Ok(endian.read_i32(bytes) as f64 / FIXED_POINT_SCALE);
        }

        let value = endian.read_f32(bytes);
        if !value.is_finite() {
            return Err(Error::MalformedInput(format!(
                "non-finite float {} at offset {}",
                value, offset
            )));
        }
        Ok(f64::from(value))
    }

    /// Read a pointer field
    ///
    /// Returns the absolute target (stored value plus the alignment base) and
    /// the offset just past the field.
    pub fn read_pointer(&self, offset: usize) -> Result<(usize, usize)> {
        let width = self.layout.pointer_width;
        let raw = self.read_int(offset, width)?;
        let target = raw.saturating_add(self.layout.alignment as i64);

        let absolute = usize::try_from(target)
            .ok()
            .filter(|t| *t <= self.data.len())
            .ok_or(Error::PointerOutOfBounds {
                at: offset,
                target,
                len: self.data.len(),
            })?;
        Ok((absolute, offset + width))
    }

    /// Shift-JIS text ending at a NUL byte, `max_len` bytes or the end of file
    pub fn read_string(&self, offset: usize, max_len: Option<usize>) -> Result<String> {
        let rest = self.data.get(offset..).ok_or(Error::TruncatedInput {
            offset,
            needed: 1,
            len: self.data.len(),
        })?;
        let window = match max_len {
            Some(max) => &rest[..max.min(rest.len())],
            None => rest,
        };
        let end = memchr(0, window).unwrap_or(window.len());
        text::decode(&window[..end])
    }

    /// Packed color; channel order depends on byte order
    pub fn read_rgba(&self, offset: usize) -> Result<Rgba> {
        let b = self.bytes(offset, 4)?;
        Ok(match self.layout.endian {
            Endian::Little => Rgba::new(b[3], b[2], b[1], b[0]),
            Endian::Big => Rgba::new(b[0], b[1], b[2], b[3]),
        })
    }

    pub fn read_render_method(&self, offset: usize) -> Result<RenderSettings> {
        let b = self.bytes(offset, 4)?;
        Ok(match self.layout.endian {
            Endian::Little => RenderSettings {
                dodge_blend: b[0],
                unknown_1: b[1],
                unknown_2: b[2],
            },
            Endian::Big => RenderSettings {
                dodge_blend: b[3],
                unknown_1: b[2],
                unknown_2: b[1],
            },
        })
    }
}
