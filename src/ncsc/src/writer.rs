//! Primitive writes into a growing file buffer
//!
//! The buffer starts at absolute offset 0, outer header included. Every
//! pointer written through [`Writer::write_pointer`] is recorded in the
//! relocation table.

use crate::document::{RenderSettings, Rgba};
use crate::layout::{Endian, Layout, FIXED_POINT_SCALE, PAYLOAD_BASE};
use crate::relocation::RelocationTable;
use crate::text;
use crate::{Error, Result};

#[derive(Debug)]
pub struct Writer {
    buf: Vec<u8>,
    layout: Layout,
    relocations: RelocationTable,
}

impl Writer {
    pub fn new(layout: Layout) -> Self {
        Self {
            buf: Vec::new(),
            layout,
            relocations: RelocationTable::new(),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Absolute offset of the next byte
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn relocations(&self) -> &RelocationTable {
        &self.relocations
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut word = [0u8; 4];
        self.layout.endian.write_i32(&mut word, value);
        self.buf.extend_from_slice(&word);
    }

    /// Little-endian regardless of the file's byte order
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Element or entry count as a 32-bit integer
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        let value = i32::try_from(count)
            .map_err(|_| Error::MalformedDocument(format!("count {} is too large", count)))?;
        self.write_i32(value);
        Ok(())
    }

    /// Signed integer of 4 or 8 bytes
    pub fn write_int(&mut self, value: i64, width: usize) -> Result<()> {
        match width {
            4 => {
                let value = i32::try_from(value).map_err(|_| {
                    Error::MalformedDocument(format!("{} does not fit 4 bytes", value))
                })?;
                self.write_i32(value);
            }
            8 => {
                let mut word = [0u8; 8];
                self.layout.endian.write_i64(&mut word, value);
                self.buf.extend_from_slice(&word);
            }
            _ => {
                return Err(Error::MalformedDocument(format!(
                    "unsupported integer width {}",
                    width
                )))
            }
        }
        Ok(())
    }

    /// 4-byte float; fixed-point values are truncated toward zero
    ///
    /// Fails on NaN, infinities and values outside the stored range.
    pub fn write_float(&mut self, value: f64) -> Result<()> {
        let unrepresentable = || {
            Error::MalformedDocument(format!("{} does not fit a 4-byte float field", value))
        };
        if !value.is_finite() {
            return Err(unrepresentable());
        }

        let mut word = [0u8; 4];
        if self.layout.fixed_point {
            let scaled = (value * FIXED_POINT_SCALE).trunc();
            if scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
                return Err(unrepresentable());
            }
            self.layout.endian.write_i32(&mut word, scaled as i32);
        } else {
            let single = value as f32;
            if !single.is_finite() {
                return Err(unrepresentable());
            }
            self.layout.endian.write_f32(&mut word, single);
        }
        self.buf.extend_from_slice(&word);
        Ok(())
    }

    /// Pointer to absolute offset `target`, recorded for relocation
    pub fn write_pointer(&mut self, target: usize) -> Result<()> {
        let at = self.position();
        let entry = at
            .checked_sub(PAYLOAD_BASE)
            .and_then(|offset| u32::try_from(offset).ok())
            .ok_or_else(|| {
                Error::MalformedDocument(format!(
                    "pointer field at offset {} cannot be relocated",
                    at
                ))
            })?;
        let stored = target
            .checked_sub(self.layout.alignment as usize)
            .ok_or_else(|| {
                Error::MalformedDocument(format!(
                    "pointer target {} lies before the alignment base",
                    target
                ))
            })?;

        self.relocations.record(entry);
        self.write_int(stored as i64, self.layout.pointer_width)
    }

    /// Zero pointer field with no relocation entry
    pub fn write_null_pointer(&mut self) {
        self.buf.resize(self.buf.len() + self.layout.pointer_width, 0);
    }

    pub fn write_rgba(&mut self, color: Rgba) {
        let bytes = match self.layout.endian {
            Endian::Little => [color.alpha, color.blue, color.green, color.red],
            Endian::Big => [color.red, color.green, color.blue, color.alpha],
        };
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_render_method(&mut self, render: RenderSettings) {
        let bytes = match self.layout.endian {
            Endian::Little => [render.dodge_blend, render.unknown_1, render.unknown_2, 0],
            Endian::Big => [0, render.unknown_2, render.unknown_1, render.dodge_blend],
        };
        self.buf.extend_from_slice(&bytes);
    }

    /// Shift-JIS name padded with NULs to the name block size
    pub fn write_text(&mut self, value: &str) -> Result<()> {
        let bytes = text::encode_padded(value, text::NAME_BLOCK)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Zero-fill to the next multiple of `block`; returns the bytes added
    pub fn pad_to(&mut self, block: usize) -> usize {
        let pad = (block - self.buf.len() % block) % block;
        self.buf.resize(self.buf.len() + pad, 0);
        pad
    }

    pub fn patch_i32(&mut self, at: usize, value: i32) -> Result<()> {
        let end = self.buf.len();
        let word = self.buf.get_mut(at..at + 4).ok_or(Error::TruncatedInput {
            offset: at,
            needed: 4,
            len: end,
        })?;
        self.layout.endian.write_i32(word, value);
        Ok(())
    }

    pub fn patch_u32_le(&mut self, at: usize, value: u32) -> Result<()> {
        let end = self.buf.len();
        let word = self.buf.get_mut(at..at + 4).ok_or(Error::TruncatedInput {
            offset: at,
            needed: 4,
            len: end,
        })?;
        word.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn into_parts(self) -> (Vec<u8>, RelocationTable) {
        (self.buf, self.relocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Platform, DEFAULT_ALIGNMENT};
    use crate::reader::Reader;

    fn writer(platform: Platform, endian: Endian) -> Writer {
        Writer::new(Layout::new(platform, endian, DEFAULT_ALIGNMENT))
    }

    #[test]
    fn test_rgba_byte_order() {
        let color = Rgba::new(0x11, 0x22, 0x33, 0x44);

        let mut big = writer(Platform::Standard, Endian::Big);
        big.write_rgba(color);
        assert_eq!(big.into_parts().0, vec![0x11, 0x22, 0x33, 0x44]);

        let mut little = writer(Platform::Standard, Endian::Little);
        little.write_rgba(color);
        assert_eq!(little.into_parts().0, vec![0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn test_render_method_bytes() {
        let render = RenderSettings {
            dodge_blend: 9,
            unknown_1: 1,
            unknown_2: 2,
        };
        let mut little = writer(Platform::Standard, Endian::Little);
        little.write_render_method(render);
        assert_eq!(little.into_parts().0, vec![9, 1, 2, 0]);

        let mut big = writer(Platform::Standard, Endian::Big);
        big.write_render_method(render);
        assert_eq!(big.into_parts().0, vec![0, 2, 1, 9]);
    }

    #[test]
    fn test_fixed_point_truncates() {
        let mut w = writer(Platform::Ds, Endian::Little);
        w.write_float(1.5).unwrap();
        w.write_float(-0.00001).unwrap();
        w.write_float(0.99999).unwrap();
        let (buf, _) = w.into_parts();
        assert_eq!(&buf[0..4], &6144i32.to_le_bytes());
        assert_eq!(&buf[4..8], &0i32.to_le_bytes());
        assert_eq!(&buf[8..12], &4095i32.to_le_bytes());
    }

    #[test]
    fn test_fixed_point_precision() {
        let layout = Layout::new(Platform::ThreeDs, Endian::Big, DEFAULT_ALIGNMENT);
        // Three-decimal values across +/-500
        let values: Vec<f64> = (-500_000..=500_000)
            .step_by(997)
            .map(|v| v as f64 / 1000.0)
            .collect();

        let mut w = Writer::new(layout);
        for v in &values {
            w.write_float(*v).unwrap();
        }
        let (buf, _) = w.into_parts();
        let reader = Reader::new(&buf, layout);
        for (i, v) in values.iter().enumerate() {
            let back = reader.read_float(i * 4).unwrap();
            assert!((back - v).abs() < 1.0 / 4096.0, "{} -> {}", v, back);
        }
    }

    #[test]
    fn test_fixed_point_range() {
        let mut w = writer(Platform::Ds, Endian::Little);
        assert!(matches!(
            w.write_float(600000.0),
            Err(Error::MalformedDocument(_))
        ));
        assert!(w.write_float(-600000.0).is_err());
        assert!(w.write_float(f64::NAN).is_err());
        assert_eq!(w.position(), 0);

        // Largest and smallest values that still fit
        w.write_float(524287.999).unwrap();
        w.write_float(-524288.0).unwrap();
        let (buf, _) = w.into_parts();
        assert_eq!(&buf[0..4], &2147483643i32.to_le_bytes());
        assert_eq!(&buf[4..8], &i32::MIN.to_le_bytes());
    }

    #[test]
    fn test_ieee_float_range() {
        let mut w = writer(Platform::Standard, Endian::Big);
        assert!(w.write_float(1e40).is_err());
        assert!(w.write_float(f64::INFINITY).is_err());
        assert!(w.write_float(f64::NAN).is_err());
        assert_eq!(w.position(), 0);

        w.write_float(f64::from(f32::MAX)).unwrap();
        assert_eq!(w.position(), 4);
    }

    #[test]
    fn test_ieee_float_roundtrip() {
        let layout = Layout::new(Platform::Standard, Endian::Little, DEFAULT_ALIGNMENT);
        let mut w = Writer::new(layout);
        w.write_float(-123.25).unwrap();
        let (buf, _) = w.into_parts();
        assert_eq!(Reader::new(&buf, layout).read_float(0).unwrap(), -123.25);
    }

    #[test]
    fn test_pointer_records_relocation() {
        let mut w = writer(Platform::Standard, Endian::Little);
        w.write_bytes(&[0u8; 40]);
        w.write_pointer(120).unwrap();
        w.write_null_pointer();
        assert_eq!(w.relocations().offsets(), &[8]);

        let (buf, _) = w.into_parts();
        assert_eq!(&buf[40..44], &88i32.to_le_bytes());
        assert_eq!(&buf[44..48], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_mobile_pointer_width() {
        let mut w = writer(Platform::Mobile, Endian::Big);
        w.write_bytes(&[0u8; 32]);
        w.write_pointer(40).unwrap();
        w.write_null_pointer();
        let (buf, relocations) = w.into_parts();
        assert_eq!(buf.len(), 48);
        assert_eq!(&buf[32..40], &8i64.to_be_bytes());
        assert_eq!(relocations.offsets(), &[0]);
    }

    #[test]
    fn test_pointer_before_payload_is_rejected() {
        let mut w = writer(Platform::Standard, Endian::Little);
        assert!(w.write_pointer(64).is_err());

        w.write_bytes(&[0u8; 32]);
        assert!(w.write_pointer(8).is_err());
    }

    #[test]
    fn test_write_text_pads_with_nul() {
        let mut w = writer(Platform::Standard, Endian::Little);
        w.write_text("Title").unwrap();
        assert_eq!(
            w.into_parts().0,
            vec![0x54, 0x69, 0x74, 0x6c, 0x65, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_pad_and_patch() {
        let mut w = writer(Platform::Standard, Endian::Big);
        w.write_bytes(&[1, 2, 3]);
        assert_eq!(w.pad_to(16), 13);
        assert_eq!(w.pad_to(16), 0);

        w.patch_i32(4, 7).unwrap();
        w.patch_u32_le(8, 7).unwrap();
        assert!(w.patch_i32(14, 1).is_err());

        let (buf, _) = w.into_parts();
        assert_eq!(&buf[4..8], &[0, 0, 0, 7]);
        assert_eq!(&buf[8..12], &[7, 0, 0, 0]);
    }

    #[test]
    fn test_write_int_range() {
        let mut w = writer(Platform::Standard, Endian::Little);
        assert!(w.write_int(i64::from(i32::MAX) + 1, 4).is_err());
        assert!(w.write_int(-1, 8).is_ok());
        assert_eq!(w.into_parts().0, vec![0xff; 8]);
    }
}
