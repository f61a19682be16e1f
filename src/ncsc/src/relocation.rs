//! `NOF0` relocation table
//!
//! Lists the payload offset of every pointer field in write order. The
//! loading engine adds its base address to each listed field.

use crate::layout::Endian;
use crate::reader::slice;
use crate::{Error, Result, RELOCATION_MAGIC};

/// Bytes before the first entry: tag, length, count, reserved
const HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationTable {
    offsets: Vec<u32>,
}

impl RelocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer field at `offset` (relative to the payload)
    pub fn record(&mut self, offset: u32) {
        self.offsets.push(offset);
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Value of the length field: every entry plus count, reserved and length
    pub fn section_len(&self) -> usize {
        self.offsets.len() * 4 + 12
    }

    /// Append the encoded section
    ///
    /// The length field is always little-endian; count, reserved word and
    /// entries follow the file's byte order.
    pub fn write(&self, out: &mut Vec<u8>, endian: Endian) -> Result<()> {
        let mut word = [0u8; 4];
        out.extend_from_slice(&RELOCATION_MAGIC);
        out.extend_from_slice(&to_u32(self.section_len())?.to_le_bytes());

        endian.write_i32(&mut word, to_i32(self.offsets.len())?);
        out.extend_from_slice(&word);
        endian.write_i32(&mut word, 0);
        out.extend_from_slice(&word);

        for &offset in &self.offsets {
            endian.write_i32(&mut word, offset as i32);
            out.extend_from_slice(&word);
        }
        Ok(())
    }

    /// Parse a section starting at absolute `offset`
    pub fn parse(data: &[u8], offset: usize, endian: Endian) -> Result<Self> {
        if slice(data, offset, 4)? != RELOCATION_MAGIC {
            return Err(Error::MalformedInput(format!(
                "no relocation table at offset {}",
                offset
            )));
        }

        let count = endian.read_i32(slice(data, offset + 8, 4)?);
        let count = usize::try_from(count).map_err(|_| {
            Error::MalformedInput(format!("negative relocation count {}", count))
        })?;
        let entries = slice(data, offset + HEADER_SIZE, count.saturating_mul(4))?;

        let offsets = entries
            .chunks_exact(4)
            .map(|chunk| endian.read_i32(chunk) as u32)
            .collect();
        Ok(Self { offsets })
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::MalformedDocument(format!("{} does not fit a 32-bit field", value)))
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::MalformedDocument(format!("{} does not fit a 32-bit field", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_len() {
        let mut table = RelocationTable::new();
        assert_eq!(table.section_len(), 12);
        table.record(36);
        table.record(44);
        assert_eq!(table.section_len(), 20);
    }

    #[test]
    fn test_write_little_endian() {
        let mut table = RelocationTable::new();
        table.record(40);
        let mut out = Vec::new();
        table.write(&mut out, Endian::Little).unwrap();
        assert_eq!(
            out,
            vec![
                b'N', b'O', b'F', b'0', 16, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 40, 0, 0, 0
            ]
        );
    }

    #[test]
    fn test_write_big_endian_keeps_le_length() {
        let mut table = RelocationTable::new();
        table.record(40);
        let mut out = Vec::new();
        table.write(&mut out, Endian::Big).unwrap();
        assert_eq!(&out[4..8], &[16, 0, 0, 0]);
        assert_eq!(&out[8..12], &[0, 0, 0, 1]);
        assert_eq!(&out[16..20], &[0, 0, 0, 40]);
    }

    #[test]
    fn test_parse_written_table() {
        let mut table = RelocationTable::new();
        for offset in [36, 44, 52, 1000] {
            table.record(offset);
        }
        for endian in [Endian::Little, Endian::Big] {
            let mut out = vec![0u8; 8];
            table.write(&mut out, endian).unwrap();
            assert_eq!(RelocationTable::parse(&out, 8, endian).unwrap(), table);
        }
    }

    #[test]
    fn test_parse_rejects_missing_tag() {
        let data = [0u8; 32];
        assert!(matches!(
            RelocationTable::parse(&data, 0, Endian::Little),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_truncated_entries() {
        let mut table = RelocationTable::new();
        table.record(1);
        table.record(2);
        let mut out = Vec::new();
        table.write(&mut out, Endian::Little).unwrap();
        out.truncate(out.len() - 2);
        assert!(matches!(
            RelocationTable::parse(&out, 0, Endian::Little),
            Err(Error::TruncatedInput { .. })
        ));
    }
}
