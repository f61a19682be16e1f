//! Binary to [`Document`]

use serde::Serialize;
use tracing::debug;

use crate::aspect::{screen_size, AspectRatio};
use crate::document::{Animation, Document, Element, ElementAnimation, MiscInfo};
use crate::hierarchy::{self, Link};
use crate::layout::{Endian, Layout, Options, PAYLOAD_BASE};
use crate::motion;
use crate::reader::{slice, Reader};
use crate::records::{self, LENGTH_RANGE_SIZE, LINK_SIZE, PATTERN_SIZE, SPRITE_CROP_SIZE};
use crate::relocation::RelocationTable;
use crate::{is_ncsc, Error, Result};

/// Absolute offset of the header floats
const HEADER_FLOATS_OFFSET: usize = PAYLOAD_BASE + 20;

/// Absolute offset of the first count/pointer pair
const SECTIONS_OFFSET: usize = PAYLOAD_BASE + 36;

/// Count and absolute offset of a header section
#[derive(Debug, Clone, Copy, Default)]
struct Section {
    count: usize,
    offset: usize,
}

/// Decoded payload header
#[derive(Debug, Clone)]
struct PayloadHeader {
    floats: [f64; 4],
    unknown_patterns: Section,
    sprite_crops: Section,
    banks: Section,
    names: Section,
    animations: Section,
    animation_names: usize,
    aspect: f64,
    animation_lengths: usize,
}

impl PayloadHeader {
    fn read(reader: &Reader) -> Result<Self> {
        let mut floats = [0.0; 4];
        for (i, value) in floats.iter_mut().enumerate() {
            *value = reader.read_float(HEADER_FLOATS_OFFSET + i * 4)?;
        }

        let mut offset = SECTIONS_OFFSET;
        let mut section = || -> Result<Section> {
            let count = reader.read_count(offset)?;
            let (target, next) = reader.read_pointer(offset + 4)?;
            offset = next;
            Ok(Section {
                count,
                offset: target,
            })
        };
        let unknown_patterns = section()?;
        let sprite_crops = section()?;
        let banks = section()?;
        let names = section()?;
        let animations = section()?;

        let (animation_names, next) = reader.read_pointer(offset)?;
        let aspect = reader.read_float(next)?;
        let (animation_lengths, _) = reader.read_pointer(next + 4)?;

        Ok(Self {
            floats,
            unknown_patterns,
            sprite_crops,
            banks,
            names,
            animations,
            animation_names,
            aspect,
            animation_lengths,
        })
    }
}

/// Byte order from the indicator at bytes 8-11
fn detect_endian(data: &[u8]) -> Result<Endian> {
    let indicator = Endian::Little.read_i32(slice(data, 8, 4)?);
    Ok(if indicator == 1 {
        Endian::Little
    } else {
        Endian::Big
    })
}

/// Check the payload magic and build the layout for this file
fn open<'a>(data: &'a [u8], options: &Options) -> Result<(Reader<'a>, Endian, u32)> {
    if !is_ncsc(data) {
        return Err(Error::NotThisFormat);
    }

    let endian = detect_endian(data)?;
    let alignment = endian.read_i32(slice(data, 12, 4)?);
    let alignment = u32::try_from(alignment)
        .map_err(|_| Error::MalformedInput(format!("negative alignment {}", alignment)))?;
    let layout = Layout::new(options.platform, endian, alignment);
    Ok((Reader::new(data, layout), endian, alignment))
}

fn read_info(
    reader: &Reader,
    header: &PayloadHeader,
    endian: Endian,
    alignment: u32,
    options: &Options,
) -> Result<MiscInfo> {
    Ok(MiscInfo {
        magic: reader.read_string(0, Some(4))?,
        aspect_ratio: AspectRatio::from_f64(header.aspect)?,
        screen_size: screen_size(header.aspect, options.platform)?.to_string(),
        byte_order: endian,
        alignment,
        header_floats: header.floats,
    })
}

/// Decode an nCSC file
///
/// Fails with [`Error::NotThisFormat`] when the payload magic is missing.
pub fn decode(data: &[u8], options: &Options) -> Result<Document> {
    let (reader, endian, alignment) = open(data, options)?;
    let layout = reader.layout();
    let header = PayloadHeader::read(&reader)?;
    let info = read_info(&reader, &header, endian, alignment, options)?;

    debug!(
        "decoding {} ({:?}, alignment {}), screen {}",
        info.magic, endian, alignment, info.screen_size
    );
    debug!(
        "{} unknown pattern(s), {} sprite crop(s), {} bank(s), {} element name(s), {} animation(s)",
        header.unknown_patterns.count,
        header.sprite_crops.count,
        header.banks.count,
        header.names.count,
        header.animations.count
    );

    let unknown_patterns = (0..header.unknown_patterns.count)
        .map(|i| -> Result<[f64; 2]> {
            let at = header.unknown_patterns.offset + i * PATTERN_SIZE;
            Ok([reader.read_float(at)?, reader.read_float(at + 4)?])
        })
        .collect::<Result<Vec<_>>>()?;

    let sprite_crops = (0..header.sprite_crops.count)
        .map(|i| {
            records::read_sprite_crop(&reader, header.sprite_crops.offset + i * SPRITE_CROP_SIZE)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut element_banks = (0..header.banks.count)
        .map(|b| read_bank(&reader, b, header.banks.offset + b * layout.bank_header_size()))
        .collect::<Result<Vec<_>>>()?;

    read_element_names(&reader, &header.names, &mut element_banks, options)?;

    let animations = (0..header.animations.count)
        .map(|a| read_animation(&reader, &header, a))
        .collect::<Result<Vec<_>>>()?;

    Ok(Document {
        info,
        unknown_patterns,
        sprite_crops,
        element_banks,
        animations,
    })
}

/// Read one bank header, its hierarchy and its elements
fn read_bank(reader: &Reader, bank: usize, offset: usize) -> Result<Vec<Element>> {
    let width = reader.layout().pointer_width;
    let count = reader.read_count(offset)?;
    let (elements_at, next) = reader.read_pointer(offset + 4)?;
    let (links_at, _) = reader.read_pointer(next + 4)?;

    debug!(
        "bank {}: {} element(s) at {}, hierarchy at {}",
        bank, count, elements_at, links_at
    );

    let links = (0..count)
        .map(|i| -> Result<Link> {
            let at = links_at + i * LINK_SIZE;
            Ok(Link::from_raw(reader.read_i32(at)?, reader.read_i32(at + 4)?))
        })
        .collect::<Result<Vec<_>>>()?;
    let parents = hierarchy::parents_from_links(bank, &links)?;

    parents
        .iter()
        .enumerate()
        .map(|(i, parent)| {
            let (body_at, _) = reader.read_pointer(elements_at + i * width)?;
            records::read_element(reader, body_at, i, *parent)
        })
        .collect()
}

/// Assign names from the element name table
///
/// Table positions are kept only when the table names every element, since a
/// partial order cannot be written back.
fn read_element_names(
    reader: &Reader,
    names: &Section,
    banks: &mut [Vec<Element>],
    options: &Options,
) -> Result<()> {
    let entry_size = reader.layout().name_entry_size();
    for i in 0..names.count {
        let (name_at, next) = reader.read_pointer(names.offset + i * entry_size)?;
        let bank = reader.read_count(next)?;
        let index = reader.read_count(next + 4)?;

        let element = banks
            .get_mut(bank)
            .and_then(|elements| elements.get_mut(index))
            .ok_or_else(|| {
                Error::MalformedInput(format!(
                    "name entry {} refers to missing element {} of bank {}",
                    i, index, bank
                ))
            })?;
        element.name = reader.read_string(name_at, None)?;
        if options.preserve_name_order {
            element.name_index = Some(i);
        }
    }

    let elements = banks.iter().flatten();
    let complete = names.count == elements.clone().count()
        && elements.clone().all(|e| e.name_index.is_some());
    if options.preserve_name_order && !complete {
        debug!(
            "name table covers {} entries but not every element, keeping natural order",
            names.count
        );
        for element in banks.iter_mut().flatten() {
            element.name_index = None;
        }
    }
    Ok(())
}

fn read_animation(reader: &Reader, header: &PayloadHeader, number: usize) -> Result<Animation> {
    let layout = reader.layout();
    let entry_size = layout.counted_pointer_size();

    let at = header.animations.offset + number * entry_size;
    let bank_count = reader.read_count(at)?;
    let (banks_at, _) = reader.read_pointer(at + 4)?;

    let banks = (0..bank_count)
        .map(|b| {
            let at = banks_at + b * entry_size;
            let element_count = reader.read_count(at)?;
            let (elements_at, _) = reader.read_pointer(at + 4)?;
            (0..element_count)
                .map(|e| read_element_animation(reader, elements_at + e * entry_size, e))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let name = find_animation_name(reader, header, number)?;
    let lengths_at = header.animation_lengths + number * LENGTH_RANGE_SIZE;
    let length_range = [
        reader.read_float(lengths_at)?,
        reader.read_float(lengths_at + 4)?,
    ];

    debug!("animation {} '{}': {} bank(s)", number, name, bank_count);
    Ok(Animation {
        name,
        length_range,
        banks,
    })
}

/// Read the motion mask and tracks of one element
///
/// Tracks are stored lowest bit first, the reverse of the mask decode order.
fn read_element_animation(
    reader: &Reader,
    offset: usize,
    index: usize,
) -> Result<ElementAnimation> {
    let mask = reader.read_i32(offset)? as u32;
    let (tracks_at, _) = reader.read_pointer(offset + 4)?;
    let kinds = motion::decode_mask(mask)?;
    let header_size = reader.layout().track_header_size();

    let tracks = kinds
        .iter()
        .rev()
        .enumerate()
        .map(|(t, kind)| records::read_track(reader, tracks_at + t * header_size, *kind))
        .collect::<Result<Vec<_>>>()?;
    Ok(ElementAnimation { index, tracks })
}

/// Look up an animation's name by its index in the name table
fn find_animation_name(
    reader: &Reader,
    header: &PayloadHeader,
    number: usize,
) -> Result<String> {
    let entry_size = reader.layout().counted_pointer_size();
    for i in 0..header.animations.count {
        let (name_at, next) = reader.read_pointer(header.animation_names + i * entry_size)?;
        if reader.read_count(next)? == number {
            return reader.read_string(name_at, None);
        }
    }
    Err(Error::MalformedInput(format!(
        "animation {} has no entry in the name table",
        number
    )))
}

/// Header-level facts about a file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub magic: String,
    pub byte_order: Endian,
    pub alignment: u32,
    /// Declared payload size (bytes 36-39)
    pub payload_size: u32,
    pub unknown_patterns: usize,
    pub sprite_crops: usize,
    pub element_banks: usize,
    pub elements: usize,
    pub animations: usize,
    pub aspect_ratio: AspectRatio,
    pub screen_size: String,
    /// Pointer fields listed in the relocation table
    pub relocations: usize,
}

/// Read header information without decoding the sections
pub fn read_summary(data: &[u8], options: &Options) -> Result<Summary> {
    let (reader, endian, alignment) = open(data, options)?;
    let header = PayloadHeader::read(&reader)?;
    let info = read_info(&reader, &header, endian, alignment, options)?;

    let payload_size = Endian::Little.read_i32(reader.bytes(PAYLOAD_BASE + 4, 4)?) as u32;
    let relocation_at = reader.read_count(20)?;
    let relocations = RelocationTable::parse(data, relocation_at, endian)?;

    Ok(Summary {
        magic: info.magic,
        byte_order: endian,
        alignment,
        payload_size,
        unknown_patterns: header.unknown_patterns.count,
        sprite_crops: header.sprite_crops.count,
        element_banks: header.banks.count,
        elements: header.names.count,
        animations: header.animations.count,
        aspect_ratio: info.aspect_ratio,
        screen_size: info.screen_size,
        relocations: relocations.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Platform;

    #[test]
    fn test_not_this_format() {
        let data = vec![0u8; 128];
        assert!(matches!(
            decode(&data, &Options::default()),
            Err(Error::NotThisFormat)
        ));
        assert!(matches!(
            read_summary(b"short", &Options::default()),
            Err(Error::NotThisFormat)
        ));
    }

    #[test]
    fn test_detect_endian() {
        let mut data = vec![0u8; 12];
        data[8..12].copy_from_slice(&1i32.to_le_bytes());
        assert_eq!(detect_endian(&data).unwrap(), Endian::Little);
        data[8..12].copy_from_slice(&1i32.to_be_bytes());
        assert_eq!(detect_endian(&data).unwrap(), Endian::Big);
    }

    #[test]
    fn test_truncated_header() {
        let mut data = vec![0u8; 40];
        data[32..36].copy_from_slice(b"nCSC");
        data[8..12].copy_from_slice(&1i32.to_le_bytes());
        data[12..16].copy_from_slice(&32i32.to_le_bytes());
        assert!(matches!(
            decode(&data, &Options::new(Platform::Standard)),
            Err(Error::TruncatedInput { .. })
        ));
    }
}
