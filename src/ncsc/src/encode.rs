//! [`Document`] to binary
//!
//! Sections are written in one forward pass. Every pointer targets a region
//! that has not been written yet, so a cursor tracks where the next region
//! will start and is advanced each time a pointer to a new region is emitted.

use tracing::debug;

use crate::document::{Document, ElementAnimation};
use crate::hierarchy;
use crate::layout::{Layout, Options, PAYLOAD_BASE};
use crate::motion::{self, MotionKind};
use crate::records::{
    self, KEYFRAME_SIZE, LENGTH_RANGE_SIZE, LINK_SIZE, PATTERN_SIZE, SETTINGS_SIZE,
    SPRITE_CROP_SIZE, SPRITE_ID_SIZE,
};
use crate::text;
use crate::writer::Writer;
use crate::{Error, Result, END_MAGIC, NCSC_MAGIC};

/// Stored at bytes 4-7
const OUTER_HEADER_SIZE: u32 = 24;

/// Payload header constants following the size field
const PAYLOAD_HEADER_WORDS: [i32; 3] = [16, 0, 2];

/// Trailer sections start on this boundary
const TRAILER_BLOCK: usize = 16;

/// Absolute offsets of the patched outer header fields
const ACCOUNTING_FIELD: usize = 16;
const RELOCATION_OFFSET_FIELD: usize = 20;
const RELOCATION_LENGTH_FIELD: usize = 24;
const PAYLOAD_SIZE_FIELD: usize = PAYLOAD_BASE + 4;

/// Start of the next unassigned region
///
/// `real` is an absolute file offset. `accounted` is the running total stored
/// at bytes 16-19; it counts every pointer field as four bytes wide and starts
/// at the payload header size for 4-byte pointers.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    real: usize,
    accounted: usize,
}

/// Encode a document for the given platform
///
/// The document is validated first; see [`Document::validate`].
pub fn encode(document: &Document, options: &Options) -> Result<Vec<u8>> {
    document.validate()?;

    let layout = Layout::new(
        options.platform,
        document.info.byte_order,
        document.info.alignment,
    );
    let mut encoder = Encoder::new(document, layout)?;
    encoder.write_outer_header()?;
    encoder.write_payload_header()?;
    encoder.write_tables()?;
    encoder.write_names_and_links()?;
    encoder.write_element_bodies()?;
    encoder.write_motions()?;
    encoder.write_element_data()?;
    encoder.write_tracks()?;
    encoder.finish()
}

struct Encoder<'a> {
    document: &'a Document,
    writer: Writer,
    layout: Layout,
    /// Same layout with 4-byte pointers, for the accounting total
    accounting: Layout,
    cursor: Cursor,
    name_order: Vec<(usize, usize)>,
}

impl<'a> Encoder<'a> {
    fn new(document: &'a Document, layout: Layout) -> Result<Self> {
        let accounting = Layout {
            pointer_width: 4,
            ..layout
        };
        Ok(Self {
            document,
            writer: Writer::new(layout),
            layout,
            accounting,
            cursor: Cursor {
                real: layout.sections_start(),
                accounted: accounting.sections_start() - PAYLOAD_BASE,
            },
            name_order: document.name_order()?,
        })
    }

    /// Point at the cursor and reserve `count` records of `record` bytes
    fn point(&mut self, count: usize, record: fn(&Layout) -> usize) -> Result<()> {
        self.writer.write_pointer(self.cursor.real)?;
        self.cursor.real += count * record(&self.layout);
        self.cursor.accounted += count * record(&self.accounting);
        Ok(())
    }

    /// Point at the cursor and reserve `len` bytes
    fn point_bytes(&mut self, len: usize) -> Result<()> {
        self.writer.write_pointer(self.cursor.real)?;
        self.reserve(len);
        Ok(())
    }

    fn reserve(&mut self, len: usize) {
        self.cursor.real += len;
        self.cursor.accounted += len;
    }

    fn counted(&mut self, count: usize, record: fn(&Layout) -> usize) -> Result<()> {
        self.writer.write_count(count)?;
        self.point(count, record)
    }

    fn write_outer_header(&mut self) -> Result<()> {
        let document = self.document;
        let info = &document.info;
        let alignment = i32::try_from(info.alignment).map_err(|_| {
            Error::MalformedDocument(format!("alignment {} is too large", info.alignment))
        })?;

        self.writer.write_bytes(info.magic.as_bytes());
        self.writer.write_u32_le(OUTER_HEADER_SIZE);
        self.writer.write_i32(1);
        self.writer.write_i32(alignment);
        // Accounting total, relocation offset and length are patched last
        self.writer.write_bytes(&[0u8; 12]);
        self.writer.write_i32(1);
        Ok(())
    }

    fn write_payload_header(&mut self) -> Result<()> {
        let document = self.document;
        let animations = document.animations.len();

        self.writer.write_bytes(&NCSC_MAGIC);
        self.writer.write_u32_le(0);
        for word in PAYLOAD_HEADER_WORDS {
            self.writer.write_i32(word);
        }
        for value in document.info.header_floats {
            self.writer.write_float(value)?;
        }

        self.counted(document.unknown_patterns.len(), |_| PATTERN_SIZE)?;
        self.counted(document.sprite_crops.len(), |_| SPRITE_CROP_SIZE)?;
        self.counted(document.element_banks.len(), Layout::bank_header_size)?;
        self.counted(document.element_count(), Layout::name_entry_size)?;
        self.counted(animations, Layout::counted_pointer_size)?;
        self.point(animations, Layout::counted_pointer_size)?;
        self.writer.write_float(document.info.aspect_ratio.to_f64())?;
        self.point(animations, |_| LENGTH_RANGE_SIZE)?;

        debug_assert_eq!(self.writer.position(), self.layout.sections_start());
        Ok(())
    }

    /// Patterns, crops and every fixed-size table
    fn write_tables(&mut self) -> Result<()> {
        let document = self.document;

        for [first, second] in &document.unknown_patterns {
            self.writer.write_float(*first)?;
            self.writer.write_float(*second)?;
        }
        for crop in &document.sprite_crops {
            records::write_sprite_crop(&mut self.writer, crop)?;
        }

        for bank in &document.element_banks {
            self.writer.write_count(bank.len())?;
            self.point(bank.len(), |layout| layout.pointer_width)?;
            self.writer.write_i32(0);
            self.point(bank.len(), |_| LINK_SIZE)?;
        }

        let name_order = std::mem::take(&mut self.name_order);
        for &(bank, index) in &name_order {
            let name = &document.element_banks[bank][index].name;
            self.point_bytes(padded_name_len(name)?)?;
            self.writer.write_count(bank)?;
            self.writer.write_count(index)?;
        }
        self.name_order = name_order;

        for animation in &document.animations {
            self.counted(animation.banks.len(), Layout::counted_pointer_size)?;
        }

        for (index, animation) in document.animations.iter().enumerate() {
            self.point_bytes(padded_name_len(&animation.name)?)?;
            self.writer.write_count(index)?;
        }

        for animation in &document.animations {
            self.writer.write_float(animation.length_range[0])?;
            self.writer.write_float(animation.length_range[1])?;
        }
        Ok(())
    }

    /// Element lists with hierarchies, names, animation bank tables
    fn write_names_and_links(&mut self) -> Result<()> {
        let document = self.document;

        for bank in &document.element_banks {
            for _ in bank {
                self.point(1, Layout::element_body_size)?;
            }
            let parents: Vec<Option<usize>> = bank.iter().map(|e| e.parent).collect();
            for link in hierarchy::links_from_parents(&parents) {
                let (first_child, next_sibling) = link.to_raw();
                self.writer.write_i32(first_child);
                self.writer.write_i32(next_sibling);
            }
        }

        for &(bank, index) in &self.name_order {
            let name = &document.element_banks[bank][index].name;
            self.writer.write_text(name)?;
        }

        for animation in &document.animations {
            for bank in &animation.banks {
                self.counted(bank.len(), Layout::counted_pointer_size)?;
            }
        }

        for animation in &document.animations {
            self.writer.write_text(&animation.name)?;
        }
        Ok(())
    }

    fn write_element_bodies(&mut self) -> Result<()> {
        let document = self.document;
        for element in document.element_banks.iter().flatten() {
            records::write_element(&mut self.writer, element, self.cursor.real)?;
            self.reserve(element.sprites.len() * SPRITE_ID_SIZE + SETTINGS_SIZE);
        }
        Ok(())
    }

    /// Motion masks with their track list pointers
    fn write_motions(&mut self) -> Result<()> {
        for element in element_animations(self.document) {
            let kinds: Vec<MotionKind> = element.tracks.iter().map(|t| t.motion).collect();
            self.writer.write_i32(motion::encode_mask(&kinds) as i32);
            if kinds.is_empty() {
                self.writer.write_null_pointer();
            } else {
                self.point(kinds.len(), Layout::track_header_size)?;
            }
        }
        Ok(())
    }

    /// Sprite lists and default settings, in element body order
    fn write_element_data(&mut self) -> Result<()> {
        let document = self.document;
        for element in document.element_banks.iter().flatten() {
            for sprite in &element.sprites {
                self.writer.write_i32(*sprite);
            }
            records::write_settings(&mut self.writer, &element.defaults)?;
        }
        Ok(())
    }

    /// Track headers, then every keyframe
    fn write_tracks(&mut self) -> Result<()> {
        let document = self.document;
        for element in element_animations(document) {
            for track in element.canonical_tracks() {
                records::write_track_header(&mut self.writer, track, self.cursor.real)?;
                self.reserve(track.keyframes.len() * KEYFRAME_SIZE);
            }
        }

        for element in element_animations(document) {
            for track in element.canonical_tracks() {
                for keyframe in &track.keyframes {
                    records::write_keyframe(&mut self.writer, keyframe, track.motion)?;
                }
            }
        }

        debug_assert_eq!(self.writer.position(), self.cursor.real);
        Ok(())
    }

    /// Patch the sizes, then append the relocation table and end marker
    fn finish(mut self) -> Result<Vec<u8>> {
        let end = self.writer.position();
        self.writer
            .patch_u32_le(PAYLOAD_SIZE_FIELD, to_u32(end - PAYLOAD_BASE - 8)?)?;

        self.cursor.accounted += self.writer.pad_to(TRAILER_BLOCK);
        let relocation_at = self.writer.position();
        let section_len = self.writer.relocations().section_len();

        self.writer
            .patch_i32(ACCOUNTING_FIELD, to_i32(self.cursor.accounted)?)?;
        self.writer
            .patch_i32(RELOCATION_OFFSET_FIELD, to_i32(relocation_at)?)?;
        self.writer
            .patch_i32(RELOCATION_LENGTH_FIELD, to_i32(section_len + 4)?)?;

        let endian = self.layout.endian;
        let (mut out, relocations) = self.writer.into_parts();
        relocations.write(&mut out, endian)?;
        out.resize(out.len().next_multiple_of(TRAILER_BLOCK), 0);
        out.extend_from_slice(&END_MAGIC);
        out.extend_from_slice(&[0u8; 12]);

        debug!(
            "encoded {} bytes, {} relocation(s) at {}, accounting {}",
            out.len(),
            relocations.len(),
            relocation_at,
            self.cursor.accounted
        );
        Ok(out)
    }
}

/// Every element animation, animation by animation and bank by bank
fn element_animations(document: &Document) -> impl Iterator<Item = &ElementAnimation> {
    document
        .animations
        .iter()
        .flat_map(|animation| animation.banks.iter().flatten())
}

fn padded_name_len(name: &str) -> Result<usize> {
    Ok(text::padded_len(text::encode(name)?.len(), text::NAME_BLOCK))
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::MalformedDocument(format!("{} does not fit a 32-bit field", value)))
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::MalformedDocument(format!("{} does not fit a 32-bit field", value)))
}
