//! Byte layouts of the map records we touch.
//!
//! Only the tag and special fields are described; everything else in a
//! record is carried through untouched.

use std::ops::Range;

/// Tag values that never enter a tag pool.
pub const SENTINEL_TAGS: [u16; 2] = [0, 0xFFFF];

/// Linedef specials that transfer a tag to another line or sector. Their tag
/// is a link, not a trigger, and must stay as authored.
pub const TAG_TRANSFER_SPECIALS: [u16; 4] = [704, 705, 714, 715];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordKind {
    Sector,
    Linedef,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Tag,
    Special,
}

impl RecordKind {
    /// Lump holding this record type inside a map segment.
    pub fn lump_name(self) -> &'static [u8] {
        match self {
            RecordKind::Sector => b"SECTORS",
            RecordKind::Linedef => b"LINEDEFS",
        }
    }

    pub fn from_lump_name(name: &[u8]) -> Option<Self> {
        match name {
            b"SECTORS" => Some(RecordKind::Sector),
            b"LINEDEFS" => Some(RecordKind::Linedef),
            _ => None,
        }
    }

    pub fn record_size(self) -> usize {
        match self {
            RecordKind::Sector => 26,
            RecordKind::Linedef => 14,
        }
    }

    /// Offset of `field` within one record.
    fn field_offset(self, field: Field) -> usize {
        match (self, field) {
            (RecordKind::Sector, Field::Special) => 22,
            (RecordKind::Sector, Field::Tag) => 24,
            (RecordKind::Linedef, Field::Special) => 6,
            (RecordKind::Linedef, Field::Tag) => 8,
        }
    }

    /// Whole records in a lump of `len` bytes. A trailing partial record is
    /// ignored.
    pub fn record_count(self, len: usize) -> usize {
        len / self.record_size()
    }

    /// Byte range of `field` in record `index`.
    pub fn field_range(self, index: usize, field: Field) -> Range<usize> {
        let start = index * self.record_size() + self.field_offset(field);
        start..start + 2
    }

    pub fn read(self, data: &[u8], index: usize, field: Field) -> u16 {
        let range = self.field_range(index, field);
        u16::from_le_bytes([data[range.start], data[range.start + 1]])
    }

    pub fn write(self, data: &mut [u8], index: usize, field: Field, value: u16) {
        let range = self.field_range(index, field);
        data[range].copy_from_slice(&value.to_le_bytes());
    }
}

pub fn is_sentinel_tag(tag: u16) -> bool {
    SENTINEL_TAGS.contains(&tag)
}

pub fn is_tag_transfer_special(special: u16) -> bool {
    TAG_TRANSFER_SPECIALS.contains(&special)
}
