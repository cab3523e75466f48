//! Fixed 24-byte record and group header layouts.

use std::fmt;

use tessera_common::Tag;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of both record and group headers.
pub const HEADER_SIZE: usize = 24;

/// Literal tag opening every group header.
pub const GRUP: Tag = Tag::lit(b"GRUP");

/// Field tag carrying an out-of-band 32-bit length for the next field.
pub const XXXX: Tag = Tag::lit(b"XXXX");

/// Record header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RecordHeader {
    /// Record type tag
    pub tag: u32,
    /// Length of the (possibly compressed) field block
    pub data_size: u32,
    /// Flags bitfield, see [`flags`]
    pub flags: u32,
    /// Record ID
    pub id: u32,
    /// Revision / version control stamp
    pub revision: u32,
    /// Form version
    pub version: u16,
    /// Unknown
    pub unknown: u16,
}

/// Group header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct GroupHeader {
    /// Always [`GRUP`]
    pub tag: u32,
    /// Size of the whole group including this header
    pub group_size: u32,
    /// Label, interpreted according to the group type
    pub label: u32,
    /// Group type discriminant
    pub group_type: u32,
    /// Timestamp
    pub stamp: u16,
    /// Unknown
    pub unknown1: u16,
    /// Version
    pub version: u16,
    /// Unknown
    pub unknown2: u16,
}

/// Record flag bits.
///
/// Several bits carry different meanings depending on the record type
/// (0x40 is "constant" on some types and "hidden from local map" on placed
/// references, for example). They are stored and written verbatim; only the
/// bits below are interpreted by this crate.
pub mod flags {
    /// Record is marked deleted.
    pub const DELETED: u32 = 0x0000_0020;
    /// Record is persistent.
    pub const PERSISTENT: u32 = 0x0000_0400;
    /// Placed reference starts disabled.
    pub const INITIALLY_DISABLED: u32 = 0x0000_0800;
    /// Field block is zlib-compressed with a 4-byte length prefix.
    pub const COMPRESSED: u32 = 0x0004_0000;
}

/// Group type discriminant.
///
/// Ordering follows the raw on-disk value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupType {
    /// Top-level group; label is a record type tag.
    Top,
    /// Children of a worldspace; label is the world ID.
    WorldChildren,
    /// Interior cell block; label is the block number.
    InteriorCellBlock,
    /// Interior cell sub-block; label is the sub-block number.
    InteriorCellSubBlock,
    /// Exterior cell block; label packs signed 16-bit grid Y, X.
    ExteriorCellBlock,
    /// Exterior cell sub-block; label packs signed 16-bit grid Y, X.
    ExteriorCellSubBlock,
    /// Children of a cell; label is the cell ID.
    CellChildren,
    /// Children of a dialog topic; label is the topic ID.
    TopicChildren,
    /// Persistent references of a cell.
    CellPersistentChildren,
    /// Temporary references of a cell.
    CellTemporaryChildren,
    /// Visible-distant references of a cell.
    CellVisibleDistantChildren,
    /// Any other value, kept for byte-exact round trips.
    Other(u32),
}

impl GroupType {
    pub const fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::Top,
            1 => Self::WorldChildren,
            2 => Self::InteriorCellBlock,
            3 => Self::InteriorCellSubBlock,
            4 => Self::ExteriorCellBlock,
            5 => Self::ExteriorCellSubBlock,
            6 => Self::CellChildren,
            7 => Self::TopicChildren,
            8 => Self::CellPersistentChildren,
            9 => Self::CellTemporaryChildren,
            10 => Self::CellVisibleDistantChildren,
            other => Self::Other(other),
        }
    }

    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Top => 0,
            Self::WorldChildren => 1,
            Self::InteriorCellBlock => 2,
            Self::InteriorCellSubBlock => 3,
            Self::ExteriorCellBlock => 4,
            Self::ExteriorCellSubBlock => 5,
            Self::CellChildren => 6,
            Self::TopicChildren => 7,
            Self::CellPersistentChildren => 8,
            Self::CellTemporaryChildren => 9,
            Self::CellVisibleDistantChildren => 10,
            Self::Other(v) => v,
        }
    }

    /// Group kinds whose label names an owning record.
    ///
    /// Such a group directly following its owner is attached to it; anywhere
    /// else it is hosted by a dummy record.
    pub const fn is_children(self) -> bool {
        matches!(
            self,
            Self::WorldChildren
                | Self::CellChildren
                | Self::TopicChildren
                | Self::CellPersistentChildren
                | Self::CellTemporaryChildren
                | Self::CellVisibleDistantChildren
        )
    }

    /// Groups holding non-persistent placed references of a cell.
    pub const fn is_transient_cell_children(self) -> bool {
        matches!(
            self,
            Self::CellTemporaryChildren | Self::CellVisibleDistantChildren
        )
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Top => "Top",
            Self::WorldChildren => "WorldChildren",
            Self::InteriorCellBlock => "InteriorBlock",
            Self::InteriorCellSubBlock => "InteriorSubBlock",
            Self::ExteriorCellBlock => "ExteriorBlock",
            Self::ExteriorCellSubBlock => "ExteriorSubBlock",
            Self::CellChildren => "CellChildren",
            Self::TopicChildren => "TopicChildren",
            Self::CellPersistentChildren => "Persistent",
            Self::CellTemporaryChildren => "Temporary",
            Self::CellVisibleDistantChildren => "VisibleDistant",
            Self::Other(v) => return write!(f, "Group{}", v),
        };
        f.write_str(name)
    }
}

/// Unpack an exterior block label into `(x, y)` grid coordinates.
pub fn grid_label(label: u32) -> (i16, i16) {
    let y = (label & 0xFFFF) as u16 as i16;
    let x = (label >> 16) as u16 as i16;
    (x, y)
}

/// Render a group label according to its group type.
pub fn describe_label(group_type: GroupType, label: u32) -> String {
    match group_type {
        GroupType::Top => Tag::from_raw(label).to_string(),
        GroupType::ExteriorCellBlock | GroupType::ExteriorCellSubBlock => {
            let (x, y) = grid_label(label);
            format!("{},{}", x, y)
        }
        GroupType::InteriorCellBlock | GroupType::InteriorCellSubBlock => label.to_string(),
        _ => format!("{:08X}", label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(std::mem::size_of::<RecordHeader>(), HEADER_SIZE);
        assert_eq!(std::mem::size_of::<GroupHeader>(), HEADER_SIZE);
    }

    #[test]
    fn test_group_type_raw_roundtrip() {
        for raw in 0..14 {
            assert_eq!(GroupType::from_raw(raw).as_u32(), raw);
        }
        assert!(GroupType::CellTemporaryChildren < GroupType::CellVisibleDistantChildren);
    }

    #[test]
    fn test_grid_label() {
        let label = ((-3i16 as u16 as u32) << 16) | (7u16 as u32);
        assert_eq!(grid_label(label), (-3, 7));
        assert_eq!(describe_label(GroupType::ExteriorCellBlock, label), "-3,7");
    }
}
