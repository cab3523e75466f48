//! Fixed-size archive structures.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Archive magic.
pub const MAGIC: [u8; 4] = *b"BSA\0";

/// Size of [`BsaHeader`].
pub const HEADER_SIZE: usize = 36;

/// Versions this reader accepts.
pub const SUPPORTED_VERSIONS: [u32; 2] = [103, 104];

/// Size bit that flips a file's compression relative to the archive default.
pub const COMPRESSION_TOGGLE: u32 = 0x4000_0000;

/// Bits of a file size that are flags rather than length.
pub const SIZE_FLAGS: u32 = 0xC000_0000;

/// Archive flag bits.
pub mod archive_flags {
    /// Folder names are stored.
    pub const DIRECTORY_NAMES: u32 = 0x0001;
    /// File names are stored.
    pub const FILE_NAMES: u32 = 0x0002;
    /// Files are compressed unless toggled.
    pub const COMPRESSED: u32 = 0x0004;
    /// Console archive with big-endian hashes.
    pub const XBOX: u32 = 0x0040;
    /// Each file's data is preceded by its full path.
    pub const EMBEDDED_NAMES: u32 = 0x0100;
}

/// Archive header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct BsaHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// Offset of the folder records, normally [`HEADER_SIZE`]
    pub folder_offset: u32,
    pub archive_flags: u32,
    pub folder_count: u32,
    pub file_count: u32,
    pub total_folder_name_length: u32,
    pub total_file_name_length: u32,
    /// Content type bits, not interpreted
    pub file_flags: u32,
}

/// Folder record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct FolderRecord {
    pub hash: u64,
    pub file_count: u32,
    /// Offset of this folder's name and file records, plus the name table length
    pub offset: u32,
}

/// File record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct FileRecord {
    pub hash: u64,
    /// Data length; the top two bits are flags
    pub size: u32,
    /// Absolute offset of the data
    pub offset: u32,
}

impl FolderRecord {
    pub const SIZE: usize = 16;
}

impl FileRecord {
    pub const SIZE: usize = 16;

    #[inline]
    pub fn data_size(&self) -> u32 {
        self.size & !SIZE_FLAGS
    }

    #[inline]
    pub fn toggles_compression(&self) -> bool {
        self.size & COMPRESSION_TOGGLE != 0
    }
}
