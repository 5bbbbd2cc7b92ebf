//! Generic reader and writer for the tagged-block container every Nitro file is built from.
//!
//! # Header
//!
//! ```plain
//! .- header (16 bytes) -------------------------------------------------------.
//! | 0x00 | magic[4]                                                           |
//! | 0x04 | u16le byte order mark, 0xFEFF                                      |
//! | 0x06 | u16le version, major in the high byte                              |
//! | 0x08 | u32le total file size                                              |
//! | 0x0C | u16le block table offset (= header length)                         |
//! | 0x0E | u16le block count                                                  |
//! `---------------------------------------------------------------------------`
//! ```
//!
//! With [`BlockLayout::OffsetTable`] the block table holds one u32le absolute offset per block,
//! otherwise blocks follow back-to-back from the block table offset.
//!
//! # Blocks
//!
//! ```plain
//! .- block ------------------------------------------------------------------.
//! | 0x00 | tag[4]                                                             |
//! | 0x04 | u32le block size, including these 8 bytes                          |
//! | 0x08 | payload[size - 8]                                                  |
//! `---------------------------------------------------------------------------`
//! ```
//!
//! Tags (and the magic) are stored reversed, except when their last character is `'0'`.

use crate::tiles::MapError;
use core::fmt;
use snafu::Snafu;

pub mod blocks;
mod decode;
mod encode;

pub use blocks::{Block, BlockKind};

/// Length of the header, and the block table offset this crate writes.
pub const HEADER_LEN: u16 = 0x10;
/// The only byte order mark files are written with.
pub const BYTE_ORDER_MARK: u16 = 0xFEFF;
/// Size of a block's tag and size fields.
pub const BLOCK_HEADER_LEN: usize = 8;
/// How far the declared file size may exceed the data before the file counts as truncated.
pub const SIZE_SLACK: usize = 16;

/// A four-character block or file identifier, in reading order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(name: &[u8; 4]) -> Self {
        Self(*name)
    }

    /// Whether the tag is stored in reading order rather than reversed.
    pub const fn stored_forward(self) -> bool {
        self.0[3] == b'0'
    }

    /// The bytes as they appear in a file.
    pub const fn to_bytes(self) -> [u8; 4] {
        let [a, b, c, d] = self.0;
        if self.stored_forward() {
            [a, b, c, d]
        } else {
            [d, c, b, a]
        }
    }

    /// Recovers a tag from the bytes found in a file.
    pub const fn from_bytes(raw: [u8; 4]) -> Self {
        let [a, b, c, d] = raw;
        if d == b'0' {
            Self([a, b, c, d])
        } else {
            Self([d, c, b, a])
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(\"{self}\")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub const fn from_u16(raw: u16) -> Self {
        let [minor, major] = raw.to_le_bytes();
        Self { major, minor }
    }

    pub const fn to_u16(self) -> u16 {
        u16::from_le_bytes([self.minor, self.major])
    }
}

/// How blocks are located after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockLayout {
    #[default]
    Sequential,
    OffsetTable,
}

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum ContainerError {
    #[snafu(display("expected a {expected} file, found magic {found}"))]
    InvalidMagic { expected: Tag, found: Tag },
    #[snafu(display("invalid byte order mark {bom:#06x}"))]
    ByteOrder { bom: u16 },
    #[snafu(display("unexpected end of data while reading the {what}"))]
    Truncated { what: &'static str },
    #[snafu(display("invalid header field {field}: {value}"))]
    InvalidHeader { field: &'static str, value: u32 },
    #[snafu(display("unknown block {tag}"))]
    UnknownBlock { tag: Tag },
    #[snafu(display("malformed {tag} block: {reason}"))]
    MalformedBlock { tag: Tag, reason: String },
    #[snafu(display("missing {tag} block"))]
    MissingBlock { tag: Tag },
    #[snafu(display("{what} ({value}) does not fit its field"))]
    Capacity { what: &'static str, value: usize },
    #[snafu(display("invalid map entry"))]
    MapEntry { source: MapError },
    WriteIo { source: std::io::Error },
}

/// Recoverable oddities found while reading a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadWarning {
    /// The byte order mark was zero instead of `0xFEFF`.
    ZeroByteOrderMark,
    /// The declared file size differs from the data length, usually from trailing padding.
    SizeMismatch { declared: usize, actual: usize },
}

impl fmt::Display for ReadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadWarning::ZeroByteOrderMark => write!(f, "byte order mark is zero"),
            ReadWarning::SizeMismatch { declared, actual } => write!(
                f,
                "declared size {declared} differs from the actual size {actual}"
            ),
        }
    }
}

/// A decoded container: its identity plus an ordered list of blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    magic: Tag,
    version: Version,
    layout: BlockLayout,
    blocks: Vec<Block>,
}

impl Container {
    pub fn new(magic: Tag, version: Version, layout: BlockLayout) -> Self {
        Self {
            magic,
            version,
            layout,
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, block: impl Into<Block>) -> Self {
        self.blocks.push(block.into());
        self
    }

    pub fn magic(&self) -> Tag {
        self.magic
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The first block of type `T`.
    pub fn block<T: BlockKind>(&self) -> Option<&T> {
        self.blocks_of::<T>().next()
    }

    /// Every block of type `T`, in file order.
    pub fn blocks_of<'a, T: BlockKind + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        self.blocks.iter().filter_map(T::from_block)
    }

    pub fn require<T: BlockKind>(&self) -> Result<&T, ContainerError> {
        self.block::<T>()
            .ok_or(ContainerError::MissingBlock { tag: T::TAG })
    }

    /// Replaces the first block of type `T`, or appends it if there is none.
    pub fn set_block<T: BlockKind>(&mut self, block: T) {
        let block = block.into();
        match self.blocks.iter().position(|b| T::from_block(b).is_some()) {
            Some(i) => self.blocks[i] = block,
            None => self.blocks.push(block),
        }
    }

    /// Removes every block of type `T`.
    pub fn remove_blocks<T: BlockKind>(&mut self) {
        self.blocks.retain(|b| T::from_block(b).is_none());
    }

    /// Fails with [`ContainerError::InvalidMagic`] unless the container is a `expected` file.
    pub fn expect_magic(&self, expected: Tag) -> Result<(), ContainerError> {
        if self.magic == expected {
            Ok(())
        } else {
            Err(ContainerError::InvalidMagic {
                expected,
                found: self.magic,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_reversed_unless_they_end_in_zero() {
        assert_eq!(Tag::new(b"NCLR").to_bytes(), *b"RLCN");
        assert_eq!(Tag::new(b"BTX0").to_bytes(), *b"BTX0");
        assert_eq!(Tag::from_bytes(*b"TTLP"), Tag::new(b"PLTT"));
        assert_eq!(Tag::from_bytes(*b"BTX0"), Tag::new(b"BTX0"));
    }

    #[test]
    fn version_bytes() {
        let version = Version::new(1, 1);
        assert_eq!(version.to_u16(), 0x0101);
        assert_eq!(Version::from_u16(0x0100), Version::new(1, 0));
    }
}
