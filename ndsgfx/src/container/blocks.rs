//! The closed set of blocks a container may hold.
//!
//! Every payload layout below starts right after the block's tag and size fields, and offsets
//! inside a payload are relative to its first byte.

use super::{container_error, ContainerError, Tag};
use crate::{
    color::ColorFormat,
    encoding::PixelEncoding,
    tiles::{BgMode, MapEntries, MapInfo, PaletteMode},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use snafu::{ensure, ResultExt};
use std::io::{self, Cursor};

/// A block type that can live inside a [`Container`](super::Container).
pub trait BlockKind: Sized + Into<Block> {
    const TAG: Tag;

    fn decode(payload: &[u8]) -> Result<Self, ContainerError>;
    fn encode(&self, w: &mut Vec<u8>) -> Result<(), ContainerError>;
    fn from_block(block: &Block) -> Option<&Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Palette(PaletteBlock),
    PaletteMap(PaletteMapBlock),
    Character(CharacterBlock),
    Screen(ScreenBlock),
}

macro_rules! block_kinds {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        impl Block {
            pub fn tag(&self) -> Tag {
                match self {
                    $(Block::$variant(_) => <$ty as BlockKind>::TAG,)*
                }
            }

            /// Decodes a payload, choosing the block type by its tag.
            pub fn decode(tag: Tag, payload: &[u8]) -> Result<Self, ContainerError> {
                $(
                    if tag == <$ty as BlockKind>::TAG {
                        return <$ty as BlockKind>::decode(payload).map(Block::$variant);
                    }
                )*
                container_error::UnknownBlockSnafu { tag }.fail()
            }

            pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), ContainerError> {
                match self {
                    $(Block::$variant(block) => block.encode(w),)*
                }
            }
        }

        $(
            impl From<$ty> for Block {
                fn from(block: $ty) -> Self {
                    Block::$variant(block)
                }
            }
        )*
    };
}

block_kinds! {
    Palette => PaletteBlock,
    PaletteMap => PaletteMapBlock,
    Character => CharacterBlock,
    Screen => ScreenBlock,
}

fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> ContainerError {
    move |_| ContainerError::Truncated { what }
}

fn malformed(tag: Tag, reason: impl Into<String>) -> ContainerError {
    ContainerError::MalformedBlock {
        tag,
        reason: reason.into(),
    }
}

/// Returns `len` bytes at `offset` of `payload`.
fn data_at<'a>(
    payload: &'a [u8],
    offset: u32,
    len: u32,
    what: &'static str,
) -> Result<&'a [u8], ContainerError> {
    let start = offset as usize;
    let end = start.checked_add(len as usize);
    match end {
        Some(end) if end <= payload.len() => Ok(&payload[start..end]),
        _ => container_error::TruncatedSnafu { what }.fail(),
    }
}

fn fit_u32(what: &'static str, value: usize) -> Result<u32, ContainerError> {
    u32::try_from(value).map_err(|_| ContainerError::Capacity { what, value })
}

fn fit_u16(what: &'static str, value: usize) -> Result<u16, ContainerError> {
    u16::try_from(value).map_err(|_| ContainerError::Capacity { what, value })
}

/// Palette colors.
///
/// ```plain
/// 0x00  u32le color format code (3 = 16 colors, 4 = 256 colors)
/// 0x04  u32le extended palette flag
/// 0x08  u32le color data size in bytes
/// 0x0C  u32le color data offset (0x10)
/// 0x10  BGR555 u16le colors
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteBlock {
    pub format: ColorFormat,
    pub extended: bool,
    /// Raw BGR555 colors, bit 15 kept as found.
    pub colors: Vec<u16>,
}

impl PaletteBlock {
    const DATA_OFFSET: u32 = 0x10;
}

impl BlockKind for PaletteBlock {
    const TAG: Tag = Tag::new(b"PLTT");

    fn decode(payload: &[u8]) -> Result<Self, ContainerError> {
        let mut r = Cursor::new(payload);
        let what = "palette block";

        let code = r.read_u32::<LittleEndian>().map_err(truncated(what))?;
        let format = ColorFormat::from_code(code)
            .ok_or_else(|| malformed(Self::TAG, format!("unknown color format {code}")))?;
        let extended = r.read_u32::<LittleEndian>().map_err(truncated(what))? != 0;
        let size = r.read_u32::<LittleEndian>().map_err(truncated(what))?;
        let offset = r.read_u32::<LittleEndian>().map_err(truncated(what))?;

        ensure!(
            size % 2 == 0,
            container_error::MalformedBlockSnafu {
                tag: Self::TAG,
                reason: format!("odd color data size {size}"),
            }
        );

        let data = data_at(payload, offset, size, "palette colors")?;
        let colors = data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        Ok(Self {
            format,
            extended,
            colors,
        })
    }

    fn encode(&self, w: &mut Vec<u8>) -> Result<(), ContainerError> {
        let size = fit_u32("palette data size", self.colors.len() * 2)?;

        w.write_u32::<LittleEndian>(self.format.code())
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(u32::from(self.extended))
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(size)
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(Self::DATA_OFFSET)
            .context(container_error::WriteIoSnafu)?;
        for &color in &self.colors {
            w.write_u16::<LittleEndian>(color)
                .context(container_error::WriteIoSnafu)?;
        }

        Ok(())
    }

    fn from_block(block: &Block) -> Option<&Self> {
        match block {
            Block::Palette(b) => Some(b),
            _ => None,
        }
    }
}

/// Maps logical palette slots to the physical palettes stored in the palette block.
///
/// ```plain
/// 0x00  u16le slot count
/// 0x02  u16le reserved (0xBEEF)
/// 0x04  u32le slot table offset (0x08)
/// 0x08  u16le physical palette per slot
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteMapBlock {
    pub reserved: u16,
    pub slots: Vec<u16>,
}

impl PaletteMapBlock {
    pub const RESERVED: u16 = 0xBEEF;
    const DATA_OFFSET: u32 = 0x08;

    /// Identity mapping for `count` palettes.
    pub fn identity(count: u16) -> Self {
        Self {
            reserved: Self::RESERVED,
            slots: (0..count).collect(),
        }
    }
}

impl BlockKind for PaletteMapBlock {
    const TAG: Tag = Tag::new(b"PCMP");

    fn decode(payload: &[u8]) -> Result<Self, ContainerError> {
        let mut r = Cursor::new(payload);
        let what = "palette map block";

        let count = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let reserved = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let offset = r.read_u32::<LittleEndian>().map_err(truncated(what))?;

        let data = data_at(payload, offset, u32::from(count) * 2, "palette slots")?;
        let slots = data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        Ok(Self { reserved, slots })
    }

    fn encode(&self, w: &mut Vec<u8>) -> Result<(), ContainerError> {
        let count = fit_u16("palette slot count", self.slots.len())?;

        w.write_u16::<LittleEndian>(count)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(self.reserved)
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(Self::DATA_OFFSET)
            .context(container_error::WriteIoSnafu)?;
        for &slot in &self.slots {
            w.write_u16::<LittleEndian>(slot)
                .context(container_error::WriteIoSnafu)?;
        }

        Ok(())
    }

    fn from_block(block: &Block) -> Option<&Self> {
        match block {
            Block::PaletteMap(b) => Some(b),
            _ => None,
        }
    }
}

/// Packed pixel data of a tileset, always in 8x8 tiles.
///
/// ```plain
/// 0x00  u16le height in tiles
/// 0x02  u16le width in tiles
/// 0x04  u32le color format code
/// 0x08  u32le VRAM mapping, opaque
/// 0x0C  u32le pixel encoding (0 = horizontal tiles, 1 = lineal, 2 = vertical tiles)
/// 0x10  u32le pixel data size in bytes
/// 0x14  u32le pixel data offset (0x18)
/// 0x18  pixel data, sub-byte pixels LSB first
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterBlock {
    pub width_tiles: u16,
    pub height_tiles: u16,
    pub format: ColorFormat,
    pub mapping: u32,
    pub encoding: PixelEncoding,
    pub data: Vec<u8>,
}

impl CharacterBlock {
    const DATA_OFFSET: u32 = 0x18;
}

impl BlockKind for CharacterBlock {
    const TAG: Tag = Tag::new(b"CHAR");

    fn decode(payload: &[u8]) -> Result<Self, ContainerError> {
        let mut r = Cursor::new(payload);
        let what = "character block";

        let height_tiles = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let width_tiles = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let code = r.read_u32::<LittleEndian>().map_err(truncated(what))?;
        let format = ColorFormat::from_code(code)
            .ok_or_else(|| malformed(Self::TAG, format!("unknown color format {code}")))?;
        let mapping = r.read_u32::<LittleEndian>().map_err(truncated(what))?;
        let encoding_code = r.read_u32::<LittleEndian>().map_err(truncated(what))?;
        let encoding = PixelEncoding::from_code(encoding_code).ok_or_else(|| {
            malformed(Self::TAG, format!("unknown pixel encoding {encoding_code}"))
        })?;
        let size = r.read_u32::<LittleEndian>().map_err(truncated(what))?;
        let offset = r.read_u32::<LittleEndian>().map_err(truncated(what))?;

        let data = data_at(payload, offset, size, "pixel data")?.to_vec();

        Ok(Self {
            width_tiles,
            height_tiles,
            format,
            mapping,
            encoding,
            data,
        })
    }

    fn encode(&self, w: &mut Vec<u8>) -> Result<(), ContainerError> {
        let size = fit_u32("pixel data size", self.data.len())?;

        w.write_u16::<LittleEndian>(self.height_tiles)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(self.width_tiles)
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(self.format.code())
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(self.mapping)
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(self.encoding.code())
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(size)
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(Self::DATA_OFFSET)
            .context(container_error::WriteIoSnafu)?;
        w.extend_from_slice(&self.data);

        Ok(())
    }

    fn from_block(block: &Block) -> Option<&Self> {
        match block {
            Block::Character(b) => Some(b),
            _ => None,
        }
    }
}

/// A tile map.
///
/// ```plain
/// 0x00  u16le width in pixels
/// 0x02  u16le height in pixels
/// 0x04  u16le palette mode
/// 0x06  u16le background mode
/// 0x08  u32le map data size in bytes
/// 0x0C  map entries: u16le each for text and extended backgrounds, u8 each for affine ones
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBlock {
    pub width: u16,
    pub height: u16,
    pub palette_mode: PaletteMode,
    pub bg_mode: BgMode,
    pub entries: MapEntries,
}

impl BlockKind for ScreenBlock {
    const TAG: Tag = Tag::new(b"SCRN");

    fn decode(payload: &[u8]) -> Result<Self, ContainerError> {
        let mut r = Cursor::new(payload);
        let what = "screen block";

        let width = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let height = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let palette_code = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let palette_mode = PaletteMode::from_code(palette_code)
            .ok_or_else(|| malformed(Self::TAG, format!("unknown palette mode {palette_code}")))?;
        let bg_code = r.read_u16::<LittleEndian>().map_err(truncated(what))?;
        let bg_mode = BgMode::from_code(bg_code)
            .ok_or_else(|| malformed(Self::TAG, format!("unknown background mode {bg_code}")))?;
        let size = r.read_u32::<LittleEndian>().map_err(truncated(what))?;

        let data = data_at(payload, r.position() as u32, size, "map entries")?;
        let entries = match bg_mode {
            BgMode::Affine => MapEntries::Affine(data.to_vec()),
            BgMode::Text | BgMode::Extended => {
                ensure!(
                    size % 2 == 0,
                    container_error::MalformedBlockSnafu {
                        tag: Self::TAG,
                        reason: format!("odd map data size {size}"),
                    }
                );
                MapEntries::Regular(
                    data.chunks_exact(2)
                        .map(|c| MapInfo::unpack(u16::from_le_bytes([c[0], c[1]])))
                        .collect(),
                )
            }
        };

        Ok(Self {
            width,
            height,
            palette_mode,
            bg_mode,
            entries,
        })
    }

    fn encode(&self, w: &mut Vec<u8>) -> Result<(), ContainerError> {
        let packed = self
            .entries
            .to_bytes(self.bg_mode)
            .context(container_error::MapEntrySnafu)?;
        let size = fit_u32("map data size", packed.len())?;

        w.write_u16::<LittleEndian>(self.width)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(self.height)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(self.palette_mode.code())
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(self.bg_mode.code())
            .context(container_error::WriteIoSnafu)?;
        w.write_u32::<LittleEndian>(size)
            .context(container_error::WriteIoSnafu)?;
        w.extend_from_slice(&packed);

        Ok(())
    }

    fn from_block(block: &Block) -> Option<&Self> {
        match block {
            Block::Screen(b) => Some(b),
            _ => None,
        }
    }
}
