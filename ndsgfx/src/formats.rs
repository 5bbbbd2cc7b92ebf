//! The three sibling files a background is stored as: palette (`NCLR`), tileset (`NCGR`) and
//! map (`NSCR`).
//!
//! Each wrapper owns one [`Container`] and only hands out owned copies of what it holds.

use crate::{
    bits::{read_bits, write_bits, BitFieldError},
    color::{Color, ColorFormat, ColorFormatError},
    container::{
        blocks::{CharacterBlock, PaletteBlock, PaletteMapBlock, ScreenBlock},
        BlockKind, BlockLayout, Container, ContainerError, ReadWarning, Tag, Version,
    },
    encoding::{EncodingError, PixelEncoding},
    pixel::{Palette, Pixel, TileSize},
    tiles::{ensure_whole_tiles, BgMode, MapEntries, MapError, MapInfo, PaletteMode, TileSet},
};
use snafu::{ensure, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum FormatError {
    #[snafu(display("invalid container"))]
    Container { source: ContainerError },
    #[snafu(display("pixels can't be rearranged"))]
    Encoding { source: EncodingError },
    #[snafu(display("invalid map"))]
    Map { source: MapError },
    #[snafu(display("pixel {index} can't be stored"))]
    Pixel {
        index: usize,
        source: ColorFormatError,
    },
    Bits { source: BitFieldError },
    #[snafu(display("{what} {value} exceeds the maximum of {max}"))]
    Capacity {
        what: &'static str,
        value: usize,
        max: usize,
    },
    #[snafu(display("{format:?} is not a palette format"))]
    DirectFormat { format: ColorFormat },
    #[snafu(display("tiles must be 8x8, not {}x{}", size.width, size.height))]
    TileSize { size: TileSize },
    #[snafu(display("a {width}x{height} map needs {expected} entries, got {actual}"))]
    EntryCount {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
}

fn fit_u16(what: &'static str, value: usize) -> Result<u16, FormatError> {
    u16::try_from(value).map_err(|_| FormatError::Capacity {
        what,
        value,
        max: usize::from(u16::MAX),
    })
}

fn read_container(data: &[u8], magic: Tag) -> Result<(Container, Vec<ReadWarning>), FormatError> {
    let (container, warnings) = Container::read_with_warnings(data, BlockLayout::Sequential)
        .context(format_error::ContainerSnafu)?;
    container
        .expect_magic(magic)
        .context(format_error::ContainerSnafu)?;
    Ok((container, warnings))
}

fn require<T: BlockKind>(container: &Container) -> Result<&T, FormatError> {
    container.require::<T>().context(format_error::ContainerSnafu)
}

/// Packs pixels back to back, `format.bits_per_pixel()` bits each, LSB first.
fn pack_pixels(pixels: &[Pixel], format: ColorFormat) -> Result<Vec<u8>, FormatError> {
    let bpp = format.bits_per_pixel();
    let mut data = vec![0; (pixels.len() * usize::from(bpp) + 7) / 8];
    for (index, &pixel) in pixels.iter().enumerate() {
        let raw = format
            .pack(pixel)
            .context(format_error::PixelSnafu { index })?;
        write_bits(&mut data, index * usize::from(bpp), bpp, raw)
            .context(format_error::BitsSnafu)?;
    }
    Ok(data)
}

/// Unpacks every whole pixel in `data`.
fn unpack_pixels(data: &[u8], format: ColorFormat) -> Result<Vec<Pixel>, FormatError> {
    let bpp = format.bits_per_pixel();
    let count = data.len() * 8 / usize::from(bpp);
    (0..count)
        .map(|i| {
            read_bits(data, i * usize::from(bpp), bpp)
                .map(|raw| format.unpack(raw))
                .context(format_error::BitsSnafu)
        })
        .collect()
}

/// A palette file.
#[derive(Debug, Clone, PartialEq)]
pub struct Nclr {
    container: Container,
}

impl Nclr {
    pub const MAGIC: Tag = Tag::new(b"NCLR");
    pub const VERSION: Version = Version::new(1, 0);

    /// Stores `palette` for tiles of `format`.
    ///
    /// Every sub-palette but the last is padded to `format.max_colors()` so the sub-palettes
    /// can be told apart again when reading.
    pub fn from_palette(palette: &Palette, format: ColorFormat) -> Result<Self, FormatError> {
        ensure!(
            format.is_indexed(),
            format_error::DirectFormatSnafu { format }
        );

        let per_palette = format.max_colors();
        let mut colors = Vec::with_capacity(palette.len() * per_palette);
        for (i, sub_palette) in palette.sub_palettes().iter().enumerate() {
            ensure!(
                sub_palette.len() <= per_palette,
                format_error::CapacitySnafu {
                    what: "sub-palette size",
                    value: sub_palette.len(),
                    max: per_palette,
                }
            );
            colors.extend(sub_palette.iter().map(|c| c.to_bgr555()));
            if i + 1 < palette.len() {
                colors.resize((i + 1) * per_palette, Color::BLACK.to_bgr555());
            }
        }

        let block = PaletteBlock {
            format,
            extended: format == ColorFormat::Indexed8 && palette.len() > 1,
            colors,
        };

        Ok(Self {
            container: Container::new(Self::MAGIC, Self::VERSION, BlockLayout::Sequential)
                .with_block(block),
        })
    }

    pub fn read(data: &[u8]) -> Result<Self, FormatError> {
        Self::read_with_warnings(data).map(|(nclr, _)| nclr)
    }

    pub fn read_with_warnings(data: &[u8]) -> Result<(Self, Vec<ReadWarning>), FormatError> {
        let (container, warnings) = read_container(data, Self::MAGIC)?;
        require::<PaletteBlock>(&container)?;
        Ok((Self { container }, warnings))
    }

    pub fn write(&self) -> Result<Vec<u8>, FormatError> {
        self.container.write().context(format_error::ContainerSnafu)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn format(&self) -> Result<ColorFormat, FormatError> {
        Ok(require::<PaletteBlock>(&self.container)?.format)
    }

    /// The colors, split into sub-palettes of `format().max_colors()` colors.
    pub fn palette(&self) -> Result<Palette, FormatError> {
        let block = require::<PaletteBlock>(&self.container)?;
        let colors: Vec<Color> = block.colors.iter().map(|&c| Color::from_bgr555(c)).collect();
        Ok(Palette::from_flat(&colors, block.format.max_colors()))
    }

    /// Physical palette of every logical slot, if the file maps them.
    pub fn palette_slots(&self) -> Option<Vec<u16>> {
        self.container
            .block::<PaletteMapBlock>()
            .map(|block| block.slots.clone())
    }

    pub fn set_palette_slots(&mut self, slots: Vec<u16>) {
        self.container.set_block(PaletteMapBlock {
            reserved: PaletteMapBlock::RESERVED,
            slots,
        });
    }

    pub fn clear_palette_slots(&mut self) {
        self.container.remove_blocks::<PaletteMapBlock>();
    }
}

/// A tileset file. Tiles are always 8x8.
#[derive(Debug, Clone, PartialEq)]
pub struct Ncgr {
    container: Container,
}

impl Ncgr {
    pub const MAGIC: Tag = Tag::new(b"NCGR");
    pub const VERSION: Version = Version::new(1, 1);
    /// Width of the tile grid [`from_tiles`](Self::from_tiles) lays tiles out in.
    pub const TILES_PER_ROW: usize = 32;

    /// Stores a row-major `width` x `height` image with the given pixel order.
    pub fn from_pixels(
        pixels: &[Pixel],
        width: usize,
        height: usize,
        format: ColorFormat,
        encoding: PixelEncoding,
    ) -> Result<Self, FormatError> {
        ensure_whole_tiles(width, height, TileSize::NDS).context(format_error::MapSnafu)?;
        let stored = encoding
            .encode(pixels, width, height, TileSize::NDS)
            .context(format_error::EncodingSnafu)?;

        let block = CharacterBlock {
            width_tiles: fit_u16("tileset width", width / TileSize::NDS.width)?,
            height_tiles: fit_u16("tileset height", height / TileSize::NDS.height)?,
            format,
            mapping: 0,
            encoding,
            data: pack_pixels(&stored, format)?,
        };
        Ok(Self::with_block(block))
    }

    /// Stores a tile set in horizontal tile order, [`TILES_PER_ROW`](Self::TILES_PER_ROW) tiles
    /// per row. Only the tiles themselves are written, so a short last row reads back as empty
    /// tiles in [`pixels`](Self::pixels) but not in [`tile_set`](Self::tile_set).
    pub fn from_tiles(tiles: &TileSet, format: ColorFormat) -> Result<Self, FormatError> {
        let size = tiles.tile_size();
        ensure!(size == TileSize::NDS, format_error::TileSizeSnafu { size });

        let count = tiles.len();
        let block = CharacterBlock {
            width_tiles: fit_u16("tileset width", count.min(Self::TILES_PER_ROW))?,
            height_tiles: fit_u16(
                "tileset height",
                (count + Self::TILES_PER_ROW - 1) / Self::TILES_PER_ROW,
            )?,
            format,
            mapping: 0,
            encoding: PixelEncoding::HorizontalTiles,
            data: pack_pixels(&tiles.to_pixels(), format)?,
        };
        Ok(Self::with_block(block))
    }

    fn with_block(block: CharacterBlock) -> Self {
        Self {
            container: Container::new(Self::MAGIC, Self::VERSION, BlockLayout::Sequential)
                .with_block(block),
        }
    }

    pub fn read(data: &[u8]) -> Result<Self, FormatError> {
        Self::read_with_warnings(data).map(|(ncgr, _)| ncgr)
    }

    pub fn read_with_warnings(data: &[u8]) -> Result<(Self, Vec<ReadWarning>), FormatError> {
        let (container, warnings) = read_container(data, Self::MAGIC)?;
        require::<CharacterBlock>(&container)?;
        Ok((Self { container }, warnings))
    }

    pub fn write(&self) -> Result<Vec<u8>, FormatError> {
        self.container.write().context(format_error::ContainerSnafu)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    fn block(&self) -> Result<&CharacterBlock, FormatError> {
        require::<CharacterBlock>(&self.container)
    }

    pub fn format(&self) -> Result<ColorFormat, FormatError> {
        Ok(self.block()?.format)
    }

    pub fn encoding(&self) -> Result<PixelEncoding, FormatError> {
        Ok(self.block()?.encoding)
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> Result<(usize, usize), FormatError> {
        let block = self.block()?;
        Ok((
            usize::from(block.width_tiles) * TileSize::NDS.width,
            usize::from(block.height_tiles) * TileSize::NDS.height,
        ))
    }

    /// The opaque VRAM mapping value, kept as read.
    pub fn mapping(&self) -> Result<u32, FormatError> {
        Ok(self.block()?.mapping)
    }

    pub fn set_mapping(&mut self, mapping: u32) -> Result<(), FormatError> {
        let mut block = self.block()?.clone();
        block.mapping = mapping;
        self.container.set_block(block);
        Ok(())
    }

    /// The whole tileset as a row-major image of [`dimensions`](Self::dimensions).
    pub fn pixels(&self) -> Result<Vec<Pixel>, FormatError> {
        let block = self.block()?;
        let (width, height) = self.dimensions()?;
        let stored = unpack_pixels(&block.data, block.format)?;
        block
            .encoding
            .decode(&stored, width, height, TileSize::NDS)
            .context(format_error::EncodingSnafu)
    }

    /// The stored tiles, in index order.
    pub fn tile_set(&self) -> Result<TileSet, FormatError> {
        let block = self.block()?;
        let stored = unpack_pixels(&block.data, block.format)?;

        let tiled = match block.encoding {
            PixelEncoding::HorizontalTiles => stored,
            encoding => {
                let (width, height) = self.dimensions()?;
                let lineal = encoding
                    .decode(&stored, width, height, TileSize::NDS)
                    .context(format_error::EncodingSnafu)?;
                PixelEncoding::HorizontalTiles
                    .encode(&lineal, width, height, TileSize::NDS)
                    .context(format_error::EncodingSnafu)?
            }
        };

        Ok(TileSet::from_tiled_pixels(&tiled, TileSize::NDS))
    }
}

/// A map file.
#[derive(Debug, Clone, PartialEq)]
pub struct Nscr {
    container: Container,
}

impl Nscr {
    pub const MAGIC: Tag = Tag::new(b"NSCR");
    pub const VERSION: Version = Version::new(1, 0);

    /// Stores one entry per 8x8 cell of a `width` x `height` background, in raster order.
    pub fn from_map(
        entries: &[MapInfo],
        width: usize,
        height: usize,
        bg_mode: BgMode,
        palette_mode: PaletteMode,
    ) -> Result<Self, FormatError> {
        ensure_whole_tiles(width, height, TileSize::NDS).context(format_error::MapSnafu)?;
        let expected = (width / TileSize::NDS.width) * (height / TileSize::NDS.height);
        ensure!(
            entries.len() == expected,
            format_error::EntryCountSnafu {
                width,
                height,
                expected,
                actual: entries.len()
            }
        );

        let entries = MapEntries::from_infos(entries, bg_mode).context(format_error::MapSnafu)?;
        // fail on unpackable entries now rather than on write
        entries.to_bytes(bg_mode).context(format_error::MapSnafu)?;

        let block = ScreenBlock {
            width: fit_u16("map width", width)?,
            height: fit_u16("map height", height)?,
            palette_mode,
            bg_mode,
            entries,
        };

        Ok(Self {
            container: Container::new(Self::MAGIC, Self::VERSION, BlockLayout::Sequential)
                .with_block(block),
        })
    }

    pub fn read(data: &[u8]) -> Result<Self, FormatError> {
        Self::read_with_warnings(data).map(|(nscr, _)| nscr)
    }

    pub fn read_with_warnings(data: &[u8]) -> Result<(Self, Vec<ReadWarning>), FormatError> {
        let (container, warnings) = read_container(data, Self::MAGIC)?;
        require::<ScreenBlock>(&container)?;
        Ok((Self { container }, warnings))
    }

    pub fn write(&self) -> Result<Vec<u8>, FormatError> {
        self.container.write().context(format_error::ContainerSnafu)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    fn block(&self) -> Result<&ScreenBlock, FormatError> {
        require::<ScreenBlock>(&self.container)
    }

    /// Width and height in pixels.
    pub fn dimensions(&self) -> Result<(usize, usize), FormatError> {
        let block = self.block()?;
        Ok((usize::from(block.width), usize::from(block.height)))
    }

    pub fn bg_mode(&self) -> Result<BgMode, FormatError> {
        Ok(self.block()?.bg_mode)
    }

    pub fn palette_mode(&self) -> Result<PaletteMode, FormatError> {
        Ok(self.block()?.palette_mode)
    }

    /// The entries as stored.
    pub fn entries(&self) -> Result<MapEntries, FormatError> {
        Ok(self.block()?.entries.clone())
    }

    /// The entries, affine ones widened to [`MapInfo`].
    pub fn map(&self) -> Result<Vec<MapInfo>, FormatError> {
        Ok(self.block()?.entries.to_infos())
    }
}
