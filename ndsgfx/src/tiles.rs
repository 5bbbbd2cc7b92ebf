//! Splitting indexed images into deduplicated tiles plus a map referencing them, and back.
//!
//! # Map entries
//!
//! Text and extended backgrounds use 16-bit entries:
//!
//! ```plain
//! .- map entry -------------------------------------------.
//! | 15 14 13 12 | 11 | 10 |  9  8  7  6  5  4  3  2  1  0 |
//! |-------------+----+----+--------------------------------|
//! |   palette   | fy | fx |           tile index           |
//! `--------------------------------------------------------`
//! ```
//!
//! Affine backgrounds use one byte per entry holding only the tile index.

use crate::{
    bits::{get_field, set_field},
    color::ColorFormat,
    encoding::{EncodingError, PixelEncoding},
    pixel::{Pixel, TileSize},
};
use snafu::{ensure, ResultExt, Snafu};
use std::collections::HashMap;

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum MapError {
    #[snafu(display("tile {tile} is not in the reference tile set under any flip"))]
    TileNotFound { tile: usize },
    #[snafu(display("map entry {entry} references tile {index}, but there are only {count}"))]
    TileOutOfRange {
        entry: usize,
        index: u32,
        count: usize,
    },
    #[snafu(display("{what} {value} exceeds the maximum of {max}"))]
    Capacity {
        what: &'static str,
        value: usize,
        max: usize,
    },
    #[snafu(display("{bg_mode:?} backgrounds can't store these map entries"))]
    Unsupported { bg_mode: BgMode },
    #[snafu(display("expected {expected} tile palettes, got {actual}"))]
    TilePaletteCount { expected: usize, actual: usize },
    #[snafu(display("image doesn't split into whole tiles"))]
    Encoding { source: EncodingError },
}

/// Background type, which decides the map entry layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BgMode {
    #[default]
    Text,
    /// 8-bit entries with only a tile index.
    ///
    /// This layout has not been checked against hardware captures yet.
    Affine,
    Extended,
}

impl BgMode {
    pub const fn code(self) -> u16 {
        match self {
            BgMode::Text => 0,
            BgMode::Affine => 1,
            BgMode::Extended => 2,
        }
    }

    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(BgMode::Text),
            1 => Some(BgMode::Affine),
            2 => Some(BgMode::Extended),
            _ => None,
        }
    }

    /// Highest tile index a map entry can hold.
    pub const fn max_tile_index(self) -> u32 {
        match self {
            BgMode::Affine => 0xFF,
            BgMode::Text | BgMode::Extended => MapInfo::MAX_TILE_INDEX,
        }
    }
}

/// How many palettes of how many colors a map and tileset use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaletteMode {
    #[default]
    Colors16x16,
    Colors256x1,
    /// Extended palettes: 16 palettes of 256 colors.
    Colors256x16,
}

impl PaletteMode {
    pub const fn code(self) -> u16 {
        match self {
            PaletteMode::Colors16x16 => 0,
            PaletteMode::Colors256x1 => 1,
            PaletteMode::Colors256x16 => 2,
        }
    }

    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(PaletteMode::Colors16x16),
            1 => Some(PaletteMode::Colors256x1),
            2 => Some(PaletteMode::Colors256x16),
            _ => None,
        }
    }

    pub const fn colors_per_palette(self) -> usize {
        match self {
            PaletteMode::Colors16x16 => 16,
            PaletteMode::Colors256x1 | PaletteMode::Colors256x16 => 256,
        }
    }

    pub const fn palette_count(self) -> usize {
        match self {
            PaletteMode::Colors256x1 => 1,
            PaletteMode::Colors16x16 | PaletteMode::Colors256x16 => 16,
        }
    }

    /// Pixel format of tiles drawn with this palette mode.
    pub const fn color_format(self) -> ColorFormat {
        match self {
            PaletteMode::Colors16x16 => ColorFormat::Indexed4,
            PaletteMode::Colors256x1 | PaletteMode::Colors256x16 => ColorFormat::Indexed8,
        }
    }
}

/// One cell of a text or extended background map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MapInfo {
    pub tile_index: u32,
    pub palette_index: u8,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl MapInfo {
    pub const MAX_TILE_INDEX: u32 = 0x3FF;
    pub const MAX_PALETTE_INDEX: u8 = 0xF;

    pub const fn new(tile_index: u32) -> Self {
        Self {
            tile_index,
            palette_index: 0,
            flip_x: false,
            flip_y: false,
        }
    }

    pub fn pack(self) -> Result<u16, MapError> {
        ensure!(
            self.tile_index <= Self::MAX_TILE_INDEX,
            map_error::CapacitySnafu {
                what: "tile index",
                value: self.tile_index as usize,
                max: Self::MAX_TILE_INDEX as usize,
            }
        );
        ensure!(
            self.palette_index <= Self::MAX_PALETTE_INDEX,
            map_error::CapacitySnafu {
                what: "palette index",
                value: usize::from(self.palette_index),
                max: usize::from(Self::MAX_PALETTE_INDEX),
            }
        );

        let word = set_field(0, 0, 10, self.tile_index);
        let word = set_field(word, 10, 1, u32::from(self.flip_x));
        let word = set_field(word, 11, 1, u32::from(self.flip_y));
        let word = set_field(word, 12, 4, u32::from(self.palette_index));
        Ok(word as u16)
    }

    pub const fn unpack(raw: u16) -> Self {
        let word = raw as u32;
        Self {
            tile_index: get_field(word, 0, 10),
            flip_x: get_field(word, 10, 1) != 0,
            flip_y: get_field(word, 11, 1) != 0,
            palette_index: get_field(word, 12, 4) as u8,
        }
    }
}

/// The entries of a map, in the shape its background mode stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEntries {
    Regular(Vec<MapInfo>),
    /// Tile indices only.
    Affine(Vec<u8>),
}

impl MapEntries {
    /// Converts generic entries into the representation `bg_mode` stores.
    pub fn from_infos(infos: &[MapInfo], bg_mode: BgMode) -> Result<Self, MapError> {
        match bg_mode {
            BgMode::Text | BgMode::Extended => Ok(MapEntries::Regular(infos.to_vec())),
            BgMode::Affine => infos
                .iter()
                .map(|info| {
                    ensure!(
                        !info.flip_x && !info.flip_y && info.palette_index == 0,
                        map_error::UnsupportedSnafu { bg_mode }
                    );
                    u8::try_from(info.tile_index).map_err(|_| MapError::Capacity {
                        what: "tile index",
                        value: info.tile_index as usize,
                        max: 0xFF,
                    })
                })
                .collect::<Result<Vec<u8>, MapError>>()
                .map(MapEntries::Affine),
        }
    }

    pub fn to_infos(&self) -> Vec<MapInfo> {
        match self {
            MapEntries::Regular(infos) => infos.clone(),
            MapEntries::Affine(indices) => indices
                .iter()
                .map(|&index| MapInfo::new(u32::from(index)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MapEntries::Regular(infos) => infos.len(),
            MapEntries::Affine(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packs the entries the way a `bg_mode` map stores them.
    pub fn to_bytes(&self, bg_mode: BgMode) -> Result<Vec<u8>, MapError> {
        match (self, bg_mode) {
            (MapEntries::Regular(infos), BgMode::Text | BgMode::Extended) => {
                let mut out = Vec::with_capacity(infos.len() * 2);
                for info in infos {
                    out.extend_from_slice(&info.pack()?.to_le_bytes());
                }
                Ok(out)
            }
            (MapEntries::Affine(indices), BgMode::Affine) => Ok(indices.clone()),
            _ => map_error::UnsupportedSnafu { bg_mode }.fail(),
        }
    }
}

/// Mirrors a tile left to right.
pub fn flip_x(tile: &[Pixel], size: TileSize) -> Vec<Pixel> {
    tile.chunks(size.width)
        .flat_map(|row| row.iter().rev().copied())
        .collect()
}

/// Mirrors a tile top to bottom.
pub fn flip_y(tile: &[Pixel], size: TileSize) -> Vec<Pixel> {
    tile.chunks(size.width).rev().flatten().copied().collect()
}

pub fn flip(tile: &[Pixel], size: TileSize, x: bool, y: bool) -> Vec<Pixel> {
    match (x, y) {
        (false, false) => tile.to_vec(),
        (true, false) => flip_x(tile, size),
        (false, true) => flip_y(tile, size),
        (true, true) => flip_y(&flip_x(tile, size), size),
    }
}

/// Fails unless a `width` x `height` image splits into whole tiles.
pub fn ensure_whole_tiles(width: usize, height: usize, size: TileSize) -> Result<(), MapError> {
    let source = if size.width == 0 || size.height == 0 {
        EncodingError::EmptyTile
    } else if width % size.width != 0 {
        EncodingError::TileWidthMismatch {
            width,
            tile_width: size.width,
        }
    } else if height % size.height != 0 {
        EncodingError::TileHeightMismatch {
            height,
            tile_height: size.height,
        }
    } else {
        return Ok(());
    };

    Err(MapError::Encoding { source })
}

/// An ordered set of distinct tiles.
///
/// The first occurrence of a tile keeps its index; later duplicates are never stored.
#[derive(Debug, Clone, Default)]
pub struct TileSet {
    size: TileSize,
    tiles: Vec<Vec<Pixel>>,
    lookup: HashMap<Vec<Pixel>, usize>,
}

impl PartialEq for TileSet {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.tiles == other.tiles
    }
}

impl Eq for TileSet {}

impl TileSet {
    pub fn new(size: TileSize) -> Self {
        Self {
            size,
            tiles: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Splits a stream of whole tiles (horizontal tile order) into a tile set, keeping
    /// duplicates so indices match the stream.
    pub fn from_tiled_pixels(pixels: &[Pixel], size: TileSize) -> Self {
        let mut set = Self::new(size);
        for tile in pixels.chunks(size.area().max(1)) {
            let mut tile = tile.to_vec();
            tile.resize(size.area(), Pixel::default());
            set.insert(tile);
        }
        set
    }

    pub fn tile_size(&self) -> TileSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Vec<Pixel>] {
        &self.tiles
    }

    pub fn tile(&self, index: usize) -> Option<&[Pixel]> {
        self.tiles.get(index).map(Vec::as_slice)
    }

    /// Index of the first tile equal to `tile`.
    pub fn find(&self, tile: &[Pixel]) -> Option<usize> {
        self.lookup.get(tile).copied()
    }

    /// Looks `tile` up as is, then mirrored horizontally, vertically and both ways, returning
    /// the first match.
    pub fn find_symmetric(&self, tile: &[Pixel]) -> Option<MapInfo> {
        [(false, false), (true, false), (false, true), (true, true)]
            .into_iter()
            .find_map(|(x, y)| {
                let index = if !x && !y {
                    self.find(tile)
                } else {
                    self.find(&flip(tile, self.size, x, y))
                }?;
                Some(MapInfo {
                    tile_index: index as u32,
                    palette_index: 0,
                    flip_x: x,
                    flip_y: y,
                })
            })
    }

    /// Appends a tile unconditionally and returns its index.
    fn insert(&mut self, tile: Vec<Pixel>) -> usize {
        let index = self.tiles.len();
        self.lookup.entry(tile.clone()).or_insert(index);
        self.tiles.push(tile);
        index
    }

    /// All tiles back to back, in horizontal tile order.
    pub fn to_pixels(&self) -> Vec<Pixel> {
        self.tiles.iter().flatten().copied().collect()
    }
}

/// Builds map entries for images, either growing its tile set or matching against a fixed one.
#[derive(Debug, Clone)]
pub struct TileMapper {
    tiles: TileSet,
    match_only: bool,
    flips: bool,
}

impl TileMapper {
    /// A mapper that adds every new tile to its set.
    pub fn new(size: TileSize) -> Self {
        Self {
            tiles: TileSet::new(size),
            match_only: false,
            flips: true,
        }
    }

    /// A mapper that only references tiles of `reference`, failing on anything else.
    pub fn with_reference(reference: TileSet) -> Self {
        Self {
            tiles: reference,
            match_only: true,
            flips: true,
        }
    }

    /// Whether mirrored tiles may match. Affine maps have no flip bits.
    pub fn with_flips(mut self, flips: bool) -> Self {
        self.flips = flips;
        self
    }

    pub fn tile_set(&self) -> &TileSet {
        &self.tiles
    }

    pub fn into_tile_set(self) -> TileSet {
        self.tiles
    }

    /// Maps a row-major `width` x `height` image, tile by tile in raster order.
    pub fn map(
        &mut self,
        pixels: &[Pixel],
        width: usize,
        height: usize,
    ) -> Result<Vec<MapInfo>, MapError> {
        self.map_with_palettes(pixels, width, height, &[])
    }

    /// Like [`map`](Self::map), also recording a palette index per tile. An empty
    /// `tile_palettes` means palette 0 everywhere.
    pub fn map_with_palettes(
        &mut self,
        pixels: &[Pixel],
        width: usize,
        height: usize,
        tile_palettes: &[u8],
    ) -> Result<Vec<MapInfo>, MapError> {
        let size = self.tiles.size;
        ensure_whole_tiles(width, height, size)?;

        let tiled = PixelEncoding::HorizontalTiles
            .encode(pixels, width, height, size)
            .context(map_error::EncodingSnafu)?;
        let tile_count = tiled.len() / size.area();
        ensure!(
            tile_palettes.is_empty() || tile_palettes.len() == tile_count,
            map_error::TilePaletteCountSnafu {
                expected: tile_count,
                actual: tile_palettes.len()
            }
        );

        let mut entries = Vec::with_capacity(tile_count);
        for (i, tile) in tiled.chunks_exact(size.area()).enumerate() {
            let found = if self.flips {
                self.tiles.find_symmetric(tile)
            } else {
                self.tiles.find(tile).map(|index| MapInfo::new(index as u32))
            };
            let mut info = match found {
                Some(info) => info,
                None if self.match_only => return map_error::TileNotFoundSnafu { tile: i }.fail(),
                None => MapInfo::new(self.tiles.insert(tile.to_vec()) as u32),
            };
            info.palette_index = tile_palettes.get(i).copied().unwrap_or(0);
            entries.push(info);
        }

        log::debug!(
            "mapped {tile_count} tiles onto {} distinct tiles",
            self.tiles.len()
        );

        Ok(entries)
    }
}

/// Splits an image into a fresh tile set and its map.
pub fn map(
    pixels: &[Pixel],
    width: usize,
    height: usize,
    size: TileSize,
) -> Result<(TileSet, Vec<MapInfo>), MapError> {
    let mut mapper = TileMapper::new(size);
    let entries = mapper.map(pixels, width, height)?;
    Ok((mapper.into_tile_set(), entries))
}

/// Rebuilds the row-major image a map describes.
///
/// Each entry's palette index is folded into the pixels as
/// `index + palette_index * colors_per_palette`, so the result indexes a flat palette. Cells of
/// the image without an entry come out as `Pixel::default()`.
pub fn expand(
    tiles: &TileSet,
    entries: &[MapInfo],
    width: usize,
    height: usize,
    colors_per_palette: usize,
) -> Result<Vec<Pixel>, MapError> {
    let size = tiles.tile_size();

    let mut tiled = Vec::with_capacity(entries.len() * size.area());
    for (i, info) in entries.iter().enumerate() {
        let tile = tiles
            .tile(info.tile_index as usize)
            .ok_or(MapError::TileOutOfRange {
                entry: i,
                index: info.tile_index,
                count: tiles.len(),
            })?;
        let offset = u32::from(info.palette_index) * colors_per_palette as u32;
        tiled.extend(
            flip(tile, size, info.flip_x, info.flip_y)
                .into_iter()
                .map(|p| match p.index() {
                    Some(index) => p.with_index(index + offset),
                    None => p,
                }),
        );
    }

    PixelEncoding::HorizontalTiles
        .decode(&tiled, width, height, size)
        .context(map_error::EncodingSnafu)
}
