//! Remapping pixels between row-major and tiled addressing.

use crate::pixel::TileSize;
use itertools::iproduct;
use snafu::{ensure, Snafu};

/// How the pixels of an image are ordered in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelEncoding {
    /// Row-major over the whole image.
    Lineal,
    /// Tiles in row-major order across the tile grid, each tile row-major inside.
    #[default]
    HorizontalTiles,
    /// Tiles in column-major order across the tile grid, each tile row-major inside.
    VerticalTiles,
}

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum EncodingError {
    #[snafu(display("image width {width} is not a multiple of the tile width {tile_width}"))]
    TileWidthMismatch { width: usize, tile_width: usize },
    #[snafu(display("image height {height} is not a multiple of the tile height {tile_height}"))]
    TileHeightMismatch { height: usize, tile_height: usize },
    #[snafu(display("expected {expected} pixels, got {actual}"))]
    BufferSize { expected: usize, actual: usize },
    #[snafu(display("tile size must not be zero"))]
    EmptyTile,
}

impl PixelEncoding {
    pub const fn is_tiled(self) -> bool {
        !matches!(self, PixelEncoding::Lineal)
    }

    /// The value stored in a character block.
    pub const fn code(self) -> u32 {
        match self {
            PixelEncoding::HorizontalTiles => 0,
            PixelEncoding::Lineal => 1,
            PixelEncoding::VerticalTiles => 2,
        }
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(PixelEncoding::HorizontalTiles),
            1 => Some(PixelEncoding::Lineal),
            2 => Some(PixelEncoding::VerticalTiles),
            _ => None,
        }
    }

    /// Offset of the pixel at `(x, y)` in a `width` x `height` image stored with this encoding.
    #[inline]
    pub fn index(self, x: usize, y: usize, width: usize, height: usize, tile: TileSize) -> usize {
        let (tw, th) = (tile.width, tile.height);
        match self {
            PixelEncoding::Lineal => y * width + x,
            PixelEncoding::HorizontalTiles => {
                let tiles_per_row = (width + tw - 1) / tw;
                let tile_index = (y / th) * tiles_per_row + x / tw;
                tile_index * tile.area() + (y % th) * tw + x % tw
            }
            PixelEncoding::VerticalTiles => {
                let tiles_per_column = (height + th - 1) / th;
                let tile_index = (x / tw) * tiles_per_column + y / th;
                tile_index * tile.area() + (y % th) * tw + x % tw
            }
        }
    }

    /// Number of pixels a `width` x `height` image occupies with this encoding. Tiled encodings
    /// round a ragged last tile row up to whole tiles.
    pub fn encoded_len(self, width: usize, height: usize, tile: TileSize) -> usize {
        match self {
            PixelEncoding::Lineal => width * height,
            _ => {
                let tiles_per_row = (width + tile.width - 1) / tile.width;
                let tiles_per_column = (height + tile.height - 1) / tile.height;
                tiles_per_row * tiles_per_column * tile.area()
            }
        }
    }

    fn check(self, width: usize, tile: TileSize) -> Result<(), EncodingError> {
        if !self.is_tiled() {
            return Ok(());
        }
        ensure!(
            tile.width > 0 && tile.height > 0,
            encoding_error::EmptyTileSnafu
        );
        ensure!(
            width % tile.width == 0,
            encoding_error::TileWidthMismatchSnafu {
                width,
                tile_width: tile.width
            }
        );
        Ok(())
    }

    /// Reorders row-major pixels into this encoding.
    pub fn encode<T: Copy + Default>(
        self,
        lineal: &[T],
        width: usize,
        height: usize,
        tile: TileSize,
    ) -> Result<Vec<T>, EncodingError> {
        self.check(width, tile)?;
        ensure!(
            lineal.len() == width * height,
            encoding_error::BufferSizeSnafu {
                expected: width * height,
                actual: lineal.len()
            }
        );

        let mut out = vec![T::default(); self.encoded_len(width, height, tile)];
        codec(lineal, &mut out, false, width, height, tile, self);
        Ok(out)
    }

    /// Reorders pixels stored with this encoding into row-major order.
    ///
    /// Pixels missing from a short input (a ragged last tile row) come out as `T::default()`.
    pub fn decode<T: Copy + Default>(
        self,
        encoded: &[T],
        width: usize,
        height: usize,
        tile: TileSize,
    ) -> Result<Vec<T>, EncodingError> {
        self.check(width, tile)?;

        let mut out = vec![T::default(); width * height];
        codec(encoded, &mut out, true, width, height, tile, self);
        Ok(out)
    }
}

/// Copies every pixel between the lineal side and the `encoding` side.
fn codec<T: Copy + Default>(
    data_in: &[T],
    data_out: &mut [T],
    decoding: bool,
    width: usize,
    height: usize,
    tile: TileSize,
    encoding: PixelEncoding,
) {
    for (y, x) in iproduct!(0..height, 0..width) {
        let lineal = PixelEncoding::Lineal.index(x, y, width, height, tile);
        let encoded = encoding.index(x, y, width, height, tile);

        if decoding {
            data_out[lineal] = data_in.get(encoded).copied().unwrap_or_default();
        } else {
            data_out[encoded] = data_in[lineal];
        }
    }
}
