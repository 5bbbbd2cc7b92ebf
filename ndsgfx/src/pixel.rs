use crate::color::Color;

/// A single pixel, either a palette index or a true color.
///
/// For true-color pixels `info` holds `0xRRGGBB`; for indexed pixels it holds the palette index.
/// Whether the index fits the target format is only checked when packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pixel {
    pub is_indexed: bool,
    pub info: u32,
    pub alpha: u8,
}

impl Pixel {
    pub const fn indexed(index: u32) -> Self {
        Self::indexed_with_alpha(index, 0xFF)
    }

    pub const fn indexed_with_alpha(index: u32, alpha: u8) -> Self {
        Self {
            is_indexed: true,
            info: index,
            alpha,
        }
    }

    pub const fn true_color(color: Color) -> Self {
        Self {
            is_indexed: false,
            info: color.to_rgb24(),
            alpha: color.a,
        }
    }

    pub const fn index(self) -> Option<u32> {
        if self.is_indexed {
            Some(self.info)
        } else {
            None
        }
    }

    /// The color of a true-color pixel. Meaningless for indexed pixels.
    pub const fn to_color(self) -> Color {
        let c = Color::from_rgb24(self.info);
        Color::rgba(c.r, c.g, c.b, self.alpha)
    }

    /// Returns the pixel as `0xAARRGGBB` (or `0xAA` + index for indexed pixels).
    pub const fn to_argb(self) -> u32 {
        ((self.alpha as u32) << 24) | (self.info & 0x00FF_FFFF)
    }

    /// Copies the pixel with a different palette index.
    pub const fn with_index(self, index: u32) -> Self {
        Self {
            is_indexed: true,
            info: index,
            alpha: self.alpha,
        }
    }
}

/// Width and height of a tile, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileSize {
    pub width: usize,
    pub height: usize,
}

impl TileSize {
    /// The hardware tile.
    pub const NDS: TileSize = TileSize::new(8, 8);

    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub const fn area(self) -> usize {
        self.width * self.height
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::NDS
    }
}

/// An ordered list of sub-palettes.
///
/// Order is meaningful: index 0 of the first sub-palette is conventionally the backdrop color.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    sub_palettes: Vec<Vec<Color>>,
}

impl Palette {
    pub fn new(sub_palettes: Vec<Vec<Color>>) -> Self {
        Self { sub_palettes }
    }

    pub fn single(colors: Vec<Color>) -> Self {
        Self {
            sub_palettes: vec![colors],
        }
    }

    /// Splits a flat color list into sub-palettes of `per_palette` colors. The last one may be
    /// shorter.
    pub fn from_flat(colors: &[Color], per_palette: usize) -> Self {
        Self {
            sub_palettes: colors
                .chunks(per_palette.max(1))
                .map(<[Color]>::to_vec)
                .collect(),
        }
    }

    pub fn sub_palettes(&self) -> &[Vec<Color>] {
        &self.sub_palettes
    }

    pub fn sub_palette(&self, index: usize) -> Option<&[Color]> {
        self.sub_palettes.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.sub_palettes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_palettes.is_empty()
    }

    pub fn color_count(&self) -> usize {
        self.sub_palettes.iter().map(Vec::len).sum()
    }

    /// All colors, sub-palette after sub-palette.
    pub fn to_flat(&self) -> Vec<Color> {
        self.sub_palettes.iter().flatten().copied().collect()
    }

    pub fn into_sub_palettes(self) -> Vec<Vec<Color>> {
        self.sub_palettes
    }
}
