//! Whole-background import and export: true-color image to palette, tileset and map files,
//! and back.

use crate::{
    color::Color,
    formats::{FormatError, Nclr, Ncgr, Nscr},
    pixel::TileSize,
    quantize::{
        AdaptiveQuantization, FixedPaletteQuantization, FloydSteinberg,
        MultiFixedPaletteQuantization, NdsQuantization, Quantization, QuantizeError,
    },
    tiles::{self, ensure_whole_tiles, BgMode, MapError, MapInfo, PaletteMode, TileMapper, TileSet},
};
use snafu::{ensure, ResultExt, Snafu};
use std::collections::HashSet;

/// Pixels with less alpha than this are replaced by the backdrop color on import.
pub const ALPHA_THRESHOLD: u8 = 128;

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum ConvertError {
    #[snafu(display("{bg_mode:?} backgrounds with {palette_mode:?} palettes are not supported"))]
    UnsupportedMode {
        bg_mode: BgMode,
        palette_mode: PaletteMode,
    },
    #[snafu(display("{what} {value} exceeds the maximum of {max}"))]
    Capacity {
        what: &'static str,
        value: usize,
        max: usize,
    },
    #[snafu(display("pixel references color {index}, but the palette has {count}"))]
    ColorOutOfRange { index: u32, count: usize },
    #[snafu(display("image has {pixel_count} pixels, expected {width} * {height}"))]
    DimensionMismatch {
        width: usize,
        height: usize,
        pixel_count: usize,
    },
    #[snafu(display("can't build the background files"))]
    Format { source: FormatError },
    #[snafu(display("can't quantize the image"))]
    Quantize { source: QuantizeError },
    #[snafu(display("can't map the image to tiles"))]
    Map { source: MapError },
}

/// Where the palette of an imported image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaletteSource {
    /// Collect colors from the image.
    #[default]
    Adaptive,
    /// Match every pixel against one given palette.
    Fixed(Vec<Color>),
    /// Pick the best of several 16-color palettes per tile.
    MultiFixed(Vec<Vec<Color>>),
}

/// Settings for [`import`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub palette_mode: PaletteMode,
    pub bg_mode: BgMode,
    /// Goes to index 0 of the palette. Also replaces transparent pixels.
    pub backdrop: Color,
    pub dithering: bool,
    pub palette: PaletteSource,
    /// Map against these tiles only, instead of building a new tile set.
    pub reference_tiles: Option<TileSet>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            palette_mode: PaletteMode::Colors16x16,
            bg_mode: BgMode::Text,
            backdrop: Color::MAGENTA,
            dithering: false,
            palette: PaletteSource::Adaptive,
            reference_tiles: None,
        }
    }
}

impl ImportOptions {
    pub fn palette_mode(mut self, palette_mode: PaletteMode) -> Self {
        self.palette_mode = palette_mode;
        self
    }

    pub fn bg_mode(mut self, bg_mode: BgMode) -> Self {
        self.bg_mode = bg_mode;
        self
    }

    pub fn backdrop(mut self, backdrop: Color) -> Self {
        self.backdrop = backdrop;
        self
    }

    pub fn dithering(mut self, dithering: bool) -> Self {
        self.dithering = dithering;
        self
    }

    pub fn fixed_palette(mut self, colors: Vec<Color>) -> Self {
        self.palette = PaletteSource::Fixed(colors);
        self
    }

    /// Picks one of `palettes` per tile. Needs [`PaletteMode::Colors16x16`].
    ///
    /// The palettes are written as given: the backdrop is not moved to index 0, and transparent
    /// pixels take whichever palette color is nearest to the backdrop. Put the backdrop first in
    /// every palette to keep transparency at index 0.
    pub fn fixed_palettes(mut self, palettes: Vec<Vec<Color>>) -> Self {
        self.palette = PaletteSource::MultiFixed(palettes);
        self
    }

    pub fn reference_tiles(mut self, tiles: TileSet) -> Self {
        self.reference_tiles = Some(tiles);
        self
    }

    fn check_mode(&self) -> Result<(), ConvertError> {
        let supported = matches!(
            (self.bg_mode, self.palette_mode),
            (BgMode::Text, PaletteMode::Colors16x16)
                | (BgMode::Text, PaletteMode::Colors256x1)
                | (BgMode::Extended, PaletteMode::Colors256x1)
                | (BgMode::Affine, PaletteMode::Colors256x1)
        );
        let multi_palette = matches!(self.palette, PaletteSource::MultiFixed(_));
        ensure!(
            supported && (!multi_palette || self.palette_mode == PaletteMode::Colors16x16),
            convert_error::UnsupportedModeSnafu {
                bg_mode: self.bg_mode,
                palette_mode: self.palette_mode
            }
        );
        Ok(())
    }

    /// Builds the quantizer for an already prepared image.
    fn quantization(
        &self,
        image: &[Color],
        backdrop: Color,
    ) -> Result<NdsQuantization, ConvertError> {
        let format = self.palette_mode.color_format();
        let snap = |colors: &[Color]| -> Vec<Color> {
            colors.iter().map(|c| c.snap_bgr555().with_alpha(0xFF)).collect()
        };

        let inner: Box<dyn Quantization> = match &self.palette {
            PaletteSource::Adaptive => {
                let quantization = AdaptiveQuantization::new(adaptive_cap(
                    image,
                    backdrop,
                    format.max_colors(),
                ));
                if self.dithering {
                    Box::new(quantization.with_dithering(FloydSteinberg))
                } else {
                    Box::new(quantization)
                }
            }
            PaletteSource::Fixed(colors) => {
                let quantization = FixedPaletteQuantization::new(snap(colors));
                if self.dithering {
                    Box::new(quantization.with_dithering(FloydSteinberg))
                } else {
                    Box::new(quantization)
                }
            }
            PaletteSource::MultiFixed(palettes) => {
                let max = usize::from(MapInfo::MAX_PALETTE_INDEX) + 1;
                ensure!(
                    palettes.len() <= max,
                    convert_error::CapacitySnafu {
                        what: "palette count",
                        value: palettes.len(),
                        max
                    }
                );
                let quantization = MultiFixedPaletteQuantization::new(
                    palettes.iter().map(|p| snap(p)).collect(),
                    TileSize::NDS,
                );
                if self.dithering {
                    Box::new(quantization.with_dithering(FloydSteinberg))
                } else {
                    Box::new(quantization)
                }
            }
        };

        Ok(NdsQuantization::new(inner, backdrop, format))
    }
}

/// Color cap for adaptive quantization.
///
/// One slot is kept free for the backdrop, unless the image already uses it and fits the palette
/// as a whole.
fn adaptive_cap(image: &[Color], backdrop: Color, max_colors: usize) -> usize {
    let colors: HashSet<Color> = image.iter().copied().collect();
    if colors.contains(&backdrop) && colors.len() <= max_colors {
        max_colors
    } else {
        max_colors - 1
    }
}

/// The three files of an imported background.
#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    pub nclr: Nclr,
    pub ncgr: Ncgr,
    pub nscr: Nscr,
}

/// A rendered background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    pub width: usize,
    pub height: usize,
    /// Row-major colors.
    pub colors: Vec<Color>,
}

/// Converts a row-major true-color image into palette, tileset and map files.
///
/// Colors are reduced to BGR555 precision before quantizing, so the palette survives being
/// written. Pixels with alpha below [`ALPHA_THRESHOLD`] become the backdrop color.
pub fn import(
    image: &[Color],
    width: usize,
    height: usize,
    options: &ImportOptions,
) -> Result<Imported, ConvertError> {
    options.check_mode()?;
    ensure!(
        image.len() == width * height,
        convert_error::DimensionMismatchSnafu {
            width,
            height,
            pixel_count: image.len()
        }
    );
    ensure_whole_tiles(width, height, TileSize::NDS).context(convert_error::MapSnafu)?;

    let backdrop = options.backdrop.snap_bgr555().with_alpha(0xFF);
    let prepared: Vec<Color> = image
        .iter()
        .map(|&c| {
            if c.a < ALPHA_THRESHOLD {
                backdrop
            } else {
                c.snap_bgr555().with_alpha(0xFF)
            }
        })
        .collect();

    let quantized = options
        .quantization(&prepared, backdrop)?
        .quantize(&prepared, width, height)
        .context(convert_error::QuantizeSnafu)?;
    log::debug!(
        "quantized {width}x{height} image to {} colors in {} palettes",
        quantized.palette.color_count(),
        quantized.palette.len()
    );

    let mapper = match &options.reference_tiles {
        Some(tiles) => TileMapper::with_reference(tiles.clone()),
        None => TileMapper::new(TileSize::NDS),
    };
    let mut mapper = mapper.with_flips(options.bg_mode != BgMode::Affine);
    let entries = mapper
        .map_with_palettes(&quantized.pixels, width, height, &quantized.tile_palettes)
        .context(convert_error::MapSnafu)?;
    let tiles = mapper.into_tile_set();

    let max_tiles = options.bg_mode.max_tile_index() as usize + 1;
    ensure!(
        tiles.len() <= max_tiles,
        convert_error::CapacitySnafu {
            what: "tile count",
            value: tiles.len(),
            max: max_tiles
        }
    );

    let format = options.palette_mode.color_format();
    let nclr =
        Nclr::from_palette(&quantized.palette, format).context(convert_error::FormatSnafu)?;
    let ncgr = Ncgr::from_tiles(&tiles, format).context(convert_error::FormatSnafu)?;
    let nscr = Nscr::from_map(
        &entries,
        width,
        height,
        options.bg_mode,
        options.palette_mode,
    )
    .context(convert_error::FormatSnafu)?;

    Ok(Imported { nclr, ncgr, nscr })
}

/// Renders the background described by a palette, tileset and map file.
pub fn export(nclr: &Nclr, ncgr: &Ncgr, nscr: &Nscr) -> Result<Exported, ConvertError> {
    let colors = nclr.palette().context(convert_error::FormatSnafu)?.to_flat();
    let tiles = ncgr.tile_set().context(convert_error::FormatSnafu)?;
    let entries = nscr.map().context(convert_error::FormatSnafu)?;
    let (width, height) = nscr.dimensions().context(convert_error::FormatSnafu)?;
    let colors_per_palette = nscr
        .palette_mode()
        .context(convert_error::FormatSnafu)?
        .colors_per_palette();

    let pixels = tiles::expand(&tiles, &entries, width, height, colors_per_palette)
        .context(convert_error::MapSnafu)?;
    let colors = pixels
        .into_iter()
        .map(|pixel| match pixel.index() {
            Some(index) => colors.get(index as usize).copied().ok_or(
                ConvertError::ColorOutOfRange {
                    index,
                    count: colors.len(),
                },
            ),
            None => Ok(pixel.to_color()),
        })
        .collect::<Result<Vec<Color>, ConvertError>>()?;

    Ok(Exported {
        width,
        height,
        colors,
    })
}
