//! Reducing true-color images to palette indices.
//!
//! Every quantizer walks the image in raster order, picks a palette index for the working color
//! of each pixel and hands the remaining error to its [`Dithering`] policy. Color distances are
//! squared Euclidean distances in [`Lab`].

use crate::{
    color::{Color, ColorFormat, Lab},
    encoding::PixelEncoding,
    pixel::{Palette, Pixel, TileSize},
    tiles::{ensure_whole_tiles, MapError},
};
use snafu::{ensure, ResultExt, Snafu};
use std::collections::HashMap;

mod dither;

pub use dither::{Dithering, FloydSteinberg, NoDithering};

/// Largest palette any quantizer builds or accepts.
pub const MAX_PALETTE_COLORS: usize = 256;

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum QuantizeError {
    #[snafu(display(
        "image dimensions don't match the number of pixels: {width} * {height} != {pixel_count}"
    ))]
    DimensionMismatch {
        width: usize,
        height: usize,
        pixel_count: usize,
    },
    #[snafu(display("the palette has no colors"))]
    EmptyPalette,
    #[snafu(display("{colors} colors exceed the maximum of {max}"))]
    Capacity { colors: usize, max: usize },
    #[snafu(display("image doesn't split into whole tiles"))]
    Tiles { source: MapError },
}

/// The result of quantizing an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    /// Row-major indexed pixels. Indices are relative to the sub-palette of their tile.
    pub pixels: Vec<Pixel>,
    pub palette: Palette,
    /// The sub-palette of every tile in raster order, for quantizers that choose one per tile.
    /// Empty otherwise.
    pub tile_palettes: Vec<u8>,
}

pub trait Quantization {
    fn quantize(&self, image: &[Color], width: usize, height: usize)
        -> Result<Quantized, QuantizeError>;
}

impl<Q: Quantization + ?Sized> Quantization for Box<Q> {
    fn quantize(
        &self,
        image: &[Color],
        width: usize,
        height: usize,
    ) -> Result<Quantized, QuantizeError> {
        (**self).quantize(image, width, height)
    }
}

fn check_dimensions(image: &[Color], width: usize, height: usize) -> Result<(), QuantizeError> {
    ensure!(
        image.len() == width * height,
        quantize_error::DimensionMismatchSnafu {
            width,
            height,
            pixel_count: image.len()
        }
    );
    Ok(())
}

/// Index and distance of the color in `palette` closest to `target`. Ties go to the lowest
/// index. `palette` must not be empty.
pub fn nearest(palette: &[Lab], target: Lab) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, &color) in palette.iter().enumerate() {
        let distance = color.distance_squared(target);
        if distance < best.1 {
            best = (i, distance);
        }
    }
    best
}

/// Walks `image` in raster order, asking `choose` for the palette index and palette color of
/// each pixel's original and working color, and diffusing the difference.
fn quantize_with(
    image: &[Color],
    width: usize,
    height: usize,
    dithering: &dyn Dithering,
    mut choose: impl FnMut(Color, Lab) -> (usize, Lab),
) -> Vec<Pixel> {
    let mut working: Vec<Lab> = image.iter().copied().map(Lab::from_color).collect();

    let mut pixels = Vec::with_capacity(image.len());
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let (index, chosen) = choose(image[i], working[i]);
            let error = working[i] - chosen;
            dithering.diffuse(&mut working, width, height, x, y, error);
            pixels.push(Pixel::indexed_with_alpha(index as u32, image[i].a));
        }
    }
    pixels
}

fn opaque(color: Color) -> Color {
    color.with_alpha(0xFF)
}

/// Builds the palette on the fly: colors are added in the order they are first seen until the
/// palette holds `max_colors`, after which remaining new colors are approximated by the nearest
/// color collected so far.
pub struct AdaptiveQuantization {
    max_colors: usize,
    dithering: Box<dyn Dithering>,
}

impl AdaptiveQuantization {
    pub fn new(max_colors: usize) -> Self {
        Self {
            max_colors,
            dithering: Box::new(NoDithering),
        }
    }

    pub fn with_dithering(mut self, dithering: impl Dithering + 'static) -> Self {
        self.dithering = Box::new(dithering);
        self
    }

    pub fn max_colors(&self) -> usize {
        self.max_colors
    }
}

impl Quantization for AdaptiveQuantization {
    fn quantize(
        &self,
        image: &[Color],
        width: usize,
        height: usize,
    ) -> Result<Quantized, QuantizeError> {
        check_dimensions(image, width, height)?;
        ensure!(self.max_colors > 0, quantize_error::EmptyPaletteSnafu);
        ensure!(
            self.max_colors <= MAX_PALETTE_COLORS,
            quantize_error::CapacitySnafu {
                colors: self.max_colors,
                max: MAX_PALETTE_COLORS
            }
        );

        let mut colors: Vec<Color> = Vec::new();
        let mut labs: Vec<Lab> = Vec::new();
        let mut seen: HashMap<Color, usize> = HashMap::new();

        let pixels = quantize_with(image, width, height, &*self.dithering, |color, working| {
            let color = opaque(color);
            if let Some(&index) = seen.get(&color) {
                return (index, labs[index]);
            }
            if colors.len() < self.max_colors {
                let lab = Lab::from_color(color);
                seen.insert(color, colors.len());
                colors.push(color);
                labs.push(lab);
                return (colors.len() - 1, lab);
            }
            let (index, _) = nearest(&labs, working);
            (index, labs[index])
        });

        log::debug!(
            "adaptive quantization kept {} of at most {} colors",
            colors.len(),
            self.max_colors
        );

        Ok(Quantized {
            pixels,
            palette: Palette::single(colors),
            tile_palettes: Vec::new(),
        })
    }
}

/// Maps every pixel to the nearest color of a given palette.
pub struct FixedPaletteQuantization {
    colors: Vec<Color>,
    labs: Vec<Lab>,
    dithering: Box<dyn Dithering>,
}

impl FixedPaletteQuantization {
    pub fn new(colors: Vec<Color>) -> Self {
        let labs = colors.iter().copied().map(Lab::from_color).collect();
        Self {
            colors,
            labs,
            dithering: Box::new(NoDithering),
        }
    }

    pub fn with_dithering(mut self, dithering: impl Dithering + 'static) -> Self {
        self.dithering = Box::new(dithering);
        self
    }

    fn check(&self) -> Result<(), QuantizeError> {
        ensure!(!self.colors.is_empty(), quantize_error::EmptyPaletteSnafu);
        ensure!(
            self.colors.len() <= MAX_PALETTE_COLORS,
            quantize_error::CapacitySnafu {
                colors: self.colors.len(),
                max: MAX_PALETTE_COLORS
            }
        );
        Ok(())
    }

    fn quantize_pixels(&self, image: &[Color], width: usize, height: usize) -> Vec<Pixel> {
        quantize_with(image, width, height, &*self.dithering, |_, working| {
            let (index, _) = nearest(&self.labs, working);
            (index, self.labs[index])
        })
    }

    /// Sum of the distances from every color of `tile` to its nearest palette color.
    fn tile_distance(&self, tile: &[Lab]) -> f32 {
        tile.iter().map(|&lab| nearest(&self.labs, lab).1).sum()
    }
}

impl Quantization for FixedPaletteQuantization {
    fn quantize(
        &self,
        image: &[Color],
        width: usize,
        height: usize,
    ) -> Result<Quantized, QuantizeError> {
        check_dimensions(image, width, height)?;
        self.check()?;

        Ok(Quantized {
            pixels: self.quantize_pixels(image, width, height),
            palette: Palette::single(self.colors.clone()),
            tile_palettes: Vec::new(),
        })
    }
}

/// Picks, for every tile, whichever candidate palette represents it best, then quantizes the
/// tile against that palette alone.
pub struct MultiFixedPaletteQuantization {
    palettes: Vec<FixedPaletteQuantization>,
    tile_size: TileSize,
}

impl MultiFixedPaletteQuantization {
    pub fn new(palettes: Vec<Vec<Color>>, tile_size: TileSize) -> Self {
        Self {
            palettes: palettes
                .into_iter()
                .map(FixedPaletteQuantization::new)
                .collect(),
            tile_size,
        }
    }

    /// Uses `dithering` inside every tile. Error never crosses tile borders.
    pub fn with_dithering(mut self, dithering: impl Dithering + Clone + 'static) -> Self {
        self.palettes = self
            .palettes
            .into_iter()
            .map(|p| p.with_dithering(dithering.clone()))
            .collect();
        self
    }

    /// Index of the candidate palette closest to `tile`. Ties go to the lowest index.
    fn best_palette(&self, tile: &[Color]) -> usize {
        let labs: Vec<Lab> = tile.iter().copied().map(Lab::from_color).collect();
        let mut best = (0, f32::INFINITY);
        for (i, palette) in self.palettes.iter().enumerate() {
            let distance = palette.tile_distance(&labs);
            if distance < best.1 {
                best = (i, distance);
            }
        }
        best.0
    }
}

impl Quantization for MultiFixedPaletteQuantization {
    fn quantize(
        &self,
        image: &[Color],
        width: usize,
        height: usize,
    ) -> Result<Quantized, QuantizeError> {
        check_dimensions(image, width, height)?;
        ensure!(!self.palettes.is_empty(), quantize_error::EmptyPaletteSnafu);
        ensure!(
            self.palettes.len() <= usize::from(u8::MAX) + 1,
            quantize_error::CapacitySnafu {
                colors: self.palettes.len(),
                max: usize::from(u8::MAX) + 1
            }
        );
        for palette in &self.palettes {
            palette.check()?;
        }
        ensure_whole_tiles(width, height, self.tile_size).context(quantize_error::TilesSnafu)?;

        let size = self.tile_size;
        let encoding = PixelEncoding::HorizontalTiles;
        let tiled = encoding
            .encode(image, width, height, size)
            .map_err(|source| QuantizeError::Tiles {
                source: MapError::Encoding { source },
            })?;

        let mut tile_palettes = Vec::with_capacity(tiled.len() / size.area());
        let mut tiled_pixels = Vec::with_capacity(tiled.len());
        for tile in tiled.chunks_exact(size.area()) {
            let best = self.best_palette(tile);
            tile_palettes.push(best as u8);
            tiled_pixels.extend(self.palettes[best].quantize_pixels(tile, size.width, size.height));
        }

        let pixels = encoding
            .decode(&tiled_pixels, width, height, size)
            .map_err(|source| QuantizeError::Tiles {
                source: MapError::Encoding { source },
            })?;

        Ok(Quantized {
            pixels,
            palette: Palette::new(self.palettes.iter().map(|p| p.colors.clone()).collect()),
            tile_palettes,
        })
    }
}

/// Runs another quantizer, then applies the hardware palette conventions: the backdrop color
/// goes to index 0 and every sub-palette is padded to the size of the target format.
pub struct NdsQuantization {
    inner: Box<dyn Quantization>,
    backdrop: Color,
    format: ColorFormat,
}

impl NdsQuantization {
    pub fn new(inner: impl Quantization + 'static, backdrop: Color, format: ColorFormat) -> Self {
        Self {
            inner: Box::new(inner),
            backdrop,
            format,
        }
    }
}

impl Quantization for NdsQuantization {
    fn quantize(
        &self,
        image: &[Color],
        width: usize,
        height: usize,
    ) -> Result<Quantized, QuantizeError> {
        let Quantized {
            mut pixels,
            palette,
            tile_palettes,
        } = self.inner.quantize(image, width, height)?;

        let mut sub_palettes = palette.into_sub_palettes();
        if let [colors] = sub_palettes.as_mut_slice() {
            place_backdrop(&mut pixels, colors, self.backdrop);
        }

        let max = self.format.max_colors();
        for colors in &mut sub_palettes {
            ensure!(
                colors.len() <= max,
                quantize_error::CapacitySnafu {
                    colors: colors.len(),
                    max
                }
            );
            colors.resize(max, Color::BLACK);
        }

        Ok(Quantized {
            pixels,
            palette: Palette::new(sub_palettes),
            tile_palettes,
        })
    }
}

/// Moves `backdrop` to index 0 of `palette`, rewriting pixel indices to match.
///
/// If the backdrop is already in the palette it swaps places with the color at index 0;
/// otherwise it is inserted in front and every index shifts up by one.
pub fn place_backdrop(pixels: &mut [Pixel], palette: &mut Vec<Color>, backdrop: Color) {
    let backdrop = opaque(backdrop);

    match palette.iter().position(|&c| opaque(c) == backdrop) {
        Some(0) => {}
        Some(found) => {
            palette.swap(0, found);
            let found = found as u32;
            for pixel in pixels.iter_mut().filter(|p| p.is_indexed) {
                if pixel.info == 0 {
                    pixel.info = found;
                } else if pixel.info == found {
                    pixel.info = 0;
                }
            }
        }
        None => {
            palette.insert(0, backdrop);
            for pixel in pixels.iter_mut().filter(|p| p.is_indexed) {
                pixel.info += 1;
            }
        }
    }
}
