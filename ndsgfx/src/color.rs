use crate::pixel::Pixel;
use core::ops::{Add, Mul, Sub};
use snafu::{ensure, Snafu};

/// An 8-bit per channel color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const MAGENTA: Color = Color::rgb(0xF8, 0x00, 0xF8);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Builds an opaque color from a `0xRRGGBB` value. The top byte is ignored.
    pub const fn from_rgb24(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    pub const fn to_rgb24(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Decodes a BGR555 palette color. Bit 15 is not an alpha bit in palettes, so the result is
    /// always opaque.
    pub const fn from_bgr555(raw: u16) -> Self {
        let raw = raw as u32;
        Self::rgb(
            expand_bits(raw & 0x1F, 5),
            expand_bits((raw >> 5) & 0x1F, 5),
            expand_bits((raw >> 10) & 0x1F, 5),
        )
    }

    pub const fn to_bgr555(self) -> u16 {
        let r = reduce_bits(self.r, 5);
        let g = reduce_bits(self.g, 5);
        let b = reduce_bits(self.b, 5);
        (r | (g << 5) | (b << 10)) as u16
    }

    /// Drops the precision the hardware can't store, keeping alpha as is.
    pub const fn snap_bgr555(self) -> Self {
        let snapped = Self::from_bgr555(self.to_bgr555());
        Self { a: self.a, ..snapped }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

/// Scales an `n`-bit channel up to 8 bits by bit replication, so that [`reduce_bits`] inverts it
/// exactly.
#[inline]
pub const fn expand_bits(value: u32, n: u32) -> u8 {
    if n == 0 {
        return 0;
    }
    if n >= 8 {
        return value as u8;
    }

    let value = value & ((1 << n) - 1);
    let mut out = value << (8 - n);
    let mut shift = 8 - n as i32;
    while shift > 0 {
        shift -= n as i32;
        out |= if shift >= 0 {
            value << shift
        } else {
            value >> -shift
        };
    }
    out as u8
}

/// Keeps the `n` most significant bits of an 8-bit channel.
#[inline]
pub const fn reduce_bits(value: u8, n: u32) -> u32 {
    if n >= 8 {
        value as u32
    } else {
        (value as u32) >> (8 - n)
    }
}

/// A CIE L*a*b* color (D65 white point).
///
/// Euclidean distance in this space roughly follows perceived difference, which is what the
/// nearest-color search and the error diffusion work in.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl Lab {
    pub fn from_color(color: Color) -> Self {
        fn linear(c: u8) -> f32 {
            let c = f32::from(c) / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }

        fn f(t: f32) -> f32 {
            if t > 0.008856 {
                t.cbrt()
            } else {
                7.787 * t + 16.0 / 116.0
            }
        }

        let (r, g, b) = (linear(color.r), linear(color.g), linear(color.b));

        let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
        let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.08883;

        let (fx, fy, fz) = (f(x), f(y), f(z));
        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    #[inline]
    pub fn distance_squared(self, other: Lab) -> f32 {
        let (dl, da, db) = (self.l - other.l, self.a - other.a, self.b - other.b);
        dl * dl + da * da + db * db
    }
}

impl Add for Lab {
    type Output = Lab;

    fn add(self, rhs: Lab) -> Lab {
        Lab {
            l: self.l + rhs.l,
            a: self.a + rhs.a,
            b: self.b + rhs.b,
        }
    }
}

impl Sub for Lab {
    type Output = Lab;

    fn sub(self, rhs: Lab) -> Lab {
        Lab {
            l: self.l - rhs.l,
            a: self.a - rhs.a,
            b: self.b - rhs.b,
        }
    }
}

impl Mul<f32> for Lab {
    type Output = Lab;

    fn mul(self, rhs: f32) -> Lab {
        Lab {
            l: self.l * rhs,
            a: self.a * rhs,
            b: self.b * rhs,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum ColorFormatError {
    #[snafu(display("palette index {index} does not fit in {format:?}"))]
    IndexOutOfRange { index: u32, format: ColorFormat },
    #[snafu(display("{format:?} can't store an indexed pixel"))]
    IndexedInDirect { format: ColorFormat },
    #[snafu(display("{format:?} can't store a true-color pixel"))]
    DirectInIndexed { format: ColorFormat },
}

/// The pixel formats a tileset or texture can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    Indexed1,
    Indexed2,
    Indexed4,
    Indexed8,
    /// 5-bit palette index with 3-bit alpha.
    A3I5,
    /// 3-bit palette index with 5-bit alpha.
    A5I3,
    /// BGR555 with a 1-bit alpha in the top bit.
    Abgr1555,
    /// 32-bit, laid out B, G, R, A in memory.
    Bgra8888,
    /// 32-bit, laid out R, G, B, A in memory.
    Abgr8888,
}

impl ColorFormat {
    pub const ALL: [ColorFormat; 9] = [
        ColorFormat::Indexed1,
        ColorFormat::Indexed2,
        ColorFormat::Indexed4,
        ColorFormat::Indexed8,
        ColorFormat::A3I5,
        ColorFormat::A5I3,
        ColorFormat::Abgr1555,
        ColorFormat::Bgra8888,
        ColorFormat::Abgr8888,
    ];

    pub const fn bits_per_pixel(self) -> u8 {
        match self {
            ColorFormat::Indexed1 => 1,
            ColorFormat::Indexed2 => 2,
            ColorFormat::Indexed4 => 4,
            ColorFormat::Indexed8 | ColorFormat::A3I5 | ColorFormat::A5I3 => 8,
            ColorFormat::Abgr1555 => 16,
            ColorFormat::Bgra8888 | ColorFormat::Abgr8888 => 32,
        }
    }

    /// Bits of a pixel that hold the palette index (or the color, for direct formats).
    const fn color_bits(self) -> u8 {
        match self {
            ColorFormat::A3I5 => 5,
            ColorFormat::A5I3 => 3,
            ColorFormat::Abgr1555 => 15,
            ColorFormat::Bgra8888 | ColorFormat::Abgr8888 => 24,
            _ => self.bits_per_pixel(),
        }
    }

    const fn alpha_bits(self) -> u8 {
        self.bits_per_pixel() - self.color_bits()
    }

    /// Number of distinct colors a pixel can reference or hold.
    pub const fn max_colors(self) -> usize {
        1 << self.color_bits()
    }

    pub const fn is_indexed(self) -> bool {
        !matches!(
            self,
            ColorFormat::Abgr1555 | ColorFormat::Bgra8888 | ColorFormat::Abgr8888
        )
    }

    /// The value stored in the format field of pixel and palette blocks.
    pub const fn code(self) -> u32 {
        match self {
            ColorFormat::A3I5 => 1,
            ColorFormat::Indexed2 => 2,
            ColorFormat::Indexed4 => 3,
            ColorFormat::Indexed8 => 4,
            ColorFormat::A5I3 => 6,
            ColorFormat::Abgr1555 => 7,
            ColorFormat::Indexed1 => 8,
            ColorFormat::Bgra8888 => 9,
            ColorFormat::Abgr8888 => 10,
        }
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => ColorFormat::A3I5,
            2 => ColorFormat::Indexed2,
            3 => ColorFormat::Indexed4,
            4 => ColorFormat::Indexed8,
            6 => ColorFormat::A5I3,
            7 => ColorFormat::Abgr1555,
            8 => ColorFormat::Indexed1,
            9 => ColorFormat::Bgra8888,
            10 => ColorFormat::Abgr8888,
            _ => return None,
        })
    }

    /// Packs a pixel into its raw `bits_per_pixel()`-wide value.
    pub fn pack(self, pixel: Pixel) -> Result<u32, ColorFormatError> {
        let alpha = reduce_bits(pixel.alpha, u32::from(self.alpha_bits()));

        if self.is_indexed() {
            ensure!(
                pixel.is_indexed,
                color_format_error::DirectInIndexedSnafu { format: self }
            );
            ensure!(
                (pixel.info as usize) < self.max_colors(),
                color_format_error::IndexOutOfRangeSnafu {
                    index: pixel.info,
                    format: self
                }
            );
            return Ok(if self.alpha_bits() == 0 {
                pixel.info
            } else {
                pixel.info | (alpha << self.color_bits())
            });
        }

        ensure!(
            !pixel.is_indexed,
            color_format_error::IndexedInDirectSnafu { format: self }
        );
        let color = pixel.to_color();
        let [r, g, b] = [color.r as u32, color.g as u32, color.b as u32];
        Ok(match self {
            ColorFormat::Abgr1555 => u32::from(color.to_bgr555()) | (alpha << 15),
            ColorFormat::Bgra8888 => b | (g << 8) | (r << 16) | (u32::from(pixel.alpha) << 24),
            _ => r | (g << 8) | (b << 16) | (u32::from(pixel.alpha) << 24),
        })
    }

    /// Unpacks a raw value. Bits above `bits_per_pixel()` are ignored.
    pub fn unpack(self, raw: u32) -> Pixel {
        let color_mask = if self.color_bits() >= 32 {
            u32::MAX
        } else {
            (1 << self.color_bits()) - 1
        };
        let alpha_raw = (raw >> self.color_bits()) & ((1 << self.alpha_bits()) - 1);

        match self {
            ColorFormat::Indexed1
            | ColorFormat::Indexed2
            | ColorFormat::Indexed4
            | ColorFormat::Indexed8 => Pixel::indexed(raw & color_mask),
            ColorFormat::A3I5 | ColorFormat::A5I3 => Pixel::indexed_with_alpha(
                raw & color_mask,
                expand_bits(alpha_raw, u32::from(self.alpha_bits())),
            ),
            ColorFormat::Abgr1555 => {
                let color = Color::from_bgr555((raw & 0x7FFF) as u16);
                Pixel::true_color(color.with_alpha(expand_bits(alpha_raw, 1)))
            }
            ColorFormat::Bgra8888 => Pixel::true_color(Color::rgba(
                (raw >> 16) as u8,
                (raw >> 8) as u8,
                raw as u8,
                (raw >> 24) as u8,
            )),
            ColorFormat::Abgr8888 => Pixel::true_color(Color::rgba(
                raw as u8,
                (raw >> 8) as u8,
                (raw >> 16) as u8,
                (raw >> 24) as u8,
            )),
        }
    }
}
