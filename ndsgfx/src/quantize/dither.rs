use crate::color::Lab;

/// Spreads the quantization error of one pixel onto pixels not yet visited.
///
/// Pixels are visited in raster order; `buffer` holds the working colors of the whole image.
pub trait Dithering {
    fn diffuse(
        &self,
        buffer: &mut [Lab],
        width: usize,
        height: usize,
        x: usize,
        y: usize,
        error: Lab,
    );
}

/// Leaves the error where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDithering;

impl Dithering for NoDithering {
    #[inline]
    fn diffuse(&self, _: &mut [Lab], _: usize, _: usize, _: usize, _: usize, _: Lab) {}
}

/// Floyd-Steinberg error diffusion.
///
/// ```plain
///          .    *   7/16
///        3/16  5/16 1/16
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FloydSteinberg;

impl FloydSteinberg {
    const KERNEL: [(isize, usize, f32); 4] = [
        (1, 0, 7.0 / 16.0),
        (-1, 1, 3.0 / 16.0),
        (0, 1, 5.0 / 16.0),
        (1, 1, 1.0 / 16.0),
    ];
}

impl Dithering for FloydSteinberg {
    fn diffuse(
        &self,
        buffer: &mut [Lab],
        width: usize,
        height: usize,
        x: usize,
        y: usize,
        error: Lab,
    ) {
        for (dx, dy, weight) in Self::KERNEL {
            let Some(nx) = x.checked_add_signed(dx) else {
                continue;
            };
            let ny = y + dy;
            if nx >= width || ny >= height {
                continue;
            }

            let target = &mut buffer[ny * width + nx];
            *target = *target + error * weight;
        }
    }
}
