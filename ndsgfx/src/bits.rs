//! Integer fields at arbitrary bit offsets.
//!
//! Bits are numbered LSB-first inside each byte and bytes are little-endian, so a field that
//! crosses a byte boundary continues in the low bits of the next byte. This is how the hardware
//! packs sub-byte pixels as well as the attribute bits of map entries.

use snafu::{ensure, Snafu};

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum BitFieldError {
    #[snafu(display("a {width}-bit field at bit {offset} does not fit in {len} bytes"))]
    OutOfBounds { offset: usize, width: u8, len: usize },
    #[snafu(display("value {value:#x} does not fit in {width} bits"))]
    ValueTooLarge { value: u32, width: u8 },
    #[snafu(display("field width must be 1..=32, got {width}"))]
    InvalidWidth { width: u8 },
}

/// Returns a mask with the lowest `width` bits set.
#[inline]
pub const fn mask(width: u8) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Extracts `width` bits starting at bit `shift` of `word`.
#[inline]
pub const fn get_field(word: u32, shift: u8, width: u8) -> u32 {
    (word >> shift) & mask(width)
}

/// Replaces `width` bits starting at bit `shift` of `word`. Excess bits of `value` are dropped.
#[inline]
pub const fn set_field(word: u32, shift: u8, width: u8, value: u32) -> u32 {
    let m = mask(width) << shift;
    (word & !m) | ((value << shift) & m)
}

fn check(len: usize, offset: usize, width: u8) -> Result<(), BitFieldError> {
    ensure!(
        (1..=32).contains(&width),
        bit_field_error::InvalidWidthSnafu { width }
    );
    ensure!(
        offset + usize::from(width) <= len * 8,
        bit_field_error::OutOfBoundsSnafu { offset, width, len }
    );
    Ok(())
}

/// Reads a `width`-bit unsigned field starting at bit `offset` of `data`.
pub fn read_bits(data: &[u8], offset: usize, width: u8) -> Result<u32, BitFieldError> {
    check(data.len(), offset, width)?;

    let width = usize::from(width);
    let mut value = 0u32;
    let mut done = 0;
    while done < width {
        let bit = offset + done;
        let shift = bit % 8;
        let take = (8 - shift).min(width - done);
        let chunk = u32::from(data[bit / 8] >> shift) & mask(take as u8);
        value |= chunk << done;
        done += take;
    }

    Ok(value)
}

/// Writes the `width`-bit field `value` starting at bit `offset` of `data`, leaving all other
/// bits untouched.
pub fn write_bits(
    data: &mut [u8],
    offset: usize,
    width: u8,
    value: u32,
) -> Result<(), BitFieldError> {
    check(data.len(), offset, width)?;
    ensure!(
        value & !mask(width) == 0,
        bit_field_error::ValueTooLargeSnafu { value, width }
    );

    let width = usize::from(width);
    let mut done = 0;
    while done < width {
        let bit = offset + done;
        let shift = bit % 8;
        let take = (8 - shift).min(width - done);
        let m = (mask(take as u8) as u8) << shift;
        let chunk = (((value >> done) & mask(take as u8)) as u8) << shift;
        let byte = &mut data[bit / 8];
        *byte = (*byte & !m) | chunk;
        done += take;
    }

    Ok(())
}
