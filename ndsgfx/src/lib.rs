//! Codec for the Nitro tiled-graphics formats: palettes (`NCLR`), tilesets (`NCGR`) and tile
//! maps (`NSCR`).
//!
//! # Import
//!
//! A true-color image is quantized to palette indices ([`quantize`]), cut into 8x8 tiles that are
//! deduplicated under horizontal and vertical flips ([`tiles`]), and the palette, tile set and
//! map are written as three tagged-block containers ([`container`], [`formats`]).
//!
//! # Export
//!
//! The three files are read back, map entries are expanded into an indexed image and the palette
//! turns it into colors again.
//!
//! [`convert::import`] and [`convert::export`] run the whole pipeline:
//!
//! ```
//! use ndsgfx::{convert, Color};
//!
//! let image = vec![Color::rgb(0, 0, 0xFF); 16 * 8];
//! let imported = convert::import(&image, 16, 8, &Default::default()).unwrap();
//!
//! let nscr = imported.nscr.write().unwrap();
//! assert_eq!(&nscr[..4], b"RCSN");
//!
//! let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
//! assert_eq!(exported.colors, image);
//! ```

pub mod bits;
pub mod color;
pub mod container;
pub mod convert;
pub mod encoding;
pub mod formats;
pub mod pixel;
pub mod quantize;
pub mod tiles;

pub use color::{Color, ColorFormat};
pub use container::{Block, BlockLayout, Container, ReadWarning, Tag, Version};
pub use convert::{export, import, ImportOptions};
pub use encoding::PixelEncoding;
pub use formats::{Nclr, Ncgr, Nscr};
pub use pixel::{Palette, Pixel, TileSize};
pub use tiles::{BgMode, MapInfo, PaletteMode, TileSet};
