use ndsgfx::{
    color::{Color, ColorFormat},
    container::ContainerError,
    convert::{self, ConvertError, ImportOptions},
    encoding::PixelEncoding,
    formats::{FormatError, Nclr, Ncgr, Nscr},
    pixel::{Palette, Pixel, TileSize},
    tiles::{BgMode, MapEntries, MapError, MapInfo, PaletteMode, TileSet},
};

const RED: Color = Color::rgb(0xFF, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 0xFF);
const GREEN: Color = Color::rgb(0, 0xFF, 0);

/// A 16x8 image whose right tile is the left one mirrored.
fn mirrored_pair() -> Vec<Color> {
    (0..16 * 8)
        .map(|i| {
            let (x, y) = (i % 16, i / 16);
            let x = if x < 8 { x } else { 15 - x };
            if x < 3 || y == 0 {
                RED
            } else {
                BLUE
            }
        })
        .collect()
}

fn solid_pair(left: Color, right: Color) -> Vec<Color> {
    (0..16 * 8)
        .map(|i| if i % 16 < 8 { left } else { right })
        .collect()
}

#[test]
fn palette_file() {
    let colors: Vec<Color> = [0x0000, 0x7FFF, 0x001F, 0x1234]
        .into_iter()
        .map(Color::from_bgr555)
        .collect();
    let palette = Palette::single(colors);

    let nclr = Nclr::from_palette(&palette, ColorFormat::Indexed4).unwrap();
    let bytes = nclr.write().unwrap();
    assert_eq!(&bytes[..4], b"RLCN");

    let read = Nclr::read(&bytes).unwrap();
    assert_eq!(read, nclr);
    assert_eq!(read.palette().unwrap(), palette);
    assert_eq!(read.format().unwrap(), ColorFormat::Indexed4);
    assert_eq!(read.write().unwrap(), bytes);
}

#[test]
fn palette_file_keeps_sub_palettes_apart() {
    let palette = Palette::new(vec![vec![RED, GREEN], vec![BLUE]]);

    let nclr = Nclr::from_palette(&palette, ColorFormat::Indexed4).unwrap();
    let read = Nclr::read(&nclr.write().unwrap()).unwrap().palette().unwrap();

    assert_eq!(read.len(), 2);
    assert_eq!(&read.sub_palettes()[0][..2], [RED, GREEN]);
    assert!(read.sub_palettes()[0][2..].iter().all(|&c| c == Color::BLACK));
    assert_eq!(read.sub_palettes()[1], [BLUE]);
}

#[test]
fn palette_file_limits() {
    let palette = Palette::single(vec![RED; 17]);
    assert!(matches!(
        Nclr::from_palette(&palette, ColorFormat::Indexed4),
        Err(FormatError::Capacity { value: 17, max: 16, .. })
    ));
    assert!(matches!(
        Nclr::from_palette(&palette, ColorFormat::Abgr1555),
        Err(FormatError::DirectFormat { .. })
    ));
}

#[test]
fn palette_slots() {
    let mut nclr = Nclr::from_palette(&Palette::single(vec![RED]), ColorFormat::Indexed8).unwrap();
    assert_eq!(nclr.palette_slots(), None);

    nclr.set_palette_slots(vec![0, 1, 2]);
    let read = Nclr::read(&nclr.write().unwrap()).unwrap();
    assert_eq!(read.palette_slots(), Some(vec![0, 1, 2]));

    nclr.clear_palette_slots();
    assert_eq!(nclr.palette_slots(), None);
}

#[test]
fn tileset_pixels_are_packed_low_nibble_first() {
    let pixels: Vec<Pixel> = (0..64).map(|i| Pixel::indexed(i % 16)).collect();

    let ncgr = Ncgr::from_pixels(&pixels, 8, 8, ColorFormat::Indexed4, PixelEncoding::Lineal)
        .unwrap();
    let bytes = ncgr.write().unwrap();
    // header, block header, 0x18 bytes of fields
    assert_eq!(&bytes[16 + 8 + 0x18..16 + 8 + 0x18 + 2], [0x10, 0x32]);
    assert_eq!(bytes.len(), 16 + 8 + 0x18 + 32);

    let read = Ncgr::read(&bytes).unwrap();
    assert_eq!(read.pixels().unwrap(), pixels);
}

#[test]
fn tileset_encodings_agree() {
    let pixels: Vec<Pixel> = (0..16 * 16)
        .map(|i| Pixel::indexed((i * 7 % 251) as u32))
        .collect();

    for encoding in [
        PixelEncoding::Lineal,
        PixelEncoding::HorizontalTiles,
        PixelEncoding::VerticalTiles,
    ] {
        let ncgr = Ncgr::from_pixels(&pixels, 16, 16, ColorFormat::Indexed8, encoding).unwrap();
        let read = Ncgr::read(&ncgr.write().unwrap()).unwrap();

        assert_eq!(read.encoding().unwrap(), encoding);
        assert_eq!(read.dimensions().unwrap(), (16, 16));
        assert_eq!(read.pixels().unwrap(), pixels, "{encoding:?}");
        assert_eq!(read.tile_set().unwrap().len(), 4, "{encoding:?}");
    }
}

#[test]
fn tileset_rejects_pixels_the_format_cannot_hold() {
    let pixels = vec![Pixel::indexed(16); 64];
    assert!(matches!(
        Ncgr::from_pixels(&pixels, 8, 8, ColorFormat::Indexed4, PixelEncoding::Lineal),
        Err(FormatError::Pixel { index: 0, .. })
    ));
}

#[test]
fn tile_set_file() {
    let tiles: Vec<Pixel> = (0..33 * 64).map(|i| Pixel::indexed(i / 64 % 16)).collect();
    let set = TileSet::from_tiled_pixels(&tiles, TileSize::NDS);

    let ncgr = Ncgr::from_tiles(&set, ColorFormat::Indexed4).unwrap();
    assert_eq!(ncgr.dimensions().unwrap(), (32 * 8, 2 * 8));

    let read = Ncgr::read(&ncgr.write().unwrap()).unwrap();
    assert_eq!(read.tile_set().unwrap(), set);
    // the unused rest of the last row reads as empty tiles
    assert_eq!(read.pixels().unwrap().len(), 256 * 16);
}

#[test]
fn mapping_is_preserved() {
    let mut ncgr = Ncgr::from_tiles(&TileSet::new(TileSize::NDS), ColorFormat::Indexed8).unwrap();
    ncgr.set_mapping(0x20).unwrap();

    let read = Ncgr::read(&ncgr.write().unwrap()).unwrap();
    assert_eq!(read.mapping().unwrap(), 0x20);
}

#[test]
fn map_file() {
    let entries = vec![
        MapInfo::new(0),
        MapInfo {
            tile_index: 3,
            palette_index: 1,
            flip_x: false,
            flip_y: true,
        },
    ];

    let nscr = Nscr::from_map(&entries, 16, 8, BgMode::Text, PaletteMode::Colors16x16).unwrap();
    let bytes = nscr.write().unwrap();
    assert_eq!(&bytes[..4], b"RCSN");

    let read = Nscr::read(&bytes).unwrap();
    assert_eq!(read.map().unwrap(), entries);
    assert_eq!(read.dimensions().unwrap(), (16, 8));
    assert_eq!(read.bg_mode().unwrap(), BgMode::Text);
    assert_eq!(read.palette_mode().unwrap(), PaletteMode::Colors16x16);
    assert_eq!(read.write().unwrap(), bytes);
}

#[test]
fn map_file_checks_entries() {
    assert!(matches!(
        Nscr::from_map(
            &[MapInfo::new(0)],
            16,
            8,
            BgMode::Text,
            PaletteMode::Colors16x16
        ),
        Err(FormatError::EntryCount {
            expected: 2,
            actual: 1,
            ..
        })
    ));
    assert!(matches!(
        Nscr::from_map(
            &[MapInfo::new(0x400)],
            8,
            8,
            BgMode::Text,
            PaletteMode::Colors16x16
        ),
        Err(FormatError::Map {
            source: MapError::Capacity { .. }
        })
    ));
}

#[test]
fn files_check_their_magic() {
    let nscr = Nscr::from_map(
        &[MapInfo::new(0)],
        8,
        8,
        BgMode::Text,
        PaletteMode::Colors16x16,
    )
    .unwrap();

    assert!(matches!(
        Nclr::read(&nscr.write().unwrap()),
        Err(FormatError::Container {
            source: ContainerError::InvalidMagic { .. }
        })
    ));
}

#[test]
fn import_then_export() {
    let image = mirrored_pair();
    let imported = convert::import(&image, 16, 8, &ImportOptions::default()).unwrap();

    assert_eq!(imported.ncgr.tile_set().unwrap().len(), 1);
    let map = imported.nscr.map().unwrap();
    assert_eq!(map.len(), 2);
    assert!(!map[0].flip_x && map[1].flip_x);

    let palette = imported.nclr.palette().unwrap();
    assert_eq!(palette.color_count(), 16);
    assert_eq!(
        &palette.to_flat()[..3],
        [Color::rgb(0xFF, 0, 0xFF), RED, BLUE]
    );

    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
    assert_eq!((exported.width, exported.height), (16, 8));
    assert_eq!(exported.colors, image);
}

#[test]
fn full_palette_with_backdrop_survives_reimport() {
    // the exported backdrop plus 15 grays, all exact in BGR555
    let colors: Vec<Color> = std::iter::once(Color::from_bgr555(0x7C1F))
        .chain((1..16).map(|i| Color::from_bgr555(i * 0x0421)))
        .collect();
    let image: Vec<Color> = (0..16 * 8).map(|i| colors[i % 16]).collect();

    let imported = convert::import(&image, 16, 8, &ImportOptions::default()).unwrap();
    assert_eq!(imported.nclr.palette().unwrap().to_flat(), colors);

    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
    assert_eq!(exported.colors, image);

    let again = convert::import(&exported.colors, 16, 8, &ImportOptions::default()).unwrap();
    assert_eq!(again, imported);
}

#[test]
fn backdrop_slot_is_kept_free_for_other_images() {
    // 16 colors without the backdrop: only 15 fit next to it
    let colors: Vec<Color> = (1..17).map(|i| Color::from_bgr555(i * 0x0421)).collect();
    let image: Vec<Color> = (0..16 * 8).map(|i| colors[i % 16]).collect();

    let imported = convert::import(&image, 16, 8, &ImportOptions::default()).unwrap();
    let palette = imported.nclr.palette().unwrap().to_flat();
    assert_eq!(palette.len(), 16);
    assert_eq!(palette[0], Color::from_bgr555(0x7C1F));
    assert_eq!(&palette[1..], &colors[..15]);
}

#[test]
fn files_survive_writing() {
    let image = mirrored_pair();
    let imported = convert::import(&image, 16, 8, &ImportOptions::default()).unwrap();

    let nclr = Nclr::read(&imported.nclr.write().unwrap()).unwrap();
    let ncgr = Ncgr::read(&imported.ncgr.write().unwrap()).unwrap();
    let nscr = Nscr::read(&imported.nscr.write().unwrap()).unwrap();

    let exported = convert::export(&nclr, &ncgr, &nscr).unwrap();
    assert_eq!(exported.colors, image);
}

#[test]
fn transparent_pixels_become_the_backdrop() {
    let mut image = solid_pair(RED, RED);
    image[0] = Color::rgba(0, 0xFF, 0, 0);

    let options = ImportOptions::default().backdrop(Color::rgb(0, 0, 0));
    let imported = convert::import(&image, 16, 8, &options).unwrap();
    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();

    assert_eq!(exported.colors[0], Color::rgb(0, 0, 0));
    assert_eq!(exported.colors[1], RED);
    assert_eq!(imported.nclr.palette().unwrap().to_flat()[0], Color::BLACK);
}

#[test]
fn colors_are_reduced_to_the_hardware_depth() {
    let image = solid_pair(Color::rgb(0x0F, 0x88, 0xF3), BLUE);
    let imported = convert::import(&image, 16, 8, &ImportOptions::default()).unwrap();
    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();

    assert_eq!(exported.colors[0], Color::rgb(0x08, 0x8C, 0xF7));
    assert_eq!(exported.colors[8], BLUE);
}

#[test]
fn eight_bit_modes() {
    let image = mirrored_pair();

    for bg_mode in [BgMode::Text, BgMode::Extended] {
        let options = ImportOptions::default()
            .palette_mode(PaletteMode::Colors256x1)
            .bg_mode(bg_mode);
        let imported = convert::import(&image, 16, 8, &options).unwrap();

        assert_eq!(imported.ncgr.format().unwrap(), ColorFormat::Indexed8);
        assert_eq!(imported.nclr.palette().unwrap().color_count(), 256);
        let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
        assert_eq!(exported.colors, image);
    }
}

#[test]
fn affine_maps_have_no_flips() {
    let image = mirrored_pair();
    let options = ImportOptions::default()
        .palette_mode(PaletteMode::Colors256x1)
        .bg_mode(BgMode::Affine);
    let imported = convert::import(&image, 16, 8, &options).unwrap();

    assert_eq!(imported.ncgr.tile_set().unwrap().len(), 2);
    assert_eq!(imported.nscr.entries().unwrap(), MapEntries::Affine(vec![0, 1]));

    let nscr = Nscr::read(&imported.nscr.write().unwrap()).unwrap();
    let exported = convert::export(&imported.nclr, &imported.ncgr, &nscr).unwrap();
    assert_eq!(exported.colors, image);
}

#[test]
fn unsupported_modes() {
    let image = mirrored_pair();
    for (bg_mode, palette_mode) in [
        (BgMode::Extended, PaletteMode::Colors16x16),
        (BgMode::Affine, PaletteMode::Colors16x16),
        (BgMode::Text, PaletteMode::Colors256x16),
        (BgMode::Extended, PaletteMode::Colors256x16),
    ] {
        let options = ImportOptions::default()
            .bg_mode(bg_mode)
            .palette_mode(palette_mode);
        assert!(
            matches!(
                convert::import(&image, 16, 8, &options),
                Err(ConvertError::UnsupportedMode { .. })
            ),
            "{bg_mode:?} {palette_mode:?}"
        );
    }
}

#[test]
fn image_must_match_its_dimensions() {
    let image = mirrored_pair();
    assert!(matches!(
        convert::import(&image, 16, 16, &ImportOptions::default()),
        Err(ConvertError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        convert::import(&image[..12 * 8], 12, 8, &ImportOptions::default()),
        Err(ConvertError::Map { .. })
    ));
}

#[test]
fn fixed_palette_import() {
    let image = solid_pair(RED, BLUE);
    let options = ImportOptions::default().fixed_palette(vec![BLUE, GREEN, RED]);
    let imported = convert::import(&image, 16, 8, &options).unwrap();

    let palette = imported.nclr.palette().unwrap().to_flat();
    assert_eq!(&palette[..4], [Color::rgb(0xFF, 0, 0xFF), BLUE, GREEN, RED]);

    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
    assert_eq!(exported.colors, image);
}

#[test]
fn per_tile_palettes_import() {
    let image = solid_pair(RED, BLUE);
    let options = ImportOptions::default()
        .fixed_palettes(vec![vec![Color::BLACK, RED], vec![Color::BLACK, BLUE]]);
    let imported = convert::import(&image, 16, 8, &options).unwrap();

    // both tiles are "all index 1", in different palettes
    assert_eq!(imported.ncgr.tile_set().unwrap().len(), 1);
    let map = imported.nscr.map().unwrap();
    assert_eq!(map[0].palette_index, 0);
    assert_eq!(map[1].palette_index, 1);
    assert_eq!(imported.nclr.palette().unwrap().len(), 2);

    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
    assert_eq!(exported.colors, image);
}

#[test]
fn per_tile_palettes_keep_their_own_first_color() {
    let mut image = solid_pair(RED, BLUE);
    image[0] = Color::rgba(0, 0xFF, 0, 0);

    let options = ImportOptions::default()
        .backdrop(Color::rgb(0x10, 0x10, 0x10))
        .fixed_palettes(vec![vec![Color::BLACK, RED], vec![Color::BLACK, BLUE]]);
    let imported = convert::import(&image, 16, 8, &options).unwrap();

    let palette = imported.nclr.palette().unwrap();
    assert_eq!(&palette.sub_palettes()[0][..2], [Color::BLACK, RED]);
    assert_eq!(&palette.sub_palettes()[1][..2], [Color::BLACK, BLUE]);

    // transparent pixel lands on the nearest color of its tile's palette
    let exported = convert::export(&imported.nclr, &imported.ncgr, &imported.nscr).unwrap();
    assert_eq!(exported.colors[0], Color::BLACK);
    assert_eq!(exported.colors[1], RED);
}

#[test]
fn per_tile_palettes_need_sixteen_color_mode() {
    let options = ImportOptions::default()
        .palette_mode(PaletteMode::Colors256x1)
        .fixed_palettes(vec![vec![RED]]);
    assert!(matches!(
        convert::import(&solid_pair(RED, RED), 16, 8, &options),
        Err(ConvertError::UnsupportedMode { .. })
    ));
}

#[test]
fn importing_against_reference_tiles() {
    let first = convert::import(&solid_pair(RED, BLUE), 16, 8, &ImportOptions::default()).unwrap();
    let reference = first.ncgr.tile_set().unwrap();

    let options = ImportOptions::default().reference_tiles(reference.clone());
    let second = convert::import(&solid_pair(BLUE, RED), 16, 8, &options).unwrap();
    assert_eq!(second.ncgr.tile_set().unwrap(), reference);

    let checkers: Vec<Color> = (0..64)
        .map(|i| if (i % 8 + i / 8) % 2 == 0 { RED } else { BLUE })
        .collect();
    assert!(matches!(
        convert::import(&checkers, 8, 8, &options),
        Err(ConvertError::Map {
            source: MapError::TileNotFound { tile: 0 }
        })
    ));
}
