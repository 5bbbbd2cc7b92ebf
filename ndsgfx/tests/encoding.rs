use ndsgfx::{
    encoding::{EncodingError, PixelEncoding},
    pixel::TileSize,
};

fn ramp(len: usize) -> Vec<u32> {
    (0..len as u32).collect()
}

#[test]
fn tiled_encodings_are_inverse() {
    let tile = TileSize::NDS;
    for (width, height) in [(8, 8), (16, 8), (8, 24), (32, 16)] {
        let lineal = ramp(width * height);
        for encoding in [
            PixelEncoding::Lineal,
            PixelEncoding::HorizontalTiles,
            PixelEncoding::VerticalTiles,
        ] {
            let encoded = encoding.encode(&lineal, width, height, tile).unwrap();
            assert_eq!(encoded.len(), width * height);
            let decoded = encoding.decode(&encoded, width, height, tile).unwrap();
            assert_eq!(decoded, lineal, "{encoding:?} {width}x{height}");
        }
    }
}

#[test]
fn horizontal_tile_order() {
    // 16x16 image of four tiles
    let tile = TileSize::new(8, 8);
    let h = PixelEncoding::HorizontalTiles;

    assert_eq!(h.index(0, 0, 16, 16, tile), 0);
    assert_eq!(h.index(7, 0, 16, 16, tile), 7);
    assert_eq!(h.index(0, 1, 16, 16, tile), 8);
    assert_eq!(h.index(8, 0, 16, 16, tile), 64);
    assert_eq!(h.index(0, 8, 16, 16, tile), 128);
    assert_eq!(h.index(9, 9, 16, 16, tile), 3 * 64 + 9);
}

#[test]
fn vertical_tile_order() {
    let tile = TileSize::new(8, 8);
    let v = PixelEncoding::VerticalTiles;

    assert_eq!(v.index(0, 8, 16, 16, tile), 64);
    assert_eq!(v.index(8, 0, 16, 16, tile), 128);
    assert_eq!(v.index(9, 9, 16, 16, tile), 3 * 64 + 9);

    // a 16x8 image has one tile per column
    assert_eq!(v.index(8, 0, 16, 8, tile), 64);
}

#[test]
fn non_square_tiles() {
    let tile = TileSize::new(4, 2);
    let lineal = ramp(8 * 4);

    let encoded = PixelEncoding::HorizontalTiles
        .encode(&lineal, 8, 4, tile)
        .unwrap();
    assert_eq!(&encoded[..8], [0, 1, 2, 3, 8, 9, 10, 11]);
    assert_eq!(&encoded[8..16], [4, 5, 6, 7, 12, 13, 14, 15]);
}

#[test]
fn ragged_last_tile_row_decodes_with_defaults() {
    let tile = TileSize::NDS;
    // two 8x8 tiles of data for a 16x12 image: the second tile row is missing
    let tiled: Vec<u32> = (1..=128).collect();

    let decoded = PixelEncoding::HorizontalTiles
        .decode(&tiled, 16, 12, tile)
        .unwrap();
    assert_eq!(decoded.len(), 16 * 12);
    assert_eq!(decoded[0], 1);
    assert_eq!(decoded[8], 65);
    assert!(decoded[16 * 8..].iter().all(|&p| p == 0));
}

#[test]
fn ragged_last_tile_row_encodes_padded() {
    let tile = TileSize::NDS;
    let lineal = vec![7u8; 8 * 12];

    let encoded = PixelEncoding::HorizontalTiles
        .encode(&lineal, 8, 12, tile)
        .unwrap();
    assert_eq!(encoded.len(), 2 * 64);
    assert_eq!(encoded.iter().filter(|&&p| p == 7).count(), 8 * 12);
}

#[test]
fn width_must_be_whole_tiles() {
    let lineal = ramp(12 * 8);

    assert!(matches!(
        PixelEncoding::HorizontalTiles.encode(&lineal, 12, 8, TileSize::NDS),
        Err(EncodingError::TileWidthMismatch {
            width: 12,
            tile_width: 8
        })
    ));
    assert!(matches!(
        PixelEncoding::VerticalTiles.decode(&lineal, 12, 8, TileSize::NDS),
        Err(EncodingError::TileWidthMismatch { .. })
    ));
    // lineal doesn't care
    assert!(PixelEncoding::Lineal
        .encode(&lineal, 12, 8, TileSize::NDS)
        .is_ok());
}

#[test]
fn buffer_must_match_dimensions() {
    assert!(matches!(
        PixelEncoding::HorizontalTiles.encode(&ramp(60), 8, 8, TileSize::NDS),
        Err(EncodingError::BufferSize {
            expected: 64,
            actual: 60
        })
    ));
}

#[test]
fn codes() {
    assert_eq!(PixelEncoding::HorizontalTiles.code(), 0);
    assert_eq!(PixelEncoding::from_code(1), Some(PixelEncoding::Lineal));
    assert_eq!(PixelEncoding::from_code(2), Some(PixelEncoding::VerticalTiles));
    assert_eq!(PixelEncoding::from_code(3), None);
}
