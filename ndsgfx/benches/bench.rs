use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndsgfx::{
    color::Color,
    convert::{self, ImportOptions},
    formats::{Nclr, Ncgr, Nscr},
    pixel::TileSize,
    quantize::{AdaptiveQuantization, FloydSteinberg, Quantization},
    tiles,
};

const SIZES: [(usize, usize); 2] = [(256, 192), (512, 512)];

/// A background-like test image: a few tile patterns repeated, some of them mirrored, over a
/// gradient.
fn synthetic(width: usize, height: usize) -> Vec<Color> {
    (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            let (tx, ty) = (x / 8, y / 8);
            let (mut px, py) = (x % 8, y % 8);
            if (tx + ty) % 3 == 0 {
                px = 7 - px;
            }
            let shade = ((tx * 5 + ty * 3) % 12) as u8;
            Color::rgb(
                shade * 20,
                ((px * py) as u8) * 4,
                if px > py { 0xC0 } else { 0x40 },
            )
        })
        .collect()
}

fn quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantize");

    for (width, height) in SIZES {
        let image = synthetic(width, height);
        let name = format!("{width}x{height}");
        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(BenchmarkId::new("adaptive", &name), &image, |b, image| {
            let quantization = AdaptiveQuantization::new(255);
            b.iter(|| quantization.quantize(image, width, height).unwrap())
        });
        group.bench_with_input(
            BenchmarkId::new("adaptive dithered", &name),
            &image,
            |b, image| {
                let quantization = AdaptiveQuantization::new(255).with_dithering(FloydSteinberg);
                b.iter(|| quantization.quantize(image, width, height).unwrap())
            },
        );
    }
}

fn map(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile map");

    for (width, height) in SIZES {
        let image = synthetic(width, height);
        let pixels = AdaptiveQuantization::new(255)
            .quantize(&image, width, height)
            .unwrap()
            .pixels;
        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &pixels,
            |b, pixels| b.iter(|| tiles::map(pixels, width, height, TileSize::NDS).unwrap()),
        );
    }
}

fn files(c: &mut Criterion) {
    let mut group = c.benchmark_group("files");

    for (width, height) in SIZES {
        let image = synthetic(width, height);
        let name = format!("{width}x{height}");
        let imported = convert::import(&image, width, height, &ImportOptions::default()).unwrap();
        let nclr = imported.nclr.write().unwrap();
        let ncgr = imported.ncgr.write().unwrap();
        let nscr = imported.nscr.write().unwrap();

        group.bench_function(BenchmarkId::new("write", &name), |b| {
            b.iter(|| {
                (
                    imported.nclr.write().unwrap(),
                    imported.ncgr.write().unwrap(),
                    imported.nscr.write().unwrap(),
                )
            })
        });
        group.bench_function(BenchmarkId::new("read and export", &name), |b| {
            b.iter(|| {
                let nclr = Nclr::read(&nclr).unwrap();
                let ncgr = Ncgr::read(&ncgr).unwrap();
                let nscr = Nscr::read(&nscr).unwrap();
                convert::export(&nclr, &ncgr, &nscr).unwrap()
            })
        });
    }
}

criterion_group!(benches, quantize, map, files);
criterion_main!(benches);
