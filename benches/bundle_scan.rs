use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use imgbundle::image_bundle::{
    BundleConfig, BundleLayout, BundleReader, BundleWriter, CodecConfig, CodecRegistry,
    ColorSpace, ImageFormat, ImageHeader, PixelType, RasterImage, compute_splits,
    uniform_blocks,
};
use tempfile::TempDir;

fn registry() -> Arc<CodecRegistry> {
    Arc::new(CodecRegistry::with_defaults(CodecConfig::default()))
}

fn gradient(width: usize, height: usize) -> RasterImage {
    let header = ImageHeader::new(ImageFormat::Ppm, ColorSpace::Rgb, width, height, 3)
        .expect("valid header");
    let mut image = RasterImage::new(header, PixelType::Float);
    let pixels = image.pixels_mut();
    for y in 0..height {
        for x in 0..width {
            let v = ((x + y) % 256) as f32 / 255.0;
            let base = (y * width + x) * 3;
            pixels.set_normalized(base, v);
            pixels.set_normalized(base + 1, 1.0 - v);
            pixels.set_normalized(base + 2, 0.5);
        }
    }
    image
}

/// Writes `count` images alternating between small and large sizes.
fn write_bundle(dir: &Path, format: ImageFormat, count: usize) -> PathBuf {
    let path = dir.join(format!("bench-{}.hib", format.name()));
    let mut writer = BundleWriter::open(&path, true, registry(), &BundleConfig::default())
        .expect("open writer");
    let small = gradient(32, 24);
    let large = gradient(256, 192);
    for i in 0..count {
        let image = if i % 2 == 0 { &small } else { &large };
        writer.add_raster(image, format).expect("add image");
    }
    writer.close().expect("close writer");
    path
}

fn benchmark_scan(c: &mut Criterion) {
    let dir = TempDir::new().expect("temp dir");
    let mut group = c.benchmark_group("scan");

    for format in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Ppm] {
        let path = write_bundle(dir.path(), format, 40);

        group.bench_with_input(BenchmarkId::new("decode_all", format), &path, |b, path| {
            b.iter(|| {
                let mut reader = BundleReader::open(path, registry(), &BundleConfig::default())
                    .expect("open reader");
                let mut pixels = 0usize;
                while reader.advance().expect("advance") {
                    if let Some(image) = reader.current_image().expect("image") {
                        pixels += image.width() * image.height();
                    }
                }
                black_box(pixels)
            });
        });

        group.bench_with_input(BenchmarkId::new("culled", format), &path, |b, path| {
            b.iter(|| {
                let mut reader = BundleReader::open(path, registry(), &BundleConfig::default())
                    .expect("open reader")
                    .with_cull_predicate(|header| header.width() < 100);
                let mut kept = 0usize;
                while reader.advance().expect("advance") {
                    if reader.current_image().expect("image").is_some() {
                        kept += 1;
                    }
                }
                black_box(kept)
            });
        });
    }

    group.finish();
}

fn benchmark_splits(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_splits");

    let mut offsets = Vec::with_capacity(100_000);
    let mut end = 0u64;
    for i in 0..100_000u64 {
        end += 8 + 1_000 + (i * 7919) % 50_000;
        offsets.push(end);
    }
    let blocks = uniform_blocks(
        end,
        128 * 1024 * 1024,
        &["node-a".to_string(), "node-b".to_string()],
    );
    let layout = BundleLayout::new("bench.hib.dat", offsets, blocks);

    for requested in [0usize, 16, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(requested),
            &requested,
            |b, &requested| {
                b.iter(|| {
                    compute_splits(black_box(std::slice::from_ref(&layout)), requested)
                        .expect("valid offsets")
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_scan, benchmark_splits);
criterion_main!(benches);
