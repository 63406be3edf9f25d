use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use roi::{
    decode::decode_to_vec,
    encode::{EncodeLut, RoiEncodeContext},
    Channels, Codepath, Colorspace, Descriptor,
};

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 512;

struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }
}

/// (name, pixels) pairs covering the interesting stream shapes: all-run,
/// luma-dominated, and RGB-op-dominated.
fn images(channels: Channels) -> Vec<(&'static str, Vec<u8>)> {
    let ch = channels.bytes();
    let len = (WIDTH * HEIGHT) as usize * ch;

    let flat = vec![93u8; len];

    let mut gradient = vec![0u8; len];
    let mut rng = XorShift(0x1234_5678);
    let mut last = 128u8;
    for byte in gradient.iter_mut() {
        last = last.wrapping_add(((rng.next() >> 24) as u8) % 7).wrapping_sub(3);
        *byte = last;
    }
    if channels == Channels::Rgba {
        for px in 0..(WIDTH * HEIGHT) as usize {
            gradient[px * 4 + 3] = 255;
        }
    }

    let mut noise = vec![0u8; len];
    for byte in noise.iter_mut() {
        *byte = (rng.next() >> 24) as u8;
    }

    vec![("flat", flat), ("gradient", gradient), ("noise", noise)]
}

fn encode(c: &mut Criterion) {
    for channels in [Channels::Rgb, Channels::Rgba] {
        let desc = Descriptor {
            width: WIDTH,
            height: HEIGHT,
            channels,
            colorspace: Colorspace::Srgb,
        };
        let mut group = c.benchmark_group(format!("encode_{}ch", channels.bytes()));
        group.throughput(criterion::Throughput::Elements((WIDTH * HEIGHT) as u64));

        let lut = EncodeLut::build();
        for (name, pixels) in images(channels) {
            group.bench_with_input(BenchmarkId::new("scalar", name), &pixels, |b, pixels| {
                b.iter(|| {
                    RoiEncodeContext::encode_to_vec(pixels, &desc, Codepath::Scalar).unwrap()
                })
            });
            group.bench_with_input(BenchmarkId::new("simd", name), &pixels, |b, pixels| {
                b.iter(|| {
                    RoiEncodeContext::encode_to_vec(pixels, &desc, Codepath::Simd).unwrap()
                })
            });
            group.bench_with_input(BenchmarkId::new("lut", name), &pixels, |b, pixels| {
                b.iter(|| lut.encode_to_vec(pixels, &desc).unwrap())
            });
        }
        group.finish();
    }
}

fn decode(c: &mut Criterion) {
    for channels in [Channels::Rgb, Channels::Rgba] {
        let desc = Descriptor {
            width: WIDTH,
            height: HEIGHT,
            channels,
            colorspace: Colorspace::Srgb,
        };
        let mut group = c.benchmark_group(format!("decode_{}ch", channels.bytes()));
        group.throughput(criterion::Throughput::Elements((WIDTH * HEIGHT) as u64));

        for (name, pixels) in images(channels) {
            let encoded =
                RoiEncodeContext::encode_to_vec(&pixels, &desc, Codepath::Scalar).unwrap();
            group.bench_with_input(BenchmarkId::new("to_vec", name), &encoded, |b, encoded| {
                b.iter(|| decode_to_vec(encoded, None).unwrap())
            });
        }
        group.finish();
    }
}

criterion_group!(benches, encode, decode);
criterion_main!(benches);
