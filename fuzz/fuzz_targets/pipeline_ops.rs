#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use raw_image_cache::engine::{apply_ops, optimize_ops, RawImageBuffer};
use raw_image_cache::ops::{Operation, OperationEffect, Palette};

#[derive(Arbitrary, Debug)]
struct OperationSeed {
    kind: u8,
    a: i32,
    b: i32,
    c: i32,
    d: i32,
    seed: u64,
}

fn build_image(data: &[u8]) -> RawImageBuffer {
    let width = data.first().copied().unwrap_or(0) as u32 % 48 + 1;
    let height = data.get(1).copied().unwrap_or(0) as u32 % 48 + 1;
    RawImageBuffer::from_fn(width, height, |x, y| {
        let i = (y * width + x) as usize * 4;
        let at = |k: usize| data.get((i + k) % data.len()).copied().unwrap_or(0);
        [at(0), at(1), at(2), at(3)]
    })
    .unwrap_or_else(|_| RawImageBuffer::filled(1, 1, [0, 0, 0, 255]).unwrap())
}

fn palette(b: i32) -> Palette {
    match b.rem_euclid(3) {
        0 => Palette::Heat,
        1 => Palette::Cool,
        _ => Palette::Ocean,
    }
}

// Parameters are left unclamped on purpose so validation paths get exercised;
// only sizes that would allocate a lot are bounded.
fn seeds_to_ops(seeds: Vec<OperationSeed>) -> Vec<Operation> {
    seeds
        .into_iter()
        .take(12)
        .map(|seed| match seed.kind % 23 {
            0 => Operation::Grayscale,
            1 => Operation::Invert,
            2 => Operation::Posterize { levels: seed.a as u32 },
            3 => Operation::Pixelize { block_size: seed.a as u32 },
            4 => Operation::Brightness { offset: seed.a },
            5 => Operation::Contrast { amount: seed.a },
            6 => Operation::Sepia,
            7 => Operation::Blur { radius: seed.a as u32 % 80 },
            8 => Operation::Sharpen,
            9 => Operation::Emboss,
            10 => Operation::EdgeDetect,
            11 => Operation::Sketch { radius: seed.a as u32 % 80 },
            12 => Operation::Cartoon {
                levels: seed.a as u32,
                edge_threshold: seed.b as u32,
            },
            13 => Operation::Glow {
                radius: seed.a as u32 % 80,
                intensity: seed.b as u32,
            },
            14 => Operation::ColorMap { palette: palette(seed.b) },
            15 => Operation::Vignette { strength: seed.a as u32 },
            16 => Operation::Noise {
                amount: seed.a as u32,
                seed: seed.seed,
            },
            17 => Operation::Downsample { factor: seed.a as u32 },
            18 => Operation::Resize {
                width: seed.a as u32 % 257,
                height: seed.b as u32 % 257,
            },
            19 => Operation::Crop {
                x: seed.a as u32,
                y: seed.b as u32,
                width: seed.c as u32,
                height: seed.d as u32,
            },
            20 => Operation::FlipH,
            21 => Operation::FlipV,
            _ => Operation::Rotate { degrees: seed.a },
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seeds: Vec<OperationSeed> = match Vec::arbitrary(&mut unstructured) {
        Ok(v) => v,
        Err(_) => return,
    };

    let ops = seeds_to_ops(seeds);
    let img = build_image(data);
    // Errors are expected for out-of-range parameters; only panics are bugs.
    let Ok(out) = apply_ops(&img, &ops) else {
        return;
    };
    assert!(out.is_structurally_valid());

    let resizes = optimize_ops(&ops)
        .iter()
        .any(|op| op.contract().effects.contains(OperationEffect::RESIZES));
    if !resizes {
        assert_eq!(out.dimensions(), img.dimensions());
    }
});
