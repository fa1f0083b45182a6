#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use brush_stylize::engine::pipeline::run_stages;
use brush_stylize::ops::{EnhanceKind, Stage};
use image::RgbImage;
use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Arbitrary, Debug)]
struct StageSeed {
    kind: u8,
    a: u8,
    b: u8,
    c: u8,
}

fn build_image(data: &[u8]) -> RgbImage {
    let width = data.first().copied().unwrap_or(0) as u32 % 48 + 1;
    let height = data.get(1).copied().unwrap_or(0) as u32 % 48 + 1;
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = data.get(i % data.len()).copied().unwrap_or(0);
    }
    RgbImage::from_raw(width, height, buffer).unwrap_or_else(|| RgbImage::new(1, 1))
}

fn seeds_to_stages(seeds: Vec<StageSeed>) -> Vec<Stage> {
    let kinds = [
        EnhanceKind::Color,
        EnhanceKind::Contrast,
        EnhanceKind::Brightness,
        EnhanceKind::Sharpness,
    ];
    seeds
        .into_iter()
        .take(12)
        .map(|s| match s.kind % 7 {
            0 => Stage::GaussianBlend {
                radius: s.a as f32 / 32.0,
                weight: s.b as f32 / 255.0,
            },
            1 => Stage::Enhance {
                kind: kinds[s.a as usize % kinds.len()],
                factor: s.b as f32 / 64.0,
            },
            2 => Stage::LumaNoise {
                sigma: s.a as f32 / 16.0,
                clip: s.b as f32 / 16.0,
            },
            3 => Stage::ChannelNoise {
                sigma: s.a as f32 / 16.0,
            },
            4 => Stage::WarmTone {
                r: s.a as f32 / 128.0,
                g: s.b as f32 / 128.0,
                b: s.c as f32 / 128.0,
            },
            5 => Stage::Quantize { step: s.a },
            _ => Stage::Bilateral {
                diameter: s.a as u32 % 16,
                sigma_color: s.b as f32 + 1.0,
                sigma_space: s.c as f32 + 1.0,
            },
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seeds: Vec<StageSeed> = match Vec::arbitrary(&mut unstructured) {
        Ok(v) => v,
        Err(_) => return,
    };

    let stages = seeds_to_stages(seeds);
    let img = build_image(data);
    let dims = img.dimensions();
    let mut rng = StdRng::seed_from_u64(0);
    // Invalid parameters may be rejected; they must never panic or resize.
    if let Ok(out) = run_stages(img, &stages, &mut rng) {
        assert_eq!(out.dimensions(), dims);
    }
});
