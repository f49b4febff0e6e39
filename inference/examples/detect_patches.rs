/// Patch-Based Detection over a Large Image
///
/// Splits the input into overlapping 640x640 patches, runs the detector on
/// every patch, remaps boxes into full-image coordinates, and merges the
/// per-patch results with cross-patch duplicate suppression.
///
/// Usage:
///   cargo run --example detect_patches [image_path]
///
/// Without an argument, a synthetic scene with bright markers is used so
/// the bundled stub detector has something to find.
use image::{Rgb, RgbImage};
use patch_inference::{
    run_patched_inference, CocoClasses, ImageData, MergeMetric, PatchConfig, StubDetector,
};
use std::env;
use std::time::Instant;

fn synthetic_scene() -> ImageData {
    let mut img = RgbImage::from_pixel(1920, 1080, Rgb([24, 28, 32]));
    // Bright markers, two of them inside patch-overlap bands.
    for &(x0, y0, side) in &[
        (200u32, 150u32, 24u32),
        (570, 300, 20),
        (1150, 560, 28),
        (1700, 900, 16),
    ] {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
    }
    ImageData::from_rgb_image(img)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let image = match env::args().nth(1) {
        Some(path) => {
            println!("Loading image from {path}");
            ImageData::from_file(&path)?
        }
        None => {
            println!("No image path given, using a synthetic scene");
            synthetic_scene()
        }
    };
    println!("Image: {}x{}", image.width, image.height);

    let config = PatchConfig {
        patch_width: 640,
        patch_height: 640,
        overlap_x: 0.1,
        overlap_y: 0.1,
        merge_metric: MergeMetric::Ios,
        merge_threshold: 0.5,
        ..Default::default()
    };

    let detector = StubDetector::default();
    let start = Instant::now();
    let result = run_patched_inference(&image, &detector, &CocoClasses, &config)?;
    let elapsed = start.elapsed();

    println!(
        "\n{} detections in {:.1}ms:",
        result.len(),
        elapsed.as_secs_f32() * 1000.0
    );
    for i in 0..result.len() {
        let [xmin, ymin, xmax, ymax] = result.boxes[i].to_bounds();
        println!(
            "  #{:<3} {:<12} conf {:.2}  box ({:.0}, {:.0}) - ({:.0}, {:.0})",
            i + 1,
            result.class_names[i],
            result.scores[i],
            xmin,
            ymin,
            xmax,
            ymax
        );
    }

    Ok(())
}
