//! Kuwahara verification binary
//!
//! This binary runs the GPU pipeline on an image twice to check determinism, then compares
//! the result against the CPU reference engine within tolerance.

use kuwahara_wgpu::{KuwaharaParameters, KuwaharaPreset, PipelineOrchestrator};
use kuwahara_wgpu_verification::{
    compare::{CompareResult, compare_images},
    reference_engine::ReferenceEngine,
    wgpu_helpers::{load_image_file_rgba8, quantize_rgba8, request_context, to_rgba32f},
};

/// Largest per-channel difference between two GPU runs (one 8-bit step)
const DETERMINISM_TOLERANCE: f32 = 1.0 / 255.0;
/// Largest per-channel difference between the GPU and the reference engine
const REFERENCE_TOLERANCE: f32 = 4.0 / 255.0;
/// Share of pixels allowed outside the reference tolerance
///
/// Sector selection amplifies rounding differences where two sectors have nearly equal variance.
const REFERENCE_MISMATCH_RATIO: f64 = 0.01;

fn report(label: &str, result: &CompareResult, allowed_ratio: f64) -> bool {
    match result {
        CompareResult::Match { max_difference } => {
            println!("✓ {label}: match (max difference {max_difference:.5})");
            true
        }
        CompareResult::DimensionMismatch {
            reference_dimensions,
            actual_dimensions,
        } => {
            eprintln!("✗ {label}: dimension mismatch, expected {reference_dimensions:?}, got {actual_dimensions:?}");
            false
        }
        CompareResult::PixelMismatch {
            max_difference,
            mismatched_pixels,
            total_pixels,
            channels_matched,
        } => {
            let ok = result.mismatch_ratio() <= allowed_ratio;
            let mark = if ok { "✓" } else { "✗" };
            println!(
                "{mark} {label}: {mismatched_pixels}/{total_pixels} pixels out of tolerance (max difference {max_difference:.5}, channels matched R {} G {} B {} A {})",
                channels_matched[0], channels_matched[1], channels_matched[2], channels_matched[3]
            );
            ok
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 && args.len() != 3 {
        eprintln!("Usage: {} <input_image> [preset]", args[0]);
        return Ok(());
    }

    let parameters = match args.get(2) {
        Some(name) => KuwaharaPreset::from_name(name).ok_or_else(|| format!("Unknown preset '{name}'"))?.parameters(),
        None => KuwaharaParameters::default(),
    };

    let input_image = load_image_file_rgba8(&args[1]).map_err(|e| format!("Failed to open input image: {e}"))?;
    let (width, height) = input_image.dimensions();
    println!("Input image: {width}x{height}, parameters: {parameters:?}");

    let context = request_context().await?;
    let orchestrator = PipelineOrchestrator::new(context);
    orchestrator.load_original(input_image.as_raw(), width, height)?;

    orchestrator.run(&parameters)?;
    let first = to_rgba32f(&orchestrator.read_output_rgba8()?);
    let outcome = orchestrator.run(&parameters)?;
    let second = to_rgba32f(&orchestrator.read_output_rgba8()?);
    println!("GPU run: {outcome:?}");

    let start = std::time::Instant::now();
    let reference = ReferenceEngine::new(parameters).process(&to_rgba32f(&input_image));
    println!("Reference run took {:.2?}", start.elapsed());

    let deterministic = report("determinism", &compare_images(&first, &second, DETERMINISM_TOLERANCE), 0.0);
    let matches_reference = report(
        "reference",
        &compare_images(&quantize_rgba8(&reference.kuwahara_output), &second, REFERENCE_TOLERANCE),
        REFERENCE_MISMATCH_RATIO,
    );

    orchestrator.teardown();

    if deterministic && matches_reference {
        Ok(())
    } else {
        Err("verification failed".into())
    }
}
