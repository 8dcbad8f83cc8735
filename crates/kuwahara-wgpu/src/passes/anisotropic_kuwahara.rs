//! Anisotropic Kuwahara filter pass
//!
//! For each pixel an ellipse aligned with the local orientation is sampled:
//!
//! 1. semi-axes `a`, `b` are `kernel_size / 2` scaled by `(alpha + A) / alpha` and its inverse,
//!    each clamped to `[0.1, 2.0]`
//! 2. offsets inside the bounding box are mapped into the unit circle and rejected outside it
//! 3. 8 polynomial sector weights `max(0, p + ζ - η·q²)²` are normalized and multiplied by a
//!    Gaussian falloff `exp(-3.125|v|²)`
//! 4. each sector contributes its weighted mean, blended by `1 / (1 + (hardness·1000·σ²)^(sharpness/2))`
//!
//! `η = (ζ + cos(zero_crossing)) / sin²(zero_crossing)`, falling back to `ζ` when the sine
//! vanishes. When no sector contributes, the source pixel is kept. The iteration area grows
//! with `kernel_size²`, which makes this the dominant cost of a run.

use super::{InputBinding, OutputBinding, PassDescriptor};
use crate::shaders;
use crate::texture_store::Stage;

pub const ANISOTROPIC_KUWAHARA: PassDescriptor = PassDescriptor {
    name: "anisotropic_kuwahara",
    shader: shaders::ANISOTROPIC_KUWAHARA,
    entry_point: "main",
    inputs: &[
        InputBinding {
            binding: 0,
            stage: Stage::Original,
        },
        InputBinding {
            binding: 1,
            stage: Stage::EigenvectorOutput,
        },
    ],
    output: OutputBinding {
        binding: 2,
        stage: Stage::KuwaharaOutput,
    },
    parameters: Some(3),
};
