//! Eigen analysis of the smoothed structure tensor
//!
//! Closed-form eigenvalues of the 2x2 symmetric tensor with the discriminant clamped at zero,
//! orientation `θ = atan2(2Gxy, Gxx - Gyy) / 2` and anisotropy `(λ1 - λ2) / (λ1 + λ2)`.
//! The output stores `(cos θ, sin θ, anisotropy, λ1)` so the filter pass does not repeat the
//! trigonometry. Flat regions (`λ1 + λ2 < ε`) get anisotropy 0 and θ 0.

use super::{InputBinding, OutputBinding, PassDescriptor};
use crate::shaders;
use crate::texture_store::Stage;

pub const EIGEN_ANALYSIS: PassDescriptor = PassDescriptor {
    name: "eigen_analysis",
    shader: shaders::EIGEN_ANALYSIS,
    entry_point: "main",
    inputs: &[InputBinding {
        binding: 0,
        stage: Stage::BlurOutput,
    }],
    output: OutputBinding {
        binding: 1,
        stage: Stage::EigenvectorOutput,
    },
    parameters: None,
};
