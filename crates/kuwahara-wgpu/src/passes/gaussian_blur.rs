//! Separable Gaussian smoothing of the structure tensor
//!
//! Two invocations of the same shader: rows first, then columns of the row-blurred tensor.
//! The radius is `kernel_size` and the weights `exp(-x²/2σ²)` are renormalized by the sum of
//! the sampled weights, so clamped edge samples do not darken the border.

use super::{InputBinding, OutputBinding, PassDescriptor};
use crate::shaders;
use crate::texture_store::Stage;

/// Binding of the `KuwaharaParams` uniform in `gaussian_blur.wgsl`
const PARAMETERS_BINDING: u32 = 2;

pub const HORIZONTAL_BLUR: PassDescriptor = PassDescriptor {
    name: "horizontal_blur",
    shader: shaders::GAUSSIAN_BLUR,
    entry_point: "main_horizontal",
    inputs: &[InputBinding {
        binding: 0,
        stage: Stage::StructureTensor,
    }],
    output: OutputBinding {
        binding: 1,
        stage: Stage::HorizontalBlur,
    },
    parameters: Some(PARAMETERS_BINDING),
};

pub const VERTICAL_BLUR: PassDescriptor = PassDescriptor {
    name: "vertical_blur",
    shader: shaders::GAUSSIAN_BLUR,
    entry_point: "main_vertical",
    inputs: &[InputBinding {
        binding: 0,
        stage: Stage::HorizontalBlur,
    }],
    output: OutputBinding {
        binding: 1,
        stage: Stage::BlurOutput,
    },
    parameters: Some(PARAMETERS_BINDING),
};
