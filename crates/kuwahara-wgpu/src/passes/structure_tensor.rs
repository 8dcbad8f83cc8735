//! Structure tensor pass
//!
//! Converts the original image to luminance (`0.299, 0.587, 0.114`), applies 3x3 Sobel
//! kernels with edge clamping and stores the unnormalized tensor `(Sx², Sy², Sx·Sy, 1)`.

use super::{InputBinding, OutputBinding, PassDescriptor};
use crate::shaders;
use crate::texture_store::Stage;

pub const STRUCTURE_TENSOR: PassDescriptor = PassDescriptor {
    name: "structure_tensor",
    shader: shaders::STRUCTURE_TENSOR,
    entry_point: "main",
    inputs: &[InputBinding {
        binding: 0,
        stage: Stage::Original,
    }],
    output: OutputBinding {
        binding: 1,
        stage: Stage::StructureTensor,
    },
    parameters: None,
};
