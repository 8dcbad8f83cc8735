//! Anisotropic Kuwahara filter on wgpu compute shaders
//!
//! This crate renders a painterly version of an image with an anisotropic Kuwahara filter
//! executed as a sequence of GPU compute passes:
//!
//! 1. structure tensor from Sobel gradients of the luminance
//! 2. separable Gaussian smoothing of the tensor (rows, then columns)
//! 3. eigen analysis into orientation and anisotropy
//! 4. the anisotropic filter blending 8 polynomial-weighted sectors of an oriented ellipse
//!
//! The caller supplies the GPU device through [`GpuContext`]; the crate never creates one.
//! [`PipelineOrchestrator`] runs the passes with single-flight semantics and
//! [`KuwaharaEditor`] ties it to image decoding and rendering collaborators.
//!
//! Progress is reported through `tracing`: image loads and completed runs at `info`, pass
//! dispatches at `debug` and superseded runs at `warn`.

mod context;
mod editor;
mod error;
mod orchestrator;
pub mod parameters;
pub mod passes;
pub mod presets;
pub mod shaders;
mod texture_store;

#[cfg(test)]
mod test_support;

pub use context::{GpuContext, PendingSubmission, TEXTURE_USAGE_ORIGINAL, TEXTURE_USAGE_PASS_OUTPUT};
pub use editor::{DecodedImage, ImageCrateDecoder, ImageDecoder, KuwaharaEditor, Renderer};
pub use error::{KuwaharaError, Result};
pub use orchestrator::{PipelineOrchestrator, RunOutcome, RunTicket};
pub use parameters::{KuwaharaParameters, ParameterBuffer};
pub use presets::{KuwaharaPreset, ParameterPresets};
pub use texture_store::{ManagedImage, Stage, TextureStore};
