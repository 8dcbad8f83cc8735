//! Error types for the Kuwahara pipeline

use crate::texture_store::Stage;

/// Errors surfaced by the Kuwahara pipeline and its editor session
///
/// No error kind is retried automatically. Any error aborts the current filter run
/// and leaves the last successfully rendered image in place.
#[derive(Debug, thiserror::Error)]
pub enum KuwaharaError {
    /// A pass input was not present in the texture store
    #[error("required image '{}' is missing", .0.key())]
    MissingInputImage(Stage),

    /// The core was used before a GPU context was attached
    #[error("GPU device context is not initialized")]
    DeviceUninitialized,

    /// The image decoder or the pixel upload rejected the input
    #[error("unsupported image input: {0}")]
    UnsupportedImageInput(String),

    /// A parameter was out of its declared range or not finite
    #[error("parameter '{name}' = {value} is outside [{min}, {max}]")]
    InvalidParameter { name: &'static str, value: f64, min: f64, max: f64 },

    /// Waiting for submitted GPU work failed
    #[error("GPU submission failed: {0}")]
    Submission(#[from] wgpu::PollError),

    /// Mapping a readback buffer failed
    #[error("failed to map readback buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// Reading a texture back to the host failed
    #[error("texture readback failed: {0}")]
    Readback(String),

    /// A preset file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A preset file could not be parsed
    #[error("invalid preset file: {0}")]
    Preset(#[from] serde_norway::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, KuwaharaError>;
