//! GPU image arena keyed by pipeline stage
//!
//! Every image the pipeline produces lives in exactly one [`TextureStore`] slot. Slots are
//! indexed by [`Stage`] rather than free-form strings, so the producer and consumers of each
//! image are checked at compile time.

use crate::error::{KuwaharaError, Result};

/// Pipeline stage that owns an image slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The decoded input image
    Original,
    /// Raw structure tensor `(Gxx, Gyy, Gxy, 1)`
    StructureTensor,
    /// Structure tensor after the horizontal Gaussian pass
    HorizontalBlur,
    /// Structure tensor after both Gaussian passes
    BlurOutput,
    /// `(cos θ, sin θ, anisotropy, λ1)`
    EigenvectorOutput,
    /// Final filtered image
    KuwaharaOutput,
}

impl Stage {
    /// All stages in production order
    pub const ALL: [Stage; 6] = [
        Stage::Original,
        Stage::StructureTensor,
        Stage::HorizontalBlur,
        Stage::BlurOutput,
        Stage::EigenvectorOutput,
        Stage::KuwaharaOutput,
    ];

    /// Returns the semantic key of this stage
    pub fn key(&self) -> &'static str {
        match self {
            Stage::Original => "original",
            Stage::StructureTensor => "structure_tensor",
            Stage::HorizontalBlur => "horizontal_blur",
            Stage::BlurOutput => "blur_output",
            Stage::EigenvectorOutput => "eigenvector_output",
            Stage::KuwaharaOutput => "kuwahara_output",
        }
    }

    /// Returns the texture format images of this stage are stored in
    ///
    /// Tensor intermediates hold squared gradient magnitudes and need full float precision.
    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            Stage::Original | Stage::KuwaharaOutput => wgpu::TextureFormat::Rgba8Unorm,
            Stage::StructureTensor | Stage::HorizontalBlur | Stage::BlurOutput | Stage::EigenvectorOutput => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Whether this stage is computed from the original image
    pub fn is_derived(&self) -> bool {
        *self != Stage::Original
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A GPU image with immutable dimensions and format
///
/// Cloning is cheap; clones refer to the same GPU texture.
#[derive(Debug, Clone)]
pub struct ManagedImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    generation: u64,
}

impl ManagedImage {
    /// Wraps a texture, recording the run generation that produced it
    pub fn new(texture: wgpu::Texture, generation: u64) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, generation }
    }

    /// The underlying texture
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Default view over the whole texture
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    /// Generation of the load or run that produced this image
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Releases the GPU memory of this image
    ///
    /// Outstanding clones become invalid for further GPU use.
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Arena holding at most one image per [`Stage`]
#[derive(Debug, Default)]
pub struct TextureStore {
    slots: [Option<ManagedImage>; Stage::ALL.len()],
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the image of a stage
    pub fn get(&self, stage: Stage) -> Option<&ManagedImage> {
        self.slots[stage.index()].as_ref()
    }

    /// Looks up the image of a stage a pass is about to read
    ///
    /// # Returns
    /// The image, or [`KuwaharaError::MissingInputImage`] when the slot is empty
    pub fn require(&self, stage: Stage) -> Result<&ManagedImage> {
        self.get(stage).ok_or(KuwaharaError::MissingInputImage(stage))
    }

    /// Stores an image, destroying the image previously held by the slot
    pub fn insert(&mut self, stage: Stage, image: ManagedImage) {
        if let Some(previous) = self.slots[stage.index()].replace(image) {
            previous.destroy();
        }
    }

    /// Replaces the original image and invalidates everything derived from it
    pub fn replace_original(&mut self, image: ManagedImage) {
        self.clear_derived();
        self.insert(Stage::Original, image);
    }

    /// Destroys every derived image, keeping the original
    pub fn clear_derived(&mut self) {
        for stage in Stage::ALL.iter().filter(|stage| stage.is_derived()) {
            if let Some(image) = self.slots[stage.index()].take() {
                image.destroy();
            }
        }
    }

    /// Destroys every image
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(image) = slot.take() {
                image.destroy();
            }
        }
    }

    /// Stages currently holding an image, in production order
    pub fn occupied(&self) -> Vec<Stage> {
        Stage::ALL.into_iter().filter(|stage| self.get(*stage).is_some()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
