//! Editor session driving the pipeline from user actions
//!
//! [`KuwaharaEditor`] owns one orchestrator together with the collaborators the pipeline
//! does not implement itself: an [`ImageDecoder`] turning file bytes into pixels and a
//! [`Renderer`] drawing the result. The GPU context is attached after construction, because
//! device acquisition is asynchronous and owned by the host application.

use crate::context::GpuContext;
use crate::error::{KuwaharaError, Result};
use crate::orchestrator::{PipelineOrchestrator, RunOutcome};
use crate::parameters::KuwaharaParameters;
use crate::texture_store::{ManagedImage, Stage};
use std::sync::Arc;

/// Pixels produced by an [`ImageDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Tightly packed RGBA8 pixels
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Turns encoded image bytes into RGBA8 pixels
pub trait ImageDecoder {
    /// # Returns
    /// The decoded pixels, or [`KuwaharaError::UnsupportedImageInput`] when the bytes are not a supported image
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage>;
}

/// Draws an image to the visible surface
pub trait Renderer {
    fn render(&mut self, image: &ManagedImage);
}

/// [`ImageDecoder`] backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let image = image::load_from_memory(bytes).map_err(|e| KuwaharaError::UnsupportedImageInput(e.to_string()))?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(DecodedImage {
            pixels: image.into_raw(),
            width,
            height,
        })
    }
}

/// One editing session: an image, its parameters and the rendered result
pub struct KuwaharaEditor<D: ImageDecoder, R: Renderer> {
    orchestrator: Option<Arc<PipelineOrchestrator>>,
    decoder: D,
    renderer: R,
    parameters: KuwaharaParameters,
    /// Parameters of the last completed run, `None` once the image or context changes
    applied: Option<KuwaharaParameters>,
}

impl<D: ImageDecoder, R: Renderer> KuwaharaEditor<D, R> {
    /// Creates a session without a GPU context
    pub fn new(decoder: D, renderer: R) -> Self {
        Self {
            orchestrator: None,
            decoder,
            renderer,
            parameters: KuwaharaParameters::default(),
            applied: None,
        }
    }

    /// Compiles the pipeline on `context`, replacing any previously attached one
    pub fn attach_context(&mut self, context: Arc<GpuContext>) {
        if let Some(previous) = self.orchestrator.take() {
            previous.teardown();
        }
        self.applied = None;
        self.orchestrator = Some(Arc::new(PipelineOrchestrator::new(context)));
    }

    /// The orchestrator, shared so runs can be started from other threads
    pub fn orchestrator(&self) -> Result<&Arc<PipelineOrchestrator>> {
        self.orchestrator.as_ref().ok_or(KuwaharaError::DeviceUninitialized)
    }

    pub fn parameters(&self) -> &KuwaharaParameters {
        &self.parameters
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Decodes and uploads a new image, then filters it with the current parameters
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<RunOutcome> {
        let orchestrator = self.orchestrator()?.clone();
        let decoded = self.decoder.decode(bytes)?;
        orchestrator.load_original(&decoded.pixels, decoded.width, decoded.height)?;
        self.applied = None;
        self.run(&orchestrator)
    }

    /// Updates the parameters and re-runs the filter unless the displayed output already uses them
    ///
    /// A failed or superseded run leaves the parameters unapplied, so setting the same
    /// parameters again retries the run.
    ///
    /// # Returns
    /// `None` when the parameters match the last completed run or no image is loaded yet
    pub fn set_parameters(&mut self, parameters: KuwaharaParameters) -> Result<Option<RunOutcome>> {
        let orchestrator = self.orchestrator()?.clone();
        parameters.validate()?;
        self.parameters = parameters;

        if self.applied == Some(parameters) || orchestrator.image(Stage::Original).is_none() {
            return Ok(None);
        }
        self.run(&orchestrator).map(Some)
    }

    /// Runs the filter again with the current parameters
    pub fn rerun(&mut self) -> Result<RunOutcome> {
        let orchestrator = self.orchestrator()?.clone();
        self.run(&orchestrator)
    }

    fn run(&mut self, orchestrator: &PipelineOrchestrator) -> Result<RunOutcome> {
        let outcome = orchestrator.run(&self.parameters)?;
        if outcome.is_completed() {
            self.applied = Some(self.parameters);
            if let Some(output) = orchestrator.output() {
                self.renderer.render(&output);
            }
        }
        Ok(outcome)
    }

    /// Destroys every image and detaches the GPU context
    pub fn teardown(&mut self) -> Result<()> {
        let orchestrator = self.orchestrator.take().ok_or(KuwaharaError::DeviceUninitialized)?;
        orchestrator.teardown();
        self.applied = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    #[derive(Default)]
    struct RecordingRenderer {
        rendered: Vec<(u32, u32, u64)>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, image: &ManagedImage) {
            self.rendered.push((image.width(), image.height(), image.generation()));
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba([(x * 40) as u8, (y * 40) as u8, 128, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_decoder_reads_png() {
        let decoded = ImageCrateDecoder.decode(&png_bytes(3, 2)).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.pixels.len(), 3 * 2 * 4);
        assert_eq!(&decoded.pixels[4..8], &[40, 0, 128, 255]);
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        assert!(matches!(ImageCrateDecoder.decode(b"not an image"), Err(KuwaharaError::UnsupportedImageInput(_))));
    }

    #[test]
    fn test_operations_require_context() {
        let mut editor = KuwaharaEditor::new(ImageCrateDecoder, RecordingRenderer::default());
        assert!(matches!(editor.load_image(&png_bytes(2, 2)), Err(KuwaharaError::DeviceUninitialized)));
        assert!(matches!(editor.set_parameters(KuwaharaParameters::default()), Err(KuwaharaError::DeviceUninitialized)));
        assert!(matches!(editor.rerun(), Err(KuwaharaError::DeviceUninitialized)));
        assert!(matches!(editor.teardown(), Err(KuwaharaError::DeviceUninitialized)));
        assert!(editor.renderer().rendered.is_empty());
    }

    #[test]
    fn test_session_renders_completed_runs() {
        let Some(context) = test_context() else {
            return;
        };
        let mut editor = KuwaharaEditor::new(ImageCrateDecoder, RecordingRenderer::default());
        editor.attach_context(context);

        // No image yet: parameter changes are stored without running
        let smaller_kernel = KuwaharaParameters {
            kernel_size: 4,
            ..Default::default()
        };
        assert_eq!(editor.set_parameters(smaller_kernel).unwrap(), None);

        assert!(editor.load_image(&png_bytes(6, 5)).unwrap().is_completed());
        assert_eq!(editor.renderer().rendered.len(), 1);
        assert_eq!(editor.renderer().rendered[0].0, 6);

        // Unchanged parameters do not trigger a run
        assert_eq!(editor.set_parameters(smaller_kernel).unwrap(), None);
        assert_eq!(editor.renderer().rendered.len(), 1);

        let sharper = KuwaharaParameters {
            sharpness: 12.0,
            ..smaller_kernel
        };
        assert!(editor.set_parameters(sharper).unwrap().is_some_and(|outcome| outcome.is_completed()));
        assert_eq!(editor.renderer().rendered.len(), 2);

        editor.teardown().unwrap();
        assert!(matches!(editor.rerun(), Err(KuwaharaError::DeviceUninitialized)));
    }

    #[test]
    fn test_failed_load_keeps_last_render() {
        let Some(context) = test_context() else {
            return;
        };
        let mut editor = KuwaharaEditor::new(ImageCrateDecoder, RecordingRenderer::default());
        editor.attach_context(context);

        editor.load_image(&png_bytes(4, 4)).unwrap();
        let rendered = editor.renderer().rendered.clone();

        assert!(matches!(editor.load_image(b"\x89PNG broken"), Err(KuwaharaError::UnsupportedImageInput(_))));
        assert!(matches!(
            editor.set_parameters(KuwaharaParameters {
                hardness: 100.0,
                ..Default::default()
            }),
            Err(KuwaharaError::InvalidParameter { name: "hardness", .. })
        ));
        assert_eq!(editor.renderer().rendered, rendered);
        assert!(editor.orchestrator().unwrap().output().is_some());
    }

    #[test]
    fn test_unapplied_parameters_run_when_set_again() {
        let Some(context) = test_context() else {
            return;
        };
        let mut editor = KuwaharaEditor::new(ImageCrateDecoder, RecordingRenderer::default());
        editor.attach_context(context);
        editor.load_image(&png_bytes(4, 4)).unwrap();

        // The image disappears behind the session, so the change cannot be applied
        let orchestrator = editor.orchestrator().unwrap().clone();
        orchestrator.teardown();
        let softer = KuwaharaParameters {
            hardness: 2.0,
            ..Default::default()
        };
        assert_eq!(editor.set_parameters(softer).unwrap(), None);
        assert_eq!(editor.parameters(), &softer);

        let decoded = ImageCrateDecoder.decode(&png_bytes(4, 4)).unwrap();
        orchestrator.load_original(&decoded.pixels, decoded.width, decoded.height).unwrap();

        assert!(editor.set_parameters(softer).unwrap().is_some_and(|outcome| outcome.is_completed()));
        assert_eq!(editor.renderer().rendered.len(), 2);
        assert_eq!(editor.set_parameters(softer).unwrap(), None);
    }
}
