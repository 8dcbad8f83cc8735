//! Pipeline execution with single-flight run semantics
//!
//! [`PipelineOrchestrator`] sequences the compute passes over the images of its
//! [`TextureStore`]. Every run holds a [`RunTicket`] carrying a monotonically increasing
//! generation. Loading an image, starting a newer run or tearing down bumps the latest
//! generation; a run whose ticket is no longer the latest stops at its next check and never
//! publishes its outputs.

use crate::context::{GpuContext, TEXTURE_USAGE_PASS_OUTPUT};
use crate::error::{KuwaharaError, Result};
use crate::parameters::KuwaharaParameters;
use crate::passes::{CompiledPass, PIPELINE, workgroup_count};
use crate::texture_store::{ManagedImage, Stage, TextureStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Permission to execute one run, tied to the generation it was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    generation: u64,
}

impl RunTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// Every pass ran and the final image was published
    Completed {
        /// Generation of the run
        generation: u64,
        /// Output width in pixels
        width: u32,
        /// Output height in pixels
        height: u32,
        /// Wall time from validation to the last commit
        elapsed: Duration,
    },
    /// A newer load, run or teardown took over; nothing further was published
    Superseded {
        /// Generation of the abandoned run
        generation: u64,
        /// Generation that superseded it
        latest: u64,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// Store contents and the generation allowed to publish into it
#[derive(Debug, Default)]
struct SharedState {
    store: TextureStore,
    latest_generation: u64,
}

impl SharedState {
    fn next_generation(&mut self) -> u64 {
        self.latest_generation += 1;
        self.latest_generation
    }

    fn superseded(&self, ticket: RunTicket) -> Option<RunOutcome> {
        (ticket.generation != self.latest_generation).then_some(RunOutcome::Superseded {
            generation: ticket.generation,
            latest: self.latest_generation,
        })
    }
}

/// Runs the anisotropic Kuwahara passes for one editor session
#[derive(Debug)]
pub struct PipelineOrchestrator {
    context: Arc<GpuContext>,
    passes: Vec<CompiledPass>,
    state: Mutex<SharedState>,
}

impl PipelineOrchestrator {
    /// Compiles every pass against the given context
    pub fn new(context: Arc<GpuContext>) -> Self {
        let passes = PIPELINE.iter().map(|descriptor| CompiledPass::new(&context, descriptor)).collect();

        Self {
            context,
            passes,
            state: Mutex::new(SharedState::default()),
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Locks the shared state
    ///
    /// A panic while the lock was held cannot leave the store half-updated, so poisoning is ignored.
    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Uploads a new original image, destroying every image derived from the previous one
    ///
    /// Runs in flight are superseded.
    ///
    /// # Arguments
    /// * `pixels` - Tightly packed RGBA8 pixels
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    pub fn load_original(&self, pixels: &[u8], width: u32, height: u32) -> Result<ManagedImage> {
        let image = self.context.upload_rgba8(pixels, width, height)?;

        let mut state = self.state();
        let generation = state.next_generation();
        let image = image.with_generation(generation);
        state.store.replace_original(image.clone());

        tracing::info!(width, height, generation, "loaded original image");
        Ok(image)
    }

    /// Issues a ticket for a new run, superseding every earlier ticket
    pub fn begin_run(&self) -> RunTicket {
        RunTicket {
            generation: self.state().next_generation(),
        }
    }

    /// Executes every pass in order for a previously issued ticket
    ///
    /// Each pass writes a freshly allocated image, is submitted on its own and waited on before
    /// the next pass starts. The ticket is checked under the store lock before every dispatch
    /// and before every output is published.
    ///
    /// # Returns
    /// The outcome of the run, or the first error encountered. Errors abort the run and leave
    /// the last published output in place.
    #[tracing::instrument(skip_all, fields(generation = ticket.generation))]
    pub fn execute(&self, ticket: RunTicket, parameters: &KuwaharaParameters) -> Result<RunOutcome> {
        let start = Instant::now();
        parameters.validate()?;

        let (width, height) = {
            let state = self.state();
            if let Some(outcome) = state.superseded(ticket) {
                tracing::warn!(latest = state.latest_generation, "run superseded before start");
                return Ok(outcome);
            }
            let original = state.store.require(Stage::Original)?;
            (original.width(), original.height())
        };

        let uniform = self.context.create_uniform_buffer("Kuwahara Parameters", parameters.to_buffer().as_bytes());

        for pass in &self.passes {
            let descriptor = pass.descriptor();
            let stage = descriptor.output.stage;
            let output = self.context.create_image(width, height, stage.format(), TEXTURE_USAGE_PASS_OUTPUT, stage.key()).with_generation(ticket.generation);

            // Submitting under the lock keeps a newer run from destroying this pass's inputs before they are in use
            let submission = {
                let state = self.state();
                if let Some(outcome) = state.superseded(ticket) {
                    tracing::warn!(pass = descriptor.name, latest = state.latest_generation, "run superseded");
                    output.destroy();
                    return Ok(outcome);
                }

                let bind_group = match pass.bind(&self.context, &state.store, &output, &uniform) {
                    Ok(bind_group) => bind_group,
                    Err(e) => {
                        output.destroy();
                        return Err(e);
                    }
                };

                let mut encoder = self.context.device().create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(descriptor.name) });
                pass.encode(&mut encoder, &bind_group, width, height);
                tracing::debug!(pass = descriptor.name, workgroups = ?workgroup_count(width, height), "dispatching");
                self.context.submit(descriptor.name, encoder)
            };

            if let Err(e) = submission.wait() {
                output.destroy();
                return Err(e);
            }

            let mut state = self.state();
            if let Some(outcome) = state.superseded(ticket) {
                tracing::warn!(pass = descriptor.name, latest = state.latest_generation, "run superseded, discarding output");
                output.destroy();
                return Ok(outcome);
            }
            state.store.insert(stage, output);
        }

        let elapsed = start.elapsed();
        tracing::info!(width, height, ?elapsed, "filter run completed");

        Ok(RunOutcome::Completed {
            generation: ticket.generation,
            width,
            height,
            elapsed,
        })
    }

    /// Starts and executes a run with the given parameters
    pub fn run(&self, parameters: &KuwaharaParameters) -> Result<RunOutcome> {
        let ticket = self.begin_run();
        self.execute(ticket, parameters)
    }

    /// Returns the image currently published for a stage
    pub fn image(&self, stage: Stage) -> Option<ManagedImage> {
        self.state().store.get(stage).cloned()
    }

    /// Returns the latest published filter output
    pub fn output(&self) -> Option<ManagedImage> {
        self.image(Stage::KuwaharaOutput)
    }

    /// Reads the latest published filter output back to the host
    pub fn read_output_rgba8(&self) -> Result<image::RgbaImage> {
        let output = self.output().ok_or(KuwaharaError::MissingInputImage(Stage::KuwaharaOutput))?;
        self.context.read_rgba8(&output)
    }

    /// Most recent generation issued by a load, run or teardown
    pub fn latest_generation(&self) -> u64 {
        self.state().latest_generation
    }

    /// Destroys every image and supersedes runs in flight
    pub fn teardown(&self) {
        let mut state = self.state();
        let generation = state.next_generation();
        state.store.clear();
        tracing::info!(generation, "pipeline torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        color.iter().copied().cycle().take((width * height * 4) as usize).collect()
    }

    fn max_channel_difference(a: &image::RgbaImage, b: &[u8]) -> u8 {
        a.as_raw().iter().zip(b).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
    }

    #[test]
    fn test_output_matches_input_dimensions() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);

        // Neither dimension is a multiple of the workgroup size
        let (width, height) = (13, 7);
        let pixels = (0..width * height * 4).map(|i| (i * 37 % 256) as u8).collect::<Vec<_>>();
        orchestrator.load_original(&pixels, width, height).unwrap();

        let outcome = orchestrator.run(&KuwaharaParameters::default()).unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { width: 13, height: 7, .. }), "{outcome:?}");

        let output = orchestrator.read_output_rgba8().unwrap();
        assert_eq!(output.dimensions(), (width, height));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);

        let (width, height) = (24, 16);
        let pixels = (0..width * height * 4).map(|i| ((i * 97 + i / 7) % 256) as u8).collect::<Vec<_>>();
        orchestrator.load_original(&pixels, width, height).unwrap();

        orchestrator.run(&KuwaharaParameters::default()).unwrap();
        let first = orchestrator.read_output_rgba8().unwrap();
        orchestrator.run(&KuwaharaParameters::default()).unwrap();
        let second = orchestrator.read_output_rgba8().unwrap();

        assert!(max_channel_difference(&first, second.as_raw()) <= 1);
    }

    #[test]
    fn test_uniform_region_is_reproduced() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context.clone());

        let pixels = solid(16, 16, [100, 150, 200, 255]);
        orchestrator.load_original(&pixels, 16, 16).unwrap();
        orchestrator.run(&KuwaharaParameters::default()).unwrap();

        let eigen = context.read_rgba_f32(&orchestrator.image(Stage::EigenvectorOutput).unwrap()).unwrap();
        assert!(eigen.pixels().all(|pixel| pixel[2] == 0.0), "flat image must have zero anisotropy");

        let output = orchestrator.read_output_rgba8().unwrap();
        assert_eq!(output.as_raw(), &pixels);
    }

    #[test]
    fn test_tiny_images_stay_finite() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context.clone());

        for (width, height) in [(1, 1), (2, 2)] {
            let pixels = (0..width * height * 4).map(|i| (i * 61 % 256) as u8).collect::<Vec<_>>();
            orchestrator.load_original(&pixels, width, height).unwrap();
            assert!(orchestrator.run(&KuwaharaParameters::default()).unwrap().is_completed());

            for stage in [Stage::StructureTensor, Stage::BlurOutput, Stage::EigenvectorOutput] {
                let image = context.read_rgba_f32(&orchestrator.image(stage).unwrap()).unwrap();
                assert!(image.as_raw().iter().all(|value| value.is_finite()), "{stage} at {width}x{height}");
            }
            assert_eq!(orchestrator.read_output_rgba8().unwrap().dimensions(), (width, height));
        }
    }

    #[test]
    fn test_kernel_size_one_keeps_source() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);

        // Horizontal ramp in the red channel, 8 levels per pixel
        let (width, height) = (16u32, 8u32);
        let pixels = (0..height).flat_map(|_| (0..width).flat_map(|x| [(x * 8) as u8, 90, 30, 255])).collect::<Vec<_>>();
        orchestrator.load_original(&pixels, width, height).unwrap();

        let parameters = KuwaharaParameters {
            kernel_size: 1,
            ..Default::default()
        };
        orchestrator.run(&parameters).unwrap();

        let output = orchestrator.read_output_rgba8().unwrap();
        assert!(max_channel_difference(&output, &pixels) <= 8);
    }

    #[test]
    fn test_superseded_run_publishes_nothing() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);
        orchestrator.load_original(&solid(8, 8, [10, 20, 30, 255]), 8, 8).unwrap();

        let stale = orchestrator.begin_run();
        let current = orchestrator.begin_run();

        let outcome = orchestrator.execute(stale, &KuwaharaParameters::default()).unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Superseded {
                generation: stale.generation(),
                latest: current.generation(),
            }
        );
        assert!(orchestrator.output().is_none());

        let outcome = orchestrator.execute(current, &KuwaharaParameters::default()).unwrap();
        assert!(outcome.is_completed());
        assert_eq!(orchestrator.output().unwrap().generation(), current.generation());
    }

    #[test]
    fn test_run_without_original_fails() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);
        assert!(matches!(
            orchestrator.run(&KuwaharaParameters::default()),
            Err(KuwaharaError::MissingInputImage(Stage::Original))
        ));
    }

    #[test]
    fn test_invalid_parameters_fail_before_gpu_work() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);
        orchestrator.load_original(&solid(4, 4, [0, 0, 0, 255]), 4, 4).unwrap();

        let parameters = KuwaharaParameters {
            sigma: 0.0,
            ..Default::default()
        };
        assert!(matches!(orchestrator.run(&parameters), Err(KuwaharaError::InvalidParameter { name: "sigma", .. })));
        assert!(orchestrator.image(Stage::StructureTensor).is_none());
    }

    #[test]
    fn test_new_image_and_teardown_invalidate_outputs() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);
        orchestrator.load_original(&solid(4, 4, [255, 0, 0, 255]), 4, 4).unwrap();
        orchestrator.run(&KuwaharaParameters::default()).unwrap();
        assert!(orchestrator.output().is_some());

        orchestrator.load_original(&solid(2, 2, [0, 255, 0, 255]), 2, 2).unwrap();
        assert!(orchestrator.output().is_none());
        assert!(orchestrator.image(Stage::Original).is_some());

        let in_flight = orchestrator.begin_run();
        orchestrator.teardown();
        assert!(orchestrator.image(Stage::Original).is_none());
        assert!(!orchestrator.execute(in_flight, &KuwaharaParameters::default()).unwrap().is_completed());
    }

    #[test]
    fn test_replacing_image_before_first_run() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);
        orchestrator.load_original(&solid(4, 4, [255, 0, 0, 255]), 4, 4).unwrap();
        orchestrator.load_original(&solid(2, 2, [0, 0, 255, 255]), 2, 2).unwrap();

        let outcome = orchestrator.run(&KuwaharaParameters::default()).unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { width: 2, height: 2, .. }), "{outcome:?}");
        assert_eq!(orchestrator.read_output_rgba8().unwrap().as_raw(), &solid(2, 2, [0, 0, 255, 255]));
    }

    #[test]
    fn test_teardown_right_after_load() {
        let Some(context) = test_context() else {
            return;
        };
        let orchestrator = PipelineOrchestrator::new(context);
        orchestrator.load_original(&solid(4, 4, [0, 255, 0, 255]), 4, 4).unwrap();
        orchestrator.teardown();

        orchestrator.load_original(&solid(3, 3, [9, 9, 9, 255]), 3, 3).unwrap();
        assert!(orchestrator.run(&KuwaharaParameters::default()).unwrap().is_completed());
    }
}
