//! Kuwahara CLI image filter
//!
//! A command-line tool that applies the anisotropic Kuwahara filter to an image file with
//! GPU acceleration. Parameters come from a built-in preset, a YAML preset file, or
//! individual flags, in increasing order of precedence.
//!
//! # Usage
//! ```bash
//! kuwahara-cli input.png output.png --preset oil --kernel-size 12
//! kuwahara-cli input.png output.png --preset-file presets.yaml --preset sketch
//! ```

use clap::Parser;
use kuwahara_wgpu::{GpuContext, ImageCrateDecoder, KuwaharaEditor, KuwaharaParameters, KuwaharaPreset, ManagedImage, ParameterPresets, Renderer, RunOutcome};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments for the Kuwahara filter
#[derive(Parser)]
#[command(version, about = "CLI tool for stylizing images with an anisotropic Kuwahara filter")]
struct Args {
    /// Input image file path
    input: PathBuf,

    /// Output image file path
    output: PathBuf,

    /// Preset name (subtle, painterly, watercolor, oil, or a name from --preset-file)
    #[arg(long, short)]
    preset: Option<String>,

    /// YAML file with named presets
    #[arg(long)]
    preset_file: Option<PathBuf>,

    /// Neighborhood radius driver (1-160)
    #[arg(long)]
    kernel_size: Option<i32>,

    /// Selection weight exponent (0.01-20)
    #[arg(long)]
    sharpness: Option<f32>,

    /// Variance sensitivity (0.1-20)
    #[arg(long)]
    hardness: Option<f32>,

    /// Anisotropy to ellipse axis factor (0.01-10)
    #[arg(long)]
    alpha: Option<f32>,

    /// Sector falloff angle in radians (0-pi)
    #[arg(long)]
    zero_crossing: Option<f32>,

    /// Sector weighting sharpness (0.01-6)
    #[arg(long)]
    zeta: Option<f32>,

    /// Structure tensor smoothing deviation (0.5-200)
    #[arg(long)]
    sigma: Option<f32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

impl Args {
    /// Resolves the preset, then applies individual overrides
    fn parameters(&self) -> Result<KuwaharaParameters, Box<dyn std::error::Error>> {
        let file_presets = self.preset_file.as_ref().map(ParameterPresets::from_file).transpose()?;

        let mut parameters = match &self.preset {
            None => KuwaharaParameters::default(),
            Some(name) => match file_presets.as_ref().and_then(|presets| presets.get(name)) {
                Some(parameters) => *parameters,
                None => KuwaharaPreset::from_name(name).ok_or_else(|| format!("Unknown preset '{name}'"))?.parameters(),
            },
        };

        if let Some(kernel_size) = self.kernel_size {
            parameters.kernel_size = kernel_size;
        }
        if let Some(sharpness) = self.sharpness {
            parameters.sharpness = sharpness;
        }
        if let Some(hardness) = self.hardness {
            parameters.hardness = hardness;
        }
        if let Some(alpha) = self.alpha {
            parameters.alpha = alpha;
        }
        if let Some(zero_crossing) = self.zero_crossing {
            parameters.zero_crossing = zero_crossing;
        }
        if let Some(zeta) = self.zeta {
            parameters.zeta = zeta;
        }
        if let Some(sigma) = self.sigma {
            parameters.sigma = sigma;
        }

        parameters.validate()?;
        Ok(parameters)
    }
}

/// Renderer that writes every rendered image to a file
struct FileRenderer {
    context: Arc<GpuContext>,
    path: PathBuf,
    saved: bool,
}

impl Renderer for FileRenderer {
    fn render(&mut self, image: &ManagedImage) {
        let result = self
            .context
            .read_rgba8(image)
            .map_err(|e| e.to_string())
            .and_then(|pixels| pixels.save(&self.path).map_err(|e| e.to_string()));

        match result {
            Ok(()) => self.saved = true,
            Err(e) => tracing::error!(path = %self.path.display(), "failed to save output: {e}"),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let parameters = args.parameters()?;

    // Initialize wgpu context for GPU processing
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    tracing::info!(adapter = ?adapter.get_info().name, "GPU adapter selected");

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Kuwahara CLI"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: Default::default(),
    }))?;

    let context = Arc::new(GpuContext::new(device, queue));
    let renderer = FileRenderer {
        context: context.clone(),
        path: args.output.clone(),
        saved: false,
    };

    let mut editor = KuwaharaEditor::new(ImageCrateDecoder, renderer);
    editor.attach_context(context);
    editor.set_parameters(parameters)?;

    let bytes = std::fs::read(&args.input)?;
    match editor.load_image(&bytes)? {
        RunOutcome::Completed { width, height, elapsed, .. } => {
            if !editor.renderer().saved {
                return Err(format!("Failed to write {}", args.output.display()).into());
            }
            println!("Filtered {width}x{height} image in {elapsed:.2?}, saved to {}", args.output.display());
        }
        RunOutcome::Superseded { .. } => return Err("Filter run was superseded".into()),
    }

    editor.teardown()?;
    Ok(())
}
