//! Compute passes of the anisotropic Kuwahara pipeline
//!
//! Each pass invocation is described by a static [`PassDescriptor`] naming its shader, entry
//! point and the [`Stage`] images bound to each slot. [`PIPELINE`] lists the invocations in
//! execution order; the orchestrator compiles every entry into a [`CompiledPass`] once.

pub mod anisotropic_kuwahara;
pub mod eigen_analysis;
pub mod gaussian_blur;
pub mod structure_tensor;

use crate::context::GpuContext;
use crate::error::Result;
use crate::parameters::PARAMETER_BUFFER_SIZE;
use crate::texture_store::{ManagedImage, Stage, TextureStore};

/// Compute shader workgroup size in X dimension
pub const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Compute shader workgroup size in Y dimension
pub const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

/// Binding of a stage image read by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBinding {
    /// Shader binding point index
    pub binding: u32,
    /// Stage whose image is bound
    pub stage: Stage,
}

/// Binding of the stage image a pass writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBinding {
    /// Shader binding point index
    pub binding: u32,
    /// Stage the pass produces
    pub stage: Stage,
}

/// Static description of one compute pass invocation
#[derive(Debug, Clone, Copy)]
pub struct PassDescriptor {
    /// Human-readable name for debugging
    pub name: &'static str,
    /// WGSL shader source code
    pub shader: &'static str,
    /// Compute entry point
    pub entry_point: &'static str,
    /// Images read with `textureLoad`
    pub inputs: &'static [InputBinding],
    /// Image written as a storage texture
    pub output: OutputBinding,
    /// Binding of the `KuwaharaParams` uniform, if the pass reads it
    pub parameters: Option<u32>,
}

impl PassDescriptor {
    /// All binding indices the pass uses, sorted
    pub fn bindings(&self) -> Vec<u32> {
        let mut bindings = self.inputs.iter().map(|input| input.binding).chain(std::iter::once(self.output.binding)).chain(self.parameters).collect::<Vec<_>>();
        bindings.sort_unstable();
        bindings
    }

    /// Builds the bind group layout entries of this pass
    fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::new();

        for input in self.inputs {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: input.binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    // Rgba32Float is not filterable without an optional feature; passes only use textureLoad
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        entries.push(wgpu::BindGroupLayoutEntry {
            binding: self.output.binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: self.output.stage.format(),
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });

        if let Some(binding) = self.parameters {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(PARAMETER_BUFFER_SIZE as u64),
                },
                count: None,
            });
        }

        entries.sort_by_key(|entry| entry.binding);
        entries
    }
}

/// Pass invocations in execution order
///
/// Every pass after the first reads the output of an earlier one, so they run strictly in sequence.
pub const PIPELINE: [&PassDescriptor; 5] = [
    &structure_tensor::STRUCTURE_TENSOR,
    &gaussian_blur::HORIZONTAL_BLUR,
    &gaussian_blur::VERTICAL_BLUR,
    &eigen_analysis::EIGEN_ANALYSIS,
    &anisotropic_kuwahara::ANISOTROPIC_KUWAHARA,
];

/// Number of workgroups needed to cover an image
///
/// # Returns
/// `(ceil(width / 8), ceil(height / 8))`
pub fn workgroup_count(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(COMPUTE_WORKGROUP_SIZE_X), height.div_ceil(COMPUTE_WORKGROUP_SIZE_Y))
}

/// A pass compiled against a device, ready to be bound and dispatched
#[derive(Debug)]
pub struct CompiledPass {
    descriptor: &'static PassDescriptor,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl CompiledPass {
    /// Creates the bind group layout and compute pipeline of a pass
    pub fn new(context: &GpuContext, descriptor: &'static PassDescriptor) -> Self {
        let bind_group_layout = context.device().create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(descriptor.name),
            entries: &descriptor.layout_entries(),
        });
        let pipeline = context.create_compute_pipeline(descriptor.name, descriptor.shader, descriptor.entry_point, &bind_group_layout);

        Self {
            descriptor,
            bind_group_layout,
            pipeline,
        }
    }

    pub fn descriptor(&self) -> &'static PassDescriptor {
        self.descriptor
    }

    /// Binds the pass inputs from the store, its fresh output and the parameter uniform
    ///
    /// # Returns
    /// The bind group, or [`crate::KuwaharaError::MissingInputImage`] when an input is not in the store
    pub fn bind(&self, context: &GpuContext, store: &TextureStore, output: &ManagedImage, parameters: &wgpu::Buffer) -> Result<wgpu::BindGroup> {
        let inputs = self.descriptor.inputs.iter().map(|input| Ok((input.binding, store.require(input.stage)?))).collect::<Result<Vec<_>>>()?;

        let mut entries = inputs
            .iter()
            .map(|(binding, image)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(image.view()),
            })
            .collect::<Vec<_>>();

        entries.push(wgpu::BindGroupEntry {
            binding: self.descriptor.output.binding,
            resource: wgpu::BindingResource::TextureView(output.view()),
        });

        if let Some(binding) = self.descriptor.parameters {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: parameters.as_entire_binding(),
            });
        }

        entries.sort_by_key(|entry| entry.binding);

        Ok(context.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.descriptor.name),
            layout: &self.bind_group_layout,
            entries: &entries,
        }))
    }

    /// Records one dispatch covering a `width` x `height` image
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, width: u32, height: u32) {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.descriptor.name),
            timestamp_writes: None,
        });

        compute_pass.set_pipeline(&self.pipeline);
        compute_pass.set_bind_group(0, bind_group, &[]);

        let (workgroup_x, workgroup_y) = workgroup_count(width, height);
        compute_pass.dispatch_workgroups(workgroup_x, workgroup_y, 1);
    }
}
