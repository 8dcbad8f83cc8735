//! Explicit GPU device context
//!
//! [`GpuContext`] wraps a device and queue acquired by the caller. The pipeline never creates
//! a device on its own; every component that touches the GPU receives the context as an
//! `Arc<GpuContext>`, so independent editors and tests can share or isolate devices freely.

use crate::error::{KuwaharaError, Result};
use crate::texture_store::{ManagedImage, Stage};
use wgpu::util::DeviceExt;

/// Usage of images written by compute passes and read by later passes or the host
pub const TEXTURE_USAGE_PASS_OUTPUT: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC);

/// Usage of the uploaded original image
pub const TEXTURE_USAGE_ORIGINAL: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

/// Device and queue shared by the pipeline
#[derive(Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// Work submitted to the queue that has not been waited on yet
#[must_use = "pending submissions must be waited on before their outputs are read"]
#[derive(Debug)]
pub struct PendingSubmission {
    device: wgpu::Device,
    index: wgpu::SubmissionIndex,
    label: &'static str,
}

impl PendingSubmission {
    /// Blocks until this submission has finished executing on the GPU
    pub fn wait(self) -> Result<()> {
        self.device.poll(wgpu::PollType::WaitForSubmissionIndex(self.index))?;
        tracing::trace!(label = self.label, "submission completed");
        Ok(())
    }
}

impl GpuContext {
    /// Wraps a device and queue created by the caller
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Allocates an uninitialized 2D image
    ///
    /// # Arguments
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    /// * `format` - Texel format
    /// * `usage` - Texture usage flags
    /// * `label` - Debug label
    pub fn create_image(&self, width: u32, height: u32, format: wgpu::TextureFormat, usage: wgpu::TextureUsages, label: &str) -> ManagedImage {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        ManagedImage::new(texture, 0)
    }

    /// Uploads tightly packed RGBA8 pixels as a new original image
    ///
    /// # Arguments
    /// * `pixels` - Row-major RGBA8 pixel data, `width * height * 4` bytes
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    /// The uploaded image, or [`KuwaharaError::UnsupportedImageInput`] for empty images and
    /// buffers of the wrong length
    pub fn upload_rgba8(&self, pixels: &[u8], width: u32, height: u32) -> Result<ManagedImage> {
        if width == 0 || height == 0 {
            return Err(KuwaharaError::UnsupportedImageInput(format!("image has zero size ({width}x{height})")));
        }

        let limit = self.device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(KuwaharaError::UnsupportedImageInput(format!("image size {width}x{height} exceeds the device limit of {limit}")));
        }

        let expected_len = width as usize * height as usize * 4;
        if pixels.len() != expected_len {
            return Err(KuwaharaError::UnsupportedImageInput(format!(
                "expected {expected_len} bytes of RGBA8 data for {width}x{height}, got {}",
                pixels.len()
            )));
        }

        let image = self.create_image(width, height, Stage::Original.format(), TEXTURE_USAGE_ORIGINAL, Stage::Original.key());
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: image.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        // Flush the staged write so the texture can be destroyed before any pass runs
        let index = self.queue.submit(std::iter::empty());
        let upload = PendingSubmission {
            device: self.device.clone(),
            index,
            label: "upload",
        };
        if let Err(e) = upload.wait() {
            image.destroy();
            return Err(e);
        }

        Ok(image)
    }

    /// Creates a uniform buffer initialized with `contents`
    pub fn create_uniform_buffer(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    /// Compiles a compute pipeline with an explicit bind group layout
    ///
    /// # Arguments
    /// * `label` - Debug label for the module, layout and pipeline
    /// * `source` - WGSL source
    /// * `entry_point` - Compute entry point to use
    /// * `bind_group_layout` - Layout of bind group 0
    pub fn create_compute_pipeline(&self, label: &str, source: &str, entry_point: &str, bind_group_layout: &wgpu::BindGroupLayout) -> wgpu::ComputePipeline {
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        })
    }

    /// Submits recorded commands and returns a handle to wait on
    pub fn submit(&self, label: &'static str, encoder: wgpu::CommandEncoder) -> PendingSubmission {
        let index = self.queue.submit(std::iter::once(encoder.finish()));
        PendingSubmission {
            device: self.device.clone(),
            index,
            label,
        }
    }

    /// Copies an image into host memory
    ///
    /// Rows are copied through a buffer padded to `COPY_BYTES_PER_ROW_ALIGNMENT` and the
    /// padding is stripped, so the result is tightly packed.
    fn read_texture_bytes(&self, image: &ManagedImage, bytes_per_pixel: u32) -> Result<Vec<u8>> {
        let (width, height) = (image.width(), image.height());
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: image.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.submit("readback", encoder).wait()?;

        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::PollType::Wait)?;
        pollster::block_on(receiver.receive()).ok_or_else(|| KuwaharaError::Readback("map callback was dropped".to_string()))??;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in data.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(data);
        buffer.unmap();

        Ok(pixels)
    }

    /// Reads an `Rgba8Unorm` image back to the host
    pub fn read_rgba8(&self, image: &ManagedImage) -> Result<image::RgbaImage> {
        if image.format() != wgpu::TextureFormat::Rgba8Unorm {
            return Err(KuwaharaError::Readback(format!("expected an Rgba8Unorm image, got {:?}", image.format())));
        }

        let pixels = self.read_texture_bytes(image, 4)?;
        image::RgbaImage::from_raw(image.width(), image.height(), pixels).ok_or_else(|| KuwaharaError::Readback("readback size does not match the image".to_string()))
    }

    /// Reads an `Rgba32Float` image back to the host
    pub fn read_rgba_f32(&self, image: &ManagedImage) -> Result<image::Rgba32FImage> {
        if image.format() != wgpu::TextureFormat::Rgba32Float {
            return Err(KuwaharaError::Readback(format!("expected an Rgba32Float image, got {:?}", image.format())));
        }

        let bytes = self.read_texture_bytes(image, 16)?;
        let texels = bytes.chunks_exact(4).map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])).collect();
        image::Rgba32FImage::from_raw(image.width(), image.height(), texels).ok_or_else(|| KuwaharaError::Readback("readback size does not match the image".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    #[test]
    fn test_upload_rejects_zero_size() {
        let Some(context) = test_context() else {
            return;
        };
        assert!(matches!(context.upload_rgba8(&[], 0, 4), Err(KuwaharaError::UnsupportedImageInput(_))));
        assert!(matches!(context.upload_rgba8(&[], 4, 0), Err(KuwaharaError::UnsupportedImageInput(_))));
    }

    #[test]
    fn test_upload_rejects_wrong_length() {
        let Some(context) = test_context() else {
            return;
        };
        let pixels = vec![0u8; 2 * 2 * 4 - 1];
        assert!(matches!(context.upload_rgba8(&pixels, 2, 2), Err(KuwaharaError::UnsupportedImageInput(_))));
    }

    #[test]
    fn test_upload_then_read_back_unaligned_width() {
        let Some(context) = test_context() else {
            return;
        };

        // 3 * 4 bytes per row forces a padded readback
        let (width, height) = (3, 5);
        let pixels = (0..width * height * 4).map(|i| (i * 7 % 251) as u8).collect::<Vec<_>>();
        let image = context.upload_rgba8(&pixels, width, height).unwrap();

        assert_eq!((image.width(), image.height()), (width, height));
        assert_eq!(image.format(), wgpu::TextureFormat::Rgba8Unorm);

        let read = context.read_rgba8(&image).unwrap();
        assert_eq!(read.dimensions(), (width, height));
        assert_eq!(read.as_raw(), &pixels);
    }

    #[test]
    fn test_upload_can_be_destroyed_before_any_submission() {
        let Some(context) = test_context() else {
            return;
        };
        let discarded = context.upload_rgba8(&[1, 2, 3, 4], 1, 1).unwrap();
        discarded.destroy();

        let kept = context.upload_rgba8(&[5, 6, 7, 8], 1, 1).unwrap();
        assert_eq!(context.read_rgba8(&kept).unwrap().as_raw(), &[5, 6, 7, 8]);
    }

    #[test]
    fn test_read_rejects_format_mismatch() {
        let Some(context) = test_context() else {
            return;
        };
        let image = context.upload_rgba8(&[0; 4], 1, 1).unwrap();
        assert!(matches!(context.read_rgba_f32(&image), Err(KuwaharaError::Readback(_))));
    }
}
