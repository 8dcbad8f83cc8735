//! wgpu utility functions for verification
//!
//! This module provides device acquisition and image conversion helpers shared by the
//! verification binaries.

use kuwahara_wgpu::GpuContext;
use std::sync::Arc;

/// Requests a high-performance adapter and wraps its device in a [`GpuContext`]
///
/// # Returns
/// The shared context, or an error if no adapter or device is available
pub async fn request_context() -> Result<Arc<GpuContext>, Box<dyn std::error::Error>> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;

    let info = adapter.get_info();
    tracing::info!(name = %info.name, backend = ?info.backend, "using adapter");

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Kuwahara Verification"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: Default::default(),
        })
        .await?;

    Ok(Arc::new(GpuContext::new(device, queue)))
}

/// Converts an 8-bit image to normalized floats, as the GPU sees an `Rgba8Unorm` texture
pub fn to_rgba32f(image: &image::RgbaImage) -> image::Rgba32FImage {
    image::Rgba32FImage::from_fn(image.width(), image.height(), |x, y| image::Rgba(image.get_pixel(x, y).0.map(|c| c as f32 / 255.0)))
}

/// Quantizes a float image the way an `Rgba8Unorm` storage write does
pub fn quantize_rgba8(image: &image::Rgba32FImage) -> image::Rgba32FImage {
    image::Rgba32FImage::from_fn(image.width(), image.height(), |x, y| image::Rgba(image.get_pixel(x, y).0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() / 255.0)))
}

/// Loads an image file as tightly packed RGBA8 pixels
pub fn load_image_file_rgba8(path: &str) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
    Ok(image::open(path)?.to_rgba8())
}
