//! Shared GPU context for unit tests
//!
//! Tests needing a GPU call [`test_context`] and return early when it yields `None`, so the
//! suite still passes on machines without a usable adapter.

use crate::context::GpuContext;
use std::sync::{Arc, OnceLock};

static CONTEXT: OnceLock<Option<Arc<GpuContext>>> = OnceLock::new();

async fn request_context() -> Result<GpuContext, Box<dyn std::error::Error>> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Kuwahara Test Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: Default::default(),
        })
        .await?;

    Ok(GpuContext::new(device, queue))
}

/// Returns the shared test context, or `None` when no adapter is available
pub(crate) fn test_context() -> Option<Arc<GpuContext>> {
    CONTEXT
        .get_or_init(|| match pollster::block_on(request_context()) {
            Ok(context) => Some(Arc::new(context)),
            Err(e) => {
                eprintln!("GPU unavailable, skipping GPU tests: {e}");
                None
            }
        })
        .clone()
}
