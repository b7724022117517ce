//! Headless device bring-up.

use crate::error::{GpuError, GpuResult};

/// Device and queue without a surface.
#[derive(Debug)]
pub struct GpuContext {
    /// Logical device.
    pub device: wgpu::Device,
    /// Submission queue.
    pub queue: wgpu::Queue,
    info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Blocks on [`GpuContext::request`] with every backend enabled.
    ///
    /// # Errors
    ///
    /// See [`GpuContext::request`].
    pub fn headless() -> GpuResult<Self> {
        pollster::block_on(Self::request(wgpu::Backends::all()))
    }

    /// Requests a high-performance adapter and a device with its full limits.
    ///
    /// # Errors
    ///
    /// [`GpuError::NoAdapter`] if nothing matches, [`GpuError::RequestDevice`]
    /// if the adapter refuses.
    pub async fn request(backends: wgpu::Backends) -> GpuResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "using adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("MEADOW"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await?;

        Ok(Self { device, queue, info })
    }

    /// Wraps an existing device, e.g. the renderer's.
    #[must_use]
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue, info: wgpu::AdapterInfo) -> Self {
        Self { device, queue, info }
    }

    /// Adapter description.
    #[must_use]
    pub const fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }
}
