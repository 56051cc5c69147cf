//! Central GPU context: headless device/queue plus submission settings.
//!
//! The renderer that embeds this core owns the window, surface and swapchain;
//! the submission core only needs a device, a queue, and to know whether the
//! adapter can do multi-draw-indirect. The context is therefore created
//! headless, which also makes it available to CI machines without a display.

use crate::data_structures::raw::DrawIndexedIndirectRaw;

/// Which execution path resolves per-instance transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Model matrices are multiplied out on the CPU and the whole draw block
    /// is uploaded each frame. One indirect command per batch.
    CpuDriven,
    /// Only cache references are uploaded; a compute kernel resolves the
    /// matrices in GPU memory before a single multi-draw-indirect call.
    GpuDriven,
}

/// Submission configuration: the execution mode and the capacities of the
/// preallocated GPU buffers. Buffers never grow; overflowing one is a
/// frame-fatal [`crate::submit::SubmitError`].
#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub mode: SubmitMode,
    pub max_instances: u32,
    pub max_batches: u32,
    pub max_mesh_nodes: u32,
    pub max_objects: u32,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            mode: SubmitMode::GpuDriven,
            max_instances: 16_384,
            max_batches: 1_024,
            max_mesh_nodes: 4_096,
            max_objects: 16_384,
        }
    }
}

#[derive(Debug)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub settings: SubmitSettings,
    pub supports_multi_draw: bool,
}

impl GpuContext {
    pub async fn new(settings: SubmitSettings) -> anyhow::Result<Self> {
        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        // MULTI_DRAW_INDIRECT is optional: without it the submitter falls
        // back to one draw_indexed_indirect per command.
        let supports_multi_draw = adapter
            .features()
            .contains(wgpu::Features::MULTI_DRAW_INDIRECT);
        if !supports_multi_draw {
            log::warn!("adapter lacks MULTI_DRAW_INDIRECT; issuing one indirect draw per batch");
        }

        // Every command after the first carries a nonzero base_instance, and
        // wgpu only honours that in indirect draws when the device was created
        // with INDIRECT_FIRST_INSTANCE. Refuse to construct without it rather
        // than let every batch but the first vanish at draw time.
        if !adapter
            .features()
            .contains(wgpu::Features::INDIRECT_FIRST_INSTANCE)
        {
            anyhow::bail!(
                "adapter lacks INDIRECT_FIRST_INSTANCE; batched indirect draws would be dropped"
            );
        }

        let mut required_features = wgpu::Features::INDIRECT_FIRST_INSTANCE;
        if supports_multi_draw {
            required_features |= wgpu::Features::MULTI_DRAW_INDIRECT;
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        log::debug!(
            "gpu context ready: mode {:?}, command buffer capacity {} ({} bytes)",
            settings.mode,
            settings.max_batches,
            settings.max_batches as u64 * DrawIndexedIndirectRaw::STRIDE,
        );

        Ok(Self {
            device,
            queue,
            settings,
            supports_multi_draw,
        })
    }
}
