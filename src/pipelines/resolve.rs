//! GPU-side per-instance transform resolution.
//!
//! The resolver is the GPU-driven path's replacement for CPU matrix
//! multiplication: one kernel invocation per instance slot reads the two
//! cache buffers and the batch descriptor table and writes the final model
//! matrix plus material index into the draw block. Invocations are fully
//! independent, so execution order can never change the output.
//!
//! [`resolve_slot`] is the CPU mirror of one invocation; tests use it as the
//! reference the kernel must agree with.

use cgmath::Matrix4;

use crate::data_structures::raw::{
    BatchDescriptorRaw, DrawBlockRaw, InstanceSlotRaw, MeshNodeRaw, ObjectRaw, SLOT_FLAG_OBJECT,
};
use crate::submit::IndirectSubmitter;

/// Must match `@workgroup_size` in `resolve_shader.wgsl`. Slot uploads are
/// padded to this multiple so the last workgroup never reads stale slots.
pub const WORKGROUP_SIZE: u32 = 64;

pub struct ComputeResolver {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl ComputeResolver {
    pub fn new(device: &wgpu::Device) -> Self {
        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("resolve_bind_group_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Resolve Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Resolve Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("resolve_shader.wgsl").into()),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Resolve Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self { pipeline, layout }
    }

    /// Encode the resolve dispatch for this frame's instances. Must run
    /// after the frame's uploads and before the indirect draw that reads the
    /// draw block.
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        submitter: &IndirectSubmitter,
        instance_count: u32,
    ) {
        if instance_count == 0 {
            return;
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("resolve_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: submitter.mesh_node_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: submitter.object_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: submitter.descriptor_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: submitter.slot_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: submitter.draw_block_buffer().as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Resolve Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(instance_count.div_ceil(WORKGROUP_SIZE), 1, 1);
    }
}

/// CPU mirror of one kernel invocation over the same raw arrays.
///
/// Slots without [`SLOT_FLAG_OBJECT`] (explicit-matrix fallback, padding, or
/// dropped instances) are left untouched, exactly like the kernel leaves
/// their draw-block entries alone.
pub fn resolve_slot(
    index: usize,
    nodes: &[MeshNodeRaw],
    objects: &[ObjectRaw],
    descriptors: &[BatchDescriptorRaw],
    slots: &[InstanceSlotRaw],
    draw_block: &mut [DrawBlockRaw],
) {
    let slot = slots[index];
    if slot.flags & SLOT_FLAG_OBJECT == 0 {
        return;
    }
    let descriptor = descriptors[slot.batch_index as usize];
    let node = nodes[descriptor.mesh_node_offset as usize];
    let object = objects[slot.object_offset as usize];

    let world: Matrix4<f32> = object.world_matrix.into();
    let local: Matrix4<f32> = node.local_matrix.into();
    draw_block[index] = DrawBlockRaw {
        model_matrix: (world * local).into(),
        material: descriptor.material,
        _pad: [0; 3],
    };
}
