//! Materializing batches into GPU-resident indirect draw commands.
//!
//! The submitter is split into a pure encode step that turns the frame's
//! batches into a CPU-side [`FramePlan`] and an upload/draw step that moves
//! the plan into preallocated GPU buffers and issues the indirect calls.
//! Every draw-call guarantee depends only on [`encode_frame`], which touches
//! no GPU state at all.
//!
//! Two modes exist:
//! - CPU-driven: per-instance model matrices are multiplied out on the CPU
//!   and uploaded into the draw block directly.
//! - GPU-driven: only instance slots (cache references) and compact batch
//!   descriptors are uploaded; the resolver kernel in [`crate::pipelines`]
//!   fills the draw block before the multi-draw call reads it.

use crate::batch::Batch;
use crate::collect::DrawSource;
use crate::context::{SubmitMode, SubmitSettings};
use crate::data_structures::mesh_nodes::MeshNodeCache;
use crate::data_structures::objects::ObjectMatrixCache;
use crate::data_structures::raw::{
    BatchDescriptorRaw, DrawBlockRaw, DrawIndexedIndirectRaw, InstanceSlotRaw, MeshNodeRaw,
    ObjectRaw, SLOT_FLAG_OBJECT,
};
use crate::loader::ModelRegistry;
use crate::pipelines::resolve::WORKGROUP_SIZE;

/// Frame-fatal submission failures. Dropped draws from transient load races
/// are *not* errors (they recover next frame); overflowing a preallocated
/// buffer is, because silently truncating draws would corrupt the frame.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("frame exceeds preallocated {what} capacity ({needed} > {capacity})")]
    CapacityExceeded {
        what: &'static str,
        needed: u32,
        capacity: u32,
    },
}

/// Everything one frame uploads, produced by [`encode_frame`].
///
/// Which fields are populated depends on the submit mode: CPU-driven fills
/// `commands` + `draw_block`; GPU-driven fills `commands` + `slots` +
/// `descriptors` + the scattered `prewrites` for explicit-matrix instances.
#[derive(Debug, Default)]
pub struct FramePlan {
    pub commands: Vec<DrawIndexedIndirectRaw>,
    pub descriptors: Vec<BatchDescriptorRaw>,
    pub slots: Vec<InstanceSlotRaw>,
    pub draw_block: Vec<DrawBlockRaw>,
    /// (global instance slot, resolved entry) pairs written individually so
    /// the GPU-driven path never uploads the whole draw block.
    pub prewrites: Vec<(u32, DrawBlockRaw)>,
    /// Total instance span assigned by the batch builder, including slots
    /// whose instances were dropped.
    pub instance_span: u32,
    pub dropped_not_ready: u32,
    pub dropped_disabled: u32,
}

impl FramePlan {
    pub fn instances_drawn(&self) -> u32 {
        self.commands.iter().map(|c| c.instance_count).sum()
    }
}

/// Turn the frame's batches into an uploadable plan. Pure CPU work.
///
/// Batches whose mesh-node offset is unmapped are skipped wholesale (the
/// owning model is not yet drawable); individual instances are dropped when
/// their object id is unknown this frame, their object's model got unloaded,
/// or the object is disabled. Kept instances are compacted to the front of
/// their batch's slot range so every command's instance range stays
/// contiguous.
pub fn encode_frame(
    mode: SubmitMode,
    settings: &SubmitSettings,
    batches: &[Batch],
    total_instances: u32,
    mesh_nodes: &MeshNodeCache,
    objects: &ObjectMatrixCache,
    registry: &ModelRegistry,
) -> Result<FramePlan, SubmitError> {
    check_capacity("instance", total_instances, settings.max_instances)?;
    check_capacity("batch", batches.len() as u32, settings.max_batches)?;
    check_capacity("mesh node", mesh_nodes.len() as u32, settings.max_mesh_nodes)?;
    check_capacity("object", objects.len() as u32, settings.max_objects)?;

    let gpu_driven = mode == SubmitMode::GpuDriven;
    let mut plan = FramePlan {
        instance_span: total_instances,
        ..Default::default()
    };
    if gpu_driven {
        plan.slots = vec![
            InstanceSlotRaw::default();
            total_instances.next_multiple_of(WORKGROUP_SIZE) as usize
        ];
    } else {
        plan.draw_block = vec![DrawBlockRaw::default(); total_instances as usize];
    }

    for batch in batches {
        let node = batch
            .mesh_node_offset
            .and_then(|offset| mesh_nodes.entry(offset));
        let (Some(offset), Some(node)) = (batch.mesh_node_offset, node) else {
            // Not yet drawable; the whole batch sits this frame out.
            plan.dropped_not_ready += batch.instance_count;
            log::debug!(
                "skipping batch for model {} mesh {}: mesh node offset unmapped",
                batch.handle.model,
                batch.handle.mesh
            );
            continue;
        };

        let batch_index = plan.descriptors.len() as u32;
        let mut kept = 0u32;

        for source in &batch.sources {
            let slot = (batch.base_instance + kept) as usize;
            match source {
                DrawSource::Object(id) => {
                    let entry = objects
                        .offset_of(*id)
                        .and_then(|offset| objects.entry(offset).map(|e| (offset, e)));
                    let Some((object_offset, entry)) = entry else {
                        plan.dropped_not_ready += 1;
                        continue;
                    };
                    // Resource desync: the object still points at a model
                    // that is no longer resident.
                    if entry.model_index.is_some_and(|m| !registry.is_resident(m)) {
                        plan.dropped_not_ready += 1;
                        continue;
                    }
                    if !entry.enabled {
                        plan.dropped_disabled += 1;
                        continue;
                    }
                    if gpu_driven {
                        plan.slots[slot] = InstanceSlotRaw {
                            object_offset,
                            batch_index,
                            flags: SLOT_FLAG_OBJECT,
                            _pad: 0,
                        };
                    } else {
                        plan.draw_block[slot] = DrawBlockRaw {
                            model_matrix: (entry.world_matrix * node.local_matrix).into(),
                            material: batch.material,
                            _pad: [0; 3],
                        };
                    }
                    kept += 1;
                }
                DrawSource::Matrix(world) => {
                    // Fallback path: no cache reference exists, so the
                    // multiplication happens on the CPU in both modes.
                    let resolved = DrawBlockRaw {
                        model_matrix: (world * node.local_matrix).into(),
                        material: batch.material,
                        _pad: [0; 3],
                    };
                    if gpu_driven {
                        plan.prewrites.push((slot as u32, resolved));
                    } else {
                        plan.draw_block[slot] = resolved;
                    }
                    kept += 1;
                }
            }
        }

        if gpu_driven {
            plan.descriptors.push(BatchDescriptorRaw {
                instance_count: kept,
                base_instance: batch.base_instance,
                mesh_node_offset: offset,
                material: batch.material,
            });
        }
        if kept > 0 {
            plan.commands.push(DrawIndexedIndirectRaw {
                index_count: node.index_count,
                instance_count: kept,
                first_index: node.first_index,
                base_vertex: node.base_vertex,
                base_instance: batch.base_instance,
            });
        }
    }

    Ok(plan)
}

fn check_capacity(what: &'static str, needed: u32, capacity: u32) -> Result<(), SubmitError> {
    if needed > capacity {
        return Err(SubmitError::CapacityExceeded {
            what,
            needed,
            capacity,
        });
    }
    Ok(())
}

pub struct IndirectSubmitter {
    mode: SubmitMode,
    settings: SubmitSettings,
    supports_multi_draw: bool,
    mesh_node_buffer: wgpu::Buffer,
    object_buffer: wgpu::Buffer,
    slot_buffer: wgpu::Buffer,
    descriptor_buffer: wgpu::Buffer,
    draw_block_buffer: wgpu::Buffer,
    command_buffer: wgpu::Buffer,
    command_count: u32,
}

impl IndirectSubmitter {
    pub fn new(device: &wgpu::Device, settings: &SubmitSettings, supports_multi_draw: bool) -> Self {
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let mk = |label: &str, size: u64, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };

        // Slot capacity is rounded up so a full dispatch never reads slots
        // left over from an earlier, larger frame.
        let slot_capacity = settings.max_instances.next_multiple_of(WORKGROUP_SIZE);

        Self {
            mode: settings.mode,
            settings: settings.clone(),
            supports_multi_draw,
            mesh_node_buffer: mk(
                "Mesh Node Buffer",
                settings.max_mesh_nodes as u64 * MeshNodeRaw::STRIDE,
                storage,
            ),
            object_buffer: mk(
                "Object Matrix Buffer",
                settings.max_objects as u64 * ObjectRaw::STRIDE,
                storage,
            ),
            slot_buffer: mk(
                "Instance Slot Buffer",
                slot_capacity as u64 * InstanceSlotRaw::STRIDE,
                storage,
            ),
            descriptor_buffer: mk(
                "Batch Descriptor Buffer",
                settings.max_batches as u64 * BatchDescriptorRaw::STRIDE,
                storage,
            ),
            draw_block_buffer: mk(
                "Draw Block Buffer",
                settings.max_instances as u64 * DrawBlockRaw::STRIDE,
                storage | wgpu::BufferUsages::COPY_SRC,
            ),
            command_buffer: mk(
                "Indirect Command Buffer",
                settings.max_batches as u64 * DrawIndexedIndirectRaw::STRIDE,
                wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            ),
            command_count: 0,
        }
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    /// See [`encode_frame`].
    pub fn encode(
        &self,
        batches: &[Batch],
        total_instances: u32,
        mesh_nodes: &MeshNodeCache,
        objects: &ObjectMatrixCache,
        registry: &ModelRegistry,
    ) -> Result<FramePlan, SubmitError> {
        encode_frame(
            self.mode,
            &self.settings,
            batches,
            total_instances,
            mesh_nodes,
            objects,
            registry,
        )
    }

    /// Re-upload the flattened mesh node table. Only needed after the cache
    /// actually rebuilt.
    pub fn upload_mesh_nodes(&self, queue: &wgpu::Queue, mesh_nodes: &MeshNodeCache) {
        let raw = mesh_nodes.to_raw();
        if !raw.is_empty() {
            queue.write_buffer(&self.mesh_node_buffer, 0, bytemuck::cast_slice(&raw));
        }
    }

    /// Upload the frame plan and this frame's object table.
    pub fn upload_frame(
        &mut self,
        queue: &wgpu::Queue,
        plan: &FramePlan,
        objects: &ObjectMatrixCache,
    ) {
        let object_raw = objects.to_raw();
        if !object_raw.is_empty() {
            queue.write_buffer(&self.object_buffer, 0, bytemuck::cast_slice(&object_raw));
        }
        if !plan.commands.is_empty() {
            queue.write_buffer(&self.command_buffer, 0, bytemuck::cast_slice(&plan.commands));
        }
        match self.mode {
            SubmitMode::CpuDriven => {
                if !plan.draw_block.is_empty() {
                    queue.write_buffer(
                        &self.draw_block_buffer,
                        0,
                        bytemuck::cast_slice(&plan.draw_block),
                    );
                }
            }
            SubmitMode::GpuDriven => {
                if !plan.slots.is_empty() {
                    queue.write_buffer(&self.slot_buffer, 0, bytemuck::cast_slice(&plan.slots));
                }
                if !plan.descriptors.is_empty() {
                    queue.write_buffer(
                        &self.descriptor_buffer,
                        0,
                        bytemuck::cast_slice(&plan.descriptors),
                    );
                }
                for (slot, entry) in &plan.prewrites {
                    queue.write_buffer(
                        &self.draw_block_buffer,
                        *slot as u64 * DrawBlockRaw::STRIDE,
                        bytemuck::bytes_of(entry),
                    );
                }
            }
        }
        self.command_count = plan.commands.len() as u32;
    }

    /// Issue the frame's indirect draws into an externally prepared render
    /// pass (vertex/index buffers and pipeline already bound).
    ///
    /// One `multi_draw_indexed_indirect` covers every command when the device
    /// supports it; otherwise one `draw_indexed_indirect` per command, which
    /// is also the sub-mode a renderer uses to interleave per-batch bindings.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.command_count == 0 {
            return;
        }
        if self.supports_multi_draw {
            render_pass.multi_draw_indexed_indirect(&self.command_buffer, 0, self.command_count);
        } else {
            for i in 0..self.command_count {
                render_pass.draw_indexed_indirect(
                    &self.command_buffer,
                    i as u64 * DrawIndexedIndirectRaw::STRIDE,
                );
            }
        }
    }

    pub fn command_count(&self) -> u32 {
        self.command_count
    }

    pub fn mesh_node_buffer(&self) -> &wgpu::Buffer {
        &self.mesh_node_buffer
    }

    pub fn object_buffer(&self) -> &wgpu::Buffer {
        &self.object_buffer
    }

    pub fn slot_buffer(&self) -> &wgpu::Buffer {
        &self.slot_buffer
    }

    pub fn descriptor_buffer(&self) -> &wgpu::Buffer {
        &self.descriptor_buffer
    }

    pub fn draw_block_buffer(&self) -> &wgpu::Buffer {
        &self.draw_block_buffer
    }
}
