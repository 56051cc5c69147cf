//! Fixed-layout GPU records for the draw-submission buffers.
//!
//! Every struct here is written byte-for-byte into a GPU buffer and read back
//! by `pipelines/resolve_shader.wgsl` (or by the indirect-draw frontend in
//! the case of [`DrawIndexedIndirectRaw`]). Field order and padding must stay
//! in sync with the WGSL declarations; each struct carries a `STRIDE` constant
//! so tests can assert the CPU size matches the layout the kernel expects.

/// One flattened mesh node: the mesh's local transform plus the index-range
/// data needed to turn a batch into an indirect command.
///
/// Stride layout: mat4x4 local transform, then four 32-bit scalars.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshNodeRaw {
    pub local_matrix: [[f32; 4]; 4],
    pub index_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub material: u32,
}

impl MeshNodeRaw {
    pub const STRIDE: u64 = 80;
}

/// One live scene object: world transform, owning model (-1 when the object
/// has no drawable attached) and the resolved enabled flag.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectRaw {
    pub world_matrix: [[f32; 4]; 4],
    pub model_index: i32,
    pub enabled: u32,
    pub _pad: [u32; 2],
}

impl ObjectRaw {
    pub const STRIDE: u64 = 80;
}

/// Compact per-batch descriptor, the only per-batch data the GPU-driven path
/// uploads besides the command array itself.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchDescriptorRaw {
    pub instance_count: u32,
    pub base_instance: u32,
    pub mesh_node_offset: u32,
    pub material: u32,
}

impl BatchDescriptorRaw {
    pub const STRIDE: u64 = 16;
}

/// Set on an [`InstanceSlotRaw`] whose matrix the resolver kernel must
/// compute from the two caches. Slots without it (explicit-matrix fallback
/// or unused padding) are left untouched by the kernel.
pub const SLOT_FLAG_OBJECT: u32 = 1;

/// Per-instance input record for the resolver kernel: references into the
/// object cache and the batch table, never a raw matrix.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceSlotRaw {
    pub object_offset: u32,
    pub batch_index: u32,
    pub flags: u32,
    pub _pad: u32,
}

impl InstanceSlotRaw {
    pub const STRIDE: u64 = 16;
}

/// Per-instance output record in the draw-block buffer: the final model
/// matrix (`object_world × mesh_node_local`) and the material index the
/// vertex stage reads at `base_instance + local_index`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawBlockRaw {
    pub model_matrix: [[f32; 4]; 4],
    pub material: u32,
    pub _pad: [u32; 3],
}

impl DrawBlockRaw {
    pub const STRIDE: u64 = 80;
}

/// Wire format of one indexed indirect draw, as consumed by
/// `multi_draw_indexed_indirect`. Matches `wgpu::util::DrawIndexedIndirectArgs`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawIndexedIndirectRaw {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub base_instance: u32,
}

impl DrawIndexedIndirectRaw {
    pub const STRIDE: u64 = 20;
}
