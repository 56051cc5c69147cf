//! Flattened per-mesh local-transform table with dirty-flag rebuilds.
//!
//! The cache is append-shaped: entries for every resident model's meshes are
//! laid out contiguously in model-load order, and offsets stay stable until
//! the next rebuild. Rebuilds are gated on a dirty flag that is only set when
//! the model registry's drain lands new meshes, so frames without load events
//! pay nothing here.

use std::collections::HashMap;

use cgmath::Matrix4;

use crate::data_structures::raw::MeshNodeRaw;
use crate::loader::ModelRegistry;

/// Identifies one drawable primitive group within a loaded model.
/// Immutable once the model finishes loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    pub model: usize,
    pub mesh: usize,
}

/// One flattened mesh node. Lives as long as its model is resident.
#[derive(Debug, Clone)]
pub struct MeshNodeEntry {
    pub local_matrix: Matrix4<f32>,
    pub index_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub material: u32,
}

/// Where a model's nodes sit in the flattened table, so the resolver kernel
/// can locate a model's range without the CPU-side offset map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelNodeRange {
    pub node_offset: u32,
    pub node_count: u32,
}

pub struct MeshNodeCache {
    entries: Vec<MeshNodeEntry>,
    offsets: HashMap<MeshHandle, u32>,
    model_ranges: Vec<ModelNodeRange>,
    dirty: bool,
}

impl MeshNodeCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            offsets: HashMap::new(),
            model_ranges: Vec::new(),
            // First rebuild_if_dirty call builds the initial (possibly empty) table.
            dirty: true,
        }
    }

    /// Mark the table stale. Called when a model finishes loading or its node
    /// hierarchy changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the flattened table and offset map if the dirty flag is set.
    /// A no-op when clean. Returns whether a rebuild happened so the caller
    /// knows to re-upload the GPU copy.
    ///
    /// Models that are still loading (or failed) contribute an empty range
    /// and simply have no mapped offsets; their draws are skipped downstream.
    pub fn rebuild_if_dirty(&mut self, registry: &ModelRegistry) -> bool {
        if !self.dirty {
            return false;
        }

        self.entries.clear();
        self.offsets.clear();
        self.model_ranges.clear();
        self.model_ranges
            .resize(registry.model_count(), ModelNodeRange::default());

        for model in 0..registry.model_count() {
            if !registry.is_resident(model) {
                continue;
            }
            let node_offset = self.entries.len() as u32;
            let mesh_count = registry.mesh_count(model);
            for mesh in 0..mesh_count {
                // mesh_count and mesh() agree for a resident model.
                let Some(prepared) = registry.mesh(model, mesh) else {
                    continue;
                };
                self.offsets
                    .insert(MeshHandle { model, mesh }, self.entries.len() as u32);
                self.entries.push(MeshNodeEntry {
                    local_matrix: prepared.local_transform,
                    index_count: prepared.index_count,
                    first_index: prepared.first_index,
                    base_vertex: prepared.base_vertex,
                    material: prepared.material,
                });
            }
            self.model_ranges[model] = ModelNodeRange {
                node_offset,
                node_count: self.entries.len() as u32 - node_offset,
            };
        }

        self.dirty = false;
        log::debug!(
            "mesh node cache rebuilt: {} nodes across {} models",
            self.entries.len(),
            registry.model_count()
        );
        true
    }

    /// Offset of a handle in the flattened table, `None` while the owning
    /// model is not yet drawable.
    pub fn offset_of(&self, handle: MeshHandle) -> Option<u32> {
        self.offsets.get(&handle).copied()
    }

    pub fn entry(&self, offset: u32) -> Option<&MeshNodeEntry> {
        self.entries.get(offset as usize)
    }

    pub fn model_range(&self, model: usize) -> ModelNodeRange {
        self.model_ranges.get(model).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// GPU-layout copy of the table for upload after a rebuild.
    pub fn to_raw(&self) -> Vec<MeshNodeRaw> {
        self.entries
            .iter()
            .map(|entry| MeshNodeRaw {
                local_matrix: entry.local_matrix.into(),
                index_count: entry.index_count,
                first_index: entry.first_index,
                base_vertex: entry.base_vertex,
                material: entry.material,
            })
            .collect()
    }
}

impl Default for MeshNodeCache {
    fn default() -> Self {
        Self::new()
    }
}
