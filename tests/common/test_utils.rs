#![allow(dead_code)]

use cgmath::{Matrix4, Vector3};
use drawflow::data_structures::mesh_nodes::MeshNodeCache;
use drawflow::data_structures::objects::{ObjectId, ObjectSnapshot};
use drawflow::loader::{LoadResult, ModelRegistry, PreparedMesh, PreparedModel};

/// A mesh whose index range and local translation are easy to recognise in
/// assertions.
pub(crate) fn mesh(index_count: u32, first_index: u32, material: u32, local_x: f32) -> PreparedMesh {
    PreparedMesh {
        local_transform: Matrix4::from_translation(Vector3::new(local_x, 0.0, 0.0)),
        index_count,
        first_index,
        base_vertex: 0,
        material,
    }
}

/// Register a model, push its finished load through the worker queue and
/// drain it, so the model is resident on return.
pub(crate) fn load_model(registry: &mut ModelRegistry, meshes: Vec<PreparedMesh>) -> usize {
    let model = registry.begin_load();
    registry
        .sender()
        .send(LoadResult::Ready(PreparedModel { model, meshes }))
        .unwrap();
    registry.drain_queue();
    model
}

/// Register a model but leave its load in flight.
pub(crate) fn pending_model(registry: &mut ModelRegistry) -> usize {
    registry.begin_load()
}

pub(crate) fn rebuilt_cache(registry: &ModelRegistry) -> MeshNodeCache {
    let mut cache = MeshNodeCache::new();
    cache.rebuild_if_dirty(registry);
    cache
}

/// An enabled, visible scene object at a recognisable translation.
pub(crate) fn snapshot(id: u64, world_y: f32, model_index: Option<usize>) -> ObjectSnapshot {
    ObjectSnapshot {
        id: ObjectId(id),
        world_matrix: Matrix4::from_translation(Vector3::new(0.0, world_y, 0.0)),
        hierarchy_active: true,
        hierarchy_visible: true,
        is_camera: false,
        model_index,
    }
}
