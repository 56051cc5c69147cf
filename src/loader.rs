//! Model residency tracking and the worker-thread hand-off queue.
//!
//! Asset decoding runs on a worker pool somewhere outside this crate. Workers
//! send their CPU-prepared mesh lists through a cloneable [`flume`] sender;
//! the render thread drains the queue exactly once per frame via
//! [`ModelRegistry::drain_queue`]. That drain is the only place where new
//! models become resident, and therefore the only event that dirties the
//! mesh-node cache. Nothing here ever blocks on a worker: a model that has
//! not landed yet is simply reported as not resident and skipped for the
//! frame.

use cgmath::Matrix4;

/// One CPU-prepared drawable primitive group, ready for GPU consumption.
///
/// The index range refers into the renderer-owned bound vertex/index buffers;
/// this core never touches the geometry bytes themselves.
#[derive(Debug, Clone)]
pub struct PreparedMesh {
    pub local_transform: Matrix4<f32>,
    pub index_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub material: u32,
}

/// A finished load: the model slot it belongs to plus its mesh list.
#[derive(Debug, Clone)]
pub struct PreparedModel {
    pub model: usize,
    pub meshes: Vec<PreparedMesh>,
}

/// What a worker reports back for a queued load. There is no cancellation:
/// a load either completes, fails, or is abandoned at shutdown.
#[derive(Debug)]
pub enum LoadResult {
    Ready(PreparedModel),
    Failed { model: usize },
}

/// Explicit per-model lifecycle state.
#[derive(Debug)]
pub enum ModelState {
    Loading,
    Ready(Vec<PreparedMesh>),
    Failed,
}

/// Registry of every model slot the application has asked for, resident or
/// not. Owned by the render thread; workers only ever hold a [`flume::Sender`].
pub struct ModelRegistry {
    models: Vec<ModelState>,
    tx: flume::Sender<LoadResult>,
    rx: flume::Receiver<LoadResult>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            models: Vec::new(),
            tx,
            rx,
        }
    }

    /// Reserve a model slot and return its index. The caller hands the index
    /// to a worker together with a [`sender`](Self::sender) clone.
    pub fn begin_load(&mut self) -> usize {
        self.models.push(ModelState::Loading);
        self.models.len() - 1
    }

    /// Producer end of the hand-off queue, cloneable into worker threads.
    pub fn sender(&self) -> flume::Sender<LoadResult> {
        self.tx.clone()
    }

    /// Drain all finished loads. Called once per frame on the render thread;
    /// returns how many models became resident so the caller can dirty the
    /// mesh-node cache.
    pub fn drain_queue(&mut self) -> usize {
        let mut landed = 0;
        while let Ok(result) = self.rx.try_recv() {
            match result {
                LoadResult::Ready(prepared) => match self.models.get_mut(prepared.model) {
                    Some(slot @ ModelState::Loading) => {
                        *slot = ModelState::Ready(prepared.meshes);
                        landed += 1;
                    }
                    Some(_) => {
                        log::warn!(
                            "model {} finished loading twice; keeping the first result",
                            prepared.model
                        );
                    }
                    None => {
                        log::warn!(
                            "worker reported unknown model slot {}; dropping its meshes",
                            prepared.model
                        );
                    }
                },
                LoadResult::Failed { model } => {
                    if let Some(slot @ ModelState::Loading) = self.models.get_mut(model) {
                        *slot = ModelState::Failed;
                    }
                    log::warn!("model {} failed to load", model);
                }
            }
        }
        landed
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn is_resident(&self, model: usize) -> bool {
        matches!(self.models.get(model), Some(ModelState::Ready(_)))
    }

    /// Number of meshes in a resident model, zero otherwise.
    pub fn mesh_count(&self, model: usize) -> usize {
        match self.models.get(model) {
            Some(ModelState::Ready(meshes)) => meshes.len(),
            _ => 0,
        }
    }

    pub fn mesh(&self, model: usize, mesh: usize) -> Option<&PreparedMesh> {
        match self.models.get(model) {
            Some(ModelState::Ready(meshes)) => meshes.get(mesh),
            _ => None,
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
