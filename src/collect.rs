//! Draw-request collection during scene traversal.
//!
//! The collector is the cheapest stage of the frame: one `Vec` push per
//! visible mesh instance, no deduplication, no ordering guarantee, and never
//! any GPU work. Grouping and offset resolution happen later in
//! [`crate::batch`] and [`crate::submit`].

use cgmath::Matrix4;

use crate::data_structures::mesh_nodes::MeshHandle;
use crate::data_structures::objects::ObjectId;

/// Where an instance's world transform comes from.
///
/// `Object` is the preferred path: a reference into the per-frame object
/// cache that the GPU can resolve itself. `Matrix` is the fallback for
/// instances with no stable identifier; those are resolved on the CPU.
#[derive(Debug, Clone)]
pub enum DrawSource {
    Object(ObjectId),
    Matrix(Matrix4<f32>),
}

/// One "draw this mesh with this transform" request. Produced and consumed
/// within a single frame.
#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub handle: MeshHandle,
    pub source: DrawSource,
}

pub struct DrawCollector {
    requests: Vec<DrawRequest>,
}

impl DrawCollector {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Append one request. Safe to call once per visible instance, many
    /// thousands of times per frame.
    pub fn collect(&mut self, handle: MeshHandle, source: DrawSource) {
        self.requests.push(DrawRequest { handle, source });
    }

    /// Hand over the accumulated list and reset for the next frame.
    pub fn flush(&mut self) -> Vec<DrawRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for DrawCollector {
    fn default() -> Self {
        Self::new()
    }
}
