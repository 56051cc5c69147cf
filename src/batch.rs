//! Grouping the frame's draw list into instance batches.
//!
//! Requests sharing a [`MeshHandle`] collapse into one batch; batch order is
//! the order in which each handle was first seen, which keeps visual layering
//! deterministic when state changes between batches. Every request lands in
//! exactly one batch, so the instance counts always sum to the request count.

use std::collections::HashMap;

use crate::collect::{DrawRequest, DrawSource};
use crate::data_structures::mesh_nodes::{MeshHandle, MeshNodeCache};

/// A run of draw instances sharing one mesh handle, occupying the contiguous
/// instance range `base_instance .. base_instance + instance_count`.
///
/// `mesh_node_offset` is `None` while the handle's model is not yet drawable;
/// such batches keep their instance range but are skipped at submit time.
#[derive(Debug)]
pub struct Batch {
    pub handle: MeshHandle,
    pub instance_count: u32,
    pub base_instance: u32,
    pub mesh_node_offset: Option<u32>,
    pub material: u32,
    /// Transform sources for the batch's instances, in collection order.
    pub sources: Vec<DrawSource>,
}

pub struct BatchBuilder;

impl BatchBuilder {
    /// Partition `requests` into batches and assign instance ranges.
    ///
    /// Returns the batches in first-seen handle order together with the total
    /// instance count (which equals `requests.len()`).
    pub fn build(
        requests: Vec<DrawRequest>,
        mesh_nodes: &MeshNodeCache,
    ) -> (Vec<Batch>, u32) {
        let mut batches: Vec<Batch> = Vec::new();
        let mut by_handle: HashMap<MeshHandle, usize> = HashMap::new();

        for request in requests {
            let index = *by_handle.entry(request.handle).or_insert_with(|| {
                let (mesh_node_offset, material) = match mesh_nodes.offset_of(request.handle) {
                    Some(offset) => {
                        let material = mesh_nodes
                            .entry(offset)
                            .map_or(0, |entry| entry.material);
                        (Some(offset), material)
                    }
                    None => (None, 0),
                };
                batches.push(Batch {
                    handle: request.handle,
                    instance_count: 0,
                    base_instance: 0,
                    mesh_node_offset,
                    material,
                    sources: Vec::new(),
                });
                batches.len() - 1
            });
            batches[index].sources.push(request.source);
        }

        let mut total = 0u32;
        for batch in &mut batches {
            batch.instance_count = batch.sources.len() as u32;
            batch.base_instance = total;
            total += batch.instance_count;
        }

        (batches, total)
    }
}
