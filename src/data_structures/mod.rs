//! Engine data structures: transform caches and GPU-layout records.
//!
//! - `mesh_nodes` is the flattened per-(model, mesh) local-transform cache
//! - `objects` is the per-frame world-transform table for live scene objects
//! - `raw` declares the fixed-layout records shared with the GPU

pub mod mesh_nodes;
pub mod objects;
pub mod raw;
