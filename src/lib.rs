//! drawflow
//!
//! A draw-submission core for instancing-oriented renderers. The crate turns
//! per-frame draw requests into batched indirect GPU draw commands, backed by
//! two persistent caches (flattened mesh nodes and per-frame object matrices)
//! and an optional compute pass that resolves per-instance transforms in GPU
//! memory. It owns no window, surface or render pipeline; the embedding
//! renderer drives it with a scene snapshot and a prepared render pass.
//!
//! High-level modules
//! - `context`: headless GPU context plus submission mode and capacities
//! - `loader`: async model hand-off and the resident model registry
//! - `data_structures`: the two caches and their GPU-facing raw records
//! - `collect`: per-frame draw request collection
//! - `batch`: grouping requests into batches with stable instance ranges
//! - `submit`: frame encoding, buffer uploads and indirect draw issue
//! - `pipelines`: the transform-resolve compute pipeline
//! - `flow`: the per-frame orchestration tying the above together
//!

pub mod batch;
pub mod collect;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod loader;
pub mod pipelines;
pub mod submit;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;

pub use collect::DrawSource;
pub use context::{GpuContext, SubmitMode, SubmitSettings};
pub use data_structures::mesh_nodes::MeshHandle;
pub use data_structures::objects::{ObjectId, ObjectSnapshot};
pub use flow::{DrawFlow, FrameStats};
pub use loader::{LoadResult, PreparedMesh, PreparedModel};
pub use submit::SubmitError;
