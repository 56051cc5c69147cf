//! GPU pipeline definitions.
//!
//! - `resolve` is the compute pipeline that resolves per-instance model
//!   matrices in GPU memory for the GPU-driven submission path

pub mod resolve;
