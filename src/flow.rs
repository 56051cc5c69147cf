//! Frame-level orchestration of the draw-submission pipeline.
//!
//! [`DrawFlow`] owns the model registry, both persistent caches, the request
//! collector and the indirect submitter, and wires them into the three calls
//! an embedding renderer makes each frame:
//!
//! 1. [`DrawFlow::begin_frame`] drains finished model loads and rebuilds the
//!    per-frame object matrix cache from the scene snapshot
//! 2. [`DrawFlow::submit`] (any number of times) records one mesh instance
//! 3. [`DrawFlow::flush_and_draw`] batches, encodes, uploads and issues the
//!    frame's indirect draws into an externally prepared render pass

use cgmath::Matrix4;

use crate::batch::BatchBuilder;
use crate::collect::{DrawCollector, DrawSource};
use crate::context::{GpuContext, SubmitMode};
use crate::data_structures::mesh_nodes::{MeshHandle, MeshNodeCache};
use crate::data_structures::objects::{ObjectId, ObjectMatrixCache, ObjectSnapshot};
use crate::loader::{LoadResult, ModelRegistry};
use crate::pipelines::resolve::ComputeResolver;
use crate::submit::{FramePlan, IndirectSubmitter, SubmitError};

/// What the last flushed frame actually drew, for overlays and logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub requests: u32,
    pub batches: u32,
    pub commands: u32,
    pub instances_drawn: u32,
    pub dropped_not_ready: u32,
    pub dropped_disabled: u32,
}

pub struct DrawFlow {
    registry: ModelRegistry,
    mesh_nodes: MeshNodeCache,
    objects: ObjectMatrixCache,
    collector: DrawCollector,
    submitter: IndirectSubmitter,
    resolver: Option<ComputeResolver>,
    stats: FrameStats,
}

impl DrawFlow {
    pub fn new(ctx: &GpuContext) -> Self {
        let submitter =
            IndirectSubmitter::new(&ctx.device, &ctx.settings, ctx.supports_multi_draw);
        let resolver = (ctx.settings.mode == SubmitMode::GpuDriven)
            .then(|| ComputeResolver::new(&ctx.device));
        Self {
            registry: ModelRegistry::new(),
            mesh_nodes: MeshNodeCache::new(),
            objects: ObjectMatrixCache::new(),
            collector: DrawCollector::new(),
            submitter,
            resolver,
            stats: FrameStats::default(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Register a model and get its index back; hand [`DrawFlow::load_sender`]
    /// plus the index to whatever worker prepares the mesh data.
    pub fn begin_load(&mut self) -> usize {
        self.registry.begin_load()
    }

    pub fn load_sender(&self) -> flume::Sender<LoadResult> {
        self.registry.sender()
    }

    /// Start the frame: land finished loads (invalidating the mesh node cache
    /// when any did) and rebuild the object matrix cache from the scene.
    pub fn begin_frame<I>(&mut self, scene: I, game_running: bool)
    where
        I: IntoIterator<Item = ObjectSnapshot>,
    {
        if self.registry.drain_queue() > 0 {
            self.mesh_nodes.mark_dirty();
        }
        self.objects.rebuild(scene, game_running);
    }

    /// Record one instance of a mesh for this frame. Pure bookkeeping; all
    /// validation is deferred to the flush.
    pub fn submit(&mut self, model: usize, mesh: usize, source: DrawSource) {
        self.collector.collect(MeshHandle { model, mesh }, source);
    }

    pub fn submit_object(&mut self, model: usize, mesh: usize, id: ObjectId) {
        self.submit(model, mesh, DrawSource::Object(id));
    }

    /// Fallback for callers without a cached object, e.g. editor gizmos.
    pub fn submit_matrix(&mut self, model: usize, mesh: usize, world: Matrix4<f32>) {
        self.submit(model, mesh, DrawSource::Matrix(world));
    }

    /// Flush the collected requests into indirect draws on `render_pass`.
    ///
    /// The pass must already have the shared vertex/index buffers and the
    /// draw-block-reading pipeline bound. In GPU-driven mode the resolve
    /// dispatch is submitted on its own encoder first, so it is ordered
    /// before the render pass commands on the queue.
    pub fn flush_and_draw(
        &mut self,
        ctx: &GpuContext,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) -> Result<FrameStats, SubmitError> {
        if self.mesh_nodes.rebuild_if_dirty(&self.registry) {
            self.submitter.upload_mesh_nodes(&ctx.queue, &self.mesh_nodes);
        }

        let requests = self.collector.flush();
        let request_count = requests.len() as u32;
        let (batches, total) = BatchBuilder::build(requests, &self.mesh_nodes);

        let plan = match self.submitter.encode(
            &batches,
            total,
            &self.mesh_nodes,
            &self.objects,
            &self.registry,
        ) {
            Ok(plan) => plan,
            Err(err) => {
                log::error!("dropping frame: {err}");
                return Err(err);
            }
        };
        self.submitter.upload_frame(&ctx.queue, &plan, &self.objects);

        if let Some(resolver) = &self.resolver {
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Resolve Encoder"),
                });
            resolver.dispatch(
                &ctx.device,
                &mut encoder,
                &self.submitter,
                plan.slots.len() as u32,
            );
            ctx.queue.submit(std::iter::once(encoder.finish()));
        }

        self.submitter.draw(render_pass);

        self.stats = Self::stats_for(request_count, batches.len() as u32, &plan);
        log::trace!("frame flushed: {:?}", self.stats);
        Ok(self.stats)
    }

    /// Statistics from the most recent [`DrawFlow::flush_and_draw`].
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    fn stats_for(requests: u32, batches: u32, plan: &FramePlan) -> FrameStats {
        FrameStats {
            requests,
            batches,
            commands: plan.commands.len() as u32,
            instances_drawn: plan.instances_drawn(),
            dropped_not_ready: plan.dropped_not_ready,
            dropped_disabled: plan.dropped_disabled,
        }
    }
}
