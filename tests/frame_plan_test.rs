use cgmath::{Matrix4, Vector3};
use drawflow::batch::BatchBuilder;
use drawflow::collect::{DrawCollector, DrawSource};
use drawflow::context::{SubmitMode, SubmitSettings};
use drawflow::data_structures::mesh_nodes::{MeshHandle, MeshNodeCache};
use drawflow::data_structures::objects::{ObjectId, ObjectMatrixCache};
use drawflow::data_structures::raw::{
    BatchDescriptorRaw, DrawBlockRaw, DrawIndexedIndirectRaw, InstanceSlotRaw, MeshNodeRaw,
    ObjectRaw, SLOT_FLAG_OBJECT,
};
use drawflow::loader::ModelRegistry;
use drawflow::pipelines::resolve::{WORKGROUP_SIZE, resolve_slot};
use drawflow::submit::{FramePlan, SubmitError, encode_frame};

mod common;
use common::test_utils::{load_model, mesh, pending_model, snapshot};

fn settings(mode: SubmitMode) -> SubmitSettings {
    SubmitSettings {
        mode,
        ..SubmitSettings::default()
    }
}

struct Scene {
    registry: ModelRegistry,
    cache: MeshNodeCache,
    objects: ObjectMatrixCache,
    model: usize,
}

/// One resident two-mesh model and three enabled objects referencing it.
fn scene() -> Scene {
    let mut registry = ModelRegistry::new();
    let model = load_model(&mut registry, vec![mesh(36, 0, 2, 1.0), mesh(12, 36, 5, -1.0)]);
    let mut cache = MeshNodeCache::new();
    cache.rebuild_if_dirty(&registry);

    let mut objects = ObjectMatrixCache::new();
    objects.rebuild(
        [
            snapshot(1, 1.0, Some(model)),
            snapshot(2, 2.0, Some(model)),
            snapshot(3, 3.0, Some(model)),
        ],
        false,
    );

    Scene {
        registry,
        cache,
        objects,
        model,
    }
}

fn encode(scene: &Scene, mode: SubmitMode, requests: Vec<(usize, DrawSource)>) -> FramePlan {
    let mut collector = DrawCollector::new();
    for (mesh_index, source) in requests {
        collector.collect(
            MeshHandle {
                model: scene.model,
                mesh: mesh_index,
            },
            source,
        );
    }
    let (batches, total) = BatchBuilder::build(collector.flush(), &scene.cache);
    encode_frame(
        mode,
        &settings(mode),
        &batches,
        total,
        &scene.cache,
        &scene.objects,
        &scene.registry,
    )
    .unwrap()
}

/// Translation component of a raw matrix, for readable assertions.
fn translation(raw: &DrawBlockRaw) -> [f32; 3] {
    [
        raw.model_matrix[3][0],
        raw.model_matrix[3][1],
        raw.model_matrix[3][2],
    ]
}

#[test]
fn should_match_shader_struct_strides() {
    assert_eq!(std::mem::size_of::<MeshNodeRaw>() as u64, MeshNodeRaw::STRIDE);
    assert_eq!(std::mem::size_of::<ObjectRaw>() as u64, ObjectRaw::STRIDE);
    assert_eq!(
        std::mem::size_of::<BatchDescriptorRaw>() as u64,
        BatchDescriptorRaw::STRIDE
    );
    assert_eq!(
        std::mem::size_of::<InstanceSlotRaw>() as u64,
        InstanceSlotRaw::STRIDE
    );
    assert_eq!(std::mem::size_of::<DrawBlockRaw>() as u64, DrawBlockRaw::STRIDE);
    assert_eq!(
        std::mem::size_of::<DrawIndexedIndirectRaw>() as u64,
        DrawIndexedIndirectRaw::STRIDE
    );
}

#[test]
fn should_emit_no_commands_while_model_loads() {
    let mut scene = scene();
    let pending = pending_model(&mut scene.registry);
    scene.cache.mark_dirty();
    scene.cache.rebuild_if_dirty(&scene.registry);

    let mut collector = DrawCollector::new();
    collector.collect(
        MeshHandle {
            model: pending,
            mesh: 0,
        },
        DrawSource::Object(ObjectId(1)),
    );
    let (batches, total) = BatchBuilder::build(collector.flush(), &scene.cache);
    let mode = SubmitMode::CpuDriven;
    let plan = encode_frame(
        mode,
        &settings(mode),
        &batches,
        total,
        &scene.cache,
        &scene.objects,
        &scene.registry,
    )
    .unwrap();

    // Not an error: the draw silently recovers once the load lands.
    assert!(plan.commands.is_empty());
    assert_eq!(plan.dropped_not_ready, 1);
    assert_eq!(plan.dropped_disabled, 0);
}

#[test]
fn should_collapse_ten_thousand_requests_into_fifty_commands() {
    let mut registry = ModelRegistry::new();
    let model = load_model(
        &mut registry,
        (0..50).map(|i| mesh(3 * (i + 1), 3 * i, 0, 0.0)).collect(),
    );
    let mut cache = MeshNodeCache::new();
    cache.rebuild_if_dirty(&registry);

    let mut objects = ObjectMatrixCache::new();
    objects.rebuild((0..200).map(|i| snapshot(i, i as f32, Some(model))), false);

    let mut collector = DrawCollector::new();
    for mesh_index in 0..50 {
        for object in 0..200 {
            collector.collect(
                MeshHandle { model, mesh: mesh_index },
                DrawSource::Object(ObjectId(object)),
            );
        }
    }
    let (batches, total) = BatchBuilder::build(collector.flush(), &cache);
    let mode = SubmitMode::GpuDriven;
    let plan =
        encode_frame(mode, &settings(mode), &batches, total, &cache, &objects, &registry).unwrap();

    assert_eq!(plan.commands.len(), 50);
    assert_eq!(plan.instances_drawn(), 10_000);
    assert_eq!(plan.dropped_not_ready + plan.dropped_disabled, 0);

    // Contiguous non-overlapping instance ranges in batch order.
    let mut next_base = 0;
    for command in &plan.commands {
        assert_eq!(command.base_instance, next_base);
        assert_eq!(command.instance_count, 200);
        next_base += command.instance_count;
    }
}

#[test]
fn should_fail_when_instance_capacity_exceeded() {
    let scene = scene();
    let mut collector = DrawCollector::new();
    for i in 0..9 {
        collector.collect(
            MeshHandle {
                model: scene.model,
                mesh: 0,
            },
            DrawSource::Object(ObjectId(i % 3 + 1)),
        );
    }
    let (batches, total) = BatchBuilder::build(collector.flush(), &scene.cache);

    let mut small = settings(SubmitMode::GpuDriven);
    small.max_instances = 8;
    let err = encode_frame(
        SubmitMode::GpuDriven,
        &small,
        &batches,
        total,
        &scene.cache,
        &scene.objects,
        &scene.registry,
    )
    .unwrap_err();

    match err {
        SubmitError::CapacityExceeded {
            what,
            needed,
            capacity,
        } => {
            assert_eq!(what, "instance");
            assert_eq!(needed, 9);
            assert_eq!(capacity, 8);
        }
    }
}

#[test]
fn should_fail_when_batch_capacity_exceeded() {
    let scene = scene();
    let mut collector = DrawCollector::new();
    collector.collect(
        MeshHandle {
            model: scene.model,
            mesh: 0,
        },
        DrawSource::Object(ObjectId(1)),
    );
    collector.collect(
        MeshHandle {
            model: scene.model,
            mesh: 1,
        },
        DrawSource::Object(ObjectId(2)),
    );
    let (batches, total) = BatchBuilder::build(collector.flush(), &scene.cache);

    let mut small = settings(SubmitMode::CpuDriven);
    small.max_batches = 1;
    let err = encode_frame(
        SubmitMode::CpuDriven,
        &small,
        &batches,
        total,
        &scene.cache,
        &scene.objects,
        &scene.registry,
    )
    .unwrap_err();

    let SubmitError::CapacityExceeded {
        what,
        needed,
        capacity,
    } = err;
    assert_eq!(what, "batch");
    assert_eq!(needed, 2);
    assert_eq!(capacity, 1);
}

#[test]
fn should_fail_when_mesh_node_capacity_exceeded() {
    let scene = scene();

    let mut small = settings(SubmitMode::CpuDriven);
    small.max_mesh_nodes = 1;
    // The resident model has two mesh nodes; even an empty frame overflows.
    let err = encode_frame(
        SubmitMode::CpuDriven,
        &small,
        &[],
        0,
        &scene.cache,
        &scene.objects,
        &scene.registry,
    )
    .unwrap_err();

    let SubmitError::CapacityExceeded { what, needed, .. } = err;
    assert_eq!(what, "mesh node");
    assert_eq!(needed, 2);
}

#[test]
fn should_fail_when_object_capacity_exceeded() {
    let scene = scene();

    let mut small = settings(SubmitMode::CpuDriven);
    small.max_objects = 2;
    let err = encode_frame(
        SubmitMode::CpuDriven,
        &small,
        &[],
        0,
        &scene.cache,
        &scene.objects,
        &scene.registry,
    )
    .unwrap_err();

    let SubmitError::CapacityExceeded { what, needed, .. } = err;
    assert_eq!(what, "object");
    assert_eq!(needed, 3);
}

#[test]
fn should_drop_disabled_instances_and_compact_the_rest() {
    let mut scene = scene();
    let mut hidden = snapshot(2, 2.0, Some(scene.model));
    hidden.hierarchy_visible = false;
    scene.objects.rebuild(
        [
            snapshot(1, 1.0, Some(scene.model)),
            hidden,
            snapshot(3, 3.0, Some(scene.model)),
        ],
        false,
    );

    let plan = encode(
        &scene,
        SubmitMode::CpuDriven,
        vec![
            (0, DrawSource::Object(ObjectId(1))),
            (0, DrawSource::Object(ObjectId(2))),
            (0, DrawSource::Object(ObjectId(3))),
        ],
    );

    assert_eq!(plan.dropped_disabled, 1);
    assert_eq!(plan.commands.len(), 1);
    assert_eq!(plan.commands[0].instance_count, 2);
    assert_eq!(plan.commands[0].base_instance, 0);

    // Survivors are packed to the front of the batch's range; the mesh local
    // x=1 translation rides along with each object's world y.
    assert_eq!(translation(&plan.draw_block[0]), [1.0, 1.0, 0.0]);
    assert_eq!(translation(&plan.draw_block[1]), [1.0, 3.0, 0.0]);
}

#[test]
fn should_drop_instances_whose_object_vanished() {
    let scene = scene();
    let plan = encode(
        &scene,
        SubmitMode::CpuDriven,
        vec![
            (0, DrawSource::Object(ObjectId(1))),
            (0, DrawSource::Object(ObjectId(99))),
        ],
    );

    assert_eq!(plan.dropped_not_ready, 1);
    assert_eq!(plan.commands.len(), 1);
    assert_eq!(plan.commands[0].instance_count, 1);
}

#[test]
fn should_drop_instances_whose_model_unloaded() {
    let mut scene = scene();
    // The object still references a model slot that never became resident.
    let stale = pending_model(&mut scene.registry);
    scene
        .objects
        .rebuild([snapshot(1, 1.0, Some(stale))], false);

    let plan = encode(
        &scene,
        SubmitMode::CpuDriven,
        vec![(0, DrawSource::Object(ObjectId(1)))],
    );

    assert_eq!(plan.dropped_not_ready, 1);
    assert!(plan.commands.is_empty());
}

#[test]
fn should_fill_command_fields_from_mesh_nodes() {
    let scene = scene();
    let plan = encode(
        &scene,
        SubmitMode::CpuDriven,
        vec![
            (0, DrawSource::Object(ObjectId(1))),
            (1, DrawSource::Object(ObjectId(2))),
        ],
    );

    assert_eq!(plan.commands.len(), 2);
    assert_eq!(plan.commands[0].index_count, 36);
    assert_eq!(plan.commands[0].first_index, 0);
    assert_eq!(plan.commands[1].index_count, 12);
    assert_eq!(plan.commands[1].first_index, 36);
    assert_eq!(plan.commands[1].base_instance, 1);
}

#[test]
fn should_prewrite_matrix_fallback_instances_in_gpu_mode() {
    let scene = scene();
    let world = Matrix4::from_translation(Vector3::new(0.0, 0.0, 5.0));
    let plan = encode(
        &scene,
        SubmitMode::GpuDriven,
        vec![
            (0, DrawSource::Object(ObjectId(1))),
            (0, DrawSource::Matrix(world)),
        ],
    );

    // The object instance becomes a slot for the kernel; the explicit matrix
    // is resolved here and scatter-written.
    assert_eq!(plan.slots[0].flags, SLOT_FLAG_OBJECT);
    assert_eq!(plan.slots[1].flags, 0);
    assert_eq!(plan.prewrites.len(), 1);
    let (slot, resolved) = &plan.prewrites[0];
    assert_eq!(*slot, 1);
    assert_eq!(translation(resolved), [1.0, 0.0, 5.0]);
    assert_eq!(resolved.material, 2);
}

#[test]
fn should_pad_slot_uploads_to_workgroup_multiples() {
    let scene = scene();
    let plan = encode(
        &scene,
        SubmitMode::GpuDriven,
        vec![
            (0, DrawSource::Object(ObjectId(1))),
            (0, DrawSource::Object(ObjectId(2))),
            (0, DrawSource::Object(ObjectId(3))),
        ],
    );

    assert_eq!(plan.instance_span, 3);
    assert_eq!(plan.slots.len() as u32, WORKGROUP_SIZE);
    // Padding slots carry no flag, so the kernel leaves them alone.
    assert!(plan.slots[3..].iter().all(|slot| slot.flags == 0));
}

#[test]
fn should_agree_between_cpu_and_gpu_paths() {
    let scene = scene();
    let requests = vec![
        (0, DrawSource::Object(ObjectId(1))),
        (0, DrawSource::Object(ObjectId(2))),
        (1, DrawSource::Object(ObjectId(3))),
        (1, DrawSource::Matrix(Matrix4::from_translation(Vector3::new(4.0, 0.0, 0.0)))),
    ];

    let cpu = encode(&scene, SubmitMode::CpuDriven, requests.clone());
    let gpu = encode(&scene, SubmitMode::GpuDriven, requests);

    assert_eq!(cpu.commands, gpu.commands);

    // Replay the kernel on the CPU over the GPU plan's inputs.
    let nodes = scene.cache.to_raw();
    let objects = scene.objects.to_raw();
    let mut resolved = vec![DrawBlockRaw::default(); gpu.instance_span as usize];
    for (slot, entry) in &gpu.prewrites {
        resolved[*slot as usize] = *entry;
    }
    for index in 0..gpu.slots.len() {
        resolve_slot(index, &nodes, &objects, &gpu.descriptors, &gpu.slots, &mut resolved);
    }

    assert_eq!(resolved, cpu.draw_block);
}

#[test]
fn should_resolve_slots_in_any_order() {
    let scene = scene();
    let plan = encode(
        &scene,
        SubmitMode::GpuDriven,
        vec![
            (0, DrawSource::Object(ObjectId(1))),
            (0, DrawSource::Object(ObjectId(2))),
            (1, DrawSource::Object(ObjectId(3))),
        ],
    );

    let nodes = scene.cache.to_raw();
    let objects = scene.objects.to_raw();
    let span = plan.instance_span as usize;

    let mut forward = vec![DrawBlockRaw::default(); span];
    for index in 0..span {
        resolve_slot(index, &nodes, &objects, &plan.descriptors, &plan.slots, &mut forward);
    }

    let mut backward = vec![DrawBlockRaw::default(); span];
    for index in (0..span).rev() {
        resolve_slot(index, &nodes, &objects, &plan.descriptors, &plan.slots, &mut backward);
    }

    let mut striped = vec![DrawBlockRaw::default(); span];
    for index in (0..span).step_by(2).chain((0..span).skip(1).step_by(2)) {
        resolve_slot(index, &nodes, &objects, &plan.descriptors, &plan.slots, &mut striped);
    }

    assert_eq!(forward, backward);
    assert_eq!(forward, striped);
}

#[test]
fn should_multiply_world_by_mesh_local() {
    let scene = scene();
    let plan = encode(
        &scene,
        SubmitMode::CpuDriven,
        vec![(0, DrawSource::Object(ObjectId(2)))],
    );

    // Mesh 0 translates x by 1, object 2 translates y by 2.
    assert_eq!(translation(&plan.draw_block[0]), [1.0, 2.0, 0.0]);
    assert_eq!(plan.draw_block[0].material, 2);
}
