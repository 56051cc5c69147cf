//! Per-frame table of every live scene object's world transform.
//!
//! Unlike the mesh-node cache this is rebuilt from scratch every frame:
//! objects get added, removed and reparented between frames, so offsets are
//! only valid within the frame that produced them. Correctness over
//! incremental cleverness.

use std::collections::HashMap;

use cgmath::Matrix4;

use crate::data_structures::raw::ObjectRaw;

/// Stable identifier the scene subsystem uses for an object. Offsets into the
/// cache are looked up through this id and are frame-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

/// What the scene/transform subsystem hands over per object, per frame.
#[derive(Debug, Clone)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub world_matrix: Matrix4<f32>,
    pub hierarchy_active: bool,
    pub hierarchy_visible: bool,
    pub is_camera: bool,
    /// Model the object's drawable references, if it has one.
    pub model_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub world_matrix: Matrix4<f32>,
    pub model_index: Option<usize>,
    pub enabled: bool,
}

pub struct ObjectMatrixCache {
    entries: Vec<ObjectEntry>,
    offsets: HashMap<ObjectId, u32>,
}

impl ObjectMatrixCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    /// Full rebuild from the authoritative transform source. Executed once
    /// per frame, before any batch or command construction reads offsets.
    pub fn rebuild<I>(&mut self, objects: I, game_running: bool)
    where
        I: IntoIterator<Item = ObjectSnapshot>,
    {
        self.entries.clear();
        self.offsets.clear();

        for snapshot in objects {
            let enabled = snapshot.hierarchy_active
                && (game_running || snapshot.hierarchy_visible)
                && !(snapshot.is_camera && game_running);

            self.offsets.insert(snapshot.id, self.entries.len() as u32);
            self.entries.push(ObjectEntry {
                world_matrix: snapshot.world_matrix,
                model_index: snapshot.model_index,
                enabled,
            });
        }
    }

    /// Offset of an object in this frame's table. Not stable across frames.
    pub fn offset_of(&self, id: ObjectId) -> Option<u32> {
        self.offsets.get(&id).copied()
    }

    pub fn entry(&self, offset: u32) -> Option<&ObjectEntry> {
        self.entries.get(offset as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// GPU-layout copy of the table, uploaded every frame.
    pub fn to_raw(&self) -> Vec<ObjectRaw> {
        self.entries
            .iter()
            .map(|entry| ObjectRaw {
                world_matrix: entry.world_matrix.into(),
                model_index: entry.model_index.map_or(-1, |m| m as i32),
                enabled: entry.enabled as u32,
                _pad: [0; 2],
            })
            .collect()
    }
}

impl Default for ObjectMatrixCache {
    fn default() -> Self {
        Self::new()
    }
}
