// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A software backend that records every native call.
//!
//! [RecordingApi] never touches a GPU.  It hands out fresh ids, remembers which objects
//! are alive, and keeps an ordered log of everything the crate asked it to do.  This is
//! the backend the test suite runs on, and it is useful for headless embedders that
//! want to check what a frame would have issued.

use super::{
    AttributePointer, BufferTarget, DrawCall, NativeApi, ObjectCategory, ObjectId,
    RealizeDispatch,
};
use crate::bindings::sampler::SamplerState;
use crate::bindings::vertex_buffer::BufferUsage;
use crate::realize::sample::ResultType;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use wasm_safe_mutex::Mutex;

/// One recorded native call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        category: ObjectCategory,
        id: ObjectId,
    },
    Delete {
        category: ObjectCategory,
        id: ObjectId,
    },
    BindVertexArray(Option<ObjectId>),
    BindBuffer {
        target: BufferTarget,
        id: Option<ObjectId>,
    },
    UploadBuffer {
        target: BufferTarget,
        id: ObjectId,
        len: usize,
        usage: BufferUsage,
    },
    VertexAttribute(AttributePointer),
    DefaultAttribute(u8),
    PrimitiveRestart {
        enabled: bool,
        restart_index: u32,
    },
    Draw(DrawCall),
    TextureStorage {
        id: ObjectId,
        width: u32,
        height: u32,
        result_type: ResultType,
    },
    TextureSampler {
        id: ObjectId,
        state: SamplerState,
    },
    DispatchRealize(RealizeDispatch),
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<Call>,
    live: HashMap<ObjectCategory, HashSet<ObjectId>>,
    bound_vertex_array: Option<ObjectId>,
    //attribute pointers recorded into each vertex array
    vertex_array_state: HashMap<ObjectId, Vec<AttributePointer>>,
}

#[derive(Debug)]
pub struct RecordingApi {
    next_id: AtomicU32,
    recorded: Mutex<Recorded>,
}

impl RecordingApi {
    pub fn new() -> Self {
        RecordingApi {
            //0 is reserved as "no object" by most native APIs
            next_id: AtomicU32::new(1),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// A copy of every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.recorded.lock_sync().calls.clone()
    }

    /// Removes and returns the recorded calls, keeping object bookkeeping intact.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.recorded.lock_sync().calls)
    }

    pub fn created(&self, category: ObjectCategory) -> usize {
        self.count(|c| matches!(c, Call::Create { category: found, .. } if *found == category))
    }

    pub fn deleted(&self, category: ObjectCategory) -> usize {
        self.count(|c| matches!(c, Call::Delete { category: found, .. } if *found == category))
    }

    /// How many times `id` was passed to a delete call.
    pub fn deletions_of(&self, category: ObjectCategory, id: ObjectId) -> usize {
        self.count(|c| matches!(c, Call::Delete { category: found, id: i } if *found == category && *i == id))
    }

    pub fn live(&self, category: ObjectCategory) -> usize {
        self.recorded
            .lock_sync()
            .live
            .get(&category)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn is_live(&self, category: ObjectCategory, id: ObjectId) -> bool {
        self.recorded
            .lock_sync()
            .live
            .get(&category)
            .is_some_and(|s| s.contains(&id))
    }

    /// Attribute pointers recorded while `vertex_array` was bound.
    pub fn vertex_array_attributes(&self, vertex_array: ObjectId) -> Vec<AttributePointer> {
        self.recorded
            .lock_sync()
            .vertex_array_state
            .get(&vertex_array)
            .cloned()
            .unwrap_or_default()
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.recorded
            .lock_sync()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    fn count<F: Fn(&Call) -> bool>(&self, f: F) -> usize {
        self.recorded.lock_sync().calls.iter().filter(|c| f(c)).count()
    }

    fn record(&self, call: Call) {
        self.recorded.lock_sync().calls.push(call);
    }
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeApi for RecordingApi {
    fn create_object(&self, category: ObjectCategory) -> ObjectId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut recorded = self.recorded.lock_sync();
        recorded.live.entry(category).or_default().insert(id);
        recorded.calls.push(Call::Create { category, id });
        id
    }

    fn delete_objects(&self, category: ObjectCategory, ids: &[ObjectId]) {
        let mut recorded = self.recorded.lock_sync();
        for id in ids {
            if let Some(live) = recorded.live.get_mut(&category) {
                live.remove(id);
            }
            if category == ObjectCategory::VertexArray {
                recorded.vertex_array_state.remove(id);
                if recorded.bound_vertex_array == Some(*id) {
                    recorded.bound_vertex_array = None;
                }
            }
            recorded.calls.push(Call::Delete { category, id: *id });
        }
    }

    fn bind_vertex_array(&self, id: Option<ObjectId>) {
        let mut recorded = self.recorded.lock_sync();
        recorded.bound_vertex_array = id;
        recorded.calls.push(Call::BindVertexArray(id));
    }

    fn bind_buffer(&self, target: BufferTarget, id: Option<ObjectId>) {
        self.record(Call::BindBuffer { target, id });
    }

    fn upload_buffer(&self, target: BufferTarget, id: ObjectId, data: &[u8], usage: BufferUsage) {
        self.record(Call::UploadBuffer {
            target,
            id,
            len: data.len(),
            usage,
        });
    }

    fn set_vertex_attribute(&self, pointer: &AttributePointer) {
        let mut recorded = self.recorded.lock_sync();
        if let Some(vao) = recorded.bound_vertex_array {
            recorded
                .vertex_array_state
                .entry(vao)
                .or_default()
                .push(*pointer);
        }
        recorded.calls.push(Call::VertexAttribute(*pointer));
    }

    fn set_default_attribute(&self, location: u8) {
        self.record(Call::DefaultAttribute(location));
    }

    fn set_primitive_restart(&self, enabled: bool, restart_index: u32) {
        self.record(Call::PrimitiveRestart {
            enabled,
            restart_index,
        });
    }

    fn draw(&self, call: &DrawCall) {
        self.record(Call::Draw(*call));
    }

    fn allocate_texture_storage(&self, id: ObjectId, width: u32, height: u32, result_type: ResultType) {
        self.record(Call::TextureStorage {
            id,
            width,
            height,
            result_type,
        });
    }

    fn set_texture_sampler(&self, id: ObjectId, state: &SamplerState) {
        self.record(Call::TextureSampler { id, state: *state });
    }

    fn dispatch_realize(&self, dispatch: &RealizeDispatch) {
        self.record(Call::DispatchRealize(*dispatch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_fresh_and_tracked() {
        let api = RecordingApi::new();
        let a = api.create_object(ObjectCategory::Buffer);
        let b = api.create_object(ObjectCategory::Buffer);
        assert_ne!(a, b);
        assert_ne!(a, 0);
        assert_eq!(api.live(ObjectCategory::Buffer), 2);
        api.delete_objects(ObjectCategory::Buffer, &[a]);
        assert_eq!(api.live(ObjectCategory::Buffer), 1);
        assert!(!api.is_live(ObjectCategory::Buffer, a));
        assert_eq!(api.deletions_of(ObjectCategory::Buffer, a), 1);
    }

    #[test]
    fn attributes_are_recorded_per_vertex_array() {
        use crate::bindings::vertex_format::{ComponentType, FetchMode};
        let api = RecordingApi::new();
        let vao = api.create_object(ObjectCategory::VertexArray);
        api.bind_vertex_array(Some(vao));
        let pointer = AttributePointer {
            location: 3,
            component_count: 2,
            component_type: ComponentType::F32,
            fetch_mode: FetchMode::Float,
            stride: 8,
            offset: 0,
            divisor: 0,
        };
        api.set_vertex_attribute(&pointer);
        assert_eq!(api.vertex_array_attributes(vao), vec![pointer]);
        api.delete_objects(ObjectCategory::VertexArray, &[vao]);
        assert!(api.vertex_array_attributes(vao).is_empty());
    }
}
