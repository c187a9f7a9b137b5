// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Index buffers.

Indices are collected as 32-bit values by an [IndexBufferBuilder] and squeezed to 16-bit
storage when the range of referenced vertices allows it.  In that case the smallest index is
stored separately as a base vertex, so a mesh using vertices `70_000..70_100` still gets
16-bit indices.

```
use batches_and_domains::bindings::index_buffer::{IndexBufferBuilder, IndexType};
use batches_and_domains::images::batch::PrimitiveType;
use batches_and_domains::images::device::Device;
use batches_and_domains::imp::RecordingApi;
use std::sync::Arc;

let device = Device::new(Arc::new(RecordingApi::new()));
let mut builder = IndexBufferBuilder::new(PrimitiveType::Triangles, 200_000);
builder.add_triangle(70_000, 70_001, 70_002);
let indices = builder.build(&device);
assert_eq!(indices.index_type(), IndexType::U16);
assert_eq!(indices.base_index(), 70_000);
assert_eq!(indices.len(), 3);
```
*/

use crate::images::batch::PrimitiveType;
use crate::images::device::Device;
use crate::imp::{BufferTarget, ObjectCategory, ObjectId};
use crate::bindings::vertex_buffer::BufferUsage;
use std::sync::Arc;
use wasm_safe_mutex::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub const fn size(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }

    /// The all-ones index that restarts a strip.
    pub const fn restart_index(self) -> u32 {
        match self {
            IndexType::U16 => 0xFFFF,
            IndexType::U32 => 0xFFFF_FFFF,
        }
    }
}

const RESTART: u32 = u32::MAX;

#[derive(Debug)]
pub struct IndexBufferBuilder {
    primitive: PrimitiveType,
    vertex_len: u32,
    indices: Vec<u32>,
    restart: bool,
}

impl IndexBufferBuilder {
    /// A builder for indices referencing `vertex_len` vertices.
    pub fn new(primitive: PrimitiveType, vertex_len: u32) -> Self {
        IndexBufferBuilder {
            primitive,
            vertex_len,
            indices: Vec::new(),
            restart: false,
        }
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn add_index(&mut self, vertex: u32) {
        assert!(vertex < self.vertex_len, "vertex {vertex} out of range");
        self.indices.push(vertex);
    }

    pub fn add_point(&mut self, v: u32) {
        debug_assert_eq!(self.primitive, PrimitiveType::Points);
        self.add_index(v);
    }

    pub fn add_line(&mut self, a: u32, b: u32) {
        debug_assert_eq!(self.primitive, PrimitiveType::Lines);
        self.add_index(a);
        self.add_index(b);
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        debug_assert_eq!(self.primitive, PrimitiveType::Triangles);
        self.add_index(a);
        self.add_index(b);
        self.add_index(c);
    }

    /// Ends the current strip.  Enables primitive restart for the built buffer.
    pub fn add_restart(&mut self) {
        self.restart = true;
        self.indices.push(RESTART);
    }

    pub fn build(self, device: &Device) -> IndexBuffer {
        let used = || self.indices.iter().copied().filter(|i| *i != RESTART);
        let min = used().min().unwrap_or(0);
        let max = used().max().unwrap_or(0);
        //the squeezed range must stay below the 16-bit restart index
        let (index_type, base_index) = if max - min < 0xFFFF {
            (IndexType::U16, min)
        } else {
            (IndexType::U32, 0)
        };
        let mut bytes = Vec::with_capacity(self.indices.len() * index_type.size());
        for index in &self.indices {
            let value = if *index == RESTART {
                index_type.restart_index()
            } else {
                index - base_index
            };
            match index_type {
                IndexType::U16 => bytes.extend_from_slice(&(value as u16).to_ne_bytes()),
                IndexType::U32 => bytes.extend_from_slice(&value.to_ne_bytes()),
            }
        }
        let len = self.indices.len() as u32;
        IndexBuffer {
            shared: Arc::new(Shared {
                device: device.clone(),
                index_type,
                base_index,
                restart: self.restart,
                storage: Mutex::new(Storage {
                    bytes,
                    id: None,
                    dirty: true,
                }),
            }),
            start: 0,
            len,
        }
    }
}

#[derive(Debug)]
struct Storage {
    bytes: Vec<u8>,
    id: Option<ObjectId>,
    dirty: bool,
}

#[derive(Debug)]
struct Shared {
    device: Device,
    index_type: IndexType,
    base_index: u32,
    restart: bool,
    storage: Mutex<Storage>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let id = self.storage.lock_sync().id.take();
        if let Some(id) = id {
            self.device
                .allocator()
                .free(ObjectCategory::Buffer, id, None);
        }
    }
}

/// A range of indices.  Subranges share the storage of their parent.
#[derive(Debug, Clone)]
pub struct IndexBuffer {
    shared: Arc<Shared>,
    start: u32,
    len: u32,
}

impl PartialEq for IndexBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.start == other.start && self.len == other.len
    }
}

impl IndexBuffer {
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First index of this range inside the shared storage.
    pub fn index_start(&self) -> u32 {
        self.start
    }

    pub fn index_type(&self) -> IndexType {
        self.shared.index_type
    }

    /// Value added to every stored index.
    pub fn base_index(&self) -> u32 {
        self.shared.base_index
    }

    pub fn restart_enabled(&self) -> bool {
        self.shared.restart
    }

    pub fn restart_index(&self) -> u32 {
        self.shared.index_type.restart_index()
    }

    /// A view of `len` indices starting `start` indices into this range.
    pub fn subrange(&self, start: u32, len: u32) -> IndexBuffer {
        assert!(
            start as u64 + len as u64 <= self.len as u64,
            "subrange {start}+{len} exceeds {}",
            self.len
        );
        IndexBuffer {
            shared: self.shared.clone(),
            start: self.start + start,
            len,
        }
    }

    pub fn gpu_id(&self) -> Option<ObjectId> {
        self.shared.storage.lock_sync().id
    }

    /// Creates and uploads the GPU buffer if needed, and leaves it bound to [BufferTarget::Index].
    pub(crate) fn use_buffer(&self) -> ObjectId {
        let device = &self.shared.device;
        let mut storage = self.shared.storage.lock_sync();
        let id = match storage.id {
            Some(id) => id,
            None => {
                let id = device.allocator().allocate(ObjectCategory::Buffer);
                storage.id = Some(id);
                id
            }
        };
        device.native().bind_buffer(BufferTarget::Index, Some(id));
        if storage.dirty {
            device
                .native()
                .upload_buffer(BufferTarget::Index, id, &storage.bytes, BufferUsage::Static);
            storage.dirty = false;
            storage.bytes = Vec::new();
        }
        id
    }

    pub(crate) fn discard(&self) {
        let id = {
            let mut storage = self.shared.storage.lock_sync();
            storage.bytes = Vec::new();
            storage.dirty = false;
            storage.id.take()
        };
        if let Some(id) = id {
            self.shared
                .device
                .allocator()
                .free(ObjectCategory::Buffer, id, None);
        }
    }

    #[cfg(test)]
    fn stored(&self) -> Vec<u32> {
        let storage = self.shared.storage.lock_sync();
        match self.shared.index_type {
            IndexType::U16 => storage
                .bytes
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
                .collect(),
            IndexType::U32 => storage
                .bytes
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        }
    }
}
