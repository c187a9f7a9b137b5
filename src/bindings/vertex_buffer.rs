// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
CPU-side vertex storage with a lazily created GPU buffer.

A [VertexBuffer] owns `stride * vertex_len` bytes laid out by its [VertexFormat].  The GPU
buffer is created and filled the first time a batch draws with it, and refilled whenever the
CPU data changed since.  [BufferUsage::Static] buffers release their CPU copy after the first
upload.

Handles are cheap to clone; clones share storage.

```
use batches_and_domains::bindings::vertex_buffer::{VertexBuffer, BufferUsage};
use batches_and_domains::bindings::vertex_format::{VertexFormat, ComponentType, FetchMode};
use batches_and_domains::images::device::Device;
use batches_and_domains::imp::RecordingApi;
use std::sync::Arc;

let device = Device::new(Arc::new(RecordingApi::new()));
let mut format = VertexFormat::new();
format.add_attribute("pos", ComponentType::F32, 2, FetchMode::Float).unwrap();

let buffer = VertexBuffer::new(&device, format, BufferUsage::Static);
buffer.allocate(3);
buffer.fill_attribute_pod(0, &[[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]]);
assert_eq!(buffer.vertex_len(), 3);
assert!(buffer.is_dirty());
```
*/

use crate::bindings::vertex_format::VertexFormat;
use crate::images::device::Device;
use crate::imp::{BufferTarget, ObjectCategory, ObjectId};
use std::sync::Arc;
use wasm_safe_mutex::Mutex;

/// How often the contents are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once.  The CPU copy is released after upload.
    #[default]
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten every frame.
    Stream,
}

#[derive(Debug)]
struct Storage {
    data: Vec<u8>,
    vertex_len: usize,
    id: Option<ObjectId>,
    dirty: bool,
    //set once a static buffer has released its CPU copy
    released: bool,
}

#[derive(Debug)]
struct Shared {
    device: Device,
    format: VertexFormat,
    usage: BufferUsage,
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

#[derive(Debug, Clone)]
pub struct VertexBuffer {
    shared: Arc<Shared>,
}

impl PartialEq for VertexBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl VertexBuffer {
    /// Creates an empty buffer.  The format is packed if it is not already.
    pub fn new(device: &Device, mut format: VertexFormat, usage: BufferUsage) -> Self {
        format.pack();
        VertexBuffer {
            shared: Arc::new(Shared {
                device: device.clone(),
                format,
                usage,
                storage: Mutex::new(Storage {
                    data: Vec::new(),
                    vertex_len: 0,
                    id: None,
                    dirty: false,
                    released: false,
                }),
            }),
        }
    }

    pub fn format(&self) -> &VertexFormat {
        &self.shared.format
    }

    pub fn usage(&self) -> BufferUsage {
        self.shared.usage
    }

    pub fn vertex_len(&self) -> usize {
        self.shared.storage.lock_sync().vertex_len
    }

    /// True when the CPU data changed since the last upload.
    pub fn is_dirty(&self) -> bool {
        self.shared.storage.lock_sync().dirty
    }

    /// The GPU buffer, if one was created yet.
    pub fn gpu_id(&self) -> Option<ObjectId> {
        self.shared.storage.lock_sync().id
    }

    /// Whether a CPU copy is still held.
    pub fn has_cpu_data(&self) -> bool {
        !self.shared.storage.lock_sync().released
    }

    /// Discards any contents and makes room for `vertex_len` zeroed vertices.
    pub fn allocate(&self, vertex_len: usize) {
        let size = self.shared.format.buffer_size(vertex_len);
        let mut storage = self.shared.storage.lock_sync();
        storage.data = vec![0; size];
        storage.vertex_len = vertex_len;
        storage.dirty = true;
        storage.released = false;
    }

    /**
    Changes the vertex count, keeping existing bytes where they fit.

    Deinterleaved buffers place every attribute relative to the vertex count, so their
    contents do not survive a resize meaningfully; callers refill them.
    */
    pub fn resize(&self, vertex_len: usize) {
        let size = self.shared.format.buffer_size(vertex_len);
        let mut storage = self.shared.storage.lock_sync();
        assert!(!storage.released, "resize of a static buffer after upload");
        storage.data.resize(size, 0);
        storage.vertex_len = vertex_len;
        storage.dirty = true;
    }

    /// Writes one attribute of one vertex.  `bytes` must be exactly the attribute size.
    pub fn set_attribute(&self, attribute: usize, vertex: usize, bytes: &[u8]) {
        let format = &self.shared.format;
        let size = format.attribute(attribute).size() as usize;
        assert_eq!(bytes.len(), size, "attribute {attribute} is {size} bytes");
        let mut storage = self.shared.storage.lock_sync();
        assert!(!storage.released, "write to a static buffer after upload");
        assert!(vertex < storage.vertex_len, "vertex {vertex} out of range");
        let layout = format.attribute_layout(attribute, storage.vertex_len);
        let start = layout.offset + layout.stride as usize * vertex;
        storage.data[start..start + size].copy_from_slice(bytes);
        storage.dirty = true;
    }

    /// Writes one attribute for consecutive vertices starting at 0.
    ///
    /// `bytes` is a tightly packed run of attribute values.
    pub fn fill_attribute(&self, attribute: usize, bytes: &[u8]) {
        let format = &self.shared.format;
        let size = format.attribute(attribute).size() as usize;
        assert_eq!(bytes.len() % size, 0, "attribute {attribute} is {size} bytes");
        let mut storage = self.shared.storage.lock_sync();
        assert!(!storage.released, "write to a static buffer after upload");
        let count = bytes.len() / size;
        assert!(count <= storage.vertex_len, "{count} values for {} vertices", storage.vertex_len);
        let layout = format.attribute_layout(attribute, storage.vertex_len);
        for (vertex, value) in bytes.chunks_exact(size).enumerate() {
            let start = layout.offset + layout.stride as usize * vertex;
            storage.data[start..start + size].copy_from_slice(value);
        }
        storage.dirty = true;
    }

    pub fn set_attribute_pod<T: bytemuck::Pod>(&self, attribute: usize, vertex: usize, value: &T) {
        self.set_attribute(attribute, vertex, bytemuck::bytes_of(value))
    }

    pub fn fill_attribute_pod<T: bytemuck::Pod>(&self, attribute: usize, values: &[T]) {
        self.fill_attribute(attribute, bytemuck::cast_slice(values))
    }

    /**
    Makes sure the GPU buffer exists and is current, and returns it.

    The buffer is left bound to [BufferTarget::Vertex].
    */
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
        device.native().bind_buffer(BufferTarget::Vertex, Some(id));
        if storage.dirty {
            device
                .native()
                .upload_buffer(BufferTarget::Vertex, id, &storage.data, self.shared.usage);
            storage.dirty = false;
            if self.shared.usage == BufferUsage::Static {
                storage.data = Vec::new();
                storage.released = true;
            }
        }
        id
    }

    /// Releases the GPU buffer and CPU copy now, even if other handles remain.
    pub(crate) fn discard(&self) {
        let id = {
            let mut storage = self.shared.storage.lock_sync();
            storage.data = Vec::new();
            storage.vertex_len = 0;
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
}
