// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The native graphics API boundary.

Everything above this module talks to the GPU through [NativeApi], an opaque
handle-based object model: create, bind, delete, draw.  The crate ships a
[RecordingApi] software backend, and with `backend_wgpu` a translation layer
into wgpu descriptor types.
*/

use crate::bindings::index_buffer::IndexType;
use crate::bindings::sampler::SamplerState;
use crate::bindings::vertex_buffer::BufferUsage;
use crate::bindings::vertex_format::{ComponentType, FetchMode};
use crate::images::batch::PrimitiveType;
use crate::realize::sample::ResultType;
use std::fmt::Debug;

mod recording;

pub use recording::{Call, RecordingApi};

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;

/// A native object handle.  Not an owning type; see [crate::images::allocator].
pub type ObjectId = u32;

/// The kinds of native objects whose lifetime the allocator tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    Buffer,
    VertexArray,
    Texture,
    Framebuffer,
}

impl ObjectCategory {
    pub const ALL: [ObjectCategory; 4] = [
        ObjectCategory::Buffer,
        ObjectCategory::VertexArray,
        ObjectCategory::Texture,
        ObjectCategory::Framebuffer,
    ];

    /// Vertex arrays and framebuffers are not shared between contexts; they can only
    /// be created or deleted by the context that owns them.
    pub const fn is_context_bound(self) -> bool {
        matches!(self, ObjectCategory::VertexArray | ObjectCategory::Framebuffer)
    }

    pub(crate) const fn slot(self) -> usize {
        match self {
            ObjectCategory::Buffer => 0,
            ObjectCategory::VertexArray => 1,
            ObjectCategory::Texture => 2,
            ObjectCategory::Framebuffer => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// One vertex attribute pointer, as recorded into the currently bound vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributePointer {
    pub location: u8,
    pub component_count: u8,
    pub component_type: ComponentType,
    pub fetch_mode: FetchMode,
    pub stride: u32,
    pub offset: usize,
    /// 0 for per-vertex data, 1 for per-instance data.
    pub divisor: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexedDraw {
    pub index_type: IndexType,
    /// Byte offset of the first index.
    pub byte_offset: usize,
    pub base_vertex: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCall {
    pub primitive: PrimitiveType,
    pub first: u32,
    pub count: u32,
    pub first_instance: u32,
    pub instance_count: u32,
    pub indexed: Option<IndexedDraw>,
}

/**
A resampling dispatch.

The native side binds `input` as a sampled texture (with the sampler state previously
set through [NativeApi::set_texture_sampler]), binds `output` as a writable image,
uploads `inverse_transformation` and dispatches `groups` work groups.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizeDispatch {
    pub input: ObjectId,
    pub output: ObjectId,
    pub input_size: glam::IVec2,
    pub output_size: glam::IVec2,
    pub inverse_transformation: glam::Mat3,
    pub result_type: ResultType,
    pub groups: [u32; 2],
}

/**
The opaque graphics API this crate drives.

Calls are synchronous from the caller's point of view.  Implementations are expected to
be called only from a thread which currently has a [crate::images::context::GraphicsContext]
active; the crate upholds that for every call it makes.
*/
pub trait NativeApi: Send + Sync + Debug {
    fn create_object(&self, category: ObjectCategory) -> ObjectId;
    fn delete_objects(&self, category: ObjectCategory, ids: &[ObjectId]);

    fn bind_vertex_array(&self, id: Option<ObjectId>);
    fn bind_buffer(&self, target: BufferTarget, id: Option<ObjectId>);
    fn upload_buffer(&self, target: BufferTarget, id: ObjectId, data: &[u8], usage: BufferUsage);

    fn set_vertex_attribute(&self, pointer: &AttributePointer);
    /// Feeds a constant `(0, 0, 0, 1)` to a shader input that no buffer provides.
    fn set_default_attribute(&self, location: u8);
    fn set_primitive_restart(&self, enabled: bool, restart_index: u32);
    fn draw(&self, call: &DrawCall);

    fn allocate_texture_storage(&self, id: ObjectId, width: u32, height: u32, result_type: ResultType);
    fn set_texture_sampler(&self, id: ObjectId, state: &SamplerState);
    fn dispatch_realize(&self, dispatch: &RealizeDispatch);
}

#[cfg(test)]
mod tests {
    use super::ObjectCategory;

    #[test]
    fn context_bound_categories() {
        assert!(ObjectCategory::VertexArray.is_context_bound());
        assert!(ObjectCategory::Framebuffer.is_context_bound());
        assert!(!ObjectCategory::Buffer.is_context_bound());
        assert!(!ObjectCategory::Texture.is_context_bound());
    }

    #[test]
    fn slots_are_distinct() {
        let mut seen = [false; 4];
        for c in ObjectCategory::ALL {
            assert!(!seen[c.slot()]);
            seen[c.slot()] = true;
        }
    }
}
