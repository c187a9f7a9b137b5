/*! batches_and_domains is the resource-lifetime core of a multi-threaded renderer, plus the
image realization step of a compositing pipeline.

# Object lifetime

Native graphics objects are plain integer handles.  Some of them (vertex arrays,
framebuffers) belong to one graphics context and may only be deleted while that context is
active, yet the values that own them are dropped on whatever thread finishes with them last.

The [images::allocator::ObjectIdAllocator] resolves this by never blocking: a free from the
wrong thread parks the id on the owning context's orphan list, and the owner deletes it the
next time it activates or allocates.

| Category     | Owned by         | Freed elsewhere goes to                          |
|--------------|------------------|--------------------------------------------------|
| Buffer       | the device       | the process-wide registry, if no context is active |
| Texture      | the device       | the process-wide registry, if no context is active |
| Vertex array | one context      | that context's orphan list                       |
| Framebuffer  | one context      | that context's orphan list                       |

# Batches

A [images::batch::Batch] pairs vertex, instance and index buffers with a primitive type.  Drawing
it against a [images::shader_interface::ShaderInterface] realizes a vertex array binding the
batch's attributes to the interface's input locations.  Vertex arrays are cached per interface
and released when either the interface or the context they were built on goes away.

# Realization

[realize::operation::RealizeOnDomain] resamples a transformed image onto a pixel grid, in
software or through the native API.

# Backends

Everything native goes through [imp::NativeApi].  The crate ships [imp::RecordingApi], which
records calls without a GPU, and with `backend_wgpu` the translation of binding state into
[wgpu](https://wgpu.rs) descriptors.
*/

pub mod bindings;
mod bittricks;
pub mod error;
pub mod images;
pub mod imp;
pub mod realize;

pub use error::Error;
pub use vec_parallel::Strategy;

pub type Priority = some_executor::Priority;
