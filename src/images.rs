/*! Devices, contexts, and the objects whose lifetime they manage. */

pub mod allocator;
pub mod batch;
pub mod context;
pub mod device;
pub mod shader_interface;
pub mod vao_cache;

pub use batch::Batch;
pub use context::GraphicsContext;
pub use device::Device;
