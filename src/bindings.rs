/*! Defines binding types: vertex data, its layout, and how it meets shader inputs. */

pub mod attribute_binding;
pub mod index_buffer;
pub mod sampler;
pub mod software;
pub mod vertex_buffer;
pub mod vertex_format;

pub use vertex_buffer::VertexBuffer;
pub use vertex_format::VertexFormat;
