// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Translation of the crate's binding state into wgpu descriptors.

A wgpu backend bakes vertex layouts into its pipelines instead of recording them into vertex
arrays.  These functions map what a [super::NativeApi] implementation receives into the
descriptor types it hands to wgpu.  Combinations wgpu cannot express map to `None`.
*/

use super::{AttributePointer, RealizeDispatch};
use crate::bindings::index_buffer::IndexType;
use crate::bindings::sampler::{Extension, Interpolation, SamplerState};
use crate::bindings::vertex_format::{ComponentType, FetchMode};
use crate::images::batch::PrimitiveType;
use crate::realize::sample::ResultType;
use wgpu::{AddressMode, FilterMode, SamplerBorderColor, SamplerDescriptor, VertexFormat, VertexStepMode};

pub fn vertex_format(component_type: ComponentType, component_count: u8, fetch_mode: FetchMode) -> Option<VertexFormat> {
    use ComponentType as C;
    use FetchMode as F;
    let format = match (component_type, fetch_mode, component_count) {
        (C::F32, F::Float, 1) => VertexFormat::Float32,
        (C::F32, F::Float, 2) => VertexFormat::Float32x2,
        (C::F32, F::Float, 3) => VertexFormat::Float32x3,
        (C::F32, F::Float, 4) => VertexFormat::Float32x4,

        (C::U32, F::Int, 1) => VertexFormat::Uint32,
        (C::U32, F::Int, 2) => VertexFormat::Uint32x2,
        (C::U32, F::Int, 3) => VertexFormat::Uint32x3,
        (C::U32, F::Int, 4) => VertexFormat::Uint32x4,
        (C::I32, F::Int, 1) => VertexFormat::Sint32,
        (C::I32, F::Int, 2) => VertexFormat::Sint32x2,
        (C::I32, F::Int, 3) => VertexFormat::Sint32x3,
        (C::I32, F::Int, 4) => VertexFormat::Sint32x4,

        (C::U8, F::Int, 2) => VertexFormat::Uint8x2,
        (C::U8, F::Int, 4) => VertexFormat::Uint8x4,
        (C::I8, F::Int, 2) => VertexFormat::Sint8x2,
        (C::I8, F::Int, 4) => VertexFormat::Sint8x4,
        (C::U8, F::IntToFloatUnit, 2) => VertexFormat::Unorm8x2,
        (C::U8, F::IntToFloatUnit, 4) => VertexFormat::Unorm8x4,
        (C::I8, F::IntToFloatUnit, 2) => VertexFormat::Snorm8x2,
        (C::I8, F::IntToFloatUnit, 4) => VertexFormat::Snorm8x4,

        (C::U16, F::Int, 2) => VertexFormat::Uint16x2,
        (C::U16, F::Int, 4) => VertexFormat::Uint16x4,
        (C::I16, F::Int, 2) => VertexFormat::Sint16x2,
        (C::I16, F::Int, 4) => VertexFormat::Sint16x4,
        (C::U16, F::IntToFloatUnit, 2) => VertexFormat::Unorm16x2,
        (C::U16, F::IntToFloatUnit, 4) => VertexFormat::Unorm16x4,
        (C::I16, F::IntToFloatUnit, 2) => VertexFormat::Snorm16x2,
        (C::I16, F::IntToFloatUnit, 4) => VertexFormat::Snorm16x4,

        //wgpu has no widening int-to-float fetch, and its packed 10-10-10-2 format is unsigned
        _ => return None,
    };
    Some(format)
}

pub fn vertex_attribute(pointer: &AttributePointer) -> Option<wgpu::VertexAttribute> {
    Some(wgpu::VertexAttribute {
        format: vertex_format(pointer.component_type, pointer.component_count, pointer.fetch_mode)?,
        offset: pointer.offset as u64,
        shader_location: pointer.location as u32,
    })
}

/// The attributes of one buffer, owned so a layout can borrow them.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedVertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl OwnedVertexBufferLayout {
    /**
    Groups attribute pointers by source buffer.

    All pointers must share a stride and divisor; a divisor of 1 steps per instance.
    Returns `None` if any pointer has no wgpu format.
    */
    pub fn from_pointers(pointers: &[AttributePointer]) -> Option<Self> {
        let first = pointers.first()?;
        debug_assert!(
            pointers
                .iter()
                .all(|p| p.stride == first.stride && p.divisor == first.divisor)
        );
        let attributes = pointers.iter().map(vertex_attribute).collect::<Option<Vec<_>>>()?;
        Some(OwnedVertexBufferLayout {
            array_stride: first.stride as u64,
            step_mode: if first.divisor == 0 {
                VertexStepMode::Vertex
            } else {
                VertexStepMode::Instance
            },
            attributes,
        })
    }

    pub fn as_layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

fn address_mode(extension: Extension) -> AddressMode {
    match extension {
        Extension::Clip => AddressMode::ClampToBorder,
        Extension::Extend => AddressMode::ClampToEdge,
        Extension::Repeat => AddressMode::Repeat,
        Extension::Mirror => AddressMode::MirrorRepeat,
    }
}

/// Bicubic filtering happens in the shader, from a linearly filtered sampler.
pub fn sampler_descriptor(state: &SamplerState) -> SamplerDescriptor<'static> {
    let (filter, anisotropy_clamp) = match state.interpolation {
        Interpolation::Nearest => (FilterMode::Nearest, 1),
        Interpolation::Bilinear | Interpolation::Bicubic => (FilterMode::Linear, 1),
        Interpolation::Anisotropic => (FilterMode::Linear, 16),
    };
    let clips = state.extension_x == Extension::Clip || state.extension_y == Extension::Clip;
    SamplerDescriptor {
        label: None,
        address_mode_u: address_mode(state.extension_x),
        address_mode_v: address_mode(state.extension_y),
        address_mode_w: AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: filter,
        lod_min_clamp: 0.0,
        lod_max_clamp: 32.0,
        compare: None,
        anisotropy_clamp,
        border_color: clips.then_some(SamplerBorderColor::TransparentBlack),
    }
}

pub fn primitive_topology(primitive: PrimitiveType) -> Option<wgpu::PrimitiveTopology> {
    match primitive {
        PrimitiveType::Points => Some(wgpu::PrimitiveTopology::PointList),
        PrimitiveType::Lines => Some(wgpu::PrimitiveTopology::LineList),
        PrimitiveType::LineStrip => Some(wgpu::PrimitiveTopology::LineStrip),
        PrimitiveType::Triangles => Some(wgpu::PrimitiveTopology::TriangleList),
        PrimitiveType::TriangleStrip => Some(wgpu::PrimitiveTopology::TriangleStrip),
        PrimitiveType::LineLoop | PrimitiveType::TriangleFan => None,
    }
}

pub fn index_format(index_type: IndexType) -> wgpu::IndexFormat {
    match index_type {
        IndexType::U16 => wgpu::IndexFormat::Uint16,
        IndexType::U32 => wgpu::IndexFormat::Uint32,
    }
}

/// Arguments of `ComputePass::dispatch_workgroups` for a realize dispatch.
pub fn dispatch_workgroups(dispatch: &RealizeDispatch) -> (u32, u32, u32) {
    (dispatch.groups[0].max(1), dispatch.groups[1].max(1), 1)
}

/// Storage format of a realized texture.  Three-channel values pad to four.
pub fn texture_format(result_type: ResultType) -> wgpu::TextureFormat {
    match result_type {
        ResultType::Float => wgpu::TextureFormat::R32Float,
        ResultType::Float2 => wgpu::TextureFormat::Rg32Float,
        ResultType::Float3 | ResultType::Float4 | ResultType::Color => wgpu::TextureFormat::Rgba32Float,
        ResultType::Int | ResultType::Menu => wgpu::TextureFormat::R32Sint,
        ResultType::Int2 => wgpu::TextureFormat::Rg32Sint,
        ResultType::Bool => wgpu::TextureFormat::R8Uint,
    }
}
