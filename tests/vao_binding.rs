//! Vertex array caching and attribute binding across shader interfaces.

use batches_and_domains::bindings::vertex_buffer::{BufferUsage, VertexBuffer};
use batches_and_domains::bindings::vertex_format::{ComponentType, FetchMode, VertexFormat};
use batches_and_domains::images::batch::{Batch, Ownership, PrimitiveType};
use batches_and_domains::images::context::GraphicsContext;
use batches_and_domains::images::device::Device;
use batches_and_domains::images::shader_interface::ShaderInterface;
use batches_and_domains::images::vao_cache::VAO_STATIC_CAPACITY;
use batches_and_domains::imp::{AttributePointer, ObjectCategory, RecordingApi};
use std::sync::Arc;

fn setup() -> (Arc<RecordingApi>, Device, GraphicsContext) {
    let api = Arc::new(RecordingApi::new());
    let device = Device::new(api.clone());
    let context = GraphicsContext::new(&device);
    (api, device, context)
}

fn pos_color(device: &Device) -> VertexBuffer {
    let mut format = VertexFormat::new();
    format
        .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
        .unwrap();
    format
        .add_attribute("color", ComponentType::U8, 4, FetchMode::IntToFloatUnit)
        .unwrap();
    let buffer = VertexBuffer::new(device, format, BufferUsage::Static);
    buffer.allocate(3);
    buffer.fill_attribute_pod(0, &[[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    buffer.fill_attribute_pod(1, &[[255u8, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]);
    buffer
}

fn interfaces(n: usize) -> Vec<ShaderInterface> {
    (0..n)
        .map(|i| {
            ShaderInterface::builder(&format!("shader{i}"))
                .input("pos", 0)
                .input("color", 1)
                .build()
        })
        .collect()
}

#[test]
fn repeated_draws_hit_the_cache() {
    let (api, device, context) = setup();
    let mut batch = Batch::new(&device, PrimitiveType::Triangles, pos_color(&device), Ownership::Owned);
    let shader = ShaderInterface::builder("s").input("pos", 0).input("color", 1).build();
    let before = api.created(ObjectCategory::VertexArray);
    batch.draw(&shader).unwrap();
    batch.draw(&shader).unwrap();
    batch.draw_range(&shader, 1, 2).unwrap();
    assert_eq!(api.created(ObjectCategory::VertexArray), before + 1);
    assert_eq!(api.draws().len(), 3);
    drop(batch);
    context.discard();
}

#[test]
fn few_interfaces_stay_inline() {
    let (api, device, context) = setup();
    let mut batch = Batch::new(&device, PrimitiveType::Triangles, pos_color(&device), Ownership::Owned);
    let shaders = interfaces(VAO_STATIC_CAPACITY);
    let before = api.created(ObjectCategory::VertexArray);
    for _ in 0..2 {
        for shader in &shaders {
            batch.draw(shader).unwrap();
        }
    }
    assert_eq!(api.created(ObjectCategory::VertexArray), before + VAO_STATIC_CAPACITY);
    assert!(!batch.has_dynamic_vertex_array_cache());
    assert_eq!(batch.vertex_array_cache_promotions(), 0);
    assert_eq!(batch.cached_vertex_arrays(), VAO_STATIC_CAPACITY);
    drop(batch);
    context.discard();
}

#[test]
fn many_interfaces_promote_once() {
    let (api, device, context) = setup();
    let mut batch = Batch::new(&device, PrimitiveType::Triangles, pos_color(&device), Ownership::Owned);
    let n = VAO_STATIC_CAPACITY + 20;
    let shaders = interfaces(n);
    let default_vertex_arrays = api.live(ObjectCategory::VertexArray);
    for shader in &shaders {
        batch.draw(shader).unwrap();
    }
    for shader in &shaders {
        batch.draw(shader).unwrap();
    }
    assert!(batch.has_dynamic_vertex_array_cache());
    assert_eq!(batch.vertex_array_cache_promotions(), 1);
    assert_eq!(batch.cached_vertex_arrays(), n);
    assert_eq!(api.live(ObjectCategory::VertexArray), default_vertex_arrays + n);
    for shader in &shaders {
        assert_eq!(shader.batch_ref_count(), 1);
    }

    drop(batch);
    assert_eq!(api.live(ObjectCategory::VertexArray), default_vertex_arrays);
    for shader in &shaders {
        assert_eq!(shader.batch_ref_count(), 0);
    }
    context.discard();
}

#[test]
fn dropping_an_interface_releases_its_vertex_array() {
    let (api, device, context) = setup();
    let mut batch = Batch::new(&device, PrimitiveType::Triangles, pos_color(&device), Ownership::Owned);
    let mut shaders = interfaces(2);
    for shader in &shaders {
        batch.draw(shader).unwrap();
    }
    let dropped = shaders.pop().unwrap();
    let vao = batch.vertex_array_for(&dropped).unwrap();
    drop(dropped);
    assert_eq!(api.deletions_of(ObjectCategory::VertexArray, vao), 1);
    assert_eq!(batch.cached_vertex_arrays(), 1);
    batch.draw(&shaders[0]).unwrap();
    drop(batch);
    context.discard();
}

fn sorted_pointers(api: &RecordingApi, vao: u32) -> Vec<AttributePointer> {
    let mut pointers = api.vertex_array_attributes(vao);
    pointers.sort_by_key(|p| p.offset);
    pointers
}

#[test]
fn two_interfaces_differ_only_in_location() {
    let (api, device, context) = setup();
    let buffer = pos_color(&device);
    let format = buffer.format();
    assert_eq!(format.attribute(0).offset(), 0);
    assert_eq!(format.attribute(1).offset(), 12);
    assert_eq!(format.stride(), 16);

    let mut batch = Batch::new(&device, PrimitiveType::Triangles, buffer, Ownership::Owned);
    let first = ShaderInterface::builder("first").input("pos", 0).input("color", 1).build();
    let second = ShaderInterface::builder("second").input("color", 2).input("pos", 5).build();
    batch.draw(&first).unwrap();
    batch.draw(&second).unwrap();

    let a = batch.vertex_array_for(&first).unwrap();
    let b = batch.vertex_array_for(&second).unwrap();
    assert_ne!(a, b);

    let a = sorted_pointers(&api, a);
    let b = sorted_pointers(&api, b);
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 2);
    assert_eq!(a.iter().map(|p| p.location).collect::<Vec<_>>(), [0, 1]);
    assert_eq!(b.iter().map(|p| p.location).collect::<Vec<_>>(), [5, 2]);
    for (a, b) in a.iter().zip(&b) {
        assert_eq!(a.stride, 16);
        assert_eq!(AttributePointer { location: b.location, ..*a }, *b);
    }
    assert_eq!(a[0].offset, 0);
    assert_eq!(a[1].offset, 12);
    assert_eq!(a[1].component_type, ComponentType::U8);
    assert_eq!(a[1].fetch_mode, FetchMode::IntToFloatUnit);

    drop(batch);
    context.discard();
}
