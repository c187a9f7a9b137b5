// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Draw batches.

A [Batch] pairs vertex buffers, an optional instance buffer and an optional index buffer with
a primitive type.  Drawing it with a [ShaderInterface] needs a vertex array describing where
each shader input comes from; the batch builds one per interface on first use and caches it.

# Context binding

The first vertex array a batch builds binds the batch to the calling thread's active
context.  From then on it may only be drawn under that context, until the context is
discarded, which clears the cache and unbinds the batch.

# Invalidation

Any structural change (adding a vertex buffer, replacing the instance or index buffer)
clears the whole cache.  Dropping an interface drops only its entry.

```
use batches_and_domains::bindings::vertex_buffer::{VertexBuffer, BufferUsage};
use batches_and_domains::bindings::vertex_format::{VertexFormat, ComponentType, FetchMode};
use batches_and_domains::images::batch::{Batch, Ownership, PrimitiveType};
use batches_and_domains::images::context::GraphicsContext;
use batches_and_domains::images::device::Device;
use batches_and_domains::images::shader_interface::ShaderInterface;
use batches_and_domains::imp::RecordingApi;
use std::sync::Arc;

let api = Arc::new(RecordingApi::new());
let device = Device::new(api.clone());
let context = GraphicsContext::new(&device);

let mut format = VertexFormat::new();
format.add_attribute("pos", ComponentType::F32, 2, FetchMode::Float).unwrap();
let vertices = VertexBuffer::new(&device, format, BufferUsage::Static);
vertices.allocate(3);

let mut batch = Batch::new(&device, PrimitiveType::Triangles, vertices, Ownership::Owned);
let shader = ShaderInterface::builder("flat").input("pos", 0).build();
batch.draw(&shader).unwrap();
batch.draw(&shader).unwrap();
assert_eq!(api.draws().len(), 2);
assert_eq!(batch.cached_vertex_arrays(), 1);

drop(batch);
context.discard();
```
*/

use crate::Error;
use crate::bindings::attribute_binding::AttributeBindingTable;
use crate::bindings::index_buffer::IndexBuffer;
use crate::bindings::vertex_buffer::VertexBuffer;
use crate::images::context::{ContextClient, ContextRef, ThreadLocalContext};
use crate::images::device::Device;
use crate::images::shader_interface::{InterfaceObserver, ShaderInterface, ShaderInterfaceId};
use crate::images::vao_cache::{VaoCache, VaoEntry};
use crate::imp::{AttributePointer, DrawCall, IndexedDraw, ObjectCategory, ObjectId};
use arrayvec::ArrayVec;
use std::sync::{Arc, Weak};
use wasm_safe_mutex::Mutex;

pub const MAX_BATCH_VERTEX_BUFFERS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Whether a batch releases a buffer's GPU storage when the batch drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Released with the batch, even if other handles to the buffer remain.
    Owned,
    /// Left alone; the buffer lives as long as its handles.
    Shared,
}

#[derive(Debug)]
struct Attached<T> {
    buffer: T,
    ownership: Ownership,
}

#[derive(Debug)]
struct State {
    vertex_buffers: ArrayVec<Attached<VertexBuffer>, MAX_BATCH_VERTEX_BUFFERS>,
    instance: Option<Attached<VertexBuffer>>,
    index: Option<Attached<IndexBuffer>>,
    cache: VaoCache,
    context: Option<ContextRef>,
}

#[derive(Debug)]
struct Shared {
    device: Device,
    primitive: PrimitiveType,
    state: Mutex<State>,
    weak_self: Weak<Shared>,
}

/// Vertex arrays removed from the cache, to be released once the state lock is gone.
struct Released {
    entries: Vec<VaoEntry>,
    context: Option<ContextRef>,
}

impl Shared {
    fn as_observer(&self) -> Weak<dyn InterfaceObserver> {
        self.weak_self.clone()
    }

    fn address(&self) -> *const () {
        self as *const Shared as *const ()
    }

    fn release(&self, released: Released) {
        if released.entries.is_empty() {
            return;
        }
        let Some(context) = released.context else {
            debug_assert!(false, "cached vertex arrays without a bound context");
            return;
        };
        let allocator = self.device.allocator();
        for entry in released.entries {
            allocator.free(ObjectCategory::VertexArray, entry.vao, Some(&context));
            if let Some(interface) = entry.interface_ref.upgrade() {
                ShaderInterface::from_shared(interface).unregister_batch_ref(self.address());
            }
        }
    }

    fn take_cache(&self, state: &mut State) -> Released {
        Released {
            entries: state.cache.take_all(),
            context: state.context.clone(),
        }
    }
}

impl InterfaceObserver for Shared {
    fn interface_dropped(&self, interface: ShaderInterfaceId) {
        let released = {
            let mut state = self.state.lock_sync();
            let entry = state.cache.remove(interface);
            Released {
                entries: entry.into_iter().collect(),
                context: state.context.clone(),
            }
        };
        self.release(released);
    }
}

impl ContextClient for Shared {
    fn context_discarded(&self, context: &ContextRef) {
        let released = {
            let mut state = self.state.lock_sync();
            if state.context.as_ref() != Some(context) {
                return;
            }
            let released = self.take_cache(&mut *state);
            state.context = None;
            released
        };
        logwise::trace_sync!(
            "context {context} discarded; releasing {count} vertex arrays",
            context = context.id(),
            count = released.entries.len()
        );
        self.release(released);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let (released, owned_vertices, owned_index) = {
            let mut state = self.state.lock_sync();
            let released = self.take_cache(&mut *state);
            let mut owned_vertices: Vec<VertexBuffer> = state
                .vertex_buffers
                .drain(..)
                .filter(|a| a.ownership == Ownership::Owned)
                .map(|a| a.buffer)
                .collect();
            if let Some(instance) = state.instance.take() {
                if instance.ownership == Ownership::Owned {
                    owned_vertices.push(instance.buffer);
                }
            }
            let owned_index = state
                .index
                .take()
                .filter(|a| a.ownership == Ownership::Owned)
                .map(|a| a.buffer);
            (released, owned_vertices, owned_index)
        };
        if let Some(context) = &released.context {
            context.remove_client(self.address());
        }
        self.release(released);
        for buffer in owned_vertices {
            buffer.discard();
        }
        if let Some(index) = owned_index {
            index.discard();
        }
    }
}

#[derive(Debug)]
pub struct Batch {
    shared: Arc<Shared>,
}

impl Batch {
    /// Creates a batch around its primary vertex buffer.
    pub fn new(device: &Device, primitive: PrimitiveType, vertices: VertexBuffer, ownership: Ownership) -> Self {
        let mut vertex_buffers = ArrayVec::new();
        vertex_buffers.push(Attached {
            buffer: vertices,
            ownership,
        });
        let shared = Arc::new_cyclic(|weak_self| Shared {
            device: device.clone(),
            primitive,
            state: Mutex::new(State {
                vertex_buffers,
                instance: None,
                index: None,
                cache: VaoCache::default(),
                context: None,
            }),
            weak_self: weak_self.clone(),
        });
        Batch { shared }
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.shared.primitive
    }

    fn mutate<R>(&mut self, f: impl FnOnce(&mut State) -> R) -> R {
        let (result, released) = {
            let mut state = self.shared.state.lock_sync();
            let result = f(&mut *state);
            (result, self.shared.take_cache(&mut *state))
        };
        self.shared.release(released);
        result
    }

    /**
    Attaches another vertex buffer and returns its slot.

    # Panics

    If the batch already holds [MAX_BATCH_VERTEX_BUFFERS] vertex buffers.
    */
    pub fn add_vertex_buffer(&mut self, vertices: VertexBuffer, ownership: Ownership) -> usize {
        self.mutate(|state| {
            assert!(
                !state.vertex_buffers.is_full(),
                "a batch holds at most {MAX_BATCH_VERTEX_BUFFERS} vertex buffers"
            );
            state.vertex_buffers.push(Attached {
                buffer: vertices,
                ownership,
            });
            state.vertex_buffers.len() - 1
        })
    }

    /// Replaces the per-instance buffer.  A replaced owned buffer is released.
    pub fn set_instance_buffer(&mut self, instance: Option<VertexBuffer>, ownership: Ownership) {
        let replaced = self.mutate(|state| {
            std::mem::replace(
                &mut state.instance,
                instance.map(|buffer| Attached { buffer, ownership }),
            )
        });
        if let Some(old) = replaced {
            if old.ownership == Ownership::Owned {
                old.buffer.discard();
            }
        }
    }

    /// Replaces the index buffer.  A replaced owned buffer is released.
    pub fn set_index_buffer(&mut self, index: Option<IndexBuffer>, ownership: Ownership) {
        let replaced = self.mutate(|state| {
            std::mem::replace(
                &mut state.index,
                index.map(|buffer| Attached { buffer, ownership }),
            )
        });
        if let Some(old) = replaced {
            if old.ownership == Ownership::Owned {
                old.buffer.discard();
            }
        }
    }

    pub fn vertex_buffer_count(&self) -> usize {
        self.shared.state.lock_sync().vertex_buffers.len()
    }

    pub fn vertex_buffer(&self, slot: usize) -> Option<VertexBuffer> {
        self.shared
            .state
            .lock_sync()
            .vertex_buffers
            .get(slot)
            .map(|a| a.buffer.clone())
    }

    pub fn instance_buffer(&self) -> Option<VertexBuffer> {
        self.shared
            .state
            .lock_sync()
            .instance
            .as_ref()
            .map(|a| a.buffer.clone())
    }

    pub fn index_buffer(&self) -> Option<IndexBuffer> {
        self.shared
            .state
            .lock_sync()
            .index
            .as_ref()
            .map(|a| a.buffer.clone())
    }

    /// The context this batch is bound to, if it cached any vertex array.
    pub fn bound_context(&self) -> Option<ContextRef> {
        self.shared.state.lock_sync().context.clone()
    }

    pub fn cached_vertex_arrays(&self) -> usize {
        self.shared.state.lock_sync().cache.len()
    }

    /// Whether the vertex array cache outgrew its inline storage.
    pub fn has_dynamic_vertex_array_cache(&self) -> bool {
        self.shared.state.lock_sync().cache.is_dynamic()
    }

    pub fn vertex_array_cache_promotions(&self) -> u32 {
        self.shared.state.lock_sync().cache.promotions()
    }

    /// The vertex array cached for `interface`, if any.
    pub fn vertex_array_for(&self, interface: &ShaderInterface) -> Option<ObjectId> {
        self.shared.state.lock_sync().cache.lookup(interface.id())
    }

    /// Drops every cached vertex array.
    pub fn clear_vertex_arrays(&mut self) {
        self.mutate(|_| ());
    }

    pub fn draw(&mut self, interface: &ShaderInterface) -> Result<(), Error> {
        self.draw_advanced(interface, 0, 0, 0, 0)
    }

    pub fn draw_range(&mut self, interface: &ShaderInterface, v_first: u32, v_count: u32) -> Result<(), Error> {
        self.draw_advanced(interface, v_first, v_count, 0, 0)
    }

    pub fn draw_instanced(&mut self, interface: &ShaderInterface, i_count: u32) -> Result<(), Error> {
        self.draw_advanced(interface, 0, 0, 0, i_count)
    }

    /**
    Draws a range of vertices and instances.

    A `v_count` of 0 draws every index (or every vertex of the primary buffer, when not
    indexed).  An `i_count` of 0 draws one instance per element of the instance buffer, or a
    single instance without one.  If either resolves to zero nothing is drawn.

    # Panics

    If the batch is bound to a context other than the active one, or a vertex array has to
    be built with no context active.
    */
    pub fn draw_advanced(
        &mut self,
        interface: &ShaderInterface,
        v_first: u32,
        v_count: u32,
        i_first: u32,
        i_count: u32,
    ) -> Result<(), Error> {
        let shared = &self.shared;
        let mut state = shared.state.lock_sync();
        let v_count = if v_count == 0 {
            match &state.index {
                Some(index) => index.buffer.len(),
                None => state.vertex_buffers[0].buffer.vertex_len() as u32,
            }
        } else {
            v_count
        };
        let i_count = if i_count == 0 {
            state
                .instance
                .as_ref()
                .map(|i| i.buffer.vertex_len() as u32)
                .unwrap_or(1)
        } else {
            i_count
        };
        if v_count == 0 || i_count == 0 {
            return Ok(());
        }

        let vao = match state.cache.lookup(interface.id()) {
            Some(vao) => {
                let bound = state.context.as_ref();
                assert!(
                    bound.is_some_and(ContextRef::is_current),
                    "batch drawn outside the context it is bound to"
                );
                let native = shared.device.native();
                native.bind_vertex_array(Some(vao));
                //keep GPU copies of dirty buffers current
                for attached in &state.vertex_buffers {
                    attached.buffer.use_buffer();
                }
                if let Some(instance) = &state.instance {
                    instance.buffer.use_buffer();
                }
                if let Some(index) = &state.index {
                    index.buffer.use_buffer();
                }
                vao
            }
            None => realize_vertex_array(shared, &mut *state, interface)?,
        };

        let native = shared.device.native();
        let indexed = state.index.as_ref().map(|index| {
            let index = &index.buffer;
            if index.restart_enabled() {
                native.set_primitive_restart(true, index.restart_index());
            }
            let first = index.index_start() + v_first;
            IndexedDraw {
                index_type: index.index_type(),
                byte_offset: first as usize * index.index_type().size(),
                base_vertex: index.base_index() as i32,
            }
        });
        let first = match &state.index {
            Some(index) => index.buffer.index_start() + v_first,
            None => v_first,
        };
        native.draw(&DrawCall {
            primitive: shared.primitive,
            first,
            count: v_count,
            first_instance: i_first,
            instance_count: i_count,
            indexed,
        });
        logwise::trace_sync!(
            "drew batch with vertex array {vao}",
            vao = vao
        );
        Ok(())
    }
}

/// Builds, caches and binds a vertex array of `shared` for `interface`.
fn realize_vertex_array(shared: &Shared, state: &mut State, interface: &ShaderInterface) -> Result<ObjectId, Error> {
    let active = ThreadLocalContext::current();
    let Some(active) = active else {
        panic!("batch drawn with no context active on this thread");
    };
    match &state.context {
        Some(bound) => assert!(
            *bound == active,
            "batch bound to context {} drawn under context {}",
            bound.id(),
            active.id()
        ),
        None => {
            active.add_client(shared.weak_self.clone());
            state.context = Some(active.clone());
        }
    }

    let allocator = shared.device.allocator();
    let native = shared.device.native();
    let vao = allocator.allocate(ObjectCategory::VertexArray);
    native.bind_vertex_array(Some(vao));
    if let Err(e) = populate(shared, state, interface) {
        native.bind_vertex_array(None);
        allocator.free(ObjectCategory::VertexArray, vao, Some(&active));
        return Err(e);
    }

    let promoted = state.cache.insert(VaoEntry {
        interface: interface.id(),
        interface_ref: interface.downgrade(),
        vao,
    });
    if promoted {
        logwise::warn_sync!(
            "vertex array cache outgrew {count} inline entries",
            count = crate::images::vao_cache::VAO_STATIC_CAPACITY
        );
    }
    interface.register_batch_ref(shared.as_observer());
    logwise::trace_sync!(
        "realized vertex array {vao} for shader interface {interface}",
        vao = vao,
        interface = interface.id()
    );
    Ok(vao)
}

/// Points every shader input at the buffer that provides it.  Expects the vertex array bound.
fn populate(shared: &Shared, state: &State, interface: &ShaderInterface) -> Result<(), Error> {
    let _interval = logwise::perfwarn_begin!("populate vertex array");
    let resolution = shared.device.config().attribute_resolution;
    let native = shared.device.native();
    let mut bound: u16 = 0;

    let vertex = state.vertex_buffers.iter().map(|a| (&a.buffer, 0));
    let instance = state.instance.iter().map(|a| (&a.buffer, 1));
    for (buffer, divisor) in vertex.chain(instance) {
        buffer.use_buffer();
        let format = buffer.format();
        let table = AttributeBindingTable::resolve(format, interface, resolution)?;
        let vertex_len = buffer.vertex_len();
        for (slot, attribute) in format.attributes().iter().enumerate() {
            let Some(location) = table.get(slot) else {
                continue;
            };
            let layout = format.attribute_layout(slot, vertex_len);
            let span = attribute.location_span();
            let component_count = if span > 1 { 4 } else { attribute.component_count() };
            for i in 0..span {
                let location = location + i;
                if location >= 16 {
                    break;
                }
                if bound & (1 << location) != 0 {
                    continue;
                }
                bound |= 1 << location;
                native.set_vertex_attribute(&AttributePointer {
                    location,
                    component_count,
                    component_type: attribute.component_type(),
                    fetch_mode: attribute.fetch_mode(),
                    stride: layout.stride,
                    offset: layout.offset + 16 * i as usize,
                    divisor,
                });
            }
        }
    }

    for input in interface.inputs() {
        if bound & (1 << input.location) == 0 {
            native.set_default_attribute(input.location);
        }
    }
    if let Some(index) = &state.index {
        index.buffer.use_buffer();
    }
    Ok(())
}
