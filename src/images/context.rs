// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Graphics contexts and the per-thread active context.

A [GraphicsContext] is one binding of the native API to one thread at a time.  It owns a
default vertex array, an orphan list for its context-bound objects, and a set of clients
(batches) that cached vertex arrays against it.

Each thread has at most one active context, tracked by [ThreadLocalContext].  Activating a
context replaces whatever the thread had active.  A context may move between threads, but
only after the thread holding it released it.

# Lifecycle

```text
Created -> Active -> Inactive -> Active -> ... -> Discarded
```

[GraphicsContext::new] creates the context active on the calling thread.
[GraphicsContext::discard] is only valid on the current thread's active context; it clears
every registered batch cache, deletes pending orphans and the default vertex array, and
leaves the thread with no active context.

```
use batches_and_domains::images::context::{GraphicsContext, ContextState, ThreadLocalContext};
use batches_and_domains::images::device::Device;
use batches_and_domains::imp::RecordingApi;
use std::sync::Arc;

let device = Device::new(Arc::new(RecordingApi::new()));
let context = GraphicsContext::new(&device);
assert_eq!(context.state(), ContextState::Active);
context.deactivate();
assert!(ThreadLocalContext::current().is_none());
context.activate();
context.discard();
```
*/

use crate::images::allocator::OrphanList;
use crate::images::device::Device;
use crate::imp::{ObjectCategory, ObjectId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use wasm_safe_mutex::Mutex;

pub type ContextId = u64;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    Created,
    Active,
    Inactive,
    Discarded,
}

/// Something holding context-bound objects that must be released when a context goes away.
pub(crate) trait ContextClient: Send + Sync {
    /// Releases every object bound to `context`.  Called while `context` is active.
    fn context_discarded(&self, context: &ContextRef);
}

#[derive(Debug)]
struct Ownership {
    thread: Option<ThreadId>,
    state: ContextState,
}

struct Shared {
    id: ContextId,
    device: Device,
    default_vertex_array: Mutex<Option<ObjectId>>,
    orphans: OrphanList,
    clients: Mutex<Vec<Weak<dyn ContextClient>>>,
    ownership: Mutex<Ownership>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("ownership", &*self.ownership.lock_sync())
            .finish_non_exhaustive()
    }
}

/// A shared, non-owning reference to a context.
#[derive(Debug, Clone)]
pub struct ContextRef(Arc<Shared>);

impl PartialEq for ContextRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContextRef {}

impl ContextRef {
    pub fn id(&self) -> ContextId {
        self.0.id
    }

    pub fn device(&self) -> &Device {
        &self.0.device
    }

    pub fn state(&self) -> ContextState {
        self.0.ownership.lock_sync().state
    }

    /// Whether this is the active context of the calling thread.
    pub fn is_current(&self) -> bool {
        ThreadLocalContext::current().is_some_and(|c| c == *self)
    }

    pub fn is_discarded(&self) -> bool {
        self.state() == ContextState::Discarded
    }

    pub(crate) fn orphans(&self) -> &OrphanList {
        &self.0.orphans
    }

    pub(crate) fn add_client(&self, client: Weak<dyn ContextClient>) {
        self.0.clients.lock_sync().push(client);
    }

    /// Forgets `client`, identified by address.  Dead entries are pruned on the way.
    pub(crate) fn remove_client(&self, client: *const ()) {
        self.0
            .clients
            .lock_sync()
            .retain(|c| c.strong_count() > 0 && c.as_ptr() as *const () != client);
    }

    fn client_count(&self) -> usize {
        self.0
            .clients
            .lock_sync()
            .iter()
            .filter(|c| c.strong_count() > 0)
            .count()
    }

    fn claim(&self) {
        let current = std::thread::current().id();
        let mut ownership = self.0.ownership.lock_sync();
        assert!(
            ownership.state != ContextState::Discarded,
            "activating discarded context {}",
            self.0.id
        );
        assert!(
            ownership.thread.is_none_or(|t| t == current),
            "context {} is active on another thread",
            self.0.id
        );
        ownership.thread = Some(current);
        ownership.state = ContextState::Active;
    }

    fn release(&self) {
        let mut ownership = self.0.ownership.lock_sync();
        ownership.thread = None;
        if ownership.state == ContextState::Active {
            ownership.state = ContextState::Inactive;
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<ContextRef>> = const { RefCell::new(None) };
}

/**
The active context of the calling thread.

Empty at thread start.  A thread should release or discard its context before it exits;
otherwise the context stays claimed by a dead thread and can never be activated again.
*/
#[derive(Debug)]
pub struct ThreadLocalContext;

impl ThreadLocalContext {
    pub fn current() -> Option<ContextRef> {
        ACTIVE.with(|a| a.borrow().clone())
    }

    /// Makes `context` the active context of this thread, or clears it.
    ///
    /// # Panics
    ///
    /// If `context` is active on another thread, or discarded.
    pub fn activate(context: Option<&ContextRef>) {
        let previous = ACTIVE.with(|a| a.borrow_mut().take());
        if let Some(previous) = previous {
            if Some(&previous) != context {
                previous.release();
            }
        }
        let Some(context) = context else {
            return;
        };
        context.claim();
        ACTIVE.with(|a| *a.borrow_mut() = Some(context.clone()));
        let device = context.device();
        device.allocator().drain(context);
        if let Some(vao) = *context.0.default_vertex_array.lock_sync() {
            device.native().bind_vertex_array(Some(vao));
        }
    }
}

/// An owning handle to a graphics context.
#[derive(Debug)]
pub struct GraphicsContext {
    handle: ContextRef,
}

impl GraphicsContext {
    /// Creates a context and makes it active on the calling thread.
    pub fn new(device: &Device) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let handle = ContextRef(Arc::new(Shared {
            id,
            device: device.clone(),
            default_vertex_array: Mutex::new(None),
            orphans: OrphanList::default(),
            clients: Mutex::new(Vec::new()),
            ownership: Mutex::new(Ownership {
                thread: None,
                state: ContextState::Created,
            }),
        }));
        ThreadLocalContext::activate(Some(&handle));
        let vao = device.allocator().allocate(ObjectCategory::VertexArray);
        *handle.0.default_vertex_array.lock_sync() = Some(vao);
        device.native().bind_vertex_array(Some(vao));
        logwise::info_sync!("created graphics context {id}", id = id);
        GraphicsContext { handle }
    }

    pub fn id(&self) -> ContextId {
        self.handle.id()
    }

    pub fn handle(&self) -> ContextRef {
        self.handle.clone()
    }

    pub fn state(&self) -> ContextState {
        self.handle.state()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_current()
    }

    pub fn default_vertex_array(&self) -> Option<ObjectId> {
        *self.handle.0.default_vertex_array.lock_sync()
    }

    /// Makes this the active context of the calling thread, deleting pending orphans.
    pub fn activate(&self) {
        ThreadLocalContext::activate(Some(&self.handle));
    }

    /// Releases this context from the calling thread.
    pub fn deactivate(&self) {
        assert!(self.is_active(), "context {} is not active here", self.id());
        ThreadLocalContext::activate(None);
    }

    /// Ids orphaned to this context and not yet deleted.
    pub fn pending_orphans(&self) -> usize {
        self.handle.orphans().len()
    }

    /// Batches currently holding vertex arrays of this context.
    pub fn live_batches(&self) -> usize {
        self.handle.client_count()
    }

    /**
    Tears the context down.

    # Panics

    If this is not the active context of the calling thread.
    */
    pub fn discard(mut self) {
        assert!(
            self.is_active(),
            "discard of context {} which is not active on this thread",
            self.id()
        );
        self.teardown();
    }

    fn teardown(&mut self) {
        let handle = &self.handle;
        let clients = std::mem::take(&mut *handle.0.clients.lock_sync());
        for client in clients {
            if let Some(client) = client.upgrade() {
                client.context_discarded(handle);
            }
        }
        let allocator = handle.device().allocator();
        allocator.drain(handle);
        let vao = handle.0.default_vertex_array.lock_sync().take();
        if let Some(vao) = vao {
            allocator.free(ObjectCategory::VertexArray, vao, Some(handle));
        }
        debug_assert!(handle.orphans().is_empty());
        ThreadLocalContext::activate(None);
        handle.0.ownership.lock_sync().state = ContextState::Discarded;
        logwise::info_sync!("discarded graphics context {id}", id = handle.id());
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        if self.handle.is_discarded() {
            return;
        }
        if self.is_active() {
            self.teardown();
        } else {
            logwise::warn_sync!(
                "graphics context {id} dropped while inactive; its objects leak",
                id = self.id()
            );
        }
    }
}
