// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Native object id allocation and cross-thread reclamation.

Native ids of vertex arrays and framebuffers belong to the context that created them and
can only be deleted while that context is active.  A thread that drops the last reference to
such an object without holding the owning context cannot delete it, so the id is *orphaned*:
appended to the owner's [OrphanList] and deleted the next time the owner is activated or
allocates.

Buffers and textures are shared between contexts and have no owner.  When freed with no
context active they go to the device's [ProcessWideOrphanRegistry], which every context of
the device drains.

Lists are drained by taking their contents under the lock and deleting after it is released,
so a concurrent [ObjectIdAllocator::free] either lands in the taken batch or in the next one.
*/

use crate::images::context::{ContextRef, ThreadLocalContext};
use crate::imp::{NativeApi, ObjectCategory, ObjectId};
use std::sync::Arc;
use wasm_safe_mutex::Mutex;

const CATEGORY_COUNT: usize = ObjectCategory::ALL.len();

/// Ids pending deletion, per category.
#[derive(Debug)]
pub struct OrphanList {
    pending: Mutex<[Vec<ObjectId>; CATEGORY_COUNT]>,
}

impl Default for OrphanList {
    fn default() -> Self {
        OrphanList {
            pending: Mutex::new(Default::default()),
        }
    }
}

impl OrphanList {
    pub fn push(&self, category: ObjectCategory, id: ObjectId) {
        self.pending.lock_sync()[category.slot()].push(id);
    }

    /// Empties the list, returning what it held.
    pub fn take(&self) -> [Vec<ObjectId>; CATEGORY_COUNT] {
        std::mem::take(&mut *self.pending.lock_sync())
    }

    pub fn pending(&self, category: ObjectCategory) -> usize {
        self.pending.lock_sync()[category.slot()].len()
    }

    pub fn len(&self) -> usize {
        self.pending.lock_sync().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/**
The context-less orphan list of a device.

Holds buffer and texture ids freed while no context of the device was active.  Empty when
the device is created; any ids still pending when the device drops are never deleted, so
embedders activate a context once more before tearing down.
*/
#[derive(Debug, Default)]
pub struct ProcessWideOrphanRegistry {
    list: OrphanList,
}

impl ProcessWideOrphanRegistry {
    pub fn push(&self, category: ObjectCategory, id: ObjectId) {
        assert!(
            !category.is_context_bound(),
            "{category:?} ids need an owning context"
        );
        self.list.push(category, id);
    }

    pub fn pending(&self, category: ObjectCategory) -> usize {
        self.list.pending(category)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    fn take(&self) -> [Vec<ObjectId>; CATEGORY_COUNT] {
        self.list.take()
    }
}

#[derive(Debug)]
pub struct ObjectIdAllocator {
    native: Arc<dyn NativeApi>,
    registry: ProcessWideOrphanRegistry,
}

impl ObjectIdAllocator {
    pub(crate) fn new(native: Arc<dyn NativeApi>) -> Self {
        ObjectIdAllocator {
            native,
            registry: ProcessWideOrphanRegistry::default(),
        }
    }

    pub fn registry(&self) -> &ProcessWideOrphanRegistry {
        &self.registry
    }

    /// The context of this device active on the calling thread.
    fn active_context(&self) -> Option<ContextRef> {
        ThreadLocalContext::current().filter(|c| std::ptr::eq(c.device().allocator(), self))
    }

    /**
    Creates a native object.

    Vertex arrays and framebuffers require a context of this device to be active on the
    calling thread.  Pending orphans of the active context and of the registry are deleted
    first.

    # Panics

    If `category` is context-bound and no context is active.
    */
    pub fn allocate(&self, category: ObjectCategory) -> ObjectId {
        let active = self.active_context();
        if category.is_context_bound() {
            assert!(
                active.is_some(),
                "{category:?} allocated with no context active on this thread"
            );
        }
        if let Some(context) = &active {
            self.drain(context);
        }
        self.native.create_object(category)
    }

    /**
    Releases a native object, now if possible and otherwise as an orphan.

    * With an `owner` active on this thread, the id is deleted immediately.
    * With any other `owner`, it is appended to the owner's orphan list.
    * Without an owner (buffers and textures), it is deleted immediately if any context of
      this device is active on this thread, otherwise it goes to the registry.

    Never blocks on another thread beyond a list append.
    */
    pub fn free(&self, category: ObjectCategory, id: ObjectId, owner: Option<&ContextRef>) {
        match owner {
            Some(owner) if owner.is_current() => {
                self.native.delete_objects(category, &[id]);
            }
            Some(owner) if owner.is_discarded() => {
                logwise::warn_sync!(
                    "leaking {category} {id}: owning context {context} was discarded",
                    category = logwise::privacy::LogIt(&category),
                    id = id,
                    context = owner.id()
                );
            }
            Some(owner) => {
                logwise::trace_sync!(
                    "orphaning {category} {id} to context {context}",
                    category = logwise::privacy::LogIt(&category),
                    id = id,
                    context = owner.id()
                );
                owner.orphans().push(category, id);
            }
            None => {
                assert!(
                    !category.is_context_bound(),
                    "{category:?} freed without its owning context"
                );
                if self.active_context().is_some() {
                    self.native.delete_objects(category, &[id]);
                } else {
                    self.registry.push(category, id);
                }
            }
        }
    }

    /// Deletes everything pending for `context` and for the registry.
    pub(crate) fn drain(&self, context: &ContextRef) {
        debug_assert!(context.is_current());
        self.delete_all(context.orphans().take());
        self.delete_all(self.registry.take());
    }

    fn delete_all(&self, lists: [Vec<ObjectId>; CATEGORY_COUNT]) {
        for category in ObjectCategory::ALL {
            let ids = &lists[category.slot()];
            if !ids.is_empty() {
                logwise::trace_sync!(
                    "draining {count} orphaned {category}",
                    count = ids.len(),
                    category = logwise::privacy::LogIt(&category)
                );
                self.native.delete_objects(category, ids);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::context::GraphicsContext;
    use crate::images::device::Device;
    use crate::imp::RecordingApi;

    #[test]
    fn orphan_list_take_empties() {
        let list = OrphanList::default();
        list.push(ObjectCategory::Buffer, 3);
        list.push(ObjectCategory::VertexArray, 4);
        assert_eq!(list.len(), 2);
        let taken = list.take();
        assert_eq!(taken[ObjectCategory::Buffer.slot()], vec![3]);
        assert_eq!(taken[ObjectCategory::VertexArray.slot()], vec![4]);
        assert!(list.is_empty());
    }

    #[test]
    fn shared_objects_without_context_go_to_registry() {
        let api = Arc::new(RecordingApi::new());
        let device = Device::new(api.clone());
        let buffer = device.allocator().allocate(ObjectCategory::Buffer);
        device
            .allocator()
            .free(ObjectCategory::Buffer, buffer, None);
        assert_eq!(device.allocator().registry().pending(ObjectCategory::Buffer), 1);
        assert_eq!(api.deleted(ObjectCategory::Buffer), 0);

        let context = GraphicsContext::new(&device);
        assert!(device.allocator().registry().is_empty());
        assert_eq!(api.deletions_of(ObjectCategory::Buffer, buffer), 1);
        context.discard();
    }

    #[test]
    fn owner_active_deletes_immediately() {
        let api = Arc::new(RecordingApi::new());
        let device = Device::new(api.clone());
        let context = GraphicsContext::new(&device);
        let vao = device.allocator().allocate(ObjectCategory::VertexArray);
        device
            .allocator()
            .free(ObjectCategory::VertexArray, vao, Some(&context.handle()));
        assert_eq!(api.deletions_of(ObjectCategory::VertexArray, vao), 1);
        assert_eq!(context.pending_orphans(), 0);
        context.discard();
    }

    #[test]
    fn inactive_owner_collects_orphans() {
        let api = Arc::new(RecordingApi::new());
        let device = Device::new(api.clone());
        let context = GraphicsContext::new(&device);
        let vao = device.allocator().allocate(ObjectCategory::VertexArray);
        let handle = context.handle();
        context.deactivate();
        device
            .allocator()
            .free(ObjectCategory::VertexArray, vao, Some(&handle));
        assert_eq!(context.pending_orphans(), 1);
        assert_eq!(api.deletions_of(ObjectCategory::VertexArray, vao), 0);
        context.activate();
        assert_eq!(context.pending_orphans(), 0);
        assert_eq!(api.deletions_of(ObjectCategory::VertexArray, vao), 1);
        context.discard();
    }

    #[test]
    fn contexts_of_other_devices_do_not_count() {
        let api = Arc::new(RecordingApi::new());
        let device = Device::new(api.clone());
        let other = Device::new(Arc::new(RecordingApi::new()));
        let context = GraphicsContext::new(&other);
        let texture = device.allocator().allocate(ObjectCategory::Texture);
        device
            .allocator()
            .free(ObjectCategory::Texture, texture, None);
        assert_eq!(device.allocator().registry().pending(ObjectCategory::Texture), 1);
        context.discard();
    }

    #[test]
    #[should_panic]
    fn vertex_arrays_need_a_context() {
        let device = Device::new(Arc::new(RecordingApi::new()));
        device.allocator().allocate(ObjectCategory::VertexArray);
    }
}
