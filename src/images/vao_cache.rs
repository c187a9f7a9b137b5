// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Per-batch cache of vertex arrays keyed by shader interface.

The first [VAO_STATIC_CAPACITY] entries live inline.  The next insertion promotes the cache to
a heap array that keeps every existing entry and grows [VAO_DYNAMIC_GROWTH] entries at a time.
A last-used slot sits in front of the search, since consecutive draws of a batch usually use
the same shader.

The cache only stores ids.  Freeing the vertex arrays of removed entries is the caller's job.
*/

use crate::images::shader_interface::{self, ShaderInterfaceId};
use crate::imp::ObjectId;
use arrayvec::ArrayVec;
use std::sync::Weak;

pub const VAO_STATIC_CAPACITY: usize = 3;
pub const VAO_DYNAMIC_GROWTH: usize = 16;

#[derive(Debug, Clone)]
pub(crate) struct VaoEntry {
    pub(crate) interface: ShaderInterfaceId,
    pub(crate) interface_ref: Weak<shader_interface::Shared>,
    pub(crate) vao: ObjectId,
}

#[derive(Debug)]
enum Slots {
    Static(ArrayVec<VaoEntry, VAO_STATIC_CAPACITY>),
    Dynamic(Vec<VaoEntry>),
}

#[derive(Debug)]
pub(crate) struct VaoCache {
    slots: Slots,
    last: Option<(ShaderInterfaceId, ObjectId)>,
    promotions: u32,
}

impl Default for VaoCache {
    fn default() -> Self {
        VaoCache {
            slots: Slots::Static(ArrayVec::new()),
            last: None,
            promotions: 0,
        }
    }
}

impl VaoCache {
    fn entries(&self) -> &[VaoEntry] {
        match &self.slots {
            Slots::Static(s) => s,
            Slots::Dynamic(d) => d,
        }
    }

    pub(crate) fn lookup(&mut self, interface: ShaderInterfaceId) -> Option<ObjectId> {
        if let Some((id, vao)) = self.last {
            if id == interface {
                return Some(vao);
            }
        }
        let vao = self
            .entries()
            .iter()
            .find(|e| e.interface == interface)
            .map(|e| e.vao)?;
        self.last = Some((interface, vao));
        Some(vao)
    }

    /// Adds an entry.  Returns true if this insertion promoted the cache to dynamic storage.
    pub(crate) fn insert(&mut self, entry: VaoEntry) -> bool {
        debug_assert!(self.entries().iter().all(|e| e.interface != entry.interface));
        self.last = Some((entry.interface, entry.vao));
        match &mut self.slots {
            Slots::Static(s) => match s.try_push(entry) {
                Ok(()) => false,
                Err(overflow) => {
                    let mut dynamic = Vec::with_capacity(VAO_STATIC_CAPACITY + VAO_DYNAMIC_GROWTH);
                    dynamic.extend(s.drain(..));
                    dynamic.push(overflow.element());
                    self.slots = Slots::Dynamic(dynamic);
                    self.promotions += 1;
                    true
                }
            },
            Slots::Dynamic(d) => {
                if d.len() == d.capacity() {
                    d.reserve_exact(VAO_DYNAMIC_GROWTH);
                }
                d.push(entry);
                false
            }
        }
    }

    pub(crate) fn remove(&mut self, interface: ShaderInterfaceId) -> Option<VaoEntry> {
        if self.last.is_some_and(|(id, _)| id == interface) {
            self.last = None;
        }
        match &mut self.slots {
            Slots::Static(s) => {
                let index = s.iter().position(|e| e.interface == interface)?;
                Some(s.remove(index))
            }
            Slots::Dynamic(d) => {
                let index = d.iter().position(|e| e.interface == interface)?;
                Some(d.remove(index))
            }
        }
    }

    /// Empties the cache and returns it to inline storage.
    pub(crate) fn take_all(&mut self) -> Vec<VaoEntry> {
        self.last = None;
        match std::mem::replace(&mut self.slots, Slots::Static(ArrayVec::new())) {
            Slots::Static(s) => s.into_iter().collect(),
            Slots::Dynamic(d) => d,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    pub(crate) fn is_dynamic(&self) -> bool {
        matches!(self.slots, Slots::Dynamic(_))
    }

    pub(crate) fn capacity(&self) -> usize {
        match &self.slots {
            Slots::Static(_) => VAO_STATIC_CAPACITY,
            Slots::Dynamic(d) => d.capacity(),
        }
    }

    /// How many times the cache was promoted since the batch was created.
    pub(crate) fn promotions(&self) -> u32 {
        self.promotions
    }
}
