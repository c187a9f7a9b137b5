// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The vertex inputs of a shader, and the batches that cached bindings against them.

A [ShaderInterface] maps input names to locations.  Batches that realize a vertex array for
an interface register themselves as observers; when the last handle to the interface drops,
every registered observer is told so it can release the vertex array it cached.

```
use batches_and_domains::images::shader_interface::ShaderInterface;

let interface = ShaderInterface::builder("unlit")
    .input("pos", 0)
    .input("color", 1)
    .build();
assert_eq!(interface.find_input("color"), Some(1));
assert_eq!(interface.find_input("uv"), None);
assert_eq!(interface.enabled_attribute_mask(), 0b11);
```
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use wasm_safe_mutex::Mutex;

pub type ShaderInterfaceId = u64;

static NEXT_INTERFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Receives the destruction notice of an interface it registered with.
pub trait InterfaceObserver: Send + Sync {
    fn interface_dropped(&self, interface: ShaderInterfaceId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInput {
    pub name: String,
    pub location: u8,
}

pub(crate) struct Shared {
    id: ShaderInterfaceId,
    name: String,
    inputs: Vec<ShaderInput>,
    observers: Mutex<Vec<Weak<dyn InterfaceObserver>>>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderInterface")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let observers = std::mem::take(&mut *self.observers.lock_sync());
        for observer in observers {
            if let Some(observer) = observer.upgrade() {
                observer.interface_dropped(self.id);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShaderInterface {
    shared: Arc<Shared>,
}

impl PartialEq for ShaderInterface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ShaderInterface {}

#[derive(Debug)]
pub struct ShaderInterfaceBuilder {
    name: String,
    inputs: Vec<ShaderInput>,
}

impl ShaderInterfaceBuilder {
    /// Declares a vertex input.
    ///
    /// # Panics
    ///
    /// If `location` is 16 or more, or the name is declared twice.
    pub fn input(mut self, name: &str, location: u8) -> Self {
        assert!(location < 16, "input {name} at location {location}");
        assert!(
            self.inputs.iter().all(|i| i.name != name),
            "input {name} declared twice"
        );
        self.inputs.push(ShaderInput {
            name: name.to_string(),
            location,
        });
        self
    }

    pub fn build(self) -> ShaderInterface {
        ShaderInterface {
            shared: Arc::new(Shared {
                id: NEXT_INTERFACE_ID.fetch_add(1, Ordering::Relaxed),
                name: self.name,
                inputs: self.inputs,
                observers: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl ShaderInterface {
    pub fn builder(name: &str) -> ShaderInterfaceBuilder {
        ShaderInterfaceBuilder {
            name: name.to_string(),
            inputs: Vec::new(),
        }
    }

    /// Unique for the life of the process.
    pub fn id(&self) -> ShaderInterfaceId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn inputs(&self) -> &[ShaderInput] {
        &self.shared.inputs
    }

    pub fn find_input(&self, name: &str) -> Option<u8> {
        self.shared
            .inputs
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.location)
    }

    /// One bit per declared input location.
    pub fn enabled_attribute_mask(&self) -> u16 {
        self.shared
            .inputs
            .iter()
            .fold(0, |mask, i| mask | 1 << i.location)
    }

    pub fn register_batch_ref(&self, observer: Weak<dyn InterfaceObserver>) {
        self.shared.observers.lock_sync().push(observer);
    }

    /// Forgets `observer`, identified by address.
    pub fn unregister_batch_ref(&self, observer: *const ()) {
        self.shared
            .observers
            .lock_sync()
            .retain(|o| o.strong_count() > 0 && o.as_ptr() as *const () != observer);
    }

    /// Registered observers still alive.
    pub fn batch_ref_count(&self) -> usize {
        self.shared
            .observers
            .lock_sync()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        ShaderInterface { shared }
    }
}
