// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device: a native API, its object allocator, and configuration.
//!
//! Every other object in the crate holds a [Device] to reach the native API.  Devices
//! replace process-global state, so two devices never see each other's orphans.
use std::sync::Arc;

use crate::bindings::attribute_binding::AttributeResolution;
use crate::images::allocator::ObjectIdAllocator;
use crate::imp::NativeApi;

/// Behavior switches of a [Device].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Defaults to [AttributeResolution::Strict] when built with `strict_attributes`.
    pub attribute_resolution: AttributeResolution,
    /// Largest texture edge the device accepts.  Realized domains are clamped to it.
    pub max_texture_size: u32,
}

/// wgpu's default `max_texture_dimension_2d`.
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            attribute_resolution: AttributeResolution::default(),
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
        }
    }
}

#[derive(Debug)]
struct Shared {
    native: Arc<dyn NativeApi>,
    allocator: ObjectIdAllocator,
    config: DeviceConfig,
}

#[derive(Debug, Clone)]
pub struct Device(Arc<Shared>);

impl Device {
    pub fn new(native: Arc<dyn NativeApi>) -> Self {
        Self::with_config(native, DeviceConfig::default())
    }

    pub fn with_config(native: Arc<dyn NativeApi>, config: DeviceConfig) -> Self {
        Device(Arc::new(Shared {
            allocator: ObjectIdAllocator::new(native.clone()),
            native,
            config,
        }))
    }

    pub fn native(&self) -> &dyn NativeApi {
        &*self.0.native
    }

    pub fn allocator(&self) -> &ObjectIdAllocator {
        &self.0.allocator
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.0.config
    }
}

// Boilerplate implementations

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Device {}

impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}
