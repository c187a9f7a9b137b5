// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Images flowing between operations.

An [Image] is a typed signal over a [Domain].  It is either a single value that covers the
whole plane, software pixels, or a texture on a [Device].  GPU textures are reference counted
and return their id to the device's allocator when the last handle drops, so an image may be
dropped on any thread.
*/

use crate::bindings::sampler::SamplerState;
use crate::images::device::Device;
use crate::imp::{ObjectCategory, ObjectId};
use crate::realize::domain::Domain;
use crate::realize::sample::{Pixels, ResultType, Sample};
use glam::IVec2;
use std::sync::Arc;

#[derive(Debug)]
struct GpuTextureShared {
    device: Device,
    id: ObjectId,
    size: IVec2,
}

impl Drop for GpuTextureShared {
    fn drop(&mut self) {
        self.device
            .allocator()
            .free(ObjectCategory::Texture, self.id, None);
    }
}

/// A texture allocated on a device.
#[derive(Debug, Clone)]
pub struct GpuTexture(Arc<GpuTextureShared>);

impl PartialEq for GpuTexture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl GpuTexture {
    /// Takes ownership of texture `id`, which must come from `device`'s allocator.
    pub fn from_id(device: &Device, id: ObjectId, size: IVec2) -> Self {
        GpuTexture(Arc::new(GpuTextureShared {
            device: device.clone(),
            id,
            size,
        }))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn device(&self) -> &Device {
        &self.0.device
    }

    pub fn size(&self) -> IVec2 {
        self.0.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    /// Declared but not yet computed.
    Unallocated,
    Single(Sample),
    Pixels(Pixels),
    Gpu(GpuTexture),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    result_type: ResultType,
    domain: Domain,
    sampler: SamplerState,
    storage: Storage,
}

impl Image {
    /// An unallocated image of `result_type`.
    pub fn new(result_type: ResultType) -> Self {
        Image {
            result_type,
            domain: Domain::identity(IVec2::ONE),
            sampler: SamplerState::default(),
            storage: Storage::Unallocated,
        }
    }

    pub fn single_value(value: Sample) -> Self {
        Image {
            result_type: value.result_type(),
            domain: Domain::identity(IVec2::ONE),
            sampler: SamplerState::default(),
            storage: Storage::Single(value),
        }
    }

    /// Software pixels over `domain`.
    ///
    /// # Panics
    ///
    /// If the pixel grid is not `domain.size`.
    pub fn from_pixels(pixels: Pixels, domain: Domain) -> Self {
        assert_eq!(pixels.size(), domain.size, "pixels do not cover their domain");
        Image {
            result_type: pixels.result_type(),
            domain,
            sampler: SamplerState::default(),
            storage: Storage::Pixels(pixels),
        }
    }

    pub fn with_sampler(mut self, sampler: SamplerState) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn set_domain(&mut self, domain: Domain) {
        self.domain = domain;
    }

    /// How readers sample this image.
    pub fn sampler(&self) -> &SamplerState {
        &self.sampler
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_single_value(&self) -> bool {
        matches!(self.storage, Storage::Single(_))
    }

    pub fn is_allocated(&self) -> bool {
        !matches!(self.storage, Storage::Unallocated)
    }

    pub fn pixels(&self) -> Option<&Pixels> {
        match &self.storage {
            Storage::Pixels(p) => Some(p),
            _ => None,
        }
    }

    pub fn gpu_texture(&self) -> Option<&GpuTexture> {
        match &self.storage {
            Storage::Gpu(t) => Some(t),
            _ => None,
        }
    }

    /// Replaces the storage and domain after the image has been computed.
    pub fn allocate(&mut self, storage: Storage, domain: Domain) {
        debug_assert!(match &storage {
            Storage::Pixels(p) => p.result_type() == self.result_type && p.size() == domain.size,
            Storage::Single(s) => s.result_type() == self.result_type,
            Storage::Gpu(t) => t.size() == domain.size,
            Storage::Unallocated => true,
        });
        self.storage = storage;
        self.domain = domain;
    }
}
