// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Resolution of vertex attributes to shader input locations.

An [AttributeBindingTable] is built for one (vertex format, shader interface) pair.  Each
attribute slot records the location of the first of its names that the interface declares.
Locations are 4-bit values held in a single `u64`, with a `u16` mask of resolved slots.
*/

use crate::bindings::vertex_format::{MAX_VERTEX_ATTRIBUTES, VertexFormat};
use crate::bittricks::{nibble_get, nibble_set};
use crate::images::shader_interface::ShaderInterface;

/// What to do with an attribute no shader input answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeResolution {
    /// Fail the resolution with [BindingError::Unresolved].
    Strict,
    /// Leave the attribute unbound.
    Permissive,
}

impl Default for AttributeResolution {
    fn default() -> Self {
        if cfg!(feature = "strict_attributes") {
            AttributeResolution::Strict
        } else {
            AttributeResolution::Permissive
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("vertex attribute {attribute:?} has no input in shader interface {interface:?}")]
    Unresolved { attribute: String, interface: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeBindingTable {
    locations: u64,
    enabled: u16,
}

impl AttributeBindingTable {
    pub const fn new() -> Self {
        AttributeBindingTable {
            locations: 0,
            enabled: 0,
        }
    }

    fn set(&mut self, slot: usize, location: u8) {
        debug_assert!(!self.is_enabled(slot), "slot {slot} bound twice");
        debug_assert!(location < 16, "location {location} does not fit");
        self.locations = nibble_set(self.locations, slot, location);
        self.enabled |= 1 << slot;
    }

    pub fn resolve(
        format: &VertexFormat,
        interface: &ShaderInterface,
        resolution: AttributeResolution,
    ) -> Result<Self, BindingError> {
        let mut table = AttributeBindingTable::new();
        for (slot, attribute) in format.attributes().iter().enumerate() {
            debug_assert!(slot < MAX_VERTEX_ATTRIBUTES);
            match attribute.names().find_map(|n| interface.find_input(n)) {
                Some(location) => table.set(slot, location),
                None if resolution == AttributeResolution::Strict => {
                    return Err(BindingError::Unresolved {
                        attribute: attribute.name().to_string(),
                        interface: interface.name().to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(table)
    }

    pub const fn is_enabled(&self, slot: usize) -> bool {
        self.enabled & (1 << slot) != 0
    }

    pub const fn enabled_mask(&self) -> u16 {
        self.enabled
    }

    /// Resolved location of `slot`, if any.
    pub const fn get(&self, slot: usize) -> Option<u8> {
        if self.is_enabled(slot) {
            Some(nibble_get(self.locations, slot))
        } else {
            None
        }
    }

    /// Resolved location of an enabled `slot`.
    pub fn location_of(&self, slot: usize) -> u8 {
        assert!(self.is_enabled(slot), "slot {slot} is not bound");
        nibble_get(self.locations, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::vertex_format::{ComponentType, FetchMode};

    fn format() -> VertexFormat {
        let mut format = VertexFormat::new();
        format
            .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
            .unwrap();
        format.add_alias("P").unwrap();
        format
            .add_attribute("weight", ComponentType::F32, 1, FetchMode::Float)
            .unwrap();
        format
            .add_attribute("color", ComponentType::U8, 4, FetchMode::IntToFloatUnit)
            .unwrap();
        format.pack();
        format
    }

    #[test]
    fn aliases_resolve_and_missing_slots_stay_unbound() {
        let interface = ShaderInterface::builder("flat")
            .input("P", 7)
            .input("color", 15)
            .build();
        let table =
            AttributeBindingTable::resolve(&format(), &interface, AttributeResolution::Permissive)
                .unwrap();
        assert_eq!(table.get(0), Some(7));
        assert_eq!(table.get(1), None);
        assert_eq!(table.location_of(2), 15);
        assert_eq!(table.enabled_mask(), 0b101);
    }

    #[test]
    fn first_alias_found_wins() {
        let interface = ShaderInterface::builder("both")
            .input("pos", 2)
            .input("P", 3)
            .build();
        let table =
            AttributeBindingTable::resolve(&format(), &interface, AttributeResolution::Permissive)
                .unwrap();
        assert_eq!(table.get(0), Some(2));
    }

    #[test]
    fn strict_reports_missing_attribute() {
        let interface = ShaderInterface::builder("flat")
            .input("pos", 0)
            .input("color", 1)
            .build();
        let err = AttributeBindingTable::resolve(&format(), &interface, AttributeResolution::Strict)
            .unwrap_err();
        assert_eq!(
            err,
            BindingError::Unresolved {
                attribute: "weight".to_string(),
                interface: "flat".to_string()
            }
        );
    }

    #[test]
    #[should_panic]
    fn location_of_unbound_slot() {
        AttributeBindingTable::new().location_of(0);
    }
}
