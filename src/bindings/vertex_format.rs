// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex record descriptions and their packing.
//!
//! A [VertexFormat] is built attribute by attribute, in the order the caller wants the
//! attributes indexed, and then packed once.  Packing assigns every attribute a byte
//! offset and fixes the record stride, so callers never compute layout by hand.
//!
//! # Example
//!
//! ```
//! use batches_and_domains::bindings::vertex_format::{VertexFormat, ComponentType, FetchMode};
//!
//! let mut format = VertexFormat::new();
//! format.add_attribute("pos", ComponentType::F32, 3, FetchMode::Float).unwrap();
//! format.add_attribute("color", ComponentType::U8, 4, FetchMode::IntToFloatUnit).unwrap();
//! format.pack();
//!
//! assert_eq!(format.attribute(0).offset(), 0);
//! assert_eq!(format.attribute(1).offset(), 12);
//! assert_eq!(format.stride(), 16);
//! ```
//!
//! # Packing rules
//!
//! Attributes keep their insertion order.  Each attribute after the first is placed at the
//! running offset, padded forward to that attribute's alignment:
//!
//! * the component byte size, for most attributes;
//! * 4x the component size for 3-component attributes with 1 or 2 byte components, since
//!   some GPUs cannot fetch those unaligned;
//! * 4 for the packed 10-10-10-2 type.
//!
//! The total is then padded up to the alignment of the *first* attribute, and that becomes
//! the stride.

use arrayvec::ArrayVec;

pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_ATTRIBUTE_NAMES: usize = 6;

/// Storage type of one attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    /// Three 10-bit and one 2-bit signed components packed into 4 bytes.
    I10,
}

impl ComponentType {
    /// Bytes per component.  The packed type reports the size of the whole word.
    pub const fn size(self) -> u8 {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::I32 | ComponentType::U32 | ComponentType::F32 => 4,
            ComponentType::I10 => 4,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ComponentType::F32)
    }
}

/// How raw bytes become the value the shader sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Floats, as-is.
    Float,
    /// Raw integers.
    Int,
    /// Integers normalized to `[0, 1]` (unsigned) or `[-1, 1]` (signed).
    IntToFloatUnit,
    /// Integers widened to float.
    IntToFloat,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatError {
    #[error("component count {0} is not one of 1, 2, 3, 4, 8, 12, 16")]
    ComponentCount(u8),
    #[error("component counts of 8, 12 and 16 are reserved for f32 attributes")]
    WideNonFloat,
    #[error("the 10-10-10-2 type needs 3 or 4 components, got {0}")]
    PackedComponentCount(u8),
    #[error("fetch mode {fetch_mode:?} cannot read {component_type:?} components")]
    FetchMismatch {
        component_type: ComponentType,
        fetch_mode: FetchMode,
    },
    #[error("format is packed and can no longer gain attributes or aliases")]
    AlreadyPacked,
    #[error("format already holds 16 attributes")]
    TooManyAttributes,
    #[error("attribute already has 6 names")]
    TooManyNames,
    #[error("attribute names must not be empty")]
    EmptyName,
    #[error("there is no attribute to alias yet")]
    NoAttributes,
    #[error("no attribute at index {0}")]
    NoSuchAttribute(usize),
    #[error("multiload count {0} must be between 2 and 4")]
    LoadCount(u8),
}

/// One attribute of a vertex record.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    component_type: ComponentType,
    component_count: u8,
    fetch_mode: FetchMode,
    size: u8,
    offset: u32,
    names: ArrayVec<String, MAX_ATTRIBUTE_NAMES>,
}

impl VertexAttribute {
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }
    pub fn component_count(&self) -> u8 {
        self.component_count
    }
    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }
    /// Byte size of the whole attribute.
    pub fn size(&self) -> u8 {
        self.size
    }
    /// Byte offset inside an interleaved record.  Zero for every attribute until packed.
    pub fn offset(&self) -> u32 {
        self.offset
    }
    /// The primary name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }
    /// The primary name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Alignment this attribute requires inside a record.
    pub fn alignment(&self) -> u32 {
        if self.component_type == ComponentType::I10 {
            return 4;
        }
        let c = self.component_type.size() as u32;
        if self.component_count == 3 && c <= 2 {
            4 * c
        } else {
            c
        }
    }

    /// Number of 4-component shader locations this attribute occupies.
    pub fn location_span(&self) -> u8 {
        match self.component_count {
            8 | 12 | 16 => self.component_count / 4,
            _ => 1,
        }
    }
}

/// Where an attribute lives inside a buffer of a given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    pub offset: usize,
    pub stride: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexFormat {
    attributes: ArrayVec<VertexAttribute, MAX_VERTEX_ATTRIBUTES>,
    stride: u32,
    packed: bool,
    deinterleaved: bool,
}

const fn padding(offset: u32, alignment: u32) -> u32 {
    let rem = offset % alignment;
    if rem == 0 { 0 } else { alignment - rem }
}

fn validate_name(name: &str) -> Result<(), FormatError> {
    if name.is_empty() {
        Err(FormatError::EmptyName)
    } else {
        Ok(())
    }
}

impl VertexFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /**
    Appends an attribute and returns its index.

    The attribute's offset stays 0 until [Self::pack].
    */
    pub fn add_attribute(
        &mut self,
        name: &str,
        component_type: ComponentType,
        component_count: u8,
        fetch_mode: FetchMode,
    ) -> Result<usize, FormatError> {
        if self.packed {
            return Err(FormatError::AlreadyPacked);
        }
        validate_name(name)?;
        if !matches!(component_count, 1 | 2 | 3 | 4 | 8 | 12 | 16) {
            return Err(FormatError::ComponentCount(component_count));
        }
        if component_count > 4 && component_type != ComponentType::F32 {
            return Err(FormatError::WideNonFloat);
        }
        match component_type {
            ComponentType::F32 => {
                if fetch_mode != FetchMode::Float {
                    return Err(FormatError::FetchMismatch {
                        component_type,
                        fetch_mode,
                    });
                }
            }
            ComponentType::I10 => {
                if fetch_mode != FetchMode::IntToFloatUnit {
                    return Err(FormatError::FetchMismatch {
                        component_type,
                        fetch_mode,
                    });
                }
                if !matches!(component_count, 3 | 4) {
                    return Err(FormatError::PackedComponentCount(component_count));
                }
            }
            _ => {
                if fetch_mode == FetchMode::Float {
                    return Err(FormatError::FetchMismatch {
                        component_type,
                        fetch_mode,
                    });
                }
            }
        }
        if self.attributes.is_full() {
            return Err(FormatError::TooManyAttributes);
        }
        let size = if component_type == ComponentType::I10 {
            4
        } else {
            component_type.size() * component_count
        };
        let mut names = ArrayVec::new();
        names.push(name.to_string());
        self.attributes.push(VertexAttribute {
            component_type,
            component_count,
            fetch_mode,
            size,
            offset: 0,
            names,
        });
        Ok(self.attributes.len() - 1)
    }

    /// Adds another lookup name to the most recently added attribute.
    pub fn add_alias(&mut self, name: &str) -> Result<(), FormatError> {
        if self.packed {
            return Err(FormatError::AlreadyPacked);
        }
        validate_name(name)?;
        let attribute = self.attributes.last_mut().ok_or(FormatError::NoAttributes)?;
        attribute
            .names
            .try_push(name.to_string())
            .map_err(|_| FormatError::TooManyNames)
    }

    /**
    Assigns offsets and the stride, then freezes the format.

    Packing an already packed format does nothing.
    */
    pub fn pack(&mut self) {
        if self.packed {
            return;
        }
        let Some(first) = self.attributes.first_mut() else {
            self.packed = true;
            return;
        };
        first.offset = 0;
        let first_alignment = first.alignment();
        let mut offset = first.size as u32;
        for attribute in self.attributes.iter_mut().skip(1) {
            offset += padding(offset, attribute.alignment());
            attribute.offset = offset;
            offset += attribute.size as u32;
        }
        self.stride = offset + padding(offset, first_alignment);
        self.packed = true;
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Byte size of one interleaved record.  Only meaningful once packed.
    pub fn stride(&self) -> u32 {
        debug_assert!(self.packed, "stride of an unpacked format");
        self.stride
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attribute(&self, index: usize) -> &VertexAttribute {
        &self.attributes[index]
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Finds the attribute answering to `name` under any of its names.
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.names.iter().any(|n| n == name))
    }

    /// Replaces the primary name of an attribute.  Allowed on packed formats.
    pub fn rename_attribute(&mut self, index: usize, name: &str) -> Result<(), FormatError> {
        validate_name(name)?;
        let attribute = self
            .attributes
            .get_mut(index)
            .ok_or(FormatError::NoSuchAttribute(index))?;
        attribute.names[0] = name.to_string();
        Ok(())
    }

    /**
    Stores each attribute in its own contiguous run instead of interleaving records.

    Offsets and stride keep their interleaved values; the deinterleaved layout is derived
    per buffer length by [Self::attribute_layout].
    */
    pub fn deinterleave(&mut self) {
        self.deinterleaved = true;
    }

    pub fn is_deinterleaved(&self) -> bool {
        self.deinterleaved
    }

    /**
    Lets a shader read `load_count` consecutive vertices from one vertex invocation.

    For every attribute `name`, appends copies named `name1 .. name{load_count-1}` whose
    offset is shifted by one stride per copy.  Packs the format first if needed.
    */
    pub fn enable_multiload(&mut self, load_count: u8) -> Result<(), FormatError> {
        if !(2..=4).contains(&load_count) {
            return Err(FormatError::LoadCount(load_count));
        }
        self.pack();
        let original = self.attributes.len();
        if original * load_count as usize > MAX_VERTEX_ATTRIBUTES {
            return Err(FormatError::TooManyAttributes);
        }
        for index in 0..original {
            for load in 1..load_count as u32 {
                let source = &self.attributes[index];
                let mut names = ArrayVec::new();
                names.push(format!("{}{}", source.name(), load));
                let copy = VertexAttribute {
                    names,
                    offset: source.offset + self.stride * load,
                    ..source.clone()
                };
                self.attributes.push(copy);
            }
        }
        Ok(())
    }

    /// Offset and stride of attribute `index` in a buffer holding `vertex_len` vertices.
    pub fn attribute_layout(&self, index: usize, vertex_len: usize) -> AttributeLayout {
        debug_assert!(self.packed, "layout of an unpacked format");
        if self.deinterleaved {
            let offset = self.attributes[..index]
                .iter()
                .map(|a| a.size as usize * vertex_len)
                .sum();
            AttributeLayout {
                offset,
                stride: self.attributes[index].size as u32,
            }
        } else {
            AttributeLayout {
                offset: self.attributes[index].offset as usize,
                stride: self.stride,
            }
        }
    }

    /// Bytes needed to hold `vertex_len` vertices.
    pub fn buffer_size(&self, vertex_len: usize) -> usize {
        debug_assert!(self.packed, "buffer size of an unpacked format");
        self.stride as usize * vertex_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_color() -> VertexFormat {
        let mut format = VertexFormat::new();
        format
            .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
            .unwrap();
        format
            .add_attribute("color", ComponentType::U8, 4, FetchMode::IntToFloatUnit)
            .unwrap();
        format.pack();
        format
    }

    #[test]
    fn position_and_color() {
        let format = pos_color();
        assert_eq!(format.attribute(0).offset(), 0);
        assert_eq!(format.attribute(1).offset(), 12);
        assert_eq!(format.stride(), 16);
    }

    #[test]
    fn unpacked_offsets_are_zero() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("a", ComponentType::U8, 1, FetchMode::Int)
            .unwrap();
        format
            .add_attribute("b", ComponentType::F32, 2, FetchMode::Float)
            .unwrap();
        assert!(format.attributes().iter().all(|a| a.offset() == 0));
        assert!(!format.is_packed());
    }

    #[test]
    fn three_short_components_align_to_four_components() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("flag", ComponentType::U8, 1, FetchMode::Int)
            .unwrap();
        format
            .add_attribute("normal", ComponentType::I16, 3, FetchMode::IntToFloatUnit)
            .unwrap();
        format.pack();
        assert_eq!(format.attribute(1).alignment(), 8);
        assert_eq!(format.attribute(1).offset(), 8);
        //tail pad follows the first attribute, which is byte aligned
        assert_eq!(format.stride(), 14);
    }

    #[test]
    fn packed_ten_bit_is_word_aligned() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("flag", ComponentType::U8, 1, FetchMode::Int)
            .unwrap();
        format
            .add_attribute("nor", ComponentType::I10, 4, FetchMode::IntToFloatUnit)
            .unwrap();
        format.pack();
        assert_eq!(format.attribute(1).offset(), 4);
        assert_eq!(format.attribute(1).size(), 4);
        assert_eq!(format.stride(), 8);
    }

    #[test]
    fn tail_padding_follows_first_attribute() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
            .unwrap();
        format
            .add_attribute("selected", ComponentType::U8, 1, FetchMode::Int)
            .unwrap();
        format.pack();
        assert_eq!(format.attribute(1).offset(), 12);
        assert_eq!(format.stride(), 16);
    }

    const CANDIDATES: [(ComponentType, u8, FetchMode); 9] = [
        (ComponentType::F32, 1, FetchMode::Float),
        (ComponentType::F32, 3, FetchMode::Float),
        (ComponentType::F32, 16, FetchMode::Float),
        (ComponentType::U8, 1, FetchMode::Int),
        (ComponentType::U8, 3, FetchMode::IntToFloatUnit),
        (ComponentType::I16, 2, FetchMode::IntToFloat),
        (ComponentType::U16, 3, FetchMode::Int),
        (ComponentType::I10, 3, FetchMode::IntToFloatUnit),
        (ComponentType::I32, 4, FetchMode::Int),
    ];

    #[test]
    fn alignment_and_stride_hold_for_every_triple() {
        for a in CANDIDATES {
            for b in CANDIDATES {
                for c in CANDIDATES {
                    let mut format = VertexFormat::new();
                    for (i, (t, n, f)) in [a, b, c].into_iter().enumerate() {
                        format.add_attribute(&format!("a{i}"), t, n, f).unwrap();
                    }
                    let mut again = format.clone();
                    format.pack();
                    again.pack();
                    assert_eq!(format, again);

                    let sizes: u32 = format.attributes().iter().map(|a| a.size() as u32).sum();
                    assert!(format.stride() >= sizes);
                    assert_eq!(format.stride() % format.attribute(0).alignment(), 0);
                    for attribute in format.attributes() {
                        assert_eq!(attribute.offset() % attribute.alignment(), 0);
                    }
                    for pair in format.attributes().windows(2) {
                        assert!(pair[1].offset() >= pair[0].offset() + pair[0].size() as u32);
                    }
                }
            }
        }
    }

    #[test]
    fn invalid_attributes_are_rejected() {
        let mut format = VertexFormat::new();
        assert_eq!(
            format.add_attribute("a", ComponentType::F32, 5, FetchMode::Float),
            Err(FormatError::ComponentCount(5))
        );
        assert_eq!(
            format.add_attribute("a", ComponentType::U8, 8, FetchMode::Int),
            Err(FormatError::WideNonFloat)
        );
        assert!(matches!(
            format.add_attribute("a", ComponentType::F32, 2, FetchMode::Int),
            Err(FormatError::FetchMismatch { .. })
        ));
        assert!(matches!(
            format.add_attribute("a", ComponentType::I10, 4, FetchMode::Int),
            Err(FormatError::FetchMismatch { .. })
        ));
        assert_eq!(
            format.add_attribute("a", ComponentType::I10, 2, FetchMode::IntToFloatUnit),
            Err(FormatError::PackedComponentCount(2))
        );
        assert!(matches!(
            format.add_attribute("a", ComponentType::U16, 2, FetchMode::Float),
            Err(FormatError::FetchMismatch { .. })
        ));
        assert_eq!(format.add_alias("b"), Err(FormatError::NoAttributes));
        assert!(format.is_empty());
    }

    #[test]
    fn packed_formats_are_frozen() {
        let mut format = pos_color();
        assert_eq!(
            format.add_attribute("uv", ComponentType::F32, 2, FetchMode::Float),
            Err(FormatError::AlreadyPacked)
        );
        assert_eq!(format.add_alias("P"), Err(FormatError::AlreadyPacked));
        format.rename_attribute(1, "col").unwrap();
        assert_eq!(format.attribute(1).name(), "col");
        assert_eq!(
            format.rename_attribute(9, "x"),
            Err(FormatError::NoSuchAttribute(9))
        );
    }

    #[test]
    fn aliases_are_limited_and_searchable() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
            .unwrap();
        for i in 1..MAX_ATTRIBUTE_NAMES {
            format.add_alias(&format!("alias{i}")).unwrap();
        }
        assert_eq!(format.add_alias("one_too_many"), Err(FormatError::TooManyNames));
        assert_eq!(format.attribute_index("alias3"), Some(0));
        assert_eq!(format.attribute_index("missing"), None);
        assert_eq!(format.attribute(0).names().count(), MAX_ATTRIBUTE_NAMES);
    }

    #[test]
    fn attribute_limit() {
        let mut format = VertexFormat::new();
        for i in 0..MAX_VERTEX_ATTRIBUTES {
            format
                .add_attribute(&format!("a{i}"), ComponentType::F32, 1, FetchMode::Float)
                .unwrap();
        }
        assert_eq!(
            format.add_attribute("extra", ComponentType::F32, 1, FetchMode::Float),
            Err(FormatError::TooManyAttributes)
        );
    }

    #[test]
    fn multiload_appends_shifted_copies() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
            .unwrap();
        format.enable_multiload(3).unwrap();
        assert!(format.is_packed());
        assert_eq!(format.stride(), 12);
        let names: Vec<&str> = format.attributes().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["pos", "pos1", "pos2"]);
        let offsets: Vec<u32> = format.attributes().iter().map(|a| a.offset()).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(format.enable_multiload(5), Err(FormatError::LoadCount(5)));
    }

    #[test]
    fn deinterleaved_layout() {
        let mut format = pos_color();
        format.deinterleave();
        assert_eq!(
            format.attribute_layout(0, 10),
            AttributeLayout {
                offset: 0,
                stride: 12
            }
        );
        assert_eq!(
            format.attribute_layout(1, 10),
            AttributeLayout {
                offset: 120,
                stride: 4
            }
        );
        //buffer sizing is unchanged by deinterleaving
        assert_eq!(format.buffer_size(10), 160);
    }

    #[test]
    fn matrix_attributes_span_locations() {
        let mut format = VertexFormat::new();
        format
            .add_attribute("model", ComponentType::F32, 16, FetchMode::Float)
            .unwrap();
        format
            .add_attribute("pos", ComponentType::F32, 3, FetchMode::Float)
            .unwrap();
        format.pack();
        assert_eq!(format.attribute(0).location_span(), 4);
        assert_eq!(format.attribute(1).location_span(), 1);
        assert_eq!(format.attribute(1).offset(), 64);
        assert_eq!(format.stride(), 76);
    }
}
