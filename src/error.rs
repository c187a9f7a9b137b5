// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The crate-level error.

use crate::bindings::attribute_binding::BindingError;
use crate::bindings::vertex_format::FormatError;
use crate::realize::operation::RealizeError;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Realize(#[from] RealizeError),
}
