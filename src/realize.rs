// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Image realization: placing transformed image signals onto pixel grids.

* [domain] is the grid plus its placement in the virtual plane.
* [sample] is the closed set of value types and their sampling.
* [result] is the image handed between operations.
* [operation] decides whether an input needs resampling, and does it.
*/

pub mod domain;
pub mod operation;
pub mod result;
pub mod sample;
