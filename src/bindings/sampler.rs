// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Sampler state: how an image is read between and beyond its texels. */

/// Filter used when reading between texel centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    /// Cubic B-spline over a 4x4 neighborhood.
    Bicubic,
    /// Anisotropic filtering on the GPU.  Software sampling treats it as bilinear.
    Anisotropic,
}

/// Behavior for coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Extension {
    /// Reads zero.
    #[default]
    Clip,
    /// Repeats the edge texel.
    Extend,
    /// Tiles the image.
    Repeat,
    /// Tiles the image, flipping every other tile.
    Mirror,
}

impl Extension {
    /// Maps texel coordinate `i` onto `0..len`, or `None` when it reads outside a clipped image.
    pub fn resolve(self, i: i64, len: u32) -> Option<u32> {
        let n = len as i64;
        if n == 0 {
            return None;
        }
        match self {
            Extension::Clip => (0..n).contains(&i).then_some(i as u32),
            Extension::Extend => Some(i.clamp(0, n - 1) as u32),
            Extension::Repeat => Some(i.rem_euclid(n) as u32),
            Extension::Mirror => {
                let period = 2 * n;
                let m = i.rem_euclid(period);
                Some(if m < n { m } else { period - 1 - m } as u32)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState {
    pub interpolation: Interpolation,
    pub extension_x: Extension,
    pub extension_y: Extension,
}

impl SamplerState {
    pub const fn new(interpolation: Interpolation, extension_x: Extension, extension_y: Extension) -> Self {
        Self {
            interpolation,
            extension_x,
            extension_y,
        }
    }

    /// The same state, with interpolation forced to nearest unless `filterable`.
    pub const fn filtered_for(self, filterable: bool) -> Self {
        if filterable {
            self
        } else {
            Self {
                interpolation: Interpolation::Nearest,
                ..self
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_modes() {
        assert_eq!(Extension::Clip.resolve(-1, 4), None);
        assert_eq!(Extension::Clip.resolve(3, 4), Some(3));
        assert_eq!(Extension::Clip.resolve(4, 4), None);
        assert_eq!(Extension::Extend.resolve(-3, 4), Some(0));
        assert_eq!(Extension::Extend.resolve(9, 4), Some(3));
        assert_eq!(Extension::Repeat.resolve(-1, 4), Some(3));
        assert_eq!(Extension::Repeat.resolve(5, 4), Some(1));
        assert_eq!(Extension::Mirror.resolve(4, 4), Some(3));
        assert_eq!(Extension::Mirror.resolve(-1, 4), Some(0));
        assert_eq!(Extension::Mirror.resolve(8, 4), Some(0));
    }

    #[test]
    fn non_filterable_is_nearest() {
        let state = SamplerState::new(Interpolation::Bicubic, Extension::Repeat, Extension::Clip);
        assert_eq!(state.filtered_for(true), state);
        let nearest = state.filtered_for(false);
        assert_eq!(nearest.interpolation, Interpolation::Nearest);
        assert_eq!(nearest.extension_x, Extension::Repeat);
    }
}
