// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Sample types and how each one is read from a software texture.

The set of types is closed.  [Pixels] holds one texture per type and every operation over it
is an exhaustive `match`, so adding a type is a compile error everywhere it matters.
*/

use crate::bindings::sampler::{Interpolation, SamplerState};
use crate::bindings::software::texture::{Sampleable, Texel, Texture};
use glam::{IVec2, Vec2, Vec3, Vec4};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    Float,
    Float2,
    Float3,
    Float4,
    Color,
    Int,
    Int2,
    Bool,
    /// An enumeration value chosen from a menu.
    Menu,
}

impl ResultType {
    /// Whether values can be blended by filtering.  Other types always sample nearest.
    pub const fn is_filterable(self) -> bool {
        matches!(
            self,
            ResultType::Float
                | ResultType::Float2
                | ResultType::Float3
                | ResultType::Float4
                | ResultType::Color
        )
    }

    pub const fn channel_count(self) -> u8 {
        match self {
            ResultType::Float | ResultType::Int | ResultType::Bool | ResultType::Menu => 1,
            ResultType::Float2 | ResultType::Int2 => 2,
            ResultType::Float3 => 3,
            ResultType::Float4 | ResultType::Color => 4,
        }
    }
}

/// One value of any [ResultType].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Color(Vec4),
    Int(i32),
    Int2(IVec2),
    Bool(bool),
    Menu(i32),
}

impl Sample {
    pub const fn result_type(&self) -> ResultType {
        match self {
            Sample::Float(_) => ResultType::Float,
            Sample::Float2(_) => ResultType::Float2,
            Sample::Float3(_) => ResultType::Float3,
            Sample::Float4(_) => ResultType::Float4,
            Sample::Color(_) => ResultType::Color,
            Sample::Int(_) => ResultType::Int,
            Sample::Int2(_) => ResultType::Int2,
            Sample::Bool(_) => ResultType::Bool,
            Sample::Menu(_) => ResultType::Menu,
        }
    }
}

/// A texel value type that knows how to sample itself.
pub trait PixelValue: Clone + Default + Send + Sync + 'static {
    /// Reads `texture` at normalized `coordinates`.
    fn sample(texture: &Texture<Self>, coordinates: Vec2, sampler: &SamplerState) -> Self;
}

macro_rules! filtered {
    ($($t:ty),*) => {$(
        impl PixelValue for $t {
            fn sample(texture: &Texture<Self>, coordinates: Vec2, sampler: &SamplerState) -> Self {
                sample_filtered(texture, coordinates, sampler)
            }
        }
    )*};
}

macro_rules! nearest {
    ($($t:ty),*) => {$(
        impl PixelValue for $t {
            fn sample(texture: &Texture<Self>, coordinates: Vec2, sampler: &SamplerState) -> Self {
                sample_nearest(texture, coordinates, sampler)
            }
        }
    )*};
}

filtered!(f32, Vec2, Vec3, Vec4);
nearest!(i32, IVec2, bool);

fn read_or_default<T: Clone>(texture: &Texture<T>, x: i64, y: i64, sampler: &SamplerState) -> Option<T> {
    texture
        .read_extended(x, y, sampler.extension_x, sampler.extension_y)
        .cloned()
}

pub fn sample_nearest<T: Clone + Default>(texture: &Texture<T>, coordinates: Vec2, sampler: &SamplerState) -> T {
    let size = Vec2::new(texture.width() as f32, texture.height() as f32);
    let p = (coordinates * size).floor();
    read_or_default(texture, p.x as i64, p.y as i64, sampler).unwrap_or_default()
}

fn cubic_bspline_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (1.0 - t) * (1.0 - t) * (1.0 - t) / 6.0,
        (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
        t3 / 6.0,
    ]
}

/// Samples with the sampler's interpolation.  Clipped neighbors contribute zero.
pub fn sample_filtered<T: Sampleable + Default>(texture: &Texture<T>, coordinates: Vec2, sampler: &SamplerState) -> T {
    match sampler.interpolation {
        Interpolation::Nearest => sample_nearest(texture, coordinates, sampler),
        Interpolation::Bilinear | Interpolation::Anisotropic => {
            let size = Vec2::new(texture.width() as f32, texture.height() as f32);
            let p = coordinates * size - 0.5;
            let base = p.floor();
            let f = p - base;
            let (x, y) = (base.x as i64, base.y as i64);
            let mut elements = Vec::with_capacity(4);
            for (dx, wx) in [(0, 1.0 - f.x), (1, f.x)] {
                for (dy, wy) in [(0, 1.0 - f.y), (1, f.y)] {
                    if let Some(v) = read_or_default(texture, x + dx, y + dy, sampler) {
                        elements.push((wx * wy, v));
                    }
                }
            }
            T::weighted(&elements)
        }
        Interpolation::Bicubic => {
            let size = Vec2::new(texture.width() as f32, texture.height() as f32);
            let p = coordinates * size - 0.5;
            let base = p.floor();
            let f = p - base;
            let (x, y) = (base.x as i64, base.y as i64);
            let wx = cubic_bspline_weights(f.x);
            let wy = cubic_bspline_weights(f.y);
            let mut elements = Vec::with_capacity(16);
            for (j, wy) in wy.iter().enumerate() {
                for (i, wx) in wx.iter().enumerate() {
                    if let Some(v) = read_or_default(texture, x + i as i64 - 1, y + j as i64 - 1, sampler) {
                        elements.push((wx * wy, v));
                    }
                }
            }
            T::weighted(&elements)
        }
    }
}

/// A software image of one [ResultType].
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    Float(Arc<Texture<f32>>),
    Float2(Arc<Texture<Vec2>>),
    Float3(Arc<Texture<Vec3>>),
    Float4(Arc<Texture<Vec4>>),
    Color(Arc<Texture<Vec4>>),
    Int(Arc<Texture<i32>>),
    Int2(Arc<Texture<IVec2>>),
    Bool(Arc<Texture<bool>>),
    Menu(Arc<Texture<i32>>),
}

impl Pixels {
    pub fn result_type(&self) -> ResultType {
        match self {
            Pixels::Float(_) => ResultType::Float,
            Pixels::Float2(_) => ResultType::Float2,
            Pixels::Float3(_) => ResultType::Float3,
            Pixels::Float4(_) => ResultType::Float4,
            Pixels::Color(_) => ResultType::Color,
            Pixels::Int(_) => ResultType::Int,
            Pixels::Int2(_) => ResultType::Int2,
            Pixels::Bool(_) => ResultType::Bool,
            Pixels::Menu(_) => ResultType::Menu,
        }
    }

    /// Width and height in texels.
    pub fn size(&self) -> IVec2 {
        let (w, h) = match self {
            Pixels::Float(t) => (t.width(), t.height()),
            Pixels::Float2(t) => (t.width(), t.height()),
            Pixels::Float3(t) => (t.width(), t.height()),
            Pixels::Float4(t) | Pixels::Color(t) => (t.width(), t.height()),
            Pixels::Int(t) | Pixels::Menu(t) => (t.width(), t.height()),
            Pixels::Int2(t) => (t.width(), t.height()),
            Pixels::Bool(t) => (t.width(), t.height()),
        };
        IVec2::new(w as i32, h as i32)
    }

    pub fn get(&self, texel: Texel) -> Sample {
        match self {
            Pixels::Float(t) => Sample::Float(t[texel]),
            Pixels::Float2(t) => Sample::Float2(t[texel]),
            Pixels::Float3(t) => Sample::Float3(t[texel]),
            Pixels::Float4(t) => Sample::Float4(t[texel]),
            Pixels::Color(t) => Sample::Color(t[texel]),
            Pixels::Int(t) => Sample::Int(t[texel]),
            Pixels::Int2(t) => Sample::Int2(t[texel]),
            Pixels::Bool(t) => Sample::Bool(t[texel]),
            Pixels::Menu(t) => Sample::Menu(t[texel]),
        }
    }

    /// Reads at normalized coordinates with `sampler`, forced to nearest for non-filterable types.
    pub fn sample(&self, coordinates: Vec2, sampler: &SamplerState) -> Sample {
        match self {
            Pixels::Float(t) => Sample::Float(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Float2(t) => Sample::Float2(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Float3(t) => Sample::Float3(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Float4(t) => Sample::Float4(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Color(t) => Sample::Color(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Int(t) => Sample::Int(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Int2(t) => Sample::Int2(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Bool(t) => Sample::Bool(PixelValue::sample(t, coordinates, sampler)),
            Pixels::Menu(t) => Sample::Menu(PixelValue::sample(t, coordinates, sampler)),
        }
    }

    /// A texture of `size` filled with the default value of `result_type`.
    pub fn new_default(result_type: ResultType, width: u32, height: u32) -> Self {
        match result_type {
            ResultType::Float => Pixels::Float(Arc::new(Texture::new(width, height, 0.0))),
            ResultType::Float2 => Pixels::Float2(Arc::new(Texture::new(width, height, Vec2::ZERO))),
            ResultType::Float3 => Pixels::Float3(Arc::new(Texture::new(width, height, Vec3::ZERO))),
            ResultType::Float4 => Pixels::Float4(Arc::new(Texture::new(width, height, Vec4::ZERO))),
            ResultType::Color => Pixels::Color(Arc::new(Texture::new(width, height, Vec4::ZERO))),
            ResultType::Int => Pixels::Int(Arc::new(Texture::new(width, height, 0))),
            ResultType::Int2 => Pixels::Int2(Arc::new(Texture::new(width, height, IVec2::ZERO))),
            ResultType::Bool => Pixels::Bool(Arc::new(Texture::new(width, height, false))),
            ResultType::Menu => Pixels::Menu(Arc::new(Texture::new(width, height, 0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::sampler::Extension;

    fn ramp() -> Texture<f32> {
        Texture::new_with(4, 1, |t| t.x as f32)
    }

    fn state(interpolation: Interpolation, extension: Extension) -> SamplerState {
        SamplerState::new(interpolation, extension, extension)
    }

    #[test]
    fn nearest_reads_the_containing_texel() {
        let texture = ramp();
        let s = state(Interpolation::Nearest, Extension::Clip);
        assert_eq!(sample_nearest(&texture, Vec2::new(0.3, 0.5), &s), 1.0);
        assert_eq!(sample_nearest(&texture, Vec2::new(1.2, 0.5), &s), 0.0);
        let s = state(Interpolation::Nearest, Extension::Extend);
        assert_eq!(sample_nearest(&texture, Vec2::new(1.2, 0.5), &s), 3.0);
    }

    #[test]
    fn bilinear_interpolates_between_centers() {
        let texture = ramp();
        let s = state(Interpolation::Bilinear, Extension::Extend);
        //halfway between texel 1 and 2 centers
        let v = sample_filtered(&texture, Vec2::new(0.5, 0.5), &s);
        assert!((v - 1.5).abs() < 1e-6);
        let s = state(Interpolation::Bilinear, Extension::Clip);
        //the left half of texel 0 blends with clipped zero outside
        let v = sample_filtered(&texture, Vec2::new(0.0, 0.5), &s);
        assert!(v.abs() < 1e-6);
    }

    #[test]
    fn bicubic_preserves_constants() {
        let texture = Texture::new(5, 5, 2.0f32);
        let s = state(Interpolation::Bicubic, Extension::Extend);
        let v = sample_filtered(&texture, Vec2::new(0.37, 0.61), &s);
        assert!((v - 2.0).abs() < 1e-5);
        let weights = cubic_bspline_weights(0.3);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn integer_pixels_never_blend() {
        let pixels = Pixels::Int(Arc::new(Texture::new_with(2, 1, |t| t.x as i32 * 10)));
        let s = state(Interpolation::Bilinear, Extension::Extend);
        assert_eq!(pixels.sample(Vec2::new(0.7, 0.5), &s), Sample::Int(10));
        assert_eq!(pixels.result_type(), ResultType::Int);
        assert_eq!(pixels.size(), IVec2::new(2, 1));
    }

    #[test]
    fn filterable_types() {
        assert!(ResultType::Color.is_filterable());
        assert!(!ResultType::Menu.is_filterable());
        assert_eq!(Sample::Int2(IVec2::ONE).result_type(), ResultType::Int2);
    }
}
