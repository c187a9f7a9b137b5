// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Software texture implementation for CPU-based image processing.

A [Texture] is a row-major 2D array with texture-like addressing.  It backs the CPU
realization path, and is a convenient way to build image content before handing it to
the GPU.

# Coordinate Systems

- Origin (0, 0) is at the top-left
- X increases to the right
- Y increases downward

# Example

```
use batches_and_domains::bindings::software::texture::{Texture, Texel};

let mut texture = Texture::new(4, 4, 0.5f32);
texture[Texel { x: 1, y: 2 }] = 1.0;
assert_eq!(texture[Texel { x: 1, y: 2 }], 1.0);
assert_eq!(texture[Texel { x: 0, y: 0 }], 0.5);
```
*/

use crate::Strategy;
use crate::bindings::sampler::Extension;
use some_executor::hint::Hint;
use std::ops::{Index, IndexMut};

/// A software texture holding `width * height` values of `P`.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture<P> {
    data: Vec<P>,
    width: u32,
    height: u32,
}

/// Integer texture coordinates representing a specific pixel location.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Texel {
    pub x: u32,
    pub y: u32,
}

impl Texel {
    pub const ZERO: Texel = Texel { x: 0, y: 0 };

    const fn vec_offset(&self, width: u32) -> usize {
        width as usize * self.y as usize + self.x as usize
    }

    const fn from_vec_offset(width: u32, offset: usize) -> Texel {
        let y = offset / width as usize;
        let x = offset % width as usize;
        Texel {
            x: x as u32,
            y: y as u32,
        }
    }
}

/**
Values that can be filtered.

Implementors compute a weighted sum of `(weight, value)` pairs.  Weights usually sum to 1,
but filters that clip at the border pass partial sets.
*/
pub trait Sampleable: Sized + Clone {
    fn weighted(elements: &[(f32, Self)]) -> Self;
}

impl Sampleable for f32 {
    fn weighted(elements: &[(f32, Self)]) -> Self {
        let mut avg = 0.0;
        for element in elements {
            avg += element.0 * element.1
        }
        avg
    }
}

macro_rules! sampleable_vec {
    ($t:ty) => {
        impl Sampleable for $t {
            fn weighted(elements: &[(f32, Self)]) -> Self {
                let mut avg = <$t>::ZERO;
                for element in elements {
                    avg += element.0 * element.1
                }
                avg
            }
        }
    };
}
sampleable_vec!(glam::Vec2);
sampleable_vec!(glam::Vec3);
sampleable_vec!(glam::Vec4);

impl<P> Texture<P> {
    /// Creates a new texture with all pixels initialized to the same value.
    pub fn new(width: u32, height: u32, initialize_element: P) -> Self
    where
        P: Clone,
    {
        Self {
            width,
            height,
            data: vec![initialize_element; width as usize * height as usize],
        }
    }

    /// Creates a new texture with pixels initialized by a function, in row-major order.
    pub fn new_with<F: Fn(Texel) -> P>(width: u32, height: u32, initialize_with: F) -> Self {
        let mut vec = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                vec.push(initialize_with(Texel { x, y }))
            }
        }
        Self {
            width,
            height,
            data: vec,
        }
    }

    /**
    Creates a new texture with pixels initialized by a function, computed in parallel.

    ```
    use batches_and_domains::bindings::software::texture::Texture;
    use batches_and_domains::{Priority, Strategy};

    test_executors::spin_on(async {
        let texture = Texture::new_with_parallel(64, 32, Priority::UserInitiated, Strategy::One, |texel| {
            texel.x as f32 + texel.y as f32
        }).await;
        assert_eq!(texture.width(), 64);
        assert_eq!(texture.height(), 32);
    });
    ```
    */
    pub async fn new_with_parallel<F: Fn(Texel) -> P + Sync + Clone + Send + 'static>(
        width: u32,
        height: u32,
        priority: some_executor::Priority,
        strategy: Strategy,
        initialize_with: F,
    ) -> Self
    where
        P: Send + 'static,
    {
        let len = width as usize * height as usize;
        if len == 0 {
            return Self {
                width,
                height,
                data: Vec::new(),
            };
        }
        let build_vec = vec_parallel::build_vec(len, strategy, move |index| {
            let t = Texel::from_vec_offset(width, index);
            initialize_with(t)
        });
        let mut clone_box = some_executor::current_executor::current_executor();

        let f = build_vec.spawn_on(&mut clone_box, priority, Hint::CPU);

        let vec = f.await;
        Self {
            width,
            height,
            data: vec,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel data.
    #[inline]
    pub fn data(&self) -> &[P] {
        &self.data
    }

    /// Reads a possibly out-of-range texel, resolving each axis with its extension mode.
    ///
    /// Returns `None` when a clipped axis falls outside the texture.
    pub fn read_extended(&self, x: i64, y: i64, extension_x: Extension, extension_y: Extension) -> Option<&P> {
        let x = extension_x.resolve(x, self.width)?;
        let y = extension_y.resolve(y, self.height)?;
        Some(&self[Texel { x, y }])
    }

    /// Creates a new texture by applying a function to each pixel.
    pub fn map<F: Fn(&P) -> T, T>(&self, mapfn: F) -> Texture<T> {
        Texture {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(mapfn).collect(),
        }
    }
}

impl<P> Index<Texel> for Texture<P> {
    type Output = P;

    fn index(&self, index: Texel) -> &Self::Output {
        assert!(index.x < self.width && index.y < self.height);
        &self.data[index.vec_offset(self.width)]
    }
}

impl<P> IndexMut<Texel> for Texture<P> {
    fn index_mut(&mut self, index: Texel) -> &mut Self::Output {
        assert!(index.x < self.width && index.y < self.height);
        &mut self.data[index.vec_offset(self.width)]
    }
}
