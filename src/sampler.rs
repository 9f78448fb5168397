//! Affine patch extraction with edge-clamped bilinear interpolation.
//!
//! A patch of size `(h, w)` is sampled on a unit-spaced grid of offsets
//! `i - h / 2` by `j - w / 2` (integer halves), so a patch taken at an integer
//! center with unit scale and zero rotation reproduces frame pixels exactly.

use crate::particle::{ParticleState, ROTATION, SCALE, X, Y};

use nalgebra as na;
use ndarray::prelude::*;
use ndarray::Zip;

/// Maps patch offsets to frame coordinates: `center + scale * R(rotation) * offset`.
#[derive(Debug, Clone, Copy)]
pub struct Affine {
    pub center: na::Vector2<f64>,
    pub linear: na::Matrix2<f64>,
}

impl Affine {
    pub fn new(x: f64, y: f64, scale: f64, rotation: f64) -> Self {
        Self {
            center: na::Vector2::new(x, y),
            linear: na::Rotation2::new(rotation).into_inner() * scale,
        }
    }

    #[inline]
    pub fn from_state(state: &ParticleState) -> Self {
        Self::new(state[X], state[Y], state[SCALE], state[ROTATION])
    }

    #[inline(always)]
    pub fn apply(&self, dx: f64, dy: f64) -> na::Vector2<f64> {
        self.center + self.linear * na::Vector2::new(dx, dy)
    }
}

#[inline(always)]
fn grid_offset(i: usize, size: usize) -> f64 {
    i as f64 - (size / 2) as f64
}

/// Lower neighbour and blend factor along one axis, clamped to the frame.
#[inline(always)]
fn axis_blend(coord: f64, size: usize) -> (usize, usize, f64) {
    if size < 2 {
        return (0, 0, 0.0);
    }

    let base = coord.floor().clamp(0.0, (size - 2) as f64);
    let alpha = (coord - base).clamp(0.0, 1.0);
    let lo = base as usize;

    (lo, lo + 1, alpha)
}

/// Bilinear sample at fractional `(x, y)`, out-of-range coordinates clamp to the edge.
#[inline]
pub fn bilinear(src: &ArrayView2<'_, f64>, x: f64, y: f64) -> f64 {
    let (h, w) = src.dim();
    let (r0, r1, ar) = axis_blend(x, h);
    let (c0, c1, ac) = axis_blend(y, w);

    let top = (1.0 - ac) * src[[r0, c0]] + ac * src[[r0, c1]];
    let bottom = (1.0 - ac) * src[[r1, c0]] + ac * src[[r1, c1]];

    (1.0 - ar) * top + ar * bottom
}

/// Samples one `size = (h, w)` patch through `affine`.
pub fn sample(src: ArrayView2<'_, f64>, affine: &Affine, size: (usize, usize)) -> Array2<f64> {
    let (h, w) = size;

    Array2::from_shape_fn(size, |(i, j)| {
        let p = affine.apply(grid_offset(i, h), grid_offset(j, w));
        bilinear(&src, p.x, p.y)
    })
}

/// Samples one patch per particle into an `N x h x w` tensor.
pub fn sample_batch(
    src: ArrayView2<'_, f64>,
    states: &[ParticleState],
    size: (usize, usize),
) -> Array3<f64> {
    let (h, w) = size;
    let transforms: Vec<Affine> = states.iter().map(Affine::from_state).collect();
    let mut patches = Array3::zeros((states.len(), h, w));

    Zip::indexed(&mut patches).par_for_each(|(p, i, j), v| {
        let pt = transforms[p].apply(grid_offset(i, h), grid_offset(j, w));
        *v = bilinear(&src, pt.x, pt.y);
    });

    patches
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(h: usize, w: usize) -> Array2<f64> {
        Array2::from_shape_fn((h, w), |(r, c)| (r * w + c) as f64 / (h * w) as f64)
    }

    #[test]
    fn test_unit_sampling_reproduces_pixels() {
        let frame = ramp(12, 15);
        let patch = sample(frame.view(), &Affine::new(6.0, 7.0, 1.0, 0.0), (4, 5));

        let expected = frame.slice(s![4..8, 5..10]);
        for (a, b) in patch.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let frame = array![[0.0, 1.0], [2.0, 3.0]];
        assert_relative_eq!(bilinear(&frame.view(), 0.5, 0.5), 1.5, epsilon = 1e-12);
        assert_relative_eq!(bilinear(&frame.view(), 0.0, 0.25), 0.25, epsilon = 1e-12);
        assert_relative_eq!(bilinear(&frame.view(), 1.0, 1.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_bounds_clamps_to_edge() {
        let frame = ramp(5, 5);
        let view = frame.view();

        assert_relative_eq!(bilinear(&view, -3.0, -7.5), frame[[0, 0]], epsilon = 1e-12);
        assert_relative_eq!(bilinear(&view, 9.0, 2.0), frame[[4, 2]], epsilon = 1e-12);
        assert_relative_eq!(bilinear(&view, 1.0, 40.0), frame[[1, 4]], epsilon = 1e-12);
    }

    #[test]
    fn test_half_turn_flips_patch() {
        let frame = ramp(11, 11);
        let upright = sample(frame.view(), &Affine::new(5.0, 5.0, 1.0, 0.0), (3, 3));
        let flipped = sample(
            frame.view(),
            &Affine::new(5.0, 5.0, 1.0, std::f64::consts::PI),
            (3, 3),
        );

        // odd sizes are symmetric about the center, so a half turn reverses both axes
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(flipped[[i, j]], upright[[2 - i, 2 - j]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_scale_stretches_grid() {
        let frame = ramp(20, 20);
        let patch = sample(frame.view(), &Affine::new(10.0, 10.0, 2.0, 0.0), (3, 3));

        assert_relative_eq!(patch[[0, 0]], frame[[8, 8]], epsilon = 1e-12);
        assert_relative_eq!(patch[[2, 1]], frame[[12, 10]], epsilon = 1e-12);
    }

    #[test]
    fn test_batch_matches_single() {
        let frame = ramp(16, 16);
        let states = vec![
            ParticleState::new(8.0, 8.0, 0.0, 0.0, 1.0, 0.0),
            ParticleState::new(6.3, 9.7, 1.0, 1.0, 0.8, 0.4),
            ParticleState::new(-2.0, 20.0, 0.0, 0.0, 1.3, -1.1),
        ];

        let batch = sample_batch(frame.view(), &states, (5, 4));
        assert_eq!(batch.dim(), (3, 5, 4));

        for (k, state) in states.iter().enumerate() {
            let single = sample(frame.view(), &Affine::from_state(state), (5, 4));
            for (a, b) in batch.index_axis(Axis(0), k).iter().zip(single.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12);
            }
        }
    }
}
