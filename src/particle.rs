use crate::error::Error;

use nalgebra as na;
use ndarray::prelude::*;

/// `[x, y, vx, vy, scale, rotation]`, `x` along frame rows and `y` along columns.
pub type ParticleState = na::Vector6<f64>;

pub const X: usize = 0;
pub const Y: usize = 1;
pub const VX: usize = 2;
pub const VY: usize = 3;
pub const SCALE: usize = 4;
pub const ROTATION: usize = 5;

/// State at rest on `center` with unit scale and no rotation.
#[inline]
pub fn seed_state(center: na::Point2<f64>) -> ParticleState {
    ParticleState::new(center.x, center.y, 0.0, 0.0, 1.0, 0.0)
}

#[derive(Debug, Clone)]
pub struct ParticleSet {
    states: Vec<ParticleState>,
    weights: Array1<f64>,
}

impl ParticleSet {
    /// `count` copies of `state` with uniform weights.
    pub fn seeded(count: usize, state: ParticleState) -> Self {
        Self {
            states: vec![state; count],
            weights: Array1::from_elem(count, 1.0 / count as f64),
        }
    }

    pub fn from_parts(states: Vec<ParticleState>, weights: Array1<f64>) -> Self {
        debug_assert_eq!(states.len(), weights.len());

        Self { states, weights }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn states(&self) -> &[ParticleState] {
        &self.states
    }

    #[inline]
    pub fn states_mut(&mut self) -> &mut [ParticleState] {
        &mut self.states
    }

    #[inline]
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn reset_weights(&mut self) {
        let n = self.len() as f64;
        self.weights.fill(1.0 / n);
    }

    /// `w <- normalize(likelihood * w)`
    pub fn reweight(&mut self, likelihood: &Array1<f64>) -> Result<(), Error> {
        let updated = likelihood * &self.weights;
        let sum = updated.sum();

        if !(sum.is_finite() && sum > 0.0) {
            return Err(Error::DegenerateWeights(sum));
        }

        self.weights = updated / sum;

        Ok(())
    }

    /// Replaces the states by `states[indices[i]]`, weights are left untouched.
    pub fn gather(&mut self, indices: &[usize]) {
        self.states = indices.iter().map(|&i| self.states[i]).collect();
    }

    pub fn restore(&mut self, snapshot: &[ParticleState]) {
        self.states.clear();
        self.states.extend_from_slice(snapshot);
    }

    /// `1 / sum(w^2)`
    #[inline]
    pub fn effective_sample_size(&self) -> f64 {
        1.0 / self.weights.dot(&self.weights)
    }

    /// Weighted mean state.
    pub fn estimate(&self) -> ParticleState {
        self.states
            .iter()
            .zip(self.weights.iter())
            .fold(ParticleState::zeros(), |acc, (s, &w)| acc + s * w)
    }
}
