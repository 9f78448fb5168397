use crate::config::ProcessNoise;
use crate::particle::{ParticleState, SCALE, VX, VY, X, Y};

use nalgebra as na;
use rand::Rng;
use rand_distr::StandardNormal;

/// Smallest scale a prediction may produce.
pub const MIN_SCALE: f64 = 1e-3;

/// Constant velocity on position, random walk on velocity, scale and rotation.
#[derive(Debug, Clone)]
pub struct MotionModel {
    pub transition: na::Matrix6<f64>,
    pub noise: ProcessNoise,
}

impl MotionModel {
    pub fn new(noise: ProcessNoise) -> Self {
        let mut transition = na::Matrix6::identity();
        transition[(X, VX)] = 1.0;
        transition[(Y, VY)] = 1.0;

        Self { transition, noise }
    }

    #[inline]
    pub fn predict_one<R: Rng>(&self, state: &ParticleState, rng: &mut R) -> ParticleState {
        let noise = ParticleState::from_fn(|i, _| {
            let std = self.noise.std[i];
            if std > 0.0 {
                std * rng.sample::<f64, _>(StandardNormal)
            } else {
                0.0
            }
        });

        let mut next = self.transition * state + noise;
        next[SCALE] = next[SCALE].max(MIN_SCALE);

        next
    }

    pub fn predict<R: Rng>(&self, states: &mut [ParticleState], rng: &mut R) {
        for state in states.iter_mut() {
            *state = self.predict_one(state, rng);
        }
    }
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::new(ProcessNoise::default())
    }
}
