use crate::config::{FilterMode, ScoreType};
use crate::error::Error;
use crate::frame::Frame;
use crate::motion::MotionModel;
use crate::particle::{ParticleSet, ParticleState};
use crate::resample::{self, Stage};
use crate::sampler;
use crate::score::{self, EnergyLags, Scores};

use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Output of one predict, score and reweight pass.
#[derive(Debug, Clone)]
pub struct Pass {
    /// `N x h x w` patches sampled at the predicted particles.
    pub patches: Array3<f64>,
    pub scores: Scores,
}

/// Everything one tracker mutates from frame to frame.
#[derive(Debug, Clone)]
pub struct FilterState {
    mode: FilterMode,
    motion: MotionModel,
    particles: ParticleSet,
    aux: Vec<ParticleState>,
    indices: Vec<usize>,
    lags: EnergyLags,
    template: Array2<f64>,
    rng: StdRng,
}

impl FilterState {
    pub fn new(
        mode: FilterMode,
        score_type: ScoreType,
        motion: MotionModel,
        particles: ParticleSet,
        template: Array2<f64>,
        seed: u64,
    ) -> Self {
        let n = particles.len();

        Self {
            mode,
            motion,
            particles,
            aux: Vec::with_capacity(n),
            indices: (0..n).collect(),
            lags: EnergyLags::new(score_type),
            template,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    #[inline]
    pub fn lags(&self) -> &EnergyLags {
        &self.lags
    }

    #[inline]
    pub fn template(&self) -> &Array2<f64> {
        &self.template
    }

    #[inline]
    pub fn set_template(&mut self, template: Array2<f64>) {
        self.template = template;
    }

    /// Indices drawn by the last resampling stage.
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Runs the mode's preparation stages on `frame`, then the committed pass.
    ///
    /// The frame runs on a staged copy, so on error the state is exactly what
    /// it was before the call.
    pub fn advance(&mut self, frame: &Frame) -> Result<Pass, Error> {
        let mut staged = self.clone();

        for &stage in staged.mode.preparation() {
            staged.apply(stage, frame)?;
        }

        let pass = staged.propagate(frame)?;
        *self = staged;

        Ok(pass)
    }

    fn apply(&mut self, stage: Stage, frame: &Frame) -> Result<(), Error> {
        match stage {
            Stage::ShiftEnergies => self.lags.shift(),
            Stage::Snapshot => {
                self.aux.clear();
                self.aux.extend_from_slice(self.particles.states());
            }
            Stage::Propagate => {
                self.propagate(frame)?;
            }
            Stage::DrawIndices => {
                self.indices =
                    resample::multinomial(self.particles.weights().view(), &mut self.rng);
            }
            Stage::Restore => self.particles.restore(&self.aux),
            Stage::Gather => {
                self.particles.gather(&self.indices);
                self.lags.gather(&self.indices);
            }
            Stage::ResetWeights => self.particles.reset_weights(),
        }

        Ok(())
    }

    /// Predict, sample, score and reweight the current particles.
    pub fn propagate(&mut self, frame: &Frame) -> Result<Pass, Error> {
        self.motion.predict(self.particles.states_mut(), &mut self.rng);

        let patches =
            sampler::sample_batch(frame.view(), self.particles.states(), self.template.dim());
        let scores = score::score(&self.template, &patches, &mut self.lags)?;
        self.particles.reweight(&scores.distribution)?;

        Ok(Pass { patches, scores })
    }
}
