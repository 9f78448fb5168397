use crate::config::{FilterConfig, MaxSource, UpdateMethod};
use crate::error::Error;
use crate::filter::{FilterState, Pass};
use crate::frame::{Frame, GroundTruth};
use crate::history::TemplateHistory;
use crate::motion::MotionModel;
use crate::particle::{seed_state, ParticleSet, ParticleState, X, Y};
use crate::sampler::{self, Affine};
use crate::SequenceSource;

use log::{debug, info, warn};
use nalgebra as na;
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// What one tracked frame produced.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub index: usize,
    /// Weighted mean state.
    pub estimate: ParticleState,
    /// `estimate[x, y] - ground truth center`
    pub error: na::Vector2<f64>,
    pub neff: f64,
    pub template_updated: bool,
    /// The refreshed template, present on frames that refreshed it.
    pub template: Option<Array2<f64>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub frame_number: usize,
    pub estimate: [f64; 6],
    pub error: [f64; 2],
    pub neff: f64,
    pub template_updated: bool,
}

impl From<&FrameReport> for FrameRecord {
    fn from(report: &FrameReport) -> Self {
        let mut estimate = [0.0; 6];
        estimate.copy_from_slice(report.estimate.as_slice());

        Self {
            frame_number: report.index,
            estimate,
            error: [report.error.x, report.error.y],
            neff: report.neff,
            template_updated: report.template_updated,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunResults {
    pub config: FilterConfig,
    pub frames: Vec<FrameRecord>,
    /// Set when the frame callback stopped the run early.
    pub cancelled: bool,
}

/// Single-target SIR tracker seeded from the first frame's ground truth.
#[derive(Debug, Clone)]
pub struct SirTracker {
    config: FilterConfig,
    state: FilterState,
    /// Built on the first push, never for `UpdateMethod::Estimate`.
    history: Option<TemplateHistory>,
    dims: (usize, usize),
}

impl SirTracker {
    pub fn new(config: FilterConfig, first: &Frame, gt: &GroundTruth) -> Result<Self, Error> {
        config.validate()?;

        let size = gt.template_size();
        if size.0 == 0 || size.1 == 0 {
            return Err(Error::EmptyTemplate(size));
        }

        let dims = first.dims();
        if dims.0 == 0 || dims.1 == 0 {
            return Err(Error::FrameShape {
                expected: size,
                actual: dims,
            });
        }

        let template = sampler::sample(
            first.view(),
            &Affine::new(gt.center.x, gt.center.y, 1.0, 0.0),
            size,
        );

        let state = FilterState::new(
            config.filter_mode,
            config.score_type,
            MotionModel::new(config.noise),
            ParticleSet::seeded(config.particle_count, seed_state(gt.center)),
            template,
            config.seed,
        );

        Ok(Self {
            history: None,
            dims,
            config,
            state,
        })
    }

    #[inline]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    #[inline]
    pub fn particles(&self) -> &ParticleSet {
        self.state.particles()
    }

    #[inline]
    pub fn template(&self) -> &Array2<f64> {
        self.state.template()
    }

    #[inline]
    pub fn history(&self) -> Option<&TemplateHistory> {
        self.history.as_ref()
    }

    #[inline]
    fn is_update_frame(&self, index: usize) -> bool {
        let interval = self.config.update_interval;

        interval > 0 && index % interval == 0
    }

    /// Filters frame `index` and maintains the template.
    pub fn track(
        &mut self,
        index: usize,
        frame: &Frame,
        gt: &GroundTruth,
    ) -> Result<FrameReport, Error> {
        if frame.dims() != self.dims {
            return Err(Error::FrameShape {
                expected: self.dims,
                actual: frame.dims(),
            });
        }

        let pass = self.state.advance(frame)?;

        let particles = self.state.particles();
        let estimate = particles.estimate();
        let neff = particles.effective_sample_size();
        let error = na::Vector2::new(estimate[X], estimate[Y]) - gt.center.coords;

        let template = self.maintain_template(index, frame, &estimate, &pass)?;

        debug!(
            target: "sir",
            "frame {}: neff {:.2}, estimate ({:.2}, {:.2}), error {:.2}",
            index,
            neff,
            estimate[X],
            estimate[Y],
            error.norm()
        );

        Ok(FrameReport {
            index,
            estimate,
            error,
            neff,
            template_updated: template.is_some(),
            template,
        })
    }

    fn maintain_template(
        &mut self,
        index: usize,
        frame: &Frame,
        estimate: &ParticleState,
        pass: &Pass,
    ) -> Result<Option<Array2<f64>>, Error> {
        let update = self.is_update_frame(index);

        let refreshed = match self.config.update_method {
            UpdateMethod::Estimate => {
                if !update {
                    return Ok(None);
                }

                sampler::sample(
                    frame.view(),
                    &Affine::from_state(estimate),
                    self.state.template().dim(),
                )
            }

            UpdateMethod::History { source, svd } => {
                let values = match source {
                    MaxSource::Weight => self.state.particles().weights(),
                    MaxSource::Score => &pass.scores.distribution,
                    MaxSource::Correlation => &pass.scores.correlation,
                };

                let capacity = self.config.historical_length;
                let history = self
                    .history
                    .get_or_insert_with(|| TemplateHistory::with_capacity(capacity));

                let best = argmax(values);
                let candidate = pass.patches.index_axis(Axis(0), best).to_owned();
                history.push(candidate, values[best]);

                if !update {
                    return Ok(None);
                }

                history.refreshed(svd)?
            }
        };

        debug!(
            target: "sir",
            "frame {}: template refreshed ({})",
            index,
            self.config.update_method
        );
        self.state.set_template(refreshed.clone());

        Ok(Some(refreshed))
    }
}

/// Index of the first maximum.
fn argmax(values: &Array1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > values[best] { i } else { best })
}

/// Tracks the configured frame range of `source`.
///
/// `on_frame` runs after each frame is fully committed. Returning
/// `ControlFlow::Break` cancels the run, blocking inside it pauses the run.
pub fn run<S, F>(
    config: &FilterConfig,
    source: &mut S,
    mut on_frame: F,
) -> Result<RunResults, Error>
where
    S: SequenceSource + ?Sized,
    F: FnMut(&FrameReport) -> ControlFlow<()>,
{
    config.validate()?;
    let range = config.frame_range(source.len())?;

    info!(
        target: "sir",
        "tracking frames {}..{}: {} particles, {:?}, {:?}, {}",
        range.start,
        range.end,
        config.particle_count,
        config.score_type,
        config.filter_mode,
        config.update_method
    );

    let first = source.frame(range.start)?;
    let gt = source.ground_truth(range.start)?;
    let mut tracker = SirTracker::new(config.clone(), &first, &gt)?;

    let mut pending = Some((first, gt));
    let mut frames = Vec::with_capacity(range.len());
    let mut cancelled = false;

    for index in range {
        let (frame, gt) = match pending.take() {
            Some(seed) => seed,
            None => (source.frame(index)?, source.ground_truth(index)?),
        };

        let report = tracker.track(index, &frame, &gt)?;
        frames.push(FrameRecord::from(&report));

        if on_frame(&report).is_break() {
            warn!(target: "sir", "run cancelled after frame {}", index);
            cancelled = true;
            break;
        }
    }

    info!(
        target: "sir",
        "tracked {} frames{}",
        frames.len(),
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(RunResults {
        config: config.clone(),
        frames,
        cancelled,
    })
}
