pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod history;
pub mod motion;
pub mod particle;
pub mod resample;
pub mod sampler;
pub mod score;
pub mod tracker;

pub use config::{FilterConfig, FilterMode, MaxSource, ProcessNoise, ScoreType, UpdateMethod};
pub use error::Error;
pub use frame::{Frame, GroundTruth, MemorySequence};
pub use particle::{ParticleSet, ParticleState};
pub use tracker::{run, FrameRecord, FrameReport, RunResults, SirTracker};

/// Random access to the frames of one sequence and their ground truth.
pub trait SequenceSource {
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn frame(&mut self, index: usize) -> Result<Frame, Error>;
    fn ground_truth(&mut self, index: usize) -> Result<GroundTruth, Error>;
}
