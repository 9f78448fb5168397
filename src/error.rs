use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("particle count must be positive")]
    ZeroParticles,

    #[error("historical length must be positive")]
    ZeroHistoryLength,

    #[error("process noise must be finite and non-negative, got {0:?}")]
    InvalidNoise([f64; 6]),

    #[error("unknown score type `{0}`")]
    UnknownScoreType(String),

    #[error("unknown filter mode `{0}`")]
    UnknownFilterMode(String),

    #[error("invalid update method `{method}`: {reason}")]
    UpdateMethod { method: String, reason: &'static str },

    #[error("template size {0:?} is empty")]
    EmptyTemplate((usize, usize)),

    #[error("template has zero variance")]
    DegenerateTemplate,

    #[error("patch of particle {0} has zero variance")]
    DegeneratePatch(usize),

    #[error("weights cannot be normalised (sum {0})")]
    DegenerateWeights(f64),

    #[error("template history is empty")]
    EmptyHistory,

    #[error("frame {index} is beyond the sequence length {length}")]
    FrameOutOfRange { index: usize, length: usize },

    #[error("frame is {actual:?}, expected {expected:?}")]
    FrameShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("empty frame range {start}..{end}")]
    EmptyRange { start: usize, end: usize },

    #[error("Shape Error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
