use crate::error::Error;
use crate::SequenceSource;

use nalgebra as na;
use ndarray::prelude::*;

/// Grayscale frame with intensities in `[0, 1]`, indexed `[row, column]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array2<f64>,
}

impl Frame {
    #[inline]
    pub fn new(pixels: Array2<f64>) -> Self {
        Self { pixels }
    }

    /// Builds a frame from row-major 8-bit luma.
    pub fn from_luma8(height: usize, width: usize, data: &[u8]) -> Result<Self, Error> {
        let pixels = Array2::from_shape_vec(
            (height, width),
            data.iter().map(|&v| f64::from(v) / 255.0).collect(),
        )?;

        Ok(Self { pixels })
    }

    /// `(height, width)`
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.pixels.view()
    }
}

/// Ground-truth target box: center and half-extents, `x` along rows and `y` along columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruth {
    pub center: na::Point2<f64>,
    pub half_extent: na::Vector2<f64>,
}

impl GroundTruth {
    #[inline]
    pub fn new(x: f64, y: f64, half_x: f64, half_y: f64) -> Self {
        Self {
            center: na::Point2::new(x, y),
            half_extent: na::Vector2::new(half_x, half_y),
        }
    }

    /// Template `(height, width)` covering the full box.
    #[inline]
    pub fn template_size(&self) -> (usize, usize) {
        (
            (2.0 * self.half_extent.x).max(0.0) as usize,
            (2.0 * self.half_extent.y).max(0.0) as usize,
        )
    }
}

/// Pre-loaded frames with their ground truth.
#[derive(Debug, Clone, Default)]
pub struct MemorySequence {
    frames: Vec<Frame>,
    ground_truth: Vec<GroundTruth>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame, gt: GroundTruth) {
        self.frames.push(frame);
        self.ground_truth.push(gt);
    }
}

impl SequenceSource for MemorySequence {
    #[inline]
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn frame(&mut self, index: usize) -> Result<Frame, Error> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(Error::FrameOutOfRange {
                index,
                length: self.frames.len(),
            })
    }

    fn ground_truth(&mut self, index: usize) -> Result<GroundTruth, Error> {
        self.ground_truth
            .get(index)
            .copied()
            .ok_or(Error::FrameOutOfRange {
                index,
                length: self.ground_truth.len(),
            })
    }
}
