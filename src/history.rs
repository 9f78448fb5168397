use crate::error::Error;

use nalgebra as na;
use ndarray::prelude::*;
use std::collections::VecDeque;

/// Fixed-capacity ring of `(template, value)` pairs, newest first.
#[derive(Debug, Clone)]
pub struct TemplateHistory {
    deque: VecDeque<(Array2<f64>, f64)>,
    capacity: usize,
}

impl TemplateHistory {
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            deque: VecDeque::with_capacity(cap),
            capacity: cap,
        }
    }

    /// Pushes to the front and evicts the oldest entry. The first push of a
    /// history fills every slot with the same pair.
    pub fn push(&mut self, template: Array2<f64>, value: f64) {
        if self.deque.is_empty() {
            for _ in 1..self.capacity {
                self.deque.push_back((template.clone(), value));
            }
        } else if self.is_full() {
            self.deque.pop_back();
        }

        self.deque.push_front((template, value));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'_ (Array2<f64>, f64)> {
        self.deque.iter()
    }

    /// Entry with the highest value, the newest one on ties.
    pub fn best(&self) -> Option<&(Array2<f64>, f64)> {
        let mut iter = self.deque.iter();
        let mut best = iter.next()?;

        for entry in iter {
            if entry.1 > best.1 {
                best = entry;
            }
        }

        Some(best)
    }

    /// Rank-1 reconstruction of the newest template from the leading singular
    /// triple of the history stacked as columns.
    ///
    /// The triple comes from the top eigenpair `(s^2, v)` of the `H x H` Gram
    /// matrix, so the newest column is `X v v[0]`.
    pub fn svd_composite(&self) -> Option<Array2<f64>> {
        let (h, w) = self.deque.front()?.0.dim();
        let columns: Vec<na::DVector<f64>> = self
            .deque
            .iter()
            .map(|(t, _)| na::DVector::from_iterator(h * w, t.iter().copied()))
            .collect();

        let stacked = na::DMatrix::from_columns(&columns);
        let eigen = na::SymmetricEigen::new(stacked.tr_mul(&stacked));

        // eigenvalues are not guaranteed to come out sorted
        let (k, _) = eigen
            .eigenvalues
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, l)| if l > acc.1 { (i, l) } else { acc });

        let v = eigen.eigenvectors.column(k);
        let composite = &stacked * v * v[0];

        Array2::from_shape_vec((h, w), composite.iter().copied().collect()).ok()
    }

    /// The template a refresh should use: the composite or the best entry.
    pub fn refreshed(&self, svd: bool) -> Result<Array2<f64>, Error> {
        let template = if svd {
            self.svd_composite()
        } else {
            self.best().map(|(t, _)| t.clone())
        };

        template.ok_or(Error::EmptyHistory)
    }
}
