use crate::config::FilterMode;

use ndarray::prelude::*;
use rand::Rng;

/// One step of a filter mode's per-frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Age the stored energy lags by one frame.
    ShiftEnergies,
    /// Copy the particles into the auxiliary snapshot.
    Snapshot,
    /// Predict, score and reweight.
    Propagate,
    /// Draw resample indices from the current weights.
    DrawIndices,
    /// Put the auxiliary snapshot back.
    Restore,
    /// Gather particles and energy lags by the drawn indices.
    Gather,
    /// Set every weight to `1 / N`.
    ResetWeights,
}

impl FilterMode {
    /// Stages run before the committed pass. Every mode then finishes with one
    /// more predict, score and reweight whose weights and estimate are kept.
    pub fn preparation(self) -> &'static [Stage] {
        use Stage::*;

        match self {
            FilterMode::None => &[ShiftEnergies],
            FilterMode::Resample => &[ShiftEnergies, DrawIndices, Gather, ResetWeights],
            FilterMode::Aux => &[
                ShiftEnergies,
                Snapshot,
                Propagate,
                DrawIndices,
                Restore,
                Gather,
                ResetWeights,
            ],
        }
    }
}

/// Draws `weights.len()` indices with `P(i) ∝ weights[i]` by inverting the cumulative sum.
pub fn multinomial<R: Rng>(weights: ArrayView1<'_, f64>, rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let cumulative: Vec<f64> = weights
        .iter()
        .scan(0.0, |acc, &w| {
            *acc += w;
            Some(*acc)
        })
        .collect();

    let total = match cumulative.last() {
        Some(&total) => total,
        None => return Vec::new(),
    };

    (0..n)
        .map(|_| {
            let u = rng.random::<f64>() * total;
            cumulative.partition_point(|&c| c <= u).min(n - 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_preparation_stages() {
        for mode in [FilterMode::None, FilterMode::Resample, FilterMode::Aux] {
            assert_eq!(mode.preparation().first(), Some(&Stage::ShiftEnergies));
            assert_ne!(mode.preparation().last(), Some(&Stage::Propagate));
        }

        assert!(!FilterMode::None.preparation().contains(&Stage::DrawIndices));

        // the look-ahead pass must come before the draw and be undone by the restore
        let aux = FilterMode::Aux.preparation();
        let pos = |stage| aux.iter().position(|s| *s == stage).unwrap();
        assert!(pos(Stage::Snapshot) < pos(Stage::Propagate));
        assert!(pos(Stage::Propagate) < pos(Stage::DrawIndices));
        assert!(pos(Stage::DrawIndices) < pos(Stage::Restore));
        assert!(pos(Stage::Restore) < pos(Stage::Gather));
        assert_eq!(aux.iter().filter(|s| **s == Stage::ShiftEnergies).count(), 1);
    }

    #[test]
    fn test_indices_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = array![0.05, 0.5, 0.0, 0.2, 0.25];

        for _ in 0..200 {
            let idx = multinomial(weights.view(), &mut rng);
            assert_eq!(idx.len(), 5);
            assert!(idx.iter().all(|&i| i < 5));
            assert!(!idx.contains(&2), "zero-weight particle was drawn");
        }
    }

    #[test]
    fn test_degenerate_weight_always_drawn() {
        let mut rng = StdRng::seed_from_u64(5);
        let weights = array![0.0, 0.0, 1.0, 0.0];

        assert_eq!(multinomial(weights.view(), &mut rng), vec![2; 4]);
    }

    #[test]
    fn test_uniform_frequencies() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 10;
        let weights = Array1::from_elem(n, 1.0 / n as f64);
        let mut counts = vec![0usize; n];

        for _ in 0..1000 {
            for i in multinomial(weights.view(), &mut rng) {
                counts[i] += 1;
            }
        }

        // 10_000 draws, 1_000 expected per particle, sigma = 30
        assert_eq!(counts.iter().sum::<usize>(), 10_000);
        for count in counts {
            assert!((850..=1150).contains(&count), "count {count} out of tolerance");
        }
    }

    #[test]
    fn test_proportional_frequencies() {
        let mut rng = StdRng::seed_from_u64(9);
        let weights = array![0.1, 0.6, 0.3];
        let mut counts = [0usize; 3];

        for _ in 0..5000 {
            for i in multinomial(weights.view(), &mut rng) {
                counts[i] += 1;
            }
        }

        let total = 15_000.0;
        for (count, w) in counts.iter().zip(weights.iter()) {
            assert!((*count as f64 / total - w).abs() < 0.02);
        }
    }
}
