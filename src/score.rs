use crate::config::ScoreType;
use crate::error::Error;

use ndarray::prelude::*;
use ndarray::Zip;

/// Energies at or below this count as zero variance.
pub const ENERGY_EPSILON: f64 = 1e-12;

/// Sharpness of the correlation-to-likelihood mapping.
pub const SCORE_SHARPNESS: f64 = 100.0;

#[inline]
fn is_flat(energy: f64) -> bool {
    energy.is_nan() || energy <= ENERGY_EPSILON
}

/// Mean-centred energies of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyLag {
    /// `sum((t - mean t)^2)`
    pub template: f64,
    /// `sum((p_i - mean p_i)^2)` per particle
    pub patch: Array1<f64>,
    /// `sum((t - mean t) * (p_i - mean p_i))` per particle
    pub cross: Array1<f64>,
}

impl EnergyLag {
    pub fn measure(template: &Array2<f64>, patches: &Array3<f64>) -> Self {
        let centred = template - template.mean().unwrap_or(0.0);
        let template_energy = centred.iter().map(|v| v * v).sum();

        let n = patches.len_of(Axis(0));
        let mut patch = Array1::zeros(n);
        let mut cross = Array1::zeros(n);

        Zip::from(&mut patch)
            .and(&mut cross)
            .and(patches.outer_iter())
            .par_for_each(|pe, ce, p| {
                let mean = p.mean().unwrap_or(0.0);
                let (mut e, mut c) = (0.0, 0.0);

                for (&v, &t) in p.iter().zip(centred.iter()) {
                    let d = v - mean;
                    e += d * d;
                    c += d * t;
                }

                *pe = e;
                *ce = c;
            });

        Self {
            template: template_energy,
            patch,
            cross,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if is_flat(self.template) {
            return Err(Error::DegenerateTemplate);
        }

        match self.patch.iter().position(|&e| is_flat(e)) {
            Some(idx) => Err(Error::DegeneratePatch(idx)),
            None => Ok(()),
        }
    }

    fn gathered(&self, indices: &[usize]) -> Self {
        Self {
            template: self.template,
            patch: self.patch.select(Axis(0), indices),
            cross: self.cross.select(Axis(0), indices),
        }
    }
}

/// Energies of the current frame (slot 0) and of up to two previous frames.
#[derive(Debug, Clone)]
pub struct EnergyLags {
    score_type: ScoreType,
    slots: Vec<Option<EnergyLag>>,
}

impl EnergyLags {
    pub fn new(score_type: ScoreType) -> Self {
        Self {
            score_type,
            slots: vec![None; score_type.lag_depth()],
        }
    }

    #[inline]
    pub fn score_type(&self) -> ScoreType {
        self.score_type
    }

    #[inline]
    pub fn get(&self, lag: usize) -> Option<&EnergyLag> {
        self.slots.get(lag)?.as_ref()
    }

    #[inline]
    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Moves every lag one frame back: `lag2 <- lag1`, `lag1 <- lag0`.
    pub fn shift(&mut self) {
        for k in (1..self.slots.len()).rev() {
            self.slots[k] = self.slots[k - 1].clone();
        }
    }

    /// Reorders the per-particle vectors of every populated lag.
    pub fn gather(&mut self, indices: &[usize]) {
        for lag in self.slots.iter_mut().flatten() {
            *lag = lag.gathered(indices);
        }
    }

    #[inline]
    pub fn store(&mut self, current: EnergyLag) {
        self.slots[0] = Some(current);
    }

    /// Correlation of `current` accumulated with the stored previous lags.
    pub fn correlation(&self, current: &EnergyLag) -> Array1<f64> {
        let mut template = current.template;
        let mut patch = current.patch.clone();
        let mut cross = current.cross.clone();

        for lag in self.slots.iter().skip(1).flatten() {
            template += lag.template;
            patch += &lag.patch;
            cross += &lag.cross;
        }

        Zip::from(&cross)
            .and(&patch)
            .map_collect(|&c, &p| c / (template * p).sqrt())
    }
}

/// Per-particle correlation and the normalised score distribution.
#[derive(Debug, Clone)]
pub struct Scores {
    pub correlation: Array1<f64>,
    pub distribution: Array1<f64>,
}

/// Scores `patches` against `template` and stores the current energies as lag 0.
pub fn score(
    template: &Array2<f64>,
    patches: &Array3<f64>,
    lags: &mut EnergyLags,
) -> Result<Scores, Error> {
    let current = EnergyLag::measure(template, patches);
    current.validate()?;

    let correlation = lags.correlation(&current);
    let raw = correlation.mapv(|c| (-SCORE_SHARPNESS * (1.0 - c)).exp());
    let sum = raw.sum();

    if !(sum.is_finite() && sum > 0.0) {
        return Err(Error::DegenerateWeights(sum));
    }

    lags.store(current);

    Ok(Scores {
        correlation,
        distribution: raw / sum,
    })
}
