use crate::error::Error;

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Correlation score flavour, carrying the number of energy lags it accumulates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScoreType {
    /// Plain normalised cross-correlation on the current frame.
    Ncc,
    /// Accumulated energies over the current and previous frame.
    Asv,
    /// Accumulated energies over the current and two previous frames.
    Asvho,
}

impl ScoreType {
    #[inline]
    pub fn lag_depth(self) -> usize {
        match self {
            ScoreType::Ncc => 1,
            ScoreType::Asv => 2,
            ScoreType::Asvho => 3,
        }
    }
}

impl FromStr for ScoreType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NCC" => Ok(ScoreType::Ncc),
            "ASV" => Ok(ScoreType::Asv),
            "ASVHO" => Ok(ScoreType::Asvho),
            _ => Err(Error::UnknownScoreType(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterMode {
    /// Predict and reweight only, weights are never reset.
    None,
    /// Multinomial resample from the previous weights every frame.
    Resample,
    /// Auxiliary filter: a look-ahead pass picks the particles to propagate.
    Aux,
}

impl FromStr for FilterMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(FilterMode::None),
            "RESAMPLE" => Ok(FilterMode::Resample),
            "AUX" => Ok(FilterMode::Aux),
            _ => Err(Error::UnknownFilterMode(s.to_string())),
        }
    }
}

/// Per-particle quantity used to pick the candidate template of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxSource {
    Weight,
    Score,
    Correlation,
}

impl MaxSource {
    fn token(self) -> &'static str {
        match self {
            MaxSource::Weight => "WEIGHT",
            MaxSource::Score => "SCORE",
            MaxSource::Correlation => "CORRELATION",
        }
    }
}

/// How the appearance template is refreshed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum UpdateMethod {
    /// Resample the template at the weighted estimate.
    Estimate,
    /// Keep a history of best candidates, refresh from the best entry or
    /// from the rank-1 SVD composite of the whole history.
    History { source: MaxSource, svd: bool },
}

impl FromStr for UpdateMethod {
    type Err = Error;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::UpdateMethod {
            method: method.to_string(),
            reason,
        };

        let mut estimate = false;
        let mut svd = false;
        let mut source = None;
        let mut count = 0;

        for token in method
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            count += 1;
            let found = match token.to_ascii_uppercase().as_str() {
                "ESTIMATE" => {
                    estimate = true;
                    None
                }
                "SVD" => {
                    svd = true;
                    None
                }
                "WEIGHT" => Some(MaxSource::Weight),
                "SCORE" => Some(MaxSource::Score),
                "CORRELATION" => Some(MaxSource::Correlation),
                _ => return Err(invalid("unknown token")),
            };

            if let Some(found) = found {
                if source.replace(found).is_some() {
                    return Err(invalid("more than one max-source token"));
                }
            }
        }

        if count == 0 {
            return Err(invalid("no tokens"));
        }

        if estimate {
            return if count == 1 {
                Ok(UpdateMethod::Estimate)
            } else {
                Err(invalid("ESTIMATE cannot be combined with other tokens"))
            };
        }

        match source {
            Some(source) => Ok(UpdateMethod::History { source, svd }),
            None => Err(invalid("missing max-source token")),
        }
    }
}

impl TryFrom<String> for UpdateMethod {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UpdateMethod> for String {
    fn from(method: UpdateMethod) -> Self {
        method.to_string()
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMethod::Estimate => f.write_str("ESTIMATE"),
            UpdateMethod::History { source, svd: false } => f.write_str(source.token()),
            UpdateMethod::History { source, svd: true } => write!(f, "SVD_{}", source.token()),
        }
    }
}

/// Standard deviations of the additive Gaussian process noise,
/// ordered `[x, y, vx, vy, scale, rotation]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ProcessNoise {
    pub std: [f64; 6],
}

impl ProcessNoise {
    #[inline]
    pub fn zero() -> Self {
        Self { std: [0.0; 6] }
    }
}

impl Default for ProcessNoise {
    fn default() -> Self {
        Self {
            std: [0.0, 0.0, 2.0, 2.0, 0.05, 0.02],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub particle_count: usize,
    pub score_type: ScoreType,
    pub filter_mode: FilterMode,
    /// Refresh the template on frames divisible by this, `0` disables refreshing.
    pub update_interval: usize,
    pub update_method: UpdateMethod,
    pub historical_length: usize,
    pub seed: u64,
    #[serde(default)]
    pub start_frame: usize,
    /// Exclusive end frame, clipped to the sequence length.
    #[serde(default)]
    pub end_frame: Option<usize>,
    #[serde(default)]
    pub noise: ProcessNoise,
}

impl FilterConfig {
    pub fn new(
        particle_count: usize,
        score_type: ScoreType,
        filter_mode: FilterMode,
        update_method: UpdateMethod,
    ) -> Self {
        Self {
            particle_count,
            score_type,
            filter_mode,
            update_interval: 20,
            update_method,
            historical_length: 10,
            seed: 666,
            start_frame: 0,
            end_frame: None,
            noise: ProcessNoise::default(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.particle_count == 0 {
            return Err(Error::ZeroParticles);
        }

        if self.historical_length == 0 {
            return Err(Error::ZeroHistoryLength);
        }

        if self.noise.std.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::InvalidNoise(self.noise.std));
        }

        Ok(())
    }

    /// Frames this configuration covers on a sequence of `length` frames.
    pub fn frame_range(&self, length: usize) -> Result<std::ops::Range<usize>, Error> {
        let start = self.start_frame;
        let end = self.end_frame.map_or(length, |end| end.min(length));

        if start >= end {
            return Err(Error::EmptyRange { start, end });
        }

        Ok(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_type_lag_depth() {
        assert_eq!(ScoreType::Ncc.lag_depth(), 1);
        assert_eq!(ScoreType::Asv.lag_depth(), 2);
        assert_eq!(ScoreType::Asvho.lag_depth(), 3);
        assert_eq!("asvho".parse::<ScoreType>().unwrap(), ScoreType::Asvho);
        assert!(matches!(
            "SSD".parse::<ScoreType>(),
            Err(Error::UnknownScoreType(_))
        ));
    }

    #[test]
    fn test_update_method_tokens() {
        assert_eq!(
            "ESTIMATE".parse::<UpdateMethod>().unwrap(),
            UpdateMethod::Estimate
        );
        assert_eq!(
            "SCORE".parse::<UpdateMethod>().unwrap(),
            UpdateMethod::History {
                source: MaxSource::Score,
                svd: false
            }
        );
        assert_eq!(
            "svd_weight".parse::<UpdateMethod>().unwrap(),
            UpdateMethod::History {
                source: MaxSource::Weight,
                svd: true
            }
        );
        assert_eq!(
            "CORRELATION + SVD".parse::<UpdateMethod>().unwrap(),
            UpdateMethod::History {
                source: MaxSource::Correlation,
                svd: true
            }
        );
    }

    #[test]
    fn test_update_method_rejects_bad_combinations() {
        for method in ["", "  ", "SVD", "ESTIMATE_SVD", "WEIGHT_SCORE", "MEDIAN"] {
            assert!(
                matches!(
                    method.parse::<UpdateMethod>(),
                    Err(Error::UpdateMethod { .. })
                ),
                "{method:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_update_method_display_parses_back() {
        let method = UpdateMethod::History {
            source: MaxSource::Correlation,
            svd: true,
        };
        assert_eq!(method.to_string().parse::<UpdateMethod>().unwrap(), method);
    }

    #[test]
    fn test_validate() {
        let mut config = FilterConfig::new(
            100,
            ScoreType::Ncc,
            FilterMode::Aux,
            UpdateMethod::Estimate,
        );
        assert!(config.validate().is_ok());

        config.particle_count = 0;
        assert!(matches!(config.validate(), Err(Error::ZeroParticles)));

        config.particle_count = 100;
        config.historical_length = 0;
        assert!(matches!(config.validate(), Err(Error::ZeroHistoryLength)));

        config.historical_length = 5;
        config.noise.std[2] = -1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidNoise(_))));
    }

    #[test]
    fn test_frame_range() {
        let mut config = FilterConfig::new(
            10,
            ScoreType::Asv,
            FilterMode::None,
            UpdateMethod::Estimate,
        );
        assert_eq!(config.frame_range(30).unwrap(), 0..30);

        config.start_frame = 5;
        config.end_frame = Some(100);
        assert_eq!(config.frame_range(30).unwrap(), 5..30);

        config.end_frame = Some(5);
        assert!(matches!(
            config.frame_range(30),
            Err(Error::EmptyRange { start: 5, end: 5 })
        ));
    }

    #[test]
    fn test_deserialize_job_options() {
        let json = r#"{
            "particle_count": 300,
            "score_type": "ASVHO",
            "filter_mode": "AUX",
            "update_interval": 20,
            "update_method": "SCORE",
            "historical_length": 10,
            "seed": 666
        }"#;

        let config: FilterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.particle_count, 300);
        assert_eq!(config.score_type, ScoreType::Asvho);
        assert_eq!(config.filter_mode, FilterMode::Aux);
        assert_eq!(
            config.update_method,
            UpdateMethod::History {
                source: MaxSource::Score,
                svd: false
            }
        );
        assert_eq!(config.noise, ProcessNoise::default());
        assert_eq!(config.end_frame, None);

        let bad = json.replace("\"SCORE\"", "\"\"");
        assert!(serde_json::from_str::<FilterConfig>(&bad).is_err());

        let bad = json.replace("ASVHO", "ASVX");
        assert!(serde_json::from_str::<FilterConfig>(&bad).is_err());
    }
}
