use mtom_core::belief::DEFAULT_EVIDENCE_MULTIPLIER;
use mtom_core::culture::{CulturalOverrides, CulturalProfile, CulturalTemplate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest social weight accepted at construction.
pub const MAX_LAMBDA_SOCIAL: f64 = 5.0;

/// Linear turn-decay of the social weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LambdaSchedule {
    pub start_factor: f64,
    pub end_factor: f64,
    pub decay_turns: u32,
}

impl LambdaSchedule {
    /// Multiplier for `turn`; a zero-length decay jumps straight to `end_factor`.
    pub fn factor(&self, turn: u32) -> f64 {
        let progress = if self.decay_turns == 0 {
            1.0
        } else {
            (f64::from(turn) / f64::from(self.decay_turns)).clamp(0.0, 1.0)
        };
        self.start_factor + (self.end_factor - self.start_factor) * progress
    }
}

/// Construction-time parameters of the Bayesian agent. Never mutated once the agent exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BayesianConfig {
    pub lambda_social: f64,
    pub prior_strength: f64,
    /// Overrides the λ-dependent risk weight when set.
    pub risk_weight: Option<f64>,
    pub adaptive_prior_offset: f64,
    pub lambda_schedule: Option<LambdaSchedule>,
    pub cultural_template: Option<String>,
    pub cultural_overrides: Option<CulturalOverrides>,
    pub monte_carlo_samples: usize,
    pub evidence_multiplier: f64,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        Self {
            lambda_social: 0.5,
            prior_strength: 6.0,
            risk_weight: None,
            adaptive_prior_offset: 0.0,
            lambda_schedule: None,
            cultural_template: None,
            cultural_overrides: None,
            monte_carlo_samples: 1_000,
            evidence_multiplier: DEFAULT_EVIDENCE_MULTIPLIER,
        }
    }
}

impl BayesianConfig {
    pub fn with_lambda(lambda_social: f64) -> Self {
        Self {
            lambda_social,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.lambda_social.is_finite() || !(0.0..=MAX_LAMBDA_SOCIAL).contains(&self.lambda_social) {
            return Err(ConfigError::InvalidLambda(self.lambda_social));
        }
        if !self.prior_strength.is_finite() || self.prior_strength <= 0.0 {
            return Err(ConfigError::InvalidPriorStrength(self.prior_strength));
        }
        if let Some(weight) = self.risk_weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidRiskWeight(weight));
            }
        }
        if !self.adaptive_prior_offset.is_finite() {
            return Err(ConfigError::InvalidPriorOffset(self.adaptive_prior_offset));
        }
        if let Some(schedule) = &self.lambda_schedule {
            let positive = |v: f64| v.is_finite() && v > 0.0;
            if !positive(schedule.start_factor) || !positive(schedule.end_factor) {
                return Err(ConfigError::InvalidSchedule(
                    "start_factor and end_factor must be positive".to_string(),
                ));
            }
        }
        if self.monte_carlo_samples == 0 {
            return Err(ConfigError::InvalidSampleCount);
        }
        if !self.evidence_multiplier.is_finite() || self.evidence_multiplier <= 0.0 {
            return Err(ConfigError::InvalidEvidenceMultiplier(self.evidence_multiplier));
        }
        self.cultural_profile().map(|_| ())
    }

    /// Resolves the template name plus overrides; `None` when neither is configured.
    pub fn cultural_profile(&self) -> Result<Option<CulturalProfile>, ConfigError> {
        let template = match self.cultural_template.as_deref() {
            Some(name) => Some(
                name.parse::<CulturalTemplate>()
                    .map_err(|err| ConfigError::UnknownCulturalTemplate(err.0))?,
            ),
            None => None,
        };
        if let Some(field) = self
            .cultural_overrides
            .as_ref()
            .and_then(CulturalOverrides::invalid_field)
        {
            return Err(ConfigError::InvalidCulturalOverride(field));
        }
        if template.is_none() && self.cultural_overrides.is_none() {
            return Ok(None);
        }
        let profile = template.unwrap_or(CulturalTemplate::Neutral).profile();
        Ok(Some(match &self.cultural_overrides {
            Some(overrides) => profile.with_overrides(overrides),
            None => profile,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidLambda(f64),
    InvalidPriorStrength(f64),
    InvalidRiskWeight(f64),
    InvalidPriorOffset(f64),
    InvalidSchedule(String),
    InvalidSampleCount,
    InvalidEvidenceMultiplier(f64),
    UnknownCulturalTemplate(String),
    InvalidCulturalOverride(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLambda(v) => {
                write!(f, "lambda_social must lie in [0, {MAX_LAMBDA_SOCIAL}] (got {v})")
            }
            ConfigError::InvalidPriorStrength(v) => {
                write!(f, "prior_strength must be positive (got {v})")
            }
            ConfigError::InvalidRiskWeight(v) => {
                write!(f, "risk_weight must be non-negative (got {v})")
            }
            ConfigError::InvalidPriorOffset(v) => {
                write!(f, "adaptive_prior_offset must be finite (got {v})")
            }
            ConfigError::InvalidSchedule(reason) => write!(f, "invalid lambda_schedule: {reason}"),
            ConfigError::InvalidSampleCount => f.write_str("monte_carlo_samples must be positive"),
            ConfigError::InvalidEvidenceMultiplier(v) => {
                write!(f, "evidence_multiplier must be positive (got {v})")
            }
            ConfigError::UnknownCulturalTemplate(name) => {
                write!(f, "unknown cultural template '{name}'")
            }
            ConfigError::InvalidCulturalOverride(field) => {
                write!(f, "cultural override '{field}' is out of range")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(BayesianConfig::default().validate(), Ok(()));
        assert_eq!(BayesianConfig::default().cultural_profile(), Ok(None));
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let cases = [
            BayesianConfig::with_lambda(-0.1),
            BayesianConfig::with_lambda(f64::NAN),
            BayesianConfig {
                prior_strength: 0.0,
                ..BayesianConfig::default()
            },
            BayesianConfig {
                risk_weight: Some(-1.0),
                ..BayesianConfig::default()
            },
            BayesianConfig {
                lambda_schedule: Some(LambdaSchedule {
                    start_factor: 1.0,
                    end_factor: 0.0,
                    decay_turns: 3,
                }),
                ..BayesianConfig::default()
            },
            BayesianConfig {
                monte_carlo_samples: 0,
                ..BayesianConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn cultural_template_resolves_with_overrides() {
        let config = BayesianConfig {
            cultural_template: Some("individualist".to_string()),
            cultural_overrides: Some(CulturalOverrides {
                fairness_anchor: Some(0.55),
                ..CulturalOverrides::default()
            }),
            ..BayesianConfig::default()
        };
        let profile = config.cultural_profile().unwrap().unwrap();
        assert_eq!(profile.template, CulturalTemplate::Individualist);
        assert_eq!(profile.fairness_anchor, 0.55);

        let unknown = BayesianConfig {
            cultural_template: Some("martian".to_string()),
            ..BayesianConfig::default()
        };
        assert_eq!(
            unknown.validate(),
            Err(ConfigError::UnknownCulturalTemplate("martian".to_string()))
        );
    }

    #[test]
    fn schedule_interpolates_and_saturates() {
        let schedule = LambdaSchedule {
            start_factor: 1.2,
            end_factor: 0.6,
            decay_turns: 4,
        };
        assert!((schedule.factor(0) - 1.2).abs() < 1e-12);
        assert!((schedule.factor(2) - 0.9).abs() < 1e-12);
        assert!((schedule.factor(10) - 0.6).abs() < 1e-12);
        let instant = LambdaSchedule {
            decay_turns: 0,
            ..schedule
        };
        assert!((instant.factor(0) - 0.6).abs() < 1e-12);
    }
}
