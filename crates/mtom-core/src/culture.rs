//! Cultural presets that bias both the initial belief and the perception model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named cultural preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CulturalTemplate {
    Neutral,
    Collectivist,
    Individualist,
}

impl CulturalTemplate {
    pub const ALL: [CulturalTemplate; 3] = [
        CulturalTemplate::Neutral,
        CulturalTemplate::Collectivist,
        CulturalTemplate::Individualist,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            CulturalTemplate::Neutral => "neutral",
            CulturalTemplate::Collectivist => "collectivist",
            CulturalTemplate::Individualist => "individualist",
        }
    }

    pub const fn profile(self) -> CulturalProfile {
        match self {
            CulturalTemplate::Neutral => CulturalProfile {
                template: CulturalTemplate::Neutral,
                prior_warmth: 0.5,
                prior_competence: 0.5,
                fairness_anchor: 0.5,
                warmth_bias: 0.0,
            },
            // Expects more warmth and reads anything above ~45% as grabbing.
            CulturalTemplate::Collectivist => CulturalProfile {
                template: CulturalTemplate::Collectivist,
                prior_warmth: 0.6,
                prior_competence: 0.45,
                fairness_anchor: 0.45,
                warmth_bias: 0.05,
            },
            CulturalTemplate::Individualist => CulturalProfile {
                template: CulturalTemplate::Individualist,
                prior_warmth: 0.45,
                prior_competence: 0.55,
                fairness_anchor: 0.6,
                warmth_bias: -0.05,
            },
        }
    }
}

impl fmt::Display for CulturalTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CulturalTemplate {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" | "default" => Ok(CulturalTemplate::Neutral),
            "collectivist" => Ok(CulturalTemplate::Collectivist),
            "individualist" => Ok(CulturalTemplate::Individualist),
            _ => Err(UnknownTemplate(s.to_string())),
        }
    }
}

/// Returned when a template name does not match any preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTemplate(pub String);

impl fmt::Display for UnknownTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cultural template '{}'", self.0)
    }
}

impl std::error::Error for UnknownTemplate {}

/// Resolved cultural parameters shared by the belief and the perception model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CulturalProfile {
    pub template: CulturalTemplate,
    pub prior_warmth: f64,
    pub prior_competence: f64,
    /// Offer ratio this culture reads as an even split.
    pub fairness_anchor: f64,
    /// Additive shift applied to every predicted warmth mean.
    pub warmth_bias: f64,
}

impl CulturalProfile {
    pub fn name(&self) -> &'static str {
        self.template.name()
    }

    /// Applies a partial override on top of this profile.
    pub fn with_overrides(mut self, overrides: &CulturalOverrides) -> Self {
        if let Some(value) = overrides.prior_warmth {
            self.prior_warmth = value;
        }
        if let Some(value) = overrides.prior_competence {
            self.prior_competence = value;
        }
        if let Some(value) = overrides.fairness_anchor {
            self.fairness_anchor = value;
        }
        if let Some(value) = overrides.warmth_bias {
            self.warmth_bias = value;
        }
        self
    }
}

impl Default for CulturalProfile {
    fn default() -> Self {
        CulturalTemplate::Neutral.profile()
    }
}

/// Partial profile; unset fields keep the template value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CulturalOverrides {
    pub prior_warmth: Option<f64>,
    pub prior_competence: Option<f64>,
    pub fairness_anchor: Option<f64>,
    pub warmth_bias: Option<f64>,
}

impl CulturalOverrides {
    /// Returns the name of the first field holding an out-of-range value.
    pub fn invalid_field(&self) -> Option<&'static str> {
        let unit = |value: Option<f64>| value.is_some_and(|v| !v.is_finite() || !(0.0..=1.0).contains(&v));
        if unit(self.prior_warmth) {
            return Some("prior_warmth");
        }
        if unit(self.prior_competence) {
            return Some("prior_competence");
        }
        if unit(self.fairness_anchor) {
            return Some("fairness_anchor");
        }
        if self
            .warmth_bias
            .is_some_and(|v| !v.is_finite() || !(-0.5..=0.5).contains(&v))
        {
            return Some("warmth_bias");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collectivist_expects_more_warmth_and_tighter_fairness() {
        let collectivist = CulturalTemplate::Collectivist.profile();
        let individualist = CulturalTemplate::Individualist.profile();

        assert!(collectivist.prior_warmth > individualist.prior_warmth);
        assert!(collectivist.fairness_anchor < individualist.fairness_anchor);
        assert_eq!(collectivist.name(), "collectivist");
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(
            "Collectivist".parse::<CulturalTemplate>(),
            Ok(CulturalTemplate::Collectivist)
        );
        assert!("tribal".parse::<CulturalTemplate>().is_err());
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let overrides = CulturalOverrides {
            fairness_anchor: Some(0.4),
            ..Default::default()
        };
        let profile = CulturalTemplate::Individualist
            .profile()
            .with_overrides(&overrides);
        assert_eq!(profile.fairness_anchor, 0.4);
        assert_eq!(profile.prior_warmth, 0.45);
        assert_eq!(profile.template, CulturalTemplate::Individualist);
    }

    #[test]
    fn flags_out_of_range_overrides() {
        let overrides = CulturalOverrides {
            warmth_bias: Some(0.9),
            ..Default::default()
        };
        assert_eq!(overrides.invalid_field(), Some("warmth_bias"));
        assert_eq!(CulturalOverrides::default().invalid_field(), None);
    }
}
