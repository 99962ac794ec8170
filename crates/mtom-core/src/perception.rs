//! Calibrated map from an offer ratio to the perception it is expected to produce.

use serde::Serialize;
use std::fmt;

/// Tolerance applied at band boundaries so that e.g. `2 / 10` lands in the `<= 0.2` band.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Coarse label of a perception band, ordered from most generous to most selfish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionLabel {
    ExtremelyGenerous,
    VeryGenerous,
    Generous,
    Fair,
    Selfish,
    VerySelfish,
    ExtremelySelfish,
}

impl PerceptionLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            PerceptionLabel::ExtremelyGenerous => "extremely_generous",
            PerceptionLabel::VeryGenerous => "very_generous",
            PerceptionLabel::Generous => "generous",
            PerceptionLabel::Fair => "fair",
            PerceptionLabel::Selfish => "selfish",
            PerceptionLabel::VerySelfish => "very_selfish",
            PerceptionLabel::ExtremelySelfish => "extremely_selfish",
        }
    }
}

impl fmt::Display for PerceptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the calibration table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionBand {
    pub label: PerceptionLabel,
    /// Inclusive upper bound on the adjusted ratio.
    pub upper: f64,
    pub warmth_mean: f64,
    pub warmth_std: f64,
    pub competence_mean: f64,
    pub competence_std: f64,
}

const fn band(
    label: PerceptionLabel,
    upper: f64,
    warmth_mean: f64,
    competence_mean: f64,
    std: f64,
) -> PerceptionBand {
    PerceptionBand {
        label,
        upper,
        warmth_mean,
        warmth_std: std,
        competence_mean,
        competence_std: std,
    }
}

/// Default calibration: warmth falls and competence rises as the agent keeps more.
pub const CALIBRATED_BANDS: [PerceptionBand; 7] = [
    band(PerceptionLabel::ExtremelyGenerous, 0.20, 0.95, 0.15, 0.30),
    band(PerceptionLabel::VeryGenerous, 0.30, 0.80, 0.20, 0.30),
    band(PerceptionLabel::Generous, 0.45, 0.60, 0.40, 0.25),
    band(PerceptionLabel::Fair, 0.55, 0.50, 0.60, 0.20),
    band(PerceptionLabel::Selfish, 0.70, 0.30, 0.70, 0.25),
    band(PerceptionLabel::VerySelfish, 0.85, 0.10, 0.90, 0.30),
    band(PerceptionLabel::ExtremelySelfish, f64::INFINITY, 0.05, 0.95, 0.30),
];

/// Predicted perception distribution for one offer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerceptionCategory {
    pub warmth_mean: f64,
    pub warmth_std: f64,
    pub competence_mean: f64,
    pub competence_std: f64,
    pub label: PerceptionLabel,
    /// Offer ratio after the fairness-anchor shift.
    pub adjusted_ratio: f64,
}

/// Stateless perception predictor parameterised by cultural norms.
#[derive(Debug, Clone)]
pub struct PerceptionModel {
    fairness_anchor: f64,
    warmth_bias: f64,
}

impl PerceptionModel {
    pub fn new(fairness_anchor: f64, warmth_bias: f64) -> Self {
        Self {
            fairness_anchor,
            warmth_bias,
        }
    }

    pub fn fairness_anchor(&self) -> f64 {
        self.fairness_anchor
    }

    pub fn warmth_bias(&self) -> f64 {
        self.warmth_bias
    }

    pub fn adjusted_ratio(&self, offer_for_self: u32, total_resources: u32) -> f64 {
        let ratio = if total_resources == 0 {
            0.5
        } else {
            f64::from(offer_for_self) / f64::from(total_resources)
        };
        ratio - (self.fairness_anchor - 0.5)
    }

    pub fn predict(&self, offer_for_self: u32, total_resources: u32) -> PerceptionCategory {
        let adjusted_ratio = self.adjusted_ratio(offer_for_self, total_resources);
        let band = band_for(adjusted_ratio);
        PerceptionCategory {
            warmth_mean: (band.warmth_mean + self.warmth_bias).clamp(0.01, 0.99),
            warmth_std: band.warmth_std,
            competence_mean: band.competence_mean,
            competence_std: band.competence_std,
            label: band.label,
            adjusted_ratio,
        }
    }

}

/// First band whose upper bound covers the ratio; the open-ended last band catches the rest.
fn band_for(adjusted_ratio: f64) -> PerceptionBand {
    let last = CALIBRATED_BANDS[CALIBRATED_BANDS.len() - 1];
    CALIBRATED_BANDS
        .iter()
        .find(|band| adjusted_ratio <= band.upper + BOUNDARY_EPSILON)
        .copied()
        .unwrap_or(last)
}

impl Default for PerceptionModel {
    fn default() -> Self {
        Self::new(0.5, 0.0)
    }
}
