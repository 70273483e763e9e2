//! Ranking and insight summaries
//!
//! Sorts per-feature magnitudes for display, assigns colour bands and derives
//! the short insight summaries shown next to a ranking.
use crate::importance::FeatureAttribution;
use crate::shap::DirectionalImpact;
use crate::utils::{argsort_desc, display_name, truncate_label};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a magnitude is compared against the band thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scale {
    /// Importances summing to one: 0.15 / 0.10 / 0.05.
    Absolute,
    /// Magnitude over the largest magnitude: 0.8 / 0.6 / 0.4.
    Relative,
    /// Average 0-5 ratings: 4.0 / 3.0 / 2.0.
    Rating,
}

impl Scale {
    fn thresholds(&self) -> [f64; 3] {
        match self {
            Scale::Absolute => [0.15, 0.10, 0.05],
            Scale::Relative => [0.8, 0.6, 0.4],
            Scale::Rating => [4.0, 3.0, 2.0],
        }
    }
}

/// Colour band, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColorBand {
    Highest,
    High,
    Medium,
    Low,
}

impl ColorBand {
    /// Band of `value` on `scale`. `max` is the largest magnitude of the
    /// ranking and is only used by [`Scale::Relative`]. Comparisons are `>=`
    /// without rounding.
    pub fn classify(value: f64, scale: Scale, max: f64) -> ColorBand {
        let v = match scale {
            Scale::Relative if max > 0.0 => value / max,
            Scale::Relative => 0.0,
            _ => value,
        };
        let [highest, high, medium] = scale.thresholds();
        if v >= highest {
            ColorBand::Highest
        } else if v >= high {
            ColorBand::High
        } else if v >= medium {
            ColorBand::Medium
        } else {
            ColorBand::Low
        }
    }

    pub fn color(&self, scale: Scale) -> &'static str {
        match (scale, self) {
            (Scale::Rating, ColorBand::Highest) => "#4CAF50",
            (Scale::Rating, ColorBand::High) => "#FFC107",
            (Scale::Rating, ColorBand::Medium) => "#FF9800",
            (Scale::Rating, ColorBand::Low) => "#F44336",
            (_, ColorBand::Highest) => "#FF6B6B",
            (_, ColorBand::High) => "#FFA726",
            (_, ColorBand::Medium) => "#FFD54F",
            (_, ColorBand::Low) => "#81C784",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFactor {
    pub name: String,
    pub display_name: String,
    pub magnitude: f64,
    pub band: ColorBand,
    pub color: String,
    pub scale: Scale,
    /// One based position in the ranking.
    pub rank: usize,
}

/// Rank `(feature, magnitude)` pairs, largest first. Ties keep input order.
pub fn rank_entries(entries: &[(String, f64)], scale: Scale) -> Vec<RankedFactor> {
    let values: Vec<f64> = entries.iter().map(|(_, v)| *v).collect();
    let max = values.iter().copied().filter(|v| v.is_finite()).fold(0.0, f64::max);
    argsort_desc(&values)
        .into_iter()
        .enumerate()
        .map(|(position, i)| {
            let (name, magnitude) = &entries[i];
            let band = ColorBand::classify(*magnitude, scale, max);
            RankedFactor {
                name: name.clone(),
                display_name: truncate_label(display_name(name)),
                magnitude: *magnitude,
                band,
                color: band.color(scale).to_string(),
                scale,
                rank: position + 1,
            }
        })
        .collect()
}

/// Rank an attribution.
pub fn rank(attribution: &FeatureAttribution, scale: Scale) -> Vec<RankedFactor> {
    rank_entries(&attribution.entries, scale)
}

/// Model quality label from held-out accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelQuality {
    Excellent,
    Good,
    Fair,
}

impl ModelQuality {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.85 {
            ModelQuality::Excellent
        } else if accuracy >= 0.75 {
            ModelQuality::Good
        } else {
            ModelQuality::Fair
        }
    }
}

impl fmt::Display for ModelQuality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ModelQuality::Excellent => "Excellent",
            ModelQuality::Good => "Good",
            ModelQuality::Fair => "Fair",
        };
        write!(f, "{}", s)
    }
}

/// Recommended improvement strategy from the number of high impact factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyLabel {
    /// At most three.
    Focus,
    /// Four to six.
    Balanced,
    Systematic,
}

impl StrategyLabel {
    pub fn from_high_impact(count: usize) -> Self {
        match count {
            0..=3 => StrategyLabel::Focus,
            4..=6 => StrategyLabel::Balanced,
            _ => StrategyLabel::Systematic,
        }
    }
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            StrategyLabel::Focus => "Focus resources on the few high-impact factors",
            StrategyLabel::Balanced => "Balanced approach across multiple important factors",
            StrategyLabel::Systematic => "Many factors matter - systematic improvement needed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceInsight {
    pub top_factor: String,
    pub top_magnitude: f64,
    pub high_impact_count: usize,
    pub low_impact_count: usize,
    pub strategy: StrategyLabel,
    pub quality: ModelQuality,
    pub accuracy: f64,
    /// SHAP insights only.
    pub directional: Option<DirectionalImpact>,
}

impl ImportanceInsight {
    pub fn with_directional(mut self, directional: Option<DirectionalImpact>) -> Self {
        self.directional = directional;
        self
    }
}

/// Linear interpolation percentile, `q` in `[0, 100]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = (sorted.len() - 1) as f64 * q / 100.0;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Summarize an importance ranking. `None` for an empty ranking.
///
/// High impact means at least the High band on an absolute scale and at
/// least the 70th percentile of the magnitudes on a relative scale. Low impact
/// is the Low band.
pub fn summarize(ranked: &[RankedFactor], accuracy: f64) -> Option<ImportanceInsight> {
    let top = ranked.first()?;
    let high_impact_count = match top.scale {
        Scale::Relative => {
            let values: Vec<f64> = ranked.iter().map(|r| r.magnitude).collect();
            let threshold = percentile(&values, 70.0);
            values.iter().filter(|v| **v >= threshold).count()
        }
        _ => ranked.iter().filter(|r| r.band <= ColorBand::High).count(),
    };
    Some(ImportanceInsight {
        top_factor: top.name.clone(),
        top_magnitude: top.magnitude,
        high_impact_count,
        low_impact_count: ranked.iter().filter(|r| r.band == ColorBand::Low).count(),
        strategy: StrategyLabel::from_high_impact(high_impact_count),
        quality: ModelQuality::from_accuracy(accuracy),
        accuracy,
        directional: None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingInsight {
    pub best_factor: String,
    pub best_rating: f64,
    pub worst_factor: String,
    pub worst_rating: f64,
    /// Rated 4.0 or higher.
    pub excellent_count: usize,
    /// Rated below 2.5.
    pub poor_count: usize,
}

/// Summarize an average rating ranking. `None` for an empty ranking.
pub fn summarize_ratings(ranked: &[RankedFactor]) -> Option<RatingInsight> {
    let best = ranked.first()?;
    let worst = ranked.last()?;
    Some(RatingInsight {
        best_factor: best.name.clone(),
        best_rating: best.magnitude,
        worst_factor: worst.name.clone(),
        worst_rating: worst.magnitude,
        excellent_count: ranked.iter().filter(|r| r.magnitude >= 4.0).count(),
        poor_count: ranked.iter().filter(|r| r.magnitude < 2.5).count(),
    })
}
