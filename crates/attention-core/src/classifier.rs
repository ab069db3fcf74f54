//! Rule-based attention classifier
//!
//! Every metric is mapped to a sub-state and a 0-100 sub-score by a three-band rule:
//! beyond the concentrated bound it scores 100, inside the low band the score is
//! interpolated between the band's endpoint scores, past the band edge a
//! metric-specific severe law applies. Most metrics share one evaluator driven by a
//! [`BandRule`]; blink rate (two-sided) and MAR (yawn override) are special cases.
//!
//! The weighted sum of sub-scores is then passed through the decision ladder:
//! looking away, then severe count / low score, then the low-attention checks.

use std::collections::BTreeMap;

use crate::config::{AttentionConfig, Thresholds};
use crate::types::{
    AttentionCategory, AttentionResult, ClassificationDetail, EarThresholds, Metric,
    MetricSnapshot, SubState,
};

const MIN_BAND_WIDTH: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Score at each end of the low band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowBand {
    pub at_concentrated: f64,
    pub at_severe: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SevereLaw {
    Fixed(f64),
    /// `max(floor, value / reference * scale)`
    Proportional { reference: f64, scale: f64, floor: f64 },
    /// `max(floor, base - (value - edge) * slope)`
    Excess { base: f64, slope: f64, floor: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct BandRule {
    pub metric: Metric,
    pub label: &'static str,
    pub polarity: Polarity,
    /// Bound beyond which the metric counts as concentrated
    pub concentrated: f64,
    /// Far edge of the low band
    pub band_edge: f64,
    pub low_band: LowBand,
    pub severe: SevereLaw,
    /// Compare the absolute value (head angles)
    pub magnitude: bool,
    pub format: fn(f64) -> String,
}

impl BandRule {
    pub fn evaluate(&self, raw: f64) -> ClassificationDetail {
        let value = if self.magnitude { raw.abs() } else { raw };
        let shown = (self.format)(raw);

        let (concentrated, in_band) = match self.polarity {
            Polarity::HigherIsBetter => (value > self.concentrated, value >= self.band_edge),
            Polarity::LowerIsBetter => (value < self.concentrated, value <= self.band_edge),
        };

        if concentrated {
            return detail(SubState::Concentrated, 100.0, format!("{} {shown} ok", self.label));
        }

        if in_band {
            let width = (self.concentrated - self.band_edge).abs().max(MIN_BAND_WIDTH);
            let depth = (value - self.concentrated).abs() / width;
            let score = self.low_band.at_concentrated
                + depth * (self.low_band.at_severe - self.low_band.at_concentrated);
            return detail(SubState::Low, score, format!("{} {shown} reduced", self.label));
        }

        let score = match self.severe {
            SevereLaw::Fixed(score) => score,
            SevereLaw::Proportional {
                reference,
                scale,
                floor,
            } => (value / reference.max(0.001) * scale).max(floor),
            SevereLaw::Excess { base, slope, floor } => {
                (base - (value - self.band_edge) * slope).max(floor)
            }
        };
        detail(SubState::Severe, score, format!("{} {shown} out of range", self.label))
    }
}

fn detail(state: SubState, score: f64, reason: String) -> ClassificationDetail {
    ClassificationDetail {
        state,
        score: score.clamp(0.0, 100.0),
        reason,
    }
}

fn ratio(v: f64) -> String {
    format!("{v:.3}")
}

fn percent(v: f64) -> String {
    format!("{:.1}%", v * 100.0)
}

fn degrees(v: f64) -> String {
    format!("{v:.1}°")
}

/// Band rules for the seven metrics that share the generic evaluator.
pub fn band_rules(t: &Thresholds, ear: EarThresholds) -> [BandRule; 7] {
    let head_excess = SevereLaw::Excess {
        base: 30.0,
        slope: 2.0,
        floor: 10.0,
    };
    [
        BandRule {
            metric: Metric::Ear,
            label: "EAR",
            polarity: Polarity::HigherIsBetter,
            concentrated: ear.concentrated,
            band_edge: ear.low,
            low_band: LowBand {
                at_concentrated: 90.0,
                at_severe: 55.0,
            },
            severe: SevereLaw::Proportional {
                reference: ear.severe,
                scale: 50.0,
                floor: 20.0,
            },
            magnitude: false,
            format: ratio,
        },
        BandRule {
            metric: Metric::Perclos,
            label: "PERCLOS",
            polarity: Polarity::LowerIsBetter,
            concentrated: t.perclos_concentrated,
            band_edge: t.perclos_severe,
            low_band: LowBand {
                at_concentrated: 85.0,
                at_severe: 40.0,
            },
            severe: SevereLaw::Fixed(25.0),
            magnitude: false,
            format: percent,
        },
        BandRule {
            metric: Metric::Yaw,
            label: "yaw",
            polarity: Polarity::LowerIsBetter,
            concentrated: t.yaw_concentrated,
            band_edge: t.yaw_severe,
            low_band: LowBand {
                at_concentrated: 75.0,
                at_severe: 30.0,
            },
            severe: head_excess,
            magnitude: true,
            format: degrees,
        },
        BandRule {
            metric: Metric::Pitch,
            label: "pitch",
            polarity: Polarity::LowerIsBetter,
            concentrated: t.pitch_concentrated,
            band_edge: t.pitch_severe,
            low_band: LowBand {
                at_concentrated: 75.0,
                at_severe: 30.0,
            },
            severe: head_excess,
            magnitude: true,
            format: degrees,
        },
        BandRule {
            metric: Metric::GazeFocus,
            label: "gaze focus",
            polarity: Polarity::HigherIsBetter,
            concentrated: t.gaze_focus_concentrated,
            band_edge: t.gaze_focus_severe,
            low_band: LowBand {
                at_concentrated: 85.0,
                at_severe: 45.0,
            },
            severe: SevereLaw::Fixed(30.0),
            magnitude: false,
            format: |v| format!("{:.0}%", v * 100.0),
        },
        BandRule {
            metric: Metric::GazeDispersion,
            label: "gaze dispersion",
            polarity: Polarity::LowerIsBetter,
            concentrated: t.gaze_dispersion_concentrated,
            band_edge: t.gaze_dispersion_severe,
            low_band: LowBand {
                at_concentrated: 85.0,
                at_severe: 45.0,
            },
            severe: SevereLaw::Fixed(30.0),
            magnitude: false,
            format: ratio,
        },
        BandRule {
            metric: Metric::EyeOpening,
            label: "eye opening",
            polarity: Polarity::HigherIsBetter,
            concentrated: t.eye_opening_concentrated,
            band_edge: t.eye_opening_severe,
            low_band: LowBand {
                at_concentrated: 85.0,
                at_severe: 55.0,
            },
            severe: SevereLaw::Fixed(30.0),
            magnitude: false,
            format: ratio,
        },
    ]
}

/// Two-sided rule: too few blinks is a mild signal, too many is the severe one.
pub fn classify_blink_rate(rate: f64, t: &Thresholds) -> ClassificationDetail {
    let shown = format!("{rate:.0}/min");
    if (t.blink_concentrated_min..=t.blink_concentrated_max).contains(&rate) {
        return detail(SubState::Concentrated, 100.0, format!("blink rate {shown} ok"));
    }
    if rate < t.blink_concentrated_min {
        let score = (rate / t.blink_concentrated_min.max(1.0) * 80.0).max(50.0);
        return detail(SubState::Low, score, format!("blink rate {shown} low"));
    }
    if rate <= t.blink_severe {
        let width = (t.blink_severe - t.blink_concentrated_max).max(MIN_BAND_WIDTH);
        let depth = (rate - t.blink_concentrated_max) / width;
        return detail(SubState::Low, 80.0 - depth * 35.0, format!("blink rate {shown} high"));
    }
    detail(SubState::Severe, 35.0, format!("blink rate {shown} very high"))
}

/// A detected yawn overrides the raw MAR.
pub fn classify_mar(mar: f64, is_yawn: bool, t: &Thresholds) -> ClassificationDetail {
    if is_yawn {
        return detail(SubState::Severe, 30.0, format!("MAR {mar:.3} yawn"));
    }
    if mar > t.mar_speaking {
        return detail(SubState::Concentrated, 90.0, format!("MAR {mar:.3} speaking"));
    }
    detail(SubState::Concentrated, 100.0, format!("MAR {mar:.3} ok"))
}

/// Per-metric details for one snapshot.
pub fn evaluate(snapshot: &MetricSnapshot, cfg: &AttentionConfig) -> BTreeMap<Metric, ClassificationDetail> {
    let t = &cfg.thresholds;
    let mut details = BTreeMap::new();
    for rule in band_rules(t, snapshot.ear_thresholds) {
        let value = match rule.metric {
            Metric::Ear => snapshot.ear,
            Metric::Perclos => snapshot.perclos,
            Metric::Yaw => snapshot.yaw,
            Metric::Pitch => snapshot.pitch,
            Metric::GazeFocus => snapshot.gaze_focus,
            Metric::GazeDispersion => snapshot.gaze_dispersion,
            Metric::EyeOpening => snapshot.eye_opening,
            Metric::BlinkRate | Metric::Mar => continue,
        };
        details.insert(rule.metric, rule.evaluate(value));
    }
    details.insert(Metric::BlinkRate, classify_blink_rate(snapshot.blink_rate, t));
    details.insert(Metric::Mar, classify_mar(snapshot.mar, snapshot.is_yawn, t));
    details
}

/// Weighted sum of sub-scores, clamped to [0, 100].
pub fn weighted_score(details: &BTreeMap<Metric, ClassificationDetail>, cfg: &AttentionConfig) -> f64 {
    details
        .iter()
        .map(|(metric, d)| d.score * cfg.weights.for_metric(*metric))
        .sum::<f64>()
        .clamp(0.0, 100.0)
}

/// Applies the decision ladder to a detail map.
pub fn decide(details: BTreeMap<Metric, ClassificationDetail>, cfg: &AttentionConfig) -> AttentionResult {
    let d = &cfg.decision;
    let mut score = weighted_score(&details, cfg);
    let severe_count = details.values().filter(|x| x.state == SubState::Severe).count();
    let low_count = details.values().filter(|x| x.state == SubState::Low).count();
    let is_severe = |m: Metric| details.get(&m).is_some_and(|x| x.state == SubState::Severe);
    let looking_away = is_severe(Metric::Yaw) || is_severe(Metric::Pitch);

    let category = if looking_away {
        score = score.min(d.looking_away_score_cap);
        AttentionCategory::NotConcentrated
    } else if severe_count >= d.not_concentrated_severe_count || score < d.not_concentrated_score {
        AttentionCategory::NotConcentrated
    } else if severe_count >= d.low_attention_severe_count
        || low_count >= d.low_attention_low_count
        || score < d.low_attention_score
    {
        AttentionCategory::LowAttention
    } else {
        AttentionCategory::Concentrated
    };

    AttentionResult {
        category,
        is_concentrated: category == AttentionCategory::Concentrated,
        score,
        details,
        severe_count,
        low_count,
        looking_away,
    }
}

pub fn classify(snapshot: &MetricSnapshot, cfg: &AttentionConfig) -> AttentionResult {
    decide(evaluate(snapshot, cfg), cfg)
}
