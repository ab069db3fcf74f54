//! One-shot EAR calibration
//!
//! Collects the first smoothed EAR samples of a subject. Once enough are in, the
//! highest share of them (mostly open-eye frames) is averaged into a baseline and the
//! personalised thresholds replace the defaults for good.

use serde::Serialize;

use crate::config::{CalibrationConfig, Thresholds};
use crate::types::EarThresholds;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationState {
    pub samples_collected: usize,
    pub samples_required: usize,
    pub complete: bool,
    pub baseline: Option<f64>,
    pub thresholds: EarThresholds,
}

#[derive(Debug, Clone)]
pub struct Calibrator {
    cfg: CalibrationConfig,
    samples: Vec<f64>,
    baseline: Option<f64>,
    thresholds: EarThresholds,
}

impl Calibrator {
    pub fn new(cfg: &CalibrationConfig, defaults: &Thresholds) -> Self {
        Self {
            cfg: cfg.clone(),
            samples: Vec::with_capacity(cfg.sample_count),
            baseline: None,
            thresholds: EarThresholds {
                concentrated: defaults.ear_concentrated,
                low: defaults.ear_low,
                severe: defaults.ear_severe,
            },
        }
    }

    /// Adds a sample. Returns true only on the call that completes calibration.
    pub fn add_sample(&mut self, ear: f64) -> bool {
        if self.baseline.is_some() {
            return false;
        }
        self.samples.push(ear);
        if self.samples.len() < self.cfg.sample_count {
            return false;
        }

        let mut sorted = std::mem::take(&mut self.samples);
        sorted.sort_by(|a, b| b.total_cmp(a));
        let keep = ((sorted.len() as f64 * self.cfg.top_fraction) as usize).max(1);
        let top = &sorted[..keep.min(sorted.len())];
        let mean = top.iter().sum::<f64>() / top.len() as f64;
        let baseline = mean.max(self.cfg.baseline_floor);

        self.thresholds = EarThresholds {
            concentrated: baseline * self.cfg.concentrated_pct,
            low: baseline * self.cfg.low_pct,
            severe: baseline * self.cfg.severe_pct,
        };
        self.baseline = Some(baseline);
        self.samples = sorted;

        tracing::debug!(
            baseline,
            concentrated = self.thresholds.concentrated,
            low = self.thresholds.low,
            severe = self.thresholds.severe,
            "ear calibration complete"
        );
        true
    }

    pub fn is_complete(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// Thresholds in effect: personalised once complete, defaults before.
    pub fn thresholds(&self) -> EarThresholds {
        self.thresholds
    }

    pub fn state(&self) -> CalibrationState {
        CalibrationState {
            samples_collected: self.samples.len().min(self.cfg.sample_count),
            samples_required: self.cfg.sample_count,
            complete: self.is_complete(),
            baseline: self.baseline,
            thresholds: self.thresholds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrator() -> Calibrator {
        Calibrator::new(&CalibrationConfig::default(), &Thresholds::default())
    }

    #[test]
    fn sixty_identical_samples_give_exact_thresholds() {
        let mut c = calibrator();
        for i in 0..59 {
            assert!(!c.add_sample(0.30), "completed early at sample {i}");
            assert!(!c.is_complete());
        }
        assert!(c.add_sample(0.30));
        assert!((c.baseline().unwrap_or_default() - 0.30).abs() < 1e-12);
        let t = c.thresholds();
        assert!((t.concentrated - 0.255).abs() < 1e-12);
        assert!((t.low - 0.21).abs() < 1e-12);
        assert!((t.severe - 0.165).abs() < 1e-12);
    }

    #[test]
    fn completes_once_and_never_reverts() {
        let mut c = calibrator();
        for _ in 0..60 {
            c.add_sample(0.30);
        }
        let before = c.thresholds();
        for _ in 0..200 {
            assert!(!c.add_sample(0.05));
        }
        assert!(c.is_complete());
        assert_eq!(c.thresholds(), before);
    }

    #[test]
    fn baseline_uses_top_seventy_percent() {
        let mut c = calibrator();
        // 42 open-eye samples and 18 closed ones: the top 42 are all 0.32
        for _ in 0..42 {
            c.add_sample(0.32);
        }
        for _ in 0..18 {
            c.add_sample(0.05);
        }
        assert!((c.baseline().unwrap_or_default() - 0.32).abs() < 1e-12);
    }

    #[test]
    fn baseline_is_floored() {
        let mut c = calibrator();
        for _ in 0..60 {
            c.add_sample(0.12);
        }
        assert_eq!(c.baseline(), Some(0.20));
        assert!((c.thresholds().low - 0.14).abs() < 1e-12);
    }

    #[test]
    fn defaults_apply_before_completion() {
        let c = calibrator();
        let t = c.thresholds();
        assert_eq!((t.concentrated, t.low, t.severe), (0.24, 0.19, 0.16));
        assert_eq!(c.state().samples_required, 60);
    }
}
