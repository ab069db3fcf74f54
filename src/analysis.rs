//! Whole-session statistics over flattened frame rows.

use std::fmt::Write as _;

use attention_core::AttentionCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::operations::frames::FrameRecord;

pub const DEFAULT_MIN_DISTRACTION_FRAMES: usize = 30;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("no frames to analyze")]
    Empty,
    #[error("frame {0} carries a non-finite value")]
    NonFinite(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub duration_seconds: f64,
    pub duration_formatted: String,
    pub total_frames: usize,
    pub fps_average: f64,
    pub attention_distribution: AttentionDistribution,
    pub score_statistics: ScoreStatistics,
    pub total_blinks: usize,
    pub total_yawns: usize,
    pub distraction_periods: Vec<DistractionPeriod>,
    pub metric_averages: MetricAverages,
}

/// Share of frames per category, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionDistribution {
    pub concentrated: f64,
    pub low_attention: f64,
    pub not_concentrated: f64,
}

impl AttentionDistribution {
    pub fn get(&self, category: AttentionCategory) -> f64 {
        match category {
            AttentionCategory::Concentrated => self.concentrated,
            AttentionCategory::LowAttention => self.low_attention,
            AttentionCategory::NotConcentrated => self.not_concentrated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAverages {
    pub ear: f64,
    pub perclos: f64,
    pub blinks_per_minute: f64,
    pub head_yaw: f64,
    pub head_pitch: f64,
    pub gaze_focus: f64,
    pub gaze_dispersion: f64,
    pub mar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistractionPeriod {
    pub start_frame: u64,
    pub end_frame: u64,
    pub duration_frames: usize,
    pub start_time: f64,
    pub end_time: f64,
}

/// Summarises frames in the order given.
pub fn analyze_frames(
    frames: &[FrameRecord],
    min_distraction_frames: usize,
) -> Result<SessionReport, AnalysisError> {
    if frames.is_empty() {
        return Err(AnalysisError::Empty);
    }
    if let Some(bad) = frames.iter().find(|f| !is_finite_row(f)) {
        return Err(AnalysisError::NonFinite(bad.frame_number));
    }

    let total = frames.len();
    let duration = frames
        .iter()
        .map(|f| f.elapsed_seconds)
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0);
    let fps_average = if duration > 0.0 {
        total as f64 / duration
    } else {
        0.0
    };

    let scores: Vec<f64> = frames.iter().map(|f| f.attention_score).collect();

    Ok(SessionReport {
        duration_seconds: duration,
        duration_formatted: format_duration(duration),
        total_frames: total,
        fps_average,
        attention_distribution: distribution(frames),
        score_statistics: score_statistics(&scores),
        total_blinks: frames.iter().filter(|f| f.is_blink).count(),
        total_yawns: frames.iter().filter(|f| f.is_yawn).count(),
        distraction_periods: distraction_periods(frames, min_distraction_frames),
        metric_averages: metric_averages(frames),
    })
}

fn is_finite_row(f: &FrameRecord) -> bool {
    [
        f.elapsed_seconds,
        f.attention_score,
        f.ear,
        f.perclos,
        f.blinks_per_minute,
        f.head_yaw,
        f.head_pitch,
        f.gaze_focus,
        f.gaze_dispersion,
        f.mar,
    ]
    .iter()
    .all(|v| v.is_finite())
}

/// Whole seconds as `H:MM:SS`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn distribution(frames: &[FrameRecord]) -> AttentionDistribution {
    let total = frames.len() as f64;
    let pct = |category: AttentionCategory| {
        frames
            .iter()
            .filter(|f| f.attention_level == category)
            .count() as f64
            * 100.0
            / total
    };
    AttentionDistribution {
        concentrated: pct(AttentionCategory::Concentrated),
        low_attention: pct(AttentionCategory::LowAttention),
        not_concentrated: pct(AttentionCategory::NotConcentrated),
    }
}

fn score_statistics(scores: &[f64]) -> ScoreStatistics {
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    // sample standard deviation
    let std = if scores.len() < 2 {
        0.0
    } else {
        (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    ScoreStatistics {
        mean,
        std,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median,
    }
}

fn metric_averages(frames: &[FrameRecord]) -> MetricAverages {
    let n = frames.len() as f64;
    let avg = |f: fn(&FrameRecord) -> f64| frames.iter().map(f).sum::<f64>() / n;
    MetricAverages {
        ear: avg(|f| f.ear),
        perclos: avg(|f| f.perclos),
        blinks_per_minute: avg(|f| f.blinks_per_minute),
        head_yaw: avg(|f| f.head_yaw.abs()),
        head_pitch: avg(|f| f.head_pitch.abs()),
        gaze_focus: avg(|f| f.gaze_focus),
        gaze_dispersion: avg(|f| f.gaze_dispersion),
        mar: avg(|f| f.mar),
    }
}

/// Maximal runs of NOT_CONCENTRATED frames at least `min_frames` long.
pub fn distraction_periods(frames: &[FrameRecord], min_frames: usize) -> Vec<DistractionPeriod> {
    let mut periods = Vec::new();
    let mut start: Option<usize> = None;

    let close = |from: usize, to: usize, periods: &mut Vec<DistractionPeriod>| {
        let len = to - from + 1;
        if len >= min_frames {
            periods.push(DistractionPeriod {
                start_frame: frames[from].frame_number,
                end_frame: frames[to].frame_number,
                duration_frames: len,
                start_time: frames[from].elapsed_seconds,
                end_time: frames[to].elapsed_seconds,
            });
        }
    };

    for (i, frame) in frames.iter().enumerate() {
        let distracted = frame.attention_level == AttentionCategory::NotConcentrated;
        match (distracted, start) {
            (true, None) => start = Some(i),
            (false, Some(from)) => {
                close(from, i - 1, &mut periods);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(from) = start {
        close(from, frames.len() - 1, &mut periods);
    }

    periods
}

pub fn render_report(report: &SessionReport) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "ATTENTION REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Duration: {}", report.duration_formatted);
    let _ = writeln!(out, "Total frames: {}", report.total_frames);
    let _ = writeln!(out, "Average FPS: {:.1}", report.fps_average);
    let _ = writeln!(out);
    let _ = writeln!(out, "Attention distribution:");
    for category in AttentionCategory::ALL {
        let _ = writeln!(
            out,
            "  {}: {:.1}%",
            category,
            report.attention_distribution.get(category)
        );
    }
    let _ = writeln!(out);
    let s = &report.score_statistics;
    let _ = writeln!(
        out,
        "Score: mean {:.1}, std {:.1}, min {:.1}, max {:.1}, median {:.1}",
        s.mean, s.std, s.min, s.max, s.median
    );
    let _ = writeln!(
        out,
        "Blinks: {}  Yawns: {}",
        report.total_blinks, report.total_yawns
    );
    let _ = writeln!(out);
    if report.distraction_periods.is_empty() {
        let _ = writeln!(out, "No sustained distraction periods.");
    } else {
        let _ = writeln!(out, "Distraction periods:");
        for p in &report.distraction_periods {
            let _ = writeln!(
                out,
                "  frames {}-{} ({} frames, {:.1}s-{:.1}s)",
                p.start_frame, p.end_frame, p.duration_frames, p.start_time, p.end_time
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: u64, level: AttentionCategory, score: f64) -> FrameRecord {
        FrameRecord {
            frame_number: n,
            timestamp: n as f64 / 10.0,
            elapsed_seconds: n as f64 / 10.0,
            attention_score: score,
            attention_level: level,
            ear: 0.3,
            perclos: 0.1,
            blinks_per_minute: 12.0,
            head_yaw: if n % 2 == 0 { -10.0 } else { 10.0 },
            head_pitch: -4.0,
            gaze_focus: 0.8,
            gaze_dispersion: 20.0,
            mar: 0.3,
            is_blink: n % 5 == 0,
            is_yawn: false,
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(analyze_frames(&[], 30), Err(AnalysisError::Empty));
    }

    #[test]
    fn non_finite_row_is_rejected() {
        let mut bad = row(4, AttentionCategory::Concentrated, 90.0);
        bad.attention_score = f64::NAN;
        let frames = vec![row(3, AttentionCategory::Concentrated, 90.0), bad];
        assert_eq!(analyze_frames(&frames, 30), Err(AnalysisError::NonFinite(4)));
    }

    #[test]
    fn single_frame_has_zero_std_and_fps() {
        let report = analyze_frames(&[row(0, AttentionCategory::Concentrated, 88.0)], 30)
            .expect("report");
        assert_eq!(report.duration_seconds, 0.0);
        assert_eq!(report.fps_average, 0.0);
        assert_eq!(report.score_statistics.std, 0.0);
        assert_eq!(report.score_statistics.median, 88.0);
        assert_eq!(report.attention_distribution.concentrated, 100.0);
        assert_eq!(report.duration_formatted, "0:00:00");
    }

    #[test]
    fn statistics_and_averages() {
        let frames = vec![
            row(1, AttentionCategory::Concentrated, 90.0),
            row(2, AttentionCategory::LowAttention, 60.0),
            row(3, AttentionCategory::LowAttention, 70.0),
            row(4, AttentionCategory::NotConcentrated, 40.0),
        ];
        let report = analyze_frames(&frames, 30).expect("report");
        let s = report.score_statistics;
        assert!((s.mean - 65.0).abs() < 1e-9);
        assert!((s.std - (1300.0_f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!((s.min, s.max, s.median), (40.0, 90.0, 65.0));
        assert_eq!(report.attention_distribution.low_attention, 50.0);
        assert_eq!(report.attention_distribution.not_concentrated, 25.0);
        assert!((report.fps_average - 10.0).abs() < 1e-9);
        // yaw alternates sign, averaged as a magnitude
        assert_eq!(report.metric_averages.head_yaw, 10.0);
        assert_eq!(report.metric_averages.head_pitch, 4.0);
    }

    #[test]
    fn blink_total_counts_flagged_rows() {
        let frames: Vec<_> = (0..20)
            .map(|n| row(n, AttentionCategory::Concentrated, 90.0))
            .collect();
        let report = analyze_frames(&frames, 30).expect("report");
        assert_eq!(report.total_blinks, 4);
        assert_eq!(report.total_yawns, 0);
    }

    #[test]
    fn distraction_runs_respect_minimum_length() {
        let mut frames = Vec::new();
        let mut n = 0;
        let mut push = |level, count| {
            for _ in 0..count {
                frames.push(row(n, level, 50.0));
                n += 1;
            }
        };
        push(AttentionCategory::Concentrated, 5);
        push(AttentionCategory::NotConcentrated, 29);
        push(AttentionCategory::LowAttention, 3);
        push(AttentionCategory::NotConcentrated, 30);
        push(AttentionCategory::Concentrated, 2);
        push(AttentionCategory::NotConcentrated, 31);

        let periods = distraction_periods(&frames, 30);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].start_frame, 37);
        assert_eq!(periods[0].end_frame, 66);
        assert_eq!(periods[0].duration_frames, 30);
        // a run still open at the end is closed on the last frame
        assert_eq!(periods[1].start_frame, 69);
        assert_eq!(periods[1].end_frame, 99);
        assert!((periods[1].end_time - 9.9).abs() < 1e-9);
    }

    #[test]
    fn duration_formats_as_hours_minutes_seconds() {
        assert_eq!(format_duration(65.9), "0:01:05");
        assert_eq!(format_duration(3_725.0), "1:02:05");
        assert_eq!(format_duration(-3.0), "0:00:00");
    }

    #[test]
    fn report_text_lists_categories_and_periods() {
        let frames: Vec<_> = (0..40)
            .map(|n| row(n, AttentionCategory::NotConcentrated, 30.0))
            .collect();
        let text = render_report(&analyze_frames(&frames, 30).expect("report"));
        assert!(text.contains("NOT_CONCENTRATED: 100.0%"));
        assert!(text.contains("frames 0-39 (40 frames"));
    }
}
