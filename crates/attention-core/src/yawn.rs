//! Yawn detection by dwell time
//!
//! MAR must stay above the yawn threshold for `min_duration` seconds without a single
//! dip. Any frame at or below the threshold restarts the timer.

#[derive(Debug, Clone)]
pub struct YawnDetector {
    threshold: f64,
    min_duration: f64,
    elevated_since: Option<f64>,
    total: u64,
}

impl YawnDetector {
    pub fn new(threshold: f64, min_duration: f64) -> Self {
        Self {
            threshold,
            min_duration,
            elevated_since: None,
            total: 0,
        }
    }

    /// Returns true on the frame a yawn is registered.
    pub fn update(&mut self, mar: f64, ts: f64) -> bool {
        if mar <= self.threshold {
            self.elevated_since = None;
            return false;
        }
        match self.elevated_since {
            None => {
                self.elevated_since = Some(ts);
                false
            }
            Some(start) if ts - start >= self.min_duration => {
                self.total += 1;
                self.elevated_since = None;
                true
            }
            Some(_) => false,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn elevated_since(&self) -> Option<f64> {
        self.elevated_since
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS: f64 = 30.0;

    fn run(detector: &mut YawnDetector, start_frame: usize, mars: &[f64]) -> usize {
        mars.iter()
            .enumerate()
            .filter(|&(i, &m)| detector.update(m, (start_frame + i) as f64 / FPS))
            .count()
    }

    #[test]
    fn sustained_elevation_registers_once() {
        let mut d = YawnDetector::new(0.75, 1.5);
        // 1.6 s at 30 fps
        let yawns = run(&mut d, 0, &[0.80; 48]);
        assert_eq!(yawns, 1);
        assert_eq!(d.total(), 1);
    }

    #[test]
    fn dip_restarts_the_timer() {
        let mut d = YawnDetector::new(0.75, 1.5);
        // 1.0 s elevated, one dip, then 1.4 s elevated: never 1.5 s uninterrupted
        let mut mars = vec![0.80; 30];
        mars.push(0.50);
        mars.extend(std::iter::repeat(0.80).take(43));
        assert_eq!(run(&mut d, 0, &mars), 0);

        // continuing the elevation past 1.5 s after the dip registers one
        let more = run(&mut d, mars.len(), &[0.80; 4]);
        assert_eq!(more, 1);
    }

    #[test]
    fn equal_to_threshold_is_not_elevated() {
        let mut d = YawnDetector::new(0.75, 1.5);
        assert!(!d.update(0.80, 0.0));
        assert_eq!(d.elevated_since(), Some(0.0));
        assert!(!d.update(0.75, 0.1));
        assert_eq!(d.elevated_since(), None);
    }
}
