//! Blink detection by run length
//!
//! A blink is a run of at least `min_frames` consecutive frames with smoothed EAR below
//! the low threshold. It is registered on the frame where EAR comes back up, never
//! while the run is still going.

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    min_frames: u32,
    frames_below: u32,
    total: u64,
}

impl BlinkDetector {
    pub fn new(min_frames: u32) -> Self {
        Self {
            min_frames: min_frames.max(1),
            frames_below: 0,
            total: 0,
        }
    }

    /// Returns true on the single frame that closes a qualifying run.
    pub fn update(&mut self, ear: f64, low_threshold: f64) -> bool {
        if ear < low_threshold {
            self.frames_below = self.frames_below.saturating_add(1);
            return false;
        }
        let blink = self.frames_below >= self.min_frames;
        if blink {
            self.total += 1;
        }
        self.frames_below = 0;
        blink
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn frames_below(&self) -> u32 {
        self.frames_below
    }
}
