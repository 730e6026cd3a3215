//! Encode progress tracking

/// Converts presentation timestamps into a percentage of the expected total
/// and reports a value only when it strictly increases. Starts at 0, so 0%
/// itself is never reported.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_us: u64,
    last: u8,
}

impl ProgressTracker {
    pub fn new(total_us: u64) -> Self {
        Self {
            total_us,
            last: 0,
        }
    }

    /// Percentage reached at `presentation_time_us`, if it is new
    pub fn update(&mut self, presentation_time_us: u64) -> Option<u8> {
        if self.total_us == 0 {
            return None;
        }
        let percent = (presentation_time_us.saturating_mul(100) / self.total_us).min(100) as u8;
        self.publish(percent)
    }

    /// Mark the run complete; yields 100 unless it was already reported
    pub fn complete(&mut self) -> Option<u8> {
        self.publish(100)
    }

    pub fn last(&self) -> u8 {
        self.last
    }

    fn publish(&mut self, percent: u8) -> Option<u8> {
        if percent <= self.last {
            return None;
        }
        self.last = percent;
        Some(percent)
    }
}
