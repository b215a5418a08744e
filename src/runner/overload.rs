//! Back-pressure detection over consecutive health polls

use loadwire_core::HealthSnapshot;

/// Consecutive backlogged polls before warning
pub const DEFAULT_THRESHOLD: u32 = 3;

/// Counts consecutive polls with waiting workers
#[derive(Debug, Clone)]
pub struct OverloadDetector {
    threshold: u32,
    streak: u32,
}

impl Default for OverloadDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl OverloadDetector {
    /// Create a detector that fires after `threshold` consecutive polls
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            streak: 0,
        }
    }

    /// Feed one poll; returns true while the generator counts as overloaded
    pub fn observe(&mut self, snapshot: &HealthSnapshot) -> bool {
        if snapshot.is_backlogged() {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
        }
        self.streak >= self.threshold
    }

    /// Current run of backlogged polls
    pub fn streak(&self) -> u32 {
        self.streak
    }
}
