//! Percent-complete progress reporting for long loops

use tracing::info;

/// Logs once per crossed 10% step of a known amount of work
pub struct Percent {
    stage: &'static str,
    total: u64,
    next_step: u64,
    reported: u32,
}

impl Percent {
    pub fn new(stage: &'static str, total: u64) -> Self {
        let mut percent = Self {
            stage,
            total,
            next_step: 0,
            reported: 0,
        };
        percent.next_step = percent.threshold(1);
        percent
    }

    fn threshold(&self, tenth: u32) -> u64 {
        (self.total * tenth as u64).div_ceil(10)
    }

    /// Report that `current` units are done
    pub fn print_status(&mut self, current: u64) {
        while self.reported < 10 && current + 1 >= self.next_step {
            self.reported += 1;
            info!(stage = self.stage, "{}%", self.reported * 10);
            self.next_step = self.threshold(self.reported + 1);
        }
    }

    /// Last reported percentage
    pub fn reported_percent(&self) -> u32 {
        self.reported * 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_each_step_once() {
        let mut progress = Percent::new("test", 100);
        progress.print_status(0);
        assert_eq!(progress.reported_percent(), 0);
        progress.print_status(9);
        assert_eq!(progress.reported_percent(), 10);
        progress.print_status(9);
        assert_eq!(progress.reported_percent(), 10);
        progress.print_status(54);
        assert_eq!(progress.reported_percent(), 50);
        progress.print_status(99);
        assert_eq!(progress.reported_percent(), 100);
    }

    #[test]
    fn test_small_totals() {
        let mut progress = Percent::new("test", 3);
        progress.print_status(0);
        assert_eq!(progress.reported_percent(), 30);
        progress.print_status(2);
        assert_eq!(progress.reported_percent(), 100);
    }
}
