use std::time::Duration;

/// Cursor blink phase. On for the first half of each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkTimer {
    period: Duration,
    phase: Duration,
}

impl Default for BlinkTimer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl BlinkTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            phase: Duration::ZERO,
        }
    }

    pub fn advance(&mut self, elapsed: Duration) {
        let period = self.period.as_nanos();
        if period == 0 {
            return;
        }
        let phase = (self.phase.as_nanos() + elapsed.as_nanos()) % period;
        self.phase = Duration::from_nanos(phase as u64);
    }

    pub fn is_on(&self) -> bool {
        self.phase < self.period / 2
    }
}
