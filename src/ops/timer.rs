/// A cancellable one-shot deadline, in epoch milliseconds.
///
/// Nothing fires on its own: the owner polls with [`take_if_due`](Timer::take_if_due)
/// when it handles a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<i64>,
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    /// Arm (or re-arm) to fire `delay_ms` after `now`, superseding any
    /// pending deadline.
    pub fn arm(&mut self, now: i64, delay_ms: u64) {
        let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
        self.deadline = Some(now.saturating_add(delay));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<i64> {
        self.deadline
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn take_if_due(&mut self, now: i64) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// A repeating timer. Each firing re-arms from the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    period_ms: u64,
    timer: Timer,
}

impl Interval {
    pub fn start(now: i64, period_ms: u64) -> Self {
        let mut timer = Timer::new();
        timer.arm(now, period_ms);
        Interval { period_ms, timer }
    }

    pub fn deadline(&self) -> Option<i64> {
        self.timer.deadline()
    }

    pub fn take_if_due(&mut self, now: i64) -> bool {
        if self.timer.take_if_due(now) {
            self.timer.arm(now, self.period_ms);
            true
        } else {
            false
        }
    }

    /// Push the next firing a full period out from `now`.
    pub fn reset(&mut self, now: i64) {
        self.timer.arm(now, self.period_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_once_at_deadline() {
        let mut t = Timer::new();
        assert!(!t.take_if_due(0));
        t.arm(100, 50);
        assert_eq!(t.deadline(), Some(150));
        assert!(!t.take_if_due(149));
        assert!(t.take_if_due(150));
        assert!(!t.is_armed());
        assert!(!t.take_if_due(500));
    }

    #[test]
    fn rearming_supersedes_pending_deadline() {
        let mut t = Timer::new();
        t.arm(0, 1_000);
        t.arm(900, 1_000);
        assert!(!t.take_if_due(1_000));
        assert!(t.take_if_due(1_900));
    }

    #[test]
    fn huge_delay_saturates_instead_of_wrapping() {
        let mut t = Timer::new();
        t.arm(1_000, u64::MAX);
        assert_eq!(t.deadline(), Some(i64::MAX));
        assert!(!t.take_if_due(i64::MAX - 1));
    }

    #[test]
    fn cancel_disarms() {
        let mut t = Timer::new();
        t.arm(0, 10);
        t.cancel();
        assert!(!t.take_if_due(100));
    }

    #[test]
    fn interval_rearms_from_observation_time() {
        let mut i = Interval::start(0, 30);
        assert!(!i.take_if_due(29));
        assert!(i.take_if_due(45));
        assert_eq!(i.deadline(), Some(75));
        i.reset(70);
        assert_eq!(i.deadline(), Some(100));
    }
}
