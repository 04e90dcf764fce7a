use std::time::{Duration, Instant};

/// Fixed-rate tick schedule.
///
/// Deadlines advance by whole intervals so the rate does not drift. After a
/// stall the schedule skips the missed ticks instead of firing them in a
/// burst.
#[derive(Debug, Clone)]
pub struct FixedTick {
    interval: Duration,
    next: Instant,
}

impl FixedTick {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    fn starting_at(interval: Duration, start: Instant) -> Self {
        let interval = interval.max(Duration::from_micros(100));
        Self {
            interval,
            next: start + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next tick is due.
    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Whether a tick is due at `now`; if so, schedules the following one.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            let behind = now.duration_since(self.next);
            let skipped = behind.as_nanos() / self.interval.as_nanos() + 1;
            // Past u32 intervals the phase is dropped and the schedule restarts at `now`.
            self.next = u32::try_from(skipped)
                .ok()
                .and_then(|n| self.interval.checked_mul(n))
                .and_then(|d| self.next.checked_add(d))
                .unwrap_or(now + self.interval);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_once_per_interval() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut t = FixedTick::starting_at(ms(10), start);

        assert!(!t.poll(start + ms(5)));
        assert!(t.poll(start + ms(10)));
        assert!(!t.poll(start + ms(15)));
        assert!(t.poll(start + ms(21)));
        assert_eq!(t.deadline(), start + ms(30));
    }

    #[test]
    fn stall_does_not_burst() {
        let start = Instant::now();
        let ms = Duration::from_millis;
        let mut t = FixedTick::starting_at(ms(10), start);

        assert!(t.poll(start + ms(95)));
        assert!(!t.poll(start + ms(96)));
        assert_eq!(t.deadline(), start + ms(100));
    }

    #[test]
    fn long_stall_schedules_one_interval_ahead() {
        let start = Instant::now();
        // More missed ticks than fit in a u32 at the minimum interval.
        let mut t = FixedTick::starting_at(Duration::from_micros(100), start);
        let now = start + Duration::from_secs(500_000);

        assert!(t.poll(now));
        assert!(t.deadline() > now);
        assert!(t.deadline() <= now + t.interval());
        assert!(!t.poll(now));
    }
}
