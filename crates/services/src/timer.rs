use std::time::Duration;

/// What the countdown reports to the session on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// Whole seconds still remaining, rounded up. Never zero.
    Tick(u32),
    /// Remaining time reached zero. Delivered once.
    Expired,
}

/// Countdown collaborator for an exam attempt.
///
/// Tracks sub-second elapsed time so irregular tick intervals do not drift,
/// and never counts back up.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: Duration,
    expired: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(total_secs: u32) -> Self {
        Self {
            remaining: Duration::from_secs(u64::from(total_secs)),
            expired: false,
        }
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        let millis = self.remaining.as_millis();
        u32::try_from(millis.div_ceil(1_000)).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Consume `elapsed` wall time. Returns `None` once expiry was reported.
    pub fn tick(&mut self, elapsed: Duration) -> Option<TimerSignal> {
        if self.expired {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.expired = true;
            Some(TimerSignal::Expired)
        } else {
            Some(TimerSignal::Tick(self.remaining_secs()))
        }
    }
}

/// Formats seconds as `MM:SS`, or `H:MM:SS` from one hour up.
#[must_use]
pub fn format_remaining(secs: u32) -> String {
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_ticks_down_and_expires_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(
            countdown.tick(Duration::from_millis(500)),
            Some(TimerSignal::Tick(2))
        );
        assert_eq!(
            countdown.tick(Duration::from_millis(500)),
            Some(TimerSignal::Tick(1))
        );
        assert_eq!(countdown.tick(Duration::from_secs(5)), Some(TimerSignal::Expired));
        assert_eq!(countdown.remaining_secs(), 0);
        assert_eq!(countdown.tick(Duration::from_secs(1)), None);
        assert!(countdown.is_expired());
    }

    #[test]
    fn zero_length_countdown_expires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        assert!(!countdown.is_expired());
        assert_eq!(countdown.tick(Duration::ZERO), Some(TimerSignal::Expired));
        assert_eq!(countdown.tick(Duration::from_secs(1)), None);
    }

    #[test]
    fn remaining_time_formats_as_clock() {
        assert_eq!(format_remaining(600), "10:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(3_725), "1:02:05");
    }
}
