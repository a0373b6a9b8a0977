use chrono::{DateTime, Duration, Utc};
use exam_core::model::SaveStatus;

/// Timing knobs for autosave and the save confirmations shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period after the latest edit before the snapshot is written.
    pub debounce: Duration,
    /// How long `SaveStatus::Saved` stays up after a successful write.
    pub saved_display: Duration,
    /// How long the manual-save confirmation stays up.
    pub manual_notice: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::seconds(1),
            saved_display: Duration::seconds(2),
            manual_notice: Duration::seconds(2),
        }
    }
}

/// Identifies one scheduled write. A newer mutation replaces the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteToken(u64);

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    token: WriteToken,
    due_at: DateTime<Utc>,
}

/// Debounce state for answer-map writes.
///
/// Owns at most one pending write. The scheduler does no I/O: the caller asks
/// for a due token, performs the write, and reports the outcome.
#[derive(Debug)]
pub struct AutosaveScheduler {
    config: AutosaveConfig,
    status: SaveStatus,
    pending: Option<PendingWrite>,
    saved_until: Option<DateTime<Utc>>,
    issued: u64,
}

impl AutosaveScheduler {
    #[must_use]
    pub fn new(config: AutosaveConfig) -> Self {
        Self {
            config,
            status: SaveStatus::Idle,
            pending: None,
            saved_until: None,
            issued: 0,
        }
    }

    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Deadline of the pending write, if one is scheduled.
    #[must_use]
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.pending.map(|p| p.due_at)
    }

    /// Earliest instant at which `take_due` or `refresh` would change state.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.due_at(), self.saved_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Record an edit made at `now`, replacing any pending write.
    pub fn schedule(&mut self, now: DateTime<Utc>) -> WriteToken {
        self.issued += 1;
        let token = WriteToken(self.issued);
        self.pending = Some(PendingWrite {
            token,
            due_at: now + self.config.debounce,
        });
        self.status = SaveStatus::Saving;
        self.saved_until = None;
        token
    }

    /// Take the pending write once its quiet period has elapsed.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<WriteToken> {
        match self.pending {
            Some(pending) if now >= pending.due_at => {
                self.pending = None;
                Some(pending.token)
            }
            _ => None,
        }
    }

    /// Take the pending write regardless of its deadline.
    pub fn take_pending(&mut self) -> Option<WriteToken> {
        self.pending.take().map(|p| p.token)
    }

    /// Report the outcome of the write started for `token`.
    ///
    /// If a newer edit was scheduled meanwhile the status stays `Saving`.
    /// Failures drop straight back to `Idle`.
    pub fn complete(&mut self, token: WriteToken, succeeded: bool, now: DateTime<Utc>) {
        if self.pending.is_some_and(|p| p.token != token) {
            return;
        }
        if succeeded {
            self.status = SaveStatus::Saved;
            self.saved_until = Some(now + self.config.saved_display);
        } else {
            self.status = SaveStatus::Idle;
            self.saved_until = None;
        }
    }

    /// Expire the `Saved` indicator once its display window has passed.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        if let Some(until) = self.saved_until {
            if now >= until {
                self.saved_until = None;
                if self.status == SaveStatus::Saved {
                    self.status = SaveStatus::Idle;
                }
            }
        }
    }

    /// Drop any pending write and reset to idle. Returns whether one was dropped.
    pub fn cancel(&mut self) -> bool {
        let dropped = self.pending.take().is_some();
        self.status = SaveStatus::Idle;
        self.saved_until = None;
        dropped
    }
}

/// Short-lived confirmation after a manual save, independent of `SaveStatus`.
#[derive(Debug, Clone, Copy)]
pub struct ManualSaveNotice {
    display: Duration,
    visible_until: Option<DateTime<Utc>>,
}

impl ManualSaveNotice {
    #[must_use]
    pub fn new(display: Duration) -> Self {
        Self {
            display,
            visible_until: None,
        }
    }

    pub fn show(&mut self, now: DateTime<Utc>) {
        self.visible_until = Some(now + self.display);
    }

    #[must_use]
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.visible_until.is_some_and(|until| now < until)
    }

    #[must_use]
    pub fn visible_until(&self) -> Option<DateTime<Utc>> {
        self.visible_until
    }

    pub fn clear(&mut self) {
        self.visible_until = None;
    }
}
