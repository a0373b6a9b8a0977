use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use exam_core::Clock;
use exam_core::model::{
    AnswerMap, AnswerValue, Exam, FinishReason, QuestionId, SaveStatus, SessionKey, SessionPhase,
    Submission, Username,
};
use exam_core::navigation::QuestionCursor;
use storage::repository::{ProgressStore, SubmissionRepository};
use tracing::{debug, info, warn};

use super::progress::{ExamProgress, QuestionMarker};
use super::resume::{ResumeChoice, ResumeOutcome};
use crate::autosave::{AutosaveConfig, AutosaveScheduler, ManualSaveNotice, WriteToken};
use crate::error::ExamSessionError;
use crate::timer::TimerSignal;

/// Where the current answer map came from.
///
/// Only `Edited` maps are autosaved, so a map that was just initialized or
/// restored is never written back on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswersOrigin {
    Initialized,
    Restored,
    Edited,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One test-taker's attempt at one exam.
///
/// Moves `Initializing → Active → Finished`. While a resume offer is open the
/// session is `Initializing` and rejects edits. `Finished` is terminal: the
/// answers are frozen, the submission has been handed to the submission log,
/// and the stored snapshot is purged.
pub struct ExamSession {
    exam: Exam,
    username: Username,
    key: SessionKey,
    clock: Clock,
    store: Arc<dyn ProgressStore>,
    submissions: Arc<dyn SubmissionRepository>,
    phase: SessionPhase,
    answers: AnswersState,
    resume_offer: Option<AnswerMap>,
    cursor: QuestionCursor,
    remaining_secs: u32,
    autosave: AutosaveScheduler,
    manual_notice: ManualSaveNotice,
    confirming_finish: bool,
    submission: Option<Submission>,
    submission_id: Option<i64>,
}

struct AnswersState {
    map: AnswerMap,
    origin: AnswersOrigin,
}

impl ExamSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        exam: Exam,
        username: Username,
        key: SessionKey,
        clock: Clock,
        store: Arc<dyn ProgressStore>,
        submissions: Arc<dyn SubmissionRepository>,
        autosave: AutosaveConfig,
        outcome: ResumeOutcome,
    ) -> Self {
        let placeholder = AnswerMap::initialize_empty(exam.question_ids());
        let cursor = QuestionCursor::new(exam.question_count());
        let remaining_secs = exam.duration_secs();
        let mut session = Self {
            exam,
            username,
            key,
            clock,
            store,
            submissions,
            phase: SessionPhase::Initializing,
            answers: AnswersState {
                map: placeholder,
                origin: AnswersOrigin::Initialized,
            },
            resume_offer: None,
            cursor,
            remaining_secs,
            autosave: AutosaveScheduler::new(autosave),
            manual_notice: ManualSaveNotice::new(autosave.manual_notice),
            confirming_finish: false,
            submission: None,
            submission_id: None,
        };

        match outcome {
            ResumeOutcome::Offer(saved) => {
                info!(key = %session.key, "offering to resume saved progress");
                session.resume_offer = Some(saved);
            }
            ResumeOutcome::Fresh(empty) => session.activate(empty, AnswersOrigin::Initialized),
        }
        session
    }

    fn activate(&mut self, answers: AnswerMap, origin: AnswersOrigin) {
        self.answers = AnswersState {
            map: answers,
            origin,
        };
        // Elapsed time is not persisted: every activation grants the full duration.
        self.remaining_secs = self.exam.duration_secs();
        self.phase = SessionPhase::Active;
        debug!(key = %self.key, ?origin, remaining_secs = self.remaining_secs, "session active");
    }

    #[must_use]
    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    #[must_use]
    pub fn username(&self) -> &Username {
        &self.username
    }

    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers.map
    }

    #[must_use]
    pub fn answer(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.answers.map.get(question_id)
    }

    /// Snapshot found at start, waiting for a resume-or-discard choice.
    #[must_use]
    pub fn resume_offer(&self) -> Option<&AnswerMap> {
        self.resume_offer.as_ref()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    #[must_use]
    pub fn manual_save_visible(&self) -> bool {
        self.manual_notice.is_visible(self.clock.now())
    }

    #[must_use]
    pub fn is_confirming_finish(&self) -> bool {
        self.confirming_finish
    }

    #[must_use]
    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    #[must_use]
    pub fn submission_id(&self) -> Option<i64> {
        self.submission_id
    }

    /// Mutable access to the session clock. Advancing only affects fixed clocks.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Earliest instant at which `tick` has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        let notice = self
            .manual_notice
            .visible_until()
            .filter(|until| *until > self.clock.now());
        match (self.autosave.next_deadline(), notice) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    //
    // ─── RESUME ────────────────────────────────────────────────────────────────
    //

    /// Apply the user's choice on the pending resume offer.
    ///
    /// Returns `false` when no offer is pending. Resume keeps the question index
    /// at the first question. Discard deletes the stored snapshot; a failed
    /// delete is logged and the session still starts fresh.
    pub async fn resolve_resume(&mut self, choice: ResumeChoice) -> bool {
        let Some(saved) = self.resume_offer.take() else {
            return false;
        };

        match choice {
            ResumeChoice::Resume => {
                info!(key = %self.key, answered = saved.answered_count(), "resuming saved progress");
                self.activate(saved, AnswersOrigin::Restored);
            }
            ResumeChoice::Discard => {
                info!(key = %self.key, "discarding saved progress");
                if let Err(err) = self.store.remove(&self.key).await {
                    warn!(key = %self.key, error = %err, "could not delete saved progress");
                }
                let empty = AnswerMap::initialize_empty(self.exam.question_ids());
                self.activate(empty, AnswersOrigin::Initialized);
            }
        }
        true
    }

    /// Closing the resume prompt without choosing counts as a discard.
    pub async fn dismiss_resume_offer(&mut self) -> bool {
        self.resolve_resume(ResumeChoice::Discard).await
    }

    //
    // ─── ANSWERS & NAVIGATION ──────────────────────────────────────────────────
    //

    /// Replace the answer for one question and schedule an autosave.
    ///
    /// Returns `false` without changing anything unless the session is active
    /// and the question belongs to this exam.
    pub fn set_answer(&mut self, question_id: &QuestionId, value: Option<AnswerValue>) -> bool {
        if self.phase != SessionPhase::Active {
            debug!(key = %self.key, phase = ?self.phase, question = %question_id, "edit ignored");
            return false;
        }
        if let Err(err) = self.answers.map.set_answer(question_id, value) {
            warn!(key = %self.key, error = %err, "edit ignored");
            return false;
        }
        self.answers.origin = AnswersOrigin::Edited;
        self.autosave.schedule(self.clock.now());
        true
    }

    /// Answer the question under the cursor.
    pub fn answer_current(&mut self, value: Option<AnswerValue>) -> bool {
        let Some(question_id) = self.current_question().cloned() else {
            return false;
        };
        self.set_answer(&question_id, value)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.cursor.index()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuestionId> {
        self.exam.question_at(self.cursor.index())
    }

    /// Jump to a question. Out-of-range indices are ignored.
    pub fn go_to(&mut self, index: usize) -> bool {
        self.cursor.go_to(index)
    }

    pub fn next_question(&mut self) -> bool {
        self.cursor.next()
    }

    pub fn previous_question(&mut self) -> bool {
        self.cursor.previous()
    }

    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        let total = self.exam.question_count();
        let answered = self.answers.map.answered_count();
        ExamProgress {
            total,
            answered,
            unanswered: total.saturating_sub(answered),
            current_index: self.cursor.index(),
            is_first: self.cursor.is_first(),
            is_last: self.cursor.is_last(),
            is_finished: self.is_finished(),
        }
    }

    #[must_use]
    pub fn question_markers(&self) -> Vec<QuestionMarker> {
        self.exam
            .question_ids()
            .iter()
            .enumerate()
            .map(|(index, question_id)| QuestionMarker {
                index,
                question_id: question_id.clone(),
                answered: self.answers.map.is_answered(question_id),
                current: index == self.cursor.index(),
            })
            .collect()
    }

    //
    // ─── SAVING ────────────────────────────────────────────────────────────────
    //

    /// Run any due autosave and expire save indicators.
    ///
    /// Call on every clock tick; cheap when nothing is due.
    pub async fn tick(&mut self) {
        let now = self.clock.now();
        if let Some(token) = self.autosave.take_due(now) {
            self.write_autosave(token).await;
        }
        self.autosave.refresh(self.clock.now());
    }

    async fn write_autosave(&mut self, token: WriteToken) {
        if self.answers.origin != AnswersOrigin::Edited {
            self.autosave.complete(token, false, self.clock.now());
            return;
        }
        let saved = self.write_snapshot().await;
        if saved {
            debug!(key = %self.key, "autosaved progress");
        }
        self.autosave.complete(token, saved, self.clock.now());
    }

    async fn write_snapshot(&self) -> bool {
        let payload = match self.answers.map.to_snapshot() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %self.key, error = %err, "could not encode progress");
                return false;
            }
        };
        match self.store.set(&self.key, &payload).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %self.key, error = %err, "progress not saved");
                false
            }
        }
    }

    /// Write a pending autosave now instead of waiting out its quiet period.
    ///
    /// Returns `false` only when a pending write failed; the edit then lives in
    /// memory only.
    pub async fn flush(&mut self) -> bool {
        if self.phase != SessionPhase::Active {
            return true;
        }
        let Some(token) = self.autosave.take_pending() else {
            return true;
        };
        self.write_autosave(token).await;
        self.autosave.status() == SaveStatus::Saved
    }

    /// Write the current answers immediately, bypassing the debounce.
    ///
    /// Ignored while the previous confirmation is still showing. Returns whether
    /// a write succeeded; failures are logged and otherwise silent.
    pub async fn manual_save(&mut self) -> bool {
        if self.phase != SessionPhase::Active || self.manual_save_visible() {
            return false;
        }
        if !self.write_snapshot().await {
            return false;
        }
        info!(key = %self.key, "progress saved manually");
        self.manual_notice.show(self.clock.now());
        true
    }

    //
    // ─── FINISHING ─────────────────────────────────────────────────────────────
    //

    /// Open the finish confirmation. Only possible while active.
    pub fn request_finish(&mut self) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.confirming_finish = true;
        true
    }

    pub fn cancel_finish(&mut self) {
        self.confirming_finish = false;
    }

    /// Submit after the user confirmed. No-op unless a confirmation is open.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Storage` if the submission cannot be
    /// recorded. The session stays finished; see [`Self::retry_submission`].
    pub async fn confirm_finish(&mut self) -> Result<Option<Submission>, ExamSessionError> {
        if !self.confirming_finish {
            return Ok(None);
        }
        self.finish(FinishReason::Confirmed).await
    }

    /// Feed a countdown signal into the session.
    ///
    /// Ticks lower the mirrored remaining time and never raise it. Expiry
    /// submits immediately, overriding any open confirmation. Signals outside
    /// the active phase are ignored, so a repeated expiry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Storage` if the submission cannot be recorded.
    pub async fn on_timer(
        &mut self,
        signal: TimerSignal,
    ) -> Result<Option<Submission>, ExamSessionError> {
        if self.phase != SessionPhase::Active {
            return Ok(None);
        }
        match signal {
            TimerSignal::Tick(remaining) => {
                self.remaining_secs = self.remaining_secs.min(remaining);
                Ok(None)
            }
            TimerSignal::Expired => {
                self.remaining_secs = 0;
                info!(key = %self.key, "time is up");
                self.finish(FinishReason::TimeExpired).await
            }
        }
    }

    async fn finish(
        &mut self,
        reason: FinishReason,
    ) -> Result<Option<Submission>, ExamSessionError> {
        if self.phase == SessionPhase::Finished {
            return Ok(None);
        }
        self.phase = SessionPhase::Finished;
        self.confirming_finish = false;

        // Flush a pending autosave so the last snapshot agrees with what is submitted.
        if let Some(token) = self.autosave.take_pending() {
            self.write_autosave(token).await;
        }
        self.autosave.cancel();
        self.manual_notice.clear();

        let submission = Submission::new(
            self.exam.id().clone(),
            self.username.clone(),
            self.answers.map.clone(),
            self.remaining_secs,
            reason,
            self.clock.now(),
        );
        info!(
            key = %self.key,
            %reason,
            remaining_secs = self.remaining_secs,
            answered = self.answers.map.answered_count(),
            "exam finished"
        );
        self.submission = Some(submission.clone());
        self.deliver_submission().await?;
        Ok(Some(submission))
    }

    async fn deliver_submission(&mut self) -> Result<i64, ExamSessionError> {
        if let Some(id) = self.submission_id {
            return Ok(id);
        }
        let submission = self.submission.as_ref().ok_or(ExamSessionError::NotFinished)?;
        let id = self.submissions.append_submission(submission).await?;
        self.submission_id = Some(id);

        match self.store.remove(&self.key).await {
            Ok(()) => debug!(key = %self.key, submission_id = id, "saved progress cleared"),
            Err(err) => warn!(key = %self.key, error = %err, "could not clear saved progress"),
        }
        Ok(id)
    }

    /// Retry recording the submission after a failed finish.
    ///
    /// Returns the existing id if the submission was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::NotFinished` if the session is still open,
    /// or `ExamSessionError::Storage` if recording fails again.
    pub async fn retry_submission(&mut self) -> Result<i64, ExamSessionError> {
        if self.phase != SessionPhase::Finished {
            return Err(ExamSessionError::NotFinished);
        }
        self.deliver_submission().await
    }

    /// Tear the session down without submitting.
    ///
    /// Drops any pending autosave so nothing is written afterwards. The stored
    /// snapshot is kept for the next start.
    pub fn close(&mut self) {
        if self.autosave.cancel() {
            debug!(key = %self.key, "pending autosave dropped on close");
        }
        self.confirming_finish = false;
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("key", &self.key)
            .field("phase", &self.phase)
            .field("answered", &self.answers.map.answered_count())
            .field("current", &self.cursor.index())
            .field("remaining_secs", &self.remaining_secs)
            .field("save_status", &self.autosave.status())
            .field("submission_id", &self.submission_id)
            .finish_non_exhaustive()
    }
}
