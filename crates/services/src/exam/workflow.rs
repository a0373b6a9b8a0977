use std::sync::Arc;

use exam_core::model::{DEFAULT_KEY_NAMESPACE, Exam, ExamId, SessionKey, Username};
use storage::repository::{ProgressStore, SubmissionRepository, SubmissionRow};

use super::resume::ResumeFlow;
use super::session::ExamSession;
use crate::Clock;
use crate::autosave::AutosaveConfig;
use crate::error::ExamSessionError;

/// Starts exam sessions against a progress store and a submission log.
#[derive(Clone)]
pub struct ExamSessionService {
    clock: Clock,
    progress: Arc<dyn ProgressStore>,
    submissions: Arc<dyn SubmissionRepository>,
    autosave: AutosaveConfig,
    namespace: String,
}

impl ExamSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressStore>,
        submissions: Arc<dyn SubmissionRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            submissions,
            autosave: AutosaveConfig::default(),
            namespace: DEFAULT_KEY_NAMESPACE.to_owned(),
        }
    }

    #[must_use]
    pub fn with_autosave_config(mut self, autosave: AutosaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    #[must_use]
    pub fn with_key_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn session_key(&self, username: &Username, exam_id: &ExamId) -> SessionKey {
        SessionKey::new(&self.namespace, username, exam_id)
    }

    /// Start an attempt, checking once for saved progress.
    ///
    /// The returned session is `Active` when nothing could be resumed, or
    /// `Initializing` with a pending resume offer otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::EmptyUsername` for a blank username.
    pub async fn start_session(
        &self,
        exam: Exam,
        username: Username,
    ) -> Result<ExamSession, ExamSessionError> {
        if username.as_str().trim().is_empty() {
            return Err(ExamSessionError::EmptyUsername);
        }
        let key = self.session_key(&username, exam.id());
        let outcome = ResumeFlow::new(self.progress.as_ref(), &key, exam.question_ids())
            .run()
            .await;

        Ok(ExamSession::new(
            exam,
            username,
            key,
            self.clock,
            Arc::clone(&self.progress),
            Arc::clone(&self.submissions),
            self.autosave,
            outcome,
        ))
    }

    /// Most recent recorded submission for this user and exam.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Storage` if the log cannot be read.
    pub async fn latest_submission(
        &self,
        exam_id: &ExamId,
        username: &Username,
    ) -> Result<Option<SubmissionRow>, ExamSessionError> {
        Ok(self
            .submissions
            .latest_submission(exam_id, username)
            .await?)
    }
}
