use std::collections::HashSet;

use thiserror::Error;

use crate::model::{ExamId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("exam duration must be positive")]
    ZeroDuration,

    #[error("exam has no questions")]
    NoQuestions,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

/// The parts of an exam definition the session engine needs.
///
/// Question content and grading keys live with the catalog; here a question is
/// only its id and its position in the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    id: ExamId,
    title: String,
    duration_minutes: u32,
    question_ids: Vec<QuestionId>,
}

impl Exam {
    /// # Errors
    ///
    /// Returns `ExamError` if the title is blank, the duration is zero, or the
    /// question sequence is empty or contains duplicates.
    pub fn new(
        id: ExamId,
        title: impl Into<String>,
        duration_minutes: u32,
        question_ids: Vec<QuestionId>,
    ) -> Result<Self, ExamError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        if duration_minutes == 0 {
            return Err(ExamError::ZeroDuration);
        }
        if question_ids.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(question_ids.len());
        for id in &question_ids {
            if !seen.insert(id) {
                return Err(ExamError::DuplicateQuestion(id.clone()));
            }
        }

        Ok(Self {
            id,
            title,
            duration_minutes,
            question_ids,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ExamId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Nominal duration granted to every attempt, in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.question_ids.len()
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&QuestionId> {
        self.question_ids.get(index)
    }
}
