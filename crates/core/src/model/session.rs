use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{AnswerMap, ExamId, Username};

/// Lifecycle of one exam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Resume decision pending; answers are not yet editable.
    Initializing,
    Active,
    /// Terminal. No further mutation is accepted.
    Finished,
}

/// Autosave feedback for the UI. Never used for correctness decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
}

/// Why an attempt was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The test-taker confirmed completion.
    Confirmed,
    /// The countdown reached zero.
    TimeExpired,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::TimeExpired => "time_expired",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFinishReasonError(String);

impl fmt::Display for ParseFinishReasonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown finish reason: {}", self.0)
    }
}

impl std::error::Error for ParseFinishReasonError {}

impl FromStr for FinishReason {
    type Err = ParseFinishReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "time_expired" => Ok(Self::TimeExpired),
            other => Err(ParseFinishReasonError(other.to_owned())),
        }
    }
}

/// Payload handed to the grading collaborator when an attempt ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    exam_id: ExamId,
    username: Username,
    answers: AnswerMap,
    remaining_secs: u32,
    reason: FinishReason,
    submitted_at: DateTime<Utc>,
}

impl Submission {
    #[must_use]
    pub fn new(
        exam_id: ExamId,
        username: Username,
        answers: AnswerMap,
        remaining_secs: u32,
        reason: FinishReason,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exam_id,
            username,
            answers,
            remaining_secs,
            reason,
            submitted_at,
        }
    }

    #[must_use]
    pub fn exam_id(&self) -> &ExamId {
        &self.exam_id
    }

    #[must_use]
    pub fn username(&self) -> &Username {
        &self.username
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn reason(&self) -> FinishReason {
        self.reason
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
