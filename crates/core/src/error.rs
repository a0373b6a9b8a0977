use thiserror::Error;

use crate::model::{AnswerError, ExamError, SnapshotError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
