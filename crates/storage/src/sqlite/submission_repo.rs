use exam_core::model::{AnswerMap, ExamId, FinishReason, Submission, Username};
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{StorageError, SubmissionRepository, SubmissionRow};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn map_submission_row(row: &sqlx::sqlite::SqliteRow) -> Result<SubmissionRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let exam_id: String = row.try_get("exam_id").map_err(ser)?;
    let username: String = row.try_get("username").map_err(ser)?;
    let answers: String = row.try_get("answers").map_err(ser)?;
    let remaining_secs: i64 = row.try_get("remaining_secs").map_err(ser)?;
    let reason: String = row.try_get("reason").map_err(ser)?;
    let submitted_at = row.try_get("submitted_at").map_err(ser)?;

    let remaining_secs = u32::try_from(remaining_secs).map_err(|_| {
        StorageError::Serialization(format!("invalid remaining_secs: {remaining_secs}"))
    })?;
    let answers = AnswerMap::from_snapshot(&answers).map_err(ser)?;
    let reason = reason.parse::<FinishReason>().map_err(ser)?;

    Ok(SubmissionRow::new(
        id,
        Submission::new(
            ExamId::new(exam_id),
            Username::new(username),
            answers,
            remaining_secs,
            reason,
            submitted_at,
        ),
    ))
}

#[async_trait::async_trait]
impl SubmissionRepository for SqliteRepository {
    async fn append_submission(&self, submission: &Submission) -> Result<i64, StorageError> {
        let answers = submission.answers().to_snapshot().map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO submissions (
                    exam_id, username, answers, remaining_secs, reason, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(submission.exam_id().as_str())
        .bind(submission.username().as_str())
        .bind(answers)
        .bind(i64::from(submission.remaining_secs()))
        .bind(submission.reason().as_str())
        .bind(submission.submitted_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn list_submissions(
        &self,
        exam_id: &ExamId,
        limit: u32,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, exam_id, username, answers, remaining_secs, reason, submitted_at
                FROM submissions
                WHERE exam_id = ?1
                ORDER BY submitted_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(exam_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_submission_row).collect()
    }

    async fn latest_submission(
        &self,
        exam_id: &ExamId,
        username: &Username,
    ) -> Result<Option<SubmissionRow>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, exam_id, username, answers, remaining_secs, reason, submitted_at
                FROM submissions
                WHERE exam_id = ?1 AND username = ?2
                ORDER BY submitted_at DESC, id DESC
                LIMIT 1
            ",
        )
        .bind(exam_id.as_str())
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_submission_row).transpose()
    }
}
