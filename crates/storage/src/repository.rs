use async_trait::async_trait;
use exam_core::model::{ExamId, SessionKey, Submission, Username};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// The medium refused the operation (quota exceeded, disabled, read-only).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable string key-value store holding in-progress answer snapshots.
///
/// Values survive process restarts. `set` overwrites (last write wins) and
/// `remove` of an absent key succeeds.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Read the payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be read.
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, StorageError>;

    /// Store `payload` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the medium rejects the write.
    async fn set(&self, key: &SessionKey, payload: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be written.
    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError>;
}

/// A stored submission with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRow {
    pub id: i64,
    pub submission: Submission,
}

impl SubmissionRow {
    #[must_use]
    pub fn new(id: i64, submission: Submission) -> Self {
        Self { id, submission }
    }
}

/// Append-only log of finished attempts, consumed by grading.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Record a submission and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the submission cannot be stored.
    async fn append_submission(&self, submission: &Submission) -> Result<i64, StorageError>;

    /// List submissions for one exam, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn list_submissions(
        &self,
        exam_id: &ExamId,
        limit: u32,
    ) -> Result<Vec<SubmissionRow>, StorageError>;

    /// Latest submission of `username` for `exam_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn latest_submission(
        &self,
        exam_id: &ExamId,
        username: &Username,
    ) -> Result<Option<SubmissionRow>, StorageError>;
}

/// In-memory store for tests and prototyping.
///
/// Clones share state. `set_fail_writes(true)` makes every write fail with
/// `StorageError::Unavailable`, standing in for a full or disabled medium.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    snapshots: Arc<Mutex<HashMap<SessionKey, String>>>,
    submissions: Arc<Mutex<Vec<SubmissionRow>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<Mutex<Vec<(SessionKey, String)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every successful `set`, in order. Useful for asserting write counts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn write_log(&self) -> Result<Vec<(SessionKey, String)>, StorageError> {
        let guard = self
            .writes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &SessionKey, payload: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.clone(), payload.to_owned());
        drop(guard);

        let mut log = self
            .writes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        log.push((key.clone(), payload.to_owned()));
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryRepository {
    async fn append_submission(&self, submission: &Submission) -> Result<i64, StorageError> {
        self.check_writable()?;
        let mut guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("submission id overflow".into()))?
            + 1;
        guard.push(SubmissionRow::new(id, submission.clone()));
        Ok(id)
    }

    async fn list_submissions(
        &self,
        exam_id: &ExamId,
        limit: u32,
    ) -> Result<Vec<SubmissionRow>, StorageError> {
        let guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .iter()
            .rev()
            .filter(|row| row.submission.exam_id() == exam_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_submission(
        &self,
        exam_id: &ExamId,
        username: &Username,
    ) -> Result<Option<SubmissionRow>, StorageError> {
        let guard = self
            .submissions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .rev()
            .find(|row| {
                row.submission.exam_id() == exam_id && row.submission.username() == username
            })
            .cloned())
    }
}

/// Aggregates the progress store and submission log behind trait objects for
/// easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressStore>,
    pub submissions: Arc<dyn SubmissionRepository>,
}

impl Storage {
    /// Wrap an existing in-memory repository so tests can keep a handle to it.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let progress: Arc<dyn ProgressStore> = Arc::new(repo.clone());
        let submissions: Arc<dyn SubmissionRepository> = Arc::new(repo);
        Self {
            progress,
            submissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerMap, FinishReason, QuestionId};
    use exam_core::time::fixed_now;

    fn key() -> SessionKey {
        SessionKey::new("cbt", &Username::new("alice"), &ExamId::new("EXAM1"))
    }

    fn submission(user: &str) -> Submission {
        Submission::new(
            ExamId::new("EXAM1"),
            Username::new(user),
            AnswerMap::initialize_empty(&[QuestionId::new("Q1")]),
            30,
            FinishReason::Confirmed,
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn set_overwrites_and_remove_is_idempotent() {
        let repo = InMemoryRepository::new();
        repo.set(&key(), "first").await.unwrap();
        repo.set(&key(), "second").await.unwrap();
        assert_eq!(repo.get(&key()).await.unwrap().as_deref(), Some("second"));

        repo.remove(&key()).await.unwrap();
        repo.remove(&key()).await.unwrap();
        assert_eq!(repo.get(&key()).await.unwrap(), None);
        assert_eq!(repo.write_log().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_writes_leave_previous_value() {
        let repo = InMemoryRepository::new();
        repo.set(&key(), "kept").await.unwrap();
        repo.set_fail_writes(true);

        let err = repo.set(&key(), "lost").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(repo.get(&key()).await.unwrap().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn submissions_list_newest_first() {
        let repo = InMemoryRepository::new();
        let first = repo.append_submission(&submission("alice")).await.unwrap();
        let second = repo.append_submission(&submission("bob")).await.unwrap();
        assert!(second > first);

        let rows = repo
            .list_submissions(&ExamId::new("EXAM1"), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second);

        let latest = repo
            .latest_submission(&ExamId::new("EXAM1"), &Username::new("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, first);
        assert!(
            repo.list_submissions(&ExamId::new("OTHER"), 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
