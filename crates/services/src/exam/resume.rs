use exam_core::model::{AnswerMap, QuestionId, SessionKey};
use storage::repository::ProgressStore;
use tracing::{debug, warn};

/// The test-taker's answer to a resume offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeChoice {
    /// Continue from the stored snapshot.
    Resume,
    /// Delete the stored snapshot and start with empty answers.
    Discard,
}

/// Result of checking the store for an unfinished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// A usable snapshot exists. It is not applied until the user chooses.
    Offer(AnswerMap),
    /// Nothing to resume: start from the empty map.
    Fresh(AnswerMap),
}

/// One-shot read of the stored snapshot for a session key.
///
/// `run` consumes the flow, so a session checks for saved progress exactly
/// once no matter what happens to the store afterwards.
pub struct ResumeFlow<'a> {
    store: &'a dyn ProgressStore,
    key: &'a SessionKey,
    question_ids: &'a [QuestionId],
}

impl<'a> ResumeFlow<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn ProgressStore,
        key: &'a SessionKey,
        question_ids: &'a [QuestionId],
    ) -> Self {
        Self {
            store,
            key,
            question_ids,
        }
    }

    /// Never fails: unreadable stores count as empty and corrupt snapshots are
    /// deleted.
    pub async fn run(self) -> ResumeOutcome {
        let fresh = || ResumeOutcome::Fresh(AnswerMap::initialize_empty(self.question_ids));

        let raw = match self.store.get(self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %self.key, "no saved progress");
                return fresh();
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "could not read saved progress; starting fresh");
                return fresh();
            }
        };

        let parsed = AnswerMap::from_snapshot(&raw)
            .and_then(|answers| answers.ensure_covers(self.question_ids).map(|()| answers));
        match parsed {
            Ok(answers) => {
                debug!(
                    key = %self.key,
                    answered = answers.answered_count(),
                    "saved progress found"
                );
                ResumeOutcome::Offer(answers)
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding unreadable saved progress");
                if let Err(err) = self.store.remove(self.key).await {
                    warn!(key = %self.key, error = %err, "could not delete unreadable saved progress");
                }
                fresh()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerValue, ExamId, Username};
    use storage::repository::InMemoryRepository;

    fn key() -> SessionKey {
        SessionKey::new("cbt", &Username::new("alice"), &ExamId::new("EXAM1"))
    }

    fn questions() -> Vec<QuestionId> {
        vec![QuestionId::new("Q1"), QuestionId::new("Q2")]
    }

    #[tokio::test]
    async fn absent_snapshot_starts_fresh() {
        let repo = InMemoryRepository::new();
        let qs = questions();
        let outcome = ResumeFlow::new(&repo, &key(), &qs).run().await;
        assert_eq!(outcome, ResumeOutcome::Fresh(AnswerMap::initialize_empty(&qs)));
    }

    #[tokio::test]
    async fn valid_snapshot_is_offered_not_applied() {
        let repo = InMemoryRepository::new();
        repo.set(&key(), r#"{"Q1":"A2","Q2":null}"#).await.unwrap();
        let qs = questions();

        let outcome = ResumeFlow::new(&repo, &key(), &qs).run().await;
        let expected = AnswerMap::initialize_empty(&qs)
            .with_answer(&qs[0], Some(AnswerValue::single("A2")))
            .unwrap();
        assert_eq!(outcome, ResumeOutcome::Offer(expected));
        assert!(repo.get(&key()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_removed() {
        let repo = InMemoryRepository::new();
        repo.set(&key(), "{not json").await.unwrap();
        let qs = questions();

        let outcome = ResumeFlow::new(&repo, &key(), &qs).run().await;
        assert_eq!(outcome, ResumeOutcome::Fresh(AnswerMap::initialize_empty(&qs)));
        assert_eq!(repo.get(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn snapshot_for_other_question_set_is_removed() {
        let repo = InMemoryRepository::new();
        repo.set(&key(), r#"{"Q1":"A2","Q7":null}"#).await.unwrap();
        let qs = questions();

        let outcome = ResumeFlow::new(&repo, &key(), &qs).run().await;
        assert!(matches!(outcome, ResumeOutcome::Fresh(_)));
        assert_eq!(repo.get(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_snapshot_with_read_only_store_still_starts_fresh() {
        let repo = InMemoryRepository::new();
        repo.set(&key(), "garbage").await.unwrap();
        repo.set_fail_writes(true);
        let qs = questions();

        let outcome = ResumeFlow::new(&repo, &key(), &qs).run().await;
        assert!(matches!(outcome, ResumeOutcome::Fresh(_)));
    }
}
