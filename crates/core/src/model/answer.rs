use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(QuestionId),
}

/// Reasons a persisted snapshot cannot become the active answer map.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("snapshot is not a valid answer map: {0}")]
    Malformed(String),

    #[error("snapshot has no entry for question {0}")]
    MissingQuestion(QuestionId),

    #[error("snapshot has an entry for unknown question {0}")]
    UnexpectedQuestion(QuestionId),

    #[error("failed to encode snapshot: {0}")]
    Encode(String),
}

/// A non-null response to one question.
///
/// Serialized untagged so a snapshot reads as plain JSON: a string, an array of
/// strings, or an object of sub-item id to matched id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Single-choice selection or free text.
    Single(String),
    /// Multi-select, order preserved.
    Multiple(Vec<String>),
    /// Matching question: sub-item id to matched id.
    Matching(BTreeMap<String, String>),
}

impl AnswerValue {
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    #[must_use]
    pub fn multiple<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multiple(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn matching<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Matching(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Empty selections and empty matchings count as unanswered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Self::Single(_) => true,
            Self::Multiple(values) => !values.is_empty(),
            Self::Matching(pairs) => !pairs.is_empty(),
        }
    }
}

/// Question id to current response for one exam attempt.
///
/// The key set is fixed at construction: `set_answer` only replaces values, and
/// an answer is cleared by setting it back to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap {
    entries: BTreeMap<QuestionId, Option<AnswerValue>>,
}

impl AnswerMap {
    /// One `None` entry per question id. Duplicate ids collapse to one entry.
    #[must_use]
    pub fn initialize_empty<'a, I>(question_ids: I) -> Self
    where
        I: IntoIterator<Item = &'a QuestionId>,
    {
        Self {
            entries: question_ids
                .into_iter()
                .map(|id| (id.clone(), None))
                .collect(),
        }
    }

    /// Replace the value for `question_id`, leaving every other entry untouched.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownQuestion` if the id was not part of the
    /// initial key set.
    pub fn set_answer(
        &mut self,
        question_id: &QuestionId,
        value: Option<AnswerValue>,
    ) -> Result<(), AnswerError> {
        match self.entries.get_mut(question_id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AnswerError::UnknownQuestion(question_id.clone())),
        }
    }

    /// Builder-style variant of [`AnswerMap::set_answer`].
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownQuestion` for ids outside the key set.
    pub fn with_answer(
        mut self,
        question_id: &QuestionId,
        value: Option<AnswerValue>,
    ) -> Result<Self, AnswerError> {
        self.set_answer(question_id, value)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerValue> {
        self.entries.get(question_id).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn contains(&self, question_id: &QuestionId) -> bool {
        self.entries.contains_key(question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_answered(&self, question_id: &QuestionId) -> bool {
        self.get(question_id).is_some_and(AnswerValue::is_answered)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.entries
            .values()
            .filter(|value| value.as_ref().is_some_and(AnswerValue::is_answered))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, Option<&AnswerValue>)> {
        self.entries.iter().map(|(id, value)| (id, value.as_ref()))
    }

    /// Serialize to the persisted snapshot format.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Encode` if JSON encoding fails.
    pub fn to_snapshot(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|err| SnapshotError::Encode(err.to_string()))
    }

    /// Parse a persisted snapshot without checking it against an exam.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Malformed` if `raw` is not a JSON object whose
    /// values are all valid answer values or `null`.
    pub fn from_snapshot(raw: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(raw).map_err(|err| SnapshotError::Malformed(err.to_string()))
    }

    /// Check that this map has exactly the given key set.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::MissingQuestion` or
    /// `SnapshotError::UnexpectedQuestion` on the first mismatch found.
    pub fn ensure_covers<'a, I>(&self, question_ids: I) -> Result<(), SnapshotError>
    where
        I: IntoIterator<Item = &'a QuestionId>,
    {
        let expected: BTreeMap<&QuestionId, ()> =
            question_ids.into_iter().map(|id| (id, ())).collect();
        if let Some(missing) = expected.keys().find(|id| !self.entries.contains_key(**id)) {
            return Err(SnapshotError::MissingQuestion((*missing).clone()));
        }
        if let Some(extra) = self.entries.keys().find(|id| !expected.contains_key(id)) {
            return Err(SnapshotError::UnexpectedQuestion(extra.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<QuestionId> {
        raw.iter().copied().map(QuestionId::new).collect()
    }

    #[test]
    fn initialize_empty_has_one_null_per_question() {
        let questions = ids(&["Q1", "Q2", "Q3"]);
        let map = AnswerMap::initialize_empty(&questions);
        assert_eq!(map.len(), 3);
        for id in &questions {
            assert!(map.contains(id));
            assert!(map.get(id).is_none());
        }
        assert_eq!(map.answered_count(), 0);
        assert_eq!(map, AnswerMap::initialize_empty(&questions));
    }

    #[test]
    fn set_answer_replaces_only_target_entry() {
        let questions = ids(&["Q1", "Q2"]);
        let mut map = AnswerMap::initialize_empty(&questions);
        map.set_answer(&questions[0], Some(AnswerValue::single("A2")))
            .unwrap();

        assert_eq!(map.get(&questions[0]), Some(&AnswerValue::single("A2")));
        assert!(map.get(&questions[1]).is_none());
        assert_eq!(map.len(), 2);

        map.set_answer(&questions[0], None).unwrap();
        assert!(map.get(&questions[0]).is_none());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn set_answer_rejects_unknown_question() {
        let mut map = AnswerMap::initialize_empty(&ids(&["Q1"]));
        let err = map
            .set_answer(&QuestionId::new("Q9"), Some(AnswerValue::single("x")))
            .unwrap_err();
        assert_eq!(err, AnswerError::UnknownQuestion(QuestionId::new("Q9")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn snapshot_matches_plain_json_shape() {
        let questions = ids(&["Q1", "Q2"]);
        let map = AnswerMap::initialize_empty(&questions)
            .with_answer(&questions[0], Some(AnswerValue::single("A2")))
            .unwrap();
        assert_eq!(map.to_snapshot().unwrap(), r#"{"Q1":"A2","Q2":null}"#);
    }

    #[test]
    fn snapshot_round_trips_every_variant() {
        let questions = ids(&["blank", "single", "multi", "match"]);
        let map = AnswerMap::initialize_empty(&questions)
            .with_answer(&questions[1], Some(AnswerValue::single("B")))
            .and_then(|m| m.with_answer(&questions[2], Some(AnswerValue::multiple(["C", "A"]))))
            .and_then(|m| {
                m.with_answer(
                    &questions[3],
                    Some(AnswerValue::matching([("left-1", "right-2"), ("left-2", "right-1")])),
                )
            })
            .unwrap();

        let restored = AnswerMap::from_snapshot(&map.to_snapshot().unwrap()).unwrap();
        assert_eq!(restored, map);
        assert_eq!(
            restored.get(&questions[2]),
            Some(&AnswerValue::multiple(["C", "A"]))
        );
    }

    #[test]
    fn from_snapshot_rejects_non_answer_json() {
        for raw in ["not json", "[1,2]", r#"{"Q1":42}"#, r#"{"Q1":["a",1]}"#, "\"text\""] {
            assert!(
                matches!(AnswerMap::from_snapshot(raw), Err(SnapshotError::Malformed(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn ensure_covers_detects_key_set_mismatch() {
        let questions = ids(&["Q1", "Q2"]);
        let partial = AnswerMap::from_snapshot(r#"{"Q1":null}"#).unwrap();
        assert_eq!(
            partial.ensure_covers(&questions),
            Err(SnapshotError::MissingQuestion(QuestionId::new("Q2")))
        );

        let extra = AnswerMap::from_snapshot(r#"{"Q1":null,"Q2":null,"Q3":"x"}"#).unwrap();
        assert_eq!(
            extra.ensure_covers(&questions),
            Err(SnapshotError::UnexpectedQuestion(QuestionId::new("Q3")))
        );

        let exact = AnswerMap::initialize_empty(&questions);
        assert_eq!(exact.ensure_covers(&questions), Ok(()));
    }

    #[test]
    fn empty_selections_do_not_count_as_answered() {
        let questions = ids(&["Q1", "Q2", "Q3"]);
        let map = AnswerMap::initialize_empty(&questions)
            .with_answer(&questions[0], Some(AnswerValue::multiple(Vec::<String>::new())))
            .and_then(|m| {
                m.with_answer(
                    &questions[1],
                    Some(AnswerValue::Matching(BTreeMap::new())),
                )
            })
            .and_then(|m| m.with_answer(&questions[2], Some(AnswerValue::single("x"))))
            .unwrap();
        assert_eq!(map.answered_count(), 1);
        assert!(!map.is_answered(&questions[0]));
        assert!(map.is_answered(&questions[2]));
    }
}
