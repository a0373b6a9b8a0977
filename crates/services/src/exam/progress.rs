use exam_core::model::QuestionId;

/// Aggregated view of exam progress for the navigator and footer buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamProgress {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub current_index: usize,
    pub is_first: bool,
    pub is_last: bool,
    pub is_finished: bool,
}

/// One navigator cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionMarker {
    pub index: usize,
    pub question_id: QuestionId,
    pub answered: bool,
    pub current: bool,
}
