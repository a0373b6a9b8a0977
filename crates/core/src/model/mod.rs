mod answer;
mod exam;
mod ids;
mod session;

pub use answer::{AnswerError, AnswerMap, AnswerValue, SnapshotError};
pub use exam::{Exam, ExamError};
pub use ids::{DEFAULT_KEY_NAMESPACE, ExamId, QuestionId, SessionKey, Username};
pub use session::{FinishReason, ParseFinishReasonError, SaveStatus, SessionPhase, Submission};
