mod progress;
mod resume;
mod session;
mod workflow;

// Public API of the exam session subsystem.
pub use crate::error::ExamSessionError;
pub use progress::{ExamProgress, QuestionMarker};
pub use resume::{ResumeChoice, ResumeFlow, ResumeOutcome};
pub use session::ExamSession;
pub use workflow::ExamSessionService;
