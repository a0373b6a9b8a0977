#![forbid(unsafe_code)]

pub mod app_services;
pub mod autosave;
pub mod error;
pub mod exam;
pub mod timer;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use autosave::{AutosaveConfig, AutosaveScheduler, ManualSaveNotice};
pub use error::{AppServicesError, ExamSessionError};
pub use exam::{
    ExamProgress, ExamSession, ExamSessionService, QuestionMarker, ResumeChoice, ResumeFlow,
    ResumeOutcome,
};
pub use timer::{Countdown, TimerSignal, format_remaining};
