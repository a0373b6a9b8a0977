use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::autosave::AutosaveConfig;
use crate::error::AppServicesError;
use crate::exam::ExamSessionService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    exam_sessions: Arc<ExamSessionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        namespace: &str,
        autosave: AutosaveConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, namespace, autosave))
    }

    /// Build services over an existing storage aggregate.
    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        namespace: &str,
        autosave: AutosaveConfig,
    ) -> Self {
        let exam_sessions = Arc::new(
            ExamSessionService::new(clock, storage.progress, storage.submissions)
            .with_key_namespace(namespace)
            .with_autosave_config(autosave),
        );
        Self { exam_sessions }
    }

    #[must_use]
    pub fn exam_sessions(&self) -> Arc<ExamSessionService> {
        Arc::clone(&self.exam_sessions)
    }
}
