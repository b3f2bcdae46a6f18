use std::sync::Arc;

use lingua_core::TenseCatalog;
use storage::ProgressStore;
use storage::repository::{RemoteProgressRepository, Storage};
use tracing::info;

use crate::Clock;
use crate::config::ServicesConfig;
use crate::error::AppServicesError;
use crate::gate::SyncGate;
use crate::practice_service::PracticeService;
use crate::progress_service::ProgressService;
use crate::quiz_service::{QuestionGenerator, QuizService};
use crate::rest_remote::RestProgressRemote;
use crate::sync_service::SyncService;

/// Assembles app-facing services around one shared progress store.
#[derive(Clone)]
pub struct AppServices {
    catalog: &'static TenseCatalog,
    sync: Arc<SyncService>,
    progress: Arc<ProgressService>,
    quiz: Arc<QuizService>,
    practice: Arc<PracticeService>,
}

impl AppServices {
    /// Build services backed by `SQLite`.
    ///
    /// The remote table is the hosted REST API when `config.remote` is set,
    /// otherwise the `user_progress` table of `remote_db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        remote_db_url: &str,
        clock: Clock,
        config: ServicesConfig,
    ) -> Result<Self, AppServicesError> {
        let table_url = if config.remote.is_some() {
            db_url
        } else {
            remote_db_url
        };
        let mut storage = Storage::sqlite(db_url, table_url).await?;
        if let Some(remote) = config.remote.clone() {
            info!(base_url = %remote.base_url, "using hosted progress table");
            let rest: Arc<dyn RemoteProgressRepository> = Arc::new(RestProgressRemote::new(remote));
            storage.remote = rest;
        }
        Ok(Self::from_storage(storage, clock, config))
    }

    /// Wire services over an existing storage aggregate.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, config: ServicesConfig) -> Self {
        let catalog = TenseCatalog::builtin();
        let store = ProgressStore::new(Arc::clone(&storage.local), catalog);
        let gate = SyncGate::new();

        let sync = Arc::new(SyncService::new(
            clock,
            store.clone(),
            Arc::clone(&storage.remote),
            gate.clone(),
            config.sync,
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            store,
            Arc::clone(&storage.remote),
            gate,
            config.sync,
        ));
        let quiz = Arc::new(QuizService::new(config.quiz));
        let generator: Arc<dyn QuestionGenerator> = quiz.clone();
        let practice = Arc::new(PracticeService::new(
            catalog,
            generator,
            Arc::clone(&progress),
        ));

        Self {
            catalog,
            sync,
            progress,
            quiz,
            practice,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &'static TenseCatalog {
        self.catalog
    }

    #[must_use]
    pub fn sync(&self) -> Arc<SyncService> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }
}
