#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod gate;
pub mod practice_service;
pub mod progress_service;
pub mod quiz_service;
pub mod rest_remote;
pub mod sync_service;

pub use lingua_core::Clock;

pub use app_services::AppServices;
pub use config::{QuizConfig, RemoteConfig, ServicesConfig, SyncConfig};
pub use error::{AppServicesError, ConfigError, PracticeError, ProgressError, QuizError};
pub use gate::SyncGate;
pub use practice_service::{AnswerResult, PracticeService};
pub use progress_service::ProgressService;
pub use quiz_service::{QuestionGenerator, QuizService};
pub use rest_remote::RestProgressRemote;
pub use sync_service::{SyncOutcome, SyncReport, SyncService};
