mod ids;
mod progress;
mod quiz;
mod summary;
mod tense;

pub use ids::{IdError, QuestionId, TenseId, UserId};
pub use progress::{Percent, ProgressValueError, RemoteProgressRecord, TenseProgress};
pub use quiz::{
    BLANK, MAX_SESSION_GAIN, OPTION_COUNT, QuestionDraft, QuestionError, QuizQuestion,
    QuizSession, SESSION_LENGTH, SessionError,
};
pub use summary::{CategorySummary, ProgressSummary};
pub use tense::{TenseCategory, TenseDefinition, TenseError, TenseStatus};
