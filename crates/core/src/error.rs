use thiserror::Error;

use crate::model::{IdError, ProgressValueError, QuestionError, SessionError, TenseError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Progress(#[from] ProgressValueError),
    #[error(transparent)]
    Tense(#[from] TenseError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
