use std::sync::Arc;

use lingua_core::TenseCatalog;
use lingua_core::model::{QuizQuestion, QuizSession, SessionError, TenseId, TenseProgress, UserId};
use tracing::info;

use crate::error::PracticeError;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuestionGenerator;

/// Result of answering one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_answer: String,
    pub step: u8,
    pub total: u8,
    pub complete: bool,
}

/// Drives a practice session: fetch questions, grade answers, record the
/// earned progress when the session ends.
#[derive(Clone)]
pub struct PracticeService {
    catalog: &'static TenseCatalog,
    generator: Arc<dyn QuestionGenerator>,
    progress: Arc<ProgressService>,
}

impl PracticeService {
    #[must_use]
    pub fn new(
        catalog: &'static TenseCatalog,
        generator: Arc<dyn QuestionGenerator>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            catalog,
            generator,
            progress,
        }
    }

    /// Open a session for `tense_id`.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::UnknownTense` for ids outside the catalog and
    /// `PracticeError::Session` if the tense is still locked.
    pub async fn start(&self, tense_id: &TenseId) -> Result<QuizSession, PracticeError> {
        let def = self
            .catalog
            .get(tense_id)
            .ok_or_else(|| PracticeError::UnknownTense(tense_id.clone()))?;
        let current = self
            .progress
            .record(tense_id)
            .await?
            .unwrap_or_else(|| TenseProgress::seeded(def));
        Ok(QuizSession::start(def, &current)?)
    }

    /// Generate and present the next question of `session`.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Quiz` if generation fails, or
    /// `PracticeError::Session` once the session is complete.
    pub async fn next_question<'s>(
        &self,
        session: &'s mut QuizSession,
    ) -> Result<&'s QuizQuestion, PracticeError> {
        let def = self
            .catalog
            .get(session.tense_id())
            .ok_or_else(|| PracticeError::UnknownTense(session.tense_id().clone()))?;
        if session.is_complete() {
            return Err(SessionError::Completed.into());
        }
        let question = self.generator.generate(def).await?;
        Ok(session.present(question)?)
    }

    /// Grade `answer` against the pending question.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Session` if no question is pending.
    pub fn answer(&self, session: &mut QuizSession, answer: &str) -> Result<AnswerResult, PracticeError> {
        let correct_answer = session
            .pending()
            .map(|q| q.correct_answer.clone())
            .unwrap_or_default();
        let step = session.step();
        let correct = session.answer(answer)?;
        Ok(AnswerResult {
            correct,
            correct_answer,
            step,
            total: session.total(),
            complete: session.is_complete(),
        })
    }

    /// Record the progress earned by a completed session.
    ///
    /// The gain is applied to the record as stored when the write happens,
    /// so a sync finishing mid-session is built upon rather than overwritten.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Session` if the session is incomplete (nothing
    /// written), or `PracticeError::Progress` if the local store fails.
    pub async fn finish(
        &self,
        user_id: Option<&UserId>,
        session: &QuizSession,
    ) -> Result<TenseProgress, PracticeError> {
        let tense_id = session.tense_id();
        let updated = self
            .progress
            .update_with(user_id, tense_id, |previous| {
                Ok::<_, PracticeError>(session.outcome(previous)?)
            })
            .await?;
        info!(
            %tense_id,
            correct = session.correct(),
            total = session.total(),
            progress = %updated.progress,
            "practice session recorded"
        );
        Ok(updated)
    }
}
