use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, TenseId};
use crate::model::progress::{Percent, TenseProgress};
use crate::model::tense::{TenseDefinition, TenseStatus};

/// Placeholder marking the gap the learner has to fill.
pub const BLANK: &str = "_____";

/// Number of answer choices per question.
pub const OPTION_COUNT: usize = 4;

/// Questions per practice session.
pub const SESSION_LENGTH: u8 = 5;

/// Progress points a flawless session adds.
pub const MAX_SESSION_GAIN: u8 = 20;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("sentence has no blank")]
    MissingBlank,
    #[error("expected 4 options, got {0}")]
    OptionCount(usize),
    #[error("options must be non-empty and distinct")]
    InvalidOptions,
    #[error("correct answer is not among the options")]
    AnswerNotOffered,
    #[error("translation is empty")]
    EmptyTranslation,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("tense {0} is locked")]
    Locked(TenseId),
    #[error("question belongs to tense {found}, session is for {expected}")]
    WrongTense { expected: TenseId, found: TenseId },
    #[error("no question is waiting for an answer")]
    NoPendingQuestion,
    #[error("session already completed")]
    Completed,
    #[error("session is not complete yet")]
    Incomplete,
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// Unvalidated question payload as produced by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub sentence: String,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub translation: String,
}

impl QuestionDraft {
    /// Validate the draft and bind it to a tense.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the sentence has no blank, the option list
    /// is not exactly four distinct non-empty strings, the answer is not one
    /// of the options, or the translation is empty.
    pub fn validate(self, tense_id: TenseId) -> Result<QuizQuestion, QuestionError> {
        let sentence = self.sentence.trim().to_owned();
        if !sentence.contains(BLANK) {
            return Err(QuestionError::MissingBlank);
        }

        let options: Vec<String> = self.options.iter().map(|o| o.trim().to_owned()).collect();
        let options: [String; OPTION_COUNT] = options
            .try_into()
            .map_err(|v: Vec<String>| QuestionError::OptionCount(v.len()))?;
        let distinct = options
            .iter()
            .enumerate()
            .all(|(i, o)| !o.is_empty() && !options[..i].contains(o));
        if !distinct {
            return Err(QuestionError::InvalidOptions);
        }

        let correct_answer = self.correct_answer.trim().to_owned();
        if !options.contains(&correct_answer) {
            return Err(QuestionError::AnswerNotOffered);
        }

        let translation = self.translation.trim().to_owned();
        if translation.is_empty() {
            return Err(QuestionError::EmptyTranslation);
        }

        Ok(QuizQuestion {
            id: QuestionId::random(),
            tense_id,
            sentence,
            correct_answer,
            options,
            translation,
        })
    }
}

/// A validated multiple-choice question for one tense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub tense_id: TenseId,
    pub sentence: String,
    pub correct_answer: String,
    pub options: [String; OPTION_COUNT],
    pub translation: String,
}

impl QuizQuestion {
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer.trim()
    }

    /// Sentence with the blank replaced by `fill`.
    #[must_use]
    pub fn filled(&self, fill: &str) -> String {
        self.sentence.replacen(BLANK, fill, 1)
    }
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// Five-question practice run for a single tense.
#[derive(Debug, Clone)]
pub struct QuizSession {
    tense_id: TenseId,
    total: u8,
    answered: u8,
    correct: u8,
    pending: Option<QuizQuestion>,
}

impl QuizSession {
    /// Start a session for `def` given the learner's current record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Locked` if the tense is locked.
    pub fn start(def: &TenseDefinition, current: &TenseProgress) -> Result<Self, SessionError> {
        if !current.status.is_practicable() {
            return Err(SessionError::Locked(def.id.clone()));
        }
        Ok(Self {
            tense_id: def.id.clone(),
            total: SESSION_LENGTH,
            answered: 0,
            correct: 0,
            pending: None,
        })
    }

    #[must_use]
    pub fn tense_id(&self) -> &TenseId {
        &self.tense_id
    }

    /// 1-based index of the question currently shown.
    #[must_use]
    pub fn step(&self) -> u8 {
        (self.answered + 1).min(self.total)
    }

    #[must_use]
    pub fn total(&self) -> u8 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u8 {
        self.correct
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answered >= self.total
    }

    #[must_use]
    pub fn pending(&self) -> Option<&QuizQuestion> {
        self.pending.as_ref()
    }

    /// Present the next question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once all questions were answered, or
    /// `SessionError::WrongTense` if the question targets another tense.
    pub fn present(&mut self, question: QuizQuestion) -> Result<&QuizQuestion, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        if question.tense_id != self.tense_id {
            return Err(SessionError::WrongTense {
                expected: self.tense_id.clone(),
                found: question.tense_id,
            });
        }
        Ok(self.pending.insert(question))
    }

    /// Grade the answer to the pending question. Returns whether it was correct.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoPendingQuestion` when nothing is being asked.
    pub fn answer(&mut self, answer: &str) -> Result<bool, SessionError> {
        let question = self.pending.take().ok_or(SessionError::NoPendingQuestion)?;
        let correct = question.is_correct(answer);
        self.answered += 1;
        if correct {
            self.correct += 1;
        }
        Ok(correct)
    }

    /// Progress and status earned by this session on top of `previous`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Incomplete` before the last answer.
    pub fn outcome(&self, previous: &TenseProgress) -> Result<(Percent, TenseStatus), SessionError> {
        if !self.is_complete() {
            return Err(SessionError::Incomplete);
        }
        let gain = u32::from(MAX_SESSION_GAIN) * u32::from(self.correct) / u32::from(self.total);
        let progress =
            Percent::saturating(i64::from(previous.progress.value()) + i64::from(gain));
        Ok((progress, TenseStatus::earned_for(progress)))
    }
}
