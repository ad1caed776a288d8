//! Immutable quiz content for a running session
//!
//! This module defines the snapshot of a quiz that a session plays through.
//! The snapshot is taken when the session starts and never changes afterwards,
//! so edits to the underlying quiz cannot leak into a running session. It also
//! defines the identifier types for hosts, quizzes, questions and answers.

use std::{
    collections::HashSet,
    fmt::Display,
    str::FromStr,
    time::Duration,
};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

/// A unique identifier for a quiz host
///
/// Hosts are authenticated outside of this crate; the session engine only
/// receives their resolved identity and uses it for ownership checks.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct HostId(Uuid);

impl HostId {
    /// Creates a new random host ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for HostId {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for HostId {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A unique identifier for a quiz
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct QuizId(Uuid);

impl QuizId {
    /// Creates a new random quiz ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QuizId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuizId {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A unique identifier for a question within a quiz
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct QuestionId(Uuid);

impl QuestionId {
    /// Creates a new random question ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuestionId {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A unique identifier for an answer option within a question
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct AnswerId(Uuid);

impl AnswerId {
    /// Creates a new random answer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnswerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AnswerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AnswerId {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
///
/// # Arguments
///
/// * `field` - Name of the field being validated (for error messages)
/// * `val` - The duration value to validate
///
/// # Returns
///
/// `Ok(())` if the duration is valid, `Err` with descriptive message if not
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the time limit for answering a question
fn validate_question_duration(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::quiz::MIN_DURATION },
        { crate::constants::quiz::MAX_DURATION },
    >("duration", val)
}

/// Validates that a question has at least one answer marked correct
fn validate_some_correct(answers: &[AnswerSnapshot]) -> ValidationResult {
    if answers.iter().any(|answer| answer.correct) {
        Ok(())
    } else {
        Err(garde::Error::new("question has no correct answer"))
    }
}

/// A single answer option of a question
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerSnapshot {
    /// Identity of this answer option, stable for the session's lifetime
    #[garde(skip)]
    pub id: AnswerId,
    /// The text shown for this answer option
    #[garde(length(max = crate::constants::quiz::MAX_ANSWER_LENGTH))]
    pub text: String,
    /// Whether this answer option is correct
    #[garde(skip)]
    pub correct: bool,
}

/// A single question of a quiz as the session plays it
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionSnapshot {
    /// Identity of this question, stable for the session's lifetime
    #[garde(skip)]
    pub id: QuestionId,
    /// The question text that will be displayed to players
    #[garde(length(max = crate::constants::quiz::MAX_QUESTION_LENGTH))]
    pub text: String,
    /// Duration players have to submit their answer once the question opens
    #[garde(custom(|v, _| validate_question_duration(v)))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub duration: Duration,
    /// Points awarded for the fastest fully correct submission
    #[garde(range(min = 1))]
    pub points: u64,
    /// The available answer options for this question
    #[garde(
        length(min = crate::constants::quiz::MIN_ANSWER_COUNT, max = crate::constants::quiz::MAX_ANSWER_COUNT),
        custom(|v, _| validate_some_correct(v)),
        dive
    )]
    pub answers: Vec<AnswerSnapshot>,
}

impl QuestionSnapshot {
    /// Returns the set of all answer IDs belonging to this question
    pub fn answer_ids(&self) -> HashSet<AnswerId> {
        self.answers.iter().map(|answer| answer.id).collect()
    }

    /// Returns the set of answer IDs marked correct
    pub fn correct_ids(&self) -> HashSet<AnswerId> {
        self.answers
            .iter()
            .filter(|answer| answer.correct)
            .map(|answer| answer.id)
            .collect()
    }

    /// Returns the answer options marked correct, in their original order
    pub fn correct_answers(&self) -> impl Iterator<Item = &AnswerSnapshot> {
        self.answers.iter().filter(|answer| answer.correct)
    }
}

/// A deep copy of quiz content taken when a session starts
///
/// The snapshot owns all of its data. Later edits of the quiz it was taken
/// from do not affect it, which keeps a running session consistent from
/// start to finish.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizSnapshot {
    /// Identity of the quiz this snapshot was taken from
    #[garde(skip)]
    pub id: QuizId,
    /// Title of the quiz
    #[garde(length(max = crate::constants::quiz::MAX_TITLE_LENGTH))]
    pub title: String,
    /// The questions of the quiz in playback order
    #[garde(length(max = crate::constants::quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<QuestionSnapshot>,
}

impl QuizSnapshot {
    /// Returns the number of questions in the quiz
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns whether the quiz has no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Retrieves a question by its 1-based position
    ///
    /// # Arguments
    ///
    /// * `position` - The position of the question, starting at 1
    ///
    /// # Returns
    ///
    /// The question at that position, or `None` if the position is 0 or past
    /// the end of the quiz
    pub fn question(&self, position: usize) -> Option<&QuestionSnapshot> {
        self.questions.get(position.checked_sub(1)?)
    }
}
