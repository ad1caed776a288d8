//! Configuration constants for the quiz session engine
//!
//! This module contains all the configuration limits and constraints
//! used throughout the session engine to ensure data integrity and
//! provide consistent boundaries for different components.

/// Session lifecycle configuration constants
pub mod session {
    /// Duration in seconds of the countdown shown before a question opens
    pub const COUNTDOWN_SECONDS: u64 = 3;
    /// Maximum number of sessions that have not ended at any one time
    pub const MAX_LIVE_SESSIONS: usize = 10;
    /// Number of random draws for a free session ID before creation fails
    pub const MAX_ID_ATTEMPTS: usize = 128;
    /// Maximum value for the auto-start player threshold (0 disables it)
    pub const MAX_AUTO_START_THRESHOLD: usize = 50;
}

/// Quiz snapshot configuration constants
pub mod quiz {
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of questions in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a question text in characters
    pub const MAX_QUESTION_LENGTH: usize = 200;
    /// Minimum time limit in seconds for answering a question
    pub const MIN_DURATION: u64 = 1;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_DURATION: u64 = 240;
    /// Minimum number of answer options for a question
    pub const MIN_ANSWER_COUNT: usize = 2;
    /// Maximum number of answer options for a question
    pub const MAX_ANSWER_COUNT: usize = 8;
    /// Maximum length of answer text in characters
    pub const MAX_ANSWER_LENGTH: usize = 200;
}

/// Player name configuration constants
pub mod name {
    /// Number of letters at the start of a generated name
    pub const GENERATED_LETTERS: usize = 5;
    /// Number of digits at the end of a generated name
    pub const GENERATED_DIGITS: usize = 3;
    /// Maximum length of a requested player name in characters
    pub const MAX_LENGTH: usize = 30;
}

/// Session chat configuration constants
pub mod chat {
    /// Minimum length of a chat message in characters
    pub const MIN_MESSAGE_LENGTH: usize = 1;
    /// Maximum length of a chat message in characters
    pub const MAX_MESSAGE_LENGTH: usize = 100;
}
