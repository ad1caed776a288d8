//! Session state machine
//!
//! This module contains the state machine driving one running quiz session:
//! question-by-question playback steered by host actions and timer alarms,
//! player joins with an optional automatic start, answer collection while a
//! question is open, the scoring hooks on leaving it, and the session chat.
//!
//! The machine is deliberately pure. It never reads the clock and never
//! schedules anything itself; callers pass the current time in and receive
//! timer requests back, which keeps every transition deterministic and
//! directly testable.

use std::{
    collections::HashSet,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    constants::{chat, session},
    leaderboard::{FinalResult, Leaderboard},
    names,
    quiz::{AnswerId, QuizSnapshot},
    roster::{PlayerId, Roster},
};

/// The phase a session is currently in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Waiting for players to join before the first question
    Lobby,
    /// Short countdown shown before a question opens for answers
    QuestionCountdown,
    /// The current question is accepting answer submissions
    QuestionOpen,
    /// The answering window has closed and submissions are frozen
    QuestionClose,
    /// The correct answers and per-question results are on display
    AnswerShow,
    /// The final ranking is on display
    FinalResults,
    /// The session is over (terminal)
    End,
}

/// Actions a host can apply to steer a session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostAction {
    /// Move on to the countdown of the next question
    NextQuestion,
    /// Cut the countdown short and open the question immediately
    SkipCountdown,
    /// Reveal the answers, closing the question first if it is still open
    GoToAnswer,
    /// Move from the answer display to the final ranking
    GoToFinalResults,
    /// End the session
    End,
}

/// Alarm messages for timed transitions
///
/// Each alarm carries the question position it was scheduled for. On
/// delivery the session checks that it is still at that position and in the
/// state the alarm expects; an alarm that no longer matches is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The pre-question countdown ran out
    ProceedFromCountdownIntoQuestion {
        /// 1-based position of the question that was counting down
        position: usize,
    },
    /// The answering window ran out
    ProceedFromQuestionIntoClose {
        /// 1-based position of the question that was open
        position: usize,
    },
}

/// A request to schedule a single-fire alarm
///
/// Transitions that need a timed follow-up return one of these for the
/// caller to schedule; the state machine never touches the clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    /// The alarm to deliver back to the session
    pub message: AlarmMessage,
    /// How long to wait before delivering it
    pub after: Duration,
}

/// A chat message posted to a session
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The posting player's ID
    pub player_id: PlayerId,
    /// The posting player's name
    pub player_name: String,
    /// The message body
    pub body: String,
    /// When the message was posted
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub sent_at: SystemTime,
}

/// A host-facing snapshot of where a session currently stands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    /// The session's current state
    pub state: State,
    /// 1-based position of the current question
    pub current_question_index: usize,
    /// Player names in join order
    pub players: Vec<String>,
}

/// Error returned for a host action the current state does not allow
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionError {
    /// The action is not one of the current state's outgoing edges
    #[error("action is not allowed in the current state")]
    InvalidAction,
}

/// Errors that can occur when a player joins a session
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinError {
    /// Players can only join while the session is in the lobby
    #[error("session is no longer accepting players")]
    NotLobby,
    /// The requested name is already in use within the session
    #[error("name already in-use")]
    NameTaken,
    /// The requested name is empty after trimming, too long, or
    /// inappropriate
    #[error("name is not allowed")]
    NameInvalid,
}

impl From<names::Error> for JoinError {
    fn from(error: names::Error) -> Self {
        match error {
            names::Error::Used | names::Error::Assigned => Self::NameTaken,
            names::Error::Empty | names::Error::Sinful | names::Error::TooLong => {
                Self::NameInvalid
            }
        }
    }
}

/// Errors that can occur when a player submits an answer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmitError {
    /// The player is not part of this session
    #[error("player does not exist")]
    UnknownPlayer,
    /// The session is not currently accepting submissions
    #[error("question is not open for answers")]
    NotOpen,
    /// The submission targets a question other than the current one
    #[error("submission is for a different question")]
    WrongQuestion,
    /// The submitted set is empty, contains duplicates, or references
    /// answers that do not belong to the current question
    #[error("answer selection is not valid for this question")]
    InvalidAnswerSet,
}

/// Errors that can occur when fetching the final results
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultError {
    /// The player is not part of this session
    #[error("player does not exist")]
    UnknownPlayer,
    /// Results are only available while the final ranking is on display
    #[error("final results are not available in the current state")]
    NotFinal,
}

/// Errors that can occur around the session chat
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChatError {
    /// The player is not part of this session
    #[error("player does not exist")]
    UnknownPlayer,
    /// Message bodies must be between 1 and 100 characters
    #[error("message length is out of range")]
    LengthOutOfRange,
}

/// The state machine of one running quiz session
#[serde_with::serde_as]
#[derive(Debug, Serialize, Deserialize)]
pub struct Game {
    /// The quiz content this session plays through
    quiz: QuizSnapshot,
    /// Player count that triggers an automatic start (0 disables it)
    auto_start_threshold: usize,
    /// Current phase of the session
    state: State,
    /// 1-based position of the current question; starts at 1 and never
    /// decreases
    current_position: usize,
    /// When the current question opened for answers
    #[serde_as(as = "Option<serde_with::TimestampMilliSeconds<i64>>")]
    opened_at: Option<SystemTime>,
    /// The session's players
    roster: Roster,
    /// Scoring engine holding the per-question results so far
    leaderboard: Leaderboard,
    /// Final ranking, set on entering the results screen
    final_result: Option<FinalResult>,
    /// Chat messages in arrival order
    messages: Vec<Message>,
}

impl Game {
    /// Creates a session state machine in the lobby
    ///
    /// # Arguments
    ///
    /// * `quiz` - The snapshot of quiz content to play through; must have
    ///   at least one question (enforced by the registry)
    /// * `auto_start_threshold` - Player count that starts the quiz
    ///   automatically, 0 to disable
    pub fn new(quiz: QuizSnapshot, auto_start_threshold: usize) -> Self {
        Self {
            quiz,
            auto_start_threshold,
            state: State::Lobby,
            current_position: 1,
            opened_at: None,
            roster: Roster::default(),
            leaderboard: Leaderboard::default(),
            final_result: None,
            messages: Vec::new(),
        }
    }

    /// Returns the session's current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the 1-based position of the current question
    pub fn current_position(&self) -> usize {
        self.current_position
    }

    /// Returns the session's players
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Returns the final ranking if the session has reached it
    pub fn final_result(&self) -> Option<&FinalResult> {
        self.final_result.as_ref()
    }

    /// Returns a host-facing snapshot of the session
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            current_question_index: self.current_position,
            players: self.roster.names_in_join_order(),
        }
    }

    /// Moves the session into the countdown of the question at `position`
    fn begin_countdown(&mut self, position: usize) -> TimerRequest {
        self.state = State::QuestionCountdown;
        self.current_position = position;
        self.opened_at = None;

        TimerRequest {
            message: AlarmMessage::ProceedFromCountdownIntoQuestion { position },
            after: Duration::from_secs(session::COUNTDOWN_SECONDS),
        }
    }

    /// Opens the current question for answers
    fn open_question(&mut self, now: SystemTime) -> Option<TimerRequest> {
        let Some(question) = self.quiz.question(self.current_position) else {
            return None;
        };
        let duration = question.duration;

        self.state = State::QuestionOpen;
        self.opened_at = Some(now);

        Some(TimerRequest {
            message: AlarmMessage::ProceedFromQuestionIntoClose {
                position: self.current_position,
            },
            after: duration,
        })
    }

    /// Freezes submissions and scores the current question
    ///
    /// Runs exactly once per question: both ways out of the open answering
    /// window (the host revealing answers early and the duration running
    /// out) pass through here, and each position reaches the open window
    /// at most once.
    fn close_question(&mut self) {
        if let (Some(question), Some(opened_at)) =
            (self.quiz.question(self.current_position), self.opened_at)
        {
            self.leaderboard.score_question(
                question,
                self.current_position,
                opened_at,
                &mut self.roster,
            );
        }
        self.opened_at = None;
    }

    /// Applies a host action to the session
    ///
    /// # Arguments
    ///
    /// * `action` - The action the host asked for
    /// * `now` - The current time, recorded as the opening instant when the
    ///   action opens a question
    ///
    /// # Returns
    ///
    /// A timer request when the new state needs a scheduled follow-up. Any
    /// previously scheduled alarm is superseded by a successful transition.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidAction`] if the current state does not
    /// have an edge for the action; the session is left untouched.
    pub fn apply(
        &mut self,
        action: HostAction,
        now: SystemTime,
    ) -> Result<Option<TimerRequest>, ActionError> {
        match (self.state, action) {
            (State::Lobby, HostAction::NextQuestion) => Ok(Some(self.begin_countdown(1))),
            (State::QuestionClose | State::AnswerShow, HostAction::NextQuestion) => {
                let next = self.current_position + 1;
                if next > self.quiz.len() {
                    return Err(ActionError::InvalidAction);
                }
                Ok(Some(self.begin_countdown(next)))
            }
            (State::QuestionCountdown, HostAction::SkipCountdown) => Ok(self.open_question(now)),
            (State::QuestionOpen, HostAction::GoToAnswer) => {
                self.close_question();
                self.state = State::AnswerShow;
                Ok(None)
            }
            (State::QuestionClose, HostAction::GoToAnswer) => {
                self.state = State::AnswerShow;
                Ok(None)
            }
            (State::AnswerShow, HostAction::GoToFinalResults) => {
                self.final_result = Some(self.leaderboard.final_result(&self.roster));
                self.state = State::FinalResults;
                Ok(None)
            }
            (State::End, _) => Err(ActionError::InvalidAction),
            (_, HostAction::End) => {
                self.state = State::End;
                self.opened_at = None;
                Ok(None)
            }
            _ => Err(ActionError::InvalidAction),
        }
    }

    /// Handles a scheduled alarm firing
    ///
    /// The alarm only takes effect if the session is still at the question
    /// position it was scheduled for, in the state it expects. A stale
    /// alarm, including one firing after the session ended, is a silent
    /// no-op.
    ///
    /// # Arguments
    ///
    /// * `message` - The alarm that fired
    /// * `now` - The current time, recorded as the opening instant when the
    ///   alarm opens a question
    ///
    /// # Returns
    ///
    /// A timer request when the new state needs a scheduled follow-up
    pub fn receive_alarm(
        &mut self,
        message: AlarmMessage,
        now: SystemTime,
    ) -> Option<TimerRequest> {
        match message {
            AlarmMessage::ProceedFromCountdownIntoQuestion { position }
                if self.state == State::QuestionCountdown
                    && self.current_position == position =>
            {
                self.open_question(now)
            }
            AlarmMessage::ProceedFromQuestionIntoClose { position }
                if self.state == State::QuestionOpen && self.current_position == position =>
            {
                self.close_question();
                self.state = State::QuestionClose;
                None
            }
            _ => None,
        }
    }

    /// Adds a player to the session
    ///
    /// An empty requested name means the player wants a generated one.
    /// When the join brings the roster up to a non-zero auto-start
    /// threshold, the session starts as if the host had asked for the next
    /// question.
    ///
    /// # Arguments
    ///
    /// * `id` - The player's registry-wide identifier
    /// * `requested_name` - The name the player asked for, or `""` for a
    ///   generated name
    ///
    /// # Returns
    ///
    /// The name the player ended up with, and a timer request when the
    /// join triggered the automatic start
    ///
    /// # Errors
    ///
    /// * [`JoinError::NotLobby`] - The session has already started
    /// * [`JoinError::NameTaken`] - Another player holds that name
    /// * [`JoinError::NameInvalid`] - The name failed validation
    pub fn join(
        &mut self,
        id: PlayerId,
        requested_name: &str,
    ) -> Result<(String, Option<TimerRequest>), JoinError> {
        if self.state != State::Lobby {
            return Err(JoinError::NotLobby);
        }

        let name = self.roster.join(id, requested_name)?;

        let timer = if self.auto_start_threshold > 0
            && self.roster.len() == self.auto_start_threshold
        {
            Some(self.begin_countdown(1))
        } else {
            None
        };

        Ok((name, timer))
    }

    /// Records a player's answer submission for the current question
    ///
    /// A submission for a question the player already answered replaces
    /// the earlier one entirely.
    ///
    /// # Arguments
    ///
    /// * `player` - The submitting player
    /// * `question_index` - The 1-based position the player believes is
    ///   current
    /// * `answer_ids` - The selected answer IDs
    /// * `now` - The submission timestamp
    ///
    /// # Errors
    ///
    /// * [`SubmitError::UnknownPlayer`] - The player never joined
    /// * [`SubmitError::NotOpen`] - No question is accepting answers
    /// * [`SubmitError::WrongQuestion`] - The position is not current
    /// * [`SubmitError::InvalidAnswerSet`] - The selection is empty, has
    ///   duplicates, or references foreign answers
    pub fn submit(
        &mut self,
        player: PlayerId,
        question_index: usize,
        answer_ids: &[AnswerId],
        now: SystemTime,
    ) -> Result<(), SubmitError> {
        if !self.roster.contains(player) {
            return Err(SubmitError::UnknownPlayer);
        }
        if self.state != State::QuestionOpen {
            return Err(SubmitError::NotOpen);
        }
        if question_index != self.current_position {
            return Err(SubmitError::WrongQuestion);
        }
        let Some(question) = self.quiz.question(self.current_position) else {
            return Err(SubmitError::WrongQuestion);
        };

        if answer_ids.is_empty() {
            return Err(SubmitError::InvalidAnswerSet);
        }
        let selected: HashSet<AnswerId> = answer_ids.iter().copied().collect();
        if selected.len() != answer_ids.len() {
            return Err(SubmitError::InvalidAnswerSet);
        }
        if !selected.is_subset(&question.answer_ids()) {
            return Err(SubmitError::InvalidAnswerSet);
        }

        self.roster
            .record_submission(player, self.current_position, selected, now);
        Ok(())
    }

    /// Retrieves the final results on behalf of a player
    ///
    /// # Errors
    ///
    /// * [`ResultError::UnknownPlayer`] - The player never joined
    /// * [`ResultError::NotFinal`] - The session is not on the final
    ///   results screen
    pub fn result(&self, player: PlayerId) -> Result<&FinalResult, ResultError> {
        if !self.roster.contains(player) {
            return Err(ResultError::UnknownPlayer);
        }
        if self.state != State::FinalResults {
            return Err(ResultError::NotFinal);
        }
        self.final_result.as_ref().ok_or(ResultError::NotFinal)
    }

    /// Appends a chat message to the session
    ///
    /// Chat is open in every state, including after the session ended.
    ///
    /// # Errors
    ///
    /// * [`ChatError::UnknownPlayer`] - The player never joined
    /// * [`ChatError::LengthOutOfRange`] - The body is empty or longer
    ///   than 100 characters
    pub fn post_message(
        &mut self,
        player: PlayerId,
        body: &str,
        now: SystemTime,
    ) -> Result<(), ChatError> {
        let Some(player) = self.roster.player(player) else {
            return Err(ChatError::UnknownPlayer);
        };

        let length = body.chars().count();
        if !(chat::MIN_MESSAGE_LENGTH..=chat::MAX_MESSAGE_LENGTH).contains(&length) {
            return Err(ChatError::LengthOutOfRange);
        }

        self.messages.push(Message {
            player_id: player.id,
            player_name: player.name.clone(),
            body: body.to_owned(),
            sent_at: now,
        });
        Ok(())
    }

    /// Returns all chat messages of the session in arrival order
    ///
    /// # Errors
    ///
    /// * [`ChatError::UnknownPlayer`] - The player never joined
    pub fn messages(&self, player: PlayerId) -> Result<&[Message], ChatError> {
        if !self.roster.contains(player) {
            return Err(ChatError::UnknownPlayer);
        }
        Ok(&self.messages)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::quiz::{AnswerSnapshot, QuestionId, QuestionSnapshot, QuizId};

    fn at(seconds: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(seconds)
    }

    fn question(duration_secs: u64, points: u64, answer_count: usize) -> QuestionSnapshot {
        QuestionSnapshot {
            id: QuestionId::new(),
            text: "What is the capital of France?".to_owned(),
            duration: Duration::from_secs(duration_secs),
            points,
            answers: (0..answer_count)
                .map(|i| AnswerSnapshot {
                    id: AnswerId::new(),
                    text: format!("Option {i}"),
                    correct: i == 0,
                })
                .collect(),
        }
    }

    fn quiz(questions: Vec<QuestionSnapshot>) -> QuizSnapshot {
        QuizSnapshot {
            id: QuizId::new(),
            title: "Geography".to_owned(),
            questions,
        }
    }

    /// Quiz from the one-question walkthrough: 4 answers, 1 correct,
    /// duration 1s, 10 points
    fn single_question_game() -> Game {
        Game::new(quiz(vec![question(1, 10, 4)]), 0)
    }

    fn correct_ids(game: &Game, position: usize) -> Vec<AnswerId> {
        game.quiz
            .question(position)
            .unwrap()
            .correct_answers()
            .map(|answer| answer.id)
            .collect()
    }

    #[test]
    fn test_new_game_waits_in_lobby() {
        let game = single_question_game();

        let status = game.status();
        assert_eq!(status.state, State::Lobby);
        assert_eq!(status.current_question_index, 1);
        assert!(status.players.is_empty());
    }

    #[test]
    fn test_next_question_from_lobby_starts_countdown() {
        let mut game = single_question_game();

        let timer = game.apply(HostAction::NextQuestion, at(0)).unwrap();

        assert_eq!(game.state(), State::QuestionCountdown);
        assert_eq!(game.current_position(), 1);
        assert_eq!(
            timer,
            Some(TimerRequest {
                message: AlarmMessage::ProceedFromCountdownIntoQuestion { position: 1 },
                after: Duration::from_secs(3),
            })
        );
    }

    #[test]
    fn test_skip_countdown_opens_question() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();

        let timer = game.apply(HostAction::SkipCountdown, at(1)).unwrap();

        assert_eq!(game.state(), State::QuestionOpen);
        assert_eq!(
            timer,
            Some(TimerRequest {
                message: AlarmMessage::ProceedFromQuestionIntoClose { position: 1 },
                after: Duration::from_secs(1),
            })
        );
    }

    #[test]
    fn test_countdown_alarm_opens_question() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();

        let timer = game.receive_alarm(
            AlarmMessage::ProceedFromCountdownIntoQuestion { position: 1 },
            at(3),
        );

        assert_eq!(game.state(), State::QuestionOpen);
        assert!(timer.is_some());
    }

    #[test]
    fn test_question_alarm_closes_question() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();

        let timer = game.receive_alarm(
            AlarmMessage::ProceedFromQuestionIntoClose { position: 1 },
            at(2),
        );

        assert_eq!(game.state(), State::QuestionClose);
        assert!(timer.is_none());
    }

    #[test]
    fn test_stale_countdown_alarm_is_ignored() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();

        // The superseded countdown alarm arrives late
        let timer = game.receive_alarm(
            AlarmMessage::ProceedFromCountdownIntoQuestion { position: 1 },
            at(3),
        );

        assert_eq!(game.state(), State::QuestionOpen);
        assert!(timer.is_none());
    }

    #[test]
    fn test_stale_question_alarm_does_not_rescore() {
        let mut game = single_question_game();
        let (_, _) = game.join(PlayerId::new(1), "Alice").unwrap();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();
        let correct = correct_ids(&game, 1);
        game.submit(PlayerId::new(1), 1, &correct, at(1)).unwrap();

        game.apply(HostAction::GoToAnswer, at(2)).unwrap();
        let score_after_close = game.roster().player(PlayerId::new(1)).unwrap().score;

        // The cancelled duration alarm arrives late
        let timer = game.receive_alarm(
            AlarmMessage::ProceedFromQuestionIntoClose { position: 1 },
            at(2),
        );

        assert!(timer.is_none());
        assert_eq!(game.state(), State::AnswerShow);
        let score = game.roster().player(PlayerId::new(1)).unwrap().score;
        assert!((score - score_after_close).abs() < f64::EPSILON);
        assert_eq!(game.leaderboard.results().len(), 1);
    }

    #[test]
    fn test_alarm_after_end_is_ignored() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::End, at(1)).unwrap();

        let timer = game.receive_alarm(
            AlarmMessage::ProceedFromCountdownIntoQuestion { position: 1 },
            at(3),
        );

        assert!(timer.is_none());
        assert_eq!(game.state(), State::End);
    }

    #[test]
    fn test_unlisted_pairs_fail_without_state_change() {
        let mut game = single_question_game();

        for action in [
            HostAction::SkipCountdown,
            HostAction::GoToAnswer,
            HostAction::GoToFinalResults,
        ] {
            assert_eq!(game.apply(action, at(0)), Err(ActionError::InvalidAction));
            assert_eq!(game.state(), State::Lobby);
        }

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();

        // NEXT_QUESTION while a question is open
        assert_eq!(
            game.apply(HostAction::NextQuestion, at(2)),
            Err(ActionError::InvalidAction)
        );
        assert_eq!(game.state(), State::QuestionOpen);
        assert_eq!(game.current_position(), 1);
    }

    #[test]
    fn test_go_to_final_results_requires_answer_show() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();
        game.receive_alarm(
            AlarmMessage::ProceedFromQuestionIntoClose { position: 1 },
            at(2),
        );
        assert_eq!(game.state(), State::QuestionClose);

        assert_eq!(
            game.apply(HostAction::GoToFinalResults, at(3)),
            Err(ActionError::InvalidAction)
        );

        game.apply(HostAction::GoToAnswer, at(3)).unwrap();
        assert!(game.apply(HostAction::GoToFinalResults, at(4)).is_ok());
        assert_eq!(game.state(), State::FinalResults);
    }

    #[test]
    fn test_next_question_past_the_last_fails() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();
        game.apply(HostAction::GoToAnswer, at(2)).unwrap();

        assert_eq!(
            game.apply(HostAction::NextQuestion, at(3)),
            Err(ActionError::InvalidAction)
        );
        assert_eq!(game.state(), State::AnswerShow);
    }

    #[test]
    fn test_end_reachable_from_every_non_terminal_state() {
        // (state builder, expected state before ending)
        let setups: Vec<(fn(&mut Game), State)> = vec![
            (|_| {}, State::Lobby),
            (
                |game| {
                    game.apply(HostAction::NextQuestion, at(0)).unwrap();
                },
                State::QuestionCountdown,
            ),
            (
                |game| {
                    game.apply(HostAction::NextQuestion, at(0)).unwrap();
                    game.apply(HostAction::SkipCountdown, at(1)).unwrap();
                },
                State::QuestionOpen,
            ),
            (
                |game| {
                    game.apply(HostAction::NextQuestion, at(0)).unwrap();
                    game.apply(HostAction::SkipCountdown, at(1)).unwrap();
                    game.receive_alarm(
                        AlarmMessage::ProceedFromQuestionIntoClose { position: 1 },
                        at(2),
                    );
                },
                State::QuestionClose,
            ),
            (
                |game| {
                    game.apply(HostAction::NextQuestion, at(0)).unwrap();
                    game.apply(HostAction::SkipCountdown, at(1)).unwrap();
                    game.apply(HostAction::GoToAnswer, at(2)).unwrap();
                },
                State::AnswerShow,
            ),
            (
                |game| {
                    game.apply(HostAction::NextQuestion, at(0)).unwrap();
                    game.apply(HostAction::SkipCountdown, at(1)).unwrap();
                    game.apply(HostAction::GoToAnswer, at(2)).unwrap();
                    game.apply(HostAction::GoToFinalResults, at(3)).unwrap();
                },
                State::FinalResults,
            ),
        ];

        for (setup, before) in setups {
            let mut game = single_question_game();
            setup(&mut game);
            assert_eq!(game.state(), before);

            assert!(game.apply(HostAction::End, at(10)).is_ok());
            assert_eq!(game.state(), State::End);

            // Terminal: every further action fails
            for action in [
                HostAction::NextQuestion,
                HostAction::SkipCountdown,
                HostAction::GoToAnswer,
                HostAction::GoToFinalResults,
                HostAction::End,
            ] {
                assert_eq!(game.apply(action, at(11)), Err(ActionError::InvalidAction));
            }
        }
    }

    #[test]
    fn test_single_question_walkthrough() {
        let mut game = single_question_game();
        let alice = PlayerId::new(1);
        game.join(alice, "Alice").unwrap();

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        assert_eq!(game.state(), State::QuestionCountdown);

        game.apply(HostAction::SkipCountdown, at(10)).unwrap();
        assert_eq!(game.state(), State::QuestionOpen);

        let correct = correct_ids(&game, 1);
        game.submit(alice, 1, &correct, at(10)).unwrap();

        game.apply(HostAction::GoToAnswer, at(11)).unwrap();
        assert_eq!(game.state(), State::AnswerShow);

        let result = &game.leaderboard.results()[0];
        assert_eq!(result.percent_correct, 100);
        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.breakdown[0].players, ["Alice"]);

        game.apply(HostAction::GoToFinalResults, at(12)).unwrap();
        assert_eq!(game.state(), State::FinalResults);

        let final_result = game.result(alice).unwrap();
        assert_eq!(final_result.standings.len(), 1);
        assert_eq!(final_result.standings[0].name, "Alice");
        assert!((final_result.standings[0].score - 10.0).abs() < f64::EPSILON);
        assert_eq!(final_result.question_results.len(), 1);
    }

    #[test]
    fn test_join_after_lobby_fails() {
        let mut game = single_question_game();
        game.apply(HostAction::NextQuestion, at(0)).unwrap();

        assert_eq!(
            game.join(PlayerId::new(1), "Alice").map(|(name, _)| name),
            Err(JoinError::NotLobby)
        );
    }

    #[test]
    fn test_join_duplicate_name_fails() {
        let mut game = single_question_game();
        game.join(PlayerId::new(1), "Alice").unwrap();

        assert_eq!(
            game.join(PlayerId::new(2), "Alice").map(|(name, _)| name),
            Err(JoinError::NameTaken)
        );
    }

    #[test]
    fn test_join_invalid_name_fails() {
        let mut game = single_question_game();

        let too_long = "a".repeat(31);
        assert_eq!(
            game.join(PlayerId::new(1), &too_long).map(|(name, _)| name),
            Err(JoinError::NameInvalid)
        );
        assert_eq!(
            game.join(PlayerId::new(1), "   ").map(|(name, _)| name),
            Err(JoinError::NameInvalid)
        );
    }

    #[test]
    fn test_join_empty_name_generates_one() {
        let mut game = single_question_game();

        let (name, timer) = game.join(PlayerId::new(1), "").unwrap();
        assert_eq!(name.chars().count(), 8);
        assert!(timer.is_none());
        assert_eq!(game.status().players, [name]);
    }

    #[test]
    fn test_auto_start_fires_at_threshold() {
        let mut game = Game::new(quiz(vec![question(30, 10, 4)]), 2);

        let (_, timer) = game.join(PlayerId::new(1), "Alice").unwrap();
        assert!(timer.is_none());
        assert_eq!(game.state(), State::Lobby);

        let (_, timer) = game.join(PlayerId::new(2), "Bob").unwrap();
        assert_eq!(game.state(), State::QuestionCountdown);
        assert_eq!(
            timer,
            Some(TimerRequest {
                message: AlarmMessage::ProceedFromCountdownIntoQuestion { position: 1 },
                after: Duration::from_secs(3),
            })
        );
    }

    #[test]
    fn test_auto_start_disabled_at_zero() {
        let mut game = single_question_game();

        for i in 1..=5 {
            let (_, timer) = game.join(PlayerId::new(i), "").unwrap();
            assert!(timer.is_none());
        }
        assert_eq!(game.state(), State::Lobby);
    }

    #[test]
    fn test_submit_checks_in_order() {
        let mut game = Game::new(quiz(vec![question(30, 10, 4), question(30, 10, 4)]), 0);
        let alice = PlayerId::new(1);
        game.join(alice, "Alice").unwrap();

        let correct = correct_ids(&game, 1);

        // Nothing open yet
        assert_eq!(
            game.submit(alice, 1, &correct, at(0)),
            Err(SubmitError::NotOpen)
        );

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();

        // Unknown player wins over everything else
        assert_eq!(
            game.submit(PlayerId::new(9), 1, &correct, at(2)),
            Err(SubmitError::UnknownPlayer)
        );

        // Stale question position
        assert_eq!(
            game.submit(alice, 2, &correct, at(2)),
            Err(SubmitError::WrongQuestion)
        );

        // Empty, duplicated, and foreign answer sets
        assert_eq!(
            game.submit(alice, 1, &[], at(2)),
            Err(SubmitError::InvalidAnswerSet)
        );
        assert_eq!(
            game.submit(alice, 1, &[correct[0], correct[0]], at(2)),
            Err(SubmitError::InvalidAnswerSet)
        );
        let foreign = correct_ids(&game, 2);
        assert_eq!(
            game.submit(alice, 1, &foreign, at(2)),
            Err(SubmitError::InvalidAnswerSet)
        );

        assert!(game.submit(alice, 1, &correct, at(2)).is_ok());
    }

    #[test]
    fn test_resubmission_overwrites_for_scoring() {
        let mut game = single_question_game();
        let alice = PlayerId::new(1);
        let bob = PlayerId::new(2);
        game.join(alice, "Alice").unwrap();
        game.join(bob, "Bob").unwrap();

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(100)).unwrap();

        let correct = correct_ids(&game, 1);
        let wrong = vec![
            game.quiz
                .question(1)
                .unwrap()
                .answers
                .iter()
                .find(|answer| !answer.correct)
                .unwrap()
                .id,
        ];

        // Alice answers first but then replaces her submission, dropping
        // her behind Bob
        game.submit(alice, 1, &correct, at(101)).unwrap();
        game.submit(bob, 1, &correct, at(102)).unwrap();
        game.submit(alice, 1, &wrong, at(103)).unwrap();
        game.submit(alice, 1, &correct, at(104)).unwrap();

        game.apply(HostAction::GoToAnswer, at(105)).unwrap();

        let bob_score = game.roster().player(bob).unwrap().score;
        let alice_score = game.roster().player(alice).unwrap().score;
        assert!((bob_score - 10.0).abs() < f64::EPSILON);
        assert!((alice_score - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_current_position_never_decreases() {
        let mut game = Game::new(quiz(vec![question(30, 10, 4), question(30, 10, 4)]), 0);
        let mut seen = vec![game.current_position()];

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        seen.push(game.current_position());
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();
        seen.push(game.current_position());
        game.apply(HostAction::GoToAnswer, at(2)).unwrap();
        seen.push(game.current_position());
        game.apply(HostAction::NextQuestion, at(3)).unwrap();
        seen.push(game.current_position());
        game.apply(HostAction::SkipCountdown, at(4)).unwrap();
        seen.push(game.current_position());

        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(game.current_position(), 2);
    }

    #[test]
    fn test_results_cover_only_closed_questions() {
        let mut game = Game::new(quiz(vec![question(30, 10, 4), question(30, 10, 4)]), 0);
        let alice = PlayerId::new(1);
        game.join(alice, "Alice").unwrap();

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();
        game.apply(HostAction::GoToAnswer, at(2)).unwrap();
        game.apply(HostAction::NextQuestion, at(3)).unwrap();
        game.apply(HostAction::SkipCountdown, at(4)).unwrap();
        game.apply(HostAction::GoToAnswer, at(5)).unwrap();
        game.apply(HostAction::GoToFinalResults, at(6)).unwrap();

        let result = game.result(alice).unwrap();
        assert_eq!(result.question_results.len(), 2);
    }

    #[test]
    fn test_result_gating() {
        let mut game = single_question_game();
        let alice = PlayerId::new(1);
        game.join(alice, "Alice").unwrap();

        assert_eq!(game.result(alice), Err(ResultError::NotFinal));
        assert_eq!(
            game.result(PlayerId::new(9)),
            Err(ResultError::UnknownPlayer)
        );

        game.apply(HostAction::NextQuestion, at(0)).unwrap();
        game.apply(HostAction::SkipCountdown, at(1)).unwrap();
        game.apply(HostAction::GoToAnswer, at(2)).unwrap();
        game.apply(HostAction::GoToFinalResults, at(3)).unwrap();
        assert!(game.result(alice).is_ok());

        game.apply(HostAction::End, at(4)).unwrap();
        assert_eq!(game.result(alice), Err(ResultError::NotFinal));
    }

    #[test]
    fn test_chat_length_bounds() {
        let mut game = single_question_game();
        let alice = PlayerId::new(1);
        game.join(alice, "Alice").unwrap();

        assert_eq!(
            game.post_message(alice, "", at(0)),
            Err(ChatError::LengthOutOfRange)
        );
        assert_eq!(
            game.post_message(alice, &"a".repeat(101), at(0)),
            Err(ChatError::LengthOutOfRange)
        );
        assert!(game.post_message(alice, "a", at(0)).is_ok());
        assert!(game.post_message(alice, &"a".repeat(100), at(0)).is_ok());

        assert_eq!(
            game.post_message(PlayerId::new(9), "hi", at(0)),
            Err(ChatError::UnknownPlayer)
        );
        assert_eq!(
            game.messages(PlayerId::new(9)),
            Err(ChatError::UnknownPlayer)
        );
    }

    #[test]
    fn test_chat_is_open_in_every_state() {
        let mut game = single_question_game();
        let alice = PlayerId::new(1);
        game.join(alice, "Alice").unwrap();

        game.post_message(alice, "waiting", at(0)).unwrap();
        game.apply(HostAction::NextQuestion, at(1)).unwrap();
        game.post_message(alice, "counting", at(2)).unwrap();
        game.apply(HostAction::End, at(3)).unwrap();
        game.post_message(alice, "bye", at(4)).unwrap();

        let messages = game.messages(alice).unwrap();
        let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["waiting", "counting", "bye"]);
        assert!(messages.iter().all(|m| m.player_name == "Alice"));
        assert_eq!(messages[1].sent_at, at(2));
    }
}
