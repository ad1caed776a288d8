//! Facade over the session engine
//!
//! [`SessionService`] is the single entry point callers use: it
//! authenticates hosts, pulls quiz content, creates and steers sessions,
//! and routes player calls to the session they joined. The collaborators
//! it needs, host authentication, quiz lookup, and final-result delivery,
//! are traits so hosting layers can plug in their own implementations.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::{
    game::{self, ChatError, HostAction, Message, ResultError, SessionStatus, State, SubmitError},
    leaderboard::FinalResult,
    quiz::{AnswerId, HostId, QuizId, QuizSnapshot},
    registry::{CreateError, Registry},
    roster::PlayerId,
    session::Session,
    session_id::SessionId,
    timer::TimerService,
};

/// Validates host credentials
pub trait HostAuthority {
    /// Resolves a host token to the host it belongs to
    ///
    /// Returns `None` for tokens that are unknown, expired, or otherwise
    /// not valid.
    fn validated_host(&self, token: &str) -> Option<HostId>;
}

/// Why a quiz source refused to hand out a snapshot
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizLookupError {
    /// No quiz with the requested ID exists
    #[error("quiz does not exist")]
    NotFound,
    /// The quiz exists but belongs to a different host
    #[error("quiz is not owned by this host")]
    NotOwned,
}

/// Provides quiz content to play sessions with
pub trait QuizSource {
    /// Produces a deep snapshot of a quiz for the given host
    ///
    /// The snapshot is owned by the session afterwards; edits to the
    /// underlying quiz must not show through.
    ///
    /// # Errors
    ///
    /// * [`QuizLookupError::NotFound`] - No such quiz
    /// * [`QuizLookupError::NotOwned`] - The quiz belongs to another host
    fn quiz_snapshot(&self, quiz: QuizId, host: HostId) -> Result<QuizSnapshot, QuizLookupError>;
}

/// Receives the final results of sessions as they conclude
pub trait ResultSink {
    /// Delivers the final results of one session, called exactly once per
    /// session that reaches its results screen
    fn publish(&self, session: SessionId, quiz: QuizId, result: &FinalResult);
}

/// Errors that can occur when starting a session
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// The host token did not validate
    #[error("host token is not valid")]
    Unauthenticated,
    /// The quiz does not exist for this host
    #[error("quiz is not owned by this host")]
    NotOwned,
    /// The auto-start threshold exceeds the supported maximum
    #[error("auto-start threshold is out of range")]
    InvalidAutoStart,
    /// The quiz has no questions to play
    #[error("quiz has no questions")]
    QuizEmpty,
    /// The cap on concurrently live sessions is reached
    #[error("too many live sessions")]
    TooManySessions,
    /// No free session ID is left to assign
    #[error("no free session id")]
    IdsExhausted,
}

impl From<CreateError> for StartError {
    fn from(error: CreateError) -> Self {
        match error {
            CreateError::InvalidAutoStart => Self::InvalidAutoStart,
            CreateError::QuizEmpty => Self::QuizEmpty,
            CreateError::TooManySessions => Self::TooManySessions,
            CreateError::IdsExhausted => Self::IdsExhausted,
        }
    }
}

/// Errors that can occur when looking up a session on behalf of a host
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    /// The host token did not validate
    #[error("host token is not valid")]
    Unauthenticated,
    /// The session belongs to a different host
    #[error("session is not owned by this host")]
    NotOwned,
    /// No session with that ID exists under the given quiz
    #[error("session does not exist")]
    UnknownSession,
}

/// Errors that can occur when applying a host action
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostActionError {
    /// The host token did not validate
    #[error("host token is not valid")]
    Unauthenticated,
    /// The session belongs to a different host
    #[error("session is not owned by this host")]
    NotOwned,
    /// No session with that ID exists under the given quiz
    #[error("session does not exist")]
    UnknownSession,
    /// The action is not allowed in the session's current state
    #[error("action is not allowed in the current state")]
    InvalidAction,
}

impl From<StatusError> for HostActionError {
    fn from(error: StatusError) -> Self {
        match error {
            StatusError::Unauthenticated => Self::Unauthenticated,
            StatusError::NotOwned => Self::NotOwned,
            StatusError::UnknownSession => Self::UnknownSession,
        }
    }
}

impl From<game::ActionError> for HostActionError {
    fn from(error: game::ActionError) -> Self {
        match error {
            game::ActionError::InvalidAction => Self::InvalidAction,
        }
    }
}

/// Errors that can occur when a player joins a session
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// No session with that ID exists
    #[error("session does not exist")]
    UnknownSession,
    /// Players can only join while the session is in the lobby
    #[error("session is no longer accepting players")]
    NotLobby,
    /// The requested name is already in use within the session
    #[error("name already in-use")]
    NameTaken,
    /// The requested name failed validation
    #[error("name is not allowed")]
    NameInvalid,
}

impl From<game::JoinError> for JoinError {
    fn from(error: game::JoinError) -> Self {
        match error {
            game::JoinError::NotLobby => Self::NotLobby,
            game::JoinError::NameTaken => Self::NameTaken,
            game::JoinError::NameInvalid => Self::NameInvalid,
        }
    }
}

/// The session engine's outward face
///
/// Owns the registry of running sessions and the collaborators needed to
/// start new ones. Every method takes `&self`, so the service can be
/// shared behind an [`Arc`].
#[derive(Debug)]
pub struct SessionService<A, Q, R> {
    authority: A,
    quizzes: Q,
    results: R,
    registry: Arc<Registry>,
    timers: TimerService,
}

impl<A, Q, R> SessionService<A, Q, R>
where
    A: HostAuthority,
    Q: QuizSource,
    R: ResultSink,
{
    /// Creates a service around the given collaborators
    ///
    /// # Arguments
    ///
    /// * `authority` - Validates host tokens
    /// * `quizzes` - Produces quiz snapshots to play
    /// * `results` - Receives final results as sessions conclude
    /// * `registry` - The session table, shared with the hosting layer
    /// * `timers` - Schedules the sessions' timed transitions
    pub fn new(
        authority: A,
        quizzes: Q,
        results: R,
        registry: Arc<Registry>,
        timers: TimerService,
    ) -> Self {
        Self {
            authority,
            quizzes,
            results,
            registry,
            timers,
        }
    }

    /// Starts a new session for a quiz
    ///
    /// The session takes a deep snapshot of the quiz and waits in the
    /// lobby for players.
    ///
    /// # Arguments
    ///
    /// * `host_token` - The starting host's credential
    /// * `quiz_id` - The quiz to play
    /// * `auto_start_threshold` - Player count that starts the quiz
    ///   automatically, 0 to disable
    ///
    /// # Errors
    ///
    /// * [`StartError::Unauthenticated`] - The token did not validate
    /// * [`StartError::NotOwned`] - The quiz does not exist for this host
    /// * [`StartError::InvalidAutoStart`] - The threshold is out of range
    /// * [`StartError::QuizEmpty`] - The quiz has no questions
    /// * [`StartError::TooManySessions`] - The live-session cap is
    ///   reached
    /// * [`StartError::IdsExhausted`] - No unused session ID was found
    ///   within the allocation attempt budget
    pub fn start_session(
        &self,
        host_token: &str,
        quiz_id: QuizId,
        auto_start_threshold: usize,
    ) -> Result<SessionId, StartError> {
        let host_id = self
            .authority
            .validated_host(host_token)
            .ok_or(StartError::Unauthenticated)?;
        let quiz = self
            .quizzes
            .quiz_snapshot(quiz_id, host_id)
            .map_err(|_| StartError::NotOwned)?;

        let session =
            self.registry
                .create_session(quiz, host_id, auto_start_threshold, &self.timers)?;

        info!(session = %session.id(), quiz = %quiz_id, "session started");
        Ok(session.id())
    }

    /// Resolves a session on behalf of its host
    fn host_session(
        &self,
        host_token: &str,
        quiz_id: QuizId,
        session_id: SessionId,
    ) -> Result<Arc<Session>, StatusError> {
        let host_id = self
            .authority
            .validated_host(host_token)
            .ok_or(StatusError::Unauthenticated)?;
        let session = self
            .registry
            .get(session_id)
            .ok_or(StatusError::UnknownSession)?;

        if session.quiz_id() != quiz_id {
            return Err(StatusError::UnknownSession);
        }
        if session.host_id() != host_id {
            return Err(StatusError::NotOwned);
        }
        Ok(session)
    }

    /// Applies a host action to a session
    ///
    /// When the action moves the session onto its final results screen,
    /// the results are delivered to the sink. When it ends the session,
    /// the session's live slot is freed while the session itself stays
    /// addressable.
    ///
    /// # Errors
    ///
    /// * [`HostActionError::Unauthenticated`] - The token did not
    ///   validate
    /// * [`HostActionError::UnknownSession`] - No such session under the
    ///   given quiz
    /// * [`HostActionError::NotOwned`] - The session belongs to a
    ///   different host
    /// * [`HostActionError::InvalidAction`] - The session's state does
    ///   not allow the action
    pub fn apply_action(
        &self,
        host_token: &str,
        quiz_id: QuizId,
        session_id: SessionId,
        action: HostAction,
    ) -> Result<(), HostActionError> {
        let session = self.host_session(host_token, quiz_id, session_id)?;
        let outcome = session.apply_action(action)?;

        if let Some(result) = &outcome.finalized {
            self.results.publish(session_id, quiz_id, result);
            info!(session = %session_id, "final results published");
        }
        if outcome.previous != State::End && outcome.current == State::End {
            self.registry.release_live_slot(session_id);
        }
        Ok(())
    }

    /// Reports where a session currently stands
    ///
    /// # Errors
    ///
    /// * [`StatusError::Unauthenticated`] - The token did not validate
    /// * [`StatusError::UnknownSession`] - No such session under the
    ///   given quiz
    /// * [`StatusError::NotOwned`] - The session belongs to a different
    ///   host
    pub fn status(
        &self,
        host_token: &str,
        quiz_id: QuizId,
        session_id: SessionId,
    ) -> Result<SessionStatus, StatusError> {
        let session = self.host_session(host_token, quiz_id, session_id)?;
        Ok(session.status())
    }

    /// Adds a player to a session's lobby
    ///
    /// An empty requested name means the player wants a generated one.
    ///
    /// # Returns
    ///
    /// The new player's registry-wide ID, used for all subsequent player
    /// calls
    ///
    /// # Errors
    ///
    /// * [`JoinError::UnknownSession`] - No such session
    /// * [`JoinError::NotLobby`] - The session has already started
    /// * [`JoinError::NameTaken`] - Another player holds that name
    /// * [`JoinError::NameInvalid`] - The name failed validation
    pub fn join_session(
        &self,
        session_id: SessionId,
        requested_name: &str,
    ) -> Result<PlayerId, JoinError> {
        let session = self
            .registry
            .get(session_id)
            .ok_or(JoinError::UnknownSession)?;

        let player = self.registry.allocate_player_id();
        session.join(player, requested_name)?;
        self.registry.index_player(player, session_id);

        Ok(player)
    }

    /// Resolves the session a player joined
    fn player_session<E>(&self, player: PlayerId, unknown: E) -> Result<Arc<Session>, E> {
        self.registry.session_of_player(player).ok_or(unknown)
    }

    /// Records a player's answer submission for the current question
    ///
    /// # Errors
    ///
    /// * [`SubmitError::UnknownPlayer`] - The player never joined a
    ///   session
    /// * [`SubmitError::NotOpen`] - No question is accepting answers
    /// * [`SubmitError::WrongQuestion`] - The position is not current
    /// * [`SubmitError::InvalidAnswerSet`] - The selection is not valid
    ///   for the current question
    pub fn submit_answer(
        &self,
        player: PlayerId,
        question_index: usize,
        answer_ids: &[AnswerId],
    ) -> Result<(), SubmitError> {
        let session = self.player_session(player, SubmitError::UnknownPlayer)?;
        session.submit(player, question_index, answer_ids)
    }

    /// Retrieves the final results on behalf of a player
    ///
    /// # Errors
    ///
    /// * [`ResultError::UnknownPlayer`] - The player never joined a
    ///   session
    /// * [`ResultError::NotFinal`] - The session is not on the final
    ///   results screen
    pub fn final_result(&self, player: PlayerId) -> Result<FinalResult, ResultError> {
        let session = self.player_session(player, ResultError::UnknownPlayer)?;
        session.final_result(player)
    }

    /// Appends a chat message to the player's session
    ///
    /// # Errors
    ///
    /// * [`ChatError::UnknownPlayer`] - The player never joined a session
    /// * [`ChatError::LengthOutOfRange`] - The body is empty or longer
    ///   than 100 characters
    pub fn post_message(&self, player: PlayerId, body: &str) -> Result<(), ChatError> {
        let session = self.player_session(player, ChatError::UnknownPlayer)?;
        session.post_message(player, body)
    }

    /// Returns all chat messages of the player's session in arrival order
    ///
    /// # Errors
    ///
    /// * [`ChatError::UnknownPlayer`] - The player never joined a session
    pub fn messages(&self, player: PlayerId) -> Result<Vec<Message>, ChatError> {
        let session = self.player_session(player, ChatError::UnknownPlayer)?;
        session.messages(player)
    }
}
