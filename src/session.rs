//! Concurrency shell around one session
//!
//! A [`Session`] owns the state machine of a single running quiz behind a
//! mutex, together with the handle of its currently scheduled alarm. All
//! host actions, player calls, and firing alarms for a session serialize
//! on that mutex, so the machine itself never sees concurrent access.
//!
//! Timed transitions are self-delivering: when a transition requests a
//! follow-up alarm, the session schedules a callback that locks the
//! session again and feeds the alarm back into the machine. An alarm that
//! was superseded while it was already past its sleep is filtered out by
//! the machine's staleness check on delivery.

use std::{sync::Arc, time::SystemTime};

use parking_lot::Mutex;
use tracing::debug;

use super::{
    game::{
        ActionError, AlarmMessage, ChatError, Game, HostAction, JoinError, Message, ResultError,
        SessionStatus, State, SubmitError, TimerRequest,
    },
    leaderboard::FinalResult,
    quiz::{AnswerId, HostId, QuizId, QuizSnapshot},
    roster::PlayerId,
    session_id::SessionId,
    timer::{TimerHandle, TimerService},
};

/// What a successfully applied host action changed
#[derive(Debug)]
pub struct ActionOutcome {
    /// State before the action
    pub previous: State,
    /// State after the action
    pub current: State,
    /// The final ranking, set when this action was the one that moved the
    /// session onto the final results screen
    pub finalized: Option<FinalResult>,
}

/// One running quiz session
///
/// Holds the session's identity, the quiz it belongs to, the host that
/// started it, and the state machine guarded by a mutex.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    quiz_id: QuizId,
    host_id: HostId,
    timers: TimerService,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    game: Game,
    pending: Option<TimerHandle>,
}

impl Session {
    /// Creates a session in the lobby
    ///
    /// # Arguments
    ///
    /// * `id` - The session's registry-wide identifier
    /// * `quiz_id` - The quiz this session plays
    /// * `host_id` - The host who started the session
    /// * `quiz` - The snapshot of quiz content to play through
    /// * `auto_start_threshold` - Player count that starts the quiz
    ///   automatically, 0 to disable
    /// * `timers` - The service used to schedule timed transitions
    pub fn new(
        id: SessionId,
        quiz_id: QuizId,
        host_id: HostId,
        quiz: QuizSnapshot,
        auto_start_threshold: usize,
        timers: TimerService,
    ) -> Self {
        Self {
            id,
            quiz_id,
            host_id,
            timers,
            inner: Mutex::new(Inner {
                game: Game::new(quiz, auto_start_threshold),
                pending: None,
            }),
        }
    }

    /// Returns the session's identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the quiz this session plays
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    /// Returns the host who started the session
    pub fn host_id(&self) -> HostId {
        self.host_id
    }

    /// Returns a host-facing snapshot of the session
    pub fn status(&self) -> SessionStatus {
        self.inner.lock().game.status()
    }

    /// Replaces the pending alarm with the requested one, if any
    ///
    /// The superseded alarm is cancelled and can no longer fire.
    fn install(self: &Arc<Self>, inner: &mut Inner, request: Option<TimerRequest>) {
        if let Some(superseded) = inner.pending.take() {
            superseded.cancel();
        }
        inner.pending = request.map(|request| {
            let session = Arc::clone(self);
            self.timers.schedule(request.after, move || {
                session.deliver_alarm(request.message);
            })
        });
    }

    /// Applies a host action to the session
    ///
    /// A successful action supersedes whatever alarm was pending; a
    /// rejected one leaves the session, including its pending alarm,
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidAction`] if the current state does
    /// not allow the action.
    pub fn apply_action(
        self: &Arc<Self>,
        action: HostAction,
    ) -> Result<ActionOutcome, ActionError> {
        let mut inner = self.inner.lock();

        let previous = inner.game.state();
        let request = inner.game.apply(action, SystemTime::now())?;
        let current = inner.game.state();
        self.install(&mut inner, request);

        debug!(session = %self.id, %action, from = %previous, to = %current, "applied host action");

        let finalized = if previous != State::FinalResults && current == State::FinalResults {
            inner.game.final_result().cloned()
        } else {
            None
        };

        Ok(ActionOutcome {
            previous,
            current,
            finalized,
        })
    }

    /// Feeds a fired alarm back into the state machine
    ///
    /// Applied alarms always change the state. A stale alarm leaves the
    /// state untouched, and the pending handle already belongs to a newer
    /// alarm, so the handle is only replaced after an actual transition.
    fn deliver_alarm(self: &Arc<Self>, message: AlarmMessage) {
        let mut inner = self.inner.lock();

        let previous = inner.game.state();
        let follow_up = inner.game.receive_alarm(message, SystemTime::now());
        let current = inner.game.state();

        if current == previous {
            debug!(session = %self.id, "ignoring stale alarm");
            return;
        }

        self.install(&mut inner, follow_up);
        debug!(session = %self.id, from = %previous, to = %current, "timed transition");
    }

    /// Adds a player to the session
    ///
    /// # Arguments
    ///
    /// * `id` - The player's registry-wide identifier
    /// * `requested_name` - The name the player asked for, or `""` for a
    ///   generated name
    ///
    /// # Returns
    ///
    /// The name the player ended up with
    ///
    /// # Errors
    ///
    /// * [`JoinError::NotLobby`] - The session has already started
    /// * [`JoinError::NameTaken`] - Another player holds that name
    /// * [`JoinError::NameInvalid`] - The name failed validation
    pub fn join(self: &Arc<Self>, id: PlayerId, requested_name: &str) -> Result<String, JoinError> {
        let mut inner = self.inner.lock();

        let (name, request) = inner.game.join(id, requested_name)?;
        if request.is_some() {
            debug!(session = %self.id, "starting automatically");
            self.install(&mut inner, request);
        }

        debug!(session = %self.id, player = %id, %name, "player joined");
        Ok(name)
    }

    /// Records a player's answer submission for the current question
    ///
    /// # Errors
    ///
    /// * [`SubmitError::UnknownPlayer`] - The player never joined
    /// * [`SubmitError::NotOpen`] - No question is accepting answers
    /// * [`SubmitError::WrongQuestion`] - The position is not current
    /// * [`SubmitError::InvalidAnswerSet`] - The selection is not valid
    ///   for the current question
    pub fn submit(
        &self,
        player: PlayerId,
        question_index: usize,
        answer_ids: &[AnswerId],
    ) -> Result<(), SubmitError> {
        self.inner
            .lock()
            .game
            .submit(player, question_index, answer_ids, SystemTime::now())
    }

    /// Retrieves the final results on behalf of a player
    ///
    /// # Errors
    ///
    /// * [`ResultError::UnknownPlayer`] - The player never joined
    /// * [`ResultError::NotFinal`] - The session is not on the final
    ///   results screen
    pub fn final_result(&self, player: PlayerId) -> Result<FinalResult, ResultError> {
        self.inner.lock().game.result(player).cloned()
    }

    /// Appends a chat message to the session
    ///
    /// # Errors
    ///
    /// * [`ChatError::UnknownPlayer`] - The player never joined
    /// * [`ChatError::LengthOutOfRange`] - The body is empty or longer
    ///   than 100 characters
    pub fn post_message(&self, player: PlayerId, body: &str) -> Result<(), ChatError> {
        self.inner
            .lock()
            .game
            .post_message(player, body, SystemTime::now())
    }

    /// Returns all chat messages of the session in arrival order
    ///
    /// # Errors
    ///
    /// * [`ChatError::UnknownPlayer`] - The player never joined
    pub fn messages(&self, player: PlayerId) -> Result<Vec<Message>, ChatError> {
        self.inner
            .lock()
            .game
            .messages(player)
            .map(|messages| messages.to_vec())
    }
}
