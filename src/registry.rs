//! Registry of running sessions
//!
//! The registry owns every session of the process: it allocates session
//! IDs, enforces the cap on concurrently live sessions, hands out
//! registry-wide player IDs, and resolves players back to the session
//! they joined. It is always passed around by handle; nothing in this
//! crate holds global state.
//!
//! A session keeps its registry entry after it ended, so late callers
//! still reach it and get state-appropriate errors instead of a lookup
//! failure. Only sessions that have not ended count against the cap.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tracing::{info, warn};

use super::{
    constants::session::{MAX_AUTO_START_THRESHOLD, MAX_ID_ATTEMPTS, MAX_LIVE_SESSIONS},
    quiz::{HostId, QuizSnapshot},
    roster::PlayerId,
    session::Session,
    session_id::SessionId,
    timer::TimerService,
};

/// Errors that can occur when creating a session
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    /// The auto-start threshold exceeds the supported maximum
    #[error("auto-start threshold is out of range")]
    InvalidAutoStart,
    /// The quiz has no questions to play
    #[error("quiz has no questions")]
    QuizEmpty,
    /// The cap on concurrently live sessions is reached
    #[error("too many live sessions")]
    TooManySessions,
    /// Every sampled session ID was already taken
    #[error("no free session id")]
    IdsExhausted,
}

/// The process-wide table of sessions and players
#[derive(Debug, Default)]
pub struct Registry {
    /// All sessions by ID, including ended ones
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Which session each player joined
    players: DashMap<PlayerId, SessionId>,
    /// Number of sessions that have not ended yet
    live: AtomicUsize,
    /// Last handed-out player ID
    next_player: AtomicU64,
}

impl Registry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session and registers it under a fresh session ID
    ///
    /// # Arguments
    ///
    /// * `quiz` - The snapshot of quiz content the session plays through
    /// * `host_id` - The host starting the session
    /// * `auto_start_threshold` - Player count that starts the quiz
    ///   automatically, 0 to disable
    /// * `timers` - The service the session schedules its alarms with
    ///
    /// # Errors
    ///
    /// * [`CreateError::InvalidAutoStart`] - The threshold exceeds the
    ///   supported maximum
    /// * [`CreateError::QuizEmpty`] - The quiz has no questions
    /// * [`CreateError::TooManySessions`] - The live-session cap is
    ///   reached
    /// * [`CreateError::IdsExhausted`] - No unused session ID was found
    ///   within the allocation attempt budget
    pub fn create_session(
        &self,
        quiz: QuizSnapshot,
        host_id: HostId,
        auto_start_threshold: usize,
        timers: &TimerService,
    ) -> Result<Arc<Session>, CreateError> {
        if auto_start_threshold > MAX_AUTO_START_THRESHOLD {
            return Err(CreateError::InvalidAutoStart);
        }
        if quiz.is_empty() {
            return Err(CreateError::QuizEmpty);
        }

        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                (live < MAX_LIVE_SESSIONS).then_some(live + 1)
            })
            .map_err(|_| CreateError::TooManySessions)?;

        let quiz_id = quiz.id;
        let mut attempts = 0;
        let session = loop {
            let id = SessionId::new();
            match self.sessions.entry(id) {
                Entry::Occupied(_) => {
                    // Ended sessions keep their IDs, so the space can run
                    // out over the lifetime of the process
                    attempts += 1;
                    if attempts == MAX_ID_ATTEMPTS {
                        self.live.fetch_sub(1, Ordering::SeqCst);
                        warn!(attempts, "no free session id found");
                        return Err(CreateError::IdsExhausted);
                    }
                }
                Entry::Vacant(entry) => {
                    let session = Arc::new(Session::new(
                        id,
                        quiz_id,
                        host_id,
                        quiz,
                        auto_start_threshold,
                        timers.clone(),
                    ));
                    entry.insert(Arc::clone(&session));
                    break session;
                }
            }
        };

        info!(session = %session.id(), quiz = %quiz_id, "session created");
        Ok(session)
    }

    /// Looks up a session by ID
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Hands out the next registry-wide player ID
    pub fn allocate_player_id(&self) -> PlayerId {
        PlayerId::new(self.next_player.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Records which session a player joined
    pub fn index_player(&self, player: PlayerId, session: SessionId) {
        self.players.insert(player, session);
    }

    /// Resolves a player to the session they joined
    pub fn session_of_player(&self, player: PlayerId) -> Option<Arc<Session>> {
        let session_id = *self.players.get(&player)?;
        self.get(session_id)
    }

    /// Frees the live slot of a session that moved into its terminal state
    ///
    /// Called exactly once per ended session; the session stays reachable
    /// through [`Registry::get`] afterwards.
    pub fn release_live_slot(&self, id: SessionId) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        info!(session = %id, "live slot released");
    }

    /// Number of sessions that have not ended yet
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}
