//! Player registry for a running session
//!
//! This module tracks the players of one session in join order, together
//! with their assigned names, their answer submissions, and their running
//! scores. Name uniqueness and hygiene are delegated to the name ledger.

use std::{
    collections::{HashMap, HashSet},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};

use super::{
    names::{self, Names},
    quiz::AnswerId,
};

/// A unique identifier for a player
///
/// Player IDs are allocated sequentially by the session registry across all
/// sessions, so player-scoped operations can resolve a player without
/// knowing their session ID.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Creates a player ID from its numeric value
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

/// A player's answer submission for one question
///
/// Only one submission per player per question is kept; a resubmission
/// within the answering window replaces the earlier one entirely.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// The set of answer IDs the player selected
    pub answers: HashSet<AnswerId>,
    /// When the submission arrived
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub submitted_at: SystemTime,
    /// Arrival order among all submissions of the session, used to break
    /// ties between submissions with equal timestamps
    pub seq: u64,
}

/// A player participating in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// The player's registry-wide identifier
    pub id: PlayerId,
    /// The player's unique display name
    pub name: String,
    /// Total score accumulated over all scored questions
    pub score: f64,
    /// Submissions keyed by 1-based question position
    submissions: HashMap<usize, Submission>,
}

impl Player {
    /// Retrieves this player's submission for a question, if any
    ///
    /// # Arguments
    ///
    /// * `position` - The 1-based position of the question
    pub fn submission(&self, position: usize) -> Option<&Submission> {
        self.submissions.get(&position)
    }
}

/// Serialization helper for Roster struct
#[derive(Deserialize)]
struct RosterSerde {
    players: Vec<Player>,
    names: Names,
    next_seq: u64,
}

/// The players of one session in join order
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "RosterSerde")]
pub struct Roster {
    /// Players in the order they joined
    players: Vec<Player>,
    /// Name ledger enforcing uniqueness and hygiene
    names: Names,
    /// Arrival counter handed out to submissions
    next_seq: u64,

    /// Index from player ID into the players vector (not serialized)
    #[serde(skip_serializing)]
    index: HashMap<PlayerId, usize>,
}

impl From<RosterSerde> for Roster {
    /// Reconstructs the Roster from serialized data
    ///
    /// This rebuilds the player index from the join-ordered player list,
    /// which is necessary since the index is not serialized.
    fn from(serde: RosterSerde) -> Self {
        let RosterSerde {
            players,
            names,
            next_seq,
        } = serde;
        let index = players
            .iter()
            .enumerate()
            .map(|(slot, player)| (player.id, slot))
            .collect();
        Self {
            players,
            names,
            next_seq,
            index,
        }
    }
}

impl Roster {
    /// Adds a player to the roster
    ///
    /// An empty requested name means the player wants a generated one.
    /// Non-empty names go through the full validation of the name ledger.
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
    /// Any [`names::Error`] raised by the name ledger; the roster is
    /// unchanged when an error is returned.
    pub fn join(&mut self, id: PlayerId, requested_name: &str) -> Result<String, names::Error> {
        let name = if requested_name.is_empty() {
            self.names.assign_generated(id)?
        } else {
            self.names.set_name(id, requested_name)?
        };

        self.index.insert(id, self.players.len());
        self.players.push(Player {
            id,
            name: name.clone(),
            score: 0.0,
            submissions: HashMap::new(),
        });

        Ok(name)
    }

    /// Returns whether a player is part of this roster
    pub fn contains(&self, id: PlayerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Retrieves a player by ID
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.index.get(&id).map(|slot| &self.players[*slot])
    }

    /// Returns the number of players in the roster
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns whether the roster has no players
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Iterates over the players in join order
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Returns the player names in join order
    pub fn names_in_join_order(&self) -> Vec<String> {
        self.players
            .iter()
            .map(|player| player.name.clone())
            .collect()
    }

    /// Records a player's submission for a question
    ///
    /// A submission for a question the player already answered replaces the
    /// earlier one entirely, including its timestamp and arrival order.
    ///
    /// # Arguments
    ///
    /// * `id` - The submitting player
    /// * `position` - The 1-based position of the question
    /// * `answers` - The validated set of selected answer IDs
    /// * `submitted_at` - When the submission arrived
    ///
    /// # Returns
    ///
    /// `true` if the submission was recorded, `false` if the player is not
    /// part of this roster
    pub fn record_submission(
        &mut self,
        id: PlayerId,
        position: usize,
        answers: HashSet<AnswerId>,
        submitted_at: SystemTime,
    ) -> bool {
        let Some(&slot) = self.index.get(&id) else {
            return false;
        };

        let seq = self.next_seq;
        self.next_seq += 1;

        self.players[slot].submissions.insert(
            position,
            Submission {
                answers,
                submitted_at,
                seq,
            },
        );

        true
    }

    /// Adds points to a player's running score
    pub fn add_score(&mut self, id: PlayerId, points: f64) {
        if let Some(&slot) = self.index.get(&id) {
            self.players[slot].score += points;
        }
    }
}
