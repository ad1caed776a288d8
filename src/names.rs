//! Player name management and validation
//!
//! This module handles the assignment and validation of player names within
//! a session. It ensures name uniqueness, filters inappropriate content,
//! generates fallback names for players who do not pick one, and tracks
//! which name each player holds.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{constants::name, roster::PlayerId};

/// Generates a random player name
///
/// Generated names consist of five ASCII letters followed by three digits,
/// with no character repeated within the letter part or within the digit
/// part. Uniqueness within a session is enforced by [`Names`], not here.
pub fn generate_name() -> String {
    let mut letters: Vec<char> = ('a'..='z').chain('A'..='Z').collect();
    fastrand::shuffle(&mut letters);

    let mut digits: Vec<char> = ('0'..='9').collect();
    fastrand::shuffle(&mut digits);

    letters
        .into_iter()
        .take(name::GENERATED_LETTERS)
        .chain(digits.into_iter().take(name::GENERATED_DIGITS))
        .collect()
}

/// Serialization helper for Names struct
#[derive(Deserialize)]
struct NamesSerde {
    mapping: HashMap<PlayerId, String>,
}

/// Manages player names and their associations with player IDs
///
/// This struct maintains the mapping from player IDs to names, ensuring
/// that names are unique within a session and meet content and length
/// requirements.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "NamesSerde")]
pub struct Names {
    /// Primary mapping from player ID to name
    mapping: HashMap<PlayerId, String>,

    /// Set of all existing names for quick uniqueness checks (not serialized)
    #[serde(skip_serializing)]
    existing: HashSet<String>,
}

impl From<NamesSerde> for Names {
    /// Reconstructs the Names struct from serialized data
    ///
    /// This rebuilds the existing names set from the primary mapping,
    /// which is necessary since that set is not serialized.
    fn from(serde: NamesSerde) -> Self {
        let NamesSerde { mapping } = serde;
        let existing = mapping.values().cloned().collect();
        Self { mapping, existing }
    }
}

/// Errors that can occur during name validation and assignment
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already in use by another player
    #[error("name already in-use")]
    Used,
    /// The player already has an assigned name
    #[error("player has an existing name")]
    Assigned,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

impl Names {
    /// Assigns a name to a player after validation
    ///
    /// This method performs comprehensive validation including length limits,
    /// content filtering, uniqueness checking, and ensures the player doesn't
    /// already have a name assigned.
    ///
    /// # Arguments
    ///
    /// * `id` - The player ID to assign the name to
    /// * `name` - The requested name (will be trimmed of whitespace)
    ///
    /// # Returns
    ///
    /// The cleaned and assigned name on success, or an error describing
    /// why the name was rejected.
    ///
    /// # Errors
    ///
    /// * `Error::TooLong` - Name exceeds the maximum length
    /// * `Error::Empty` - Name is empty after trimming whitespace
    /// * `Error::Sinful` - Name contains inappropriate content
    /// * `Error::Used` - Name is already taken by another player
    /// * `Error::Assigned` - Player already has a name assigned
    pub fn set_name(&mut self, id: PlayerId, name: &str) -> Result<String, Error> {
        if name.len() > name::MAX_LENGTH {
            return Err(Error::TooLong);
        }
        let name = rustrict::trim_whitespace(name);
        if name.is_empty() {
            return Err(Error::Empty);
        }
        if name.is_inappropriate() {
            return Err(Error::Sinful);
        }
        if !self.existing.insert(name.to_owned()) {
            return Err(Error::Used);
        }
        match self.mapping.entry(id) {
            Entry::Occupied(_) => Err(Error::Assigned),
            Entry::Vacant(v) => {
                v.insert(name.to_owned());
                Ok(name.to_owned())
            }
        }
    }

    /// Assigns a freshly generated name to a player
    ///
    /// Generates names until one is unique within the session. Since there
    /// are billions of possible generated names, this terminates quickly for
    /// any realistic player count.
    ///
    /// # Arguments
    ///
    /// * `id` - The player ID to assign a generated name to
    ///
    /// # Returns
    ///
    /// The generated and assigned name
    ///
    /// # Errors
    ///
    /// * `Error::Assigned` - Player already has a name assigned
    pub fn assign_generated(&mut self, id: PlayerId) -> Result<String, Error> {
        loop {
            match self.set_name(id, &generate_name()) {
                Ok(name) => return Ok(name),
                Err(Error::Assigned) => return Err(Error::Assigned),
                Err(_) => {}
            }
        }
    }
}
