//! Session ID generation and management
//!
//! This module provides functionality for generating and managing unique
//! session IDs that players use to join a running quiz. Session IDs are
//! displayed in octal format to make them easier to communicate verbally.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

/// Minimum value for generated session IDs (in octal: 10000)
const MIN_VALUE: u16 = 0o10_000;
/// Maximum value for generated session IDs (in octal: 100000)
const MAX_VALUE: u16 = 0o100_000;

/// A unique identifier for a quiz session
///
/// Session IDs are generated randomly within a specific range and displayed
/// in octal format to make them easier to communicate. The octal format
/// reduces confusion when sharing session IDs verbally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u16);

impl SessionId {
    /// Creates a new random session ID
    ///
    /// The ID is generated within the valid range to ensure it displays
    /// as a 5-digit octal number for easy communication. Uniqueness across
    /// running sessions is enforced by the registry, not here.
    pub fn new() -> Self {
        Self(fastrand::u16(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for SessionId {
    /// Creates a new random session ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    /// Formats the session ID as a 5-digit octal number
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:05o}", self.0)
    }
}

impl Serialize for SessionId {
    /// Serializes the session ID as an octal string
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    /// Deserializes a session ID from an octal string
    fn deserialize<D>(deserializer: D) -> Result<SessionId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionId::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for SessionId {
    type Err = ParseIntError;

    /// Parses a session ID from an octal string representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string cannot be parsed as a valid
    /// octal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}
