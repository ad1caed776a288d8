//! # Quizhost Session Engine
//!
//! This library provides the live-session engine for running multiplayer
//! quiz sessions. It drives each session's question-by-question state
//! machine with host actions and timed transitions, manages joining
//! players and their submitted answers, scores questions as their
//! answering windows close, and keeps a registry of all running sessions
//! behind a single service facade.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod constants;

pub mod game;
pub mod leaderboard;
pub mod names;
pub mod quiz;
pub mod registry;
pub mod roster;
pub mod service;
pub mod session;
pub mod session_id;
pub mod timer;
