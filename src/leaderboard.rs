//! Scoring and results for a session
//!
//! This module turns the submissions collected while a question was open
//! into per-question results, accumulates player scores across questions,
//! and assembles the final ranking once the session reaches its results
//! screen.

use std::time::SystemTime;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{
    quiz::{AnswerId, QuestionId, QuestionSnapshot},
    roster::Roster,
};

/// Which players selected one correct answer option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerBreakdown {
    /// The correct answer option this row describes
    pub answer_id: AnswerId,
    /// Names of players whose submission included this option, ordered by
    /// submission time
    pub players: Vec<String>,
}

/// The outcome of one question whose answering window closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// The question this result belongs to
    pub question_id: QuestionId,
    /// One breakdown row per correct answer option, in question order
    pub breakdown: Vec<AnswerBreakdown>,
    /// Mean time in seconds between the question opening and each
    /// submission, 0 when nobody submitted
    pub average_answer_time: f64,
    /// Share of players whose submission was fully correct, rounded to the
    /// nearest whole percent
    pub percent_correct: u32,
}

/// One row of the final ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStanding {
    /// The player's display name
    pub name: String,
    /// The player's total score over all scored questions
    pub score: f64,
}

/// The complete results of a session that reached its results screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Players ranked by total score descending; players with equal scores
    /// appear in join order
    pub standings: Vec<FinalStanding>,
    /// Results of every question whose answering window closed, in
    /// playback order
    pub question_results: Vec<QuestionResult>,
}

/// Scores questions as their answering windows close
///
/// Each question is scored exactly once, at the moment the session leaves
/// the open answering window, and the computed result is kept for the final
/// results screen.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    /// Results of the questions scored so far, in playback order
    results: Vec<QuestionResult>,
}

impl Leaderboard {
    /// Scores a question whose answering window just closed
    ///
    /// A submission counts as correct only if its answer set equals the
    /// question's correct set exactly; there is no partial credit. Correct
    /// submitters are ranked by submission time (arrival order breaking
    /// ties between equal timestamps) and the submitter at rank `k` earns
    /// `points / k`. Everyone else earns nothing. Earned points are added
    /// to the roster's running scores and the question's result is
    /// recorded.
    ///
    /// # Arguments
    ///
    /// * `question` - The question being scored
    /// * `position` - The question's 1-based position in the quiz
    /// * `opened_at` - When the answering window opened
    /// * `roster` - The session's players, updated with earned points
    pub fn score_question(
        &mut self,
        question: &QuestionSnapshot,
        position: usize,
        opened_at: SystemTime,
        roster: &mut Roster,
    ) {
        let correct_ids = question.correct_ids();

        let submitters = roster
            .iter()
            .filter_map(|player| {
                player
                    .submission(position)
                    .map(|submission| (player.id, player.name.clone(), submission.clone()))
            })
            .sorted_by_key(|(_, _, submission)| (submission.submitted_at, submission.seq))
            .collect_vec();

        let fully_correct = submitters
            .iter()
            .filter(|(_, _, submission)| submission.answers == correct_ids)
            .collect_vec();

        for (rank, (id, _, _)) in fully_correct.iter().enumerate() {
            roster.add_score(*id, question.points as f64 / (rank + 1) as f64);
        }

        let breakdown = question
            .correct_answers()
            .map(|answer| AnswerBreakdown {
                answer_id: answer.id,
                players: submitters
                    .iter()
                    .filter(|(_, _, submission)| submission.answers.contains(&answer.id))
                    .map(|(_, name, _)| name.clone())
                    .collect(),
            })
            .collect();

        let average_answer_time = if submitters.is_empty() {
            0.0
        } else {
            submitters
                .iter()
                .map(|(_, _, submission)| {
                    submission
                        .submitted_at
                        .duration_since(opened_at)
                        .unwrap_or_default()
                        .as_secs_f64()
                })
                .sum::<f64>()
                / submitters.len() as f64
        };

        let percent_correct = if roster.is_empty() {
            0
        } else {
            ((fully_correct.len() as f64 / roster.len() as f64) * 100.0).round() as u32
        };

        self.results.push(QuestionResult {
            question_id: question.id,
            breakdown,
            average_answer_time,
            percent_correct,
        });
    }

    /// Returns the results of the questions scored so far
    pub fn results(&self) -> &[QuestionResult] {
        &self.results
    }

    /// Assembles the final results from the recorded question results and
    /// the roster's accumulated scores
    ///
    /// Standings are ordered by total score descending; players with equal
    /// scores keep their join order.
    pub fn final_result(&self, roster: &Roster) -> FinalResult {
        let standings = roster
            .iter()
            .sorted_by(|a, b| b.score.total_cmp(&a.score))
            .map(|player| FinalStanding {
                name: player.name.clone(),
                score: player.score,
            })
            .collect_vec();

        FinalResult {
            standings,
            question_results: self.results.clone(),
        }
    }
}
