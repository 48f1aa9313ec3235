//! Match-facing building blocks shared by the trainer.
//!
//! The trainer never looks inside a card game. It only needs:
//!
//! - [`Agent`] - a seated player described by a name, the generation it was born in and
//!   its weight vector
//! - [`Scoreboard`] - per-seat points and wins accumulated over a batch of matches
//! - [`MatchRunner`] - "play one match for this lineup and record the winner"
//!
//! [`SurrogateMatch`] is a small stand-in runner so the trainer can run end to end
//! without a real rules engine plugged in.

pub use self::{agent::*, runner::*, scoreboard::*, surrogate::*};

pub mod agent;
pub mod runner;
pub mod scoreboard;
pub mod surrogate;

/// A match reached a state it cannot recover from.
///
/// Returned by [`MatchRunner::play_match`]. The trainer treats this as fatal for the whole
/// run.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("illegal play: {reason}")]
pub struct IllegalPlayError {
    #[error(not(source))]
    reason: String,
}

impl IllegalPlayError {
    pub fn new<S>(reason: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
