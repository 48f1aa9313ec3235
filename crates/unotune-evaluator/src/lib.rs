//! Fitness evaluation for trained weight vectors.
//!
//! A candidate's fitness is measured by seating it at seat 0 of a lineup whose other seats
//! hold fixed baseline agents, then playing a batch of matches through a
//! [`MatchRunner`](unotune_engine::MatchRunner). The batch owns one fresh
//! [`Scoreboard`](unotune_engine::Scoreboard); nothing is shared between candidates, so
//! evaluations can run concurrently.
//!
//! ```text
//! FitnessEvaluator
//!     ↓ builds
//! Lineup [candidate, baseline1, baseline2, ...] + fresh Scoreboard
//!     ↓ plays `games` matches via
//! MatchRunner
//!     ↓ produces
//! Evaluation { points, win_rate }
//! ```

pub mod fitness_evaluator;
