use std::iter;

use unotune_engine::{Agent, IllegalPlayError, MatchRng, MatchRunner, Scoreboard};

/// Seat the evaluated candidate occupies in every lineup.
pub const CANDIDATE_SEAT: usize = 0;

/// Result of one evaluation batch, read from seat 0 of the batch scoreboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Cumulative points won by the candidate.
    pub points: i64,
    /// Candidate wins over all outcomes recorded on the board. NaN if none were recorded.
    pub win_rate: f64,
    /// Outcomes recorded on the board.
    pub games: u64,
}

impl Evaluation {
    /// Fitness used for ranking: the candidate's cumulative points.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.points as f64
    }
}

/// Plays a fixed number of matches for one candidate against baseline agents.
#[derive(Debug)]
pub struct FitnessEvaluator<M> {
    runner: M,
    games: usize,
}

impl<M> FitnessEvaluator<M>
where
    M: MatchRunner,
{
    /// Creates an evaluator playing `games` matches per candidate.
    pub fn new(runner: M, games: usize) -> Self {
        Self { runner, games }
    }

    #[must_use]
    pub fn games(&self) -> usize {
        self.games
    }

    #[must_use]
    pub fn runner(&self) -> &M {
        &self.runner
    }

    /// Evaluates `candidate` seated before `baselines`.
    ///
    /// Stops at the first illegal play and returns it; the partial batch is discarded.
    ///
    /// # Arguments
    ///
    /// * `candidate` - Agent placed in [`CANDIDATE_SEAT`]
    /// * `baselines` - Agents filling the remaining seats, in seat order
    /// * `rng` - Generator driving every match of the batch
    ///
    /// # Returns
    ///
    /// The candidate's points and win rate over the batch
    pub fn evaluate(
        &self,
        candidate: &Agent,
        baselines: &[Agent],
        rng: &mut MatchRng,
    ) -> Result<Evaluation, IllegalPlayError> {
        let scoreboard = self.play_batch(candidate, baselines, rng, || true)?;
        Ok(Self::read_candidate_seat(&scoreboard))
    }

    /// Like [`FitnessEvaluator::evaluate`], but checks `proceed` before every match.
    ///
    /// Returns `Ok(None)` as soon as `proceed` returns `false`; no further matches are played.
    pub fn evaluate_while<F>(
        &self,
        candidate: &Agent,
        baselines: &[Agent],
        rng: &mut MatchRng,
        mut proceed: F,
    ) -> Result<Option<Evaluation>, IllegalPlayError>
    where
        F: FnMut() -> bool,
    {
        let mut cancelled = false;
        let scoreboard = self.play_batch(candidate, baselines, rng, || {
            cancelled = !proceed();
            !cancelled
        })?;
        if cancelled {
            log::debug!("{} cancelled", candidate.name());
            return Ok(None);
        }
        Ok(Some(Self::read_candidate_seat(&scoreboard)))
    }

    fn play_batch<F>(
        &self,
        candidate: &Agent,
        baselines: &[Agent],
        rng: &mut MatchRng,
        mut proceed: F,
    ) -> Result<Scoreboard, IllegalPlayError>
    where
        F: FnMut() -> bool,
    {
        let lineup = iter::once(candidate)
            .chain(baselines)
            .cloned()
            .collect::<Vec<_>>();
        let mut scoreboard = Scoreboard::new(lineup.len());

        for game in 0..self.games {
            if !proceed() {
                break;
            }
            self.runner
                .play_match(&lineup, &mut scoreboard, rng)
                .inspect_err(|e| {
                    log::debug!("{} aborted at game {game}: {e}", candidate.name());
                })?;
        }
        Ok(scoreboard)
    }

    fn read_candidate_seat(scoreboard: &Scoreboard) -> Evaluation {
        Evaluation {
            points: scoreboard.score(CANDIDATE_SEAT),
            win_rate: scoreboard.win_rate(CANDIDATE_SEAT),
            games: scoreboard.games(),
        }
    }
}
