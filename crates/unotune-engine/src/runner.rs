use std::fmt;

use rand_pcg::Pcg32;

use crate::{Agent, IllegalPlayError, Scoreboard};

/// Random source handed to a match runner for one batch of matches.
pub type MatchRng = Pcg32;

/// Plays complete matches for a lineup of agents.
///
/// Implementations record each finished match on the scoreboard by calling
/// [`Scoreboard::add_to_score`] exactly once, for the winning seat. The scoreboard has one
/// seat per lineup entry, in lineup order.
pub trait MatchRunner: fmt::Debug + Send + Sync {
    /// Plays one match to completion.
    ///
    /// Returns an error if the match reached an illegal or unrecoverable state. Nothing
    /// should be recorded on the scoreboard in that case.
    fn play_match(
        &self,
        lineup: &[Agent],
        scoreboard: &mut Scoreboard,
        rng: &mut MatchRng,
    ) -> Result<(), IllegalPlayError>;
}

impl<M> MatchRunner for &M
where
    M: MatchRunner + ?Sized,
{
    fn play_match(
        &self,
        lineup: &[Agent],
        scoreboard: &mut Scoreboard,
        rng: &mut MatchRng,
    ) -> Result<(), IllegalPlayError> {
        (**self).play_match(lineup, scoreboard, rng)
    }
}
