use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};

use crate::{Agent, IllegalPlayError, MatchRng, MatchRunner, Scoreboard, Weights};

const HAND_SIZE: usize = 7;
const TRICKS_TO_WIN: u32 = 3;
const MAX_CARD_POINTS: i64 = 50;

/// Preference bias used by [`SurrogateMatch::default`].
const DEFAULT_BIAS: Weights = [
    1.0, 0.8, 0.6, 0.4, 0.2, 0.0, -0.2, -0.4, -0.6, -0.8, -1.0, 0.5,
];

/// A stand-in match runner with a short trick-taking race.
///
/// Every seat is dealt seven cards. A card is a feature vector in `[0, 1)^NUM_VALUES` plus
/// a point value. Each trick:
///
/// 1. Every seat plays the card that maximizes `weights · features` for its agent, and the
///    played cards leave the hands
/// 2. The card that maximizes `preference · features` takes the trick (ties go to the
///    lowest seat)
///
/// The preference vector is drawn once per match as `bias + U(-0.5, 0.5)` per coefficient,
/// so agents whose weights point along the bias take the early tricks. The first seat to
/// take three tricks wins the match and scores the points still held by the other seats.
/// If the hands run out first, the seat with the most tricks wins (lowest seat on ties).
///
/// # Example
///
/// ```
/// use rand::SeedableRng as _;
/// use unotune_engine::{Agent, MatchRng, MatchRunner, NUM_VALUES, Scoreboard, SurrogateMatch};
///
/// let lineup = [Agent::baseline(0, [1.0; NUM_VALUES]), Agent::baseline(1, [0.5; NUM_VALUES])];
/// let mut board = Scoreboard::new(lineup.len());
/// let mut rng = MatchRng::seed_from_u64(7);
///
/// SurrogateMatch::default().play_match(&lineup, &mut board, &mut rng).unwrap();
/// assert_eq!(board.games(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SurrogateMatch {
    bias: Weights,
}

impl Default for SurrogateMatch {
    fn default() -> Self {
        Self::new(DEFAULT_BIAS)
    }
}

impl SurrogateMatch {
    /// Creates a runner whose hidden preference is centered on `bias`.
    #[must_use]
    pub const fn new(bias: Weights) -> Self {
        Self { bias }
    }
}

#[derive(Debug, Clone, Copy)]
struct Card {
    features: Weights,
    points: i64,
}

impl Distribution<Card> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Card {
        Card {
            features: rng.random(),
            points: rng.random_range(1..=MAX_CARD_POINTS),
        }
    }
}

fn dot(a: &Weights, b: &Weights) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Index of the first maximum of `values`.
fn first_max_by_key<T, F>(values: &[T], mut key: F) -> Option<usize>
where
    F: FnMut(&T) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().enumerate() {
        let k = key(v);
        if best.is_none_or(|(_, b)| k > b) {
            best = Some((i, k));
        }
    }
    best.map(|(i, _)| i)
}

impl MatchRunner for SurrogateMatch {
    fn play_match(
        &self,
        lineup: &[Agent],
        scoreboard: &mut Scoreboard,
        rng: &mut MatchRng,
    ) -> Result<(), IllegalPlayError> {
        if lineup.len() < 2 {
            return Err(IllegalPlayError::new(format!(
                "a match needs at least 2 seats, got {}",
                lineup.len()
            )));
        }
        if lineup.len() != scoreboard.seat_count() {
            return Err(IllegalPlayError::new(format!(
                "lineup has {} agents but the scoreboard has {} seats",
                lineup.len(),
                scoreboard.seat_count()
            )));
        }
        if let Some(agent) = lineup
            .iter()
            .find(|a| a.weights().iter().any(|w| !w.is_finite()))
        {
            return Err(IllegalPlayError::new(format!(
                "agent {} has non-finite weights",
                agent.name()
            )));
        }

        let mut preference = self.bias;
        for p in &mut preference {
            *p += rng.random_range(-0.5..0.5);
        }
        let mut hands: Vec<Vec<Card>> = (0..lineup.len())
            .map(|_| (0..HAND_SIZE).map(|_| rng.random()).collect())
            .collect();
        let mut tricks = vec![0; lineup.len()];

        for _ in 0..HAND_SIZE {
            let played = lineup
                .iter()
                .zip(&mut hands)
                .map(|(agent, hand)| -> Result<Card, IllegalPlayError> {
                    let index =
                        first_max_by_key(hand.as_slice(), |c| dot(agent.weights(), &c.features))
                            .ok_or_else(|| {
                                IllegalPlayError::new(format!(
                                    "{} has no card to play",
                                    agent.name()
                                ))
                            })?;
                    Ok(hand.swap_remove(index))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let trick_winner =
                first_max_by_key(played.as_slice(), |c| dot(&preference, &c.features))
                    .ok_or_else(|| IllegalPlayError::new("trick with no cards played"))?;
            tricks[trick_winner] += 1;
            if tricks[trick_winner] == TRICKS_TO_WIN {
                award(scoreboard, &hands, trick_winner);
                return Ok(());
            }
        }

        // lowest seat among those with the most tricks
        let winner = first_max_by_key(tricks.as_slice(), |&t| f64::from(t))
            .ok_or_else(|| IllegalPlayError::new("no seat took a trick"))?;
        award(scoreboard, &hands, winner);
        Ok(())
    }
}

/// Credits `winner` with the points still held by the other seats.
fn award(scoreboard: &mut Scoreboard, hands: &[Vec<Card>], winner: usize) {
    let points = hands
        .iter()
        .enumerate()
        .filter(|&(seat, _)| seat != winner)
        .flat_map(|(_, hand)| hand)
        .map(|c| c.points)
        .sum();
    scoreboard.add_to_score(winner, points);
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;

    use super::*;
    use crate::NUM_VALUES;

    fn lineup(weights: &[Weights]) -> Vec<Agent> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| Agent::baseline(i, *w))
            .collect()
    }

    #[test]
    fn test_records_exactly_one_outcome_per_match() {
        let runner = SurrogateMatch::default();
        let agents = lineup(&[[1.0; NUM_VALUES], [0.0; NUM_VALUES], [-1.0; NUM_VALUES]]);
        let mut board = Scoreboard::new(agents.len());
        let mut rng = MatchRng::seed_from_u64(42);
        for _ in 0..20 {
            runner.play_match(&agents, &mut board, &mut rng).unwrap();
        }
        assert_eq!(board.games(), 20);
        let wins: u64 = (0..agents.len()).map(|s| board.games_won(s)).sum();
        assert_eq!(wins, 20);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let runner = SurrogateMatch::default();
        let agents = lineup(&[[0.3; NUM_VALUES], DEFAULT_BIAS]);
        let play = |seed| {
            let mut board = Scoreboard::new(agents.len());
            let mut rng = MatchRng::seed_from_u64(seed);
            for _ in 0..10 {
                runner.play_match(&agents, &mut board, &mut rng).unwrap();
            }
            (board.score(0), board.score(1), board.games_won(0))
        };
        assert_eq!(play(9), play(9));
    }

    #[test]
    fn test_bias_aligned_agent_beats_opposed_agent() {
        let runner = SurrogateMatch::default();
        let opposed = DEFAULT_BIAS.map(|b| -b);
        let agents = lineup(&[DEFAULT_BIAS, opposed]);
        let mut board = Scoreboard::new(agents.len());
        let mut rng = MatchRng::seed_from_u64(1);
        for _ in 0..200 {
            runner.play_match(&agents, &mut board, &mut rng).unwrap();
        }
        assert!(board.games_won(0) > 140, "{board}");

        // the advantage follows the weights, not the seat
        let agents = lineup(&[opposed, DEFAULT_BIAS]);
        let mut board = Scoreboard::new(agents.len());
        for _ in 0..200 {
            runner.play_match(&agents, &mut board, &mut rng).unwrap();
        }
        assert!(board.games_won(1) > 140, "{board}");
    }

    #[test]
    fn test_aligned_agent_leads_three_seat_table() {
        let runner = SurrogateMatch::default();
        let agents = lineup(&[DEFAULT_BIAS, DEFAULT_BIAS.map(|b| -b), [0.0; NUM_VALUES]]);
        let mut board = Scoreboard::new(agents.len());
        let mut rng = MatchRng::seed_from_u64(3);
        for _ in 0..50 {
            runner.play_match(&agents, &mut board, &mut rng).unwrap();
        }
        assert_eq!(board.games(), 50);
        assert_eq!(board.most_won(), 0);
        assert_eq!(board.winner(), 0);
        assert!(board.score(0) > 0);
    }

    #[test]
    fn test_non_finite_weights_are_illegal() {
        let runner = SurrogateMatch::default();
        let mut bad = [1.0; NUM_VALUES];
        bad[3] = f64::NAN;
        let agents = lineup(&[[1.0; NUM_VALUES], bad]);
        let mut board = Scoreboard::new(agents.len());
        let mut rng = MatchRng::seed_from_u64(0);
        let err = runner.play_match(&agents, &mut board, &mut rng).unwrap_err();
        assert!(err.reason().contains("Baseline1"));
        assert_eq!(board.games(), 0);
    }

    #[test]
    fn test_seat_mismatch_is_illegal() {
        let runner = SurrogateMatch::default();
        let agents = lineup(&[[1.0; NUM_VALUES], [1.0; NUM_VALUES]]);
        let mut board = Scoreboard::new(3);
        let mut rng = MatchRng::seed_from_u64(0);
        assert!(runner.play_match(&agents, &mut board, &mut rng).is_err());
    }
}
