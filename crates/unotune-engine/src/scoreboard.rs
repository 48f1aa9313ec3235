use std::fmt;

/// Points and wins per seat accumulated over a batch of matches.
///
/// The games counter is shared by the whole board: every call to
/// [`add_to_score`](Self::add_to_score) counts one recorded outcome regardless of seat.
/// Match runners call it exactly once per completed match, for the winning seat only, so
/// `games_won(seat) / games()` is that seat's win rate.
///
/// # Example
///
/// ```
/// use unotune_engine::Scoreboard;
///
/// let mut board = Scoreboard::new(2);
/// board.add_to_score(0, 10);
/// board.add_to_score(1, 5);
/// board.add_to_score(0, 7);
///
/// assert_eq!(board.score(0), 17);
/// assert_eq!(board.games(), 3);
/// assert_eq!(board.winner(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct Scoreboard {
    scores: Vec<i64>,
    games_won: Vec<u64>,
    games: u64,
}

impl Scoreboard {
    /// Creates an empty board for `seats` seats.
    #[must_use]
    pub fn new(seats: usize) -> Self {
        Self {
            scores: vec![0; seats],
            games_won: vec![0; seats],
            games: 0,
        }
    }

    #[must_use]
    pub fn seat_count(&self) -> usize {
        self.scores.len()
    }

    /// Records a won match: awards `points` and one win to `seat`.
    pub fn add_to_score(&mut self, seat: usize, points: i64) {
        self.scores[seat] += points;
        self.games_won[seat] += 1;
        self.games += 1;
    }

    #[must_use]
    pub fn score(&self, seat: usize) -> i64 {
        self.scores[seat]
    }

    #[must_use]
    pub fn games_won(&self, seat: usize) -> u64 {
        self.games_won[seat]
    }

    /// Total outcomes recorded on the board.
    #[must_use]
    pub fn games(&self) -> u64 {
        self.games
    }

    /// Returns `games_won(seat) / games()`, or NaN before any outcome is recorded.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn win_rate(&self, seat: usize) -> f64 {
        if self.games == 0 {
            return f64::NAN;
        }
        self.games_won[seat] as f64 / self.games as f64
    }

    /// Seat with the highest score. Ties go to the lowest seat index.
    #[must_use]
    pub fn winner(&self) -> usize {
        first_max_index(&self.scores)
    }

    /// Seat with the most wins. Ties go to the lowest seat index.
    #[must_use]
    pub fn most_won(&self) -> usize {
        first_max_index(&self.games_won)
    }
}

fn first_max_index<T>(values: &[T]) -> usize
where
    T: PartialOrd,
{
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

impl fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, score) in self.scores.iter().enumerate() {
            writeln!(f, "Player #{i}: {score}")?;
        }
        Ok(())
    }
}
