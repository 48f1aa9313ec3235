use std::fmt;

/// Number of coefficients in every agent's weight vector.
pub const NUM_VALUES: usize = 12;

/// A fixed-length weight vector. The array type keeps every vector at [`NUM_VALUES`].
pub type Weights = [f64; NUM_VALUES];

/// Column names of the coefficients, in weight-vector order.
pub const COEFFICIENT_NAMES: [&str; NUM_VALUES] = [
    "baseNumberPoints",
    "numberValueCoefficient",
    "mostHeldColorPoints",
    "colorRatioCoefficient",
    "significantLeadRatio",
    "playColorDislikedByHighestPlayerPoints",
    "reversePoints",
    "skipPoints",
    "drawTwoPoints",
    "wildDrawFourPoints",
    "heldColorCoefficient",
    "calledColorPoints",
];

/// Generation number given to agents that are never bred or mutated.
pub const BASELINE_GENERATION: i64 = -1;

/// A player seated in a match lineup.
///
/// # Example
///
/// ```
/// use unotune_engine::{Agent, NUM_VALUES};
///
/// let agent = Agent::baseline(1, [1.0; NUM_VALUES]);
/// assert_eq!(agent.name(), "Baseline1");
/// assert!(agent.is_baseline());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    name: String,
    generation: i64,
    weights: Weights,
}

impl Agent {
    #[must_use]
    pub fn new<S>(name: S, generation: i64, weights: Weights) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            generation,
            weights,
        }
    }

    /// Creates the baseline agent filling seat `seat` of an evaluation lineup.
    #[must_use]
    pub fn baseline(seat: usize, weights: Weights) -> Self {
        Self::new(format!("Baseline{seat}"), BASELINE_GENERATION, weights)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn generation(&self) -> i64 {
        self.generation
    }

    #[must_use]
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.generation == BASELINE_GENERATION
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (gen {}): {:.3?}", self.name, self.generation, self.weights)
    }
}
