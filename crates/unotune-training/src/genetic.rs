//! Population lifecycle: candidates, breeding, evaluation, ranking and parent selection.
//!
//! One generation moves through these steps:
//!
//! 1. **Breed** - [`Population::breed`] expands a parent pool of size `k` into `2k²`
//!    offspring: two children for every ordered parent pair, self-pairs included
//! 2. **Evaluate** - [`Population::evaluate`] plays every offspring against the baseline
//!    lineup in parallel
//! 3. **Rank** - [`Population::sort_by_fitness`] orders offspring best first
//! 4. **Select** - [`select_parent_ranks`] picks the next parent pool by rank
//!
//! # Rank-biased selection
//!
//! A candidate at rank `p` (0-based) joins the pool in a round when `v + 1/(p + 1) > 1`
//! with `v ~ U(0, 1)`, i.e. with probability `1/(p + 1)`. Rank 0 always joins; weaker ranks
//! keep a small chance, which preserves diversity. Rounds repeat until the pool is full.
//! Because a degenerate request could otherwise loop for a very long time, rounds are
//! capped at [`MAX_SELECTION_ROUNDS`]; any slots still empty are then filled by rank.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::{Rng, SeedableRng as _};
use rand_distr::{Distribution, Open01};
use rayon::prelude::*;
use unotune_engine::{Agent, IllegalPlayError, MatchRng, MatchRunner, Weights};
use unotune_evaluator::fitness_evaluator::{Evaluation, FitnessEvaluator};
use unotune_stats::descriptive::DescriptiveStats;

use crate::weights;

/// Maximum number of selection rounds before falling back to rank order.
pub const MAX_SELECTION_ROUNDS: usize = 1000;

/// Offspring produced for each ordered pair of parents.
pub const OFFSPRING_PER_PAIR: usize = 2;

/// A weight vector together with where it came from and how it performed.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    name: String,
    generation: i64,
    weights: Weights,
    fitness: f64,
    points: i64,
    win_rate: f64,
}

impl Candidate {
    /// Creates an unevaluated candidate (fitness and points 0, win rate NaN).
    #[must_use]
    pub fn new<S>(name: S, generation: i64, weights: Weights) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            generation,
            weights,
            fitness: 0.0,
            points: 0,
            win_rate: f64::NAN,
        }
    }

    /// Creates a candidate carrying previously recorded results.
    #[must_use]
    pub fn with_results<S>(
        name: S,
        generation: i64,
        weights: Weights,
        fitness: f64,
        points: i64,
        win_rate: f64,
    ) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            generation,
            weights,
            fitness,
            points,
            win_rate,
        }
    }

    /// Returns the display name (`Player<k>`, `Parent <i>`, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the generation the candidate was born in.
    #[must_use]
    pub fn generation(&self) -> i64 {
        self.generation
    }

    /// Returns the weight vector.
    #[must_use]
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Returns the fitness the candidate is ranked by (its evaluation points).
    #[must_use]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Returns the points scored in the last evaluation batch.
    #[must_use]
    pub fn points(&self) -> i64 {
        self.points
    }

    /// Returns the win rate of the last evaluation batch, NaN before any evaluation.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        self.win_rate
    }

    /// Replaces previous results with those of a fresh evaluation batch.
    pub fn apply_evaluation(&mut self, evaluation: &Evaluation) {
        self.fitness = evaluation.fitness();
        self.points = evaluation.points;
        self.win_rate = evaluation.win_rate;
    }

    /// Returns a copy renamed to `name`, keeping weights and results.
    #[must_use]
    pub fn renamed<S>(&self, name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Builds the agent seated for this candidate's matches.
    #[must_use]
    pub fn to_agent(&self) -> Agent {
        Agent::new(self.name.clone(), self.generation, self.weights)
    }
}

/// Evaluation failure of one offspring.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("{candidate} (offspring #{index}): {source}")]
pub struct CandidateError {
    pub index: usize,
    pub candidate: String,
    pub source: IllegalPlayError,
}

/// Offspring of one generation.
#[derive(Debug, Clone, Default)]
pub struct Population {
    candidates: Vec<Candidate>,
}

impl Population {
    #[must_use]
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// Breeds `2 * parents.len()²` offspring born in `generation`.
    ///
    /// Offspring are ordered by first parent, then second parent, then child index, and
    /// named `Player0`, `Player1`, ... in that order.
    pub fn breed<R>(parents: &[Candidate], generation: i64, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut candidates =
            Vec::with_capacity(parents.len() * parents.len() * OFFSPRING_PER_PAIR);
        for p1 in parents {
            for p2 in parents {
                for _ in 0..OFFSPRING_PER_PAIR {
                    let child = weights::breed(p1.weights(), p2.weights(), rng);
                    let name = format!("Player{}", candidates.len());
                    candidates.push(Candidate::new(name, generation, child));
                }
            }
        }
        Self { candidates }
    }

    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns the first candidate, which is the best once the population is sorted.
    #[must_use]
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Evaluates every candidate against `baselines` in parallel.
    ///
    /// Each candidate gets its own match generator seeded from `rng`, drawn in offspring
    /// order before any evaluation starts, so results do not depend on thread scheduling.
    ///
    /// An illegal play stops every candidate ranked after the failing one before its next
    /// match. Candidates before it keep playing, so the error returned is always the one of
    /// the lowest-indexed failing candidate. No results are applied on failure.
    ///
    /// # Arguments
    ///
    /// * `evaluator` - Plays each candidate's batch of matches
    /// * `baselines` - Opponents seated after the candidate
    /// * `rng` - Master generator the per-candidate seeds are drawn from
    pub fn evaluate<M, R>(
        &mut self,
        evaluator: &FitnessEvaluator<M>,
        baselines: &[Agent],
        rng: &mut R,
    ) -> Result<(), CandidateError>
    where
        M: MatchRunner,
        R: Rng + ?Sized,
    {
        let seeds = (0..self.candidates.len())
            .map(|_| rng.random::<u64>())
            .collect::<Vec<_>>();
        let first_failure = AtomicUsize::new(usize::MAX);

        let outcomes = self
            .candidates
            .par_iter()
            .zip(seeds)
            .enumerate()
            .map(|(index, (candidate, seed))| {
                let mut match_rng = MatchRng::seed_from_u64(seed);
                let proceed = || first_failure.load(Ordering::Relaxed) > index;
                let outcome = evaluator
                    .evaluate_while(&candidate.to_agent(), baselines, &mut match_rng, proceed)
                    .map_err(|source| {
                        first_failure.fetch_min(index, Ordering::Relaxed);
                        CandidateError {
                            index,
                            candidate: candidate.name().to_owned(),
                            source,
                        }
                    })?;
                if let Some(evaluation) = &outcome {
                    log::info!(
                        "Finished {}: fitness {}, win rate {:.4}",
                        candidate.name(),
                        evaluation.fitness(),
                        evaluation.win_rate
                    );
                }
                Ok::<_, CandidateError>(outcome)
            })
            .collect::<Vec<_>>();

        // a batch is only cancelled behind a failure, so without an error all are complete
        let evaluations = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
        let evaluations = evaluations.iter().flatten();
        for (candidate, evaluation) in self.candidates.iter_mut().zip(evaluations) {
            candidate.apply_evaluation(evaluation);
        }
        Ok(())
    }

    /// Sorts candidates by fitness, best first.
    ///
    /// The sort is stable: candidates with equal fitness keep their offspring order.
    pub fn sort_by_fitness(&mut self) {
        self.candidates.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    /// Computes descriptive statistics of the candidates' fitness.
    ///
    /// # Returns
    ///
    /// `None` for an empty population
    #[must_use]
    pub fn compute_fitness_stats(&self) -> Option<DescriptiveStats> {
        DescriptiveStats::new(self.candidates.iter().map(Candidate::fitness))
    }

    /// Clones the candidates at `ranks`, in the given order.
    #[must_use]
    pub fn pick(&self, ranks: &[usize]) -> Vec<Candidate> {
        ranks.iter().map(|&r| self.candidates[r].clone()).collect()
    }
}

/// Chooses `count` distinct ranks out of a population of `population_len`, sorted best
/// first.
///
/// Ranks are returned in the order they were selected. `count` is clamped to
/// `population_len`.
pub fn select_parent_ranks<R>(population_len: usize, count: usize, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let count = count.min(population_len);
    let mut selected = vec![false; population_len];
    let mut ranks = Vec::with_capacity(count);

    for _ in 0..MAX_SELECTION_ROUNDS {
        if ranks.len() == count {
            break;
        }
        for (p, taken) in selected.iter_mut().enumerate() {
            if ranks.len() == count {
                break;
            }
            if *taken {
                continue;
            }
            let v: f64 = Open01.sample(rng);
            #[expect(clippy::cast_precision_loss)]
            let bias = 1.0 / (p + 1) as f64;
            if v + bias > 1.0 {
                *taken = true;
                ranks.push(p);
            }
        }
    }

    if ranks.len() < count {
        log::warn!(
            "Parent selection filled {} of {count} slots in {MAX_SELECTION_ROUNDS} rounds; filling the rest by rank",
            ranks.len()
        );
        for (p, taken) in selected.iter_mut().enumerate() {
            if ranks.len() == count {
                break;
            }
            if !*taken {
                *taken = true;
                ranks.push(p);
            }
        }
    }

    ranks
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;
    use unotune_engine::{NUM_VALUES, Scoreboard, SurrogateMatch};

    use super::*;

    fn candidate_with_fitness(i: usize, fitness: f64) -> Candidate {
        Candidate::with_results(format!("Player{i}"), 1, [0.0; NUM_VALUES], fitness, 0, 0.0)
    }

    #[test]
    fn test_breed_pool_of_five_gives_fifty() {
        let mut rng = Pcg32::seed_from_u64(1);
        let parents = (0..5)
            .map(|i| Candidate::new(format!("Parent {i}"), 0, weights::random(&mut rng, 15.0)))
            .collect::<Vec<_>>();
        let population = Population::breed(&parents, 1, &mut rng);
        assert_eq!(population.len(), 50);
        assert_eq!(population.candidates()[0].name(), "Player0");
        assert_eq!(population.candidates()[49].name(), "Player49");
        assert!(population.candidates().iter().all(|c| c.generation() == 1));
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let mut population = Population::new(vec![
            candidate_with_fitness(0, 3.0),
            candidate_with_fitness(1, 9.0),
            candidate_with_fitness(2, 3.0),
            candidate_with_fitness(3, 12.0),
        ]);
        population.sort_by_fitness();
        let names = population
            .candidates()
            .iter()
            .map(Candidate::name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["Player3", "Player1", "Player0", "Player2"]);
    }

    #[test]
    fn test_selection_returns_distinct_ranks() {
        for seed in 0..50 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let ranks = select_parent_ranks(50, 5, &mut rng);
            assert_eq!(ranks.len(), 5);
            assert_eq!(ranks.iter().collect::<BTreeSet<_>>().len(), 5);
            assert!(ranks.iter().all(|&r| r < 50));
            // rank 0 is drawn first and always accepted
            assert_eq!(ranks[0], 0);
        }
    }

    #[test]
    fn test_selection_is_reproducible() {
        let a = select_parent_ranks(50, 5, &mut Pcg32::seed_from_u64(8));
        let b = select_parent_ranks(50, 5, &mut Pcg32::seed_from_u64(8));
        assert_eq!(a, b);
    }

    #[test]
    fn test_selection_favors_top_ranks() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut hits = [0usize; 50];
        for _ in 0..500 {
            for r in select_parent_ranks(50, 5, &mut rng) {
                hits[r] += 1;
            }
        }
        assert_eq!(hits[0], 500);
        assert!(hits[1] > hits[10]);
        assert!(hits[10] > 0 || hits[20] > 0 || hits[40] > 0);
    }

    #[test]
    fn test_selection_degenerate_requests_terminate() {
        let mut rng = Pcg32::seed_from_u64(0);
        let mut all = select_parent_ranks(4, 10, &mut rng);
        all.sort_unstable();
        assert_eq!(all, [0, 1, 2, 3]);
        assert!(select_parent_ranks(0, 5, &mut rng).is_empty());
        assert!(select_parent_ranks(10, 0, &mut rng).is_empty());
    }

    #[test]
    fn test_evaluate_keeps_offspring_order_and_is_reproducible() {
        let evaluator = FitnessEvaluator::new(SurrogateMatch::default(), 20);
        let baselines = (1..4)
            .map(|s| Agent::baseline(s, [1.0; NUM_VALUES]))
            .collect::<Vec<_>>();
        let mut rng = Pcg32::seed_from_u64(6);
        let parents = (0..2)
            .map(|i| Candidate::new(format!("Parent {i}"), 0, weights::random(&mut rng, 15.0)))
            .collect::<Vec<_>>();
        let bred = Population::breed(&parents, 1, &mut rng);

        let mut first = bred.clone();
        first
            .evaluate(&evaluator, &baselines, &mut Pcg32::seed_from_u64(77))
            .unwrap();
        let mut second = bred.clone();
        second
            .evaluate(&evaluator, &baselines, &mut Pcg32::seed_from_u64(77))
            .unwrap();

        assert_eq!(first.candidates(), second.candidates());
        for (evaluated, original) in first.candidates().iter().zip(bred.candidates()) {
            assert_eq!(evaluated.name(), original.name());
            assert_eq!(evaluated.weights(), original.weights());
            assert!(evaluated.win_rate() >= 0.0);
        }
    }

    #[derive(Debug)]
    struct FailOnNegativeFirstGene;

    impl MatchRunner for FailOnNegativeFirstGene {
        fn play_match(
            &self,
            lineup: &[Agent],
            scoreboard: &mut Scoreboard,
            _rng: &mut MatchRng,
        ) -> Result<(), IllegalPlayError> {
            if lineup[0].weights()[0] < 0.0 {
                return Err(IllegalPlayError::new("negative"));
            }
            scoreboard.add_to_score(0, 1);
            Ok(())
        }
    }

    #[test]
    fn test_evaluate_reports_first_failing_offspring() {
        let evaluator = FitnessEvaluator::new(FailOnNegativeFirstGene, 3);
        let first_gene = |v: f64| {
            let mut w = [1.0; NUM_VALUES];
            w[0] = v;
            w
        };
        let mut population = Population::new(vec![
            Candidate::new("Player0", 1, first_gene(1.0)),
            Candidate::new("Player1", 1, first_gene(-1.0)),
            Candidate::new("Player2", 1, first_gene(-2.0)),
        ]);
        let err = population
            .evaluate(&evaluator, &[], &mut Pcg32::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.candidate, "Player1");
        // nothing applied on failure
        assert!(population.candidates()[0].win_rate().is_nan());
    }

    /// Counts every match and fails each one played by `failing`.
    #[derive(Debug)]
    struct FailsForCandidate {
        failing: &'static str,
        played: AtomicUsize,
    }

    impl MatchRunner for FailsForCandidate {
        fn play_match(
            &self,
            lineup: &[Agent],
            scoreboard: &mut Scoreboard,
            _rng: &mut MatchRng,
        ) -> Result<(), IllegalPlayError> {
            self.played.fetch_add(1, Ordering::SeqCst);
            if lineup[0].name() == self.failing {
                return Err(IllegalPlayError::new("scripted"));
            }
            scoreboard.add_to_score(0, 1);
            Ok(())
        }
    }

    #[test]
    fn test_illegal_play_stops_later_offspring() {
        let runner = FailsForCandidate {
            failing: "Player3",
            played: AtomicUsize::new(0),
        };
        let evaluator = FitnessEvaluator::new(runner, 1000);
        let mut population = Population::new(
            (0..10)
                .map(|i| Candidate::new(format!("Player{i}"), 1, [1.0; NUM_VALUES]))
                .collect(),
        );

        // one worker visits offspring in order
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let err = pool
            .install(|| population.evaluate(&evaluator, &[], &mut Pcg32::seed_from_u64(0)))
            .unwrap_err();
        assert_eq!(err.index, 3);
        // three full batches, then the failing match; nothing after it
        assert_eq!(evaluator.runner().played.load(Ordering::SeqCst), 3 * 1000 + 1);
    }

    #[test]
    fn test_illegal_play_in_parallel_reports_lowest_index() {
        let runner = FailsForCandidate {
            failing: "Player0",
            played: AtomicUsize::new(0),
        };
        let evaluator = FitnessEvaluator::new(runner, 1000);
        let mut population = Population::new(
            (0..50)
                .map(|i| Candidate::new(format!("Player{i}"), 1, [1.0; NUM_VALUES]))
                .collect(),
        );
        let err = population
            .evaluate(&evaluator, &[], &mut Pcg32::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err.index, 0);
        assert!(population.candidates().iter().all(|c| c.win_rate().is_nan()));
    }
}
