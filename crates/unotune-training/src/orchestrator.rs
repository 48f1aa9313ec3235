//! The generational training loop.
//!
//! [`GenerationOrchestrator`] owns the run state and drives each generation through its
//! phases:
//!
//! ```text
//! Init → Breeding → Evaluating → Ranking → Persisting → Selecting ─┐
//!           ↑                                                       │
//!           └───────────────────────────────────────────────────────┘
//!                                                       (or Done)
//! ```
//!
//! Every failure is fatal for the run. An illegal play aborts before anything of that
//! generation is persisted; files of earlier generations are left untouched, so a run can
//! be resumed from the last written generation.

use std::ops::Range;

use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use unotune_engine::{Agent, MatchRunner};
use unotune_evaluator::fitness_evaluator::FitnessEvaluator;
use unotune_stats::descriptive::DescriptiveStats;

use crate::{
    genetic::{self, Candidate, CandidateError, OFFSPRING_PER_PAIR, Population},
    store::{BASELINE_NAME, StoreError, ValuesStore},
    weights,
};

const BEST_PLAYER_NAME: &str = "BestPlayer";

/// Parameters of a training run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrainingConfig {
    /// Generation to resume from; 0 starts from random parents.
    pub starting_generation: i64,
    /// Exclusive upper bound of generation numbers to run.
    pub max_generations: i64,
    /// Seats per match: the candidate plus `num_players - 1` baselines.
    pub num_players: usize,
    /// Matches played per candidate evaluation.
    pub games_per_generation: usize,
    /// Offspring per generation. Must equal `2 * (population_size / 10)²`.
    pub population_size: usize,
    /// Upper bound of genes in randomly seeded parents.
    pub initial_weight_max: f64,
    /// Seed of the run's master random generator.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            starting_generation: 0,
            max_generations: 100_000,
            num_players: 4,
            games_per_generation: 10_000,
            population_size: 50,
            initial_weight_max: weights::DEFAULT_INITIAL_MAX,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Size of the parent pool bred into each generation.
    #[must_use]
    pub fn parent_count(&self) -> usize {
        self.population_size / 10
    }

    /// Generation numbers this configuration runs.
    #[must_use]
    pub fn generations(&self) -> Range<i64> {
        self.starting_generation + 1..self.max_generations
    }

    fn validate(&self) -> Result<(), TrainingError> {
        let invalid = |reason: String| Err(TrainingError::InvalidConfig { reason });
        if self.starting_generation < 0 {
            return invalid(format!(
                "starting generation must not be negative, got {}",
                self.starting_generation
            ));
        }
        if self.num_players < 2 {
            return invalid(format!(
                "a match needs at least 2 players, got {}",
                self.num_players
            ));
        }
        if self.games_per_generation == 0 {
            return invalid("games per generation must be at least 1".to_owned());
        }
        let parents = self.parent_count();
        if parents == 0 || parents * parents * OFFSPRING_PER_PAIR != self.population_size {
            return invalid(format!(
                "population size {} cannot be bred from a pool of {parents} parents ({} offspring)",
                self.population_size,
                parents * parents * OFFSPRING_PER_PAIR
            ));
        }
        if !(self.initial_weight_max.is_finite() && self.initial_weight_max > 0.0) {
            return invalid(format!(
                "initial weight maximum must be positive, got {}",
                self.initial_weight_max
            ));
        }
        Ok(())
    }
}

/// Position of the orchestrator in the generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Breeding,
    Evaluating,
    Ranking,
    Persisting,
    Selecting,
    Done,
}

/// Fatal training failure, named after the stage it happened in.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TrainingError {
    #[display("invalid configuration: {reason}")]
    InvalidConfig {
        #[error(not(source))]
        reason: String,
    },
    #[display("failed to load starting data: {source}")]
    StartupData { source: StoreError },
    #[display("illegal play while evaluating generation {generation}: {source}")]
    SimulationIntegrity {
        generation: i64,
        source: CandidateError,
    },
    #[display("failed to persist generation {generation}: {source}")]
    Persistence { generation: i64, source: StoreError },
}

/// Outcome of one completed generation.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub generation: i64,
    /// Top offspring of this generation.
    pub best_of_generation: Candidate,
    /// Best candidate seen so far, after this generation.
    pub all_time_best: Candidate,
    /// Whether this generation replaced the all-time best.
    pub improved: bool,
    /// Ranks of the offspring chosen as next parents, in selection order.
    pub parent_ranks: Vec<usize>,
    pub fitness_stats: Option<DescriptiveStats>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub generations_run: usize,
    pub all_time_best: Candidate,
}

/// Runs the breed → evaluate → rank → persist → select cycle.
#[derive(Debug)]
pub struct GenerationOrchestrator<M> {
    config: TrainingConfig,
    store: ValuesStore,
    evaluator: FitnessEvaluator<M>,
    rng: Pcg32,
    baselines: Vec<Agent>,
    parents: Vec<Candidate>,
    all_time_best: Candidate,
    phase: Phase,
}

impl<M> GenerationOrchestrator<M>
where
    M: MatchRunner,
{
    /// Validates `config`, loads the baseline (and the starting generation when resuming)
    /// and seeds the first parent pool.
    pub fn new(
        config: TrainingConfig,
        store: ValuesStore,
        runner: M,
    ) -> Result<Self, TrainingError> {
        config.validate()?;
        let mut rng = Pcg32::seed_from_u64(config.seed);

        let baseline = store
            .read_weights(BASELINE_NAME)
            .map_err(|source| TrainingError::StartupData { source })?;
        let start = config.starting_generation;
        let all_time_best = if start == 0 {
            Candidate::new(BEST_PLAYER_NAME, start, baseline)
        } else {
            let file = store
                .read_generation(start)
                .map_err(|source| TrainingError::StartupData { source })?;
            let best = file.best(start).ok_or_else(|| TrainingError::StartupData {
                source: StoreError::Malformed {
                    path: store.generation_path(start),
                    line: 1,
                    reason: "generation table has no rows".to_owned(),
                },
            })?;
            best.renamed(BEST_PLAYER_NAME)
        };
        log::info!(
            "Starting from generation {start} with best fitness {}",
            all_time_best.fitness()
        );

        let baselines = (1..config.num_players)
            .map(|seat| Agent::baseline(seat, baseline))
            .collect();
        let parents = (0..config.parent_count())
            .map(|i| {
                let weights = if start == 0 {
                    weights::random(&mut rng, config.initial_weight_max)
                } else {
                    *all_time_best.weights()
                };
                Candidate::new(format!("Parent {i}"), start, weights)
            })
            .collect();
        let evaluator = FitnessEvaluator::new(runner, config.games_per_generation);

        Ok(Self {
            config,
            store,
            evaluator,
            rng,
            baselines,
            parents,
            all_time_best,
            phase: Phase::Init,
        })
    }

    /// Returns the validated configuration of this run.
    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Returns the phase the orchestrator is in.
    ///
    /// After a failed [`GenerationOrchestrator::run_generation`] this is the phase that
    /// failed.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the parent pool the next generation will be bred from.
    #[must_use]
    pub fn parents(&self) -> &[Candidate] {
        &self.parents
    }

    /// Returns the baseline lineup, seats 1 and up.
    #[must_use]
    pub fn baselines(&self) -> &[Agent] {
        &self.baselines
    }

    /// Returns the best candidate seen so far.
    #[must_use]
    pub fn all_time_best(&self) -> &Candidate {
        &self.all_time_best
    }

    /// Runs one full generation and leaves the next parent pool in place.
    ///
    /// # Arguments
    ///
    /// * `generation` - Number the offspring are born in and persisted under
    ///
    /// # Returns
    ///
    /// A report of the ranked generation and the chosen parent ranks
    pub fn run_generation(&mut self, generation: i64) -> Result<GenerationReport, TrainingError> {
        self.phase = Phase::Breeding;
        log::info!(
            "Breeding generation {generation} from {} parents",
            self.parents.len()
        );
        let mut population = Population::breed(&self.parents, generation, &mut self.rng);

        self.phase = Phase::Evaluating;
        log::info!(
            "Evaluating {} offspring over {} games each",
            population.len(),
            self.evaluator.games()
        );
        population
            .evaluate(&self.evaluator, &self.baselines, &mut self.rng)
            .map_err(|source| TrainingError::SimulationIntegrity { generation, source })?;

        self.phase = Phase::Ranking;
        population.sort_by_fitness();
        let best_of_generation = population
            .best()
            .cloned()
            .expect("a validated configuration breeds at least one offspring");
        let improved = best_of_generation.fitness() > self.all_time_best.fitness();
        if improved {
            self.all_time_best = best_of_generation.renamed(BEST_PLAYER_NAME);
        }

        self.phase = Phase::Persisting;
        let persist_error = |source| TrainingError::Persistence { generation, source };
        self.store
            .write_generation(generation, population.candidates())
            .map_err(persist_error)?;
        self.store
            .append_best(generation, &best_of_generation)
            .map_err(persist_error)?;

        self.phase = Phase::Selecting;
        let parent_ranks = genetic::select_parent_ranks(
            population.len(),
            self.config.parent_count(),
            &mut self.rng,
        );
        self.parents = population.pick(&parent_ranks);
        log::debug!("Chosen parents from ranks: {parent_ranks:?}");

        Ok(GenerationReport {
            generation,
            best_of_generation,
            all_time_best: self.all_time_best.clone(),
            improved,
            parent_ranks,
            fitness_stats: population.compute_fitness_stats(),
        })
    }

    /// Runs every configured generation, handing each report to `on_generation`.
    ///
    /// Stops at the first error; generations persisted before it stay on disk.
    pub fn run<F>(mut self, mut on_generation: F) -> Result<TrainingSummary, TrainingError>
    where
        F: FnMut(&GenerationReport),
    {
        let mut generations_run = 0;
        for generation in self.config.generations() {
            let report = self.run_generation(generation)?;
            on_generation(&report);
            generations_run += 1;
        }
        self.phase = Phase::Done;
        Ok(TrainingSummary {
            generations_run,
            all_time_best: self.all_time_best,
        })
    }
}
