//! Evolutionary search over agent weight vectors.
//!
//! Each generation breeds offspring from a small parent pool, scores every offspring by
//! playing it against fixed baseline agents, ranks and persists the results, then picks the
//! next parents with a rank-biased random selection.
//!
//! # How Training Works
//!
//! 1. **Breeding** - every ordered parent pair yields two children by uniform crossover and a
//!    heavy-tailed mutation ([`weights::breed`])
//! 2. **Evaluation** - each child plays a batch of matches in seat 0 against the baselines;
//!    its fitness is the points it accumulated ([`genetic::Population::evaluate`])
//! 3. **Ranking** - offspring are sorted by fitness, best first
//! 4. **Persistence** - the ranked table goes to `gen<N>.csv` and the generation's top entry
//!    is appended to `best.csv` ([`store::ValuesStore`])
//! 5. **Selection** - rank `p` is kept with probability `1 / (p + 1)` until the parent pool
//!    is full ([`genetic::select_parent_ranks`])
//!
//! # Architecture
//!
//! ```text
//! GenerationOrchestrator
//!     ↓ breeds
//! Population (genetic)
//!     ↓ scored by
//! FitnessEvaluator (unotune-evaluator)
//!     ↓ plays matches through
//! MatchRunner (unotune-engine)
//!     ↓ results written by
//! ValuesStore
//! ```
//!
//! A run is resumable: starting from generation `N` reads `gen<N>.csv` and seeds every
//! parent with its best vector.

pub mod genetic;
pub mod orchestrator;
pub mod store;
pub mod weights;
