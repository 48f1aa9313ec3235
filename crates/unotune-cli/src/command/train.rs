use std::path::PathBuf;

use anyhow::Context as _;
use unotune_engine::SurrogateMatch;
use unotune_training::{
    orchestrator::{GenerationOrchestrator, GenerationReport, TrainingConfig},
    store::ValuesStore,
};

use crate::model::run_manifest::{MANIFEST_FILE_NAME, RunManifest};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Generation to resume from (0 starts from random parents)
    #[arg(default_value_t = 0)]
    starting_generation: i64,
    /// Stop before reaching this generation
    #[arg(default_value_t = 100_000)]
    max_generations: i64,
    /// Players per match, the candidate included
    #[arg(default_value_t = 4)]
    num_players: usize,
    /// Matches each candidate plays per generation
    #[arg(default_value_t = 10_000)]
    games_per_generation: usize,
    /// Directory holding baseline.csv and the generation files
    #[arg(long, default_value = "values")]
    values_dir: PathBuf,
    /// Offspring per generation
    #[arg(long, default_value_t = 50)]
    population: usize,
    /// Seed of the run (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Worker threads used to evaluate offspring
    #[arg(long)]
    jobs: Option<usize>,
}

impl TrainArg {
    fn to_config(&self, seed: u64) -> TrainingConfig {
        TrainingConfig {
            starting_generation: self.starting_generation,
            max_generations: self.max_generations,
            num_players: self.num_players,
            games_per_generation: self.games_per_generation,
            population_size: self.population,
            seed,
            ..TrainingConfig::default()
        }
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    if let Some(jobs) = arg.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to start evaluation workers")?;
    }

    let seed = arg.seed.unwrap_or_else(rand::random);
    let config = arg.to_config(seed);
    log::info!("Seed: {seed}");
    log::info!(
        "Generations {}..{}, {} players, {} games per candidate, {} offspring",
        config.starting_generation + 1,
        config.max_generations,
        config.num_players,
        config.games_per_generation,
        config.population_size
    );

    let store = ValuesStore::new(&arg.values_dir);
    let manifest_path = store.dir().join(MANIFEST_FILE_NAME);
    let mut manifest = RunManifest::resume_or_new(&manifest_path, config.clone());

    let orchestrator = GenerationOrchestrator::new(config, store, SurrogateMatch::default())
        .context("Failed to start training")?;
    let summary = orchestrator
        .run(|report| {
            log_report(report);
            manifest.record(report);
            if let Err(e) = manifest.save(&manifest_path) {
                log::warn!("{e:#}");
            }
        })
        .context("Training aborted")?;

    eprintln!("Training completed");
    eprintln!("  Generations: {}", summary.generations_run);
    let best = &summary.all_time_best;
    eprintln!("  Best from generation: {}", best.generation());
    eprintln!("  Best fitness: {}", best.fitness());
    eprintln!("  Best weights: {:?}", best.weights());
    Ok(())
}

fn log_report(report: &GenerationReport) {
    let top = &report.best_of_generation;
    log::info!(
        "Generation #{}: top {} => {} (win rate {:.4})",
        report.generation,
        top.name(),
        top.fitness(),
        top.win_rate()
    );
    if report.improved {
        log::info!("  New best: {:.3?}", report.all_time_best.weights());
    } else {
        log::info!(
            "  Best so far: {} from generation {}",
            report.all_time_best.fitness(),
            report.all_time_best.generation()
        );
    }
    if let Some(stats) = &report.fitness_stats {
        log::info!(
            "  Fitness: min {:.1}, median {:.1}, mean {:.1}, max {:.1}, stddev {:.1}",
            stats.min,
            stats.median,
            stats.mean,
            stats.max,
            stats.std_dev
        );
    }
    log::info!("  Parents from ranks: {:?}", report.parent_ranks);
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser as _;
    use tempfile::TempDir;

    use super::*;
    use crate::command::CommandArgs;

    fn parse(args: &[&str]) -> Result<CommandArgs, clap::Error> {
        CommandArgs::try_parse_from(["unotune"].iter().chain(args))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert!(!args.help);
        let config = args.train.to_config(1);
        assert_eq!(
            config,
            TrainingConfig {
                seed: 1,
                ..TrainingConfig::default()
            }
        );
        assert_eq!(args.train.values_dir, PathBuf::from("values"));
        assert_eq!(args.train.jobs, None);
    }

    #[test]
    fn test_positional_and_options() {
        let args = parse(&[
            "3",
            "10",
            "2",
            "50",
            "--values-dir",
            "out",
            "--population",
            "8",
            "--seed",
            "7",
            "--jobs",
            "2",
        ])
        .unwrap();
        let arg = &args.train;
        assert_eq!(arg.starting_generation, 3);
        assert_eq!(arg.max_generations, 10);
        assert_eq!(arg.num_players, 2);
        assert_eq!(arg.games_per_generation, 50);
        assert_eq!(arg.values_dir, PathBuf::from("out"));
        assert_eq!(arg.population, 8);
        assert_eq!(arg.seed, Some(7));
        assert_eq!(arg.jobs, Some(2));

        // trailing positionals may be omitted
        let args = parse(&["5"]).unwrap();
        assert_eq!(args.train.starting_generation, 5);
        assert_eq!(args.train.max_generations, 100_000);
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        assert!(parse(&["abc"]).is_err());
        assert!(parse(&["0", "10", "four"]).is_err());
        assert!(parse(&["--seed", "-3"]).is_err());
    }

    #[test]
    fn test_short_run_writes_values_and_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("baseline.csv"),
            "1,2,3,4,5,6,7,8,9,10,11,12\n",
        )
        .unwrap();
        let values_dir = dir.path().to_str().unwrap();
        let args = parse(&[
            "0",
            "3",
            "3",
            "4",
            "--values-dir",
            values_dir,
            "--seed",
            "9",
        ])
        .unwrap();

        run(&args.train).unwrap();

        assert!(dir.path().join("gen1.csv").exists());
        assert!(dir.path().join("gen2.csv").exists());
        assert!(!dir.path().join("gen3.csv").exists());
        let manifest = RunManifest::open(dir.path().join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(manifest.last_generation, Some(2));
        assert_eq!(manifest.config.seed, 9);
        assert_eq!(manifest.config.num_players, 3);
    }
}
