use std::{collections::BTreeMap, iter, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unotune_engine::COEFFICIENT_NAMES;
use unotune_training::{
    genetic::Candidate,
    orchestrator::{GenerationReport, TrainingConfig},
};

use crate::util;

/// File name of the manifest inside the values directory.
pub const MANIFEST_FILE_NAME: &str = "run.json";

/// Human-readable record of a training run, rewritten after every generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunManifest {
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub config: TrainingConfig,
    pub last_generation: Option<i64>,
    pub best: Option<BestRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BestRecord {
    pub generation: i64,
    pub fitness: f64,
    pub points: i64,
    pub weights: BTreeMap<String, f64>,
}

impl From<&Candidate> for BestRecord {
    fn from(candidate: &Candidate) -> Self {
        Self {
            generation: candidate.generation(),
            fitness: candidate.fitness(),
            points: candidate.points(),
            weights: iter::zip(COEFFICIENT_NAMES, candidate.weights())
                .map(|(name, w)| (name.to_owned(), *w))
                .collect(),
        }
    }
}

impl RunManifest {
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            updated_at: now,
            config,
            last_generation: None,
            best: None,
        }
    }

    pub fn open<P>(path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        util::read_json_file("run manifest", path)
    }

    /// Starts a manifest for `config`, keeping the start time of a resumed run.
    pub fn resume_or_new<P>(path: P, config: TrainingConfig) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let mut manifest = Self::new(config);
        if manifest.config.starting_generation == 0 || !path.exists() {
            return manifest;
        }
        match Self::open(path) {
            Ok(previous) => manifest.started_at = previous.started_at,
            Err(e) => log::warn!("Ignoring previous run manifest: {e:#}"),
        }
        manifest
    }

    pub fn record(&mut self, report: &GenerationReport) {
        self.updated_at = Utc::now();
        self.last_generation = Some(report.generation);
        self.best = Some(BestRecord::from(&report.all_time_best));
    }

    pub fn save<P>(&self, path: P) -> anyhow::Result<()>
    where
        P: AsRef<Path>,
    {
        util::write_json_file("run manifest", path, self)
    }
}
