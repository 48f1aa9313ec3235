//! CSV persistence of weight vectors, generation tables and the best-of-generation ledger.
//!
//! All files live in one directory (`values/` by default):
//!
//! | file | schema |
//! |---|---|
//! | `baseline.csv` | single vector: one line of `NUM_VALUES` comma-separated numbers |
//! | `gen<N>.csv` | single vector, or a generation table as written by [`ValuesStore::write_generation`] |
//! | `best.csv` | ledger: `generation, weights..., fitness, points, rate` per row, no header |
//!
//! A generation table starts with the header row
//! `baseNumberPoints,...,calledColorPoints,fitness,points,rate` followed by one row per
//! candidate. The header is what tells the two `gen<N>.csv` schemas apart.
//!
//! Numbers are written with Rust's shortest round-trip float formatting, so reading a file
//! back yields bit-identical values.

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io, iter,
    path::{Path, PathBuf},
    str::FromStr,
};

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use unotune_engine::{COEFFICIENT_NAMES, NUM_VALUES, Weights};

use crate::genetic::Candidate;

/// Name of the baseline weight file.
pub const BASELINE_NAME: &str = "baseline";
/// Name of the best-of-generation ledger file.
pub const BEST_LEDGER_NAME: &str = "best";

const RESULT_COLUMNS: [&str; 3] = ["fitness", "points", "rate"];

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum StoreError {
    #[display("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[display("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: csv::Error },
    #[display("malformed {} (line {line}): {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[display("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Contents of a `gen<N>.csv` file in either schema.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationFile {
    Vector(Weights),
    Table(Vec<Candidate>),
}

impl GenerationFile {
    /// The generation's best candidate: the first table row, or the bare vector with no
    /// recorded results.
    #[must_use]
    pub fn best(&self, generation: i64) -> Option<Candidate> {
        match self {
            GenerationFile::Vector(weights) => {
                Some(Candidate::new(format!("Gen{generation}Best"), generation, *weights))
            }
            GenerationFile::Table(candidates) => candidates.first().cloned(),
        }
    }
}

/// One row of the best-of-generation ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct BestEntry {
    pub generation: i64,
    pub candidate: Candidate,
}

/// Reads and writes the files of a training run.
///
/// Table rows read back get the names `Player0`, `Player1`, ... in file order, since the
/// files do not store names.
#[derive(Debug, Clone)]
pub struct ValuesStore {
    dir: PathBuf,
}

impl ValuesStore {
    /// Creates a store rooted at `dir`. Nothing is read or created until first use.
    pub fn new<P>(dir: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of `<name>.csv`.
    #[must_use]
    pub fn weights_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    /// Returns the path of `gen<N>.csv`.
    #[must_use]
    pub fn generation_path(&self, generation: i64) -> PathBuf {
        self.weights_path(&format!("gen{generation}"))
    }

    /// Returns the path of the `best.csv` ledger.
    #[must_use]
    pub fn best_ledger_path(&self) -> PathBuf {
        self.weights_path(BEST_LEDGER_NAME)
    }

    /// Reads a single-vector file `<name>.csv`.
    pub fn read_weights(&self, name: &str) -> Result<Weights, StoreError> {
        let path = self.weights_path(name);
        let mut records = open_records(&path)?;
        let first = records.next_record()?;
        records.parse_vector(&first)
    }

    /// Reads `gen<N>.csv` in whichever schema it was written.
    ///
    /// # Returns
    ///
    /// [`GenerationFile::Table`] when the first line is the table header, otherwise
    /// [`GenerationFile::Vector`]
    pub fn read_generation(&self, generation: i64) -> Result<GenerationFile, StoreError> {
        let path = self.generation_path(generation);
        let mut records = open_records(&path)?;
        let first = records.next_record()?;
        if is_table_header(&first) {
            Ok(GenerationFile::Table(records.parse_table(generation)?))
        } else {
            Ok(GenerationFile::Vector(records.parse_vector(&first)?))
        }
    }

    /// Reads `gen<N>.csv`, requiring the generation-table schema.
    pub fn read_generation_table(&self, generation: i64) -> Result<Vec<Candidate>, StoreError> {
        let path = self.generation_path(generation);
        let mut records = open_records(&path)?;
        let first = records.next_record()?;
        if !is_table_header(&first) {
            return Err(records.malformed(&first, "missing generation table header"));
        }
        records.parse_table(generation)
    }

    /// Writes the generation table, replacing any previous file for `generation`.
    ///
    /// The table is written to a temporary sibling and renamed into place. On failure the
    /// temporary file is removed and any previous table is left as it was.
    ///
    /// # Arguments
    ///
    /// * `generation` - Generation number, selecting `gen<N>.csv`
    /// * `candidates` - Rows to write, in the order they should appear
    pub fn write_generation(
        &self,
        generation: i64,
        candidates: &[Candidate],
    ) -> Result<(), StoreError> {
        let path = self.generation_path(generation);
        let tmp_path = path.with_extension("csv.tmp");

        let written = fs::create_dir_all(&self.dir)
            .and_then(|()| write_table(&tmp_path, candidates))
            .and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(source) = written {
            if let Err(e) = fs::remove_file(&tmp_path)
                && e.kind() != io::ErrorKind::NotFound
            {
                log::warn!("failed to remove {}: {e}", tmp_path.display());
            }
            return Err(StoreError::Write { path, source });
        }
        Ok(())
    }

    /// Appends one row to the best-of-generation ledger, creating it if needed.
    pub fn append_best(&self, generation: i64, candidate: &Candidate) -> Result<(), StoreError> {
        let path = self.best_ledger_path();
        let write_error = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_error)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_error)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(iter::once(generation.to_string()).chain(result_fields(candidate)))
            .map_err(|e| write_error(e.into()))?;
        writer.flush().map_err(write_error)
    }

    /// Reads every ledger row. A missing ledger reads as empty.
    pub fn read_best_ledger(&self) -> Result<Vec<BestEntry>, StoreError> {
        let path = self.best_ledger_path();
        let mut records = match open_records(&path) {
            Ok(records) => records,
            Err(StoreError::Open { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };

        let mut entries = vec![];
        while let Some(record) = records.try_next_record()? {
            let fields = fields(&record);
            if fields.len() != 1 + NUM_VALUES + RESULT_COLUMNS.len() {
                return Err(records.malformed(
                    &record,
                    format!(
                        "expected {} fields, found {}",
                        1 + NUM_VALUES + RESULT_COLUMNS.len(),
                        fields.len()
                    ),
                ));
            }
            let generation = records.parse_field(&record, fields[0])?;
            let candidate = records.parse_candidate(
                &record,
                &fields[1..],
                format!("Gen{generation}Best"),
                generation,
            )?;
            entries.push(BestEntry {
                generation,
                candidate,
            });
        }
        Ok(entries)
    }
}

fn write_table(path: &Path, candidates: &[Candidate]) -> io::Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(table_header())?;
    for candidate in candidates {
        writer.write_record(result_fields(candidate))?;
    }
    writer.flush()
}

fn table_header() -> impl Iterator<Item = &'static str> {
    COEFFICIENT_NAMES.into_iter().chain(RESULT_COLUMNS)
}

fn is_table_header(record: &StringRecord) -> bool {
    fields(record).into_iter().eq(table_header())
}

fn result_fields(candidate: &Candidate) -> impl Iterator<Item = String> + '_ {
    candidate
        .weights()
        .iter()
        .map(f64::to_string)
        .chain([
            candidate.fitness().to_string(),
            candidate.points().to_string(),
            candidate.win_rate().to_string(),
        ])
}

/// Fields of a record, ignoring one trailing empty field left by a trailing comma.
fn fields(record: &StringRecord) -> Vec<&str> {
    let mut fields = record.iter().collect::<Vec<_>>();
    if fields.len() > 1 && fields.last() == Some(&"") {
        fields.pop();
    }
    fields
}

fn open_records(path: &Path) -> Result<Records, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Open {
        path: path.to_owned(),
        source,
    })?;
    let reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);
    Ok(Records {
        path: path.to_owned(),
        reader,
    })
}

struct Records {
    path: PathBuf,
    reader: csv::Reader<File>,
}

impl Records {
    fn try_next_record(&mut self) -> Result<Option<StringRecord>, StoreError> {
        let mut record = StringRecord::new();
        let found = self
            .reader
            .read_record(&mut record)
            .map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(found.then_some(record))
    }

    fn next_record(&mut self) -> Result<StringRecord, StoreError> {
        self.try_next_record()?
            .ok_or_else(|| StoreError::Malformed {
                path: self.path.clone(),
                line: 1,
                reason: "file is empty".to_owned(),
            })
    }

    fn malformed<S>(&self, record: &StringRecord, reason: S) -> StoreError
    where
        S: Into<String>,
    {
        StoreError::Malformed {
            path: self.path.clone(),
            line: record.position().map_or(0, csv::Position::line),
            reason: reason.into(),
        }
    }

    fn parse_field<T>(&self, record: &StringRecord, field: &str) -> Result<T, StoreError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        field
            .parse()
            .map_err(|e| self.malformed(record, format!("invalid number {field:?}: {e}")))
    }

    fn parse_weights(&self, record: &StringRecord, fields: &[&str]) -> Result<Weights, StoreError> {
        let mut weights = [0.0; NUM_VALUES];
        for (w, field) in weights.iter_mut().zip(fields) {
            *w = self.parse_field(record, field)?;
        }
        Ok(weights)
    }

    fn parse_vector(&self, record: &StringRecord) -> Result<Weights, StoreError> {
        let fields = fields(record);
        if fields.len() != NUM_VALUES {
            return Err(self.malformed(
                record,
                format!("expected {NUM_VALUES} values, found {}", fields.len()),
            ));
        }
        self.parse_weights(record, &fields)
    }

    /// Parses `weights..., fitness, points, rate`.
    fn parse_candidate(
        &self,
        record: &StringRecord,
        fields: &[&str],
        name: String,
        generation: i64,
    ) -> Result<Candidate, StoreError> {
        let weights = self.parse_weights(record, &fields[..NUM_VALUES])?;
        let fitness = self.parse_field(record, fields[NUM_VALUES])?;
        let points = self.parse_field(record, fields[NUM_VALUES + 1])?;
        let win_rate = self.parse_field(record, fields[NUM_VALUES + 2])?;
        Ok(Candidate::with_results(
            name, generation, weights, fitness, points, win_rate,
        ))
    }

    /// Parses the rows following a table header.
    fn parse_table(&mut self, generation: i64) -> Result<Vec<Candidate>, StoreError> {
        let mut candidates = vec![];
        while let Some(record) = self.try_next_record()? {
            let fields = fields(&record);
            if fields.len() != NUM_VALUES + RESULT_COLUMNS.len() {
                return Err(self.malformed(
                    &record,
                    format!(
                        "expected {} fields, found {}",
                        NUM_VALUES + RESULT_COLUMNS.len(),
                        fields.len()
                    ),
                ));
            }
            let name = format!("Player{}", candidates.len());
            candidates.push(self.parse_candidate(&record, &fields, name, generation)?);
        }
        Ok(candidates)
    }
}
