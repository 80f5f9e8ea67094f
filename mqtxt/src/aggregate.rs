use super::*;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::Write;
use std::iter::FromIterator;

/// Number of occurrences of each [`FeatureKey`] across processed folders
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrequencyCounter {
    counts: HashMap<FeatureKey, u64>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        FrequencyCounter::default()
    }

    /// Add one occurrence per key
    pub fn update<I: IntoIterator<Item = FeatureKey>>(&mut self, keys: I) {
        for key in keys {
            *self.counts.entry(key).or_insert(0) += 1;
        }
    }

    pub fn merge(&mut self, other: &FrequencyCounter) {
        for (key, n) in &other.counts {
            *self.counts.entry(key.clone()).or_insert(0) += n;
        }
    }

    pub fn get(&self, key: &FeatureKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureKey, u64)> {
        self.counts.iter().map(|(k, n)| (k, *n))
    }

    /// The `n` most frequent keys, highest count first; equal counts are
    /// ordered by key
    pub fn most_common(&self, n: usize) -> Vec<(&FeatureKey, u64)> {
        let mut v = self.iter().collect::<Vec<_>>();
        v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        v.truncate(n);
        v
    }

    /// Number of keys seen exactly `k` times, for every observed `k`
    pub fn occurrence_histogram(&self) -> BTreeMap<u64, usize> {
        let mut hist = BTreeMap::new();
        for n in self.counts.values() {
            *hist.entry(*n).or_insert(0) += 1;
        }
        hist
    }

    /// Write the `n` most frequent keys as a two-column TSV
    pub fn write_most_common<P: AsRef<Path>>(&self, path: P, n: usize) -> Result<()> {
        let mut f = io::BufWriter::new(fs::File::create(path)?);
        writeln!(f, "key\tcount")?;
        for (key, count) in self.most_common(n) {
            writeln!(f, "{}\t{}", key, count)?;
        }
        f.flush()?;
        Ok(())
    }
}

impl FromIterator<FeatureKey> for FrequencyCounter {
    fn from_iter<I: IntoIterator<Item = FeatureKey>>(iter: I) -> Self {
        let mut counter = FrequencyCounter::default();
        counter.update(iter);
        counter
    }
}

/// Folder (or, after renaming, sample) identifier to per-folder dump file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DumpRegistry {
    dumps: BTreeMap<String, PathBuf>,
}

impl DumpRegistry {
    pub fn get(&self, id: &str) -> Option<&Path> {
        self.dumps.get(id).map(PathBuf::as_path)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dumps.contains_key(id)
    }

    pub fn insert(&mut self, id: String, path: PathBuf) -> Option<PathBuf> {
        self.dumps.insert(id, path)
    }

    pub fn remove(&mut self, id: &str) -> Option<PathBuf> {
        self.dumps.remove(id)
    }

    pub fn len(&self) -> usize {
        self.dumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dumps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.dumps.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}

/// Output folder of one MaxQuant run, under a stable identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleFolder {
    pub id: String,
    pub path: PathBuf,
}

impl SampleFolder {
    /// Folder identified by its directory name
    pub fn new<P: AsRef<Path>>(path: P) -> SampleFolder {
        let path = path.as_ref().to_path_buf();
        let id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        SampleFolder { id, path }
    }

    pub fn with_id<S: Into<String>, P: AsRef<Path>>(id: S, path: P) -> SampleFolder {
        SampleFolder {
            id: id.into(),
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only
    Quiet,
    /// Skipped folders and a run summary
    Normal,
    /// Every folder
    Verbose,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Normal
    }
}

/// Construction-time settings of a [`FeatureCounter`]
#[derive(Clone, Debug, PartialEq)]
pub struct CounterConfig {
    pub selector: Selector,
    /// Persisted counter + registry
    pub state_path: PathBuf,
    /// Directory receiving one `<id>.csv` per processed folder
    pub dump_dir: PathBuf,
    /// Ignore persisted state and start empty
    pub overwrite: bool,
    /// Save after every N newly processed folders; 0 disables
    pub checkpoint_every: usize,
    pub verbosity: Verbosity,
}

impl CounterConfig {
    /// Default locations for `kind` below `state_dir`
    pub fn new<P: AsRef<Path>>(kind: FeatureKind, state_dir: P) -> CounterConfig {
        CounterConfig {
            selector: Selector::new(kind),
            state_path: state_file(&state_dir, kind),
            dump_dir: dump_dir(&state_dir, kind),
            overwrite: false,
            checkpoint_every: 0,
            verbosity: Verbosity::default(),
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn checkpoint_every(mut self, n: usize) -> Self {
        self.checkpoint_every = n;
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn kind(&self) -> FeatureKind {
        self.selector.kind
    }
}

/// Lifecycle of a [`FeatureCounter`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Nothing persisted was read
    Uninitialized,
    /// Resumed from persisted state
    Loaded,
    Accumulating,
    /// Counter and registry written back
    Persisted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedFolder {
    pub id: String,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Folders read and counted during this instance's lifetime
    pub processed: usize,
    /// Folders already registered from a previous run
    pub resumed: usize,
    pub skipped: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} folders processed, {} already counted, {} skipped",
            self.processed, self.resumed, self.skipped
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenameReport {
    /// (old id, new id)
    pub renamed: Vec<(String, String)>,
    /// Entries dropped because the dump file was already gone
    pub missing: Vec<String>,
    /// Entries kept under their old id because the rename failed otherwise
    pub failed: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    kind: FeatureKind,
    counter: BTreeMap<String, u64>,
    dumps: DumpRegistry,
}

type FolderResult = Result<(Table, Selection)>;

fn read_folder(selector: &Selector, folder: &SampleFolder) -> FolderResult {
    let table = selector.load(&folder.path)?;
    let selection = selector.select(&table)?;
    Ok((table, selection))
}

/// Counts features of one kind over many sample folders, with resumable
/// persisted state and one dump file per folder
///
/// # Example
///
/// ```rust,ignore
/// # use mqtxt::*;
/// let config = CounterConfig::new(FeatureKind::Peptides, "data/counts").overwrite(true);
/// let mut counter = FeatureCounter::new(config)?;
/// let folders = scan_directory("data/mq_out")?;
/// counter.sum_over_files(&folders)?;
/// counter.save()?;
/// println!("{:?}", counter.counter().most_common(10));
/// ```
#[derive(Debug)]
pub struct FeatureCounter {
    config: CounterConfig,
    counter: FrequencyCounter,
    dumps: DumpRegistry,
    state: State,
    skipped: Vec<SkippedFolder>,
    processed: usize,
    resumed: usize,
}

impl FeatureCounter {
    /// Create a counter, resuming from `config.state_path` unless
    /// `config.overwrite` is set or nothing was persisted yet
    pub fn new(config: CounterConfig) -> Result<FeatureCounter> {
        let mut counter = FeatureCounter {
            config,
            counter: FrequencyCounter::new(),
            dumps: DumpRegistry::default(),
            state: State::Uninitialized,
            skipped: Vec::new(),
            processed: 0,
            resumed: 0,
        };
        if !counter.config.overwrite && counter.config.state_path.is_file() {
            counter.load()?;
        }
        Ok(counter)
    }

    fn load(&mut self) -> Result<()> {
        let file = fs::File::open(&self.config.state_path)?;
        let persisted: PersistedState = serde_json::from_reader(io::BufReader::new(file))?;
        let kind = self.config.kind();
        if persisted.kind != kind {
            return Err(Error::KindMismatch {
                path: self.config.state_path.clone(),
                expected: kind,
                found: persisted.kind,
            });
        }
        for (key, n) in persisted.counter {
            self.counter
                .counts
                .insert(FeatureKey::parse(kind, &key)?, n);
        }
        self.dumps = persisted.dumps;
        self.state = State::Loaded;
        info!(
            "Loaded {} {} keys and {} dumps from {}",
            self.counter.len(),
            kind,
            self.dumps.len(),
            self.config.state_path.display()
        );
        Ok(())
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn kind(&self) -> FeatureKind {
        self.config.kind()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn counter(&self) -> &FrequencyCounter {
        &self.counter
    }

    pub fn dumps(&self) -> &DumpRegistry {
        &self.dumps
    }

    pub fn skipped(&self) -> &[SkippedFolder] {
        &self.skipped
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            processed: self.processed,
            resumed: self.resumed,
            skipped: self.skipped.len(),
        }
    }

    /// `<dump_dir>/<id>.csv`; ids must name a plain file inside `dump_dir`
    fn dump_path(&self, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.config.dump_dir.join(format!("{}.csv", id)))
    }

    /// Folders not yet registered, in input order
    fn pending<'f>(&mut self, folders: &'f [SampleFolder]) -> Vec<&'f SampleFolder> {
        let mut v = Vec::with_capacity(folders.len());
        for folder in folders {
            if self.dumps.contains(&folder.id) {
                debug!("{}: already counted", folder.id);
                self.resumed += 1;
            } else {
                v.push(folder);
            }
        }
        v
    }

    /// Count features over `folders`, one folder at a time in input order.
    ///
    /// Folders already present in the dump registry are not counted again.
    /// Folders that cannot be read or selected are recorded in
    /// [`FeatureCounter::skipped`] and do not stop the run. Only a failing
    /// checkpoint save is returned as an error.
    pub fn sum_over_files(&mut self, folders: &[SampleFolder]) -> Result<&FrequencyCounter> {
        self.state = State::Accumulating;
        for folder in self.pending(folders) {
            let outcome = read_folder(&self.config.selector, folder);
            self.commit(folder, outcome)?;
        }
        self.finish();
        Ok(&self.counter)
    }

    /// Like [`FeatureCounter::sum_over_files`], but files are read and
    /// selected on the rayon thread pool. Dumps are written and counts
    /// updated on the calling thread, in input order.
    pub fn par_sum_over_files(&mut self, folders: &[SampleFolder]) -> Result<&FrequencyCounter> {
        self.state = State::Accumulating;
        let pending = self.pending(folders);
        let chunk = rayon::current_num_threads().max(1) * 4;
        for batch in pending.chunks(chunk) {
            let selector = &self.config.selector;
            let outcomes = batch
                .par_iter()
                .map(|folder| read_folder(selector, folder))
                .collect::<Vec<_>>();
            for (folder, outcome) in batch.iter().zip(outcomes) {
                self.commit(folder, outcome)?;
            }
        }
        self.finish();
        Ok(&self.counter)
    }

    /// Write the dump, then update counter and registry together. A folder
    /// whose dump cannot be written contributes nothing.
    fn commit(&mut self, folder: &SampleFolder, outcome: FolderResult) -> Result<()> {
        let written = outcome.and_then(|(table, selection)| {
            fs::create_dir_all(&self.config.dump_dir)?;
            let dump = self.dump_path(&folder.id)?;
            table.write_csv(&dump, &selection.rows)?;
            Ok((selection, dump))
        });

        match written {
            Ok((selection, dump)) => {
                if self.config.verbosity >= Verbosity::Verbose {
                    info!("{}: {} {} keys", folder.id, selection.len(), self.kind());
                }
                self.counter.update(selection.keys);
                self.dumps.insert(folder.id.clone(), dump);
                self.processed += 1;
                if self.config.checkpoint_every > 0 && self.processed % self.config.checkpoint_every == 0 {
                    self.persist()?;
                }
            }
            Err(e) => {
                if e.is_recoverable() {
                    if self.config.verbosity >= Verbosity::Normal {
                        warn!("Skipping {}: {}", folder.id, e);
                    }
                } else {
                    error!("Skipping {}: {}", folder.id, e);
                }
                self.skipped.push(SkippedFolder {
                    id: folder.id.clone(),
                    path: folder.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn finish(&self) {
        if self.config.verbosity >= Verbosity::Normal {
            info!("{}: {}", self.kind(), self.summary());
            if !self.skipped.is_empty() {
                warn!(
                    "{} folders skipped: {}",
                    self.skipped.len(),
                    self.skipped
                        .iter()
                        .map(|s| s.id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let persisted = PersistedState {
            kind: self.kind(),
            counter: self
                .counter
                .iter()
                .map(|(key, n)| (key.to_string(), n))
                .collect(),
            dumps: self.dumps.clone(),
        };
        let dir = match self.config.state_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &persisted)?;
        tmp.flush()?;
        tmp.persist(&self.config.state_path)?;
        debug!("Saved {}", self.config.state_path.display());
        Ok(())
    }

    /// Write counter and registry to `config.state_path`, replacing the
    /// previous file atomically
    pub fn save(&mut self) -> Result<()> {
        self.persist()?;
        self.state = State::Persisted;
        Ok(())
    }

    /// Rename dump files and their registry keys from old to new identifiers.
    ///
    /// Each rename moves `<dir>/<old>.csv` to `<dir>/<new>.csv` and then swaps
    /// the key. An entry whose dump is already gone is dropped. Only allowed
    /// for counters created with `overwrite`, since resumed registries would
    /// mix old and new identifiers.
    ///
    /// Files are first moved to staging names, so chains (`a -> b`, `b -> c`)
    /// and swaps work. A rename whose target id stays taken by another entry,
    /// is claimed twice, or whose target file exists is refused: the entry
    /// keeps its old id and is listed in [`RenameReport::failed`].
    pub fn rename_dumps(&mut self, mapping: &HashMap<String, String>) -> Result<RenameReport> {
        if !self.config.overwrite {
            return Err(Error::RenameWithoutOverwrite);
        }
        let mut report = RenameReport::default();
        let entries = self
            .dumps
            .iter()
            .filter_map(|(old, path)| match mapping.get(old) {
                Some(new) if new != old => Some((old.to_string(), new.clone(), path.to_path_buf())),
                _ => None,
            })
            .collect::<Vec<_>>();

        let mut staged = Vec::with_capacity(entries.len());
        for (old, new, path) in entries {
            if let Err(e) = check_id(&new) {
                warn!("Not renaming {}: {}", old, e);
                report.failed.push(old);
                continue;
            }
            let staging = path.with_file_name(format!(".{}.renaming", old));
            match fs::rename(&path, &staging) {
                Ok(()) => staged.push(StagedRename {
                    old,
                    new,
                    path,
                    staging,
                }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("File not found: {}", path.display());
                    self.dumps.remove(&old);
                    report.missing.push(old);
                }
                Err(e) => {
                    error!("Failed to rename {}: {}", path.display(), e);
                    report.failed.push(old);
                }
            }
        }

        // Put back renames whose target is taken, until none is left. Putting
        // one back can take the target of another.
        loop {
            let conflict = {
                let leaving = staged.iter().map(|r| r.old.as_str()).collect::<HashSet<_>>();
                let mut claimed = HashSet::new();
                staged.iter().position(|r| {
                    (self.dumps.contains(&r.new) && !leaving.contains(r.new.as_str()))
                        || !claimed.insert(r.new.as_str())
                        || r.target().exists()
                })
            };
            let r = match conflict {
                Some(idx) => staged.remove(idx),
                None => break,
            };
            warn!("Not renaming {} to {}: target already taken", r.old, r.new);
            if let Err(e) = fs::rename(&r.staging, &r.path) {
                error!("Failed to restore {}: {}", r.path.display(), e);
            }
            report.failed.push(r.old);
        }

        for r in &staged {
            self.dumps.remove(&r.old);
        }
        for r in staged {
            let target = r.target();
            match fs::rename(&r.staging, &target) {
                Ok(()) => {
                    self.dumps.insert(r.new.clone(), target);
                    report.renamed.push((r.old, r.new));
                }
                Err(e) => {
                    error!("Failed to rename {}: {}", r.path.display(), e);
                    if let Err(e) = fs::rename(&r.staging, &r.path) {
                        error!("Failed to restore {}: {}", r.path.display(), e);
                    }
                    self.dumps.insert(r.old.clone(), r.path);
                    report.failed.push(r.old);
                }
            }
        }
        Ok(report)
    }
}

/// Dump file moved out of the way while renaming
struct StagedRename {
    old: String,
    new: String,
    path: PathBuf,
    staging: PathBuf,
}

impl StagedRename {
    fn target(&self) -> PathBuf {
        self.path.with_file_name(format!("{}.csv", self.new))
    }
}

/// Ids end up as file names, so they may not be empty, `.`/`..` or hold a
/// path separator
fn check_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(|c: char| c == '/' || c == '\\') {
        return Err(Error::InvalidFolderId(id.into()));
    }
    Ok(())
}
