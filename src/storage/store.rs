//! Checkpoint destinations.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{CheckpointError, NetworkRecord, ParameterHeader};

/// File name of the per-directory parameter header.
pub const PARAMETERS_FILE: &str = "parameters.dat";

/// Suffix appended to a network name that is already taken.
pub const DUPLICATE_SUFFIX: &str = "_duplicate";

/// Which point of a run a record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    /// Periodic snapshot at the given time.
    Snapshot(u64),
    /// First time a robust run became functional.
    Flow,
    /// End of the run.
    Final,
}

impl CheckpointKind {
    /// Label of a checkpoint of the network called `name`.
    pub fn label(&self, name: &str) -> String {
        match self {
            Self::Snapshot(t) => format!("{}_{}", name, t),
            Self::Flow => format!("{}_flow", name),
            Self::Final => format!("{}_final", name),
        }
    }
}

/// Destination for network records produced during a run.
pub trait CheckpointSink {
    fn store(
        &mut self,
        name: &str,
        kind: CheckpointKind,
        record: &NetworkRecord,
    ) -> Result<(), CheckpointError>;
}

/// Writes each record to `<dir>/<label>.dat`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a checkpoint of `name` is written to.
    pub fn path_for(&self, name: &str, kind: CheckpointKind) -> PathBuf {
        self.dir.join(format!("{}.dat", kind.label(name)))
    }

    /// Write the parameter header unless the directory already has one.
    ///
    /// Returns `true` if the file was written.
    pub fn write_parameters(&self, header: &ParameterHeader) -> Result<bool, CheckpointError> {
        let path = self.dir.join(PARAMETERS_FILE);
        if path.exists() {
            return Ok(false);
        }
        let mut w = BufWriter::new(File::create(&path)?);
        header.write_to(&mut w)?;
        w.flush()?;
        log::info!("Wrote {}", path.display());
        Ok(true)
    }

    /// Read back the parameter header of this directory.
    pub fn read_parameters(&self) -> Result<ParameterHeader, CheckpointError> {
        let mut r = io::BufReader::new(File::open(self.dir.join(PARAMETERS_FILE))?);
        ParameterHeader::read_from(&mut r)
    }

    /// Read back a stored network record.
    pub fn load(
        &self,
        name: &str,
        kind: CheckpointKind,
        header: &ParameterHeader,
    ) -> Result<NetworkRecord, CheckpointError> {
        let mut r = io::BufReader::new(File::open(self.path_for(name, kind))?);
        let record = NetworkRecord::read_from(
            &mut r,
            header.pattern_shape(),
            header.network_type.is_robust(),
        )?;
        Ok(record)
    }

    /// First name, starting from `name` and appending [`DUPLICATE_SUFFIX`],
    /// that no file in the directory starts with.
    ///
    /// If the directory cannot be listed the name is suffixed once and used
    /// as is.
    pub fn unique_name(&self, name: &str) -> String {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                let candidate = format!("{}{}", name, DUPLICATE_SUFFIX);
                log::warn!(
                    "Cannot list {} ({}), using '{}' for network '{}'",
                    self.dir.display(),
                    e,
                    candidate,
                    name
                );
                return candidate;
            }
        };
        let taken: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();

        let mut candidate = name.to_string();
        while taken.iter().any(|file| file.starts_with(&candidate)) {
            candidate.push_str(DUPLICATE_SUFFIX);
        }
        if candidate != name {
            log::warn!("Network '{}' already exists, using '{}'", name, candidate);
        }
        candidate
    }
}

impl CheckpointSink for DirectoryStore {
    fn store(
        &mut self,
        name: &str,
        kind: CheckpointKind,
        record: &NetworkRecord,
    ) -> Result<(), CheckpointError> {
        let path = self.path_for(name, kind);
        let mut w = BufWriter::new(File::create(&path)?);
        record.write_to(&mut w)?;
        w.flush()?;
        log::info!("Wrote {} (iteration {})", path.display(), record.iteration);
        Ok(())
    }
}

/// Keeps records in memory, keyed by label.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub records: BTreeMap<String, NetworkRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str, kind: CheckpointKind) -> Option<&NetworkRecord> {
        self.records.get(&kind.label(name))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CheckpointSink for MemoryStore {
    fn store(
        &mut self,
        name: &str,
        kind: CheckpointKind,
        record: &NetworkRecord,
    ) -> Result<(), CheckpointError> {
        self.records.insert(kind.label(name), record.clone());
        Ok(())
    }
}

/// Split a network name into its output directory and file stem.
///
/// A bare name lives in the current directory. Returns `None` when the
/// directory does not exist.
pub fn resolve_output(name: &str) -> Option<(PathBuf, String)> {
    let path = Path::new(name);
    let stem = path.file_name()?.to_string_lossy().into_owned();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    dir.is_dir().then_some((dir, stem))
}
