use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::units::DimensionSet;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Persistence collaborator supplying field dictionaries
/// (`dimensions`, `internalField`, `boundaryField`).
pub trait FieldSource {
    /// `Ok(None)` when the source simply has no such field.
    fn read_field(&self, name: &str) -> Result<Option<Dictionary>, ConfigError>;

    fn describe(&self) -> String;
}

/// Field dictionaries held in memory, e.g. from a case file.
#[derive(Clone, Debug, Default)]
pub struct MemoryFieldSource {
    fields: IndexMap<String, Dictionary>,
}

impl MemoryFieldSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, dict: Dictionary) {
        self.fields.insert(name.to_string(), dict);
    }

    pub fn with(mut self, name: &str, dict: Dictionary) -> Self {
        self.insert(name, dict);
        self
    }
}

impl FieldSource for MemoryFieldSource {
    fn read_field(&self, name: &str) -> Result<Option<Dictionary>, ConfigError> {
        Ok(self.fields.get(name).cloned())
    }

    fn describe(&self) -> String {
        "in-memory field set".to_string()
    }
}

/// Reads `<dir>/<name>.json`.
#[derive(Clone, Debug)]
pub struct DirectoryFieldSource {
    dir: PathBuf,
}

impl DirectoryFieldSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FieldSource for DirectoryFieldSource {
    fn read_field(&self, name: &str) -> Result<Option<Dictionary>, ConfigError> {
        let path = self.dir.join(format!("{}.json", name));
        if !path.exists() {
            return Ok(None);
        }
        Dictionary::read(&path).map(Some)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// How a field is constructed.
#[derive(Clone, Debug)]
pub enum ReadPolicy<T> {
    /// Data must exist in the source.
    MustRead,
    /// Read if the source has it, otherwise construct the default.
    ReadIfPresent {
        dimensions: DimensionSet,
        value: T,
        patch_type: String,
    },
    /// Construct without reading: uniform `value`, every uncoupled patch of
    /// type `patch_type`.
    Default {
        dimensions: DimensionSet,
        value: T,
        patch_type: String,
    },
}
