//! Program sources backed by memory or a directory

use kernel_api::{LoadError, ProgramSource};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Programs held in memory, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct InMemoryPrograms {
    programs: HashMap<String, Vec<u8>>,
}

impl InMemoryPrograms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, program: impl Into<String>, bytes: Vec<u8>) {
        self.programs.insert(program.into(), bytes);
    }

    pub fn with_program(mut self, program: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(program, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl ProgramSource for InMemoryPrograms {
    fn read_program(&self, program: &str) -> Result<Vec<u8>, LoadError> {
        self.programs
            .get(program)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(program.to_string()))
    }
}

/// Programs read from files under a root directory
///
/// The identifier is a path relative to the root. Identifiers that would
/// escape the root are reported as not found.
#[derive(Debug, Clone)]
pub struct DirectoryPrograms {
    root: PathBuf,
}

impl DirectoryPrograms {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        let relative = Path::new(program);
        let contained = !program.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.root.join(relative))
    }
}

impl ProgramSource for DirectoryPrograms {
    fn read_program(&self, program: &str) -> Result<Vec<u8>, LoadError> {
        let path = self
            .resolve(program)
            .ok_or_else(|| LoadError::NotFound(program.to_string()))?;
        std::fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => LoadError::NotFound(program.to_string()),
            _ => LoadError::Io {
                program: program.to_string(),
                reason: err.to_string(),
            },
        })
    }
}
