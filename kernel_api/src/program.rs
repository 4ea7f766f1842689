//! Program source collaborator

use crate::error::LoadError;

/// Supplies raw program images by identifier
///
/// The kernel never touches a filesystem itself. Whatever stands behind a
/// program identifier (a directory, an archive, a test fixture) lives
/// behind this trait, and a failure here only drops the affected job.
pub trait ProgramSource {
    /// Returns the raw program bytes, header included
    fn read_program(&self, program: &str) -> Result<Vec<u8>, LoadError>;
}

impl<T: ProgramSource + ?Sized> ProgramSource for Box<T> {
    fn read_program(&self, program: &str) -> Result<Vec<u8>, LoadError> {
        (**self).read_program(program)
    }
}
