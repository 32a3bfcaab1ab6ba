mod container;

pub use container::{ContainerReader, ContainerWriter};

use crate::{dendrogram::newick::NewickError, dendrogram::Dendrogram, traits::FluxValue};
use std::path::Path;

#[derive(Debug)]
pub enum WriteError {
    IO(std::io::Error),
}

impl From<std::io::Error> for WriteError {
    #[inline]
    fn from(err: std::io::Error) -> Self {
        WriteError::IO(err)
    }
}

#[derive(Debug)]
pub enum ReadError {
    IO(std::io::Error),
    /// The stream does not start with the container magic
    NotAContainer,
    UnsupportedVersion(u16),
    /// Truncated or inconsistent container contents
    Malformed,
    BadNewick(NewickError),
}

impl From<std::io::Error> for ReadError {
    #[inline]
    fn from(err: std::io::Error) -> Self {
        ReadError::IO(err)
    }
}

impl From<NewickError> for ReadError {
    #[inline]
    fn from(err: NewickError) -> Self {
        ReadError::BadNewick(err)
    }
}

/// Writes a dendrogram to a container file
pub fn save_to_file<T: FluxValue>(
    dendrogram: &Dendrogram<T>,
    path: &Path,
) -> Result<(), WriteError> {
    ContainerWriter::default().write_to_file(dendrogram, path)
}

/// Reads a dendrogram back from a container file
pub fn load_from_file<T: FluxValue>(path: &Path) -> Result<Dendrogram<T>, ReadError> {
    ContainerReader::default().read_from_file(path)
}
