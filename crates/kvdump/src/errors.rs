use kvdump_store::{ContainerName, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Failure of one bulk operation. Every operation resolves with exactly one
/// success or one of these.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("adding record {index} to container {container} failed: {source}")]
    RecordAdd {
        container: ContainerName,
        index: usize,
        source: StoreError,
    },
    #[error("{operation} did not finish within {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub type DumpResult<T> = Result<T, DumpError>;
