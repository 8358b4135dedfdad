use crate::types::{ContainerName, RecordKey, TransactionMode, Value};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {resource} ({id})")]
    NotFound { resource: &'static str, id: String },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("container {0} is not writable in a readonly transaction")]
    ReadOnly(ContainerName),

    #[error("container {0} is outside the transaction scope")]
    OutOfScope(ContainerName),

    #[error("transaction already finished")]
    TransactionFinished,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A key/value database holding named containers of records.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Names of every container. Hosts may report a name more than once.
    async fn container_names(&self) -> StoreResult<Vec<ContainerName>>;

    /// Opens one transaction scoped to `scope`. Requests against any other
    /// container fail with [`StoreError::OutOfScope`].
    async fn transaction(
        &self,
        scope: &[ContainerName],
        mode: TransactionMode,
    ) -> StoreResult<Box<dyn Transaction>>;
}

/// Requests issued against one open transaction.
///
/// Requests may be in flight concurrently. After [`Transaction::commit`] or
/// [`Transaction::abort`] every request fails with
/// [`StoreError::TransactionFinished`].
#[async_trait::async_trait]
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TransactionMode;

    fn scope(&self) -> &[ContainerName];

    /// Forward cursor over the container in key order.
    async fn open_cursor(&self, container: &str) -> StoreResult<Box<dyn RecordCursor>>;

    /// Adds one record. Fails with [`StoreError::Constraint`] when the
    /// record's key already exists.
    async fn add(&self, container: &str, record: Value) -> StoreResult<RecordKey>;

    async fn clear(&self, container: &str) -> StoreResult<()>;

    async fn commit(&self) -> StoreResult<()>;

    /// Rolls back every write made through this transaction.
    async fn abort(&self) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait RecordCursor: Send {
    /// Next record, or `None` once the container is exhausted.
    async fn next(&mut self) -> StoreResult<Option<Value>>;
}
