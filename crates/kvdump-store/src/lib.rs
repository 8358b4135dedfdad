pub mod codec;
pub mod fs;
pub mod memory;
pub mod store;
pub mod types;

pub use fs::FsStore;
pub use memory::{MemoryStore, MemoryTransaction};
pub use store::{RecordCursor, Store, StoreError, StoreResult, Transaction};
pub use types::{ContainerName, KeyPath, KeySpec, Object, RecordKey, TransactionMode, Value};
