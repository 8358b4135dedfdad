use crate::codec;
use crate::memory::{ContainerState, MemoryState, MemoryStore, MemoryTransaction};
use crate::store::{RecordCursor, Store, StoreError, StoreResult, Transaction};
use crate::types::{ContainerName, KeySpec, RecordKey, TransactionMode, Value};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "kvdump-state.json";

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct PersistedState {
    containers: BTreeMap<ContainerName, PersistedContainer>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedContainer {
    key_spec: KeySpec,
    next_key: u64,
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedEntry {
    key: JsonValue,
    value: JsonValue,
}

impl PersistedState {
    fn capture(state: &MemoryState) -> Self {
        let containers = state
            .containers
            .iter()
            .map(|(name, container)| {
                let entries = container
                    .records
                    .iter()
                    .map(|(key, value)| PersistedEntry {
                        key: codec::encode_value(&key.to_value()),
                        value: codec::encode_value(value),
                    })
                    .collect();
                (
                    name.clone(),
                    PersistedContainer {
                        key_spec: container.key_spec.clone(),
                        next_key: container.next_key,
                        entries,
                    },
                )
            })
            .collect();
        Self { containers }
    }

    fn restore(self) -> StoreResult<MemoryState> {
        let mut state = MemoryState::default();
        for (name, persisted) in self.containers {
            let mut container = ContainerState::new(persisted.key_spec);
            container.next_key = persisted.next_key;
            for entry in persisted.entries {
                let key = RecordKey::from_value(&codec::decode_value(entry.key)).ok_or_else(|| {
                    StoreError::Serialization(format!("container {name} holds an invalid key"))
                })?;
                container
                    .records
                    .insert(key, codec::decode_value(entry.value));
            }
            state.containers.insert(name, container);
        }
        Ok(state)
    }
}

/// A [`MemoryStore`] mirrored to one JSON state file. The file is rewritten
/// after every committed read-write transaction and every container
/// creation.
#[derive(Clone, Debug)]
pub struct FsStore {
    state_file: PathBuf,
    inner: MemoryStore,
}

impl FsStore {
    pub fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        fs::create_dir_all(root.as_ref())
            .map_err(|err| StoreError::Backend(format!("create fs store root failed: {err}")))?;
        let state_file = root.as_ref().join(STATE_FILE_NAME);
        let state = if state_file.exists() {
            let raw = fs::read(&state_file)
                .map_err(|err| StoreError::Backend(format!("read state file failed: {err}")))?;
            serde_json::from_slice::<PersistedState>(&raw)
                .map_err(|err| StoreError::Serialization(err.to_string()))?
                .restore()?
        } else {
            MemoryState::default()
        };

        Ok(Self {
            state_file,
            inner: MemoryStore::from_state(state),
        })
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn create_container(
        &self,
        name: impl Into<ContainerName>,
        key_spec: KeySpec,
    ) -> StoreResult<()> {
        self.inner.create_container(name, key_spec)?;
        self.persist()
    }

    pub fn key_spec(&self, name: &str) -> StoreResult<KeySpec> {
        self.inner.key_spec(name)
    }

    fn persist(&self) -> StoreResult<()> {
        let snapshot = PersistedState::capture(&self.inner.snapshot()?);
        let raw = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| StoreError::Backend(format!("write state file failed: {err}")))?;
        fs::rename(&tmp, &self.state_file)
            .map_err(|err| StoreError::Backend(format!("rename state file failed: {err}")))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for FsStore {
    async fn container_names(&self) -> StoreResult<Vec<ContainerName>> {
        self.inner.container_names().await
    }

    async fn transaction(
        &self,
        scope: &[ContainerName],
        mode: TransactionMode,
    ) -> StoreResult<Box<dyn Transaction>> {
        Ok(Box::new(FsTransaction {
            inner: self.inner.begin(scope, mode)?,
            store: self.clone(),
        }))
    }
}

struct FsTransaction {
    inner: MemoryTransaction,
    store: FsStore,
}

#[async_trait::async_trait]
impl Transaction for FsTransaction {
    fn mode(&self) -> TransactionMode {
        self.inner.mode()
    }

    fn scope(&self) -> &[ContainerName] {
        self.inner.scope()
    }

    async fn open_cursor(&self, container: &str) -> StoreResult<Box<dyn RecordCursor>> {
        self.inner.open_cursor(container).await
    }

    async fn add(&self, container: &str, record: Value) -> StoreResult<RecordKey> {
        self.inner.add(container, record).await
    }

    async fn clear(&self, container: &str) -> StoreResult<()> {
        self.inner.clear(container).await
    }

    /// Writes the state file first and finishes the memory journal only
    /// once the file is in place. A failed write rolls the transaction back.
    async fn commit(&self) -> StoreResult<()> {
        if self.inner.mode().is_writable() {
            self.inner.ensure_open()?;
            if let Err(error) = self.store.persist() {
                return match self.inner.abort().await {
                    Ok(()) => Err(error),
                    Err(abort_error) => Err(StoreError::Backend(format!(
                        "{error}; rollback failed: {abort_error}"
                    ))),
                };
            }
        }
        self.inner.commit().await
    }

    async fn abort(&self) -> StoreResult<()> {
        self.inner.abort().await
    }
}
