use crate::store::{RecordCursor, Store, StoreError, StoreResult, Transaction};
use crate::types::{
    ContainerName, KeyPath, KeySpec, RecordKey, TransactionMode, Value, inject, lookup,
};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryState {
    pub containers: BTreeMap<ContainerName, ContainerState>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ContainerState {
    pub key_spec: KeySpec,
    pub next_key: u64,
    pub records: BTreeMap<RecordKey, Value>,
}

impl ContainerState {
    pub(crate) fn new(key_spec: KeySpec) -> Self {
        Self {
            key_spec,
            ..Self::default()
        }
    }

    fn allocate_key(&mut self) -> u64 {
        if self.next_key == 0 {
            self.next_key = 1;
        }
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    // explicit numeric keys push the generator past them
    fn observe_key(&mut self, key: &RecordKey) {
        let RecordKey::Number(number) = key else {
            return;
        };
        if *number < 1.0 || *number >= u64::MAX as f64 {
            return;
        }
        let floor = number.floor() as u64;
        if floor >= self.next_key {
            self.next_key = floor + 1;
        }
    }

    fn resolve_key(&mut self, record: &mut Value) -> StoreResult<RecordKey> {
        let Some(path) = self.key_spec.key_path.clone() else {
            return Ok(RecordKey::Number(self.allocate_key() as f64));
        };
        if let Some(key) = path.extract(record) {
            return Ok(key);
        }

        let KeyPath::Field(field) = &path else {
            return Err(StoreError::InvalidInput(format!(
                "record has no valid key at {path}"
            )));
        };
        if !self.key_spec.auto_increment || lookup(record, field).is_some() {
            return Err(StoreError::InvalidInput(format!(
                "record has no valid key at {path}"
            )));
        }

        let generated = self.allocate_key();
        let segments: Vec<&str> = field.split('.').collect();
        if !inject(record, &segments, Value::from(generated)) {
            return Err(StoreError::InvalidInput(format!(
                "cannot write generated key into {field}"
            )));
        }
        Ok(RecordKey::Number(generated as f64))
    }

    pub(crate) fn insert(&mut self, mut record: Value) -> StoreResult<RecordKey> {
        let key = self.resolve_key(&mut record)?;
        if self.records.contains_key(&key) {
            return Err(StoreError::Constraint(format!("key {key} already exists")));
        }
        if self.key_spec.auto_increment {
            self.observe_key(&key);
        }
        self.records.insert(key.clone(), record);
        Ok(key)
    }
}

pub(crate) fn lock_state(state: &Mutex<MemoryState>) -> StoreResult<MutexGuard<'_, MemoryState>> {
    state
        .lock()
        .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))
}

/// In-process store. Clones share the same containers.
///
/// Transactions are not isolated from each other: overlapping read-write
/// transactions see each other's writes, and an abort restores the
/// containers it touched to their state before its first write.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: MemoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn snapshot(&self) -> StoreResult<MemoryState> {
        Ok(lock_state(&self.inner)?.clone())
    }

    pub fn create_container(
        &self,
        name: impl Into<ContainerName>,
        key_spec: KeySpec,
    ) -> StoreResult<()> {
        let name = name.into();
        let mut state = lock_state(&self.inner)?;
        if state.containers.contains_key(&name) {
            return Err(StoreError::Constraint(format!(
                "container {name} already exists"
            )));
        }
        state.containers.insert(name, ContainerState::new(key_spec));
        Ok(())
    }

    pub fn key_spec(&self, name: &str) -> StoreResult<KeySpec> {
        let state = lock_state(&self.inner)?;
        state
            .containers
            .get(name)
            .map(|container| container.key_spec.clone())
            .ok_or_else(|| StoreError::NotFound {
                resource: "container",
                id: name.to_string(),
            })
    }

    pub fn begin(
        &self,
        scope: &[ContainerName],
        mode: TransactionMode,
    ) -> StoreResult<MemoryTransaction> {
        let state = lock_state(&self.inner)?;
        let mut seen = BTreeSet::new();
        for name in scope {
            if !state.containers.contains_key(name) {
                return Err(StoreError::NotFound {
                    resource: "container",
                    id: name.clone(),
                });
            }
            seen.insert(name.clone());
        }

        Ok(MemoryTransaction {
            state: Arc::clone(&self.inner),
            scope: seen.into_iter().collect(),
            mode,
            journal: Arc::new(Mutex::new(Journal::default())),
        })
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn container_names(&self) -> StoreResult<Vec<ContainerName>> {
        let state = lock_state(&self.inner)?;
        Ok(state.containers.keys().cloned().collect())
    }

    async fn transaction(
        &self,
        scope: &[ContainerName],
        mode: TransactionMode,
    ) -> StoreResult<Box<dyn Transaction>> {
        Ok(Box::new(self.begin(scope, mode)?))
    }
}

#[derive(Debug, Default)]
struct Journal {
    finished: bool,
    pre_images: BTreeMap<ContainerName, ContainerState>,
}

#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    scope: Vec<ContainerName>,
    mode: TransactionMode,
    journal: Arc<Mutex<Journal>>,
}

fn lock_journal(journal: &Mutex<Journal>) -> StoreResult<MutexGuard<'_, Journal>> {
    journal
        .lock()
        .map_err(|_| StoreError::Backend("transaction journal mutex poisoned".to_string()))
}

impl MemoryTransaction {
    fn lock_journal(&self) -> StoreResult<MutexGuard<'_, Journal>> {
        lock_journal(&self.journal)
    }

    /// Fails with [`StoreError::TransactionFinished`] once committed or aborted.
    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.lock_journal()?.finished {
            return Err(StoreError::TransactionFinished);
        }
        Ok(())
    }

    fn check_request(&self, journal: &Journal, container: &str, write: bool) -> StoreResult<()> {
        if journal.finished {
            return Err(StoreError::TransactionFinished);
        }
        if !self.scope.iter().any(|name| name == container) {
            return Err(StoreError::OutOfScope(container.to_string()));
        }
        if write && !self.mode.is_writable() {
            return Err(StoreError::ReadOnly(container.to_string()));
        }
        Ok(())
    }

    fn write<T>(
        &self,
        container: &str,
        apply: impl FnOnce(&mut ContainerState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut journal = self.lock_journal()?;
        self.check_request(&journal, container, true)?;

        let mut state = lock_state(&self.state)?;
        let current =
            state
                .containers
                .get_mut(container)
                .ok_or_else(|| StoreError::NotFound {
                    resource: "container",
                    id: container.to_string(),
                })?;
        journal
            .pre_images
            .entry(container.to_string())
            .or_insert_with(|| current.clone());
        apply(current)
    }
}

#[async_trait::async_trait]
impl Transaction for MemoryTransaction {
    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn scope(&self) -> &[ContainerName] {
        &self.scope
    }

    async fn open_cursor(&self, container: &str) -> StoreResult<Box<dyn RecordCursor>> {
        let journal = self.lock_journal()?;
        self.check_request(&journal, container, false)?;
        Ok(Box::new(MemoryCursor {
            state: Arc::clone(&self.state),
            journal: Arc::clone(&self.journal),
            container: container.to_string(),
            position: None,
            exhausted: false,
        }))
    }

    async fn add(&self, container: &str, record: Value) -> StoreResult<RecordKey> {
        self.write(container, |state| state.insert(record))
    }

    async fn clear(&self, container: &str) -> StoreResult<()> {
        self.write(container, |state| {
            state.records.clear();
            Ok(())
        })
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut journal = self.lock_journal()?;
        if journal.finished {
            return Err(StoreError::TransactionFinished);
        }
        journal.finished = true;
        journal.pre_images.clear();
        Ok(())
    }

    async fn abort(&self) -> StoreResult<()> {
        let mut journal = self.lock_journal()?;
        if journal.finished {
            return Err(StoreError::TransactionFinished);
        }
        journal.finished = true;

        let mut state = lock_state(&self.state)?;
        for (name, pre_image) in std::mem::take(&mut journal.pre_images) {
            state.containers.insert(name, pre_image);
        }
        Ok(())
    }
}

/// Walks a container in key order, re-reading the live state at each step.
/// Stops working once its transaction finishes.
struct MemoryCursor {
    state: Arc<Mutex<MemoryState>>,
    journal: Arc<Mutex<Journal>>,
    container: ContainerName,
    position: Option<RecordKey>,
    exhausted: bool,
}

#[async_trait::async_trait]
impl RecordCursor for MemoryCursor {
    async fn next(&mut self) -> StoreResult<Option<Value>> {
        if lock_journal(&self.journal)?.finished {
            return Err(StoreError::TransactionFinished);
        }
        if self.exhausted {
            return Ok(None);
        }

        let state = lock_state(&self.state)?;
        let container =
            state
                .containers
                .get(&self.container)
                .ok_or_else(|| StoreError::NotFound {
                    resource: "container",
                    id: self.container.clone(),
                })?;
        let lower = match &self.position {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let next = container
            .records
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(key, value)| (key.clone(), value.clone()));
        drop(state);

        match next {
            Some((key, value)) => {
                self.position = Some(key);
                Ok(Some(value))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}
