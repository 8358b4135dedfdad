#![allow(dead_code)]

use async_trait::async_trait;
use kvdump_store::{
    ContainerName, KeySpec, MemoryStore, RecordCursor, RecordKey, Store, StoreError, StoreResult,
    Transaction, TransactionMode, Value,
};
use std::sync::{Arc, Mutex};

pub fn thing(name: &str) -> Value {
    Value::object([("name", Value::from(name))])
}

/// Store with one auto-increment container `things` holding "First" and
/// "Second" under ids 1 and 2.
pub async fn things_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .create_container("things", KeySpec::auto_increment("id"))
        .expect("things should be created");
    seed(&store, "things", vec![thing("First"), thing("Second")]).await;
    store
}

pub async fn seed<S: Store + ?Sized>(store: &S, container: &str, records: Vec<Value>) {
    let tx = store
        .transaction(&[container.to_string()], TransactionMode::ReadWrite)
        .await
        .expect("seed transaction should open");
    for record in records {
        tx.add(container, record).await.expect("seed add should succeed");
    }
    tx.commit().await.expect("seed commit should succeed");
}

pub async fn read_all<S: Store + ?Sized>(store: &S, container: &str) -> Vec<Value> {
    let tx = store
        .transaction(&[container.to_string()], TransactionMode::ReadOnly)
        .await
        .expect("read transaction should open");
    let mut cursor = tx
        .open_cursor(container)
        .await
        .expect("cursor should open");
    let mut out = Vec::new();
    while let Some(record) = cursor.next().await.expect("cursor should advance") {
        out.push(record);
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    None,
    RepeatNames,
    FailCursor(ContainerName),
    FailClear(ContainerName),
    FailAddsWithBackendError,
    StallAdds,
}

/// Wraps a [`MemoryStore`], injects one fault, and records how each
/// transaction finished.
#[derive(Clone)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub fault: Fault,
    pub events: Arc<Mutex<Vec<String>>>,
}

impl ScriptedStore {
    pub fn new(inner: MemoryStore, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events mutex should lock").clone()
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn container_names(&self) -> StoreResult<Vec<ContainerName>> {
        let names = self.inner.container_names().await?;
        if self.fault == Fault::RepeatNames {
            let mut repeated = names.clone();
            repeated.extend(names);
            return Ok(repeated);
        }
        Ok(names)
    }

    async fn transaction(
        &self,
        scope: &[ContainerName],
        mode: TransactionMode,
    ) -> StoreResult<Box<dyn Transaction>> {
        self.events
            .lock()
            .expect("events mutex should lock")
            .push(format!("open {mode} {}", scope.join(",")));
        Ok(Box::new(ScriptedTransaction {
            inner: self.inner.transaction(scope, mode).await?,
            fault: self.fault.clone(),
            events: Arc::clone(&self.events),
        }))
    }
}

struct ScriptedTransaction {
    inner: Box<dyn Transaction>,
    fault: Fault,
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Transaction for ScriptedTransaction {
    fn mode(&self) -> TransactionMode {
        self.inner.mode()
    }

    fn scope(&self) -> &[ContainerName] {
        self.inner.scope()
    }

    async fn open_cursor(&self, container: &str) -> StoreResult<Box<dyn RecordCursor>> {
        if self.fault == Fault::FailCursor(container.to_string()) {
            return Err(StoreError::Backend(format!("cursor on {container} failed")));
        }
        self.inner.open_cursor(container).await
    }

    async fn add(&self, container: &str, record: Value) -> StoreResult<RecordKey> {
        match self.fault {
            Fault::StallAdds => std::future::pending().await,
            Fault::FailAddsWithBackendError => {
                Err(StoreError::Backend("disk full".to_string()))
            }
            _ => self.inner.add(container, record).await,
        }
    }

    async fn clear(&self, container: &str) -> StoreResult<()> {
        if self.fault == Fault::FailClear(container.to_string()) {
            return Err(StoreError::Backend(format!("clear of {container} failed")));
        }
        self.inner.clear(container).await
    }

    async fn commit(&self) -> StoreResult<()> {
        self.events
            .lock()
            .expect("events mutex should lock")
            .push("commit".to_string());
        self.inner.commit().await
    }

    async fn abort(&self) -> StoreResult<()> {
        self.events
            .lock()
            .expect("events mutex should lock")
            .push("abort".to_string());
        self.inner.abort().await
    }
}
