use crate::document::Document;
use crate::errors::DumpResult;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use kvdump_store::{ContainerName, StoreResult, Transaction, Value};
use tracing::debug;

/// Per-invocation export state. Completion is reached when every container
/// has posted its records, including containers that had none.
struct ExportContext {
    expected: usize,
    collected: Document,
}

impl ExportContext {
    fn new(expected: usize) -> Self {
        Self {
            expected,
            collected: Document::new(),
        }
    }

    fn post(&mut self, container: ContainerName, records: Vec<Value>) -> bool {
        self.collected.insert(container, records);
        self.is_complete()
    }

    fn is_complete(&self) -> bool {
        self.collected.len() == self.expected
    }
}

async fn drain_container(tx: &dyn Transaction, container: &str) -> StoreResult<Vec<Value>> {
    let mut cursor = tx.open_cursor(container).await?;
    let mut records = Vec::new();
    while let Some(record) = cursor.next().await? {
        records.push(record);
    }
    Ok(records)
}

/// Drains every container concurrently. The first cursor error wins and
/// the remaining cursors are dropped. `names` must be distinct.
pub(crate) async fn drive_export(
    tx: &dyn Transaction,
    names: &[ContainerName],
) -> DumpResult<Document> {
    let mut context = ExportContext::new(names.len());
    let mut pending: FuturesUnordered<_> = names
        .iter()
        .map(|name| async move { (name, drain_container(tx, name).await) })
        .collect();

    while let Some((name, drained)) = pending.next().await {
        let records = drained?;
        debug!(container = %name, records = records.len(), "container exported");
        if context.post(name.clone(), records) {
            break;
        }
    }
    Ok(context.collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvdump_store::{KeySpec, MemoryStore, TransactionMode};

    #[test]
    fn export_context_counts_empty_containers() {
        let mut context = ExportContext::new(2);

        assert!(!context.post("a".to_string(), Vec::new()));
        assert!(!context.post("a".to_string(), Vec::new()));
        assert!(context.post("b".to_string(), Vec::new()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn drive_export_collects_every_container_in_key_order() {
        let store = MemoryStore::new();
        store
            .create_container("a", KeySpec::inline("id"))
            .expect("container should be created");
        store
            .create_container("b", KeySpec::inline("id"))
            .expect("container should be created");
        let names = vec!["a".to_string(), "b".to_string()];

        let tx = store
            .begin(&names, TransactionMode::ReadWrite)
            .expect("transaction should open");
        for id in [2_i64, 1] {
            tx.add("a", Value::object([("id", Value::from(id))]))
                .await
                .expect("add should succeed");
        }

        let document = drive_export(&tx, &names).await.expect("export should succeed");

        assert_eq!(
            document["a"],
            vec![
                Value::object([("id", Value::from(1_i64))]),
                Value::object([("id", Value::from(2_i64))]),
            ]
        );
        assert!(document["b"].is_empty());
    }
}
