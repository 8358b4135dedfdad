use crate::barrier::CompletionBarrier;
use crate::errors::DumpResult;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use kvdump_store::{ContainerName, Transaction};
use std::collections::BTreeSet;
use tracing::debug;

struct ClearContext<'a> {
    drained: CompletionBarrier,
    cleared: BTreeSet<&'a str>,
}

impl<'a> ClearContext<'a> {
    fn new(expected: usize) -> Self {
        Self {
            drained: CompletionBarrier::new(expected),
            cleared: BTreeSet::new(),
        }
    }

    fn post(&mut self, container: &'a str) -> bool {
        if self.cleared.insert(container) {
            self.drained.arrive();
        }
        self.drained.is_complete()
    }
}

/// Issues one clear per container and waits until all of them report back.
pub(crate) async fn drive_clear(tx: &dyn Transaction, names: &[ContainerName]) -> DumpResult<()> {
    let mut context = ClearContext::new(names.len());
    let mut pending: FuturesUnordered<_> = names
        .iter()
        .map(|name| async move { tx.clear(name).await.map(|()| name.as_str()) })
        .collect();

    while let Some(outcome) = pending.next().await {
        let name = outcome?;
        debug!(container = name, "container cleared");
        if context.post(name) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvdump_store::{KeySpec, MemoryStore, TransactionMode, Value};

    #[test]
    fn clear_context_ignores_repeated_reports() {
        let mut context = ClearContext::new(2);

        assert!(!context.post("a"));
        assert!(!context.post("a"));
        assert!(context.post("b"));
        assert_eq!(context.drained.arrived(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn drive_clear_empties_every_container() {
        let store = MemoryStore::new();
        for name in ["a", "b"] {
            store
                .create_container(name, KeySpec::out_of_line())
                .expect("container should be created");
        }
        let names = vec!["a".to_string(), "b".to_string()];
        let tx = store
            .begin(&names, TransactionMode::ReadWrite)
            .expect("transaction should open");
        tx.add("a", Value::from("x")).await.expect("add should succeed");
        tx.add("b", Value::from("y")).await.expect("add should succeed");

        drive_clear(&tx, &names).await.expect("clear should succeed");
        drive_clear(&tx, &[]).await.expect("empty clear should succeed");

        for name in &names {
            let mut cursor = tx.open_cursor(name).await.expect("cursor should open");
            assert_eq!(cursor.next().await.expect("cursor should advance"), None);
        }
    }
}
