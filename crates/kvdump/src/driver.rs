use crate::clear::drive_clear;
use crate::config::DumpConfig;
use crate::document::{Document, parse_entries, render_document};
use crate::errors::{DumpError, DumpResult};
use crate::export::drive_export;
use crate::import::{ImportContext, ImportReport, drive_import};
use kvdump_store::{ContainerName, Store, StoreError, Transaction, TransactionMode};
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, warn};

/// Runs bulk operations against any [`Store`] with one configuration.
#[derive(Clone, Debug, Default)]
pub struct BulkDriver {
    config: DumpConfig,
}

impl BulkDriver {
    pub fn new(config: DumpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Serializes every container to one JSON document.
    pub async fn export_to_text<S: Store + ?Sized>(&self, store: &S) -> DumpResult<String> {
        let names = container_scope(store).await?;
        if names.is_empty() {
            debug!("store has no containers, exporting an empty document");
            return render_document(&Document::new());
        }

        debug!(containers = names.len(), "export started");
        let tx = store.transaction(&names, TransactionMode::ReadOnly).await?;
        let outcome = self.bounded("export", drive_export(tx.as_ref(), &names)).await;
        let document = settle(tx.as_ref(), outcome).await?;
        render_document(&document)
    }

    /// Adds every record of `text` to the container of the same name.
    ///
    /// Existing records are kept, and document containers the store does not
    /// have are skipped without looking at their entries. The document is
    /// parsed and every store container's entry decoded before the
    /// transaction opens, so malformed text leaves the store untouched.
    pub async fn import_from_text<S: Store + ?Sized>(
        &self,
        store: &S,
        text: &str,
    ) -> DumpResult<ImportReport> {
        let entries = parse_entries(text)?;
        let names = container_scope(store).await?;
        let (context, batches) = ImportContext::plan(&names, entries)?;
        if names.is_empty() {
            debug!("store has no containers, nothing to import");
            return Ok(context.into_report());
        }

        debug!(containers = names.len(), "import started");
        let tx = store.transaction(&names, TransactionMode::ReadWrite).await?;
        let outcome = self
            .bounded(
                "import",
                drive_import(
                    tx.as_ref(),
                    context,
                    batches,
                    self.config.add_failure_policy,
                ),
            )
            .await;
        settle(tx.as_ref(), outcome).await
    }

    /// Deletes every record of every container. Schema is untouched.
    pub async fn clear<S: Store + ?Sized>(&self, store: &S) -> DumpResult<()> {
        let names = container_scope(store).await?;
        if names.is_empty() {
            debug!("store has no containers, nothing to clear");
            return Ok(());
        }

        debug!(containers = names.len(), "clear started");
        let tx = store.transaction(&names, TransactionMode::ReadWrite).await?;
        let outcome = self.bounded("clear", drive_clear(tx.as_ref(), &names)).await;
        settle(tx.as_ref(), outcome).await
    }

    /// Deletes every record of one container.
    pub async fn clear_container<S: Store + ?Sized>(&self, store: &S, name: &str) -> DumpResult<()> {
        let names = container_scope(store).await?;
        if !names.iter().any(|existing| existing == name) {
            return Err(StoreError::NotFound {
                resource: "container",
                id: name.to_string(),
            }
            .into());
        }

        let scope = vec![name.to_string()];
        let tx = store.transaction(&scope, TransactionMode::ReadWrite).await?;
        let outcome = self.bounded("clear", drive_clear(tx.as_ref(), &scope)).await;
        settle(tx.as_ref(), outcome).await
    }

    async fn bounded<T, F>(&self, operation: &'static str, request_phase: F) -> DumpResult<T>
    where
        F: Future<Output = DumpResult<T>>,
    {
        let Some(limit) = self.config.timeout else {
            return request_phase.await;
        };
        match tokio::time::timeout(limit, request_phase).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(operation, ?limit, "request phase timed out");
                Err(DumpError::Timeout { operation, limit })
            }
        }
    }
}

/// Distinct container names of `store`, sorted.
pub(crate) async fn container_scope<S: Store + ?Sized>(store: &S) -> DumpResult<Vec<ContainerName>> {
    let names: BTreeSet<ContainerName> = store.container_names().await?.into_iter().collect();
    Ok(names.into_iter().collect())
}

/// Commits on success. On failure aborts and hands back the original error.
async fn settle<T>(tx: &dyn Transaction, outcome: DumpResult<T>) -> DumpResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            debug!(mode = %tx.mode(), containers = %tx.scope().join(","), "transaction committed");
            Ok(value)
        }
        Err(error) => {
            match tx.abort().await {
                Ok(()) => debug!(
                    mode = %tx.mode(),
                    containers = %tx.scope().join(","),
                    "transaction aborted"
                ),
                Err(abort_error) => warn!(error = %abort_error, "transaction abort failed"),
            }
            Err(error)
        }
    }
}

pub async fn export_to_text<S: Store + ?Sized>(store: &S) -> DumpResult<String> {
    BulkDriver::default().export_to_text(store).await
}

pub async fn import_from_text<S: Store + ?Sized>(store: &S, text: &str) -> DumpResult<ImportReport> {
    BulkDriver::default().import_from_text(store, text).await
}

pub async fn clear<S: Store + ?Sized>(store: &S) -> DumpResult<()> {
    BulkDriver::default().clear(store).await
}

pub async fn clear_container<S: Store + ?Sized>(store: &S, name: &str) -> DumpResult<()> {
    BulkDriver::default().clear_container(store, name).await
}
