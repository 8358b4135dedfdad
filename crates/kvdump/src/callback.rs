//! Fire-and-forget adapters. Each spawns the operation on the current tokio
//! runtime and hands its single result to `callback`.

use crate::driver::BulkDriver;
use crate::errors::DumpResult;
use crate::import::ImportReport;
use kvdump_store::Store;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub fn spawn_export<S, F>(driver: BulkDriver, store: Arc<S>, callback: F) -> JoinHandle<()>
where
    S: Store + ?Sized + 'static,
    F: FnOnce(DumpResult<String>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = driver.export_to_text(store.as_ref()).await;
        callback(result);
    })
}

pub fn spawn_import<S, F>(
    driver: BulkDriver,
    store: Arc<S>,
    text: String,
    callback: F,
) -> JoinHandle<()>
where
    S: Store + ?Sized + 'static,
    F: FnOnce(DumpResult<ImportReport>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = driver.import_from_text(store.as_ref(), &text).await;
        callback(result);
    })
}

pub fn spawn_clear<S, F>(driver: BulkDriver, store: Arc<S>, callback: F) -> JoinHandle<()>
where
    S: Store + ?Sized + 'static,
    F: FnOnce(DumpResult<()>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = driver.clear(store.as_ref()).await;
        callback(result);
    })
}
