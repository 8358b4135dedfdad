use crate::barrier::CompletionBarrier;
use crate::config::AddFailurePolicy;
use crate::document::{DocumentEntries, decode_entry};
use crate::errors::{DumpError, DumpResult};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use kvdump_store::{ContainerName, StoreError, Transaction, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Outcome of a successful import.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records added, per store container.
    pub imported: BTreeMap<ContainerName, usize>,
    /// Document containers the store does not have.
    pub skipped_containers: Vec<ContainerName>,
    /// Adds that failed under [`AddFailurePolicy::BestEffort`].
    pub failures: Vec<RecordFailure>,
    /// Containers that did not receive every record of their document entry.
    pub incomplete_containers: Vec<ContainerName>,
}

impl ImportReport {
    pub fn records_imported(&self) -> usize {
        self.imported.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.incomplete_containers.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFailure {
    pub container: ContainerName,
    /// Position of the record in the container's document array.
    pub index: usize,
    pub reason: String,
}

pub(crate) type Batch<'a> = (&'a str, Vec<Value>);

/// Per-invocation import state: one barrier per container counting
/// successful adds, one barrier counting finished containers.
pub(crate) struct ImportContext<'a> {
    containers: BTreeMap<&'a str, CompletionBarrier>,
    drained: CompletionBarrier,
    report: ImportReport,
}

impl<'a> ImportContext<'a> {
    /// Splits `entries` into one batch per store container. Containers with
    /// nothing to add are done immediately and get no batch. Only entries of
    /// store containers are decoded; the rest are skipped unchecked.
    pub(crate) fn plan(
        names: &'a [ContainerName],
        mut entries: DocumentEntries,
    ) -> DumpResult<(Self, Vec<Batch<'a>>)> {
        let mut context = Self {
            containers: BTreeMap::new(),
            drained: CompletionBarrier::new(names.len()),
            report: ImportReport::default(),
        };
        let mut batches = Vec::new();

        for name in names {
            let records = match entries.remove(name) {
                Some(entry) => decode_entry(name, entry)?,
                None => Vec::new(),
            };
            let barrier = CompletionBarrier::new(records.len());
            if barrier.is_complete() {
                context.drained.arrive();
            } else {
                batches.push((name.as_str(), records));
            }
            context.containers.insert(name.as_str(), barrier);
            context.report.imported.insert(name.clone(), 0);
        }

        for skipped in entries.into_keys() {
            warn!(container = %skipped, "store has no such container, skipping its records");
            context.report.skipped_containers.push(skipped);
        }

        Ok((context, batches))
    }

    fn record_added(&mut self, container: &str) {
        if let Some(count) = self.report.imported.get_mut(container) {
            *count += 1;
        }
        let Some(barrier) = self.containers.get_mut(container) else {
            return;
        };
        if barrier.arrive() {
            debug!(container, records = barrier.expected(), "container imported");
            self.drained.arrive();
        }
    }

    fn record_failed(&mut self, container: &str, index: usize, error: &StoreError) {
        warn!(container, index, error = %error, "record add failed, continuing");
        self.report.failures.push(RecordFailure {
            container: container.to_string(),
            index,
            reason: error.to_string(),
        });
    }

    pub(crate) fn into_report(mut self) -> ImportReport {
        self.report.incomplete_containers = self
            .containers
            .iter()
            .filter(|(_, barrier)| !barrier.is_complete())
            .map(|(name, _)| name.to_string())
            .collect();
        self.report
    }
}

/// Errors a single bad record can cause. Anything else means the
/// transaction itself is unusable.
fn is_record_level(error: &StoreError) -> bool {
    matches!(error, StoreError::Constraint(_) | StoreError::InvalidInput(_))
}

/// Issues every add concurrently and counts completions until all settle.
pub(crate) async fn drive_import<'a>(
    tx: &dyn Transaction,
    mut context: ImportContext<'a>,
    batches: Vec<Batch<'a>>,
    policy: AddFailurePolicy,
) -> DumpResult<ImportReport> {
    let mut pending = FuturesUnordered::new();
    for (container, records) in batches {
        for (index, record) in records.into_iter().enumerate() {
            pending.push(async move { (container, index, tx.add(container, record).await) });
        }
    }

    while let Some((container, index, outcome)) = pending.next().await {
        match outcome {
            Ok(_) => context.record_added(container),
            Err(source) if !is_record_level(&source) => return Err(DumpError::Store(source)),
            Err(source) => match policy {
                AddFailurePolicy::BestEffort => context.record_failed(container, index, &source),
                AddFailurePolicy::FailFast => {
                    return Err(DumpError::RecordAdd {
                        container: container.to_string(),
                        index,
                        source,
                    });
                }
            },
        }
    }

    if !context.drained.is_complete() {
        warn!(
            remaining = context.drained.remaining(),
            "import settled with unfinished containers"
        );
    }
    Ok(context.into_report())
}
