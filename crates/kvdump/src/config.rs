use std::time::Duration;

/// What an import does when a single record cannot be added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddFailurePolicy {
    /// Abort the transaction and fail the import on the first failed add.
    #[default]
    FailFast,
    /// Keep going, commit every record that was added, and list the failures
    /// in the [`ImportReport`](crate::ImportReport).
    BestEffort,
}

/// Runtime configuration for bulk operations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DumpConfig {
    /// Upper bound on the request phase of one operation. `None` waits for
    /// as long as the store takes.
    pub timeout: Option<Duration>,
    pub add_failure_policy: AddFailurePolicy,
}

impl DumpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_add_failure_policy(mut self, policy: AddFailurePolicy) -> Self {
        self.add_failure_policy = policy;
        self
    }
}
