use {
    crate::assertion::{find_assertion, AssertionFailed},
    std::{
        sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
        time::{Duration, Instant},
    },
    thiserror::Error,
};

/// Terminal outcome of an evaluation.
pub type Outcome = Result<(), Failure>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The assertion kept failing until the retry budget was exhausted.
    AssertionFailed,
    /// The assertion returned an error that is not an [AssertionFailed].
    Fatal,
}

/// Error that terminated an evaluation.
///
/// Clones share the underlying error, see [Failure::same_as].
#[derive(Debug, Clone, Error)]
#[error("evaluation failed after {attempts} attempt(s): {error:#}")]
pub struct Failure {
    error: Arc<anyhow::Error>,
    kind: FailureKind,
    attempts: usize,
}

impl Failure {
    pub(crate) fn new(error: anyhow::Error, kind: FailureKind, attempts: usize) -> Self {
        Self {
            error: Arc::new(error),
            kind,
            attempts,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn is_assertion(&self) -> bool {
        self.kind == FailureKind::AssertionFailed
    }

    /// Number of attempts made, including the one that produced this failure.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// The [AssertionFailed] in the error chain, if any.
    pub fn assertion(&self) -> Option<&AssertionFailed> {
        find_assertion(&self.error)
    }

    /// Returns `true` if both failures hold the same error instance.
    pub fn same_as(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }
}

#[derive(Default)]
struct CompletionData {
    outcome: Mutex<Option<Outcome>>,
    resolved: Condvar,
}

/// Write-once outcome cell shared between the evaluating thread and its waiters.
///
/// Cloning produces another handle to the same cell.
#[derive(Clone, Default)]
pub struct Completion(Arc<CompletionData>);

impl Completion {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Outcome>> {
        self.0.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the outcome and wakes all waiters.
    ///
    /// Panics if an outcome has already been stored.
    pub(crate) fn resolve(&self, outcome: Outcome) {
        let mut slot = self.lock();
        assert!(slot.is_none(), "completion resolved twice");
        *slot = Some(outcome);
        self.0.resolved.notify_all();
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().is_some()
    }

    /// Returns the outcome without blocking, or `None` if not resolved yet.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.lock().clone()
    }

    /// Blocks until the outcome is available.
    ///
    /// Can be called any number of times; every call returns the same outcome.
    pub fn wait(&self) -> Outcome {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = &*slot {
                return outcome.clone();
            }
            slot = self
                .0
                .resolved
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [Completion::wait], but gives up after `timeout` and returns `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = &*slot {
                return Some(outcome.clone());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            slot = self
                .0
                .resolved
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
