use {
    itertools::Itertools,
    serde::{Deserialize, Serialize},
    std::{fmt, sync::Arc, time::Duration},
    tracing::info,
};

/// Delays used by [BackoffSchedule::default].
const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(1),
    Duration::from_secs(2),
];

/// Fixed, ordered list of waits between evaluation attempts.
///
/// Each delay grants one retry, so a schedule of `n` delays allows `n + 1` attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScheduleRepr", into = "ScheduleRepr")]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

#[derive(Serialize, Deserialize)]
struct ScheduleRepr {
    delays_ms: Vec<u64>,
}

impl From<ScheduleRepr> for BackoffSchedule {
    fn from(repr: ScheduleRepr) -> Self {
        Self::new(repr.delays_ms.into_iter().map(Duration::from_millis))
    }
}

impl From<BackoffSchedule> for ScheduleRepr {
    fn from(schedule: BackoffSchedule) -> Self {
        Self {
            delays_ms: schedule
                .delays
                .iter()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                .collect(),
        }
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_DELAYS)
    }
}

impl BackoffSchedule {
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }

    /// `retries` equal delays.
    pub fn fixed(retries: usize, delay: Duration) -> Self {
        Self::new(std::iter::repeat_n(delay, retries))
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn retries(&self) -> usize {
        self.delays.len()
    }

    /// Number of attempts including the first one.
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Total time spent waiting if every retry is used.
    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl fmt::Display for BackoffSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delays.is_empty() {
            return write!(f, "no retries");
        }
        write!(f, "{}", self.delays.iter().map(|d| format!("{d:?}")).join(", "))
    }
}

/// Information passed to the retry callback after an unsuccessful attempt.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// 1-based number of the attempt that failed.
    pub attempt: usize,
    /// Delay that was waited before the next attempt.
    pub delay: Duration,
    pub error: &'a anyhow::Error,
}

type OnRetry = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Backoff schedule together with the diagnostic callback invoked on each retry.
#[derive(Clone)]
pub struct RetryPolicy {
    schedule: BackoffSchedule,
    on_retry: OnRetry,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    /// Default schedule (1s, 1s, 2s). Intermediate failures are logged.
    pub fn new() -> RetryPolicy {
        RetryPolicy {
            schedule: BackoffSchedule::default(),
            on_retry: Arc::new(log_intermediate_failure),
        }
    }

    pub fn with_schedule(mut self, schedule: BackoffSchedule) -> RetryPolicy {
        self.schedule = schedule;
        self
    }

    /// Replaces the diagnostic callback.
    ///
    /// The callback runs on the evaluating thread after the delay has elapsed
    /// and before the next attempt. It is not called for the final failure
    /// or for errors that are not retried.
    pub fn with_on_retry(
        mut self,
        on_retry: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    ) -> RetryPolicy {
        self.on_retry = Arc::new(on_retry);
        self
    }

    pub fn schedule(&self) -> &BackoffSchedule {
        &self.schedule
    }

    pub(crate) fn notify(&self, event: &RetryEvent<'_>) {
        (self.on_retry)(event);
    }
}

fn log_intermediate_failure(event: &RetryEvent<'_>) {
    info!(
        attempt = event.attempt,
        delay = ?event.delay,
        "intermediate evaluation: {:#}",
        event.error
    );
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn default_schedule() {
        let schedule = BackoffSchedule::default();
        assert_eq!(
            schedule.delays(),
            &[
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(2)
            ]
        );
        assert_eq!(schedule.retries(), 3);
        assert_eq!(schedule.max_attempts(), 4);
        assert_eq!(schedule.total(), Duration::from_secs(4));
        assert_eq!(schedule.to_string(), "1s, 1s, 2s");
    }

    #[test]
    fn empty_schedule_allows_one_attempt() {
        let schedule = BackoffSchedule::fixed(0, Duration::from_secs(1));
        assert_eq!(schedule.max_attempts(), 1);
        assert_eq!(schedule.total(), Duration::ZERO);
        assert_eq!(schedule.to_string(), "no retries");
    }

    #[test]
    fn fixed_schedule() {
        let schedule = BackoffSchedule::fixed(2, Duration::from_millis(250));
        assert_eq!(schedule.delays(), &[Duration::from_millis(250); 2]);
        assert_eq!(schedule.total(), Duration::from_millis(500));
    }

    #[test]
    fn schedule_in_milliseconds() {
        let schedule: BackoffSchedule =
            serde_json::from_str(r#"{ "delays_ms": [10, 20, 500] }"#).unwrap();
        assert_eq!(
            schedule.delays(),
            &[
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(500)
            ]
        );
        let json = serde_json::to_value(BackoffSchedule::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "delays_ms": [1000, 1000, 2000] }));
    }

    #[test]
    fn custom_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let policy = RetryPolicy::new()
            .with_schedule(BackoffSchedule::fixed(1, Duration::from_millis(5)))
            .with_on_retry(move |event| {
                assert_eq!(event.attempt, 1);
                calls2.fetch_add(1, Ordering::SeqCst);
            });
        let error = anyhow::anyhow!("not yet");
        policy.notify(&RetryEvent {
            attempt: 1,
            delay: Duration::from_millis(5),
            error: &error,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(policy.schedule().retries(), 1);
        assert!(format!("{policy:?}").starts_with("RetryPolicy"));
    }
}
