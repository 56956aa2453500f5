use {
    crate::{
        assertion::is_assertion_failure,
        completion::{Completion, Failure, FailureKind, Outcome},
        error::{Error, Result},
        host::WindowHost,
        policy::{RetryEvent, RetryPolicy},
    },
    anyhow::anyhow,
    derive_more::Display,
    std::{
        panic::{catch_unwind, AssertUnwindSafe},
        thread,
    },
    tracing::{debug, error, info, info_span, warn},
};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[display("created")]
    Created,
    #[display("showing content")]
    ContentShown,
    #[display("holding a control")]
    ControlFound,
    #[display("evaluating")]
    Evaluating,
    #[display("succeeded")]
    Succeeded,
    #[display("failed")]
    Failed,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Succeeded | State::Failed)
    }
}

/// Runs an assertion against a single control until it holds.
///
/// The calls must be made in order: [Evaluator::initialize], [Evaluator::find],
/// [Evaluator::evaluate], and then [Evaluator::wait_for_completion] (or a wait on
/// a [Completion] handle obtained from [Evaluator::completion]).
/// Each evaluator performs at most one evaluation.
pub struct Evaluator<H: WindowHost, C> {
    host: H,
    policy: RetryPolicy,
    control: Option<C>,
    state: State,
    completion: Completion,
}

impl<H: WindowHost, C> Evaluator<H, C> {
    pub fn new(host: H) -> Self {
        Self::with_policy(host, RetryPolicy::default())
    }

    pub fn with_policy(host: H, policy: RetryPolicy) -> Self {
        Self {
            host,
            policy,
            control: None,
            state: State::Created,
            completion: Completion::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn control(&self) -> Option<&C> {
        self.control.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Returns a handle to the outcome of this evaluator.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    fn expect_state(&self, operation: &'static str, expected: State) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Shows `content` in the host window.
    pub fn initialize(&mut self, content: H::Content) -> Result<()> {
        self.expect_state("show content", State::Created)?;
        self.host
            .show_content(content)
            .map_err(|error| Error::Host {
                action: "show content",
                error,
            })?;
        self.state = State::ContentShown;
        debug!("content shown");
        Ok(())
    }

    /// Calls `lookup` once and keeps the returned control for all attempts.
    ///
    /// The lookup is not retried: the control must exist as soon as the content is shown.
    pub fn find(&mut self, lookup: impl FnOnce() -> Option<C>) -> Result<&C> {
        self.expect_state("find a control", State::ContentShown)?;
        let control = lookup().ok_or(Error::InvalidArgument {
            argument: "lookup",
            reason: "no control found",
        })?;
        self.state = State::ControlFound;
        debug!("control found");
        Ok(self.control.insert(control))
    }

    /// Runs `assertion` against the control, retrying on [AssertionFailed](crate::AssertionFailed).
    ///
    /// Returns `Ok(())` once the outcome is known, including when the assertion kept
    /// failing: that failure is only reported through [Evaluator::wait_for_completion],
    /// after the host window has been closed. Any other error returned by the assertion
    /// stops the evaluation immediately, without waiting or closing the window,
    /// and is returned as [Error::Fatal] as well as stored as the outcome.
    pub fn evaluate(&mut self, mut assertion: impl FnMut(&C) -> anyhow::Result<()>) -> Result<()> {
        let (State::ControlFound, Some(control)) = (self.state, &self.control) else {
            return Err(Error::InvalidState {
                operation: "evaluate",
                state: self.state,
            });
        };
        self.state = State::Evaluating;

        let schedule = self.policy.schedule();
        let span = info_span!("evaluate", schedule = %schedule);
        let _guard = span.enter();

        let mut delays = schedule.delays().iter().copied();
        let mut attempt = 1;
        let result = loop {
            let error = match run_attempt(&mut assertion, control) {
                Ok(()) => break Ok(()),
                Err(error) => error,
            };
            if !is_assertion_failure(&error) {
                break Err(Failure::new(error, FailureKind::Fatal, attempt));
            }
            let Some(delay) = delays.next() else {
                break Err(Failure::new(error, FailureKind::AssertionFailed, attempt));
            };
            debug!(attempt, ?delay, "assertion not satisfied yet, retrying");
            thread::sleep(delay);
            self.policy.notify(&RetryEvent {
                attempt,
                delay,
                error: &error,
            });
            attempt += 1;
        };

        match result {
            Ok(()) => {
                info!(attempts = attempt, "evaluation succeeded");
                self.finish(State::Succeeded, Ok(()));
                Ok(())
            }
            Err(failure) if failure.is_assertion() => {
                warn!(attempts = attempt, "evaluation failed: {:#}", failure.error());
                if let Err(err) = self.host.close_window() {
                    error!("failed to close the window after a failed evaluation: {err:#}");
                }
                self.finish(State::Failed, Err(failure));
                Ok(())
            }
            Err(failure) => {
                error!(
                    attempts = attempt,
                    "assertion raised an error that is not retried: {:#}",
                    failure.error()
                );
                self.finish(State::Failed, Err(failure.clone()));
                Err(Error::Fatal(failure))
            }
        }
    }

    fn finish(&mut self, state: State, outcome: Outcome) {
        self.state = state;
        self.completion.resolve(outcome);
    }

    /// Blocks until the evaluation has finished and returns its outcome.
    ///
    /// Panics if [Evaluator::evaluate] has not run yet: `evaluate` needs `&mut self`,
    /// so the outcome could never arrive while this call holds `&self`.
    pub fn wait_for_completion(&self) -> Outcome {
        assert!(
            self.state.is_terminal(),
            "wait_for_completion called while the evaluator is {}",
            self.state
        );
        self.completion.wait()
    }
}

/// Runs one attempt, turning a panic in the assertion into an error.
fn run_attempt<C>(
    assertion: &mut impl FnMut(&C) -> anyhow::Result<()>,
    control: &C,
) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(|| assertion(control))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&'static str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());
            Err(anyhow!("assertion panicked: {message}"))
        }
    }
}
