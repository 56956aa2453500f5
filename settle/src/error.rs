use {
    crate::{completion::Failure, evaluator::State},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: &'static str,
    },
    #[error("cannot {operation} while the evaluator is {state}")]
    InvalidState {
        operation: &'static str,
        state: State,
    },
    #[error("window host failed to {action}: {error:#}")]
    Host {
        action: &'static str,
        error: anyhow::Error,
    },
    /// The assertion returned an error that is not retried.
    #[error(transparent)]
    Fatal(Failure),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
