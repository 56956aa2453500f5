use {std::fmt::Display, thiserror::Error};

/// A check against the control under test that did not hold (yet).
///
/// This is the only kind of error that [Evaluator::evaluate](crate::Evaluator::evaluate)
/// retries. Return it from an assertion, directly or wrapped with
/// [anyhow::Context], when the observed state may still change as the UI settles.
/// Use [check!](crate::check) and [check_eq!](crate::check_eq) to produce it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AssertionFailed {
    message: String,
}

impl AssertionFailed {
    pub fn new(message: impl Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Returns `true` if any error in the chain of `error` is an [AssertionFailed].
pub fn is_assertion_failure(error: &anyhow::Error) -> bool {
    find_assertion(error).is_some()
}

pub(crate) fn find_assertion(error: &anyhow::Error) -> Option<&AssertionFailed> {
    error.chain().find_map(|e| e.downcast_ref::<AssertionFailed>())
}

/// Returns an [AssertionFailed] error from the enclosing function
/// if the condition is false.
///
/// The enclosing function must return `Result<_, E>` where `E: From<AssertionFailed>`,
/// which includes `anyhow::Result`.
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            return ::std::result::Result::Err(
                $crate::AssertionFailed::new(::std::concat!(
                    "check failed: ",
                    ::std::stringify!($cond)
                ))
                .into(),
            );
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return ::std::result::Result::Err(
                $crate::AssertionFailed::new(::std::format!($($arg)+)).into(),
            );
        }
    };
}

/// Returns an [AssertionFailed] error from the enclosing function
/// if the two values are not equal.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    return ::std::result::Result::Err(
                        $crate::AssertionFailed::new(::std::format!(
                            "expected `{}` to be {:?}, found {:?}",
                            ::std::stringify!($left),
                            right,
                            left,
                        ))
                        .into(),
                    );
                }
            }
        }
    };
}
