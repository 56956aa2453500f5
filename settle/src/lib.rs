//! Retry-until-settled assertions for desktop UI tests.
//!
//! A freshly shown control is often not measured, arranged or rendered yet
//! when a test inspects it. [Evaluator] shows content through a [WindowHost],
//! looks up the control under test once, and then runs an assertion against it
//! following a fixed [BackoffSchedule]. Only [AssertionFailed] errors are
//! retried. Anything else is treated as a defect in the test and fails at once.
//!
//! ```ignore
//! let mut evaluator = Evaluator::new(&mut host);
//! evaluator.initialize(content)?;
//! evaluator.find(|| host_view.find_button("ok"))?;
//! evaluator.evaluate(|button| {
//!     settle::check!(button.is_focused(), "button is not focused");
//!     Ok(())
//! })?;
//! evaluator.wait_for_completion()?;
//! ```

mod assertion;
mod completion;
mod error;
mod evaluator;
mod host;
mod policy;

pub use crate::{
    assertion::{is_assertion_failure, AssertionFailed},
    completion::{Completion, Failure, FailureKind, Outcome},
    error::{Error, Result},
    evaluator::{Evaluator, State},
    host::WindowHost,
    policy::{BackoffSchedule, RetryEvent, RetryPolicy},
};
