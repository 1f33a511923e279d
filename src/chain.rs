//! Chain links and the procedure that runs them.
//!
//! A chain is evaluated once, on the promise's worker thread:
//!
//! ```text
//! Invoking(entry) -> Evaluating(0) -> Evaluating(1) -> ... -> Terminal
//!                          |               |
//!                          +-- mismatch or fault --------------> Terminal
//! ```
//!
//! Each link compares the current result with its `expected` value. On a match
//! `on_match` produces the next result; on a mismatch `otherwise` produces the
//! final one and the chain stops. A handler that fails or panics stops the
//! chain as well, and its error becomes the terminal [`Outcome`].
use crate::{call::DeferredCall, Error, Value};
use std::any::Any;
use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub type MatchHandler = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;
pub type OtherwiseHandler = Arc<dyn Fn(Value, Value) -> Result<Value, Error> + Send + Sync>;

/// Anything usable as a link's `on_match`: a closure or fn taking the prior
/// result, or a promise-wrapped function, which then runs synchronously.
pub trait IntoMatchHandler {
    fn into_match_handler(self) -> MatchHandler;
}

/// Anything usable as a link's `otherwise`: called with `(result, expected)`.
pub trait IntoOtherwise {
    fn into_otherwise(self) -> OtherwiseHandler;
}

impl<F> IntoMatchHandler for F
where
    F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
{
    fn into_match_handler(self) -> MatchHandler {
        Arc::new(self)
    }
}

impl<F> IntoOtherwise for F
where
    F: Fn(Value, Value) -> Result<Value, Error> + Send + Sync + 'static,
{
    fn into_otherwise(self) -> OtherwiseHandler {
        Arc::new(self)
    }
}

/// The handler an unset `otherwise` falls back to.
pub fn raise_mismatch(result: Value, expected: Value) -> Result<Value, Error> {
    Err(Error::Mismatch { result, expected })
}

#[derive(Clone)]
pub struct ChainLink {
    expected: Value,
    on_match: MatchHandler,
    otherwise: Option<OtherwiseHandler>,
}

impl ChainLink {
    pub fn new(
        expected: Value,
        on_match: MatchHandler,
        otherwise: Option<OtherwiseHandler>,
    ) -> Self {
        Self {
            expected,
            on_match,
            otherwise,
        }
    }

    pub fn expected(&self) -> &Value {
        &self.expected
    }

    pub fn has_otherwise(&self) -> bool {
        self.otherwise.is_some()
    }

    fn otherwise(&self) -> OtherwiseHandler {
        self.otherwise
            .clone()
            .unwrap_or_else(|| Arc::new(raise_mismatch))
    }
}

impl Debug for ChainLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainLink")
            .field("expected", &self.expected)
            .field("otherwise", &self.otherwise.is_some())
            .finish_non_exhaustive()
    }
}

/// The single terminal result of a promise.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Fault(Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Outcome::Fault(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Fault(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Error> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Fault(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<Value, Error> {
        self.into()
    }
}

impl From<Outcome> for Result<Value, Error> {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Fault(err) => Err(err),
        }
    }
}

/// Logging context for one evaluation.
pub(crate) struct Trace<'a> {
    pub label: &'a str,
    pub verbose: bool,
}

impl Trace<'_> {
    fn matched(&self, index: usize, result: &Value) {
        if self.verbose {
            tracing::info!(promise = %self.label, link = index, %result, "link matched");
        }
    }

    fn mismatched(&self, index: usize, result: &Value, expected: &Value) {
        if self.verbose {
            tracing::warn!(
                promise = %self.label,
                link = index,
                %result,
                %expected,
                "result is not the expected value"
            );
        }
    }

    fn fault(&self, at: &str, err: Error) -> Outcome {
        tracing::warn!(promise = %self.label, at, error = %err, "promise chain faulted");
        Outcome::Fault(err)
    }
}

enum Step {
    Invoking,
    Evaluating { index: usize, current: Value },
    Terminal(Outcome),
}

/// Runs `f`, turning a panic into `Error::Panicked`.
fn guarded(f: impl FnOnce() -> Result<Value, Error>) -> Result<Value, Error> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

pub(crate) fn evaluate(entry: &DeferredCall, links: &[ChainLink], trace: &Trace<'_>) -> Outcome {
    let mut step = Step::Invoking;
    loop {
        step = match step {
            Step::Invoking => match guarded(|| entry.invoke()) {
                Ok(current) => Step::Evaluating { index: 0, current },
                Err(err) => Step::Terminal(trace.fault("entry", err)),
            },
            Step::Evaluating { index, current } => {
                let Some(link) = links.get(index) else {
                    return Outcome::Success(current);
                };
                if current == link.expected {
                    trace.matched(index, &current);
                    match guarded(|| (link.on_match)(current)) {
                        Ok(next) => Step::Evaluating {
                            index: index + 1,
                            current: next,
                        },
                        Err(err) => Step::Terminal(trace.fault(&format!("link {index}"), err)),
                    }
                } else {
                    trace.mismatched(index, &current, &link.expected);
                    let otherwise = link.otherwise();
                    match guarded(|| otherwise(current, link.expected.clone())) {
                        Ok(value) => Step::Terminal(Outcome::Success(value)),
                        Err(err) => Step::Terminal(trace.fault(&format!("link {index}"), err)),
                    }
                }
            }
            Step::Terminal(outcome) => return outcome,
        };
    }
}
