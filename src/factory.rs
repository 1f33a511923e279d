//! Turning a plain function into a promise factory.
//!
//! [`promise`] wraps a function so that calling it hands back a [`Promise`]
//! instead of running it. The wrapper has two entry points: [`PromiseFn::call`]
//! defers, [`PromiseFn::call_sync`] runs immediately. Chains always use the
//! synchronous one when a wrapper is passed as a handler, so a wrapped function
//! inside a running chain executes in-line rather than spawning a nested
//! promise.
use crate::call::{Args, DeferredCall, Target};
use crate::chain::{IntoMatchHandler, IntoOtherwise, MatchHandler, OtherwiseHandler};
use crate::{Error, Promise, Value};
use std::fmt::Debug;
use std::sync::Arc;

/// Options recognised by [`promise_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromiseConfig {
    /// Log every lifecycle transition (creation, start, match, mismatch, join).
    pub verbose: bool,
}

impl PromiseConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// A promise-wrapped function.
///
/// # Examples
///
/// ```
/// use promise_chain::{promise, Args, Error, Value};
///
/// fn add_three(value: Value) -> Result<Value, Error> {
///     Ok(Value::from(i64::try_from(value)? + 3))
/// }
///
/// let wait_one = promise(|args: &Args| Ok(args.require(0)?.clone()));
/// let outcome = wait_one
///     .call(Args::one(5))
///     .on(5, add_three)
///     .on(8, add_three)
///     .wait();
/// assert_eq!(outcome.value(), Some(&Value::Int(11)));
/// ```
#[derive(Clone)]
pub struct PromiseFn {
    target: Target,
    label: Arc<str>,
    config: PromiseConfig,
}

/// Wraps `f` with the default configuration.
pub fn promise<F>(f: F) -> PromiseFn
where
    F: Fn(&Args) -> Result<Value, Error> + Send + Sync + 'static,
{
    promise_with(PromiseConfig::default(), f)
}

pub fn promise_with<F>(config: PromiseConfig, f: F) -> PromiseFn
where
    F: Fn(&Args) -> Result<Value, Error> + Send + Sync + 'static,
{
    PromiseFn {
        target: Arc::new(f),
        label: std::any::type_name::<F>().into(),
        config,
    }
}

impl PromiseFn {
    /// Replaces the label used in log output, which defaults to the wrapped
    /// function's type name.
    pub fn named(mut self, label: impl AsRef<str>) -> Self {
        self.label = label.as_ref().into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> PromiseConfig {
        self.config
    }

    /// Packages the call as a promise. Nothing runs until the promise is
    /// started with `go` or `wait`.
    pub fn call(&self, args: impl Into<Args>) -> Promise {
        let args = args.into();
        if self.config.verbose {
            tracing::info!(promise = %self.label, ?args, "promise created");
        }
        Promise::new(
            self.label.clone(),
            self.config,
            DeferredCall::new(self.target.clone(), args),
        )
    }

    /// Runs the wrapped function right away on the calling thread.
    pub fn call_sync(&self, args: impl Into<Args>) -> Result<Value, Error> {
        (self.target)(&args.into())
    }
}

impl Debug for PromiseFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseFn")
            .field("label", &self.label)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IntoMatchHandler for PromiseFn {
    fn into_match_handler(self) -> MatchHandler {
        Arc::new(move |result: Value| self.call_sync(Args::one(result)))
    }
}

impl IntoOtherwise for PromiseFn {
    fn into_otherwise(self) -> OtherwiseHandler {
        Arc::new(move |result: Value, expected: Value| {
            self.call_sync(Args::new().arg(result).arg(expected))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{promise, promise_with, PromiseConfig};
    use crate::chain::{IntoMatchHandler, IntoOtherwise};
    use crate::{Args, Error, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_call_defers_execution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let wrapped = promise(move |_: &Args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Unit)
        });
        let mut pending = wrapped.call(Args::new());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!pending.is_started());
        assert!(pending.wait().is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_sync_returns_plain_value() {
        let double = promise(|args: &Args| {
            Ok(Value::from(i64::try_from(args.require(0)?.clone())? * 2))
        });
        assert_eq!(double.call_sync(Args::one(4)), Ok(Value::Int(8)));
    }

    #[test]
    fn test_wrapper_as_handler_runs_synchronously() {
        let echo = promise(|args: &Args| Ok(args.require(0)?.clone()));
        let handler = echo.clone().into_match_handler();
        assert_eq!(handler(Value::from(3)), Ok(Value::Int(3)));
        let otherwise = echo.into_otherwise();
        // only the first positional argument is echoed
        assert_eq!(otherwise(Value::from(8), Value::from(9)), Ok(Value::Int(8)));
    }

    #[test]
    fn test_config_and_label() {
        let config = PromiseConfig::default().verbose(true);
        assert!(config.verbose);
        let wrapped = promise_with(config, |_: &Args| Ok(Value::Unit)).named("noop");
        assert_eq!(wrapped.label(), "noop");
        assert_eq!(wrapped.config(), config);
        assert!(!PromiseConfig::default().verbose);
    }

    #[test]
    fn test_wrapped_errors_pass_through() {
        let broken = promise(|_: &Args| Err(Error::handler("nope")));
        assert_eq!(broken.call_sync(Args::new()), Err(Error::Handler("nope".into())));
    }
}
