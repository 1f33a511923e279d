//! The promise itself: a deferred entry call plus its chain, run once on a
//! dedicated thread.
use crate::channel::{Consumer, Producer};
use crate::chain::{evaluate, ChainLink, IntoMatchHandler, IntoOtherwise, Outcome, Trace};
use crate::{call::DeferredCall, Error, PromiseConfig, Value};
use std::fmt::Debug;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A future execution of a promise-wrapped function.
///
/// Links are appended with [`on`](Self::on) / [`on_else`](Self::on_else) while
/// the promise is being built. [`go`](Self::go) seals the chain and starts the
/// worker thread; [`wait`](Self::wait) starts it if needed and blocks for the
/// terminal [`Outcome`].
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
/// fn fail(result: Value, expected: Value) -> Result<Value, Error> {
///     Ok(Value::from((result, expected)))
/// }
///
/// let wait_one = promise(|args: &Args| Ok(args.require(0)?.clone()));
/// let mut pending = wait_one
///     .call(Args::one(5))
///     .on_else(5, add_three, fail)
///     .on_else(9, add_three, fail);
/// pending.go();
/// assert_eq!(pending.wait().value(), Some(&Value::from((8, 9))));
/// ```
pub struct Promise {
    label: Arc<str>,
    config: PromiseConfig,
    links: usize,
    state: State,
}

enum State {
    Building {
        entry: DeferredCall,
        chain: Vec<ChainLink>,
    },
    Running {
        worker: JoinHandle<()>,
        results: Consumer<Outcome>,
    },
    Settled(Outcome),
    // Placeholder while a transition owns the previous state.
    Sealing,
}

impl Promise {
    pub(crate) fn new(label: Arc<str>, config: PromiseConfig, entry: DeferredCall) -> Self {
        Self {
            label,
            config,
            links: 0,
            state: State::Building {
                entry,
                chain: Vec::new(),
            },
        }
    }

    /// Appends a link with no `otherwise`: a mismatch settles the promise with
    /// `Error::Mismatch`.
    pub fn on(self, expected: impl Into<Value>, on_match: impl IntoMatchHandler) -> Self {
        self.push(ChainLink::new(
            expected.into(),
            on_match.into_match_handler(),
            None,
        ))
    }

    pub fn on_else(
        self,
        expected: impl Into<Value>,
        on_match: impl IntoMatchHandler,
        otherwise: impl IntoOtherwise,
    ) -> Self {
        self.push(ChainLink::new(
            expected.into(),
            on_match.into_match_handler(),
            Some(otherwise.into_otherwise()),
        ))
    }

    fn push(mut self, link: ChainLink) -> Self {
        if let Err(err) = self.try_push(link) {
            tracing::warn!(promise = %self.label, error = %err, "chain link discarded");
        }
        self
    }

    /// Appends a link, or fails with `Error::Sealed` once the promise has
    /// started. `on` and `on_else` log and drop the link in that case.
    pub fn try_push(&mut self, link: ChainLink) -> Result<&mut Self, Error> {
        match &mut self.state {
            State::Building { chain, .. } => {
                chain.push(link);
                self.links += 1;
                Ok(self)
            }
            _ => Err(Error::Sealed),
        }
    }

    /// Seals the chain and starts it on its own thread. Does nothing if the
    /// promise has already started.
    pub fn go(&mut self) -> &mut Self {
        let (entry, chain) = match std::mem::replace(&mut self.state, State::Sealing) {
            State::Building { entry, chain } => (entry, chain),
            other => {
                self.state = other;
                return self;
            }
        };
        let verbose = self.config.verbose;
        if verbose {
            tracing::info!(promise = %self.label, links = chain.len(), "starting promise");
        }

        let (producer, results) = Producer::new();
        let label = self.label.clone();
        let spawned = thread::Builder::new()
            .name(format!("promise {}", label.replace('\0', "")))
            .spawn(move || {
                let trace = Trace {
                    label: &label,
                    verbose,
                };
                let outcome = evaluate(&entry, &chain, &trace);
                if !producer.resolve(outcome) {
                    tracing::debug!(promise = %label, "promise dropped before its result arrived");
                }
            });

        self.state = match spawned {
            Ok(worker) => State::Running { worker, results },
            Err(err) => {
                tracing::warn!(promise = %self.label, error = %err, "failed to start promise");
                State::Settled(Outcome::Fault(Error::Spawn(err.to_string())))
            }
        };
        self
    }

    /// Starts the promise if needed and blocks until it settles. The outcome
    /// is kept, so later calls return it again without blocking.
    pub fn wait(&mut self) -> Outcome {
        self.go();
        let outcome = match std::mem::replace(&mut self.state, State::Sealing) {
            State::Running { worker, results } => {
                let outcome = results.recv().unwrap_or_else(Outcome::Fault);
                self.join(worker, outcome)
            }
            State::Settled(outcome) => outcome,
            // `go` has already moved the promise past these.
            State::Building { .. } | State::Sealing => Outcome::Fault(Error::ProducerDropped),
        };
        self.state = State::Settled(outcome.clone());
        outcome
    }

    /// Non-blocking: the outcome if the promise has settled, `None` if it is
    /// still running or was never started.
    pub fn try_wait(&mut self) -> Option<Outcome> {
        let outcome = match std::mem::replace(&mut self.state, State::Sealing) {
            State::Running { worker, results } => match results.try_recv() {
                Ok(Some(outcome)) => self.join(worker, outcome),
                Ok(None) => {
                    self.state = State::Running { worker, results };
                    return None;
                }
                Err(err) => self.join(worker, Outcome::Fault(err)),
            },
            State::Settled(outcome) => outcome,
            other => {
                self.state = other;
                return None;
            }
        };
        self.state = State::Settled(outcome.clone());
        Some(outcome)
    }

    fn join(&self, worker: JoinHandle<()>, outcome: Outcome) -> Outcome {
        if worker.join().is_err() {
            tracing::warn!(promise = %self.label, "promise thread panicked after publishing");
        }
        if self.config.verbose {
            tracing::info!(
                promise = %self.label,
                success = outcome.is_success(),
                "promise joined"
            );
        }
        outcome
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of links appended so far.
    pub fn links(&self) -> usize {
        self.links
    }

    pub fn is_started(&self) -> bool {
        !matches!(self.state, State::Building { .. })
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, State::Settled(_))
    }
}

impl Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Building { .. } => "building",
            State::Running { .. } => "running",
            State::Settled(_) => "settled",
            State::Sealing => "sealing",
        };
        f.debug_struct("Promise")
            .field("label", &self.label)
            .field("links", &self.links)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::chain::{ChainLink, IntoMatchHandler};
    use crate::{promise, Args, Error, Outcome, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::Duration;

    fn add_three(value: Value) -> Result<Value, Error> {
        Ok(Value::from(i64::try_from(value)? + 3))
    }

    #[test]
    fn test_go_twice_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counted = promise(move |args: &Args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(args.require(0)?.clone())
        });
        let mut pending = counted.call(Args::one(1));
        pending.go();
        pending.go();
        assert_eq!(pending.wait(), Outcome::Success(Value::Int(1)));
        pending.go();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_is_repeatable() {
        let echo = promise(|args: &Args| Ok(args.require(0)?.clone()));
        let mut pending = echo.call(Args::one(5)).on(5, add_three);
        assert_eq!(pending.wait(), Outcome::Success(Value::Int(8)));
        assert!(pending.is_settled());
        assert_eq!(pending.wait(), Outcome::Success(Value::Int(8)));
    }

    #[test]
    fn test_links_after_go_are_rejected() {
        let echo = promise(|args: &Args| Ok(args.require(0)?.clone()));
        let mut pending = echo.call(Args::one(5)).on(5, add_three);
        pending.go();
        let link = ChainLink::new(Value::from(8), add_three.into_match_handler(), None);
        assert_eq!(pending.try_push(link).unwrap_err(), Error::Sealed);
        let mut pending = pending.on(8, add_three);
        assert_eq!(pending.links(), 1);
        assert_eq!(pending.wait(), Outcome::Success(Value::Int(8)));
    }

    #[test]
    fn test_go_does_not_block() {
        let (release, gate) = mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let blocked = promise(move |_: &Args| {
            gate.lock()
                .map_err(|_| Error::handler("gate poisoned"))?
                .recv()
                .map_err(Error::handler)?;
            Ok(Value::from("released"))
        });
        let mut pending = blocked.call(Args::new());
        pending.go();
        assert!(pending.is_started());
        assert_eq!(pending.try_wait(), None);
        release.send(()).unwrap();
        assert_eq!(pending.wait(), Outcome::Success(Value::from("released")));
        assert_eq!(pending.try_wait(), Some(Outcome::Success(Value::from("released"))));
    }

    #[test]
    fn test_try_wait_before_start() {
        let echo = promise(|_: &Args| Ok(Value::Unit));
        let mut pending = echo.call(Args::new());
        assert_eq!(pending.try_wait(), None);
        assert!(!pending.is_started());
        pending.go();
        let mut waited = Duration::ZERO;
        while pending.try_wait().is_none() && waited < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }
        assert!(pending.is_settled());
    }

    #[test]
    fn test_debug_shows_state() {
        let echo = promise(|_: &Args| Ok(Value::Unit)).named("echo");
        let mut pending = echo.call(Args::new());
        assert_eq!(pending.label(), "echo");
        assert!(format!("{pending:?}").contains("building"));
        pending.wait();
        assert!(format!("{pending:?}").contains("settled"));
    }
}
