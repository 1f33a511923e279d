//! Deferred promise chains.
//!
//! Wrap a function with [`promise`] and calling it returns a [`Promise`]
//! instead of running it. Attach conditional links with [`Promise::on`] and
//! [`Promise::on_else`], then start the chain with [`Promise::go`] or block on
//! it with [`Promise::wait`]. Each promise runs on its own thread and settles
//! exactly once, to an [`Outcome`].
//!
//! ```
//! use promise_chain::{promise, Args, Error, Outcome, Value};
//!
//! fn add_three(value: Value) -> Result<Value, Error> {
//!     Ok(Value::from(i64::try_from(value)? + 3))
//! }
//!
//! let wait_one = promise(|args: &Args| Ok(args.require(0)?.clone()));
//! let outcome = wait_one.call(Args::one(5)).on(5, add_three).on(9, add_three).wait();
//! assert_eq!(
//!     outcome,
//!     Outcome::Fault(Error::Mismatch { result: Value::Int(8), expected: Value::Int(9) })
//! );
//! ```
use thiserror::Error;

pub mod call;
pub mod chain;
pub mod channel;
pub mod factory;
pub mod promise;
pub mod value;

pub use call::Args;
pub use chain::Outcome;
pub use factory::{promise, promise_with, PromiseConfig, PromiseFn};
pub use promise::Promise;
pub use value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("result({result}) is not expected({expected})")]
    Mismatch { result: Value, expected: Value },
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error("cannot convert {value} to {target}")]
    Conversion { value: Value, target: &'static str },
    #[error("chain is sealed once the promise has started")]
    Sealed,
    #[error("could not spawn promise thread: {0}")]
    Spawn(String),
    #[error("producer dropped without a result")]
    ProducerDropped,
}

impl Error {
    /// Shorthand for handlers reporting their own failures.
    pub fn handler(msg: impl std::fmt::Display) -> Self {
        Error::Handler(msg.to_string())
    }
}
