//! The entry point of a promise: a function packaged with the arguments it
//! will eventually be called with.
use crate::{Error, Value};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Function type every promise-wrapped function is stored as.
pub type Target = Arc<dyn Fn(&Args) -> Result<Value, Error> + Send + Sync>;

/// Positional and keyword arguments for a deferred call.
///
/// # Examples
///
/// ```
/// use promise_chain::{Args, Value};
/// let args = Args::new().arg(3).kwarg("delay", 0);
/// assert_eq!(args.get(0), Some(&Value::Int(3)));
/// assert_eq!(args.kwarg_value("delay"), Some(&Value::Int(0)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single positional argument, which is how chain handlers are fed.
    pub fn one(value: impl Into<Value>) -> Self {
        Self::new().arg(value)
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn kwarg_value(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    /// Positional argument `index`, or a handler error naming what is missing.
    pub fn require(&self, index: usize) -> Result<&Value, Error> {
        self.get(index)
            .ok_or_else(|| Error::handler(format!("missing positional argument {index}")))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for Args {
    fn from(value: Value) -> Self {
        Args::one(value)
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Args {
            positional,
            keyword: BTreeMap::new(),
        }
    }
}

/// A function plus its arguments, not yet executed. Never mutated once
/// built; the promise owning it calls it exactly once.
#[derive(Clone)]
pub struct DeferredCall {
    target: Target,
    args: Args,
}

impl DeferredCall {
    pub fn new(target: Target, args: Args) -> Self {
        Self { target, args }
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn invoke(&self) -> Result<Value, Error> {
        (self.target)(&self.args)
    }
}

impl Debug for DeferredCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredCall")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
