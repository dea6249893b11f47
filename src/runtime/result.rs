use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::parser::Node;
use crate::runtime::Value;

/// A runtime error carrying the node it originated from
#[derive(Clone)]
pub struct EvalError {
    /// Node the error was raised for, when known
    pub source: Option<Rc<Node>>,
    /// The underlying error
    pub error: Error,
}

impl EvalError {
    /// Creates an error with no source node
    pub fn new(error: Error) -> Self {
        EvalError {
            source: None,
            error,
        }
    }

    /// Creates an error attributed to a node
    pub fn at(node: &Rc<Node>, error: Error) -> Self {
        EvalError {
            source: Some(node.clone()),
            error,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Operator-sourced errors are prefixed with the operator's id
        if let Some(id) = self.source.as_ref().and_then(|n| n.id()) {
            write!(f, "{}: {}", id, self.error)
        } else {
            write!(f, "{}", self.error)
        }
    }
}

impl fmt::Debug for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A deferred continuation: nodes to evaluate next plus the callback that
/// receives their results. Never surfaced to a host.
pub struct PushRequest {
    /// Nodes to evaluate, left to right
    pub nodes: Vec<Rc<Node>>,
    /// Receives the nodes' accumulated results
    pub on_complete: Box<dyn FnOnce(ChildResults) -> EvalResult>,
}

/// The outcome of evaluating a node
pub enum EvalResult {
    /// Zero or more emitted values, optionally keyed
    Value {
        /// Key the values are emitted under
        key: Option<String>,
        /// Emitted values; empty means success without emission
        values: Vec<Value>,
    },
    /// Evaluation failed
    Error(EvalError),
    /// Evaluation suspended pending an external completion
    Async(AsyncProxy),
    /// Internal continuation
    Push(PushRequest),
}

impl EvalResult {
    /// Success without emission
    pub fn none() -> Self {
        EvalResult::Value {
            key: None,
            values: Vec::new(),
        }
    }

    /// Emits a single unkeyed value
    pub fn emit(value: Value) -> Self {
        EvalResult::Value {
            key: None,
            values: vec![value],
        }
    }

    /// Emits several unkeyed values
    pub fn emit_all(values: Vec<Value>) -> Self {
        EvalResult::Value {
            key: None,
            values,
        }
    }

    /// Emits a single value under a key
    pub fn emit_keyed(key: impl Into<String>, value: Value) -> Self {
        EvalResult::Value {
            key: Some(key.into()),
            values: vec![value],
        }
    }

    /// Wraps an error with no source node
    pub fn error(error: Error) -> Self {
        EvalResult::Error(EvalError::new(error))
    }

    /// Wraps an error attributed to a node
    pub fn error_at(node: &Rc<Node>, error: Error) -> Self {
        EvalResult::Error(EvalError::at(node, error))
    }

    /// Creates a continuation
    pub fn push(
        nodes: Vec<Rc<Node>>,
        on_complete: impl FnOnce(ChildResults) -> EvalResult + 'static,
    ) -> Self {
        EvalResult::Push(PushRequest {
            nodes,
            on_complete: Box::new(on_complete),
        })
    }

    /// True for a Value result with at least one emission
    pub fn is_emit(&self) -> bool {
        matches!(self, EvalResult::Value { values, .. } if !values.is_empty())
    }
}

impl fmt::Debug for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalResult::Value { key, values } => f
                .debug_struct("Value")
                .field("key", key)
                .field("values", values)
                .finish(),
            EvalResult::Error(e) => write!(f, "Error({})", e),
            EvalResult::Async(_) => write!(f, "Async"),
            EvalResult::Push(p) => write!(f, "Push({} nodes)", p.nodes.len()),
        }
    }
}

struct ProxyInner {
    completed: bool,
    callback: Option<Box<dyn FnOnce(EvalResult)>>,
    pending: Option<EvalResult>,
}

/// One-shot completion port bridging operator suspensions to the driver
///
/// The first completion stores the result and invokes the registered
/// callback; subsequent completions are ignored. Completion callbacks run on
/// the evaluator's thread.
#[derive(Clone)]
pub struct AsyncProxy {
    inner: Rc<RefCell<ProxyInner>>,
}

impl AsyncProxy {
    /// Creates an uncompleted proxy
    pub fn new() -> Self {
        AsyncProxy {
            inner: Rc::new(RefCell::new(ProxyInner {
                completed: false,
                callback: None,
                pending: None,
            })),
        }
    }

    /// Completes the proxy; a second completion is ignored
    pub fn complete(&self, result: EvalResult) {
        let callback = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed {
                return;
            }
            inner.completed = true;
            match inner.callback.take() {
                Some(cb) => Some((cb, result)),
                None => {
                    inner.pending = Some(result);
                    None
                }
            }
        };
        if let Some((cb, result)) = callback {
            cb(result);
        }
    }

    /// Registers the completion callback; fires immediately when the proxy
    /// already completed. Only the first registration is honoured.
    pub fn on_completed(&self, callback: impl FnOnce(EvalResult) + 'static) {
        let ready = {
            let mut inner = self.inner.borrow_mut();
            if inner.callback.is_some() {
                return;
            }
            match inner.pending.take() {
                Some(result) => Some(result),
                None => {
                    inner.callback = Some(Box::new(callback));
                    return;
                }
            }
        };
        if let Some(result) = ready {
            callback(result);
        }
    }

    /// True once the proxy has been completed
    pub fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }
}

impl Default for AsyncProxy {
    fn default() -> Self {
        AsyncProxy::new()
    }
}

/// Child results accumulated by a frame: ordered values, a key index, and a
/// separate index of unkeyed positions so operators can pick out positional
/// arguments while ignoring keyed options
#[derive(Default)]
pub struct ChildResults {
    values: Vec<Value>,
    keys: Vec<Option<String>>,
    keyed: HashMap<String, usize>,
    unkeyed: Vec<usize>,
    error: Option<EvalError>,
}

impl ChildResults {
    /// Creates an empty collection
    pub fn new() -> Self {
        ChildResults::default()
    }

    /// Builds a collection from positional values (host call paths)
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut results = ChildResults::new();
        for value in values {
            results.accept(None, value);
        }
        results
    }

    /// Appends one emitted value under an optional key
    pub fn accept(&mut self, key: Option<&str>, value: Value) {
        let index = self.values.len();
        match key {
            Some(k) => {
                self.keyed.insert(k.to_string(), index);
            }
            None => self.unkeyed.push(index),
        }
        self.keys.push(key.map(str::to_string));
        self.values.push(value);
    }

    /// Iterates `(key, value)` pairs in emission order
    pub fn entries(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.keys
            .iter()
            .map(Option::as_deref)
            .zip(self.values.iter())
    }

    /// True when at least one value was emitted under a key
    pub fn has_keyed(&self) -> bool {
        !self.keyed.is_empty()
    }

    /// Records a child error; remaining siblings are skipped by the driver
    pub fn set_error(&mut self, error: EvalError) {
        self.error = Some(error);
    }

    /// The recorded child error, if any
    pub fn error(&self) -> Option<&EvalError> {
        self.error.as_ref()
    }

    /// All values in emission order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the collection, returning all values in order
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Total number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of unkeyed values
    pub fn unkeyed_len(&self) -> usize {
        self.unkeyed.len()
    }

    /// Unkeyed value at the given position
    pub fn unkeyed(&self, position: usize) -> Option<&Value> {
        self.unkeyed.get(position).map(|&i| &self.values[i])
    }

    /// The unkeyed values in order
    pub fn unkeyed_values(&self) -> Vec<Value> {
        self.unkeyed.iter().map(|&i| self.values[i].clone()).collect()
    }

    /// Latest value emitted under the given key
    pub fn keyed(&self, key: &str) -> Option<&Value> {
        self.keyed.get(key).map(|&i| &self.values[i])
    }

    /// Unkeyed int at a position, with a positional type error otherwise
    pub fn int_at(&self, position: usize) -> Result<i32> {
        match self.unkeyed(position) {
            Some(Value::Int(n)) => Ok(*n),
            Some(other) => Err(Error::TypeMismatch {
                index: position,
                expected: "int".to_string(),
                got: other.type_name().to_string(),
            }),
            None => Err(Error::missing_argument(position, "int")),
        }
    }

    /// Unkeyed string at a position, with a positional type error otherwise
    pub fn str_at(&self, position: usize) -> Result<&str> {
        match self.unkeyed(position) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(Error::TypeMismatch {
                index: position,
                expected: "string".to_string(),
                got: other.type_name().to_string(),
            }),
            None => Err(Error::missing_argument(position, "string")),
        }
    }

    /// Unkeyed value at a position, erroring when missing
    pub fn value_at(&self, position: usize, expected: &str) -> Result<&Value> {
        self.unkeyed(position)
            .ok_or_else(|| Error::missing_argument(position, expected))
    }

    /// Keyed bool option; `None` when the key is absent
    pub fn keyed_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.keyed(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(Error::TypeMismatch {
                index: 0,
                expected: format!("bool for option {}", key),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Keyed string option; `None` when the key is absent
    pub fn keyed_str(&self, key: &str) -> Result<Option<&str>> {
        match self.keyed(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::TypeMismatch {
                index: 0,
                expected: format!("string for option {}", key),
                got: other.type_name().to_string(),
            }),
        }
    }
}

impl fmt::Debug for ChildResults {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChildResults")
            .field("values", &self.values)
            .field("unkeyed", &self.unkeyed)
            .finish()
    }
}
