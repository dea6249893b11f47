use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lexer::Scanner;
use crate::ops::{OperatorHandler, OperatorRegistry, Services, SpecialOperatorHandler};
use crate::parser::{AstBuilder, Node};
use crate::runtime::machine::Machine;
use crate::runtime::{
    EvalError, EvalResult, Lambda, Scope, ScopeRef, Timer, TokioTimer, Value,
};

/// The host-facing evaluation engine
///
/// One interpreter retains the operator registry and a root scope for
/// globals. Construction order is: builtins (on `new`), host-registered
/// operators, then the first `eval`; registration after a suspended
/// evaluation has taken hold of the registry is rejected.
///
/// The interpreter is single-threaded cooperative: every node evaluation,
/// scope lookup and proxy completion callback runs on the thread driving it.
pub struct Interpreter {
    registry: Rc<OperatorRegistry>,
    globals: ScopeRef,
    timer: Rc<dyn Timer>,
}

impl Interpreter {
    /// Creates an interpreter with the builtin operators and the tokio
    /// clock (see [`TokioTimer`] for its runtime requirements)
    pub fn new() -> Self {
        Interpreter {
            registry: Rc::new(OperatorRegistry::new()),
            globals: Scope::root(),
            timer: Rc::new(TokioTimer),
        }
    }

    /// Creates an interpreter with a host-supplied clock
    pub fn with_timer(timer: Rc<dyn Timer>) -> Self {
        Interpreter {
            registry: Rc::new(OperatorRegistry::new()),
            globals: Scope::root(),
            timer,
        }
    }

    /// Registers or overrides a host standard operator
    ///
    /// Fails for reserved `LOSP:` names, for special-operator names, and
    /// once evaluation state still holds the registry.
    pub fn register_operator<T: OperatorHandler + 'static>(&mut self, handler: T) -> Result<()> {
        self.registry_mut()?.register_operator(handler)
    }

    /// Registers a host special operator (`$`-prefixed, two characters
    /// minimum)
    pub fn register_special_operator<T: SpecialOperatorHandler + 'static>(
        &mut self,
        handler: T,
    ) -> Result<()> {
        self.registry_mut()?.register_special_operator(handler)
    }

    fn registry_mut(&mut self) -> Result<&mut OperatorRegistry> {
        Rc::get_mut(&mut self.registry).ok_or_else(|| Error::Registration {
            name: String::new(),
            reason: "registration must occur before evaluation".to_string(),
        })
    }

    /// The operator registry, for lookups
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Defines a process-wide binding visible when no local shadows it
    pub fn set_global(&self, name: impl Into<String>, value: Value) {
        Scope::define(&self.globals, name, value);
    }

    /// Reads a global binding
    pub fn try_get_global(&self, name: &str) -> Option<Value> {
        Scope::lookup(&self.globals, name)
    }

    /// Parses source text into an AST
    pub fn parse(&self, source: &str) -> Result<Rc<Node>> {
        let mut scanner = Scanner::with_special_operators(
            source,
            self.registry.special_names().map(str::to_string),
        );
        let tokens = scanner.scan_tokens()?;
        AstBuilder::new(source, tokens, &self.registry).build()
    }

    /// Evaluates a parsed node against the interpreter's globals
    ///
    /// Returns `Value`, `Error`, or `Async` when an operator suspended; the
    /// async proxy completes with the terminal result.
    pub fn eval(&self, node: &Rc<Node>) -> EvalResult {
        let machine = Machine::new(self.registry.clone(), self.services());
        Machine::eval(machine, node, &self.globals)
    }

    /// Parses and evaluates source text; parse failures come back as an
    /// `Error` result with no source node
    pub fn eval_source(&self, source: &str) -> EvalResult {
        match self.parse(source) {
            Ok(node) => self.eval(&node),
            Err(error) => EvalResult::Error(EvalError::new(error)),
        }
    }

    /// Evaluates a node, resolving any suspension on the tokio clock
    ///
    /// Must run inside a `tokio::task::LocalSet` on a current-thread
    /// runtime when the default timer is in use.
    pub async fn eval_async(&self, node: &Rc<Node>) -> EvalResult {
        Self::resolve(self.eval(node)).await
    }

    /// Parses and evaluates source text asynchronously
    pub async fn eval_source_async(&self, source: &str) -> EvalResult {
        Self::resolve(self.eval_source(source)).await
    }

    /// Calls a lambda value with positional arguments
    pub fn call(&self, lambda: &Rc<Lambda>, args: Vec<Value>) -> EvalResult {
        let machine = Machine::new(self.registry.clone(), self.services());
        Machine::call(machine, lambda, args, &self.globals)
    }

    /// Calls a lambda value, resolving any suspension
    pub async fn call_async(&self, lambda: &Rc<Lambda>, args: Vec<Value>) -> EvalResult {
        Self::resolve(self.call(lambda, args)).await
    }

    fn services(&self) -> Services {
        Services {
            timer: self.timer.clone(),
        }
    }

    /// Awaits an `Async` result's completion; other results pass through
    async fn resolve(result: EvalResult) -> EvalResult {
        match result {
            EvalResult::Async(proxy) => {
                let (tx, rx) = tokio::sync::oneshot::channel();
                proxy.on_completed(move |terminal| {
                    let _ = tx.send(terminal);
                });
                match rx.await {
                    Ok(terminal) => terminal,
                    Err(_) => EvalResult::error(Error::internal(
                        "async completion dropped without a result",
                    )),
                }
            }
            other => other,
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
