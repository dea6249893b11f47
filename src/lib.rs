//! # Losp — an embeddable Lisp-adjacent scripting language
//!
//! A host program parses a textual program, evaluates it against an
//! environment of bindings and operators, and observes a typed result. The
//! surface combines parenthesised operator calls with literal containers
//! (lists `[...]`, object literals `{{...}}`, keyed values `{k v}`) and a
//! special-operator syntax where the name precedes its opening parenthesis
//! (`IF(cond then else)`).
//!
//! ## Quick start
//!
//! ```rust
//! use losp::{EvalResult, Interpreter, Value};
//!
//! let interp = Interpreter::new();
//! let ast = interp.parse("(+ 5 6)").unwrap();
//! match interp.eval(&ast) {
//!     EvalResult::Value { values, .. } => assert_eq!(values, vec![Value::Int(11)]),
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```
//!
//! Variables, lambdas and control flow:
//!
//! ```rust
//! use losp::{EvalResult, Interpreter, Value};
//!
//! let interp = Interpreter::new();
//! let result = interp.eval_source(
//!     r#"(LAST
//!          =(greet FN([name] (CONCAT "hi " name)))
//!          (greet "world"))"#,
//! );
//! match result {
//!     EvalResult::Value { values, .. } => {
//!         assert_eq!(values, vec![Value::String("hi world".to_string())]);
//!     }
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → Scanner → Tokens → AstBuilder (+ Prepare rewrites) → Evaluator → Result
//! ```
//!
//! - [`Scanner`] turns source text into span tokens
//! - [`AstBuilder`] builds the node tree, invoking each special operator's
//!   Prepare hook as its frame closes
//! - [`Interpreter`] drives the frame-stack evaluator and owns the operator
//!   registry plus the global scope
//! - [`Value`] is the runtime value model; [`ScriptObject`] is the
//!   polymorphic object-with-named-fields capability
//! - [`EvalResult`] carries emissions, errors, or an [`AsyncProxy`] when an
//!   operator suspended
//!
//! ## Threading
//!
//! Evaluation is single-threaded cooperative: node evaluation, scope
//! lookups and proxy completions all happen on the thread driving the
//! interpreter. `eval_async` resolves suspensions on a tokio current-thread
//! runtime; the default `WAIT` clock schedules through
//! `tokio::task::spawn_local` and therefore needs an active
//! `tokio::task::LocalSet`. Hosts may substitute their own clock with
//! [`Interpreter::with_timer`].

pub mod error;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod runtime;
pub mod writer;

pub use error::{Error, Result};
pub use lexer::{Scanner, Token, TokenKind};
pub use ops::{OperatorHandler, OperatorRegistry, Services, SpecialOperatorHandler};
pub use parser::{AstBuilder, ChildPolicy, Node, NodeChildren, NodeKind};
pub use runtime::{
    AsyncProxy, ChildResults, ClosureObject, EvalError, EvalResult, Extrinsic, Interpreter,
    JsonObject, Lambda, ManualTimer, ObjectValue, Scope, ScopeRef, ScriptObject, Timer,
    TokioTimer, Value,
};
