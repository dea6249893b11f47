//! Runtime execution for Losp
//!
//! The value model, the scope chain, the result types, and the frame-stack
//! evaluator behind the host-facing [`Interpreter`].

mod interpreter;
pub(crate) mod machine;
mod result;
mod scope;
pub mod script_object;
mod timer;
mod value;

pub use interpreter::Interpreter;
pub use result::{AsyncProxy, ChildResults, EvalError, EvalResult, PushRequest};
pub use scope::{Scope, ScopeRef};
pub use script_object::{ClosureObject, JsonObject, ObjectValue, ScriptObject};
pub use timer::{ManualTimer, Timer, TokioTimer};
pub(crate) use value::format_float;
pub use value::{Extrinsic, Lambda, Value};
