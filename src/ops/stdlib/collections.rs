//! Container operators: emission shaping, membership and counting

use std::rc::Rc;

use crate::error::Error;
use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the container operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(RunOperator { name: "RUN" });
    registry.register_builtin(RunOperator { name: "DO" });
    registry.register_builtin(RunOperator { name: "?" });
    registry.register_builtin(MuteOperator);
    registry.register_builtin(LastOperator);
    registry.register_builtin(ExpandOperator);
    registry.register_builtin(CollapseOperator);
    registry.register_builtin(InOperator);
    registry.register_builtin(CountOperator);
}

/// `RUN`/`DO` emit every child result; `?` is the same operator under the
/// name loops and conditions use
pub struct RunOperator {
    name: &'static str,
}

impl OperatorHandler for RunOperator {
    fn name(&self) -> &str {
        self.name
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        EvalResult::emit_all(args.values().to_vec())
    }
}

/// `MUTE` evaluates its children and emits nothing
pub struct MuteOperator;

impl OperatorHandler for MuteOperator {
    fn name(&self) -> &str {
        "MUTE"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        _args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        EvalResult::none()
    }
}

/// `LAST` emits the last child result, or nothing when there is none
pub struct LastOperator;

impl OperatorHandler for LastOperator {
    fn name(&self) -> &str {
        "LAST"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match args.values().last() {
            Some(value) => EvalResult::emit(value.clone()),
            None => EvalResult::none(),
        }
    }
}

/// `EXPAND` flattens one level: list children contribute their elements
pub struct ExpandOperator;

impl OperatorHandler for ExpandOperator {
    fn name(&self) -> &str {
        "EXPAND"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        let mut out = Vec::new();
        for value in args.values() {
            match value {
                Value::List(items) => out.extend(items.iter().cloned()),
                other => out.push(other.clone()),
            }
        }
        EvalResult::emit_all(out)
    }
}

/// `COLLAPSE` bundles every child result into one list value
pub struct CollapseOperator;

impl OperatorHandler for CollapseOperator {
    fn name(&self) -> &str {
        "COLLAPSE"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        EvalResult::emit(Value::list(args.values().to_vec()))
    }
}

/// `IN list needle` tests membership; null equals null
pub struct InOperator;

impl OperatorHandler for InOperator {
    fn name(&self) -> &str {
        "IN"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        if args.unkeyed_len() != 2 {
            return EvalResult::error(Error::ArityExact {
                expected: 2,
                got: args.unkeyed_len(),
            });
        }
        let list = match args.unkeyed(0) {
            Some(Value::List(items)) => items,
            Some(other) => {
                return EvalResult::error(Error::TypeMismatch {
                    index: 0,
                    expected: "list".to_string(),
                    got: other.type_name().to_string(),
                })
            }
            None => return EvalResult::error(Error::missing_argument(0, "list")),
        };
        let needle = match args.unkeyed(1) {
            Some(value) => value,
            None => return EvalResult::error(Error::missing_argument(1, "value")),
        };
        EvalResult::emit(Value::Bool(list.iter().any(|item| item == needle)))
    }
}

/// `COUNT` gives a list's length or a script object's key count
pub struct CountOperator;

impl OperatorHandler for CountOperator {
    fn name(&self) -> &str {
        "COUNT"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match args.unkeyed(0) {
            Some(Value::List(items)) => EvalResult::emit(Value::Int(items.len() as i32)),
            Some(Value::Scriptable(obj)) => EvalResult::emit(Value::Int(obj.keys().len() as i32)),
            Some(other) => EvalResult::error(Error::TypeMismatch {
                index: 0,
                expected: "list or object".to_string(),
                got: other.type_name().to_string(),
            }),
            None => EvalResult::error(Error::missing_argument(0, "list or object")),
        }
    }
}
