//! Script-object operators: property lookup and merging

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::script_object;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the object operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(PropertyOperator);
    registry.register_builtin(MergeOperator);
}

/// The `.` operator: chained key lookup on a script object
pub struct PropertyOperator;

impl PropertyOperator {
    fn execute(&self, args: &ChildResults) -> Result<Value> {
        if args.unkeyed_len() < 2 {
            return Err(Error::ArityAtLeast { expected: 2 });
        }
        let mut current = match args.unkeyed(0) {
            Some(Value::Scriptable(obj)) => Value::Scriptable(obj.clone()),
            Some(other) => {
                return Err(Error::TypeMismatch {
                    index: 0,
                    expected: "object".to_string(),
                    got: other.type_name().to_string(),
                })
            }
            None => return Err(Error::missing_argument(0, "object")),
        };

        for position in 1..args.unkeyed_len() {
            let key = args.str_at(position)?;
            let obj = match &current {
                Value::Scriptable(obj) => obj.clone(),
                _ => return Err(Error::NotScriptObject),
            };
            current = obj.get(key).ok_or_else(|| Error::PropertyNotFound {
                key: key.to_string(),
            })?;
        }
        Ok(current)
    }
}

impl OperatorHandler for PropertyOperator {
    fn name(&self) -> &str {
        "."
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match self.execute(args) {
            Ok(value) => EvalResult::emit(value),
            Err(error) => EvalResult::error(error),
        }
    }
}

/// `MERGE` builds a new object carrying the keys of both arguments; the
/// later object overrides, and values are carried by reference
pub struct MergeOperator;

impl MergeOperator {
    fn execute(&self, args: &ChildResults) -> Result<Value> {
        if args.unkeyed_len() != 2 {
            return Err(Error::ArityExact {
                expected: 2,
                got: args.unkeyed_len(),
            });
        }
        let mut objects = Vec::with_capacity(2);
        for position in 0..2 {
            match args.unkeyed(position) {
                Some(Value::Scriptable(obj)) => objects.push(obj.clone()),
                Some(other) => {
                    return Err(Error::TypeMismatch {
                        index: position,
                        expected: "object".to_string(),
                        got: other.type_name().to_string(),
                    })
                }
                None => return Err(Error::missing_argument(position, "object")),
            }
        }
        let merged = script_object::merged(objects[0].as_ref(), objects[1].as_ref());
        Ok(Value::Scriptable(Rc::new(merged)))
    }
}

impl OperatorHandler for MergeOperator {
    fn name(&self) -> &str {
        "MERGE"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match self.execute(args) {
            Ok(value) => EvalResult::emit(value),
            Err(error) => EvalResult::error(error),
        }
    }
}
