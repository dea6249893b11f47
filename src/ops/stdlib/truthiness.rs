//! Truthiness operators
//!
//! `1`/`0` test strict truth, `~1`/`~0` the loose form; `!`/`~!` negate a
//! single argument. `ANY`/`ALL` quantify over their arguments and accept a
//! `~` keyed option switching from strict to loose.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the truthiness operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(StrictTrueOperator);
    registry.register_builtin(LooseTrueOperator);
    registry.register_builtin(StrictFalseOperator);
    registry.register_builtin(LooseFalseOperator);
    registry.register_builtin(StrictNotOperator);
    registry.register_builtin(LooseNotOperator);
    registry.register_builtin(AnyOperator);
    registry.register_builtin(AllOperator);
}

fn single(args: &ChildResults) -> Result<&Value> {
    if args.unkeyed_len() != 1 {
        return Err(Error::ArityExact {
            expected: 1,
            got: args.unkeyed_len(),
        });
    }
    args.value_at(0, "value")
}

fn test_single(args: &ChildResults, test: impl Fn(&Value) -> bool) -> EvalResult {
    match single(args) {
        Ok(value) => EvalResult::emit(Value::Bool(test(value))),
        Err(error) => EvalResult::error(error),
    }
}

macro_rules! truth_operator {
    ($struct_name:ident, $name:literal, $test:expr) => {
        #[doc = concat!("The `", $name, "` operator")]
        pub struct $struct_name;

        impl OperatorHandler for $struct_name {
            fn name(&self) -> &str {
                $name
            }

            fn run(
                &self,
                _scope: &ScopeRef,
                _node: &Rc<Node>,
                args: &ChildResults,
                _services: &Services,
            ) -> EvalResult {
                test_single(args, $test)
            }
        }
    };
}

truth_operator!(StrictTrueOperator, "1", |v: &Value| v.is_strictly_true());
truth_operator!(LooseTrueOperator, "~1", |v: &Value| v.is_truthy());
truth_operator!(StrictFalseOperator, "0", |v: &Value| !v.is_strictly_true());
truth_operator!(LooseFalseOperator, "~0", |v: &Value| !v.is_truthy());
truth_operator!(StrictNotOperator, "!", |v: &Value| !v.is_strictly_true());
truth_operator!(LooseNotOperator, "~!", |v: &Value| !v.is_truthy());

fn quantify(args: &ChildResults, want_all: bool) -> Result<Value> {
    if args.unkeyed_len() == 0 {
        return Err(Error::ArityAtLeast { expected: 1 });
    }
    let loose = args.keyed_bool("~")?.unwrap_or(false);
    let test = |v: &Value| {
        if loose {
            v.is_truthy()
        } else {
            v.is_strictly_true()
        }
    };
    let outcome = if want_all {
        (0..args.unkeyed_len()).all(|i| args.unkeyed(i).map(|v| test(v)).unwrap_or(false))
    } else {
        (0..args.unkeyed_len()).any(|i| args.unkeyed(i).map(|v| test(v)).unwrap_or(false))
    };
    Ok(Value::Bool(outcome))
}

/// The `ANY` operator
pub struct AnyOperator;

impl OperatorHandler for AnyOperator {
    fn name(&self) -> &str {
        "ANY"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match quantify(args, false) {
            Ok(value) => EvalResult::emit(value),
            Err(error) => EvalResult::error(error),
        }
    }
}

/// The `ALL` operator
pub struct AllOperator;

impl OperatorHandler for AllOperator {
    fn name(&self) -> &str {
        "ALL"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match quantify(args, true) {
            Ok(value) => EvalResult::emit(value),
            Err(error) => EvalResult::error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_strict_by_default() {
        let args = ChildResults::from_values(vec![Value::Int(1), Value::Bool(false)]);
        // 1 is loosely true but not strictly true
        assert_eq!(quantify(&args, false).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_any_loose_with_option() {
        let mut args = ChildResults::new();
        args.accept(None, Value::Int(1));
        args.accept(Some("~"), Value::Bool(true));
        assert_eq!(quantify(&args, false).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_all_requires_every_argument() {
        let args = ChildResults::from_values(vec![Value::Bool(true), Value::Bool(false)]);
        assert_eq!(quantify(&args, true).unwrap(), Value::Bool(false));
        let args = ChildResults::from_values(vec![Value::Bool(true), Value::Bool(true)]);
        assert_eq!(quantify(&args, true).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_no_arguments_is_an_error() {
        let args = ChildResults::new();
        let err = quantify(&args, false).unwrap_err();
        assert_eq!(err.to_string(), "at least one argument is required");
    }
}
