//! Comparison operators
//!
//! Exactly two arguments. Bools support only equality; ints and floats mix
//! by promoting the int side; other orderings require matching types.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the comparison operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(EqOperator);
    registry.register_builtin(NeOperator);
    registry.register_builtin(LtOperator);
    registry.register_builtin(LeOperator);
    registry.register_builtin(GtOperator);
    registry.register_builtin(GeOperator);
}

#[derive(Clone, Copy)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn is_equality(self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    fn from_ordering(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

fn mismatch(index: usize, expected: &str, got: &Value) -> Error {
    Error::TypeMismatch {
        index,
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

fn compare(op: CmpOp, args: &ChildResults) -> Result<Value> {
    if args.unkeyed_len() != 2 {
        return Err(Error::ArityExact {
            expected: 2,
            got: args.unkeyed_len(),
        });
    }
    let left = args.value_at(0, "comparable value")?;
    let right = args.value_at(1, "comparable value")?;

    let outcome = match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => {
            if !op.is_equality() {
                return Err(mismatch(0, "int, float or string", left));
            }
            op.from_ordering(if a == b {
                Ordering::Equal
            } else {
                Ordering::Less
            })
        }
        (Value::Int(a), Value::Int(b)) => op.from_ordering(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => {
            op.from_ordering(a.partial_cmp(b).unwrap_or(Ordering::Less))
        }
        // Mixed numerics promote the int side
        (Value::Int(a), Value::Float(b)) => {
            op.from_ordering((*a as f32).partial_cmp(b).unwrap_or(Ordering::Less))
        }
        (Value::Float(a), Value::Int(b)) => {
            op.from_ordering(a.partial_cmp(&(*b as f32)).unwrap_or(Ordering::Less))
        }
        (Value::String(a), Value::String(b)) => op.from_ordering(a.cmp(b)),
        (a, b) if op.is_equality() && a.type_name() == b.type_name() => {
            op.from_ordering(if a == b { Ordering::Equal } else { Ordering::Less })
        }
        (a, b) => {
            return Err(mismatch(1, a.type_name(), b));
        }
    };

    Ok(Value::Bool(outcome))
}

macro_rules! cmp_operator {
    ($struct_name:ident, $name:literal, $op:expr) => {
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
                match compare($op, args) {
                    Ok(value) => EvalResult::emit(value),
                    Err(error) => EvalResult::error(error),
                }
            }
        }
    };
}

cmp_operator!(EqOperator, "==", CmpOp::Eq);
cmp_operator!(NeOperator, "!=", CmpOp::Ne);
cmp_operator!(LtOperator, "<", CmpOp::Lt);
cmp_operator!(LeOperator, "<=", CmpOp::Le);
cmp_operator!(GtOperator, ">", CmpOp::Gt);
cmp_operator!(GeOperator, ">=", CmpOp::Ge);

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: Value, b: Value) -> ChildResults {
        ChildResults::from_values(vec![a, b])
    }

    #[test]
    fn test_int_ordering() {
        assert_eq!(
            compare(CmpOp::Lt, &args(Value::Int(1), Value::Int(2))).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            compare(CmpOp::Ge, &args(Value::Int(1), Value::Int(2))).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_mixed_numeric_promotes() {
        assert_eq!(
            compare(CmpOp::Eq, &args(Value::Int(2), Value::Float(2.0))).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            compare(CmpOp::Lt, &args(Value::Float(1.5), Value::Int(2))).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_bool_only_equality() {
        assert_eq!(
            compare(CmpOp::Eq, &args(Value::Bool(true), Value::Bool(true))).unwrap(),
            Value::Bool(true)
        );
        assert!(compare(CmpOp::Lt, &args(Value::Bool(true), Value::Bool(false))).is_err());
    }

    #[test]
    fn test_null_equality() {
        assert_eq!(
            compare(CmpOp::Eq, &args(Value::Null, Value::Null)).unwrap(),
            Value::Bool(true)
        );
        assert!(compare(CmpOp::Eq, &args(Value::Null, Value::Int(0))).is_err());
    }

    #[test]
    fn test_arity_enforced() {
        let one = ChildResults::from_values(vec![Value::Int(1)]);
        assert!(compare(CmpOp::Eq, &one).is_err());
    }
}
