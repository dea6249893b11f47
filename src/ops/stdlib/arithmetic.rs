//! Arithmetic operators
//!
//! The accumulator starts in integer mode and stays there while every
//! argument is an integer; the first float switches it to float mode
//! permanently. Division by zero yields `i32::MAX` in integer mode and
//! `+∞` in float mode rather than erroring.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the arithmetic operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(AddOperator);
    registry.register_builtin(SubOperator);
    registry.register_builtin(MulOperator);
    registry.register_builtin(DivOperator);
    registry.register_builtin(ModOperator);
    registry.register_builtin(PowOperator);
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

enum Acc {
    Int(i32),
    Float(f32),
}

fn apply_int(op: ArithOp, a: i32, b: i32) -> i32 {
    match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div => {
            if b == 0 {
                i32::MAX
            } else {
                a.wrapping_div(b)
            }
        }
        ArithOp::Mod => {
            if b == 0 {
                i32::MAX
            } else {
                a.wrapping_rem(b)
            }
        }
        // Integer power goes through powf and rounds back
        ArithOp::Pow => (a as f32).powf(b as f32).round() as i32,
    }
}

fn apply_float(op: ArithOp, a: f32, b: f32) -> f32 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0.0 {
                f32::INFINITY
            } else {
                a / b
            }
        }
        ArithOp::Mod => {
            if b == 0.0 {
                f32::INFINITY
            } else {
                a % b
            }
        }
        ArithOp::Pow => a.powf(b),
    }
}

fn fold(op: ArithOp, args: &ChildResults) -> Result<Value> {
    let values = args.unkeyed_values();
    let first = values.first().ok_or(Error::ArityAtLeast { expected: 1 })?;
    let mut acc = match first {
        Value::Int(n) => Acc::Int(*n),
        Value::Float(f) => Acc::Float(*f),
        other => {
            return Err(Error::TypeMismatch {
                index: 0,
                expected: "number".to_string(),
                got: other.type_name().to_string(),
            })
        }
    };

    for (index, value) in values.iter().enumerate().skip(1) {
        acc = match (acc, value) {
            (Acc::Int(a), Value::Int(b)) => Acc::Int(apply_int(op, a, *b)),
            (Acc::Int(a), Value::Float(b)) => Acc::Float(apply_float(op, a as f32, *b)),
            (Acc::Float(a), Value::Int(b)) => Acc::Float(apply_float(op, a, *b as f32)),
            (Acc::Float(a), Value::Float(b)) => Acc::Float(apply_float(op, a, *b)),
            (_, other) => {
                return Err(Error::TypeMismatch {
                    index,
                    expected: "number".to_string(),
                    got: other.type_name().to_string(),
                })
            }
        };
    }

    Ok(match acc {
        Acc::Int(n) => Value::Int(n),
        Acc::Float(f) => Value::Float(f),
    })
}

macro_rules! arith_operator {
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
                match fold($op, args) {
                    Ok(value) => EvalResult::emit(value),
                    Err(error) => EvalResult::error(error),
                }
            }
        }
    };
}

arith_operator!(AddOperator, "+", ArithOp::Add);
arith_operator!(SubOperator, "-", ArithOp::Sub);
arith_operator!(MulOperator, "*", ArithOp::Mul);
arith_operator!(DivOperator, "/", ArithOp::Div);
arith_operator!(ModOperator, "%", ArithOp::Mod);
arith_operator!(PowOperator, "^", ArithOp::Pow);
