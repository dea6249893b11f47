//! Miscellaneous operators

use std::rc::Rc;

use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the miscellaneous operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(PiOperator);
    registry.register_builtin(DblPushOperator);
}

/// `PI` emits π; extra arguments are ignored
pub struct PiOperator;

impl OperatorHandler for PiOperator {
    fn name(&self) -> &str {
        "PI"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        _args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        EvalResult::emit(Value::Float(std::f32::consts::PI))
    }
}

/// `LOSP:TEST:DBLPUSH` issues two sequential pushes (a literal 1, then a
/// literal 2) and emits their sum; exercises continuation plumbing
pub struct DblPushOperator;

impl OperatorHandler for DblPushOperator {
    fn name(&self) -> &str {
        "LOSP:TEST:DBLPUSH"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        _args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        EvalResult::push(
            vec![Rc::new(Node::literal(Value::Int(1)))],
            move |first| {
                let a = first
                    .values()
                    .first()
                    .and_then(Value::try_int)
                    .unwrap_or(0);
                EvalResult::push(
                    vec![Rc::new(Node::literal(Value::Int(2)))],
                    move |second| {
                        let b = second
                            .values()
                            .first()
                            .and_then(Value::try_int)
                            .unwrap_or(0);
                        EvalResult::emit(Value::Int(a + b))
                    },
                )
            },
        )
    }
}
