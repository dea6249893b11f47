//! Control-flow special operators
//!
//! Each operator restructures its subtree in Prepare (moving latent parts
//! into the hidden child collection) and expresses its run-time control flow
//! as Push continuations, so no coroutines are needed: IF branches, FOR and
//! FORI loop steps are all sequences of pushes.

use std::rc::Rc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::ops::{OperatorHandler, OperatorRegistry, Services, SpecialOperatorHandler};
use crate::parser::{ChildPolicy, Node, NodeChildren, NodeKind};
use crate::runtime::{
    AsyncProxy, ChildResults, EvalResult, Scope, ScopeRef, Value,
};

/// Registers the special operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin_special(IfOperator);
    registry.register_builtin_special(ForOperator);
    registry.register_builtin_special(ForiOperator);
    registry.register_builtin_special(StepOperator {
        name: "++",
        delta: 1,
    });
    registry.register_builtin_special(StepOperator {
        name: "--",
        delta: -1,
    });
    registry.register_builtin_special(AssignOperator);
    registry.register_builtin_special(WaitOperator);
}

fn prepare_error(operator: &str, message: impl Into<String>) -> Error {
    Error::PrepareError {
        operator: operator.to_string(),
        message: message.into(),
    }
}

/// Splits the built operator node Prepare receives
fn split_operator(node: Node, operator: &str) -> Result<(String, Option<Token>, NodeChildren)> {
    match node.kind {
        NodeKind::Operator { id } => Ok((id, node.token, node.children)),
        _ => Err(prepare_error(operator, "only operator calls can be prepared")),
    }
}

/// Builds the SpecialOperator node that replaces the original
fn assemble(
    id: String,
    token: Option<Token>,
    hidden_nodes: Vec<Rc<Node>>,
    public: Vec<Rc<Node>>,
) -> Result<Node> {
    let mut hidden = NodeChildren::new(ChildPolicy::All);
    for child in hidden_nodes {
        hidden.push(child)?;
    }
    let mut node = Node::new(NodeKind::SpecialOperator { id, hidden }, token);
    for child in public {
        node.children.push(child)?;
    }
    Ok(node)
}

/// Hidden collection of the node a special handler runs on; a non-special
/// node is a misuse
fn require_hidden<'n>(node: &'n Rc<Node>, operator: &str) -> Result<&'n NodeChildren> {
    node.hidden().ok_or_else(|| Error::SpecialOperatorMisuse {
        operator: operator.to_string(),
    })
}

fn hidden_at(hidden: &NodeChildren, index: usize, operator: &str) -> Result<Rc<Node>> {
    hidden.get(index).cloned().ok_or_else(|| {
        Error::internal(format!("{} is missing hidden child {}", operator, index))
    })
}

/// Pushes a node and forwards whatever it emits
fn forward_push(node: Rc<Node>) -> EvalResult {
    EvalResult::push(vec![node], |results| {
        EvalResult::emit_all(results.into_values())
    })
}

// ---------------------------------------------------------------------------
// IF
// ---------------------------------------------------------------------------

/// `IF(cond then else?)`
///
/// The condition stays public; only an exact boolean `true` selects the then
/// branch. The chosen branch's emissions are forwarded.
pub struct IfOperator;

impl IfOperator {
    fn execute(&self, node: &Rc<Node>, args: &ChildResults) -> Result<EvalResult> {
        let hidden = require_hidden(node, "IF")?;
        if let Some(error) = args.error() {
            return Ok(EvalResult::Error(error.clone()));
        }
        // Only the first condition value governs the branch
        let cond_true = matches!(args.values().first(), Some(Value::Bool(true)));
        if cond_true {
            Ok(forward_push(hidden_at(hidden, 0, "IF")?))
        } else if let Some(else_branch) = hidden.get(1) {
            Ok(forward_push(else_branch.clone()))
        } else {
            Ok(EvalResult::none())
        }
    }
}

impl OperatorHandler for IfOperator {
    fn name(&self) -> &str {
        "IF"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        self.execute(node, args).unwrap_or_else(EvalResult::error)
    }
}

impl SpecialOperatorHandler for IfOperator {
    fn prepare(&self, node: Node) -> Result<Node> {
        let (id, token, children) = split_operator(node, "IF")?;
        let mut children = children.into_nodes();
        if !(2..=3).contains(&children.len()) {
            return Err(prepare_error(
                "IF",
                "expects a condition, a then branch and an optional else branch",
            ));
        }
        let else_branch = if children.len() == 3 {
            children.pop()
        } else {
            None
        };
        let then_branch = children.pop();
        let cond = children.pop();

        let mut hidden = Vec::new();
        hidden.extend(then_branch);
        hidden.extend(else_branch);
        let mut public = Vec::new();
        public.extend(cond);
        assemble(id, token, hidden, public)
    }
}

// ---------------------------------------------------------------------------
// FOR
// ---------------------------------------------------------------------------

/// `FOR((? cond) {do body})`
///
/// Condition and body alternate strictly; the loop ends on the first
/// condition result that is not exactly `true` and emits nothing.
pub struct ForOperator;

fn for_step(cond: Rc<Node>, body: Rc<Node>) -> EvalResult {
    EvalResult::push(vec![cond.clone()], move |results| {
        if matches!(results.values().first(), Some(Value::Bool(true))) {
            EvalResult::push(vec![body.clone()], move |_| for_step(cond, body))
        } else {
            EvalResult::none()
        }
    })
}

impl OperatorHandler for ForOperator {
    fn name(&self) -> &str {
        "FOR"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        let hidden = match require_hidden(node, "FOR") {
            Ok(hidden) => hidden,
            Err(error) => return EvalResult::error(error),
        };
        if let Some(error) = args.error() {
            return EvalResult::Error(error.clone());
        }
        match (hidden_at(hidden, 0, "FOR"), hidden_at(hidden, 1, "FOR")) {
            (Ok(cond), Ok(body)) => for_step(cond, body),
            (Err(error), _) | (_, Err(error)) => EvalResult::error(error),
        }
    }
}

impl SpecialOperatorHandler for ForOperator {
    fn prepare(&self, node: Node) -> Result<Node> {
        let (id, token, children) = split_operator(node, "FOR")?;
        let body = children
            .by_key("do")
            .cloned()
            .ok_or_else(|| prepare_error("FOR", "requires a {do …} body"))?;
        let cond = children
            .iter()
            .find(|child| matches!(&child.kind, NodeKind::Operator { id } if id == "?"))
            .cloned()
            .ok_or_else(|| prepare_error("FOR", "requires a (? …) condition"))?;
        assemble(id, token, vec![cond, body], Vec::new())
    }
}

// ---------------------------------------------------------------------------
// FORI
// ---------------------------------------------------------------------------

/// `FORI({{from a before b idx i emit?}} body)`
///
/// Initialises `idx` to `from` and runs the body while `idx < before`,
/// incrementing after each pass. With `emit true` the accumulated body
/// results come out at the end; otherwise nothing is emitted.
pub struct ForiOperator;

fn fori_step(
    scope: ScopeRef,
    idx_name: String,
    before: i32,
    body: Rc<Node>,
    emit: bool,
    acc: Vec<Value>,
) -> EvalResult {
    let idx = match Scope::lookup(&scope, &idx_name) {
        Some(Value::Int(n)) => n,
        _ => {
            return EvalResult::error(Error::internal(format!(
                "loop index {} lost its int binding",
                idx_name
            )))
        }
    };
    if idx < before {
        EvalResult::push(vec![body.clone()], move |results| {
            let mut acc = acc;
            if emit {
                acc.extend(results.into_values());
            }
            Scope::assign(&scope, &idx_name, Value::Int(idx + 1));
            fori_step(scope, idx_name, before, body, emit, acc)
        })
    } else if emit {
        EvalResult::emit_all(acc)
    } else {
        EvalResult::none()
    }
}

impl ForiOperator {
    fn execute(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
    ) -> Result<EvalResult> {
        let hidden = require_hidden(node, "FORI")?;
        if let Some(error) = args.error() {
            return Ok(EvalResult::Error(error.clone()));
        }
        let idx_node = hidden_at(hidden, 0, "FORI")?;
        let idx_name = match &idx_node.kind {
            NodeKind::Identifier { name } => name.clone(),
            _ => return Err(Error::internal("FORI index is not an identifier")),
        };
        let body = hidden_at(hidden, 1, "FORI")?;

        let from = keyed_int(args, "from")?;
        let before = keyed_int(args, "before")?;
        let emit = args.keyed_bool("emit")?.unwrap_or(false);

        Scope::define(scope, idx_name.clone(), Value::Int(from));
        Ok(fori_step(
            scope.clone(),
            idx_name,
            before,
            body,
            emit,
            Vec::new(),
        ))
    }
}

fn keyed_int(args: &ChildResults, key: &str) -> Result<i32> {
    match args.keyed(key) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(Error::TypeMismatch {
            index: 0,
            expected: format!("int for option {}", key),
            got: other.type_name().to_string(),
        }),
        None => Err(Error::missing_argument(0, format!("int for option {}", key))),
    }
}

impl OperatorHandler for ForiOperator {
    fn name(&self) -> &str {
        "FORI"
    }

    fn run(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        self.execute(scope, node, args)
            .unwrap_or_else(EvalResult::error)
    }
}

impl SpecialOperatorHandler for ForiOperator {
    fn prepare(&self, node: Node) -> Result<Node> {
        let (id, token, children) = split_operator(node, "FORI")?;
        let mut children = children.into_nodes();
        if children.len() != 2 {
            return Err(prepare_error(
                "FORI",
                "expects an options object and a body",
            ));
        }
        let body = children.pop().ok_or_else(|| Error::internal("FORI body vanished"))?;
        let options = children.pop().ok_or_else(|| Error::internal("FORI options vanished"))?;

        if !matches!(options.kind, NodeKind::ObjectLiteral { .. }) {
            return Err(prepare_error(
                "FORI",
                "first argument must be an object literal with from, before and idx",
            ));
        }
        let from = options
            .children
            .by_key("from")
            .cloned()
            .ok_or_else(|| prepare_error("FORI", "requires a {from …} entry"))?;
        let before = options
            .children
            .by_key("before")
            .cloned()
            .ok_or_else(|| prepare_error("FORI", "requires a {before …} entry"))?;
        let idx_kv = options
            .children
            .by_key("idx")
            .ok_or_else(|| prepare_error("FORI", "requires an {idx …} entry"))?;
        let idx = idx_kv
            .children
            .get(0)
            .filter(|n| matches!(n.kind, NodeKind::Identifier { .. }))
            .cloned()
            .ok_or_else(|| prepare_error("FORI", "idx must name an identifier"))?;
        let emit = options.children.by_key("emit").cloned();

        let mut public = vec![from, before];
        public.extend(emit);
        assemble(id, token, vec![idx, body], public)
    }
}

// ---------------------------------------------------------------------------
// ++ / --
// ---------------------------------------------------------------------------

/// `++`/`--`: exactly one operand
///
/// An identifier operand is read, stepped and written back; an operator
/// operand's evaluated value is stepped and returned without a write-back.
pub struct StepOperator {
    name: &'static str,
    delta: i32,
}

fn step_value(value: &Value, delta: i32) -> Result<Value> {
    match value {
        Value::Int(n) => Ok(Value::Int(n.wrapping_add(delta))),
        Value::Float(f) => Ok(Value::Float(f + delta as f32)),
        other => Err(Error::TypeMismatch {
            index: 0,
            expected: "number".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

impl StepOperator {
    fn execute(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
    ) -> Result<EvalResult> {
        let hidden = require_hidden(node, self.name)?;
        if let Some(error) = args.error() {
            return Ok(EvalResult::Error(error.clone()));
        }
        if let Some(target) = hidden.get(0) {
            let name = match &target.kind {
                NodeKind::Identifier { name } => name.clone(),
                _ => return Err(Error::internal("step target is not an identifier")),
            };
            let current = Scope::lookup(scope, &name)
                .ok_or_else(|| Error::UndefinedVariable { name: name.clone() })?;
            let next = step_value(&current, self.delta)?;
            Scope::assign(scope, &name, next.clone());
            Ok(EvalResult::emit(next))
        } else {
            let current = args.value_at(0, "number")?;
            Ok(EvalResult::emit(step_value(current, self.delta)?))
        }
    }
}

impl OperatorHandler for StepOperator {
    fn name(&self) -> &str {
        self.name
    }

    fn run(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        self.execute(scope, node, args)
            .unwrap_or_else(EvalResult::error)
    }
}

impl SpecialOperatorHandler for StepOperator {
    fn prepare(&self, node: Node) -> Result<Node> {
        let (id, token, children) = split_operator(node, self.name)?;
        let mut children = children.into_nodes();
        if children.len() != 1 {
            return Err(prepare_error(self.name, "expects exactly one operand"));
        }
        let operand = children
            .pop()
            .ok_or_else(|| Error::internal("step operand vanished"))?;
        match &operand.kind {
            NodeKind::Identifier { .. } => assemble(id, token, vec![operand], Vec::new()),
            NodeKind::Operator { .. } | NodeKind::SpecialOperator { .. } => {
                assemble(id, token, Vec::new(), vec![operand])
            }
            _ => Err(prepare_error(
                self.name,
                "operand must be an identifier or an operator",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// =
// ---------------------------------------------------------------------------

/// `=(id expr)`: stores the expression's value under the identifier and
/// emits the same value
pub struct AssignOperator;

impl AssignOperator {
    fn execute(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
    ) -> Result<EvalResult> {
        let hidden = require_hidden(node, "=")?;
        if let Some(error) = args.error() {
            return Ok(EvalResult::Error(error.clone()));
        }
        let target = hidden_at(hidden, 0, "=")?;
        let name = match &target.kind {
            NodeKind::Identifier { name } => name.clone(),
            _ => return Err(Error::internal("assignment target is not an identifier")),
        };
        let value = args
            .values()
            .first()
            .cloned()
            .ok_or_else(|| Error::missing_argument(0, "a value"))?;
        Scope::assign(scope, &name, value.clone());
        Ok(EvalResult::emit(value))
    }
}

impl OperatorHandler for AssignOperator {
    fn name(&self) -> &str {
        "="
    }

    fn run(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        self.execute(scope, node, args)
            .unwrap_or_else(EvalResult::error)
    }
}

impl SpecialOperatorHandler for AssignOperator {
    fn prepare(&self, node: Node) -> Result<Node> {
        let (id, token, children) = split_operator(node, "=")?;
        let mut children = children.into_nodes();
        if children.len() != 2 {
            return Err(prepare_error("=", "expects an identifier and an expression"));
        }
        let expr = children
            .pop()
            .ok_or_else(|| Error::internal("assignment expression vanished"))?;
        let target = children
            .pop()
            .ok_or_else(|| Error::internal("assignment target vanished"))?;
        if !matches!(target.kind, NodeKind::Identifier { .. }) {
            return Err(prepare_error("=", "first argument must be an identifier"));
        }
        assemble(id, token, vec![target], vec![expr])
    }
}

// ---------------------------------------------------------------------------
// WAIT
// ---------------------------------------------------------------------------

/// `WAIT(ms body)`: evaluates the delay, suspends on the host clock, then
/// runs the body and forwards its emissions. A zero delay skips the clock.
pub struct WaitOperator;

impl WaitOperator {
    fn execute(
        &self,
        node: &Rc<Node>,
        args: &ChildResults,
        services: &Services,
    ) -> Result<EvalResult> {
        let hidden = require_hidden(node, "WAIT")?;
        if let Some(error) = args.error() {
            return Ok(EvalResult::Error(error.clone()));
        }
        let body = hidden_at(hidden, 0, "WAIT")?;
        let ms = match args.values().first() {
            Some(Value::Int(n)) if *n >= 0 => *n,
            Some(other) => {
                return Err(Error::TypeMismatch {
                    index: 0,
                    expected: "non-negative int".to_string(),
                    got: other.type_name().to_string(),
                })
            }
            None => return Err(Error::missing_argument(0, "non-negative int")),
        };

        if ms == 0 {
            return Ok(forward_push(body));
        }

        let proxy = AsyncProxy::new();
        let completer = proxy.clone();
        services.timer.schedule(
            Duration::from_millis(ms as u64),
            Box::new(move || {
                completer.complete(forward_push(body));
            }),
        );
        Ok(EvalResult::Async(proxy))
    }
}

impl OperatorHandler for WaitOperator {
    fn name(&self) -> &str {
        "WAIT"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        services: &Services,
    ) -> EvalResult {
        self.execute(node, args, services)
            .unwrap_or_else(EvalResult::error)
    }
}

impl SpecialOperatorHandler for WaitOperator {
    fn prepare(&self, node: Node) -> Result<Node> {
        let (id, token, children) = split_operator(node, "WAIT")?;
        let mut children = children.into_nodes();
        if children.len() != 2 {
            return Err(prepare_error("WAIT", "expects milliseconds and a body"));
        }
        let body = children
            .pop()
            .ok_or_else(|| Error::internal("WAIT body vanished"))?;
        let ms = children
            .pop()
            .ok_or_else(|| Error::internal("WAIT delay vanished"))?;
        assemble(id, token, vec![body], vec![ms])
    }
}
