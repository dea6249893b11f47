use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::Error;
use crate::ops::{OperatorRegistry, Resolved, Services};
use crate::parser::{Node, NodeKind};
use crate::runtime::script_object::{ObjectValue, ScriptObject};
use crate::runtime::{
    AsyncProxy, ChildResults, EvalError, EvalResult, Lambda, Scope, ScopeRef, Value,
};

/// What a frame does once its children have been evaluated
enum FrameKind {
    /// Dispatch the node's own evaluation contract
    Node(Rc<Node>),
    /// Invoke a continuation callback with the accumulated results
    Push(Box<dyn FnOnce(ChildResults) -> EvalResult>),
    /// Emit the accumulated results as a multi-value lambda return
    Call,
}

/// One entry on the evaluation stack
struct Frame {
    kind: FrameKind,
    scope: ScopeRef,
    children: Vec<Rc<Node>>,
    next: usize,
    acc: ChildResults,
}

impl Frame {
    fn for_node(node: Rc<Node>, scope: ScopeRef) -> Frame {
        let children = node.eval_children().to_vec();
        Frame {
            kind: FrameKind::Node(node),
            scope,
            children,
            next: 0,
            acc: ChildResults::new(),
        }
    }
}

enum Action {
    PushChild(Rc<Node>, ScopeRef),
    Finish(Frame),
    Idle,
}

/// The evaluation driver: an explicit frame stack plus a single lazily
/// created top-level async proxy
///
/// All evaluation happens on one logical thread. A run may suspend at an
/// `Async` result; completing the suspending proxy (on the same thread)
/// re-enters the driver, and the terminal result reaches the host through
/// the top-level proxy handed out by [`Machine::eval`].
pub(crate) struct Machine {
    stack: RefCell<Vec<Frame>>,
    injected: RefCell<VecDeque<(EvalResult, ScopeRef)>>,
    running: Cell<bool>,
    waiting: Cell<bool>,
    terminal: RefCell<Option<EvalResult>>,
    top_proxy: RefCell<Option<AsyncProxy>>,
    registry: Rc<OperatorRegistry>,
    services: Services,
}

impl Machine {
    pub(crate) fn new(registry: Rc<OperatorRegistry>, services: Services) -> Rc<Machine> {
        Rc::new(Machine {
            stack: RefCell::new(Vec::new()),
            injected: RefCell::new(VecDeque::new()),
            running: Cell::new(false),
            waiting: Cell::new(false),
            terminal: RefCell::new(None),
            top_proxy: RefCell::new(None),
            registry,
            services,
        })
    }

    /// Evaluates a node to a terminal result, or to `Async` when some
    /// operator suspended
    pub(crate) fn eval(machine: Rc<Machine>, node: &Rc<Node>, scope: &ScopeRef) -> EvalResult {
        machine
            .stack
            .borrow_mut()
            .push(Frame::for_node(node.clone(), scope.clone()));
        Machine::drive(&machine);
        Machine::conclude(&machine)
    }

    /// Calls a lambda with positional argument values
    pub(crate) fn call(
        machine: Rc<Machine>,
        lambda: &Rc<Lambda>,
        args: Vec<Value>,
        caller_scope: &ScopeRef,
    ) -> EvalResult {
        let frame = Machine::lambda_frame(lambda, args, caller_scope);
        machine.stack.borrow_mut().push(frame);
        Machine::drive(&machine);
        Machine::conclude(&machine)
    }

    fn conclude(machine: &Rc<Machine>) -> EvalResult {
        if let Some(result) = machine.terminal.borrow_mut().take() {
            return result;
        }
        let proxy = AsyncProxy::new();
        *machine.top_proxy.borrow_mut() = Some(proxy.clone());
        EvalResult::Async(proxy)
    }

    /// Creates the synthetic frame for a lambda call: a child scope of the
    /// caller's, with the first k parameters bound by position
    fn lambda_frame(lambda: &Rc<Lambda>, args: Vec<Value>, caller_scope: &ScopeRef) -> Frame {
        let call_scope = Scope::child(caller_scope);
        for (param, value) in lambda.params.iter().zip(args) {
            Scope::define(&call_scope, param.clone(), value);
        }
        Frame {
            kind: FrameKind::Call,
            scope: call_scope,
            children: lambda.body.clone(),
            next: 0,
            acc: ChildResults::new(),
        }
    }

    /// The driving loop; re-entrant calls while already running are no-ops
    /// (the active loop picks up injected results)
    fn drive(machine: &Rc<Machine>) {
        if machine.running.get() {
            return;
        }
        machine.running.set(true);
        loop {
            if machine.terminal.borrow().is_some() {
                break;
            }
            let injected = machine.injected.borrow_mut().pop_front();
            if let Some((result, scope)) = injected {
                machine.waiting.set(false);
                Machine::deliver(machine, result, scope);
                continue;
            }
            if machine.waiting.get() {
                break;
            }
            Machine::step(machine);
        }
        machine.running.set(false);

        // A terminal reached after suspension flows out through the
        // top-level proxy
        let ready =
            machine.terminal.borrow().is_some() && machine.top_proxy.borrow().is_some();
        if ready {
            let result = machine.terminal.borrow_mut().take();
            let proxy = machine.top_proxy.borrow_mut().take();
            if let (Some(result), Some(proxy)) = (result, proxy) {
                proxy.complete(result);
            }
        }
    }

    fn step(machine: &Rc<Machine>) {
        let action = {
            let mut stack = machine.stack.borrow_mut();
            match stack.last_mut() {
                None => Action::Idle,
                Some(top) if top.next < top.children.len() => {
                    let child = top.children[top.next].clone();
                    top.next += 1;
                    Action::PushChild(child, top.scope.clone())
                }
                Some(_) => match stack.pop() {
                    Some(frame) => Action::Finish(frame),
                    None => Action::Idle,
                },
            }
        };

        match action {
            Action::PushChild(child, scope) => {
                machine
                    .stack
                    .borrow_mut()
                    .push(Frame::for_node(child, scope));
            }
            Action::Finish(frame) => {
                let scope = frame.scope.clone();
                if let Some(result) = Machine::finish(machine, frame) {
                    Machine::deliver(machine, result, scope);
                }
            }
            Action::Idle => {
                if machine.terminal.borrow().is_none() {
                    *machine.terminal.borrow_mut() = Some(EvalResult::error(Error::internal(
                        "evaluation stack drained without a result",
                    )));
                }
            }
        }
    }

    /// Produces the completed frame's result; `None` means the frame turned
    /// into a new stack entry (lambda invocation)
    fn finish(machine: &Rc<Machine>, frame: Frame) -> Option<EvalResult> {
        match frame.kind {
            FrameKind::Push(on_complete) => Some(on_complete(frame.acc)),
            FrameKind::Call => Some(EvalResult::emit_all(frame.acc.into_values())),
            FrameKind::Node(node) => Machine::dispatch(machine, &node, &frame.scope, frame.acc),
        }
    }

    fn dispatch(
        machine: &Rc<Machine>,
        node: &Rc<Node>,
        scope: &ScopeRef,
        acc: ChildResults,
    ) -> Option<EvalResult> {
        let result = match &node.kind {
            NodeKind::Literal { value } => EvalResult::emit(value.clone()),

            NodeKind::Identifier { name } => {
                // A stray comma evaluates to nothing
                if name == "," {
                    EvalResult::none()
                } else {
                    match Scope::lookup(scope, name) {
                        Some(value) => EvalResult::emit(value),
                        None => EvalResult::error_at(
                            node,
                            Error::UndefinedVariable { name: name.clone() },
                        ),
                    }
                }
            }

            NodeKind::List => EvalResult::emit(Value::list(acc.into_values())),

            NodeKind::ObjectLiteral { tags } => {
                let obj = ObjectValue::new();
                for (key, value) in acc.entries() {
                    if let Some(key) = key {
                        obj.set(key, value.clone());
                    }
                }
                for tag in tags {
                    obj.add_tag(tag.clone());
                }
                EvalResult::emit(Value::Scriptable(Rc::new(obj)))
            }

            NodeKind::KeyValue { id, tags } => Machine::finish_key_value(id, tags, node, acc),

            NodeKind::Function { params } => EvalResult::emit(Value::lambda(
                params.clone(),
                node.children.as_slice().to_vec(),
            )),

            NodeKind::Filter { id, .. } => match machine.registry.try_get_operator(id) {
                Some(handler) => Machine::attribute(
                    node,
                    handler.run(scope, node, &acc, &machine.services),
                ),
                None => EvalResult::emit_all(acc.into_values()),
            },

            NodeKind::Operator { id } => {
                // A scope binding holding a lambda shadows operator lookup
                if let Some(Value::Lambda(lambda)) = Scope::lookup(scope, id) {
                    let frame = Machine::lambda_frame(&lambda, acc.unkeyed_values(), scope);
                    machine.stack.borrow_mut().push(frame);
                    return None;
                }
                match machine.registry.resolve(id) {
                    Some(Resolved::Special(handler)) => Machine::attribute(
                        node,
                        handler.run(scope, node, &acc, &machine.services),
                    ),
                    Some(Resolved::Standard(handler)) => Machine::attribute(
                        node,
                        handler.run(scope, node, &acc, &machine.services),
                    ),
                    None => {
                        EvalResult::error_at(node, Error::UndefinedOperator { name: id.clone() })
                    }
                }
            }

            NodeKind::SpecialOperator { id, .. } => {
                match machine.registry.try_get_special_operator(id) {
                    Some(handler) => Machine::attribute(
                        node,
                        handler.run(scope, node, &acc, &machine.services),
                    ),
                    None => {
                        EvalResult::error_at(node, Error::UndefinedOperator { name: id.clone() })
                    }
                }
            }
        };
        Some(result)
    }

    fn finish_key_value(id: &str, tags: &[String], node: &Rc<Node>, acc: ChildResults) -> EvalResult {
        if node.children.is_empty() {
            return EvalResult::emit_keyed(id, Value::Bool(true));
        }
        if acc.has_keyed() {
            // Keyed child results materialise as a nested object literal
            let obj = ObjectValue::new();
            for (key, value) in acc.entries() {
                if let Some(key) = key {
                    obj.set(key, value.clone());
                }
            }
            for tag in tags {
                obj.add_tag(tag.clone());
            }
            return EvalResult::emit_keyed(id, Value::Scriptable(Rc::new(obj)));
        }
        let mut values = acc.into_values();
        if values.len() == 1 {
            return EvalResult::emit_keyed(id, values.remove(0));
        }
        EvalResult::emit_keyed(id, Value::list(values))
    }

    /// Attaches the node as the error source when the handler did not
    fn attribute(node: &Rc<Node>, result: EvalResult) -> EvalResult {
        match result {
            EvalResult::Error(mut error) => {
                if error.source.is_none() {
                    error.source = Some(node.clone());
                }
                EvalResult::Error(error)
            }
            other => other,
        }
    }

    /// Routes a produced result into the surrounding context
    fn deliver(machine: &Rc<Machine>, result: EvalResult, scope: ScopeRef) {
        let mut result = result;
        loop {
            match result {
                EvalResult::Value { key, values } => {
                    let mut stack = machine.stack.borrow_mut();
                    match stack.last_mut() {
                        None => {
                            drop(stack);
                            *machine.terminal.borrow_mut() =
                                Some(EvalResult::Value { key, values });
                        }
                        Some(parent) => {
                            for value in values {
                                parent.acc.accept(key.as_deref(), value);
                            }
                        }
                    }
                    return;
                }

                EvalResult::Error(error) => {
                    enum ErrorFlow {
                        Intercepted,
                        Forward(EvalError),
                        Terminal(EvalError),
                    }
                    let flow = {
                        let mut stack = machine.stack.borrow_mut();
                        match stack.last_mut() {
                            None => ErrorFlow::Terminal(error),
                            Some(parent) => {
                                let intercepts = matches!(
                                    &parent.kind,
                                    FrameKind::Node(n)
                                        if matches!(n.kind, NodeKind::SpecialOperator { .. })
                                );
                                if intercepts {
                                    // The special operator's handler still
                                    // runs and sees the recorded error
                                    parent.next = parent.children.len();
                                    parent.acc.set_error(error);
                                    ErrorFlow::Intercepted
                                } else {
                                    stack.pop();
                                    ErrorFlow::Forward(error)
                                }
                            }
                        }
                    };
                    match flow {
                        ErrorFlow::Intercepted => return,
                        ErrorFlow::Forward(error) => {
                            result = EvalResult::Error(error);
                            continue;
                        }
                        ErrorFlow::Terminal(error) => {
                            *machine.terminal.borrow_mut() = Some(EvalResult::Error(error));
                            return;
                        }
                    }
                }

                EvalResult::Push(request) => {
                    machine.stack.borrow_mut().push(Frame {
                        kind: FrameKind::Push(request.on_complete),
                        scope: scope.clone(),
                        children: request.nodes,
                        next: 0,
                        acc: ChildResults::new(),
                    });
                    return;
                }

                EvalResult::Async(proxy) => {
                    machine.waiting.set(true);
                    let resumed = machine.clone();
                    let resume_scope = scope.clone();
                    proxy.on_completed(move |completion| {
                        // A suspension completing with another suspension
                        // violates the async contract
                        let completion = match completion {
                            EvalResult::Async(_) => EvalResult::error(Error::AsyncContract),
                            other => other,
                        };
                        resumed
                            .injected
                            .borrow_mut()
                            .push_back((completion, resume_scope.clone()));
                        Machine::drive(&resumed);
                    });
                    return;
                }
            }
        }
    }
}
