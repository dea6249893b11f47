use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::ops::OperatorRegistry;
use crate::parser::ast::{Node, NodeKind};
use crate::runtime::Value;

/// Parse state of one builder frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Operator,
    SpecialOperator,
    Filter,
    ObjectLiteral,
    KeyValue,
    List,
    Function,
    FunctionParams,
}

struct BuildFrame {
    state: ParseState,
    node: Node,
    /// For SpecialOperator/Filter frames: whether the opening `(` that
    /// belongs to the frame has been consumed
    opened: bool,
    /// For Filter frames: link into the previous sibling's chain on close
    chained: bool,
    /// For Function frames: the parameter list has been captured
    params_done: bool,
    /// For FunctionParams frames: accumulated parameter names
    params: Vec<String>,
}

impl BuildFrame {
    fn new(state: ParseState, node: Node) -> Self {
        BuildFrame {
            state,
            node,
            opened: false,
            chained: false,
            params_done: false,
            params: Vec::new(),
        }
    }
}

/// Builds the AST from the token stream
///
/// A small pushdown automaton: each parse state owns a table of allowed
/// (previous, current) token pairs, and a disallowed pair is a fatal syntax
/// error naming the offending character. The input is wrapped in a synthetic
/// outer list so multiple top-level expressions are permitted; when the
/// outer list ends up with exactly one child, that child is the root.
pub struct AstBuilder<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    registry: &'a OperatorRegistry,
}

impl<'a> AstBuilder<'a> {
    /// Creates a builder over scanned tokens
    pub fn new(source: &'a str, tokens: Vec<Token>, registry: &'a OperatorRegistry) -> Self {
        AstBuilder {
            source,
            tokens,
            registry,
        }
    }

    /// Builds the tree
    pub fn build(mut self) -> Result<Rc<Node>> {
        let tokens = std::mem::take(&mut self.tokens);
        let mut stack = vec![BuildFrame::new(
            ParseState::List,
            Node::new(NodeKind::List, None),
        )];
        // The synthetic outer `[` is the previous token for the first real one
        let mut prev = TokenKind::LBracket;

        for token in &tokens {
            self.check_pair(&stack, prev, token)?;
            self.accept(&mut stack, prev, token)?;
            prev = token.kind;
        }

        if stack.len() != 1 {
            return Err(Error::UnexpectedEnd(
                "unbalanced brackets at end of input".to_string(),
            ));
        }
        let frame = match stack.pop() {
            Some(frame) => frame,
            None => return Err(Error::internal("builder stack drained")),
        };
        let mut root = frame.node;
        if root.children.len() == 1 {
            match root.children.pop() {
                Some(child) => Ok(child),
                None => Err(Error::internal("root child vanished")),
            }
        } else {
            Ok(Rc::new(root))
        }
    }

    fn check_pair(&self, stack: &[BuildFrame], prev: TokenKind, token: &Token) -> Result<()> {
        let top = stack
            .last()
            .ok_or_else(|| Error::internal("builder stack drained"))?;
        if Self::pair_allowed(top, prev, token.kind) {
            Ok(())
        } else {
            Err(self.offending(token))
        }
    }

    /// The allowed (previous, current) pair table for the frame's state
    fn pair_allowed(frame: &BuildFrame, prev: TokenKind, curr: TokenKind) -> bool {
        use TokenKind::*;

        let starts_child = |k: TokenKind| {
            matches!(
                k,
                LParen
                    | LBracket
                    | LCurly
                    | DblLCurly
                    | SpecialOperatorSymbol
                    | LeftInitFilter
                    | LeftChainFilter
                    | LeftInitFunc
                    | String
                    | Int
                    | Float
                    | Bool
                    | Null
                    | Symbol
            )
        };

        match frame.state {
            ParseState::Operator => match prev {
                // The token after `(` gives the operator id; numeric ids
                // cover the truthiness operators
                LParen => matches!(curr, Symbol | Int),
                _ => starts_child(curr) || curr == RParen,
            },
            ParseState::SpecialOperator => {
                if !frame.opened {
                    curr == LParen
                } else {
                    starts_child(curr) || curr == RParen
                }
            }
            ParseState::Filter => {
                if !frame.opened {
                    curr == LParen
                } else {
                    starts_child(curr) || curr == RParen
                }
            }
            ParseState::ObjectLiteral => match curr {
                // Tags lead the literal
                Tag => matches!(prev, DblLCurly | Tag),
                LCurly | DblRCurly => true,
                _ => false,
            },
            ParseState::KeyValue => match prev {
                LCurly => matches!(curr, Symbol | Tag),
                _ => starts_child(curr) || matches!(curr, RCurly | Tag),
            },
            ParseState::List => (starts_child(curr) && curr != LCurly) || curr == RBracket,
            ParseState::Function => match prev {
                LeftInitFunc => curr == LBracket,
                _ => starts_child(curr) || curr == RParen,
            },
            ParseState::FunctionParams => matches!(curr, Symbol | RBracket),
        }
    }

    fn accept(&self, stack: &mut Vec<BuildFrame>, prev: TokenKind, token: &Token) -> Result<()> {
        use TokenKind::*;

        match token.kind {
            LParen => {
                let top = self.top_mut(stack)?;
                if matches!(top.state, ParseState::SpecialOperator | ParseState::Filter)
                    && !top.opened
                {
                    // The `(` belongs to the already-pushed frame
                    top.opened = true;
                } else {
                    stack.push(BuildFrame::new(
                        ParseState::Operator,
                        Node::new(
                            NodeKind::Operator {
                                id: std::string::String::new(),
                            },
                            Some(*token),
                        ),
                    ));
                }
            }

            LBracket => {
                let top = self.top_mut(stack)?;
                if top.state == ParseState::Function && !top.params_done {
                    stack.push(BuildFrame::new(
                        ParseState::FunctionParams,
                        Node::new(NodeKind::List, Some(*token)),
                    ));
                } else {
                    stack.push(BuildFrame::new(
                        ParseState::List,
                        Node::new(NodeKind::List, Some(*token)),
                    ));
                }
            }

            RBracket => {
                let state = self.top_mut(stack)?.state;
                match state {
                    ParseState::FunctionParams => {
                        let frame = self.pop(stack)?;
                        let top = self.top_mut(stack)?;
                        if let NodeKind::Function { params } = &mut top.node.kind {
                            *params = frame.params;
                        }
                        top.params_done = true;
                    }
                    ParseState::List => {
                        if stack.len() == 1 {
                            // Only the synthetic outer list is left
                            return Err(self.offending(token));
                        }
                        let frame = self.pop(stack)?;
                        self.add_child(stack, frame.node, token)?;
                    }
                    _ => return Err(self.offending(token)),
                }
            }

            LCurly => {
                stack.push(BuildFrame::new(
                    ParseState::KeyValue,
                    Node::new(
                        NodeKind::KeyValue {
                            id: std::string::String::new(),
                            tags: Vec::new(),
                        },
                        Some(*token),
                    ),
                ));
            }

            RCurly => {
                let frame = self.pop(stack)?;
                if frame.state != ParseState::KeyValue {
                    return Err(self.offending(token));
                }
                if frame.node.id().map(str::is_empty).unwrap_or(true) {
                    return Err(Error::SyntaxError {
                        line: token.line,
                        col: token.column,
                        message: "key-value requires a key".to_string(),
                    });
                }
                self.add_child(stack, frame.node, token)?;
            }

            DblLCurly => {
                stack.push(BuildFrame::new(
                    ParseState::ObjectLiteral,
                    Node::new(NodeKind::ObjectLiteral { tags: Vec::new() }, Some(*token)),
                ));
            }

            DblRCurly => {
                let frame = self.pop(stack)?;
                if frame.state != ParseState::ObjectLiteral {
                    return Err(self.offending(token));
                }
                self.add_child(stack, frame.node, token)?;
            }

            RParen => {
                let frame = self.pop(stack)?;
                match frame.state {
                    ParseState::Operator | ParseState::Function => {
                        self.add_child(stack, frame.node, token)?;
                    }
                    ParseState::SpecialOperator => {
                        let id = frame.node.id().unwrap_or_default().to_string();
                        let handler =
                            self.registry.try_get_special_operator(&id).ok_or_else(|| {
                                Error::SyntaxError {
                                    line: token.line,
                                    col: token.column,
                                    message: format!("unknown special operator {}", id),
                                }
                            })?;
                        let prepared = handler.prepare(frame.node)?;
                        self.add_child(stack, prepared, token)?;
                    }
                    ParseState::Filter => {
                        if frame.chained {
                            self.link_chained_filter(stack, frame.node, token)?;
                        } else {
                            self.add_child(stack, frame.node, token)?;
                        }
                    }
                    _ => return Err(self.offending(token)),
                }
            }

            SpecialOperatorSymbol => {
                let id = token.lexeme(self.source).to_string();
                stack.push(BuildFrame::new(
                    ParseState::SpecialOperator,
                    Node::new(NodeKind::Operator { id }, Some(*token)),
                ));
            }

            LeftInitFilter | LeftChainFilter => {
                let chained = token.kind == LeftChainFilter || prev == RParen;
                let mut frame = BuildFrame::new(
                    ParseState::Filter,
                    Node::new(
                        NodeKind::Filter {
                            id: "#".to_string(),
                            chained,
                            next: None,
                        },
                        Some(*token),
                    ),
                );
                frame.chained = chained;
                stack.push(frame);
            }

            LeftInitFunc => {
                stack.push(BuildFrame::new(
                    ParseState::Function,
                    Node::new(NodeKind::Function { params: Vec::new() }, Some(*token)),
                ));
            }

            String | Int | Float | Bool | Null => {
                // An int in operator-id position names the operator
                let top = self.top_mut(stack)?;
                if token.kind == Int && top.state == ParseState::Operator {
                    if let NodeKind::Operator { id } = &mut top.node.kind {
                        if id.is_empty() {
                            *id = token.lexeme(self.source).to_string();
                            return Ok(());
                        }
                    }
                }
                let value = self.parse_literal(token)?;
                let mut node = Node::literal(value);
                node.token = Some(*token);
                self.add_child(stack, node, token)?;
            }

            Symbol => {
                let name = token.lexeme(self.source).to_string();
                let top = self.top_mut(stack)?;
                match top.state {
                    ParseState::Operator => {
                        if let NodeKind::Operator { id } = &mut top.node.kind {
                            if id.is_empty() {
                                *id = name;
                                return Ok(());
                            }
                        }
                        let mut node = Node::identifier(name);
                        node.token = Some(*token);
                        self.add_child(stack, node, token)?;
                    }
                    ParseState::KeyValue => {
                        if let NodeKind::KeyValue { id, .. } = &mut top.node.kind {
                            if id.is_empty() {
                                *id = name;
                                return Ok(());
                            }
                        }
                        let mut node = Node::identifier(name);
                        node.token = Some(*token);
                        self.add_child(stack, node, token)?;
                    }
                    ParseState::FunctionParams => {
                        top.params.push(name);
                    }
                    _ => {
                        let mut node = Node::identifier(name);
                        node.token = Some(*token);
                        self.add_child(stack, node, token)?;
                    }
                }
            }

            Tag => {
                let tag = token.lexeme(self.source).to_string();
                let top = self.top_mut(stack)?;
                match &mut top.node.kind {
                    NodeKind::ObjectLiteral { tags } => tags.push(tag),
                    NodeKind::KeyValue { tags, .. } => tags.push(tag),
                    _ => return Err(self.offending(token)),
                }
            }
        }

        Ok(())
    }

    /// Links a chained filter onto the last sibling's chain; when the last
    /// sibling is not a filter, the node becomes a fresh non-chained filter
    fn link_chained_filter(
        &self,
        stack: &mut Vec<BuildFrame>,
        mut node: Node,
        token: &Token,
    ) -> Result<()> {
        let top = self.top_mut(stack)?;
        let last_is_filter = top
            .node
            .children
            .last()
            .map(|n| matches!(n.kind, NodeKind::Filter { .. }))
            .unwrap_or(false);

        if last_is_filter {
            let last = top
                .node
                .children
                .pop()
                .ok_or_else(|| Error::internal("sibling filter vanished"))?;
            let mut owner = Rc::try_unwrap(last)
                .map_err(|_| Error::internal("filter sibling aliased during build"))?;
            Self::append_chain(&mut owner, node)?;
            top.node
                .children
                .push(Rc::new(owner))
                .map_err(|_| self.offending(token))?;
            Ok(())
        } else {
            if let NodeKind::Filter { chained, .. } = &mut node.kind {
                *chained = false;
            }
            self.add_child(stack, node, token)
        }
    }

    fn append_chain(node: &mut Node, new: Node) -> Result<()> {
        match &mut node.kind {
            NodeKind::Filter { next, .. } => match next {
                Some(link) => Self::append_chain(link, new),
                None => {
                    *next = Some(Box::new(new));
                    Ok(())
                }
            },
            _ => Err(Error::internal("filter chain link on non-filter node")),
        }
    }

    fn add_child(&self, stack: &mut Vec<BuildFrame>, node: Node, token: &Token) -> Result<()> {
        let top = self.top_mut(stack)?;
        top.node
            .children
            .push(Rc::new(node))
            .map_err(|_| self.offending(token))
    }

    fn top_mut<'s>(&self, stack: &'s mut Vec<BuildFrame>) -> Result<&'s mut BuildFrame> {
        stack
            .last_mut()
            .ok_or_else(|| Error::internal("builder stack drained"))
    }

    fn pop(&self, stack: &mut Vec<BuildFrame>) -> Result<BuildFrame> {
        stack
            .pop()
            .ok_or_else(|| Error::internal("builder stack drained"))
    }

    fn parse_literal(&self, token: &Token) -> Result<Value> {
        let text = token.lexeme(self.source);
        match token.kind {
            TokenKind::String => {
                let quote = text
                    .chars()
                    .next()
                    .ok_or_else(|| Error::internal("empty string token"))?;
                let body = &text[1..text.len() - 1];
                Ok(Value::String(
                    body.replace(&format!("\\{}", quote), &quote.to_string()),
                ))
            }
            TokenKind::Int => text
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|_| Error::internal(format!("int token failed to parse: {}", text))),
            TokenKind::Float => text
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|_| Error::internal(format!("float token failed to parse: {}", text))),
            TokenKind::Bool => Ok(Value::Bool(text == "true")),
            TokenKind::Null => Ok(Value::Null),
            _ => Err(Error::internal("literal token expected")),
        }
    }

    /// Syntax error naming the offending character with a nearby excerpt
    fn offending(&self, token: &Token) -> Error {
        let excerpt: String = self.source[token.start..].chars().take(16).collect();
        Error::SyntaxError {
            line: token.line,
            col: token.column,
            message: format!("unexpected {} near '{}'", token.kind, excerpt),
        }
    }
}
