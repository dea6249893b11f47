use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::runtime::Value;

/// Which node kinds a child collection admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Any node kind
    All,
    /// Any node kind except KeyValue
    NoKeyValue,
    /// KeyValue nodes only
    KeyValueOnly,
}

/// Ordered child nodes plus a key index for KeyValue children
///
/// The admissibility policy is fixed at construction and enforced on every
/// insertion. Inserting a KeyValue child whose key already exists keeps both
/// nodes in the sequence but repoints the key to the newest one.
#[derive(Debug, Clone)]
pub struct NodeChildren {
    nodes: Vec<Rc<Node>>,
    keyed: HashMap<String, usize>,
    policy: ChildPolicy,
}

impl NodeChildren {
    /// Creates an empty collection with the given admissibility policy
    pub fn new(policy: ChildPolicy) -> Self {
        NodeChildren {
            nodes: Vec::new(),
            keyed: HashMap::new(),
            policy,
        }
    }

    /// The collection's admissibility policy
    pub fn policy(&self) -> ChildPolicy {
        self.policy
    }

    /// Appends a child, enforcing the admissibility policy
    pub fn push(&mut self, node: Rc<Node>) -> Result<()> {
        let is_kv = node.is_key_value();
        match self.policy {
            ChildPolicy::All => {}
            ChildPolicy::NoKeyValue if is_kv => {
                return Err(Error::internal("key-value child not admitted here"));
            }
            ChildPolicy::KeyValueOnly if !is_kv => {
                return Err(Error::internal("only key-value children admitted here"));
            }
            _ => {}
        }
        if let NodeKind::KeyValue { id, .. } = &node.kind {
            self.keyed.insert(id.clone(), self.nodes.len());
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the collection holds no children
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child at the given position
    pub fn get(&self, index: usize) -> Option<&Rc<Node>> {
        self.nodes.get(index)
    }

    /// Latest KeyValue child registered under the given key
    pub fn by_key(&self, key: &str) -> Option<&Rc<Node>> {
        self.keyed.get(key).map(|&i| &self.nodes[i])
    }

    /// Last child, if any
    pub fn last(&self) -> Option<&Rc<Node>> {
        self.nodes.last()
    }

    /// Removes and returns the last child
    pub fn pop(&mut self) -> Option<Rc<Node>> {
        let node = self.nodes.pop()?;
        if let NodeKind::KeyValue { id, .. } = &node.kind {
            if self.keyed.get(id) == Some(&self.nodes.len()) {
                self.keyed.remove(id);
            }
        }
        Some(node)
    }

    /// Iterates the children in order
    pub fn iter(&self) -> std::slice::Iter<'_, Rc<Node>> {
        self.nodes.iter()
    }

    /// The children as a slice
    pub fn as_slice(&self) -> &[Rc<Node>] {
        &self.nodes
    }

    /// Consumes the collection, returning the ordered children
    pub fn into_nodes(self) -> Vec<Rc<Node>> {
        self.nodes
    }
}

impl PartialEq for NodeChildren {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<'a> IntoIterator for &'a NodeChildren {
    type Item = &'a Rc<Node>;
    type IntoIter = std::slice::Iter<'a, Rc<Node>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Kind-specific node state
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `(id args…)` call
    Operator {
        /// Operator id
        id: String,
    },
    /// `ID(args…)` call whose Prepare hook already ran; `hidden` children
    /// are never evaluated by the driver
    SpecialOperator {
        /// Operator id
        id: String,
        /// Latent children manipulated by the handler at run time
        hidden: NodeChildren,
    },
    /// `#(…)` filter, possibly linked into a chain
    Filter {
        /// Filter id
        id: String,
        /// True when this filter continues the previous sibling's chain
        chained: bool,
        /// Next filter in the chain, owned by this node
        next: Option<Box<Node>>,
    },
    /// Bare name
    Identifier {
        /// Name, copied from the source token
        name: String,
    },
    /// Pre-parsed literal value
    Literal {
        /// The stored value
        value: Value,
    },
    /// `{id children…}` keyed value
    KeyValue {
        /// Key name
        id: String,
        /// Tags attached to this entry
        tags: Vec<String>,
    },
    /// `{{…}}` object literal: KeyValue children plus tags
    ObjectLiteral {
        /// Tags attached to the literal
        tags: Vec<String>,
    },
    /// `[…]` list
    List,
    /// `FN([params] body…)` function literal
    Function {
        /// Parameter names in order
        params: Vec<String>,
    },
}

/// A parsed expression node
///
/// Nodes are built by the parser and immutable during evaluation; the only
/// rewrite point is a special operator's Prepare hook, which replaces the
/// node before it is inserted into its parent.
#[derive(Debug, Clone)]
pub struct Node {
    /// Kind-specific state
    pub kind: NodeKind,
    /// Source token this node came from, when one exists
    pub token: Option<Token>,
    /// Evaluated (public) children
    pub children: NodeChildren,
}

impl Node {
    /// Creates a node with an empty child collection of the kind's policy
    pub fn new(kind: NodeKind, token: Option<Token>) -> Self {
        let policy = match &kind {
            NodeKind::ObjectLiteral { .. } => ChildPolicy::KeyValueOnly,
            NodeKind::List => ChildPolicy::NoKeyValue,
            _ => ChildPolicy::All,
        };
        Node {
            kind,
            token,
            children: NodeChildren::new(policy),
        }
    }

    /// Creates a literal node holding a pre-parsed value
    pub fn literal(value: Value) -> Self {
        Node::new(NodeKind::Literal { value }, None)
    }

    /// Creates an identifier node
    pub fn identifier(name: impl Into<String>) -> Self {
        Node::new(
            NodeKind::Identifier {
                name: name.into(),
            },
            None,
        )
    }

    /// Creates an operator node with the given id
    pub fn operator(id: impl Into<String>) -> Self {
        Node::new(NodeKind::Operator { id: id.into() }, None)
    }

    /// The node's operator/key id, when it has one
    pub fn id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Operator { id }
            | NodeKind::SpecialOperator { id, .. }
            | NodeKind::Filter { id, .. }
            | NodeKind::KeyValue { id, .. } => Some(id),
            _ => None,
        }
    }

    /// True for KeyValue nodes
    pub fn is_key_value(&self) -> bool {
        matches!(self.kind, NodeKind::KeyValue { .. })
    }

    /// The children the evaluator walks for this node
    ///
    /// A Function node reports none: its body is latent, executed only when
    /// the lambda is called. A SpecialOperator's hidden collection is never
    /// part of this enumeration.
    pub fn eval_children(&self) -> &[Rc<Node>] {
        match &self.kind {
            NodeKind::Function { .. } => &[],
            _ => self.children.as_slice(),
        }
    }

    /// Hidden child collection of a SpecialOperator node
    pub fn hidden(&self) -> Option<&NodeChildren> {
        match &self.kind {
            NodeKind::SpecialOperator { hidden, .. } => Some(hidden),
            _ => None,
        }
    }

    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Operator { id } => format!("({})", id),
            NodeKind::SpecialOperator { id, .. } => format!("{}(…)", id),
            NodeKind::Filter { .. } => "#(…)".to_string(),
            NodeKind::Identifier { name } => name.clone(),
            NodeKind::Literal { value } => value.type_name().to_string(),
            NodeKind::KeyValue { id, .. } => format!("{{{}}}", id),
            NodeKind::ObjectLiteral { .. } => "{{…}}".to_string(),
            NodeKind::List => "[…]".to_string(),
            NodeKind::Function { .. } => "FN".to_string(),
        }
    }
}

// Structural equality ignores source-token positions
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.children == other.children
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
