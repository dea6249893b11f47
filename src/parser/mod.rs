//! AST construction for Losp
//!
//! Tokens become a tree of nodes; special operators get their Prepare hook
//! invoked as their frame closes, so the tree the evaluator sees is already
//! restructured.

mod ast;
mod builder;

pub use ast::{ChildPolicy, Node, NodeChildren, NodeKind};
pub use builder::AstBuilder;
