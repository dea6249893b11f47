//! Pretty-printing for ASTs and values
//!
//! The node form is an indented serialisation that parses back to a
//! structurally equal tree (special-operator rewrites excepted, since their
//! Prepare hooks rearrange children irreversibly). The value forms are the
//! REPL renderings: lists as `[v1 v2 …]`, objects as `{key value}` entries
//! joined by spaces, and a `<type>`-annotated variant.

use crate::parser::{Node, NodeKind};
use crate::runtime::{format_float, Value};

/// Renders a node as re-parseable, indented source text
pub fn render_node(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

/// Renders a value in REPL form
pub fn render_value(value: &Value) -> String {
    value.to_string()
}

/// Renders a value with each atom prefixed by its type
pub fn render_value_typed(value: &Value) -> String {
    match value {
        Value::List(items) => {
            let body = items
                .iter()
                .map(render_value_typed)
                .collect::<Vec<_>>()
                .join(" ");
            format!("[{}]", body)
        }
        Value::Scriptable(obj) => obj
            .keys()
            .iter()
            .map(|key| {
                let entry = obj.get(key).unwrap_or(Value::Null);
                format!("{{{} {}}}", key, render_value_typed(&entry))
            })
            .collect::<Vec<_>>()
            .join(" "),
        atom => format!("<{}>{}", atom.type_name(), atom),
    }
}

fn is_leaf(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Literal { .. } | NodeKind::Identifier { .. }
    )
}

fn indent_of(level: usize) -> String {
    "  ".repeat(level)
}

/// Joins a body and its closing bracket, spacing them apart when the two
/// would otherwise lex as a double-curly token
fn close(out: &mut String, closer: &str) {
    if out.ends_with('}') && closer.starts_with('}') {
        out.push(' ');
    }
    out.push_str(closer);
}

fn write_children(out: &mut String, node: &Node, level: usize, lead: bool) {
    let inline = node.children.iter().all(|child| is_leaf(child));
    let mut first = !lead;
    if inline {
        for child in &node.children {
            if !first || lead {
                out.push(' ');
            }
            first = false;
            write_node(out, child, level);
        }
    } else {
        for child in &node.children {
            out.push('\n');
            out.push_str(&indent_of(level + 1));
            write_node(out, child, level + 1);
        }
    }
}

fn write_node(out: &mut String, node: &Node, level: usize) {
    match &node.kind {
        NodeKind::Literal { value } => out.push_str(&literal_text(value)),

        NodeKind::Identifier { name } => out.push_str(name),

        NodeKind::Operator { id } => {
            out.push('(');
            out.push_str(id);
            write_children(out, node, level, true);
            close(out, ")");
        }

        NodeKind::SpecialOperator { id, hidden } => {
            // Public children first, then the latent ones; the original
            // pre-rewrite order is not recoverable
            out.push_str(id);
            out.push('(');
            let mut parts = Vec::new();
            for child in node.children.iter().chain(hidden.iter()) {
                parts.push(render_node(child));
            }
            out.push_str(&parts.join(" "));
            close(out, ")");
        }

        NodeKind::Filter { chained, next, .. } => {
            out.push_str(if *chained { "%(" } else { "#(" });
            write_children(out, node, level, false);
            close(out, ")");
            if let Some(link) = next {
                write_node(out, link, level);
            }
        }

        NodeKind::KeyValue { id, tags } => {
            out.push('{');
            out.push_str(id);
            for tag in tags {
                out.push_str(" #");
                out.push_str(tag);
            }
            write_children(out, node, level, true);
            if !node.children.iter().all(|child| is_leaf(child)) {
                out.push('\n');
                out.push_str(&indent_of(level));
            }
            close(out, "}");
        }

        NodeKind::ObjectLiteral { tags } => {
            out.push_str("{{");
            for (i, tag) in tags.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push('#');
                out.push_str(tag);
            }
            write_children(out, node, level, !tags.is_empty());
            if !node.children.is_empty() {
                out.push('\n');
                out.push_str(&indent_of(level));
            }
            close(out, "}}");
        }

        NodeKind::List => {
            out.push('[');
            write_children(out, node, level, false);
            if !node.children.iter().all(|child| is_leaf(child)) {
                out.push('\n');
                out.push_str(&indent_of(level));
            }
            close(out, "]");
        }

        NodeKind::Function { params } => {
            out.push_str("FN([");
            out.push_str(&params.join(" "));
            out.push(']');
            write_children(out, node, level, true);
            close(out, ")");
        }
    }
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => format_float(*f),
        Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_literal_forms() {
        assert_eq!(literal_text(&Value::Int(5)), "5");
        assert_eq!(literal_text(&Value::Float(5.0)), "5.0");
        assert_eq!(literal_text(&Value::Bool(true)), "true");
        assert_eq!(literal_text(&Value::Null), "null");
        assert_eq!(
            literal_text(&Value::String("say \"hi\"".to_string())),
            r#""say \"hi\"""#
        );
    }

    #[test]
    fn test_inline_operator() {
        let mut node = Node::operator("+");
        node.children
            .push(Rc::new(Node::literal(Value::Int(5))))
            .unwrap();
        node.children
            .push(Rc::new(Node::literal(Value::Int(6))))
            .unwrap();
        assert_eq!(render_node(&node), "(+ 5 6)");
    }

    #[test]
    fn test_typed_rendering() {
        assert_eq!(render_value_typed(&Value::Int(5)), "<int>5");
        let list = Value::list(vec![Value::Int(1), Value::Bool(true)]);
        assert_eq!(render_value_typed(&list), "[<int>1 <bool>true]");
    }
}
