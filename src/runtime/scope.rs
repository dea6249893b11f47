use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::Value;

/// Shared handle to a scope
pub type ScopeRef = Rc<RefCell<Scope>>;

/// One link in the lexically nested scope chain
///
/// Lookup walks the chain to the root. Assignment writes into the innermost
/// scope that currently holds the name, falling back to the scope it was
/// issued in. Child scopes hold a non-owning view of their parent and live
/// exactly as long as the frame or lambda call that owns them.
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    /// Creates a root scope
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope::default()))
    }

    /// Creates a scope whose parent is `parent`
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
        }))
    }

    /// Looks a name up, walking the chain to the root
    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = scope.clone();
        loop {
            let next = {
                let borrowed = current.borrow();
                if let Some(value) = borrowed.vars.get(name) {
                    return Some(value.clone());
                }
                borrowed.parent.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Writes into the innermost scope holding `name`, or into `scope`
    /// itself when no scope in the chain holds it yet
    pub fn assign(scope: &ScopeRef, name: &str, value: Value) {
        let mut current = scope.clone();
        loop {
            let next = {
                let mut borrowed = current.borrow_mut();
                if borrowed.vars.contains_key(name) {
                    borrowed.vars.insert(name.to_string(), value);
                    return;
                }
                borrowed.parent.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => break,
            }
        }
        scope.borrow_mut().vars.insert(name.to_string(), value);
    }

    /// Defines a name directly in `scope`, shadowing any outer binding
    pub fn define(scope: &ScopeRef, name: impl Into<String>, value: Value) {
        scope.borrow_mut().vars.insert(name.into(), value);
    }

    /// True when `scope` itself (not a parent) holds the name
    pub fn holds(scope: &ScopeRef, name: &str) -> bool {
        scope.borrow().vars.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let scope = Scope::root();
        Scope::define(&scope, "x", Value::Int(42));
        assert_eq!(Scope::lookup(&scope, "x"), Some(Value::Int(42)));
        assert_eq!(Scope::lookup(&scope, "missing"), None);
    }

    #[test]
    fn test_lookup_walks_chain() {
        let root = Scope::root();
        Scope::define(&root, "x", Value::Int(1));
        let inner = Scope::child(&root);
        assert_eq!(Scope::lookup(&inner, "x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_shadowing() {
        let root = Scope::root();
        Scope::define(&root, "x", Value::Int(1));
        let inner = Scope::child(&root);
        Scope::define(&inner, "x", Value::Int(2));
        assert_eq!(Scope::lookup(&inner, "x"), Some(Value::Int(2)));
        assert_eq!(Scope::lookup(&root, "x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_assign_updates_innermost_holder() {
        let root = Scope::root();
        Scope::define(&root, "x", Value::Int(1));
        let inner = Scope::child(&root);
        Scope::assign(&inner, "x", Value::Int(9));

        // The root binding was updated, not shadowed
        assert_eq!(Scope::lookup(&root, "x"), Some(Value::Int(9)));
        assert!(!Scope::holds(&inner, "x"));
    }

    #[test]
    fn test_assign_unknown_lands_in_current_scope() {
        let root = Scope::root();
        let inner = Scope::child(&root);
        Scope::assign(&inner, "y", Value::Int(5));
        assert!(Scope::holds(&inner, "y"));
        assert_eq!(Scope::lookup(&root, "y"), None);
    }
}
