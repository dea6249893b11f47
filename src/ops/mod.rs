//! Operator system for Losp
//!
//! Operators are looked up by name at evaluation time. Standard operators
//! receive the scope, their node, and the accumulated child results; special
//! operators additionally own a Prepare hook that restructures their subtree
//! at parse time.

pub mod stdlib;

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Timer};

/// Names of the builtin special operators, exposed so the scanner can
/// classify special-operator prefixes
pub const BUILTIN_SPECIAL_NAMES: &[&str] = &["IF", "FOR", "FORI", "++", "--", "=", "WAIT"];

/// Prefix reserved for builtin operator names
pub const RESERVED_PREFIX: &str = "LOSP:";

/// Ambient services handed to operator handlers
#[derive(Clone)]
pub struct Services {
    /// Host clock used by suspending operators
    pub timer: Rc<dyn Timer>,
}

/// A standard operator
pub trait OperatorHandler {
    /// Operator name as registered
    fn name(&self) -> &str;

    /// Executes the operator against its evaluated child results
    fn run(
        &self,
        scope: &ScopeRef,
        node: &Rc<Node>,
        args: &ChildResults,
        services: &Services,
    ) -> EvalResult;
}

/// A special operator: a standard handler plus a parse-time Prepare hook
pub trait SpecialOperatorHandler: OperatorHandler {
    /// Takes the built operator node and returns the SpecialOperator node
    /// that enters the tree instead, or rejects it with a message
    fn prepare(&self, node: Node) -> Result<Node>;
}

/// Which table a name resolved from
pub enum Resolved {
    /// A special operator
    Special(Rc<dyn SpecialOperatorHandler>),
    /// A standard operator (host-registered or builtin)
    Standard(Rc<dyn OperatorHandler>),
}

/// Name → handler tables
///
/// Specials live apart from standard operators and may not be shadowed.
/// Host registrations sit between the special table and the builtin
/// standard table; names starting with `LOSP:` bypass the host table.
pub struct OperatorRegistry {
    builtin: HashMap<String, Rc<dyn OperatorHandler>>,
    host: HashMap<String, Rc<dyn OperatorHandler>>,
    special: HashMap<String, Rc<dyn SpecialOperatorHandler>>,
}

impl OperatorRegistry {
    /// Creates a registry holding the builtin operator set
    pub fn new() -> Self {
        let mut registry = OperatorRegistry::empty();
        stdlib::register_all(&mut registry);
        registry
    }

    /// Creates an empty registry (for tests)
    pub fn empty() -> Self {
        OperatorRegistry {
            builtin: HashMap::new(),
            host: HashMap::new(),
            special: HashMap::new(),
        }
    }

    /// Registers a builtin standard operator
    pub(crate) fn register_builtin<T: OperatorHandler + 'static>(&mut self, handler: T) {
        let name = handler.name().to_string();
        self.builtin.insert(name, Rc::new(handler));
    }

    /// Registers a builtin special operator
    pub(crate) fn register_builtin_special<T: SpecialOperatorHandler + 'static>(
        &mut self,
        handler: T,
    ) {
        let name = handler.name().to_string();
        self.special.insert(name, Rc::new(handler));
    }

    /// Registers or overrides a host standard operator
    ///
    /// Names starting with `LOSP:` are reserved, and special operators may
    /// not be overridden.
    pub fn register_operator<T: OperatorHandler + 'static>(&mut self, handler: T) -> Result<()> {
        let name = handler.name().to_string();
        if name.starts_with(RESERVED_PREFIX) {
            return Err(Error::Registration {
                name,
                reason: format!("names starting with {} are reserved", RESERVED_PREFIX),
            });
        }
        if self.special.contains_key(&name) {
            return Err(Error::Registration {
                name,
                reason: "special operators may not be overridden".to_string(),
            });
        }
        self.host.insert(name, Rc::new(handler));
        Ok(())
    }

    /// Registers a host special operator
    ///
    /// The name must start with `$` and be at least two characters; existing
    /// specials may not be replaced.
    pub fn register_special_operator<T: SpecialOperatorHandler + 'static>(
        &mut self,
        handler: T,
    ) -> Result<()> {
        let name = handler.name().to_string();
        if !name.starts_with('$') || name.len() < 2 {
            return Err(Error::Registration {
                name,
                reason: "host special operators must start with $ and name at least one more character"
                    .to_string(),
            });
        }
        if self.special.contains_key(&name) {
            return Err(Error::Registration {
                name,
                reason: "special operators may not be overridden".to_string(),
            });
        }
        self.special.insert(name, Rc::new(handler));
        Ok(())
    }

    /// Looks a special operator up by name
    pub fn try_get_special_operator(&self, name: &str) -> Option<Rc<dyn SpecialOperatorHandler>> {
        self.special.get(name).cloned()
    }

    /// Looks a standard operator up by name, honouring the `LOSP:` bypass
    pub fn try_get_operator(&self, name: &str) -> Option<Rc<dyn OperatorHandler>> {
        if name.starts_with(RESERVED_PREFIX) {
            return self.builtin.get(name).cloned();
        }
        self.host
            .get(name)
            .or_else(|| self.builtin.get(name))
            .cloned()
    }

    /// Full resolution order: specials, then the standard tables
    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        if let Some(special) = self.special.get(name) {
            return Some(Resolved::Special(special.clone()));
        }
        self.try_get_operator(name).map(Resolved::Standard)
    }

    /// True when `name` names a registered special operator
    pub fn is_special(&self, name: &str) -> bool {
        self.special.contains_key(name)
    }

    /// All registered special-operator names
    pub fn special_names(&self) -> impl Iterator<Item = &str> {
        self.special.keys().map(String::as_str)
    }

    /// Number of registered operators across all tables
    pub fn count(&self) -> usize {
        self.builtin.len() + self.host.len() + self.special.len()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
