//! String operators

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::ops::{OperatorHandler, OperatorRegistry, Services};
use crate::parser::Node;
use crate::runtime::{ChildResults, EvalResult, ScopeRef, Value};

/// Registers the string operators
pub fn register(registry: &mut OperatorRegistry) {
    registry.register_builtin(ConcatOperator);
    registry.register_builtin(LineOperator);
    registry.register_builtin(StrIntOperator);
    registry.register_builtin(ToStrOperator);
    registry.register_builtin(AffixOperator { mode: AffixMode::Starts });
    registry.register_builtin(AffixOperator { mode: AffixMode::Ends });
    registry.register_builtin(AffixOperator {
        mode: AffixMode::Contains,
    });
}

/// `CONCAT` joins the string forms of its unkeyed arguments, with an
/// optional `delim` keyed string between them
pub struct ConcatOperator;

impl OperatorHandler for ConcatOperator {
    fn name(&self) -> &str {
        "CONCAT"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        let delim = match args.keyed_str("delim") {
            Ok(delim) => delim.unwrap_or("").to_string(),
            Err(error) => return EvalResult::error(error),
        };
        let joined = args
            .unkeyed_values()
            .iter()
            .map(Value::to_text)
            .collect::<Vec<_>>()
            .join(&delim);
        EvalResult::emit(Value::String(joined))
    }
}

/// `LINE` emits the platform newline
pub struct LineOperator;

impl OperatorHandler for LineOperator {
    fn name(&self) -> &str {
        "LINE"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        _args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        let newline = if cfg!(windows) { "\r\n" } else { "\n" };
        EvalResult::emit(Value::String(newline.to_string()))
    }
}

/// `STR-INT` parses a string into an int
pub struct StrIntOperator;

impl OperatorHandler for StrIntOperator {
    fn name(&self) -> &str {
        "STR-INT"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        let text = match args.str_at(0) {
            Ok(text) => text,
            Err(error) => return EvalResult::error(error),
        };
        match text.trim().parse::<i32>() {
            Ok(n) => EvalResult::emit(Value::Int(n)),
            Err(_) => EvalResult::error(Error::TypeMismatch {
                index: 0,
                expected: "int-formatted string".to_string(),
                got: "string".to_string(),
            }),
        }
    }
}

/// `TO-STR` stringifies each child
pub struct ToStrOperator;

impl OperatorHandler for ToStrOperator {
    fn name(&self) -> &str {
        "TO-STR"
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        EvalResult::emit_all(
            args.values()
                .iter()
                .map(|v| Value::String(v.to_text()))
                .collect(),
        )
    }
}

#[derive(Clone, Copy)]
enum AffixMode {
    Starts,
    Ends,
    Contains,
}

/// `STARTS`/`ENDS`/`CONTAINS` test two strings, with keyed options `case`
/// (true = ordinal) or `i` (true = ignore case)
pub struct AffixOperator {
    mode: AffixMode,
}

impl AffixOperator {
    fn execute(&self, args: &ChildResults) -> Result<Value> {
        if args.unkeyed_len() != 2 {
            return Err(Error::ArityExact {
                expected: 2,
                got: args.unkeyed_len(),
            });
        }
        let haystack = args.str_at(0)?;
        let needle = args.str_at(1)?;

        let sensitive = match (args.keyed_bool("case")?, args.keyed_bool("i")?) {
            (Some(case), _) => case,
            (None, Some(ignore)) => !ignore,
            (None, None) => true,
        };

        let (haystack, needle) = if sensitive {
            (haystack.to_string(), needle.to_string())
        } else {
            (haystack.to_lowercase(), needle.to_lowercase())
        };

        let outcome = match self.mode {
            AffixMode::Starts => haystack.starts_with(&needle),
            AffixMode::Ends => haystack.ends_with(&needle),
            AffixMode::Contains => haystack.contains(&needle),
        };
        Ok(Value::Bool(outcome))
    }
}

impl OperatorHandler for AffixOperator {
    fn name(&self) -> &str {
        match self.mode {
            AffixMode::Starts => "STARTS",
            AffixMode::Ends => "ENDS",
            AffixMode::Contains => "CONTAINS",
        }
    }

    fn run(
        &self,
        _scope: &ScopeRef,
        _node: &Rc<Node>,
        args: &ChildResults,
        _services: &Services,
    ) -> EvalResult {
        match self.execute(args) {
            Ok(value) => EvalResult::emit(value),
            Err(error) => EvalResult::error(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affix_case_options() {
        let op = AffixOperator {
            mode: AffixMode::Starts,
        };

        let mut args = ChildResults::new();
        args.accept(None, Value::String("Hello".to_string()));
        args.accept(None, Value::String("he".to_string()));
        assert_eq!(op.execute(&args).unwrap(), Value::Bool(false));

        args.accept(Some("i"), Value::Bool(true));
        assert_eq!(op.execute(&args).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_contains() {
        let op = AffixOperator {
            mode: AffixMode::Contains,
        };
        let args = ChildResults::from_values(vec![
            Value::String("scripting".to_string()),
            Value::String("rip".to_string()),
        ]);
        assert_eq!(op.execute(&args).unwrap(), Value::Bool(true));
    }
}
