//! Property-based tests for the scanner, builder and evaluator
//!
//! These verify the language's structural laws: the parser never panics on
//! arbitrary input, evaluation is deterministic, integer arithmetic stays
//! integral until a float appears, truthiness follows its lattice, and
//! printing a parsed tree parses back to the same tree.

use losp::writer::render_node;
use losp::{EvalResult, Interpreter, Scanner, Value};
use proptest::prelude::*;

fn eval(source: &str) -> EvalResult {
    Interpreter::new().eval_source(source)
}

fn values_of(result: EvalResult) -> Option<Vec<Value>> {
    match result {
        EvalResult::Value { values, .. } => Some(values),
        _ => None,
    }
}

// ============================================================================
// Strategy generators
// ============================================================================

/// Arbitrary near-ASCII soup that might break the scanner or builder
fn arbitrary_source() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[ -~\n]{0,200}").expect("bad regex")
}

/// Tokens that look like Losp source elements
fn losp_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("(".to_string()),
        Just(")".to_string()),
        Just("[".to_string()),
        Just("]".to_string()),
        Just("{".to_string()),
        Just("}".to_string()),
        Just("{{".to_string()),
        Just("}}".to_string()),
        Just("IF(".to_string()),
        Just("FN(".to_string()),
        Just("#(".to_string()),
        Just("=(".to_string()),
        Just("+".to_string()),
        Just("RUN".to_string()),
        Just("true".to_string()),
        Just("null".to_string()),
        (-1000i32..1000).prop_map(|n| n.to_string()),
        "[a-z]{1,6}".prop_map(|s| s),
        Just("\"str\"".to_string()),
        Just("#tag".to_string()),
    ]
}

fn token_soup() -> impl Strategy<Value = String> {
    prop::collection::vec(losp_token(), 0..40).prop_map(|tokens| tokens.join(" "))
}

/// Well-formed arithmetic expressions over int literals
fn int_arith_expr() -> impl Strategy<Value = String> {
    let leaf = (-100i32..100).prop_map(|n| n.to_string());
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            prop::sample::select(vec!["+", "-", "*"]),
            prop::collection::vec(inner, 1..4),
        )
            .prop_map(|(op, args)| format!("({} {})", op, args.join(" ")))
    })
}

/// Well-formed expressions mixing lists, strings and arithmetic
fn printable_expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (-100i32..100).prop_map(|n| n.to_string()),
        Just("true".to_string()),
        Just("null".to_string()),
        Just("2.5".to_string()),
        "[a-z]{1,4}".prop_map(|s| format!("\"{}\"", s)),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (
                prop::sample::select(vec!["+", "CONCAT", "COLLAPSE"]),
                prop::collection::vec(inner.clone(), 1..4),
            )
                .prop_map(|(op, args)| format!("({} {})", op, args.join(" "))),
            prop::collection::vec(inner, 0..4).prop_map(|items| format!("[{}]", items.join(" "))),
        ]
    })
}

/// Shallow values for truthiness laws
fn simple_value() -> impl Strategy<Value = Value> {
    let atom = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::Int),
        "[a-z]{0,5}".prop_map(Value::String),
    ];
    atom.prop_recursive(2, 12, 3, |inner| {
        prop::collection::vec(inner, 0..3).prop_map(Value::list)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_scanner_and_builder_never_panic(source in arbitrary_source()) {
        let interp = Interpreter::new();
        let _ = interp.parse(&source);
    }

    #[test]
    fn prop_token_soup_never_panics(source in token_soup()) {
        let interp = Interpreter::new();
        let _ = interp.parse(&source);
    }

    #[test]
    fn prop_scanner_spans_cover_source(source in token_soup()) {
        let mut scanner = Scanner::new(&source);
        if let Ok(tokens) = scanner.scan_tokens() {
            for token in tokens {
                prop_assert!(token.start <= token.end);
                prop_assert!(token.end <= source.len());
            }
        }
    }

    #[test]
    fn prop_evaluation_is_deterministic(source in int_arith_expr()) {
        let first = values_of(eval(&source));
        let second = values_of(eval(&source));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_int_arithmetic_stays_int(source in int_arith_expr()) {
        let values = values_of(eval(&source)).expect("arithmetic failed");
        prop_assert_eq!(values.len(), 1);
        prop_assert!(matches!(values[0], Value::Int(_)));
    }

    #[test]
    fn prop_float_promotes_regardless_of_order(
        ints in prop::collection::vec(-100i32..100, 1..5),
        float in -100.0f32..100.0,
        position in 0usize..5,
    ) {
        let mut parts: Vec<String> = ints.iter().map(|n| n.to_string()).collect();
        let position = position.min(parts.len());
        parts.insert(position, format!("{:.2}", float));
        let source = format!("(+ {})", parts.join(" "));

        let values = values_of(eval(&source)).expect("arithmetic failed");
        prop_assert!(matches!(values[0], Value::Float(_)));
    }

    #[test]
    fn prop_strict_truth_implies_loose(value in simple_value()) {
        if value.is_strictly_true() {
            prop_assert!(value.is_truthy());
        }
    }

    #[test]
    fn prop_list_truthiness_is_conjunction(a in simple_value(), b in simple_value()) {
        let list = Value::list(vec![a.clone(), b.clone()]);
        prop_assert_eq!(list.is_truthy(), a.is_truthy() && b.is_truthy());
        let list = Value::list(vec![a.clone(), b.clone()]);
        prop_assert_eq!(
            list.is_strictly_true(),
            a.is_strictly_true() && b.is_strictly_true()
        );
    }

    #[test]
    fn prop_parse_print_parse_is_stable(source in printable_expr()) {
        let interp = Interpreter::new();
        let first = interp.parse(&source).expect("parse failed");
        let printed = render_node(&first);
        let second = interp.parse(&printed)
            .unwrap_or_else(|e| panic!("reparse of {:?} failed: {}", printed, e));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_emission_counting(source in int_arith_expr()) {
        // RUN forwards at least the one arithmetic value; MUTE forwards none
        let run = eval(&format!("(RUN {})", source));
        if let EvalResult::Value { values, .. } = &run {
            prop_assert!(run.is_emit());
            prop_assert!(!values.is_empty());
        }
        let mute = eval(&format!("(MUTE {})", source));
        if let EvalResult::Value { values, .. } = &mute {
            prop_assert!(!mute.is_emit());
            prop_assert!(values.is_empty());
        }
    }
}

#[test]
fn test_truthiness_anchor_cases() {
    assert!(Value::Bool(true).is_truthy());
    assert!(!Value::Int(0).is_truthy());
    assert!(!Value::String(String::new()).is_truthy());
    assert!(!Value::Bool(false).is_strictly_true());
    assert!(Value::list(vec![]).is_strictly_true());
}
