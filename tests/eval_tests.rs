//! End-to-end evaluation: source in, values out
//!
//! Covers the arithmetic, container, control-flow and lambda scenarios the
//! language contract pins down, plus scope and error behaviour.

use losp::{EvalResult, Interpreter, Value};

fn eval_values(source: &str) -> Vec<Value> {
    let interp = Interpreter::new();
    match interp.eval_source(source) {
        EvalResult::Value { values, .. } => values,
        other => panic!("expected values for {:?}, got {:?}", source, other),
    }
}

fn eval_one(source: &str) -> Value {
    let mut values = eval_values(source);
    assert_eq!(values.len(), 1, "expected one value from {:?}", source);
    values.remove(0)
}

fn eval_error(source: &str) -> String {
    let interp = Interpreter::new();
    match interp.eval_source(source) {
        EvalResult::Error(error) => error.to_string(),
        other => panic!("expected error for {:?}, got {:?}", source, other),
    }
}

#[test]
fn test_simple_addition() {
    assert_eq!(eval_one("(+ 5 6)"), Value::Int(11));
}

#[test]
fn test_nested_arithmetic() {
    assert_eq!(eval_one("(+ (- 8 3) 6)"), Value::Int(11));
}

#[test]
fn test_list_with_expressions() {
    assert_eq!(
        eval_one(r#"[5 (+ 5 6) "hello"]"#),
        Value::list(vec![
            Value::Int(5),
            Value::Int(11),
            Value::String("hello".to_string()),
        ])
    );
}

#[test]
fn test_assignment_chain() {
    assert_eq!(
        eval_one(r#"(LAST =(var 5) =(var2 (* var 11)) (CONCAT "v=" var2))"#),
        Value::String("v=55".to_string())
    );
}

#[test]
fn test_if_branches() {
    assert_eq!(
        eval_one(r#"IF((? true) "yes" "no")"#),
        Value::String("yes".to_string())
    );
    assert_eq!(
        eval_one(r#"IF((? false) "yes" "no")"#),
        Value::String("no".to_string())
    );
}

#[test]
fn test_if_without_else_emits_nothing() {
    assert_eq!(eval_values(r#"(RUN IF((? false) "yes"))"#), Vec::new());
}

#[test]
fn test_if_condition_must_be_exactly_true() {
    // A truthy non-bool takes the else branch
    assert_eq!(
        eval_one(r#"IF((? 1) "yes" "no")"#),
        Value::String("no".to_string())
    );
}

#[test]
fn test_lambda_definition_and_call() {
    assert_eq!(
        eval_one(r#"(LAST =(lm FN([name] (CONCAT "hi " name))) (lm "x"))"#),
        Value::String("hi x".to_string())
    );
}

#[test]
fn test_lambda_extra_arguments_ignored() {
    assert_eq!(
        eval_one(r#"(LAST =(f FN([a] a)) (f 1 2 3))"#),
        Value::Int(1)
    );
}

#[test]
fn test_expand_and_collapse() {
    assert_eq!(
        eval_one("[(EXPAND [1 2 3] 4)]"),
        Value::list(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ])
    );
    assert_eq!(
        eval_one("(COLLAPSE 1 2 3)"),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_fori_emits_when_asked() {
    assert_eq!(
        eval_values("FORI({{from 0 before 3 idx i emit true}} i)"),
        vec![Value::Int(0), Value::Int(1), Value::Int(2)]
    );
}

#[test]
fn test_fori_silent_without_emit() {
    assert_eq!(
        eval_values("FORI({{from 0 before 3 idx i}} i)"),
        Vec::new()
    );
}

#[test]
fn test_for_loop_with_counter() {
    assert_eq!(
        eval_one("(LAST =(i 0) FOR((? (< i 5)) {do ++(i)}) i)"),
        Value::Int(5)
    );
}

#[test]
fn test_increment_variants() {
    assert_eq!(eval_one("(LAST =(x 1) ++(x) x)"), Value::Int(2));
    assert_eq!(eval_one("(LAST =(x 1) --(x))"), Value::Int(0));
    // Public form steps the evaluated value without a write-back
    assert_eq!(eval_one("(LAST =(x 1) ++((+ x 10)) x)"), Value::Int(1));
    assert_eq!(eval_one("(LAST =(x 1) ++((+ x 10)))"), Value::Int(12));
}

#[test]
fn test_run_do_mute_last() {
    assert_eq!(
        eval_values("(RUN 1 2 3)"),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    assert_eq!(
        eval_values("(DO 1 2)"),
        vec![Value::Int(1), Value::Int(2)]
    );
    assert_eq!(eval_values("(MUTE 1 2 3)"), Vec::new());
    assert_eq!(eval_one("(LAST 1 2 3)"), Value::Int(3));
    assert_eq!(eval_values("(LAST)"), Vec::new());
}

#[test]
fn test_multiple_top_level_expressions() {
    assert_eq!(
        eval_one("=(x 2) (* x 21)"),
        Value::list(vec![Value::Int(2), Value::Int(42)])
    );
}

#[test]
fn test_object_literal_and_property() {
    assert_eq!(
        eval_one(r#"(. {{ {host "local"} {port 8080} }} "port")"#),
        Value::Int(8080)
    );
    assert_eq!(
        eval_one(r#"(. {{ {server {{ {port 9} }}} }} "server" "port")"#),
        Value::Int(9)
    );
}

#[test]
fn test_keyed_value_shapes() {
    // A lone {k} emits true under its key; COUNT sees one key on the
    // materialised object
    assert_eq!(eval_one("(COUNT {{ {flag} }})"), Value::Int(1));
    assert_eq!(
        eval_one(r#"(. {{ {flag} }} "flag")"#),
        Value::Bool(true)
    );
    // Multiple unkeyed children bundle into a list
    assert_eq!(
        eval_one(r#"(. {{ {xs 1 2 3} }} "xs")"#),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_merge_and_count() {
    assert_eq!(
        eval_one(r#"(COUNT (MERGE {{ {a 1} }} {{ {b 2} {c 3} }}))"#),
        Value::Int(3)
    );
    assert_eq!(
        eval_one(r#"(. (MERGE {{ {a 1} }} {{ {a 9} }}) "a")"#),
        Value::Int(9)
    );
}

#[test]
fn test_in_membership() {
    assert_eq!(eval_one("(IN [1 2 3] 2)"), Value::Bool(true));
    assert_eq!(eval_one("(IN [1 2 3] 4)"), Value::Bool(false));
    assert_eq!(eval_one("(IN [null] null)"), Value::Bool(true));
}

#[test]
fn test_truthiness_operators() {
    assert_eq!(eval_one("(1 true)"), Value::Bool(true));
    assert_eq!(eval_one("(1 1)"), Value::Bool(false));
    assert_eq!(eval_one("(~1 1)"), Value::Bool(true));
    assert_eq!(eval_one("(~1 \"\")"), Value::Bool(false));
    assert_eq!(eval_one("(0 false)"), Value::Bool(true));
    assert_eq!(eval_one("(~0 0)"), Value::Bool(true));
    assert_eq!(eval_one("(! true)"), Value::Bool(false));
    assert_eq!(eval_one("(~! \"x\")"), Value::Bool(false));
}

#[test]
fn test_any_all_with_mode_option() {
    assert_eq!(eval_one("(ANY false 1)"), Value::Bool(false));
    assert_eq!(eval_one("(ANY {~ true} false 1)"), Value::Bool(true));
    assert_eq!(eval_one("(ALL {~ true} 1 \"x\")"), Value::Bool(true));
}

#[test]
fn test_string_operators() {
    assert_eq!(
        eval_one(r#"(CONCAT "a" "b" "c")"#),
        Value::String("abc".to_string())
    );
    assert_eq!(
        eval_one(r#"(CONCAT {delim ", "} 1 2)"#),
        Value::String("1, 2".to_string())
    );
    assert_eq!(eval_one(r#"(STR-INT "42")"#), Value::Int(42));
    assert_eq!(
        eval_one(r#"(STARTS "hello" "he")"#),
        Value::Bool(true)
    );
    assert_eq!(
        eval_one(r#"(STARTS {i true} "Hello" "he")"#),
        Value::Bool(true)
    );
    assert_eq!(
        eval_one(r#"(ENDS "hello" "lo")"#),
        Value::Bool(true)
    );
    assert_eq!(
        eval_one(r#"(CONTAINS {case true} "Hello" "ell")"#),
        Value::Bool(true)
    );
}

#[test]
fn test_arithmetic_edges() {
    assert_eq!(eval_one("(/ 7 0)"), Value::Int(i32::MAX));
    assert_eq!(eval_one("(/ 7.0 0.0)"), Value::Float(f32::INFINITY));
    assert_eq!(eval_one("(^ 2 10)"), Value::Int(1024));
    assert_eq!(eval_one("(% 17 5)"), Value::Int(2));
    assert_eq!(eval_one("(+ 1 2.5)"), Value::Float(3.5));
}

#[test]
fn test_pi_is_permissive_about_arity() {
    assert_eq!(eval_one("(PI)"), Value::Float(std::f32::consts::PI));
    assert_eq!(eval_one("(PI 1 2 3)"), Value::Float(std::f32::consts::PI));
}

#[test]
fn test_scope_is_lexical_for_lambdas() {
    // A variable assigned inside a lambda body is invisible afterwards
    let message = eval_error("(LAST =(f FN([] =(inner 5))) (f) inner)");
    assert!(message.contains("no variable named inner was found"));
}

#[test]
fn test_lambda_reads_caller_scope() {
    assert_eq!(
        eval_one("(LAST =(x 10) =(f FN([] (+ x 1))) (f))"),
        Value::Int(11)
    );
}

#[test]
fn test_unknown_variable_message() {
    let message = eval_error("missing");
    assert!(message.contains("no variable named missing was found"));
}

#[test]
fn test_unknown_operator_message() {
    let message = eval_error("(NOPE 1)");
    assert!(message.contains("no operator named NOPE is registered"));
}

#[test]
fn test_operator_errors_prefix_the_id() {
    let message = eval_error(r#"(+ 1 "x")"#);
    assert!(message.starts_with("+:"), "got: {}", message);
}

#[test]
fn test_error_skips_remaining_siblings() {
    // The error from the bad child surfaces; var2 is never assigned
    let interp = Interpreter::new();
    match interp.eval_source("(RUN =(a 1) (NOPE) =(b 2))") {
        EvalResult::Error(_) => {}
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(interp.try_get_global("a"), Some(Value::Int(1)));
    assert_eq!(interp.try_get_global("b"), None);
}

#[test]
fn test_special_operator_called_as_standard_is_misuse() {
    let message = eval_error("(IF true 1 2)");
    assert!(message.contains("special-operator"), "got: {}", message);
}

#[test]
fn test_parse_failure_wraps_into_error_result() {
    let interp = Interpreter::new();
    match interp.eval_source("(+ 1") {
        EvalResult::Error(error) => {
            assert!(error.source.is_none());
            assert!(error.to_string().contains("Unexpected end of input"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[test]
fn test_globals_are_visible_unless_shadowed() {
    let interp = Interpreter::new();
    interp.set_global("greeting", Value::String("hello".to_string()));
    let ast = interp.parse("(CONCAT greeting \" world\")").unwrap();
    match interp.eval(&ast) {
        EvalResult::Value { values, .. } => {
            assert_eq!(values, vec![Value::String("hello world".to_string())]);
        }
        other => panic!("expected values, got {:?}", other),
    }
    assert_eq!(
        interp.try_get_global("greeting"),
        Some(Value::String("hello".to_string()))
    );
}

#[test]
fn test_call_api_invokes_lambda_directly() {
    let interp = Interpreter::new();
    let ast = interp.parse("FN([a b] (+ a b))").unwrap();
    let lambda = match interp.eval(&ast) {
        EvalResult::Value { mut values, .. } => match values.remove(0) {
            Value::Lambda(lambda) => lambda,
            other => panic!("expected lambda, got {:?}", other),
        },
        other => panic!("expected values, got {:?}", other),
    };
    match interp.call(&lambda, vec![Value::Int(2), Value::Int(3)]) {
        EvalResult::Value { values, .. } => assert_eq!(values, vec![Value::Int(5)]),
        other => panic!("expected values, got {:?}", other),
    }
}

#[test]
fn test_filter_defaults_to_pass_through() {
    assert_eq!(
        eval_values("#(3 4)"),
        vec![Value::Int(3), Value::Int(4)]
    );
    // A filter after a non-filter sibling contributes to the same list
    assert_eq!(
        eval_one("[(MUTE 0)#(7)]"),
        Value::list(vec![Value::Int(7)])
    );
}

#[test]
fn test_stray_comma_identifier_emits_nothing() {
    assert_eq!(eval_values("(RUN , 5)"), vec![Value::Int(5)]);
}
