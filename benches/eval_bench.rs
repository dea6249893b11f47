use criterion::{black_box, criterion_group, criterion_main, Criterion};
use losp::{Interpreter, Scanner};

fn scan_benchmark(c: &mut Criterion) {
    let source = r#"
        (LAST
          =(total 0)
          FORI({{from 0 before 100 idx i}} =(total (+ total i)))
          (CONCAT "total=" total))
    "#;

    c.bench_function("tokenize loop program", |b| {
        b.iter(|| {
            let mut scanner = Scanner::new(black_box(source));
            scanner.scan_tokens().unwrap()
        })
    });
}

fn parse_benchmark(c: &mut Criterion) {
    let interp = Interpreter::new();
    let source = r#"[{{ {a 1} {b [1 2 3]} }} IF((? true) "yes" "no") FN([x] (* x x))]"#;

    c.bench_function("parse mixed containers", |b| {
        b.iter(|| interp.parse(black_box(source)).unwrap())
    });
}

fn eval_benchmark(c: &mut Criterion) {
    let interp = Interpreter::new();
    let loop_ast = interp
        .parse("(LAST =(t 0) FORI({{from 0 before 100 idx i}} =(t (+ t i))) t)")
        .unwrap();
    let lambda_ast = interp
        .parse("(LAST =(sq FN([x] (* x x))) (+ (sq 3) (sq 4)))")
        .unwrap();

    c.bench_function("eval counting loop", |b| {
        b.iter(|| interp.eval(black_box(&loop_ast)))
    });

    c.bench_function("eval lambda calls", |b| {
        b.iter(|| interp.eval(black_box(&lambda_ast)))
    });
}

criterion_group!(benches, scan_benchmark, parse_benchmark, eval_benchmark);
criterion_main!(benches);
