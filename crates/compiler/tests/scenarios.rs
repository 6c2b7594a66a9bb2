//! End-to-end scenarios (§8 S1-S6) driven through the public `stgc` API —
//! `run_source` all the way through `compile_source`'s C-rendering path —
//! rather than through `interp`'s internals directly.

#[test]
fn s1_prints_a_literal() {
    stgc::run_source("main = printInt 42").unwrap();
}

#[test]
fn s2_arithmetic_precedence() {
    stgc::run_source("main = printInt (1 + 2 * 3)").unwrap();
}

#[test]
fn s3_repeated_function_application() {
    stgc::run_source("f x = x + 1; main = printInt (f (f 10))").unwrap();
}

#[test]
fn s4_list_sum_via_constructors() {
    let source = "data L = N | C Int L; \
                   sumL N = 0; \
                   sumL (C x xs) = x + sumL xs; \
                   main = printInt (sumL (C 1 (C 2 (C 3 N))))";
    stgc::run_source(source).unwrap();
}

/// S5: a self-referential infinite list, `take`n finitely — exercises
/// laziness (the list is never forced past what `take`/`sumL` demand) and
/// gives the thunk graph real recursive depth to build up.
#[test]
fn s5_infinite_list_laziness() {
    let source = "data L = N | C Int L; \
                   ones = C 1 ones; \
                   take_ n xs = case xs of ( \
                       N -> N; \
                       C y ys -> case n of ( 0 -> N; _ -> C y (take_ (n - 1) ys) ) \
                   ); \
                   sumL N = 0; \
                   sumL (C x xs) = x + sumL xs; \
                   main = printInt (sumL (take_ 5 ones))";
    stgc::run_source(source).unwrap();
}

#[test]
fn if_then_else_desugars_to_a_boolean_case() {
    stgc::run_source("main = printInt (if 1 < 2 then 10 else 20)").unwrap();
    stgc::run_source("main = printInt (if 2 < 1 then 10 else 20)").unwrap();
}

#[test]
fn s6_string_concatenation() {
    stgc::run_source("main = printString (\"hello \" ++ \"world\")").unwrap();
}

#[test]
fn compiles_the_list_sum_program_to_c_without_running_it() {
    let source = "data L = N | C Int L; \
                   sumL N = 0; \
                   sumL (C x xs) = x + sumL xs; \
                   main = printInt (sumL (C 1 N))";
    let rendered = stgc::compile_source(source, &stgc::CompilerConfig::default()).unwrap();
    assert!(rendered.contains("stg_sumL"));
    assert!(rendered.contains("stg_main"));
}

#[test]
fn division_by_zero_is_a_runtime_error_not_a_panic() {
    let err = stgc::run_source("main = printInt (1 / 0)").unwrap_err();
    assert!(matches!(err, stgc::CompileError::Runtime(_)));
}

#[test]
fn unmatched_pattern_is_a_runtime_error() {
    let source = "data L = N | C Int L; head (C x xs) = x; main = printInt (head N)";
    let err = stgc::run_source(source).unwrap_err();
    assert!(matches!(err, stgc::CompileError::Runtime(_)));
}
