//! P1/P2 (§8): properties of the STG and Cmm lowering passes, as opposed to
//! `runtime/tests/properties.rs`'s P3-P6, which are about the abstract
//! machine itself.

use stgc::cmm::{self, Instruction};
use stgc::freevars;
use stgc::parser::Parser;
use stgc::resolver::resolve;
use stgc::simplify::simplify;
use stgc::stg::{self, Alts, DefaultAlt, Expr};
use stgc_core::layout;

const PROGRAMS: &[&str] = &[
    "main = printInt 42",
    "f x = x + 1; main = printInt (f (f 10))",
    "data L = N | C Int L; \
     sumL N = 0; \
     sumL (C x xs) = x + sumL xs; \
     main = printInt (sumL (C 1 (C 2 N)))",
    "main = printInt (if 1 < 2 then 10 else 20)",
    "data L = N | C Int L; \
     sum y xs = case xs of (N -> y; C x rest -> x + sum y rest); \
     main = printInt (sum 10 (C 1 (C 2 N)))",
];

fn lower_to_stg(source: &str) -> stg::Program {
    let program = Parser::parse_program(source).unwrap();
    let resolved = resolve(program).unwrap();
    let simplified = simplify(resolved.value_defs).unwrap();
    stg::lower_program(&simplified, resolved.constructors, "main").unwrap()
}

/// P1: lowering the same source twice, independently, produces the same STG
/// program. Nothing in the pipeline (parser, resolver, simplifier, STG
/// lowering) consults any process-global or time-dependent state, so two
/// runs over identical input cannot diverge.
#[test]
fn p1_stg_lowering_is_idempotent() {
    for source in PROGRAMS {
        let first = lower_to_stg(source);
        let second = lower_to_stg(source);
        assert_eq!(first, second, "STG lowering diverged across two runs of: {source}");
    }
}

/// Walk every function (and its nested sub-functions) in a Cmm program,
/// replaying each allocation instruction's real size per `layout.rs`.
fn actual_alloc_bytes(function: &cmm::Function) -> usize {
    let mut bytes = 0usize;
    for instruction in &function.instructions {
        bytes += instruction_bytes(instruction);
    }
    for sub in &function.sub_functions {
        bytes += actual_alloc_bytes(sub);
    }
    bytes
}

fn instruction_bytes(instruction: &Instruction) -> usize {
    match instruction {
        Instruction::AllocInt(_, _) => layout::closure_size(0, 1, 0),
        Instruction::AllocString(s, _) => layout::string_closure_size(s.len()),
        Instruction::AllocTable { captures, .. } => layout::closure_size(captures.len(), 0, 0),
        Instruction::Switch { arms, default, .. } => {
            let mut bytes = 0usize;
            for (_, arm_instructions) in arms {
                bytes += arm_instructions.iter().map(instruction_bytes).sum::<usize>();
            }
            bytes += default.iter().map(instruction_bytes).sum::<usize>();
            bytes
        }
        _ => 0,
    }
}

/// P2: a function's declared `Allocation` is an upper bound on the bytes its
/// own allocation instructions actually account for. Declared byte counts are
/// accumulated at the same sites that emit `AllocInt`/`AllocString`/
/// `AllocTable`, so equality is expected; `>=` is what the property actually
/// requires (the declared table must never *undercount* real heap traffic).
#[test]
fn p2_allocation_table_bounds_actual_heap_bytes() {
    for source in PROGRAMS {
        let stg_program = lower_to_stg(source);
        let annotated = freevars::annotate_program(&stg_program);
        let cmm_program = cmm::lower_program(&annotated);
        for function in &cmm_program.functions {
            check_function_bounds(function, source);
        }
    }
}

fn check_function_bounds(function: &cmm::Function, source: &str) {
    let actual = actual_alloc_bytes(function);
    assert!(
        function.allocation.total_bytes() >= actual,
        "{}: function {} declares {} bytes but allocates {}",
        source,
        function.name,
        function.allocation.total_bytes(),
        actual
    );
    for sub in &function.sub_functions {
        check_function_bounds(sub, source);
    }
}

#[test]
fn if_then_else_desugars_to_a_bool_case_in_stg() {
    let program = lower_to_stg("main = printInt (if 1 < 2 then 10 else 20)");
    let main = program.bindings.iter().find(|b| b.name == "main").unwrap();
    assert!(contains_bool_case(&main.lambda_form.body));
}

fn contains_bool_case(expr: &Expr) -> bool {
    match expr {
        Expr::Case { scrutinee, alts } => {
            if matches!(alts, Alts::Bool { .. }) {
                return true;
            }
            if contains_bool_case(scrutinee) {
                return true;
            }
            alts_contains_bool_case(alts)
        }
        Expr::Let { bindings, body } => {
            bindings.iter().any(|b| contains_bool_case(&b.lambda_form.body)) || contains_bool_case(body)
        }
        _ => false,
    }
}

fn alts_contains_bool_case(alts: &Alts) -> bool {
    match alts {
        Alts::Int { alts, default } => {
            alts.iter().any(|(_, body)| contains_bool_case(body)) || default_contains_bool_case(default)
        }
        Alts::Bool { alts, default } => {
            alts.iter().any(|(_, body)| contains_bool_case(body)) || default_contains_bool_case(default)
        }
        Alts::Str { alts, default } => {
            alts.iter().any(|(_, body)| contains_bool_case(body)) || default_contains_bool_case(default)
        }
        Alts::Constructor { alts, default } => {
            alts.iter().any(|(_, _, body)| contains_bool_case(body)) || default_contains_bool_case(default)
        }
    }
}

fn default_contains_bool_case(default: &DefaultAlt) -> bool {
    match default {
        DefaultAlt::Wildcard(body) => contains_bool_case(body),
        DefaultAlt::Bind(_, body) => contains_bool_case(body),
    }
}
