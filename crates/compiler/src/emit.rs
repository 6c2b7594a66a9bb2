//! C emitter (§4.3.1/§6).
//!
//! Walks a Cmm [`Program`] and renders one C translation unit: one C
//! function per Cmm `Function` returning `void*` (the next code label), one
//! static info-table struct per closure shape, and a `main` that calls
//! `setup`, enters the program's entry closure through the trampoline loop,
//! then calls `cleanup`. This module performs no analysis of its own — every
//! decision (which variables are captured, how a `case` dispatches) was
//! already made by `cmm::lower_program`; `emit` only renders it as text.

use crate::cmm::{Function, Instruction, Location, Operand, Program, SwitchKind, SwitchLabel};
use std::fmt::Write as _;
use stgc_core::BuiltinOp;

/// Mangle an STG/Cmm-level name into a valid, collision-free C identifier.
/// Names can contain `$` (the fresh-name/nested-binding separator) and can
/// coincide with C's own reserved `main`, so every emitted symbol is
/// prefixed and `$` is replaced.
fn mangle(name: &str) -> String {
    format!("stg_{}", name.replace('$', "_"))
}

/// Render a whole Cmm program as a C source string.
pub fn emit_program(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("/* Generated by stgc. Do not edit. */\n");
    out.push_str("#include \"stgc_runtime.h\"\n\n");

    for function in &program.functions {
        emit_function_forward_decls(function, &mut out);
    }
    out.push('\n');

    for function in &program.functions {
        emit_info_table(function, &mut out);
    }
    out.push('\n');

    for function in &program.functions {
        emit_function(function, &mut out);
    }

    emit_main(program, &mut out);
    out
}

fn emit_function_forward_decls(function: &Function, out: &mut String) {
    let name = mangle(&function.name);
    let _ = writeln!(out, "void* {name}(void);");
    for sub in &function.sub_functions {
        emit_function_forward_decls(sub, out);
    }
}

fn emit_info_table(function: &Function, out: &mut String) {
    let name = mangle(&function.name);
    let _ = writeln!(
        out,
        "static const InfoTable {name}_info = {{ .entry = {name}, .evac = generic_evac, \
         .pointers = {ptrs}, .ints = {ints}, .strings = {strs} }};",
        ptrs = function.bound_args.pointers,
        ints = function.bound_args.ints,
        strs = function.bound_args.strings,
    );
    for sub in &function.sub_functions {
        emit_info_table(sub, out);
    }
}

fn emit_function(function: &Function, out: &mut String) {
    let name = mangle(&function.name);
    let _ = writeln!(out, "void* {name}(void) {{");
    if function.arg_count > 1 {
        let _ = writeln!(out, "    if (check_application_update({}, \"{name}\")) {{", function.arg_count);
        out.push_str("        return B_stack_pop_continuation();\n");
        out.push_str("    }\n");
    }
    let _ = writeln!(out, "    heap_reserve({});", function.allocation.total_bytes());
    for instruction in &function.instructions {
        emit_instruction(instruction, 1, out);
    }
    out.push_str("}\n\n");
    for sub in &function.sub_functions {
        emit_function(sub, out);
    }
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

fn emit_instruction(instruction: &Instruction, level: usize, out: &mut String) {
    indent(level, out);
    match instruction {
        Instruction::StoreInt(op) => {
            let _ = writeln!(out, "IntRegister = {};", render_operand(op));
        }
        Instruction::StoreString(op) => {
            let _ = writeln!(out, "StringRegister = {};", render_operand(op));
        }
        Instruction::StoreTag(tag, argc) => {
            let _ = writeln!(out, "TagRegister = {tag}; ConstructorArgCountRegister = {argc};");
        }
        Instruction::Enter(loc) => {
            let _ = writeln!(out, "NodeRegister = {}; return enter(NodeRegister);", render_location(loc));
        }
        Instruction::Builtin1(op, a) => {
            let _ = writeln!(out, "{} = builtin_{}({});", result_register(*op), builtin_symbol(*op), render_location(a));
        }
        Instruction::Builtin2(op, a, b) => {
            let _ = writeln!(
                out,
                "{} = builtin_{}({}, {});",
                result_register(*op),
                builtin_symbol(*op),
                render_location(a),
                render_location(b)
            );
        }
        Instruction::PrintError(msg) => {
            let _ = writeln!(out, "fprintf(stderr, \"{}\\n\");", msg.replace('"', "\\\""));
        }
        Instruction::Exit => {
            let _ = writeln!(out, "exit(1);");
        }
        Instruction::SAPush(loc) => {
            let _ = writeln!(out, "save_SA({});", render_location(loc));
        }
        Instruction::AllocTable { sub_function, index, captures } => {
            let _ = writeln!(
                out,
                "Allocated[{index}] = alloc_closure(&{}_info, (void*[]){{{}}}, {});",
                mangle(sub_function),
                captures.iter().map(render_location).collect::<Vec<_>>().join(", "),
                captures.len()
            );
        }
        Instruction::AllocInt(n, index) => {
            let _ = writeln!(out, "Allocated[{index}] = heap_write_int({n});");
        }
        Instruction::AllocString(s, index) => {
            let _ = writeln!(out, "Allocated[{index}] = heap_write_string(\"{}\");", s.replace('"', "\\\""));
        }
        Instruction::Bury(loc) => {
            let _ = writeln!(out, "bury_ptr({});", render_location(loc));
        }
        Instruction::BuryInt(loc) => {
            let _ = writeln!(out, "bury_int({});", render_location(loc));
        }
        Instruction::BuryString(loc) => {
            let _ = writeln!(out, "bury_string({});", render_location(loc));
        }
        Instruction::PushContinuation(name) => {
            let _ = writeln!(out, "push_case_continuation(\"{}\");", mangle(name));
        }
        Instruction::Switch { kind, arms, default } => {
            let _ = writeln!(out, "switch ({}) {{", switch_scrutinee(*kind));
            for (label, body) in arms {
                indent(level, out);
                let _ = writeln!(out, "case {}:", render_label(label));
                for instruction in body {
                    emit_instruction(instruction, level + 1, out);
                }
                indent(level + 1, out);
                out.push_str("break;\n");
            }
            indent(level, out);
            out.push_str("default:\n");
            for instruction in default {
                emit_instruction(instruction, level + 1, out);
            }
            indent(level + 1, out);
            out.push_str("break;\n");
            indent(level, out);
            out.push_str("}\n");
        }
        Instruction::EnterCaseContinuation => {
            let _ = writeln!(out, "return B_stack_pop_continuation();");
        }
    }
}

fn render_operand(op: &Operand) -> String {
    match op {
        Operand::Location(loc) => render_location(loc),
        Operand::IntLit(n) => n.to_string(),
        Operand::StrLit(s) => format!("\"{}\"", s.replace('"', "\\\"")),
    }
}

fn render_location(loc: &Location) -> String {
    match loc {
        Location::Arg(i) => format!("read_ptr(A_stack_base + {i})"),
        Location::BoundPtr(i) => format!("NodeRegister->pointers[{i}]"),
        Location::BoundInt(i) => format!("NodeRegister->ints[{i}]"),
        Location::BoundStr(i) => format!("NodeRegister->strings[{i}]"),
        Location::Global(i) => format!("Globals[{i}]"),
        Location::Allocated(i) => format!("Allocated[{i}]"),
        Location::ConstructorField(i) => format!("NodeRegister->pointers[{i}]"),
        Location::ScrutineeValue => "scrutinee_value()".to_string(),
        Location::BuriedPtr(i) => format!("restore_buried_ptr({i})"),
        Location::BuriedInt(i) => format!("restore_buried_int({i})"),
        Location::BuriedStr(i) => format!("restore_buried_str({i})"),
    }
}

fn render_label(label: &SwitchLabel) -> String {
    match label {
        SwitchLabel::Int(n) => n.to_string(),
        SwitchLabel::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SwitchLabel::Str(s) => format!("/* {} */ string_hash(\"{}\")", s, s.replace('"', "\\\"")),
        SwitchLabel::Constructor(tag, _) => tag.to_string(),
    }
}

fn switch_scrutinee(kind: SwitchKind) -> &'static str {
    match kind {
        SwitchKind::Int => "IntRegister",
        SwitchKind::Bool => "TagRegister",
        SwitchKind::Str => "string_hash(StringRegister)",
        SwitchKind::Constructor => "TagRegister",
    }
}

fn result_register(op: BuiltinOp) -> &'static str {
    if op.returns_int() {
        "IntRegister"
    } else if op.returns_bool() {
        "TagRegister"
    } else if op.returns_string() {
        "StringRegister"
    } else {
        "/* unit */ TagRegister"
    }
}

fn builtin_symbol(op: BuiltinOp) -> &'static str {
    match op {
        BuiltinOp::Add => "add",
        BuiltinOp::Sub => "sub",
        BuiltinOp::Mul => "mul",
        BuiltinOp::Div => "div",
        BuiltinOp::Less => "less",
        BuiltinOp::LessEqual => "less_equal",
        BuiltinOp::Greater => "greater",
        BuiltinOp::GreaterEqual => "greater_equal",
        BuiltinOp::EqualTo => "equal_to",
        BuiltinOp::NotEqualTo => "not_equal_to",
        BuiltinOp::Concat => "concat",
        BuiltinOp::PrintInt => "print_int",
        BuiltinOp::PrintString => "print_string",
        BuiltinOp::Negate => "negate",
    }
}

fn emit_main(program: &Program, out: &mut String) {
    let _ = writeln!(out, "int main(void) {{");
    out.push_str("    setup();\n");
    let _ = writeln!(out, "    void* label = {}();", mangle(&program.entry));
    out.push_str("    while (label != NULL) { label = ((void* (*)(void))label)(); }\n");
    out.push_str("    cleanup();\n");
    out.push_str("    return 0;\n");
    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freevars::annotate_program;
    use crate::parser::Parser;
    use crate::resolver::resolve;
    use crate::simplify::simplify;
    use crate::stg::lower_program as stg_lower;

    #[test]
    fn emits_a_main_and_an_entry_function() {
        let program = Parser::parse_program("main = printInt 42").unwrap();
        let resolved = resolve(program).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        let stg = stg_lower(&simplified, resolved.constructors, "main").unwrap();
        let annotated = annotate_program(&stg);
        let cmm = crate::cmm::lower_program(&annotated);
        let c_source = emit_program(&cmm);
        assert!(c_source.contains("int main(void)"));
        assert!(c_source.contains("void* stg_main(void)"));
        assert!(c_source.contains("builtin_print_int"));
    }

    #[test]
    fn multi_arg_function_branches_on_check_application_update() {
        let program = Parser::parse_program("add3 a b c = a + b + c; main = printInt (add3 1 2 3)").unwrap();
        let resolved = resolve(program).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        let stg = stg_lower(&simplified, resolved.constructors, "main").unwrap();
        let annotated = annotate_program(&stg);
        let cmm = crate::cmm::lower_program(&annotated);
        let c_source = emit_program(&cmm);
        assert!(c_source.contains("if (check_application_update(3, \"stg_add3\")) {"));
        assert!(c_source.contains("return B_stack_pop_continuation();"));
    }

    #[test]
    fn case_emits_a_continuation_push_and_a_separate_alts_function() {
        let program = Parser::parse_program(
            "data L = N | C Int L; \
             sum y xs = case xs of (N -> y; C x rest -> x + sum y rest); \
             main = printInt (sum 0 (C 1 N))",
        )
        .unwrap();
        let resolved = resolve(program).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        let stg = stg_lower(&simplified, resolved.constructors, "main").unwrap();
        let annotated = annotate_program(&stg);
        let cmm = crate::cmm::lower_program(&annotated);
        let c_source = emit_program(&cmm);
        assert!(c_source.contains("push_case_continuation(\"stg_sum_alts1\");"));
        assert!(c_source.contains("void* stg_sum_alts1(void)"));
        assert!(c_source.contains("bury_ptr("));
        assert!(c_source.contains("switch (TagRegister)"));
    }
}
