//! Cmm (compiler-intermediate-machine) layer (§3.2/§4.3).
//!
//! A flat, imperative instruction form lowered from the free-variable- and
//! storage-annotated STG program — the input to the C emitter (`emit.rs`).
//! Each STG binding becomes one Cmm [`Function`]; nested `let`s become their
//! own named sub-`Function`s allocated via `AllocTable`. A `case` becomes
//! *two* Functions per §4.3: the enclosing function bury the variables that
//! are live across the scrutinee's evaluation onto the B-stack, push a named
//! continuation, then evaluate the scrutinee; a separate "Alts" sub-function
//! — entered only once the scrutinee reaches a value — restores the buried
//! variables and dispatches with [`Instruction::Switch`]. The split exists
//! because `emit.rs` renders every Cmm function as a genuine C function that
//! *returns* to a trampoline loop (`Instruction::Enter` compiles to a literal
//! `return`): anything appended after a scrutinee that itself needs to enter
//! a closure would be unreachable.

use crate::freevars::{self, AnnotatedBinding, AnnotatedLambda, AnnotatedProgram, Storage, StorageKind};
use crate::stg::{Alts, Atom, DefaultAlt, Expr};
use stgc_core::{layout, BuiltinOp, Tag};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Nth pointer argument on the A-stack (0-indexed from the frame base).
    Arg(u32),
    BoundPtr(u32),
    BoundInt(u32),
    BoundStr(u32),
    Global(u32),
    /// Nth closure freshly allocated so far in the current function body.
    Allocated(u32),
    /// Nth field of the constructor closure a `Switch`'s arm is matching on.
    ConstructorField(u32),
    /// The value the innermost enclosing `Switch`'s scrutinee evaluated to.
    ScrutineeValue,
    /// Nth pointer-kinded value restored from this case's B-stack bury
    /// frame, valid only inside the Alts sub-function that a `Bury`
    /// pushed it for.
    BuriedPtr(u32),
    BuriedInt(u32),
    BuriedStr(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Location(Location),
    IntLit(i64),
    StrLit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Int,
    Bool,
    Str,
    Constructor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchLabel {
    Int(i64),
    Bool(bool),
    Str(String),
    /// Tag plus how many fields the matched arm binds (pointer/int/string
    /// split is not tracked here — constructor fields are always pointers
    /// at the source-language level, per §3.1's Non-goals on unboxed
    /// constructor fields).
    Constructor(Tag, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    StoreInt(Operand),
    StoreString(Operand),
    StoreTag(Tag, u16),
    /// Tail-call (in the "returns a value" sense described above) a
    /// function, thunk, or partial application at `Location`.
    Enter(Location),
    Builtin1(BuiltinOp, Location),
    Builtin2(BuiltinOp, Location, Location),
    PrintError(String),
    Exit,
    /// Push a pointer argument for the next `Enter`.
    SAPush(Location),
    /// Allocate a closure for `sub_function`'s lambda form at body-local
    /// index `index`, populating its free-variable fields from `captures`
    /// (evaluated in the *allocating* function's own location space).
    AllocTable { sub_function: String, index: u32, captures: Vec<Location> },
    AllocInt(i64, u32),
    AllocString(String, u32),
    /// Push `Location`'s current value onto the B-stack so a case's Alts
    /// sub-function can recover it after the scrutinee's evaluation may
    /// have clobbered the registers/stack slots it used to live in (§4.3).
    Bury(Location),
    BuryInt(Location),
    BuryString(Location),
    /// Register the named Alts sub-function as the continuation the
    /// trampoline enters once the scrutinee reaches a value (§4.3).
    PushContinuation(String),
    /// Dispatch on the scrutinee's value. Exactly one `default` always
    /// applies when no arm label matches (§3.1: every `Alts` has exactly
    /// one default). Lives only in an Alts sub-function.
    Switch { kind: SwitchKind, arms: Vec<(SwitchLabel, Vec<Instruction>)>, default: Vec<Instruction> },
    /// Pop the B-stack's top continuation and resume it. What `Bury`'s
    /// frame left behind for a case is read back through `Location::Buried*`
    /// wherever the popped continuation happens to reference it.
    EnterCaseContinuation,
}

/// A tuple summed across a function body, used to emit a single
/// `heap_reserve(total)` call at function entry (§4.3). `tables` /
/// `literal_strings` double as indices into `Location::Allocated` — `bytes`
/// is the actual running total, computed from each site's real size rather
/// than a flat per-kind constant, so it genuinely bounds what the function
/// body writes (P2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Allocation {
    pub tables: u32,
    pub ints: u32,
    pub literal_strings: u32,
    pub bytes: usize,
}

impl Allocation {
    pub fn total_bytes(&self) -> usize {
        self.bytes
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoundArgCounts {
    pub pointers: u32,
    pub ints: u32,
    pub strings: u32,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub global_index: Option<u32>,
    pub arg_count: u32,
    pub bound_args: BoundArgCounts,
    pub instructions: Vec<Instruction>,
    pub allocation: Allocation,
    pub sub_functions: Vec<Function>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub functions: Vec<Function>,
    pub entry: String,
}

/// Locations bound by the innermost pattern (constructor fields, or a
/// default-alt's bind name) that shadow everything else during the lowering
/// of one `Switch` arm's body — or, inside an Alts sub-function, the whole
/// set of this case's buried live variables.
type Locals = HashMap<String, Location>;

fn location_kind(loc: &Location) -> StorageKind {
    match loc {
        Location::BoundInt(_) | Location::BuriedInt(_) => StorageKind::Int,
        Location::BoundStr(_) | Location::BuriedStr(_) => StorageKind::Str,
        _ => StorageKind::Pointer,
    }
}

struct Lowering<'a> {
    globals: &'a HashMap<String, u32>,
}

impl<'a> Lowering<'a> {
    fn location_of(&self, name: &str, params: &[String], free_vars: &[(String, Storage)], locals: &Locals) -> Location {
        if let Some(loc) = locals.get(name) {
            return loc.clone();
        }
        if let Some(idx) = params.iter().position(|p| p == name) {
            return Location::Arg(idx as u32);
        }
        if let Some(pos) = free_vars.iter().position(|(n, _)| n == name) {
            return match &free_vars[pos].1 {
                Storage::Global(idx) => Location::Global(*idx),
                Storage::Pointer => Location::BoundPtr(count_same_kind(free_vars, pos, StorageKind::Pointer)),
                Storage::Int => Location::BoundInt(count_same_kind(free_vars, pos, StorageKind::Int)),
                Storage::Str => Location::BoundStr(count_same_kind(free_vars, pos, StorageKind::Str)),
            };
        }
        if let Some(idx) = self.globals.get(name) {
            return Location::Global(*idx);
        }
        unreachable!("freevars analysis guarantees `{name}` is resolvable here")
    }

    fn resolve_atom(
        &self,
        atom: &Atom,
        params: &[String],
        free_vars: &[(String, Storage)],
        locals: &Locals,
        instructions: &mut Vec<Instruction>,
        allocation: &mut Allocation,
    ) -> Location {
        match atom {
            Atom::Var(name) => self.location_of(name, params, free_vars, locals),
            Atom::Int(n) => {
                let idx = allocation.ints;
                instructions.push(Instruction::AllocInt(*n, idx));
                allocation.ints += 1;
                allocation.bytes += layout::closure_size(0, 1, 0);
                Location::Allocated(idx)
            }
            Atom::Str(s) => {
                let idx = allocation.literal_strings;
                instructions.push(Instruction::AllocString(s.clone(), idx));
                allocation.literal_strings += 1;
                allocation.bytes += layout::string_closure_size(s.len());
                Location::Allocated(idx)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_expr(
        &self,
        expr: &Expr,
        params: &[String],
        free_vars: &[(String, Storage)],
        locals: &Locals,
        scope_kinds: &HashMap<String, StorageKind>,
        instructions: &mut Vec<Instruction>,
        allocation: &mut Allocation,
        sub_functions: &mut Vec<Function>,
        name_prefix: &str,
        case_id: &mut u32,
    ) {
        match expr {
            Expr::Literal(Atom::Int(n)) => instructions.push(Instruction::StoreInt(Operand::IntLit(*n))),
            Expr::Literal(Atom::Str(s)) => instructions.push(Instruction::StoreString(Operand::StrLit(s.clone()))),
            Expr::Apply { func, args } => {
                for atom in args {
                    let loc = self.resolve_atom(atom, params, free_vars, locals, instructions, allocation);
                    instructions.push(Instruction::SAPush(loc));
                }
                let func_loc = self.location_of(func, params, free_vars, locals);
                instructions.push(Instruction::Enter(func_loc));
            }
            Expr::Constructor { tag, args } => {
                for atom in args {
                    let loc = self.resolve_atom(atom, params, free_vars, locals, instructions, allocation);
                    instructions.push(Instruction::SAPush(loc));
                }
                instructions.push(Instruction::StoreTag(*tag, args.len() as u16));
            }
            Expr::Builtin { op, args } => {
                let locs: Vec<Location> =
                    args.iter().map(|a| self.resolve_atom(a, params, free_vars, locals, instructions, allocation)).collect();
                match locs.as_slice() {
                    [a] => instructions.push(Instruction::Builtin1(*op, a.clone())),
                    [a, b] => instructions.push(Instruction::Builtin2(*op, a.clone(), b.clone())),
                    _ => unreachable!("builtin arities are 1 or 2"),
                }
            }
            Expr::Let { bindings, body } => {
                let mut inner_locals = locals.clone();
                for binding in bindings {
                    let annotated = freevars::annotate_lambda(&binding.lambda_form, scope_kinds, self.globals);
                    let captures: Vec<Location> = annotated
                        .free_vars
                        .iter()
                        .map(|(n, _)| self.location_of(n, params, free_vars, locals))
                        .collect();
                    let sub_name = format!("{name_prefix}${}", binding.name);
                    let index = allocation.tables;
                    allocation.tables += 1;
                    allocation.bytes += layout::closure_size(captures.len(), 0, 0);
                    instructions.push(Instruction::AllocTable { sub_function: sub_name.clone(), index, captures });
                    inner_locals.insert(binding.name.clone(), Location::Allocated(index));
                    sub_functions.push(self.lower_binding_function(&sub_name, &annotated, scope_kinds));
                }
                self.lower_expr(
                    body,
                    params,
                    free_vars,
                    &inner_locals,
                    scope_kinds,
                    instructions,
                    allocation,
                    sub_functions,
                    name_prefix,
                    case_id,
                );
            }
            Expr::Case { scrutinee, alts } => {
                self.lower_case(
                    scrutinee,
                    alts,
                    params,
                    free_vars,
                    locals,
                    scope_kinds,
                    instructions,
                    allocation,
                    sub_functions,
                    name_prefix,
                    case_id,
                );
            }
            Expr::Error(msg) => {
                instructions.push(Instruction::PrintError(msg.clone()));
                instructions.push(Instruction::Exit);
            }
        }
    }

    /// Split a `case` into the outer bury/enter sequence plus a separate
    /// Alts sub-function (§4.3). Every variable free in `alts` (other than
    /// globals, which are addressable from anywhere) is buried before the
    /// scrutinee is entered and restored as a `Location::Buried*` inside the
    /// Alts function, which sees none of this function's own params/frees —
    /// only the B-stack and globals are reachable across the bury boundary.
    #[allow(clippy::too_many_arguments)]
    fn lower_case(
        &self,
        scrutinee: &Expr,
        alts: &Alts,
        params: &[String],
        free_vars: &[(String, Storage)],
        locals: &Locals,
        scope_kinds: &HashMap<String, StorageKind>,
        instructions: &mut Vec<Instruction>,
        allocation: &mut Allocation,
        sub_functions: &mut Vec<Function>,
        name_prefix: &str,
        case_id: &mut u32,
    ) {
        let mut live_names = Vec::new();
        freevars::free_vars_of_alts(alts, &HashSet::new(), &mut live_names);

        let mut buried = Locals::new();
        let (mut next_ptr, mut next_int, mut next_str) = (0u32, 0u32, 0u32);
        for name in &live_names {
            let loc = self.location_of(name, params, free_vars, locals);
            if matches!(loc, Location::Global(_)) {
                continue;
            }
            let (bury, buried_loc) = match location_kind(&loc) {
                StorageKind::Int => {
                    let idx = next_int;
                    next_int += 1;
                    (Instruction::BuryInt(loc), Location::BuriedInt(idx))
                }
                StorageKind::Str => {
                    let idx = next_str;
                    next_str += 1;
                    (Instruction::BuryString(loc), Location::BuriedStr(idx))
                }
                StorageKind::Pointer => {
                    let idx = next_ptr;
                    next_ptr += 1;
                    (Instruction::Bury(loc), Location::BuriedPtr(idx))
                }
            };
            instructions.push(bury);
            buried.insert(name.clone(), buried_loc);
        }

        *case_id += 1;
        let alts_name = format!("{name_prefix}$alts{}", *case_id);
        instructions.push(Instruction::PushContinuation(alts_name.clone()));
        self.lower_expr(scrutinee, params, free_vars, locals, scope_kinds, instructions, allocation, sub_functions, name_prefix, case_id);

        let mut alts_instructions = Vec::new();
        let mut alts_allocation = Allocation::default();
        let mut alts_sub_functions = Vec::new();
        let switch = self.lower_alts(
            alts,
            &[],
            &[],
            &buried,
            scope_kinds,
            &mut alts_allocation,
            &mut alts_sub_functions,
            &alts_name,
            case_id,
        );
        alts_instructions.push(switch);
        finish_body(&mut alts_instructions);

        sub_functions.push(Function {
            name: alts_name,
            global_index: None,
            arg_count: 0,
            bound_args: BoundArgCounts::default(),
            instructions: alts_instructions,
            allocation: alts_allocation,
            sub_functions: alts_sub_functions,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_alts(
        &self,
        alts: &Alts,
        params: &[String],
        free_vars: &[(String, Storage)],
        locals: &Locals,
        scope_kinds: &HashMap<String, StorageKind>,
        allocation: &mut Allocation,
        sub_functions: &mut Vec<Function>,
        name_prefix: &str,
        case_id: &mut u32,
    ) -> Instruction {
        let arm_body = |lowering: &Self,
                         body: &Expr,
                         extra_locals: &Locals,
                         alloc: &mut Allocation,
                         subs: &mut Vec<Function>,
                         case_id: &mut u32|
         -> Vec<Instruction> {
            let mut merged = locals.clone();
            merged.extend(extra_locals.clone());
            let mut out = Vec::new();
            lowering.lower_expr(body, params, free_vars, &merged, scope_kinds, &mut out, alloc, subs, name_prefix, case_id);
            finish_body(&mut out);
            out
        };

        match alts {
            Alts::Int { alts, default } => {
                let arms = alts
                    .iter()
                    .map(|(n, body)| {
                        (SwitchLabel::Int(*n), arm_body(self, body, &Locals::new(), allocation, sub_functions, case_id))
                    })
                    .collect();
                let default =
                    lower_default(self, default, params, free_vars, locals, scope_kinds, allocation, sub_functions, name_prefix, case_id);
                Instruction::Switch { kind: SwitchKind::Int, arms, default }
            }
            Alts::Bool { alts, default } => {
                let arms = alts
                    .iter()
                    .map(|(b, body)| {
                        (SwitchLabel::Bool(*b), arm_body(self, body, &Locals::new(), allocation, sub_functions, case_id))
                    })
                    .collect();
                let default =
                    lower_default(self, default, params, free_vars, locals, scope_kinds, allocation, sub_functions, name_prefix, case_id);
                Instruction::Switch { kind: SwitchKind::Bool, arms, default }
            }
            Alts::Str { alts, default } => {
                let arms = alts
                    .iter()
                    .map(|(s, body)| {
                        (SwitchLabel::Str(s.clone()), arm_body(self, body, &Locals::new(), allocation, sub_functions, case_id))
                    })
                    .collect();
                let default =
                    lower_default(self, default, params, free_vars, locals, scope_kinds, allocation, sub_functions, name_prefix, case_id);
                Instruction::Switch { kind: SwitchKind::Str, arms, default }
            }
            Alts::Constructor { alts, default } => {
                let arms = alts
                    .iter()
                    .map(|(tag, binders, body)| {
                        let mut extra = Locals::new();
                        for (i, binder) in binders.iter().enumerate() {
                            extra.insert(binder.clone(), Location::ConstructorField(i as u32));
                        }
                        (
                            SwitchLabel::Constructor(*tag, binders.len() as u32),
                            arm_body(self, body, &extra, allocation, sub_functions, case_id),
                        )
                    })
                    .collect();
                let default =
                    lower_default(self, default, params, free_vars, locals, scope_kinds, allocation, sub_functions, name_prefix, case_id);
                Instruction::Switch { kind: SwitchKind::Constructor, arms, default }
            }
        }
    }

    fn lower_binding_function(
        &self,
        name: &str,
        annotated: &AnnotatedLambda,
        outer_scope_kinds: &HashMap<String, StorageKind>,
    ) -> Function {
        let mut instructions = Vec::new();
        let mut allocation = Allocation::default();
        let mut sub_functions = Vec::new();
        let mut case_id = 0u32;
        let mut scope_kinds = freevars::collect_let_kinds(&annotated.body);
        for (name, kind) in outer_scope_kinds {
            scope_kinds.entry(name.clone()).or_insert(*kind);
        }
        self.lower_expr(
            &annotated.body,
            &annotated.params,
            &annotated.free_vars,
            &Locals::new(),
            &scope_kinds,
            &mut instructions,
            &mut allocation,
            &mut sub_functions,
            name,
            &mut case_id,
        );
        finish_body(&mut instructions);
        let bound_args = BoundArgCounts {
            pointers: annotated.free_vars.iter().filter(|(_, s)| s.kind() == StorageKind::Pointer).count() as u32,
            ints: annotated.free_vars.iter().filter(|(_, s)| s.kind() == StorageKind::Int).count() as u32,
            strings: annotated.free_vars.iter().filter(|(_, s)| s.kind() == StorageKind::Str).count() as u32,
        };
        Function {
            name: name.to_string(),
            global_index: None,
            arg_count: annotated.params.len() as u32,
            bound_args,
            instructions,
            allocation,
            sub_functions,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn lower_default(
    lowering: &Lowering,
    default: &DefaultAlt,
    params: &[String],
    free_vars: &[(String, Storage)],
    locals: &Locals,
    scope_kinds: &HashMap<String, StorageKind>,
    allocation: &mut Allocation,
    sub_functions: &mut Vec<Function>,
    name_prefix: &str,
    case_id: &mut u32,
) -> Vec<Instruction> {
    let mut merged = locals.clone();
    let body = match default {
        DefaultAlt::Wildcard(body) => body.as_ref(),
        DefaultAlt::Bind(name, body) => {
            merged.insert(name.clone(), Location::ScrutineeValue);
            body.as_ref()
        }
    };
    let mut out = Vec::new();
    lowering.lower_expr(body, params, free_vars, &merged, scope_kinds, &mut out, allocation, sub_functions, name_prefix, case_id);
    finish_body(&mut out);
    out
}

fn count_same_kind(free_vars: &[(String, Storage)], pos: usize, kind: StorageKind) -> u32 {
    free_vars[..pos].iter().filter(|(_, s)| s.kind() == kind).count() as u32
}

/// Functions end in `EnterCaseContinuation` unless their last instruction
/// already transfers control away (a tail `Enter`, a `Switch` whose every
/// arm already ends itself, or the `PrintError`/`Exit` pair from a
/// pattern-match failure).
fn finish_body(instructions: &mut Vec<Instruction>) {
    match instructions.last() {
        Some(Instruction::Enter(_)) | Some(Instruction::Exit) | Some(Instruction::Switch { .. }) => {}
        _ => instructions.push(Instruction::EnterCaseContinuation),
    }
}

/// Lower a whole free-variable-annotated STG program into a Cmm [`Program`].
pub fn lower_program(annotated: &AnnotatedProgram) -> Program {
    let lowering = Lowering { globals: &annotated.globals };
    let functions = annotated
        .bindings
        .iter()
        .map(|b: &AnnotatedBinding| lowering.lower_binding_function(&b.name, &b.lambda, &HashMap::new()))
        .collect();
    Program { functions, entry: annotated.entry.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freevars::annotate_program;
    use crate::parser::Parser;
    use crate::resolver::resolve;
    use crate::simplify::simplify;
    use crate::stg::lower_program as stg_lower;

    fn lower(source: &str) -> Program {
        let program = Parser::parse_program(source).unwrap();
        let resolved = resolve(program).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        let stg = stg_lower(&simplified, resolved.constructors, "main").unwrap();
        let annotated = annotate_program(&stg);
        lower_program(&annotated)
    }

    fn find_switch<'a>(function: &'a Function) -> Option<&'a Instruction> {
        function
            .instructions
            .iter()
            .find(|i| matches!(i, Instruction::Switch { .. }))
            .or_else(|| function.sub_functions.iter().find_map(find_switch))
    }

    #[test]
    fn lowers_a_single_printint_call_to_a_builtin_instruction() {
        let cmm = lower("main = printInt 42");
        let main = cmm.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main.instructions.iter().any(|i| matches!(i, Instruction::Builtin1(BuiltinOp::PrintInt, _))));
    }

    #[test]
    fn case_over_a_constructor_splits_into_a_bury_and_an_alts_sub_function() {
        let cmm = lower(
            "data L = N | C Int L; sum N = 0; sum (C x xs) = x + sum xs; main = printInt (sum (C 1 N))",
        );
        let sum_fn = cmm.functions.iter().find(|f| f.name == "sum").unwrap();
        assert!(sum_fn.instructions.iter().any(|i| matches!(i, Instruction::PushContinuation(_))));
        assert!(!sum_fn.instructions.iter().any(|i| matches!(i, Instruction::Switch { .. })));
        match find_switch(sum_fn) {
            Some(Instruction::Switch { kind: SwitchKind::Constructor, .. }) => {}
            other => panic!("expected a Switch in an Alts sub-function, got {other:?}"),
        }
    }

    #[test]
    fn live_variables_across_a_case_are_buried_before_the_scrutinee_is_entered() {
        // `y` is free in both alts (it's `sum`'s own first parameter, not
        // part of the `xs` pattern), so it must be carried across the
        // scrutinee's evaluation via Bury.
        let cmm = lower(
            "data L = N | C Int L; \
             sum y xs = case xs of (N -> y; C x rest -> x + sum y rest); \
             main = printInt (sum 10 (C 1 (C 2 N)))",
        );
        let sum_fn = cmm.functions.iter().find(|f| f.name == "sum").unwrap();
        let push_index = sum_fn.instructions.iter().position(|i| matches!(i, Instruction::PushContinuation(_))).unwrap();
        assert!(sum_fn.instructions[..push_index].iter().any(|i| matches!(i, Instruction::Bury(_))));
    }

    #[test]
    fn nested_let_becomes_a_sub_function_with_an_alloc_table() {
        let cmm = lower("main = let y = 1 + 2 in printInt y");
        let main = cmm.functions.iter().find(|f| f.name == "main").unwrap();
        assert!(main.instructions.iter().any(|i| matches!(i, Instruction::AllocTable { .. })));
        assert!(!main.sub_functions.is_empty());
    }
}
