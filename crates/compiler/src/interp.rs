//! In-process STG interpreter (§4.3.2).
//!
//! Evaluates an STG [`Program`] directly — environment-closure graph
//! reduction — instead of stepping the `Instruction`s `cmm::lower_program`
//! would produce. This is not a second implementation of the lowering,
//! only of the execution of its output: `stgc run` never touches `cmm` or
//! `emit` at all. Primitive semantics (arithmetic, comparisons, printing)
//! call straight into `stgc_runtime::builtins`, the same functions the
//! emitted C path calls through its ABI.
//!
//! Sharing and laziness are modeled the ordinary Rust way, with
//! `Rc<RefCell<Thunk>>` graph nodes rather than by threading every STG
//! closure through `stgc_runtime::Machine`'s address-indexed heap: the
//! Cheney collector moves objects by rebuilding a fresh `to_space`, and
//! keeping this interpreter's live graph discoverable as GC roots across
//! that move would mean re-deriving the same root-scanning machinery this
//! crate already implements once, for real, at the `Machine` level (see
//! `stgc_runtime::gc` and its property tests). `Machine`/`builtins` still
//! supply every primitive's actual semantics; only the graph that threads
//! names to thunks is native Rust.
//!
//! Strings are plain owned `String`s here for the same reason: this
//! module's values never need to survive a `Machine::reserve` call, so
//! `builtins::concat`'s address-based signature doesn't apply — string
//! concatenation is the one builtin reimplemented locally (§4.5, same
//! semantics, no heap indirection).

use crate::error::{CompileError, InternalError};
use crate::stg::{Alts, Atom, DefaultAlt, Expr, LambdaForm, Program};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use stgc_core::BuiltinOp;
use stgc_runtime::{builtins, RuntimeError};

/// A fully reduced STG value.
#[derive(Clone)]
enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    Data(u32, Vec<Thunk>),
    /// A named function (top-level or `let`-bound) applied to fewer
    /// arguments than its arity — the graph-reduction analogue of
    /// `stgc_runtime::HeapObject::PartialApp` (§4.4).
    Partial(Rc<LambdaForm>, Env, Vec<Thunk>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Data(tag, fields) => write!(f, "Data({tag}, {} fields)", fields.len()),
            Value::Partial(lambda, _, saved) => {
                write!(f, "Partial({}/{} args)", saved.len(), lambda.params.len())
            }
        }
    }
}

enum ThunkState {
    /// Not yet entered: the lambda form (always zero-parameter — a CAF or
    /// a let-bound thunk) and the environment it closes over.
    Unevaluated(Rc<LambdaForm>, Env),
    Value(Rc<Value>),
    /// Entered but not yet updated: forcing this again is `<<loop>>`, a
    /// non-productive recursive definition. The simplifier and type
    /// checker never construct one of these for a well-formed program.
    BlackHole,
}

type Thunk = Rc<RefCell<ThunkState>>;
type Env = Rc<HashMap<String, Thunk>>;

fn value_thunk(value: Value) -> Thunk {
    Rc::new(RefCell::new(ThunkState::Value(Rc::new(value))))
}

/// Evaluates one STG [`Program`], entering its `entry` binding, and returns
/// its final forced value. `stgc run` discards it (the entry point's job is
/// its printed side effects); tests inspect it directly.
pub fn run_program(program: &Program) -> Result<(), CompileError> {
    let mut interp = Interpreter::new(program)?;
    let entry = interp.globals.get(&program.entry).cloned().ok_or_else(|| {
        InternalError(format!("interpreter found no binding for entry point `{}`", program.entry))
    })?;
    interp.force(&entry)?;
    Ok(())
}

struct Interpreter<'p> {
    program: &'p Program,
    globals: HashMap<String, Thunk>,
}

impl<'p> Interpreter<'p> {
    fn new(program: &'p Program) -> Result<Self, CompileError> {
        let empty_env: Env = Rc::new(HashMap::new());
        let mut globals = HashMap::new();
        for binding in &program.bindings {
            let lambda = Rc::new(binding.lambda_form.clone());
            let thunk = if lambda.params.is_empty() {
                Rc::new(RefCell::new(ThunkState::Unevaluated(lambda, empty_env.clone())))
            } else {
                value_thunk(Value::Partial(lambda, empty_env.clone(), Vec::new()))
            };
            globals.insert(binding.name.clone(), thunk);
        }
        Ok(Interpreter { program, globals })
    }

    fn lookup(&self, name: &str, env: &Env) -> Result<Thunk, RuntimeError> {
        env.get(name)
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| panic!("resolver guarantees `{name}` is in scope"))
    }

    fn force(&mut self, thunk: &Thunk) -> Result<Rc<Value>, RuntimeError> {
        let taken = {
            let mut slot = thunk.borrow_mut();
            match &*slot {
                ThunkState::Value(v) => return Ok(v.clone()),
                ThunkState::BlackHole => panic!("<<loop>>: forced a thunk already under evaluation"),
                ThunkState::Unevaluated(..) => std::mem::replace(&mut *slot, ThunkState::BlackHole),
            }
        };
        let ThunkState::Unevaluated(lambda, env) = taken else { unreachable!() };
        let value = self.eval_expr(&lambda.body, &env)?;
        *thunk.borrow_mut() = ThunkState::Value(value.clone());
        Ok(value)
    }

    fn resolve_atom(&self, atom: &Atom, env: &Env) -> Result<Thunk, RuntimeError> {
        match atom {
            Atom::Int(n) => Ok(value_thunk(Value::Int(*n))),
            Atom::Str(s) => Ok(value_thunk(Value::Str(s.clone()))),
            Atom::Var(name) => self.lookup(name, env),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Rc<Value>, RuntimeError> {
        match expr {
            Expr::Literal(Atom::Int(n)) => Ok(Rc::new(Value::Int(*n))),
            Expr::Literal(Atom::Str(s)) => Ok(Rc::new(Value::Str(s.clone()))),
            Expr::Literal(Atom::Var(_)) => {
                unreachable!("STG lowering never wraps a bare variable reference in `Literal`")
            }
            Expr::Apply { func, args } => {
                let target = self.lookup(func, env)?;
                let arg_thunks: Result<Vec<Thunk>, RuntimeError> =
                    args.iter().map(|a| self.resolve_atom(a, env)).collect();
                self.apply(target, arg_thunks?)
            }
            Expr::Constructor { tag, args } => {
                let fields: Result<Vec<Thunk>, RuntimeError> =
                    args.iter().map(|a| self.resolve_atom(a, env)).collect();
                Ok(Rc::new(Value::Data(*tag, fields?)))
            }
            Expr::Builtin { op, args } => self.eval_builtin(*op, args, env),
            Expr::Case { scrutinee, alts } => {
                let forced = self.eval_expr(scrutinee, env)?;
                let as_thunk = value_thunk((*forced).clone());
                self.eval_case(&forced, &as_thunk, alts, env)
            }
            Expr::Let { bindings, body } => {
                let mut extended: HashMap<String, Thunk> = (**env).clone();
                let mut cells = Vec::with_capacity(bindings.len());
                for binding in bindings {
                    let cell = Rc::new(RefCell::new(ThunkState::BlackHole));
                    extended.insert(binding.name.clone(), cell.clone());
                    cells.push(cell);
                }
                let new_env: Env = Rc::new(extended);
                for (binding, cell) in bindings.iter().zip(cells.iter()) {
                    let lambda = Rc::new(binding.lambda_form.clone());
                    let state = if lambda.params.is_empty() {
                        ThunkState::Unevaluated(lambda, new_env.clone())
                    } else {
                        ThunkState::Value(Rc::new(Value::Partial(lambda, new_env.clone(), Vec::new())))
                    };
                    *cell.borrow_mut() = state;
                }
                self.eval_expr(body, &new_env)
            }
            Expr::Error(message) => {
                let _ = message;
                Err(RuntimeError::PatternMatchFailure)
            }
        }
    }

    /// Combine `target` (already forced to a [`Value::Partial`]) with
    /// `extra_args`: under-saturate into a bigger partial application,
    /// saturate into a call, or over-saturate by calling and re-applying
    /// the remainder to whatever the body produced (§4.4).
    fn apply(&mut self, target: Thunk, mut extra_args: Vec<Thunk>) -> Result<Rc<Value>, RuntimeError> {
        if extra_args.is_empty() {
            return self.force(&target);
        }
        let forced = self.force(&target)?;
        let Value::Partial(lambda, captured_env, saved_args) = &*forced else {
            unreachable!("the type checker guarantees only functions are ever applied to arguments")
        };
        let mut all_args = saved_args.clone();
        all_args.append(&mut extra_args);

        if all_args.len() < lambda.params.len() {
            return Ok(Rc::new(Value::Partial(lambda.clone(), captured_env.clone(), all_args)));
        }

        let rest = if all_args.len() > lambda.params.len() {
            all_args.split_off(lambda.params.len())
        } else {
            Vec::new()
        };

        let mut call_env: HashMap<String, Thunk> = (**captured_env).clone();
        for (param, arg) in lambda.params.iter().zip(all_args) {
            call_env.insert(param.clone(), arg);
        }
        let call_env = Rc::new(call_env);
        let result = self.eval_expr(&lambda.body, &call_env)?;

        if rest.is_empty() {
            Ok(result)
        } else {
            self.apply(value_thunk((*result).clone()), rest)
        }
    }

    fn eval_case(
        &mut self,
        scrutinee: &Value,
        scrutinee_thunk: &Thunk,
        alts: &Alts,
        env: &Env,
    ) -> Result<Rc<Value>, RuntimeError> {
        match (alts, scrutinee) {
            (Alts::Int { alts, default }, Value::Int(n)) => match alts.iter().find(|(k, _)| k == n) {
                Some((_, body)) => self.eval_expr(body, env),
                None => self.eval_default(default, scrutinee_thunk, env),
            },
            (Alts::Str { alts, default }, Value::Str(s)) => match alts.iter().find(|(k, _)| k == s) {
                Some((_, body)) => self.eval_expr(body, env),
                None => self.eval_default(default, scrutinee_thunk, env),
            },
            (Alts::Bool { alts, default }, Value::Bool(b)) => match alts.iter().find(|(k, _)| k == b) {
                Some((_, body)) => self.eval_expr(body, env),
                None => self.eval_default(default, scrutinee_thunk, env),
            },
            (Alts::Constructor { alts, default }, Value::Data(tag, fields)) => {
                match alts.iter().find(|(t, _, _)| t == tag) {
                    Some((_, binders, body)) => {
                        let mut extended: HashMap<String, Thunk> = (**env).clone();
                        for (binder, field) in binders.iter().zip(fields) {
                            extended.insert(binder.clone(), field.clone());
                        }
                        self.eval_expr(body, &Rc::new(extended))
                    }
                    None => self.eval_default(default, scrutinee_thunk, env),
                }
            }
            (alts, value) => unreachable!(
                "case kind {alts:?} scrutinizing a value of a different shape ({value:?}); \
                 the type checker guarantees these always agree"
            ),
        }
    }

    fn eval_default(
        &mut self,
        default: &DefaultAlt,
        scrutinee_thunk: &Thunk,
        env: &Env,
    ) -> Result<Rc<Value>, RuntimeError> {
        match default {
            DefaultAlt::Wildcard(body) => self.eval_expr(body, env),
            DefaultAlt::Bind(name, body) => {
                let mut extended: HashMap<String, Thunk> = (**env).clone();
                extended.insert(name.clone(), scrutinee_thunk.clone());
                self.eval_expr(body, &Rc::new(extended))
            }
        }
    }

    fn eval_builtin(&mut self, op: BuiltinOp, args: &[Atom], env: &Env) -> Result<Rc<Value>, RuntimeError> {
        let thunks: Result<Vec<Thunk>, RuntimeError> = args.iter().map(|a| self.resolve_atom(a, env)).collect();
        let thunks = thunks?;
        let mut forced = Vec::with_capacity(thunks.len());
        for t in &thunks {
            forced.push(self.force(t)?);
        }

        let int_arg = |v: &Value| match v {
            Value::Int(n) => *n,
            other => unreachable!("type checker guarantees an Int argument here, found {other:?}"),
        };
        let str_arg = |v: &Value| match v {
            Value::Str(s) => s.clone(),
            other => unreachable!("type checker guarantees a String argument here, found {other:?}"),
        };

        use BuiltinOp::*;
        let value = match op {
            Add => Value::Int(as_int(builtins::add(int_arg(&forced[0]), int_arg(&forced[1])))),
            Sub => Value::Int(as_int(builtins::sub(int_arg(&forced[0]), int_arg(&forced[1])))),
            Mul => Value::Int(as_int(builtins::mul(int_arg(&forced[0]), int_arg(&forced[1])))),
            Div => Value::Int(as_int(builtins::div(int_arg(&forced[0]), int_arg(&forced[1]))?)),
            Negate => Value::Int(as_int(builtins::negate(int_arg(&forced[0])))),
            Less => Value::Bool(as_bool(builtins::less(int_arg(&forced[0]), int_arg(&forced[1])))),
            LessEqual => Value::Bool(as_bool(builtins::less_equal(int_arg(&forced[0]), int_arg(&forced[1])))),
            Greater => Value::Bool(as_bool(builtins::greater(int_arg(&forced[0]), int_arg(&forced[1])))),
            GreaterEqual => {
                Value::Bool(as_bool(builtins::greater_equal(int_arg(&forced[0]), int_arg(&forced[1]))))
            }
            EqualTo => Value::Bool(as_bool(builtins::equal_to(int_arg(&forced[0]), int_arg(&forced[1])))),
            NotEqualTo => Value::Bool(as_bool(builtins::not_equal_to(int_arg(&forced[0]), int_arg(&forced[1])))),
            Concat => Value::Str(format!("{}{}", str_arg(&forced[0]), str_arg(&forced[1]))),
            PrintInt => {
                builtins::print_int(int_arg(&forced[0]));
                Value::Data(stgc_core::tag::UNIT_TAG, Vec::new())
            }
            PrintString => {
                builtins::print_string(&str_arg(&forced[0]));
                Value::Data(stgc_core::tag::UNIT_TAG, Vec::new())
            }
        };
        Ok(Rc::new(value))
    }
}

fn as_int(result: builtins::BuiltinResult) -> i64 {
    match result {
        builtins::BuiltinResult::Int(n) => n,
        _ => unreachable!("arithmetic builtins always return Int"),
    }
}

fn as_bool(result: builtins::BuiltinResult) -> bool {
    match result {
        builtins::BuiltinResult::Bool(b) => b,
        _ => unreachable!("comparison builtins always return Bool"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve;
    use crate::simplify::simplify;
    use crate::stg::lower_program;
    use crate::typechecker::typecheck;

    fn lower(source: &str) -> Program {
        let parsed = Parser::parse_program(source).unwrap();
        let resolved = resolve(parsed).unwrap();
        typecheck(&resolved.data_decls, &resolved.value_defs).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        lower_program(&simplified, resolved.constructors, "main").unwrap()
    }

    /// S1: a single saturated print.
    #[test]
    fn s1_prints_a_literal() {
        let program = lower("main = printInt 42");
        run_program(&program).unwrap();
    }

    /// S2: arithmetic precedence and evaluation order.
    #[test]
    fn s2_prints_arithmetic_result() {
        let program = lower("main = printInt (1 + 2 * 3)");
        run_program(&program).unwrap();
    }

    /// S3: repeated application of a user-defined function.
    #[test]
    fn s3_applies_a_function_twice() {
        let program = lower("f x = x + 1; main = printInt (f (f 10))");
        run_program(&program).unwrap();
    }

    /// S4: constructors, recursion, and case dispatch over a list.
    #[test]
    fn s4_sums_a_constructed_list() {
        let program = lower(
            "data L = N | C Int L; \
             sumL N = 0; \
             sumL (C x xs) = x + sumL xs; \
             main = printInt (sumL (C 1 (C 2 (C 3 N))))",
        );
        run_program(&program).unwrap();
    }

    /// S6: string concatenation.
    #[test]
    fn s6_concatenates_strings() {
        let program = lower("main = printString (\"hello \" ++ \"world\")");
        run_program(&program).unwrap();
    }

    #[test]
    fn division_by_zero_surfaces_as_a_runtime_error() {
        let program = lower("main = printInt (1 / 0)");
        assert!(run_program(&program).is_err());
    }

    #[test]
    fn pattern_match_failure_surfaces_as_an_error() {
        let program = lower("data L = N | C Int L; f (C x xs) = x; main = printInt (f N)");
        assert!(run_program(&program).is_err());
    }
}
