//! STG intermediate representation and its lowering from the simplified,
//! typed AST.
//!
//! This is the A-normal-form layer: every application, constructor, and
//! builtin is fully saturated and every argument is an atom. Non-atomic
//! subexpressions are lifted into fresh top-level-shaped bindings by
//! [`Context::atomize`].

use crate::ast::{Alt as SurfaceAlt, Expr as SurfaceExpr, Literal, Pattern};
use crate::error::InternalError;
use crate::resolver::ConstructorMap;
use stgc_core::{BuiltinOp, Tag};
use std::collections::HashMap;

pub type Name = String;

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Int(i64),
    Str(String),
    Var(Name),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alts {
    Int { alts: Vec<(i64, Expr)>, default: DefaultAlt },
    Bool { alts: Vec<(bool, Expr)>, default: DefaultAlt },
    Str { alts: Vec<(String, Expr)>, default: DefaultAlt },
    Constructor { alts: Vec<(Tag, Vec<Name>, Expr)>, default: DefaultAlt },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultAlt {
    Wildcard(Box<Expr>),
    Bind(Name, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Atom),
    /// Saturated application of a name to atoms.
    Apply { func: Name, args: Vec<Atom> },
    /// Saturated constructor application.
    Constructor { tag: Tag, args: Vec<Atom> },
    /// Saturated builtin application.
    Builtin { op: BuiltinOp, args: Vec<Atom> },
    Case { scrutinee: Box<Expr>, alts: Alts },
    Let { bindings: Vec<Binding>, body: Box<Expr> },
    /// Pattern-match-failure sentinel (§3.1).
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Updateable {
    U,
    N,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaForm {
    /// Free variables in stable order: pointer-kinded first, then
    /// int-kinded, then string-kinded. Populated by [`crate::freevars`];
    /// empty immediately after STG lowering.
    pub free_vars: Vec<Name>,
    pub updateable: Updateable,
    pub params: Vec<Name>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Name,
    pub lambda_form: LambdaForm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub bindings: Vec<Binding>,
    pub entry: Name,
}

/// Threaded explicitly through every lowering function (§9's "replace
/// monadic readers/writers/state with an explicit Context record").
pub struct Context {
    counter: u64,
    constructors: ConstructorMap,
    extra_bindings: Vec<Binding>,
}

impl Context {
    pub fn new(constructors: ConstructorMap) -> Self {
        Context { counter: 0, constructors, extra_bindings: Vec::new() }
    }

    fn fresh_name(&mut self) -> Name {
        let n = self.counter;
        self.counter += 1;
        format!("${n}")
    }

    /// Atomize(e): if `e` is already an atom, return it with no bindings.
    /// Otherwise compile `e` to a zero-parameter LambdaForm bound to a fresh
    /// name and return that name as the atom, alongside the binding.
    fn atomize(&mut self, expr: &SurfaceExpr) -> Result<Atom, InternalError> {
        match expr {
            SurfaceExpr::Literal(Literal::Int(n)) => Ok(Atom::Int(*n)),
            SurfaceExpr::Literal(Literal::Str(s)) => Ok(Atom::Str(s.clone())),
            SurfaceExpr::Var { name, .. } => Ok(Atom::Var(name.clone())),
            other => {
                let body = self.convert_expr(other)?;
                let name = self.fresh_name();
                self.extra_bindings.push(Binding {
                    name: name.clone(),
                    lambda_form: LambdaForm {
                        free_vars: Vec::new(),
                        updateable: Updateable::U,
                        params: Vec::new(),
                        body,
                    },
                });
                Ok(Atom::Var(name))
            }
        }
    }

    fn atomize_all(&mut self, exprs: &[SurfaceExpr]) -> Result<Vec<Atom>, InternalError> {
        exprs.iter().map(|e| self.atomize(e)).collect()
    }

    /// GatherApplications(e): flatten a left-associated chain of `App` nodes
    /// into `(head, args)`.
    fn gather_applications(expr: &SurfaceExpr) -> (&SurfaceExpr, Vec<&SurfaceExpr>) {
        let mut args = Vec::new();
        let mut current = expr;
        while let SurfaceExpr::App { func, arg, .. } = current {
            args.push(arg.as_ref());
            current = func;
        }
        args.reverse();
        (current, args)
    }

    /// Take a snapshot of bindings accumulated by atomizing, wrap `body` in
    /// a `Let` of them (or return `body` unwrapped if none were produced).
    /// This is `makeLet`.
    fn make_let(&mut self, mark: usize, body: Expr) -> Expr {
        if self.extra_bindings.len() == mark {
            body
        } else {
            let bindings = self.extra_bindings.split_off(mark);
            Expr::Let { bindings, body: Box::new(body) }
        }
    }

    pub fn convert_expr(&mut self, expr: &SurfaceExpr) -> Result<Expr, InternalError> {
        match expr {
            SurfaceExpr::Literal(Literal::Int(n)) => Ok(Expr::Literal(Atom::Int(*n))),
            SurfaceExpr::Literal(Literal::Str(s)) => Ok(Expr::Literal(Atom::Str(s.clone()))),
            SurfaceExpr::Var { name, .. } => {
                if let Some(info) = self.constructors.get(name) {
                    if info.arity != 0 {
                        return Err(InternalError(format!(
                            "constructor `{name}` used with arity 0, expected {}",
                            info.arity
                        )));
                    }
                    Ok(Expr::Constructor { tag: info.tag, args: Vec::new() })
                } else if BuiltinOp::from_identifier(name).is_some() {
                    Err(InternalError(format!("builtin `{name}` cannot be used unapplied")))
                } else {
                    Ok(Expr::Apply { func: name.clone(), args: Vec::new() })
                }
            }
            SurfaceExpr::Let { bindings, body } => {
                let mut out_bindings = Vec::with_capacity(bindings.len());
                for (name, value) in bindings {
                    let lambda_form = self.expr_to_lambda(value)?;
                    out_bindings.push(Binding { name: name.clone(), lambda_form });
                }
                let body = self.convert_expr(body)?;
                Ok(Expr::Let { bindings: out_bindings, body: Box::new(body) })
            }
            SurfaceExpr::Lambda { .. } => {
                let mark = self.extra_bindings.len();
                let atom = self.atomize(expr)?;
                let Atom::Var(name) = atom else {
                    return Err(InternalError("atomize of a lambda did not yield a name".into()));
                };
                Ok(self.make_let(mark, Expr::Apply { func: name, args: Vec::new() }))
            }
            SurfaceExpr::Case { scrutinee, alts, .. } => {
                let scrutinee_expr = self.convert_expr(scrutinee)?;
                let alts = self.convert_alts(alts)?;
                Ok(Expr::Case { scrutinee: Box::new(scrutinee_expr), alts })
            }
            SurfaceExpr::Builtin { op, args, .. } => {
                let mark = self.extra_bindings.len();
                let atoms = self.atomize_all(args)?;
                if atoms.len() != op.arity() {
                    return Err(InternalError(format!(
                        "builtin {op:?} applied to {} args, expected {}",
                        atoms.len(),
                        op.arity()
                    )));
                }
                Ok(self.make_let(mark, Expr::Builtin { op: *op, args: atoms }))
            }
            SurfaceExpr::App { .. } => {
                let (head, args) = Self::gather_applications(expr);
                let mark = self.extra_bindings.len();
                let atoms = self.atomize_all(
                    &args.into_iter().cloned().collect::<Vec<_>>(),
                )?;
                match head {
                    SurfaceExpr::Var { name, .. } => {
                        if let Some(info) = self.constructors.get(name) {
                            if info.arity != atoms.len() {
                                return Err(InternalError(format!(
                                    "constructor `{name}` applied to {} args, expected {}",
                                    atoms.len(),
                                    info.arity
                                )));
                            }
                            Ok(self.make_let(mark, Expr::Constructor { tag: info.tag, args: atoms }))
                        } else if let Some(op) = BuiltinOp::from_identifier(name) {
                            if op.arity() != atoms.len() {
                                return Err(InternalError(format!(
                                    "builtin `{name}` applied to {} args, expected {}",
                                    atoms.len(),
                                    op.arity()
                                )));
                            }
                            Ok(self.make_let(mark, Expr::Builtin { op, args: atoms }))
                        } else {
                            Ok(self.make_let(mark, Expr::Apply { func: name.clone(), args: atoms }))
                        }
                    }
                    other => {
                        let head_atom = self.atomize(other)?;
                        let Atom::Var(func) = head_atom else {
                            return Err(InternalError("atomized application head was a literal".into()));
                        };
                        Ok(self.make_let(mark, Expr::Apply { func, args: atoms }))
                    }
                }
            }
        }
    }

    fn convert_alts(&mut self, alts: &[SurfaceAlt]) -> Result<Alts, InternalError> {
        if alts.is_empty() {
            return Err(InternalError("case with no alternatives".into()));
        }
        // Classify by the *kind* of the first non-wildcard/non-var pattern;
        // the simplifier guarantees every row shares one scrutinee kind.
        let kind = alts.iter().find_map(|a| match &a.pattern {
            Pattern::Literal(Literal::Int(_)) => Some("int"),
            Pattern::Literal(Literal::Str(_)) => Some("str"),
            Pattern::Constructor { name, .. } => {
                Some(if name == "True" || name == "False" { "bool" } else { "constr" })
            }
            _ => None,
        });

        let mut default = None;
        for alt in alts {
            if matches!(alt.pattern, Pattern::Wildcard | Pattern::Var(_)) {
                let body = self.convert_expr(&alt.body)?;
                default = Some(match &alt.pattern {
                    Pattern::Var(name) => DefaultAlt::Bind(name.clone(), Box::new(body)),
                    _ => DefaultAlt::Wildcard(Box::new(body)),
                });
            }
        }
        let default = default.unwrap_or_else(|| {
            DefaultAlt::Wildcard(Box::new(Expr::Error("Pattern Match Failure".into())))
        });

        match kind {
            Some("int") => {
                let mut rows = Vec::new();
                for alt in alts {
                    if let Pattern::Literal(Literal::Int(n)) = &alt.pattern {
                        rows.push((*n, self.convert_expr(&alt.body)?));
                    }
                }
                Ok(Alts::Int { alts: rows, default })
            }
            Some("str") => {
                let mut rows = Vec::new();
                for alt in alts {
                    if let Pattern::Literal(Literal::Str(s)) = &alt.pattern {
                        rows.push((s.clone(), self.convert_expr(&alt.body)?));
                    }
                }
                Ok(Alts::Str { alts: rows, default })
            }
            Some("bool") => {
                let mut rows = Vec::new();
                for alt in alts {
                    if let Pattern::Constructor { name, .. } = &alt.pattern {
                        if name == "True" || name == "False" {
                            rows.push((name == "True", self.convert_expr(&alt.body)?));
                        }
                    }
                }
                Ok(Alts::Bool { alts: rows, default })
            }
            _ => {
                let mut rows = Vec::new();
                for alt in alts {
                    if let Pattern::Constructor { name, args, .. } = &alt.pattern {
                        let info = self.constructors.get(name).ok_or_else(|| {
                            InternalError(format!("unresolved constructor `{name}` reached STG lowering"))
                        })?;
                        let binders = args
                            .iter()
                            .map(|p| match p {
                                Pattern::Var(n) => n.clone(),
                                Pattern::Wildcard => self.fresh_name(),
                                _ => unreachable!("simplifier guarantees flat patterns"),
                            })
                            .collect();
                        rows.push((info.tag, binders, self.convert_expr(&alt.body)?));
                    }
                }
                Ok(Alts::Constructor { alts: rows, default })
            }
        }
    }

    /// ExprToLambda(e): strip outer lambdas into a parameter list, then
    /// lower the remaining body. Always produces an updateable (`U`)
    /// lambda form; a later optimization pass may downgrade it (§4.1).
    fn expr_to_lambda(&mut self, expr: &SurfaceExpr) -> Result<LambdaForm, InternalError> {
        let mut params = Vec::new();
        let mut body_expr = expr;
        while let SurfaceExpr::Lambda { params: more, body } = body_expr {
            params.extend(more.iter().cloned());
            body_expr = body;
        }
        let body = self.convert_expr(body_expr)?;
        Ok(LambdaForm { free_vars: Vec::new(), updateable: Updateable::U, params, body })
    }
}

/// Lower a whole simplified, resolved program into an STG [`Program`].
/// `entry_name` names the value definition to use as the program entry
/// (conventionally `"main"`).
pub fn lower_program(
    value_defs: &[crate::ast::ValueDef],
    constructors: ConstructorMap,
    entry_name: &str,
) -> Result<Program, InternalError> {
    let mut ctx = Context::new(constructors);
    let mut bindings = Vec::new();
    for def in value_defs {
        if def.equations.len() != 1 {
            return Err(InternalError(format!(
                "`{}` reached STG lowering with {} equations; the simplifier must merge these first",
                def.name,
                def.equations.len()
            )));
        }
        let equation = &def.equations[0];
        if !equation.patterns.is_empty() {
            return Err(InternalError(format!(
                "`{}` reached STG lowering with unconverted parameter patterns",
                def.name
            )));
        }
        let lambda_form = ctx.expr_to_lambda(&equation.body)?;
        bindings.push(Binding { name: def.name.clone(), lambda_form });
        bindings.append(&mut ctx.extra_bindings);
    }
    if !value_defs.iter().any(|d| d.name == entry_name) {
        return Err(InternalError(format!("no `{entry_name}` definition found")));
    }
    Ok(Program { bindings, entry: entry_name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve;
    use crate::simplify::simplify;

    fn lower(source: &str) -> Program {
        let program = Parser::parse_program(source).unwrap();
        let resolved = resolve(program).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        lower_program(&simplified, resolved.constructors, "main").unwrap()
    }

    #[test]
    fn lowers_saturated_arithmetic() {
        let program = lower("main = printInt (1 + 2 * 3)");
        let main = program.bindings.iter().find(|b| b.name == "main").unwrap();
        match &main.lambda_form.body {
            Expr::Let { bindings, body } => {
                assert!(!bindings.is_empty());
                assert!(matches!(**body, Expr::Apply { .. }));
            }
            Expr::Apply { .. } => {}
            other => panic!("unexpected main body: {other:?}"),
        }
    }

    #[test]
    fn lowers_constructor_application() {
        let program = lower("data L = N | C Int L; main = printInt (sumL (C 1 N)); sumL N = 0; sumL (C x xs) = x + sumL xs");
        assert!(program.bindings.iter().any(|b| b.name == "sumL"));
    }
}
