//! Constraint-based type checker.
//!
//! Walks the resolved AST generating `Equal` constraints (one fresh
//! `TypeVar` per binder, one constraint per application/case/builtin use),
//! then discharges all of them in a single batch via [`crate::types::solve`].
//! No mutable union-find is threaded through the walk — see §9's redesign
//! directive, implemented literally in `types.rs`.

use crate::ast::{DataDecl, Expr, Literal, Pattern, ValueDef};
use crate::error::{Span, TypeError};
use crate::types::{solve, Constraint, Type, TypeVar};
use stgc_core::BuiltinOp;
use std::collections::HashMap;

struct CtorSignature {
    fields: Vec<Type>,
    type_name: String,
}

struct TypeChecker {
    next_var: TypeVar,
    constraints: Vec<Constraint>,
    ctors: HashMap<String, CtorSignature>,
}

/// Map a field/annotation type as parsed (every uppercase-leading identifier
/// lexes as a `Constructor` token, so primitive type names and user data
/// type names are syntactically indistinguishable until now).
fn resolve_named_type(ty: &Type) -> Type {
    match ty {
        Type::Data(name) => match name.as_str() {
            "Int" => Type::Int,
            "Bool" => Type::Bool,
            "String" => Type::Str,
            _ => ty.clone(),
        },
        other => other.clone(),
    }
}

impl TypeChecker {
    fn fresh(&mut self) -> Type {
        let v = self.next_var;
        self.next_var += 1;
        Type::Var(v)
    }

    fn constrain(&mut self, at: Span, expected: Type, found: Type) {
        self.constraints.push(Constraint { at, expected, found });
    }

    fn infer(&mut self, expr: &Expr, env: &HashMap<String, Type>) -> Type {
        match expr {
            Expr::Literal(Literal::Int(_)) => Type::Int,
            Expr::Literal(Literal::Str(_)) => Type::Str,
            Expr::Var { name, at } => {
                if let Some(ty) = env.get(name) {
                    return ty.clone();
                }
                if let Some(sig) = self.ctors.get(name) {
                    if sig.fields.is_empty() {
                        return Type::Data(sig.type_name.clone());
                    }
                }
                if BuiltinOp::from_identifier(name).is_some() {
                    // Only reachable if a builtin is referenced without being
                    // fully applied; `stg::lower_program` rejects this later
                    // with a clearer diagnostic, so just hand back a fresh
                    // variable here rather than duplicating that check.
                    return self.fresh();
                }
                // Another top-level binding not yet in `env` (forward
                // reference) — its own equation supplies the constraint.
                let _ = at;
                self.fresh()
            }
            Expr::App { .. } => self.infer_application(expr, env),
            Expr::Lambda { params, body } => {
                let mut inner = env.clone();
                let param_types: Vec<Type> = params.iter().map(|_| self.fresh()).collect();
                for (p, t) in params.iter().zip(&param_types) {
                    inner.insert(p.clone(), t.clone());
                }
                let body_ty = self.infer(body, &inner);
                param_types
                    .into_iter()
                    .rev()
                    .fold(body_ty, |acc, t| Type::Fun(Box::new(t), Box::new(acc)))
            }
            Expr::Let { bindings, body } => {
                let mut inner = env.clone();
                for (name, value) in bindings {
                    let ty = self.infer(value, &inner);
                    inner.insert(name.clone(), ty);
                }
                self.infer(body, &inner)
            }
            Expr::Case { scrutinee, alts, at } => {
                let scrutinee_ty = self.infer(scrutinee, env);
                let result = self.fresh();
                for alt in alts {
                    let mut inner = env.clone();
                    self.bind_pattern_type(&alt.pattern, &scrutinee_ty, *at, &mut inner);
                    let body_ty = self.infer(&alt.body, &inner);
                    self.constrain(*at, result.clone(), body_ty);
                }
                result
            }
            Expr::Builtin { op, args, at } => {
                let arg_tys: Vec<Type> = args.iter().map(|a| self.infer(a, env)).collect();
                let expected_arg_ty = if op.returns_string() || matches!(op, BuiltinOp::PrintString) {
                    Type::Str
                } else {
                    Type::Int
                };
                for t in &arg_tys {
                    self.constrain(*at, expected_arg_ty.clone(), t.clone());
                }
                if op.returns_bool() {
                    Type::Bool
                } else if op.returns_string() {
                    Type::Str
                } else {
                    Type::Int
                }
            }
        }
    }

    fn infer_application(&mut self, expr: &Expr, env: &HashMap<String, Type>) -> Type {
        let (head, args) = spine(expr);
        let arg_tys: Vec<Type> = args.iter().map(|a| self.infer(a, env)).collect();
        if let Expr::Var { name, at } = head {
            if let Some(sig) = self.ctors.get(name) {
                let fields = sig.fields.clone();
                let type_name = sig.type_name.clone();
                for (field_ty, arg_ty) in fields.iter().zip(&arg_tys) {
                    self.constrain(*at, field_ty.clone(), arg_ty.clone());
                }
                return Type::Data(type_name);
            }
            if let Some(op) = BuiltinOp::from_identifier(name) {
                let expected_arg_ty = if op.returns_string() || matches!(op, BuiltinOp::PrintString) {
                    Type::Str
                } else {
                    Type::Int
                };
                for t in &arg_tys {
                    self.constrain(*at, expected_arg_ty.clone(), t.clone());
                }
                return if op.returns_bool() {
                    Type::Bool
                } else if op.returns_string() {
                    Type::Str
                } else {
                    Type::Int
                };
            }
        }
        let head_ty = self.infer(head, env);
        let result = self.fresh();
        let built = arg_tys
            .into_iter()
            .rev()
            .fold(result.clone(), |acc, t| Type::Fun(Box::new(t), Box::new(acc)));
        self.constrain(Span::default(), built, head_ty);
        result
    }

    fn bind_pattern_type(&mut self, pattern: &Pattern, scrutinee_ty: &Type, at: Span, env: &mut HashMap<String, Type>) {
        match pattern {
            Pattern::Wildcard => {}
            Pattern::Var(name) => {
                env.insert(name.clone(), scrutinee_ty.clone());
            }
            Pattern::Literal(Literal::Int(_)) => self.constrain(at, scrutinee_ty.clone(), Type::Int),
            Pattern::Literal(Literal::Str(_)) => self.constrain(at, scrutinee_ty.clone(), Type::Str),
            Pattern::Constructor { name, .. } if name == "True" || name == "False" => {
                self.constrain(at, scrutinee_ty.clone(), Type::Bool);
            }
            Pattern::Constructor { name, args, .. } => {
                if let Some(sig) = self.ctors.get(name) {
                    let type_name = sig.type_name.clone();
                    let fields = sig.fields.clone();
                    self.constrain(at, scrutinee_ty.clone(), Type::Data(type_name));
                    for (field_ty, arg) in fields.iter().zip(args) {
                        if let Pattern::Var(n) = arg {
                            env.insert(n.clone(), field_ty.clone());
                        }
                    }
                }
            }
        }
    }
}

fn spine(expr: &Expr) -> (&Expr, Vec<&Expr>) {
    let mut args = Vec::new();
    let mut current = expr;
    while let Expr::App { func, arg, .. } = current {
        args.push(arg.as_ref());
        current = func;
    }
    args.reverse();
    (current, args)
}

/// Type-check every top-level value definition (after simplification, so
/// each has exactly one equation and zero-or-more plain variable patterns).
/// Returns nothing on success; the inferred types themselves are not needed
/// downstream (storage analysis in `freevars` works directly off STG shapes).
pub fn typecheck(data_decls: &[DataDecl], value_defs: &[ValueDef]) -> Result<(), TypeError> {
    let mut ctors = HashMap::new();
    for decl in data_decls {
        for ctor in &decl.constructors {
            let fields = ctor.fields.iter().map(resolve_named_type).collect();
            ctors.insert(ctor.name.clone(), CtorSignature { fields, type_name: decl.type_name.clone() });
        }
    }

    let mut checker = TypeChecker { next_var: 0, constraints: Vec::new(), ctors };
    let mut top_env: HashMap<String, Type> = HashMap::new();
    for def in value_defs {
        top_env.insert(def.name.clone(), checker.fresh());
    }

    for def in value_defs {
        let equation = &def.equations[0];
        let mut env = top_env.clone();
        let param_types: Vec<Type> = equation.patterns.iter().map(|_| checker.fresh()).collect();
        for (pattern, ty) in equation.patterns.iter().zip(&param_types) {
            if let Pattern::Var(name) = pattern {
                env.insert(name.clone(), ty.clone());
            }
        }
        let body_ty = checker.infer(&equation.body, &env);
        let fn_ty = param_types
            .into_iter()
            .rev()
            .fold(body_ty, |acc, t| Type::Fun(Box::new(t), Box::new(acc)));
        let declared = top_env.get(&def.name).unwrap().clone();
        checker.constrain(equation.at, declared, fn_ty);
    }

    solve(&checker.constraints)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve;
    use crate::simplify::simplify;

    fn check(source: &str) -> Result<(), TypeError> {
        let program = Parser::parse_program(source).unwrap();
        let resolved = resolve(program).unwrap();
        let simplified = simplify(resolved.value_defs).unwrap();
        typecheck(&resolved.data_decls, &simplified)
    }

    #[test]
    fn accepts_well_typed_arithmetic() {
        assert!(check("main = printInt (1 + 2 * 3)").is_ok());
    }

    #[test]
    fn accepts_if_then_else_over_a_comparison() {
        assert!(check("main = printInt (if 1 < 2 then 10 else 20)").is_ok());
    }

    #[test]
    fn accepts_recursive_list_sum() {
        assert!(check(
            "data L = N | C Int L; sum N = 0; sum (C x xs) = x + sum xs; main = printInt (sum (C 1 N))"
        )
        .is_ok());
    }

    #[test]
    fn rejects_string_plus_int() {
        assert!(check(r#"main = printInt ("hi" + 1)"#).is_err());
    }
}
