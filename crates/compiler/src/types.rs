//! Types, type schemes, and the substitution-based constraint solver.
//!
//! Per §9's redesign directive, this is deliberately *not* a monadic
//! unification-with-mutable-state design: `Substitution` is an immutable map
//! returned by the solver, `Constraint`s are collected up front into a flat
//! list, and `solve` is a pure function from `(constraints, substitution)` to
//! `Result<substitution, error>`.

use crate::error::{Span, TypeError};
use std::collections::BTreeMap;
use std::fmt;

pub type TypeVar = u32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Type {
    Int,
    Bool,
    Str,
    /// A user-declared data type, named (no parametric polymorphism in user
    /// data types — the source language's ADTs are all monomorphic).
    Data(String),
    Fun(Box<Type>, Box<Type>),
    Var(TypeVar),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
            Type::Str => write!(f, "String"),
            Type::Data(name) => write!(f, "{name}"),
            Type::Fun(a, b) => write!(f, "({a} -> {b})"),
            Type::Var(v) => write!(f, "t{v}"),
        }
    }
}

/// A `forall`-generalized type. Generalization happens once, at top-level
/// binding boundaries; nothing in this language needs let-polymorphism
/// inside a single equation's body.
#[derive(Debug, Clone)]
pub struct Scheme {
    pub vars: Vec<TypeVar>,
    pub ty: Type,
}

impl Scheme {
    pub fn monomorphic(ty: Type) -> Self {
        Scheme { vars: Vec::new(), ty }
    }
}

/// An immutable substitution: `TypeVar -> Type`. Composing two substitutions
/// clones rather than mutating in place — the solver always returns a new
/// map.
#[derive(Debug, Clone, Default)]
pub struct Substitution(BTreeMap<TypeVar, Type>);

impl Substitution {
    pub fn empty() -> Self {
        Substitution(BTreeMap::new())
    }

    pub fn singleton(var: TypeVar, ty: Type) -> Self {
        let mut map = BTreeMap::new();
        map.insert(var, ty);
        Substitution(map)
    }

    /// Apply this substitution to a type, recursively.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var(v) => match self.0.get(v) {
                Some(replacement) if replacement != ty => self.apply(replacement),
                _ => ty.clone(),
            },
            Type::Fun(a, b) => Type::Fun(Box::new(self.apply(a)), Box::new(self.apply(b))),
            other => other.clone(),
        }
    }

    /// Compose `self` after `other`: `(self • other).apply(t) ==
    /// self.apply(other.apply(t))`. Returns a new map; neither input is
    /// mutated.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut map: BTreeMap<TypeVar, Type> =
            other.0.iter().map(|(v, t)| (*v, self.apply(t))).collect();
        for (v, t) in &self.0 {
            map.entry(*v).or_insert_with(|| t.clone());
        }
        Substitution(map)
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub at: Span,
    pub expected: Type,
    pub found: Type,
}

fn occurs(var: TypeVar, ty: &Type) -> bool {
    match ty {
        Type::Var(v) => *v == var,
        Type::Fun(a, b) => occurs(var, a) || occurs(var, b),
        _ => false,
    }
}

fn bind(at: Span, var: TypeVar, ty: &Type) -> Result<Substitution, TypeError> {
    if let Type::Var(v) = ty {
        if *v == var {
            return Ok(Substitution::empty());
        }
    }
    if occurs(var, ty) {
        return Err(TypeError::OccursCheck {
            at,
            var: Type::Var(var).to_string(),
            ty: ty.to_string(),
        });
    }
    Ok(Substitution::singleton(var, ty.clone()))
}

/// Unify two types under a substitution already accumulated so far, per the
/// §9 directive: `unify : (Type, Type, Substitution) -> Result<Substitution,
/// TypeError>`.
pub fn unify(at: Span, a: &Type, b: &Type, subst: &Substitution) -> Result<Substitution, TypeError> {
    let a = subst.apply(a);
    let b = subst.apply(b);
    match (&a, &b) {
        (Type::Var(v), other) | (other, Type::Var(v)) => bind(at, *v, other),
        (Type::Fun(a1, a2), Type::Fun(b1, b2)) => {
            let s1 = unify(at, a1, b1, subst)?;
            let s2 = unify(at, &s1.apply(a2), &s1.apply(b2), &s1)?;
            Ok(s2.compose(&s1))
        }
        (x, y) if x == y => Ok(Substitution::empty()),
        (x, y) => Err(TypeError::Mismatch { at, expected: x.to_string(), found: y.to_string() }),
    }
}

/// Solve a batch of constraints in one pass, composing substitutions
/// functionally as each constraint is discharged. No threaded mutable
/// union-find: each step produces a brand-new `Substitution`.
pub fn solve(constraints: &[Constraint]) -> Result<Substitution, TypeError> {
    let mut subst = Substitution::empty();
    for c in constraints {
        let expected = subst.apply(&c.expected);
        let found = subst.apply(&c.found);
        let step = unify(c.at, &expected, &found, &subst)?;
        subst = step.compose(&subst);
    }
    Ok(subst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_function_types() {
        let at = Span::default();
        let a = Type::Fun(Box::new(Type::Var(0)), Box::new(Type::Int));
        let b = Type::Fun(Box::new(Type::Bool), Box::new(Type::Var(1)));
        let s = unify(at, &a, &b, &Substitution::empty()).unwrap();
        assert_eq!(s.apply(&Type::Var(0)), Type::Bool);
        assert_eq!(s.apply(&Type::Var(1)), Type::Int);
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let at = Span::default();
        let v = Type::Var(0);
        let f = Type::Fun(Box::new(v.clone()), Box::new(Type::Int));
        assert!(unify(at, &v, &f, &Substitution::empty()).is_err());
    }

    #[test]
    fn solve_composes_across_constraints() {
        let at = Span::default();
        let constraints = vec![
            Constraint { at, expected: Type::Var(0), found: Type::Int },
            Constraint { at, expected: Type::Var(1), found: Type::Fun(Box::new(Type::Var(0)), Box::new(Type::Bool)) },
        ];
        let subst = solve(&constraints).unwrap();
        assert_eq!(subst.apply(&Type::Var(1)), Type::Fun(Box::new(Type::Int), Box::new(Type::Bool)));
    }
}
