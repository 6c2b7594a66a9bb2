//! Name and constructor resolution.
//!
//! Walks the parsed [`Program`] and checks that every variable reference
//! resolves to something in scope (a pattern binding, a `let`/lambda
//! binding, a top-level value, a constructor, or a builtin) and that every
//! constructor is used at its declared arity. Constructor tags are assigned
//! here, in declaration order within each `data` block (§4.2).

use crate::ast::{Alt, ConstructorInfo, DataDecl, Expr, Pattern, Program, ValueDef};
use crate::error::ResolveError;
use stgc_core::BuiltinOp;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ConstructorMap(HashMap<String, ConstructorInfo>);

impl ConstructorMap {
    pub fn get(&self, name: &str) -> Option<&ConstructorInfo> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

pub struct ResolvedProgram {
    pub data_decls: Vec<DataDecl>,
    pub value_defs: Vec<ValueDef>,
    pub constructors: ConstructorMap,
}

pub fn resolve(program: Program) -> Result<ResolvedProgram, ResolveError> {
    let constructors = build_constructor_map(&program.data_decls)?;

    let known_types: HashSet<&str> =
        program.data_decls.iter().map(|d| d.type_name.as_str()).collect();
    for decl in &program.data_decls {
        for ctor in &decl.constructors {
            for field in &ctor.fields {
                if let crate::types::Type::Data(name) = field {
                    if !known_types.contains(name.as_str()) {
                        return Err(ResolveError::UnknownType { at: ctor.at, name: name.clone() });
                    }
                }
            }
        }
    }

    let top_level: HashSet<&str> = program.value_defs.iter().map(|d| d.name.as_str()).collect();

    for def in &program.value_defs {
        for equation in &def.equations {
            let mut scope: HashSet<String> = HashSet::new();
            for pattern in &equation.patterns {
                bind_pattern(pattern, &mut scope, &constructors)?;
            }
            check_expr(&equation.body, &scope, &top_level, &constructors)?;
        }
    }

    Ok(ResolvedProgram { data_decls: program.data_decls, value_defs: program.value_defs, constructors })
}

fn build_constructor_map(data_decls: &[DataDecl]) -> Result<ConstructorMap, ResolveError> {
    let mut map = HashMap::new();
    for decl in data_decls {
        for (tag, ctor) in decl.constructors.iter().enumerate() {
            if map.contains_key(&ctor.name) {
                return Err(ResolveError::UnknownConstructor { at: ctor.at, name: ctor.name.clone() });
            }
            map.insert(ctor.name.clone(), ConstructorInfo { arity: ctor.fields.len(), tag: tag as u32 });
        }
    }
    Ok(ConstructorMap(map))
}

fn bind_pattern(
    pattern: &Pattern,
    scope: &mut HashSet<String>,
    constructors: &ConstructorMap,
) -> Result<(), ResolveError> {
    match pattern {
        Pattern::Wildcard | Pattern::Literal(_) => Ok(()),
        Pattern::Var(name) => {
            scope.insert(name.clone());
            Ok(())
        }
        Pattern::Constructor { name, at, args } if name == "True" || name == "False" => {
            if !args.is_empty() {
                return Err(ResolveError::ArityMismatch { at: *at, name: name.clone(), expected: 0, found: args.len() });
            }
            Ok(())
        }
        Pattern::Constructor { name, at, args } => {
            let info = constructors
                .get(name)
                .ok_or_else(|| ResolveError::UnknownConstructor { at: *at, name: name.clone() })?;
            if info.arity != args.len() {
                return Err(ResolveError::ArityMismatch {
                    at: *at,
                    name: name.clone(),
                    expected: info.arity,
                    found: args.len(),
                });
            }
            for arg in args {
                bind_pattern(arg, scope, constructors)?;
            }
            Ok(())
        }
    }
}

/// Flatten a left-associated application chain into its head and the
/// arguments applied to it, outermost-last (i.e. in source order).
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

fn check_expr(
    expr: &Expr,
    scope: &HashSet<String>,
    top_level: &HashSet<&str>,
    constructors: &ConstructorMap,
) -> Result<(), ResolveError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Var { name, at } => {
            if scope.contains(name)
                || top_level.contains(name.as_str())
                || constructors.contains(name)
                || BuiltinOp::from_identifier(name).is_some()
            {
                Ok(())
            } else {
                Err(ResolveError::UnknownName { at: *at, name: name.clone() })
            }
        }
        Expr::App { .. } => {
            let (head, args) = spine(expr);
            for arg in &args {
                check_expr(arg, scope, top_level, constructors)?;
            }
            if let Expr::Var { name, at } = head {
                if let Some(info) = constructors.get(name) {
                    if info.arity != args.len() {
                        return Err(ResolveError::ArityMismatch {
                            at: *at,
                            name: name.clone(),
                            expected: info.arity,
                            found: args.len(),
                        });
                    }
                    return Ok(());
                }
                if let Some(op) = BuiltinOp::from_identifier(name) {
                    if op.arity() != args.len() {
                        return Err(ResolveError::ArityMismatch {
                            at: *at,
                            name: name.clone(),
                            expected: op.arity(),
                            found: args.len(),
                        });
                    }
                    return Ok(());
                }
            }
            check_expr(head, scope, top_level, constructors)
        }
        Expr::Lambda { params, body } => {
            let mut inner = scope.clone();
            inner.extend(params.iter().cloned());
            check_expr(body, &inner, top_level, constructors)
        }
        Expr::Let { bindings, body } => {
            let mut inner = scope.clone();
            inner.extend(bindings.iter().map(|(name, _)| name.clone()));
            for (_, value) in bindings {
                check_expr(value, &inner, top_level, constructors)?;
            }
            check_expr(body, &inner, top_level, constructors)
        }
        Expr::Case { scrutinee, alts, .. } => {
            check_expr(scrutinee, scope, top_level, constructors)?;
            for Alt { pattern, body } in alts {
                let mut inner = scope.clone();
                bind_pattern(pattern, &mut inner, constructors)?;
                check_expr(body, &inner, top_level, constructors)?;
            }
            Ok(())
        }
        Expr::Builtin { args, .. } => {
            for arg in args {
                check_expr(arg, scope, top_level, constructors)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn resolves_recursive_list_program() {
        let program = Parser::parse_program(
            "data L = N | C Int L; sum N = 0; sum (C x xs) = x + sum xs; main = printInt (sum (C 1 N))",
        )
        .unwrap();
        let resolved = resolve(program).unwrap();
        assert_eq!(resolved.constructors.get("C").unwrap().arity, 2);
        assert_eq!(resolved.constructors.get("N").unwrap().tag, 0);
        assert_eq!(resolved.constructors.get("C").unwrap().tag, 1);
    }

    #[test]
    fn rejects_unknown_name() {
        let program = Parser::parse_program("main = printInt nosuchthing").unwrap();
        assert!(resolve(program).is_err());
    }

    #[test]
    fn rejects_constructor_arity_mismatch() {
        let program = Parser::parse_program("data L = N | C Int L; main = printInt (C 1)").unwrap();
        assert!(matches!(resolve(program), Err(ResolveError::ArityMismatch { .. })));
    }
}
