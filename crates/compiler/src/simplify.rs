//! Pattern-equation simplifier.
//!
//! Turns a name's list of (possibly multiple) equations with flat,
//! single-level patterns into one equation whose patterns are plain
//! variable bindings and whose body is a tree of shallow `case`
//! expressions dispatching on those variables — the shape §4.1's STG
//! lowering expects as input. This is deliberately restricted to flat
//! patterns; a nested constructor pattern is rejected here rather than
//! handled by a general decision-tree compiler (that stays out of scope).

use crate::ast::{Alt, Equation, Expr, Literal, Pattern, ValueDef};
use crate::error::{Span, SimplifyError};

struct Row {
    patterns: Vec<Pattern>,
    bindings: Vec<(String, String)>,
    body: Expr,
}

pub fn simplify(value_defs: Vec<ValueDef>) -> Result<Vec<ValueDef>, SimplifyError> {
    value_defs.into_iter().map(simplify_def).collect()
}

fn simplify_def(def: ValueDef) -> Result<ValueDef, SimplifyError> {
    let arity = def.equations[0].patterns.len();
    for equation in &def.equations {
        if equation.patterns.len() != arity {
            return Err(SimplifyError::ArityMismatch {
                name: def.name.clone(),
                expected: arity,
                found: equation.patterns.len(),
            });
        }
        for pattern in &equation.patterns {
            if !pattern.is_flat() {
                return Err(SimplifyError::NestedPattern { name: def.name.clone() });
            }
        }
    }

    if arity == 0 {
        if def.equations.len() > 1 {
            return Err(SimplifyError::ArityMismatch {
                name: def.name.clone(),
                expected: 1,
                found: def.equations.len(),
            });
        }
        return Ok(def);
    }

    let scrutinees: Vec<String> = (0..arity).map(|i| format!("$arg{i}")).collect();
    let at = def.equations[0].at;
    let rows: Vec<Row> = def
        .equations
        .into_iter()
        .map(|eq| Row { patterns: eq.patterns, bindings: Vec::new(), body: eq.body })
        .collect();

    let body = compile(rows, &scrutinees, at);
    let equation = Equation { patterns: scrutinees.into_iter().map(Pattern::Var).collect(), body, at };
    Ok(ValueDef { name: def.name, annotation: def.annotation, equations: vec![equation] })
}

fn compile(rows: Vec<Row>, scrutinees: &[String], at: Span) -> Expr {
    let Some((scrutinee, rest)) = scrutinees.split_first() else {
        let row = rows.into_iter().next().expect("compile called with no rows");
        return wrap_bindings(row.bindings, row.body);
    };

    let col_all_default = rows.iter().all(|r| matches!(r.patterns[0], Pattern::Var(_) | Pattern::Wildcard));
    if col_all_default {
        let next_rows = rows
            .into_iter()
            .map(|mut r| {
                let col = r.patterns.remove(0);
                if let Pattern::Var(name) = col {
                    r.bindings.push((name, scrutinee.clone()));
                }
                r
            })
            .collect();
        return compile(next_rows, rest, at);
    }

    let mut literal_alts: Vec<(Literal, Row)> = Vec::new();
    let mut constructor_alts: Vec<(String, Vec<Pattern>, Row)> = Vec::new();
    let mut default_rows: Vec<Row> = Vec::new();

    for mut row in rows {
        let col = row.patterns.remove(0);
        match col {
            Pattern::Literal(lit) => {
                if !literal_alts.iter().any(|(l, _)| *l == lit) {
                    literal_alts.push((lit, row));
                }
            }
            Pattern::Constructor { name, args, .. } => {
                if !constructor_alts.iter().any(|(n, _, _)| *n == name) {
                    constructor_alts.push((name, args, row));
                }
            }
            Pattern::Var(name) => {
                row.bindings.push((name, scrutinee.clone()));
                default_rows.push(row);
            }
            Pattern::Wildcard => default_rows.push(row),
        }
    }

    let mut alts = Vec::new();
    for (lit, row) in literal_alts {
        alts.push(Alt { pattern: Pattern::Literal(lit), body: compile(vec![row], rest, at) });
    }
    for (name, args, row) in constructor_alts {
        alts.push(Alt {
            pattern: Pattern::Constructor { name, at, args },
            body: compile(vec![row], rest, at),
        });
    }
    if !default_rows.is_empty() {
        // The bound name (if the original pattern was a variable, not `_`) is
        // recovered through `bindings` and wrapped at the leaf by
        // `wrap_bindings`, so the alt pattern itself only needs to match
        // anything.
        alts.push(Alt { pattern: Pattern::Wildcard, body: compile(default_rows, rest, at) });
    }

    Expr::Case {
        scrutinee: Box::new(Expr::Var { name: scrutinee.clone(), at }),
        alts,
        at,
    }
}

fn wrap_bindings(bindings: Vec<(String, String)>, body: Expr) -> Expr {
    bindings.into_iter().rev().fold(body, |acc, (name, scrutinee)| Expr::Let {
        bindings: vec![(name, Expr::Var { name: scrutinee, at: Span::default() })],
        body: Box::new(acc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve;

    fn simplified(source: &str) -> Vec<ValueDef> {
        let program = Parser::parse_program(source).unwrap();
        let resolved = resolve(program).unwrap();
        simplify(resolved.value_defs).unwrap()
    }

    #[test]
    fn merges_recursive_list_sum() {
        let defs = simplified(
            "data L = N | C Int L; sum N = 0; sum (C x xs) = x + sum xs; main = printInt (sum N)",
        );
        let sum_def = defs.iter().find(|d| d.name == "sum").unwrap();
        assert_eq!(sum_def.equations.len(), 1);
        assert_eq!(sum_def.equations[0].patterns.len(), 1);
        assert!(matches!(sum_def.equations[0].body, Expr::Case { .. }));
    }

    #[test]
    fn rejects_arity_mismatch() {
        let program = Parser::parse_program("f x = x; f x y = x").unwrap();
        let resolved = resolve(program).unwrap();
        assert!(matches!(simplify(resolved.value_defs), Err(SimplifyError::ArityMismatch { .. })));
    }

    #[test]
    fn handles_literal_and_default_mix() {
        let defs = simplified(
            "data L = N | C Int L; take 0 _ = N; take n (C x xs) = C x (take (n - 1) xs); main = printInt 0",
        );
        let take_def = defs.iter().find(|d| d.name == "take").unwrap();
        assert_eq!(take_def.equations[0].patterns.len(), 2);
    }
}
