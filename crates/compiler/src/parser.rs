//! Recursive-descent parser with precedence climbing for the infix
//! builtins.
//!
//! Top-level declarations are separated by `;` (matching the example
//! programs' style). Infix operators desugar directly into
//! `Expr::Builtin` nodes during parsing — the grammar has no separate
//! "operator expression" AST node, since by the time STG lowering sees an
//! expression, operators and plain applications are already
//! indistinguishable (§4.1 dispatches on "is the head a builtin").

use crate::ast::{Alt, ConstructorDecl, DataDecl, Equation, Expr, Literal, Pattern, Program, ValueDef};
use crate::error::{ParseError, Span};
use crate::lexer::{lex, Tok, Token};
use crate::types::Type;
use stgc_core::BuiltinOp;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Binding power of each infix operator, lowest to highest. Unlisted
/// operators are a parse error.
fn infix_power(op: &str) -> Option<(u8, u8)> {
    match op {
        "==" | "/=" | "<" | "<=" | ">" | ">=" => Some((1, 2)),
        "+" | "-" | "++" => Some((3, 4)),
        "*" | "/" => Some((5, 6)),
        _ => None,
    }
}

fn builtin_for_op(op: &str) -> BuiltinOp {
    match op {
        "+" => BuiltinOp::Add,
        "-" => BuiltinOp::Sub,
        "*" => BuiltinOp::Mul,
        "/" => BuiltinOp::Div,
        "<" => BuiltinOp::Less,
        "<=" => BuiltinOp::LessEqual,
        ">" => BuiltinOp::Greater,
        ">=" => BuiltinOp::GreaterEqual,
        "==" => BuiltinOp::EqualTo,
        "/=" => BuiltinOp::NotEqualTo,
        "++" => BuiltinOp::Concat,
        other => unreachable!("infix_power admitted unknown operator `{other}`"),
    }
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Ok(Parser { tokens: lex(source)?, pos: 0 })
    }

    pub fn parse_program(source: &str) -> Result<Program, ParseError> {
        let mut parser = Parser::new(source)?;
        parser.program()
    }

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].at
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Tok, what: &str) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                at: self.peek_span(),
                found: format!("{:?}", self.peek()),
                expected: what.into(),
            })
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::UnexpectedToken {
                at: self.peek_span(),
                found: format!("{other:?}"),
                expected: "an identifier".into(),
            }),
        }
    }

    fn constructor(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Tok::Constructor(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::UnexpectedToken {
                at: self.peek_span(),
                found: format!("{other:?}"),
                expected: "a constructor name".into(),
            }),
        }
    }

    fn program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        while *self.peek() != Tok::Eof {
            if *self.peek() == Tok::Semi {
                self.advance();
                continue;
            }
            if *self.peek() == Tok::Data {
                program.data_decls.push(self.data_decl()?);
            } else {
                let (equation, name) = self.equation()?;
                if let Some(def) = program.value_defs.iter_mut().find(|d| d.name == name) {
                    def.equations.push(equation);
                } else {
                    program.value_defs.push(ValueDef { name, annotation: None, equations: vec![equation] });
                }
            }
            if *self.peek() == Tok::Semi {
                self.advance();
            }
        }
        Ok(program)
    }

    fn data_decl(&mut self) -> Result<DataDecl, ParseError> {
        self.expect(&Tok::Data, "`data`")?;
        let type_name = self.constructor()?;
        self.expect(&Tok::Equals, "`=`")?;
        let mut constructors = vec![self.constructor_decl()?];
        while *self.peek() == Tok::Pipe {
            self.advance();
            constructors.push(self.constructor_decl()?);
        }
        Ok(DataDecl { type_name, constructors })
    }

    fn constructor_decl(&mut self) -> Result<ConstructorDecl, ParseError> {
        let at = self.peek_span();
        let name = self.constructor()?;
        let mut fields = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Ident(_) => break, // start of next def, not a field
                Tok::Constructor(tyname) => {
                    self.advance();
                    fields.push(Type::Data(tyname));
                }
                Tok::Pipe | Tok::Semi | Tok::Eof => break,
                _ => break,
            }
        }
        Ok(ConstructorDecl { name, at, fields })
    }

    /// One `name p1 .. pn = expr` equation, returning it along with the name
    /// it belongs to (so the caller can merge equations for the same name).
    fn equation(&mut self) -> Result<(Equation, String), ParseError> {
        let at = self.peek_span();
        let name = self.ident()?;
        let mut patterns = Vec::new();
        while *self.peek() != Tok::Equals {
            patterns.push(self.pattern_atom()?);
        }
        self.expect(&Tok::Equals, "`=`")?;
        let body = self.expr(0)?;
        Ok((Equation { patterns, body, at }, name))
    }

    fn pattern_atom(&mut self) -> Result<Pattern, ParseError> {
        let at = self.peek_span();
        match self.peek().clone() {
            Tok::Underscore => {
                self.advance();
                Ok(Pattern::Wildcard)
            }
            Tok::Ident(name) => {
                self.advance();
                Ok(Pattern::Var(name))
            }
            Tok::Int(n) => {
                self.advance();
                Ok(Pattern::Literal(Literal::Int(n)))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Pattern::Literal(Literal::Str(s)))
            }
            Tok::Constructor(name) => {
                self.advance();
                Ok(Pattern::Constructor { name, at, args: Vec::new() })
            }
            Tok::LParen => {
                self.advance();
                let pat = self.pattern()?;
                self.expect(&Tok::RParen, "`)`")?;
                Ok(pat)
            }
            other => Err(ParseError::UnexpectedToken {
                at,
                found: format!("{other:?}"),
                expected: "a pattern".into(),
            }),
        }
    }

    /// A full pattern, including a parenthesized `Constructor arg*` applied
    /// pattern (only reachable once already inside parens, since bare
    /// top-level equation patterns are parsed atom-by-atom in `equation`).
    fn pattern(&mut self) -> Result<Pattern, ParseError> {
        let at = self.peek_span();
        if let Tok::Constructor(name) = self.peek().clone() {
            self.advance();
            let mut args = Vec::new();
            while !matches!(self.peek(), Tok::RParen | Tok::Eof) {
                args.push(self.pattern_atom()?);
            }
            return Ok(Pattern::Constructor { name, at, args });
        }
        self.pattern_atom()
    }

    fn expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.app_expr()?;
        loop {
            let op = match self.peek() {
                Tok::Op(s) => s.clone(),
                _ => break,
            };
            let Some((left_bp, right_bp)) = infix_power(&op) else { break };
            if left_bp < min_bp {
                break;
            }
            let at = self.peek_span();
            self.advance();
            let rhs = self.expr(right_bp)?;
            lhs = Expr::Builtin { op: builtin_for_op(&op), args: vec![lhs, rhs], at };
        }
        Ok(lhs)
    }

    /// Left-associated application: one or more atoms in a row.
    fn app_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        while self.starts_atom() {
            let at = self.peek_span();
            let arg = self.atom()?;
            expr = Expr::App { func: Box::new(expr), arg: Box::new(arg), at };
        }
        Ok(expr)
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Ident(_) | Tok::Constructor(_) | Tok::Int(_) | Tok::Str(_) | Tok::LParen
        )
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let at = self.peek_span();
        match self.peek().clone() {
            Tok::Int(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Tok::Ident(name) => {
                self.advance();
                Ok(Expr::Var { name, at })
            }
            Tok::Constructor(name) => {
                self.advance();
                Ok(Expr::Var { name, at })
            }
            Tok::Backslash => {
                self.advance();
                let mut params = Vec::new();
                while let Tok::Ident(_) = self.peek() {
                    params.push(self.ident()?);
                }
                self.expect(&Tok::Arrow, "`->`")?;
                let body = self.expr(0)?;
                Ok(Expr::Lambda { params, body: Box::new(body) })
            }
            Tok::Let => {
                self.advance();
                let mut bindings = Vec::new();
                loop {
                    let name = self.ident()?;
                    self.expect(&Tok::Equals, "`=`")?;
                    let value = self.expr(0)?;
                    bindings.push((name, value));
                    if *self.peek() == Tok::Semi {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::In, "`in`")?;
                let body = self.expr(0)?;
                Ok(Expr::Let { bindings, body: Box::new(body) })
            }
            Tok::Case => {
                self.advance();
                let scrutinee = self.expr(0)?;
                self.expect(&Tok::Of, "`of`")?;
                self.expect(&Tok::LParen, "`(`")?;
                let mut alts = Vec::new();
                loop {
                    let pattern = self.pattern()?;
                    self.expect(&Tok::Arrow, "`->`")?;
                    let body = self.expr(0)?;
                    alts.push(Alt { pattern, body });
                    if *self.peek() == Tok::Semi {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.expect(&Tok::RParen, "`)`")?;
                Ok(Expr::Case { scrutinee: Box::new(scrutinee), alts, at })
            }
            Tok::If => {
                self.advance();
                let cond = self.expr(0)?;
                self.expect(&Tok::Then, "`then`")?;
                let then_branch = self.expr(0)?;
                self.expect(&Tok::Else, "`else`")?;
                let else_branch = self.expr(0)?;
                Ok(Expr::Case {
                    scrutinee: Box::new(cond),
                    alts: vec![
                        Alt { pattern: Pattern::Constructor { name: "True".to_string(), at, args: Vec::new() }, body: then_branch },
                        Alt { pattern: Pattern::Wildcard, body: else_branch },
                    ],
                    at,
                })
            }
            Tok::LParen => {
                self.advance();
                let inner = self.expr(0)?;
                self.expect(&Tok::RParen, "`)`")?;
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken {
                at,
                found: format!("{other:?}"),
                expected: "an expression".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_main() {
        let program = Parser::parse_program("main = printInt 42").unwrap();
        assert_eq!(program.value_defs.len(), 1);
        assert_eq!(program.value_defs[0].name, "main");
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let program = Parser::parse_program("main = printInt (1 + 2 * 3)").unwrap();
        let body = &program.value_defs[0].equations[0].body;
        match body {
            Expr::App { arg, .. } => match arg.as_ref() {
                Expr::Builtin { op: BuiltinOp::Add, args, .. } => {
                    assert!(matches!(args[1], Expr::Builtin { op: BuiltinOp::Mul, .. }));
                }
                other => panic!("expected Add at top, got {other:?}"),
            },
            other => panic!("expected App, got {other:?}"),
        }
    }

    #[test]
    fn merges_multiple_equations_for_same_name() {
        let program = Parser::parse_program(
            "sum N = 0; sum (C x xs) = x + sum xs; main = printInt (sum N)",
        )
        .unwrap();
        let sum_def = program.value_defs.iter().find(|d| d.name == "sum").unwrap();
        assert_eq!(sum_def.equations.len(), 2);
    }

    #[test]
    fn parses_data_decl() {
        let program = Parser::parse_program("data L = N | C Int L; main = printInt 0").unwrap();
        assert_eq!(program.data_decls.len(), 1);
        assert_eq!(program.data_decls[0].constructors.len(), 2);
        assert_eq!(program.data_decls[0].constructors[1].fields.len(), 2);
    }
}
