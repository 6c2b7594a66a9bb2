//! Builtin operation codes.
//!
//! The compiler's Cmm lowering emits `Builtin1`/`Builtin2` instructions naming
//! one of these; the runtime implements exactly these and no others (see
//! `stgc_runtime::builtins`).

/// A builtin the source language exposes directly; never user-definable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualTo,
    NotEqualTo,
    Concat,
    PrintInt,
    PrintString,
    Negate,
}

impl BuiltinOp {
    /// Number of atoms this builtin is saturated with. STG requires every
    /// builtin application to be exactly this many arguments.
    pub const fn arity(self) -> usize {
        match self {
            BuiltinOp::Add
            | BuiltinOp::Sub
            | BuiltinOp::Mul
            | BuiltinOp::Div
            | BuiltinOp::Less
            | BuiltinOp::LessEqual
            | BuiltinOp::Greater
            | BuiltinOp::GreaterEqual
            | BuiltinOp::EqualTo
            | BuiltinOp::NotEqualTo
            | BuiltinOp::Concat => 2,
            BuiltinOp::PrintInt | BuiltinOp::PrintString | BuiltinOp::Negate => 1,
        }
    }

    /// True if this builtin returns an int via `IntRegister`, false if it
    /// returns a boolean tag via `TagRegister`, a string via `StringRegister`,
    /// or the unit tag (print primitives).
    pub const fn returns_int(self) -> bool {
        matches!(
            self,
            BuiltinOp::Add | BuiltinOp::Sub | BuiltinOp::Mul | BuiltinOp::Div | BuiltinOp::Negate
        )
    }

    pub const fn returns_bool(self) -> bool {
        matches!(
            self,
            BuiltinOp::Less
                | BuiltinOp::LessEqual
                | BuiltinOp::Greater
                | BuiltinOp::GreaterEqual
                | BuiltinOp::EqualTo
                | BuiltinOp::NotEqualTo
        )
    }

    pub const fn returns_string(self) -> bool {
        matches!(self, BuiltinOp::Concat)
    }

    /// The source-level identifier that resolves to this builtin, or `None`
    /// if it is only ever produced by desugaring an infix operator (the
    /// infix spellings live in the parser).
    pub fn source_name(self) -> &'static str {
        match self {
            BuiltinOp::Add => "+",
            BuiltinOp::Sub => "-",
            BuiltinOp::Mul => "*",
            BuiltinOp::Div => "/",
            BuiltinOp::Less => "<",
            BuiltinOp::LessEqual => "<=",
            BuiltinOp::Greater => ">",
            BuiltinOp::GreaterEqual => ">=",
            BuiltinOp::EqualTo => "==",
            BuiltinOp::NotEqualTo => "/=",
            BuiltinOp::Concat => "++",
            BuiltinOp::PrintInt => "printInt",
            BuiltinOp::PrintString => "printString",
            BuiltinOp::Negate => "negate",
        }
    }

    /// All builtins recognized as plain identifiers (as opposed to infix
    /// operator tokens) — used by the resolver to decide whether a bare name
    /// is a builtin before concluding it is an unresolved reference.
    pub fn from_identifier(name: &str) -> Option<BuiltinOp> {
        match name {
            "printInt" => Some(BuiltinOp::PrintInt),
            "printString" => Some(BuiltinOp::PrintString),
            "negate" => Some(BuiltinOp::Negate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arities_match_spec() {
        assert_eq!(BuiltinOp::Add.arity(), 2);
        assert_eq!(BuiltinOp::Negate.arity(), 1);
        assert_eq!(BuiltinOp::PrintInt.arity(), 1);
    }

    #[test]
    fn exactly_one_return_kind() {
        for op in [
            BuiltinOp::Add,
            BuiltinOp::Less,
            BuiltinOp::Concat,
            BuiltinOp::PrintInt,
        ] {
            let kinds = [op.returns_int(), op.returns_bool(), op.returns_string()]
                .iter()
                .filter(|b| **b)
                .count();
            assert!(kinds <= 1, "{op:?} claims more than one return kind");
        }
    }
}
