//! Compiler error types.
//!
//! One error kind per phase, matching §7 of the specification exactly. Each
//! phase's error implements `std::error::Error` directly rather than via a
//! derive crate, the same way `codegen::CodeGenError` does in the teacher
//! this compiler is modeled on.

use std::fmt;

/// A source position for diagnostics. The compiler only ever processes a
/// single file per invocation, so a line/column pair is sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub const fn new(line: usize, col: usize) -> Self {
        Span { line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

#[derive(Debug)]
pub enum ParseError {
    UnexpectedToken { at: Span, found: String, expected: String },
    UnexpectedEof { expected: String },
    InvalidLiteral { at: Span, text: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { at, found, expected } => {
                write!(f, "{at}: expected {expected}, found {found}")
            }
            ParseError::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            ParseError::InvalidLiteral { at, text } => {
                write!(f, "{at}: invalid literal `{text}`")
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub enum ResolveError {
    UnknownName { at: Span, name: String },
    UnknownConstructor { at: Span, name: String },
    UnknownType { at: Span, name: String },
    ArityMismatch { at: Span, name: String, expected: usize, found: usize },
    CyclicTypeSynonym { name: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnknownName { at, name } => write!(f, "{at}: unknown name `{name}`"),
            ResolveError::UnknownConstructor { at, name } => {
                write!(f, "{at}: unknown constructor `{name}`")
            }
            ResolveError::UnknownType { at, name } => write!(f, "{at}: unknown type `{name}`"),
            ResolveError::ArityMismatch { at, name, expected, found } => write!(
                f,
                "{at}: `{name}` expects {expected} argument(s), found {found}"
            ),
            ResolveError::CyclicTypeSynonym { name } => {
                write!(f, "cyclic type synonym `{name}`")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

#[derive(Debug)]
pub enum TypeError {
    Mismatch { at: Span, expected: String, found: String },
    OccursCheck { at: Span, var: String, ty: String },
    UnknownField { at: Span, constructor: String, field: usize },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch { at, expected, found } => {
                write!(f, "{at}: expected type `{expected}`, found `{found}`")
            }
            TypeError::OccursCheck { at, var, ty } => {
                write!(f, "{at}: occurs check failed: `{var}` occurs in `{ty}`")
            }
            TypeError::UnknownField { at, constructor, field } => {
                write!(f, "{at}: constructor `{constructor}` has no field {field}")
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[derive(Debug)]
pub enum SimplifyError {
    ArityMismatch { name: String, expected: usize, found: usize },
    DuplicateAnnotation { name: String },
    MissingImplementation { name: String },
    NestedPattern { name: String },
}

impl fmt::Display for SimplifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimplifyError::ArityMismatch { name, expected, found } => write!(
                f,
                "`{name}`: equations disagree on arity ({expected} vs {found})"
            ),
            SimplifyError::DuplicateAnnotation { name } => {
                write!(f, "`{name}` has more than one type annotation")
            }
            SimplifyError::MissingImplementation { name } => {
                write!(f, "`{name}` is annotated but never implemented")
            }
            SimplifyError::NestedPattern { name } => write!(
                f,
                "`{name}`: nested constructor patterns are not supported; flatten by hand"
            ),
        }
    }
}

impl std::error::Error for SimplifyError {}

/// An internal compiler error: an invariant earlier stages were supposed to
/// establish did not hold (§4.1 "Failure").
#[derive(Debug)]
pub struct InternalError(pub String);

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal compiler error: {}", self.0)
    }
}

impl std::error::Error for InternalError {}

/// The single error type the CLI boundary sees, folding every phase into one
/// enum so `compile_file` can return a single `Result`.
#[derive(Debug)]
pub enum CompileError {
    Parse(ParseError),
    Resolve(ResolveError),
    Type(TypeError),
    Simplify(SimplifyError),
    Internal(InternalError),
    /// A failure raised by the interpreter while running a program, as
    /// opposed to while compiling it (§7): division by zero or a pattern
    /// match failure reaching `Error`.
    Runtime(stgc_runtime::RuntimeError),
    Io(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "parse error: {e}"),
            CompileError::Resolve(e) => write!(f, "resolution error: {e}"),
            CompileError::Type(e) => write!(f, "type error: {e}"),
            CompileError::Simplify(e) => write!(f, "error: {e}"),
            CompileError::Internal(e) => write!(f, "{e}"),
            CompileError::Runtime(e) => write!(f, "runtime error: {e}"),
            CompileError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<ResolveError> for CompileError {
    fn from(e: ResolveError) -> Self {
        CompileError::Resolve(e)
    }
}

impl From<TypeError> for CompileError {
    fn from(e: TypeError) -> Self {
        CompileError::Type(e)
    }
}

impl From<SimplifyError> for CompileError {
    fn from(e: SimplifyError) -> Self {
        CompileError::Simplify(e)
    }
}

impl From<InternalError> for CompileError {
    fn from(e: InternalError) -> Self {
        CompileError::Internal(e)
    }
}

impl From<std::io::Error> for CompileError {
    fn from(e: std::io::Error) -> Self {
        CompileError::Io(e.to_string())
    }
}

impl From<stgc_runtime::RuntimeError> for CompileError {
    fn from(e: stgc_runtime::RuntimeError) -> Self {
        CompileError::Runtime(e)
    }
}
