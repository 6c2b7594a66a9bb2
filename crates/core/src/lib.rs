//! stgc-core: definitions shared between the compiler and the runtime.
//!
//! Both sides need to agree on the same builtin operation codes, the same
//! constructor-tag conventions for built-in types, and the same heap layout
//! constants — otherwise code the compiler emits and code the runtime
//! executes would disagree about the shape of a closure.

pub mod builtin;
pub mod layout;
pub mod tag;

pub use builtin::BuiltinOp;
pub use tag::Tag;
