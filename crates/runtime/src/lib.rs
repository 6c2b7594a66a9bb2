//! `stgc-runtime`: the abstract machine the compiler's output runs on
//! (§3.3/§4.4) — heap, copying GC, two stacks, registers, the update and
//! partial-application protocols, and the builtin operations. Linked two
//! ways: as a `staticlib` the emitted C translation unit calls through the
//! `abi` module's `extern "C"` surface, and as an `rlib` the in-process
//! interpreter (`stgc_compiler::interp`) calls directly as ordinary Rust
//! functions (§4.3.2) — the latter is this crate's primary consumer in this
//! repository, since no C toolchain is ever invoked here.

pub mod abi;
pub mod builtins;
pub mod closure;
pub mod error;
pub mod gc;
pub mod heap;
pub mod registers;
pub mod stacks;
pub mod update;

pub use closure::{Address, EntryKind, HeapObject, InfoTable};
pub use error::RuntimeError;
pub use registers::Machine;
