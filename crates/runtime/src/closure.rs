//! Heap object shapes (§3.3).
//!
//! The spec's closures are contiguous `[InfoTable* | fields]` byte blocks
//! addressed by raw pointer. This crate models the heap as a `Vec` of
//! `HeapObject`s addressed by index instead of raw bytes (see
//! `heap::Heap`'s doc comment for why) — `HeapObject` is what a closure's
//! bytes would decode to, and `InfoTable` is inlined into it rather than
//! shared via pointer, since nothing here needs two closures of the same
//! shape to literally point at one static table.

use stgc_core::Tag;

/// An index into the heap's object vector. Stands in for a raw heap
/// pointer; the collector renumbers these on every GC cycle by rewriting
/// every root and every field that holds one.
pub type Address = usize;

/// What entering a closure does, and how the collector treats it.
/// Corresponds to the emitted C's per-shape `static const InfoTable { entry,
/// evac, ... }` (§3.3): the interpreter dispatches on this value instead of
/// jumping through a code pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Resume evaluation of the named top-level or let-bound lambda form.
    Code(String),
    /// Already in weak-head-normal-form as a saturated constructor value;
    /// entering it is a no-op, the case continuation reads the tag off the
    /// object directly.
    Constructor(Tag),
    /// A partial application awaiting more arguments (§4.4).
    PartialApp,
    /// A string-literal closure; its `evac` is the identity (§3.3) — it is
    /// never copied, only referenced.
    StringLiteral,
}

#[derive(Debug, Clone)]
pub struct InfoTable {
    pub entry: EntryKind,
    pub pointers: u16,
    pub ints: u16,
    pub strings: u16,
}

/// A heap object. `Indirection` plays two roles described separately in the
/// spec — the update protocol's rewritten thunk, and GC's
/// already-evacuated forwarding record — but here only the first is
/// represented this way; GC forwarding is tracked out-of-band by the
/// collector instead (see `gc::collect`), so this variant always means "the
/// update protocol redirected this slot," never "already copied."
#[derive(Debug, Clone)]
pub enum HeapObject {
    /// A general closure: captured free variables plus the code it runs
    /// when entered.
    Closure {
        info: InfoTable,
        /// Updateable (`U`) thunks push an update frame at entry so the
        /// result overwrites them; non-updateable (`N`) ones don't (§4.1).
        updateable: bool,
        pointers: Vec<Address>,
        ints: Vec<i64>,
        strings: Vec<Address>,
    },
    /// `[InfoTable*_for_string | NUL-terminated bytes]` (§3.3).
    StringClosure(String),
    /// A saturated constructor value.
    Constructor { tag: Tag, fields: Vec<Address> },
    /// `[InfoTable*_for_pap | a_count | b_count | saved A | saved B]`
    /// (§3.3). `target` names the original under-applied function.
    PartialApp {
        target: String,
        saved_pointers: Vec<Address>,
        saved_ints: Vec<i64>,
        saved_strings: Vec<Address>,
        needed: u32,
    },
    /// Overwrites a thunk once the update protocol has computed its value.
    Indirection(Address),
}

impl HeapObject {
    /// Approximate on-heap size in bytes, used for `heap_reserve` accounting
    /// and to size the collector's to-space.
    pub fn size_bytes(&self) -> usize {
        use stgc_core::layout::{closure_size, pap_closure_size, string_closure_size, INFO_TABLE_PTR_SIZE, WORD_SIZE};
        match self {
            HeapObject::Closure { pointers, ints, strings, .. } => {
                closure_size(pointers.len(), ints.len(), strings.len())
            }
            HeapObject::StringClosure(s) => string_closure_size(s.len()),
            HeapObject::Constructor { fields, .. } => closure_size(fields.len(), 0, 0),
            HeapObject::PartialApp { saved_pointers, saved_ints, saved_strings, .. } => {
                pap_closure_size(saved_pointers.len() + saved_strings.len(), saved_ints.len())
            }
            HeapObject::Indirection(_) => INFO_TABLE_PTR_SIZE + WORD_SIZE,
        }
    }
}
