//! The runtime library ABI (§6): the C symbols the emitted translation unit
//! links against. This repository never invokes a C compiler, so these
//! `extern "C"` functions are never actually linked into a binary — they
//! exist so the contract `emit::emit_program` assumes is fully specified on
//! the Rust side too, and so a future C build of the emitted output has a
//! real library to link against. The in-process interpreter does **not**
//! go through this module; it calls `Machine`/`builtins`/`update` directly
//! as ordinary Rust functions (§4.3.2).
//!
//! A `thread_local` `Machine` stands in for "the" runtime state a single
//! emitted program owns — the spec's register globals, heap, and stacks,
//! encapsulated per §9 rather than scattered `static mut`s.

use crate::closure::{Address, EntryKind, HeapObject, InfoTable};
use crate::registers::Machine;
use crate::{builtins, update};
use std::cell::RefCell;
use std::os::raw::{c_char, c_int};
use stgc_core::Tag;

thread_local! {
    static MACHINE: RefCell<Machine> = RefCell::new(Machine::new());
}

fn with_machine<R>(f: impl FnOnce(&mut Machine) -> R) -> R {
    MACHINE.with(|m| f(&mut m.borrow_mut()))
}

#[no_mangle]
pub extern "C" fn setup() {
    MACHINE.with(|m| *m.borrow_mut() = Machine::new());
}

#[no_mangle]
pub extern "C" fn cleanup() {
    // Nothing to release explicitly: the heap and stacks are ordinary Rust
    // collections, dropped with the thread-local itself.
}

#[no_mangle]
pub extern "C" fn heap_cursor() -> usize {
    with_machine(|m| m.heap.len())
}

#[no_mangle]
pub extern "C" fn heap_reserve(bytes: usize) {
    with_machine(|m| m.reserve(bytes));
}

#[no_mangle]
pub extern "C" fn heap_write_int(n: i64) -> Address {
    with_machine(|m| {
        let info = InfoTable { entry: EntryKind::Constructor(0), pointers: 0, ints: 1, strings: 0 };
        m.heap.alloc_closure(info, false, Vec::new(), vec![n], Vec::new())
    })
}

#[no_mangle]
pub extern "C" fn heap_write_ptr(addr: Address) -> Address {
    // Boxes an already-heap address one level deeper; used where the
    // emitted code needs a fresh slot that merely aliases an existing
    // object (e.g. an `Allocated` entry copied from a `ConstructorField`).
    with_machine(|m| {
        let info = InfoTable { entry: EntryKind::Constructor(0), pointers: 1, ints: 0, strings: 0 };
        m.heap.alloc_closure(info, false, vec![addr], Vec::new(), Vec::new())
    })
}

/// Writes a string literal, never collected — its `evac` is the identity
/// (§3.3 "string-literal closure"). This is `emit::emit_program`'s
/// `heap_write_string` call site; the heap allocates the whole object
/// atomically rather than byte-by-byte through a cursor, so there is no
/// literal analogue of writing an info-table pointer word separately from
/// its payload the way the emitted C does.
#[no_mangle]
pub extern "C" fn heap_write_string(bytes: *const c_char) -> Address {
    let s = unsafe { std::ffi::CStr::from_ptr(bytes) }.to_string_lossy().into_owned();
    with_machine(|m| m.heap.alloc_string(s))
}

/// Generic single-word write at the current cursor — not meaningful in
/// this crate's object-vector heap model (allocation here is always
/// whole-object, §4.4), kept only so the §6 ABI symbol list has a
/// same-named counterpart.
#[no_mangle]
pub extern "C" fn heap_write(_word: u64) -> usize {
    with_machine(|m| m.heap.len())
}

/// Writes an info-table pointer field. See `heap_write`'s note: this
/// crate's heap has no separate "info table word" to poke at independently
/// of allocating the object it belongs to.
#[no_mangle]
pub extern "C" fn heap_write_info_table(tag: Tag) -> Address {
    with_machine(|m| {
        let info = InfoTable { entry: EntryKind::Constructor(tag), pointers: 0, ints: 0, strings: 0 };
        m.heap.alloc_closure(info, false, Vec::new(), Vec::new(), Vec::new())
    })
}

#[no_mangle]
pub extern "C" fn heap_write_uint16(n: u16) -> Address {
    heap_write_int(n as i64)
}

#[no_mangle]
pub extern "C" fn read_ptr(addr: Address) -> Address {
    with_machine(|m| m.heap.resolve(addr))
}

#[no_mangle]
pub extern "C" fn read_int(addr: Address) -> i64 {
    with_machine(|m| match m.heap.get(m.heap.resolve(addr)) {
        HeapObject::Closure { ints, .. } if !ints.is_empty() => ints[0],
        _ => 0,
    })
}

#[no_mangle]
pub extern "C" fn read_info_table(addr: Address) -> c_int {
    with_machine(|m| match m.heap.get(m.heap.resolve(addr)) {
        HeapObject::Closure { info, .. } => match &info.entry {
            EntryKind::Constructor(tag) => *tag as c_int,
            _ => -1,
        },
        HeapObject::Constructor { tag, .. } => *tag as c_int,
        _ => -1,
    })
}

#[no_mangle]
pub extern "C" fn string_concat(left: Address, right: Address) -> Address {
    with_machine(|m| match builtins::concat(m, left, right) {
        builtins::BuiltinResult::Str(addr) => addr,
        _ => unreachable!("concat always returns a string"),
    })
}

/// The `evac` function every emitted string-closure info table shares: the
/// identity, per §3.3 ("its evacuation function is the identity").
#[no_mangle]
pub extern "C" fn string_evac(addr: Address) -> Address {
    addr
}

#[no_mangle]
pub extern "C" fn static_evac(addr: Address) -> Address {
    addr
}

#[no_mangle]
pub extern "C" fn already_evac(addr: Address) -> Address {
    with_machine(|m| m.heap.resolve(addr))
}

#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn save_SA(addr: Address) {
    with_machine(|m| m.a_stack.push(addr));
}

#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn save_SB(n: i64) {
    with_machine(|m| m.b_stack.push(crate::stacks::BStackSlot::Int(n)));
}

#[no_mangle]
pub extern "C" fn update_constructor(tag: Tag, field_count: usize) -> Address {
    with_machine(|m| {
        let fields: Vec<Address> = m.a_stack.slots_from_base().iter().rev().take(field_count).rev().copied().collect();
        update::update_constructor(m, tag, fields).expect("update_constructor called with no active update frame")
    })
}

#[no_mangle]
pub extern "C" fn check_application_update(needed: u32, target: *const c_char) -> c_int {
    let name = unsafe { std::ffi::CStr::from_ptr(target) }.to_string_lossy().into_owned();
    with_machine(|m| update::check_application_update(m, &name, needed).is_some() as c_int)
}
