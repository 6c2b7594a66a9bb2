//! The two execution stacks (§3.3).

use crate::closure::Address;

/// Grows upward; each slot is a pointer to a closure. `base` is the frame
/// pointer for the currently executing function's pointer arguments.
#[derive(Debug, Default)]
pub struct AStack {
    data: Vec<Address>,
    pub base: usize,
}

impl AStack {
    pub fn new() -> Self {
        AStack { data: Vec::new(), base: 0 }
    }

    pub fn push(&mut self, addr: Address) {
        self.data.push(addr);
    }

    pub fn pop(&mut self) -> Option<Address> {
        self.data.pop()
    }

    pub fn top(&self) -> usize {
        self.data.len()
    }

    pub fn slots_from_base(&self) -> &[Address] {
        &self.data[self.base..]
    }

    pub fn get(&self, index: usize) -> Address {
        self.data[self.base + index]
    }

    pub fn truncate_to_base(&mut self, base: usize) {
        self.data.truncate(base);
    }

    /// Every live slot from `data` to `top` — a GC root set member (§4.4
    /// step 4).
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Address> {
        self.data.iter_mut()
    }
}

/// A B-stack slot: a tagged union of `{int64, code-label, closure-pointer,
/// saved-B-base, saved-A-base}`, discriminated in the spec by static
/// position within a frame rather than a runtime tag (§3.3). This crate has
/// no "static position" to dispatch on outside the lowering that isn't
/// represented here, so the union is made explicit as an enum instead.
#[derive(Debug, Clone)]
pub enum BStackSlot {
    Int(i64),
    /// The case- or update-continuation to resume when this frame's value
    /// arrives. The interpreter has no raw code pointers, so this carries
    /// the continuation's name instead of a jump target.
    Code(String),
    Closure(Address),
    SavedBBase(usize),
    SavedABase(usize),
}

#[derive(Debug, Default)]
pub struct BStack {
    data: Vec<BStackSlot>,
    pub base: usize,
}

impl BStack {
    pub fn new() -> Self {
        BStack { data: Vec::new(), base: 0 }
    }

    pub fn push(&mut self, slot: BStackSlot) {
        self.data.push(slot);
    }

    pub fn pop(&mut self) -> Option<BStackSlot> {
        self.data.pop()
    }

    pub fn top(&self) -> usize {
        self.data.len()
    }

    pub fn truncate_to_base(&mut self, base: usize) {
        self.data.truncate(base);
    }

    /// Every `Closure` slot on the B-stack is, by construction, an
    /// update frame's self-closure field (the only place this crate ever
    /// pushes one) — so a flat scan finds exactly the GC roots §4.4 step 4
    /// asks for, without needing to walk the saved-base chain frame by
    /// frame.
    pub fn closure_slots_mut(&mut self) -> impl Iterator<Item = &mut Address> {
        self.data.iter_mut().filter_map(|slot| match slot {
            BStackSlot::Closure(addr) => Some(addr),
            _ => None,
        })
    }
}
