//! The bump-allocated heap and its capacity bookkeeping (§3.3/§4.4).
//!
//! The spec describes `(data, cursor, capacity)`: a single contiguous byte
//! region. This crate keeps a safe `Vec<HeapObject>` addressed by index
//! instead of raw byte offsets — allocation is still strictly bump (push to
//! the end, §3.3 invariant b), and `used_bytes`/`capacity_bytes` track the
//! same accounting the emitted C's `heap_reserve` would, just without
//! `unsafe` pointer arithmetic to get there.

use crate::closure::{Address, HeapObject, InfoTable};
use stgc_core::Tag;

/// Small on purpose so the collector is exercised early in tests (§4.4).
pub const BASE_HEAP_SIZE: usize = 128;

pub struct Heap {
    objects: Vec<HeapObject>,
    used_bytes: usize,
    capacity_bytes: usize,
}

impl Heap {
    pub fn new() -> Self {
        Heap { objects: Vec::new(), used_bytes: 0, capacity_bytes: BASE_HEAP_SIZE }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// The trigger condition for `heap_reserve` (§4.4 step 1).
    pub fn needs_collection(&self, n: usize) -> bool {
        self.used_bytes + n > self.capacity_bytes
    }

    /// `new_capacity = max(3 × old_capacity, used + n)` (§4.4 step 2).
    pub fn grown_capacity(&self, n: usize) -> usize {
        (3 * self.capacity_bytes).max(self.used_bytes + n)
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity_bytes = capacity;
    }

    pub(crate) fn set_used_bytes(&mut self, used: usize) {
        self.used_bytes = used;
    }

    pub(crate) fn replace_objects(&mut self, objects: Vec<HeapObject>) {
        self.objects = objects;
    }

    fn alloc(&mut self, object: HeapObject) -> Address {
        self.used_bytes += object.size_bytes();
        let addr = self.objects.len();
        self.objects.push(object);
        addr
    }

    pub fn alloc_closure(
        &mut self,
        info: InfoTable,
        updateable: bool,
        pointers: Vec<Address>,
        ints: Vec<i64>,
        strings: Vec<Address>,
    ) -> Address {
        self.alloc(HeapObject::Closure { info, updateable, pointers, ints, strings })
    }

    pub fn alloc_string(&mut self, s: String) -> Address {
        self.alloc(HeapObject::StringClosure(s))
    }

    pub fn alloc_constructor(&mut self, tag: Tag, fields: Vec<Address>) -> Address {
        self.alloc(HeapObject::Constructor { tag, fields })
    }

    pub fn alloc_partial_app(
        &mut self,
        target: String,
        saved_pointers: Vec<Address>,
        saved_ints: Vec<i64>,
        saved_strings: Vec<Address>,
        needed: u32,
    ) -> Address {
        self.alloc(HeapObject::PartialApp { target, saved_pointers, saved_ints, saved_strings, needed })
    }

    pub fn get(&self, addr: Address) -> &HeapObject {
        &self.objects[addr]
    }

    pub fn get_mut(&mut self, addr: Address) -> &mut HeapObject {
        &mut self.objects[addr]
    }

    /// Follow `Indirection` chains to the underlying value (the update
    /// protocol rewrites a thunk's slot without chasing down every pointer
    /// that already referenced it).
    pub fn resolve(&self, mut addr: Address) -> Address {
        while let HeapObject::Indirection(next) = self.objects[addr] {
            addr = next;
        }
        addr
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heap_starts_at_base_size() {
        let heap = Heap::new();
        assert_eq!(heap.capacity_bytes(), BASE_HEAP_SIZE);
        assert_eq!(heap.used_bytes(), 0);
    }

    #[test]
    fn indirection_chains_resolve_to_the_final_object() {
        let mut heap = Heap::new();
        let value = heap.alloc_constructor(1, vec![]);
        let thunk = heap.alloc(HeapObject::Indirection(value));
        assert_eq!(heap.resolve(thunk), value);
    }
}
