//! The `Machine`: heap, both stacks, and the six registers (§3.3), all
//! encapsulated in one record per §9's directive ("Global mutable runtime
//! registers: encapsulate in a single Machine record owned by the runtime
//! library").

use crate::closure::Address;
use crate::gc;
use crate::heap::Heap;
use crate::stacks::{AStack, BStack, BStackSlot};
use stgc_core::Tag;

/// Initial stack depth for both stacks (§4.4).
pub const STACK_SIZE: usize = 1024;

pub struct Machine {
    pub heap: Heap,
    pub a_stack: AStack,
    pub b_stack: BStack,
    pub int_register: i64,
    pub string_register: Option<Address>,
    pub tag_register: Tag,
    pub constructor_arg_count_register: u32,
    /// The closure currently entered.
    pub node_register: Option<Address>,
    /// The closure awaiting update, if any — set while an update frame's
    /// continuation runs (§3.3).
    pub constr_update_register: Option<Address>,
}

impl Machine {
    pub fn new() -> Self {
        Machine {
            heap: Heap::new(),
            a_stack: AStack::new(),
            b_stack: BStack::new(),
            int_register: 0,
            string_register: None,
            tag_register: 0,
            constructor_arg_count_register: 0,
            node_register: None,
            constr_update_register: None,
        }
    }

    /// Ensure `n` more bytes can be allocated, running a GC cycle first if
    /// the heap's bump cursor would overrun capacity (§4.4 step 1).
    pub fn reserve(&mut self, n: usize) {
        if !self.heap.needs_collection(n) {
            return;
        }
        let new_capacity = self.heap.grown_capacity(n);

        let mut roots: Vec<&mut Address> = Vec::new();
        if let Some(addr) = self.string_register.as_mut() {
            roots.push(addr);
        }
        if let Some(addr) = self.node_register.as_mut() {
            roots.push(addr);
        }
        if let Some(addr) = self.constr_update_register.as_mut() {
            roots.push(addr);
        }
        for slot in self.a_stack.iter_mut() {
            roots.push(slot);
        }
        for slot in self.b_stack.closure_slots_mut() {
            roots.push(slot);
        }

        gc::collect(&mut self.heap, new_capacity, &mut roots);
    }

    /// Push an update frame: `[saved-A-base, saved-B-base,
    /// continuation-label, self-closure]` (§4.4).
    pub fn push_update_frame(&mut self, self_closure: Address) {
        self.b_stack.push(BStackSlot::SavedABase(self.a_stack.base));
        self.b_stack.push(BStackSlot::SavedBBase(self.b_stack.base));
        self.b_stack.push(BStackSlot::Code("update".to_string()));
        self.b_stack.push(BStackSlot::Closure(self_closure));
        self.b_stack.base = self.b_stack.top();
    }

    /// Pop the innermost update frame, restoring the caller's stack bases,
    /// and return the self-closure it was guarding.
    pub fn pop_update_frame(&mut self) -> Option<Address> {
        if self.b_stack.base < 4 {
            return None;
        }
        let self_closure = match self.b_stack.pop()? {
            BStackSlot::Closure(addr) => addr,
            _ => return None,
        };
        self.b_stack.pop()?; // continuation label, unused by the interpreter
        let saved_b_base = match self.b_stack.pop()? {
            BStackSlot::SavedBBase(b) => b,
            _ => return None,
        };
        let saved_a_base = match self.b_stack.pop()? {
            BStackSlot::SavedABase(a) => a,
            _ => return None,
        };
        self.a_stack.base = saved_a_base;
        self.b_stack.base = saved_b_base;
        Some(self_closure)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Machine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_frame_round_trips_stack_bases() {
        let mut machine = Machine::new();
        machine.a_stack.push(7);
        machine.a_stack.base = 1;
        let closure = 42;

        machine.push_update_frame(closure);
        assert_eq!(machine.pop_update_frame(), Some(closure));
        assert_eq!(machine.a_stack.base, 1);
    }

    #[test]
    fn reserve_is_a_no_op_below_capacity() {
        let mut machine = Machine::new();
        let before = machine.heap.capacity_bytes();
        machine.reserve(8);
        assert_eq!(machine.heap.capacity_bytes(), before);
    }
}
