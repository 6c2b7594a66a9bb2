//! Update and partial-application protocols (§4.4).

use crate::closure::{Address, HeapObject};
use crate::registers::Machine;
use stgc_core::layout::{closure_size, pap_closure_size};
use stgc_core::Tag;

/// A thunk reduced to a constructor while an update frame was on top:
/// allocate the constructor, rewrite the guarded thunk as an indirection to
/// it, pop the frame, and hand back the constructor's address so the
/// caller can resume the real case continuation below the frame.
pub fn update_constructor(machine: &mut Machine, tag: Tag, fields: Vec<Address>) -> Option<Address> {
    machine.reserve(closure_size(fields.len(), 0, 0));
    let constructor_addr = machine.heap.alloc_constructor(tag, fields);
    let self_closure = machine.pop_update_frame()?;
    *machine.heap.get_mut(self_closure) = HeapObject::Indirection(constructor_addr);
    Some(constructor_addr)
}

/// Runs at the entry of every multi-argument function (§4.4). If fewer
/// than `needed` pointer args sit above the A-stack base, captures what's
/// there into a partial-application closure, redirects the guarding update
/// frame's thunk to it via an indirection — uniformly sized and GC-safe,
/// per §9's resolved open question — and reports that the caller should
/// return rather than enter `target`.
///
/// Returns `None` when the call is already saturated (nothing to do here).
pub fn check_application_update(machine: &mut Machine, target: &str, needed: u32) -> Option<Address> {
    let available = (machine.a_stack.top() - machine.a_stack.base) as u32;
    if available >= needed {
        return None;
    }

    let saved_pointers: Vec<Address> = machine.a_stack.slots_from_base().to_vec();
    machine.reserve(pap_closure_size(saved_pointers.len(), 0));
    let pap_addr = machine.heap.alloc_partial_app(target.to_string(), saved_pointers, Vec::new(), Vec::new(), needed);

    let base = machine.a_stack.base;
    machine.a_stack.truncate_to_base(base);
    if let Some(self_closure) = machine.pop_update_frame() {
        *machine.heap.get_mut(self_closure) = HeapObject::Indirection(pap_addr);
    }
    Some(pap_addr)
}

/// Read back a partial-application closure's saved call so the caller can
/// splice it together with the newly supplied arguments and re-enter
/// `target` (§4.4's "when later entered with additional arguments" case).
pub fn partial_app_fields(object: &HeapObject) -> Option<(&str, &[Address], u32)> {
    match object {
        HeapObject::PartialApp { target, saved_pointers, needed, .. } => {
            Some((target.as_str(), saved_pointers.as_slice(), *needed))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::{EntryKind, InfoTable};

    #[test]
    fn update_constructor_redirects_the_guarded_thunk() {
        let mut machine = Machine::new();
        let info = InfoTable { entry: EntryKind::Code("thunk".to_string()), pointers: 0, ints: 0, strings: 0 };
        let thunk = machine.heap.alloc_closure(info, true, vec![], vec![], vec![]);
        machine.push_update_frame(thunk);

        let result = update_constructor(&mut machine, 3, vec![]).unwrap();
        match machine.heap.get(thunk) {
            HeapObject::Indirection(addr) => assert_eq!(*addr, result),
            other => panic!("expected an indirection, got {other:?}"),
        }
        assert!(matches!(machine.heap.get(result), HeapObject::Constructor { tag: 3, .. }));
    }

    #[test]
    fn undersaturated_call_allocates_a_partial_application() {
        let mut machine = Machine::new();
        let info = InfoTable { entry: EntryKind::Code("f".to_string()), pointers: 0, ints: 0, strings: 0 };
        let thunk = machine.heap.alloc_closure(info, true, vec![], vec![], vec![]);
        machine.push_update_frame(thunk);
        machine.a_stack.push(99);

        let pap = check_application_update(&mut machine, "f", 2).unwrap();
        let (target, saved, needed) = partial_app_fields(machine.heap.get(pap)).unwrap();
        assert_eq!(target, "f");
        assert_eq!(saved, &[99]);
        assert_eq!(needed, 2);
    }

    #[test]
    fn saturated_call_does_nothing() {
        let mut machine = Machine::new();
        machine.a_stack.push(1);
        machine.a_stack.push(2);
        assert!(check_application_update(&mut machine, "f", 2).is_none());
    }
}
