//! Integration tests for the quantified runtime properties in §8 that are
//! testable at the `Machine` level without a compiled program: P3 (GC
//! preserves entry identity), P4 (partial-application round-trip), P5
//! (update idempotence), P6 (constructor tag discipline).

use stgc_runtime::closure::{EntryKind, HeapObject, InfoTable};
use stgc_runtime::registers::Machine;
use stgc_runtime::{update, Address};

fn closure_of(machine: &mut Machine, name: &str) -> Address {
    let info = InfoTable { entry: EntryKind::Code(name.to_string()), pointers: 0, ints: 0, strings: 0 };
    machine.heap.alloc_closure(info, true, vec![], vec![], vec![])
}

/// **P3**: after a GC cycle, every root's info table `entry` is unchanged.
#[test]
fn p3_gc_preserves_closure_identity() {
    let mut machine = Machine::new();
    let mut root = closure_of(&mut machine, "f");

    // Force a cycle regardless of the tiny base heap size by demanding more
    // than the current capacity allows.
    let demand = machine.heap.capacity_bytes() + 1;
    let mut roots: Vec<&mut Address> = vec![&mut root];
    let new_capacity = machine.heap.grown_capacity(demand);
    stgc_runtime::gc::collect(&mut machine.heap, new_capacity, &mut roots);

    match machine.heap.get(root) {
        HeapObject::Closure { info, .. } => assert_eq!(info.entry, EntryKind::Code("f".to_string())),
        other => panic!("expected a closure, got {other:?}"),
    }
}

/// **P4**: splitting a saturated call into an undersaturated prefix plus
/// the remaining arguments yields a partial application that, once
/// resolved, reports the same target and the same total argument count.
#[test]
fn p4_partial_application_round_trip() {
    let mut machine = Machine::new();
    let thunk = closure_of(&mut machine, "add3");
    machine.push_update_frame(thunk);
    machine.a_stack.push(1);
    machine.a_stack.push(2);

    let pap = update::check_application_update(&mut machine, "add3", 3).expect("undersaturated");
    let (target, saved, needed) = update::partial_app_fields(machine.heap.get(pap)).unwrap();
    assert_eq!(target, "add3");
    assert_eq!(saved, &[1, 2]);
    assert_eq!(needed, 3);
    assert_eq!(saved.len() as u32 + 1, needed); // one more argument saturates it
}

/// **P5**: a thunk entered twice yields the same value — the second entry
/// is an indirection lookup, not fresh reduction work.
#[test]
fn p5_update_frame_leaves_an_indirection_behind() {
    let mut machine = Machine::new();
    let thunk = closure_of(&mut machine, "once");
    machine.push_update_frame(thunk);

    let value = update::update_constructor(&mut machine, 7, vec![]).unwrap();
    // First entry's caller now sees an indirection...
    match machine.heap.get(thunk) {
        HeapObject::Indirection(addr) => assert_eq!(*addr, value),
        other => panic!("expected an indirection, got {other:?}"),
    }
    // ...and a second entry resolves straight through to the same value
    // without touching the update-frame machinery again.
    assert_eq!(machine.heap.resolve(thunk), value);
}

/// **P6**: the tag and arg-count written by a constructor return match
/// what was declared.
#[test]
fn p6_constructor_tag_and_arity_round_trip() {
    let mut machine = Machine::new();
    let fields = vec![closure_of(&mut machine, "x"), closure_of(&mut machine, "y")];
    let addr = machine.heap.alloc_constructor(5, fields.clone());
    match machine.heap.get(addr) {
        HeapObject::Constructor { tag, fields: got } => {
            assert_eq!(*tag, 5);
            assert_eq!(got.len(), fields.len());
        }
        other => panic!("expected a constructor, got {other:?}"),
    }
}
