//! Cheney-style copying collector (§4.4).
//!
//! The spec has the collector overwrite an evacuated object's info table
//! with "already-evac" so a second visit finds the forwarding address
//! already in place. Since objects here are owned Rust values rather than
//! bytes to scribble over mid-flight, forwarding is tracked in a side table
//! keyed by old address instead — semantically the same thing (each live
//! object is copied exactly once, and every reference to it is redirected
//! to the copy), just without `HeapObject::Indirection` doing double duty
//! as both "update protocol redirect" and "GC forwarding record."

use crate::closure::{Address, HeapObject};
use crate::heap::Heap;

/// Evacuate every root, then scavenge the to-space until every object
/// reachable from a root has been copied and its own pointer fields
/// updated to point within to-space. Finishes by committing the new space
/// to `heap` and applying hysteresis shrink (§4.4 steps 3–7).
pub fn collect(heap: &mut Heap, new_capacity: usize, roots: &mut [&mut Address]) {
    let mut to_space: Vec<HeapObject> = Vec::new();
    let mut forwarding: Vec<Option<Address>> = vec![None; heap.len()];

    for root in roots.iter_mut() {
        **root = evacuate(heap, &mut to_space, &mut forwarding, **root);
    }

    // Worklist over a growing `Vec`: `scan` trails `to_space.len()` until
    // every copied object's own children have been evacuated too.
    let mut scan = 0;
    while scan < to_space.len() {
        scavenge(heap, &mut to_space, &mut forwarding, scan);
        scan += 1;
    }

    let used: usize = to_space.iter().map(HeapObject::size_bytes).sum();
    heap.replace_objects(to_space);
    heap.set_used_bytes(used);

    // Hysteresis: if the live set is much smaller than the space just grown
    // into, shrink back down rather than keep paying for it (§4.4 step 7).
    if 3 * used < new_capacity {
        heap.set_capacity((3 * used).max(crate::heap::BASE_HEAP_SIZE));
    } else {
        heap.set_capacity(new_capacity);
    }
}

/// Copy `addr`'s object into `to_space` if this is its first visit this
/// cycle, recording the mapping in `forwarding`; repeat visits just look it
/// up. Pointer fields inside the freshly pushed copy still point at
/// from-space addresses — `scavenge` fixes those once the copy is sitting
/// in `to_space`.
fn evacuate(heap: &Heap, to_space: &mut Vec<HeapObject>, forwarding: &mut [Option<Address>], addr: Address) -> Address {
    if let Some(new_addr) = forwarding[addr] {
        return new_addr;
    }
    let object = heap.get(addr).clone();
    let new_addr = to_space.len();
    to_space.push(object);
    forwarding[addr] = Some(new_addr);
    new_addr
}

/// Rewrite `to_space[index]`'s own pointer-ish fields from from-space
/// addresses to their to-space counterparts, evacuating each child on
/// first sight. String closures and already-scalar objects have nothing to
/// scavenge — a string closure's `evac` is the identity (§3.3).
fn scavenge(heap: &Heap, to_space: &mut Vec<HeapObject>, forwarding: &mut [Option<Address>], index: usize) {
    let object = to_space[index].clone();
    let rewritten = match object {
        HeapObject::Closure { info, updateable, pointers, ints, strings } => HeapObject::Closure {
            info,
            updateable,
            pointers: pointers.iter().map(|a| evacuate(heap, to_space, forwarding, *a)).collect(),
            ints,
            strings: strings.iter().map(|a| evacuate(heap, to_space, forwarding, *a)).collect(),
        },
        HeapObject::Constructor { tag, fields } => HeapObject::Constructor {
            tag,
            fields: fields.iter().map(|a| evacuate(heap, to_space, forwarding, *a)).collect(),
        },
        HeapObject::PartialApp { target, saved_pointers, saved_ints, saved_strings, needed } => HeapObject::PartialApp {
            target,
            saved_pointers: saved_pointers.iter().map(|a| evacuate(heap, to_space, forwarding, *a)).collect(),
            saved_ints,
            saved_strings: saved_strings.iter().map(|a| evacuate(heap, to_space, forwarding, *a)).collect(),
            needed,
        },
        HeapObject::Indirection(target) => HeapObject::Indirection(evacuate(heap, to_space, forwarding, target)),
        HeapObject::StringClosure(s) => HeapObject::StringClosure(s),
    };
    to_space[index] = rewritten;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::{EntryKind, InfoTable};

    #[test]
    fn collect_preserves_reachable_constructors_and_drops_garbage() {
        let mut heap = Heap::new();
        let garbage = heap.alloc_constructor(0, vec![]);
        let live_field = heap.alloc_constructor(1, vec![]);
        let live = heap.alloc_constructor(2, vec![live_field]);
        let _ = garbage;

        let mut root = live;
        collect(&mut heap, heap.capacity_bytes(), &mut [&mut root]);

        match heap.get(root) {
            HeapObject::Constructor { tag, fields } => {
                assert_eq!(*tag, 2);
                match heap.get(fields[0]) {
                    HeapObject::Constructor { tag, .. } => assert_eq!(*tag, 1),
                    other => panic!("expected a constructor, got {other:?}"),
                }
            }
            other => panic!("expected a constructor, got {other:?}"),
        }
        // Only the two reachable objects survived the collection.
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn collect_preserves_entry_kind_across_evacuation() {
        let mut heap = Heap::new();
        let info = InfoTable { entry: EntryKind::Code("f".to_string()), pointers: 0, ints: 0, strings: 0 };
        let closure = heap.alloc_closure(info, true, vec![], vec![], vec![]);

        let mut root = closure;
        collect(&mut heap, heap.capacity_bytes(), &mut [&mut root]);

        match heap.get(root) {
            HeapObject::Closure { info, .. } => assert_eq!(info.entry, EntryKind::Code("f".to_string())),
            other => panic!("expected a closure, got {other:?}"),
        }
    }
}
