//! Builtin operation semantics (§4.5).
//!
//! Pure arithmetic/comparison builtins take already-resolved values and
//! hand back a [`BuiltinResult`]; the caller (the Cmm interpreter) routes
//! it into the matching register. `concat` is the exception — string
//! concatenation always allocates, so it needs the `Machine` to root its
//! operands across the reservation.

use crate::closure::{Address, HeapObject};
use crate::error::RuntimeError;
use crate::registers::Machine;
use stgc_core::layout::string_closure_size;
use stgc_core::tag::{bool_tag, UNIT_ARITY, UNIT_TAG};

/// The value a builtin leaves behind, tagged by which register kind it
/// belongs in.
pub enum BuiltinResult {
    Int(i64),
    Bool(bool),
    Str(Address),
    /// Print primitives consume their argument and return the unit tag
    /// (§4.5).
    Unit,
}

impl BuiltinResult {
    pub fn store_into(self, machine: &mut Machine) {
        match self {
            BuiltinResult::Int(n) => machine.int_register = n,
            BuiltinResult::Bool(b) => {
                machine.tag_register = bool_tag(b);
                machine.constructor_arg_count_register = 0;
            }
            BuiltinResult::Str(addr) => machine.string_register = Some(addr),
            BuiltinResult::Unit => {
                machine.tag_register = UNIT_TAG;
                machine.constructor_arg_count_register = UNIT_ARITY as u32;
            }
        }
    }
}

pub fn add(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Int(a + b)
}
pub fn sub(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Int(a - b)
}
pub fn mul(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Int(a * b)
}

pub fn div(a: i64, b: i64) -> Result<BuiltinResult, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    Ok(BuiltinResult::Int(a / b))
}

pub fn less(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Bool(a < b)
}
pub fn less_equal(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Bool(a <= b)
}
pub fn greater(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Bool(a > b)
}
pub fn greater_equal(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Bool(a >= b)
}
pub fn equal_to(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Bool(a == b)
}
pub fn not_equal_to(a: i64, b: i64) -> BuiltinResult {
    BuiltinResult::Bool(a != b)
}
pub fn negate(a: i64) -> BuiltinResult {
    BuiltinResult::Int(-a)
}

/// String concatenation always allocates. Both operand addresses are
/// pushed onto the A-stack as temporary GC roots before `reserve`, and the
/// (possibly moved) addresses are popped back off afterward — §4.5's
/// required protocol.
pub fn concat(machine: &mut Machine, left: Address, right: Address) -> BuiltinResult {
    machine.a_stack.push(left);
    machine.a_stack.push(right);

    let left_resolved = machine.heap.resolve(left);
    let right_resolved = machine.heap.resolve(right);
    let combined = format!("{}{}", string_of(machine, left_resolved), string_of(machine, right_resolved));

    machine.reserve(string_closure_size(combined.len()));
    machine.a_stack.pop();
    machine.a_stack.pop();

    let addr = machine.heap.alloc_string(combined);
    BuiltinResult::Str(addr)
}

fn string_of(machine: &Machine, addr: Address) -> String {
    match machine.heap.get(addr) {
        HeapObject::StringClosure(s) => s.clone(),
        _ => String::new(),
    }
}

pub fn print_int(n: i64) -> BuiltinResult {
    println!("{n}");
    BuiltinResult::Unit
}

pub fn print_string(s: &str) -> BuiltinResult {
    println!("{s}");
    BuiltinResult::Unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_by_zero_is_a_runtime_error() {
        assert_eq!(div(1, 0).unwrap_err(), RuntimeError::DivisionByZero);
    }

    #[test]
    fn comparisons_return_the_spec_tag_convention() {
        let mut machine = Machine::new();
        less(1, 2).store_into(&mut machine);
        assert_eq!(machine.tag_register, 1);
        less(2, 1).store_into(&mut machine);
        assert_eq!(machine.tag_register, 0);
    }

    #[test]
    fn concat_allocates_the_joined_string() {
        let mut machine = Machine::new();
        let left = machine.heap.alloc_string("hello ".to_string());
        let right = machine.heap.alloc_string("world".to_string());
        let result = concat(&mut machine, left, right);
        match result {
            BuiltinResult::Str(addr) => {
                assert!(matches!(machine.heap.get(addr), HeapObject::StringClosure(s) if s == "hello world"));
            }
            _ => panic!("expected a string result"),
        }
    }
}
