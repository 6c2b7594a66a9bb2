//! Heap layout constants shared by the Cmm allocation accounting (§4.3) and
//! the runtime's heap (§4.4).

/// Every field in a closure is word-sized; the language has no sub-word
/// primitives (see §3.2 Storage: pointer / int / string-pointer slots are
/// all one word).
pub const WORD_SIZE: usize = 8;

/// Size of the info-table pointer every heap object starts with.
pub const INFO_TABLE_PTR_SIZE: usize = WORD_SIZE;

/// A string closure must be at least this many bytes so that, after the
/// bytes are consumed, there is still room for the two-word forwarding
/// record (`already-evacuated closure`) the collector overwrites it with.
pub const MIN_RELOCATABLE_SIZE: usize = INFO_TABLE_PTR_SIZE + WORD_SIZE;

/// `sizeof` for a closure with the given pointer/int/string field counts,
/// not counting a string payload. Used by Cmm allocation accounting to size
/// `AllocTable` reservations.
pub const fn closure_size(pointer_fields: usize, int_fields: usize, string_fields: usize) -> usize {
    INFO_TABLE_PTR_SIZE + (pointer_fields + int_fields + string_fields) * WORD_SIZE
}

/// Size of a string closure carrying `len` bytes plus a NUL terminator,
/// rounded up to `MIN_RELOCATABLE_SIZE`.
pub const fn string_closure_size(len: usize) -> usize {
    let raw = INFO_TABLE_PTR_SIZE + len + 1;
    if raw < MIN_RELOCATABLE_SIZE {
        MIN_RELOCATABLE_SIZE
    } else {
        raw
    }
}

/// Size of a partial-application closure with the given number of saved
/// A-stack and B-stack slots.
pub const fn pap_closure_size(saved_a_slots: usize, saved_b_slots: usize) -> usize {
    // info table + a_count:u16 + b_count:u16 (packed into one word) + saved segments
    INFO_TABLE_PTR_SIZE + WORD_SIZE + saved_a_slots * WORD_SIZE + saved_b_slots * WORD_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_closure_respects_minimum() {
        assert_eq!(string_closure_size(0), MIN_RELOCATABLE_SIZE);
        assert!(string_closure_size(100) >= MIN_RELOCATABLE_SIZE);
    }

    #[test]
    fn closure_size_counts_every_field() {
        assert_eq!(closure_size(0, 0, 0), INFO_TABLE_PTR_SIZE);
        assert_eq!(closure_size(2, 1, 0), INFO_TABLE_PTR_SIZE + 3 * WORD_SIZE);
    }
}
