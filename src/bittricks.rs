/*!
bit packing.

Attribute binding tables store one 4-bit location per slot in a single `u64`.
*/

/// Reads the 4-bit field at `slot` (0..16).
#[inline]
pub const fn nibble_get(packed: u64, slot: usize) -> u8 {
    ((packed >> (slot * 4)) & 0xF) as u8
}

/// Returns `packed` with the 4-bit field at `slot` replaced by `value`.
#[inline]
pub const fn nibble_set(packed: u64, slot: usize, value: u8) -> u64 {
    let shift = slot * 4;
    (packed & !(0xF << shift)) | (((value & 0xF) as u64) << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibbles_do_not_overlap() {
        let mut packed = 0;
        for slot in 0..16 {
            packed = nibble_set(packed, slot, (15 - slot) as u8);
        }
        for slot in 0..16 {
            assert_eq!(nibble_get(packed, slot), (15 - slot) as u8);
        }
        packed = nibble_set(packed, 7, 0);
        assert_eq!(nibble_get(packed, 7), 0);
        assert_eq!(nibble_get(packed, 6), 9);
        assert_eq!(nibble_get(packed, 8), 7);
    }
}
