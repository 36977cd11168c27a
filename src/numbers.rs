/// Implements sign extension as described at [Sign extension](https://en.wikipedia.org/wiki/Sign_extension).
///
/// The low `bit_count` bits of `value` are read as a two's complement number and
/// widened to 16 bits. Bits above `bit_count` in `value` are ignored.
///
/// # Panics
/// - in debug builds if `bit_count` is not in `1..=16`
#[must_use]
pub const fn sign_extend(value: u16, bit_count: u8) -> u16 {
    debug_assert!(bit_count >= 1 && bit_count <= 16, "bit_count out of range");
    if bit_count >= 16 {
        return value;
    }
    let mask = (1u16 << bit_count) - 1;
    let bits = value & mask;
    if (bits >> (bit_count - 1)) & 1 == 1 {
        // negative: 1-extend
        bits | !mask
    } else {
        // positive, already 0-extended
        bits
    }
}
