//! Hex formatting consumed by trace printers.

use crate::wide::WideWord;
use crate::LIMBS;

/// `"0x" + 8 lowercase hex digits` for limb `i` of `v`.
#[must_use]
pub fn limb_hex(v: WideWord, i: usize) -> String {
    let limb = v.get_limb(i).unwrap_or(0);
    format!("0x{limb:08x}")
}

/// Eight 32-bit limbs, high-to-low, separated by single spaces, lowercase,
/// no `0x` prefix, no padding beyond 8 digits each. Always 71 characters.
#[must_use]
pub fn xlen_hex(v: WideWord) -> String {
    (0..LIMBS)
        .rev()
        .map(|i| format!("{:08x}", v.get_limb(i).unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(" ")
}
