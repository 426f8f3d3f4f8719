//! Small numeric and byte-reinterpretation helpers shared across the engine.

use std::mem::size_of;
use std::slice;

/// Performs the log2 operation on the given integer.
///
/// If the result is undefined (`n == 0`), the function returns `None`.
pub fn log2(n: u64) -> Option<u64> {
    let num_bits = (size_of::<u64>() * 8) as u64;
    let n = num_bits - n.leading_zeros() as u64;
    if n > 0 { Some(n - 1) } else { None }
}

/// Divides `n` by `d`, rounding up.
pub fn ceil_division(n: u64, d: u64) -> u64 {
    n.div_ceil(d)
}

/// Rounds `n` up to the next multiple of 4.
pub fn round_up_4(n: usize) -> usize {
    n.next_multiple_of(4)
}

/// Reinterprets a `#[repr(C)]` value as a byte slice.
///
/// # Safety
/// The caller must ensure `T` has no padding bytes that would leak uninitialized memory, or
/// that doing so is acceptable (as is the case for on-disk structures zeroed at construction).
pub fn as_bytes<T>(v: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(v as *const T as *const u8, size_of::<T>()) }
}

/// Reinterprets a `#[repr(C)]` value as a mutable byte slice.
pub fn as_bytes_mut<T>(v: &mut T) -> &mut [u8] {
    unsafe { slice::from_raw_parts_mut(v as *mut T as *mut u8, size_of::<T>()) }
}
