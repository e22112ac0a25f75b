//! Fixed-width word arithmetic.
//!
//! Memory cells and the accumulator are 32 bits wide. All arithmetic wraps
//! with two's-complement semantics; nothing in this module panics on
//! overflow.

/// Mask reducing a value to one 32-bit word.
pub const WORD_MASK: u64 = 0xFFFF_FFFF;

/// Value the accumulator takes when DVH divides by zero.
pub const DIVIDE_SATURATION: i32 = 0x7FFF_FFFF;

/// Reduce any integer to `[0, 2^32)` and reinterpret the top bit as sign.
///
/// `wrap32(0xFFFF_FFFF) == -1`, `wrap32(0x8000_0000) == i32::MIN`.
#[inline]
pub fn wrap32(value: i64) -> i32 {
    (value as u64 & WORD_MASK) as u32 as i32
}

/// Reinterpret a raw memory word as a signed operand.
#[inline]
pub fn as_signed(word: u32) -> i32 {
    word as i32
}

/// A + B, wrapped to 32 bits.
#[inline]
pub fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

/// A - B, wrapped to 32 bits.
#[inline]
pub fn subtract(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}

/// A × B, keeping the low 32 bits of the product.
#[inline]
pub fn multiply(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

/// A ÷ B truncated toward zero.
///
/// Division by zero saturates to [`DIVIDE_SATURATION`] instead of faulting,
/// and `i32::MIN / -1` wraps back to `i32::MIN`.
#[inline]
pub fn divide(a: i32, b: i32) -> i32 {
    if b == 0 {
        DIVIDE_SATURATION
    } else {
        a.wrapping_div(b)
    }
}
