//! Base-52 map keys.
//!
//! Digits are `a`-`z` (0-25) then `A`-`Z` (26-51), most significant first.

use std::cmp::Ordering;

/// Number of distinct key characters.
pub const KEY_RADIX: u64 = 52;

/// Renders `num` as a key of exactly `len` characters.
///
/// Digits above `len` are dropped.
#[must_use]
pub fn number_to_key(mut num: u64, len: usize) -> String {
    let mut digits = Vec::with_capacity(len);
    for _ in 0..len {
        digits.push(digit_char(num % KEY_RADIX));
        num /= KEY_RADIX;
    }
    digits.iter().rev().collect()
}

/// Parses a key back into its number. `None` for any character outside the
/// key alphabet, or for a key too long to fit.
#[must_use]
pub fn key_to_number(key: &str) -> Option<u64> {
    key.chars().try_fold(0u64, |acc, c| {
        let digit = match c {
            'a'..='z' => u64::from(c) - u64::from('a'),
            'A'..='Z' => u64::from(c) - u64::from('A') + 26,
            _ => return None,
        };
        acc.checked_mul(KEY_RADIX)?.checked_add(digit)
    })
}

/// Orders keys by their numeric value.
#[must_use]
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (key_to_number(a), key_to_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.len().cmp(&b.len())),
        _ => a.cmp(b),
    }
}

/// How many distinct keys fit in `len` characters.
#[must_use]
pub fn capacity(len: usize) -> u64 {
    u32::try_from(len).map_or(u64::MAX, |len| {
        KEY_RADIX.checked_pow(len).unwrap_or(u64::MAX)
    })
}

/// The shortest key length, no shorter than `min_len`, that can hold
/// `count` distinct keys.
#[must_use]
pub fn width_for(count: usize, min_len: usize) -> usize {
    let mut len = min_len.max(1);
    while (count as u64) > capacity(len) {
        len += 1;
    }
    len
}

fn digit_char(digit: u64) -> char {
    let digit = u8::try_from(digit).unwrap_or(0);
    if digit < 26 {
        char::from(b'a' + digit)
    } else {
        char::from(b'A' + digit - 26)
    }
}
