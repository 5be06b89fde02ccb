//! Byte order conversion.
//!
//! All multi-byte values in a DCD file are stored in the byte order of the machine that wrote it.
//! Once a file has been detected as foreign-endian, every buffer that is read from it is swapped
//! in one sweep with [`swap_in_place`] right after the read completes, after which its values can
//! be decoded as native-endian values.

/// Width in bytes of markers, `i32` and `f32` values.
pub const WORD: usize = 4;
/// Width in bytes of `f64` values.
pub const DOUBLE: usize = 8;

/// Reverse the byte order of each `width`-byte element of `bytes`.
///
/// # Panics
///
/// If the length of `bytes` is not a multiple of `width`. Buffers are always sized from element
/// counts, so this indicates a bug in the caller.
pub fn swap_in_place(bytes: &mut [u8], width: usize) {
    assert_eq!(
        bytes.len() % width,
        0,
        "buffer of {} bytes is not a whole number of {width}-byte elements",
        bytes.len()
    );
    for element in bytes.chunks_exact_mut(width) {
        element.reverse();
    }
}

/// Swap `bytes` in place if `reverse` is set.
#[inline]
pub fn swap_if(reverse: bool, bytes: &mut [u8], width: usize) {
    if reverse {
        swap_in_place(bytes, width)
    }
}

#[inline]
pub(crate) fn ne_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut raw = [0; WORD];
    raw.copy_from_slice(&bytes[offset..offset + WORD]);
    i32::from_ne_bytes(raw)
}

#[inline]
pub(crate) fn ne_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0; WORD];
    raw.copy_from_slice(&bytes[offset..offset + WORD]);
    u32::from_ne_bytes(raw)
}

#[inline]
pub(crate) fn ne_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0; WORD];
    raw.copy_from_slice(&bytes[offset..offset + WORD]);
    f32::from_ne_bytes(raw)
}

#[inline]
pub(crate) fn ne_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0; DOUBLE];
    raw.copy_from_slice(&bytes[offset..offset + DOUBLE]);
    f64::from_ne_bytes(raw)
}

/// Iterate over the native-endian `f32` values in `bytes`.
pub(crate) fn f32s(bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
    bytes
        .chunks_exact(WORD)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
}

/// Write `values` as native-endian bytes into `bytes`.
pub(crate) fn put_f32s(bytes: &mut [u8], values: impl IntoIterator<Item = f32>) {
    for (dst, v) in bytes.chunks_exact_mut(WORD).zip(values) {
        dst.copy_from_slice(&v.to_ne_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_words() {
        let mut bytes = 84u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&7u32.to_be_bytes());
        swap_in_place(&mut bytes, WORD);
        let native: Vec<u8> = [84u32.to_le_bytes(), 7u32.to_le_bytes()].concat();
        assert_eq!(bytes, native);
    }

    #[test]
    fn swap_doubles() {
        let mut bytes = 1.5f64.to_be_bytes().to_vec();
        swap_in_place(&mut bytes, DOUBLE);
        assert_eq!(f64::from_le_bytes(bytes.try_into().unwrap()), 1.5);
    }

    #[test]
    fn swap_twice_is_identity() {
        let original: Vec<u8> = (0..48).collect();
        let mut bytes = original.clone();
        swap_in_place(&mut bytes, DOUBLE);
        assert_ne!(bytes, original);
        swap_in_place(&mut bytes, DOUBLE);
        assert_eq!(bytes, original);
    }

    #[test]
    fn swap_if_not_reversed() {
        let original: Vec<u8> = (0..8).collect();
        let mut bytes = original.clone();
        swap_if(false, &mut bytes, WORD);
        assert_eq!(bytes, original);
    }

    #[test]
    #[should_panic]
    fn ragged_buffer() {
        let mut bytes = [0u8; 6];
        swap_in_place(&mut bytes, WORD);
    }

    #[test]
    fn f32_round_trip() {
        let values = [1.0f32, -2.5, 1e-3];
        let mut bytes = [0u8; 12];
        put_f32s(&mut bytes, values);
        assert_eq!(f32s(&bytes).collect::<Vec<_>>(), values);
    }
}
