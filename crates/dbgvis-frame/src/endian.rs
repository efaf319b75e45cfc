//! Byte order of a sender, as announced by the envelope tag.

use bytes::{Buf, BufMut};

/// Byte order used by whoever produced a message or file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the host this code runs on.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endian = Endian::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endian = Endian::Big;

    /// True for [`Endian::Big`].
    pub fn is_big(self) -> bool {
        matches!(self, Endian::Big)
    }

    /// True when data in this order must be swapped before the host can use it.
    pub fn is_foreign(self) -> bool {
        self != Self::NATIVE
    }

    /// The other byte order.
    pub fn opposite(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }

    /// Decode a `u32` stored in this byte order.
    pub fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Encode a `u32` in this byte order.
    pub fn u32_to(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    /// Read a `u32` from a buffer in this byte order.
    ///
    /// Returns `None` when fewer than four bytes remain.
    pub fn get_u32<B: Buf>(self, src: &mut B) -> Option<u32> {
        if src.remaining() < 4 {
            return None;
        }
        Some(match self {
            Endian::Little => src.get_u32_le(),
            Endian::Big => src.get_u32(),
        })
    }

    /// Write a `u32` to a buffer in this byte order.
    pub fn put_u32<B: BufMut>(self, dst: &mut B, value: u32) {
        match self {
            Endian::Little => dst.put_u32_le(value),
            Endian::Big => dst.put_u32(value),
        }
    }
}

/// Reverse the byte order of every whole 32-bit word in `bytes`.
///
/// Trailing bytes that do not form a full word are left untouched.
pub fn swap_words(bytes: &mut [u8]) {
    for word in bytes.chunks_exact_mut(4) {
        word.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_is_not_foreign() {
        assert!(!Endian::NATIVE.is_foreign());
        assert!(Endian::NATIVE.opposite().is_foreign());
    }

    #[test]
    fn u32_roundtrip_both_orders() {
        for endian in [Endian::Little, Endian::Big] {
            let bytes = endian.u32_to(0x0102_0304);
            assert_eq!(endian.u32_from(bytes), 0x0102_0304);
        }
        assert_eq!(Endian::Big.u32_to(1), [0, 0, 0, 1]);
        assert_eq!(Endian::Little.u32_to(1), [1, 0, 0, 0]);
    }

    #[test]
    fn get_u32_short_buffer() {
        let mut src: &[u8] = &[1, 2, 3];
        assert_eq!(Endian::Little.get_u32(&mut src), None);
    }

    #[test]
    fn swap_words_leaves_tail() {
        let mut bytes = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        swap_words(&mut bytes);
        assert_eq!(bytes, [4, 3, 2, 1, 8, 7, 6, 5, 9, 10]);
    }
}
