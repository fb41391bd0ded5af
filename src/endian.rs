//! Endian-aware fixed-width readers (component C2).
//!
//! These are deliberately free functions over raw byte slices rather than
//! methods on a stateful reader — [`crate::cursor::Cursor`] is the
//! stateful layer built on top of them.

use crate::header::ident::ElfEndian;

/// The two byte orders an ELF container can declare via `EI_DATA`. Carried separately from
/// [`ElfEndian`] so components that only care about endianness (DWARF decoding, the cursor) don't
/// need to reason about the `Invalid` ELF-specific variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl TryFrom<ElfEndian> for Endian {
    type Error = ();

    fn try_from(value: ElfEndian) -> Result<Self, Self::Error> {
        match value {
            ElfEndian::Little => Ok(Endian::Little),
            ElfEndian::Big => Ok(Endian::Big),
            ElfEndian::Invalid => Err(()),
        }
    }
}

/// Values that can be decoded from a fixed-size byte array in either byte order.
pub trait FromEndianBytes<const N: usize>: Sized {
    fn from_le_bytes(bytes: [u8; N]) -> Self;
    fn from_be_bytes(bytes: [u8; N]) -> Self;
}

macro_rules! impl_from_endian_bytes {
    ($ty:ty, $n:expr) => {
        impl FromEndianBytes<$n> for $ty {
            fn from_le_bytes(bytes: [u8; $n]) -> Self {
                <$ty>::from_le_bytes(bytes)
            }
            fn from_be_bytes(bytes: [u8; $n]) -> Self {
                <$ty>::from_be_bytes(bytes)
            }
        }
    };
}

impl_from_endian_bytes!(u16, 2);
impl_from_endian_bytes!(u32, 4);
impl_from_endian_bytes!(u64, 8);

/// Reads a `T` out of `bytes[0..N]` honouring `endian`. Panics if `bytes` is shorter than `N`;
/// callers (the cursor) are responsible for bounds-checking before calling this.
pub fn read<T: FromEndianBytes<N>, const N: usize>(endian: Endian, bytes: &[u8]) -> T {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    match endian {
        Endian::Little => T::from_le_bytes(array),
        Endian::Big => T::from_be_bytes(array),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_u16_in_both_orders() {
        let bytes = [0x01, 0x02];
        assert_eq!(read::<u16, 2>(Endian::Little, &bytes), 0x0201);
        assert_eq!(read::<u16, 2>(Endian::Big, &bytes), 0x0102);
    }

    #[test]
    fn reads_u32_in_both_orders() {
        let bytes = [0xAA, 0xBB, 0xCC, 0xDD];
        assert_eq!(read::<u32, 4>(Endian::Little, &bytes), 0xDDCC_BBAA);
        assert_eq!(read::<u32, 4>(Endian::Big, &bytes), 0xAABB_CCDD);
    }

    #[test]
    fn try_from_elf_endian_rejects_invalid() {
        assert!(Endian::try_from(ElfEndian::Invalid).is_err());
        assert_eq!(Endian::try_from(ElfEndian::Little), Ok(Endian::Little));
    }
}
