//! Byte order aware reading and writing utilities for metadata serialization.
//!
//! This module provides the [`CilIO`] trait for safe, endian-aware transfer of
//! primitive types to and from byte buffers. The write side is used by every
//! heap and table serializer; the read side backs the round-trip checks and
//! the coded-index decoder.

use crate::{Error::OutOfBounds, Result};

/// Trait for implementing type specific safe readers / writers
///
/// This trait abstracts over moving primitive types through byte slices in a
/// safe and endian-aware way. It is implemented for all integer widths used
/// in metadata serialization. All multi-byte values in ECMA-335 metadata are
/// little-endian.
pub trait CilIO: Sized + Copy {
    #[allow(missing_docs)]
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Convert T into its little-endian byte representation
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($t:ty => $n:literal),+ $(,)?) => {
        $(
            impl CilIO for $t {
                type Bytes = [u8; $n];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$t>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$t>::to_le_bytes(self)
                }
            }
        )+
    };
}

impl_cil_io! {
    u8 => 1, i8 => 1,
    u16 => 2, i16 => 2,
    u32 => 4, i32 => 4,
    u64 => 8, i64 => 8,
    f32 => 4, f64 => 8,
}

/// Read a `T` from the start of a byte buffer in little-endian order.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0;
    read_le_at(data, &mut offset)
}

/// Read a `T` at `offset`, advancing the offset by the amount read.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let size = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(size) else {
        return Err(OutOfBounds);
    };

    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(bytes) = T::Bytes::try_from(&data[*offset..end]) else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_le_bytes(bytes))
}

/// Read a table or heap index whose width depends on the referenced size.
///
/// Reads 4 bytes when `is_large` is set, 2 bytes otherwise, widening to `u32`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    if is_large {
        read_le_at::<u32>(data, offset)
    } else {
        Ok(u32::from(read_le_at::<u16>(data, offset)?))
    }
}

/// Append a `T` to a byte buffer in little-endian order.
pub fn write_le<T: CilIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Append a table or heap index whose width depends on the referenced size.
///
/// Writes 4 bytes when `is_large` is set, 2 bytes otherwise.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `value` does not fit into the
/// narrow form. Field widths are computed from the final row counts and heap
/// sizes, so an overflow here indicates an internal inconsistency.
pub fn write_le_dyn(buffer: &mut Vec<u8>, value: u32, is_large: bool) -> Result<()> {
    if is_large {
        write_le(buffer, value);
    } else {
        let Ok(narrow) = u16::try_from(value) else {
            return Err(OutOfBounds);
        };
        write_le(buffer, narrow);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trip() {
        let mut buffer = Vec::new();
        write_le(&mut buffer, 0x1122_3344_u32);
        write_le(&mut buffer, 0x5566_u16);
        write_le(&mut buffer, 0x77_u8);

        assert_eq!(buffer, &[0x44, 0x33, 0x22, 0x11, 0x66, 0x55, 0x77]);

        let mut offset = 0;
        assert_eq!(read_le_at::<u32>(&buffer, &mut offset).unwrap(), 0x1122_3344);
        assert_eq!(read_le_at::<u16>(&buffer, &mut offset).unwrap(), 0x5566);
        assert_eq!(read_le_at::<u8>(&buffer, &mut offset).unwrap(), 0x77);
        assert_eq!(offset, 7);
    }

    #[test]
    fn read_out_of_bounds() {
        let data = [0x01, 0x02];
        assert!(read_le::<u32>(&data).is_err());

        let mut offset = 1;
        assert!(read_le_at::<u16>(&data, &mut offset).is_err());
        assert_eq!(offset, 1);
    }

    #[test]
    fn dyn_widths() {
        let mut buffer = Vec::new();
        write_le_dyn(&mut buffer, 0x1234, false).unwrap();
        write_le_dyn(&mut buffer, 0x0001_0000, true).unwrap();
        assert_eq!(buffer, &[0x34, 0x12, 0x00, 0x00, 0x01, 0x00]);

        let mut offset = 0;
        assert_eq!(read_le_at_dyn(&buffer, &mut offset, false).unwrap(), 0x1234);
        assert_eq!(
            read_le_at_dyn(&buffer, &mut offset, true).unwrap(),
            0x0001_0000
        );
    }

    #[test]
    fn dyn_narrow_overflow() {
        let mut buffer = Vec::new();
        assert!(write_le_dyn(&mut buffer, 0x0001_0000, false).is_err());
    }
}
