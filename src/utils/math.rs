//! Mathematical utility functions.

use crate::Result;

/// Converts a `usize` to `u32` for metadata serialization, returning an error
/// if the value exceeds `u32::MAX`. Heaps and streams are bounded to 4 GiB by
/// the format itself.
///
/// # Errors
///
/// Returns [`crate::Error::IndexOverflow`] if `value` exceeds `u32::MAX`.
pub fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| crate::Error::IndexOverflow(format!("value {value} exceeds u32::MAX")))
}

/// Rounds `value` up to the next multiple of 4.
#[must_use]
pub fn align_to_4(value: usize) -> usize {
    (value + 3) & !3
}

/// Appends zero bytes until the buffer length is a multiple of 4.
pub fn pad_to_4(buffer: &mut Vec<u8>) {
    while buffer.len() % 4 != 0 {
        buffer.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_4() {
        assert_eq!(align_to_4(0), 0);
        assert_eq!(align_to_4(1), 4);
        assert_eq!(align_to_4(4), 4);
        assert_eq!(align_to_4(5), 8);
        assert_eq!(align_to_4(123), 124);
    }

    #[test]
    fn test_pad_to_4() {
        let mut buffer = vec![1, 2, 3];
        pad_to_4(&mut buffer);
        assert_eq!(buffer, &[1, 2, 3, 0]);

        pad_to_4(&mut buffer);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_to_u32_valid() {
        assert_eq!(to_u32(0).unwrap(), 0);
        assert_eq!(to_u32(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_to_u32_overflow() {
        assert!(to_u32(u32::MAX as usize + 1).is_err());
    }
}
