use rustc_hash::FxHashMap;

use crate::{utils::to_u32, Result};

/// Append-and-intern buffer for the `#Strings` heap.
///
/// Entries are NUL-terminated UTF-8; index 0 is the empty string. Interning
/// the same value twice returns the same index. The heap is append-only.
pub struct StringsBuffer {
    data: Vec<u8>,
    index: FxHashMap<String, u32>,
}

impl StringsBuffer {
    /// Creates the buffer with its leading empty entry.
    #[must_use]
    pub fn new() -> Self {
        StringsBuffer {
            data: vec![0],
            index: FxHashMap::default(),
        }
    }

    /// Interns a string and returns its heap index. The empty string is
    /// always index 0.
    ///
    /// # Errors
    /// Returns an error if the value contains an embedded NUL byte or the
    /// heap outgrows its 32-bit address space.
    pub fn get_index(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }

        if let Some(&existing) = self.index.get(value) {
            return Ok(existing);
        }

        if value.as_bytes().contains(&0) {
            return Err(malformed_error!(
                "String heap entry contains an embedded NUL - {:?}",
                value
            ));
        }

        let index = to_u32(self.data.len())?;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        to_u32(self.data.len())?;

        self.index.insert(value.to_string(), index);
        Ok(index)
    }

    /// Current byte length of the heap, before alignment padding.
    #[must_use]
    pub fn size(&self) -> u32 {
        // get_index keeps the length within u32
        self.data.len() as u32
    }

    /// Appends the heap bytes, padded to 4-byte alignment, to `writer`.
    pub fn flush(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.data);
        let mut padding = writer.len();
        while padding % 4 != 0 {
            writer.push(0);
            padding += 1;
        }
    }
}

impl Default for StringsBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_index_zero() {
        let mut heap = StringsBuffer::new();
        assert_eq!(heap.get_index("").unwrap(), 0);
        assert_eq!(heap.size(), 1);
    }

    #[test]
    fn interning_dedupes() {
        let mut heap = StringsBuffer::new();

        let hello = heap.get_index("Hello").unwrap();
        let world = heap.get_index("World").unwrap();
        assert_eq!(hello, 1);
        assert_eq!(world, 7);

        assert_eq!(heap.get_index("Hello").unwrap(), hello);
        assert_eq!(heap.get_index("World").unwrap(), world);
        assert_eq!(heap.size(), 13);
    }

    #[test]
    fn layout_is_nul_terminated() {
        let mut heap = StringsBuffer::new();
        heap.get_index("AB").unwrap();

        let mut bytes = Vec::new();
        heap.flush(&mut bytes);
        assert_eq!(bytes, &[0x00, b'A', b'B', 0x00]);
    }

    #[test]
    fn flush_pads_to_four() {
        let mut heap = StringsBuffer::new();
        heap.get_index("Empty").unwrap();

        let mut bytes = Vec::new();
        heap.flush(&mut bytes);
        // 1 + 6 = 7 bytes, padded to 8
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[1..7], b"Empty\0");
        assert_eq!(bytes[7], 0);
    }

    #[test]
    fn embedded_nul_is_rejected() {
        let mut heap = StringsBuffer::new();
        assert!(heap.get_index("a\0b").is_err());
    }
}
