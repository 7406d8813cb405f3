use rustc_hash::FxHashMap;

use crate::{
    utils::{to_u32, write_compressed_uint},
    Result,
};

/// Append-and-intern buffer for the `#Blob` heap.
///
/// Each entry is stored as `compressed_uint(len) || bytes`; index 0 is the
/// empty blob. Deduplication is keyed on the raw value, before the length
/// prefix.
pub struct BlobBuffer {
    data: Vec<u8>,
    index: FxHashMap<Vec<u8>, u32>,
}

impl BlobBuffer {
    /// Creates the buffer with its leading empty entry.
    #[must_use]
    pub fn new() -> Self {
        BlobBuffer {
            data: vec![0],
            index: FxHashMap::default(),
        }
    }

    /// Interns a blob and returns its heap index. The empty blob is always
    /// index 0.
    ///
    /// # Errors
    /// Returns an error if the blob length exceeds the compressed integer
    /// range or the heap outgrows its 32-bit address space.
    pub fn get_index(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }

        if let Some(&existing) = self.index.get(value) {
            return Ok(existing);
        }

        let index = to_u32(self.data.len())?;
        write_compressed_uint(to_u32(value.len())?, &mut self.data)?;
        self.data.extend_from_slice(value);
        to_u32(self.data.len())?;

        self.index.insert(value.to_vec(), index);
        Ok(index)
    }

    /// Current byte length of the heap, before alignment padding.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Appends the heap bytes, padded to 4-byte alignment, to `writer`.
    pub fn flush(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.data);
        while writer.len() % 4 != 0 {
            writer.push(0);
        }
    }
}

impl Default for BlobBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_is_index_zero() {
        let mut heap = BlobBuffer::new();
        assert_eq!(heap.get_index(&[]).unwrap(), 0);
        assert_eq!(heap.size(), 1);
    }

    #[test]
    fn interning_dedupes_by_value() {
        let mut heap = BlobBuffer::new();

        let first = heap.get_index(&[0x20, 0x00, 0x01]).unwrap();
        let second = heap.get_index(&[0x06, 0x0E]).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 5);

        // Byte-identical values share one entry
        assert_eq!(heap.get_index(&[0x20, 0x00, 0x01]).unwrap(), first);
        assert_eq!(heap.size(), 8);
    }

    #[test]
    fn length_prefix_is_compressed() {
        let mut heap = BlobBuffer::new();
        let payload = vec![0xAB; 0x90];
        let index = heap.get_index(&payload).unwrap();
        assert_eq!(index, 1);

        let mut bytes = Vec::new();
        heap.flush(&mut bytes);
        // Two-byte prefix for a 0x90-byte blob
        assert_eq!(&bytes[1..3], &[0x80, 0x90]);
        assert_eq!(&bytes[3..3 + 0x90], payload.as_slice());
    }

    #[test]
    fn flush_pads_to_four() {
        let mut heap = BlobBuffer::new();
        heap.get_index(&[0x01]).unwrap();

        let mut bytes = Vec::new();
        heap.flush(&mut bytes);
        // 1 + 2 = 3 bytes, padded to 4
        assert_eq!(bytes.len(), 4);
    }
}
