use crate::{utils::to_u32, Result};

/// Concatenation buffer for embedded manifest resource payloads.
///
/// Each payload is stored as `u32_le(length) || bytes`; the returned offset
/// is what the owning `ManifestResource` row carries. If nothing is embedded
/// the directory omits the resources blob entirely.
pub struct ResourcesBuffer {
    data: Vec<u8>,
}

impl ResourcesBuffer {
    /// Creates an empty resources buffer.
    #[must_use]
    pub fn new() -> Self {
        ResourcesBuffer { data: Vec::new() }
    }

    /// Appends one resource payload and returns its offset within the blob.
    ///
    /// # Errors
    /// Returns an error if the payload or the total blob exceeds 32-bit
    /// addressing.
    pub fn add(&mut self, payload: &[u8]) -> Result<u32> {
        let offset = to_u32(self.data.len())?;
        self.data
            .extend_from_slice(&to_u32(payload.len())?.to_le_bytes());
        self.data.extend_from_slice(payload);
        to_u32(self.data.len())?;
        Ok(offset)
    }

    /// Current byte length of the blob.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Consumes the buffer; `None` when no resource was embedded.
    #[must_use]
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.data.is_empty() {
            None
        } else {
            Some(self.data)
        }
    }
}

impl Default for ResourcesBuffer {
    fn default() -> Self {
        Self::new()
    }
}
