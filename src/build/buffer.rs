//! The metadata buffer: the five stream buffers and final root assembly.

use crate::{
    build::{
        heaps::{BlobBuffer, GuidBuffer, StringsBuffer, UserStringsBuffer},
        tables::TablesBuffer,
    },
    file::io::write_le,
    metadata::tables::TableSizes,
    utils::{align_to_4, pad_to_4, to_u32},
    Result,
};

/// Magic signature of a metadata root ("BSJB").
pub const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// Conventional stream emission order.
const STREAM_NAMES: [&str; 5] = ["#~", "#Strings", "#US", "#GUID", "#Blob"];

/// The mutable state of a directory build: the four heaps and the tables
/// buffer. Consumed by [`MetadataBuffer::create_metadata`], which produces
/// the serialized metadata root with all five streams.
pub struct MetadataBuffer {
    /// The `#Strings` heap
    pub strings: StringsBuffer,
    /// The `#US` heap
    pub user_strings: UserStringsBuffer,
    /// The `#Blob` heap
    pub blobs: BlobBuffer,
    /// The `#GUID` heap
    pub guids: GuidBuffer,
    /// The `#~` tables stream
    pub tables: TablesBuffer,
}

impl MetadataBuffer {
    /// Creates an empty metadata buffer.
    #[must_use]
    pub fn new() -> Self {
        MetadataBuffer {
            strings: StringsBuffer::new(),
            user_strings: UserStringsBuffer::new(),
            blobs: BlobBuffer::new(),
            guids: GuidBuffer::new(),
            tables: TablesBuffer::new(),
        }
    }

    /// Field widths for the current buffer contents.
    #[must_use]
    pub fn sizes(&self) -> TableSizes {
        TableSizes::new(
            &self.tables.row_counts(),
            self.strings.size(),
            self.guids.size(),
            self.blobs.size(),
        )
    }

    /// Applies the pending table sorts and serializes the metadata root:
    /// `BSJB` header, version string, stream directory and the five streams
    /// in conventional order (`#~`, `#Strings`, `#US`, `#GUID`, `#Blob`).
    ///
    /// Consuming the buffer is what makes the builder "spent": no rows or
    /// heap values can be added once the directory bytes exist.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnfilledRow`] for placeholder gaps and
    /// propagates serialization failures.
    pub fn create_metadata(mut self, version: &str) -> Result<Vec<u8>> {
        self.tables.sort_pending()?;

        let sizes = self.sizes();

        let mut streams: [Vec<u8>; 5] = Default::default();
        streams[0] = self.tables.serialize(&sizes)?;
        pad_to_4(&mut streams[0]);
        self.strings.flush(&mut streams[1]);
        self.user_strings.flush(&mut streams[2]);
        self.guids.flush(&mut streams[3]);
        self.blobs.flush(&mut streams[4]);

        // Version string buffer is NUL-terminated and 4-byte aligned
        let version_length = align_to_4(version.len() + 1);

        let mut header_size = 16 + version_length + 4;
        for name in STREAM_NAMES {
            header_size += 8 + align_to_4(name.len() + 1);
        }

        let mut root = Vec::with_capacity(
            header_size + streams.iter().map(Vec::len).sum::<usize>(),
        );

        write_le(&mut root, METADATA_SIGNATURE);
        write_le(&mut root, 1_u16); // major version
        write_le(&mut root, 1_u16); // minor version
        write_le(&mut root, 0_u32); // reserved
        write_le(&mut root, to_u32(version_length)?);
        root.extend_from_slice(version.as_bytes());
        root.resize(root.len() + version_length - version.len(), 0);

        write_le(&mut root, 0_u16); // flags
        write_le(&mut root, STREAM_NAMES.len() as u16);

        let mut offset = header_size;
        for (name, stream) in STREAM_NAMES.iter().zip(&streams) {
            write_le(&mut root, to_u32(offset)?);
            write_le(&mut root, to_u32(stream.len())?);
            root.extend_from_slice(name.as_bytes());
            root.push(0);
            while root.len() % 4 != 0 {
                root.push(0);
            }
            offset += stream.len();
        }

        debug_assert_eq!(root.len(), header_size);

        for stream in &streams {
            root.extend_from_slice(stream);
        }

        Ok(root)
    }
}

impl Default for MetadataBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        file::io::read_le_at,
        metadata::tables::{ModuleRow, TableData},
    };

    fn read_root_streams(metadata: &[u8]) -> Vec<(String, u32, u32)> {
        let mut offset = 0;
        assert_eq!(
            read_le_at::<u32>(metadata, &mut offset).unwrap(),
            METADATA_SIGNATURE
        );
        offset += 4; // versions
        offset += 4; // reserved
        let version_length = read_le_at::<u32>(metadata, &mut offset).unwrap() as usize;
        offset += version_length;
        offset += 2; // flags
        let count = read_le_at::<u16>(metadata, &mut offset).unwrap();

        let mut streams = Vec::new();
        for _ in 0..count {
            let stream_offset = read_le_at::<u32>(metadata, &mut offset).unwrap();
            let stream_size = read_le_at::<u32>(metadata, &mut offset).unwrap();
            let name_start = offset;
            while metadata[offset] != 0 {
                offset += 1;
            }
            let name = String::from_utf8(metadata[name_start..offset].to_vec()).unwrap();
            offset = (offset + 4) & !3;
            streams.push((name, stream_offset, stream_size));
        }
        streams
    }

    #[test]
    fn root_carries_five_streams_in_order() {
        let mut buffer = MetadataBuffer::new();
        buffer.strings.get_index("Test").unwrap();
        buffer.guids.get_index(&[1; 16]).unwrap();
        buffer
            .tables
            .add(
                TableData::Module(ModuleRow {
                    generation: 0,
                    name: 1,
                    mvid: 1,
                    enc_id: 0,
                    enc_base_id: 0,
                }),
                0,
            )
            .unwrap();

        let metadata = buffer.create_metadata("v4.0.30319").unwrap();
        let streams = read_root_streams(&metadata);

        let names: Vec<&str> = streams.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(names, ["#~", "#Strings", "#US", "#GUID", "#Blob"]);

        // streams are contiguous, 4-byte aligned and inside the blob
        for window in streams.windows(2) {
            assert_eq!(window[0].1 + window[0].2, window[1].1);
            assert_eq!(window[0].1 % 4, 0);
        }
        let last = streams.last().unwrap();
        assert_eq!((last.1 + last.2) as usize, metadata.len());
    }

    #[test]
    fn version_string_is_nul_padded() {
        let buffer = MetadataBuffer::new();
        let metadata = buffer.create_metadata("v4.0.30319").unwrap();

        // length field says 12 (11 bytes + NUL, aligned to 12)
        let mut offset = 12;
        let length = read_le_at::<u32>(&metadata, &mut offset).unwrap();
        assert_eq!(length, 12);
        assert_eq!(&metadata[16..27], b"v4.0.30319\0");
        assert_eq!(metadata[27], 0);
    }

    #[test]
    fn guid_stream_carries_raw_mvid() {
        let mut buffer = MetadataBuffer::new();
        let mvid = [7_u8; 16];
        buffer.guids.get_index(&mvid).unwrap();

        let metadata = buffer.create_metadata("v4.0.30319").unwrap();
        let streams = read_root_streams(&metadata);
        let (_, offset, size) = streams
            .iter()
            .find(|(name, _, _)| name == "#GUID")
            .unwrap();

        assert_eq!(*size, 16);
        assert_eq!(
            &metadata[*offset as usize..(*offset + *size) as usize],
            &mvid
        );
    }
}
