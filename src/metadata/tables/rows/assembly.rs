//! Rows of the manifest tables: `Assembly`, `AssemblyRef` (and their OS and
//! processor satellites), `File`, `ExportedType` and `ManifestResource`.

use crate::{
    file::io::write_le,
    metadata::tables::{
        rows::{write_blob_index, write_coded_index, write_str_index, write_table_index},
        CodedIndex, CodedIndexType, RowWritable, TableId, TableSizes,
    },
    Result,
};

/// One row of the `Assembly` table (0x20): the manifest of the assembly
/// being built. At most one row exists.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRow {
    /// Hash algorithm the assembly uses for file hashes and key tokens
    pub hash_alg_id: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// Assembly attributes bitmask
    pub flags: u32,
    /// `#Blob` index of the full public key, 0 when unsigned
    pub public_key: u32,
    /// `#Strings` index of the assembly name
    pub name: u32,
    /// `#Strings` index of the culture string, 0 for neutral
    pub culture: u32,
}

impl RowWritable for AssemblyRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* hash_alg_id */ 4 +
            /* version */     8 +
            /* flags */       4 +
            /* public_key */  sizes.blob_bytes() +
            /* name */        sizes.str_bytes() +
            /* culture */     sizes.str_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.hash_alg_id);
        write_le(buffer, self.major_version);
        write_le(buffer, self.minor_version);
        write_le(buffer, self.build_number);
        write_le(buffer, self.revision_number);
        write_le(buffer, self.flags);
        write_blob_index(buffer, self.public_key, sizes)?;
        write_str_index(buffer, self.name, sizes)?;
        write_str_index(buffer, self.culture, sizes)?;
        Ok(())
    }
}

/// One row of the `AssemblyProcessor` table (0x21).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyProcessorRow {
    /// Processor architecture id
    pub processor: u32,
}

impl RowWritable for AssemblyProcessorRow {
    fn row_size(_sizes: &TableSizes) -> u32 {
        4
    }

    fn row_write(&self, buffer: &mut Vec<u8>, _sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.processor);
        Ok(())
    }
}

/// One row of the `AssemblyOS` table (0x22).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyOsRow {
    /// Platform id
    pub platform_id: u32,
    /// OS major version
    pub major_version: u32,
    /// OS minor version
    pub minor_version: u32,
}

impl RowWritable for AssemblyOsRow {
    fn row_size(_sizes: &TableSizes) -> u32 {
        12
    }

    fn row_write(&self, buffer: &mut Vec<u8>, _sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.platform_id);
        write_le(buffer, self.major_version);
        write_le(buffer, self.minor_version);
        Ok(())
    }
}

/// One row of the `AssemblyRef` table (0x23).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefRow {
    /// Major version of the referenced assembly
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// Assembly reference attributes bitmask
    pub flags: u32,
    /// `#Blob` index of the public key or its 8-byte token, 0 when absent
    pub public_key_or_token: u32,
    /// `#Strings` index of the referenced assembly name
    pub name: u32,
    /// `#Strings` index of the culture string, 0 for neutral
    pub culture: u32,
    /// `#Blob` index of the hash of the referenced assembly, 0 when absent
    pub hash_value: u32,
}

impl RowWritable for AssemblyRefRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* version */             8 +
            /* flags */               4 +
            /* public_key_or_token */ sizes.blob_bytes() +
            /* name */                sizes.str_bytes() +
            /* culture */             sizes.str_bytes() +
            /* hash_value */          sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.major_version);
        write_le(buffer, self.minor_version);
        write_le(buffer, self.build_number);
        write_le(buffer, self.revision_number);
        write_le(buffer, self.flags);
        write_blob_index(buffer, self.public_key_or_token, sizes)?;
        write_str_index(buffer, self.name, sizes)?;
        write_str_index(buffer, self.culture, sizes)?;
        write_blob_index(buffer, self.hash_value, sizes)?;
        Ok(())
    }
}

/// One row of the `AssemblyRefProcessor` table (0x24).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefProcessorRow {
    /// Processor architecture id
    pub processor: u32,
    /// RID of the owning reference in `AssemblyRef`
    pub assembly_ref: u32,
}

impl RowWritable for AssemblyRefProcessorRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* processor */    4 +
            /* assembly_ref */ sizes.table_index_bytes(TableId::AssemblyRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.processor);
        write_table_index(buffer, self.assembly_ref, TableId::AssemblyRef, sizes)?;
        Ok(())
    }
}

/// One row of the `AssemblyRefOS` table (0x25).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefOsRow {
    /// Platform id
    pub platform_id: u32,
    /// OS major version
    pub major_version: u32,
    /// OS minor version
    pub minor_version: u32,
    /// RID of the owning reference in `AssemblyRef`
    pub assembly_ref: u32,
}

impl RowWritable for AssemblyRefOsRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* platform + version */ 12 +
            /* assembly_ref */       sizes.table_index_bytes(TableId::AssemblyRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.platform_id);
        write_le(buffer, self.major_version);
        write_le(buffer, self.minor_version);
        write_table_index(buffer, self.assembly_ref, TableId::AssemblyRef, sizes)?;
        Ok(())
    }
}

/// One row of the `File` table (0x26).
#[derive(Clone, Debug, PartialEq)]
pub struct FileRow {
    /// File attributes bitmask (contains-metadata or not)
    pub flags: u32,
    /// `#Strings` index of the file name
    pub name: u32,
    /// `#Blob` index of the file hash
    pub hash_value: u32,
}

impl RowWritable for FileRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* flags */      4 +
            /* name */       sizes.str_bytes() +
            /* hash_value */ sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.flags);
        write_str_index(buffer, self.name, sizes)?;
        write_blob_index(buffer, self.hash_value, sizes)?;
        Ok(())
    }
}

/// One row of the `ExportedType` table (0x27).
#[derive(Clone, Debug, PartialEq)]
pub struct ExportedTypeRow {
    /// Type attributes bitmask
    pub flags: u32,
    /// Hint: original `TypeDef` token RID in the defining module, may be 0
    pub type_def_id: u32,
    /// `#Strings` index of the type name
    pub name: u32,
    /// `#Strings` index of the namespace, 0 for the empty namespace
    pub namespace: u32,
    /// `Implementation` coded index of the defining file, assembly or
    /// enclosing exported type
    pub implementation: CodedIndex,
}

impl RowWritable for ExportedTypeRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* flags */          4 +
            /* type_def_id */    4 +
            /* name */           sizes.str_bytes() +
            /* namespace */      sizes.str_bytes() +
            /* implementation */ sizes.coded_index_bytes(CodedIndexType::Implementation),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.flags);
        write_le(buffer, self.type_def_id);
        write_str_index(buffer, self.name, sizes)?;
        write_str_index(buffer, self.namespace, sizes)?;
        write_coded_index(
            buffer,
            &self.implementation,
            CodedIndexType::Implementation,
            sizes,
        )?;
        Ok(())
    }
}

/// One row of the `ManifestResource` table (0x28).
#[derive(Clone, Debug, PartialEq)]
pub struct ManifestResourceRow {
    /// Byte offset of the resource within its container; for embedded
    /// resources this addresses the produced resources blob
    pub offset: u32,
    /// Resource attributes bitmask (public/private)
    pub flags: u32,
    /// `#Strings` index of the resource name
    pub name: u32,
    /// `Implementation` coded index of the container; null for embedded data
    pub implementation: CodedIndex,
}

impl RowWritable for ManifestResourceRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* offset */         4 +
            /* flags */          4 +
            /* name */           sizes.str_bytes() +
            /* implementation */ sizes.coded_index_bytes(CodedIndexType::Implementation),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.offset);
        write_le(buffer, self.flags);
        write_str_index(buffer, self.name, sizes)?;
        write_coded_index(
            buffer,
            &self.implementation,
            CodedIndexType::Implementation,
            sizes,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembly_row_layout() {
        let sizes = TableSizes::new_test(&[(TableId::Assembly, 1)], false, false, false);
        assert_eq!(AssemblyRow::row_size(&sizes), 4 + 8 + 4 + 2 + 2 + 2);

        let row = AssemblyRow {
            hash_alg_id: 0x8004,
            major_version: 1,
            minor_version: 2,
            build_number: 3,
            revision_number: 4,
            flags: 0,
            public_key: 0,
            name: 1,
            culture: 0,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(
            buffer,
            &[
                0x04, 0x80, 0x00, 0x00, // hash_alg_id
                0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00, // version
                0x00, 0x00, 0x00, 0x00, // flags
                0x00, 0x00, // public_key
                0x01, 0x00, // name
                0x00, 0x00, // culture
            ]
        );
    }

    #[test]
    fn assembly_ref_row_layout() {
        let sizes = TableSizes::new_test(&[(TableId::AssemblyRef, 1)], false, false, false);
        assert_eq!(AssemblyRefRow::row_size(&sizes), 8 + 4 + 2 + 2 + 2 + 2);
    }

    #[test]
    fn manifest_resource_embedded() {
        let sizes = TableSizes::new_test(&[(TableId::ManifestResource, 1)], false, false, false);
        let row = ManifestResourceRow {
            offset: 0,
            flags: 1,
            name: 9,
            implementation: CodedIndex::null(),
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(
            buffer,
            &[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn exported_type_implementation() {
        let sizes = TableSizes::new_test(&[(TableId::File, 2)], false, false, false);
        let row = ExportedTypeRow {
            flags: 0x0000_0001,
            type_def_id: 0,
            name: 3,
            namespace: 0,
            implementation: CodedIndex::new(TableId::File, 2),
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // implementation: (2 << 2) | 0 = 0x08
        assert_eq!(
            buffer,
            &[
                0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00
            ]
        );
    }
}
