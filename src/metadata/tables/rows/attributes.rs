//! Rows of the annotation tables: `Constant`, `CustomAttribute`,
//! `FieldMarshal` and `DeclSecurity`. All four are parent-sorted.

use crate::{
    file::io::write_le,
    metadata::tables::{
        rows::{write_blob_index, write_coded_index},
        CodedIndex, CodedIndexType, RowWritable, TableSizes,
    },
    Result,
};

/// One row of the `Constant` table (0x0B).
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantRow {
    /// Element type of the constant value (ECMA §II.23.1.16)
    pub base_type: u8,
    /// `HasConstant` coded index of the owning field, parameter or property
    pub parent: CodedIndex,
    /// `#Blob` index of the constant value bytes
    pub value: u32,
}

impl RowWritable for ConstantRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* base_type + padding */ 2 +
            /* parent */              sizes.coded_index_bytes(CodedIndexType::HasConstant) +
            /* value */               sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.base_type);
        write_le(buffer, 0_u8); // reserved padding byte
        write_coded_index(buffer, &self.parent, CodedIndexType::HasConstant, sizes)?;
        write_blob_index(buffer, self.value, sizes)?;
        Ok(())
    }
}

/// One row of the `CustomAttribute` table (0x0C).
#[derive(Clone, Debug, PartialEq)]
pub struct CustomAttributeRow {
    /// `HasCustomAttribute` coded index of the annotated element
    pub parent: CodedIndex,
    /// `CustomAttributeType` coded index of the attribute constructor
    pub constructor: CodedIndex,
    /// `#Blob` index of the attribute value
    pub value: u32,
}

impl RowWritable for CustomAttributeRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* parent */      sizes.coded_index_bytes(CodedIndexType::HasCustomAttribute) +
            /* constructor */ sizes.coded_index_bytes(CodedIndexType::CustomAttributeType) +
            /* value */       sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_coded_index(buffer, &self.parent, CodedIndexType::HasCustomAttribute, sizes)?;
        write_coded_index(
            buffer,
            &self.constructor,
            CodedIndexType::CustomAttributeType,
            sizes,
        )?;
        write_blob_index(buffer, self.value, sizes)?;
        Ok(())
    }
}

/// One row of the `FieldMarshal` table (0x0D).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMarshalRow {
    /// `HasFieldMarshal` coded index of the marshalled field or parameter
    pub parent: CodedIndex,
    /// `#Blob` index of the marshalling descriptor
    pub native_type: u32,
}

impl RowWritable for FieldMarshalRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* parent */      sizes.coded_index_bytes(CodedIndexType::HasFieldMarshal) +
            /* native_type */ sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_coded_index(buffer, &self.parent, CodedIndexType::HasFieldMarshal, sizes)?;
        write_blob_index(buffer, self.native_type, sizes)?;
        Ok(())
    }
}

/// One row of the `DeclSecurity` table (0x0E).
#[derive(Clone, Debug, PartialEq)]
pub struct DeclSecurityRow {
    /// Security action code
    pub action: u16,
    /// `HasDeclSecurity` coded index of the protected element
    pub parent: CodedIndex,
    /// `#Blob` index of the permission set
    pub permission_set: u32,
}

impl RowWritable for DeclSecurityRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* action */         2 +
            /* parent */         sizes.coded_index_bytes(CodedIndexType::HasDeclSecurity) +
            /* permission_set */ sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.action);
        write_coded_index(buffer, &self.parent, CodedIndexType::HasDeclSecurity, sizes)?;
        write_blob_index(buffer, self.permission_set, sizes)?;
        Ok(())
    }
}
