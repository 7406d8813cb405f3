//! Rows of the generics tables: `GenericParam`, `MethodSpec` and
//! `GenericParamConstraint`.

use crate::{
    file::io::write_le,
    metadata::tables::{
        rows::{write_blob_index, write_coded_index, write_str_index, write_table_index},
        CodedIndex, CodedIndexType, RowWritable, TableId, TableSizes,
    },
    Result,
};

/// One row of the `GenericParam` table (0x2A). Sorted by owner, then number.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamRow {
    /// Zero-based position of the parameter in its owner's parameter list
    pub number: u16,
    /// Variance and special-constraint attributes bitmask
    pub flags: u16,
    /// `TypeOrMethodDef` coded index of the owning type or method
    pub owner: CodedIndex,
    /// `#Strings` index of the parameter name
    pub name: u32,
}

impl RowWritable for GenericParamRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* number */ 2 +
            /* flags */  2 +
            /* owner */  sizes.coded_index_bytes(CodedIndexType::TypeOrMethodDef) +
            /* name */   sizes.str_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.number);
        write_le(buffer, self.flags);
        write_coded_index(buffer, &self.owner, CodedIndexType::TypeOrMethodDef, sizes)?;
        write_str_index(buffer, self.name, sizes)?;
        Ok(())
    }
}

/// One row of the `MethodSpec` table (0x2B).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSpecRow {
    /// `MethodDefOrRef` coded index of the instantiated generic method
    pub method: CodedIndex,
    /// `#Blob` index of the instantiation signature
    pub instantiation: u32,
}

impl RowWritable for MethodSpecRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* method */        sizes.coded_index_bytes(CodedIndexType::MethodDefOrRef) +
            /* instantiation */ sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_coded_index(buffer, &self.method, CodedIndexType::MethodDefOrRef, sizes)?;
        write_blob_index(buffer, self.instantiation, sizes)?;
        Ok(())
    }
}

/// One row of the `GenericParamConstraint` table (0x2C). Sorted by owner.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericParamConstraintRow {
    /// RID of the constrained parameter in `GenericParam`
    pub owner: u32,
    /// `TypeDefOrRef` coded index of the constraint type
    pub constraint: CodedIndex,
}

impl RowWritable for GenericParamConstraintRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* owner */      sizes.table_index_bytes(TableId::GenericParam) +
            /* constraint */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.owner, TableId::GenericParam, sizes)?;
        write_coded_index(buffer, &self.constraint, CodedIndexType::TypeDefOrRef, sizes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_param_row() {
        let sizes = TableSizes::new_test(
            &[(TableId::TypeDef, 2), (TableId::GenericParam, 1)],
            false,
            false,
            false,
        );
        let row = GenericParamRow {
            number: 0,
            flags: 0,
            owner: CodedIndex::new(TableId::TypeDef, 2),
            name: 7,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // owner: (2 << 1) | 0 = 0x04
        assert_eq!(buffer, &[0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x07, 0x00]);
    }

    #[test]
    fn generic_param_constraint_row() {
        let sizes = TableSizes::new_test(&[(TableId::GenericParam, 1)], false, false, false);
        let row = GenericParamConstraintRow {
            owner: 1,
            constraint: CodedIndex::new(TableId::TypeRef, 2),
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // constraint: (2 << 2) | 1 = 0x09
        assert_eq!(buffer, &[0x01, 0x00, 0x09, 0x00]);
    }

    #[test]
    fn method_spec_row() {
        let sizes = TableSizes::new_test(&[(TableId::MethodDef, 1)], false, false, false);
        let row = MethodSpecRow {
            method: CodedIndex::new(TableId::MethodDef, 1),
            instantiation: 4,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // method: (1 << 1) | 0 = 0x02
        assert_eq!(buffer, &[0x02, 0x00, 0x04, 0x00]);
    }
}
