//! Rows of the method-relation and interop tables: `MethodSemantics`,
//! `MethodImpl`, `ImplMap`, `FieldRVA` and `NestedClass`.

use crate::{
    file::io::write_le,
    metadata::tables::{
        rows::{write_coded_index, write_str_index, write_table_index},
        CodedIndex, CodedIndexType, RowWritable, TableId, TableSizes,
    },
    Result,
};

/// Method semantics attribute values (ECMA §II.23.1.12).
#[allow(non_snake_case)]
pub mod MethodSemanticsAttributes {
    /// Property setter
    pub const SETTER: u16 = 0x0001;
    /// Property getter
    pub const GETTER: u16 = 0x0002;
    /// Other helper method of a property or event
    pub const OTHER: u16 = 0x0004;
    /// Event subscribe method
    pub const ADD_ON: u16 = 0x0008;
    /// Event unsubscribe method
    pub const REMOVE_ON: u16 = 0x0010;
    /// Event raise method
    pub const FIRE: u16 = 0x0020;
}

/// One row of the `MethodSemantics` table (0x18).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSemanticsRow {
    /// Role of the method ([`MethodSemanticsAttributes`])
    pub semantics: u16,
    /// RID of the accessor method in `MethodDef`
    pub method: u32,
    /// `HasSemantics` coded index of the owning property or event
    pub association: CodedIndex,
}

impl RowWritable for MethodSemanticsRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* semantics */   2 +
            /* method */      sizes.table_index_bytes(TableId::MethodDef) +
            /* association */ sizes.coded_index_bytes(CodedIndexType::HasSemantics),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.semantics);
        write_table_index(buffer, self.method, TableId::MethodDef, sizes)?;
        write_coded_index(buffer, &self.association, CodedIndexType::HasSemantics, sizes)?;
        Ok(())
    }
}

/// One row of the `MethodImpl` table (0x19).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodImplRow {
    /// RID of the type owning the override in `TypeDef`
    pub class: u32,
    /// `MethodDefOrRef` coded index of the implementing method
    pub method_body: CodedIndex,
    /// `MethodDefOrRef` coded index of the declaration being implemented
    pub method_declaration: CodedIndex,
}

impl RowWritable for MethodImplRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* class */              sizes.table_index_bytes(TableId::TypeDef) +
            /* method_body */        sizes.coded_index_bytes(CodedIndexType::MethodDefOrRef) +
            /* method_declaration */ sizes.coded_index_bytes(CodedIndexType::MethodDefOrRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.class, TableId::TypeDef, sizes)?;
        write_coded_index(buffer, &self.method_body, CodedIndexType::MethodDefOrRef, sizes)?;
        write_coded_index(
            buffer,
            &self.method_declaration,
            CodedIndexType::MethodDefOrRef,
            sizes,
        )?;
        Ok(())
    }
}

/// One row of the `ImplMap` table (0x1C), mapping a managed method onto an
/// unmanaged entry point.
#[derive(Clone, Debug, PartialEq)]
pub struct ImplMapRow {
    /// P/Invoke attributes bitmask
    pub mapping_flags: u16,
    /// `MemberForwarded` coded index of the forwarded method
    pub member_forwarded: CodedIndex,
    /// `#Strings` index of the unmanaged entry point name
    pub import_name: u32,
    /// RID of the target module in `ModuleRef`
    pub import_scope: u32,
}

impl RowWritable for ImplMapRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* mapping_flags */    2 +
            /* member_forwarded */ sizes.coded_index_bytes(CodedIndexType::MemberForwarded) +
            /* import_name */      sizes.str_bytes() +
            /* import_scope */     sizes.table_index_bytes(TableId::ModuleRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.mapping_flags);
        write_coded_index(
            buffer,
            &self.member_forwarded,
            CodedIndexType::MemberForwarded,
            sizes,
        )?;
        write_str_index(buffer, self.import_name, sizes)?;
        write_table_index(buffer, self.import_scope, TableId::ModuleRef, sizes)?;
        Ok(())
    }
}

/// One row of the `FieldRVA` table (0x1D).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRvaRow {
    /// Offset of the field's initial data within the produced data segment
    pub rva: u32,
    /// RID of the mapped field in `Field`
    pub field: u32,
}

impl RowWritable for FieldRvaRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* rva */   4 +
            /* field */ sizes.table_index_bytes(TableId::Field),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.rva);
        write_table_index(buffer, self.field, TableId::Field, sizes)?;
        Ok(())
    }
}

/// One row of the `NestedClass` table (0x29).
#[derive(Clone, Debug, PartialEq)]
pub struct NestedClassRow {
    /// RID of the nested type in `TypeDef`
    pub nested_class: u32,
    /// RID of the enclosing type in `TypeDef`
    pub enclosing_class: u32,
}

impl RowWritable for NestedClassRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* nested_class */    sizes.table_index_bytes(TableId::TypeDef) +
            /* enclosing_class */ sizes.table_index_bytes(TableId::TypeDef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.nested_class, TableId::TypeDef, sizes)?;
        write_table_index(buffer, self.enclosing_class, TableId::TypeDef, sizes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_semantics_row() {
        let sizes = TableSizes::new_test(
            &[(TableId::MethodDef, 4), (TableId::Property, 2)],
            false,
            false,
            false,
        );
        let row = MethodSemanticsRow {
            semantics: MethodSemanticsAttributes::GETTER,
            method: 3,
            association: CodedIndex::new(TableId::Property, 2),
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // association: (2 << 1) | 1 = 0x05
        assert_eq!(buffer, &[0x02, 0x00, 0x03, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn impl_map_row() {
        let sizes = TableSizes::new_test(
            &[(TableId::MethodDef, 2), (TableId::ModuleRef, 1)],
            false,
            false,
            false,
        );
        let row = ImplMapRow {
            mapping_flags: 0x0100,
            member_forwarded: CodedIndex::new(TableId::MethodDef, 2),
            import_name: 6,
            import_scope: 1,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // member_forwarded: (2 << 1) | 1 = 0x05
        assert_eq!(buffer, &[0x00, 0x01, 0x05, 0x00, 0x06, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn nested_class_row() {
        let sizes = TableSizes::new_test(&[(TableId::TypeDef, 5)], false, false, false);
        let row = NestedClassRow {
            nested_class: 4,
            enclosing_class: 2,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(buffer, &[0x04, 0x00, 0x02, 0x00]);
    }
}
