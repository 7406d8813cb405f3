//! Rows of the core type-system tables: `Module`, `TypeRef`, `TypeDef`,
//! `Field`, `MethodDef`, `Param` and their `*Ptr` indirections.

use crate::{
    file::io::write_le,
    metadata::tables::{
        rows::{write_blob_index, write_coded_index, write_guid_index, write_str_index,
               write_table_index},
        CodedIndex, CodedIndexType, RowWritable, TableId, TableSizes,
    },
    Result,
};

/// One row of the `Module` table (0x00): the module's name, MVID and
/// edit-and-continue generation info.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRow {
    /// EnC generation; 0 for a freshly built module
    pub generation: u16,
    /// `#Strings` index of the module name
    pub name: u32,
    /// `#GUID` index of the module version identifier
    pub mvid: u32,
    /// `#GUID` index of the EnC id, 0 when absent
    pub enc_id: u32,
    /// `#GUID` index of the EnC base id, 0 when absent
    pub enc_base_id: u32,
}

impl RowWritable for ModuleRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* generation */  2 +
            /* name */        sizes.str_bytes() +
            /* mvid */        sizes.guid_bytes() +
            /* enc_id */      sizes.guid_bytes() +
            /* enc_base_id */ sizes.guid_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.generation);
        write_str_index(buffer, self.name, sizes)?;
        write_guid_index(buffer, self.mvid, sizes)?;
        write_guid_index(buffer, self.enc_id, sizes)?;
        write_guid_index(buffer, self.enc_base_id, sizes)?;
        Ok(())
    }
}

/// One row of the `TypeRef` table (0x01).
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRefRow {
    /// `ResolutionScope` coded index of the scope the type lives in
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the type name
    pub name: u32,
    /// `#Strings` index of the namespace, 0 for the empty namespace
    pub namespace: u32,
}

impl RowWritable for TypeRefRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* resolution_scope */ sizes.coded_index_bytes(CodedIndexType::ResolutionScope) +
            /* name */             sizes.str_bytes() +
            /* namespace */        sizes.str_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_coded_index(
            buffer,
            &self.resolution_scope,
            CodedIndexType::ResolutionScope,
            sizes,
        )?;
        write_str_index(buffer, self.name, sizes)?;
        write_str_index(buffer, self.namespace, sizes)?;
        Ok(())
    }
}

/// One row of the `TypeDef` table (0x02).
///
/// `field_list` and `method_list` are the 1-based start indices of this
/// type's contiguous member runs; the run ends where the next type's run
/// begins (or at the end of the member table).
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDefRow {
    /// Type attributes bitmask, copied verbatim from the source object
    pub flags: u32,
    /// `#Strings` index of the type name
    pub name: u32,
    /// `#Strings` index of the namespace, 0 for the empty namespace
    pub namespace: u32,
    /// `TypeDefOrRef` coded index of the base type, null for interfaces and
    /// `<Module>`
    pub extends: CodedIndex,
    /// First RID of this type's fields in the `Field` table
    pub field_list: u32,
    /// First RID of this type's methods in the `MethodDef` table
    pub method_list: u32,
}

impl RowWritable for TypeDefRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* flags */       4 +
            /* name */        sizes.str_bytes() +
            /* namespace */   sizes.str_bytes() +
            /* extends */     sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef) +
            /* field_list */  sizes.table_index_bytes(TableId::Field) +
            /* method_list */ sizes.table_index_bytes(TableId::MethodDef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.flags);
        write_str_index(buffer, self.name, sizes)?;
        write_str_index(buffer, self.namespace, sizes)?;
        write_coded_index(buffer, &self.extends, CodedIndexType::TypeDefOrRef, sizes)?;
        write_table_index(buffer, self.field_list, TableId::Field, sizes)?;
        write_table_index(buffer, self.method_list, TableId::MethodDef, sizes)?;
        Ok(())
    }
}

/// One row of the `FieldPtr` indirection table (0x03).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPtrRow {
    /// RID into the `Field` table
    pub field: u32,
}

impl RowWritable for FieldPtrRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Field))
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.field, TableId::Field, sizes)
    }
}

/// One row of the `Field` table (0x04).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRow {
    /// Field attributes bitmask
    pub flags: u16,
    /// `#Strings` index of the field name
    pub name: u32,
    /// `#Blob` index of the field signature
    pub signature: u32,
}

impl RowWritable for FieldRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* flags */     2 +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.flags);
        write_str_index(buffer, self.name, sizes)?;
        write_blob_index(buffer, self.signature, sizes)?;
        Ok(())
    }
}

/// One row of the `MethodPtr` indirection table (0x05).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodPtrRow {
    /// RID into the `MethodDef` table
    pub method: u32,
}

impl RowWritable for MethodPtrRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::MethodDef))
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.method, TableId::MethodDef, sizes)
    }
}

/// One row of the `MethodDef` table (0x06).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDefRow {
    /// Offset of the serialized body within the produced code segment, 0 for
    /// abstract, runtime and P/Invoke methods
    pub rva: u32,
    /// Method implementation attributes bitmask
    pub impl_flags: u16,
    /// Method attributes bitmask
    pub flags: u16,
    /// `#Strings` index of the method name
    pub name: u32,
    /// `#Blob` index of the method signature
    pub signature: u32,
    /// First RID of this method's parameters in the `Param` table
    pub param_list: u32,
}

impl RowWritable for MethodDefRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* rva */        4 +
            /* impl_flags */ 2 +
            /* flags */      2 +
            /* name */       sizes.str_bytes() +
            /* signature */  sizes.blob_bytes() +
            /* param_list */ sizes.table_index_bytes(TableId::Param),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.rva);
        write_le(buffer, self.impl_flags);
        write_le(buffer, self.flags);
        write_str_index(buffer, self.name, sizes)?;
        write_blob_index(buffer, self.signature, sizes)?;
        write_table_index(buffer, self.param_list, TableId::Param, sizes)?;
        Ok(())
    }
}

/// One row of the `ParamPtr` indirection table (0x07).
#[derive(Clone, Debug, PartialEq)]
pub struct ParamPtrRow {
    /// RID into the `Param` table
    pub param: u32,
}

impl RowWritable for ParamPtrRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Param))
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.param, TableId::Param, sizes)
    }
}

/// One row of the `Param` table (0x08).
#[derive(Clone, Debug, PartialEq)]
pub struct ParamRow {
    /// Parameter attributes bitmask
    pub flags: u16,
    /// 1-based parameter position; 0 names the return value
    pub sequence: u16,
    /// `#Strings` index of the parameter name, 0 when unnamed
    pub name: u32,
}

impl RowWritable for ParamRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* flags */    2 +
            /* sequence */ 2 +
            /* name */     sizes.str_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.flags);
        write_le(buffer, self.sequence);
        write_str_index(buffer, self.name, sizes)?;
        Ok(())
    }
}

/// One row of the `InterfaceImpl` table (0x09).
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceImplRow {
    /// RID of the implementing type in `TypeDef`
    pub class: u32,
    /// `TypeDefOrRef` coded index of the implemented interface
    pub interface: CodedIndex,
}

impl RowWritable for InterfaceImplRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* class */     sizes.table_index_bytes(TableId::TypeDef) +
            /* interface */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.class, TableId::TypeDef, sizes)?;
        write_coded_index(buffer, &self.interface, CodedIndexType::TypeDefOrRef, sizes)?;
        Ok(())
    }
}

/// One row of the `MemberRef` table (0x0A).
#[derive(Clone, Debug, PartialEq)]
pub struct MemberRefRow {
    /// `MemberRefParent` coded index of the declaring scope
    pub class: CodedIndex,
    /// `#Strings` index of the member name
    pub name: u32,
    /// `#Blob` index of the member signature
    pub signature: u32,
}

impl RowWritable for MemberRefRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* class */     sizes.coded_index_bytes(CodedIndexType::MemberRefParent) +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes(),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_coded_index(buffer, &self.class, CodedIndexType::MemberRefParent, sizes)?;
        write_str_index(buffer, self.name, sizes)?;
        write_blob_index(buffer, self.signature, sizes)?;
        Ok(())
    }
}

/// One row of the `StandAloneSig` table (0x11).
#[derive(Clone, Debug, PartialEq)]
pub struct StandAloneSigRow {
    /// `#Blob` index of the signature
    pub signature: u32,
}

impl RowWritable for StandAloneSigRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.blob_bytes())
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_blob_index(buffer, self.signature, sizes)
    }
}

/// One row of the `ModuleRef` table (0x1A).
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRefRow {
    /// `#Strings` index of the referenced module name
    pub name: u32,
}

impl RowWritable for ModuleRefRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.str_bytes())
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_str_index(buffer, self.name, sizes)
    }
}

/// One row of the `TypeSpec` table (0x1B).
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpecRow {
    /// `#Blob` index of the type signature
    pub signature: u32,
}

impl RowWritable for TypeSpecRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.blob_bytes())
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_blob_index(buffer, self.signature, sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_row_short() {
        let sizes = TableSizes::new_test(&[(TableId::Module, 1)], false, false, false);
        assert_eq!(ModuleRow::row_size(&sizes), 2 + 2 + 2 + 2 + 2);

        let row = ModuleRow {
            generation: 0,
            name: 0x0101,
            mvid: 1,
            enc_id: 0,
            enc_base_id: 0,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(
            buffer,
            &[0x00, 0x00, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn module_row_long() {
        let sizes = TableSizes::new_test(&[(TableId::Module, 1)], true, true, true);
        assert_eq!(ModuleRow::row_size(&sizes), 2 + 4 + 4 + 4 + 4);
    }

    #[test]
    fn typedef_row_short() {
        let sizes = TableSizes::new_test(
            &[(TableId::TypeDef, 2), (TableId::Field, 1), (TableId::MethodDef, 1)],
            false,
            false,
            false,
        );
        assert_eq!(TypeDefRow::row_size(&sizes), 4 + 2 + 2 + 2 + 2 + 2);

        let row = TypeDefRow {
            flags: 0x0010_0001,
            name: 2,
            namespace: 8,
            extends: CodedIndex::new(TableId::TypeRef, 1),
            field_list: 1,
            method_list: 1,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(
            buffer,
            &[
                0x01, 0x00, 0x10, 0x00, // flags
                0x02, 0x00, // name
                0x08, 0x00, // namespace
                0x05, 0x00, // extends: (1 << 2) | 1
                0x01, 0x00, // field_list
                0x01, 0x00, // method_list
            ]
        );
    }

    #[test]
    fn typedef_row_wide_member_lists() {
        let sizes = TableSizes::new_test(
            &[(TableId::Field, 0x10000), (TableId::MethodDef, 5)],
            false,
            false,
            false,
        );
        // field_list widens to 4, method_list stays at 2
        assert_eq!(TypeDefRow::row_size(&sizes), 4 + 2 + 2 + 2 + 4 + 2);
    }

    #[test]
    fn interface_impl_row() {
        let sizes = TableSizes::new_test(&[(TableId::TypeDef, 3)], false, false, false);
        let row = InterfaceImplRow {
            class: 2,
            interface: CodedIndex::new(TableId::TypeSpec, 0x20),
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(buffer, &[0x02, 0x00, 0x82, 0x00]);
    }

    #[test]
    fn member_ref_row() {
        let sizes = TableSizes::new_test(&[(TableId::MemberRef, 1)], false, false, false);
        let row = MemberRefRow {
            class: CodedIndex::new(TableId::TypeRef, 2),
            name: 5,
            signature: 7,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // class: (2 << 3) | 1 = 0x11
        assert_eq!(buffer, &[0x11, 0x00, 0x05, 0x00, 0x07, 0x00]);
    }

    #[test]
    fn param_row() {
        let sizes = TableSizes::new_test(&[], false, false, false);
        let row = ParamRow {
            flags: 0x0001,
            sequence: 2,
            name: 3,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(buffer, &[0x01, 0x00, 0x02, 0x00, 0x03, 0x00]);
    }
}
