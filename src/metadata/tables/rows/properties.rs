//! Rows of the layout, property and event tables.

use crate::{
    file::io::write_le,
    metadata::tables::{
        rows::{write_blob_index, write_coded_index, write_str_index, write_table_index},
        CodedIndex, CodedIndexType, RowWritable, TableId, TableSizes,
    },
    Result,
};

/// One row of the `ClassLayout` table (0x0F).
#[derive(Clone, Debug, PartialEq)]
pub struct ClassLayoutRow {
    /// Field packing alignment in bytes; 0 for the platform default
    pub packing_size: u16,
    /// Explicit total size of the type in bytes; 0 when unconstrained
    pub class_size: u32,
    /// RID of the laid-out type in `TypeDef`
    pub parent: u32,
}

impl RowWritable for ClassLayoutRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* packing_size */ 2 +
            /* class_size */   4 +
            /* parent */       sizes.table_index_bytes(TableId::TypeDef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.packing_size);
        write_le(buffer, self.class_size);
        write_table_index(buffer, self.parent, TableId::TypeDef, sizes)?;
        Ok(())
    }
}

/// One row of the `FieldLayout` table (0x10).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayoutRow {
    /// Byte offset of the field within its explicit-layout type
    pub offset: u32,
    /// RID of the field in `Field`
    pub field: u32,
}

impl RowWritable for FieldLayoutRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* offset */ 4 +
            /* field */  sizes.table_index_bytes(TableId::Field),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.offset);
        write_table_index(buffer, self.field, TableId::Field, sizes)?;
        Ok(())
    }
}

/// One row of the `EventMap` table (0x12).
#[derive(Clone, Debug, PartialEq)]
pub struct EventMapRow {
    /// RID of the declaring type in `TypeDef`
    pub parent: u32,
    /// First RID of the type's events in the `Event` table
    pub event_list: u32,
}

impl RowWritable for EventMapRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* parent */     sizes.table_index_bytes(TableId::TypeDef) +
            /* event_list */ sizes.table_index_bytes(TableId::Event),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.parent, TableId::TypeDef, sizes)?;
        write_table_index(buffer, self.event_list, TableId::Event, sizes)?;
        Ok(())
    }
}

/// One row of the `EventPtr` indirection table (0x13).
#[derive(Clone, Debug, PartialEq)]
pub struct EventPtrRow {
    /// RID into the `Event` table
    pub event: u32,
}

impl RowWritable for EventPtrRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Event))
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.event, TableId::Event, sizes)
    }
}

/// One row of the `Event` table (0x14).
#[derive(Clone, Debug, PartialEq)]
pub struct EventRow {
    /// Event attributes bitmask
    pub flags: u16,
    /// `#Strings` index of the event name
    pub name: u32,
    /// `TypeDefOrRef` coded index of the delegate type
    pub event_type: CodedIndex,
}

impl RowWritable for EventRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* flags */      2 +
            /* name */       sizes.str_bytes() +
            /* event_type */ sizes.coded_index_bytes(CodedIndexType::TypeDefOrRef),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_le(buffer, self.flags);
        write_str_index(buffer, self.name, sizes)?;
        write_coded_index(buffer, &self.event_type, CodedIndexType::TypeDefOrRef, sizes)?;
        Ok(())
    }
}

/// One row of the `PropertyMap` table (0x15).
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyMapRow {
    /// RID of the declaring type in `TypeDef`
    pub parent: u32,
    /// First RID of the type's properties in the `Property` table
    pub property_list: u32,
}

impl RowWritable for PropertyMapRow {
    #[rustfmt::skip]
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(
            /* parent */        sizes.table_index_bytes(TableId::TypeDef) +
            /* property_list */ sizes.table_index_bytes(TableId::Property),
        )
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.parent, TableId::TypeDef, sizes)?;
        write_table_index(buffer, self.property_list, TableId::Property, sizes)?;
        Ok(())
    }
}

/// One row of the `PropertyPtr` indirection table (0x16).
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyPtrRow {
    /// RID into the `Property` table
    pub property: u32,
}

impl RowWritable for PropertyPtrRow {
    fn row_size(sizes: &TableSizes) -> u32 {
        u32::from(sizes.table_index_bytes(TableId::Property))
    }

    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
        write_table_index(buffer, self.property, TableId::Property, sizes)
    }
}

/// One row of the `Property` table (0x17).
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRow {
    /// Property attributes bitmask
    pub flags: u16,
    /// `#Strings` index of the property name
    pub name: u32,
    /// `#Blob` index of the property signature
    pub signature: u32,
}

impl RowWritable for PropertyRow {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_layout_row() {
        let sizes = TableSizes::new_test(&[(TableId::TypeDef, 2)], false, false, false);
        let row = ClassLayoutRow {
            packing_size: 8,
            class_size: 0x40,
            parent: 2,
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        assert_eq!(buffer, &[0x08, 0x00, 0x40, 0x00, 0x00, 0x00, 0x02, 0x00]);
        assert_eq!(ClassLayoutRow::row_size(&sizes), buffer.len() as u32);
    }

    #[test]
    fn event_row() {
        let sizes = TableSizes::new_test(&[(TableId::Event, 1)], false, false, false);
        let row = EventRow {
            flags: 0,
            name: 4,
            event_type: CodedIndex::new(TableId::TypeRef, 3),
        };

        let mut buffer = Vec::new();
        row.row_write(&mut buffer, &sizes).unwrap();
        // event_type: (3 << 2) | 1 = 0x0D
        assert_eq!(buffer, &[0x00, 0x00, 0x04, 0x00, 0x0D, 0x00]);
    }

    #[test]
    fn maps_reference_their_member_tables() {
        let sizes = TableSizes::new_test(
            &[(TableId::TypeDef, 1), (TableId::Property, 0x10000)],
            false,
            false,
            false,
        );
        // property_list widens with the Property table
        assert_eq!(PropertyMapRow::row_size(&sizes), 2 + 4);
        assert_eq!(EventMapRow::row_size(&sizes), 2 + 2);
    }
}
