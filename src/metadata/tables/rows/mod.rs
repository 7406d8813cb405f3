//! Serialized row shapes for all metadata tables.
//!
//! Every struct in this module mirrors one table's row layout from ECMA-335
//! Partition II §22, with heap references already resolved to indices and
//! cross-table references resolved to RIDs or [`CodedIndex`] values. The
//! [`RowWritable`] implementations emit the binary form with the column
//! widths dictated by [`TableSizes`].

mod assembly;
mod attributes;
mod core;
mod generics;
mod properties;
mod semantics;
mod traits;

pub use assembly::*;
pub use attributes::*;
pub use core::*;
pub use generics::*;
pub use properties::*;
pub use semantics::*;
pub use traits::*;

use crate::{
    file::io::write_le_dyn,
    metadata::tables::{CodedIndex, CodedIndexType, TableId, TableSizes},
    Result,
};

/// Writes a `#Strings` index column.
pub(crate) fn write_str_index(buffer: &mut Vec<u8>, index: u32, sizes: &TableSizes) -> Result<()> {
    write_le_dyn(buffer, index, sizes.is_large_str())
}

/// Writes a `#GUID` index column.
pub(crate) fn write_guid_index(buffer: &mut Vec<u8>, index: u32, sizes: &TableSizes) -> Result<()> {
    write_le_dyn(buffer, index, sizes.is_large_guid())
}

/// Writes a `#Blob` index column.
pub(crate) fn write_blob_index(buffer: &mut Vec<u8>, index: u32, sizes: &TableSizes) -> Result<()> {
    write_le_dyn(buffer, index, sizes.is_large_blob())
}

/// Writes a plain RID column referencing `table`.
pub(crate) fn write_table_index(
    buffer: &mut Vec<u8>,
    rid: u32,
    table: TableId,
    sizes: &TableSizes,
) -> Result<()> {
    write_le_dyn(buffer, rid, sizes.is_large(table))
}

/// Writes a coded index column of the given category.
pub(crate) fn write_coded_index(
    buffer: &mut Vec<u8>,
    index: &CodedIndex,
    kind: CodedIndexType,
    sizes: &TableSizes,
) -> Result<()> {
    write_le_dyn(buffer, index.value(kind)?, sizes.coded_index_bytes(kind) == 4)
}
