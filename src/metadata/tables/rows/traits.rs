use crate::{metadata::tables::TableSizes, Result};

/// Trait implemented by every metadata table row that can be serialized into
/// the tables stream.
///
/// Row serialization is width-polymorphic: string, GUID, blob, plain RID and
/// coded index columns occupy 2 or 4 bytes depending on the final heap sizes
/// and row counts, which are only known once the whole directory has been
/// populated. Implementations therefore receive the precomputed [`TableSizes`]
/// both when sizing and when writing.
pub trait RowWritable: Sized {
    /// Size in bytes of a single serialized row of this table.
    fn row_size(sizes: &TableSizes) -> u32;

    /// Appends the serialized row to `buffer`.
    ///
    /// ## Errors
    ///
    /// Returns [`crate::Error`] when a field value does not fit the column
    /// width computed for it, which indicates an internal inconsistency.
    fn row_write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()>;
}
