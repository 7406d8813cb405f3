//! Tagged union over all serialized row shapes.
//!
//! The tables buffer holds one typed vector per table; [`TableData`] is the
//! variant carried in those vectors, dispatching size and write calls to the
//! concrete row type.

use crate::{
    metadata::tables::{
        rows::{
            AssemblyOsRow, AssemblyProcessorRow, AssemblyRefOsRow, AssemblyRefProcessorRow,
            AssemblyRefRow, AssemblyRow, ClassLayoutRow, ConstantRow, CustomAttributeRow,
            DeclSecurityRow, EventMapRow, EventPtrRow, EventRow, ExportedTypeRow, FieldLayoutRow,
            FieldMarshalRow, FieldPtrRow, FieldRow, FieldRvaRow, FileRow, GenericParamConstraintRow,
            GenericParamRow, ImplMapRow, InterfaceImplRow, ManifestResourceRow, MemberRefRow,
            MethodDefRow, MethodImplRow, MethodPtrRow, MethodSemanticsRow, MethodSpecRow,
            ModuleRefRow, ModuleRow, NestedClassRow, ParamPtrRow, ParamRow, PropertyMapRow,
            PropertyPtrRow, PropertyRow, RowWritable, StandAloneSigRow, TypeDefRow, TypeRefRow,
            TypeSpecRow,
        },
        CodedIndexType, TableId, TableSizes,
    },
    Result,
};

/// Tables whose serialized form must be sorted, in the order required by
/// ECMA-335 §II.22. The sort is applied once, at directory creation time.
pub const SORTED_TABLES: &[TableId] = &[
    TableId::InterfaceImpl,
    TableId::Constant,
    TableId::CustomAttribute,
    TableId::FieldMarshal,
    TableId::DeclSecurity,
    TableId::ClassLayout,
    TableId::FieldLayout,
    TableId::MethodSemantics,
    TableId::MethodImpl,
    TableId::ImplMap,
    TableId::FieldRva,
    TableId::NestedClass,
    TableId::GenericParam,
    TableId::GenericParamConstraint,
];

macro_rules! table_data {
    ($( $variant:ident => $row:ty ),+ $(,)?) => {
        /// One metadata table row, tagged with its table.
        #[derive(Clone, Debug, PartialEq)]
        pub enum TableData {
            $(
                #[allow(missing_docs)]
                $variant($row),
            )+
        }

        impl TableData {
            /// The table this row belongs to.
            #[must_use]
            pub fn table_id(&self) -> TableId {
                match self {
                    $( TableData::$variant(_) => TableId::$variant, )+
                }
            }

            /// Appends the serialized row to `buffer` with the widths in `sizes`.
            pub fn write(&self, buffer: &mut Vec<u8>, sizes: &TableSizes) -> Result<()> {
                match self {
                    $( TableData::$variant(row) => row.row_write(buffer, sizes), )+
                }
            }
        }

        /// Serialized size of one row of `table` under the given widths.
        #[must_use]
        pub fn row_size_of(table: TableId, sizes: &TableSizes) -> u32 {
            match table {
                $( TableId::$variant => <$row>::row_size(sizes), )+
            }
        }
    };
}

table_data! {
    Module => ModuleRow,
    TypeRef => TypeRefRow,
    TypeDef => TypeDefRow,
    FieldPtr => FieldPtrRow,
    Field => FieldRow,
    MethodPtr => MethodPtrRow,
    MethodDef => MethodDefRow,
    ParamPtr => ParamPtrRow,
    Param => ParamRow,
    InterfaceImpl => InterfaceImplRow,
    MemberRef => MemberRefRow,
    Constant => ConstantRow,
    CustomAttribute => CustomAttributeRow,
    FieldMarshal => FieldMarshalRow,
    DeclSecurity => DeclSecurityRow,
    ClassLayout => ClassLayoutRow,
    FieldLayout => FieldLayoutRow,
    StandAloneSig => StandAloneSigRow,
    EventMap => EventMapRow,
    EventPtr => EventPtrRow,
    Event => EventRow,
    PropertyMap => PropertyMapRow,
    PropertyPtr => PropertyPtrRow,
    Property => PropertyRow,
    MethodSemantics => MethodSemanticsRow,
    MethodImpl => MethodImplRow,
    ModuleRef => ModuleRefRow,
    TypeSpec => TypeSpecRow,
    ImplMap => ImplMapRow,
    FieldRva => FieldRvaRow,
    Assembly => AssemblyRow,
    AssemblyProcessor => AssemblyProcessorRow,
    AssemblyOs => AssemblyOsRow,
    AssemblyRef => AssemblyRefRow,
    AssemblyRefProcessor => AssemblyRefProcessorRow,
    AssemblyRefOs => AssemblyRefOsRow,
    File => FileRow,
    ExportedType => ExportedTypeRow,
    ManifestResource => ManifestResourceRow,
    NestedClass => NestedClassRow,
    GenericParam => GenericParamRow,
    MethodSpec => MethodSpecRow,
    GenericParamConstraint => GenericParamConstraintRow,
}

impl TableData {
    /// The ECMA sort key of this row, or `None` for tables that keep
    /// insertion order.
    ///
    /// Keys are pairs ordered lexicographically: the primary owner RID or
    /// coded-index numeric value, then a secondary component (only
    /// `InterfaceImpl` and `GenericParam` use one).
    pub fn sort_key(&self) -> Result<Option<(u64, u64)>> {
        let key = match self {
            TableData::InterfaceImpl(row) => Some((
                u64::from(row.class),
                u64::from(row.interface.value(CodedIndexType::TypeDefOrRef)?),
            )),
            TableData::Constant(row) => {
                Some((u64::from(row.parent.value(CodedIndexType::HasConstant)?), 0))
            }
            TableData::CustomAttribute(row) => Some((
                u64::from(row.parent.value(CodedIndexType::HasCustomAttribute)?),
                0,
            )),
            TableData::FieldMarshal(row) => Some((
                u64::from(row.parent.value(CodedIndexType::HasFieldMarshal)?),
                0,
            )),
            TableData::DeclSecurity(row) => Some((
                u64::from(row.parent.value(CodedIndexType::HasDeclSecurity)?),
                0,
            )),
            TableData::ClassLayout(row) => Some((u64::from(row.parent), 0)),
            TableData::FieldLayout(row) => Some((u64::from(row.field), 0)),
            TableData::MethodSemantics(row) => Some((
                u64::from(row.association.value(CodedIndexType::HasSemantics)?),
                0,
            )),
            TableData::MethodImpl(row) => Some((u64::from(row.class), 0)),
            TableData::ImplMap(row) => Some((
                u64::from(row.member_forwarded.value(CodedIndexType::MemberForwarded)?),
                0,
            )),
            TableData::FieldRva(row) => Some((u64::from(row.field), 0)),
            TableData::NestedClass(row) => Some((u64::from(row.nested_class), 0)),
            TableData::GenericParam(row) => Some((
                u64::from(row.owner.value(CodedIndexType::TypeOrMethodDef)?),
                u64::from(row.number),
            )),
            TableData::GenericParamConstraint(row) => Some((u64::from(row.owner), 0)),
            _ => None,
        };

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::CodedIndex;

    #[test]
    fn table_id_dispatch() {
        let row = TableData::Param(ParamRow {
            flags: 0,
            sequence: 1,
            name: 0,
        });
        assert_eq!(row.table_id(), TableId::Param);

        let row = TableData::GenericParamConstraint(GenericParamConstraintRow {
            owner: 1,
            constraint: CodedIndex::null(),
        });
        assert_eq!(row.table_id(), TableId::GenericParamConstraint);
    }

    #[test]
    fn row_size_dispatch_matches_rows() {
        let sizes = TableSizes::new_test(&[(TableId::TypeDef, 4)], false, false, false);
        assert_eq!(row_size_of(TableId::TypeDef, &sizes), TypeDefRow::row_size(&sizes));
        assert_eq!(row_size_of(TableId::Module, &sizes), ModuleRow::row_size(&sizes));
        assert_eq!(
            row_size_of(TableId::AssemblyOs, &sizes),
            AssemblyOsRow::row_size(&sizes)
        );
    }

    #[test]
    fn sort_keys() {
        let row = TableData::GenericParam(GenericParamRow {
            number: 1,
            flags: 0,
            owner: CodedIndex::new(TableId::TypeDef, 2),
            name: 0,
        });
        // owner coded: (2 << 1) | 0 = 4
        assert_eq!(row.sort_key().unwrap(), Some((4, 1)));

        let row = TableData::TypeRef(TypeRefRow {
            resolution_scope: CodedIndex::null(),
            name: 0,
            namespace: 0,
        });
        assert_eq!(row.sort_key().unwrap(), None);
    }

    #[test]
    fn sorted_tables_have_sort_keys() {
        // Every table in SORTED_TABLES must produce a key; spot-check via the
        // bitmask construction sites relying on it.
        assert_eq!(SORTED_TABLES.len(), 14);
        assert!(SORTED_TABLES.contains(&TableId::CustomAttribute));
        assert!(SORTED_TABLES.contains(&TableId::GenericParam));
    }
}
