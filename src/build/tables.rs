//! The tables buffer: typed row storage, RID assignment and deferred sorting.

use strum::IntoEnumIterator;

use crate::{
    file::io::write_le,
    metadata::{
        tables::{
            CodedIndexEncoder, CodedIndexType, TableData, TableId, TableSizes, SORTED_TABLES,
            TABLE_SLOTS,
        },
        token::Token,
    },
    Error, Result,
};

/// Largest row identifier a token can carry.
const MAX_RID: u32 = 0x00FF_FFFF;

/// Owns the row vectors of all metadata tables and assigns row identifiers.
///
/// Rows are appended in import order; a preferred RID (the member's original
/// token) is honored when the slot is free, growing the table with
/// placeholders if needed. Placeholder gaps must be filled before
/// serialization. Tables with an ECMA-mandated order keep insertion order
/// until [`TablesBuffer::sort_pending`] applies the final stable sort.
pub struct TablesBuffer {
    tables: Vec<Vec<Option<TableData>>>,
}

impl TablesBuffer {
    /// Creates an empty buffer with one row vector per table.
    #[must_use]
    pub fn new() -> Self {
        TablesBuffer {
            tables: (0..TABLE_SLOTS).map(|_| Vec::new()).collect(),
        }
    }

    /// Number of row slots (filled or placeholder) in a table.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        // table growth is capped at MAX_RID
        self.tables[table as usize].len() as u32
    }

    /// The RID the next appended row of `table` will receive.
    #[must_use]
    pub fn next_rid(&self, table: TableId) -> u32 {
        self.row_count(table) + 1
    }

    /// Row counts of all tables, indexed by table id.
    #[must_use]
    pub fn row_counts(&self) -> [u32; TABLE_SLOTS] {
        let mut counts = [0_u32; TABLE_SLOTS];
        for table in TableId::iter() {
            counts[table as usize] = self.row_count(table);
        }
        counts
    }

    /// A coded index encoder for `category`, scoped to the current row
    /// counts.
    #[must_use]
    pub fn index_encoder(&self, category: CodedIndexType) -> CodedIndexEncoder {
        let sizes = TableSizes::new(&self.row_counts(), 0, 0, 0);
        CodedIndexEncoder::new(category, &sizes)
    }

    /// Adds a row, honoring `preferred_rid` when possible.
    ///
    /// A preferred RID of 0, or one whose slot is already occupied, appends
    /// the row at the end instead. A preferred RID beyond the current table
    /// end grows the table with placeholders, which must all be filled
    /// before serialization.
    ///
    /// # Errors
    /// Returns [`crate::Error::IndexOverflow`] if the table would outgrow the
    /// 24-bit RID space.
    pub fn add(&mut self, row: TableData, preferred_rid: u32) -> Result<Token> {
        let table = row.table_id();
        if preferred_rid > MAX_RID {
            return Err(Error::IndexOverflow(format!(
                "preferred RID {preferred_rid} exceeds the 24-bit row space of table {table:?}"
            )));
        }

        let rows = &mut self.tables[table as usize];
        if preferred_rid != 0 {
            if preferred_rid as usize > rows.len() {
                rows.resize_with(preferred_rid as usize, || None);
                rows[preferred_rid as usize - 1] = Some(row);
                return Ok(Token::from_table(table, preferred_rid));
            }

            if rows[preferred_rid as usize - 1].is_none() {
                rows[preferred_rid as usize - 1] = Some(row);
                return Ok(Token::from_table(table, preferred_rid));
            }
            // occupied: fall through and append
        }

        if rows.len() as u32 >= MAX_RID {
            return Err(Error::IndexOverflow(format!(
                "table {table:?} exceeds the 24-bit row space"
            )));
        }

        rows.push(Some(row));
        Ok(Token::from_table(table, rows.len() as u32))
    }

    /// Like [`TablesBuffer::add`], but a conflicting preferred RID is an
    /// error instead of an append. Used for the single-row tables.
    pub fn add_unique(&mut self, row: TableData, preferred_rid: u32) -> Result<Token> {
        let table = row.table_id();
        if preferred_rid != 0
            && self.tables[table as usize]
                .get(preferred_rid as usize - 1)
                .is_some_and(Option::is_some)
        {
            return Err(Error::DuplicateRid {
                table,
                rid: preferred_rid,
            });
        }

        self.add(row, preferred_rid)
    }

    /// Replaces the row a token points at; used for backpatching rows whose
    /// fields are only known later in the walk (base types, member list
    /// bounds, body offsets).
    ///
    /// # Errors
    /// Returns an error if the token's table does not match the row or the
    /// slot does not exist.
    pub fn replace(&mut self, token: Token, row: TableData) -> Result<()> {
        let table = row.table_id();
        if token.table() != table.token_type() || token.is_null() {
            return Err(malformed_error!(
                "Token {} does not address table {:?}",
                token,
                table
            ));
        }

        let rows = &mut self.tables[table as usize];
        let Some(slot) = rows.get_mut(token.row() as usize - 1) else {
            return Err(Error::TokenNotFound(token));
        };

        *slot = Some(row);
        Ok(())
    }

    /// Read access to the row a token points at, if filled.
    #[must_use]
    pub fn get(&self, token: Token) -> Option<&TableData> {
        let table = TableId::from_token_type(token.table())?;
        self.tables[table as usize]
            .get(token.row().checked_sub(1)? as usize)?
            .as_ref()
    }

    /// Applies the deferred ECMA sorts.
    ///
    /// Rows were collected in insertion order; this produces the final
    /// serialized order with a stable sort per mandated table. Sorting
    /// `GenericParam`, `InterfaceImpl` and `DeclSecurity` renumbers rows
    /// that other columns reference, so the captured permutations are
    /// applied to `GenericParamConstraint` owners and `CustomAttribute`
    /// parents before those two tables are themselves sorted.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnfilledRow`] if a sorted table still has
    /// placeholder gaps, and propagates key computation failures.
    pub fn sort_pending(&mut self) -> Result<()> {
        let generic_params = self.sort_table(TableId::GenericParam)?;
        let interface_impls = self.sort_table(TableId::InterfaceImpl)?;
        let decl_security = self.sort_table(TableId::DeclSecurity)?;

        for table in [
            TableId::Constant,
            TableId::FieldMarshal,
            TableId::ClassLayout,
            TableId::FieldLayout,
            TableId::MethodSemantics,
            TableId::MethodImpl,
            TableId::ImplMap,
            TableId::FieldRva,
            TableId::NestedClass,
        ] {
            self.sort_table(table)?;
        }

        self.remap_constraint_owners(&generic_params);
        let constraints = self.sort_table(TableId::GenericParamConstraint)?;

        self.remap_attribute_parents(TableId::GenericParam, &generic_params);
        self.remap_attribute_parents(TableId::InterfaceImpl, &interface_impls);
        self.remap_attribute_parents(TableId::DeclSecurity, &decl_security);
        self.remap_attribute_parents(TableId::GenericParamConstraint, &constraints);
        self.sort_table(TableId::CustomAttribute)?;

        Ok(())
    }

    /// Stable-sorts one table by its key, returning the old-RID to new-RID
    /// permutation (indexed by `old_rid - 1`).
    fn sort_table(&mut self, table: TableId) -> Result<Vec<u32>> {
        let rows = std::mem::take(&mut self.tables[table as usize]);

        let mut decorated = Vec::with_capacity(rows.len());
        for (position, slot) in rows.into_iter().enumerate() {
            let Some(row) = slot else {
                return Err(Error::UnfilledRow {
                    table,
                    rid: position as u32 + 1,
                });
            };
            let Some(key) = row.sort_key()? else {
                return Err(malformed_error!("Table {:?} has no sort key", table));
            };
            decorated.push((key, position, row));
        }

        // ties keep insertion order
        decorated.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut permutation = vec![0_u32; decorated.len()];
        let mut sorted = Vec::with_capacity(decorated.len());
        for (new_position, (_, old_position, row)) in decorated.into_iter().enumerate() {
            permutation[old_position] = new_position as u32 + 1;
            sorted.push(Some(row));
        }

        self.tables[table as usize] = sorted;
        Ok(permutation)
    }

    fn remap_constraint_owners(&mut self, permutation: &[u32]) {
        if permutation.is_empty() {
            return;
        }

        for slot in &mut self.tables[TableId::GenericParamConstraint as usize] {
            if let Some(TableData::GenericParamConstraint(row)) = slot {
                if let Some(&new_rid) = permutation.get(row.owner as usize - 1) {
                    row.owner = new_rid;
                }
            }
        }
    }

    fn remap_attribute_parents(&mut self, table: TableId, permutation: &[u32]) {
        if permutation.is_empty() {
            return;
        }

        for slot in &mut self.tables[TableId::CustomAttribute as usize] {
            if let Some(TableData::CustomAttribute(row)) = slot {
                if row.parent.tag == table {
                    if let Some(&new_rid) = permutation.get(row.parent.row as usize - 1) {
                        row.parent.row = new_rid;
                    }
                }
            }
        }
    }

    /// Serializes the complete `#~` stream: header, row counts and rows.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnfilledRow`] for any remaining placeholder.
    pub fn serialize(&self, sizes: &TableSizes) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();

        write_le(&mut buffer, 0_u32); // reserved
        buffer.push(2); // major version
        buffer.push(0); // minor version
        buffer.push(sizes.heap_sizes());
        buffer.push(1); // reserved

        let mut valid = 0_u64;
        for table in TableId::iter() {
            if self.row_count(table) > 0 {
                valid |= 1 << (table as u64);
            }
        }

        let mut sorted = 0_u64;
        for table in SORTED_TABLES {
            sorted |= 1 << (*table as u64);
        }

        write_le(&mut buffer, valid);
        write_le(&mut buffer, sorted);

        for table in TableId::iter() {
            let count = self.row_count(table);
            if count > 0 {
                write_le(&mut buffer, count);
            }
        }

        for table in TableId::iter() {
            for (position, slot) in self.tables[table as usize].iter().enumerate() {
                let Some(row) = slot else {
                    return Err(Error::UnfilledRow {
                        table,
                        rid: position as u32 + 1,
                    });
                };
                row.write(&mut buffer, sizes)?;
            }
        }

        Ok(buffer)
    }
}

impl Default for TablesBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{
        CodedIndex, CustomAttributeRow, GenericParamConstraintRow, GenericParamRow, ModuleRow,
        ParamRow, TypeRefRow,
    };

    fn param_row(sequence: u16) -> TableData {
        TableData::Param(ParamRow {
            flags: 0,
            sequence,
            name: 0,
        })
    }

    #[test]
    fn sequential_rids() {
        let mut tables = TablesBuffer::new();
        let first = tables.add(param_row(1), 0).unwrap();
        let second = tables.add(param_row(2), 0).unwrap();

        assert_eq!(first.value(), 0x08000001);
        assert_eq!(second.value(), 0x08000002);
        assert_eq!(tables.next_rid(TableId::Param), 3);
    }

    #[test]
    fn preferred_rid_grows_with_placeholders() {
        let mut tables = TablesBuffer::new();
        let token = tables.add(param_row(1), 3).unwrap();
        assert_eq!(token.row(), 3);
        assert_eq!(tables.row_count(TableId::Param), 3);

        // serialization refuses the gaps
        let sizes = TableSizes::new(&tables.row_counts(), 0, 0, 0);
        assert!(matches!(
            tables.serialize(&sizes),
            Err(Error::UnfilledRow {
                table: TableId::Param,
                rid: 1
            })
        ));

        // filling them makes it serializable
        tables.add(param_row(2), 1).unwrap();
        tables.add(param_row(3), 2).unwrap();
        assert!(tables.serialize(&sizes).is_ok());
    }

    #[test]
    fn occupied_preferred_rid_appends() {
        let mut tables = TablesBuffer::new();
        tables.add(param_row(1), 1).unwrap();
        let token = tables.add(param_row(2), 1).unwrap();
        assert_eq!(token.row(), 2);
    }

    #[test]
    fn add_unique_rejects_conflicts() {
        let mut tables = TablesBuffer::new();
        let module = TableData::Module(ModuleRow {
            generation: 0,
            name: 1,
            mvid: 1,
            enc_id: 0,
            enc_base_id: 0,
        });
        tables.add_unique(module.clone(), 1).unwrap();

        assert!(matches!(
            tables.add_unique(module, 1),
            Err(Error::DuplicateRid {
                table: TableId::Module,
                rid: 1
            })
        ));
    }

    #[test]
    fn replace_backpatches() {
        let mut tables = TablesBuffer::new();
        let token = tables.add(param_row(1), 0).unwrap();
        tables.replace(token, param_row(9)).unwrap();

        match tables.get(token).unwrap() {
            TableData::Param(row) => assert_eq!(row.sequence, 9),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn generic_param_sort_remaps_constraints() {
        let mut tables = TablesBuffer::new();

        // Two owners inserted out of order: type 2 first, then type 1
        let gp_of_type2 = TableData::GenericParam(GenericParamRow {
            number: 0,
            flags: 0,
            owner: CodedIndex::new(TableId::TypeDef, 2),
            name: 0,
        });
        let gp_of_type1 = TableData::GenericParam(GenericParamRow {
            number: 0,
            flags: 0,
            owner: CodedIndex::new(TableId::TypeDef, 1),
            name: 0,
        });
        tables.add(gp_of_type2, 0).unwrap();
        tables.add(gp_of_type1, 0).unwrap();

        // Constraint points at the first-inserted row (old RID 1)
        tables
            .add(
                TableData::GenericParamConstraint(GenericParamConstraintRow {
                    owner: 1,
                    constraint: CodedIndex::new(TableId::TypeRef, 1),
                }),
                0,
            )
            .unwrap();

        tables.sort_pending().unwrap();

        // After sorting, type 1's parameter is RID 1 and the constraint
        // follows its owner to RID 2
        match tables
            .get(Token::from_table(TableId::GenericParam, 1))
            .unwrap()
        {
            TableData::GenericParam(row) => assert_eq!(row.owner.row, 1),
            _ => panic!("wrong variant"),
        }
        match tables
            .get(Token::from_table(TableId::GenericParamConstraint, 1))
            .unwrap()
        {
            TableData::GenericParamConstraint(row) => assert_eq!(row.owner, 2),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn custom_attributes_sort_by_parent_coded_value() {
        let mut tables = TablesBuffer::new();

        let on_assembly = TableData::CustomAttribute(CustomAttributeRow {
            parent: CodedIndex::new(TableId::Assembly, 1),
            constructor: CodedIndex::new(TableId::MemberRef, 1),
            value: 0,
        });
        let on_typedef = TableData::CustomAttribute(CustomAttributeRow {
            parent: CodedIndex::new(TableId::TypeDef, 1),
            constructor: CodedIndex::new(TableId::MemberRef, 1),
            value: 0,
        });
        tables.add(on_assembly, 0).unwrap();
        tables.add(on_typedef, 0).unwrap();

        tables.sort_pending().unwrap();

        // TypeDef parent codes lower ((1 << 5) | 3) than Assembly ((1 << 5) | 14)
        match tables
            .get(Token::from_table(TableId::CustomAttribute, 1))
            .unwrap()
        {
            TableData::CustomAttribute(row) => assert_eq!(row.parent.tag, TableId::TypeDef),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn serialized_header_layout() {
        let mut tables = TablesBuffer::new();
        tables
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
        tables
            .add(
                TableData::TypeRef(TypeRefRow {
                    resolution_scope: CodedIndex::null(),
                    name: 2,
                    namespace: 0,
                }),
                0,
            )
            .unwrap();

        let sizes = TableSizes::new(&tables.row_counts(), 0x20, 0x10, 0x20);
        let stream = tables.serialize(&sizes).unwrap();

        // reserved, versions, heap_sizes, reserved
        assert_eq!(&stream[0..4], &[0, 0, 0, 0]);
        assert_eq!(stream[4], 2);
        assert_eq!(stream[5], 0);
        assert_eq!(stream[6], 0); // all heaps narrow
        assert_eq!(stream[7], 1);

        // valid bitmap: Module | TypeRef
        let valid = u64::from_le_bytes(stream[8..16].try_into().unwrap());
        assert_eq!(valid, 0b11);

        // sorted bitmap covers the mandated tables whether or not present
        let sorted = u64::from_le_bytes(stream[16..24].try_into().unwrap());
        assert_ne!(sorted & (1 << 0x0C), 0); // CustomAttribute
        assert_ne!(sorted & (1 << 0x2A), 0); // GenericParam
        assert_eq!(sorted & 0b11, 0);

        // row counts: 1, 1
        assert_eq!(&stream[24..28], &[1, 0, 0, 0]);
        assert_eq!(&stream[28..32], &[1, 0, 0, 0]);

        // rows follow: Module (10 bytes narrow) then TypeRef (6 bytes)
        assert_eq!(stream.len(), 32 + 10 + 6);
    }

    #[test]
    fn index_encoder_is_scoped_to_row_counts() {
        let mut tables = TablesBuffer::new();
        tables.add(param_row(1), 0).unwrap();

        let encoder = tables.index_encoder(CodedIndexType::TypeDefOrRef);
        assert_eq!(encoder.bytes(), 2);
        assert_eq!(
            encoder.encode(Token::from_table(TableId::TypeRef, 1)).unwrap(),
            (1 << 2) | 1
        );
    }
}
