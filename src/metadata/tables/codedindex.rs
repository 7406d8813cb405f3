use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{tables::TableId, token::Token},
    Result,
};

/// The thirteen coded index categories of ECMA-335 §II.24.2.6.
///
/// A coded index packs a choice among several tables together with a row
/// identifier into one integer: `(rid << tag_bits) | tag`, where `tag` is the
/// position of the table in the category's member list and `tag_bits` is
/// `ceil(log2(member_count))`.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef`, `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param`, `Property`
    HasConstant,
    /// Nearly every metadata element that can carry a custom attribute
    HasCustomAttribute,
    /// `Field`, `Param`
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef`, `Assembly`
    HasDeclSecurity,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, `TypeSpec`
    MemberRefParent,
    /// `Event`, `Property`
    HasSemantics,
    /// `MethodDef`, `MemberRef`
    MethodDefOrRef,
    /// `Field`, `MethodDef`
    MemberForwarded,
    /// `File`, `AssemblyRef`, `ExportedType`
    Implementation,
    /// `MethodDef` (tag 2), `MemberRef` (tag 3); tags 0, 1 and 4 are unused
    CustomAttributeType,
    /// `Module`, `ModuleRef`, `AssemblyRef`, `TypeRef`
    ResolutionScope,
    /// `TypeDef`, `MethodDef`
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Ordered member tables of this category; `None` marks tag values the
    /// standard reserves but never uses.
    #[must_use]
    pub fn tables(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                // The standard labels this slot 'Permission'; the actual table is DeclSecurity
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Number of tag bits this category occupies: `ceil(log2(member_count))`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tag_bits(&self) -> u8 {
        let len = self.tables().len();
        debug_assert!(len > 1);
        // member lists are tiny, the bit count always fits a u8
        (usize::BITS - (len - 1).leading_zeros()) as u8
    }

    /// The tag value of `table` within this category.
    #[must_use]
    pub fn tag_of(&self, table: TableId) -> Option<u32> {
        self.tables()
            .iter()
            .position(|entry| *entry == Some(table))
            .and_then(|position| u32::try_from(position).ok())
    }

    /// Packs a token into this category's coded form.
    ///
    /// The null token encodes as 0.
    ///
    /// # Errors
    /// Returns an error if the token's table is not a member of the category
    /// or the shifted value no longer fits 32 bits.
    pub fn encode(&self, token: Token) -> Result<u32> {
        if token.is_null() {
            return Ok(0);
        }

        let Some(table) = TableId::from_token_type(token.table()) else {
            return Err(malformed_error!(
                "Token {} does not reference a metadata table",
                token
            ));
        };

        let Some(tag) = self.tag_of(table) else {
            return Err(malformed_error!(
                "Table {:?} is not a member of coded index category {:?}",
                table,
                self
            ));
        };

        let Some(shifted) = token.row().checked_shl(u32::from(self.tag_bits())) else {
            return Err(crate::Error::OutOfBounds);
        };

        Ok(shifted | tag)
    }

    /// Unpacks a coded value back into a token. The inverse of [`Self::encode`].
    ///
    /// # Errors
    /// Returns an error if the tag value is reserved or out of range for the
    /// category.
    pub fn decode(&self, value: u32) -> Result<Token> {
        if value == 0 {
            return Ok(Token::new(0));
        }

        let tables = self.tables();
        let tag_bits = self.tag_bits();
        let tag = (value & ((1 << tag_bits) - 1)) as usize;
        let rid = value >> tag_bits;

        match tables.get(tag) {
            Some(Some(table)) => Ok(Token::from_table(*table, rid)),
            _ => Err(malformed_error!(
                "Tag {} is not valid for coded index category {:?}",
                tag,
                self
            )),
        }
    }
}

/// A decoded coded-index value: a table choice plus a row in that table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodedIndex {
    /// The table this index refers to
    pub tag: TableId,
    /// The row in that table; 0 is the null reference
    pub row: u32,
}

impl CodedIndex {
    /// Create a new `CodedIndex`
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex { tag, row }
    }

    /// The null reference; encodes as 0 in every category.
    #[must_use]
    pub fn null() -> CodedIndex {
        CodedIndex {
            tag: TableId::Module,
            row: 0,
        }
    }

    /// Create a `CodedIndex` from a token.
    ///
    /// # Errors
    /// Returns an error if the token does not reference a metadata table.
    pub fn from_token(token: Token) -> Result<CodedIndex> {
        let Some(table) = TableId::from_token_type(token.table()) else {
            return Err(malformed_error!(
                "Token {} does not reference a metadata table",
                token
            ));
        };

        Ok(CodedIndex {
            tag: table,
            row: token.row(),
        })
    }

    /// The token equivalent of this index.
    #[must_use]
    pub fn token(&self) -> Token {
        Token::from_table(self.tag, self.row)
    }

    /// The packed numeric form within `category`, used both for emission and
    /// as the sort key of parent-ordered tables.
    ///
    /// # Errors
    /// Returns an error if this index's table is not a member of the category.
    pub fn value(&self, category: CodedIndexType) -> Result<u32> {
        if self.row == 0 {
            return Ok(0);
        }
        category.encode(self.token())
    }
}

/// A coded index encoder scoped to one category and a fixed set of row
/// counts, as handed out by the tables buffer.
///
/// The packed value itself is width-independent; the scope decides whether
/// the column it lands in takes 2 or 4 bytes.
pub struct CodedIndexEncoder {
    kind: CodedIndexType,
    wide: bool,
}

impl CodedIndexEncoder {
    /// Creates an encoder for `kind` with widths taken from `sizes`.
    #[must_use]
    pub fn new(kind: CodedIndexType, sizes: &crate::metadata::tables::TableSizes) -> Self {
        CodedIndexEncoder {
            kind,
            wide: sizes.coded_index_bytes(kind) == 4,
        }
    }

    /// The category this encoder serves.
    #[must_use]
    pub fn kind(&self) -> CodedIndexType {
        self.kind
    }

    /// Byte width of columns written with this encoder.
    #[must_use]
    pub fn bytes(&self) -> u8 {
        if self.wide {
            4
        } else {
            2
        }
    }

    /// Packs a token; see [`CodedIndexType::encode`].
    pub fn encode(&self, token: Token) -> Result<u32> {
        let value = self.kind.encode(token)?;
        if !self.wide && value > u32::from(u16::MAX) {
            return Err(crate::Error::OutOfBounds);
        }
        Ok(value)
    }

    /// Unpacks a value; see [`CodedIndexType::decode`].
    pub fn decode(&self, value: u32) -> Result<Token> {
        self.kind.decode(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn tag_bits_per_category() {
        assert_eq!(CodedIndexType::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasConstant.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedIndexType::HasFieldMarshal.tag_bits(), 1);
        assert_eq!(CodedIndexType::MemberRefParent.tag_bits(), 3);
        assert_eq!(CodedIndexType::MethodDefOrRef.tag_bits(), 1);
        assert_eq!(CodedIndexType::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedIndexType::ResolutionScope.tag_bits(), 2);
        assert_eq!(CodedIndexType::TypeOrMethodDef.tag_bits(), 1);
    }

    #[test]
    fn encode_type_def_or_ref() {
        let category = CodedIndexType::TypeDefOrRef;
        assert_eq!(category.encode(Token::new(0x02000001)).unwrap(), 1 << 2);
        assert_eq!(
            category.encode(Token::new(0x01000005)).unwrap(),
            (5 << 2) | 1
        );
        assert_eq!(
            category.encode(Token::new(0x1B000003)).unwrap(),
            (3 << 2) | 2
        );
    }

    #[test]
    fn encode_null_is_zero() {
        for category in CodedIndexType::iter() {
            assert_eq!(category.encode(Token::new(0)).unwrap(), 0);
            assert_eq!(category.decode(0).unwrap(), Token::new(0));
        }
    }

    #[test]
    fn encode_rejects_foreign_table() {
        // MethodDef is not a member of TypeDefOrRef
        assert!(CodedIndexType::TypeDefOrRef
            .encode(Token::new(0x06000001))
            .is_err());
    }

    #[test]
    fn custom_attribute_type_uses_canonical_tags() {
        let category = CodedIndexType::CustomAttributeType;
        assert_eq!(category.encode(Token::new(0x06000001)).unwrap(), (1 << 3) | 2);
        assert_eq!(category.encode(Token::new(0x0A000001)).unwrap(), (1 << 3) | 3);

        // Reserved tags decode to an error
        assert!(category.decode((1 << 3) | 0).is_err());
        assert!(category.decode((1 << 3) | 4).is_err());
    }

    #[test]
    fn round_trip_every_category() {
        for category in CodedIndexType::iter() {
            for (tag, entry) in category.tables().iter().enumerate() {
                let Some(table) = entry else { continue };
                for rid in [1_u32, 2, 0x1234, 0x00FF_FFFF] {
                    let token = Token::from_table(*table, rid);
                    let encoded = category.encode(token).unwrap();
                    assert_eq!(
                        encoded,
                        (rid << category.tag_bits()) | tag as u32,
                        "{category:?}/{table:?}"
                    );
                    assert_eq!(category.decode(encoded).unwrap(), token);
                }
            }
        }
    }

    #[test]
    fn coded_index_value_matches_encode() {
        let index = CodedIndex::new(TableId::TypeRef, 7);
        assert_eq!(
            index.value(CodedIndexType::TypeDefOrRef).unwrap(),
            (7 << 2) | 1
        );
        assert_eq!(index.token().value(), 0x01000007);

        assert_eq!(
            CodedIndex::null().value(CodedIndexType::TypeDefOrRef).unwrap(),
            0
        );
    }

    #[test]
    fn resolution_scope_tags() {
        let category = CodedIndexType::ResolutionScope;
        assert_eq!(category.encode(Token::new(0x00000001)).unwrap(), 1 << 2);
        assert_eq!(
            category.encode(Token::new(0x1A000001)).unwrap(),
            (1 << 2) | 1
        );
        assert_eq!(
            category.encode(Token::new(0x23000002)).unwrap(),
            (2 << 2) | 2
        );
        assert_eq!(
            category.encode(Token::new(0x01000003)).unwrap(),
            (3 << 2) | 3
        );
    }
}
