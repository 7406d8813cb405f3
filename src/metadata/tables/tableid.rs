use strum::{EnumCount, EnumIter};

/// Number of table slots in a tables stream (highest table id plus one).
pub const TABLE_SLOTS: usize = TableId::GenericParamConstraint as usize + 1;

/// Identifiers for the metadata tables defined in ECMA-335, Partition II §22.
///
/// Each variant's numeric value is the table id from the CLI specification,
/// which is also the tag byte of tokens referring into that table. The writer
/// emits rows for all of them; the `*Ptr` indirection tables exist so that
/// edit-and-continue shaped inputs keep their original row identifiers.
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// `Module` table (0x00) - the one row describing the module being built:
    /// name, MVID and generation.
    Module = 0x00,

    /// `TypeRef` table (0x01) - references to types defined in external
    /// assemblies or modules, with name, namespace and resolution scope.
    TypeRef = 0x01,

    /// `TypeDef` table (0x02) - all type definitions of this module, with
    /// flags, name, namespace, base type and member list ranges.
    TypeDef = 0x02,

    /// `FieldPtr` table (0x03) - field indirection for uncompressed streams.
    FieldPtr = 0x03,

    /// `Field` table (0x04) - field definitions with attributes, name and
    /// signature, owned by types in `TypeDef`.
    Field = 0x04,

    /// `MethodPtr` table (0x05) - method indirection for uncompressed streams.
    MethodPtr = 0x05,

    /// `MethodDef` table (0x06) - method definitions with RVA, attributes,
    /// name, signature and parameter list range.
    MethodDef = 0x06,

    /// `ParamPtr` table (0x07) - parameter indirection for uncompressed streams.
    ParamPtr = 0x07,

    /// `Param` table (0x08) - parameter rows with attributes, sequence number
    /// and name.
    Param = 0x08,

    /// `InterfaceImpl` table (0x09) - records which types implement which
    /// interfaces. Sorted by implementing type.
    InterfaceImpl = 0x09,

    /// `MemberRef` table (0x0A) - references to fields and methods of external
    /// types, with name and signature.
    MemberRef = 0x0A,

    /// `Constant` table (0x0B) - compile-time constants of fields, parameters
    /// and properties. Sorted by parent.
    Constant = 0x0B,

    /// `CustomAttribute` table (0x0C) - custom attribute applications; parent
    /// may be nearly any other metadata element. Sorted by parent.
    CustomAttribute = 0x0C,

    /// `FieldMarshal` table (0x0D) - marshalling descriptors for fields and
    /// parameters crossing the interop boundary. Sorted by parent.
    FieldMarshal = 0x0D,

    /// `DeclSecurity` table (0x0E) - declarative security permission sets
    /// attached to types, methods or the assembly. Sorted by parent.
    DeclSecurity = 0x0E,

    /// `ClassLayout` table (0x0F) - explicit packing and size for types that
    /// need a fixed memory layout. Sorted by parent type.
    ClassLayout = 0x0F,

    /// `FieldLayout` table (0x10) - explicit byte offsets of fields within
    /// explicit-layout types. Sorted by field.
    FieldLayout = 0x10,

    /// `StandAloneSig` table (0x11) - signatures not attached to any member,
    /// such as local variable signatures and call-site signatures.
    StandAloneSig = 0x11,

    /// `EventMap` table (0x12) - maps a type to its range of rows in `Event`.
    EventMap = 0x12,

    /// `EventPtr` table (0x13) - event indirection for uncompressed streams.
    EventPtr = 0x13,

    /// `Event` table (0x14) - event definitions with attributes, name and
    /// event type.
    Event = 0x14,

    /// `PropertyMap` table (0x15) - maps a type to its range of rows in
    /// `Property`.
    PropertyMap = 0x15,

    /// `PropertyPtr` table (0x16) - property indirection for uncompressed streams.
    PropertyPtr = 0x16,

    /// `Property` table (0x17) - property definitions with attributes, name
    /// and signature.
    Property = 0x17,

    /// `MethodSemantics` table (0x18) - connects accessor methods to the
    /// property or event they belong to. Sorted by association.
    MethodSemantics = 0x18,

    /// `MethodImpl` table (0x19) - explicit overrides: which method body
    /// implements which declaration. Sorted by class.
    MethodImpl = 0x19,

    /// `ModuleRef` table (0x1A) - references to external modules, primarily
    /// P/Invoke targets.
    ModuleRef = 0x1A,

    /// `TypeSpec` table (0x1B) - complex type shapes (generic instantiations,
    /// arrays, pointers) given by signature.
    TypeSpec = 0x1B,

    /// `ImplMap` table (0x1C) - P/Invoke mappings from managed methods to
    /// unmanaged entry points. Sorted by forwarded member.
    ImplMap = 0x1C,

    /// `FieldRVA` table (0x1D) - initial data locations for mapped fields.
    /// Sorted by field.
    FieldRva = 0x1D,

    /// `Assembly` table (0x20) - the manifest row of the assembly being
    /// built, if any.
    Assembly = 0x20,

    /// `AssemblyProcessor` table (0x21) - processor info, rarely used.
    AssemblyProcessor = 0x21,

    /// `AssemblyOS` table (0x22) - operating system info, rarely used.
    AssemblyOs = 0x22,

    /// `AssemblyRef` table (0x23) - references to other assemblies with
    /// version, identity and culture.
    AssemblyRef = 0x23,

    /// `AssemblyRefProcessor` table (0x24) - processor info for references,
    /// rarely used.
    AssemblyRefProcessor = 0x24,

    /// `AssemblyRefOS` table (0x25) - OS info for references, rarely used.
    AssemblyRefOs = 0x25,

    /// `File` table (0x26) - files belonging to a multi-file assembly.
    File = 0x26,

    /// `ExportedType` table (0x27) - types exported or forwarded by this
    /// assembly.
    ExportedType = 0x27,

    /// `ManifestResource` table (0x28) - embedded or linked resources.
    ManifestResource = 0x28,

    /// `NestedClass` table (0x29) - parent/child relations of nested types.
    /// Sorted by nested type.
    NestedClass = 0x29,

    /// `GenericParam` table (0x2A) - generic parameters of types and methods.
    /// Sorted by owner, then number.
    GenericParam = 0x2A,

    /// `MethodSpec` table (0x2B) - generic method instantiations.
    MethodSpec = 0x2B,

    /// `GenericParamConstraint` table (0x2C) - constraints attached to
    /// generic parameters. Sorted by owner.
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// The token tag byte for rows of this table.
    #[must_use]
    pub fn token_type(self) -> u8 {
        self as u8
    }

    /// Resolves a token tag byte back to its table.
    #[must_use]
    pub fn from_token_type(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;
        TableId::iter().find(|id| *id as u8 == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn token_type_matches_discriminant() {
        assert_eq!(TableId::Module.token_type(), 0x00);
        assert_eq!(TableId::MethodDef.token_type(), 0x06);
        assert_eq!(TableId::Assembly.token_type(), 0x20);
        assert_eq!(TableId::GenericParamConstraint.token_type(), 0x2C);
    }

    #[test]
    fn from_token_type_round_trip() {
        for id in TableId::iter() {
            assert_eq!(TableId::from_token_type(id.token_type()), Some(id));
        }

        // 0x1E/0x1F (ENC tables) and everything past 0x2C are not emitted
        assert_eq!(TableId::from_token_type(0x1E), None);
        assert_eq!(TableId::from_token_type(0x2D), None);
        assert_eq!(TableId::from_token_type(0x70), None);
    }

    #[test]
    fn slot_count_covers_all_tables() {
        assert_eq!(TABLE_SLOTS, 0x2D);
        assert!(TableId::COUNT <= TABLE_SLOTS);
        for id in TableId::iter() {
            assert!((id as usize) < TABLE_SLOTS);
        }
    }
}
