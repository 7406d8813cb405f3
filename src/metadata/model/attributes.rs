//! Annotation values attachable to most metadata elements.

use std::sync::Arc;

use crate::metadata::model::MethodDefOrRef;

/// A custom attribute application: a constructor plus its encoded value blob.
///
/// The value bytes follow ECMA §II.23.3 and are treated as opaque by the
/// writer; semantic encoding of fixed and named arguments happens upstream.
pub struct CustomAttribute {
    /// The attribute constructor (a `MethodDef` or `MemberRef`)
    pub constructor: MethodDefOrRef,
    /// Raw attribute value blob, including the 0x0001 prolog
    pub value: Vec<u8>,
}

impl CustomAttribute {
    /// Creates an attribute application from its constructor and value blob.
    #[must_use]
    pub fn new(constructor: MethodDefOrRef, value: Vec<u8>) -> Arc<Self> {
        Arc::new(CustomAttribute { constructor, value })
    }
}

/// A compile-time constant of a field, parameter or property.
#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    /// Element type of the value (ECMA §II.23.1.16)
    pub element_type: u8,
    /// Little-endian value bytes; strings are UTF-16
    pub value: Vec<u8>,
}

/// A marshalling descriptor blob for a field or parameter crossing the
/// interop boundary (ECMA §II.23.4).
#[derive(Clone, Debug, PartialEq)]
pub struct MarshalDescriptor(pub Vec<u8>);

/// A declarative security permission set attached to a type, method or the
/// assembly.
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityDeclaration {
    /// Security action code
    pub action: u16,
    /// The encoded permission set blob
    pub permission_set: Vec<u8>,
}
