//! Member-shaped objects of the source graph: fields, methods, parameters,
//! properties, events and the reference kinds that name members of other
//! scopes.

use std::sync::{Arc, OnceLock};

use crate::metadata::{
    method::MethodBody,
    model::{
        Constant, CustomAttribute, GenericParam, MarshalDescriptor, ModuleId, ModuleProvider,
        SecurityDeclaration, TypeDef, TypeDefOrRef, TypeRef, TypeSpec,
    },
    signatures::{
        SignatureField, SignatureLocalVariables, SignatureMethod, SignatureMethodSpec,
        SignatureProperty,
    },
    token::Token,
};

/// A field definition.
pub struct Field {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this field carried in its source image, null for new fields
    pub original_token: Token,
    /// Field attributes bitmask
    pub attributes: u16,
    /// Field name
    pub name: String,
    /// Field type
    pub signature: SignatureField,
    /// Compile-time constant value, for literal fields
    pub constant: OnceLock<Constant>,
    /// Explicit byte offset within an explicit-layout type
    pub layout_offset: OnceLock<u32>,
    /// Marshalling descriptor for interop
    pub marshal: OnceLock<MarshalDescriptor>,
    /// Initial data for mapped fields (emitted as a `FieldRVA` row)
    pub initial_data: OnceLock<Vec<u8>>,
    /// Custom attributes on the field
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Field {
    /// Creates a field with the given name, attributes and type.
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: u16, signature: SignatureField) -> Self {
        Field {
            module: OnceLock::new(),
            original_token: Token::new(0),
            attributes,
            name: name.into(),
            signature,
            constant: OnceLock::new(),
            layout_offset: OnceLock::new(),
            marshal: OnceLock::new(),
            initial_data: OnceLock::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }

    pub(crate) fn attach(&self, id: ModuleId) {
        let _ = self.module.set(id);
    }
}

impl ModuleProvider for Field {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A parameter definition attached to a method.
pub struct Param {
    /// Parameter attributes bitmask
    pub attributes: u16,
    /// 1-based position; 0 names the return value
    pub sequence: u16,
    /// Parameter name, empty when unnamed
    pub name: String,
    /// Compile-time default value
    pub constant: OnceLock<Constant>,
    /// Marshalling descriptor for interop
    pub marshal: OnceLock<MarshalDescriptor>,
    /// Custom attributes on the parameter
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Param {
    /// Creates a named parameter at the given sequence position.
    #[must_use]
    pub fn new(sequence: u16, name: impl Into<String>) -> Self {
        Param {
            attributes: 0,
            sequence,
            name: name.into(),
            constant: OnceLock::new(),
            marshal: OnceLock::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }
}

/// P/Invoke information attached to a method, emitted as an `ImplMap` row.
pub struct PInvokeInfo {
    /// Mapping attributes bitmask (charset, calling convention, last-error)
    pub attributes: u16,
    /// Name of the unmanaged entry point
    pub entry_point: String,
    /// The module the entry point lives in
    pub scope: Arc<ModuleRef>,
}

/// A method definition.
pub struct Method {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this method carried in its source image, null for new methods
    pub original_token: Token,
    /// Method attributes bitmask
    pub attributes: u16,
    /// Method implementation attributes bitmask
    pub impl_attributes: u16,
    /// Method name
    pub name: String,
    /// Calling convention, return type and parameter types
    pub signature: SignatureMethod,
    /// Named parameter rows, by sequence
    pub params: boxcar::Vec<Arc<Param>>,
    /// CIL body; absent for abstract, runtime and P/Invoke methods
    pub body: OnceLock<MethodBody>,
    /// Generic parameters, by number
    pub generic_params: boxcar::Vec<Arc<GenericParam>>,
    /// P/Invoke mapping, if the method forwards to unmanaged code
    pub pinvoke: OnceLock<PInvokeInfo>,
    /// Declarative security attached to the method
    pub security: boxcar::Vec<Arc<SecurityDeclaration>>,
    /// Custom attributes on the method
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Method {
    /// Creates a bodyless method with the given name, attributes and signature.
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: u16, signature: SignatureMethod) -> Self {
        Method {
            module: OnceLock::new(),
            original_token: Token::new(0),
            attributes,
            impl_attributes: 0,
            name: name.into(),
            signature,
            params: boxcar::Vec::new(),
            body: OnceLock::new(),
            generic_params: boxcar::Vec::new(),
            pinvoke: OnceLock::new(),
            security: boxcar::Vec::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }

    pub(crate) fn attach(&self, id: ModuleId) {
        let _ = self.module.set(id);
    }
}

impl ModuleProvider for Method {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A property definition. Accessors are linked after the methods exist and
/// are emitted as `MethodSemantics` rows.
pub struct Property {
    /// Property attributes bitmask
    pub attributes: u16,
    /// Property name
    pub name: String,
    /// Property signature (return type and indexer parameters)
    pub signature: SignatureProperty,
    /// Getter method
    pub getter: OnceLock<Arc<Method>>,
    /// Setter method
    pub setter: OnceLock<Arc<Method>>,
    /// Other associated helper methods
    pub other: boxcar::Vec<Arc<Method>>,
    /// Compile-time default value
    pub constant: OnceLock<Constant>,
    /// Custom attributes on the property
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Property {
    /// Creates an accessorless property.
    #[must_use]
    pub fn new(name: impl Into<String>, signature: SignatureProperty) -> Self {
        Property {
            attributes: 0,
            name: name.into(),
            signature,
            getter: OnceLock::new(),
            setter: OnceLock::new(),
            other: boxcar::Vec::new(),
            constant: OnceLock::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }
}

/// An event definition. Accessors are linked after the methods exist and are
/// emitted as `MethodSemantics` rows.
pub struct Event {
    /// Event attributes bitmask
    pub attributes: u16,
    /// Event name
    pub name: String,
    /// The delegate type of the event
    pub event_type: TypeDefOrRef,
    /// Subscribe method
    pub add_method: OnceLock<Arc<Method>>,
    /// Unsubscribe method
    pub remove_method: OnceLock<Arc<Method>>,
    /// Raise method
    pub fire_method: OnceLock<Arc<Method>>,
    /// Other associated helper methods
    pub other: boxcar::Vec<Arc<Method>>,
    /// Custom attributes on the event
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Event {
    /// Creates an accessorless event of the given delegate type.
    #[must_use]
    pub fn new(name: impl Into<String>, event_type: TypeDefOrRef) -> Self {
        Event {
            attributes: 0,
            name: name.into(),
            event_type,
            add_method: OnceLock::new(),
            remove_method: OnceLock::new(),
            fire_method: OnceLock::new(),
            other: boxcar::Vec::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }
}

/// The declaring scope of a [`MemberRef`], as stored in a `MemberRefParent`
/// coded index.
#[derive(Clone)]
pub enum MemberRefParent {
    /// A type of this module (vararg call-site references)
    TypeDef(Arc<TypeDef>),
    /// An external type
    TypeRef(Arc<TypeRef>),
    /// An instantiated generic type
    TypeSpec(Arc<TypeSpec>),
    /// A module, for global members
    ModuleRef(Arc<super::ModuleRef>),
    /// A method, for vararg call sites
    Method(Arc<Method>),
}

/// The signature carried by a [`MemberRef`]: method-shaped or field-shaped.
#[derive(Clone, Debug)]
pub enum MemberRefSignature {
    /// A method reference
    Method(SignatureMethod),
    /// A field reference
    Field(SignatureField),
}

/// A reference to a field or method of another scope.
pub struct MemberRef {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this reference carried in its source image
    pub original_token: Token,
    /// The declaring scope
    pub parent: MemberRefParent,
    /// Member name
    pub name: String,
    /// Member signature
    pub signature: MemberRefSignature,
    /// Custom attributes on the reference
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for MemberRef {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A choice between a method definition and a member reference, as stored in
/// a `MethodDefOrRef` coded index.
#[derive(Clone)]
pub enum MethodDefOrRef {
    /// A method of this module
    Method(Arc<Method>),
    /// A member of another scope
    MemberRef(Arc<MemberRef>),
}

impl MethodDefOrRef {
    /// Name of the referenced method.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MethodDefOrRef::Method(method) => &method.name,
            MethodDefOrRef::MemberRef(member) => &member.name,
        }
    }
}

impl ModuleProvider for MethodDefOrRef {
    fn module(&self) -> Option<ModuleId> {
        match self {
            MethodDefOrRef::Method(method) => method.module(),
            MethodDefOrRef::MemberRef(member) => member.module(),
        }
    }
}

/// An instantiation of a generic method.
pub struct MethodSpec {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this specification carried in its source image
    pub original_token: Token,
    /// The instantiated generic method
    pub method: MethodDefOrRef,
    /// The type arguments
    pub instantiation: SignatureMethodSpec,
    /// Custom attributes on the specification
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for MethodSpec {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A reference to an external module, primarily a P/Invoke target.
pub struct ModuleRef {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this reference carried in its source image
    pub original_token: Token,
    /// Name of the referenced module, e.g. `kernel32.dll`
    pub name: String,
    /// Custom attributes on the reference
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for ModuleRef {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A signature that stands alone in the `StandAloneSig` table: local variable
/// lists and indirect-call signatures.
#[derive(Clone, Debug)]
pub enum StandAloneSignature {
    /// The local variable layout of a method body
    LocalVariables(SignatureLocalVariables),
    /// A call-site signature for `calli`
    Method(SignatureMethod),
}
