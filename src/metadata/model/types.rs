//! Type-shaped objects of the source graph: definitions, references and
//! signature-based specifications.

use std::sync::{Arc, OnceLock};

use crate::metadata::{
    model::{
        AssemblyRef, CustomAttribute, MethodDefOrRef, ModuleId, ModuleProvider, ModuleRef,
        SecurityDeclaration,
    },
    signatures::SignatureTypeSpec,
    token::Token,
};

/// A choice among the three type-shaped tables, as stored wherever the
/// metadata format uses a `TypeDefOrRef` coded index.
#[derive(Clone)]
pub enum TypeDefOrRef {
    /// A type defined in the module being built
    TypeDef(Arc<TypeDef>),
    /// A type defined elsewhere
    TypeRef(Arc<TypeRef>),
    /// A type given by signature (generic instantiation, array, pointer)
    TypeSpec(Arc<TypeSpec>),
}

impl TypeDefOrRef {
    /// Simple name of the referenced type; specs have none.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TypeDefOrRef::TypeDef(ty) => &ty.name,
            TypeDefOrRef::TypeRef(ty) => &ty.name,
            TypeDefOrRef::TypeSpec(_) => "",
        }
    }
}

impl ModuleProvider for TypeDefOrRef {
    fn module(&self) -> Option<ModuleId> {
        match self {
            TypeDefOrRef::TypeDef(ty) => ty.module(),
            TypeDefOrRef::TypeRef(ty) => ty.module(),
            TypeDefOrRef::TypeSpec(ty) => ty.module(),
        }
    }
}

impl std::fmt::Debug for TypeDefOrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDefOrRef::TypeDef(ty) => write!(f, "TypeDef({}.{})", ty.namespace, ty.name),
            TypeDefOrRef::TypeRef(ty) => write!(f, "TypeRef({}.{})", ty.namespace, ty.name),
            TypeDefOrRef::TypeSpec(_) => write!(f, "TypeSpec(..)"),
        }
    }
}

/// Explicit memory layout attached to a type definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassLayout {
    /// Field packing alignment in bytes, 0 for the platform default
    pub packing_size: u16,
    /// Explicit total size in bytes, 0 when unconstrained
    pub class_size: u32,
}

/// An explicit override: `body` implements `declaration` within the owning
/// type.
#[derive(Clone)]
pub struct MethodImplEntry {
    /// The declaration being implemented (interface or base method)
    pub declaration: MethodDefOrRef,
    /// The implementing method
    pub body: MethodDefOrRef,
}

/// A generic parameter of a type or method, together with its constraints.
pub struct GenericParam {
    /// Zero-based position in the owner's parameter list
    pub number: u16,
    /// Variance and special-constraint attributes bitmask
    pub attributes: u16,
    /// Parameter name, e.g. `T`
    pub name: String,
    /// Constraint types; may reference the owner itself, so constraints are
    /// attached after the owner's `Arc` exists
    pub constraints: boxcar::Vec<TypeDefOrRef>,
    /// Custom attributes on the parameter
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl GenericParam {
    /// Creates an unconstrained generic parameter.
    #[must_use]
    pub fn new(number: u16, name: impl Into<String>) -> Self {
        GenericParam {
            number,
            attributes: 0,
            name: name.into(),
            constraints: boxcar::Vec::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }
}

/// A type definition of the module being built.
///
/// Members are appended through the `boxcar` lists; the base type is a late
/// slot so that generic self-references can be closed after construction.
/// Members must be in place before the type is attached to its module via
/// [`crate::metadata::model::Module::push_type`].
pub struct TypeDef {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this type carried in its source image, null for new types
    pub original_token: Token,
    /// Type attributes bitmask, copied verbatim into the row
    pub attributes: u32,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    base_type: OnceLock<TypeDefOrRef>,
    /// Field definitions, in declaration order
    pub fields: boxcar::Vec<Arc<super::Field>>,
    /// Method definitions, in declaration order
    pub methods: boxcar::Vec<Arc<super::Method>>,
    /// Property definitions
    pub properties: boxcar::Vec<Arc<super::Property>>,
    /// Event definitions
    pub events: boxcar::Vec<Arc<super::Event>>,
    /// Implemented interfaces
    pub interfaces: boxcar::Vec<TypeDefOrRef>,
    /// Explicit method overrides
    pub method_impls: boxcar::Vec<MethodImplEntry>,
    /// Generic parameters, by number
    pub generic_params: boxcar::Vec<Arc<GenericParam>>,
    /// Types nested within this one
    pub nested_types: boxcar::Vec<Arc<TypeDef>>,
    /// Explicit layout, if any
    pub class_layout: OnceLock<ClassLayout>,
    /// Declarative security attached to the type
    pub security: boxcar::Vec<Arc<SecurityDeclaration>>,
    /// Custom attributes on the type
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl TypeDef {
    /// Creates an empty type definition.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, attributes: u32) -> Self {
        TypeDef {
            module: OnceLock::new(),
            original_token: Token::new(0),
            attributes,
            namespace: namespace.into(),
            name: name.into(),
            base_type: OnceLock::new(),
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            properties: boxcar::Vec::new(),
            events: boxcar::Vec::new(),
            interfaces: boxcar::Vec::new(),
            method_impls: boxcar::Vec::new(),
            generic_params: boxcar::Vec::new(),
            nested_types: boxcar::Vec::new(),
            class_layout: OnceLock::new(),
            security: boxcar::Vec::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }

    /// The base type, if one has been set.
    #[must_use]
    pub fn base_type(&self) -> Option<&TypeDefOrRef> {
        self.base_type.get()
    }

    /// Sets the base type. May be called after the type's `Arc` exists, which
    /// is how self-referential bases (`class C : B<C>`) are expressed.
    ///
    /// # Errors
    /// Returns an error if a base type was already set.
    pub fn set_base_type(&self, base: TypeDefOrRef) -> crate::Result<()> {
        self.base_type
            .set(base)
            .map_err(|_| malformed_error!("Base type of {} is already set", self.name))
    }

    /// Stamps this type and its members with the owning module's identity.
    pub(crate) fn attach(self: &Arc<Self>, id: ModuleId) {
        let _ = self.module.set(id);
        for (_, field) in self.fields.iter() {
            field.attach(id);
        }
        for (_, method) in self.methods.iter() {
            method.attach(id);
        }
        for (_, nested) in self.nested_types.iter() {
            nested.attach(id);
        }
    }
}

impl ModuleProvider for TypeDef {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// The scope a [`TypeRef`] resolves in, as stored in a `ResolutionScope`
/// coded index.
#[derive(Clone)]
pub enum ResolutionScope {
    /// The current module; rare, used for forward references
    Module,
    /// Another module of the same assembly
    ModuleRef(Arc<ModuleRef>),
    /// Another assembly
    AssemblyRef(Arc<AssemblyRef>),
    /// The enclosing type reference, for nested types
    TypeRef(Arc<TypeRef>),
}

/// A reference to a type defined outside the module being built.
pub struct TypeRef {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this reference carried in its source image, null for new objects
    pub original_token: Token,
    /// Where the type resolves
    pub scope: ResolutionScope,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Custom attributes on the reference
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for TypeRef {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A type given by signature: generic instantiations, arrays, pointers and
/// other shapes that neither `TypeDef` nor `TypeRef` can carry.
pub struct TypeSpec {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this specification carried in its source image
    pub original_token: Token,
    /// The described type shape
    pub signature: SignatureTypeSpec,
    /// Custom attributes on the specification
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for TypeSpec {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}
