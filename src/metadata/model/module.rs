//! The root of the source object graph.

use std::sync::{Arc, OnceLock};

use crate::metadata::{
    model::{
        Assembly, AssemblyRef, CustomAttribute, ExportedType, ExportedTypeImplementation,
        FileReference, ManifestResource, MemberRef, MemberRefParent, MemberRefSignature,
        MethodDefOrRef, MethodSpec, ModuleId, ModuleProvider, ModuleRef, ResolutionScope,
        ResourceData, TypeDef, TypeRef, TypeSpec,
    },
    signatures::{SignatureMethodSpec, SignatureTypeSpec},
    token::Token,
};

/// Runtime version string emitted into the metadata root by default.
pub const DEFAULT_RUNTIME_VERSION: &str = "v4.0.30319";

/// CLI header flag: the image contains only IL code.
pub const COMIMAGE_FLAGS_ILONLY: u32 = 0x0000_0001;

/// The managed entry point of a module.
#[derive(Clone, Default)]
pub enum EntryPoint {
    /// No managed entry point; the directory's entry-point field is 0
    #[default]
    None,
    /// A method definition of this module
    Method(Arc<super::Method>),
    /// A file of a multi-file assembly whose module holds the entry point
    File(Arc<FileReference>),
}

/// A module under construction: the root object handed to the directory
/// builder.
///
/// The module owns its type definitions and manifest objects; reference
/// objects (type refs, member refs, assembly refs, ...) are created through
/// the factory methods so they carry this module's identity from the start.
/// The builder never mutates any of it.
pub struct Module {
    id: ModuleId,
    /// Module name, usually the file name
    pub name: String,
    /// Module version identifier; a fresh GUID per build
    pub mvid: [u8; 16],
    /// Edit-and-continue generation, 0 for a fresh module
    pub generation: u16,
    /// Version string for the metadata root, e.g. `v4.0.30319`
    pub runtime_version: String,
    /// CLI header flags, copied verbatim into the directory's `Flags` field
    pub attributes: u32,
    /// The assembly manifest, absent for netmodules
    pub assembly: Option<Assembly>,
    types: Vec<Arc<TypeDef>>,
    /// Files of a multi-file assembly
    pub files: boxcar::Vec<Arc<FileReference>>,
    /// Types exported or forwarded by the assembly
    pub exported_types: boxcar::Vec<Arc<ExportedType>>,
    /// Manifest resources
    pub resources: boxcar::Vec<Arc<ManifestResource>>,
    /// The managed entry point
    pub entry_point: EntryPoint,
    /// Custom attributes on the module row
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Module {
    /// Creates a module with the given name and MVID.
    ///
    /// The implicit `<Module>` type that owns global fields and methods is
    /// created as the first type, so user types receive `TypeDef` RIDs
    /// starting at 2, matching what every managed compiler emits.
    #[must_use]
    pub fn new(name: impl Into<String>, mvid: [u8; 16]) -> Module {
        let id = ModuleId::next();

        let module_type = Arc::new(TypeDef::new(String::new(), "<Module>", 0));
        module_type.attach(id);

        Module {
            id,
            name: name.into(),
            mvid,
            generation: 0,
            runtime_version: DEFAULT_RUNTIME_VERSION.to_string(),
            attributes: COMIMAGE_FLAGS_ILONLY,
            assembly: None,
            types: vec![module_type],
            files: boxcar::Vec::new(),
            exported_types: boxcar::Vec::new(),
            resources: boxcar::Vec::new(),
            entry_point: EntryPoint::None,
            custom_attributes: boxcar::Vec::new(),
        }
    }

    /// The identity of this module, compared during ownership assertions.
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// All type definitions, `<Module>` first, in declaration order.
    /// Nested types are reached through their enclosing type.
    #[must_use]
    pub fn types(&self) -> &[Arc<TypeDef>] {
        &self.types
    }

    /// The implicit `<Module>` type holding global members.
    #[must_use]
    pub fn module_type(&self) -> &Arc<TypeDef> {
        &self.types[0]
    }

    /// Attaches a top-level type (and, recursively, its members and nested
    /// types) to this module.
    pub fn push_type(&mut self, ty: TypeDef) -> Arc<TypeDef> {
        let ty = Arc::new(ty);
        ty.attach(self.id);
        self.types.push(ty.clone());
        ty
    }

    /// Creates a reference to a type of another scope.
    #[must_use]
    pub fn type_ref(
        &self,
        scope: ResolutionScope,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Arc<TypeRef> {
        let reference = Arc::new(TypeRef {
            module: OnceLock::new(),
            original_token: Token::new(0),
            scope,
            namespace: namespace.into(),
            name: name.into(),
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = reference.module.set(self.id);
        reference
    }

    /// Creates a type specification from a signature.
    #[must_use]
    pub fn type_spec(&self, signature: SignatureTypeSpec) -> Arc<TypeSpec> {
        let spec = Arc::new(TypeSpec {
            module: OnceLock::new(),
            original_token: Token::new(0),
            signature,
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = spec.module.set(self.id);
        spec
    }

    /// Creates a reference to a member of another scope.
    #[must_use]
    pub fn member_ref(
        &self,
        parent: MemberRefParent,
        name: impl Into<String>,
        signature: MemberRefSignature,
    ) -> Arc<MemberRef> {
        let reference = Arc::new(MemberRef {
            module: OnceLock::new(),
            original_token: Token::new(0),
            parent,
            name: name.into(),
            signature,
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = reference.module.set(self.id);
        reference
    }

    /// Creates a generic method instantiation.
    #[must_use]
    pub fn method_spec(
        &self,
        method: MethodDefOrRef,
        instantiation: SignatureMethodSpec,
    ) -> Arc<MethodSpec> {
        let spec = Arc::new(MethodSpec {
            module: OnceLock::new(),
            original_token: Token::new(0),
            method,
            instantiation,
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = spec.module.set(self.id);
        spec
    }

    /// Creates a reference to an external module.
    #[must_use]
    pub fn module_ref(&self, name: impl Into<String>) -> Arc<ModuleRef> {
        let reference = Arc::new(ModuleRef {
            module: OnceLock::new(),
            original_token: Token::new(0),
            name: name.into(),
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = reference.module.set(self.id);
        reference
    }

    /// Adopts an assembly reference into this module.
    #[must_use]
    pub fn assembly_ref(&self, reference: AssemblyRef) -> Arc<AssemblyRef> {
        let reference = Arc::new(reference);
        let _ = reference.module.set(self.id);
        reference
    }

    /// Registers a file of a multi-file assembly.
    #[must_use]
    pub fn file(
        &self,
        name: impl Into<String>,
        attributes: u32,
        hash_value: Vec<u8>,
    ) -> Arc<FileReference> {
        let file = Arc::new(FileReference {
            module: OnceLock::new(),
            original_token: Token::new(0),
            name: name.into(),
            attributes,
            hash_value,
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = file.module.set(self.id);
        self.files.push(file.clone());
        file
    }

    /// Registers an exported or forwarded type.
    #[must_use]
    pub fn exported_type(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        attributes: u32,
        implementation: ExportedTypeImplementation,
    ) -> Arc<ExportedType> {
        let exported = Arc::new(ExportedType {
            module: OnceLock::new(),
            original_token: Token::new(0),
            attributes,
            type_def_id: 0,
            namespace: namespace.into(),
            name: name.into(),
            implementation,
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = exported.module.set(self.id);
        self.exported_types.push(exported.clone());
        exported
    }

    /// Registers a manifest resource.
    #[must_use]
    pub fn resource(
        &self,
        name: impl Into<String>,
        attributes: u32,
        data: ResourceData,
    ) -> Arc<ManifestResource> {
        let resource = Arc::new(ManifestResource {
            module: OnceLock::new(),
            original_token: Token::new(0),
            name: name.into(),
            attributes,
            data,
            custom_attributes: boxcar::Vec::new(),
        });
        let _ = resource.module.set(self.id);
        self.resources.push(resource.clone());
        resource
    }
}

impl ModuleProvider for Module {
    fn module(&self) -> Option<ModuleId> {
        Some(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::Version;

    #[test]
    fn new_module_has_module_type() {
        let module = Module::new("Test.dll", [0; 16]);
        assert_eq!(module.types().len(), 1);
        assert_eq!(module.module_type().name, "<Module>");
        assert_eq!(module.module_type().module(), Some(module.id()));
    }

    #[test]
    fn push_type_attaches_members() {
        let mut module = Module::new("Test.dll", [0; 16]);

        let ty = TypeDef::new("Ns", "Widget", 0x0010_0001);
        ty.fields.push(Arc::new(crate::metadata::model::Field::new(
            "value",
            0x0006,
            crate::metadata::signatures::SignatureField::default(),
        )));
        let ty = module.push_type(ty);

        assert_eq!(ty.module(), Some(module.id()));
        let (_, field) = ty.fields.iter().next().unwrap();
        assert_eq!(field.module(), Some(module.id()));
    }

    #[test]
    fn factories_stamp_ownership() {
        let module = Module::new("Test.dll", [0; 16]);
        let other = Module::new("Other.dll", [1; 16]);

        let mscorlib = module.assembly_ref(AssemblyRef::new("System.Runtime", Version::new(8, 0, 0, 0)));
        assert_eq!(mscorlib.module(), Some(module.id()));
        assert_ne!(mscorlib.module(), Some(other.id()));

        let console = module.type_ref(
            ResolutionScope::AssemblyRef(mscorlib),
            "System",
            "Console",
        );
        assert_eq!(console.module(), Some(module.id()));
    }
}
