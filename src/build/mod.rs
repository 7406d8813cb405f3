//! The directory builder: walks a source [`Module`] graph, imports every
//! reachable member into the metadata buffers and produces the serialized
//! [`DotNetDirectory`].
//!
//! # Import order
//!
//! Token assignment happens in phases so that the cyclic member graph
//! (type → member → signature → type) is walked exactly once:
//!
//! 1. The module row, then a `TypeDef` row for every type in declaration
//!    order - rows carry placeholders for everything not yet known. This is
//!    what makes cycles terminate: by the time any signature is encoded,
//!    every type definition already has its final token.
//! 2. Fields, methods and parameters, in `TypeDef` RID order, so the member
//!    list columns form the contiguous runs the format requires. Signature
//!    encoding runs here and imports type references on first sight.
//! 3. Everything hanging off types: base types, interfaces, layouts,
//!    generic parameters and constraints, overrides, accessor semantics,
//!    constants, marshalling, P/Invoke maps, security, nesting and custom
//!    attributes.
//! 4. The manifest: assembly, files, exported types, resources.
//! 5. Method bodies, with token fixups back through the builder.
//!
//! Reference kinds (`TypeRef`, `TypeSpec`, `MemberRef`, `MethodSpec`,
//! `ModuleRef`, `AssemblyRef`) are imported on demand and memoized by object
//! identity, so importing the same object twice returns the same token.

mod buffer;
mod directory;
mod heaps;
mod resources;
mod tables;

pub use buffer::*;
pub use directory::*;
pub use heaps::*;
pub use resources::*;
pub use tables::*;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    metadata::{
        method::{CilRef, TokenProvider},
        model::{
            Assembly, AssemblyRef, Constant, CustomAttribute, EntryPoint, ExportedType,
            ExportedTypeImplementation, Field, FileReference, GenericParam, ManifestResource,
            MarshalDescriptor, MemberRef, MemberRefParent, MemberRefSignature, Method,
            MethodDefOrRef, MethodSpec, Module, ModuleProvider, ModuleRef, Property,
            ResolutionScope, ResourceData, SecurityDeclaration, StandAloneSignature, TypeDef,
            TypeDefOrRef, TypeRef, TypeSpec,
        },
        signatures::{
            encode_field_signature, encode_local_var_signature, encode_method_signature,
            encode_method_spec_signature, encode_property_signature, encode_typespec_signature,
            SignatureLocalVariables, TypeIndexResolver,
        },
        tables::{
            AssemblyRefRow, AssemblyRow, ClassLayoutRow, CodedIndex, ConstantRow,
            CustomAttributeRow, DeclSecurityRow, EventMapRow, EventRow, ExportedTypeRow,
            FieldLayoutRow, FieldMarshalRow, FieldRow, FieldRvaRow, FileRow,
            GenericParamConstraintRow, GenericParamRow, ImplMapRow, InterfaceImplRow,
            ManifestResourceRow, MemberRefRow, MethodDefRow, MethodImplRow, MethodSemanticsRow,
            MethodSemanticsAttributes, MethodSpecRow, ModuleRefRow, ModuleRow, NestedClassRow,
            PropertyMapRow, PropertyRow, StandAloneSigRow, TableData, TableId, TypeDefRow,
            TypeRefRow, TypeSpecRow,
        },
        token::Token,
    },
    Error, Result,
};

/// Object identity key: the address of the `Arc` allocation. Memoized
/// objects are either owned by the module graph or retained by the builder,
/// so an address is never reused while the builder lives.
fn key_of<T>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as usize
}

/// Keeps builder-imported reference objects alive for the duration of the
/// build, so identity keys stay unique. The variants exist only to hold
/// their `Arc`s.
#[allow(dead_code)]
enum Retained {
    TypeRef(Arc<TypeRef>),
    TypeSpec(Arc<TypeSpec>),
    MemberRef(Arc<MemberRef>),
    MethodSpec(Arc<MethodSpec>),
    ModuleRef(Arc<ModuleRef>),
    AssemblyRef(Arc<AssemblyRef>),
    File(Arc<FileReference>),
    ExportedType(Arc<ExportedType>),
    Resource(Arc<ManifestResource>),
    Signature(Arc<StandAloneSignature>),
}

/// Builds the metadata directory for one source module.
///
/// The builder owns all heap and table buffers for its lifetime and reads
/// the module graph without mutating it. [`Self::create_directory`] consumes
/// the builder; afterwards no further imports are possible by construction.
pub struct DotNetDirectoryBuilder<'a> {
    module: &'a Module,
    buffer: MetadataBuffer,
    resources: ResourcesBuffer,
    tokens: FxHashMap<usize, Token>,
    retained: Vec<Retained>,
    code: Vec<u8>,
}

impl<'a> DotNetDirectoryBuilder<'a> {
    /// Creates a builder for `module` and imports the whole graph: module
    /// row, types, members, manifest and method bodies.
    ///
    /// Further references can be added through the `add_*` operations until
    /// [`Self::create_directory`] is called.
    ///
    /// # Errors
    /// Propagates any import failure; the builder must be discarded on error.
    pub fn new(module: &'a Module) -> Result<Self> {
        let mut builder = DotNetDirectoryBuilder {
            module,
            buffer: MetadataBuffer::new(),
            resources: ResourcesBuffer::new(),
            tokens: FxHashMap::default(),
            retained: Vec::new(),
            code: Vec::new(),
        };

        builder.add_module_row()?;

        let types = builder.collect_types();
        builder.define_types(&types)?;

        let ordered = builder.types_in_rid_order(&types)?;
        builder.define_members(&ordered)?;
        builder.finalize_types(&ordered)?;

        builder.add_assembly()?;
        builder.add_manifest()?;
        builder.add_custom_attributes(
            Token::from_table(TableId::Module, 1),
            &module.custom_attributes,
        )?;

        builder.serialize_method_bodies(&ordered)?;

        Ok(builder)
    }

    /// The metadata buffer, for inspection before directory creation.
    #[must_use]
    pub fn buffer(&self) -> &MetadataBuffer {
        &self.buffer
    }

    /// Mutable access to the metadata buffer, for callers that intern
    /// additional heap values directly (the PE emitter does this for debug
    /// data).
    pub fn buffer_mut(&mut self) -> &mut MetadataBuffer {
        &mut self.buffer
    }

    /// Produces the final directory: applies the deferred table sorts,
    /// serializes all five streams and resolves the entry point. The builder
    /// is consumed; it owns no state worth keeping afterwards.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnfilledRow`] if any table still carries
    /// placeholder rows, and propagates serialization failures.
    pub fn create_directory(mut self) -> Result<DotNetDirectory> {
        let entry_point = match &self.module.entry_point {
            EntryPoint::None => 0,
            EntryPoint::Method(method) => self.get_method_definition_token(method)?.value(),
            EntryPoint::File(file) => self.add_file_reference(file)?.value(),
        };

        let metadata = self
            .buffer
            .create_metadata(&self.module.runtime_version)?;

        Ok(DotNetDirectory {
            metadata,
            resources: self.resources.finish(),
            code: self.code,
            entry_point,
            flags: self.module.attributes,
        })
    }

    // ------------------------------------------------------------------
    // Public import surface
    // ------------------------------------------------------------------

    /// Imports an assembly reference, returning its token. Idempotent per
    /// object identity.
    pub fn add_assembly_reference(&mut self, reference: &Arc<AssemblyRef>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(reference)) {
            return Ok(*token);
        }
        self.assert_owned(reference.as_ref(), || {
            format!("assembly reference {}", reference.name)
        })?;

        let hash_algorithm = self
            .module
            .assembly
            .as_ref()
            .map_or(crate::metadata::identity::AssemblyHashAlgorithm::SHA1, |assembly| {
                assembly.hash_algorithm
            });
        let identity_blob = reference.identity_blob(hash_algorithm)?;

        let row = AssemblyRefRow {
            major_version: reference.version.major,
            minor_version: reference.version.minor,
            build_number: reference.version.build,
            revision_number: reference.version.revision,
            flags: reference.attributes,
            public_key_or_token: self.buffer.blobs.get_index(&identity_blob)?,
            name: self.buffer.strings.get_index(&reference.name)?,
            culture: self.buffer.strings.get_index(&reference.culture)?,
            hash_value: self.buffer.blobs.get_index(&reference.hash_value)?,
        };

        let preferred = preferred_rid(reference.original_token, TableId::AssemblyRef);
        let token = self.buffer.tables.add(TableData::AssemblyRef(row), preferred)?;
        self.memoize(key_of(reference), token, Retained::AssemblyRef(reference.clone()));

        self.add_custom_attributes(token, &reference.custom_attributes)?;
        Ok(token)
    }

    /// Imports a type reference, returning its token. Idempotent per object
    /// identity.
    pub fn add_type_reference(&mut self, reference: &Arc<TypeRef>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(reference)) {
            return Ok(*token);
        }
        self.assert_owned(reference.as_ref(), || {
            format!("type reference {}.{}", reference.namespace, reference.name)
        })?;

        let scope = match &reference.scope {
            ResolutionScope::Module => Token::from_table(TableId::Module, 1),
            ResolutionScope::ModuleRef(module_ref) => self.add_module_reference(module_ref)?,
            ResolutionScope::AssemblyRef(assembly_ref) => {
                self.add_assembly_reference(assembly_ref)?
            }
            ResolutionScope::TypeRef(enclosing) => self.add_type_reference(enclosing)?,
        };

        let row = TypeRefRow {
            resolution_scope: CodedIndex::from_token(scope)?,
            name: self.buffer.strings.get_index(&reference.name)?,
            namespace: self.buffer.strings.get_index(&reference.namespace)?,
        };

        let preferred = preferred_rid(reference.original_token, TableId::TypeRef);
        let token = self.buffer.tables.add(TableData::TypeRef(row), preferred)?;
        self.memoize(key_of(reference), token, Retained::TypeRef(reference.clone()));

        self.add_custom_attributes(token, &reference.custom_attributes)?;
        Ok(token)
    }

    /// Imports a type specification, returning its token. Idempotent per
    /// object identity.
    pub fn add_type_specification(&mut self, specification: &Arc<TypeSpec>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(specification)) {
            return Ok(*token);
        }
        self.assert_owned(specification.as_ref(), || "type specification".to_string())?;

        let signature = encode_typespec_signature(&specification.signature, self)?;
        let row = TypeSpecRow {
            signature: self.buffer.blobs.get_index(&signature)?,
        };

        let preferred = preferred_rid(specification.original_token, TableId::TypeSpec);
        let token = self.buffer.tables.add(TableData::TypeSpec(row), preferred)?;
        self.memoize(
            key_of(specification),
            token,
            Retained::TypeSpec(specification.clone()),
        );

        self.add_custom_attributes(token, &specification.custom_attributes)?;
        Ok(token)
    }

    /// Imports a member reference, returning its token. Idempotent per
    /// object identity.
    pub fn add_member_reference(&mut self, reference: &Arc<MemberRef>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(reference)) {
            return Ok(*token);
        }
        self.assert_owned(reference.as_ref(), || {
            format!("member reference {}", reference.name)
        })?;

        let parent = match &reference.parent {
            MemberRefParent::TypeDef(ty) => self.get_type_definition_token(ty)?,
            MemberRefParent::TypeRef(ty) => self.add_type_reference(ty)?,
            MemberRefParent::TypeSpec(ty) => self.add_type_specification(ty)?,
            MemberRefParent::ModuleRef(module_ref) => self.add_module_reference(module_ref)?,
            MemberRefParent::Method(method) => self.get_method_definition_token(method)?,
        };

        let signature = match &reference.signature {
            MemberRefSignature::Method(method) => encode_method_signature(method, self)?,
            MemberRefSignature::Field(field) => encode_field_signature(field, self)?,
        };

        let row = MemberRefRow {
            class: CodedIndex::from_token(parent)?,
            name: self.buffer.strings.get_index(&reference.name)?,
            signature: self.buffer.blobs.get_index(&signature)?,
        };

        let preferred = preferred_rid(reference.original_token, TableId::MemberRef);
        let token = self.buffer.tables.add(TableData::MemberRef(row), preferred)?;
        self.memoize(key_of(reference), token, Retained::MemberRef(reference.clone()));

        self.add_custom_attributes(token, &reference.custom_attributes)?;
        Ok(token)
    }

    /// Imports a stand-alone signature, returning its token. Idempotent per
    /// object identity; byte-identical signatures of distinct objects share
    /// their blob but receive distinct rows.
    pub fn add_stand_alone_signature(
        &mut self,
        signature: &Arc<StandAloneSignature>,
    ) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(signature)) {
            return Ok(*token);
        }

        let encoded = match signature.as_ref() {
            StandAloneSignature::LocalVariables(locals) => {
                encode_local_var_signature(locals, self)?
            }
            StandAloneSignature::Method(method) => encode_method_signature(method, self)?,
        };

        let row = StandAloneSigRow {
            signature: self.buffer.blobs.get_index(&encoded)?,
        };

        let token = self.buffer.tables.add(TableData::StandAloneSig(row), 0)?;
        self.memoize(key_of(signature), token, Retained::Signature(signature.clone()));
        Ok(token)
    }

    /// Imports a generic method instantiation, returning its token.
    /// Idempotent per object identity.
    pub fn add_method_specification(&mut self, specification: &Arc<MethodSpec>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(specification)) {
            return Ok(*token);
        }
        self.assert_owned(specification.as_ref(), || {
            format!("method specification of {}", specification.method.name())
        })?;

        let method = self.get_method_def_or_ref_token(&specification.method)?;
        let instantiation = encode_method_spec_signature(&specification.instantiation, self)?;

        let row = MethodSpecRow {
            method: CodedIndex::from_token(method)?,
            instantiation: self.buffer.blobs.get_index(&instantiation)?,
        };

        let preferred = preferred_rid(specification.original_token, TableId::MethodSpec);
        let token = self.buffer.tables.add(TableData::MethodSpec(row), preferred)?;
        self.memoize(
            key_of(specification),
            token,
            Retained::MethodSpec(specification.clone()),
        );

        self.add_custom_attributes(token, &specification.custom_attributes)?;
        Ok(token)
    }

    /// Imports a module reference, returning its token. Idempotent per
    /// object identity.
    pub fn add_module_reference(&mut self, reference: &Arc<ModuleRef>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(reference)) {
            return Ok(*token);
        }
        self.assert_owned(reference.as_ref(), || {
            format!("module reference {}", reference.name)
        })?;

        let row = ModuleRefRow {
            name: self.buffer.strings.get_index(&reference.name)?,
        };

        let preferred = preferred_rid(reference.original_token, TableId::ModuleRef);
        let token = self.buffer.tables.add(TableData::ModuleRef(row), preferred)?;
        self.memoize(key_of(reference), token, Retained::ModuleRef(reference.clone()));

        self.add_custom_attributes(token, &reference.custom_attributes)?;
        Ok(token)
    }

    /// Imports a file row, returning its token. Idempotent per object
    /// identity.
    pub fn add_file_reference(&mut self, file: &Arc<FileReference>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(file)) {
            return Ok(*token);
        }
        self.assert_owned(file.as_ref(), || format!("file {}", file.name))?;

        let row = FileRow {
            flags: file.attributes,
            name: self.buffer.strings.get_index(&file.name)?,
            hash_value: self.buffer.blobs.get_index(&file.hash_value)?,
        };

        let preferred = preferred_rid(file.original_token, TableId::File);
        let token = self.buffer.tables.add(TableData::File(row), preferred)?;
        self.memoize(key_of(file), token, Retained::File(file.clone()));

        self.add_custom_attributes(token, &file.custom_attributes)?;
        Ok(token)
    }

    // ------------------------------------------------------------------
    // Token lookups for already-defined members
    // ------------------------------------------------------------------

    /// The token assigned to a type definition of this module.
    pub fn get_type_definition_token(&mut self, ty: &Arc<TypeDef>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(ty)) {
            return Ok(*token);
        }
        self.assert_owned(ty.as_ref(), || {
            format!("type definition {}.{}", ty.namespace, ty.name)
        })?;
        Err(Error::TokenNotFound(ty.original_token))
    }

    /// The token assigned to a method definition of this module.
    pub fn get_method_definition_token(&mut self, method: &Arc<Method>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(method)) {
            return Ok(*token);
        }
        self.assert_owned(method.as_ref(), || format!("method {}", method.name))?;
        Err(Error::TokenNotFound(method.original_token))
    }

    /// The token assigned to a field definition of this module.
    pub fn get_field_definition_token(&mut self, field: &Arc<Field>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(field)) {
            return Ok(*token);
        }
        self.assert_owned(field.as_ref(), || format!("field {}", field.name))?;
        Err(Error::TokenNotFound(field.original_token))
    }

    /// The token of any type-shaped reference, importing refs and specs on
    /// first sight.
    pub fn get_type_token(&mut self, ty: &TypeDefOrRef) -> Result<Token> {
        match ty {
            TypeDefOrRef::TypeDef(def) => self.get_type_definition_token(def),
            TypeDefOrRef::TypeRef(reference) => self.add_type_reference(reference),
            TypeDefOrRef::TypeSpec(specification) => self.add_type_specification(specification),
        }
    }

    fn get_method_def_or_ref_token(&mut self, method: &MethodDefOrRef) -> Result<Token> {
        match method {
            MethodDefOrRef::Method(definition) => self.get_method_definition_token(definition),
            MethodDefOrRef::MemberRef(reference) => self.add_member_reference(reference),
        }
    }

    // ------------------------------------------------------------------
    // Graph walk
    // ------------------------------------------------------------------

    fn assert_owned(
        &self,
        provider: &dyn ModuleProvider,
        describe: impl FnOnce() -> String,
    ) -> Result<()> {
        if provider.module() != Some(self.module.id()) {
            return Err(Error::MemberNotImported { member: describe() });
        }
        Ok(())
    }

    fn memoize(&mut self, key: usize, token: Token, retained: Retained) {
        self.tokens.insert(key, token);
        self.retained.push(retained);
    }

    fn add_module_row(&mut self) -> Result<()> {
        let row = ModuleRow {
            generation: self.module.generation,
            name: self.buffer.strings.get_index(&self.module.name)?,
            mvid: self.buffer.guids.get_index(&self.module.mvid)?,
            enc_id: 0,
            enc_base_id: 0,
        };

        self.buffer.tables.add_unique(TableData::Module(row), 1)?;
        Ok(())
    }

    /// All type definitions in emission order: declaration order for
    /// top-level types, each followed depth-first by its nested types. The
    /// implicit empty `<Module>` type is dropped when it is all there is.
    fn collect_types(&self) -> Vec<Arc<TypeDef>> {
        fn push_nested(ty: &Arc<TypeDef>, into: &mut Vec<Arc<TypeDef>>) {
            for (_, nested) in ty.nested_types.iter() {
                into.push(nested.clone());
                push_nested(nested, into);
            }
        }

        let top_level = self.module.types();
        let module_type = self.module.module_type();
        if top_level.len() == 1
            && module_type.fields.count() == 0
            && module_type.methods.count() == 0
        {
            return Vec::new();
        }

        let mut types = Vec::new();
        for ty in top_level {
            types.push(ty.clone());
            push_nested(ty, &mut types);
        }
        types
    }

    /// Phase 1: allocate a `TypeDef` row per type, memoizing tokens before
    /// anything recurses into signatures.
    fn define_types(&mut self, types: &[Arc<TypeDef>]) -> Result<()> {
        for ty in types {
            self.assert_owned(ty.as_ref(), || {
                format!("type definition {}.{}", ty.namespace, ty.name)
            })?;

            let row = TypeDefRow {
                flags: ty.attributes,
                name: self.buffer.strings.get_index(&ty.name)?,
                namespace: self.buffer.strings.get_index(&ty.namespace)?,
                extends: CodedIndex::null(),
                field_list: 0,
                method_list: 0,
            };

            let preferred = preferred_rid(ty.original_token, TableId::TypeDef);
            let token = self.buffer.tables.add(TableData::TypeDef(row), preferred)?;
            self.tokens.insert(key_of(ty), token);
        }

        Ok(())
    }

    /// Types sorted by their assigned RID, the order member runs must
    /// follow.
    fn types_in_rid_order(&self, types: &[Arc<TypeDef>]) -> Result<Vec<Arc<TypeDef>>> {
        let mut ordered: Vec<(u32, Arc<TypeDef>)> = Vec::with_capacity(types.len());
        for ty in types {
            let Some(token) = self.tokens.get(&key_of(ty)) else {
                return Err(Error::TokenNotFound(ty.original_token));
            };
            ordered.push((token.row(), ty.clone()));
        }

        ordered.sort_by_key(|(rid, _)| *rid);
        Ok(ordered.into_iter().map(|(_, ty)| ty).collect())
    }

    /// Phase 2: define fields, methods and parameters as contiguous runs in
    /// `TypeDef` RID order, backpatching the member list columns.
    fn define_members(&mut self, ordered: &[Arc<TypeDef>]) -> Result<()> {
        for ty in ordered {
            let type_token = self.get_type_definition_token(ty)?;

            let field_list = self.buffer.tables.next_rid(TableId::Field);
            for (_, field) in ty.fields.iter() {
                self.define_field(field)?;
            }

            let method_list = self.buffer.tables.next_rid(TableId::MethodDef);
            for (_, method) in ty.methods.iter() {
                self.define_method(method)?;
            }

            self.update_type_row(type_token, |row| {
                row.field_list = field_list;
                row.method_list = method_list;
            })?;
        }

        Ok(())
    }

    fn define_field(&mut self, field: &Arc<Field>) -> Result<()> {
        self.assert_owned(field.as_ref(), || format!("field {}", field.name))?;

        let signature = encode_field_signature(&field.signature, self)?;
        let row = FieldRow {
            flags: field.attributes,
            name: self.buffer.strings.get_index(&field.name)?,
            signature: self.buffer.blobs.get_index(&signature)?,
        };

        // Fields and methods must form contiguous runs, so a preferred RID
        // is only usable when it happens to be the next slot anyway.
        let token = self.buffer.tables.add(TableData::Field(row), 0)?;
        self.tokens.insert(key_of(field), token);
        Ok(())
    }

    fn define_method(&mut self, method: &Arc<Method>) -> Result<()> {
        self.assert_owned(method.as_ref(), || format!("method {}", method.name))?;

        let signature = encode_method_signature(&method.signature, self)?;
        let param_list = self.buffer.tables.next_rid(TableId::Param);

        let row = MethodDefRow {
            rva: 0,
            impl_flags: method.impl_attributes,
            flags: method.attributes,
            name: self.buffer.strings.get_index(&method.name)?,
            signature: self.buffer.blobs.get_index(&signature)?,
            param_list,
        };

        let token = self.buffer.tables.add(TableData::MethodDef(row), 0)?;
        self.tokens.insert(key_of(method), token);

        for (_, param) in method.params.iter() {
            let param_row = crate::metadata::tables::ParamRow {
                flags: param.attributes,
                sequence: param.sequence,
                name: self.buffer.strings.get_index(&param.name)?,
            };
            let param_token = self.buffer.tables.add(TableData::Param(param_row), 0)?;
            self.tokens.insert(key_of(param), param_token);
        }

        Ok(())
    }

    /// Phase 3: everything that hangs off the now-tokenized types.
    fn finalize_types(&mut self, ordered: &[Arc<TypeDef>]) -> Result<()> {
        for ty in ordered {
            let type_token = self.get_type_definition_token(ty)?;

            if let Some(base) = ty.base_type() {
                let base = base.clone();
                let base_token = self.get_type_token(&base)?;
                let extends = CodedIndex::from_token(base_token)?;
                self.update_type_row(type_token, |row| row.extends = extends)?;
            }

            for (_, interface) in ty.interfaces.iter() {
                let interface = interface.clone();
                let interface_token = self.get_type_token(&interface)?;
                self.buffer.tables.add(
                    TableData::InterfaceImpl(InterfaceImplRow {
                        class: type_token.row(),
                        interface: CodedIndex::from_token(interface_token)?,
                    }),
                    0,
                )?;
            }

            if let Some(layout) = ty.class_layout.get() {
                self.buffer.tables.add(
                    TableData::ClassLayout(ClassLayoutRow {
                        packing_size: layout.packing_size,
                        class_size: layout.class_size,
                        parent: type_token.row(),
                    }),
                    0,
                )?;
            }

            for (_, nested) in ty.nested_types.iter() {
                let nested = nested.clone();
                let nested_token = self.get_type_definition_token(&nested)?;
                self.buffer.tables.add(
                    TableData::NestedClass(NestedClassRow {
                        nested_class: nested_token.row(),
                        enclosing_class: type_token.row(),
                    }),
                    0,
                )?;
            }

            self.add_generic_params(type_token, &ty.generic_params)?;

            for (_, entry) in ty.method_impls.iter() {
                let declaration = entry.declaration.clone();
                let body = entry.body.clone();
                let declaration = self.get_method_def_or_ref_token(&declaration)?;
                let body = self.get_method_def_or_ref_token(&body)?;
                self.buffer.tables.add(
                    TableData::MethodImpl(MethodImplRow {
                        class: type_token.row(),
                        method_body: CodedIndex::from_token(body)?,
                        method_declaration: CodedIndex::from_token(declaration)?,
                    }),
                    0,
                )?;
            }

            self.add_security_declarations(type_token, &ty.security)?;
            self.add_custom_attributes(type_token, &ty.custom_attributes)?;

            for (_, field) in ty.fields.iter() {
                let field = field.clone();
                self.finalize_field(&field)?;
            }

            for (_, method) in ty.methods.iter() {
                let method = method.clone();
                self.finalize_method(&method)?;
            }

            self.add_properties(type_token, ty)?;
            self.add_events(type_token, ty)?;
        }

        Ok(())
    }

    fn finalize_field(&mut self, field: &Arc<Field>) -> Result<()> {
        let field_token = self.get_field_definition_token(field)?;

        if let Some(constant) = field.constant.get() {
            self.add_constant(field_token, constant)?;
        }

        if let Some(offset) = field.layout_offset.get() {
            self.buffer.tables.add(
                TableData::FieldLayout(FieldLayoutRow {
                    offset: *offset,
                    field: field_token.row(),
                }),
                0,
            )?;
        }

        if let Some(marshal) = field.marshal.get() {
            self.add_field_marshal(field_token, marshal)?;
        }

        if let Some(data) = field.initial_data.get() {
            // Mapped field data is 8-byte aligned within the code segment
            while self.code.len() % 8 != 0 {
                self.code.push(0);
            }
            let rva = crate::utils::to_u32(self.code.len())?;
            self.code.extend_from_slice(data);

            self.buffer.tables.add(
                TableData::FieldRva(FieldRvaRow {
                    rva,
                    field: field_token.row(),
                }),
                0,
            )?;
        }

        self.add_custom_attributes(field_token, &field.custom_attributes)?;
        Ok(())
    }

    fn finalize_method(&mut self, method: &Arc<Method>) -> Result<()> {
        let method_token = self.get_method_definition_token(method)?;

        self.add_generic_params(method_token, &method.generic_params)?;

        if let Some(pinvoke) = method.pinvoke.get() {
            let scope = self.add_module_reference(&pinvoke.scope)?;
            self.buffer.tables.add(
                TableData::ImplMap(ImplMapRow {
                    mapping_flags: pinvoke.attributes,
                    member_forwarded: CodedIndex::from_token(method_token)?,
                    import_name: self.buffer.strings.get_index(&pinvoke.entry_point)?,
                    import_scope: scope.row(),
                }),
                0,
            )?;
        }

        self.add_security_declarations(method_token, &method.security)?;
        self.add_custom_attributes(method_token, &method.custom_attributes)?;

        for (_, param) in method.params.iter() {
            let Some(param_token) = self.tokens.get(&key_of(param)).copied() else {
                continue;
            };

            if let Some(constant) = param.constant.get() {
                self.add_constant(param_token, constant)?;
            }
            if let Some(marshal) = param.marshal.get() {
                self.add_field_marshal(param_token, marshal)?;
            }
            self.add_custom_attributes(param_token, &param.custom_attributes)?;
        }

        Ok(())
    }

    fn add_properties(&mut self, type_token: Token, ty: &Arc<TypeDef>) -> Result<()> {
        if ty.properties.count() == 0 {
            return Ok(());
        }

        let property_list = self.buffer.tables.next_rid(TableId::Property);
        self.buffer.tables.add(
            TableData::PropertyMap(PropertyMapRow {
                parent: type_token.row(),
                property_list,
            }),
            0,
        )?;

        for (_, property) in ty.properties.iter() {
            let property = property.clone();
            self.add_property(&property)?;
        }

        Ok(())
    }

    fn add_property(&mut self, property: &Arc<Property>) -> Result<()> {
        let signature = encode_property_signature(&property.signature, self)?;
        let row = PropertyRow {
            flags: property.attributes,
            name: self.buffer.strings.get_index(&property.name)?,
            signature: self.buffer.blobs.get_index(&signature)?,
        };
        let property_token = self.buffer.tables.add(TableData::Property(row), 0)?;

        if let Some(getter) = property.getter.get() {
            self.add_method_semantics(
                property_token,
                getter,
                MethodSemanticsAttributes::GETTER,
            )?;
        }
        if let Some(setter) = property.setter.get() {
            self.add_method_semantics(
                property_token,
                setter,
                MethodSemanticsAttributes::SETTER,
            )?;
        }
        for (_, other) in property.other.iter() {
            let other = other.clone();
            self.add_method_semantics(property_token, &other, MethodSemanticsAttributes::OTHER)?;
        }

        if let Some(constant) = property.constant.get() {
            self.add_constant(property_token, constant)?;
        }

        self.add_custom_attributes(property_token, &property.custom_attributes)?;
        Ok(())
    }

    fn add_events(&mut self, type_token: Token, ty: &Arc<TypeDef>) -> Result<()> {
        if ty.events.count() == 0 {
            return Ok(());
        }

        let event_list = self.buffer.tables.next_rid(TableId::Event);
        self.buffer.tables.add(
            TableData::EventMap(EventMapRow {
                parent: type_token.row(),
                event_list,
            }),
            0,
        )?;

        for (_, event) in ty.events.iter() {
            let event = event.clone();

            let event_type = self.get_type_token(&event.event_type)?;
            let row = EventRow {
                flags: event.attributes,
                name: self.buffer.strings.get_index(&event.name)?,
                event_type: CodedIndex::from_token(event_type)?,
            };
            let event_token = self.buffer.tables.add(TableData::Event(row), 0)?;

            if let Some(add) = event.add_method.get() {
                self.add_method_semantics(event_token, add, MethodSemanticsAttributes::ADD_ON)?;
            }
            if let Some(remove) = event.remove_method.get() {
                self.add_method_semantics(
                    event_token,
                    remove,
                    MethodSemanticsAttributes::REMOVE_ON,
                )?;
            }
            if let Some(fire) = event.fire_method.get() {
                self.add_method_semantics(event_token, fire, MethodSemanticsAttributes::FIRE)?;
            }
            for (_, other) in event.other.iter() {
                let other = other.clone();
                self.add_method_semantics(event_token, &other, MethodSemanticsAttributes::OTHER)?;
            }

            self.add_custom_attributes(event_token, &event.custom_attributes)?;
        }

        Ok(())
    }

    fn add_method_semantics(
        &mut self,
        association: Token,
        method: &Arc<Method>,
        semantics: u16,
    ) -> Result<()> {
        let method_token = self.get_method_definition_token(method)?;
        self.buffer.tables.add(
            TableData::MethodSemantics(MethodSemanticsRow {
                semantics,
                method: method_token.row(),
                association: CodedIndex::from_token(association)?,
            }),
            0,
        )?;
        Ok(())
    }

    fn add_generic_params(
        &mut self,
        owner: Token,
        params: &boxcar::Vec<Arc<GenericParam>>,
    ) -> Result<()> {
        for (_, param) in params.iter() {
            let row = GenericParamRow {
                number: param.number,
                flags: param.attributes,
                owner: CodedIndex::from_token(owner)?,
                name: self.buffer.strings.get_index(&param.name)?,
            };
            let param_token = self.buffer.tables.add(TableData::GenericParam(row), 0)?;

            for (_, constraint) in param.constraints.iter() {
                let constraint = constraint.clone();
                let constraint_token = self.get_type_token(&constraint)?;
                self.buffer.tables.add(
                    TableData::GenericParamConstraint(GenericParamConstraintRow {
                        owner: param_token.row(),
                        constraint: CodedIndex::from_token(constraint_token)?,
                    }),
                    0,
                )?;
            }

            self.add_custom_attributes(param_token, &param.custom_attributes)?;
        }

        Ok(())
    }

    fn add_constant(&mut self, parent: Token, constant: &Constant) -> Result<()> {
        let row = ConstantRow {
            base_type: constant.element_type,
            parent: CodedIndex::from_token(parent)?,
            value: self.buffer.blobs.get_index(&constant.value)?,
        };
        self.buffer.tables.add(TableData::Constant(row), 0)?;
        Ok(())
    }

    fn add_field_marshal(&mut self, parent: Token, marshal: &MarshalDescriptor) -> Result<()> {
        let row = FieldMarshalRow {
            parent: CodedIndex::from_token(parent)?,
            native_type: self.buffer.blobs.get_index(&marshal.0)?,
        };
        self.buffer.tables.add(TableData::FieldMarshal(row), 0)?;
        Ok(())
    }

    fn add_security_declarations(
        &mut self,
        parent: Token,
        declarations: &boxcar::Vec<Arc<SecurityDeclaration>>,
    ) -> Result<()> {
        for (_, declaration) in declarations.iter() {
            let row = DeclSecurityRow {
                action: declaration.action,
                parent: CodedIndex::from_token(parent)?,
                permission_set: self.buffer.blobs.get_index(&declaration.permission_set)?,
            };
            self.buffer.tables.add(TableData::DeclSecurity(row), 0)?;
        }
        Ok(())
    }

    fn add_custom_attributes(
        &mut self,
        parent: Token,
        attributes: &boxcar::Vec<Arc<CustomAttribute>>,
    ) -> Result<()> {
        for (_, attribute) in attributes.iter() {
            let attribute = attribute.clone();
            let constructor = self.get_method_def_or_ref_token(&attribute.constructor)?;

            let row = CustomAttributeRow {
                parent: CodedIndex::from_token(parent)?,
                constructor: CodedIndex::from_token(constructor)?,
                value: self.buffer.blobs.get_index(&attribute.value)?,
            };
            self.buffer.tables.add(TableData::CustomAttribute(row), 0)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Manifest
    // ------------------------------------------------------------------

    fn add_assembly(&mut self) -> Result<()> {
        let module = self.module;
        let Some(assembly) = &module.assembly else {
            return Ok(());
        };

        let row = AssemblyRow {
            hash_alg_id: assembly.hash_algorithm,
            major_version: assembly.version.major,
            minor_version: assembly.version.minor,
            build_number: assembly.version.build,
            revision_number: assembly.version.revision,
            flags: assembly.attributes,
            public_key: self.buffer.blobs.get_index(&assembly.public_key)?,
            name: self.buffer.strings.get_index(&assembly.name)?,
            culture: self.buffer.strings.get_index(&assembly.culture)?,
        };

        let token = self.buffer.tables.add_unique(TableData::Assembly(row), 1)?;
        self.add_assembly_annotations(token, assembly)
    }

    fn add_assembly_annotations(&mut self, token: Token, assembly: &Assembly) -> Result<()> {
        self.add_security_declarations(token, &assembly.security)?;
        self.add_custom_attributes(token, &assembly.custom_attributes)
    }

    fn add_manifest(&mut self) -> Result<()> {
        for (_, file) in self.module.files.iter() {
            let file = file.clone();
            self.add_file_reference(&file)?;
        }

        for (_, exported) in self.module.exported_types.iter() {
            let exported = exported.clone();
            self.add_exported_type(&exported)?;
        }

        for (_, resource) in self.module.resources.iter() {
            let resource = resource.clone();
            self.add_manifest_resource(&resource)?;
        }

        Ok(())
    }

    fn add_exported_type(&mut self, exported: &Arc<ExportedType>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(exported)) {
            return Ok(*token);
        }
        self.assert_owned(exported.as_ref(), || {
            format!("exported type {}.{}", exported.namespace, exported.name)
        })?;

        let implementation = match &exported.implementation {
            ExportedTypeImplementation::File(file) => self.add_file_reference(file)?,
            ExportedTypeImplementation::AssemblyRef(assembly_ref) => {
                self.add_assembly_reference(assembly_ref)?
            }
            ExportedTypeImplementation::ExportedType(enclosing) => {
                self.add_exported_type(enclosing)?
            }
        };

        let row = ExportedTypeRow {
            flags: exported.attributes,
            type_def_id: exported.type_def_id,
            name: self.buffer.strings.get_index(&exported.name)?,
            namespace: self.buffer.strings.get_index(&exported.namespace)?,
            implementation: CodedIndex::from_token(implementation)?,
        };

        let preferred = preferred_rid(exported.original_token, TableId::ExportedType);
        let token = self
            .buffer
            .tables
            .add(TableData::ExportedType(row), preferred)?;
        self.memoize(key_of(exported), token, Retained::ExportedType(exported.clone()));

        self.add_custom_attributes(token, &exported.custom_attributes)?;
        Ok(token)
    }

    fn add_manifest_resource(&mut self, resource: &Arc<ManifestResource>) -> Result<Token> {
        if let Some(token) = self.tokens.get(&key_of(resource)) {
            return Ok(*token);
        }
        self.assert_owned(resource.as_ref(), || {
            format!("manifest resource {}", resource.name)
        })?;

        let (offset, implementation) = match &resource.data {
            ResourceData::Embedded(payload) => (self.resources.add(payload)?, CodedIndex::null()),
            ResourceData::File { file, offset } => {
                let file_token = self.add_file_reference(file)?;
                (*offset, CodedIndex::from_token(file_token)?)
            }
            ResourceData::Assembly(assembly_ref) => {
                let assembly_token = self.add_assembly_reference(assembly_ref)?;
                (0, CodedIndex::from_token(assembly_token)?)
            }
        };

        let row = ManifestResourceRow {
            offset,
            flags: resource.attributes,
            name: self.buffer.strings.get_index(&resource.name)?,
            implementation,
        };

        let preferred = preferred_rid(resource.original_token, TableId::ManifestResource);
        let token = self
            .buffer
            .tables
            .add(TableData::ManifestResource(row), preferred)?;
        self.memoize(key_of(resource), token, Retained::Resource(resource.clone()));

        self.add_custom_attributes(token, &resource.custom_attributes)?;
        Ok(token)
    }

    // ------------------------------------------------------------------
    // Method bodies
    // ------------------------------------------------------------------

    /// Phase 5: serialize every method body into the code segment and
    /// backpatch the RVA columns. Runs after all definitions exist so body
    /// operands resolve without forward references.
    fn serialize_method_bodies(&mut self, ordered: &[Arc<TypeDef>]) -> Result<()> {
        for ty in ordered {
            for (_, method) in ty.methods.iter() {
                let method = method.clone();
                let Some(body) = method.body.get() else {
                    continue;
                };

                let method_token = self.get_method_definition_token(&method)?;

                let locals_token = if body.locals.locals.is_empty() {
                    Token::new(0)
                } else {
                    self.add_local_variables_signature(&body.locals)?
                };

                let bytes = body.serialize(locals_token, self)?;

                // Fat bodies must start on a 4-byte boundary
                if bytes.first().is_some_and(|first| first & 0x3 == 0x3) {
                    while self.code.len() % 4 != 0 {
                        self.code.push(0);
                    }
                }

                let rva = crate::utils::to_u32(self.code.len())?;
                self.code.extend_from_slice(&bytes);

                self.update_method_row(method_token, |row| row.rva = rva)?;
            }
        }

        Ok(())
    }

    /// Creates a `StandAloneSig` row for a body's local variable layout.
    /// Each body gets its own row; byte-identical layouts share their blob.
    fn add_local_variables_signature(
        &mut self,
        locals: &SignatureLocalVariables,
    ) -> Result<Token> {
        let encoded = encode_local_var_signature(locals, self)?;
        let row = StandAloneSigRow {
            signature: self.buffer.blobs.get_index(&encoded)?,
        };
        self.buffer.tables.add(TableData::StandAloneSig(row), 0)
    }

    // ------------------------------------------------------------------
    // Row backpatching
    // ------------------------------------------------------------------

    fn update_type_row(
        &mut self,
        token: Token,
        update: impl FnOnce(&mut TypeDefRow),
    ) -> Result<()> {
        let Some(TableData::TypeDef(row)) = self.buffer.tables.get(token) else {
            return Err(Error::TokenNotFound(token));
        };

        let mut row = row.clone();
        update(&mut row);
        self.buffer.tables.replace(token, TableData::TypeDef(row))
    }

    fn update_method_row(
        &mut self,
        token: Token,
        update: impl FnOnce(&mut MethodDefRow),
    ) -> Result<()> {
        let Some(TableData::MethodDef(row)) = self.buffer.tables.get(token) else {
            return Err(Error::TokenNotFound(token));
        };

        let mut row = row.clone();
        update(&mut row);
        self.buffer.tables.replace(token, TableData::MethodDef(row))
    }
}

/// The preferred RID of an object: its original token's row when that token
/// addresses the right table, 0 otherwise.
fn preferred_rid(original: Token, table: TableId) -> u32 {
    if original.table() == table.token_type() {
        original.row()
    } else {
        0
    }
}

impl TypeIndexResolver for DotNetDirectoryBuilder<'_> {
    fn type_def_or_ref_index(&mut self, ty: &TypeDefOrRef) -> Result<u32> {
        let token = self.get_type_token(ty)?;
        crate::metadata::tables::CodedIndexType::TypeDefOrRef.encode(token)
    }
}

impl TokenProvider for DotNetDirectoryBuilder<'_> {
    fn token_for(&mut self, reference: &CilRef) -> Result<Token> {
        match reference {
            CilRef::Type(ty) => self.get_type_token(ty),
            CilRef::Method(method) => self.get_method_definition_token(method),
            CilRef::MemberRef(member) => self.add_member_reference(member),
            CilRef::MethodSpec(specification) => self.add_method_specification(specification),
            CilRef::Field(field) => self.get_field_definition_token(field),
            CilRef::Signature(signature) => self.add_stand_alone_signature(signature),
        }
    }

    fn user_string_token(&mut self, value: &str) -> Result<Token> {
        Ok(Token::user_string(
            self.buffer.user_strings.get_index(value)?,
        ))
    }
}
