//! Manifest-level objects: the assembly definition, assembly references,
//! files, exported types and resources.

use std::sync::{Arc, OnceLock};

use crate::metadata::{
    identity::{AssemblyHashAlgorithm, Identity},
    model::{CustomAttribute, ModuleId, ModuleProvider, SecurityDeclaration},
    token::Token,
};

/// Assembly attribute flag: the reference carries a full public key rather
/// than a token.
pub const ASSEMBLY_FLAG_PUBLIC_KEY: u32 = 0x0001;

/// A four-part assembly version number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Version {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl Version {
    /// Creates a version from its four components.
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Version {
            major,
            minor,
            build,
            revision,
        }
    }
}

/// The manifest of the assembly being built.
pub struct Assembly {
    /// Assembly name, without extension
    pub name: String,
    /// Assembly version
    pub version: Version,
    /// Assembly attributes bitmask
    pub attributes: u32,
    /// Hash algorithm used for file hashes and key token derivation
    pub hash_algorithm: u32,
    /// Full public key bytes; empty when the assembly is unsigned
    pub public_key: Vec<u8>,
    /// Culture string, empty for the neutral culture
    pub culture: String,
    /// Declarative security attached to the assembly
    pub security: boxcar::Vec<Arc<SecurityDeclaration>>,
    /// Custom attributes on the assembly
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl Assembly {
    /// Creates an unsigned, culture-neutral assembly manifest.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Assembly {
            name: name.into(),
            version,
            attributes: 0,
            hash_algorithm: AssemblyHashAlgorithm::SHA1,
            public_key: Vec::new(),
            culture: String::new(),
            security: boxcar::Vec::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }
}

/// A reference to another assembly.
pub struct AssemblyRef {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this reference carried in its source image
    pub original_token: Token,
    /// Name of the referenced assembly
    pub name: String,
    /// Version of the referenced assembly
    pub version: Version,
    /// Reference attributes bitmask; [`ASSEMBLY_FLAG_PUBLIC_KEY`] selects the
    /// full-key form of the identity blob
    pub attributes: u32,
    /// Identity of the target, absent for unsigned references
    pub identity: Option<Identity>,
    /// Culture string, empty for the neutral culture
    pub culture: String,
    /// Hash of the referenced assembly, empty when absent
    pub hash_value: Vec<u8>,
    /// Custom attributes on the reference
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl AssemblyRef {
    /// Creates an identity-less assembly reference.
    #[must_use]
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        AssemblyRef {
            module: OnceLock::new(),
            original_token: Token::new(0),
            name: name.into(),
            version,
            attributes: 0,
            identity: None,
            culture: String::new(),
            hash_value: Vec::new(),
            custom_attributes: boxcar::Vec::new(),
        }
    }

    /// The `PublicKeyOrToken` blob bytes for this reference.
    ///
    /// With [`ASSEMBLY_FLAG_PUBLIC_KEY`] set the full key is emitted
    /// verbatim; otherwise a full key is reduced to its 8-byte token using
    /// `hash_algorithm`, and a token identity passes through.
    ///
    /// # Errors
    /// Returns an error if the flag requests a full key but the identity only
    /// carries a token, or the hash algorithm is unknown.
    pub fn identity_blob(&self, hash_algorithm: u32) -> crate::Result<Vec<u8>> {
        match &self.identity {
            None => Ok(Vec::new()),
            Some(identity) => {
                if self.attributes & ASSEMBLY_FLAG_PUBLIC_KEY != 0 {
                    match identity {
                        Identity::PubKey(key) => Ok(key.clone()),
                        Identity::Token(_) => Err(malformed_error!(
                            "Assembly reference {} requests a full public key but only carries a token",
                            self.name
                        )),
                    }
                } else {
                    Ok(identity.token_bytes(hash_algorithm)?.to_vec())
                }
            }
        }
    }
}

impl ModuleProvider for AssemblyRef {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// A file belonging to a multi-file assembly.
pub struct FileReference {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this file row carried in its source image
    pub original_token: Token,
    /// File name
    pub name: String,
    /// File attributes bitmask (0 = contains metadata)
    pub attributes: u32,
    /// Hash of the file contents
    pub hash_value: Vec<u8>,
    /// Custom attributes on the file row
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for FileReference {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// Where an exported type is actually defined.
#[derive(Clone)]
pub enum ExportedTypeImplementation {
    /// In another file of this assembly
    File(Arc<FileReference>),
    /// Forwarded to another assembly
    AssemblyRef(Arc<AssemblyRef>),
    /// Nested within another exported type
    ExportedType(Arc<ExportedType>),
}

/// A type exported or forwarded by this assembly.
pub struct ExportedType {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this row carried in its source image
    pub original_token: Token,
    /// Type attributes bitmask
    pub attributes: u32,
    /// Hint: the type's `TypeDef` RID in its defining module, may be 0
    pub type_def_id: u32,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// The defining location
    pub implementation: ExportedTypeImplementation,
    /// Custom attributes on the row
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for ExportedType {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}

/// Where a manifest resource's payload lives.
pub enum ResourceData {
    /// Embedded in this image; the payload lands in the resources blob
    Embedded(Vec<u8>),
    /// Stored in another file of the assembly at the given offset
    File {
        /// The containing file
        file: Arc<FileReference>,
        /// Byte offset within that file
        offset: u32,
    },
    /// Defined by another assembly
    Assembly(Arc<AssemblyRef>),
}

/// A manifest resource.
pub struct ManifestResource {
    pub(crate) module: OnceLock<ModuleId>,
    /// Token this row carried in its source image
    pub original_token: Token,
    /// Resource name
    pub name: String,
    /// Resource attributes bitmask (1 = public, 2 = private)
    pub attributes: u32,
    /// The resource payload location
    pub data: ResourceData,
    /// Custom attributes on the row
    pub custom_attributes: boxcar::Vec<Arc<CustomAttribute>>,
}

impl ModuleProvider for ManifestResource {
    fn module(&self) -> Option<ModuleId> {
        self.module.get().copied()
    }
}
