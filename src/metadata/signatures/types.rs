use crate::metadata::model::TypeDefOrRef;

/// Element type constants from ECMA-335 §II.23.1.16, the building blocks of
/// every encoded signature.
#[allow(non_snake_case, dead_code)]
pub mod ELEMENT_TYPE {
    /// Marks the end of a list in signatures
    pub const END: u8 = 0x00;
    /// Void type (no return value)
    pub const VOID: u8 = 0x01;
    /// Boolean type (true/false)
    pub const BOOLEAN: u8 = 0x02;
    /// 16-bit Unicode character
    pub const CHAR: u8 = 0x03;
    /// Signed 8-bit integer
    pub const I1: u8 = 0x04;
    /// Unsigned 8-bit integer
    pub const U1: u8 = 0x05;
    /// Signed 16-bit integer
    pub const I2: u8 = 0x06;
    /// Unsigned 16-bit integer
    pub const U2: u8 = 0x07;
    /// Signed 32-bit integer
    pub const I4: u8 = 0x08;
    /// Unsigned 32-bit integer
    pub const U4: u8 = 0x09;
    /// Signed 64-bit integer
    pub const I8: u8 = 0x0a;
    /// Unsigned 64-bit integer
    pub const U8: u8 = 0x0b;
    /// 32-bit floating point
    pub const R4: u8 = 0x0c;
    /// 64-bit floating point
    pub const R8: u8 = 0x0d;
    /// String type
    pub const STRING: u8 = 0x0e;
    /// Unmanaged pointer (followed by type)
    pub const PTR: u8 = 0x0f;
    /// Managed reference (followed by type)
    pub const BYREF: u8 = 0x10;
    /// Value type (followed by a `TypeDefOrRef` coded index)
    pub const VALUETYPE: u8 = 0x11;
    /// Reference type (followed by a `TypeDefOrRef` coded index)
    pub const CLASS: u8 = 0x12;
    /// Generic parameter of a type, by number
    pub const VAR: u8 = 0x13;
    /// Multi-dimensional array (type, rank, sizes, lower bounds)
    pub const ARRAY: u8 = 0x14;
    /// Generic instantiation (base, argument count, arguments)
    pub const GENERICINST: u8 = 0x15;
    /// Typed reference
    pub const TYPEDBYREF: u8 = 0x16;
    /// Native integer (System.IntPtr)
    pub const I: u8 = 0x18;
    /// Native unsigned integer (System.UIntPtr)
    pub const U: u8 = 0x19;
    /// Function pointer (followed by a full method signature)
    pub const FNPTR: u8 = 0x1b;
    /// System.Object
    pub const OBJECT: u8 = 0x1c;
    /// Single-dimension, zero-based array
    pub const SZARRAY: u8 = 0x1d;
    /// Generic parameter of a method, by number
    pub const MVAR: u8 = 0x1e;
    /// Required modifier (followed by a `TypeDefOrRef` coded index)
    pub const CMOD_REQD: u8 = 0x1f;
    /// Optional modifier (followed by a `TypeDefOrRef` coded index)
    pub const CMOD_OPT: u8 = 0x20;
    /// Sentinel separating fixed and variable arguments
    pub const SENTINEL: u8 = 0x41;
    /// Pinned local variable
    pub const PINNED: u8 = 0x45;
}

/// Signature kind prologs (first byte of a signature blob).
#[allow(non_snake_case)]
pub mod SIGNATURE_HEADER {
    /// Field signature
    pub const FIELD: u8 = 0x06;
    /// Local variable signature
    pub const LOCAL_SIG: u8 = 0x07;
    /// Property signature
    pub const PROPERTY: u8 = 0x08;
    /// Generic method instantiation
    pub const GENERIC_INST: u8 = 0x0A;
}

/// Calling convention bits of a method signature header.
#[allow(non_snake_case)]
pub mod CALLING_CONVENTION {
    /// Managed default
    pub const DEFAULT: u8 = 0x00;
    /// Unmanaged cdecl
    pub const C: u8 = 0x01;
    /// Unmanaged stdcall
    pub const STDCALL: u8 = 0x02;
    /// Unmanaged thiscall
    pub const THISCALL: u8 = 0x03;
    /// Unmanaged fastcall
    pub const FASTCALL: u8 = 0x04;
    /// Managed vararg
    pub const VARARG: u8 = 0x05;
    /// Method carries generic parameters
    pub const GENERIC: u8 = 0x10;
    /// Instance method (`this` passed implicitly)
    pub const HASTHIS: u8 = 0x20;
    /// `this` is listed explicitly in the parameters
    pub const EXPLICITTHIS: u8 = 0x40;
}

/// One dimension of a multi-dimensional array shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayDimension {
    /// Number of elements, absent when unbounded
    pub size: Option<u32>,
    /// Lower bound, absent when unspecified
    pub lower_bound: Option<i32>,
}

/// A parsed type as it appears inside signatures.
///
/// Embedded type references carry the model object rather than a raw token;
/// the encoder resolves them to `TypeDefOrRef` coded indices through the
/// directory builder, which assigns tokens on first sight.
#[derive(Debug, Clone, Default)]
pub enum TypeSignature {
    /// Not defined
    #[default]
    Unknown,
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// System.Object
    Object,
    /// signed integer, sized to the executing platform
    I,
    /// unsigned integer, sized to the executing platform
    U,
    /// Typed reference, carried at runtime
    TypedByRef,
    /// A pointer to a type
    Ptr(SignaturePointer),
    /// Type passed by reference
    ByRef(Box<TypeSignature>),
    /// A value type, by `TypeDefOrRef` reference
    ValueType(TypeDefOrRef),
    /// A reference type, by `TypeDefOrRef` reference
    Class(TypeDefOrRef),
    /// Generic parameter of the enclosing type, by number
    GenericParamType(u32),
    /// Generic parameter of the enclosing method, by number
    GenericParamMethod(u32),
    /// Multi-dimensional array
    Array(SignatureArray),
    /// Single-dimension, zero-based array
    SzArray(SignatureSzArray),
    /// Generic instantiation: base type and its arguments. The base must be
    /// a [`TypeSignature::Class`] or [`TypeSignature::ValueType`].
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Function pointer carrying a full method signature
    FnPtr(Box<SignatureMethod>),
    /// A pinned local variable type
    Pinned(Box<TypeSignature>),
    /// Sentinel separating fixed from variable arguments
    Sentinel,
}

/// A required (`modreq`) or optional (`modopt`) custom modifier.
#[derive(Debug, Clone)]
pub struct CustomModifier {
    /// True for `modreq`, false for `modopt`
    pub required: bool,
    /// The modifier type
    pub modifier_type: TypeDefOrRef,
}

/// A multi-dimensional array shape.
#[derive(Debug, Clone, Default)]
pub struct SignatureArray {
    /// The element type
    pub base: Box<TypeSignature>,
    /// Number of dimensions
    pub rank: u32,
    /// Known dimensions, leading-first; may be fewer than `rank`
    pub dimensions: Vec<ArrayDimension>,
}

/// A single-dimension, zero-based array.
#[derive(Debug, Clone, Default)]
pub struct SignatureSzArray {
    /// Custom modifiers applied to the element type
    pub modifiers: Vec<CustomModifier>,
    /// The element type
    pub base: Box<TypeSignature>,
}

/// An unmanaged pointer type.
#[derive(Debug, Clone, Default)]
pub struct SignaturePointer {
    /// Custom modifiers applied to the pointee
    pub modifiers: Vec<CustomModifier>,
    /// The pointed-to type
    pub base: Box<TypeSignature>,
}

/// A parameter or return type with its modifiers.
#[derive(Debug, Clone, Default)]
pub struct SignatureParameter {
    /// Custom modifiers of the parameter
    pub modifiers: Vec<CustomModifier>,
    /// Parameter is passed by reference
    pub by_ref: bool,
    /// The type of the parameter
    pub base: TypeSignature,
}

/// A method signature (ECMA §II.23.2.1).
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SignatureMethod {
    /// Instance method; `this` is passed implicitly
    pub has_this: bool,
    /// `this` appears explicitly in the parameter list
    pub explicit_this: bool,
    /// Managed vararg calling convention
    pub vararg: bool,
    /// Unmanaged cdecl calling convention
    pub cdecl: bool,
    /// Unmanaged stdcall calling convention
    pub stdcall: bool,
    /// Unmanaged thiscall calling convention
    pub thiscall: bool,
    /// Unmanaged fastcall calling convention
    pub fastcall: bool,
    /// Number of generic parameters, 0 for non-generic methods
    pub generic_param_count: u32,
    /// The return type
    pub return_type: SignatureParameter,
    /// The fixed parameters
    pub params: Vec<SignatureParameter>,
    /// The variable parameters of a vararg call site, emitted after the
    /// sentinel
    pub varargs: Vec<SignatureParameter>,
}

impl SignatureMethod {
    /// A static, non-generic managed method with the given return type and
    /// parameters.
    #[must_use]
    pub fn new_static(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        SignatureMethod {
            return_type: SignatureParameter {
                base: return_type,
                ..Default::default()
            },
            params: params
                .into_iter()
                .map(|base| SignatureParameter {
                    base,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    /// An instance variant of [`Self::new_static`].
    #[must_use]
    pub fn new_instance(return_type: TypeSignature, params: Vec<TypeSignature>) -> Self {
        let mut signature = Self::new_static(return_type, params);
        signature.has_this = true;
        signature
    }
}

/// A field signature (ECMA §II.23.2.4).
#[derive(Debug, Clone, Default)]
pub struct SignatureField {
    /// Custom modifiers of the field type
    pub modifiers: Vec<CustomModifier>,
    /// The field type
    pub base: TypeSignature,
}

impl SignatureField {
    /// A plain field of the given type.
    #[must_use]
    pub fn new(base: TypeSignature) -> Self {
        SignatureField {
            modifiers: Vec::new(),
            base,
        }
    }
}

/// A property signature (ECMA §II.23.2.5).
#[derive(Debug, Clone, Default)]
pub struct SignatureProperty {
    /// Instance property
    pub has_this: bool,
    /// Custom modifiers of the property type
    pub modifiers: Vec<CustomModifier>,
    /// The property type
    pub base: TypeSignature,
    /// Indexer parameters
    pub params: Vec<SignatureParameter>,
}

/// A local variable signature (ECMA §II.23.2.6).
#[derive(Debug, Clone, Default)]
pub struct SignatureLocalVariables {
    /// The local variables, in slot order
    pub locals: Vec<SignatureLocalVariable>,
}

/// One local variable slot.
#[derive(Debug, Clone, Default)]
pub struct SignatureLocalVariable {
    /// Custom modifiers
    pub modifiers: Vec<CustomModifier>,
    /// Passed by reference
    pub is_byref: bool,
    /// Pinned in place for the duration of the method
    pub is_pinned: bool,
    /// The variable type
    pub base: TypeSignature,
}

/// A type specification signature (ECMA §II.23.2.14).
#[derive(Debug, Clone, Default)]
pub struct SignatureTypeSpec {
    /// The described type
    pub base: TypeSignature,
}

/// A generic method instantiation signature (ECMA §II.23.2.15).
#[derive(Debug, Clone, Default)]
pub struct SignatureMethodSpec {
    /// The generic arguments
    pub generic_args: Vec<TypeSignature>,
}
