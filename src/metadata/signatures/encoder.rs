//! Signature blob encoders per ECMA-335 §II.23.2.
//!
//! Signatures embed references to other types; during encoding each embedded
//! [`TypeDefOrRef`] is resolved to its compressed coded index by calling back
//! into the directory builder through [`TypeIndexResolver`]. Type import and
//! signature emission are therefore mutually recursive: importing a type may
//! serialize its signatures, which may import further types. Termination on
//! cyclic shapes (`class C<T> where T : C<T>`) comes from the builder
//! assigning tokens before it recurses, so a back-reference resolves from the
//! memo instead of re-entering the import.

use crate::{
    metadata::{
        model::TypeDefOrRef,
        signatures::{
            CustomModifier, SignatureArray, SignatureField, SignatureLocalVariables,
            SignatureMethod, SignatureMethodSpec, SignatureParameter, SignatureProperty,
            SignatureTypeSpec, TypeSignature, CALLING_CONVENTION, ELEMENT_TYPE, SIGNATURE_HEADER,
        },
    },
    utils::{write_compressed_int, write_compressed_uint},
    Error, Result,
};

/// Callback seam between signature encoding and type import.
///
/// Implemented by the directory builder: resolving a reference imports the
/// type if it has no token yet and returns the compressed `TypeDefOrRef`
/// coded index value (`(rid << 2) | tag`).
pub trait TypeIndexResolver {
    /// Resolves a type reference to its compressed `TypeDefOrRef` coded
    /// index, importing the type on first sight.
    fn type_def_or_ref_index(&mut self, ty: &TypeDefOrRef) -> Result<u32>;
}

fn encode_custom_modifier(
    modifier: &CustomModifier,
    resolver: &mut dyn TypeIndexResolver,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    buffer.push(if modifier.required {
        ELEMENT_TYPE::CMOD_REQD
    } else {
        ELEMENT_TYPE::CMOD_OPT
    });

    let coded_index = resolver.type_def_or_ref_index(&modifier.modifier_type)?;
    write_compressed_uint(coded_index, buffer)
}

fn encode_parameter(
    parameter: &SignatureParameter,
    resolver: &mut dyn TypeIndexResolver,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    for modifier in &parameter.modifiers {
        encode_custom_modifier(modifier, resolver, buffer)?;
    }

    if parameter.by_ref {
        buffer.push(ELEMENT_TYPE::BYREF);
    }

    encode_type_signature(&parameter.base, resolver, buffer)
}

/// Encodes one type tree into signature bytes.
///
/// # Errors
/// Returns [`crate::Error::InvalidSignature`] for shapes the format cannot
/// express, such as a `GenericInst` whose base is not a class or value type.
pub fn encode_type_signature(
    signature: &TypeSignature,
    resolver: &mut dyn TypeIndexResolver,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    match signature {
        TypeSignature::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSignature::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSignature::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSignature::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSignature::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSignature::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSignature::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSignature::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSignature::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSignature::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSignature::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSignature::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSignature::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSignature::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSignature::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSignature::I => buffer.push(ELEMENT_TYPE::I),
        TypeSignature::U => buffer.push(ELEMENT_TYPE::U),
        TypeSignature::TypedByRef => buffer.push(ELEMENT_TYPE::TYPEDBYREF),
        TypeSignature::Sentinel => buffer.push(ELEMENT_TYPE::SENTINEL),

        TypeSignature::Class(ty) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            let coded_index = resolver.type_def_or_ref_index(ty)?;
            write_compressed_uint(coded_index, buffer)?;
        }
        TypeSignature::ValueType(ty) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            let coded_index = resolver.type_def_or_ref_index(ty)?;
            write_compressed_uint(coded_index, buffer)?;
        }

        TypeSignature::GenericParamType(number) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*number, buffer)?;
        }
        TypeSignature::GenericParamMethod(number) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*number, buffer)?;
        }

        TypeSignature::Ptr(pointer) => {
            buffer.push(ELEMENT_TYPE::PTR);
            for modifier in &pointer.modifiers {
                encode_custom_modifier(modifier, resolver, buffer)?;
            }
            encode_type_signature(&pointer.base, resolver, buffer)?;
        }
        TypeSignature::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type_signature(inner, resolver, buffer)?;
        }
        TypeSignature::Pinned(inner) => {
            buffer.push(ELEMENT_TYPE::PINNED);
            encode_type_signature(inner, resolver, buffer)?;
        }

        TypeSignature::SzArray(array) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            for modifier in &array.modifiers {
                encode_custom_modifier(modifier, resolver, buffer)?;
            }
            encode_type_signature(&array.base, resolver, buffer)?;
        }
        TypeSignature::Array(array) => encode_array(array, resolver, buffer)?,

        TypeSignature::GenericInst(base, args) => {
            buffer.push(ELEMENT_TYPE::GENERICINST);
            match base.as_ref() {
                TypeSignature::Class(_) | TypeSignature::ValueType(_) => {
                    encode_type_signature(base, resolver, buffer)?;
                }
                other => {
                    return Err(Error::InvalidSignature(format!(
                        "generic instantiation base must be a class or value type, found {other:?}"
                    )))
                }
            }
            write_compressed_uint(args.len() as u32, buffer)?;
            for arg in args {
                encode_type_signature(arg, resolver, buffer)?;
            }
        }

        TypeSignature::FnPtr(method) => {
            buffer.push(ELEMENT_TYPE::FNPTR);
            encode_method_signature_into(method, resolver, buffer)?;
        }

        TypeSignature::Unknown => {
            return Err(Error::InvalidSignature(
                "signature contains an undefined element type".to_string(),
            ))
        }
    }

    Ok(())
}

fn encode_array(
    array: &SignatureArray,
    resolver: &mut dyn TypeIndexResolver,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    buffer.push(ELEMENT_TYPE::ARRAY);
    encode_type_signature(&array.base, resolver, buffer)?;
    write_compressed_uint(array.rank, buffer)?;

    let sizes: Vec<u32> = array
        .dimensions
        .iter()
        .map_while(|dimension| dimension.size)
        .collect();
    write_compressed_uint(sizes.len() as u32, buffer)?;
    for size in sizes {
        write_compressed_uint(size, buffer)?;
    }

    let lower_bounds: Vec<i32> = array
        .dimensions
        .iter()
        .map_while(|dimension| dimension.lower_bound)
        .collect();
    write_compressed_uint(lower_bounds.len() as u32, buffer)?;
    for bound in lower_bounds {
        write_compressed_int(bound, buffer)?;
    }

    Ok(())
}

fn encode_method_signature_into(
    signature: &SignatureMethod,
    resolver: &mut dyn TypeIndexResolver,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    // Calling convention kind lives in the low 4 bits, most specific first
    let mut calling_convention = if signature.vararg {
        CALLING_CONVENTION::VARARG
    } else if signature.fastcall {
        CALLING_CONVENTION::FASTCALL
    } else if signature.thiscall {
        CALLING_CONVENTION::THISCALL
    } else if signature.stdcall {
        CALLING_CONVENTION::STDCALL
    } else if signature.cdecl {
        CALLING_CONVENTION::C
    } else {
        CALLING_CONVENTION::DEFAULT
    };

    if signature.has_this {
        calling_convention |= CALLING_CONVENTION::HASTHIS;
    }
    if signature.explicit_this {
        calling_convention |= CALLING_CONVENTION::EXPLICITTHIS;
    }
    if signature.generic_param_count > 0 {
        calling_convention |= CALLING_CONVENTION::GENERIC;
    }

    buffer.push(calling_convention);

    if signature.generic_param_count > 0 {
        write_compressed_uint(signature.generic_param_count, buffer)?;
    }

    let param_count = signature.params.len() + signature.varargs.len();
    let param_count = u32::try_from(param_count).map_err(|_| {
        Error::InvalidSignature(format!("too many parameters in method signature: {param_count}"))
    })?;
    write_compressed_uint(param_count, buffer)?;

    encode_parameter(&signature.return_type, resolver, buffer)?;
    for param in &signature.params {
        encode_parameter(param, resolver, buffer)?;
    }

    if !signature.varargs.is_empty() {
        buffer.push(ELEMENT_TYPE::SENTINEL);
        for param in &signature.varargs {
            encode_parameter(param, resolver, buffer)?;
        }
    }

    Ok(())
}

/// Encodes a method signature for `MethodDef`, `MemberRef` and
/// `StandAloneSig` rows.
pub fn encode_method_signature(
    signature: &SignatureMethod,
    resolver: &mut dyn TypeIndexResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_method_signature_into(signature, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a field signature for `Field` and `MemberRef` rows.
pub fn encode_field_signature(
    signature: &SignatureField,
    resolver: &mut dyn TypeIndexResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.push(SIGNATURE_HEADER::FIELD);

    for modifier in &signature.modifiers {
        encode_custom_modifier(modifier, resolver, &mut buffer)?;
    }

    encode_type_signature(&signature.base, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a property signature for `Property` rows.
pub fn encode_property_signature(
    signature: &SignatureProperty,
    resolver: &mut dyn TypeIndexResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    let mut prolog = SIGNATURE_HEADER::PROPERTY;
    if signature.has_this {
        prolog |= CALLING_CONVENTION::HASTHIS;
    }
    buffer.push(prolog);

    let param_count = u32::try_from(signature.params.len()).map_err(|_| {
        Error::InvalidSignature(format!(
            "too many parameters in property signature: {}",
            signature.params.len()
        ))
    })?;
    write_compressed_uint(param_count, &mut buffer)?;

    for modifier in &signature.modifiers {
        encode_custom_modifier(modifier, resolver, &mut buffer)?;
    }

    encode_type_signature(&signature.base, resolver, &mut buffer)?;
    for param in &signature.params {
        encode_parameter(param, resolver, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes a local variable signature for `StandAloneSig` rows.
pub fn encode_local_var_signature(
    signature: &SignatureLocalVariables,
    resolver: &mut dyn TypeIndexResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.push(SIGNATURE_HEADER::LOCAL_SIG);

    let local_count = u32::try_from(signature.locals.len()).map_err(|_| {
        Error::InvalidSignature(format!(
            "local variable signature has too many locals: {}",
            signature.locals.len()
        ))
    })?;
    write_compressed_uint(local_count, &mut buffer)?;

    for local in &signature.locals {
        for modifier in &local.modifiers {
            encode_custom_modifier(modifier, resolver, &mut buffer)?;
        }

        if local.is_pinned {
            buffer.push(ELEMENT_TYPE::PINNED);
        }

        if local.is_byref {
            buffer.push(ELEMENT_TYPE::BYREF);
        }

        encode_type_signature(&local.base, resolver, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes a type specification signature for `TypeSpec` rows.
pub fn encode_typespec_signature(
    signature: &SignatureTypeSpec,
    resolver: &mut dyn TypeIndexResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_type_signature(&signature.base, resolver, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a generic method instantiation for `MethodSpec` rows.
pub fn encode_method_spec_signature(
    signature: &SignatureMethodSpec,
    resolver: &mut dyn TypeIndexResolver,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.push(SIGNATURE_HEADER::GENERIC_INST);

    write_compressed_uint(signature.generic_args.len() as u32, &mut buffer)?;
    for arg in &signature.generic_args {
        encode_type_signature(arg, resolver, &mut buffer)?;
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::{ArrayDimension, SignatureLocalVariable, SignatureSzArray};

    /// Resolver handing out a fixed coded index for every reference.
    struct FixedResolver(u32);

    impl TypeIndexResolver for FixedResolver {
        fn type_def_or_ref_index(&mut self, _ty: &TypeDefOrRef) -> Result<u32> {
            Ok(self.0)
        }
    }

    #[test]
    fn static_void_int32() {
        let signature = SignatureMethod::new_static(TypeSignature::Void, vec![TypeSignature::I4]);

        let encoded = encode_method_signature(&signature, &mut FixedResolver(0)).unwrap();
        // DEFAULT, 1 param, VOID return, I4 param
        assert_eq!(encoded, &[0x00, 0x01, 0x01, 0x08]);
    }

    #[test]
    fn instance_string_return() {
        let signature = SignatureMethod::new_instance(TypeSignature::String, vec![]);

        let encoded = encode_method_signature(&signature, &mut FixedResolver(0)).unwrap();
        assert_eq!(encoded, &[0x20, 0x00, 0x0E]);
    }

    #[test]
    fn generic_method_header() {
        let mut signature = SignatureMethod::new_static(TypeSignature::Void, vec![]);
        signature.generic_param_count = 2;

        let encoded = encode_method_signature(&signature, &mut FixedResolver(0)).unwrap();
        // GENERIC flag, generic count 2, 0 params, VOID
        assert_eq!(encoded, &[0x10, 0x02, 0x00, 0x01]);
    }

    #[test]
    fn vararg_sentinel() {
        let mut signature = SignatureMethod::new_static(
            TypeSignature::Void,
            vec![TypeSignature::String],
        );
        signature.vararg = true;
        signature.varargs.push(SignatureParameter {
            base: TypeSignature::I4,
            ..Default::default()
        });

        let encoded = encode_method_signature(&signature, &mut FixedResolver(0)).unwrap();
        // VARARG, 2 params total, VOID, STRING, SENTINEL, I4
        assert_eq!(encoded, &[0x05, 0x02, 0x01, 0x0E, 0x41, 0x08]);
    }

    #[test]
    fn field_string() {
        let signature = SignatureField::new(TypeSignature::String);
        let encoded = encode_field_signature(&signature, &mut FixedResolver(0)).unwrap();
        assert_eq!(encoded, &[SIGNATURE_HEADER::FIELD, 0x0E]);
    }

    #[test]
    fn locals_with_pinned() {
        let signature = SignatureLocalVariables {
            locals: vec![
                SignatureLocalVariable {
                    base: TypeSignature::I4,
                    ..Default::default()
                },
                SignatureLocalVariable {
                    is_pinned: true,
                    base: TypeSignature::String,
                    ..Default::default()
                },
            ],
        };

        let encoded = encode_local_var_signature(&signature, &mut FixedResolver(0)).unwrap();
        assert_eq!(
            encoded,
            &[SIGNATURE_HEADER::LOCAL_SIG, 0x02, 0x08, 0x45, 0x0E]
        );
    }

    #[test]
    fn szarray_of_resolved_class() {
        // Class reference resolves to coded index 0x11 through the builder seam
        let module = crate::metadata::model::Module::new("T.dll", [0; 16]);
        let reference = module.type_ref(
            crate::metadata::model::ResolutionScope::Module,
            "System",
            "Exception",
        );

        let signature = TypeSignature::SzArray(SignatureSzArray {
            modifiers: vec![],
            base: Box::new(TypeSignature::Class(TypeDefOrRef::TypeRef(reference))),
        });

        let mut buffer = Vec::new();
        encode_type_signature(&signature, &mut FixedResolver(0x11), &mut buffer).unwrap();
        assert_eq!(buffer, &[ELEMENT_TYPE::SZARRAY, ELEMENT_TYPE::CLASS, 0x11]);
    }

    #[test]
    fn generic_inst_requires_class_base() {
        let signature = TypeSignature::GenericInst(
            Box::new(TypeSignature::I4),
            vec![TypeSignature::String],
        );

        let mut buffer = Vec::new();
        let result = encode_type_signature(&signature, &mut FixedResolver(0), &mut buffer);
        assert!(matches!(result, Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn array_shape() {
        let signature = TypeSignature::Array(SignatureArray {
            base: Box::new(TypeSignature::I4),
            rank: 2,
            dimensions: vec![
                ArrayDimension {
                    size: Some(3),
                    lower_bound: Some(0),
                },
                ArrayDimension {
                    size: Some(4),
                    lower_bound: Some(0),
                },
            ],
        });

        let mut buffer = Vec::new();
        encode_type_signature(&signature, &mut FixedResolver(0), &mut buffer).unwrap();
        // ARRAY, I4, rank 2, 2 sizes (3, 4), 2 lower bounds (0, 0)
        assert_eq!(
            buffer,
            &[ELEMENT_TYPE::ARRAY, 0x08, 0x02, 0x02, 0x03, 0x04, 0x02, 0x00, 0x00]
        );
    }

    #[test]
    fn method_spec_instantiation() {
        let signature = SignatureMethodSpec {
            generic_args: vec![TypeSignature::I4, TypeSignature::String],
        };

        let encoded = encode_method_spec_signature(&signature, &mut FixedResolver(0)).unwrap();
        assert_eq!(encoded, &[SIGNATURE_HEADER::GENERIC_INST, 0x02, 0x08, 0x0E]);
    }
}
