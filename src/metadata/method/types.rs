//! CIL instruction and exception handler model for method bodies.

use std::sync::Arc;

use bitflags::bitflags;

use crate::{
    metadata::{
        model::{Field, MemberRef, Method, MethodSpec, StandAloneSignature, TypeDefOrRef},
        token::Token,
    },
    Result,
};

bitflags! {
    /// Method body header flags (ECMA §II.25.4.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny method header format
        const TINY_FORMAT = 0x2;
        /// Fat method header format
        const FAT_FORMAT = 0x3;
        /// More data sections follow the header and code
        const MORE_SECTS = 0x8;
        /// Call the default constructor on all local variables
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Method data section flags (ECMA §II.25.4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// The section contains exception handling data
        const EHTABLE = 0x1;
        /// Reserved, shall be 0
        const OPT_ILTABLE = 0x2;
        /// The section uses the fat format
        const FAT_FORMAT = 0x40;
        /// Another section follows this one
        const MORE_SECTS = 0x80;
    }
}

bitflags! {
    /// Exception handling clause kinds (ECMA §II.25.4.6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// A fault clause, run only on exception
        const FAULT = 0x0004;
    }
}

/// An exception handling clause of a method body. Offsets and lengths are in
/// bytes relative to the start of the CIL code.
pub struct ExceptionHandler {
    /// The clause kind
    pub flags: ExceptionHandlerFlags,
    /// Offset of the protected region
    pub try_offset: u32,
    /// Length of the protected region
    pub try_length: u32,
    /// Offset of the handler
    pub handler_offset: u32,
    /// Length of the handler
    pub handler_length: u32,
    /// The caught exception type; only used by `EXCEPTION` clauses
    pub catch_type: Option<CilRef>,
    /// Offset of the filter expression; only used by `FILTER` clauses
    pub filter_offset: u32,
}

/// A metadata object referenced from a CIL operand, resolved to a token at
/// serialization time.
#[derive(Clone)]
pub enum CilRef {
    /// A type, used by `ldtoken`, `box`, `isinst`, `castclass`, `newarr`, ...
    Type(TypeDefOrRef),
    /// A method of this module
    Method(Arc<Method>),
    /// A member of another scope
    MemberRef(Arc<MemberRef>),
    /// A generic method instantiation
    MethodSpec(Arc<MethodSpec>),
    /// A field of this module
    Field(Arc<Field>),
    /// A stand-alone signature, used by `calli`
    Signature(Arc<StandAloneSignature>),
}

/// The back-edge from body serialization to the directory builder: operands
/// become tokens by asking the builder, which imports members on first
/// sight. Passed in at call time so the serializer holds no builder state.
pub trait TokenProvider {
    /// The metadata token of the referenced object, importing it if needed.
    fn token_for(&mut self, reference: &CilRef) -> Result<Token>;

    /// The user-string heap token (tag `0x70`) for an `ldstr` operand.
    fn user_string_token(&mut self, value: &str) -> Result<Token>;
}

/// A CIL opcode. One-byte opcodes store their value directly; two-byte
/// opcodes (prefix `0xFE`) store `0xFE__`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OpCode(pub u16);

/// The common CIL opcodes by name (ECMA §III).
#[allow(non_snake_case, missing_docs)]
pub mod opcodes {
    use super::OpCode;

    pub const NOP: OpCode = OpCode(0x00);
    pub const LDARG_0: OpCode = OpCode(0x02);
    pub const LDARG_1: OpCode = OpCode(0x03);
    pub const LDARG_2: OpCode = OpCode(0x04);
    pub const LDARG_3: OpCode = OpCode(0x05);
    pub const LDLOC_0: OpCode = OpCode(0x06);
    pub const LDLOC_1: OpCode = OpCode(0x07);
    pub const STLOC_0: OpCode = OpCode(0x0A);
    pub const STLOC_1: OpCode = OpCode(0x0B);
    pub const LDARG_S: OpCode = OpCode(0x0E);
    pub const LDNULL: OpCode = OpCode(0x14);
    pub const LDC_I4_0: OpCode = OpCode(0x16);
    pub const LDC_I4_1: OpCode = OpCode(0x17);
    pub const LDC_I4_S: OpCode = OpCode(0x1F);
    pub const LDC_I4: OpCode = OpCode(0x20);
    pub const LDC_I8: OpCode = OpCode(0x21);
    pub const LDC_R4: OpCode = OpCode(0x22);
    pub const LDC_R8: OpCode = OpCode(0x23);
    pub const DUP: OpCode = OpCode(0x25);
    pub const POP: OpCode = OpCode(0x26);
    pub const CALL: OpCode = OpCode(0x28);
    pub const CALLI: OpCode = OpCode(0x29);
    pub const RET: OpCode = OpCode(0x2A);
    pub const BR_S: OpCode = OpCode(0x2B);
    pub const BRFALSE_S: OpCode = OpCode(0x2C);
    pub const BRTRUE_S: OpCode = OpCode(0x2D);
    pub const BR: OpCode = OpCode(0x38);
    pub const BRFALSE: OpCode = OpCode(0x39);
    pub const BRTRUE: OpCode = OpCode(0x3A);
    pub const SWITCH: OpCode = OpCode(0x45);
    pub const CALLVIRT: OpCode = OpCode(0x6F);
    pub const LDOBJ: OpCode = OpCode(0x71);
    pub const LDSTR: OpCode = OpCode(0x72);
    pub const NEWOBJ: OpCode = OpCode(0x73);
    pub const CASTCLASS: OpCode = OpCode(0x74);
    pub const ISINST: OpCode = OpCode(0x75);
    pub const UNBOX: OpCode = OpCode(0x79);
    pub const THROW: OpCode = OpCode(0x7A);
    pub const LDFLD: OpCode = OpCode(0x7B);
    pub const LDFLDA: OpCode = OpCode(0x7C);
    pub const STFLD: OpCode = OpCode(0x7D);
    pub const LDSFLD: OpCode = OpCode(0x7E);
    pub const LDSFLDA: OpCode = OpCode(0x7F);
    pub const STSFLD: OpCode = OpCode(0x80);
    pub const STOBJ: OpCode = OpCode(0x81);
    pub const BOX: OpCode = OpCode(0x8C);
    pub const NEWARR: OpCode = OpCode(0x8D);
    pub const LDLEN: OpCode = OpCode(0x8E);
    pub const LDELEM: OpCode = OpCode(0xA3);
    pub const STELEM: OpCode = OpCode(0xA4);
    pub const UNBOX_ANY: OpCode = OpCode(0xA5);
    pub const LDTOKEN: OpCode = OpCode(0xD0);
    pub const ENDFINALLY: OpCode = OpCode(0xDC);
    pub const LEAVE: OpCode = OpCode(0xDD);
    pub const LEAVE_S: OpCode = OpCode(0xDE);
    pub const LDFTN: OpCode = OpCode(0xFE06);
    pub const LDVIRTFTN: OpCode = OpCode(0xFE07);
    pub const LDARG: OpCode = OpCode(0xFE09);
    pub const LDLOC: OpCode = OpCode(0xFE0C);
    pub const STLOC: OpCode = OpCode(0xFE0E);
    pub const ENDFILTER: OpCode = OpCode(0xFE11);
    pub const CONSTRAINED: OpCode = OpCode(0xFE16);
    pub const RETHROW: OpCode = OpCode(0xFE1A);
    pub const SIZEOF: OpCode = OpCode(0xFE1C);
    pub const INITOBJ: OpCode = OpCode(0xFE15);
}

impl OpCode {
    /// Byte length of the opcode itself (1, or 2 for the `0xFE` page).
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> usize {
        if self.0 > 0xFF {
            2
        } else {
            1
        }
    }

    pub(crate) fn emit(self, buffer: &mut Vec<u8>) {
        if self.0 > 0xFF {
            buffer.push((self.0 >> 8) as u8);
        }
        buffer.push((self.0 & 0xFF) as u8);
    }

    /// True if this opcode takes a metadata token operand.
    #[must_use]
    pub fn takes_token(self) -> bool {
        use opcodes::*;
        matches!(
            self,
            CALL | CALLI
                | CALLVIRT
                | NEWOBJ
                | LDOBJ
                | STOBJ
                | CASTCLASS
                | ISINST
                | UNBOX
                | UNBOX_ANY
                | BOX
                | NEWARR
                | LDELEM
                | STELEM
                | LDFLD
                | LDFLDA
                | STFLD
                | LDSFLD
                | LDSFLDA
                | STSFLD
                | LDTOKEN
                | LDFTN
                | LDVIRTFTN
                | CONSTRAINED
                | SIZEOF
                | INITOBJ
        )
    }
}

/// The operand carried by one instruction.
///
/// Token and string operands carry model references and are fixed up during
/// serialization. Branch operands carry signed displacements measured from
/// the end of the branch instruction; short or long form is whatever the
/// instruction already uses, selected upstream.
pub enum Operand {
    /// No operand
    None,
    /// An 8-bit immediate (`ldc.i4.s`)
    Int8(i8),
    /// A 32-bit immediate
    Int32(i32),
    /// A 64-bit immediate
    Int64(i64),
    /// A 32-bit float immediate
    Float32(f32),
    /// A 64-bit float immediate
    Float64(f64),
    /// A wide local variable index
    Variable(u16),
    /// A narrow local variable index (`ldloc.s`)
    VariableShort(u8),
    /// A wide argument index
    Argument(u16),
    /// A narrow argument index (`ldarg.s`)
    ArgumentShort(u8),
    /// A long-form branch displacement
    Branch(i32),
    /// A short-form branch displacement
    BranchShort(i8),
    /// Jump table displacements (`switch`)
    Switch(Vec<i32>),
    /// A string literal, fixed up to a user-string heap token (`ldstr`)
    String(String),
    /// A metadata object, fixed up to its token
    Token(CilRef),
}

/// One CIL instruction: an opcode plus its operand.
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand, matching the opcode's operand class
    pub operand: Operand,
}

impl Instruction {
    /// An instruction without operand.
    #[must_use]
    pub fn simple(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// An instruction with a metadata object operand.
    #[must_use]
    pub fn with_token(opcode: OpCode, reference: CilRef) -> Self {
        Instruction {
            opcode,
            operand: Operand::Token(reference),
        }
    }

    /// An `ldstr` of the given literal.
    #[must_use]
    pub fn load_string(value: impl Into<String>) -> Self {
        Instruction {
            opcode: opcodes::LDSTR,
            operand: Operand::String(value.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_lengths() {
        assert_eq!(opcodes::NOP.len(), 1);
        assert_eq!(opcodes::CALL.len(), 1);
        assert_eq!(opcodes::LDFTN.len(), 2);

        let mut buffer = Vec::new();
        opcodes::LDFTN.emit(&mut buffer);
        assert_eq!(buffer, &[0xFE, 0x06]);

        buffer.clear();
        opcodes::RET.emit(&mut buffer);
        assert_eq!(buffer, &[0x2A]);
    }

    #[test]
    fn token_opcodes() {
        assert!(opcodes::CALL.takes_token());
        assert!(opcodes::LDTOKEN.takes_token());
        assert!(opcodes::SIZEOF.takes_token());
        assert!(!opcodes::RET.takes_token());
        assert!(!opcodes::LDSTR.takes_token());
    }
}
