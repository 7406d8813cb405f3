//! Serialization of CIL method bodies.
//!
//! Methods are emitted in one of two header formats (ECMA §II.25.4):
//!
//! * **Tiny** - a single byte `(code_size << 2) | 0x2`, usable when the code
//!   is under 64 bytes, there are no locals, no exception handlers and the
//!   operand stack stays within 8 slots.
//! * **Fat** - a 12-byte header carrying flags, max-stack, code size and the
//!   local variable signature token, followed by the code and, 4-byte
//!   aligned, the exception handling sections.
//!
//! Token operands are resolved through the [`TokenProvider`] back-edge at
//! serialization time; `ldstr` operands become user-string heap tokens.

use crate::{
    file::io::write_le,
    metadata::{
        method::{
            ExceptionHandler, ExceptionHandlerFlags, Instruction, MethodBodyFlags, Operand,
            SectionFlags, TokenProvider,
        },
        signatures::SignatureLocalVariables,
        token::Token,
    },
    utils::pad_to_4,
    Error, Result,
};

use super::opcodes;

/// A method body as provided by the source object graph: an instruction
/// stream plus the frame description around it.
#[derive(Default)]
pub struct MethodBody {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Zero-initialize all local variables
    pub init_locals: bool,
    /// Local variable layout; empty means no locals
    pub locals: SignatureLocalVariables,
    /// The instruction stream, with branch forms already chosen
    pub instructions: Vec<Instruction>,
    /// Exception handling clauses
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Creates a body with the given instructions and an 8-slot stack.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        MethodBody {
            max_stack: 8,
            init_locals: false,
            locals: SignatureLocalVariables::default(),
            instructions,
            exception_handlers: Vec::new(),
        }
    }

    /// True if this body qualifies for the tiny header format.
    fn is_tiny(&self, code_size: usize, local_var_sig_token: Token) -> bool {
        code_size < 64
            && local_var_sig_token.is_null()
            && self.exception_handlers.is_empty()
            && self.max_stack <= 8
    }

    /// Serializes the complete method body: header, code and exception
    /// sections.
    ///
    /// `local_var_sig_token` is the `StandAloneSig` token of the local
    /// variable signature, or the null token when the body has no locals;
    /// the directory builder creates that row before calling in here.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidCil`] when an operand does not fit its
    /// opcode, and propagates token resolution failures.
    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize(
        &self,
        local_var_sig_token: Token,
        tokens: &mut dyn TokenProvider,
    ) -> Result<Vec<u8>> {
        let code = self.serialize_code(tokens)?;

        let mut body = Vec::with_capacity(code.len() + 12);
        if self.is_tiny(code.len(), local_var_sig_token) {
            body.push(((code.len() as u8) << 2) | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            body.extend_from_slice(&code);
            return Ok(body);
        }

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if self.init_locals {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        if !self.exception_handlers.is_empty() {
            flags |= MethodBodyFlags::MORE_SECTS;
        }

        // Header size in dwords lives in the top 4 bits of the first u16
        write_le(&mut body, flags.bits() | (3 << 12));
        write_le(&mut body, self.max_stack);
        write_le(&mut body, crate::utils::to_u32(code.len())?);
        write_le(&mut body, local_var_sig_token.value());
        body.extend_from_slice(&code);

        if !self.exception_handlers.is_empty() {
            pad_to_4(&mut body);
            self.serialize_exception_sections(&mut body, tokens)?;
        }

        Ok(body)
    }

    fn serialize_code(&self, tokens: &mut dyn TokenProvider) -> Result<Vec<u8>> {
        let mut code = Vec::new();

        for instruction in &self.instructions {
            instruction.opcode.emit(&mut code);

            match &instruction.operand {
                Operand::None => {
                    if instruction.opcode.takes_token() {
                        return Err(Error::InvalidCil(format!(
                            "opcode {:#06x} requires a token operand",
                            instruction.opcode.0
                        )));
                    }
                }
                Operand::Int8(value) => code.push(*value as u8),
                Operand::Int32(value) => write_le(&mut code, *value),
                Operand::Int64(value) => write_le(&mut code, *value),
                Operand::Float32(value) => write_le(&mut code, *value),
                Operand::Float64(value) => write_le(&mut code, *value),
                Operand::Variable(index) | Operand::Argument(index) => {
                    write_le(&mut code, *index);
                }
                Operand::VariableShort(index) | Operand::ArgumentShort(index) => {
                    code.push(*index);
                }
                Operand::Branch(displacement) => write_le(&mut code, *displacement),
                Operand::BranchShort(displacement) => code.push(*displacement as u8),
                Operand::Switch(targets) => {
                    write_le(&mut code, crate::utils::to_u32(targets.len())?);
                    for target in targets {
                        write_le(&mut code, *target);
                    }
                }
                Operand::String(value) => {
                    if instruction.opcode != opcodes::LDSTR {
                        return Err(Error::InvalidCil(format!(
                            "string operand is only valid for ldstr, found {:#06x}",
                            instruction.opcode.0
                        )));
                    }
                    let token = tokens.user_string_token(value)?;
                    write_le(&mut code, token.value());
                }
                Operand::Token(reference) => {
                    let token = tokens.token_for(reference)?;
                    write_le(&mut code, token.value());
                }
            }
        }

        Ok(code)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn serialize_exception_sections(
        &self,
        body: &mut Vec<u8>,
        tokens: &mut dyn TokenProvider,
    ) -> Result<()> {
        let handlers = &self.exception_handlers;

        let fits_small = |handler: &ExceptionHandler| {
            handler.try_offset <= 0xFFFF
                && handler.try_length <= 0xFF
                && handler.handler_offset <= 0xFFFF
                && handler.handler_length <= 0xFF
        };
        let small_size = handlers.len() * 12 + 4;
        let use_small = small_size <= 0xFF && handlers.iter().all(fits_small);

        if use_small {
            body.push(SectionFlags::EHTABLE.bits());
            body.push(small_size as u8);
            write_le(body, 0_u16); // reserved

            for handler in handlers {
                let class_or_filter = self.class_or_filter(handler, tokens)?;
                write_le(body, handler.flags.bits());
                write_le(body, handler.try_offset as u16);
                body.push(handler.try_length as u8);
                write_le(body, handler.handler_offset as u16);
                body.push(handler.handler_length as u8);
                write_le(body, class_or_filter);
            }
        } else {
            let fat_size = crate::utils::to_u32(handlers.len() * 24 + 4)?;
            if fat_size > 0x00FF_FFFF {
                return Err(Error::InvalidCil(format!(
                    "exception section of {} clauses exceeds the format limit",
                    handlers.len()
                )));
            }

            let section_flags = SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT;
            write_le(body, u32::from(section_flags.bits()) | (fat_size << 8));

            for handler in handlers {
                let class_or_filter = self.class_or_filter(handler, tokens)?;
                write_le(body, u32::from(handler.flags.bits()));
                write_le(body, handler.try_offset);
                write_le(body, handler.try_length);
                write_le(body, handler.handler_offset);
                write_le(body, handler.handler_length);
                write_le(body, class_or_filter);
            }
        }

        Ok(())
    }

    /// The fourth clause field: a type token for typed clauses, a filter
    /// offset for filter clauses, zero otherwise.
    fn class_or_filter(
        &self,
        handler: &ExceptionHandler,
        tokens: &mut dyn TokenProvider,
    ) -> Result<u32> {
        if handler.flags == ExceptionHandlerFlags::FILTER {
            return Ok(handler.filter_offset);
        }

        if handler.flags == ExceptionHandlerFlags::EXCEPTION {
            let Some(catch_type) = &handler.catch_type else {
                return Err(Error::InvalidCil(
                    "typed exception clause is missing its catch type".to_string(),
                ));
            };
            return Ok(tokens.token_for(catch_type)?.value());
        }

        if handler.catch_type.is_some() {
            return Err(Error::InvalidCil(
                "only typed exception clauses may carry a catch type".to_string(),
            ));
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        method::{opcodes, CilRef},
        signatures::{SignatureLocalVariable, TypeSignature},
    };

    /// Provider that fails on any lookup; used for bodies without tokens.
    struct NoTokens;

    impl TokenProvider for NoTokens {
        fn token_for(&mut self, _reference: &CilRef) -> Result<Token> {
            panic!("body unexpectedly asked for a token")
        }

        fn user_string_token(&mut self, _value: &str) -> Result<Token> {
            panic!("body unexpectedly asked for a user string")
        }
    }

    /// Provider handing out fixed tokens.
    struct Fixed {
        member: Token,
        string: Token,
    }

    impl TokenProvider for Fixed {
        fn token_for(&mut self, _reference: &CilRef) -> Result<Token> {
            Ok(self.member)
        }

        fn user_string_token(&mut self, _value: &str) -> Result<Token> {
            Ok(self.string)
        }
    }

    #[test]
    fn tiny_body() {
        let body = MethodBody::new(vec![
            Instruction::simple(opcodes::LDARG_0),
            Instruction::simple(opcodes::RET),
        ]);

        let bytes = body.serialize(Token::new(0), &mut NoTokens).unwrap();
        // Header: (2 << 2) | 0x02 = 0x0A
        assert_eq!(bytes, &[0x0A, 0x02, 0x2A]);
    }

    #[test]
    fn fat_body_due_to_locals() {
        let mut body = MethodBody::new(vec![Instruction::simple(opcodes::RET)]);
        body.init_locals = true;
        body.locals.locals.push(SignatureLocalVariable {
            base: TypeSignature::I4,
            ..Default::default()
        });

        let bytes = body.serialize(Token::new(0x1100_0001), &mut NoTokens).unwrap();

        assert_eq!(bytes.len(), 13);
        // flags: FAT | INIT_LOCALS with header size 3 dwords
        assert_eq!(&bytes[0..2], &[0x13, 0x30]);
        // max_stack
        assert_eq!(&bytes[2..4], &[0x08, 0x00]);
        // code size
        assert_eq!(&bytes[4..8], &[0x01, 0x00, 0x00, 0x00]);
        // local var sig token
        assert_eq!(&bytes[8..12], &[0x01, 0x00, 0x00, 0x11]);
        assert_eq!(bytes[12], 0x2A);
    }

    #[test]
    fn fat_body_due_to_size() {
        let mut instructions = Vec::new();
        for _ in 0..64 {
            instructions.push(Instruction::simple(opcodes::NOP));
        }
        instructions.push(Instruction::simple(opcodes::RET));

        let body = MethodBody::new(instructions);
        let bytes = body.serialize(Token::new(0), &mut NoTokens).unwrap();

        assert_eq!(bytes.len(), 12 + 65);
        assert_eq!(&bytes[0..2], &[0x03, 0x30]);
    }

    #[test]
    fn token_and_string_fixups() {
        let body = MethodBody::new(vec![
            Instruction::load_string("Hello"),
            Instruction::simple(opcodes::RET),
        ]);

        let mut provider = Fixed {
            member: Token::new(0x0A00_0007),
            string: Token::user_string(1),
        };

        let bytes = body.serialize(Token::new(0), &mut provider).unwrap();
        // Tiny, 6 code bytes: ldstr <token>, ret
        assert_eq!(bytes[0], (6 << 2) | 0x02);
        assert_eq!(&bytes[1..6], &[0x72, 0x01, 0x00, 0x00, 0x70]);
        assert_eq!(bytes[6], 0x2A);
    }

    #[test]
    fn string_operand_outside_ldstr_is_invalid() {
        let body = MethodBody::new(vec![Instruction {
            opcode: opcodes::CALL,
            operand: Operand::String("nope".to_string()),
        }]);

        let mut provider = Fixed {
            member: Token::new(0x0A00_0007),
            string: Token::user_string(1),
        };

        assert!(matches!(
            body.serialize(Token::new(0), &mut provider),
            Err(Error::InvalidCil(_))
        ));
    }

    #[test]
    fn token_opcode_without_operand_is_invalid() {
        let body = MethodBody::new(vec![Instruction::simple(opcodes::CALL)]);

        assert!(matches!(
            body.serialize(Token::new(0), &mut NoTokens),
            Err(Error::InvalidCil(_))
        ));
    }

    #[test]
    fn small_exception_section() {
        let mut body = MethodBody::new(vec![
            Instruction::simple(opcodes::NOP),
            Instruction {
                opcode: opcodes::LEAVE_S,
                operand: Operand::BranchShort(0),
            },
            Instruction::simple(opcodes::ENDFINALLY),
            Instruction::simple(opcodes::RET),
        ]);
        body.exception_handlers.push(ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset: 0,
            try_length: 3,
            handler_offset: 3,
            handler_length: 1,
            catch_type: None,
            filter_offset: 0,
        });

        let bytes = body.serialize(Token::new(0), &mut NoTokens).unwrap();

        // Fat header because of the handler; code is 5 bytes, padded to 8
        assert_eq!(&bytes[0..2], &[0x0B, 0x30]);
        let section_start = 12 + 8;
        assert_eq!(bytes[section_start], 0x01); // EHTABLE, small
        assert_eq!(bytes[section_start + 1], 16); // 1 * 12 + 4
        // clause: flags FINALLY (2), try 0..3, handler 3..1, class 0
        assert_eq!(
            &bytes[section_start + 4..],
            &[
                0x02, 0x00, 0x00, 0x00, 0x03, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn fat_exception_section_on_long_regions() {
        let mut instructions = Vec::new();
        for _ in 0..300 {
            instructions.push(Instruction::simple(opcodes::NOP));
        }
        instructions.push(Instruction::simple(opcodes::RET));

        let mut body = MethodBody::new(instructions);
        body.exception_handlers.push(ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset: 0,
            // try_length over 0xFF forces the fat section form
            try_length: 0x120,
            handler_offset: 0x120,
            handler_length: 2,
            catch_type: None,
            filter_offset: 0,
        });

        let bytes = body.serialize(Token::new(0), &mut NoTokens).unwrap();

        let code_end = 12 + 301;
        let section_start = (code_end + 3) & !3;
        // EHTABLE | FAT_FORMAT
        assert_eq!(bytes[section_start], 0x41);
        // 3-byte length: 1 * 24 + 4 = 28
        assert_eq!(
            &bytes[section_start + 1..section_start + 4],
            &[28, 0x00, 0x00]
        );
        assert_eq!(bytes.len(), section_start + 28);
    }
}
