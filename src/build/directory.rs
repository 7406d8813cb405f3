//! The produced directory value.

use crate::metadata::token::Token;

/// A fully serialized .NET metadata directory, ready for a PE emitter to
/// place into an image.
///
/// The builder that produced it is consumed in the process; this value owns
/// every byte buffer. Offsets inside `metadata` are relative to its first
/// byte (the `BSJB` signature); RVA columns in the tables address `code`,
/// and embedded resource offsets address `resources`.
pub struct DotNetDirectory {
    /// The metadata root: header, stream directory and the five streams
    pub metadata: Vec<u8>,
    /// Embedded resource payloads, absent when nothing was embedded
    pub resources: Option<Vec<u8>>,
    /// Serialized method bodies and mapped field data; `MethodDef` and
    /// `FieldRVA` RVA columns are offsets into this segment
    pub code: Vec<u8>,
    /// Token of the managed entry point, 0 when there is none
    pub entry_point: u32,
    /// CLI header flags, copied verbatim from the module's attributes
    pub flags: u32,
}

impl DotNetDirectory {
    /// The entry point as a token, if one was set.
    #[must_use]
    pub fn entry_point_token(&self) -> Option<Token> {
        if self.entry_point == 0 {
            None
        } else {
            Some(Token::new(self.entry_point))
        }
    }
}
