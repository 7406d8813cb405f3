//! Type and member signatures and their blob encoding.
//!
//! Signatures describe types, fields, methods, properties, local variables
//! and generic instantiations in the compact binary form of ECMA-335
//! §II.23.2. The types here carry model references instead of raw tokens;
//! encoding resolves each reference through the directory builder, which is
//! what ties signature emission and type import together.

mod encoder;
mod types;

pub use encoder::*;
pub use types::*;
