//! CIL method bodies: instruction model, exception handlers and the tiny/fat
//! body serializer with token fixups.

mod body;
mod types;

pub use body::*;
pub use types::*;
