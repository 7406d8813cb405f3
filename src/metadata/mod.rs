//! ECMA-335 metadata building blocks: tokens, tables, signatures, method
//! bodies and the source object model.

pub mod identity;
pub mod method;
pub mod model;
pub mod signatures;
pub mod tables;
pub mod token;
