//! The source object graph consumed by the directory builder.
//!
//! Callers construct a [`Module`] and populate it with types, members and
//! references; the builder then walks the graph read-only and assigns
//! metadata tokens. Objects that can be imported carry the identity of their
//! owning module ([`ModuleId`]), which the builder asserts before assigning a
//! token — handing it an object created against a different module fails with
//! [`crate::Error::MemberNotImported`].
//!
//! Lists that grow after their owner has been created (members, constraints,
//! custom attributes) use `boxcar::Vec`; single late-bound slots (base types,
//! accessor links) use [`std::sync::OnceLock`]. This is what lets
//! self-referential shapes like `class C<T> where T : C<T>` be expressed: the
//! type is created first, and the cyclic reference is attached afterwards
//! through its `Arc`.

mod assembly;
mod attributes;
mod members;
mod module;
mod types;

pub use assembly::*;
pub use attributes::*;
pub use members::*;
pub use module::*;
pub use types::*;

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Module`], used for ownership assertions.
///
/// Comparing identities is the writer's substitute for pointer equality over
/// the whole object graph: every object stamped with the same `ModuleId`
/// belongs to the same in-memory module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ModuleId(u64);

impl ModuleId {
    pub(crate) fn next() -> ModuleId {
        ModuleId(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Capability exposed by every importable object: report the module that owns
/// it, or `None` if it was never attached to one.
pub trait ModuleProvider {
    /// The identity of the owning module, if any.
    fn module(&self) -> Option<ModuleId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_ids_are_unique() {
        let a = ModuleId::next();
        let b = ModuleId::next();
        assert_ne!(a, b);
    }
}
