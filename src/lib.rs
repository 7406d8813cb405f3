// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]

//! # dotforge
//!
//! The writer core of a managed-assembly builder: `dotforge` takes an
//! in-memory object graph describing a .NET module (types, methods, fields,
//! signatures, custom attributes, resources, generic parameters, interop
//! metadata) and emits a byte-exact ECMA-335 **metadata directory** - a
//! tables stream, the four heap streams (`#Strings`, `#US`, `#GUID`,
//! `#Blob`) and an optional resources blob - ready for a PE emitter to embed
//! in an executable image.
//!
//! # Architecture
//!
//! - **[`crate::metadata::model`]** - the source object graph the caller
//!   constructs and the builder walks read-only
//! - **[`crate::metadata::tables`]** - table identifiers, coded index
//!   categories, column width computation and the serialized row shapes
//! - **[`crate::metadata::signatures`]** - signature trees and their blob
//!   encoders, wired back into type import
//! - **[`crate::metadata::method`]** - the CIL instruction model and the
//!   tiny/fat method body serializer with token fixups
//! - **[`crate::build`]** - the heap buffers, tables buffer and the
//!   directory builder that drives the import
//!
//! # Usage
//!
//! ```rust
//! use dotforge::{
//!     build::DotNetDirectoryBuilder,
//!     metadata::model::{Assembly, Module, Version},
//! };
//!
//! let mut module = Module::new("Example.dll", [0x42; 16]);
//! module.assembly = Some(Assembly::new("Example", Version::new(1, 0, 0, 0)));
//!
//! let builder = DotNetDirectoryBuilder::new(&module)?;
//! let directory = builder.create_directory()?;
//!
//! assert!(directory.metadata.starts_with(b"BSJB"));
//! # Ok::<(), dotforge::Error>(())
//! ```
//!
//! Every `add_*` operation is idempotent per object identity: importing the
//! same member twice returns the same token. Objects owned by a different
//! module are rejected with [`Error::MemberNotImported`]. Once
//! [`build::DotNetDirectoryBuilder::create_directory`] has been called the
//! builder is consumed; the produced [`build::DotNetDirectory`] owns all
//! serialized buffers.

#[macro_use]
mod error;

pub mod build;
pub mod file;
pub mod metadata;
pub mod utils;

pub use error::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
