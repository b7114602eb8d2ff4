//! Mapping specifications and field resolution.
//!
//! This module provides:
//! - `spec`: [`MappingSpec`] and the three [`FieldMapping`] shapes
//! - `patch`: [`TargetPatch`] and [`FieldDescriptor`]
//! - `resolver`: resolve one mapping entry against a source record
//! - `rule` / `operations`: declarative derive rules for mapping files
//! - `file`: JSON mapping files
//!
//! ## Usage Flow
//!
//! ```text
//! source record → resolve(field, mapping) → TargetPatch → merge → engine
//! ```

pub mod file;
pub mod operations;
pub mod patch;
pub mod resolver;
pub mod rule;
pub mod spec;
pub mod template;

pub use file::{FieldMappingDef, MappingFile};
pub use operations::{operations_description, Operation};
pub use patch::{FieldDescriptor, TargetPatch};
pub use resolver::resolve;
pub use rule::{compile, DerivedField};
pub use spec::{FieldMapping, MappingSpec, ResolveFuture, Resolver};
