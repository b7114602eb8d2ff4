//! Migration engine.
//!
//! - [`engine`] - [`RestMigrator`] and the pull-based [`Migration`]
//! - [`guard`] - Uniqueness checks against the primary store
//! - [`relation`] - Writes of related sub-records
//! - [`options`] - Run options

pub mod engine;
pub mod guard;
pub mod options;
pub mod relation;

pub use engine::{Migration, RestMigrator};
pub use guard::check_unique;
pub use options::MigrateOptions;
pub use relation::Linked;
