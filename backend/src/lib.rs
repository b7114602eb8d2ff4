//! # Restmigrator - record migration into list-model stores
//!
//! Restmigrator reads records from a source (CSV file, in-memory list,
//! another store), maps each one field by field, and writes it into a
//! target store. Mapped fields can be unique against the target or
//! persisted through a related store first.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Source    │────▶│   Mapping   │────▶│ Guard/Link  │────▶│ Target store│
//! │ (CSV/store) │     │ (resolvers) │     │ (uniq/rel.) │     │ (mem/file/  │
//! └─────────────┘     └─────────────┘     └─────────────┘     │    REST)    │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restmigrator::{from_records, MappingSpec, MemoryFactory, MigrateOptions, RestMigrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let migrator = RestMigrator::new(
//!         from_records(vec![serde_json::json!({ "name": "Jo" })]),
//!         MappingSpec::identity(&["name"]),
//!         "users",
//!         std::sync::Arc::new(MemoryFactory::new()),
//!     );
//!     let mut run = migrator.boot(MigrateOptions::default(), CancellationToken::new()).unwrap();
//!     while let Some(saved) = run.next().await {
//!         println!("{}", saved.unwrap());
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`mapping`] - Mapping specs, resolvers and mapping files
//! - [`store`] - List-model stores (memory, file, REST)
//! - [`source`] - Record sources
//! - [`events`] - Progress notifications and logging
//! - [`migrate`] - The migration engine
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;

// Mapping
pub mod mapping;

// Persistence
pub mod store;

// Input
pub mod source;

// Observers
pub mod events;

// Engine
pub mod migrate;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    Duplicate,
    ErrorKind,
    MappingError,
    MigrateError,
    ProgressError,
    Rejection,
    ServerError,
    SourceError,
    StoreError,
};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{
    operations_description,
    resolve,
    DerivedField,
    FieldDescriptor,
    FieldMapping,
    MappingFile,
    MappingSpec,
    Operation,
    Resolver,
    TargetPatch,
};

// =============================================================================
// Re-exports - Stores
// =============================================================================

pub use store::{
    FileFactory,
    FileStore,
    ListModel,
    MemoryFactory,
    MemoryStore,
    Page,
    RestFactory,
    RestStore,
    StoreFactory,
    StoreRef,
};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::{
    from_csv_path,
    from_records,
    from_store,
    parse_file_auto,
    ParsedCsv,
    RecordStream,
    SourceFactory,
};

// =============================================================================
// Re-exports - Events
// =============================================================================

pub use events::{
    ConsoleEvents,
    Counts,
    EventBus,
    Fanout,
    MigrationProgress,
    Tally,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use migrate::{Migration, MigrateOptions, RestMigrator};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::Settings;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
