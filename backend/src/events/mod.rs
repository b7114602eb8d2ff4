//! Migration progress notifications.
//!
//! The engine reports every record attempt, and every relation write, to an
//! [`EventBus`] through one of three channels: `save`, `skip` or `error`.
//!
//! - [`console`] - Default observer rendering tables through the log broadcaster
//! - [`tally`] - Outcome counters and fan-out
//! - [`logs`] - Log broadcaster shared with the REST server

pub mod console;
pub mod logs;
pub mod tally;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProgressError;

pub use console::ConsoleEvents;
pub use tally::{Channel, Counts, Fanout, Tally};

/// One attempt, passed verbatim to the matching channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    /// Run this attempt belongs to
    pub run_id: Uuid,

    /// 1-based draw position over the whole run
    pub index: usize,

    /// 1-based window number when records are processed concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_ordinal: Option<usize>,

    /// Related store name for relation notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    pub source_item: Value,

    /// Mapped data resolved so far (the sub-record for relation notifications)
    pub mapped_data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_item: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProgressError>,
}

impl MigrationProgress {
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }
}

/// Observer of migration outcomes. Implementations must not fail.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn save(&self, progress: &MigrationProgress);
    async fn skip(&self, progress: &MigrationProgress);
    async fn error(&self, progress: &MigrationProgress);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

#[async_trait]
impl EventBus for Silent {
    async fn save(&self, _progress: &MigrationProgress) {}
    async fn skip(&self, _progress: &MigrationProgress) {}
    async fn error(&self, _progress: &MigrationProgress) {}
}
