//! Outcome counting and observer fan-out.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{EventBus, MigrationProgress};

/// Snapshot of a [`Tally`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub saved: usize,
    pub skipped: usize,
    pub errors: usize,
    pub relations_saved: usize,
    pub relation_errors: usize,
}

impl Counts {
    /// Primary records attempted
    pub fn records(&self) -> usize {
        self.saved + self.skipped + self.errors
    }
}

/// Counts notifications per channel; relation notifications count apart.
///
/// Optionally keeps every notification for later inspection.
#[derive(Debug, Default)]
pub struct Tally {
    saved: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
    relations_saved: AtomicUsize,
    relation_errors: AtomicUsize,
    history: Option<Mutex<Vec<(Channel, MigrationProgress)>>>,
}

/// Channel a notification arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Save,
    Skip,
    Error,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally that also records every notification
    pub fn recording() -> Self {
        Self {
            history: Some(Mutex::new(Vec::new())),
            ..Self::default()
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            saved: self.saved.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
            relations_saved: self.relations_saved.load(Ordering::SeqCst),
            relation_errors: self.relation_errors.load(Ordering::SeqCst),
        }
    }

    /// Recorded notifications in arrival order (empty unless recording)
    pub fn history(&self) -> Vec<(Channel, MigrationProgress)> {
        self.history
            .as_ref()
            .map(|h| h.lock().unwrap_or_else(|p| p.into_inner()).clone())
            .unwrap_or_default()
    }

    fn record(&self, channel: Channel, progress: &MigrationProgress) {
        if let Some(ref history) = self.history {
            history
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push((channel, progress.clone()));
        }
    }
}

#[async_trait]
impl EventBus for Tally {
    async fn save(&self, progress: &MigrationProgress) {
        let counter = if progress.is_relation() { &self.relations_saved } else { &self.saved };
        counter.fetch_add(1, Ordering::SeqCst);
        self.record(Channel::Save, progress);
    }

    async fn skip(&self, progress: &MigrationProgress) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.record(Channel::Skip, progress);
    }

    async fn error(&self, progress: &MigrationProgress) {
        let counter = if progress.is_relation() { &self.relation_errors } else { &self.errors };
        counter.fetch_add(1, Ordering::SeqCst);
        self.record(Channel::Error, progress);
    }
}

/// Forwards every notification to each observer, in order
#[derive(Clone, Default)]
pub struct Fanout {
    buses: Vec<Arc<dyn EventBus>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.buses.push(bus);
        self
    }
}

#[async_trait]
impl EventBus for Fanout {
    async fn save(&self, progress: &MigrationProgress) {
        for bus in &self.buses {
            bus.save(progress).await;
        }
    }

    async fn skip(&self, progress: &MigrationProgress) {
        for bus in &self.buses {
            bus.skip(progress).await;
        }
    }

    async fn error(&self, progress: &MigrationProgress) {
        for bus in &self.buses {
            bus.error(progress).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn progress(relation: Option<&str>) -> MigrationProgress {
        MigrationProgress {
            run_id: Uuid::nil(),
            index: 1,
            batch_ordinal: None,
            relation: relation.map(String::from),
            source_item: json!({}),
            mapped_data: json!({}),
            target_item: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_relation_counts_apart() {
        let tally = Tally::new();
        tally.save(&progress(None)).await;
        tally.save(&progress(Some("users"))).await;
        tally.error(&progress(Some("users"))).await;
        tally.skip(&progress(None)).await;

        let counts = tally.counts();
        assert_eq!(counts.saved, 1);
        assert_eq!(counts.relations_saved, 1);
        assert_eq!(counts.relation_errors, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.records(), 2);
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_bus() {
        let a = Arc::new(Tally::recording());
        let b = Arc::new(Tally::new());
        let fanout = Fanout::new().with(a.clone()).with(b.clone());

        fanout.error(&progress(None)).await;

        assert_eq!(a.counts().errors, 1);
        assert_eq!(b.counts().errors, 1);
        assert_eq!(a.history()[0].0, Channel::Error);
    }
}
