//! The migration engine.
//!
//! [`RestMigrator::boot`] returns a pull-based [`Migration`]. Each call to
//! [`Migration::next`] draws a window of records from the source, resolves
//! them concurrently, and hands back the persisted records one at a time.
//! Skips and errors are only visible through the [`EventBus`].

use futures::stream::{self, BoxStream, FuturesUnordered, StreamExt};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::guard::check_unique;
use super::options::MigrateOptions;
use super::relation;
use crate::error::{MigrateError, ProgressError, Rejection, SourceError, StoreResult};
use crate::events::logs::{log_info, log_warning};
use crate::events::{ConsoleEvents, EventBus, MigrationProgress};
use crate::mapping::{resolve, MappingSpec, TargetPatch};
use crate::source::{RecordStream, SourceFactory};
use crate::store::{ListModel, StoreFactory, StoreRef};

/// Migrates records from a source into a target list-model store.
#[derive(Clone)]
pub struct RestMigrator {
    source: SourceFactory,
    mapping: Arc<MappingSpec>,
    target: StoreRef,
    stores: Arc<dyn StoreFactory>,
    events: Arc<dyn EventBus>,
}

impl RestMigrator {
    /// Migrator reporting to the console by default.
    pub fn new(
        source: SourceFactory,
        mapping: MappingSpec,
        target: impl Into<StoreRef>,
        stores: Arc<dyn StoreFactory>,
    ) -> Self {
        Self {
            source,
            mapping: Arc::new(mapping),
            target: target.into(),
            stores,
            events: Arc::new(ConsoleEvents::new()),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn target(&self) -> &StoreRef {
        &self.target
    }

    /// Start a run.
    ///
    /// Opens the primary store once for the whole run and a fresh source
    /// stream. Nothing is read until the migration is polled.
    pub fn boot(&self, options: MigrateOptions, cancel: CancellationToken) -> StoreResult<Migration> {
        let primary = self.stores.open(&self.target)?;
        let run_id = Uuid::new_v4();

        log_info(format!(
            "Run {} into '{}' (dry run: {}, concurrency: {})",
            run_id,
            self.target,
            options.dry_run,
            options.window()
        ));

        Ok(Migration {
            run: Arc::new(Run {
                run_id,
                mapping: self.mapping.clone(),
                primary,
                stores: self.stores.clone(),
                events: self.events.clone(),
                dry_run: options.dry_run,
            }),
            source: (self.source)(),
            window: options.window(),
            drawn: 0,
            windows: 0,
            ready: VecDeque::new(),
            failed: None,
            exhausted: false,
            cancel,
        })
    }
}

/// A running migration.
///
/// `index` follows draw order; with a window larger than one, records of a
/// window are yielded in completion order.
pub struct Migration {
    run: Arc<Run>,
    source: RecordStream,
    window: usize,
    drawn: usize,
    windows: usize,
    ready: VecDeque<Value>,
    failed: Option<SourceError>,
    exhausted: bool,
    cancel: CancellationToken,
}

impl Migration {
    pub fn run_id(&self) -> Uuid {
        self.run.run_id
    }

    /// Records drawn from the source so far
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Next saved record.
    ///
    /// `None` once the source is exhausted or the token is cancelled. A
    /// source error is returned after the records drawn before it, and
    /// ends the run.
    pub async fn next(&mut self) -> Option<Result<Value, SourceError>> {
        loop {
            if let Some(saved) = self.ready.pop_front() {
                return Some(Ok(saved));
            }
            if let Some(err) = self.failed.take() {
                self.exhausted = true;
                return Some(Err(err));
            }
            if self.exhausted || self.cancel.is_cancelled() {
                return None;
            }
            self.step().await;
        }
    }

    /// Drain as a stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Value, SourceError>> {
        stream::unfold(self, |mut migration| async move {
            migration.next().await.map(|item| (item, migration))
        })
        .boxed()
    }

    /// Draw one window and process it to completion.
    async fn step(&mut self) {
        let batch_ordinal = (self.window > 1).then_some(self.windows + 1);
        let mut attempts = Vec::with_capacity(self.window);

        while attempts.len() < self.window {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                item = self.source.next() => Some(item),
            };

            match item {
                None => {
                    log_warning("Migration cancelled");
                    self.exhausted = true;
                    break;
                }
                Some(None) => {
                    self.exhausted = true;
                    break;
                }
                Some(Some(Ok(source_item))) => {
                    self.drawn += 1;
                    attempts.push(Attempt { index: self.drawn, batch_ordinal, source_item });
                }
                Some(Some(Err(err))) => {
                    self.failed = Some(err);
                    break;
                }
            }
        }

        if attempts.is_empty() {
            return;
        }
        self.windows += 1;

        let mut running: FuturesUnordered<_> = attempts
            .into_iter()
            .map(|attempt| {
                let run = self.run.clone();
                async move { run.process(attempt).await }
            })
            .collect();

        while let Some(outcome) = running.next().await {
            if let Some(saved) = outcome {
                self.ready.push_back(saved);
            }
        }
    }
}

/// State shared by every record of a run.
struct Run {
    run_id: Uuid,
    mapping: Arc<MappingSpec>,
    primary: Arc<dyn ListModel>,
    stores: Arc<dyn StoreFactory>,
    events: Arc<dyn EventBus>,
    dry_run: bool,
}

/// One drawn source record.
struct Attempt {
    index: usize,
    batch_ordinal: Option<usize>,
    source_item: Value,
}

impl Run {
    fn progress(&self, attempt: &Attempt, mapped_data: Value) -> MigrationProgress {
        MigrationProgress {
            run_id: self.run_id,
            index: attempt.index,
            batch_ordinal: attempt.batch_ordinal,
            relation: None,
            source_item: attempt.source_item.clone(),
            mapped_data,
            target_item: None,
            error: None,
        }
    }

    /// Run one record through the pipeline and report it.
    async fn process(&self, attempt: Attempt) -> Option<Value> {
        let mut mapped = Map::new();
        let outcome = self.build(&attempt, &mut mapped).await;
        let mut progress = self.progress(&attempt, Value::Object(mapped));

        match outcome {
            Ok(target) => {
                progress.target_item = Some(target.clone());
                self.events.save(&progress).await;
                Some(target)
            }
            Err(rejection) => {
                progress.error = Some(ProgressError::from(&rejection));
                match rejection {
                    Rejection::Duplicate(_) => self.events.skip(&progress).await,
                    Rejection::Failure(_) => self.events.error(&progress).await,
                }
                None
            }
        }
    }

    /// Resolve, guard, link relations, then persist.
    ///
    /// `mapped` holds whatever was resolved when this returns, error or not.
    async fn build(&self, attempt: &Attempt, mapped: &mut Map<String, Value>) -> Result<Value, Rejection> {
        let mut patch = TargetPatch::new();
        for (field, mapping) in self.mapping.iter() {
            let resolved = resolve(field, mapping, &attempt.source_item)
                .await
                .map_err(|source| MigrateError::Mapping { field: field.clone(), source })?;

            for (target, descriptor) in resolved.iter() {
                match &descriptor.value {
                    Some(value) if !value.is_null() => {
                        mapped.insert(target.clone(), value.clone());
                    }
                    _ => {
                        mapped.remove(target);
                    }
                }
            }
            patch.merge(resolved);
        }

        // Every uniqueness check runs before the first write
        for (field, descriptor) in patch.iter() {
            if descriptor.unique && !descriptor.is_absent() {
                if let Some(value) = &descriptor.value {
                    check_unique(self.primary.as_ref(), field, value).await?;
                }
            }
        }

        if !self.dry_run {
            for (field, descriptor) in patch.iter() {
                let (Some(store), Some(value)) = (&descriptor.related, &descriptor.value) else {
                    continue;
                };
                if value.is_null() || descriptor.unique {
                    continue;
                }
                match self.link(attempt, store, value.clone()).await {
                    Some(key) => mapped.insert(field.clone(), key),
                    None => mapped.remove(field),
                };
            }
        }

        if self.dry_run {
            return Ok(Value::Object(mapped.clone()));
        }

        self.primary
            .upsert(mapped.clone(), None)
            .await
            .map_err(|err| Rejection::Failure(MigrateError::Persistence(err)))
    }

    /// Persist a related sub-record and report it. `None` drops the field.
    async fn link(&self, attempt: &Attempt, store: &StoreRef, value: Value) -> Option<Value> {
        let mut progress = self.progress(attempt, value.clone());
        progress.relation = Some(store.to_string());

        match relation::persist(self.stores.as_ref(), store, value).await {
            Ok(linked) => {
                progress.target_item = Some(linked.persisted);
                self.events.save(&progress).await;
                Some(linked.foreign_key)
            }
            Err(err) => {
                progress.error = Some(ProgressError::relation(&err));
                self.events.error(&progress).await;
                None
            }
        }
    }
}
