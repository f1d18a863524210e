//! Resumable annotation loop.
//!
//! Items are annotated one at a time in input order. Ids that already have a
//! result in the store are skipped, and the full store is saved after every
//! new result, so an interrupted run loses at most the request in flight.

use crate::error::{AnnotateError, DriverError, RunError};
use crate::persist::{JsonFileStore, SnapshotStore};
use crate::retry::{RetryError, RetryPolicy, Sleeper, ThreadSleeper};
use crate::store::{AnnotationResult, Item, ResultsStore};
use std::path::Path;

/// Annotation service capability: one text in, one opaque result out.
pub trait Annotator {
    fn annotate(&mut self, text: &str) -> Result<AnnotationResult, AnnotateError>;
}

impl<F> Annotator for F
where
    F: FnMut(&str) -> Result<AnnotationResult, AnnotateError>,
{
    fn annotate(&mut self, text: &str) -> Result<AnnotationResult, AnnotateError> { self(text) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Items sent to the annotator (each counted once, however many retries).
    pub requested: usize,
    /// Items skipped because the store already had them.
    pub skipped: usize,
    /// Snapshots written.
    pub persisted: usize,
    /// Backoff waits spent on rate limiting.
    pub backoffs: u32,
}

#[derive(Debug)]
pub struct RunSummary {
    pub results: ResultsStore,
    pub stats: RunStats,
}

pub struct Driver<Z = ThreadSleeper> {
    policy: RetryPolicy,
    sleeper: Z,
    overwrite: bool,
}

impl Driver<ThreadSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, sleeper: ThreadSleeper, overwrite: false }
    }
}

impl<Z: Sleeper> Driver<Z> {
    pub fn with_sleeper<Y: Sleeper>(self, sleeper: Y) -> Driver<Y> {
        Driver { policy: self.policy, sleeper, overwrite: self.overwrite }
    }

    /// Start from an empty mapping instead of the saved snapshot.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn run<A, S>(&mut self, items: &[Item], store: &mut S, annotator: &mut A) -> Result<RunSummary, RunError>
    where
        A: Annotator + ?Sized,
        S: SnapshotStore + ?Sized,
    {
        let mut results = if self.overwrite {
            ResultsStore::new()
        } else {
            match store.load() {
                Ok(loaded) => loaded.unwrap_or_default(),
                Err(e) => return Err(RunError::new(e, ResultsStore::new())),
            }
        };
        let total = items.len();
        tracing::info!(total, already_done = results.len(), overwrite = self.overwrite, "starting annotation run");

        let mut stats = RunStats::default();
        for (pos, item) in items.iter().enumerate() {
            if results.contains(&item.id) {
                stats.skipped += 1;
                continue;
            }
            stats.requested += 1;
            let outcome = self.policy.run(&mut self.sleeper, || annotator.annotate(&item.text));
            let retried = match outcome {
                Ok(retried) => retried,
                Err(RetryError::Fatal(source)) => {
                    tracing::error!(id = %item.id, error = %source, "annotation failed");
                    return Err(RunError::new(DriverError::Service { id: item.id.clone(), source }, results));
                }
                Err(RetryError::Exhausted { attempts, last }) => {
                    tracing::error!(id = %item.id, attempts, error = %last, "giving up on rate-limited item");
                    return Err(RunError::new(DriverError::RetriesExhausted { id: item.id.clone(), attempts }, results));
                }
            };
            stats.backoffs += retried.waits;
            results.insert_new(item.id.clone(), retried.value);
            if let Err(e) = store.save(&results) {
                return Err(RunError::new(e, results));
            }
            stats.persisted += 1;
            tracing::debug!(id = %item.id, position = pos + 1, total, "annotated item");
            if stats.persisted % 100 == 0 {
                tracing::info!(done = results.len(), total, "progress");
            }
        }

        tracing::info!(
            results = results.len(),
            requested = stats.requested,
            skipped = stats.skipped,
            backoffs = stats.backoffs,
            "annotation run complete"
        );
        Ok(RunSummary { results, stats })
    }
}

/// Annotate `items` into the JSON document at `store_path` with the default
/// one-second, unbounded retry policy.
pub fn run<A>(items: &[Item], store_path: &Path, overwrite: bool, annotator: &mut A) -> Result<RunSummary, RunError>
where
    A: Annotator + ?Sized,
{
    let mut store = JsonFileStore::new(store_path);
    Driver::new(RetryPolicy::default()).overwrite(overwrite).run(items, &mut store, annotator)
}
