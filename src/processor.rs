//! Sequential batch engine with partial failure accounting
//!
//! Drives a user handler over every record of a batch, in delivery order,
//! one record in flight at a time. A failing record never aborts the loop;
//! it is captured, logged, and reported through the partial batch response
//! so the event source redelivers only what actually failed.
//!
//! A processor is typically constructed once at cold start and reused
//! across invocations. Its bookkeeping is reset at the start of every
//! cycle, so a cycle's outcomes and response depend only on that cycle's
//! batch.

use std::mem;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::{BatchError, Result};
use crate::record::BatchRecord;
use crate::response::PartialBatchResponse;

/// Per-record business logic.
///
/// Failure is signalled by returning an error; the engine inspects the
/// returned value and keeps going, it never unwinds. Implement this trait
/// for handlers that need to await, or wrap a plain closure with
/// [`handler_fn`].
///
/// # Examples
///
/// ```rust
/// use lambda_partial_batch::{RecordHandler, SqsRecord};
///
/// struct OrderHandler;
///
/// #[async_trait::async_trait]
/// impl RecordHandler<SqsRecord> for OrderHandler {
///     type Output = ();
///
///     async fn handle(&self, record: &SqsRecord) -> anyhow::Result<()> {
///         // deserialize record.body, call downstream services...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RecordHandler<R>: Send + Sync {
    type Output: Send;

    async fn handle(&self, record: &R) -> anyhow::Result<Self::Output>;
}

/// Wraps a plain function as a [`RecordHandler`] with no suspension points.
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// A [`RecordHandler`] backed by a synchronous closure. See [`handler_fn`].
#[derive(Debug, Clone)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<R, T, F> RecordHandler<R> for HandlerFn<F>
where
    R: Sync,
    T: Send + 'static,
    F: Fn(&R) -> anyhow::Result<T> + Send + Sync,
{
    type Output = T;

    async fn handle(&self, record: &R) -> anyhow::Result<T> {
        (self.f)(record)
    }
}

/// Result of processing a single record. One per input record, in input
/// order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R, T> {
    /// Handler completed; the record will be acked by the source.
    Success { record: R, result: T },
    /// Handler failed; the record is reported for redelivery. The error is
    /// rendered with its cause chain.
    Failure { record: R, error: String },
}

impl<R, T> Outcome<R, T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn record(&self) -> &R {
        match self {
            Outcome::Success { record, .. } | Outcome::Failure { record, .. } => record,
        }
    }
}

/// Configuration for batch processors
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Surface [`BatchError::AllRecordsFailed`] when every record of a
    /// non-empty batch fails, so the platform retries the whole invocation
    /// instead of redelivering 100% of the items one by one. Disable to get
    /// the normal partial response even then.
    pub raise_on_entire_batch_failure: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            raise_on_entire_batch_failure: true,
        }
    }
}

/// Bookkeeping for one processing cycle. Owned and mutated by the single
/// task driving the cycle; cleared at the start of the next one.
#[derive(Debug)]
struct BatchState<R> {
    successes: Vec<R>,
    failures: Vec<R>,
    errors: Vec<anyhow::Error>,
}

impl<R> BatchState<R> {
    fn clear(&mut self) {
        self.successes.clear();
        self.failures.clear();
        self.errors.clear();
    }
}

impl<R> Default for BatchState<R> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Sequential batch processor.
///
/// Generic over the record type: anything exposing an item identifier can
/// flow through it. [`EventType::extract_records`] produces the typed
/// records for the built-in event sources.
///
/// [`EventType::extract_records`]: crate::record::EventType::extract_records
///
/// # Examples
///
/// ```rust
/// use lambda_partial_batch::{BatchProcessor, EventType};
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let event = json!({
///     "Records": [{
///         "messageId": "059f36b4-87a3-44ab-83d2-661975830a7d",
///         "body": "hello",
///         "eventSource": "aws:sqs"
///     }]
/// });
///
/// let records = EventType::Sqs.extract_records(&event)?;
/// let mut processor = BatchProcessor::new();
/// let outcomes = processor.process_sync(records, |record| Ok(record.as_sqs().unwrap().body.clone()))?;
///
/// assert_eq!(outcomes.len(), 1);
/// assert!(processor.response().is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchProcessor<R> {
    config: ProcessorConfig,
    state: BatchState<R>,
    response: PartialBatchResponse,
}

impl<R: BatchRecord + Clone> BatchProcessor<R> {
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    pub fn with_config(config: ProcessorConfig) -> Self {
        Self {
            config,
            state: BatchState::default(),
            response: PartialBatchResponse::default(),
        }
    }

    /// Process `records` in input order with an async handler, one record
    /// in flight at a time.
    ///
    /// Returns one [`Outcome`] per record, in the same order. Individual
    /// failures are captured, not propagated; the only error this returns
    /// is [`BatchError::AllRecordsFailed`], after the failure response has
    /// been materialized.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn process<H>(
        &mut self,
        records: Vec<R>,
        handler: &H,
    ) -> Result<Vec<Outcome<R, H::Output>>>
    where
        H: RecordHandler<R>,
    {
        self.prepare();
        let mut cycle = Cycle::new(self);
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(cycle.step(record, handler).await);
        }
        cycle.finish()?;
        Ok(outcomes)
    }

    /// Same engine, no suspension points: for synchronous handlers and
    /// callers without a runtime.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn process_sync<T, F>(&mut self, records: Vec<R>, handler: F) -> Result<Vec<Outcome<R, T>>>
    where
        F: Fn(&R) -> anyhow::Result<T>,
    {
        self.prepare();
        let mut cycle = Cycle::new(self);
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let outcome = match handler(&record) {
                Ok(result) => cycle.success(record, result),
                Err(error) => cycle.failure(record, error),
            };
            outcomes.push(outcome);
        }
        cycle.finish()?;
        Ok(outcomes)
    }

    /// The partial failure response of the last completed cycle.
    pub fn response(&self) -> PartialBatchResponse {
        self.response.clone()
    }

    /// Records that succeeded in the last cycle, in processing order.
    pub fn successes(&self) -> &[R] {
        &self.state.successes
    }

    /// Records that failed in the last cycle, in the order the failures
    /// occurred.
    pub fn failures(&self) -> &[R] {
        &self.state.failures
    }

    /// Captured handler errors of the last cycle, one per failed record.
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.state.errors
    }

    /// Reset bookkeeping from any prior cycle. Runs before the first record
    /// of every cycle; reuse across invocations must never leak state.
    pub(crate) fn prepare(&mut self) {
        debug!("starting processing cycle, clearing prior state");
        self.state.clear();
        self.response = PartialBatchResponse::default();
    }

    /// Materialize the response for the cycle. Runs on every exit path.
    fn clean(&mut self) {
        if self.state.failures.is_empty() {
            debug!(
                successes = self.state.successes.len(),
                "all records in the batch processed successfully"
            );
            return;
        }
        self.response = PartialBatchResponse::from_failures(&self.state.failures);
    }

    fn check_entire_batch_failure(&mut self) -> Result<()> {
        if !self.config.raise_on_entire_batch_failure {
            return Ok(());
        }
        if self.state.failures.is_empty() || !self.state.successes.is_empty() {
            return Ok(());
        }
        warn!(
            failures = self.state.failures.len(),
            "every record in the batch failed processing"
        );
        let errors = mem::take(&mut self.state.errors);
        Err(BatchError::AllRecordsFailed { errors })
    }

    fn record_success(&mut self, record: &R) {
        self.state.successes.push(record.clone());
    }

    fn record_failure(&mut self, record: &R, error: anyhow::Error) -> String {
        let rendered = format!("{error:#}");
        warn!(
            item_identifier = record.item_identifier(),
            error = %rendered,
            "record processing failed"
        );
        self.state.failures.push(record.clone());
        self.state.errors.push(error);
        rendered
    }
}

impl<R: BatchRecord + Clone> Default for BatchProcessor<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// One processing cycle, scoped. Dropping the guard materializes the
/// response, so it is built on every exit path, a panicking handler
/// included. [`Cycle::finish`] additionally applies the whole-batch
/// failure policy.
pub(crate) struct Cycle<'a, R: BatchRecord + Clone> {
    processor: &'a mut BatchProcessor<R>,
    cleaned: bool,
}

impl<'a, R: BatchRecord + Clone> Cycle<'a, R> {
    pub(crate) fn new(processor: &'a mut BatchProcessor<R>) -> Self {
        Self {
            processor,
            cleaned: false,
        }
    }

    /// Run the handler for one record and classify the result.
    pub(crate) async fn step<H>(&mut self, record: R, handler: &H) -> Outcome<R, H::Output>
    where
        H: RecordHandler<R>,
    {
        match handler.handle(&record).await {
            Ok(result) => self.success(record, result),
            Err(error) => self.failure(record, error),
        }
    }

    pub(crate) fn success<T>(&mut self, record: R, result: T) -> Outcome<R, T> {
        self.processor.record_success(&record);
        Outcome::Success { record, result }
    }

    pub(crate) fn failure<T>(&mut self, record: R, error: anyhow::Error) -> Outcome<R, T> {
        let rendered = self.processor.record_failure(&record, error);
        Outcome::Failure {
            record,
            error: rendered,
        }
    }

    pub(crate) fn has_failures(&self) -> bool {
        !self.processor.state.failures.is_empty()
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.processor.clean();
        self.cleaned = true;
        self.processor.check_entire_batch_failure()
    }
}

impl<R: BatchRecord + Clone> Drop for Cycle<'_, R> {
    fn drop(&mut self) {
        if !self.cleaned {
            self.processor.clean();
        }
    }
}
