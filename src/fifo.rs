//! Strict-ordering batch processing for FIFO queues
//!
//! On a FIFO queue, letting records after a failure succeed would make the
//! source redeliver the failed record *behind* work that already ran,
//! breaking delivery order. This processor therefore stops invoking the
//! handler the moment a record fails and reports everything after it in
//! the same ordering scope as failed, so the source redelivers the whole
//! tail in order.
//!
//! The scope of that short circuit is the entire batch by default. With
//! [`SqsFifoProcessor::skip_group_on_error`] it narrows to the failing
//! record's message group: other groups keep processing normally, each
//! preserving its own relative order.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::error::{Result, ShortCircuitError};
use crate::processor::{BatchProcessor, Cycle, Outcome, ProcessorConfig, RecordHandler};
use crate::record::{BatchRecord, GroupedBatchRecord, SqsRecord};
use crate::response::PartialBatchResponse;

/// Batch processor for SQS FIFO queues.
///
/// Same bookkeeping, response and whole-batch-failure behavior as
/// [`BatchProcessor`]; the only difference is that a tripped ordering
/// scope stops invoking the handler for the records remaining in it.
/// Skipped records fail with [`ShortCircuitError`] so they are easy to
/// tell apart from genuine handler failures in logs.
pub struct SqsFifoProcessor<R = SqsRecord> {
    inner: BatchProcessor<R>,
    skip_group_on_error: bool,
    failed_groups: HashSet<Option<String>>,
}

impl<R: GroupedBatchRecord + Clone> SqsFifoProcessor<R> {
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    pub fn with_config(config: ProcessorConfig) -> Self {
        Self {
            inner: BatchProcessor::with_config(config),
            skip_group_on_error: false,
            failed_groups: HashSet::new(),
        }
    }

    /// Short-circuit only the message group that failed instead of the
    /// whole batch. Records without a group all share one implicit group.
    pub fn skip_group_on_error(mut self, enabled: bool) -> Self {
        self.skip_group_on_error = enabled;
        self
    }

    /// Process `records` in delivery order, short-circuiting each ordering
    /// scope from its first failure onward.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn process<H>(
        &mut self,
        records: Vec<R>,
        handler: &H,
    ) -> Result<Vec<Outcome<R, H::Output>>>
    where
        H: RecordHandler<R>,
    {
        let skip_group = self.skip_group_on_error;
        let failed_groups = &mut self.failed_groups;
        failed_groups.clear();

        self.inner.prepare();
        let mut cycle = Cycle::new(&mut self.inner);
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let group = record.message_group_id().map(str::to_string);
            if tripped(&cycle, skip_group, failed_groups, &group) {
                outcomes.push(short_circuit(&mut cycle, record, skip_group, group));
                continue;
            }
            let outcome = cycle.step(record, handler).await;
            if outcome.is_failure() {
                failed_groups.insert(group);
            }
            outcomes.push(outcome);
        }
        cycle.finish()?;
        Ok(outcomes)
    }

    /// Same circuit breaker without suspension points, for synchronous
    /// handlers.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn process_sync<T, F>(&mut self, records: Vec<R>, handler: F) -> Result<Vec<Outcome<R, T>>>
    where
        F: Fn(&R) -> anyhow::Result<T>,
    {
        let skip_group = self.skip_group_on_error;
        let failed_groups = &mut self.failed_groups;
        failed_groups.clear();

        self.inner.prepare();
        let mut cycle = Cycle::new(&mut self.inner);
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let group = record.message_group_id().map(str::to_string);
            if tripped(&cycle, skip_group, failed_groups, &group) {
                outcomes.push(short_circuit(&mut cycle, record, skip_group, group));
                continue;
            }
            let outcome = match handler(&record) {
                Ok(result) => cycle.success(record, result),
                Err(error) => cycle.failure(record, error),
            };
            if outcome.is_failure() {
                failed_groups.insert(group);
            }
            outcomes.push(outcome);
        }
        cycle.finish()?;
        Ok(outcomes)
    }

    /// The partial failure response of the last completed cycle.
    pub fn response(&self) -> PartialBatchResponse {
        self.inner.response()
    }

    /// Records that succeeded in the last cycle, in processing order.
    pub fn successes(&self) -> &[R] {
        self.inner.successes()
    }

    /// Records that failed or were short-circuited in the last cycle.
    pub fn failures(&self) -> &[R] {
        self.inner.failures()
    }

    /// Captured errors of the last cycle, one per failed record.
    pub fn errors(&self) -> &[anyhow::Error] {
        self.inner.errors()
    }
}

impl<R: GroupedBatchRecord + Clone> Default for SqsFifoProcessor<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the record's ordering scope has already seen a failure.
fn tripped<R: BatchRecord + Clone>(
    cycle: &Cycle<'_, R>,
    skip_group: bool,
    failed_groups: &HashSet<Option<String>>,
    group: &Option<String>,
) -> bool {
    if skip_group {
        failed_groups.contains(group)
    } else {
        cycle.has_failures()
    }
}

/// Record a skipped record as failed without invoking the handler.
fn short_circuit<R: BatchRecord + Clone, T>(
    cycle: &mut Cycle<'_, R>,
    record: R,
    skip_group: bool,
    group: Option<String>,
) -> Outcome<R, T> {
    debug!(
        item_identifier = record.item_identifier(),
        "short-circuiting record, an earlier record in its ordering scope failed"
    );
    let error = ShortCircuitError {
        message_group_id: if skip_group { group } else { None },
    };
    cycle.failure(record, error.into())
}
