//! Partial batch failure response
//!
//! The wire payload the event source mapping reads back from the
//! invocation to decide which records to redeliver. The shape must match
//! the platform contract exactly:
//!
//! ```json
//! {"batchItemFailures": [{"itemIdentifier": "<id>"}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::record::BatchRecord;

/// A single failed record, referenced by its source-assigned identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Response reporting which records of the batch must be redelivered.
///
/// An empty failure list tells the source to ack the entire batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialBatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl PartialBatchResponse {
    /// Build the failure report for `failures`, preserving the order the
    /// failures occurred. Identifiers are reported as-is; if one appears
    /// twice it is reported twice.
    pub fn from_failures<R: BatchRecord>(failures: &[R]) -> Self {
        Self {
            batch_item_failures: failures
                .iter()
                .map(|record| BatchItemFailure {
                    item_identifier: record.item_identifier().to_string(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batch_item_failures.is_empty()
    }
}
