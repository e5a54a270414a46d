//! Error types for batch processing

use std::fmt;

use thiserror::Error;

use crate::record::EventType;

/// Main error type surfaced by batch processing operations.
///
/// Individual record failures are never surfaced here; they are captured in
/// the processor's state and reported through the partial batch response.
/// The only errors a caller sees are the two fail-fast cases below and the
/// whole-batch failure.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Every record in a non-empty batch failed processing.
    ///
    /// Carries one captured error per record, in processing order, so the
    /// caller can log each of them before letting the invocation fail.
    #[error("All records failed processing. {} individual errors logged separately", .errors.len())]
    AllRecordsFailed { errors: Vec<anyhow::Error> },

    /// The invocation event was not shaped like a batch of records.
    #[error("Invalid batch event: {0}")]
    InvalidBatchInput(String),

    /// One entry of the `Records` array could not be parsed for the
    /// configured event source.
    #[error("Record {index} is not a valid {event_type} record: {source}")]
    MalformedRecord {
        index: usize,
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for batch processing operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Marks a record that was never handed to the handler because an earlier
/// record in its ordering scope had already failed.
///
/// A fresh value is constructed for every skipped record so each failure
/// keeps its own identity in logs and in aggregated error lists.
#[derive(Debug, Clone, Default)]
pub struct ShortCircuitError {
    /// Ordering group the failure was scoped to, when group scoping is
    /// active. `None` means the whole batch was the scope.
    pub message_group_id: Option<String>,
}

impl ShortCircuitError {
    pub fn new(message_group_id: Option<&str>) -> Self {
        Self {
            message_group_id: message_group_id.map(str::to_string),
        }
    }
}

impl fmt::Display for ShortCircuitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message_group_id {
            Some(group) => write!(
                f,
                "A previous record in message group {group} failed processing"
            ),
            None => write!(f, "A previous record failed processing"),
        }
    }
}

impl std::error::Error for ShortCircuitError {}
