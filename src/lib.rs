//! Lambda Partial Batch - partial batch failure processing for event source batches
//!
//! When an event source mapping (SQS, Kinesis Data Streams, DynamoDB
//! Streams) delivers a batch of records to one invocation, a single bad
//! record must not fail the whole batch. This crate runs a per-record
//! handler over the batch, tracks which records succeeded and which
//! failed, and renders the platform's partial batch response so the source
//! redelivers only the failed records:
//!
//! - [`BatchProcessor`] processes records sequentially and keeps going
//!   past failures.
//! - [`SqsFifoProcessor`] adds circuit-breaker short-circuiting for FIFO
//!   queues, where records after a failure must not run out of order.
//! - [`EventType::extract_records`] turns a raw invocation event into
//!   typed records; any type exposing an item identifier can flow through
//!   the engine.
//!
//! # Examples
//!
//! ```rust
//! use lambda_partial_batch::{BatchProcessor, EventType};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let event = json!({
//!     "Records": [{
//!         "messageId": "059f36b4-87a3-44ab-83d2-661975830a7d",
//!         "body": "{\"order_id\": 17}",
//!         "eventSource": "aws:sqs"
//!     }]
//! });
//!
//! let records = EventType::Sqs.extract_records(&event)?;
//! let mut processor = BatchProcessor::new();
//!
//! processor.process_sync(records, |record| {
//!     let body = &record.as_sqs().unwrap().body;
//!     // business logic here
//!     Ok(body.len())
//! })?;
//!
//! // Empty failure list: the source acks the whole batch.
//! assert_eq!(
//!     serde_json::to_string(&processor.response())?,
//!     r#"{"batchItemFailures":[]}"#
//! );
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fifo;
pub mod processor;
pub mod record;
pub mod response;


pub use error::{BatchError, Result, ShortCircuitError};
pub use fifo::SqsFifoProcessor;
pub use processor::{handler_fn, BatchProcessor, HandlerFn, Outcome, ProcessorConfig, RecordHandler};
pub use record::{
    BatchRecord, DynamoDbStreamRecord, EventRecord, EventType, GroupedBatchRecord, KinesisData,
    KinesisStreamRecord, SqsRecord, StreamRecord,
};
pub use response::{BatchItemFailure, PartialBatchResponse};
