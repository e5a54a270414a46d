//! Record identity contracts and event-source data classes
//!
//! The processing engine never looks inside a record's payload. All it
//! needs from a record is the source-assigned identifier reported back on
//! failure, and for FIFO sources the ordering group. Those two capabilities
//! are the [`BatchRecord`] and [`GroupedBatchRecord`] traits; everything
//! else in this module is the typed form of the raw records Lambda
//! delivers in an event's `Records` array.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BatchError, Result};

/// Capability contract every processed record must provide.
pub trait BatchRecord {
    /// Stable identifier the event source uses to redeliver this record:
    /// the SQS message id, or the Kinesis/DynamoDB sequence number.
    fn item_identifier(&self) -> &str;
}

/// Records from strict-ordering sources that carry an ordering group.
pub trait GroupedBatchRecord: BatchRecord {
    /// Ordering partition key (SQS FIFO `MessageGroupId`). Records without
    /// one all belong to a single implicit group.
    fn message_group_id(&self) -> Option<&str>;
}

/// The event sources that deliver record batches to an invocation.
///
/// This is a closed set: each variant maps a raw record to its typed form
/// and selects which field becomes the item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Sqs,
    KinesisDataStreams,
    DynamoDbStreams,
}

impl EventType {
    /// Pull the `Records` array out of a raw invocation event and parse
    /// every entry into its typed form.
    ///
    /// Fails fast, before any processing, when the event does not carry a
    /// `Records` array ([`BatchError::InvalidBatchInput`]) or when an entry
    /// does not parse as a record of this source
    /// ([`BatchError::MalformedRecord`]).
    pub fn extract_records(self, event: &Value) -> Result<Vec<EventRecord>> {
        let records = event
            .get("Records")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BatchError::InvalidBatchInput(format!(
                    "expected a {self} event carrying a \"Records\" array, got {}",
                    json_kind(event)
                ))
            })?;

        records
            .iter()
            .enumerate()
            .map(|(index, value)| {
                self.parse_record(value).map_err(|source| BatchError::MalformedRecord {
                    index,
                    event_type: self,
                    source,
                })
            })
            .collect()
    }

    fn parse_record(self, value: &Value) -> std::result::Result<EventRecord, serde_json::Error> {
        Ok(match self {
            EventType::Sqs => EventRecord::Sqs(serde_json::from_value(value.clone())?),
            EventType::KinesisDataStreams => {
                EventRecord::Kinesis(serde_json::from_value(value.clone())?)
            }
            EventType::DynamoDbStreams => {
                EventRecord::DynamoDb(serde_json::from_value(value.clone())?)
            }
        })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Sqs => "SQS",
            EventType::KinesisDataStreams => "KinesisDataStreams",
            EventType::DynamoDbStreams => "DynamoDBStreams",
        };
        f.write_str(name)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without a \"Records\" array",
    }
}

/// One record of an SQS batch.
///
/// Parsing is lenient: fields the queue did not populate default to empty
/// so a record never fails to parse over optional metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SqsRecord {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
    pub message_attributes: Map<String, Value>,
    pub md5_of_body: String,
    pub event_source: String,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    pub aws_region: String,
}

impl BatchRecord for SqsRecord {
    fn item_identifier(&self) -> &str {
        &self.message_id
    }
}

impl GroupedBatchRecord for SqsRecord {
    fn message_group_id(&self) -> Option<&str> {
        self.attributes.get("MessageGroupId").map(String::as_str)
    }
}

/// One record of a Kinesis Data Streams batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KinesisStreamRecord {
    pub kinesis: KinesisData,
    pub event_source: String,
    pub event_version: String,
    #[serde(rename = "eventID")]
    pub event_id: String,
    pub event_name: String,
    pub invoke_identity_arn: String,
    pub aws_region: String,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
}

/// Stream-level portion of a Kinesis record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KinesisData {
    pub kinesis_schema_version: String,
    pub partition_key: String,
    pub sequence_number: String,
    /// Base64 payload, passed through untouched for the handler to decode.
    pub data: String,
    pub approximate_arrival_timestamp: f64,
}

impl BatchRecord for KinesisStreamRecord {
    fn item_identifier(&self) -> &str {
        &self.kinesis.sequence_number
    }
}

/// One record of a DynamoDB Streams batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamoDbStreamRecord {
    #[serde(rename = "eventID")]
    pub event_id: String,
    pub event_name: String,
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    pub dynamodb: StreamRecord,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
}

/// The `dynamodb` section of a stream record. Key and image attribute maps
/// stay in their raw attribute-value form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StreamRecord {
    pub approximate_creation_date_time: f64,
    pub keys: Map<String, Value>,
    pub new_image: Map<String, Value>,
    pub old_image: Map<String, Value>,
    pub sequence_number: String,
    pub size_bytes: u64,
    pub stream_view_type: String,
}

impl BatchRecord for DynamoDbStreamRecord {
    fn item_identifier(&self) -> &str {
        &self.dynamodb.sequence_number
    }
}

/// Typed record of any supported event source, tagged by origin.
///
/// Resolved from the raw event once, up front, by
/// [`EventType::extract_records`]; after that the engine only goes through
/// the capability traits.
#[derive(Debug, Clone, PartialEq)]
pub enum EventRecord {
    Sqs(SqsRecord),
    Kinesis(KinesisStreamRecord),
    DynamoDb(DynamoDbStreamRecord),
}

impl EventRecord {
    pub fn as_sqs(&self) -> Option<&SqsRecord> {
        match self {
            EventRecord::Sqs(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_kinesis(&self) -> Option<&KinesisStreamRecord> {
        match self {
            EventRecord::Kinesis(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_dynamodb(&self) -> Option<&DynamoDbStreamRecord> {
        match self {
            EventRecord::DynamoDb(record) => Some(record),
            _ => None,
        }
    }
}

impl BatchRecord for EventRecord {
    fn item_identifier(&self) -> &str {
        match self {
            EventRecord::Sqs(record) => record.item_identifier(),
            EventRecord::Kinesis(record) => record.item_identifier(),
            EventRecord::DynamoDb(record) => record.item_identifier(),
        }
    }
}

impl GroupedBatchRecord for EventRecord {
    fn message_group_id(&self) -> Option<&str> {
        match self {
            EventRecord::Sqs(record) => record.message_group_id(),
            // Ordering groups only exist on SQS FIFO queues.
            _ => None,
        }
    }
}
