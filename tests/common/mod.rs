// tests/common/mod.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use lambda_partial_batch::{EventRecord, RecordHandler};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("lambda_partial_batch=debug".parse().unwrap()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn event(records: Vec<Value>) -> Value {
    json!({ "Records": records })
}

pub fn sqs_record(message_id: &str, body: &str) -> Value {
    json!({
        "messageId": message_id,
        "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a",
        "body": body,
        "attributes": {
            "ApproximateReceiveCount": "1",
            "SentTimestamp": "1545082649183",
            "SenderId": "SenderId",
            "ApproximateFirstReceiveTimestamp": "1545082649185"
        },
        "messageAttributes": {},
        "md5OfBody": "e4e68fb7bd0e697a0ae8f1bb342846b3",
        "eventSource": "aws:sqs",
        "eventSourceARN": "arn:aws:sqs:us-east-2:123456789012:my-queue",
        "awsRegion": "us-east-1"
    })
}

pub fn sqs_fifo_record(message_id: &str, body: &str, message_group_id: &str) -> Value {
    json!({
        "messageId": message_id,
        "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a",
        "body": body,
        "attributes": {
            "ApproximateReceiveCount": "1",
            "SentTimestamp": "1703675223472",
            "SequenceNumber": "18882884930918384133",
            "MessageGroupId": message_group_id,
            "SenderId": "SenderId",
            "MessageDeduplicationId": "1eea03c3f7e782c7bdc2f2a917f40389",
            "ApproximateFirstReceiveTimestamp": "1703675223484"
        },
        "messageAttributes": {},
        "md5OfBody": "e4e68fb7bd0e697a0ae8f1bb342846b3",
        "eventSource": "aws:sqs",
        "eventSourceARN": "arn:aws:sqs:us-east-2:123456789012:my-queue.fifo",
        "awsRegion": "us-east-1"
    })
}

pub fn kinesis_record(sequence_number: &str, data: &str) -> Value {
    json!({
        "kinesis": {
            "kinesisSchemaVersion": "1.0",
            "partitionKey": "1",
            "sequenceNumber": sequence_number,
            "data": data,
            "approximateArrivalTimestamp": 1545084650.987
        },
        "eventSource": "aws:kinesis",
        "eventVersion": "1.0",
        "eventID": format!("shardId-000000000006:{sequence_number}"),
        "eventName": "aws:kinesis:record",
        "invokeIdentityArn": "arn:aws:iam::123456789012:role/lambda-role",
        "awsRegion": "us-east-2",
        "eventSourceARN": "arn:aws:kinesis:us-east-2:123456789012:stream/lambda-stream"
    })
}

pub fn dynamodb_record(sequence_number: &str, message: &str) -> Value {
    json!({
        "eventID": "1",
        "eventVersion": "1.0",
        "dynamodb": {
            "Keys": {"Id": {"N": "101"}},
            "NewImage": {"Message": {"S": message}},
            "StreamViewType": "NEW_AND_OLD_IMAGES",
            "SequenceNumber": sequence_number,
            "SizeBytes": 26
        },
        "awsRegion": "us-west-2",
        "eventName": "INSERT",
        "eventSourceARN": "eventsource_arn",
        "eventSource": "aws:dynamodb"
    })
}

/// Handler that counts invocations and fails any record whose payload
/// contains "fail".
#[derive(Debug, Default, Clone)]
pub struct CountingHandler {
    invocations: Arc<AtomicUsize>,
    processed: Arc<Mutex<Vec<String>>>,
    yield_per_record: bool,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yielding() -> Self {
        Self {
            yield_per_record: true,
            ..Self::default()
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().clone()
    }

    pub fn payload(record: &EventRecord) -> String {
        if let Some(sqs) = record.as_sqs() {
            return sqs.body.clone();
        }
        if let Some(kinesis) = record.as_kinesis() {
            return kinesis.kinesis.data.clone();
        }
        if let Some(dynamodb) = record.as_dynamodb() {
            return dynamodb
                .dynamodb
                .new_image
                .get("Message")
                .and_then(|attr| attr.get("S"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
        String::new()
    }
}

#[async_trait]
impl RecordHandler<EventRecord> for CountingHandler {
    type Output = String;

    async fn handle(&self, record: &EventRecord) -> anyhow::Result<String> {
        use lambda_partial_batch::BatchRecord;

        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.yield_per_record {
            tokio::task::yield_now().await;
        }
        let payload = Self::payload(record);
        if payload.contains("fail") {
            anyhow::bail!("Failed to process record");
        }
        self.processed.lock().push(record.item_identifier().to_string());
        Ok(payload)
    }
}
