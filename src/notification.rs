//! Upload notification decoding.
//!
//! The queue is fed by S3 event notifications routed through an SNS topic.
//! Depending on the subscription's raw-delivery setting the queue body is
//! either the S3 event itself or an SNS envelope whose `Message` field holds
//! the serialized S3 event as a string. Decoding tries the direct shape
//! first and falls back to the wrapped one, so both wirings work without
//! configuration.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Result type for notification decoding.
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Errors produced while decoding a queue message body.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Malformed notification body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Reference to one uploaded object, extracted from a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object key, URL-decoded.
    pub key: String,
    /// Object size in bytes, when the event carries it.
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records")]
    records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
    #[serde(rename = "eventName", default)]
    event_name: String,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Message")]
    message: String,
}

/// Decode a queue message body into object references.
///
/// Accepts either a direct S3 event notification or one wrapped in an SNS
/// envelope. S3 test events and non-create events decode to an empty list
/// rather than an error.
pub fn decode_notification(body: &str) -> Result<Vec<ObjectRef>> {
    match decode_s3_event(body) {
        Ok(refs) => Ok(refs),
        Err(direct_err) => {
            if let Ok(envelope) = serde_json::from_str::<SnsEnvelope>(body) {
                return decode_s3_event(&envelope.message);
            }
            Err(direct_err)
        }
    }
}

fn decode_s3_event(body: &str) -> Result<Vec<ObjectRef>> {
    if is_test_event(body) {
        debug!("Ignoring S3 test event");
        return Ok(Vec::new());
    }

    let event: S3Event = serde_json::from_str(body)?;

    let mut refs = Vec::with_capacity(event.records.len());
    for record in event.records {
        if !record.event_name.starts_with("ObjectCreated") {
            debug!(event_name = %record.event_name, "Skipping non-create event record");
            continue;
        }
        refs.push(ObjectRef {
            bucket: record.s3.bucket.name,
            key: decode_object_key(&record.s3.object.key),
            size: record.s3.object.size,
        });
    }
    Ok(refs)
}

/// S3 sends a `s3:TestEvent` probe when notifications are first configured.
fn is_test_event(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("Event").and_then(|e| e.as_str()).map(str::to_string))
        .is_some_and(|e| e == "s3:TestEvent")
}

/// Decode an object key as it appears in S3 event payloads.
///
/// Keys are URL-encoded with `+` for spaces. Invalid escapes are passed
/// through literally rather than rejected, since the key is opaque to us.
fn decode_object_key(key: &str) -> String {
    let bytes = key.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_event_json(bucket: &str, key: &str) -> String {
        serde_json::json!({
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": bucket },
                    "object": { "key": key, "size": 42 }
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn test_decode_direct_notification() {
        let body = s3_event_json("uploads", "people.csv");
        let refs = decode_notification(&body).unwrap();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].bucket, "uploads");
        assert_eq!(refs[0].key, "people.csv");
        assert_eq!(refs[0].size, Some(42));
    }

    #[test]
    fn test_decode_sns_wrapped_notification() {
        let inner = s3_event_json("uploads", "people.csv");
        let body = serde_json::json!({
            "Type": "Notification",
            "MessageId": "11111111-2222-3333-4444-555555555555",
            "TopicArn": "arn:aws:sns:us-east-1:000000000000:csv-upload-notifications",
            "Message": inner,
        })
        .to_string();

        let wrapped = decode_notification(&body).unwrap();
        let direct = decode_notification(&inner).unwrap();
        assert_eq!(wrapped, direct);
    }

    #[test]
    fn test_decode_url_encoded_key() {
        let body = s3_event_json("uploads", "reports/q1+2026%2Bfinal.csv");
        let refs = decode_notification(&body).unwrap();
        assert_eq!(refs[0].key, "reports/q1 2026+final.csv");
    }

    #[test]
    fn test_decode_invalid_escape_passes_through() {
        assert_eq!(decode_object_key("a%zz.csv"), "a%zz.csv");
        assert_eq!(decode_object_key("trailing%2"), "trailing%2");
    }

    #[test]
    fn test_non_create_events_filtered() {
        let body = serde_json::json!({
            "Records": [{
                "eventName": "ObjectRemoved:Delete",
                "s3": {
                    "bucket": { "name": "uploads" },
                    "object": { "key": "people.csv" }
                }
            }]
        })
        .to_string();

        let refs = decode_notification(&body).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_test_event_decodes_empty() {
        let body = serde_json::json!({
            "Service": "Amazon S3",
            "Event": "s3:TestEvent",
            "Bucket": "uploads"
        })
        .to_string();

        let refs = decode_notification(&body).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_wrapped_test_event_decodes_empty() {
        let body = serde_json::json!({
            "Type": "Notification",
            "Message": "{\"Service\":\"Amazon S3\",\"Event\":\"s3:TestEvent\"}",
        })
        .to_string();

        let refs = decode_notification(&body).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_malformed_body_is_error() {
        assert!(decode_notification("not json at all").is_err());
        assert!(decode_notification("{\"unrelated\": true}").is_err());
    }

    #[test]
    fn test_multiple_records() {
        let body = serde_json::json!({
            "Records": [
                {
                    "eventName": "ObjectCreated:Put",
                    "s3": { "bucket": { "name": "uploads" }, "object": { "key": "a.csv" } }
                },
                {
                    "eventName": "ObjectCreated:CompleteMultipartUpload",
                    "s3": { "bucket": { "name": "uploads" }, "object": { "key": "b.csv" } }
                }
            ]
        })
        .to_string();

        let refs = decode_notification(&body).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].key, "b.csv");
    }
}
