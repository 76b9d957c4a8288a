//! csv-processor - CSV ingestion worker
//!
//! Drains an SQS queue fed by S3 upload notifications (routed through an
//! SNS topic), fetches each referenced CSV object, and upserts its rows
//! into a DynamoDB table keyed by an identifier column.
//!
//! The queue's visibility timeout is the only retry and mutual-exclusion
//! mechanism: a message is deleted only after every row of its object has
//! been durably written, and upserts are pure overwrites so redelivery
//! converges to the same final state.

pub mod config;
pub mod notification;
pub mod object_store;
pub mod parse;
pub mod provision;
pub mod queue;
pub mod table;
pub mod worker;
