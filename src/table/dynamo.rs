//! DynamoDB row store.
//!
//! Item shape:
//! - partition key: the identifier field (String)
//! - one string attribute per remaining CSV column
//!
//! `put_item` replaces the whole item, which gives the required pure
//! overwrite-by-key semantics.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use super::{Result, RowRecord, RowStore, TableError};

/// DynamoDB-backed row store.
pub struct DynamoRowStore {
    client: Client,
    table_name: String,
    id_field: String,
}

impl DynamoRowStore {
    /// Create a row store over an existing DynamoDB client.
    pub fn new(
        client: Client,
        table_name: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        let table_name = table_name.into();
        let id_field = id_field.into();
        info!(table = %table_name, id_field = %id_field, "Using DynamoDB row store");
        Self {
            client,
            table_name,
            id_field,
        }
    }
}

#[async_trait]
impl RowStore for DynamoRowStore {
    async fn upsert(&self, record: &RowRecord) -> Result<()> {
        let mut item = HashMap::new();
        item.insert(
            self.id_field.clone(),
            AttributeValue::S(record.id.clone()),
        );
        for (name, value) in &record.fields {
            if name == &self.id_field {
                continue;
            }
            item.insert(name.clone(), AttributeValue::S(value.clone()));
        }

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("ValidationException")
                    || err_str.contains("SerializationException")
                {
                    TableError::Rejected(format!("DynamoDB put_item rejected: {}", e))
                } else {
                    // Throttling, unavailability, and transport failures all
                    // clear up on their own; classify unknowns as transient.
                    TableError::Unavailable(format!("DynamoDB put_item failed: {}", e))
                }
            })?;

        debug!(table = %self.table_name, id = %record.id, "Upserted row");
        Ok(())
    }
}
