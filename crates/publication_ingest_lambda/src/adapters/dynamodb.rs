//! DynamoDB implementation of the entry store.
//!
//! Every write is conditional. Creates put the item and its identifier guard in one
//! transaction, both requiring their key to be absent. Updates are a conditional `PutItem`
//! on the stored `rowVersion`; deletes remove the item and its guard together under the
//! same version check.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use publication_ingest_core::identifier::RowVersion;
use publication_ingest_core::keys::KeyPair;
use publication_ingest_core::projection::PhysicalItem;
use publication_ingest_core::schema::{
    ATTR_IDENTIFIER, ATTR_PK0, ATTR_PK1, ATTR_PK2, ATTR_ROW_VERSION, ATTR_SK0,
    INDEX_BY_CUSTOMER_STATUS, INDEX_BY_RESOURCE,
};
use publication_ingest_core::store::{EntryStore, StoreError, StoreIndex};
use serde_json::{Map, Number, Value};
use tokio::runtime::Handle;

use super::run_blocking;

const EXPECTED_VERSION: &str = ":expected";
const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

#[derive(Clone)]
pub struct DynamoDbEntryStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    handle: Handle,
}

impl std::fmt::Debug for DynamoDbEntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbEntryStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoDbEntryStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: String, handle: Handle) -> Self {
        Self {
            client,
            table_name,
            handle,
        }
    }

    fn transact(&self, items: Vec<TransactWriteItem>) -> Result<TransactOutcome, StoreError> {
        let request = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items));
        match run_blocking(&self.handle, request.send()) {
            Ok(_) => Ok(TransactOutcome::Applied),
            Err(error) if is_condition_cancellation(&error) => Ok(TransactOutcome::ConditionFailed),
            Err(error) => Err(unavailable("TransactWriteItems", &error)),
        }
    }
}

enum TransactOutcome {
    Applied,
    ConditionFailed,
}

impl EntryStore for DynamoDbEntryStore {
    fn put_if_absent(&self, item: &PhysicalItem) -> Result<(), StoreError> {
        let put_item = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(to_item(item)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", ATTR_PK0)
            .build()
            .map_err(|error| StoreError::Unavailable(format!("invalid put request: {error}")))?;
        let put_guard = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(guard_item(item)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", ATTR_PK0)
            .build()
            .map_err(|error| StoreError::Unavailable(format!("invalid put request: {error}")))?;

        match self.transact(vec![
            TransactWriteItem::builder().put(put_item).build(),
            TransactWriteItem::builder().put(put_guard).build(),
        ])? {
            TransactOutcome::Applied => Ok(()),
            TransactOutcome::ConditionFailed => {
                Err(StoreError::AlreadyExists(item.keys.primary.clone()))
            }
        }
    }

    fn put_with_version_check(
        &self,
        item: &PhysicalItem,
        expected: &RowVersion,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_item(item)))
            .condition_expression(format!("attribute_exists(#pk) AND #rv = {EXPECTED_VERSION}"))
            .expression_attribute_names("#pk", ATTR_PK0)
            .expression_attribute_names("#rv", ATTR_ROW_VERSION)
            .expression_attribute_values(
                EXPECTED_VERSION,
                AttributeValue::S(expected.as_str().to_string()),
            );

        match run_blocking(&self.handle, request.send()) {
            Ok(_) => Ok(()),
            Err(error)
                if error
                    .as_service_error()
                    .map(|service| service.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Err(StoreError::ConcurrentModification {
                    key: item.keys.primary.clone(),
                    expected: expected.clone(),
                })
            }
            Err(error) => Err(unavailable("PutItem", &error)),
        }
    }

    fn get(&self, primary: &KeyPair) -> Result<Option<PhysicalItem>, StoreError> {
        let request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(primary_key(primary)))
            .consistent_read(true);

        let output = run_blocking(&self.handle, request.send())
            .map_err(|error| unavailable("GetItem", &error))?;
        output.item().map(from_item).transpose()
    }

    fn delete_with_version_check(
        &self,
        primary: &KeyPair,
        guard: &KeyPair,
        expected: &RowVersion,
    ) -> Result<(), StoreError> {
        let delete_item = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(primary_key(primary)))
            .condition_expression(format!("#rv = {EXPECTED_VERSION}"))
            .expression_attribute_names("#rv", ATTR_ROW_VERSION)
            .expression_attribute_values(
                EXPECTED_VERSION,
                AttributeValue::S(expected.as_str().to_string()),
            )
            .build()
            .map_err(|error| StoreError::Unavailable(format!("invalid delete request: {error}")))?;
        let delete_guard = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(primary_key(guard)))
            .build()
            .map_err(|error| StoreError::Unavailable(format!("invalid delete request: {error}")))?;

        match self.transact(vec![
            TransactWriteItem::builder().delete(delete_item).build(),
            TransactWriteItem::builder().delete(delete_guard).build(),
        ])? {
            TransactOutcome::Applied => Ok(()),
            TransactOutcome::ConditionFailed => Err(StoreError::ConcurrentModification {
                key: primary.clone(),
                expected: expected.clone(),
            }),
        }
    }

    fn query(
        &self,
        index: StoreIndex,
        partition_key: &str,
    ) -> Result<Vec<PhysicalItem>, StoreError> {
        let (index_name, partition_attribute) = match index {
            StoreIndex::Primary => (None, ATTR_PK0),
            StoreIndex::ByCustomerStatus => (Some(INDEX_BY_CUSTOMER_STATUS), ATTR_PK1),
            StoreIndex::ByResource => (Some(INDEX_BY_RESOURCE), ATTR_PK2),
        };

        let client = self.client.clone();
        let table_name = self.table_name.clone();
        let partition_key = partition_key.to_string();

        let raw_items = run_blocking(&self.handle, async move {
            let mut items = Vec::new();
            let mut start_key: Option<HashMap<String, AttributeValue>> = None;
            loop {
                let output = client
                    .query()
                    .table_name(&table_name)
                    .set_index_name(index_name.map(str::to_string))
                    .key_condition_expression("#pk = :pk")
                    .expression_attribute_names("#pk", partition_attribute)
                    .expression_attribute_values(":pk", AttributeValue::S(partition_key.clone()))
                    .set_exclusive_start_key(start_key.take())
                    .send()
                    .await
                    .map_err(|error| unavailable("Query", &error))?;

                items.extend(output.items().iter().cloned());
                match output.last_evaluated_key() {
                    Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                    _ => break,
                }
            }
            Ok::<_, StoreError>(items)
        })?;

        raw_items.iter().map(from_item).collect()
    }
}

fn unavailable<E, R>(operation: &str, error: &SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StoreError::Unavailable(format!(
        "{operation} failed: {}",
        aws_sdk_dynamodb::error::DisplayErrorContext(error)
    ))
}

/// A transaction cancelled because one of its conditions did not hold.
fn is_condition_cancellation<R>(error: &SdkError<TransactWriteItemsError, R>) -> bool {
    match error.as_service_error() {
        Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => cancelled
            .cancellation_reasons()
            .iter()
            .any(|reason| reason.code() == Some(CONDITIONAL_CHECK_FAILED)),
        _ => false,
    }
}

/// Item reserving the identifier of `item`; only the key attributes are stored.
fn guard_item(item: &PhysicalItem) -> HashMap<String, AttributeValue> {
    let mut guard = primary_key(&item.uniqueness_key());
    guard.insert(
        ATTR_IDENTIFIER.to_string(),
        AttributeValue::S(item.identifier.as_str().to_string()),
    );
    guard
}

fn primary_key(primary: &KeyPair) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            ATTR_PK0.to_string(),
            AttributeValue::S(primary.partition_key.clone()),
        ),
        (
            ATTR_SK0.to_string(),
            AttributeValue::S(primary.sort_key.clone()),
        ),
    ])
}

fn to_item(item: &PhysicalItem) -> HashMap<String, AttributeValue> {
    item.attributes()
        .into_iter()
        .map(|(name, value)| (name, to_attribute(value)))
        .collect()
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<PhysicalItem, StoreError> {
    let attributes: BTreeMap<String, Value> = item
        .iter()
        .map(|(name, value)| (name.clone(), from_attribute(value)))
        .collect();
    PhysicalItem::from_attributes(&attributes)
        .map_err(|error| StoreError::Unavailable(format!("stored item is unreadable: {error}")))
}

pub(crate) fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .into_iter()
                .map(|(name, value)| (name, to_attribute(value)))
                .collect(),
        ),
    }
}

pub(crate) fn from_attribute(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(flag) => Value::Bool(*flag),
        AttributeValue::N(text) => number_value(text),
        AttributeValue::S(text) => Value::String(text.clone()),
        AttributeValue::L(values) => Value::Array(values.iter().map(from_attribute).collect()),
        AttributeValue::M(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), from_attribute(value)))
                .collect::<Map<String, Value>>(),
        ),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => {
            Value::Array(values.iter().map(|text| number_value(text)).collect())
        }
        _ => Value::Null,
    }
}

fn number_value(text: &str) -> Value {
    serde_json::from_str::<Number>(text)
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}
