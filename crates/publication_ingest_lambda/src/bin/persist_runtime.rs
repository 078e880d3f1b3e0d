use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use publication_ingest_lambda::adapters::dynamodb::DynamoDbEntryStore;
use publication_ingest_lambda::config::RuntimeConfig;
use publication_ingest_lambda::handlers::persist::handle_persist_event;
use publication_ingest_lambda::logging::init_logging;
use serde_json::Value;
use tokio::runtime::Handle;

async fn handle_request(
    event: LambdaEvent<Value>,
    store: Arc<DynamoDbEntryStore>,
) -> Result<Value, Error> {
    let outcome = handle_persist_event(&event.payload, store.as_ref()).map_err(|error| {
        tracing::error!(
            request_id = %event.context.request_id,
            error = %error,
            "entry not persisted"
        );
        Error::from(error.to_string())
    })?;
    serde_json::to_value(outcome)
        .map_err(|error| Error::from(format!("failed to serialize outcome: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let config = RuntimeConfig::from_env()
        .map_err(|error| Error::from(format!("invalid configuration: {error}")))?;
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.emitter.region.clone()))
        .load()
        .await;

    let store = Arc::new(DynamoDbEntryStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.table_name.clone(),
        Handle::current(),
    ));
    tracing::info!(table = %config.table_name, "persist runtime started");

    lambda_runtime::run(service_fn(move |event| {
        let store = Arc::clone(&store);
        async move { handle_request(event, store).await }
    }))
    .await
}
