use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use publication_ingest_core::emitter::BatchEmitter;
use publication_ingest_core::pipeline::StorageEntryMapper;
use publication_ingest_core::record::EmissionContext;
use publication_ingest_lambda::adapters::event_bridge::EventBridgePublisher;
use publication_ingest_lambda::adapters::s3::S3ObjectStore;
use publication_ingest_lambda::config::RuntimeConfig;
use publication_ingest_lambda::handlers::import::{
    handle_import_event, ApiGatewayResponse, ImportHandlerConfig,
};
use publication_ingest_lambda::logging::init_logging;
use serde_json::Value;
use tokio::runtime::Handle;

struct RuntimeDependencies {
    config: RuntimeConfig,
    objects: S3ObjectStore,
    publisher: EventBridgePublisher,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: Arc<RuntimeDependencies>,
) -> Result<ApiGatewayResponse, Error> {
    let request_id = event.context.request_id.clone();
    let context = EmissionContext::new(
        deps.config.event_source.clone(),
        deps.config.import_detail_type.clone(),
        request_id.clone(),
    );
    let emitter = BatchEmitter::new(deps.publisher.clone(), deps.config.emitter.clone(), context)
        .map_err(|error| Error::from(format!("invalid emitter configuration: {error}")))?;

    let handler_config = ImportHandlerConfig {
        report_prefix: deps.config.failure_report_prefix.clone(),
        import_date: Utc::now().format("%Y-%m-%d").to_string(),
        report_part: request_id,
    };

    Ok(handle_import_event(
        event.payload,
        &deps.objects,
        &deps.objects,
        &StorageEntryMapper,
        &emitter,
        &handler_config,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let config = RuntimeConfig::from_env()
        .map_err(|error| Error::from(format!("invalid configuration: {error}")))?;
    if config.failure_report_bucket.is_none() {
        return Err(Error::from("FAILURE_REPORT_BUCKET must be configured"));
    }

    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.emitter.region.clone()))
        .load()
        .await;
    let handle = Handle::current();

    let deps = Arc::new(RuntimeDependencies {
        objects: S3ObjectStore::new(
            aws_sdk_s3::Client::new(&aws_config),
            config.failure_report_bucket.clone(),
            handle.clone(),
        ),
        publisher: EventBridgePublisher::new(aws_sdk_eventbridge::Client::new(&aws_config), handle),
        config,
    });

    tracing::info!(
        event_bus = %deps.config.emitter.event_bus_name,
        batch_size = deps.config.emitter.batch_size,
        max_rounds = deps.config.emitter.max_rounds,
        "ingest runtime started"
    );

    lambda_runtime::run(service_fn(move |event| {
        let deps = Arc::clone(&deps);
        async move { handle_request(event, deps).await }
    }))
    .await
}
