use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Handle;

use super::object_store::{ObjectSource, ReportStore};
use super::run_blocking;

/// S3-backed source for legacy exports and sink for failure reports.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    report_bucket: Option<String>,
    handle: Handle,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, report_bucket: Option<String>, handle: Handle) -> Self {
        Self {
            client,
            report_bucket,
            handle,
        }
    }
}

impl ObjectSource for S3ObjectStore {
    fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, String> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();

        run_blocking(&self.handle, async move {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let output = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|error| format!("failed to list s3://{bucket}/{prefix}: {error}"))?;

                keys.extend(
                    output
                        .contents()
                        .iter()
                        .filter_map(|object| object.key())
                        .filter(|key| !key.ends_with('/'))
                        .map(str::to_string),
                );

                match output.next_continuation_token() {
                    Some(token) if output.is_truncated().unwrap_or(false) => {
                        continuation_token = Some(token.to_string());
                    }
                    _ => break,
                }
            }
            Ok(keys)
        })
    }

    fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();

        run_blocking(&self.handle, async move {
            let output = client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|error| format!("failed to read s3://{bucket}/{key}: {error}"))?;
            let body = output
                .body
                .collect()
                .await
                .map_err(|error| format!("failed to read body of s3://{bucket}/{key}: {error}"))?;
            Ok(body.into_bytes().to_vec())
        })
    }
}

impl ReportStore for S3ObjectStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        let bucket = self
            .report_bucket
            .clone()
            .ok_or_else(|| "FAILURE_REPORT_BUCKET must be configured".to_string())?;
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let client = self.client.clone();

        run_blocking(&self.handle, async move {
            client
                .put_object()
                .bucket(bucket)
                .key(object_key)
                .content_type("application/json")
                .body(ByteStream::from(body_bytes))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to write object to s3: {error}"))
        })
    }
}
