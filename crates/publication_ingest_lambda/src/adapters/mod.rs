pub mod dynamodb;
pub mod event_bridge;
pub mod object_store;
pub mod s3;

use std::future::Future;

use tokio::runtime::Handle;

/// Drives an SDK future to completion from synchronous adapter code.
///
/// The handle is captured when the adapter is built so that calls made from rayon
/// workers, which have no runtime context of their own, still reach the Lambda runtime.
pub(crate) fn run_blocking<F: Future>(handle: &Handle, future: F) -> F::Output {
    tokio::task::block_in_place(|| handle.block_on(future))
}
