//! Build state storage and write retries.

mod retry;
mod store;

pub use retry::{with_retry, BackoffStrategy, JitterStrategy, RetryConfig};
pub use store::{BuildSnapshot, BuildStateStore, InMemoryBuildStateStore};
