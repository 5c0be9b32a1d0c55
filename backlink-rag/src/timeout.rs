//! Bounded-latency wrapper for upstream calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{RagError, Result};

/// Race `future` against a timer; the first to settle wins.
///
/// An elapsed budget yields [`RagError::Timeout`]. The losing future is
/// dropped, not cancelled at the network layer.
pub async fn with_timeout<T, F>(after: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout { operation: operation.to_string(), after }),
    }
}
