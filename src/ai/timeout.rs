//! Attempt Timeouts
//!
//! Every upstream attempt made by the gateway or the quote source is bounded.
//! These helpers wrap `tokio::time::timeout` and convert elapsed deadlines
//! into [`StockError::Timeout`].

use std::future::Future;
use std::time::Duration;

use crate::types::{Result, StockError};

/// Execute a fallible async operation with a timeout
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(StockError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation with a timeout, keeping its output untouched.
///
/// Useful when the inner future has its own error type, as provider calls do.
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(StockError::timeout(operation_name, timeout)),
    }
}
