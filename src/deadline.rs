use crate::error::EngineError;
use std::future::Future;
use std::time::Duration;

/// Wraps an async operation with an upper bound on how long it may run,
/// surfacing `EngineError::Timeout` if the deadline passes first.
/// Mirrors §5's fixed operation-level deadlines (room creation, single
/// external call, vote write) — each call site picks its own duration.
pub async fn enforce<F, T>(duration: Duration, operation: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout),
    }
}
