use crate::domain::error::DomainError;
use std::future::Future;
use std::time::Duration;

/// Run `fut` under `limit`. Expiry becomes a retryable `DomainError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DomainError::Timeout(format!(
            "{what} did not finish within {}ms",
            limit.as_millis()
        ))),
    }
}
