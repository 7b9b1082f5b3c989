//! Hardware-status endpoint: a GET that returns a short text flag.

use crate::{build_client, RemoteError};
use std::time::Duration;
use tokio::time::Instant;

/// Client for the hardware-status endpoint.
#[derive(Clone)]
pub struct StatusClient {
    client: reqwest::Client,
    url: String,
}

impl StatusClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self { client: build_client(timeout)?, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One status read. `Some(trimmed body)` on HTTP 200, `None` on any other status.
    pub async fn fetch(&self) -> Result<Option<String>, RemoteError> {
        let request_err = |source| RemoteError::Request { url: self.url.clone(), source };

        let response = self.client.get(&self.url).send().await.map_err(request_err)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!(url = %self.url, status = status.as_u16(), "status endpoint returned non-200");
            return Ok(None);
        }

        let body = response.text().await.map_err(request_err)?;
        Ok(Some(body.trim().to_string()))
    }

    /// Poll until the endpoint answers `ready_value`, sleeping `interval`
    /// between attempts. Request errors are logged and polling continues.
    ///
    /// With `max_wait = None` this waits forever. Returns the number of
    /// attempts it took.
    pub async fn wait_until_ready(
        &self,
        ready_value: &str,
        interval: Duration,
        max_wait: Option<Duration>,
    ) -> Result<u32, RemoteError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.fetch().await {
                Ok(Some(value)) if value == ready_value => {
                    tracing::info!(attempts, elapsed = ?started.elapsed(), "hardware ready");
                    return Ok(attempts);
                }
                Ok(value) => {
                    tracing::debug!(attempts, ?value, "hardware not ready");
                }
                Err(e) => {
                    tracing::error!(error = %e, "error checking hardware status");
                }
            }

            if let Some(limit) = max_wait {
                if started.elapsed() + interval > limit {
                    return Err(RemoteError::ReadyTimeout(limit));
                }
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testserver::serve;

    const FAST: Duration = Duration::from_millis(10);

    fn client(url: &str) -> StatusClient {
        StatusClient::new(url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_trims_body() {
        let server = serve(vec![(200, "  1\r\n")]).await;
        let status = client(&server.base_url).fetch().await.unwrap();
        assert_eq!(status.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_none() {
        let server = serve(vec![(503, "1")]).await;
        assert_eq!(client(&server.base_url).fetch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}")).fetch().await.unwrap_err();
        assert!(matches!(err, RemoteError::Request { .. }));
    }

    #[tokio::test]
    async fn test_wait_until_ready_polls_until_one() {
        let server = serve(vec![(200, "0"), (500, "1"), (200, "10"), (200, "1\n")]).await;
        let attempts = client(&server.base_url)
            .wait_until_ready("1", FAST, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(attempts, 4);
        assert_eq!(server.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let server = serve(vec![(200, "0")]).await;
        let err = client(&server.base_url)
            .wait_until_ready("1", FAST, Some(Duration::from_millis(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::ReadyTimeout(_)));
        assert!(server.requests().len() >= 2);
    }
}
