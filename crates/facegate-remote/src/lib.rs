//! facegate-remote: the two HTTP endpoints the kiosk talks to.
//!
//! [`StatusClient`] polls the hardware-status endpoint until the hardware
//! reports ready. [`MatchReporter`] forwards the match / no-match flag,
//! sending only when the flag changes.

pub mod flag;
pub mod status;

use std::time::Duration;
use thiserror::Error;

pub use flag::{HttpFlagSink, FlagSink, MatchFlag, MatchReporter, ReportOutcome};
pub use status::StatusClient;

pub const DEFAULT_STATUS_URL: &str = "https://aeprojecthub.in/getdata.php?id=2&C=F1";
pub const DEFAULT_FLAG_URL: &str = "https://aeprojecthub.in/flagChange.php";
pub const DEFAULT_READY_VALUE: &str = "1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("hardware not ready after {0:?}")]
    ReadyTimeout(Duration),
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("facegate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(RemoteError::Client)
}

#[cfg(test)]
pub(crate) mod testserver {
    //! Loopback HTTP server that answers each request with the next canned reply.

    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    pub struct TestServer {
        pub base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl TestServer {
        /// Request lines seen so far, e.g. `GET /flag?f5=1&f1=1 HTTP/1.1`.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Serve `(status, body)` replies in order; the last one repeats.
    pub async fn serve(replies: Vec<(u16, &'static str)>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                if let Some(line) = head.lines().next() {
                    seen.lock().unwrap().push(line.to_string());
                }

                let (status, body) = replies[served.min(replies.len() - 1)];
                served += 1;
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        TestServer { base_url: format!("http://{addr}"), requests }
    }
}
