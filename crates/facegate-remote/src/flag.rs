//! Match flag endpoint: `GET <flag_url>?f5=1&f1=<0|1>`, sent on change only.

use crate::{build_client, RemoteError};
use std::future::Future;
use std::time::Duration;

/// Flag channel the kiosk writes to on the remote board.
const CHANNEL_PARAM: (&str, &str) = ("f5", "1");
const VALUE_PARAM: &str = "f1";

/// Whether the last picture or frame contained a known face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFlag {
    Matched,
    NoMatch,
}

impl MatchFlag {
    pub fn from_match(matched: bool) -> Self {
        if matched { Self::Matched } else { Self::NoMatch }
    }

    /// Wire value: "1" or "0".
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "1",
            Self::NoMatch => "0",
        }
    }
}

/// Destination for match flags. Returns the HTTP status of the delivery.
pub trait FlagSink {
    fn send(&self, flag: MatchFlag) -> impl Future<Output = Result<u16, RemoteError>> + Send;
}

/// Delivers flags to the remote flag endpoint over HTTP.
#[derive(Clone)]
pub struct HttpFlagSink {
    client: reqwest::Client,
    url: String,
}

impl HttpFlagSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self { client: build_client(timeout)?, url: url.into() })
    }
}

impl FlagSink for HttpFlagSink {
    async fn send(&self, flag: MatchFlag) -> Result<u16, RemoteError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[CHANNEL_PARAM, (VALUE_PARAM, flag.as_str())])
            .send()
            .await
            .map_err(|source| RemoteError::Request { url: self.url.clone(), source })?;
        Ok(response.status().as_u16())
    }
}

/// What [`MatchReporter::report`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Same flag as last time; nothing sent.
    Unchanged,
    Sent(MatchFlag),
    /// The endpoint answered with a non-200 status.
    Rejected { flag: MatchFlag, status: u16 },
    /// The request never completed.
    Failed(MatchFlag),
}

/// Sends the match flag whenever it differs from the previous one.
///
/// The previous flag is updated on every attempt, successful or not, so a
/// failed delivery is only repeated once the match state flips again.
pub struct MatchReporter<S> {
    sink: S,
    previous: Option<MatchFlag>,
}

impl<S: FlagSink> MatchReporter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, previous: None }
    }

    pub fn previous(&self) -> Option<MatchFlag> {
        self.previous
    }

    pub async fn report(&mut self, matched: bool) -> ReportOutcome {
        let flag = MatchFlag::from_match(matched);
        if self.previous == Some(flag) {
            return ReportOutcome::Unchanged;
        }
        self.previous = Some(flag);

        match self.sink.send(flag).await {
            Ok(200) => {
                tracing::info!(flag = flag.as_str(), "status sent");
                ReportOutcome::Sent(flag)
            }
            Ok(status) => {
                tracing::warn!(flag = flag.as_str(), status, "failed to send status");
                ReportOutcome::Rejected { flag, status }
            }
            Err(e) => {
                tracing::warn!(flag = flag.as_str(), error = %e, "error sending status");
                ReportOutcome::Failed(flag)
            }
        }
    }
}
