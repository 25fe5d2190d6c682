use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::{error::UpstreamError, stage::StageScope};

/// Single-attempt HTTP GET bound to a [`StageScope`].
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone, Default)]
pub struct UpstreamClient {
    http: Client,
}

impl UpstreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// GET `url` and return the body of a `200 OK` response.
    ///
    /// The request is dropped as soon as the stage ends, yielding
    /// [`UpstreamError::Interrupted`]; classifying that is left to [`StageScope::settle`].
    pub async fn fetch(&self, stage: &StageScope, url: &str) -> Result<Vec<u8>, UpstreamError> {
        debug!(stage = stage.name(), "starting upstream query");

        tokio::select! {
            biased;
            _ = stage.ended() => Err(UpstreamError::Interrupted),
            result = self.get(url) => result,
        }
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let res = self.http.get(url).send().await?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(UpstreamError::StatusMismatch { status });
        }

        let body = res.bytes().await?;
        Ok(body.to_vec())
    }
}
