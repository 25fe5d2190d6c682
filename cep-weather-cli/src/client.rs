use std::time::Duration;

use anyhow::{Context, Result, bail};
use cep_weather_core::{LookupError, MergedResult};
use reqwest::{Client, StatusCode};

/// Ask a running server for `cep`, giving it `timeout` to answer.
pub async fn query(server: &str, cep: &str, timeout: Duration) -> Result<MergedResult> {
    let http = Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let url = format!("{}/weatherByCep/{}", server.trim_end_matches('/'), cep.trim());

    let res = match http.get(&url).send().await {
        Ok(res) => res,
        Err(err) if err.is_timeout() => {
            bail!("Server took longer than {timeout:?} to answer. Try again.")
        }
        Err(err) => return Err(err).with_context(|| format!("Failed to call server at {url}")),
    };

    let status = res.status();
    let body = res.text().await.context("Failed to read server response body")?;

    if status != StatusCode::OK {
        let err: LookupError = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse error response ({status})"))?;
        bail!("Lookup failed\n{err}");
    }

    serde_json::from_str(&body).context("Failed to parse lookup response")
}
