//! Shared HTTP request helpers for CLI commands.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

async fn get(url: &str, accept: &str) -> Result<reqwest::Response> {
    let response = reqwest::Client::new()
        .get(url)
        .header(reqwest::header::ACCEPT, accept)
        .send()
        .await
        .with_context(|| format!("failed to connect to fchd at {}, is it running?", url))?;

    if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
        let retry = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("60")
            .to_string();
        bail!("no router availability published yet, retry in {}s", retry);
    }
    if !response.status().is_success() {
        bail!("fchd returned {}", response.status());
    }
    Ok(response)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    get(url, "application/json")
        .await?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn get_text(url: &str) -> Result<String> {
    get(url, "text/plain")
        .await?
        .text()
        .await
        .context("failed to read response")
}
