use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::{json, Value};

use crate::cli::{utils::output_success, OutputFormat};

pub async fn ping(base_url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/api/health", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("building HTTP client")?;

    let response = client.get(&url).send().await.with_context(|| format!("GET {}", url))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        bail!("{} answered {}: {}", url, status, body);
    }
    output_success(
        output_format,
        &format!("{} is healthy", base_url),
        Some(json!({ "status": status.as_u16(), "health": body })),
    )
}
