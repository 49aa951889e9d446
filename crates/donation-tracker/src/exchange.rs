//! EUR to USD exchange rate from fixer.io

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// fixer.io latest rates response
#[derive(Debug, Deserialize)]
struct FixerResponse {
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Fetch the current EUR to USD rate.
///
/// A zero rate is returned as-is; callers treat it as a configuration error.
pub async fn fetch_eur_to_usd(url: &str, access_key: &str) -> Result<f64> {
    let response = reqwest::Client::new()
        .get(url)
        .query(&[("access_key", access_key)])
        .header("Accept", "application/json")
        .send()
        .await
        .context("Failed to request exchange rate")?;

    if !response.status().is_success() {
        anyhow::bail!("Exchange rate API returned status: {}", response.status());
    }

    let body = response
        .text()
        .await
        .context("Failed to read exchange rate response")?;
    parse_usd_rate(&body)
}

fn parse_usd_rate(body: &str) -> Result<f64> {
    let data: FixerResponse =
        serde_json::from_str(body).context("Failed to parse exchange rate response")?;
    let rate = data
        .rates
        .get("USD")
        .copied()
        .context("No USD rate in exchange rate response")?;

    tracing::debug!(
        base = data.base.as_deref().unwrap_or("?"),
        date = data.date.as_deref().unwrap_or("?"),
        rate,
        "exchange rate"
    );
    Ok(rate)
}

/// Reject a rate that would silently zero out every EUR donation
pub fn ensure_usable(rate: f64) -> Result<f64> {
    if rate == 0.0 || !rate.is_finite() {
        anyhow::bail!(
            "Got an exchange rate of {} for EUR to USD, is the fixer.io access key correct?",
            rate
        );
    }
    Ok(rate)
}
