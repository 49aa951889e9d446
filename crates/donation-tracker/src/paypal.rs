//! PayPal transaction search over the NVP API

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::config::PayPalConfig;
use crate::constants;
use crate::nvp::NvpResponse;
use crate::record::{self, Record};
use crate::store::TransactionStore;
use crate::summary::month_name;

/// Anything that can list the transactions of a time range
pub trait TransactionSource {
    /// Records from `start` (inclusive) through `end`, oldest first
    async fn fetch(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Vec<Record>>;
}

/// PayPal NVP `TransactionSearch` client
pub struct PayPalClient {
    http: reqwest::Client,
    config: PayPalConfig,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl TransactionSource for PayPalClient {
    async fn fetch(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Vec<Record>> {
        let start = format_timestamp(start);
        let end = end.map(format_timestamp);
        tracing::info!(start = %start, end = end.as_deref().unwrap_or("now"), "searching PayPal transactions");

        let mut params = vec![
            ("METHOD", constants::PAYPAL_SEARCH_METHOD.to_string()),
            ("VERSION", constants::PAYPAL_API_VERSION.to_string()),
            ("USER", self.config.user.clone()),
            ("PWD", self.config.password.clone()),
            ("SIGNATURE", self.config.signature.clone()),
            ("STARTDATE", start),
        ];
        if let Some(end) = end {
            params.push(("ENDDATE", end));
        }

        let response = self
            .http
            .post(&self.config.endpoint)
            .form(&params)
            .send()
            .await
            .context("Failed to call PayPal TransactionSearch")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("PayPal API error {}: {}", status, text);
        }

        let body = response
            .text()
            .await
            .context("Failed to read PayPal response")?;

        records_from_nvp(&body)
    }
}

/// Decode a TransactionSearch response body into records sorted by timestamp.
///
/// Any record that fails to parse fails the whole response.
pub fn records_from_nvp(body: &str) -> Result<Vec<Record>> {
    let response = NvpResponse::parse(body);
    if let Some(correlation_id) = response.fields.get("CORRELATIONID") {
        tracing::debug!(correlation_id = %correlation_id, ack = %response.ack, "PayPal response");
    }
    let items = response.into_items()?;

    let mut records = items
        .iter()
        .enumerate()
        .map(|(i, fields)| {
            Record::from_fields(fields).with_context(|| format!("Unparsable PayPal record #{}", i))
        })
        .collect::<Result<Vec<_>>>()?;

    record::sort_by_timestamp(&mut records);
    Ok(records)
}

/// PayPal request bound format
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(constants::PAYPAL_DATE_FORMAT).to_string()
}

/// Midnight UTC at the start of the day `ts` falls on
pub fn day_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

/// `YYYY-MM-01T00:00:00Z`
pub fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month {}-{:02}", year, month))?;
    Ok(first.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Last second of the month, `YYYY-MM-<last day>T23:59:59Z`
pub fn month_end(year: i32, month: u32) -> Result<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month {}-{:02}", year, month))?;
    let last = first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .with_context(|| format!("No month end for {}-{:02}", year, month))?;
    last.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("No month end for {}-{:02}", year, month))
}

/// Fetch a full month and overwrite its stored batch
pub async fn fetch_and_save_month<S: TransactionSource>(
    source: &S,
    store: &mut TransactionStore,
    month: u32,
) -> Result<usize> {
    let year = store.year();
    let records = source
        .fetch(month_start(year, month)?, Some(month_end(year, month)?))
        .await
        .with_context(|| format!("Failed to fetch {} {}", month_name(month), year))?;

    let count = records.len();
    tracing::info!(
        month = month_name(month),
        year,
        count,
        "fetched month, saving to JSON"
    );
    store.save_month(month, records)?;

    Ok(count)
}
