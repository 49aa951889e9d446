//! Yearly reconciliation: top up the stored PayPal history and summarize it
//!
//! Every run does the same thing: the latest stored month is re-fetched from
//! the day of its last record, months not yet stored are fetched in full,
//! and the whole year is folded into monthly summaries.

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};

use crate::adjustments;
use crate::config::Config;
use crate::dedup;
use crate::paypal::{self, TransactionSource};
use crate::record::{self, Record};
use crate::store::TransactionStore;
use crate::summary::{MonthlySummaries, MonthlySummary, month_name};
use crate::upload::DonationSummary;

/// Outcome of summarizing one year
#[derive(Debug)]
pub struct YearReport {
    pub year: i32,
    pub summaries: MonthlySummaries,
    /// Sum over every month, adjustments included
    pub total: MonthlySummary,
    /// Stored records that are neither donations nor subscriptions
    pub other: Vec<Record>,
    pub donations: DonationSummary,
    /// Months whose batch was written during this run, in write order
    pub updated_months: Vec<u32>,
}

/// Fetch whatever is new for `year`, then summarize it.
///
/// `current_year` and `current_month` are the wall-clock date in UTC; months
/// after it are never fetched. Any failing step aborts the run, leaving
/// months saved before the failure in place.
pub async fn process_year<S: TransactionSource>(
    source: &S,
    config: &Config,
    year: i32,
    current_year: i32,
    current_month: u32,
    rate: f64,
) -> Result<YearReport> {
    let mut store = TransactionStore::load(&config.data_dir, year)?;

    let mut updated_months = Vec::new();
    if let Some(month) = top_up_latest_month(source, &mut store).await? {
        updated_months.push(month);
    }

    let missing: Vec<u32> = store
        .missing_months()
        .into_iter()
        .filter(|m| year < current_year || *m <= current_month)
        .collect();
    if !missing.is_empty() {
        tracing::info!(year, months = ?missing, "fetching missing months");
    }
    for month in missing {
        paypal::fetch_and_save_month(source, &mut store, month).await?;
        updated_months.push(month);
    }

    let mut report = summarize_year(config, &store, current_year, current_month, rate)?;
    report.updated_months = updated_months;
    Ok(report)
}

/// Re-fetch the latest stored month from the start of its last record's day.
///
/// The stored batch is only rewritten when the merge found new transactions;
/// returns the month when it was.
async fn top_up_latest_month<S: TransactionSource>(
    source: &S,
    store: &mut TransactionStore,
) -> Result<Option<u32>> {
    let Some(month) = store.latest_month() else {
        return Ok(None);
    };
    let year = store.year();

    let start = match store.latest_record() {
        Some(latest) => paypal::day_start(latest.timestamp),
        None => paypal::month_start(year, month)?,
    };
    let fetched = source
        .fetch(start, Some(paypal::month_end(year, month)?))
        .await
        .with_context(|| format!("Failed to re-fetch {} {}", month_name(month), year))?;

    let existing = store.month(month).unwrap_or_default();
    let known = existing.len();
    let mut merged = dedup::merge(existing, &fetched);

    if merged.len() == known {
        tracing::info!(
            month = month_name(month),
            year,
            fetched = fetched.len(),
            "no new transactions"
        );
        return Ok(None);
    }

    tracing::info!(
        month = month_name(month),
        year,
        new = merged.len() - known,
        "found new transactions, saving to JSON"
    );
    record::sort_by_timestamp(&mut merged);
    store.save_month(month, merged)?;
    Ok(Some(month))
}

/// Fold a loaded store into monthly summaries and headline totals.
///
/// A batch only counts towards its own month; donations dated in another
/// month are reported and left to that month's batch. Closed months are
/// snapshotted before adjustments are applied, so the snapshot only ever
/// holds what the stored records say.
pub fn summarize_year(
    config: &Config,
    store: &TransactionStore,
    current_year: i32,
    current_month: u32,
    rate: f64,
) -> Result<YearReport> {
    let year = store.year();
    let mut summaries = MonthlySummaries::new();
    let mut other = Vec::new();

    for month in store.existing_months() {
        let records = store.month(month).unwrap_or_default();
        let (donations, rest) = record::filter_donations(records);

        let monthly = MonthlySummaries::summarize(&donations);
        if monthly.len() > 1 {
            tracing::warn!(
                batch = month_name(month),
                months = monthly.len(),
                "batch holds donations from more than one month, only its own month is counted"
            );
        }

        summaries.insert(month, monthly.get(month).cloned().unwrap_or_default());
        other.extend(rest);
    }

    let snapshot_path = config.summary_path(year);
    if let Some(snapshot) = MonthlySummaries::load(&snapshot_path)? {
        let filled = summaries.fill_missing_from(&snapshot);
        if !filled.is_empty() {
            tracing::info!(months = ?filled, "months taken from summary snapshot");
        }
    }
    let closed = summaries.closed_months(year, current_year, current_month);
    if !closed.is_empty() {
        closed.save(&snapshot_path)?;
    }

    let (in_year, other_years): (Vec<_>, Vec<_>) =
        adjustments::load_from_csv(&config.adjustments_path(year))?
            .into_iter()
            .partition(|a| a.date.year() == year);
    for adjustment in &other_years {
        tracing::warn!("skipping adjustment outside {}: [{}]", year, adjustment);
    }
    adjustments::apply(&mut summaries, &in_year);

    let total = summaries.total();
    let gross = total.gross_total();
    for currency in gross.unconverted_currencies() {
        tracing::warn!(
            currency,
            amount = gross.get(currency),
            "currency is not part of the grand total"
        );
    }
    let donations = DonationSummary::from_gross(&gross, rate, Utc::now());

    Ok(YearReport {
        year,
        summaries,
        total,
        other,
        donations,
        updated_months: Vec::new(),
    })
}
