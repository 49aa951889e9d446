//! One-off donations recorded outside PayPal (bank transfers, cheques, ...)
//!
//! Kept in a CSV per year and merged into the monthly summaries as one-time
//! donations.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::summary::MonthlySummaries;

/// One row of the adjustments CSV
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Adjustment {
    pub date: NaiveDate,
    #[serde(default, rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub amt: f64,
    /// Fee as a positive magnitude
    #[serde(default)]
    pub fee_amt: f64,
    pub currency_code: String,
}

impl Adjustment {
    pub fn net_amount(&self) -> f64 {
        self.amt - self.fee_amt
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} <{}> {}, {} {:.2} ({:.2} fee) = {:.2}",
            self.date.format("%b %-d, %Y"),
            self.name,
            self.email,
            self.kind,
            self.currency_code,
            self.amt,
            self.fee_amt,
            self.net_amount()
        )
    }
}

/// Load adjustments from CSV; a missing file means there are none
pub fn load_from_csv(path: &Path) -> Result<Vec<Adjustment>> {
    if !path.exists() {
        tracing::info!(
            path = %path.display(),
            "no adjustments file, assuming there are no other transactions"
        );
        return Ok(Vec::new());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut adjustments = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let adjustment: Adjustment =
            result.with_context(|| format!("Invalid row {} in {}", i + 2, path.display()))?;
        adjustments.push(adjustment);
    }
    Ok(adjustments)
}

/// Add each adjustment to its month as a one-time donation.
///
/// Fees always land in the fee ledger as negative values, matching PayPal.
pub fn apply(summaries: &mut MonthlySummaries, adjustments: &[Adjustment]) {
    for adjustment in adjustments {
        tracing::info!(
            month = adjustment.date.month(),
            "merging in transaction [{}]",
            adjustment
        );
        summaries.for_month(adjustment.date.month()).add_one_time(
            adjustment.amt,
            -adjustment.fee_amt.abs(),
            &adjustment.currency_code,
        );
    }
}
