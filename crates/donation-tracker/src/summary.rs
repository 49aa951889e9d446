//! Monthly donation summaries and the persisted summary snapshot
//!
//! A summary is an accumulator: adding the same record twice counts it twice.
//! Duplicate protection lives upstream in `dedup`.

use anyhow::{Context, Result};
use chrono::{Datelike, Month};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::ledger::CurrencyLedger;
use crate::record::{Record, RecordKind};

/// Aggregated donations for one calendar month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    #[serde(alias = "OneTimeAmt")]
    pub one_time: CurrencyLedger,
    #[serde(alias = "OneTimeCount")]
    pub one_time_count: u32,
    #[serde(alias = "SubscriptionAmt")]
    pub subscription: CurrencyLedger,
    #[serde(alias = "SubscriptionCount")]
    pub subscription_count: u32,
    /// Negative values, as reported by PayPal
    #[serde(alias = "FeeAmt")]
    pub fees: CurrencyLedger,
}

impl MonthlySummary {
    pub fn add_one_time(&mut self, amount: f64, fee: f64, currency: &str) {
        self.one_time_count += 1;
        self.one_time.add(currency, amount);
        self.fees.add(currency, fee);
    }

    pub fn add_subscription(&mut self, amount: f64, fee: f64, currency: &str) {
        self.subscription_count += 1;
        self.subscription.add(currency, amount);
        self.fees.add(currency, fee);
    }

    /// Fold one record in according to its classification
    pub fn add_record(&mut self, record: &Record) {
        match record.kind() {
            RecordKind::OneTime => {
                self.add_one_time(record.amt, record.fee_amt, &record.currency_code)
            }
            RecordKind::Subscription => {
                self.add_subscription(record.amt, record.fee_amt, &record.currency_code)
            }
            RecordKind::Other => {}
        }
    }

    pub fn gross_total(&self) -> CurrencyLedger {
        self.one_time.merge(&self.subscription)
    }

    /// Gross plus fees; fees are negative so this subtracts them
    pub fn net_total(&self) -> CurrencyLedger {
        self.gross_total().merge(&self.fees)
    }

    /// Combine two summaries field by field
    pub fn combine(&self, other: &MonthlySummary) -> MonthlySummary {
        MonthlySummary {
            one_time: self.one_time.merge(&other.one_time),
            one_time_count: self.one_time_count + other.one_time_count,
            subscription: self.subscription.merge(&other.subscription),
            subscription_count: self.subscription_count + other.subscription_count,
            fees: self.fees.merge(&other.fees),
        }
    }
}

impl fmt::Display for MonthlySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "One-time: {} ({}), Subscriptions: {} ({}), Fees: {}",
            self.one_time, self.one_time_count, self.subscription, self.subscription_count, self.fees
        )
    }
}

/// Summaries keyed by month number (1-12)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySummaries(BTreeMap<u32, MonthlySummary>);

impl MonthlySummaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary for a month, created empty on first use
    pub fn for_month(&mut self, month: u32) -> &mut MonthlySummary {
        self.0.entry(month).or_default()
    }

    pub fn get(&self, month: u32) -> Option<&MonthlySummary> {
        self.0.get(&month)
    }

    pub fn insert(&mut self, month: u32, summary: MonthlySummary) {
        self.0.insert(month, summary);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Months in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &MonthlySummary)> {
        self.0.iter().map(|(m, s)| (*m, s))
    }

    /// Fold records into per-month summaries by the month of their timestamp.
    ///
    /// Records classified as `Other` still create their month's entry, so an
    /// unexpected month shows up even when it holds no donations.
    pub fn summarize(records: &[Record]) -> Self {
        let mut result = Self::new();
        for record in records {
            result.for_month(record.timestamp.month()).add_record(record);
        }
        result
    }

    /// Sum of all months; order of folding does not matter
    pub fn total(&self) -> MonthlySummary {
        self.0
            .values()
            .fold(MonthlySummary::default(), |acc, s| acc.combine(s))
    }

    /// Take months missing here from a previously saved snapshot.
    ///
    /// Months already present are kept as they are and never summed with
    /// the snapshot. Returns the months that were filled in.
    pub fn fill_missing_from(&mut self, snapshot: &MonthlySummaries) -> Vec<u32> {
        let mut filled = Vec::new();
        for (month, summary) in snapshot.iter() {
            if !self.0.contains_key(&month) {
                self.0.insert(month, summary.clone());
                filled.push(month);
            }
        }
        filled
    }

    /// Months that can no longer change: everything before the current month
    /// of the current year, every month of a past year.
    pub fn closed_months(&self, year: i32, current_year: i32, current_month: u32) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(month, _)| year < current_year || **month < current_month)
                .map(|(m, s)| (*m, s.clone()))
                .collect(),
        )
    }

    /// Write the snapshot as JSON keyed by month name
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary snapshot {}", path.display()))
    }

    /// Load a snapshot, `None` when no snapshot was saved yet
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read summary snapshot {}", path.display()))?;
        let summaries = serde_json::from_str(&content)
            .with_context(|| format!("Malformed summary snapshot {}", path.display()))?;
        Ok(Some(summaries))
    }
}

/// English month name for a month number
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

impl Serialize for MonthlySummaries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let by_name: BTreeMap<&str, &MonthlySummary> =
            self.0.iter().map(|(m, s)| (month_name(*m), s)).collect();
        by_name.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MonthlySummaries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let by_name = BTreeMap::<String, MonthlySummary>::deserialize(deserializer)?;
        let mut result = BTreeMap::new();
        for (name, summary) in by_name {
            let month = name
                .parse::<Month>()
                .map_err(|_| serde::de::Error::custom(format!("unknown month '{}'", name)))?;
            result.insert(month.number_from_month(), summary);
        }
        Ok(Self(result))
    }
}
