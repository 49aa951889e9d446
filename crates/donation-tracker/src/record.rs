//! PayPal transaction records and their classification

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::constants;
use crate::ledger::CurrencyLedger;

/// A raw field value that could not be turned into a record
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("record has no TIMESTAMP field")]
    MissingTimestamp,

    #[error("invalid TIMESTAMP '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid {field} amount '{value}'")]
    InvalidAmount { field: &'static str, value: String },
}

/// How a record counts towards the monthly totals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// One-time donation
    OneTime,
    /// Recurring subscription payment
    Subscription,
    /// Refunds, fees, withdrawals, subscription lifecycle events...
    Other,
}

impl RecordKind {
    /// Classify from the PayPal type and gross amount.
    ///
    /// Nothing with a non-positive amount is ever a donation or a
    /// subscription payment.
    pub fn classify(txn_type: &str, amount: f64) -> Self {
        if amount <= 0.0 {
            return RecordKind::Other;
        }
        match txn_type {
            "Donation" => RecordKind::OneTime,
            "Payment" | "Recurring Payment" => RecordKind::Subscription,
            _ => RecordKind::Other,
        }
    }
}

/// One payment event as reported by PayPal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub txn_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Unique PayPal transaction ID, the only key used for deduplication
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub amt: f64,
    /// Fees are reported negative by PayPal and stored as given
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fee_amt: f64,
    /// Trusted from PayPal, not recomputed
    #[serde(default, skip_serializing_if = "is_zero")]
    pub net_amt: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency_code: String,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl Record {
    /// Build a record from the fields of one NVP list item.
    ///
    /// Field names are matched case-insensitively. Unknown fields are
    /// ignored, absent or empty fields keep their default, and any value
    /// that is present but unparsable is an error.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Result<Self, RecordError> {
        let mut timestamp = None;
        let mut record = Record {
            timestamp: DateTime::<Utc>::default(),
            txn_type: String::new(),
            email: String::new(),
            name: String::new(),
            transaction_id: String::new(),
            status: String::new(),
            amt: 0.0,
            fee_amt: 0.0,
            net_amt: 0.0,
            currency_code: String::new(),
        };

        for (name, value) in fields {
            if value.is_empty() {
                continue;
            }
            match name.to_ascii_uppercase().as_str() {
                "TIMESTAMP" => timestamp = Some(parse_timestamp(value)?),
                "TYPE" => record.txn_type = value.clone(),
                "EMAIL" => record.email = value.clone(),
                "NAME" => record.name = value.clone(),
                "TRANSACTIONID" => record.transaction_id = value.clone(),
                "STATUS" => record.status = value.clone(),
                "AMT" => record.amt = parse_amount("AMT", value)?,
                "FEEAMT" => record.fee_amt = parse_amount("FEEAMT", value)?,
                "NETAMT" => record.net_amt = parse_amount("NETAMT", value)?,
                "CURRENCYCODE" => record.currency_code = value.clone(),
                _ => {}
            }
        }

        record.timestamp = timestamp.ok_or(RecordError::MissingTimestamp)?;
        Ok(record)
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::classify(&self.txn_type, self.amt)
    }

    pub fn is_donation(&self) -> bool {
        self.kind() == RecordKind::OneTime
    }

    pub fn is_subscription(&self) -> bool {
        self.kind() == RecordKind::Subscription
    }

    /// Subscription sign-ups and cancellations carry no money
    fn is_subscription_event(&self) -> bool {
        (self.txn_type == "Recurring Payment" && self.amt == 0.0 && self.fee_amt == 0.0)
            || self.txn_type == "Subscription Cancellation"
    }
}

/// Parse a PayPal `YYYY-MM-DDTHH:MM:SSZ` timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RecordError> {
    NaiveDateTime::parse_from_str(value, constants::PAYPAL_DATE_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|_| RecordError::InvalidTimestamp(value.to_string()))
}

fn parse_amount(field: &'static str, value: &str) -> Result<f64, RecordError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidAmount {
            field,
            value: value.to_string(),
        })
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = self.timestamp.format("%b %-d, %Y %-I:%M %P UTC");

        if self.is_subscription_event() {
            return write!(
                f,
                "{}: {} {} a subscription",
                when,
                self.name,
                self.status.to_lowercase()
            );
        }

        write!(
            f,
            "{}: {} <{}> {}, {} {:.2} ({:.2} fee) = {:.2}, {}",
            when,
            self.name,
            self.email,
            self.txn_type,
            self.currency_code,
            self.amt,
            self.fee_amt,
            self.net_amt,
            self.status
        )
    }
}

/// Stable sort by timestamp, oldest first
pub fn sort_by_timestamp(records: &mut [Record]) {
    records.sort_by_key(|r| r.timestamp);
}

/// Split into (donations and subscriptions, everything else), order preserved
pub fn filter_donations(records: &[Record]) -> (Vec<Record>, Vec<Record>) {
    records
        .iter()
        .cloned()
        .partition(|r| r.kind() != RecordKind::Other)
}

/// Gross amount per currency over all records
pub fn total_by_currency(records: &[Record]) -> CurrencyLedger {
    records
        .iter()
        .map(|r| (r.currency_code.as_str(), r.amt))
        .collect()
}
