//! PayPal name-value pair (NVP) response decoding
//!
//! A response body looks like
//! `ACK=Success&L_TIMESTAMP0=2024%2d03%2d05T10%3a15%3a00Z&L_AMT0=5%2e00&...`.
//! List fields carry an `L_` prefix and a numeric suffix naming the item.

use std::collections::BTreeMap;
use thiserror::Error;

/// The upstream call itself reported a failure
#[derive(Debug, Error, PartialEq)]
#[error("PayPal call was not successful (ACK={ack}): {}", .messages.join("; "))]
pub struct NvpError {
    pub ack: String,
    pub messages: Vec<String>,
}

/// Decoded NVP response
#[derive(Debug, Default, PartialEq)]
pub struct NvpResponse {
    pub ack: String,
    /// Non-list fields other than ACK
    pub fields: BTreeMap<String, String>,
    /// List items by index, each holding field name (without prefix and index) to value
    pub items: BTreeMap<u32, BTreeMap<String, String>>,
}

impl NvpResponse {
    pub fn parse(body: &str) -> Self {
        let mut response = NvpResponse::default();

        for (name, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            let value = value.into_owned();
            if name == "ACK" {
                response.ack = value;
            } else if let Some((field, index)) = split_list_name(&name) {
                response
                    .items
                    .entry(index)
                    .or_default()
                    .insert(field.to_string(), value);
            } else {
                response.fields.insert(name.into_owned(), value);
            }
        }

        response
    }

    /// `Success` and `SuccessWithWarning` both count
    pub fn is_success(&self) -> bool {
        self.ack.contains("Success")
    }

    /// List items in index order, or the upstream failure
    pub fn into_items(self) -> Result<Vec<BTreeMap<String, String>>, NvpError> {
        if !self.is_success() {
            let messages = self
                .items
                .values()
                .filter_map(|item| item.get("LONGMESSAGE").cloned())
                .collect();
            return Err(NvpError {
                ack: self.ack,
                messages,
            });
        }
        Ok(self.items.into_values().collect())
    }
}

/// `L_AMT12` -> (`AMT`, 12)
fn split_list_name(name: &str) -> Option<(&str, u32)> {
    let rest = name.strip_prefix("L_")?;
    let digits_at = rest.find(|c: char| c.is_ascii_digit())?;
    let (field, index) = rest.split_at(digits_at);
    if field.is_empty() {
        return None;
    }
    Some((field, index.parse().ok()?))
}
