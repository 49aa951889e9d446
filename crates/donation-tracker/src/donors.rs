//! Per-donor rollup of a year's donations and subscriptions

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::ledger::CurrencyLedger;
use crate::record::Record;

/// Everything one person gave in the year
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    pub name: String,
    pub email: String,
    pub total: CurrencyLedger,
    pub count: u32,
    pub anonymous: bool,
}

/// Donor preferences kept in donors.json
#[derive(Debug, Default, Deserialize)]
pub struct DonorPreferences {
    /// Emails of donors who asked not to be named
    #[serde(default)]
    anonymous: Vec<String>,
    /// Email to the name the donor should be listed under
    #[serde(default, rename = "names")]
    corrected_names: HashMap<String, String>,
}

impl DonorPreferences {
    /// Load preferences; no file means no corrections
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Malformed donor file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut prefs: Self = serde_json::from_str(content)?;
        prefs.anonymous = prefs.anonymous.iter().map(|e| e.to_lowercase()).collect();
        prefs.corrected_names = prefs
            .corrected_names
            .into_iter()
            .map(|(email, name)| (email.to_lowercase(), name))
            .collect();
        Ok(prefs)
    }

    fn apply(&self, donor: &mut Donor, anonymous: &HashSet<&str>) {
        let email = donor.email.to_lowercase();
        if let Some(name) = self.corrected_names.get(&email) {
            donor.name = name.clone();
        }
        donor.anonymous = anonymous.contains(email.as_str());
    }
}

/// Group donations and subscriptions by email, largest donors first.
///
/// Totals are ranked with USD and EUR at par; ties are ordered by email.
pub fn collect<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    prefs: &DonorPreferences,
) -> Vec<Donor> {
    let anonymous: HashSet<&str> = prefs.anonymous.iter().map(String::as_str).collect();
    let mut by_email: BTreeMap<String, Donor> = BTreeMap::new();

    for record in records {
        if !(record.is_donation() || record.is_subscription()) {
            continue;
        }
        let donor = by_email
            .entry(record.email.to_lowercase())
            .or_insert_with(|| {
                let mut donor = Donor {
                    name: record.name.clone(),
                    email: record.email.clone(),
                    total: CurrencyLedger::new(),
                    count: 0,
                    anonymous: false,
                };
                prefs.apply(&mut donor, &anonymous);
                donor
            });
        donor.total.add(&record.currency_code, record.amt);
        donor.count += 1;
    }

    let mut donors: Vec<Donor> = by_email.into_values().collect();
    donors.sort_by(|a, b| {
        b.total
            .grand_total(1.0)
            .total_cmp(&a.total.grand_total(1.0))
            .then_with(|| a.email.cmp(&b.email))
    });
    donors
}
