//! On-disk store of fetched PayPal transactions, one JSON batch per month
//!
//! Months before the latest stored month are complete and never re-fetched.
//! The latest stored month may be partial and is topped up on every run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::record::Record;

/// Layout of a batch file
#[derive(Debug, Default, Serialize, Deserialize)]
struct BatchFile {
    #[serde(default)]
    transactions: Vec<Record>,
}

/// All stored batches for one year
#[derive(Debug)]
pub struct TransactionStore {
    data_dir: PathBuf,
    year: i32,
    months: BTreeMap<u32, Vec<Record>>,
}

impl TransactionStore {
    /// Load every batch file of `year` found in `data_dir`.
    ///
    /// A missing directory or a year without files is an empty store. A batch
    /// file that cannot be read or parsed is an error.
    pub fn load(data_dir: &Path, year: i32) -> Result<Self> {
        let mut store = Self::empty(data_dir, year);
        if !data_dir.exists() {
            return Ok(store);
        }

        let entries = std::fs::read_dir(data_dir)
            .with_context(|| format!("Failed to list data directory {}", data_dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(month) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| batch_file_month(n, year))
            else {
                continue;
            };

            store.months.insert(month, load_batch(&path)?);
        }

        Ok(store)
    }

    /// Store with nothing loaded, for overwriting single months
    pub fn empty(data_dir: &Path, year: i32) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            year,
            months: BTreeMap::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Highest month with a stored batch
    pub fn latest_month(&self) -> Option<u32> {
        self.months.keys().next_back().copied()
    }

    /// Last record of the latest month; batches are kept oldest first
    pub fn latest_record(&self) -> Option<&Record> {
        self.latest_month()
            .and_then(|m| self.months.get(&m))
            .and_then(|records| records.last())
    }

    pub fn existing_months(&self) -> Vec<u32> {
        (1..=12).filter(|m| self.months.contains_key(m)).collect()
    }

    pub fn missing_months(&self) -> Vec<u32> {
        (1..=12).filter(|m| !self.months.contains_key(m)).collect()
    }

    pub fn month(&self, month: u32) -> Option<&[Record]> {
        self.months.get(&month).map(Vec::as_slice)
    }

    /// Every stored record, month by month
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.months.values().flatten()
    }

    /// Replace a month's batch on disk and in memory.
    ///
    /// Records are written as given: callers dedup and sort first.
    pub fn save_month(&mut self, month: u32, records: Vec<Record>) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory {}", self.data_dir.display())
        })?;

        let path = self.batch_path(month);
        let batch = BatchFile {
            transactions: records,
        };
        let json = serde_json::to_string_pretty(&batch)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!(
            path = %path.display(),
            records = batch.transactions.len(),
            "saved month batch"
        );
        self.months.insert(month, batch.transactions);

        Ok(())
    }

    pub fn batch_path(&self, month: u32) -> PathBuf {
        self.data_dir.join(format!(
            "{}-{}-{:02}.json",
            constants::BATCH_FILE_PREFIX,
            self.year,
            month
        ))
    }
}

/// Month of a `paypal-YYYY-MM.json` file name belonging to `year`
fn batch_file_month(file_name: &str, year: i32) -> Option<u32> {
    let prefix = format!("{}-{}-", constants::BATCH_FILE_PREFIX, year);
    let month = file_name.strip_prefix(&prefix)?.strip_suffix(".json")?;
    if month.len() != 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    month.parse().ok().filter(|m| (1..=12).contains(m))
}

fn load_batch(path: &Path) -> Result<Vec<Record>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let batch: BatchFile = serde_json::from_str(&content)
        .with_context(|| format!("Malformed transaction batch {}", path.display()))?;
    Ok(batch.transactions)
}
