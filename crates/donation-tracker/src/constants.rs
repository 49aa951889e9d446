//! Centralized constants for the donation tracker
//!
//! Account credentials and endpoints that differ per deployment are loaded
//! from config.toml. Everything here is fixed by the upstream APIs or by the
//! on-disk layout of the data directory.

// =============================================================================
// PayPal NVP API
// =============================================================================

/// NVP method used to search the transaction history
pub const PAYPAL_SEARCH_METHOD: &str = "TransactionSearch";

/// NVP API version the response layout is parsed against
pub const PAYPAL_API_VERSION: &str = "117.0";

/// Timestamp format used by PayPal for request bounds and response records
pub const PAYPAL_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// =============================================================================
// Exchange Rate API
// =============================================================================

/// Fixer.io latest rates endpoint, EUR base with USD as the only symbol
pub const FIXER_IO_URL: &str = "http://data.fixer.io/api/latest?symbols=USD";

// =============================================================================
// Object Storage (CDN)
// =============================================================================

/// Host serving the public donations.json
pub const DEFAULT_UPLOAD_HOST: &str = "cdn.haiku-os.org";

/// Bucket holding the summary document
pub const DEFAULT_UPLOAD_BUCKET: &str = "haiku-inc";

/// Object key of the summary document
pub const DEFAULT_UPLOAD_KEY: &str = "donations.json";

/// Region used for request signing (MinIO accepts the AWS default)
pub const DEFAULT_UPLOAD_REGION: &str = "us-east-1";

// =============================================================================
// File Names
// =============================================================================

/// Default config file path
pub const CONFIG_FILE: &str = "config.toml";

/// Prefix of the per-month transaction batch files (`paypal-2024-03.json`)
pub const BATCH_FILE_PREFIX: &str = "paypal";

/// Prefix of the persisted monthly summary snapshot (`summary-2024.json`)
pub const SUMMARY_FILE_PREFIX: &str = "summary";

/// One-off adjustments CSV, `{year}` is replaced with the processed year
pub const DEFAULT_ADJUSTMENTS_PATTERN: &str = "transactions-{year}.csv";

/// Donor name corrections and anonymity preferences
pub const DEFAULT_DONORS_FILE: &str = "donors.json";

// =============================================================================
// Validation
// =============================================================================

/// First year with PayPal history worth processing
pub const MIN_YEAR: i32 = 2010;

// =============================================================================
// Currencies
// =============================================================================

pub const USD: &str = "USD";
pub const EUR: &str = "EUR";
