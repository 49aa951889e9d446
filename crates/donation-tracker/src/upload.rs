//! Publishing the yearly donation totals to object storage
//!
//! Requests are signed with AWS Signature Version 4 using path-style
//! addressing (`https://<host>/<bucket>/<key>`), which the CDN accepts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::UploadTarget;
use crate::constants;
use crate::ledger::CurrencyLedger;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const CONTENT_TYPE: &str = "application/json";
const SIGNED_HEADERS: &str = "content-type;host;x-amz-content-sha256;x-amz-date";

/// The document published for the donations page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationSummary {
    pub updated_at: DateTime<Utc>,
    pub usd_donations: f64,
    pub eur_donations: f64,
    pub eur_to_usd_rate: f64,
    pub total_donations: f64,
}

impl DonationSummary {
    /// Headline numbers from a year's gross ledger
    pub fn from_gross(gross: &CurrencyLedger, rate: f64, updated_at: DateTime<Utc>) -> Self {
        Self {
            updated_at,
            usd_donations: gross.get(constants::USD),
            eur_donations: gross.get(constants::EUR),
            eur_to_usd_rate: rate,
            total_donations: gross.grand_total(rate),
        }
    }
}

/// PUT the summary as JSON to the configured bucket
pub async fn upload(target: &UploadTarget, summary: &DonationSummary) -> Result<()> {
    let body = serde_json::to_vec(summary).context("Failed to serialize donation summary")?;
    let url = format!(
        "https://{}{}",
        target.host,
        canonical_uri(&target.bucket, &target.key)
    );
    let headers = sign_put(target, &body, Utc::now())?;

    tracing::info!(url = %url, bytes = body.len(), "uploading donation summary");

    let mut request = reqwest::Client::new().put(&url).body(body);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    let response = request.send().await.context("Failed to upload donation summary")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("Upload to {} failed with {}: {}", url, status, text);
    }

    Ok(())
}

/// Headers for a signed PUT of `body`, including `Authorization`
fn sign_put(
    target: &UploadTarget,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, String)>> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(body));

    let canonical_request = format!(
        "PUT\n{}\n\ncontent-type:{}\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
        canonical_uri(&target.bucket, &target.key),
        CONTENT_TYPE,
        target.host,
        payload_hash,
        amz_date,
        SIGNED_HEADERS,
        payload_hash
    );

    let scope = format!("{}/{}/{}/aws4_request", date, target.region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&target.secret_access_key, &date, &target.region, SERVICE)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, target.access_key_id, scope, SIGNED_HEADERS, signature
    );

    Ok(vec![
        ("Content-Type", CONTENT_TYPE.to_string()),
        ("x-amz-content-sha256", payload_hash),
        ("x-amz-date", amz_date),
        ("Authorization", authorization),
    ])
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).context("Invalid HMAC key")?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `/<bucket>/<key>` with each path segment URI-encoded
fn canonical_uri(bucket: &str, key: &str) -> String {
    let mut uri = String::new();
    for segment in std::iter::once(bucket).chain(key.split('/')) {
        uri.push('/');
        uri.push_str(&uri_encode(segment));
    }
    uri
}

fn uri_encode(segment: &str) -> String {
    segment
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn target() -> UploadTarget {
        UploadTarget {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            host: constants::DEFAULT_UPLOAD_HOST.to_string(),
            bucket: constants::DEFAULT_UPLOAD_BUCKET.to_string(),
            key: constants::DEFAULT_UPLOAD_KEY.to_string(),
            region: constants::DEFAULT_UPLOAD_REGION.to_string(),
        }
    }

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> &'a str {
        headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn test_signing_key_matches_published_example() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_sign_put_headers() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 30, 0).unwrap();
        let headers = sign_put(&target(), b"{}", now).unwrap();

        assert_eq!(header(&headers, "x-amz-date"), "20240701T123000Z");
        assert_eq!(
            header(&headers, "x-amz-content-sha256"),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );

        let auth = header(&headers, "Authorization");
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240701/us-east-1/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date"));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_signature_depends_on_body_and_time() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 7, 1, 12, 31, 0).unwrap();

        let a = sign_put(&target(), b"{}", now).unwrap();
        let again = sign_put(&target(), b"{}", now).unwrap();
        let other_body = sign_put(&target(), b"[]", now).unwrap();
        let other_time = sign_put(&target(), b"{}", later).unwrap();

        assert_eq!(a, again);
        assert_ne!(header(&a, "Authorization"), header(&other_body, "Authorization"));
        assert_ne!(header(&a, "Authorization"), header(&other_time, "Authorization"));
    }

    #[test]
    fn test_canonical_uri() {
        assert_eq!(canonical_uri("haiku-inc", "donations.json"), "/haiku-inc/donations.json");
        assert_eq!(canonical_uri("b", "dir/a file.json"), "/b/dir/a%20file.json");
    }

    #[test]
    fn test_summary_from_gross() {
        let gross: CurrencyLedger = [("USD", 100.0), ("EUR", 50.0), ("GBP", 7.0)]
            .into_iter()
            .collect();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();

        let summary = DonationSummary::from_gross(&gross, 1.1, now);

        assert_eq!(summary.usd_donations, 100.0);
        assert_eq!(summary.eur_donations, 50.0);
        assert!((summary.total_donations - 155.0).abs() < 1e-9);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["eur_to_usd_rate"], 1.1);
        assert!(json.get("updated_at").is_some());
    }
}
