//! Webhook signature verification
//!
//! Vendors sign webhook deliveries with HMAC-SHA256 over a versioned
//! signing string `v0:{timestamp}:{body}` and send the result as
//! `v0=<hex digest>` alongside the request timestamp. Verification:
//!
//! - The timestamp must be within the freshness window (default 300 s)
//!   in either direction; stale deliveries are rejected even when the
//!   HMAC itself is valid, which caps replay exposure.
//! - The digest comparison runs in constant time (`Mac::verify_slice`).
//! - When the integration has no secret configured, verification is
//!   skipped entirely.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed webhook, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Signature verification failure reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Timestamp header missing or not an integer
    MissingTimestamp,

    /// Signature header missing or not `v0=<hex>`
    MissingSignature,

    /// Timestamp outside the freshness window
    StaleTimestamp { age_secs: i64 },

    /// HMAC digest mismatch
    Mismatch,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MissingTimestamp => write!(f, "Missing signature timestamp"),
            SignatureError::MissingSignature => write!(f, "Missing signature header"),
            SignatureError::StaleTimestamp { age_secs } => {
                write!(f, "Signature timestamp {}s outside tolerance", age_secs)
            }
            SignatureError::Mismatch => write!(f, "Signature mismatch"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Compute the `v0=<hex>` signature for a payload
///
/// Used by tests and by outbound deliveries; the inverse of `verify`.
pub fn sign(secret: &str, timestamp: i64, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("v0:{}:{}", timestamp, body).as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a signed webhook delivery
///
/// `now_secs` is injected rather than read from the clock so freshness
/// behavior is testable without sleeping.
pub fn verify(
    secret: &str,
    signature_header: &str,
    timestamp: i64,
    body: &str,
    now_secs: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let age = now_secs - timestamp;
    if age.abs() > tolerance_secs {
        return Err(SignatureError::StaleTimestamp { age_secs: age });
    }

    let hex_digest = signature_header
        .strip_prefix("v0=")
        .ok_or(SignatureError::MissingSignature)?;
    let expected = hex::decode(hex_digest).map_err(|_| SignatureError::MissingSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("v0:{}:{}", timestamp, body).as_bytes());

    // verify_slice is constant-time
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}
