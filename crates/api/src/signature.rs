//! Stripe webhook signature verification
//!
//! Implements the `Stripe-Signature` header scheme: the header carries
//! `t=<timestamp>,v1=<hmac>` pairs, and the signature is HMAC-SHA256 over
//! `"{timestamp}.{payload}"` keyed by the endpoint's signing secret. A
//! timestamp older than the tolerance window is rejected to blunt replay.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of the signature timestamp (seconds)
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing timestamp in signature header")]
    MissingTimestamp,

    #[error("missing v1 signature in signature header")]
    MissingSignature,

    #[error("signature timestamp outside tolerance window")]
    StaleTimestamp,

    #[error("signature mismatch")]
    Mismatch,

    #[error("invalid signing secret")]
    InvalidSecret,
}

pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    /// Verify `header` against `payload` using the current wall clock
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.verify_at(payload, header, now)
    }

    /// Verification pinned to a caller-supplied "now" (tests)
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        // Parse the signature header: t=timestamp,v1=signature,v0=signature
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<&str> = None;

        for part in header.split(',') {
            let kv: Vec<&str> = part.splitn(2, '=').collect();
            if kv.len() == 2 {
                match kv[0] {
                    "t" => timestamp = kv[1].parse().ok(),
                    "v1" => v1_signature = Some(kv[1]),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        let v1_signature = v1_signature.ok_or(SignatureError::MissingSignature)?;

        if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(SignatureError::StaleTimestamp);
        }

        // The secret's "whsec_" prefix is not part of the signing key
        let secret_key = self
            .secret
            .strip_prefix("whsec_")
            .unwrap_or(&self.secret);

        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        let computed = hex::encode(mac.finalize().into_bytes());

        if computed != v1_signature {
            return Err(SignatureError::Mismatch);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1700000000;

    fn sign(payload: &[u8], secret_key: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let verifier = SignatureVerifier::new(SECRET);
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let sig = sign(payload, "test123secret456", NOW);
        let header = format!("t={},v1={}", NOW, sig);

        assert!(verifier.verify_at(payload, &header, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let sig = sign(payload, "some-other-secret", NOW);
        let header = format!("t={},v1={}", NOW, sig);

        assert!(matches!(
            verifier.verify_at(payload, &header, NOW),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let original = br#"{"type":"checkout.session.completed"}"#;
        let tampered = br#"{"type":"checkout.session.completed","hacked":true}"#;
        let sig = sign(original, "test123secret456", NOW);
        let header = format!("t={},v1={}", NOW, sig);

        assert!(matches!(
            verifier.verify_at(tampered, &header, NOW),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let payload = b"{}";
        // 10 minutes ago - beyond the 5-minute tolerance
        let old = NOW - 600;
        let sig = sign(payload, "test123secret456", old);
        let header = format!("t={},v1={}", old, sig);

        assert!(matches!(
            verifier.verify_at(payload, &header, NOW),
            Err(SignatureError::StaleTimestamp)
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let verifier = SignatureVerifier::new(SECRET);

        assert!(matches!(
            verifier.verify_at(b"{}", "v1=abcdef", NOW),
            Err(SignatureError::MissingTimestamp)
        ));
        assert!(matches!(
            verifier.verify_at(b"{}", &format!("t={}", NOW), NOW),
            Err(SignatureError::MissingSignature)
        ));
    }
}
