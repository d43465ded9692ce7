//! Webhook payload signatures
//!
//! Messenger signs every POST with `x-hub-signature: <algorithm>=<hex digest>`,
//! an HMAC of the raw body keyed with the app secret.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::WebhookError;
use crate::platform::SIGNATURE_HEADER;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Parsed signature header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    pub algorithm: &'a str,
    pub digest: &'a str,
}

impl<'a> SignatureHeader<'a> {
    /// Split `algorithm=digest`; anything but exactly two parts is malformed
    pub fn parse(header: Option<&'a str>) -> Result<Self, WebhookError> {
        let header = header.ok_or(WebhookError::MissingHeader {
            header: SIGNATURE_HEADER,
        })?;

        let mut parts = header.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(algorithm), Some(digest), None) => Ok(Self { algorithm, digest }),
            _ => Err(WebhookError::MalformedHeader {
                header: SIGNATURE_HEADER,
            }),
        }
    }

    /// Recompute the HMAC over `payload` and compare in constant time
    pub fn verify(&self, payload: &[u8], secret: &str) -> Result<(), WebhookError> {
        let Some(computed) = compute(self.algorithm, payload, secret) else {
            warn!("Unsupported signature algorithm: {}", self.algorithm);
            return Err(WebhookError::IntegrityValidationFailed);
        };

        let Ok(supplied) = hex::decode(self.digest) else {
            warn!("Signature digest is not valid hex");
            return Err(WebhookError::IntegrityValidationFailed);
        };

        if bool::from(computed.as_slice().ct_eq(supplied.as_slice())) {
            Ok(())
        } else {
            warn!("Webhook signature verification failed: signatures do not match");
            Err(WebhookError::IntegrityValidationFailed)
        }
    }
}

/// Keyed hash of `payload` with the named algorithm
pub fn compute(algorithm: &str, payload: &[u8], secret: &str) -> Option<Vec<u8>> {
    match algorithm {
        "sha1" => {
            let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
            mac.update(payload);
            Some(mac.finalize().into_bytes().to_vec())
        }
        "sha256" => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
            mac.update(payload);
            Some(mac.finalize().into_bytes().to_vec())
        }
        _ => None,
    }
}

/// Produce a header value for `payload`, as Messenger would
pub fn sign(algorithm: &str, payload: &[u8], secret: &str) -> Option<String> {
    compute(algorithm, payload, secret).map(|digest| format!("{}={}", algorithm, hex::encode(digest)))
}

/// Parse and verify a signature header in one step
pub fn verify_signature(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
) -> Result<(), WebhookError> {
    SignatureHeader::parse(header)?.verify(payload, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"object":"page","entry":[]}"#;
    const SECRET: &str = "app_secret";

    #[test]
    fn test_verify_sha1() {
        let header = sign("sha1", BODY, SECRET).unwrap();
        assert!(header.starts_with("sha1="));
        assert!(verify_signature(Some(&header), BODY, SECRET).is_ok());
    }

    #[test]
    fn test_verify_sha256() {
        let header = sign("sha256", BODY, SECRET).unwrap();
        assert!(verify_signature(Some(&header), BODY, SECRET).is_ok());
    }

    #[test]
    fn test_single_bit_flip_fails() {
        let digest = compute("sha1", BODY, SECRET).unwrap();
        for byte in 0..digest.len() {
            let mut flipped = digest.clone();
            flipped[byte] ^= 0x01;
            let header = format!("sha1={}", hex::encode(&flipped));
            assert!(matches!(
                verify_signature(Some(&header), BODY, SECRET),
                Err(WebhookError::IntegrityValidationFailed)
            ));
        }
    }

    #[test]
    fn test_wrong_secret_and_tampered_body() {
        let header = sign("sha1", BODY, SECRET).unwrap();
        assert!(verify_signature(Some(&header), BODY, "other_secret").is_err());
        assert!(verify_signature(Some(&header), b"{\"object\":\"hacked\"}", SECRET).is_err());
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            verify_signature(None, BODY, SECRET),
            Err(WebhookError::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_malformed_header() {
        for header in ["abc123", "sha1=abc=def", ""] {
            assert!(matches!(
                SignatureHeader::parse(Some(header)),
                Err(WebhookError::MalformedHeader { .. })
            ));
        }
    }

    #[test]
    fn test_bad_digest_or_algorithm() {
        assert!(matches!(
            verify_signature(Some("sha1=zzzz"), BODY, SECRET),
            Err(WebhookError::IntegrityValidationFailed)
        ));
        assert!(matches!(
            verify_signature(Some("sha1=abcd"), BODY, SECRET),
            Err(WebhookError::IntegrityValidationFailed)
        ));
        assert!(matches!(
            verify_signature(Some("md5=abcd"), BODY, SECRET),
            Err(WebhookError::IntegrityValidationFailed)
        ));
    }
}
