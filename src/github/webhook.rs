//! Webhook signature checks.
//!
//! GitHub signs each delivery with the hook's shared secret and sends the
//! HMAC hex digest in `X-Hub-Signature` (`sha1=...`) and, on newer servers,
//! `X-Hub-Signature-256` (`sha256=...`).

use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";

/// Checks a `sha1=<hex>` or `sha256=<hex>` signature over the raw body.
///
/// Anything malformed (unknown prefix, wrong length, bad hex) is rejected.
pub fn verify_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    if let Some(digest) = signature.strip_prefix("sha256=") {
        let Some(expected) = decode_digest(digest, 32) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        return mac.verify_slice(&expected).is_ok();
    }

    if let Some(digest) = signature.strip_prefix("sha1=") {
        let Some(expected) = decode_digest(digest, 20) else {
            return false;
        };
        let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        return mac.verify_slice(&expected).is_ok();
    }

    false
}

/// Verifies a delivery from its request headers, preferring the SHA-256
/// signature when both are present.
pub fn verify_headers(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    let signature = headers
        .get(SIGNATURE_256_HEADER)
        .or_else(|| headers.get(SIGNATURE_HEADER))
        .and_then(|value| value.to_str().ok());

    match signature {
        Some(signature) => verify_signature(secret, signature, body),
        None => {
            tracing::debug!("Webhook delivery without a signature header");
            false
        }
    }
}

fn decode_digest(digest: &str, len: usize) -> Option<Vec<u8>> {
    if digest.len() != len * 2 {
        return None;
    }
    hex::decode(digest).ok()
}
