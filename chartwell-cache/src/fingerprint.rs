//! Request fingerprints used as cache keys.
//!
//! A fingerprint is the SHA-256 (hex) of the method, URL, query parameters,
//! body and a cache-bust counter. Parameters are hashed in key order, so two
//! requests that differ only in parameter order share a fingerprint.

use chartwell_core::RequestSource;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The request fields that contribute to a fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInput<'a> {
    pub method: &'a str,
    /// URL after placeholder substitution.
    pub url: &'a str,
    pub params: &'a BTreeMap<String, Value>,
    pub body: Option<&'a Value>,
    /// Bumped whenever the shape of the source changes.
    pub cache_bust: u64,
}

impl<'a> FingerprintInput<'a> {
    /// Fingerprint input for `source` sent to `url`.
    pub fn for_request(
        source: &'a RequestSource,
        method: &'a str,
        url: &'a str,
        cache_bust: u64,
    ) -> Self {
        Self {
            method,
            url,
            params: &source.params,
            body: source.body.as_ref(),
            cache_bust,
        }
    }
}

/// Compute the hex fingerprint of a request.
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.method.to_ascii_uppercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(input.url.as_bytes());
    hasher.update([0u8]);
    for (key, value) in input.params {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"&");
    }
    hasher.update([0u8]);
    if let Some(body) = input.body {
        hasher.update(body.to_string().as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(input.cache_bust.to_le_bytes());
    hex::encode(hasher.finalize())
}
