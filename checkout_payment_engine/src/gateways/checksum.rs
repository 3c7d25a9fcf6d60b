//! The ECPay `CheckMacValue` checksum engine.
//!
//! Generates and verifies the tamper-evident signature that authenticates outbound payment requests and inbound
//! callbacks. The algorithm must match the gateway byte for byte; any divergence silently breaks verification, so
//! the encoding quirks are confined to [`form_encode`] and covered by unit tests.
//!
//! The algorithm:
//! 1. Drop any existing `CheckMacValue` field.
//! 2. Sort the remaining keys ascending, case-insensitively.
//! 3. Concatenate as `HashKey=<key>&k1=v1&...&HashIV=<iv>`.
//! 4. Percent-encode the whole string, lower-case it, and apply the gateway's .NET-style un-escapes.
//! 5. SHA-256, upper-case hex.

use sha2::{Digest, Sha256};

/// The parameter carrying the signature on ECPay requests and callbacks.
pub const SIGNATURE_FIELD: &str = "CheckMacValue";

/// Compute the `CheckMacValue` over the given parameters. Any signature field already present is ignored.
pub fn generate<'a, I>(hash_key: &str, hash_iv: &str, params: I) -> String
where I: IntoIterator<Item = (&'a str, &'a str)> {
    let mut fields: Vec<(&str, &str)> =
        params.into_iter().filter(|(k, _)| !k.eq_ignore_ascii_case(SIGNATURE_FIELD)).collect();
    fields.sort_by_key(|(k, _)| k.to_ascii_lowercase());
    let mut raw = format!("HashKey={hash_key}");
    for (k, v) in fields {
        raw.push('&');
        raw.push_str(k);
        raw.push('=');
        raw.push_str(v);
    }
    raw.push_str(&format!("&HashIV={hash_iv}"));
    let encoded = form_encode(&raw);
    let digest = Sha256::digest(encoded.as_bytes());
    digest.iter().map(|b| format!("{b:02X}")).collect()
}

/// Verify the signature carried in `params` against a recomputation over all other fields.
/// A missing or empty signature never verifies. Comparison is case-insensitive.
pub fn verify<'a, I>(hash_key: &str, hash_iv: &str, params: I) -> bool
where I: IntoIterator<Item = (&'a str, &'a str)> + Clone {
    let provided = match params.clone().into_iter().find(|(k, _)| k.eq_ignore_ascii_case(SIGNATURE_FIELD)) {
        Some((_, v)) if !v.is_empty() => v,
        _ => return false,
    };
    let expected = generate(hash_key, hash_iv, params);
    provided.eq_ignore_ascii_case(&expected)
}

/// Percent-encode `raw` the way the gateway's reference implementation (.NET `HttpUtility.UrlEncode`) does:
/// standard form encoding, lower-cased, with `-`, `_`, `.`, `!`, `*`, `(`, `)` left literal, space as `+`,
/// and `~` escaped as `%7e`.
fn form_encode(raw: &str) -> String {
    urlencoding::encode(raw)
        .to_ascii_lowercase()
        .replace('~', "%7e")
        .replace("%20", "+")
        .replace("%21", "!")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2a", "*")
}
