//! Prefixed unique identifier generation
//!
//! Every persisted entity gets an ID of the form `{prefix}_{random}`:
//! `usr_` for users, `tnt_` for tenants, `rft_` for refresh tokens,
//! `ott_` for one-time tokens, `inv_` for invitations, and `att_` for
//! login attempts. The random
//! segment carries 96 bits of OS entropy encoded as URL-safe base64, so
//! IDs are unguessable and safe to expose in logs and URLs.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

const MIN_ID_BYTES: usize = 12;

/// Generate a prefixed ID with the default 96 bits of entropy.
pub fn generate_prefixed_id(prefix: &str) -> String {
    generate_prefixed_id_with_bytes(prefix, MIN_ID_BYTES)
}

/// Generate a prefixed ID with a custom entropy size.
///
/// Panics if `num_bytes` is below 12; shorter IDs would be guessable.
pub fn generate_prefixed_id_with_bytes(prefix: &str, num_bytes: usize) -> String {
    assert!(
        num_bytes >= MIN_ID_BYTES,
        "ID entropy below the 12-byte minimum"
    );
    let mut bytes = vec![0u8; num_bytes];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(bytes))
}

/// Check that an ID carries the expected prefix and a well-formed random
/// segment with at least the minimum entropy.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(rest) = id.strip_prefix(expected_prefix).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };
    match URL_SAFE_NO_PAD.decode(rest) {
        Ok(bytes) => bytes.len() >= MIN_ID_BYTES,
        Err(_) => false,
    }
}

/// Extract the prefix of an ID, if it has one.
pub fn extract_prefix(id: &str) -> Option<&str> {
    id.split_once('_').map(|(prefix, _)| prefix)
}
