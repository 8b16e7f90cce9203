//! Cryptographic utilities for secure token generation and storage
//!
//! This module provides the primitives shared by the refresh token and
//! one-time token services: random secret generation, SHA-256 digests for
//! at-rest storage, and constant-time hash comparison.
//!
//! SHA-256 (rather than a memory-hard password hash) is appropriate here
//! because these secrets carry 256+ bits of CSPRNG entropy, so brute force
//! is infeasible regardless of hash speed, and token verification sits on
//! the hot path. Low-entropy user passwords are different; those go
//! through the salted, memory-hard hash in the password service. See
//! <https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html>.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Default entropy for single-use secrets (password reset, email
/// verification).
pub const DEFAULT_SECRET_BYTES: usize = 32;

/// Generate a cryptographically secure random secret.
///
/// Returns 32 bytes of OS entropy encoded as URL-safe base64 without
/// padding, suitable for transport in a request body or link.
pub fn generate_secure_token() -> String {
    generate_secure_token_with_bytes(DEFAULT_SECRET_BYTES)
}

/// Generate a secure random secret with a custom entropy size.
///
/// Refresh tokens use 64 bytes. Panics if `byte_len` is below the 32-byte
/// floor; a smaller secret would undermine the SHA-256 storage scheme.
pub fn generate_secure_token_with_bytes(byte_len: usize) -> String {
    assert!(
        byte_len >= DEFAULT_SECRET_BYTES,
        "secret entropy below the 32-byte minimum"
    );
    let mut bytes = vec![0u8; byte_len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a secret with SHA-256 for storage.
///
/// Only this digest is ever persisted; the raw secret is returned to the
/// caller once and never written down.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a presented secret against its stored digest in constant time.
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    let computed = hash_token(token);
    constant_time_compare(&computed, stored_hash)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
