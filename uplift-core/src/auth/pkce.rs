//! PKCE verifier/challenge and OAuth `state` generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind the verifier and the state nonce.
///
/// 32 bytes encode to 43 base64url characters, the RFC 7636 minimum.
pub const RANDOM_TOKEN_BYTES: usize = 32;

/// Verifier/challenge pair for a single authorization attempt.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier and its S256 challenge.
    pub fn generate() -> Self {
        let code_verifier = random_token(RANDOM_TOKEN_BYTES);
        let code_challenge = code_challenge_s256(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

/// Return `length` bytes from the OS CSPRNG, base64url-encoded without padding.
pub fn random_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `base64url(SHA-256(verifier))` without padding.
pub fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
