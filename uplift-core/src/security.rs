//! Helpers for handling secrets: masking for logs and timing-safe comparison.

use subtle::ConstantTimeEq;

const TOKEN_MASK_PREFIX_LEN: usize = 4;
const TOKEN_MASK_SUFFIX_LEN: usize = 4;

/// Mask a token for logging, keeping only a short prefix and suffix.
pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let len = trimmed.chars().count();
    if len <= TOKEN_MASK_PREFIX_LEN + TOKEN_MASK_SUFFIX_LEN {
        return "*".repeat(len.min(8));
    }

    let prefix: String = trimmed.chars().take(TOKEN_MASK_PREFIX_LEN).collect();
    let suffix: String = trimmed.chars().skip(len - TOKEN_MASK_SUFFIX_LEN).collect();
    format!("{prefix}...{suffix}")
}

/// Compare two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
