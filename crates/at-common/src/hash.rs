//! Info-hash helpers
//!
//! Every media row is keyed by the torrent's 40-character SHA-1 info-hash,
//! always stored lowercased.

use crate::error::{AtError, Result};

/// Length of a hex-encoded SHA-1 info-hash
pub const INFO_HASH_LEN: usize = 40;

/// Normalize an info-hash to the canonical lowercase form.
///
/// Surrounding whitespace is ignored. Anything other than 40 hex digits
/// (including base32 magnet hashes) is rejected.
pub fn normalize_hash(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.len() != INFO_HASH_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AtError::InvalidHash(raw.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// True when the value is already a canonical info-hash
pub fn is_canonical_hash(value: &str) -> bool {
    value.len() == INFO_HASH_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Extract the info-hash from a magnet URI's `xt=urn:btih:` component
pub fn hash_from_magnet(magnet: &str) -> Result<String> {
    let lower = magnet.to_ascii_lowercase();
    let start = lower
        .find("urn:btih:")
        .ok_or_else(|| AtError::InvalidHash(magnet.to_string()))?
        + "urn:btih:".len();
    let rest = &magnet[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    normalize_hash(&rest[..end])
}

/// Extract the info-hash from the last path segment of a URL
///
/// e.g. `https://yts.mx/torrent/download/<HASH>`
pub fn hash_from_url_path(url: &str) -> Result<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    normalize_hash(segment)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HASH: &str = "08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4";

    #[test]
    fn test_normalize_lowercases() {
        let upper = HASH.to_ascii_uppercase();
        assert_eq!(normalize_hash(&upper).unwrap(), HASH);
        assert!(is_canonical_hash(HASH));
        assert!(!is_canonical_hash(&upper));
    }

    #[test]
    fn test_normalize_rejects_bad_length() {
        assert!(normalize_hash("abc").is_err());
        assert!(normalize_hash(&format!("{}0", HASH)).is_err());
        assert!(normalize_hash("zz105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4").is_err());
    }

    #[test]
    fn test_hash_from_magnet() {
        let magnet = format!(
            "magnet:?xt=urn:btih:{}&dn=Show.S01E01&tr=udp://tracker",
            HASH.to_ascii_uppercase()
        );
        assert_eq!(hash_from_magnet(&magnet).unwrap(), HASH);
        assert!(hash_from_magnet("magnet:?dn=nothing").is_err());
    }

    #[test]
    fn test_hash_from_url_path() {
        let url = format!("https://yts.mx/torrent/download/{}", HASH.to_ascii_uppercase());
        assert_eq!(hash_from_url_path(&url).unwrap(), HASH);
        assert_eq!(hash_from_url_path(&format!("{}/", url)).unwrap(), HASH);
        assert!(hash_from_url_path("https://yts.mx/movies/paranormal-activity-2").is_err());
    }
}
