//! Preview cache keys

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Opaque, cheap-to-clone identifier for previewed content.
///
/// Keys compare by exact string equality. Two distinct contents must never
/// share a key; use [`CacheKey::for_content`] when there is no stable path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Content-addressed key: SHA-256 of the payload, hex encoded
    pub fn for_content(content: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(content.as_ref());
        Self(Arc::from(format!("sha256:{:x}", digest)))
    }

    /// Key for an artifact of this content laid out at `width`.
    /// Equal widths (bit for bit) give equal keys.
    pub fn at_width(&self, width: f64) -> Self {
        Self(Arc::from(format!("{}@w{:x}", self.0, width.to_bits())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&Path> for CacheKey {
    fn from(value: &Path) -> Self {
        Self::new(value.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_is_stable() {
        assert_eq!(CacheKey::for_content("hello"), CacheKey::for_content("hello"));
        assert_ne!(CacheKey::for_content("hello"), CacheKey::for_content("hello!"));
        assert!(CacheKey::for_content("").as_str().starts_with("sha256:"));
    }

    #[test]
    fn test_path_key_matches_string_key() {
        let path = Path::new("/tmp/shot.png");
        assert_eq!(CacheKey::from(path), CacheKey::from("/tmp/shot.png"));
    }

    #[test]
    fn test_width_qualified_keys() {
        let key = CacheKey::for_content("# doc");
        assert_eq!(key.at_width(320.0), key.at_width(320.0));
        assert_ne!(key.at_width(320.0), key.at_width(320.5));
        assert_ne!(key.at_width(320.0), key);
    }

    #[test]
    fn test_empty_key() {
        assert!(CacheKey::from("").is_empty());
        assert!(!CacheKey::from("a").is_empty());
    }
}
