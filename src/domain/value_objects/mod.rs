//! Value Objects for catalog import

use serde::{Deserialize, Serialize};
use std::fmt;

/// URL-safe product slug: lowercase ASCII alphanumerics separated by single hyphens.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    /// Slugifies `value`. Returns `None` when nothing URL-safe is left.
    pub fn new(value: &str) -> Option<Self> {
        let slug = slugify(value);
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }

    /// Slug derived from a product name, falling back to a hashed slug for names
    /// with no ASCII alphanumerics.
    pub fn from_name(name: &str) -> Self {
        Self::new(name).unwrap_or_else(|| {
            Self(format!("product-{:016x}", fnv1a(name.as_bytes())))
        })
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Lowercases and collapses every run of non-alphanumeric characters into one hyphen.
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() { out.push('-'); }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// 64-bit FNV-1a. Stored slugs depend on it, so the output must never change.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Result of a field coercion. `used_default` is set when the input was present
/// but unusable and a fallback was substituted.
#[derive(Clone, Debug, PartialEq)]
pub struct Coerced<T> {
    pub value: T,
    pub used_default: bool,
}

impl<T> Coerced<T> {
    pub fn clean(value: T) -> Self { Self { value, used_default: false } }
    pub fn defaulted(value: T) -> Self { Self { value, used_default: true } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Whey Protein"), "whey-protein");
        assert_eq!(slugify("  ON (Optimum Nutrition) -- Gold Standard! "), "on-optimum-nutrition-gold-standard");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_slug_idempotent() {
        for name in ["Whey Protein 2kg", "Mass-Gainer XXL!!", "ÉLITE whey", "100% Creatine"] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
            assert!(!once.starts_with('-') && !once.ends_with('-'));
        }
    }

    #[test]
    fn test_slug_from_unsafe_name() {
        let a = Slug::from_name("!!!");
        assert_eq!(a.as_str(), "product-bbe43c17ca866be2");
        assert_eq!(a, Slug::from_name("!!!"));
        assert_eq!(slugify(a.as_str()), a.as_str());
        assert_ne!(Slug::from_name("???"), a);
    }
}
