//! Resource naming for addresses.
//!
//! Addresses may contain characters that are not allowed in resource names.
//! Sanitized names carry a short digest of the original address whenever
//! sanitizing changed it, so two distinct addresses never map to the same
//! resource.

use sha2::{Digest, Sha256};

/// Maximum length of the sanitized part of a name.
pub const MAX_NAME_LENGTH: usize = 60;

/// Number of digest characters appended to altered names.
const DIGEST_LENGTH: usize = 8;

/// Converts an arbitrary address into a valid resource name component.
///
/// The name is lowercased, characters outside `[a-z0-9.-]` become `-`,
/// leading and trailing punctuation is dropped and the result is truncated
/// to [`MAX_NAME_LENGTH`]. If any of this altered the input, a digest
/// suffix is appended.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let lowered: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let truncated: String = lowered
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .chars()
        .take(MAX_NAME_LENGTH)
        .collect();
    let mut clean = truncated
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string();

    if clean != name {
        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        if !clean.is_empty() {
            clean.push('-');
        }
        clean.extend(digest.chars().take(DIGEST_LENGTH));
    }

    clean
}

/// Returns the resource name for an address within an address space.
#[must_use]
pub fn address_resource_name(address_space: &str, address: &str) -> String {
    format!("{address_space}.{}", sanitize_name(address))
}

/// Prefixes `name` with `namespace` when one is configured.
#[must_use]
pub fn namespaced_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name_unchanged() {
        assert_eq!(sanitize_name("queue-1.orders"), "queue-1.orders");
    }

    #[test]
    fn test_altered_name_gets_digest() {
        let name = sanitize_name("Orders/EU");
        assert!(name.starts_with("orders-eu-"));
        assert_eq!(name.len(), "orders-eu-".len() + DIGEST_LENGTH);
    }

    #[test]
    fn test_distinct_addresses_do_not_collide() {
        assert_ne!(sanitize_name("a/b"), sanitize_name("a_b"));
        assert_ne!(sanitize_name("A"), sanitize_name("a"));
    }

    #[test]
    fn test_only_invalid_characters() {
        let name = sanitize_name("///");
        assert_eq!(name.len(), DIGEST_LENGTH);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_long_names_are_truncated() {
        let long = "x".repeat(100);
        let name = sanitize_name(&long);
        assert!(name.len() <= MAX_NAME_LENGTH + 1 + DIGEST_LENGTH);
        assert!(name.starts_with(&"x".repeat(MAX_NAME_LENGTH)));
    }

    #[test]
    fn test_address_resource_name() {
        assert_eq!(address_resource_name("myspace", "q1"), "myspace.q1");
    }

    #[test]
    fn test_namespaced_name() {
        assert_eq!(namespaced_name(Some("tenant"), "myspace.q1"), "tenant.myspace.q1");
        assert_eq!(namespaced_name(Some(""), "myspace.q1"), "myspace.q1");
        assert_eq!(namespaced_name(None, "myspace.q1"), "myspace.q1");
    }
}
