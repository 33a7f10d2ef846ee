//! Namespace key mangling.
//!
//! A logical key `k` lives in the snapshot as `prefix + separator + k`.
//! Logical keys should not start with the separator; otherwise keys of a
//! prefix that itself ends in the separator can read back ambiguously.

/// Build the storage-level key for a logical key.
pub fn mangle(prefix: &str, separator: &str, key: &str) -> String {
    let mut mangled = String::with_capacity(prefix.len() + separator.len() + key.len());
    mangled.push_str(prefix);
    mangled.push_str(separator);
    mangled.push_str(key);
    mangled
}

/// Recover the logical key, or `None` if `mangled` is outside the namespace.
pub fn unmangle<'a>(prefix: &str, separator: &str, mangled: &'a str) -> Option<&'a str> {
    mangled.strip_prefix(prefix)?.strip_prefix(separator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle() {
        assert_eq!(mangle("app", ":", "user"), "app:user");
        assert_eq!(mangle("", "", "bare"), "bare");
    }

    #[test]
    fn test_unmangle_inverts_mangle() {
        let mangled = mangle("app", "::", "user:42");
        assert_eq!(unmangle("app", "::", &mangled), Some("user:42"));
    }

    #[test]
    fn test_unmangle_rejects_foreign_keys() {
        assert_eq!(unmangle("app", ":", "other:user"), None);
        assert_eq!(unmangle("app", ":", "appuser"), None);
        assert_eq!(unmangle("app", ":", "ap"), None);
    }

    #[test]
    fn test_prefix_that_extends_another_prefix_is_isolated() {
        // "app2:x" must not be visible to namespace "app".
        assert_eq!(unmangle("app", ":", "app2:x"), None);
    }

    #[test]
    fn test_empty_logical_key() {
        assert_eq!(unmangle("app", ":", "app:"), Some(""));
    }
}
