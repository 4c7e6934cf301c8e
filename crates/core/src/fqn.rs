//! Helpers for `::`-delimited fully-qualified asset names.
//!
//! An fqn encodes the asset's place in the hierarchy: the parent's fqn, the
//! separator, then the asset's own key. Top-level assets have no separator.

use crate::error::CoreError;

pub const SEPARATOR: &str = "::";

pub fn join(parent: Option<&str>, key: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}{SEPARATOR}{key}"),
        _ => key.to_string(),
    }
}

/// The parent fqn, or `None` for a top-level asset.
pub fn parent(fqn: &str) -> Option<&str> {
    fqn.rfind(SEPARATOR).map(|idx| &fqn[..idx])
}

/// The final segment of the fqn.
pub fn key(fqn: &str) -> &str {
    match fqn.rfind(SEPARATOR) {
        Some(idx) => &fqn[idx + SEPARATOR.len()..],
        None => fqn,
    }
}

/// The first segment of the fqn, used to group assets for presentation.
pub fn namespace(fqn: &str) -> &str {
    match fqn.find(SEPARATOR) {
        Some(idx) => &fqn[..idx],
        None => fqn,
    }
}

/// True when `fqn` lies strictly below `ancestor`.
pub fn is_descendant_of(fqn: &str, ancestor: &str) -> bool {
    fqn.len() > ancestor.len() + SEPARATOR.len()
        && fqn.starts_with(ancestor)
        && fqn[ancestor.len()..].starts_with(SEPARATOR)
}

/// True when `fqn` sits exactly one level below `parent_fqn`.
pub fn is_child_of(fqn: &str, parent_fqn: &str) -> bool {
    parent(fqn) == Some(parent_fqn)
}

/// Swap the `old_prefix` of `fqn` for `new_prefix`. Only an exact prefix on a
/// segment boundary is replaced; anything else yields `None`.
pub fn rebase(fqn: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if fqn == old_prefix {
        return Some(new_prefix.to_string());
    }
    if is_descendant_of(fqn, old_prefix) {
        return Some(format!("{new_prefix}{}", &fqn[old_prefix.len()..]));
    }
    None
}

pub fn validate_key(key: &str) -> Result<(), CoreError> {
    if key.is_empty() {
        return Err(CoreError::InvalidKey("empty key".into()));
    }
    if key.contains(SEPARATOR) {
        return Err(CoreError::InvalidKey(format!("{key:?} contains {SEPARATOR:?}")));
    }
    if key.trim() != key {
        return Err(CoreError::InvalidKey(format!("{key:?} has surrounding whitespace")));
    }
    Ok(())
}

pub fn validate(fqn: &str) -> Result<(), CoreError> {
    if fqn.is_empty() {
        return Err(CoreError::InvalidFqn("empty fqn".into()));
    }
    for segment in fqn.split(SEPARATOR) {
        validate_key(segment).map_err(|_| CoreError::InvalidFqn(fqn.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_key_namespace() {
        assert_eq!(parent("a::b::c"), Some("a::b"));
        assert_eq!(parent("a"), None);
        assert_eq!(key("a::b::c"), "c");
        assert_eq!(key("a"), "a");
        assert_eq!(namespace("a::b::c"), "a");
        assert_eq!(namespace("solo"), "solo");
    }

    #[test]
    fn join_handles_top_level() {
        assert_eq!(join(None, "x"), "x");
        assert_eq!(join(Some(""), "x"), "x");
        assert_eq!(join(Some("a::b"), "x"), "a::b::x");
    }

    #[test]
    fn descendant_requires_segment_boundary() {
        assert!(is_descendant_of("Env::Node", "Env"));
        assert!(is_descendant_of("Env::Node::Pkg", "Env"));
        assert!(!is_descendant_of("Env", "Env"));
        assert!(!is_descendant_of("Envoy::Node", "Env"));
        assert!(is_child_of("Env::Node", "Env"));
        assert!(!is_child_of("Env::Node::Pkg", "Env"));
    }

    #[test]
    fn rebase_exact_prefix_only() {
        assert_eq!(rebase("A::B", "A", "Z").as_deref(), Some("Z::B"));
        assert_eq!(rebase("A", "A", "Z").as_deref(), Some("Z"));
        assert_eq!(rebase("AB::C", "A", "Z"), None);
        assert_eq!(rebase("X::A::B", "A", "Z"), None);
    }

    #[test]
    fn validation() {
        assert!(validate("a::b").is_ok());
        assert!(validate("").is_err());
        assert!(validate("a::::b").is_err());
        assert!(validate_key("a::b").is_err());
        assert!(validate_key(" a").is_err());
    }
}
