//! Field identifiers and the scope grammar.
//!
//! A field identifier is `category.name`, split on the first `.` only, with
//! both parts non-empty and drawn from `[A-Za-z0-9_-]`. Identifiers are
//! validated before they reach the store or the filesystem.
//!
//! A scope is a comma-separated list of patterns: `*` matches everything,
//! `category.*` matches a whole category, and `category.name` matches one
//! field. Patterns combine by union; the empty scope matches nothing.

use crate::error::VaultError;

fn valid_id_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validate a field identifier's syntax.
///
/// # Errors
///
/// Returns [`VaultError::InvalidFieldId`] describing the failing part.
pub fn validate_field_id(id: &str) -> Result<(), VaultError> {
    let Some((category, name)) = id.split_once('.') else {
        return Err(VaultError::InvalidFieldId {
            reason: format!("field id must be category.field_name, got {id:?}"),
        });
    };
    if category.is_empty() || name.is_empty() {
        return Err(VaultError::InvalidFieldId {
            reason: format!("field id must be category.field_name, got {id:?}"),
        });
    }
    if !valid_id_part(category) {
        return Err(VaultError::InvalidFieldId {
            reason: format!("invalid category {category:?}: only alphanumeric, underscore, hyphen allowed"),
        });
    }
    if !valid_id_part(name) {
        return Err(VaultError::InvalidFieldId {
            reason: format!("invalid field name {name:?}: only alphanumeric, underscore, hyphen allowed"),
        });
    }
    Ok(())
}

/// Whether a category name contains only safe characters.
#[must_use]
pub fn valid_category_name(name: &str) -> bool {
    valid_id_part(name)
}

/// Whether a scope allows access to a specific field identifier.
///
/// Any matching pattern wins.
#[must_use]
pub fn allows(scope: &str, field_id: &str) -> bool {
    for pattern in scope.split(',') {
        let pattern = pattern.trim();
        if pattern == "*" {
            return true;
        }
        if let Some(category) = pattern.strip_suffix(".*") {
            if field_id
                .strip_prefix(category)
                .is_some_and(|rest| rest.starts_with('.'))
            {
                return true;
            }
            continue;
        }
        if pattern == field_id {
            return true;
        }
    }
    false
}

/// Whether a scope allows listing a category.
///
/// True for `*`, for `category.*` on that category, and for any exact field
/// pattern inside the category — if at least one field could be named
/// individually, the listing is permitted (and then filtered per field).
#[must_use]
pub fn allows_category(scope: &str, category: &str) -> bool {
    for pattern in scope.split(',') {
        let pattern = pattern.trim();
        if pattern == "*" {
            return true;
        }
        if let Some(cat) = pattern.strip_suffix(".*") {
            if cat == category {
                return true;
            }
            continue;
        }
        if pattern
            .strip_prefix(category)
            .is_some_and(|rest| rest.starts_with('.'))
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── validate_field_id ────────────────────────────────────────────

    #[test]
    fn valid_ids_pass() {
        for id in [
            "identity.full_name",
            "a.b",
            "my_category.field-name",
            "c0.n0",
        ] {
            assert!(validate_field_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn invalid_ids_fail() {
        for id in [
            "",
            "identity",
            ".name",
            "identity.",
            "identity.full name",
            "identity.name/evil",
            "identity.name\0evil",
            "evil$cat.name",
        ] {
            assert!(validate_field_id(id).is_err(), "{id:?} should be invalid");
        }
    }

    #[test]
    fn id_splits_on_first_dot_only() {
        // "a.b.c" splits as category "a", name "b.c" — and "b.c" contains a
        // dot, which is not a valid name character.
        assert!(validate_field_id("a.b.c").is_err());
    }

    #[test]
    fn category_name_validation() {
        assert!(valid_category_name("identity"));
        assert!(valid_category_name("my-cat_2"));
        assert!(!valid_category_name(""));
        assert!(!valid_category_name("evil$cat"));
    }

    // ── allows ───────────────────────────────────────────────────────

    #[test]
    fn wildcard_allows_everything() {
        assert!(allows("*", "identity.full_name"));
        assert!(allows("*", "financial.income"));
    }

    #[test]
    fn category_pattern_allows_category_fields_only() {
        assert!(allows("identity.*", "identity.full_name"));
        assert!(allows("identity.*", "identity.email"));
        assert!(!allows("identity.*", "financial.income"));
    }

    #[test]
    fn category_pattern_requires_exact_category() {
        // "identity.*" must not match a category that merely shares a prefix.
        assert!(!allows("identity.*", "identity2.full_name"));
    }

    #[test]
    fn exact_pattern_allows_single_field() {
        assert!(allows("identity.full_name", "identity.full_name"));
        assert!(!allows("identity.full_name", "identity.email"));
    }

    #[test]
    fn patterns_union() {
        let scope = "identity.*, financial.income";
        assert!(allows(scope, "identity.email"));
        assert!(allows(scope, "financial.income"));
        assert!(!allows(scope, "financial.ssn"));
    }

    #[test]
    fn whitespace_around_commas_ignored() {
        assert!(allows(" identity.* , financial.* ", "financial.income"));
    }

    #[test]
    fn empty_scope_matches_nothing() {
        assert!(!allows("", "identity.full_name"));
        assert!(!allows_category("", "identity"));
    }

    // ── allows_category ──────────────────────────────────────────────

    #[test]
    fn category_listing_rules() {
        assert!(allows_category("*", "identity"));
        assert!(allows_category("identity.*", "identity"));
        assert!(!allows_category("identity.*", "financial"));
        // An exact field pattern permits listing its category.
        assert!(allows_category("identity.full_name", "identity"));
        assert!(!allows_category("identity.full_name", "financial"));
        // Prefix-similar categories do not leak into each other.
        assert!(!allows_category("identity.*", "identity2"));
        assert!(!allows_category("identity2.full_name", "identity"));
    }
}
