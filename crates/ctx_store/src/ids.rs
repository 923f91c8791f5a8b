//! Context id validation and slug generation.

use crate::error::{Result, StoreError};

/// Maximum length of a context id.
pub const MAX_ID_LEN: usize = 64;

/// Directory name of the archive area; never usable as a context id.
pub const RESERVED_ID: &str = "archive";

/// Validates a caller-supplied context id.
///
/// Anything that could escape the storage root is rejected outright.
/// Cosmetic problems (case, stray punctuation, length) are repaired.
///
/// # Errors
///
/// `PathTraversal` for separators, `..` or NUL; `InvalidContextId` when
/// nothing usable remains after sanitizing, or for the reserved id.
pub fn validate_context_id(raw: &str) -> Result<String> {
    if raw.contains("..") || raw.contains('/') || raw.contains('\\') || raw.contains('\0') {
        return Err(StoreError::PathTraversal(raw.to_string()));
    }

    let mut id = String::with_capacity(raw.len());
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            id.push(ch);
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }

    let id = trim_to_alphanumeric(&id, MAX_ID_LEN);
    if id.is_empty() || id == RESERVED_ID {
        return Err(StoreError::InvalidContextId(raw.to_string()));
    }
    Ok(id)
}

/// Whether `id` is already in canonical form.
pub fn is_valid_context_id(id: &str) -> bool {
    matches!(validate_context_id(id), Ok(ref clean) if clean == id)
}

/// Builds a slug from a free-form summary.
///
/// Lowercases, turns whitespace into hyphens and drops everything else
/// that is not `[a-z0-9_-]`.
pub fn slugify(summary: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(summary.len());
    for ch in summary.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            slug.push(ch);
        } else if (ch.is_whitespace() || ch == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = trim_to_alphanumeric(&slug, max_len.clamp(1, MAX_ID_LEN));
    if slug.is_empty() {
        "context".to_string()
    } else if slug == RESERVED_ID {
        format!("{RESERVED_ID}-context")
    } else {
        slug
    }
}

/// Appends `-2`, `-3`, ... to `base` until `taken` reports a free id.
///
/// The suffixed id is kept within [`MAX_ID_LEN`].
pub fn dedupe(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let suffix = format!("-{n}");
        let stem = trim_to_alphanumeric(base, MAX_ID_LEN - suffix.len());
        let candidate = format!("{stem}{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn trim_to_alphanumeric(s: &str, max_len: usize) -> String {
    // ASCII only at this point, so byte slicing is safe
    let truncated = if s.len() > max_len { &s[..max_len] } else { s };
    truncated
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}
