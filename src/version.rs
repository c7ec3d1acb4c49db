//! Permissive version-name parsing for versioned asset directories.
//!
//! Directory names like `v1`, `2.1`, `V3.0.2` or `1.0-beta` parse; names
//! like `latest` or `extra-notes` do not, and callers treat those as
//! always-current.

use std::cmp::Ordering;

/// A version parsed from a directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Text after `-` or `+`, if any. A version without one sorts higher.
    pub pre: Option<String>,
}

impl Ord for DirVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for DirVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse a directory name as a version, returning `None` for names that
/// are not version-like.
pub fn parse_dir_version(name: &str) -> Option<DirVersion> {
    let trimmed = name.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let (core, pre) = match trimmed.find(['-', '+']) {
        Some(idx) => {
            let suffix = &trimmed[idx + 1..];
            if suffix.is_empty() {
                return None;
            }
            (&trimmed[..idx], Some(suffix.to_string()))
        }
        None => (trimmed, None),
    };

    let mut numbers = [0u64; 3];
    let mut count = 0;
    for part in core.split('.') {
        if count == numbers.len() || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        numbers[count] = part.parse().ok()?;
        count += 1;
    }

    Some(DirVersion {
        major: numbers[0],
        minor: numbers[1],
        patch: numbers[2],
        pre,
    })
}
