//! Dotted `MAJOR.MINOR.PATCH` version parsing and comparison.
//!
//! Grounded on `examples/original_source/src/plume/utils.h`'s `LibVersion`:
//! missing or empty input parses as `0.0.0`, comparison is lexicographic
//! per integer component.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl LibVersion {
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::default();
        }
        let mut parts = s.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Self { major, minor, patch }
    }

    fn as_int(&self) -> u64 {
        10_000 * self.major as u64 + 100 * self.minor as u64 + self.patch as u64
    }
}

impl Default for LibVersion {
    fn default() -> Self {
        Self { major: 0, minor: 0, patch: 0 }
    }
}

impl fmt::Display for LibVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl PartialOrd for LibVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LibVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_int().cmp(&other.as_int())
    }
}
