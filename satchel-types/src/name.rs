//! Sibling-name arithmetic.
//!
//! Conflict resolution preserves divergent entries as new siblings, which
//! needs a deterministic way to pick a free name. A name is decomposed into
//! stem, numeric variant, and extension (`"draft-2.md"` → `"draft"`, `2`,
//! `"md"`), and the variant is incremented until the name is unused. The
//! whole thing is a pure function of (taken names, desired name) so it can
//! be tested in isolation.

use std::collections::HashSet;

/// Marker inserted into the stem of a document duplicated by a content
/// conflict, so the preserved copy references the original by name.
pub const CONFLICT_MARKER: &str = " (conflict)";

/// A file name decomposed into stem, numeric variant suffix, and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameComponents {
    pub stem: String,
    pub variant: Option<usize>,
    pub extension: Option<String>,
}

impl NameComponents {
    /// Parses a name. The variant is the trailing `-N` of the stem, if the
    /// `N` parses as a number; a trailing dot is not an extension separator.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let ext_at = name.rfind('.').filter(|&at| at != name.len() - 1);
        let stem_part = match ext_at {
            Some(at) => &name[..at],
            None => name,
        };

        let variant_at = stem_part.rfind('-');
        let variant = variant_at
            .map(|at| &stem_part[at + 1..])
            .and_then(|v| v.parse::<usize>().ok());
        let stem_end = match (variant, variant_at) {
            (Some(_), Some(at)) => at,
            _ => stem_part.len(),
        };

        Self {
            stem: stem_part[..stem_end].to_string(),
            variant,
            extension: ext_at.map(|at| name[at + 1..].to_string()),
        }
    }

    /// Returns a copy with the variant advanced by `n`.
    #[must_use]
    pub fn incremented(&self, n: usize) -> Self {
        Self { variant: Some(self.variant.unwrap_or(0) + n), ..self.clone() }
    }

    /// Reassembles the name.
    #[must_use]
    pub fn to_name(&self) -> String {
        match (&self.variant, &self.extension) {
            (Some(v), Some(ext)) => format!("{}-{}.{}", self.stem, v, ext),
            (Some(v), None) => format!("{}-{}", self.stem, v),
            (None, Some(ext)) => format!("{}.{}", self.stem, ext),
            (None, None) => self.stem.clone(),
        }
    }

    /// Inserts the conflict marker after the stem.
    #[must_use]
    pub fn with_conflict_marker(&self) -> Self {
        Self { stem: format!("{}{}", self.stem, CONFLICT_MARKER), ..self.clone() }
    }
}

/// Picks `desired` if free among `taken`, otherwise the first incremented
/// variant that is. Deterministic: the same inputs always produce the same
/// name.
#[must_use]
pub fn unique_sibling_name(desired: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(desired) {
        return desired.to_string();
    }
    let components = NameComponents::parse(desired);
    for n in 1.. {
        let candidate = components.incremented(n).to_name();
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("sibling set is finite")
}
