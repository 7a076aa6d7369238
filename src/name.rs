//! Name sanitization and fresh-name allocation.
//!
//! Grounded on `libs/uniquify`: a small set-of-reserved-names helper that
//! hands out a unique name based on a preferred base, suffixing `_N` on
//! collision. `hwir` uses the same scheme for anonymous instance names
//! (design doc §4.F, `instantiate`) and the VHDL back-end uses [`sanitize`]
//! to make identifiers legal.

use std::collections::HashSet;

use arcstr::ArcStr;

/// Replace characters that are not legal in VHDL/DOT identifiers with `_`.
///
/// Per data-model §3: "The emitter sanitizes names by replacing `:`, `-`,
/// `"` with `_`."
pub fn sanitize(name: &str) -> ArcStr {
    if name.contains([':', '-', '"']) {
        ArcStr::from(
            name.chars()
                .map(|c| if matches!(c, ':' | '-' | '"') { '_' } else { c })
                .collect::<String>(),
        )
    } else {
        ArcStr::from(name)
    }
}

/// A set of names already in use within some scope (a graph, a pool).
///
/// Used to allocate a fresh, unique name for an unnamed instance by
/// suffixing `_inst{N}` on collision, per design doc §4.F step 2.
#[derive(Debug, Clone, Default)]
pub struct NameSet {
    used: HashSet<ArcStr>,
}

impl NameSet {
    /// Creates an empty name set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` is already reserved.
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Reserves `name` outright. Returns `false` if it was already in use.
    pub fn reserve(&mut self, name: impl Into<ArcStr>) -> bool {
        self.used.insert(name.into())
    }

    /// Removes a previously reserved name, allowing it to be reused.
    pub fn release(&mut self, name: &str) {
        self.used.remove(name);
    }

    /// Allocates and reserves a name based on `base`, suffixing `_N` for the
    /// smallest `N >= 1` that is not already in use if `base` collides.
    pub fn alloc_suffixed(&mut self, base: &str, suffix: &str) -> ArcStr {
        if self.used.insert(ArcStr::from(base)) {
            return ArcStr::from(base);
        }
        let mut n = 1u64;
        loop {
            let candidate = arcstr::format!("{base}{suffix}{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_chars() {
        assert_eq!(sanitize("a:b-c\"d").as_str(), "a_b_c_d");
        assert_eq!(sanitize("plain").as_str(), "plain");
    }

    #[test]
    fn alloc_suffixed_avoids_collisions() {
        let mut names = NameSet::new();
        assert_eq!(names.alloc_suffixed("child", "_inst").as_str(), "child");
        assert_eq!(
            names.alloc_suffixed("child", "_inst").as_str(),
            "child_inst1"
        );
        assert_eq!(
            names.alloc_suffixed("child", "_inst").as_str(),
            "child_inst2"
        );
    }
}
