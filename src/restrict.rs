use std::fmt;

use regex::RegexSet;


/// A compiled list of patterns hiding files or forbidding commands.
///
/// Patterns are unanchored regular expressions; a name is restricted if any
/// of them matches. An empty list never matches.
#[derive(Clone)]
pub struct Restrictions {
    set: RegexSet,
}

impl Restrictions {
    /// Compiles a newline-separated list of patterns. Blank lines are
    /// ignored.
    ///
    /// Returns `Ok(None)` if the list contains no patterns, so callers can
    /// skip matching entirely.
    ///
    /// # Errors
    /// Returns an error if any pattern fails to compile.
    pub fn parse(patterns: &str) -> Result<Option<Self>, regex::Error> {
        let lines: Vec<_> = patterns.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Ok(None);
        }
        RegexSet::new(lines).map(|set| Some(Self { set }))
    }

    /// Tests whether any pattern matches `name`.
    #[inline]
    #[must_use]
    pub fn is_restricted(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// Returns the number of compiled patterns.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl fmt::Debug for Restrictions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.set.patterns()).finish()
    }
}


/// Tests `name` against an optional pattern list.
#[inline]
#[must_use]
pub fn is_restricted(restrictions: Option<&Restrictions>, name: &str) -> bool {
    restrictions.is_some_and(|r| r.is_restricted(name))
}
