use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use compact_str::CompactString;


/// A sanitised request path: the server root, a clean root-relative path,
/// and their join.
///
/// The relative part uses `/` separators, is never absolute and never starts
/// with a `..` component, so `abs` always lies under `root`. The root itself
/// is represented by the relative path `.`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestPath {
    root: Arc<Path>,
    rel: CompactString,
    abs: PathBuf,
}

impl RequestPath {
    /// Sanitises a raw selector path against `root`.
    ///
    /// The selector is cleaned lexically first. If the cleaned path starts
    /// with the root's own components they are removed, so selectors spelling
    /// out the absolute path work too. Any attempt to climb above the root
    /// yields the root itself. Symlinks are not resolved here.
    #[must_use]
    pub fn resolve(root: &Arc<Path>, selector: &str) -> Self {
        let Some(mut parts) = components(selector) else {
            return Self::root_of(root);
        };
        let prefix: Components<'_> = root.to_str()
            .map(|r| r.split('/').filter(|c| !c.is_empty()).collect())
            .unwrap_or_default();
        if !prefix.is_empty() && parts.starts_with(&prefix) {
            parts.drain(..prefix.len());
        }
        Self::from_clean(root.clone(), join_components(&parts))
    }

    /// Returns the [`RequestPath`] of the server root.
    #[must_use]
    pub fn root_of(root: &Arc<Path>) -> Self {
        Self::from_clean(root.clone(), CompactString::const_new("."))
    }

    fn from_clean(root: Arc<Path>, rel: CompactString) -> Self {
        let abs = if rel == "." { root.to_path_buf() } else { root.join(rel.as_str()) };
        Self { root, rel, abs }
    }

    /// Returns the server root this path was resolved against.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Arc<Path> {
        &self.root
    }

    /// Returns the clean, root-relative path (`.` for the root).
    #[inline]
    #[must_use]
    pub fn rel(&self) -> &str {
        &self.rel
    }

    /// Returns the absolute filesystem path.
    #[inline]
    #[must_use]
    pub fn abs(&self) -> &Path {
        &self.abs
    }

    /// Tests whether this is the server root.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rel == "."
    }

    /// Returns the selector clients use to request this path.
    #[must_use]
    pub fn selector(&self) -> CompactString {
        if self.is_root() {
            return CompactString::const_new("/");
        }
        let mut sel = CompactString::with_capacity(self.rel.len() + 1);
        sel.push('/');
        sel.push_str(&self.rel);
        sel
    }

    /// Returns the last component, or [`None`] for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.rel.rsplit('/').next()
    }

    /// Returns the containing directory; the root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        let rel = match self.rel.rsplit_once('/') {
            Some((dir, _)) => dir.into(),
            None => CompactString::const_new("."),
        };
        Self::from_clean(self.root.clone(), rel)
    }

    /// Returns the path of the directory entry `name` below this path.
    ///
    /// `name` is expected to be a single component as produced by directory
    /// enumeration. Anything else is sanitised like a selector.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            let joined = format!("{}/{name}", self.rel);
            return Self::resolve(&self.root, &joined);
        }
        let rel = if self.is_root() {
            CompactString::from(name)
        } else {
            let mut rel = self.rel.clone();
            rel.push('/');
            rel.push_str(name);
            rel
        };
        Self::from_clean(self.root.clone(), rel)
    }

    /// Resolves `target` as written inside a file located at this path.
    ///
    /// Targets starting with `/` are relative to the root, others are
    /// relative to this path's directory.
    #[must_use]
    pub fn sibling(&self, target: &str) -> Self {
        if target.starts_with('/') {
            return Self::resolve(&self.root, target);
        }
        let dir = self.parent();
        Self::resolve(&self.root, &format!("{}/{target}", dir.rel))
    }

    /// Tests whether this path lies inside the root-level directory `dir`.
    #[must_use]
    pub fn is_within(&self, dir: &str) -> bool {
        self.rel.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Debug for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequestPath")
            .field("rel", &self.rel)
            .field("abs", &self.abs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.selector(), f)
    }
}


type Components<'a> = smallvec::SmallVec<[&'a str; 8]>;

/// Splits a `/`-separated path into clean components.
///
/// Empty and `.` components are dropped and `..` removes the preceding
/// component. Returns [`None`] if the path climbs above its starting point.
fn components(path: &str) -> Option<Components<'_>> {
    let mut parts = Components::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {},
            ".." => {
                parts.pop()?;
            },
            c => parts.push(c),
        }
    }
    Some(parts)
}

fn join_components(parts: &[&str]) -> CompactString {
    if parts.is_empty() {
        return CompactString::const_new(".");
    }
    let mut out = CompactString::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Arc<Path> {
        Arc::from(Path::new("/srv/gopher"))
    }

    #[test]
    fn plain() {
        let p = RequestPath::resolve(&root(), "/docs/a.txt");
        assert_eq!(p.rel(), "docs/a.txt");
        assert_eq!(p.abs(), Path::new("/srv/gopher/docs/a.txt"));
        assert_eq!(p.selector(), "/docs/a.txt");
        assert_eq!(p.file_name(), Some("a.txt"));
    }

    #[test]
    fn root_forms() {
        for sel in ["", "/", "//", ".", "/./", "/srv/gopher", "/srv/gopher/"] {
            let p = RequestPath::resolve(&root(), sel);
            assert!(p.is_root(), "{sel:?} resolved to {p:?}");
            assert_eq!(p.abs(), Path::new("/srv/gopher"));
            assert_eq!(p.selector(), "/");
            assert_eq!(p.file_name(), None);
        }
    }

    #[test]
    fn cleaning() {
        assert_eq!(RequestPath::resolve(&root(), "a//b/./c/../d").rel(), "a/b/d");
        assert_eq!(RequestPath::resolve(&root(), "/srv/gopher/x/y").rel(), "x/y");
        // Only whole root components count as the root prefix
        assert_eq!(RequestPath::resolve(&root(), "/srv/gopherhole").rel(), "srv/gopherhole");
        assert!(RequestPath::resolve(&root(), "/srv/gopher").is_root());
    }

    #[test]
    fn root_prefix_after_cleaning() {
        assert_eq!(RequestPath::resolve(&root(), "/srv/gopher/../gopher/a.txt").rel(), "a.txt");
        assert_eq!(RequestPath::resolve(&root(), "/srv//gopher/a.txt").rel(), "a.txt");
        assert_eq!(RequestPath::resolve(&root(), "/srv/./gopher/docs/").rel(), "docs");
        assert_eq!(RequestPath::resolve(&root(), "/srv/gopher/../../etc").rel(), "etc");
    }

    #[test]
    fn escapes_rewrite_to_root() {
        for sel in ["/../etc/passwd", "..", "../..", "a/../../b", "/a/b/../../../c", "../srv/gopher"] {
            let p = RequestPath::resolve(&root(), sel);
            assert!(p.is_root(), "{sel:?} resolved to {p:?}");
        }
    }

    #[test]
    fn containment_fuzz() {
        const PARTS: &[&str] = &["..", ".", "", "a", "b", "..x", "srv", "gopher", "/"];
        let root = root();
        for _ in 0..2000 {
            let sel: Vec<_> = std::iter::repeat_with(|| PARTS[fastrand::usize(..PARTS.len())])
                .take(fastrand::usize(..10)).collect();
            let sel = sel.join("/");
            let p = RequestPath::resolve(&root, &sel);
            assert!(p.abs().starts_with(&*root), "{sel:?} escaped to {p:?}");
            assert!(!p.rel().starts_with('/'));
            assert!(p.rel().split('/').all(|c| c != ".." && !c.is_empty()), "{sel:?} -> {p:?}");
        }
    }

    #[test]
    fn navigation() {
        let root = root();
        let p = RequestPath::resolve(&root, "/a/b/c");
        assert_eq!(p.parent().rel(), "a/b");
        assert_eq!(p.parent().parent().parent().rel(), ".");
        assert!(RequestPath::root_of(&root).parent().is_root());

        assert_eq!(RequestPath::root_of(&root).join("x").rel(), "x");
        assert_eq!(p.join("d").rel(), "a/b/c/d");
        assert!(RequestPath::root_of(&root).join("..").is_root());

        let map = RequestPath::resolve(&root, "/a/gophermap");
        assert_eq!(map.sibling("other/gophermap").rel(), "a/other/gophermap");
        assert_eq!(map.sibling("/top.txt").rel(), "top.txt");
        assert!(map.sibling("../../../etc/passwd").is_root());
    }

    #[test]
    fn within() {
        let root = root();
        assert!(RequestPath::resolve(&root, "/cgi-bin/hi").is_within("cgi-bin"));
        assert!(!RequestPath::resolve(&root, "/cgi-bin").is_within("cgi-bin"));
        assert!(!RequestPath::resolve(&root, "/cgi-binary/x").is_within("cgi-bin"));
        assert!(!RequestPath::resolve(&root, "/docs/cgi-bin/x").is_within("cgi-bin"));
    }
}
