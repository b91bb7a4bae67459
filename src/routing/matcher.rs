//! Path matching logic.
//!
//! # Design Decisions
//! - Prefixes only match on segment boundaries: `/upstream` matches
//!   `/upstream` and `/upstream/x`, never `/upstream2`
//! - Longest prefix wins; prefixes are unique so ties cannot occur
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use std::sync::Arc;

use crate::routing::table::RouteDescriptor;

/// Return the residual of `path` after a segment-aligned `prefix`.
///
/// An empty residual is normalized to `/`. A prefix of `/` matches every
/// absolute path and leaves it untouched.
pub fn residual<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix == "/" {
        return path.starts_with('/').then_some(path);
    }

    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Whether `path` has a `.` or `..` segment, literal or percent-encoded.
///
/// URL joining resolves such segments, which would let a suffix climb out
/// of its route's target path. A `\` also separates segments in http(s) URLs.
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// The selected route.
    pub route: Arc<RouteDescriptor>,
    /// Path forwarded to the upstream, always starting with `/`.
    pub suffix: String,
}

/// Longest-prefix matcher over a fixed set of routes.
#[derive(Debug, Default)]
pub struct PathMatcher {
    /// Sorted by descending prefix length.
    routes: Vec<Arc<RouteDescriptor>>,
}

impl PathMatcher {
    pub fn new(mut routes: Vec<Arc<RouteDescriptor>>) -> Self {
        routes.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });
        Self { routes }
    }

    /// Resolve `path` to the most specific route.
    pub fn resolve(&self, path: &str) -> Option<MatchResult> {
        self.routes.iter().find_map(|route| {
            residual(&route.prefix, path).map(|suffix| MatchResult {
                route: Arc::clone(route),
                suffix: suffix.to_string(),
            })
        })
    }

    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
