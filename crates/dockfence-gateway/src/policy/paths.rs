//! Host path normalization and the sensitive-path denylist.
//!
//! Normalization is purely lexical: `.` is dropped, `..` pops a component and
//! clamps at `/`, repeated and trailing slashes collapse, and relative paths
//! are rooted at `/`. Symlinks are never resolved (no filesystem access), so
//! the comparison errs toward rejecting.

/// Built-in denylist. Configured extras are appended; these can't be removed.
pub const DEFAULT_BLOCKED_PATHS: &[&str] = &[
    "/",
    "/etc",
    "/var/run",
    "/var/run/docker.sock",
    "/run",
    "/run/docker.sock",
    "/run/containerd",
    "/var/lib/docker",
    "/var/lib/containerd",
    "/proc",
    "/sys",
    "/dev",
    "/boot",
    "/root",
    "/home",
];

pub fn normalize_host_path(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in raw.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }
    format!("/{}", parts.join("/"))
}

/// `ancestor` is a strict, component-wise ancestor of `path` (both normalized).
fn is_strict_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes().get(ancestor.len()) == Some(&b'/')
}

#[derive(Debug, Clone)]
pub struct PathDenylist {
    entries: Vec<String>,
}

impl PathDenylist {
    pub fn new(extra: &[String]) -> Self {
        let mut entries: Vec<String> = DEFAULT_BLOCKED_PATHS
            .iter()
            .map(|p| normalize_host_path(p))
            .chain(extra.iter().map(|p| normalize_host_path(p)))
            .collect();
        entries.sort();
        entries.dedup();
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// First denylisted entry the host path collides with, if any.
    ///
    /// A mount collides when it equals an entry, is an ancestor of one
    /// (mounting it exposes the entry), or lives underneath one. `/` only
    /// collides by equality in the last direction, otherwise every mount
    /// would be refused.
    pub fn collision(&self, host_path: &str) -> Option<&str> {
        let p = normalize_host_path(host_path);
        self.entries
            .iter()
            .find(|e| {
                p == **e
                    || is_strict_ancestor(&p, e)
                    || (e.as_str() != "/" && is_strict_ancestor(e, &p))
            })
            .map(String::as_str)
    }

    pub fn is_blocked(&self, host_path: &str) -> bool {
        self.collision(host_path).is_some()
    }
}
