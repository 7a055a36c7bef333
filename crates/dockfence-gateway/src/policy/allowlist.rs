//! Allowlist compilation and matching utilities.
//!
//! Image entries are `repo` (any tag of that repository) or `repo:tag`
//! (exact). Capability entries are compared case-insensitively with an
//! optional `CAP_` prefix.

use std::collections::BTreeSet;

use dockfence_core::error::{FenceError, Result};

/// Compiled allowlist rule for images.
#[derive(Debug, Clone)]
pub struct ImageRule {
    pub repository: String,
    pub tag: Option<String>, // None => any tag
}

/// Split `registry:5000/team/app:1.2` into (`registry:5000/team/app`, Some(`1.2`)).
/// The tag separator is the last `:` after the last `/`.
pub fn split_image_reference(image: &str) -> (&str, Option<&str>) {
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let at = name_start + i;
            (&image[..at], Some(&image[at + 1..]))
        }
        None => (image, None),
    }
}

pub fn compile_image_rules(raw: &[String]) -> Result<Vec<ImageRule>> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let s = s.trim();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(FenceError::Config(format!("invalid allowed_images entry: {s:?}")));
        }
        let (repo, tag) = split_image_reference(s);
        if repo.is_empty() || tag == Some("") {
            return Err(FenceError::Config(format!("invalid allowed_images entry: {s:?}")));
        }
        out.push(ImageRule {
            repository: repo.to_string(),
            tag: tag.map(str::to_string),
        });
    }
    Ok(out)
}

/// An empty rule set admits every image.
pub fn is_image_allowed(rules: &[ImageRule], image: &str) -> bool {
    if rules.is_empty() {
        return true;
    }
    let (repo, tag) = split_image_reference(image);
    rules.iter().any(|r| {
        if r.repository != repo { return false; }
        match &r.tag {
            None => true,
            Some(t) => tag == Some(t.as_str()),
        }
    })
}

/// `cap_net_admin` / `CAP_NET_ADMIN` / `net_admin` -> `NET_ADMIN`.
pub fn normalize_capability(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    match upper.strip_prefix("CAP_") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

pub fn compile_capabilities(raw: &[String]) -> Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for s in raw {
        let cap = normalize_capability(s);
        if cap.is_empty() || !cap.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FenceError::Config(format!("invalid allowed_capabilities entry: {s:?}")));
        }
        out.insert(cap);
    }
    Ok(out)
}

pub fn is_capability_allowed(allowed: &BTreeSet<String>, cap: &str) -> bool {
    allowed.contains(&normalize_capability(cap))
}
