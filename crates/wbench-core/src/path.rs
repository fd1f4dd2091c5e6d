//! Path-prefix access control over an agent's `allowedPaths` (spec §4.6, §9).
//!
//! Grounded in `astrid-workspace::boundaries::WorkspaceBoundary`, but
//! simplified: no glob matching, no auto-allow pattern list, no escape-policy
//! modes. Just prefix containment over a normalized `scheme + authority +
//! path` string, with `/` as a first-class wildcard entry rather than a
//! special-cased path.

/// A compiled access-control list, built once from an agent's
/// `allowedPaths` and reused for every tool-call check.
#[derive(Debug, Clone)]
pub struct AllowedPaths {
    /// `true` if any of the raw entries was the wildcard `/`.
    allow_all: bool,
    /// Normalized, trailing-separator-terminated prefixes.
    prefixes: Vec<String>,
}

/// Lowercase the scheme and authority, leave the path segment's case
/// untouched (most filesystems are case-sensitive; schemes/hosts are not),
/// and ensure the result ends in `/` so that `/foo` does not also match
/// `/foobar`.
fn normalize(raw: &str) -> String {
    let (head, rest) = match raw.find("://") {
        Some(idx) => (&raw[..idx + 3], &raw[idx + 3..]),
        None => ("", raw),
    };
    let mut normalized = format!("{}{}", head.to_ascii_lowercase(), rest);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

impl AllowedPaths {
    /// Compile a raw `allowedPaths` list (spec §3 `AgentRecord.allowedPaths`).
    #[must_use]
    pub fn compile(raw: &[String]) -> Self {
        let allow_all = raw.iter().any(|entry| entry.trim() == "/");
        let prefixes = raw
            .iter()
            .filter(|entry| entry.trim() != "/")
            .map(|entry| normalize(entry))
            .collect();
        Self { allow_all, prefixes }
    }

    /// `true` if `target` falls under any allowed prefix (or `/` is present).
    #[must_use]
    pub fn allows(&self, target: &str) -> bool {
        if self.allow_all {
            return true;
        }
        let candidate = normalize(target);
        self.prefixes.iter().any(|prefix| candidate.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_everything() {
        let allowed = AllowedPaths::compile(&["/".to_string()]);
        assert!(allowed.allows("/etc/passwd"));
        assert!(allowed.allows("file:///home/user/notes.md"));
    }

    #[test]
    fn prefix_match_requires_a_separator_boundary() {
        let allowed = AllowedPaths::compile(&["/workspace/project".to_string()]);
        assert!(allowed.allows("/workspace/project/src/main.rs"));
        assert!(!allowed.allows("/workspace/project2/src/main.rs"));
    }

    #[test]
    fn scheme_and_authority_are_case_insensitive() {
        let allowed = AllowedPaths::compile(&["FILE:///Workspace/".to_string()]);
        assert!(allowed.allows("file:///Workspace/notes.md"));
    }

    #[test]
    fn unrelated_path_is_denied() {
        let allowed = AllowedPaths::compile(&["/workspace".to_string()]);
        assert!(!allowed.allows("/etc/passwd"));
    }

    #[test]
    fn empty_list_denies_everything() {
        let allowed = AllowedPaths::compile(&[]);
        assert!(!allowed.allows("/anything"));
    }
}
