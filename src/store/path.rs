// Paths in the remote storage namespace.

use std::fmt;

/// Error for a path that cannot name a remote object or directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid remote path '{path}': {reason}")]
pub struct InvalidRemotePath {
    pub path: String,
    pub reason: &'static str,
}

/// An absolute, `/`-separated path in the remote namespace.
///
/// Always normalized: a single leading `/`, no empty, `.` or `..` segments,
/// no trailing `/` (except for the root itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    /// The namespace root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalize a path. Relative input is taken from the root.
    pub fn new(path: &str) -> Result<Self, InvalidRemotePath> {
        let invalid = |reason| InvalidRemotePath {
            path: path.to_string(),
            reason,
        };

        let mut normalized = String::with_capacity(path.len() + 1);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match segment {
                "." | ".." => return Err(invalid("relative segments are not allowed")),
                s if s.contains('\0') => return Err(invalid("NUL byte in segment")),
                s => {
                    normalized.push('/');
                    normalized.push_str(s);
                }
            }
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    /// Append a single name segment.
    pub fn join(&self, name: &str) -> Result<Self, InvalidRemotePath> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(InvalidRemotePath {
                path: format!("{}/{name}", self.0.trim_end_matches('/')),
                reason: "not a single path segment",
            });
        }
        Self::new(&format!("{}/{name}", self.0))
    }

    /// Append `suffix` to the final segment (`/a/b` + `.tmp` = `/a/b.tmp`).
    ///
    /// Returns `None` for the root, which has no final segment.
    pub fn with_suffix(&self, suffix: &str) -> Option<Self> {
        if self.is_root() || suffix.contains('/') {
            return None;
        }
        Some(Self(format!("{}{suffix}", self.0)))
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RemotePath {
    type Err = InvalidRemotePath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators() {
        assert_eq!(RemotePath::new("/out").unwrap().as_str(), "/out");
        assert_eq!(RemotePath::new("out//logs/").unwrap().as_str(), "/out/logs");
        assert_eq!(RemotePath::new("").unwrap(), RemotePath::root());
        assert_eq!(RemotePath::new("///").unwrap(), RemotePath::root());
    }

    #[test]
    fn rejects_relative_segments() {
        assert!(RemotePath::new("/out/../etc").is_err());
        assert!(RemotePath::new("./out").is_err());
    }

    #[test]
    fn join_and_suffix() {
        let dir = RemotePath::new("/out").unwrap();
        let target = dir.join("input.txt").unwrap();
        assert_eq!(target.as_str(), "/out/input.txt");
        assert_eq!(
            target.with_suffix(".tmp").unwrap().as_str(),
            "/out/input.txt.tmp"
        );
        assert_eq!(
            RemotePath::root().join("a").unwrap().as_str(),
            "/a"
        );
        assert!(RemotePath::root().with_suffix(".tmp").is_none());
    }

    #[test]
    fn join_rejects_non_segments() {
        let dir = RemotePath::new("/out").unwrap();
        assert!(dir.join("").is_err());
        assert!(dir.join("a/b").is_err());
        assert!(dir.join("..").is_err());
    }

    #[test]
    fn parent_and_file_name() {
        let p = RemotePath::new("/out/logs/app.log").unwrap();
        assert_eq!(p.file_name(), Some("app.log"));
        assert_eq!(p.parent().unwrap().as_str(), "/out/logs");
        assert_eq!(RemotePath::new("/top").unwrap().parent(), Some(RemotePath::root()));
        assert!(RemotePath::root().parent().is_none());
        assert!(RemotePath::root().file_name().is_none());
    }

    #[test]
    fn staging_and_final_share_parent() {
        let dir = RemotePath::new("/out").unwrap();
        let target = dir.join("x.log").unwrap();
        let staging = target.with_suffix(".tmp").unwrap();
        assert_eq!(target.parent(), staging.parent());
    }

    #[test]
    fn segments_iterate_top_down() {
        let p = RemotePath::new("/a/b/c").unwrap();
        assert_eq!(p.segments().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(RemotePath::root().segments().count(), 0);
    }
}
