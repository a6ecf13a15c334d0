use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VfsError;

/// Absolute, normalised, `/`-separated virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VPath(String);

impl VPath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parses `raw`; relative input is anchored at the root. Empty and `.`
    /// segments collapse, `..` is rejected.
    pub fn parse(raw: &str) -> Result<Self, VfsError> {
        Self::root().join(raw)
    }

    pub fn join(&self, rel: &str) -> Result<Self, VfsError> {
        let mut out = self.0.trim_end_matches('/').to_string();
        for seg in rel.split(['/', '\\']) {
            match seg {
                "" | "." => continue,
                ".." => {
                    return Err(VfsError::InvalidPath {
                        path: rel.to_string(),
                        reason: "parent segments are not allowed",
                    })
                }
                s => {
                    out.push('/');
                    out.push_str(s);
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Ok(Self(out))
    }

    pub fn join_all<'a>(&self, parts: impl IntoIterator<Item = &'a str>) -> Result<Self, VfsError> {
        parts.into_iter().try_fold(self.clone(), |acc, p| acc.join(p))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
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

    /// Path of `self` relative to `base`, without a leading `/`.
    pub fn strip_prefix(&self, base: &VPath) -> Option<&str> {
        if base.is_root() {
            return Some(self.0.trim_start_matches('/'));
        }
        let rest = self.0.strip_prefix(base.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    pub fn starts_with(&self, base: &VPath) -> bool {
        self.strip_prefix(base).is_some()
    }
}

impl fmt::Display for VPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VPath {
    type Error = VfsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VPath> for String {
    fn from(value: VPath) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises() {
        assert_eq!(VPath::parse("a//b/./c/").unwrap().as_str(), "/a/b/c");
        assert_eq!(VPath::parse("/").unwrap().as_str(), "/");
        assert_eq!(VPath::parse("").unwrap().as_str(), "/");
    }

    #[test]
    fn test_parent_segments_rejected() {
        assert!(VPath::parse("/a/../b").is_err());
    }

    #[test]
    fn test_join_and_parent() {
        let out = VPath::parse("/.morph/out").unwrap();
        let dir = out.join_all(["tc", "make"]).unwrap();
        assert_eq!(dir.as_str(), "/.morph/out/tc/make");
        assert_eq!(dir.parent().unwrap().as_str(), "/.morph/out/tc");
        assert_eq!(VPath::parse("/a").unwrap().parent(), Some(VPath::root()));
        assert_eq!(VPath::root().parent(), None);
        assert_eq!(dir.file_name(), Some("make"));
    }

    #[test]
    fn test_strip_prefix() {
        let base = VPath::parse("/proj").unwrap();
        let file = VPath::parse("/proj/src/Main.elm").unwrap();
        assert_eq!(file.strip_prefix(&base), Some("src/Main.elm"));
        assert_eq!(VPath::parse("/project").unwrap().strip_prefix(&base), None);
        assert_eq!(file.strip_prefix(&VPath::root()), Some("proj/src/Main.elm"));
    }
}
