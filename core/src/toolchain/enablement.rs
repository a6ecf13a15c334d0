use std::collections::BTreeMap;
use std::sync::Arc;

use crate::vfs::{EntryKind, VPath, Vfs};

/// Project view handed to auto-enable predicates.
#[derive(Clone)]
pub struct AutoEnableContext {
    pub vfs: Arc<dyn Vfs>,
    pub project_root: VPath,
}

impl AutoEnableContext {
    pub fn new(vfs: Arc<dyn Vfs>, project_root: VPath) -> Self {
        Self { vfs, project_root }
    }

    pub fn file_exists(&self, relative: &str) -> bool {
        let Ok(path) = self.project_root.join(relative) else {
            return false;
        };
        matches!(self.vfs.resolve(&path), Ok(entry) if entry.kind == EntryKind::File)
    }

    pub fn has_all_files<S: AsRef<str>>(&self, relative: &[S]) -> bool {
        relative.iter().all(|p| self.file_exists(p.as_ref()))
    }

    pub fn has_any_file<S: AsRef<str>>(&self, relative: &[S]) -> bool {
        relative.iter().any(|p| self.file_exists(p.as_ref()))
    }

    pub fn has_matching_files(&self, pattern: &str) -> bool {
        let full = if self.project_root.is_root() {
            format!("/{}", pattern.trim_start_matches('/'))
        } else {
            format!("{}/{}", self.project_root, pattern.trim_start_matches('/'))
        };
        self.vfs
            .find(&full)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    pub fn has_any_matching_files<S: AsRef<str>>(&self, patterns: &[S]) -> bool {
        patterns.iter().any(|p| self.has_matching_files(p.as_ref()))
    }
}

/// Which toolchains take part in planning.
///
/// An explicit entry always wins; otherwise the toolchain's auto-enable
/// predicate decides, provided a context is available.
#[derive(Clone, Default)]
pub struct Enablement {
    pub explicit: BTreeMap<String, bool>,
    pub auto: Option<AutoEnableContext>,
}

impl Enablement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(mut self, name: impl Into<String>) -> Self {
        self.explicit.insert(name.into(), true);
        self
    }

    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.explicit.insert(name.into(), false);
        self
    }

    pub fn with_auto(mut self, ctx: AutoEnableContext) -> Self {
        self.auto = Some(ctx);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryVfs;

    fn ctx() -> AutoEnableContext {
        let vfs = MemoryVfs::new();
        vfs.insert_file("/proj/morphir.json", "{}").unwrap();
        vfs.insert_file("/proj/src/App.elm", "module App").unwrap();
        AutoEnableContext::new(Arc::new(vfs), VPath::parse("/proj").unwrap())
    }

    #[test]
    fn test_file_checks() {
        let ctx = ctx();
        assert!(ctx.file_exists("morphir.json"));
        assert!(!ctx.file_exists("src"));
        assert!(!ctx.file_exists("../etc/passwd"));
        assert!(ctx.has_all_files(&["morphir.json", "src/App.elm"]));
        assert!(!ctx.has_all_files(&["morphir.json", "elm.json"]));
        assert!(ctx.has_any_file(&["elm.json", "morphir.json"]));
    }

    #[test]
    fn test_glob_checks() {
        let ctx = ctx();
        assert!(ctx.has_matching_files("**/*.elm"));
        assert!(!ctx.has_matching_files("**/*.wit"));
        assert!(ctx.has_any_matching_files(&["*.wit", "src/*.elm"]));
    }
}
