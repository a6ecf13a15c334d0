use crate::error::VfsError;
use crate::vfs::VPath;

pub const META_FILE: &str = "meta.json";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.jsonl";

/// `<root>/<toolchain>/<task>/...` layout for task outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirStructure {
    pub root: VPath,
}

impl OutputDirStructure {
    pub fn new(root: VPath) -> Self {
        Self { root }
    }

    pub fn task_dir(&self, toolchain: &str, task: &str) -> Result<VPath, VfsError> {
        self.root.join_all([toolchain, task])
    }

    pub fn meta_path(&self, toolchain: &str, task: &str) -> Result<VPath, VfsError> {
        self.task_dir(toolchain, task)?.join(META_FILE)
    }

    pub fn diagnostics_path(&self, toolchain: &str, task: &str) -> Result<VPath, VfsError> {
        self.task_dir(toolchain, task)?.join(DIAGNOSTICS_FILE)
    }

    pub fn output_path(&self, toolchain: &str, task: &str, relative: &str) -> Result<VPath, VfsError> {
        self.task_dir(toolchain, task)?.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let dirs = OutputDirStructure::new(VPath::parse("/.morph/out").unwrap());
        assert_eq!(
            dirs.meta_path("tc", "make").unwrap().as_str(),
            "/.morph/out/tc/make/meta.json"
        );
        assert_eq!(
            dirs.diagnostics_path("tc", "make").unwrap().as_str(),
            "/.morph/out/tc/make/diagnostics.jsonl"
        );
        assert_eq!(
            dirs.output_path("tc", "make", "ir/morphir-ir.json")
                .unwrap()
                .as_str(),
            "/.morph/out/tc/make/ir/morphir-ir.json"
        );
        assert!(dirs.output_path("tc", "make", "../escape").is_err());
    }
}
