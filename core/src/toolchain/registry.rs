use std::collections::BTreeMap;

use super::enablement::Enablement;
use super::types::{Target, Toolchain};

/// Lookup table of toolchains and targets.
///
/// Filled during setup, then shared read-only (usually behind an `Arc`).
#[derive(Debug, Default, Clone)]
pub struct Registry {
    toolchains: BTreeMap<String, Toolchain>,
    targets: BTreeMap<String, Target>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces by name.
    pub fn register(&mut self, toolchain: Toolchain) {
        if self.toolchains.contains_key(&toolchain.name) {
            tracing::debug!(toolchain = %toolchain.name, "replacing registered toolchain");
        }
        self.toolchains.insert(toolchain.name.clone(), toolchain);
    }

    /// Inserts or replaces by name.
    pub fn register_target(&mut self, target: Target) {
        self.targets.insert(target.name.clone(), target);
    }

    pub fn get_toolchain(&self, name: &str) -> Option<&Toolchain> {
        self.toolchains.get(name)
    }

    pub fn get_target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    /// Sorted toolchain names.
    pub fn list_toolchains(&self) -> Vec<String> {
        self.toolchains.keys().cloned().collect()
    }

    /// Sorted target names.
    pub fn list_targets(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn toolchains(&self) -> impl Iterator<Item = &Toolchain> {
        self.toolchains.values()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn is_enabled(&self, name: &str, enablement: &Enablement) -> bool {
        if let Some(enabled) = enablement.explicit.get(name) {
            return *enabled;
        }
        let Some(toolchain) = self.toolchains.get(name) else {
            return false;
        };
        match (&toolchain.auto_enable, &enablement.auto) {
            (Some(predicate), Some(ctx)) => predicate(ctx),
            _ => false,
        }
    }

    pub fn list_enabled(&self, enablement: &Enablement) -> Vec<String> {
        self.toolchains
            .keys()
            .filter(|name| self.is_enabled(name, enablement))
            .cloned()
            .collect()
    }

    /// `(toolchain, task)` pairs whose task fulfills `target`, in toolchain order.
    pub fn providers_of(&self, target: &str) -> Vec<(String, String)> {
        self.toolchains
            .values()
            .flat_map(|tc| {
                tc.tasks
                    .iter()
                    .filter(|t| t.fulfills_target(target))
                    .map(move |t| (tc.name.clone(), t.name.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::toolchain::enablement::AutoEnableContext;
    use crate::toolchain::types::{AcquireConfig, TaskDef};
    use crate::vfs::{MemoryVfs, VPath};

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register(
            Toolchain::external("wit", AcquireConfig::path("wit-bindgen"))
                .with_task(TaskDef::new("make").with_fulfills(["make"]))
                .with_auto_enable(|ctx| ctx.has_matching_files("**/*.wit")),
        );
        reg.register(
            Toolchain::native("golang").with_task(TaskDef::new("gen").with_fulfills(["gen"])),
        );
        reg.register(
            Toolchain::native("elm")
                .with_task(TaskDef::new("make").with_fulfills(["make"]))
                .with_auto_enable(|ctx| ctx.file_exists("morphir.json")),
        );
        reg
    }

    #[test]
    fn test_register_overwrites_by_name() {
        let mut reg = registry();
        reg.register(Toolchain::native("golang").with_version("2"));
        assert_eq!(reg.get_toolchain("golang").unwrap().version, "2");
        assert!(reg.get_toolchain("golang").unwrap().tasks.is_empty());
        assert_eq!(reg.list_toolchains(), vec!["elm", "golang", "wit"]);
    }

    #[test]
    fn test_explicit_enablement_wins() {
        let reg = registry();
        let enablement = Enablement::new().enable("golang").disable("elm");
        assert!(reg.is_enabled("golang", &enablement));
        assert!(!reg.is_enabled("elm", &enablement));
        assert!(!reg.is_enabled("missing", &enablement));
    }

    #[test]
    fn test_auto_enable_needs_context() {
        let reg = registry();
        assert!(!reg.is_enabled("elm", &Enablement::new()));

        let vfs = MemoryVfs::new();
        vfs.insert_file("/work/morphir.json", "{}").unwrap();
        let ctx = AutoEnableContext::new(Arc::new(vfs), VPath::parse("/work").unwrap());
        let enablement = Enablement::new().with_auto(ctx);
        assert_eq!(reg.list_enabled(&enablement), vec!["elm"]);
    }

    #[test]
    fn test_providers_of() {
        let reg = registry();
        assert_eq!(
            reg.providers_of("make"),
            vec![
                ("elm".to_string(), "make".to_string()),
                ("wit".to_string(), "make".to_string())
            ]
        );
        assert!(reg.providers_of("nothing").is_empty());
    }
}
