use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::PlanError;
use crate::toolchain::{
    ArtifactRef, Enablement, Registry, TargetSpec, TaskDef, TaskKey, Workflow,
};

use super::types::{Plan, PlanStage, PlanTask};

/// Resolves named workflows into validated plans.
pub struct PlanBuilder {
    registry: Arc<Registry>,
    workflows: BTreeMap<String, Workflow>,
    /// `None` treats every toolchain as enabled.
    enablement: Option<Enablement>,
}

/// A task picked for one target spec.
struct Resolved<'a> {
    toolchain: &'a str,
    task: &'a TaskDef,
    variant: String,
}

impl PlanBuilder {
    pub fn new(registry: Arc<Registry>, workflows: BTreeMap<String, Workflow>) -> Self {
        Self {
            registry,
            workflows,
            enablement: None,
        }
    }

    pub fn with_enablement(
        registry: Arc<Registry>,
        workflows: BTreeMap<String, Workflow>,
        enablement: Enablement,
    ) -> Self {
        Self {
            registry,
            workflows,
            enablement: Some(enablement),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn workflow_names(&self) -> Vec<String> {
        self.workflows.keys().cloned().collect()
    }

    pub fn is_enabled(&self, toolchain: &str) -> bool {
        match &self.enablement {
            Some(enablement) => self.registry.is_enabled(toolchain, enablement),
            None => true,
        }
    }

    /// Builds the plan for `workflow_name`, reporting every problem found.
    pub fn build(&self, workflow_name: &str) -> Result<Plan, PlanError> {
        let workflow = self
            .resolve_workflow(workflow_name, &mut Vec::new())
            .map_err(PlanError::single)?;

        let mut plan = Plan::empty(workflow);
        let mut issues = Vec::new();

        for (stage_index, stage) in plan.workflow.stages.iter().enumerate() {
            let mut plan_stage = PlanStage {
                name: stage.name.clone(),
                parallel: stage.parallel,
                condition: stage.condition.clone(),
                tasks: Vec::with_capacity(stage.targets.len()),
            };

            for spec in &stage.targets {
                let (target, resolved) = match self.resolve_spec(spec) {
                    Ok(found) => found,
                    Err(issue) => {
                        issues.push(issue);
                        continue;
                    }
                };

                for rt in resolved {
                    let key = TaskKey::new(rt.toolchain, &rt.task.name, rt.variant);
                    if let Some(existing) = plan.tasks.get(&key) {
                        let first = plan
                            .workflow
                            .stages
                            .get(existing.stage_index)
                            .map(|s| s.name.as_str())
                            .unwrap_or_default();
                        issues.push(format!(
                            "duplicate task {key} in stage {:?} (already planned in stage {first:?})",
                            stage.name
                        ));
                        continue;
                    }

                    tracing::debug!(task = %key, spec = %spec, stage = stage_index, "planned task");
                    plan.tasks.insert(
                        key.clone(),
                        PlanTask {
                            key: key.clone(),
                            target: target.clone(),
                            inputs: rt.task.inputs.clone(),
                            outputs: rt.task.outputs.clone(),
                            depends_on: Vec::new(),
                            stage_index,
                            target_source: spec.clone(),
                        },
                    );
                    plan_stage.tasks.push(key);
                }
            }

            plan.stages.push(plan_stage);
        }

        issues.extend(self.resolve_dependencies(&mut plan));

        if issues.is_empty() {
            Ok(plan)
        } else {
            Err(PlanError::new(issues))
        }
    }

    fn resolve_workflow(&self, name: &str, visiting: &mut Vec<String>) -> Result<Workflow, String> {
        if visiting.iter().any(|v| v == name) {
            return Err(format!("workflow inheritance cycle detected at {name:?}"));
        }
        let Some(workflow) = self.workflows.get(name) else {
            return Err(format!("workflow not found: {name}"));
        };
        let Some(base_name) = workflow.extends.as_deref().filter(|b| !b.is_empty()) else {
            return Ok(workflow.clone());
        };

        visiting.push(name.to_string());
        let base = self.resolve_workflow(base_name, visiting);
        visiting.pop();
        let base = base?;

        let mut stages = base.stages;
        stages.extend(workflow.stages.iter().cloned());
        Ok(Workflow {
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            extends: workflow.extends.clone(),
            stages,
        })
    }

    /// Returns the originating target name and the tasks chosen for `spec`.
    fn resolve_spec(&self, spec: &str) -> Result<(String, Vec<Resolved<'_>>), String> {
        match TargetSpec::parse(spec).map_err(|e| e.to_string())? {
            TargetSpec::Task {
                toolchain,
                task,
                variant,
            } => {
                let rt = self.resolve_direct(&toolchain, &task, variant.as_deref())?;
                Ok((rt.task.name.clone(), vec![rt]))
            }
            TargetSpec::Target { name, variant } => {
                let resolved = self.resolve_target(&name, variant.as_deref())?;
                Ok((name, resolved))
            }
        }
    }

    fn resolve_direct(
        &self,
        toolchain_name: &str,
        task_name: &str,
        variant: Option<&str>,
    ) -> Result<Resolved<'_>, String> {
        if !self.is_enabled(toolchain_name) {
            return Err(format!("toolchain {toolchain_name:?} is not enabled"));
        }
        let Some(toolchain) = self.registry.get_toolchain(toolchain_name) else {
            return Err(format!("toolchain {toolchain_name:?} not found"));
        };
        let Some(task) = toolchain.task(task_name) else {
            return Err(format!(
                "task {task_name:?} not found in toolchain {toolchain_name:?}"
            ));
        };

        let variant = match (task.variants.is_empty(), variant) {
            (true, None) => String::new(),
            (true, Some(_)) => {
                return Err(format!(
                    "task {toolchain_name}/{task_name} does not support variants"
                ))
            }
            (false, None) => {
                return Err(format!(
                    "task {toolchain_name}/{task_name} requires a variant ({})",
                    task.variants.join(", ")
                ))
            }
            (false, Some(wanted)) => match task.match_variant(wanted) {
                Some(matched) => matched.to_string(),
                None => {
                    return Err(format!(
                        "task {toolchain_name}/{task_name} does not support variant {wanted:?} (available: {})",
                        task.variants.join(", ")
                    ))
                }
            },
        };

        Ok(Resolved {
            toolchain: &toolchain.name,
            task,
            variant,
        })
    }

    /// Every enabled task fulfilling `target`; several providers all get planned.
    fn resolve_target(
        &self,
        target: &str,
        variant: Option<&str>,
    ) -> Result<Vec<Resolved<'_>>, String> {
        let candidates: Vec<(&str, &TaskDef)> = self
            .registry
            .toolchains()
            .filter(|tc| self.is_enabled(&tc.name))
            .flat_map(move |tc| {
                tc.tasks
                    .iter()
                    .filter(move |t| t.fulfills_target(target))
                    .map(move |t| (tc.name.as_str(), t))
            })
            .collect();

        if candidates.is_empty() {
            return Err(format!("no task fulfills target {target:?}"));
        }

        let mut results = Vec::new();
        let mut variant_lists = Vec::new();

        for (toolchain, task) in candidates {
            match (task.variants.is_empty(), variant) {
                (true, None) => results.push(Resolved {
                    toolchain,
                    task,
                    variant: String::new(),
                }),
                (true, Some(_)) => {}
                (false, None) => variant_lists.push(task.variants.join(", ")),
                (false, Some(wanted)) => {
                    if let Some(matched) = task.match_variant(wanted) {
                        results.push(Resolved {
                            toolchain,
                            task,
                            variant: matched.to_string(),
                        });
                    }
                }
            }
        }

        if results.is_empty() {
            return match variant {
                None if !variant_lists.is_empty() => {
                    variant_lists.sort();
                    Err(format!(
                        "target {target:?} requires a variant ({})",
                        variant_lists.join("; ")
                    ))
                }
                _ => Err(format!(
                    "no task variant {:?} available for target {target:?}",
                    variant.unwrap_or_default()
                )),
            };
        }

        if results.len() > 1 {
            tracing::debug!(target = %target, providers = results.len(), "target fans out");
        }
        Ok(results)
    }

    /// Fills `depends_on` from artifact references and target requirements,
    /// then checks stage ordering.
    fn resolve_dependencies(&self, plan: &mut Plan) -> Vec<String> {
        let mut issues = Vec::new();

        let mut producers: HashMap<&str, BTreeSet<&TaskKey>> = HashMap::new();
        for task in plan.tasks.values() {
            for output in task.outputs.values() {
                if output.artifact_type.is_empty() {
                    continue;
                }
                producers
                    .entry(output.artifact_type.as_str())
                    .or_default()
                    .insert(&task.key);
            }
        }

        let mut computed: Vec<(TaskKey, Vec<TaskKey>)> = Vec::with_capacity(plan.tasks.len());

        for task in plan.tasks.values() {
            let key = &task.key;
            let mut deps: BTreeSet<TaskKey> = BTreeSet::new();

            for reference in task.inputs.artifacts.values() {
                let parsed = match ArtifactRef::parse(reference) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        issues.push(format!("invalid artifact reference for {key}: {err}"));
                        continue;
                    }
                };
                let exact = TaskKey::new(&parsed.toolchain, &parsed.task, "");
                let found = if plan.tasks.contains_key(&exact) {
                    Some(exact)
                } else {
                    unique_variant_match(&plan.tasks, &parsed.toolchain, &parsed.task)
                };
                match found {
                    Some(dep) if &dep == key => {}
                    Some(dep) => {
                        deps.insert(dep);
                    }
                    None => issues.push(format!(
                        "missing dependency {}/{} for {key}",
                        parsed.toolchain, parsed.task
                    )),
                }
            }

            if let Some(target) = self.registry.get_target(&task.target) {
                for required in &target.requires {
                    let found: Vec<&TaskKey> = producers
                        .get(required.as_str())
                        .map(|set| set.iter().copied().collect())
                        .unwrap_or_default();
                    match found.as_slice() {
                        [] => issues.push(format!(
                            "no task produces required type {required:?} for target {}",
                            target.name
                        )),
                        [only] => {
                            if *only != key {
                                deps.insert((*only).clone());
                            }
                        }
                        many => {
                            let choices: Vec<String> = many.iter().map(|k| k.to_string()).collect();
                            issues.push(format!(
                                "multiple tasks produce type {required:?} for target {}: {}",
                                target.name,
                                choices.join(", ")
                            ));
                        }
                    }
                }
            }

            for dep in &deps {
                let dep_stage = plan.tasks.get(dep).map(|t| t.stage_index).unwrap_or_default();
                if dep_stage > task.stage_index {
                    issues.push(format!("dependency {dep} scheduled after {key}"));
                }
            }

            computed.push((key.clone(), deps.into_iter().collect()));
        }

        for (key, deps) in computed {
            if let Some(task) = plan.tasks.get_mut(&key) {
                task.depends_on = deps;
            }
        }

        issues
    }
}

/// The single planned key for `toolchain/task`, whatever its variant.
fn unique_variant_match(
    tasks: &BTreeMap<TaskKey, PlanTask>,
    toolchain: &str,
    task: &str,
) -> Option<TaskKey> {
    let mut matches = tasks
        .keys()
        .filter(|k| k.toolchain == toolchain && k.task == task);
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{Target, Toolchain, WorkflowStage};
    use pretty_assertions::assert_eq;

    fn workflows(list: Vec<Workflow>) -> BTreeMap<String, Workflow> {
        list.into_iter().map(|w| (w.name.clone(), w)).collect()
    }

    fn base_registry() -> Registry {
        let mut reg = Registry::new();
        reg.register(
            Toolchain::native("tc")
                .with_task(
                    TaskDef::new("make")
                        .with_fulfills(["make"])
                        .with_output("ir", "morphir-ir.json", "morphir-ir"),
                )
                .with_task(
                    TaskDef::new("gen")
                        .with_fulfills(["gen"])
                        .with_variants(["scala", "TypeScript"])
                        .with_artifact_input("ir", "@tc/make:ir"),
                )
                .with_task(TaskDef::new("lint").with_fulfills(["lint"])),
        );
        reg
    }

    fn builder(reg: Registry, list: Vec<Workflow>) -> PlanBuilder {
        PlanBuilder::new(Arc::new(reg), workflows(list))
    }

    #[test]
    fn test_unknown_workflow() {
        let err = builder(base_registry(), vec![]).build("build").unwrap_err();
        assert_eq!(err.issues, vec!["workflow not found: build".to_string()]);
    }

    #[test]
    fn test_inheritance_appends_stages() {
        let b = builder(
            base_registry(),
            vec![
                Workflow::new("base").with_stage(WorkflowStage::new("compile", ["make"])),
                Workflow::new("ci")
                    .extending("base")
                    .with_stage(WorkflowStage::new("check", ["lint"])),
                Workflow::new("release")
                    .extending("ci")
                    .with_stage(WorkflowStage::new("emit", ["gen:scala"])),
            ],
        );
        let plan = b.build("release").unwrap();
        let names: Vec<&str> = plan.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["compile", "check", "emit"]);
        assert_eq!(plan.workflow.name, "release");
        assert_eq!(
            plan.task(&TaskKey::new("tc", "lint", "")).unwrap().stage_index,
            1
        );
    }

    #[test]
    fn test_inheritance_cycle() {
        let b = builder(
            base_registry(),
            vec![
                Workflow::new("a").extending("b"),
                Workflow::new("b").extending("a"),
            ],
        );
        let err = b.build("a").unwrap_err();
        assert!(err.contains("workflow inheritance cycle detected at \"a\""), "{err}");
    }

    #[test]
    fn test_case_insensitive_variant_uses_task_spelling() {
        let b = builder(
            base_registry(),
            vec![Workflow::new("w")
                .with_stage(WorkflowStage::new("s1", ["make"]))
                .with_stage(WorkflowStage::new("s2", ["gen:typescript"]))],
        );
        let plan = b.build("w").unwrap();
        assert!(plan
            .tasks
            .contains_key(&TaskKey::new("tc", "gen", "TypeScript")));
    }

    #[test]
    fn test_unknown_variant_and_target() {
        let b = builder(
            base_registry(),
            vec![Workflow::new("w").with_stage(WorkflowStage::new(
                "s",
                ["gen:java", "deploy", "make:fast"],
            ))],
        );
        let err = b.build("w").unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                "no task variant \"java\" available for target \"gen\"".to_string(),
                "no task fulfills target \"deploy\"".to_string(),
                "no task variant \"fast\" available for target \"make\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_direct_reference_checks() {
        let b = builder(
            base_registry(),
            vec![Workflow::new("w").with_stage(WorkflowStage::new(
                "s",
                [
                    "tc/gen",
                    "tc/gen:kotlin",
                    "tc/make:x",
                    "tc/missing",
                    "nope/make",
                    "tc/gen:SCALA",
                ],
            ))],
        );
        let err = b.build("w").unwrap_err();
        let expected: Vec<String> = vec![
            "task tc/gen requires a variant (scala, TypeScript)".into(),
            "task tc/gen does not support variant \"kotlin\" (available: scala, TypeScript)".into(),
            "task tc/make does not support variants".into(),
            "task \"missing\" not found in toolchain \"tc\"".into(),
            "toolchain \"nope\" not found".into(),
            // tc/gen:scala resolved but its artifact input has no producer
            "missing dependency tc/make for tc/gen:scala".into(),
        ];
        assert_eq!(err.issues, expected);
    }

    #[test]
    fn test_direct_reference_to_disabled_toolchain() {
        let reg = base_registry();
        let b = PlanBuilder::with_enablement(
            Arc::new(reg),
            workflows(vec![
                Workflow::new("w").with_stage(WorkflowStage::new("s", ["tc/lint"]))
            ]),
            Enablement::new().disable("tc"),
        );
        let err = b.build("w").unwrap_err();
        assert_eq!(err.issues, vec!["toolchain \"tc\" is not enabled".to_string()]);
    }

    #[test]
    fn test_disabled_toolchains_are_not_candidates() {
        let mut reg = base_registry();
        reg.register(
            Toolchain::native("other").with_task(TaskDef::new("lint").with_fulfills(["lint"])),
        );
        let b = PlanBuilder::with_enablement(
            Arc::new(reg),
            workflows(vec![
                Workflow::new("w").with_stage(WorkflowStage::new("s", ["lint"]))
            ]),
            Enablement::new().enable("other"),
        );
        let plan = b.build("w").unwrap();
        let keys: Vec<String> = plan.tasks.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["other/lint"]);
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let b = builder(
            base_registry(),
            vec![Workflow::new("w")
                .with_stage(WorkflowStage::new("first", ["lint"]))
                .with_stage(WorkflowStage::new("again", ["tc/lint"]))],
        );
        let err = b.build("w").unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                "duplicate task tc/lint in stage \"again\" (already planned in stage \"first\")"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_requires_ambiguity_is_sorted() {
        let mut reg = base_registry();
        reg.register(
            Toolchain::native("alt").with_task(
                TaskDef::new("compile")
                    .with_fulfills(["compile"])
                    .with_output("ir", "ir.json", "morphir-ir"),
            ),
        );
        reg.register_target(Target::new("lint").requiring(["morphir-ir"]));
        let b = builder(
            reg,
            vec![Workflow::new("w")
                .with_stage(WorkflowStage::new("s1", ["make", "compile"]).parallel())
                .with_stage(WorkflowStage::new("s2", ["lint"]))],
        );
        let err = b.build("w").unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                "multiple tasks produce type \"morphir-ir\" for target lint: alt/compile, tc/make"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_requires_without_producer() {
        let mut reg = base_registry();
        reg.register_target(Target::new("lint").requiring(["morphir-ir"]));
        let b = builder(
            reg,
            vec![Workflow::new("w").with_stage(WorkflowStage::new("s", ["lint"]))],
        );
        let err = b.build("w").unwrap_err();
        assert_eq!(
            err.issues,
            vec!["no task produces required type \"morphir-ir\" for target lint".to_string()]
        );
    }

    #[test]
    fn test_self_production_is_not_a_dependency() {
        let mut reg = base_registry();
        reg.register_target(Target::new("make").requiring(["morphir-ir"]));
        let b = builder(
            reg,
            vec![Workflow::new("w").with_stage(WorkflowStage::new("s", ["make"]))],
        );
        let plan = b.build("w").unwrap();
        assert!(plan.tasks[&TaskKey::new("tc", "make", "")]
            .depends_on
            .is_empty());
    }

    #[test]
    fn test_artifact_ref_falls_back_to_unique_variant() {
        let mut reg = Registry::new();
        reg.register(
            Toolchain::native("tc")
                .with_task(
                    TaskDef::new("gen")
                        .with_fulfills(["gen"])
                        .with_variants(["scala", "java"]),
                )
                .with_task(
                    TaskDef::new("pack")
                        .with_fulfills(["pack"])
                        .with_artifact_input("src", "@tc/gen:sources"),
                )
                .with_task(
                    TaskDef::new("bad")
                        .with_fulfills(["bad"])
                        .with_artifact_input("x", "tc/gen:sources"),
                ),
        );
        let b = builder(
            reg,
            vec![
                Workflow::new("one")
                    .with_stage(WorkflowStage::new("s1", ["gen:java"]))
                    .with_stage(WorkflowStage::new("s2", ["pack"])),
                Workflow::new("two")
                    .with_stage(WorkflowStage::new("s1", ["gen:java", "gen:scala"]))
                    .with_stage(WorkflowStage::new("s2", ["pack", "bad"])),
            ],
        );
        let plan = b.build("one").unwrap();
        assert_eq!(
            plan.tasks[&TaskKey::new("tc", "pack", "")].depends_on,
            vec![TaskKey::new("tc", "gen", "java")]
        );

        let err = b.build("two").unwrap_err();
        assert_eq!(
            err.issues,
            vec![
                "invalid artifact reference for tc/bad: artifact ref must start with '@': tc/gen:sources"
                    .to_string(),
                "missing dependency tc/gen for tc/pack".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_workflow_builds_empty_plan() {
        let b = builder(base_registry(), vec![Workflow::new("noop")]);
        let plan = b.build("noop").unwrap();
        assert!(plan.stages.is_empty());
        assert_eq!(plan.task_count(), 0);
    }
}
