mod common;

use common::{builder, key, plan, workflow};
use morph_core::plan::plan_to_mermaid;
use morph_core::toolchain::{TargetSpec, WorkflowStage};
use pretty_assertions::assert_eq;

#[test]
fn variant_task_depends_on_artifact_producer() {
    let plan = plan(vec![
        WorkflowStage::new("compile", ["make"]),
        WorkflowStage::new("generate", ["gen:scala"]),
    ]);

    assert_eq!(plan.task_count(), 2);
    let gen = plan.task(&key("morphir/gen:Scala")).expect("gen planned");
    assert_eq!(gen.depends_on, vec![key("morphir/make")]);
    assert_eq!(gen.stage_index, 1);
    assert_eq!(gen.target, "gen");
    assert_eq!(gen.target_source, "gen:scala");
    assert!(plan.task(&key("morphir/make")).unwrap().depends_on.is_empty());
}

#[test]
fn target_with_variants_requires_one() {
    let err = builder(vec![workflow(
        "build",
        vec![
            WorkflowStage::new("compile", ["make"]),
            WorkflowStage::new("generate", ["gen"]),
        ],
    )])
    .build("build")
    .unwrap_err();

    assert_eq!(
        err.issues,
        vec!["target \"gen\" requires a variant (Scala, TypeScript)".to_string()]
    );
}

#[test]
fn dependency_in_later_stage_is_rejected() {
    let err = builder(vec![workflow(
        "build",
        vec![
            WorkflowStage::new("generate", ["gen:TypeScript"]),
            WorkflowStage::new("compile", ["make"]),
        ],
    )])
    .build("build")
    .unwrap_err();

    assert_eq!(
        err.issues,
        vec!["dependency morphir/make scheduled after morphir/gen:TypeScript".to_string()]
    );
}

#[test]
fn target_with_two_providers_fans_out() {
    let plan = plan(vec![WorkflowStage::new("check", ["lint"]).parallel()]);

    assert_eq!(plan.stages.len(), 1);
    assert_eq!(
        plan.stages[0].tasks,
        vec![key("alt/lint"), key("morphir/lint")]
    );
    assert!(plan.stages[0].parallel);
}

#[test]
fn direct_reference_and_target_lookup_agree() {
    let direct = plan(vec![
        WorkflowStage::new("compile", ["morphir/make"]),
        WorkflowStage::new("generate", ["morphir/gen:SCALA"]),
    ]);
    let by_target = plan(vec![
        WorkflowStage::new("compile", ["make"]),
        WorkflowStage::new("generate", ["gen:Scala"]),
    ]);

    let direct_keys: Vec<_> = direct.tasks.keys().cloned().collect();
    let target_keys: Vec<_> = by_target.tasks.keys().cloned().collect();
    assert_eq!(direct_keys, target_keys);
    assert_eq!(
        direct.task(&key("morphir/gen:Scala")).unwrap().depends_on,
        vec![key("morphir/make")]
    );
}

#[test]
fn building_twice_gives_the_same_plan() {
    let b = builder(vec![workflow(
        "build",
        vec![
            WorkflowStage::new("compile", ["make"]),
            WorkflowStage::new("generate", ["gen:Scala", "gen:TypeScript"]).parallel(),
            WorkflowStage::new("check", ["lint"]),
        ],
    )]);

    let first = b.build("build").unwrap();
    let second = b.build("build").unwrap();
    assert_eq!(first, second);
    assert_eq!(plan_to_mermaid(&first), plan_to_mermaid(&second));
}

#[test]
fn every_problem_is_reported_together() {
    let err = builder(vec![workflow(
        "build",
        vec![WorkflowStage::new(
            "broken",
            ["publish", "morphir/gen:java", "gen:"],
        )],
    )])
    .build("build")
    .unwrap_err();

    assert_eq!(err.issues.len(), 3);
    assert!(err.contains("no task fulfills target \"publish\""));
    assert!(err.contains("does not support variant \"java\""));
    assert!(err.contains("missing variant"));
}

#[test]
fn target_specs_print_as_parsed() {
    for raw in ["make", "gen:Scala", "morphir/make", "morphir/gen:TypeScript"] {
        let spec: TargetSpec = raw.parse().unwrap();
        assert_eq!(spec.to_string(), raw);
    }
    assert!(matches!(
        TargetSpec::parse("morphir/gen:Scala").unwrap(),
        TargetSpec::Task { ref toolchain, .. } if toolchain == "morphir"
    ));
    assert!(matches!(
        TargetSpec::parse("gen:Scala").unwrap(),
        TargetSpec::Target { ref name, .. } if name == "gen"
    ));
}
