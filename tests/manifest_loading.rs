mod common;

use std::sync::Arc;
use std::time::Duration;

use action_flow::{AbortReason, EngineConfig, EngineError};
use autoplay_cli::{Manifest, ReplayController};
use autoplay_core_types::{Capability, CapabilitySet};
use common::Fixture;
use tokio_util::sync::CancellationToken;

fn quick_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.backoff.base_ms = 5;
    config.backoff.max_ms = 20;
    config.recovery_delay_ms = 5;
    config
}

#[test]
fn loads_fixture_manifest() {
    let fixture = Fixture::new();
    let manifest = Manifest::load(&fixture.manifest).unwrap();

    assert_eq!(manifest.source, fixture.manifest);
    assert_eq!(manifest.templates.len(), 2);
    assert_eq!(manifest.graph.node_count(), 3);
    assert_eq!(manifest.graph.edge_count(), 2);
    assert_eq!(manifest.tasks.len(), 3);

    let shop = manifest.templates.get("shop_banner").unwrap();
    assert_eq!(shop.threshold(), 0.9);
    assert!(shop.tags().contains("shop"));

    let home = manifest.graph.node_id("home").unwrap();
    let edge = manifest
        .graph
        .edge(manifest.graph.outgoing(home)[0])
        .unwrap();
    assert_eq!(edge.delay, Duration::from_millis(10));

    let tidy = manifest.task("tidy").unwrap();
    assert!(tidy.target.is_none());
    assert_eq!(tidy.steps[0].repeat, 1);
    assert!(manifest.task("missing").is_none());
}

#[test]
fn rejects_inconsistent_manifests() {
    let fixture = Fixture::new();
    let cases = [
        (
            "unknown template",
            "templates: []\nnodes:\n  - name: a\n    templates: [ghost]\n",
            "unknown template ghost",
        ),
        (
            "duplicate template",
            "templates:\n  - { name: t, image: templates/home.png }\n  - { name: t, image: templates/shop.png }\n",
            "Duplicate template",
        ),
        (
            "zero threshold",
            "templates:\n  - { name: t, image: templates/home.png, threshold: 0.0 }\n",
            "threshold",
        ),
        (
            "missing image",
            "templates:\n  - { name: t, image: templates/nope.png }\n",
            "cannot open",
        ),
        (
            "negative weight",
            "templates:\n  - { name: t, image: templates/home.png }\nnodes:\n  - { name: a, templates: [t] }\n  - { name: b, templates: [t] }\nedges:\n  - { from: a, to: b, action: { type: click, x: 1, y: 1 }, weight: -1.0 }\n",
            "Invalid edge a -> b",
        ),
        (
            "unknown target",
            "tasks:\n  - { name: go, target: nowhere }\n",
            "unknown node nowhere",
        ),
        (
            "duplicate task",
            "tasks:\n  - { name: go, steps: [] }\n  - { name: go, steps: [] }\n",
            "duplicate task go",
        ),
        (
            "unknown template in step",
            "tasks:\n  - name: check\n    steps:\n      - action: { type: assert, template: ghost }\n",
            "references unknown template ghost",
        ),
    ];

    for (label, content, expected) in cases {
        let path = fixture.write_manifest("bad.yaml", content);
        let err = Manifest::load(&path).expect_err(label);
        let message = format!("{:#}", err);
        assert!(
            message.to_lowercase().contains(&expected.to_lowercase()),
            "{}: {:?} does not mention {:?}",
            label,
            message,
            expected
        );
    }
}

#[tokio::test]
async fn replay_run_reaches_target() {
    let fixture = Fixture::new();
    let manifest = Manifest::load(&fixture.manifest).unwrap();
    let device = Arc::new(ReplayController::from_dir(&fixture.frames).unwrap());
    let engine = manifest.engine(Arc::clone(&device), quick_config());

    let task = engine
        .load_task(manifest.task("open-shop").unwrap().clone())
        .unwrap();
    let outcome = engine.run(&task, &CancellationToken::new()).await;

    assert!(outcome.is_success(), "{:?}", outcome);
    let report = outcome.report();
    assert_eq!(report.visited, vec!["home", "shop"]);
    assert_eq!(report.actions_executed, 1);
    assert_eq!(report.capture_attempts, 2);

    let inputs = device.recorded().await;
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].action, "click(20, 30)");
    assert_eq!(inputs[0].frame, 0);
    assert_eq!(device.position(), 1);
}

#[test]
fn unreachable_target_aborts_before_acting() {
    let fixture = Fixture::new();
    let manifest = Manifest::load(&fixture.manifest).unwrap();
    let device = Arc::new(ReplayController::from_dir(&fixture.frames).unwrap());
    let engine = manifest.engine(Arc::clone(&device), quick_config());

    let task = engine
        .load_task(manifest.task("open-settings").unwrap().clone())
        .unwrap();
    let outcome = tokio_test::block_on(engine.run(&task, &CancellationToken::new()));

    assert!(matches!(
        outcome.abort_reason(),
        Some(AbortReason::TargetUnreachable { from, to }) if from == "home" && to == "settings"
    ));
    assert_eq!(outcome.report().actions_executed, 0);
    assert!(tokio_test::block_on(device.recorded()).is_empty());
}

#[tokio::test]
async fn step_only_task_runs_without_capturing() {
    let fixture = Fixture::new();
    let manifest = Manifest::load(&fixture.manifest).unwrap();
    let device = Arc::new(ReplayController::from_dir(&fixture.frames).unwrap());
    let engine = manifest.engine(Arc::clone(&device), quick_config());

    let task = engine
        .load_task(manifest.task("tidy").unwrap().clone())
        .unwrap();
    let outcome = engine.run(&task, &CancellationToken::new()).await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.report().capture_attempts, 0);
    assert_eq!(outcome.report().steps[0].attempts, 2);
    assert_eq!(device.recorded().await.len(), 2);
}

#[test]
fn locked_down_device_rejects_task_at_load() {
    let fixture = Fixture::new();
    let manifest = Manifest::load(&fixture.manifest).unwrap();
    let device = ReplayController::from_dir(&fixture.frames)
        .unwrap()
        .with_capabilities(CapabilitySet::all().without(Capability::KeyEvent));
    let engine = manifest.engine(Arc::new(device), quick_config());

    let result = engine.load_task(manifest.task("tidy").unwrap().clone());
    assert!(matches!(
        result,
        Err(EngineError::CapabilityUnavailable {
            capability: Capability::KeyEvent,
            ..
        })
    ));
}
