// lifecycle.rs - End-to-end integration test for an initiative's full lifecycle.
//
// Runs against the shipped `initiative-flow` schema, copied into a temporary
// project so the test exercises the same layout the CLI resolves.
//
// Flow:
//   1. Create the initiative (draft) and enter tier 1
//   2. Strategic gate blocks until the mandate frontmatter is complete
//   3. Product gate: PRD plus MoSCoW-rated epics
//   4. Design gate: ADRs, stories, tasks with skills, test strategy
//   5. Work items generated from epics/stories/tasks and validated
//   6. Implementation gate: progress complete and every review approved
//   7. Completed: all tiers done, all gates passed, no next action
//
// The binary tests at the bottom check exit codes and `--json` shapes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use flow_engine::{ArtifactStatus, GateChecker, GateStatus, StatusEngine, TransitionEngine};
use flow_initiative::{EventDispatcher, FlowConfig, InitiativeStore, Stage};
use flow_schema::{GateId, Schema, SchemaLoader, Tier};
use flow_workitems::{WorkItemGenerator, WorkItemValidator};
use tempfile::TempDir;

const INITIATIVE: &str = "INI-001";

fn shipped_schemas() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../openspec/schemas")
}

/// A temporary project with the shipped schema and work-item templates.
fn project() -> (TempDir, FlowConfig) {
    let dir = TempDir::new().unwrap();
    let config = FlowConfig::for_project(dir.path());
    for (from, to) in [
        ("initiative-flow/schema.yaml", config.schemas_dir.join("initiative-flow/schema.yaml")),
        ("workitems/_schema.yaml", config.workitem_templates_dir.join("_schema.yaml")),
        ("workitems/README.md", config.workitem_templates_dir.join("README.md")),
    ] {
        fs::create_dir_all(to.parent().unwrap()).unwrap();
        fs::copy(shipped_schemas().join(from), &to).unwrap();
    }
    (dir, config)
}

fn write(config: &FlowConfig, relative: &str, content: &str) {
    let path = config.initiative_dir(INITIATIVE).join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn transition(
    store: &InitiativeStore,
    schema: &Schema,
    config: &FlowConfig,
    from: Stage,
    to: Stage,
) -> bool {
    TransitionEngine::new(store)
        .with_schema(schema)
        .with_dispatcher(EventDispatcher::with_log(&config.events_log))
        .apply_transition_as(INITIATIVE, from, to, Some("lifecycle-test"))
        .unwrap()
        .success
}

/// Full lifecycle - draft to completed through all four gates.
#[test]
fn initiative_lifecycle_draft_to_completed() {
    let (_dir, config) = project();
    let schema = SchemaLoader::new(&config.schemas_dir)
        .load("initiative-flow")
        .unwrap();
    let store = InitiativeStore::new(&config.initiatives_dir);

    // =========================================================
    // 1. Create the initiative and enter tier 1
    // =========================================================

    store.create(INITIATIVE, "Checkout v2").unwrap();
    let status = StatusEngine::new(&schema, &store)
        .initiative_status(INITIATIVE)
        .unwrap();
    assert_eq!(status.current_stage, Stage::Draft);
    assert_eq!(status.next_action.unwrap().artifact, "strategic-mandate");
    assert!(status.gates.iter().all(|g| g.status == GateStatus::Pending));

    assert!(transition(&store, &schema, &config, Stage::Draft, Stage::Tier1Active));

    // =========================================================
    // 2. Strategic gate
    // =========================================================

    assert!(!transition(&store, &schema, &config, Stage::Tier1Active, Stage::Tier1Approved));
    assert_eq!(store.load(INITIATIVE).unwrap().stage, Stage::Tier1Active);

    write(
        &config,
        "tier1/strategic-mandate.md",
        "---\nvision_aligned: false\nsponsor: VP Commerce\n\
         success_metrics:\n  - conversion +5%\n---\n# Mandate\n",
    );
    let gate = GateChecker::new(&schema, &store)
        .check_gate(INITIATIVE, GateId::Strategic)
        .unwrap();
    assert!(!gate.passed);
    assert_eq!(gate.failing_labels(), vec!["vision_aligned"]);

    write(
        &config,
        "tier1/strategic-mandate.md",
        "---\nvision_aligned: true\nsponsor: VP Commerce\n\
         success_metrics:\n  - conversion +5%\n---\n# Mandate\n",
    );
    assert!(transition(&store, &schema, &config, Stage::Tier1Active, Stage::Tier1Approved));
    assert!(transition(&store, &schema, &config, Stage::Tier1Approved, Stage::Tier2Active));

    // =========================================================
    // 3. Product gate
    // =========================================================

    write(
        &config,
        "tier2/prd.md",
        "# PRD\n\n## Problem Statement\n\nCheckout takes too many steps.\n\n\
         ## Users\n\nShoppers.\n",
    );
    write(
        &config,
        "tier2/epics/EP-001.yaml",
        "id: EP-001\ntitle: Checkout Flow\nmoscow: must\n",
    );
    write(
        &config,
        "tier2/epics/EP-002.yaml",
        "id: EP-002\ntitle: Saved Cards\n",
    );
    let gate = GateChecker::new(&schema, &store)
        .check_gate(INITIATIVE, GateId::Product)
        .unwrap();
    assert_eq!(gate.failing_labels(), vec!["moscow_applied"]);

    write(
        &config,
        "tier2/epics/EP-002.yaml",
        "id: EP-002\ntitle: Saved Cards\nmoscow: should\ndependencies:\n  - EP-001\n",
    );
    assert!(transition(&store, &schema, &config, Stage::Tier2Active, Stage::Tier2Approved));
    assert!(transition(&store, &schema, &config, Stage::Tier2Approved, Stage::Tier3Active));

    // =========================================================
    // 4. Design gate
    // =========================================================

    let tier3 = StatusEngine::new(&schema, &store)
        .tier_status(INITIATIVE, Tier::Tier3)
        .unwrap();
    assert_eq!(tier3.council, "architecture-council");
    assert_eq!(tier3.completion_pct, 0.0);

    write(&config, "tier3/adrs/ADR-001.md", "# ADR-001: Payment provider\n");
    write(
        &config,
        "tier3/stories/ST-001.yaml",
        "id: ST-001\ntitle: Pay by card\nepic_id: EP-001\n\
         user_story: \"As a shopper, I want to pay by card, so that checkout is fast\"\n\
         story_points: 5\n",
    );
    write(
        &config,
        "tier3/stories/ST-002.yaml",
        "id: ST-002\ntitle: Save a card\nepic_id: EP-002\ndependencies: [ST-001]\n",
    );
    write(
        &config,
        "tier3/tasks/TK-001.yaml",
        "id: TK-001\ntitle: Card form\nstory_id: ST-001\n\
         skills_required: [frontend]\nestimated_hours: 6\n",
    );
    write(&config, "tier3/test-strategy.md", "# Test strategy\n");

    let tier3 = StatusEngine::new(&schema, &store)
        .tier_status(INITIATIVE, Tier::Tier3)
        .unwrap();
    assert_eq!(tier3.completion_pct, 100.0);
    assert!(transition(&store, &schema, &config, Stage::Tier3Active, Stage::Tier3Approved));

    // =========================================================
    // 5. Work items
    // =========================================================

    let generated = WorkItemGenerator::new(&config).generate(INITIATIVE).unwrap();
    assert!(generated.success);
    assert_eq!(generated.items_generated.epics, 2);
    assert_eq!(generated.items_generated.stories, 2);
    assert_eq!(generated.items_generated.tasks, 1);

    let workitems = config.initiative_dir(INITIATIVE).join("workitems");
    assert!(workitems.join("1-checkout-flow/epic.yaml").exists());
    assert!(workitems
        .join("1-checkout-flow/1.1-pay-by-card/1.1.1-card-form.yaml")
        .exists());
    assert!(workitems.join("_schema.yaml").exists());
    let story =
        fs::read_to_string(workitems.join("2-saved-cards/2.1-save-a-card/story.yaml")).unwrap();
    assert!(story.contains("1.1-pay-by-card"));
    assert!(generated.warnings.is_empty());

    let validation = WorkItemValidator::new(&config).validate(INITIATIVE).unwrap();
    assert!(validation.valid, "{:?}", validation.errors);

    // =========================================================
    // 6. Implementation gate
    // =========================================================

    assert!(transition(&store, &schema, &config, Stage::Tier3Approved, Stage::Tier4Active));
    write(&config, "tier4/progress.yaml", "all_complete: false\n");
    write(&config, "tier4/reviews/REV-001.md", "---\nstatus: approved\n---\n");
    write(&config, "tier4/reviews/REV-002.md", "---\nstatus: changes_requested\n---\n");
    assert!(transition(&store, &schema, &config, Stage::Tier4Active, Stage::Tier4Review));

    let gate = GateChecker::new(&schema, &store)
        .check_gate(INITIATIVE, GateId::Implementation)
        .unwrap();
    assert_eq!(gate.failing_labels(), vec!["all_tasks_complete", "reviews_approved"]);
    assert!(!transition(&store, &schema, &config, Stage::Tier4Review, Stage::Tier4Approved));

    write(&config, "tier4/progress.yaml", "all_complete: true\n");
    write(&config, "tier4/reviews/REV-002.md", "---\nstatus: approved\n---\n");
    assert!(transition(&store, &schema, &config, Stage::Tier4Review, Stage::Tier4Approved));
    assert!(transition(&store, &schema, &config, Stage::Tier4Approved, Stage::Completed));

    // =========================================================
    // 7. Completed
    // =========================================================

    let status = StatusEngine::new(&schema, &store)
        .initiative_status(INITIATIVE)
        .unwrap();
    assert!(status.is_complete);
    assert!(status.next_action.is_none());
    assert_eq!(status.completed_tiers, Tier::ALL.to_vec());
    assert!(status.gates.iter().all(|g| g.status == GateStatus::Passed));
    assert!(status.artifacts.iter().all(|a| a.status == ArtifactStatus::Done));

    let state = store.load(INITIATIVE).unwrap();
    assert_eq!(state.history.len(), 10);
    assert!(state
        .history
        .iter()
        .all(|t| t.actor.as_deref() == Some("lifecycle-test")));

    let events = fs::read_to_string(&config.events_log).unwrap();
    assert_eq!(
        events
            .lines()
            .filter(|l| l.contains("\"event_type\":\"stage_changed\""))
            .count(),
        10
    );
}

fn flow(project_root: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_flow"))
        .arg("--project-root")
        .arg(project_root)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn cli_reports_errors_as_json() {
    let (dir, _config) = project();
    let output = flow(dir.path(), &["--json", "status", "missing"]);
    assert!(!output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[test]
fn cli_transition_exit_codes() {
    let (dir, _config) = project();
    assert!(flow(dir.path(), &["init", INITIATIVE, "--title", "Checkout v2"])
        .status
        .success());
    assert!(flow(dir.path(), &["transition", INITIATIVE, "draft", "tier1_active"])
        .status
        .success());

    let output = flow(
        dir.path(),
        &["--json", "transition", INITIATIVE, "tier1_active", "tier1_approved"],
    );
    assert!(!output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["new_stage"], "tier1_active");

    let output = flow(dir.path(), &["--json", "stage", INITIATIVE]);
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["stage"], "tier1_active");
    assert_eq!(body["next_gate"], "strategic");
}

#[test]
fn cli_workitems_need_epics() {
    let (dir, config) = project();
    assert!(flow(dir.path(), &["init", INITIATIVE, "--title", "Checkout v2"])
        .status
        .success());
    assert!(!flow(dir.path(), &["workitems", "generate", INITIATIVE])
        .status
        .success());

    write(&config, "tier2/epics/EP-001.yaml", "id: EP-001\ntitle: Checkout Flow\n");
    assert!(flow(dir.path(), &["workitems", "init", INITIATIVE]).status.success());
    assert!(fs::read_to_string(&config.config_file)
        .unwrap()
        .contains("auto_generate: true"));

    let output = flow(dir.path(), &["workitems", "tree", INITIATIVE]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("└── epic [backlog] Checkout Flow"));
    assert!(flow(dir.path(), &["workitems", "validate", INITIATIVE]).status.success());
}
