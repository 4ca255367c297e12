// initiative.rs - Initiative commands: init, list, status, tier, gate, stage, next, transition.

use std::process::ExitCode;

use flow_engine::{ArtifactStatus, GateChecker, GateStatus, StatusEngine, TransitionEngine};
use flow_initiative::{FlowEvent, Stage};
use flow_schema::{GateId, Tier};
use serde::Serialize;

use super::Context;

pub fn init(ctx: &Context, id: &str, title: &str) -> anyhow::Result<ExitCode> {
    let store = ctx.store();
    let state = store.create(id, title)?;
    ctx.dispatcher().dispatch(&FlowEvent::initiative_created(id, title));

    if ctx.json {
        ctx.print_json(&state)?;
        return Ok(ExitCode::SUCCESS);
    }
    println!("Initiative created: {}", state.metadata.id);
    println!("  Title: {}", state.metadata.title);
    println!("  Stage: {}", state.stage);
    println!("  Path:  {}", store.initiative_dir(id).display());
    Ok(ExitCode::SUCCESS)
}

pub fn list(ctx: &Context) -> anyhow::Result<ExitCode> {
    let store = ctx.store();
    let states = store
        .list()?
        .iter()
        .map(|id| store.load(id))
        .collect::<Result<Vec<_>, _>>()?;

    if ctx.json {
        ctx.print_json(&states)?;
        return Ok(ExitCode::SUCCESS);
    }
    if states.is_empty() {
        println!("No initiatives found.");
        return Ok(ExitCode::SUCCESS);
    }
    println!("{:<20} {:<16} TITLE", "ID", "STAGE");
    for state in &states {
        println!(
            "{:<20} {:<16} {}",
            state.metadata.id, state.stage, state.metadata.title
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub fn status(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let store = ctx.store();
    ctx.require_initiative(&store, id)?;
    let schema = ctx.load_schema()?;
    let status = StatusEngine::new(&schema, &store).initiative_status(id)?;

    if ctx.json {
        ctx.print_json(&status)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Initiative: {}", status.initiative);
    println!("Title:      {}", status.title);
    println!("Stage:      {}", status.current_stage);
    println!(
        "Complete:   {}",
        if status.is_complete { "yes" } else { "no" }
    );
    if !status.completed_tiers.is_empty() {
        let tiers: Vec<&str> = status.completed_tiers.iter().map(|t| t.as_str()).collect();
        println!("Completed tiers: {}", tiers.join(", "));
    }

    println!();
    println!("Artifacts:");
    for artifact in &status.artifacts {
        let deps = if artifact.missing_deps.is_empty() {
            String::new()
        } else {
            format!(" (blocked by: {})", artifact.missing_deps.join(", "))
        };
        println!(
            "  {}/{}: {}{}",
            artifact.tier,
            artifact.id,
            artifact_label(artifact.status),
            deps
        );
    }

    println!();
    println!("Gates:");
    for gate in &status.gates {
        match (gate.status, gate.passed_at) {
            (GateStatus::Passed, Some(at)) => {
                println!("  {}: passed ({})", gate.id, at.format("%Y-%m-%d %H:%M"))
            }
            (GateStatus::Passed, None) => println!("  {}: passed", gate.id),
            (GateStatus::Pending, _) => println!("  {}: pending", gate.id),
        }
    }

    if let Some(next) = &status.next_action {
        println!();
        println!("Next action:");
        println!("  Create {} -> {}", next.artifact, next.generates);
    }

    if !status.blockers.is_empty() {
        println!();
        println!("Blockers:");
        for blocker in &status.blockers {
            println!("  - {}", blocker);
        }
    }

    if !status.escalations.is_empty() {
        println!();
        println!("Escalations:");
        for esc in &status.escalations {
            let state = if esc.is_open() { "open" } else { "resolved" };
            println!("  - {}: {} ({})", esc.id, esc.reason, state);
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn tier(ctx: &Context, id: &str, tier: &str) -> anyhow::Result<ExitCode> {
    let tier: Tier = tier.parse().map_err(anyhow::Error::msg)?;
    let store = ctx.store();
    ctx.require_initiative(&store, id)?;
    let schema = ctx.load_schema()?;
    let status = StatusEngine::new(&schema, &store).tier_status(id, tier)?;

    if ctx.json {
        ctx.print_json(&status)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Tier: {} ({})", status.name, status.tier);
    println!("Council:    {}", status.council);
    println!("Completion: {:.0}%", status.completion_pct);
    println!(
        "Blocked:    {}",
        if status.is_blocked { "yes" } else { "no" }
    );
    println!();
    println!("Artifacts:");
    for artifact in &status.artifacts {
        println!("  {}: {}", artifact.id, artifact_label(artifact.status));
    }
    if !status.blocked_by.is_empty() {
        println!();
        println!("Blocked by: {}", status.blocked_by.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn gate(ctx: &Context, id: &str, gate: &str) -> anyhow::Result<ExitCode> {
    let gate: GateId = gate.parse().map_err(anyhow::Error::msg)?;
    let store = ctx.store();
    ctx.require_initiative(&store, id)?;
    let schema = ctx.load_schema()?;
    let result = GateChecker::new(&schema, &store).check_gate(id, gate)?;

    if ctx.json {
        ctx.print_json(&result)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "Gate: {} - {}",
        result.gate,
        if result.passed { "PASSED" } else { "FAILED" }
    );
    println!("Criteria: {}/{}", result.criteria_met, result.criteria_total);
    println!();
    for criterion in &result.criteria {
        println!(
            "  [{}] {}",
            if criterion.passed { "PASS" } else { "FAIL" },
            criterion.criterion
        );
        if let (false, Some(reason)) = (criterion.passed, &criterion.reason) {
            println!("         {}", reason);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct StageReport {
    initiative: String,
    stage: Stage,
    tier: Option<Tier>,
    valid_transitions: Vec<Stage>,
    next_stage: Option<Stage>,
    /// Gate that guards `next_stage`.
    next_gate: Option<GateId>,
}

pub fn stage(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let store = ctx.store();
    ctx.require_initiative(&store, id)?;
    let stage = TransitionEngine::new(&store).current_stage(id)?;
    let next_stage = stage.next_stage();
    let report = StageReport {
        initiative: id.to_string(),
        stage,
        tier: stage.tier(),
        valid_transitions: stage.valid_transitions().to_vec(),
        next_stage,
        next_gate: next_stage.and_then(Stage::required_gate),
    };

    if ctx.json {
        ctx.print_json(&report)?;
        return Ok(ExitCode::SUCCESS);
    }

    println!("Current stage: {}", report.stage);
    if report.valid_transitions.is_empty() {
        println!("No further transitions.");
        return Ok(ExitCode::SUCCESS);
    }
    let valid: Vec<&str> = report.valid_transitions.iter().map(|s| s.as_str()).collect();
    println!("Valid transitions: {}", valid.join(", "));
    if let Some(next) = report.next_stage {
        match report.next_gate {
            Some(gate) => println!("Next: {} (requires gate '{}')", next, gate),
            None => println!("Next: {}", next),
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn next(ctx: &Context, id: &str) -> anyhow::Result<ExitCode> {
    let store = ctx.store();
    ctx.require_initiative(&store, id)?;
    let schema = ctx.load_schema()?;
    let status = StatusEngine::new(&schema, &store).initiative_status(id)?;

    if ctx.json {
        ctx.print_json(&status.next_action)?;
        return Ok(ExitCode::SUCCESS);
    }

    match &status.next_action {
        Some(next) => {
            println!("Next action:");
            println!("  Artifact:    {}", next.artifact);
            println!("  Tier:        {}", next.tier);
            println!("  Generates:   {}", next.generates);
            println!("  Description: {}", next.description);
        }
        None if status.is_complete => println!("Initiative complete."),
        None => println!("No ready artifacts: remaining work is done or blocked."),
    }
    Ok(ExitCode::SUCCESS)
}

pub fn transition(
    ctx: &Context,
    id: &str,
    from: &str,
    to: &str,
    actor: Option<&str>,
) -> anyhow::Result<ExitCode> {
    let from: Stage = from.parse().map_err(anyhow::Error::msg)?;
    let to: Stage = to.parse().map_err(anyhow::Error::msg)?;
    let store = ctx.store();
    ctx.require_initiative(&store, id)?;
    let schema = ctx.load_schema()?;

    let result = TransitionEngine::new(&store)
        .with_schema(&schema)
        .with_dispatcher(ctx.dispatcher())
        .apply_transition_as(id, from, to, actor)?;

    if ctx.json {
        ctx.print_json(&result)?;
    } else if result.success {
        println!("Transition applied: {} -> {}", result.previous_stage, result.new_stage);
    } else {
        eprintln!(
            "Transition failed: {}",
            result.error.as_deref().unwrap_or("unknown reason")
        );
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn artifact_label(status: ArtifactStatus) -> &'static str {
    match status {
        ArtifactStatus::Done => "done",
        ArtifactStatus::Ready => "ready",
        ArtifactStatus::Blocked => "blocked",
    }
}
