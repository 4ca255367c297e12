// events.rs - Lifecycle events and notification dispatch.
//
// Transitions and work-item generation emit events. Sinks subscribe to them;
// the always-on sink appends JSONL to `openspec/events.jsonl`. Sink failures
// are logged and never fail the operation that emitted the event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InitiativeError;
use crate::stage::Stage;

/// Events emitted at initiative lifecycle points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A new initiative was created in `draft`.
    InitiativeCreated {
        initiative: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// An initiative moved between stages.
    StageChanged {
        initiative: String,
        from: Stage,
        to: Stage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actor: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The work-item tree was (re)generated.
    WorkItemsGenerated {
        initiative: String,
        epics: usize,
        stories: usize,
        tasks: usize,
        timestamp: DateTime<Utc>,
    },
}

impl FlowEvent {
    pub fn event_type(&self) -> &str {
        match self {
            FlowEvent::InitiativeCreated { .. } => "initiative_created",
            FlowEvent::StageChanged { .. } => "stage_changed",
            FlowEvent::WorkItemsGenerated { .. } => "work_items_generated",
        }
    }

    pub fn initiative(&self) -> &str {
        match self {
            FlowEvent::InitiativeCreated { initiative, .. }
            | FlowEvent::StageChanged { initiative, .. }
            | FlowEvent::WorkItemsGenerated { initiative, .. } => initiative,
        }
    }

    pub fn initiative_created(initiative: &str, title: &str) -> Self {
        FlowEvent::InitiativeCreated {
            initiative: initiative.to_string(),
            title: title.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn stage_changed(initiative: &str, from: Stage, to: Stage, actor: Option<&str>) -> Self {
        FlowEvent::StageChanged {
            initiative: initiative.to_string(),
            from,
            to,
            actor: actor.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    pub fn work_items_generated(
        initiative: &str,
        epics: usize,
        stories: usize,
        tasks: usize,
    ) -> Self {
        FlowEvent::WorkItemsGenerated {
            initiative: initiative.to_string(),
            epics,
            stories,
            tasks,
            timestamp: Utc::now(),
        }
    }
}

/// Receives lifecycle events.
pub trait NotificationSink: Send {
    /// Handle an event. Errors are logged by the dispatcher.
    fn send(&self, event: &FlowEvent) -> Result<(), InitiativeError>;
}

/// Appends events as JSON lines to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &FlowEvent) -> Result<(), InitiativeError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| InitiativeError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| InitiativeError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| InitiativeError::IoError {
            path: self.path.display().to_string(),
            source,
        })
    }
}

/// Fans events out to every registered sink.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Dispatcher with a single JSONL sink at `events_log`.
    pub fn with_log(events_log: impl AsRef<Path>) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.add_sink(Box::new(LogSink::new(events_log)));
        dispatcher
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn dispatch(&self, event: &FlowEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(
                    event = event.event_type(),
                    initiative = event.initiative(),
                    "notification sink error: {}",
                    e
                );
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stage_changed_serializes_with_tag_and_snake_case_stages() {
        let event =
            FlowEvent::stage_changed("checkout", Stage::Tier1Active, Stage::Tier1Approved, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"stage_changed\""));
        assert!(json.contains("\"to\":\"tier1_approved\""));
        assert!(!json.contains("actor"));

        let restored: FlowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn log_sink_appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("openspec").join("events.jsonl");
        let sink = LogSink::new(&path);

        sink.send(&FlowEvent::initiative_created("checkout", "Checkout")).unwrap();
        sink.send(&FlowEvent::work_items_generated("checkout", 1, 2, 3)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("work_items_generated"));
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn send(&self, _event: &FlowEvent) -> Result<(), InitiativeError> {
            Err(InitiativeError::NotFound("sink".into()))
        }
    }

    #[test]
    fn failing_sink_does_not_stop_dispatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(FailingSink));
        dispatcher.add_sink(Box::new(LogSink::new(&path)));
        dispatcher.dispatch(&FlowEvent::stage_changed(
            "checkout",
            Stage::Draft,
            Stage::Tier1Active,
            Some("alex"),
        ));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"actor\":\"alex\""));
    }

    #[test]
    fn event_accessors() {
        let event = FlowEvent::work_items_generated("checkout", 1, 0, 0);
        assert_eq!(event.event_type(), "work_items_generated");
        assert_eq!(event.initiative(), "checkout");
    }
}
