// watch.rs - WorkItemWatcher: regenerate work items when source artifacts change.
//
// notify delivers events on its own thread into a channel; the watcher drains
// the channel on each poll. YAML changes under the watched directories are
// debounced, and once the stream has been quiet for the debounce period one
// regeneration runs. Changes that arrive while a regeneration is running stay
// queued and produce exactly one follow-up run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use flow_initiative::{FlowConfig, ProjectConfig};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::WorkItemError;
use crate::generate::WorkItemGenerator;
use crate::source::{EPICS_DIR, STORIES_DIR, TASKS_DIR};
use crate::types::GenerationResult;

/// Quiet period before a burst of changes triggers regeneration.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether `initiative_id` has work items enabled with auto-generation on.
pub fn auto_generate_enabled(
    config: &FlowConfig,
    initiative_id: &str,
) -> Result<bool, WorkItemError> {
    Ok(ProjectConfig::load(&config.config_file)?.auto_generate_enabled(initiative_id))
}

/// Regenerate work items only when auto-generation is enabled for the initiative.
pub fn regenerate_if_enabled(
    config: &FlowConfig,
    initiative_id: &str,
) -> Result<Option<GenerationResult>, WorkItemError> {
    if !auto_generate_enabled(config, initiative_id)? {
        return Ok(None);
    }
    WorkItemGenerator::new(config).generate(initiative_id).map(Some)
}

/// Watches one initiative's epics, stories, and tasks.
pub struct WorkItemWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<Result<Event, notify::Error>>,
    generator: WorkItemGenerator,
    initiative_id: String,
    watched: Vec<PathBuf>,
    debounce: Duration,
    last_event_time: Option<Instant>,
    pending_changes: HashSet<PathBuf>,
}

impl WorkItemWatcher {
    /// Start watching. Source directories that do not exist yet are skipped.
    pub fn new(config: &FlowConfig, initiative_id: &str) -> Result<Self, WorkItemError> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;

        let initiative_dir = config.initiative_dir(initiative_id);
        let mut watched = Vec::new();
        for dir in [EPICS_DIR, STORIES_DIR, TASKS_DIR] {
            let path = initiative_dir.join(dir);
            if !path.is_dir() {
                tracing::debug!(path = %path.display(), "source directory missing, not watching");
                continue;
            }
            watcher.watch(&path, RecursiveMode::Recursive)?;
            watched.push(path);
        }
        if watched.is_empty() {
            tracing::warn!(initiative = initiative_id, "no source directories to watch");
        }

        Ok(Self {
            _watcher: watcher,
            rx,
            generator: WorkItemGenerator::new(config),
            initiative_id: initiative_id.to_string(),
            watched,
            debounce: DEFAULT_DEBOUNCE,
            last_event_time: None,
            pending_changes: HashSet::new(),
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Regenerate with `generator` instead of a default one.
    pub fn with_generator(mut self, generator: WorkItemGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Drain queued events; returns the changed YAML paths once the debounce
    /// period has elapsed since the last relevant event.
    pub fn check_for_changes(&mut self) -> Option<Vec<PathBuf>> {
        let mut has_new_events = false;
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => {
                    if !should_process_event(&event) {
                        continue;
                    }
                    for path in event.paths.iter().filter(|p| is_yaml(p)) {
                        self.pending_changes.insert(path.clone());
                        has_new_events = true;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        initiative = %self.initiative_id,
                        error = %e,
                        "file watcher error"
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if has_new_events {
            self.last_event_time = Some(Instant::now());
        }

        match self.last_event_time {
            Some(last) if !self.pending_changes.is_empty() && last.elapsed() >= self.debounce => {
                self.last_event_time = None;
                let mut changes: Vec<PathBuf> = self.pending_changes.drain().collect();
                changes.sort();
                Some(changes)
            }
            _ => None,
        }
    }

    /// Regenerate if a debounced batch of changes is ready.
    pub fn poll(&mut self) -> Result<Option<GenerationResult>, WorkItemError> {
        let Some(changes) = self.check_for_changes() else {
            return Ok(None);
        };
        tracing::info!(
            initiative = %self.initiative_id,
            changed = changes.len(),
            "source artifacts changed, regenerating work items"
        );
        self.generator.generate(&self.initiative_id).map(Some)
    }

    /// Poll until `stop` returns true, handing each regeneration result to
    /// `on_result`. Generation errors are reported and do not end the loop.
    pub fn run(
        &mut self,
        mut stop: impl FnMut() -> bool,
        mut on_result: impl FnMut(Result<GenerationResult, WorkItemError>),
    ) {
        while !stop() {
            match self.poll() {
                Ok(Some(result)) => on_result(Ok(result)),
                Ok(None) => {}
                Err(e) => on_result(Err(e)),
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn should_process_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn is_yaml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml")
}
